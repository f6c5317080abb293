//! # Renumeração de Colunas (RenumMap)
//!
//! Alguns arrays são indexados pelo **id global de classe**: a concatenação das classes
//! de todas as discriminações, na ordem das discriminações. Quando uma discriminação é
//! removida (ou uma classe é acrescentada no meio desse espaço), todas essas colunas
//! precisam ser reindexadas.
//!
//! O [`RenumMap`] descreve a reindexação como um mapa `antigo → Some(novo) | None`,
//! mais o novo comprimento. Aplicá-lo é uma única passada linear que produz o array
//! novo; posições novas sem origem recebem um valor de preenchimento.
//!
//! ```text
//! antigo:  0   1   2   3   4        (removendo as colunas 1..3)
//! novo:    0   -   -   1   2
//! ```
//!
//! Os destinos sobreviventes precisam ser estritamente crescentes. Isso é verificado
//! na construção: um mapa fora de ordem é um erro, nunca é corrigido em silêncio.

use std::ops::Range;

use crate::error::{PlrmError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenumMap {
    targets: Vec<Option<usize>>,
    new_len: usize,
}

impl RenumMap {
    /// Constrói e valida um mapa arbitrário.
    pub fn new(targets: Vec<Option<usize>>, new_len: usize) -> Result<Self> {
        let mut last: Option<usize> = None;
        for (old, target) in targets.iter().enumerate() {
            let Some(new) = *target else { continue };
            if new >= new_len {
                return Err(PlrmError::Renumbering(format!(
                    "coluna {old} mapeada para {new}, além do novo comprimento {new_len}"
                )));
            }
            if let Some(prev) = last {
                if new <= prev {
                    return Err(PlrmError::Renumbering(format!(
                        "destinos fora de ordem: coluna {old} → {new} após {prev}"
                    )));
                }
            }
            last = Some(new);
        }
        Ok(Self { targets, new_len })
    }

    /// Mapa que remove as colunas em `range` e compacta o restante.
    pub fn deleting(len: usize, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > len {
            return Err(PlrmError::Renumbering(format!(
                "intervalo {range:?} fora de 0..{len}"
            )));
        }
        let removed = range.end - range.start;
        let targets = (0..len)
            .map(|old| {
                if old < range.start {
                    Some(old)
                } else if old < range.end {
                    None
                } else {
                    Some(old - removed)
                }
            })
            .collect();
        Self::new(targets, len - removed)
    }

    /// Mapa que abre `count` colunas novas a partir da posição `at`.
    pub fn inserting(len: usize, at: usize, count: usize) -> Result<Self> {
        if at > len {
            return Err(PlrmError::Renumbering(format!(
                "posição de inserção {at} além do comprimento {len}"
            )));
        }
        let targets = (0..len)
            .map(|old| if old < at { Some(old) } else { Some(old + count) })
            .collect();
        Self::new(targets, len + count)
    }

    pub fn old_len(&self) -> usize {
        self.targets.len()
    }

    pub fn new_len(&self) -> usize {
        self.new_len
    }

    /// Novo índice da coluna `old`, ou `None` se ela foi removida (ou não existe).
    pub fn get(&self, old: usize) -> Option<usize> {
        self.targets.get(old).copied().flatten()
    }

    pub fn is_identity(&self) -> bool {
        self.targets.len() == self.new_len
            && self
                .targets
                .iter()
                .enumerate()
                .all(|(old, t)| *t == Some(old))
    }

    /// Produz o array reindexado. O comprimento de `column` precisa ser `old_len()`.
    pub fn apply<T: Clone>(&self, column: &[T], fill: T) -> Result<Vec<T>> {
        if column.len() != self.targets.len() {
            return Err(PlrmError::Renumbering(format!(
                "array com {} colunas, mapa espera {}",
                column.len(),
                self.targets.len()
            )));
        }
        let mut out = vec![fill; self.new_len];
        for (value, target) in column.iter().zip(&self.targets) {
            if let Some(new) = target {
                out[*new] = value.clone();
            }
        }
        Ok(out)
    }
}

/// Estruturas que guardam colunas no espaço global de classes.
pub trait Renumber {
    fn renumber(&mut self, map: &RenumMap) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleting_compacts() {
        let map = RenumMap::deleting(5, 1..3).unwrap();
        assert_eq!(map.new_len(), 3);
        assert_eq!(map.get(0), Some(0));
        assert_eq!(map.get(1), None);
        assert_eq!(map.get(3), Some(1));
        let out = map.apply(&[10, 11, 12, 13, 14], 0).unwrap();
        assert_eq!(out, vec![10, 13, 14]);
    }

    #[test]
    fn test_inserting_opens_gap() {
        let map = RenumMap::inserting(3, 1, 2).unwrap();
        let out = map.apply(&['a', 'b', 'c'], '_').unwrap();
        assert_eq!(out, vec!['a', '_', '_', 'b', 'c']);
    }

    #[test]
    fn test_out_of_order_is_rejected() {
        let err = RenumMap::new(vec![Some(1), Some(0)], 2).unwrap_err();
        assert!(matches!(err, PlrmError::Renumbering(_)));
        assert!(RenumMap::new(vec![Some(0), Some(0)], 2).is_err());
        assert!(RenumMap::new(vec![Some(3)], 2).is_err());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let map = RenumMap::deleting(3, 0..1).unwrap();
        assert!(map.apply(&[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn test_identity() {
        assert!(RenumMap::deleting(4, 2..2).unwrap().is_identity());
        assert!(!RenumMap::deleting(4, 2..3).unwrap().is_identity());
    }
}
