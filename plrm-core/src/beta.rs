//! # BetaMatrix — Armazenamento Esparso de Coeficientes
//!
//! Cada bloco de learner guarda seus pesos numa `BetaMatrix`: um mapa
//! `feature id → [peso da classe 0, peso da classe 1, ...]`, alinhado com a ordem das
//! classes de **uma** discriminação.
//!
//! Features que nunca receberam atualização não ocupam espaço. Linhas podem ser mais
//! curtas que o número atual de classes (classes acrescentadas depois do treino): as
//! colunas ausentes valem zero.
//!
//! Usamos `BTreeMap` em vez de `HashMap` para que a iteração (e portanto a serialização
//! e a truncagem preguiçosa) siga sempre a ordem dos ids.

use std::collections::BTreeMap;

use crate::features::SparseVector;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BetaMatrix {
    rows: BTreeMap<usize, Vec<f64>>,
}

impl BetaMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peso $w_{feature, class}$ (zero se ausente).
    pub fn get(&self, feature: usize, class: usize) -> f64 {
        self.rows
            .get(&feature)
            .and_then(|row| row.get(class))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn row(&self, feature: usize) -> Option<&[f64]> {
        self.rows.get(&feature).map(Vec::as_slice)
    }

    /// Linha mutável com pelo menos `n_classes` colunas, criada/estendida com `fill`.
    pub fn row_mut_with(&mut self, feature: usize, n_classes: usize, fill: f64) -> &mut Vec<f64> {
        let row = self.rows.entry(feature).or_default();
        if row.len() < n_classes {
            row.resize(n_classes, fill);
        }
        row
    }

    pub fn row_mut(&mut self, feature: usize, n_classes: usize) -> &mut Vec<f64> {
        self.row_mut_with(feature, n_classes, 0.0)
    }

    /// Linha existente, sem criar nem estender.
    pub fn get_row_mut(&mut self, feature: usize) -> Option<&mut Vec<f64>> {
        self.rows.get_mut(&feature)
    }

    pub fn set_row(&mut self, feature: usize, weights: Vec<f64>) {
        self.rows.insert(feature, weights);
    }

    pub fn contains_row(&self, feature: usize) -> bool {
        self.rows.contains_key(&feature)
    }

    /// Scores lineares $s_c = \sum_j w_{j,c} \cdot x_j$ para as `n_classes` classes.
    pub fn scores(&self, x: &SparseVector, n_classes: usize) -> Vec<f64> {
        let mut scores = vec![0.0; n_classes];
        for (feature, value) in x.iter() {
            if let Some(row) = self.rows.get(&feature) {
                for (score, w) in scores.iter_mut().zip(row) {
                    *score += w * value;
                }
            }
        }
        scores
    }

    /// Remove as linhas cujos pesos são todos exatamente zero. Retorna quantas saíram.
    pub fn prune_zero_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| row.iter().any(|w| *w != 0.0));
        before - self.rows.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f64])> + '_ {
        self.rows.iter().map(|(f, row)| (*f, row.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Vec<f64>)> + '_ {
        self.rows.iter_mut().map(|(f, row)| (*f, row))
    }

    pub fn feature_ids(&self) -> Vec<usize> {
        self.rows.keys().copied().collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Número de coeficientes diferentes de zero.
    pub fn nnz(&self) -> usize {
        self.rows
            .values()
            .map(|row| row.iter().filter(|w| **w != 0.0).count())
            .sum()
    }

    pub fn max_feature(&self) -> Option<usize> {
        self.rows.keys().next_back().copied()
    }

    /// Estimativa de bytes ocupados (chaves, cabeçalhos de `Vec` e coeficientes).
    pub fn memory_estimate(&self) -> usize {
        self.rows
            .values()
            .map(|row| {
                std::mem::size_of::<usize>()
                    + std::mem::size_of::<Vec<f64>>()
                    + row.capacity() * std::mem::size_of::<f64>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entries_read_as_zero() {
        let mut beta = BetaMatrix::new();
        beta.row_mut(3, 2)[1] = 0.5;
        assert_eq!(beta.get(3, 1), 0.5);
        assert_eq!(beta.get(3, 5), 0.0);
        assert_eq!(beta.get(7, 0), 0.0);
    }

    #[test]
    fn test_rows_grow_with_new_classes() {
        let mut beta = BetaMatrix::new();
        beta.row_mut(1, 2)[0] = 1.0;
        let row = beta.row_mut(1, 4);
        assert_eq!(*row, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_scores() {
        let mut beta = BetaMatrix::new();
        beta.set_row(0, vec![0.5, -0.5]);
        beta.set_row(2, vec![1.0, 2.0]);
        let x = SparseVector::from_pairs(vec![(0, 1.0), (2, 3.0), (5, 9.0)]).unwrap();
        let s = beta.scores(&x, 2);
        assert!((s[0] - 3.5).abs() < 1e-12);
        assert!((s[1] - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_prune_zero_rows() {
        let mut beta = BetaMatrix::new();
        beta.set_row(1, vec![0.0, 0.0]);
        beta.set_row(2, vec![0.0, 1e-300]);
        assert_eq!(beta.prune_zero_rows(), 1);
        assert_eq!(beta.row_count(), 1);
        assert_eq!(beta.nnz(), 1);
    }
}
