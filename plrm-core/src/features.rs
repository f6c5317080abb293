//! # Dicionário de Features e Vetores Esparsos
//!
//! O espaço de features é compartilhado por todas as discriminações de uma suite.
//! Cada nome legível ("Size", "word=brasil") recebe um id inteiro denso na primeira vez
//! em que aparece; o id nunca muda nem é reutilizado dentro da sessão, de modo que
//! `DataPoint`s antigos continuam válidos quando o dicionário cresce.
//!
//! ## Feature de viés
//!
//! O id 0 é reservado para [`BIAS_FEATURE`], presente com valor 1.0 em todo exemplo.
//! É o termo independente do modelo: sem ele, um exemplo sem nenhuma feature teria
//! score zero em todas as classes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlrmError, Result};

/// Nome reservado da feature de viés.
pub const BIAS_FEATURE: &str = "@@bias";
/// Id reservado da feature de viés.
pub const BIAS_ID: usize = 0;

/// Mapeamento bidirecional nome ↔ id, apenas com inserção.
#[derive(Debug, Clone)]
pub struct FeatureDictionary {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl FeatureDictionary {
    pub fn new() -> Self {
        let mut dict = Self {
            names: Vec::new(),
            ids: HashMap::new(),
        };
        dict.intern(BIAS_FEATURE);
        dict
    }

    /// Reconstrói um dicionário a partir da lista de nomes em ordem de id.
    ///
    /// A primeira entrada precisa ser [`BIAS_FEATURE`] e não pode haver repetições.
    pub fn from_names(names: &[String]) -> Result<Self> {
        if names.first().map(String::as_str) != Some(BIAS_FEATURE) {
            return Err(PlrmError::MalformedDocument(format!(
                "a lista de features deve começar com '{BIAS_FEATURE}'"
            )));
        }
        let mut dict = Self {
            names: Vec::with_capacity(names.len()),
            ids: HashMap::with_capacity(names.len()),
        };
        for name in names {
            if dict.ids.contains_key(name) {
                return Err(PlrmError::MalformedDocument(format!(
                    "feature '{name}' repetida no dicionário"
                )));
            }
            dict.intern(name);
        }
        Ok(dict)
    }

    /// Retorna o id de `name`, atribuindo o próximo id livre se ainda não existir.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Nomes em ordem de id (o índice é o id).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Verifica que o dicionário não encolheu em relação ao que um modelo treinado espera.
    pub fn check_min_len(&self, expected: usize) -> Result<()> {
        if self.names.len() < expected {
            return Err(PlrmError::DictionaryShrunk {
                expected,
                actual: self.names.len(),
            });
        }
        Ok(())
    }
}

impl Default for FeatureDictionary {
    fn default() -> Self {
        Self::new()
    }
}

/// Vetor esparso: pares `(feature id, valor)` ordenados por id, sem repetição.
///
/// Diferente de um `HashMap`, a ordem fixa garante que o produto escalar some os termos
/// sempre na mesma sequência, o que mantém o treino reprodutível bit a bit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Ordena os pares e descarta valores nulos.
    ///
    /// Em caso de id repetido, devolve `Err(id)` para o chamador montar a mensagem.
    pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> std::result::Result<Self, usize> {
        pairs.sort_by_key(|(id, _)| *id);
        for window in pairs.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(window[0].0);
            }
        }
        pairs.retain(|(_, v)| *v != 0.0);
        Ok(Self { entries: pairs })
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn get(&self, id: usize) -> Option<f64> {
        self.entries
            .binary_search_by_key(&id, |(i, _)| *i)
            .ok()
            .map(|pos| self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_id(&self) -> Option<usize> {
        self.entries.last().map(|(id, _)| *id)
    }

    /// Produto escalar com um vetor denso de pesos (ids além do fim contam como zero).
    ///
    /// $$ \text{score} = \sum_i w_i \cdot x_i $$
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries
            .iter()
            .map(|&(id, v)| v * weights.get(id).copied().unwrap_or(0.0))
            .sum()
    }
}
