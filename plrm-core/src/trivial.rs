//! # Learner Trivial (Baseline de Frequências)
//!
//! Ignora as features e prevê a distribuição das classes verdadeiras vistas até agora,
//! com suavização *add-1* (Laplace) para que nenhuma classe receba probabilidade zero:
//!
//! $$ P(c) = \frac{\text{count}(c) + 1}{N + |C|} $$
//!
//! Serve de referência: um learner que não supera o trivial não aprendeu nada das features.

use crate::beta::BetaMatrix;
use crate::datapoint::DataPoint;
use crate::features::BIAS_ID;
use crate::scores::log_prob;
use crate::suite::{DisId, Discrimination};

#[derive(Debug, Clone, PartialEq)]
pub struct TrivialBlock {
    dis: DisId,
    counts: Vec<u64>,
}

impl TrivialBlock {
    pub fn new(dis: DisId) -> Self {
        Self {
            dis,
            counts: Vec::new(),
        }
    }

    pub fn from_counts(dis: DisId, counts: Vec<u64>) -> Self {
        Self { dis, counts }
    }

    pub fn dis(&self) -> DisId {
        self.dis
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub(crate) fn absorb(&mut self, dis: &Discrimination, points: &[&DataPoint]) -> usize {
        let n = dis.class_count();
        if self.counts.len() < n {
            self.counts.resize(n, 0);
        }
        let mut skipped = 0;
        for point in points {
            match point.class_in(dis) {
                Some(truth) => self.counts[truth] += 1,
                None => skipped += 1,
            }
        }
        skipped
    }

    /// Probabilidades suavizadas no espaço linear.
    pub fn probabilities(&self, n_classes: usize) -> Vec<f64> {
        let total: u64 = self.counts.iter().take(n_classes).sum();
        let denom = (total + n_classes as u64) as f64;
        (0..n_classes)
            .map(|c| (self.counts.get(c).copied().unwrap_or(0) + 1) as f64 / denom)
            .collect()
    }

    pub fn log_probs(&self, n_classes: usize) -> Vec<f64> {
        log_prob(&self.probabilities(n_classes))
    }

    /// Visão de coeficientes: só a linha do viés, com as log-probabilidades.
    pub fn coefficients(&self, n_classes: usize) -> BetaMatrix {
        let mut beta = BetaMatrix::new();
        if n_classes > 0 {
            beta.set_row(BIAS_ID, self.log_probs(n_classes));
        }
        beta
    }

    pub fn memory_estimate(&self) -> usize {
        self.counts.capacity() * std::mem::size_of::<u64>()
    }
}
