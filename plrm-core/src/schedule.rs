//! # Agenda de Treino
//!
//! Os algoritmos online dependem da ordem dos exemplos. A agenda torna essa ordem
//! explícita e reprodutível:
//!
//! - **Cíclica**: `start, start+1, ..., n-1, 0, ..., start-1`, igual em toda passada.
//! - **Aleatória**: uma permutação nova por passada, tirada de um gerador com semente
//!   fixa. A mesma semente reproduz a mesma sequência de permutações.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::LearnerSpec;
use crate::error::{PlrmError, Result};
use crate::learner::SdTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExampleOrder {
    Cyclic {
        #[serde(default)]
        start: usize,
    },
    Random {
        seed: u64,
    },
}

impl Default for ExampleOrder {
    fn default() -> Self {
        ExampleOrder::Cyclic { start: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub order: ExampleOrder,
    #[serde(default = "default_passes")]
    pub passes: usize,
}

fn default_passes() -> usize {
    1
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            order: ExampleOrder::default(),
            passes: default_passes(),
        }
    }
}

impl Schedule {
    pub fn cyclic(passes: usize) -> Self {
        Self {
            order: ExampleOrder::Cyclic { start: 0 },
            passes,
        }
    }

    pub fn random(seed: u64, passes: usize) -> Self {
        Self {
            order: ExampleOrder::Random { seed },
            passes,
        }
    }

    /// Rejeita combinações inválidas antes de qualquer treino.
    pub fn validate(&self, spec: &LearnerSpec) -> Result<()> {
        if self.passes == 0 {
            return Err(PlrmError::InvalidParameter {
                name: "passes".into(),
                value: 0.0,
            });
        }
        if matches!(self.order, ExampleOrder::Random { .. }) && spec.is_adaptive_sd() {
            return Err(PlrmError::IncompatibleOptions(
                "steepest descent adaptativo não admite ordem aleatória".into(),
            ));
        }
        Ok(())
    }

    /// Índices dos exemplos para cada passada.
    pub fn orders(&self, n: usize) -> Vec<Vec<usize>> {
        match self.order {
            ExampleOrder::Cyclic { start } => {
                let order: Vec<usize> = (0..n).map(|i| (start + i) % n.max(1)).collect();
                vec![order; self.passes]
            }
            ExampleOrder::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                (0..self.passes)
                    .map(|_| {
                        let mut order: Vec<usize> = (0..n).collect();
                        order.shuffle(&mut rng);
                        order
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass: usize,
    pub examples: usize,
    pub skipped_labels: usize,
    pub log_likelihood: f64,
}

/// Resultado de [`crate::Suite::train`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub passes: Vec<PassReport>,
    pub sd_traces: Vec<SdTrace>,
}

impl TrainingReport {
    pub fn final_log_likelihood(&self) -> Option<f64> {
        self.passes.last().map(|p| p.log_likelihood)
    }
}
