//! # Configuração da Suite e dos Learners
//!
//! Todos os hiper-parâmetros são structs serializáveis com `Default`, de modo que
//! o mesmo valor pode vir de código, de um arquivo TOML (servidor) ou de dentro
//! do learner complex.
//!
//! A verbosidade **não** é um estado global: um [`Verbosity`] é passado para cada
//! learner no momento da construção.

use serde::{Deserialize, Serialize};

use crate::error::{PlrmError, Result};

/// Nível de detalhe dos relatórios emitidos via `tracing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Apenas avisos.
    Quiet,
    /// Resumo por chamada de treino.
    #[default]
    Normal,
    /// Resumo por passada e por discriminação.
    Verbose,
}

/// Flags de modo da suite (fazem parte do documento trocado).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuiteMode {
    /// Se `true`, a leitura de datasets cria discriminações e classes desconhecidas.
    #[serde(default)]
    pub definitional: bool,
}

/// Configuração completa de uma [`crate::Suite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(default)]
    pub mode: SuiteMode,
    #[serde(default)]
    pub verbosity: Verbosity,
}

/// Modo de atualização do Truncated Gradient.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TgMode {
    /// Uma atualização por exemplo, na ordem fornecida.
    #[default]
    Online,
    /// Acumula o gradiente da chamada inteira e aplica uma única atualização.
    EmulateSd,
    /// Steepest descent em lote repetido até a melhora da log-verossimilhança ficar abaixo de `epsilon`.
    AdaptiveSd {
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default = "default_max_iterations")]
        max_iterations: usize,
    },
}

fn default_epsilon() -> f64 {
    1e-6
}

fn default_max_iterations() -> usize {
    1000
}

impl TgMode {
    pub fn adaptive() -> Self {
        TgMode::AdaptiveSd {
            epsilon: default_epsilon(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Hiper-parâmetros do Truncated Gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TgParams {
    /// Taxa de aprendizado ($\eta$).
    pub eta: f64,
    /// Força da truncagem ($\theta$). Zero degenera em SGD puro.
    pub theta: f64,
    pub mode: TgMode,
}

impl Default for TgParams {
    fn default() -> Self {
        Self {
            eta: 0.01,
            theta: 0.0,
            mode: TgMode::Online,
        }
    }
}

/// Hiper-parâmetros do Exponentiated Gradient (EG±).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EgParams {
    /// Taxa de aprendizado ($\eta$).
    pub eta: f64,
    /// Orçamento total de peso ($U$): cada peso efetivo fica em $[-U, U]$.
    pub u: f64,
}

impl Default for EgParams {
    fn default() -> Self {
        Self { eta: 0.05, u: 10.0 }
    }
}

/// Variante de learner, sem parâmetros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerKind {
    TruncatedGradient,
    ExponentiatedGradient,
    Trivial,
}

impl LearnerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LearnerKind::TruncatedGradient => "truncated-gradient",
            LearnerKind::ExponentiatedGradient => "exponentiated-gradient",
            LearnerKind::Trivial => "trivial",
        }
    }

    /// Modelos PLRM expõem uma matriz de coeficientes própria.
    pub fn is_plrm(&self) -> bool {
        !matches!(self, LearnerKind::Trivial)
    }
}

/// Especificação de um learner: tipo + hiper-parâmetros.
///
/// É o que se passa para [`crate::Suite::add_learner`] e o que é gravado no learner complex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LearnerSpec {
    TruncatedGradient(TgParams),
    ExponentiatedGradient(EgParams),
    Trivial,
}

impl Default for LearnerSpec {
    fn default() -> Self {
        LearnerSpec::TruncatedGradient(TgParams::default())
    }
}

impl LearnerSpec {
    /// Resolve um nome de tipo (como escrito numa linha de comando) com parâmetros padrão.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "tg" | "truncated-gradient" | "truncated_gradient" => {
                Ok(LearnerSpec::TruncatedGradient(TgParams::default()))
            }
            "eg" | "exponentiated-gradient" | "exponentiated_gradient" => {
                Ok(LearnerSpec::ExponentiatedGradient(EgParams::default()))
            }
            "trivial" => Ok(LearnerSpec::Trivial),
            _ => Err(PlrmError::UnknownLearner { name: name.to_string() }),
        }
    }

    pub fn kind(&self) -> LearnerKind {
        match self {
            LearnerSpec::TruncatedGradient(_) => LearnerKind::TruncatedGradient,
            LearnerSpec::ExponentiatedGradient(_) => LearnerKind::ExponentiatedGradient,
            LearnerSpec::Trivial => LearnerKind::Trivial,
        }
    }

    /// `true` quando o learner roda o steepest descent adaptativo.
    pub fn is_adaptive_sd(&self) -> bool {
        matches!(
            self,
            LearnerSpec::TruncatedGradient(TgParams {
                mode: TgMode::AdaptiveSd { .. },
                ..
            })
        )
    }

    /// Valida os parâmetros. `regularized` indica se a suite tem priors que regularizam.
    ///
    /// Chamado ao anexar o learner e antes de cada treino, para falhar antes de tocar nos pesos.
    pub fn validate(&self, regularized: bool) -> Result<()> {
        match self {
            LearnerSpec::TruncatedGradient(p) => {
                positive("eta", p.eta)?;
                if !(p.theta >= 0.0 && p.theta.is_finite()) {
                    return Err(PlrmError::InvalidParameter {
                        name: "theta".into(),
                        value: p.theta,
                    });
                }
                if let TgMode::AdaptiveSd { epsilon, .. } = p.mode {
                    positive("epsilon", epsilon)?;
                    if p.theta > 0.0 {
                        return Err(PlrmError::IncompatibleOptions(format!(
                            "steepest descent adaptativo não admite truncagem (theta = {})",
                            p.theta
                        )));
                    }
                    if regularized {
                        return Err(PlrmError::IncompatibleOptions(
                            "steepest descent adaptativo não admite priors de regularização".into(),
                        ));
                    }
                }
                Ok(())
            }
            LearnerSpec::ExponentiatedGradient(p) => {
                positive("eta", p.eta)?;
                positive("u", p.u)
            }
            LearnerSpec::Trivial => Ok(()),
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(PlrmError::InvalidParameter {
            name: name.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(LearnerSpec::from_name("tg").unwrap().kind(), LearnerKind::TruncatedGradient);
        assert_eq!(LearnerSpec::from_name("EG").unwrap().kind(), LearnerKind::ExponentiatedGradient);
        assert_eq!(LearnerSpec::from_name("trivial").unwrap().kind(), LearnerKind::Trivial);
        assert!(matches!(
            LearnerSpec::from_name("svm"),
            Err(PlrmError::UnknownLearner { .. })
        ));
    }

    #[test]
    fn test_adaptive_rejects_truncation_and_priors() {
        let spec = LearnerSpec::TruncatedGradient(TgParams {
            theta: 0.1,
            mode: TgMode::adaptive(),
            ..TgParams::default()
        });
        assert!(matches!(spec.validate(false), Err(PlrmError::IncompatibleOptions(_))));

        let spec = LearnerSpec::TruncatedGradient(TgParams {
            mode: TgMode::adaptive(),
            ..TgParams::default()
        });
        assert!(spec.validate(false).is_ok());
        assert!(matches!(spec.validate(true), Err(PlrmError::IncompatibleOptions(_))));
    }

    #[test]
    fn test_invalid_eta() {
        let spec = LearnerSpec::ExponentiatedGradient(EgParams { eta: 0.0, u: 1.0 });
        assert!(matches!(spec.validate(false), Err(PlrmError::InvalidParameter { .. })));
    }

    #[test]
    fn test_spec_json_shape() {
        let json = r#"{"type":"truncated_gradient","eta":0.5,"mode":{"kind":"adaptive_sd"}}"#;
        let spec: LearnerSpec = serde_json::from_str(json).unwrap();
        match spec {
            LearnerSpec::TruncatedGradient(p) => {
                assert_eq!(p.eta, 0.5);
                assert_eq!(p.theta, 0.0);
                assert_eq!(p.mode, TgMode::adaptive());
            }
            other => panic!("spec inesperada: {other:?}"),
        }
    }
}
