//! # Learner Complex — Documento de Troca
//!
//! Serializa uma [`Suite`] completa (discriminações, dicionário, priors e o estado
//! integral de cada learner) num documento JSON canônico, e reconstrói a suite a partir
//! dele.
//!
//! ## Garantias
//!
//! - **Ordem estável**: discriminações, classes, learners e blocos saem na ordem da
//!   suite; linhas de coeficientes em ordem de feature id. Reserializar um documento
//!   recém-lido produz os mesmos bytes.
//! - **Continuação exata**: o documento carrega o estado bruto de cada algoritmo (pares
//!   `p`/`n` e normalizadores do EG±, contagens do trivial), não só os pesos efetivos.
//!   Continuar o treino depois de ler é indistinguível de continuar no processo original.
//! - **Esquema comum**: todo bloco, de qualquer algoritmo, também grava sua matriz de
//!   coeficientes efetivos no mesmo formato (`matrix`), para comparações entre learners.
//!
//! Os floats passam pelo `serde_json` com `float_roundtrip`, então cada `f64` volta
//! exatamente ao mesmo valor.
//!
//! Uma variante "somente suite" grava apenas nome, modo e discriminações.

use serde::{Deserialize, Serialize};

use crate::beta::BetaMatrix;
use crate::config::{LearnerSpec, SuiteConfig};
use crate::error::{PlrmError, Result};
use crate::exponentiated::{EgBlock, EgState};
use crate::features::FeatureDictionary;
use crate::learner::{Learner, LearnerBlock};
use crate::priors::{Priors, PriorsDoc};
use crate::suite::Suite;
use crate::trivial::TrivialBlock;
use crate::truncated::TgBlock;

pub const COMPLEX_FORMAT: &str = "plrm-learner-complex";
pub const SUITE_FORMAT: &str = "plrm-suite";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminationDoc {
    pub name: String,
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_class: Option<String>,
}

/// Nome, modo e discriminações de uma suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteSection {
    pub name: String,
    #[serde(default)]
    pub config: SuiteConfig,
    pub discriminations: Vec<DiscriminationDoc>,
}

/// Documento "somente suite".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteDoc {
    pub format: String,
    pub version: u32,
    pub suite: SuiteSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub feature: usize,
    pub weights: Vec<f64>,
}

/// Estado bruto específico de cada algoritmo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockState {
    /// Os coeficientes em `matrix` já são o estado completo.
    Truncated,
    Exponentiated {
        positive: Vec<MatrixRow>,
        negative: Vec<MatrixRow>,
        base: Vec<f64>,
        stored_sum: Vec<f64>,
        stored_count: Vec<usize>,
    },
    Trivial {
        counts: Vec<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDoc {
    pub discrimination: String,
    pub matrix: Vec<MatrixRow>,
    pub state: BlockState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerDoc {
    pub name: String,
    pub spec: LearnerSpec,
    #[serde(default)]
    pub examples_absorbed: u64,
    pub blocks: Vec<BlockDoc>,
}

/// Documento completo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerComplex {
    pub format: String,
    pub version: u32,
    pub suite: SuiteSection,
    /// Nomes das features em ordem de id (a primeira é o viés).
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priors: Option<PriorsDoc>,
    pub learners: Vec<LearnerDoc>,
}

fn suite_section(suite: &Suite) -> SuiteSection {
    SuiteSection {
        name: suite.name().to_string(),
        config: *suite.config(),
        discriminations: suite
            .discriminations()
            .iter()
            .map(|d| DiscriminationDoc {
                name: d.name().to_string(),
                classes: d.classes().iter().map(|c| c.name().to_string()).collect(),
                default_class: d
                    .default_class()
                    .and_then(|c| d.class(c.pos))
                    .map(|c| c.name().to_string()),
            })
            .collect(),
    }
}

fn restore_section(section: &SuiteSection, dictionary: FeatureDictionary) -> Result<Suite> {
    let discriminations = section
        .discriminations
        .iter()
        .map(|d| (d.name.clone(), d.classes.clone(), d.default_class.clone()))
        .collect();
    Suite::restore(section.name.clone(), section.config, dictionary, discriminations)
}

fn check_header(format: &str, version: u32, expected: &str) -> Result<()> {
    if format != expected {
        return Err(PlrmError::MalformedDocument(format!(
            "formato '{format}', esperado '{expected}'"
        )));
    }
    if version != FORMAT_VERSION {
        return Err(PlrmError::MalformedDocument(format!(
            "versão {version} não suportada (esperada {FORMAT_VERSION})"
        )));
    }
    Ok(())
}

fn rows_of(beta: &BetaMatrix) -> Vec<MatrixRow> {
    beta.iter()
        .map(|(feature, weights)| MatrixRow {
            feature,
            weights: weights.to_vec(),
        })
        .collect()
}

fn beta_from_rows(rows: &[MatrixRow], n_classes: usize, feature_count: usize, dis: &str) -> Result<BetaMatrix> {
    let mut beta = BetaMatrix::new();
    let mut last: Option<usize> = None;
    for row in rows {
        if row.feature >= feature_count {
            return Err(PlrmError::UnknownFeatureId {
                id: row.feature,
                size: feature_count,
            });
        }
        if last.is_some_and(|l| row.feature <= l) {
            return Err(PlrmError::MalformedDocument(format!(
                "linhas fora de ordem no bloco '{dis}' (feature {})",
                row.feature
            )));
        }
        if row.weights.len() > n_classes {
            return Err(PlrmError::MalformedDocument(format!(
                "linha da feature {} com {} pesos no bloco '{dis}', que tem {n_classes} classes",
                row.feature,
                row.weights.len()
            )));
        }
        last = Some(row.feature);
        beta.set_row(row.feature, row.weights.clone());
    }
    Ok(beta)
}

impl LearnerComplex {
    pub fn from_suite(suite: &Suite) -> Self {
        let feature_count = suite.dictionary().len();
        let learners = suite
            .learners()
            .iter()
            .map(|learner| LearnerDoc {
                name: learner.name().to_string(),
                spec: *learner.spec(),
                examples_absorbed: learner.examples_absorbed(),
                blocks: learner
                    .blocks()
                    .iter()
                    .zip(suite.discriminations())
                    .map(|(block, dis)| BlockDoc {
                        discrimination: dis.name().to_string(),
                        matrix: rows_of(&block.coefficients(dis.class_count(), feature_count)),
                        state: match block {
                            LearnerBlock::Truncated(_) => BlockState::Truncated,
                            LearnerBlock::Exponentiated(b) => {
                                let state = b.state();
                                BlockState::Exponentiated {
                                    positive: rows_of(&state.positive),
                                    negative: rows_of(&state.negative),
                                    base: state.base,
                                    stored_sum: state.stored_sum,
                                    stored_count: state.stored_count,
                                }
                            }
                            LearnerBlock::Trivial(b) => BlockState::Trivial {
                                counts: b.counts().to_vec(),
                            },
                        },
                    })
                    .collect(),
            })
            .collect();

        Self {
            format: COMPLEX_FORMAT.to_string(),
            version: FORMAT_VERSION,
            suite: suite_section(suite),
            features: suite.dictionary().names().to_vec(),
            priors: suite.priors_doc(),
            learners,
        }
    }

    /// Reconstrói a suite, validando o documento inteiro.
    pub fn to_suite(&self) -> Result<Suite> {
        check_header(&self.format, self.version, COMPLEX_FORMAT)?;
        let dictionary = FeatureDictionary::from_names(&self.features)?;
        let mut suite = restore_section(&self.suite, dictionary)?;
        if let Some(doc) = &self.priors {
            let priors = Priors::from_doc(doc, &mut suite)?;
            if suite.dictionary().len() != self.features.len() {
                return Err(PlrmError::MalformedDocument(
                    "os priors citam features ausentes da lista de features".into(),
                ));
            }
            suite.set_priors(priors)?;
        }
        let regularized = suite.priors().is_some_and(Priors::is_regularizing);

        for doc in &self.learners {
            doc.spec.validate(regularized)?;
            let learner = restore_learner(doc, &suite)?;
            suite.push_learner(learner);
        }
        tracing::debug!(
            suite = %suite.name(),
            learners = suite.learners().len(),
            features = suite.dictionary().len(),
            "learner complex carregado"
        );
        Ok(suite)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

fn restore_learner(doc: &LearnerDoc, suite: &Suite) -> Result<Learner> {
    let discriminations = suite.discriminations();
    if doc.blocks.len() != discriminations.len() {
        return Err(PlrmError::MalformedDocument(format!(
            "learner '{}' com {} blocos para {} discriminações",
            doc.name,
            doc.blocks.len(),
            discriminations.len()
        )));
    }
    let feature_count = suite.dictionary().len();
    let mut blocks = Vec::with_capacity(doc.blocks.len());
    for (block, dis) in doc.blocks.iter().zip(discriminations) {
        if block.discrimination != dis.name() {
            return Err(PlrmError::MalformedDocument(format!(
                "learner '{}': bloco '{}' onde se esperava '{}'",
                doc.name,
                block.discrimination,
                dis.name()
            )));
        }
        let n = dis.class_count();
        let restored = match (&block.state, &doc.spec) {
            (BlockState::Truncated, LearnerSpec::TruncatedGradient(_)) => LearnerBlock::Truncated(
                TgBlock::from_beta(dis.id(), beta_from_rows(&block.matrix, n, feature_count, dis.name())?),
            ),
            (
                BlockState::Exponentiated {
                    positive,
                    negative,
                    base,
                    stored_sum,
                    stored_count,
                },
                LearnerSpec::ExponentiatedGradient(params),
            ) => {
                beta_from_rows(&block.matrix, n, feature_count, dis.name())?;
                if base.len() > n || stored_sum.len() != base.len() || stored_count.len() != base.len() {
                    return Err(PlrmError::MalformedDocument(format!(
                        "normalizadores inconsistentes no bloco '{}'",
                        dis.name()
                    )));
                }
                let state = EgState {
                    positive: beta_from_rows(positive, n, feature_count, dis.name())?,
                    negative: beta_from_rows(negative, n, feature_count, dis.name())?,
                    base: base.clone(),
                    stored_sum: stored_sum.clone(),
                    stored_count: stored_count.clone(),
                };
                LearnerBlock::Exponentiated(EgBlock::from_state(dis.id(), params.u, state))
            }
            (BlockState::Trivial { counts }, LearnerSpec::Trivial) => {
                if counts.len() > n {
                    return Err(PlrmError::MalformedDocument(format!(
                        "{} contagens no bloco '{}', que tem {n} classes",
                        counts.len(),
                        dis.name()
                    )));
                }
                LearnerBlock::Trivial(TrivialBlock::from_counts(dis.id(), counts.clone()))
            }
            (_, spec) => {
                return Err(PlrmError::MalformedDocument(format!(
                    "learner '{}' do tipo {} com estado de outro tipo no bloco '{}'",
                    doc.name,
                    spec.kind().name(),
                    dis.name()
                )))
            }
        };
        blocks.push(restored);
    }
    Learner::from_blocks(
        doc.name.clone(),
        doc.spec,
        suite.verbosity(),
        blocks,
        doc.examples_absorbed,
    )
}

impl SuiteDoc {
    pub fn from_suite(suite: &Suite) -> Self {
        Self {
            format: SUITE_FORMAT.to_string(),
            version: FORMAT_VERSION,
            suite: suite_section(suite),
        }
    }

    pub fn to_suite(&self) -> Result<Suite> {
        check_header(&self.format, self.version, SUITE_FORMAT)?;
        restore_section(&self.suite, FeatureDictionary::new())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Serializa a suite com todos os learners.
pub fn serialize_learner_complex(suite: &Suite) -> Result<String> {
    LearnerComplex::from_suite(suite).to_json()
}

pub fn deserialize_learner_complex(text: &str) -> Result<Suite> {
    LearnerComplex::from_json(text)?.to_suite()
}

/// Serializa apenas nome, modo e discriminações.
pub fn serialize_suite_only(suite: &Suite) -> Result<String> {
    SuiteDoc::from_suite(suite).to_json()
}

pub fn deserialize_suite_only(text: &str) -> Result<Suite> {
    SuiteDoc::from_json(text)?.to_suite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EgParams, SuiteMode};
    use crate::datapoint::DataPoint;
    use crate::dataset::{parse_dataset, tiny_docs, ParseOptions};

    fn trained() -> (Suite, Vec<DataPoint>) {
        let config = SuiteConfig {
            mode: SuiteMode { definitional: true },
            ..SuiteConfig::default()
        };
        let mut suite = Suite::new("tiny", config);
        let opts = ParseOptions::for_suite(&suite);
        let points = parse_dataset(&tiny_docs(), &mut suite, opts).unwrap().points;
        let kind = suite.discriminations()[0].id();
        suite.set_default_class(kind, Some("WIDGET")).unwrap();
        for spec in [
            LearnerSpec::default(),
            LearnerSpec::ExponentiatedGradient(EgParams::default()),
            LearnerSpec::Trivial,
        ] {
            let idx = suite.add_learner(spec).unwrap();
            suite.absorb_range(idx, &points, 0, points.len()).unwrap();
        }
        (suite, points)
    }

    #[test]
    fn test_reserialization_is_byte_identical() {
        let (suite, _) = trained();
        let first = serialize_learner_complex(&suite).unwrap();
        let restored = deserialize_learner_complex(&first).unwrap();
        let second = serialize_learner_complex(&restored).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            restored.discriminations()[0].default_class(),
            restored.discriminations()[0].find_class("WIDGET")
        );
    }

    #[test]
    fn test_suite_only_omits_learners() {
        let (suite, _) = trained();
        let text = serialize_suite_only(&suite).unwrap();
        assert!(!text.contains("learners"));
        let restored = deserialize_suite_only(&text).unwrap();
        assert_eq!(restored.learners().len(), 0);
        assert_eq!(restored.discriminations()[0].classes().len(), 2);
        // um documento somente-suite não é um learner complex
        assert!(deserialize_learner_complex(&text).is_err());
    }

    #[test]
    fn test_wrong_format_and_unknown_feature_rejected() {
        let (suite, _) = trained();
        let mut doc = LearnerComplex::from_suite(&suite);
        doc.format = "outro".into();
        assert!(matches!(doc.to_suite(), Err(PlrmError::MalformedDocument(_))));

        let mut doc = LearnerComplex::from_suite(&suite);
        doc.learners[0].blocks[0].matrix.push(MatrixRow {
            feature: 99,
            weights: vec![0.1],
        });
        assert!(matches!(doc.to_suite(), Err(PlrmError::UnknownFeatureId { id: 99, .. })));
    }

    #[test]
    fn test_block_order_must_match_discriminations() {
        let (mut suite, _) = trained();
        suite.add_discrimination("Outra").unwrap();
        let mut doc = LearnerComplex::from_suite(&suite);
        doc.learners[0].blocks.swap(0, 1);
        assert!(matches!(doc.to_suite(), Err(PlrmError::MalformedDocument(_))));
    }

    #[test]
    fn test_eg_with_huge_values_round_trips() {
        let mut suite = Suite::new("grande", SuiteConfig::default());
        let a = suite.resolve_label("K:A", true).unwrap();
        let b = suite.resolve_label("K:B", true).unwrap();
        let mut points = Vec::new();
        for (name, feature, class) in [("p1", "x", a), ("p2", "y", b)] {
            let mut p = DataPoint::from_named(name, &[(feature, 1e4)], suite.dictionary_mut()).unwrap();
            p.set_classes(vec![class], &suite).unwrap();
            points.push(p);
        }
        let idx = suite
            .add_learner(LearnerSpec::ExponentiatedGradient(EgParams::default()))
            .unwrap();
        for _ in 0..20 {
            suite.absorb_range(idx, &points, 0, points.len()).unwrap();
        }

        let first = serialize_learner_complex(&suite).unwrap();
        assert!(!first.contains("null"));
        let restored = deserialize_learner_complex(&first).unwrap();
        assert_eq!(serialize_learner_complex(&restored).unwrap(), first);
    }
}
