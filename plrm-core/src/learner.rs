//! # Learner e Blocos por Discriminação
//!
//! Um [`Learner`] é um algoritmo de treino configurado (uma [`LearnerSpec`]) mais um
//! bloco de estado por discriminação da suite, na mesma ordem das discriminações.
//! Os blocos são independentes: a discriminação "Cor" não influencia os pesos de "Forma".
//!
//! ```text
//! Learner (spec, verbosity)
//!   ├── bloco[0]  ── Discrimination 0 (n0 classes)
//!   ├── bloco[1]  ── Discrimination 1 (n1 classes)
//!   └── ...
//! ```
//!
//! O [`LearnerBlock`] é um enum fechado com uma variante por algoritmo. Todas expõem a
//! mesma visão de coeficientes (uma [`BetaMatrix`]), usada na serialização comum.

use serde::{Deserialize, Serialize};

use crate::beta::BetaMatrix;
use crate::config::{LearnerKind, LearnerSpec, TgMode, Verbosity};
use crate::datapoint::DataPoint;
use crate::error::{PlrmError, Result};
use crate::exponentiated::EgBlock;
use crate::priors::{PriorTerm, Priors};
use crate::suite::{DisId, Discrimination};
use crate::trivial::TrivialBlock;
use crate::truncated::TgBlock;

/// Visão somente leitura da suite durante treino e scoring.
pub struct TrainContext<'a> {
    pub discriminations: &'a [Discrimination],
    pub priors: Option<&'a Priors>,
    /// Tamanho atual do dicionário de features.
    pub feature_count: usize,
}

impl TrainContext<'_> {
    pub fn class_offset(&self, did: usize) -> usize {
        self.discriminations[..did]
            .iter()
            .map(Discrimination::class_count)
            .sum()
    }

    /// Prior do coeficiente `(feature, classe local)` da discriminação cujo offset global é `offset`.
    pub fn prior(&self, feature: usize, offset: usize, class: usize) -> PriorTerm {
        self.priors
            .map(|p| p.term(feature, offset + class))
            .unwrap_or_default()
    }
}

/// Trajetória do steepest descent adaptativo numa discriminação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdTrace {
    pub discrimination: DisId,
    /// Log-verossimilhança inicial seguida de um valor por passo aceito (não decrescente).
    pub log_likelihoods: Vec<f64>,
    pub converged: bool,
    pub final_eta: f64,
}

/// Resumo de uma chamada de absorção.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbsorbStats {
    pub examples: usize,
    /// Pares (exemplo, discriminação) sem classe verdadeira, ignorados no treino.
    pub skipped_labels: usize,
    pub sd_traces: Vec<SdTrace>,
}

/// Estado de uma discriminação dentro de um learner.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnerBlock {
    Truncated(TgBlock),
    Exponentiated(EgBlock),
    Trivial(TrivialBlock),
}

impl LearnerBlock {
    fn empty(spec: &LearnerSpec, dis: DisId) -> Self {
        match spec {
            LearnerSpec::TruncatedGradient(_) => LearnerBlock::Truncated(TgBlock::new(dis)),
            LearnerSpec::ExponentiatedGradient(p) => LearnerBlock::Exponentiated(EgBlock::new(dis, p.u)),
            LearnerSpec::Trivial => LearnerBlock::Trivial(TrivialBlock::new(dis)),
        }
    }

    pub fn dis(&self) -> DisId {
        match self {
            LearnerBlock::Truncated(b) => b.dis(),
            LearnerBlock::Exponentiated(b) => b.dis(),
            LearnerBlock::Trivial(b) => b.dis(),
        }
    }

    pub fn kind(&self) -> LearnerKind {
        match self {
            LearnerBlock::Truncated(_) => LearnerKind::TruncatedGradient,
            LearnerBlock::Exponentiated(_) => LearnerKind::ExponentiatedGradient,
            LearnerBlock::Trivial(_) => LearnerKind::Trivial,
        }
    }

    /// Log-probabilidades das `n_classes` classes para as features `point`.
    pub fn log_probs(&self, point: &DataPoint, n_classes: usize, feature_count: usize) -> Vec<f64> {
        match self {
            LearnerBlock::Truncated(b) => b.log_probs(point.features(), n_classes),
            LearnerBlock::Exponentiated(b) => b.log_probs(point.features(), n_classes, feature_count),
            LearnerBlock::Trivial(b) => b.log_probs(n_classes),
        }
    }

    /// Coeficientes efetivos no formato comum.
    pub fn coefficients(&self, n_classes: usize, feature_count: usize) -> BetaMatrix {
        match self {
            LearnerBlock::Truncated(b) => b.beta().clone(),
            LearnerBlock::Exponentiated(b) => b.effective_beta(n_classes, feature_count),
            LearnerBlock::Trivial(b) => b.coefficients(n_classes),
        }
    }

    pub fn memory_estimate(&self) -> usize {
        let own = std::mem::size_of::<LearnerBlock>();
        own + match self {
            LearnerBlock::Truncated(b) => b.beta().memory_estimate(),
            LearnerBlock::Exponentiated(b) => b.memory_estimate(),
            LearnerBlock::Trivial(b) => b.memory_estimate(),
        }
    }
}

/// Algoritmo configurado mais um bloco por discriminação.
#[derive(Debug, Clone, PartialEq)]
pub struct Learner {
    name: String,
    spec: LearnerSpec,
    verbosity: Verbosity,
    blocks: Vec<LearnerBlock>,
    examples_absorbed: u64,
}

impl Learner {
    pub(crate) fn new(name: &str, spec: LearnerSpec, verbosity: Verbosity, dis_ids: &[DisId]) -> Self {
        Self {
            name: name.to_string(),
            spec,
            verbosity,
            blocks: dis_ids.iter().map(|id| LearnerBlock::empty(&spec, *id)).collect(),
            examples_absorbed: 0,
        }
    }

    /// Reconstrói um learner a partir de blocos já carregados (learner complex).
    pub(crate) fn from_blocks(
        name: String,
        spec: LearnerSpec,
        verbosity: Verbosity,
        blocks: Vec<LearnerBlock>,
        examples_absorbed: u64,
    ) -> Result<Self> {
        if let Some(bad) = blocks.iter().find(|b| b.kind() != spec.kind()) {
            return Err(PlrmError::MalformedDocument(format!(
                "learner '{name}' do tipo {} com bloco do tipo {}",
                spec.kind().name(),
                bad.kind().name()
            )));
        }
        Ok(Self {
            name,
            spec,
            verbosity,
            blocks,
            examples_absorbed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &LearnerSpec {
        &self.spec
    }

    pub fn kind(&self) -> LearnerKind {
        self.spec.kind()
    }

    pub fn blocks(&self) -> &[LearnerBlock] {
        &self.blocks
    }

    pub fn examples_absorbed(&self) -> u64 {
        self.examples_absorbed
    }

    pub fn find_block_for_dis(&self, dis: DisId) -> Option<&LearnerBlock> {
        self.blocks.iter().find(|b| b.dis() == dis)
    }

    pub(crate) fn push_block(&mut self, dis: DisId) {
        self.blocks.push(LearnerBlock::empty(&self.spec, dis));
    }

    pub(crate) fn remove_block(&mut self, did: usize) {
        if did < self.blocks.len() {
            self.blocks.remove(did);
        }
    }

    /// Treina com `points` numa única chamada, na ordem dada.
    ///
    /// Exemplos sem classe verdadeira numa discriminação são pulados naquela discriminação
    /// e contados em [`AbsorbStats::skipped_labels`].
    pub fn absorb(&mut self, ctx: &TrainContext<'_>, points: &[&DataPoint]) -> Result<AbsorbStats> {
        let regularized = ctx.priors.is_some_and(Priors::is_regularizing);
        self.spec.validate(regularized)?;

        let mut stats = AbsorbStats {
            examples: points.len(),
            ..AbsorbStats::default()
        };
        let spec = self.spec;
        for (did, block) in self.blocks.iter_mut().enumerate() {
            let dis = &ctx.discriminations[did];
            let skipped = match (block, spec) {
                (LearnerBlock::Truncated(b), LearnerSpec::TruncatedGradient(params)) => match params.mode {
                    TgMode::Online => b.absorb_online(&params, ctx, did, points),
                    TgMode::EmulateSd => b.absorb_batch(&params, ctx, did, points),
                    TgMode::AdaptiveSd { epsilon, max_iterations } => {
                        let (skipped, trace) = b.absorb_adaptive(params.eta, epsilon, max_iterations, dis, points);
                        if self.verbosity >= Verbosity::Verbose {
                            tracing::info!(
                                learner = %self.name,
                                discrimination = dis.name(),
                                steps = trace.log_likelihoods.len() - 1,
                                converged = trace.converged,
                                "steepest descent concluído"
                            );
                        }
                        stats.sd_traces.push(trace);
                        skipped
                    }
                },
                (LearnerBlock::Exponentiated(b), LearnerSpec::ExponentiatedGradient(params)) => {
                    b.absorb(&params, ctx.feature_count, dis, points)
                }
                (LearnerBlock::Trivial(b), LearnerSpec::Trivial) => b.absorb(dis, points),
                (block, spec) => {
                    return Err(PlrmError::MalformedDocument(format!(
                        "bloco {} num learner {}",
                        block.kind().name(),
                        spec.kind().name()
                    )))
                }
            };
            stats.skipped_labels += skipped;
        }
        self.examples_absorbed += points.len() as u64;

        match self.verbosity {
            Verbosity::Quiet => {}
            Verbosity::Normal => tracing::debug!(
                learner = %self.name,
                examples = stats.examples,
                skipped = stats.skipped_labels,
                "exemplos absorvidos"
            ),
            Verbosity::Verbose => tracing::info!(
                learner = %self.name,
                examples = stats.examples,
                skipped = stats.skipped_labels,
                total = self.examples_absorbed,
                "exemplos absorvidos"
            ),
        }
        Ok(stats)
    }

    /// Log-probabilidades de `point`, um vetor por discriminação.
    ///
    /// Discriminações sem classes produzem vetor vazio.
    pub fn apply_model_log(&self, ctx: &TrainContext<'_>, point: &DataPoint) -> Vec<Vec<f64>> {
        self.blocks
            .iter()
            .zip(ctx.discriminations)
            .map(|(block, dis)| block.log_probs(point, dis.class_count(), ctx.feature_count))
            .collect()
    }

    pub fn memory_estimate(&self) -> usize {
        std::mem::size_of::<Learner>()
            + self.name.capacity()
            + self.blocks.iter().map(LearnerBlock::memory_estimate).sum::<usize>()
    }
}
