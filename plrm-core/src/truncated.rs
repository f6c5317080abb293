//! # Truncated Gradient — Regressão Logística Online com Esparsificação
//!
//! Bloco aditivo: cada exemplo faz um passo de gradiente estocástico sobre a
//! log-verossimilhança negativa e, em seguida, **trunca** os pesos em direção à moda do
//! prior (zero, sem priors).
//!
//! ## Passo por exemplo
//!
//! ```text
//! s_c = w_c · x                      (scores lineares)
//! p   = softmax(s)                   (com subtração do máximo)
//! g_c = (p_c − 1{c = verdade}) · x   (gradiente da NLL)
//! w_c ← w_c − η · (g_c + l2 · (w_c − μ))
//! w_c ← trunc(w_c, η · (θ + l1))     (encolhe em direção a μ, sem cruzar)
//! ```
//!
//! ## Truncagem preguiçosa
//!
//! Truncar todas as linhas a cada exemplo custaria O(features × classes) por passo.
//! Como um peso que não recebe gradiente só sofre truncagens, e truncagens consecutivas
//! se somam (até encostar na moda), guardamos para cada feature o último passo em que
//! ela foi atualizada e aplicamos as truncagens pendentes de uma vez: antes de a feature
//! participar de um score e no fim de cada chamada. O resultado é idêntico à versão
//! que trunca tudo a cada passo.
//!
//! A linha da feature de viés não é truncada por θ.

use std::collections::{BTreeMap, HashMap};

use crate::beta::BetaMatrix;
use crate::config::TgParams;
use crate::datapoint::DataPoint;
use crate::features::{SparseVector, BIAS_ID};
use crate::learner::{SdTrace, TrainContext};
use crate::scores::{log_softmax, softmax};
use crate::suite::{DisId, Discrimination};

/// Multiplicador do passo após uma iteração aceita do steepest descent.
const STEP_GROWTH: f64 = 1.5;
/// Multiplicador do passo após uma iteração rejeitada.
const STEP_SHRINK: f64 = 0.5;
/// Abaixo deste passo a busca é considerada convergida.
const MIN_STEP: f64 = 1e-12;

/// Encolhe `w` em direção a `mode` por `amount` a cada um dos `times` passos, sem cruzar.
pub fn truncate(w: f64, mode: f64, amount: f64, times: u64) -> f64 {
    if amount <= 0.0 || times == 0 {
        return w;
    }
    let total = amount * times as f64;
    if w > mode {
        (w - total).max(mode)
    } else if w < mode {
        (w + total).min(mode)
    } else {
        w
    }
}

/// Bloco Truncated Gradient de uma discriminação.
#[derive(Debug, Clone, PartialEq)]
pub struct TgBlock {
    dis: DisId,
    beta: BetaMatrix,
}

/// Parâmetros de encolhimento resolvidos para uma chamada de treino.
struct Shrink<'a, 'c> {
    eta: f64,
    theta: f64,
    ctx: &'a TrainContext<'c>,
    offset: usize,
}

impl Shrink<'_, '_> {
    /// (moda, l2, quantidade truncada por passo) do coeficiente `(feature, classe)`.
    fn term(&self, feature: usize, class: usize) -> (f64, f64, f64) {
        let prior = self.ctx.prior(feature, self.offset, class);
        let theta = if feature == BIAS_ID { 0.0 } else { self.theta };
        (prior.mode, prior.l2, self.eta * (theta + prior.l1))
    }
}

impl TgBlock {
    pub fn new(dis: DisId) -> Self {
        Self {
            dis,
            beta: BetaMatrix::new(),
        }
    }

    pub fn from_beta(dis: DisId, beta: BetaMatrix) -> Self {
        Self { dis, beta }
    }

    pub fn dis(&self) -> DisId {
        self.dis
    }

    pub fn beta(&self) -> &BetaMatrix {
        &self.beta
    }

    pub fn log_probs(&self, x: &SparseVector, n_classes: usize) -> Vec<f64> {
        log_softmax(&self.beta.scores(x, n_classes))
    }

    fn truncate_row(&mut self, feature: usize, times: u64, shrink: &Shrink<'_, '_>) {
        if times == 0 {
            return;
        }
        if let Some(row) = self.beta.get_row_mut(feature) {
            for (c, w) in row.iter_mut().enumerate() {
                let (mode, _, amount) = shrink.term(feature, c);
                *w = truncate(*w, mode, amount, times);
            }
        }
    }

    /// Modo online: um passo por exemplo, na ordem de `points`. Devolve quantos exemplos
    /// ficaram sem classe verdadeira.
    pub(crate) fn absorb_online(
        &mut self,
        params: &TgParams,
        ctx: &TrainContext<'_>,
        did: usize,
        points: &[&DataPoint],
    ) -> usize {
        let dis = &ctx.discriminations[did];
        let n = dis.class_count();
        if n == 0 {
            return 0;
        }
        let shrink = Shrink {
            eta: params.eta,
            theta: params.theta,
            ctx,
            offset: ctx.class_offset(did),
        };
        // passo após o qual a feature está em dia com as truncagens
        let mut synced: HashMap<usize, u64> = HashMap::new();
        let mut step: u64 = 0;
        let mut skipped = 0;

        for point in points {
            let Some(truth) = point.class_in(dis) else {
                skipped += 1;
                continue;
            };
            let x = point.features();

            for (f, _) in x.iter() {
                let pending = step - synced.get(&f).copied().unwrap_or(0);
                self.truncate_row(f, pending, &shrink);
            }

            let probs = softmax(&self.beta.scores(x, n));

            for (f, v) in x.iter() {
                let row = self.beta.row_mut(f, n);
                for (c, (w, p)) in row.iter_mut().zip(&probs).enumerate() {
                    let (mode, l2, _) = shrink.term(f, c);
                    let indicator = if c == truth { 1.0 } else { 0.0 };
                    let grad = (p - indicator) * v + l2 * (*w - mode);
                    *w -= params.eta * grad;
                }
                self.truncate_row(f, 1, &shrink);
                synced.insert(f, step + 1);
            }
            step += 1;
        }

        for f in self.beta.feature_ids() {
            let pending = step - synced.get(&f).copied().unwrap_or(0);
            self.truncate_row(f, pending, &shrink);
        }
        self.beta.prune_zero_rows();
        skipped
    }

    /// Modo "emulate SD": acumula o gradiente de todos os exemplos com os pesos fixos e
    /// aplica uma única atualização seguida de uma truncagem.
    pub(crate) fn absorb_batch(
        &mut self,
        params: &TgParams,
        ctx: &TrainContext<'_>,
        did: usize,
        points: &[&DataPoint],
    ) -> usize {
        let dis = &ctx.discriminations[did];
        let n = dis.class_count();
        if n == 0 {
            return 0;
        }
        let shrink = Shrink {
            eta: params.eta,
            theta: params.theta,
            ctx,
            offset: ctx.class_offset(did),
        };
        let (used, skipped) = labeled(dis, points);
        if used.is_empty() {
            return skipped;
        }
        let grad = nll_gradient(&self.beta, &used, n);
        for (f, g) in &grad {
            let row = self.beta.row_mut(*f, n);
            for (c, (w, gc)) in row.iter_mut().zip(g).enumerate() {
                let (mode, l2, _) = shrink.term(*f, c);
                *w -= params.eta * (gc + l2 * (*w - mode));
            }
        }
        for f in self.beta.feature_ids() {
            self.truncate_row(f, 1, &shrink);
        }
        self.beta.prune_zero_rows();
        skipped
    }

    /// Steepest descent adaptativo sobre o lote inteiro.
    ///
    /// Cada iteração calcula o gradiente completo e tenta um passo; se a
    /// log-verossimilhança não piora o passo é aceito e η cresce, senão η cai pela metade
    /// e o passo é refeito. Para quando a melhora aceita fica abaixo de `epsilon`, quando η
    /// se torna desprezível ou após `max_iterations` iterações.
    pub(crate) fn absorb_adaptive(
        &mut self,
        eta: f64,
        epsilon: f64,
        max_iterations: usize,
        dis: &Discrimination,
        points: &[&DataPoint],
    ) -> (usize, SdTrace) {
        let n = dis.class_count();
        let (used, skipped) = if n == 0 { (Vec::new(), 0) } else { labeled(dis, points) };
        let mut eta = eta;
        let mut ll = log_likelihood(&self.beta, &used, n);
        let mut trace = vec![ll];
        let mut converged = used.is_empty();

        if !converged {
            'outer: for _ in 0..max_iterations {
                let grad = nll_gradient(&self.beta, &used, n);
                if grad.values().flatten().all(|g| *g == 0.0) {
                    converged = true;
                    break;
                }
                loop {
                    let mut candidate = self.beta.clone();
                    for (f, g) in &grad {
                        let row = candidate.row_mut(*f, n);
                        for (w, gc) in row.iter_mut().zip(g) {
                            *w -= eta * gc;
                        }
                    }
                    let candidate_ll = log_likelihood(&candidate, &used, n);
                    if candidate_ll >= ll {
                        let improvement = candidate_ll - ll;
                        self.beta = candidate;
                        ll = candidate_ll;
                        trace.push(ll);
                        eta *= STEP_GROWTH;
                        if improvement < epsilon {
                            converged = true;
                            break 'outer;
                        }
                        break;
                    }
                    eta *= STEP_SHRINK;
                    if eta < MIN_STEP {
                        converged = true;
                        break 'outer;
                    }
                }
            }
        }
        self.beta.prune_zero_rows();
        tracing::debug!(
            discrimination = dis.name(),
            iterations = trace.len() - 1,
            log_likelihood = ll,
            converged,
            "steepest descent"
        );
        (
            skipped,
            SdTrace {
                discrimination: dis.id(),
                log_likelihoods: trace,
                converged,
                final_eta: eta,
            },
        )
    }
}

/// Separa os exemplos com classe verdadeira em `dis` e conta os demais.
fn labeled<'p>(dis: &Discrimination, points: &[&'p DataPoint]) -> (Vec<(&'p SparseVector, usize)>, usize) {
    let mut used = Vec::with_capacity(points.len());
    let mut skipped = 0;
    for point in points {
        match point.class_in(dis) {
            Some(truth) => used.push((point.features(), truth)),
            None => skipped += 1,
        }
    }
    (used, skipped)
}

/// Gradiente da log-verossimilhança negativa somado sobre o lote.
fn nll_gradient(beta: &BetaMatrix, used: &[(&SparseVector, usize)], n: usize) -> BTreeMap<usize, Vec<f64>> {
    let mut grad: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for (x, truth) in used {
        let probs = softmax(&beta.scores(x, n));
        for (f, v) in x.iter() {
            let g = grad.entry(f).or_insert_with(|| vec![0.0; n]);
            for (c, (gc, p)) in g.iter_mut().zip(&probs).enumerate() {
                let indicator = if c == *truth { 1.0 } else { 0.0 };
                *gc += (p - indicator) * v;
            }
        }
    }
    grad
}

fn log_likelihood(beta: &BetaMatrix, used: &[(&SparseVector, usize)], n: usize) -> f64 {
    used.iter()
        .map(|(x, truth)| log_softmax(&beta.scores(x, n))[*truth])
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SuiteConfig, TgMode};
    use crate::priors::{PriorTerm, Priors};
    use crate::suite::Suite;

    fn setup() -> (Suite, Vec<DataPoint>) {
        let mut suite = Suite::new("t", SuiteConfig::default());
        let sim = suite.resolve_label("Spam:Sim", true).unwrap();
        let nao = suite.resolve_label("Spam:Nao", true).unwrap();
        let raw: [(&str, &[(&str, f64)], _); 4] = [
            ("a", &[("oferta", 1.0), ("gratis", 1.0)], sim),
            ("b", &[("reuniao", 1.0)], nao),
            ("c", &[("gratis", 1.0), ("raro", 0.5)], sim),
            ("d", &[("reuniao", 1.0), ("ata", 1.0)], nao),
        ];
        let mut points = Vec::new();
        for (name, feats, class) in raw {
            let mut p = DataPoint::from_named(name, feats, suite.dictionary_mut()).unwrap();
            p.set_classes(vec![class], &suite).unwrap();
            points.push(p);
        }
        (suite, points)
    }

    fn ctx(suite: &Suite) -> TrainContext<'_> {
        TrainContext {
            discriminations: suite.discriminations(),
            priors: suite.priors(),
            feature_count: suite.dictionary().len(),
        }
    }

    #[test]
    fn test_truncate_never_crosses_mode() {
        assert_eq!(truncate(0.3, 0.0, 0.1, 5), 0.0);
        assert_eq!(truncate(-0.3, 0.0, 0.1, 1), -0.3 + 0.1);
        assert_eq!(truncate(2.0, 1.5, 0.2, 10), 1.5);
        assert_eq!(truncate(0.7, 0.0, 0.0, 10), 0.7);
    }

    #[test]
    fn test_lazy_truncation_matches_eager() {
        let (suite, points) = setup();
        let refs: Vec<&DataPoint> = points.iter().collect();
        let params = TgParams {
            eta: 0.3,
            theta: 0.05,
            mode: TgMode::Online,
        };
        let ctx = ctx(&suite);

        let mut lazy = TgBlock::new(suite.discriminations()[0].id());
        lazy.absorb_online(&params, &ctx, 0, &refs);

        // Versão ansiosa: uma chamada por exemplo trunca todas as linhas ao fim de cada passo.
        let mut eager = TgBlock::new(suite.discriminations()[0].id());
        for p in &refs {
            eager.absorb_online(&params, &ctx, 0, &[*p]);
        }
        for (f, row) in lazy.beta().iter() {
            for (c, w) in row.iter().enumerate() {
                assert!((w - eager.beta().get(f, c)).abs() < 1e-12, "feature {f} classe {c}");
            }
        }
    }

    #[test]
    fn test_truncation_produces_exact_zeros() {
        let (suite, points) = setup();
        let refs: Vec<&DataPoint> = points.iter().collect();
        let params = TgParams {
            eta: 0.1,
            theta: 5.0,
            mode: TgMode::Online,
        };
        let mut block = TgBlock::new(suite.discriminations()[0].id());
        block.absorb_online(&params, &ctx(&suite), 0, &refs);
        // Só a linha do viés sobrevive a um θ tão forte.
        assert_eq!(block.beta().feature_ids(), vec![BIAS_ID]);
    }

    #[test]
    fn test_l2_prior_pulls_toward_mode() {
        let (mut suite, points) = setup();
        let refs: Vec<&DataPoint> = points.iter().collect();
        let oferta = suite.dictionary().id("oferta").unwrap();
        let mut priors = Priors::new(suite.total_classes());
        priors.set_feature(oferta, PriorTerm { mode: 3.0, l1: 0.0, l2: 1.0 });
        suite.set_priors(priors).unwrap();

        let params = TgParams::default();
        let mut block = TgBlock::new(suite.discriminations()[0].id());
        for _ in 0..50 {
            block.absorb_online(&params, &ctx(&suite), 0, &refs);
        }
        assert!(block.beta().get(oferta, 0) > 0.5);
        assert!(block.beta().get(oferta, 1) > 0.5);
    }

    #[test]
    fn test_adaptive_trace_is_monotone() {
        let (suite, points) = setup();
        let refs: Vec<&DataPoint> = points.iter().collect();
        let dis = &suite.discriminations()[0];
        let mut block = TgBlock::new(dis.id());
        let (skipped, trace) = block.absorb_adaptive(0.5, 1e-6, 200, dis, &refs);
        assert_eq!(skipped, 0);
        assert!(trace.log_likelihoods.len() > 1);
        for w in trace.log_likelihoods.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert!(trace.log_likelihoods.last().unwrap() > &(4.0 * 0.5f64.ln()));
    }

    #[test]
    fn test_batch_equals_summed_gradient_step() {
        let (suite, points) = setup();
        let refs: Vec<&DataPoint> = points.iter().collect();
        let params = TgParams {
            eta: 0.1,
            theta: 0.0,
            mode: TgMode::EmulateSd,
        };
        let mut block = TgBlock::new(suite.discriminations()[0].id());
        block.absorb_batch(&params, &ctx(&suite), 0, &refs);
        // Com pesos zero, p = 1/2 para cada classe: o viés recebe 2 exemplos de cada classe
        // e o gradiente se anula.
        assert!(block.beta().row(BIAS_ID).is_none());
        let gratis = suite.dictionary().id("gratis").unwrap();
        assert!((block.beta().get(gratis, 0) - 0.1).abs() < 1e-12);
        assert!((block.beta().get(gratis, 1) + 0.1).abs() < 1e-12);
    }
}
