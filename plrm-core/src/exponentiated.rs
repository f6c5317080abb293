//! # Exponentiated Gradient (EG±)
//!
//! Bloco multiplicativo. Em vez de somar o gradiente aos pesos, cada coeficiente é
//! representado por dois números estritamente positivos, `p` e `n`, e o peso efetivo é
//!
//! $$ w_{j,c} = U \cdot \frac{p_{j,c} - n_{j,c}}{Z_c}, \qquad Z_c = \sum_j (p_{j,c} + n_{j,c}) $$
//!
//! A atualização multiplica `p` por $e^{-\eta U g}$ e `n` por $e^{\eta U g}$. A
//! renormalização está implícita em $Z_c$: não é preciso reescrever todas as entradas a
//! cada passo.
//!
//! ## Entradas não tocadas
//!
//! $Z_c$ soma sobre **todo** o dicionário de features. Features que nunca foram
//! atualizadas não são guardadas: valem `base[c]` tanto em `p` quanto em `n` (peso
//! efetivo zero). Guardamos, por classe, a soma e a contagem das entradas materializadas:
//!
//! ```text
//! Z_c = soma_guardada[c] + 2 · base[c] · (D − contagem_guardada[c])
//! ```
//!
//! Quando $Z_c$ sai de `[1e-100, 1e100]`, a coluna inteira é dividida por $Z_c$ (o peso
//! efetivo não muda).
//!
//! ## Estabilidade
//!
//! O expoente de cada passo é limitado a `±MAX_STEP_EXPONENT`. Com isso $Z_c$ muda no
//! máximo por um fator $e^{30}$ por exemplo e nunca sai do intervalo finito entre duas
//! verificações; features com valores enormes saturam o passo em vez de gerar `inf`.

use crate::beta::BetaMatrix;
use crate::config::EgParams;
use crate::datapoint::DataPoint;
use crate::features::SparseVector;
use crate::scores::{log_softmax, softmax};
use crate::suite::{DisId, Discrimination};

const MIN_NORMALIZER: f64 = 1e-100;
const MAX_NORMALIZER: f64 = 1e100;
const MAX_STEP_EXPONENT: f64 = 30.0;

/// Bloco EG± de uma discriminação.
#[derive(Debug, Clone, PartialEq)]
pub struct EgBlock {
    dis: DisId,
    u: f64,
    positive: BetaMatrix,
    negative: BetaMatrix,
    base: Vec<f64>,
    stored_sum: Vec<f64>,
    stored_count: Vec<usize>,
}

/// Estado bruto de um bloco EG±, como gravado no learner complex.
#[derive(Debug, Clone, PartialEq)]
pub struct EgState {
    pub positive: BetaMatrix,
    pub negative: BetaMatrix,
    pub base: Vec<f64>,
    pub stored_sum: Vec<f64>,
    pub stored_count: Vec<usize>,
}

impl EgBlock {
    pub fn new(dis: DisId, u: f64) -> Self {
        Self {
            dis,
            u,
            positive: BetaMatrix::new(),
            negative: BetaMatrix::new(),
            base: Vec::new(),
            stored_sum: Vec::new(),
            stored_count: Vec::new(),
        }
    }

    pub fn from_state(dis: DisId, u: f64, state: EgState) -> Self {
        Self {
            dis,
            u,
            positive: state.positive,
            negative: state.negative,
            base: state.base,
            stored_sum: state.stored_sum,
            stored_count: state.stored_count,
        }
    }

    pub fn state(&self) -> EgState {
        EgState {
            positive: self.positive.clone(),
            negative: self.negative.clone(),
            base: self.base.clone(),
            stored_sum: self.stored_sum.clone(),
            stored_count: self.stored_count.clone(),
        }
    }

    pub fn dis(&self) -> DisId {
        self.dis
    }

    fn ensure_classes(&mut self, n: usize) {
        while self.base.len() < n {
            self.base.push(1.0);
            self.stored_sum.push(0.0);
            self.stored_count.push(0);
        }
    }

    fn normalizer(&self, class: usize, feature_count: usize) -> f64 {
        let untouched = feature_count.saturating_sub(self.stored_count[class]);
        self.stored_sum[class] + 2.0 * self.base[class] * untouched as f64
    }

    /// Materializa as colunas `0..n` da linha `feature` com o valor base de cada classe.
    fn touch(&mut self, feature: usize, n: usize) {
        let start = self.positive.row(feature).map_or(0, <[f64]>::len);
        for c in start..n {
            let b = self.base[c];
            self.positive.row_mut(feature, c + 1)[c] = b;
            self.negative.row_mut(feature, c + 1)[c] = b;
            self.stored_sum[c] += 2.0 * b;
            self.stored_count[c] += 1;
        }
    }

    /// Recalcula a soma guardada da coluna a partir das entradas materializadas.
    fn resum(&mut self, class: usize) {
        let mut sum = 0.0;
        for matrix in [&self.positive, &self.negative] {
            for (_, row) in matrix.iter() {
                sum += row.get(class).copied().unwrap_or(0.0);
            }
        }
        self.stored_sum[class] = sum;
    }

    /// Mantém $Z_c$ finito, positivo e dentro da faixa.
    fn normalize(&mut self, class: usize, feature_count: usize) {
        let mut z = self.normalizer(class, feature_count);
        if !(z > 0.0 && z.is_finite()) {
            self.resum(class);
            z = self.normalizer(class, feature_count);
        }
        if z > 0.0 && z.is_finite() && !(MIN_NORMALIZER..=MAX_NORMALIZER).contains(&z) {
            self.rescale(class, z);
        }
    }

    fn rescale(&mut self, class: usize, factor: f64) {
        let mut sum = 0.0;
        for matrix in [&mut self.positive, &mut self.negative] {
            for (_, row) in matrix.iter_mut() {
                if let Some(v) = row.get_mut(class) {
                    *v /= factor;
                    sum += *v;
                }
            }
        }
        self.base[class] /= factor;
        self.stored_sum[class] = sum;
    }

    /// Scores lineares com os pesos efetivos.
    pub fn scores(&self, x: &SparseVector, n_classes: usize, feature_count: usize) -> Vec<f64> {
        let mut scores = vec![0.0; n_classes];
        for (c, score) in scores.iter_mut().enumerate().take(self.base.len()) {
            let z = self.normalizer(c, feature_count);
            if z <= 0.0 {
                continue;
            }
            for (f, v) in x.iter() {
                let diff = self.positive.get(f, c) - self.negative.get(f, c);
                if diff != 0.0 {
                    *score += v * self.u * diff / z;
                }
            }
        }
        scores
    }

    pub fn log_probs(&self, x: &SparseVector, n_classes: usize, feature_count: usize) -> Vec<f64> {
        log_softmax(&self.scores(x, n_classes, feature_count))
    }

    /// Um passo multiplicativo por exemplo, na ordem de `points`.
    pub(crate) fn absorb(
        &mut self,
        params: &EgParams,
        feature_count: usize,
        dis: &Discrimination,
        points: &[&DataPoint],
    ) -> usize {
        let n = dis.class_count();
        if n == 0 {
            return 0;
        }
        self.u = params.u;
        self.ensure_classes(n);
        let mut skipped = 0;
        for point in points {
            let Some(truth) = point.class_in(dis) else {
                skipped += 1;
                continue;
            };
            let x = point.features();
            let probs = softmax(&self.scores(x, n, feature_count));
            for (f, v) in x.iter() {
                self.touch(f, n);
                let (Some(pos), Some(neg)) = (self.positive.get_row_mut(f), self.negative.get_row_mut(f)) else {
                    continue;
                };
                for c in 0..n {
                    let indicator = if c == truth { 1.0 } else { 0.0 };
                    let g = (probs[c] - indicator) * v;
                    let exponent = (-params.eta * self.u * g).clamp(-MAX_STEP_EXPONENT, MAX_STEP_EXPONENT);
                    let factor = exponent.exp();
                    let (old_p, old_n) = (pos[c], neg[c]);
                    pos[c] = old_p * factor;
                    neg[c] = old_n / factor;
                    self.stored_sum[c] += (pos[c] + neg[c]) - (old_p + old_n);
                }
            }
            for c in 0..n {
                self.normalize(c, feature_count);
            }
        }
        skipped
    }

    /// Pesos efetivos das linhas materializadas, no formato comum.
    pub fn effective_beta(&self, n_classes: usize, feature_count: usize) -> BetaMatrix {
        let mut beta = BetaMatrix::new();
        let classes = n_classes.min(self.base.len());
        for (f, pos) in self.positive.iter() {
            let row: Vec<f64> = (0..classes)
                .map(|c| {
                    let diff = pos.get(c).copied().unwrap_or(0.0) - self.negative.get(f, c);
                    let z = self.normalizer(c, feature_count);
                    if diff == 0.0 || z <= 0.0 {
                        0.0
                    } else {
                        self.u * diff / z
                    }
                })
                .collect();
            beta.set_row(f, row);
        }
        beta.prune_zero_rows();
        beta
    }

    pub fn memory_estimate(&self) -> usize {
        self.positive.memory_estimate()
            + self.negative.memory_estimate()
            + self.base.capacity() * std::mem::size_of::<f64>() * 2
            + self.stored_count.capacity() * std::mem::size_of::<usize>()
    }
}
