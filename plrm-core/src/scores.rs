//! # Scores — Probabilidades, Verossimilhança e Recall
//!
//! Duas responsabilidades:
//!
//! 1. **Numérica**: converter scores lineares em probabilidades sem underflow.
//!    Tudo é feito no domínio logarítmico, subtraindo o máximo antes de exponenciar:
//!
//!    $$ \log P(c) = s_c - m - \log \sum_k e^{s_k - m}, \quad m = \max_k s_k $$
//!
//!    Mesmo com centenas de classes e scores muito negativos, a classe de maior score
//!    contribui com $e^0 = 1$ para a soma, então o logaritmo nunca recebe zero.
//!
//! 2. **Avaliação**: o acumulador [`Scores`] conta acertos por classe e soma a
//!    log-verossimilhança da classe verdadeira, pulando (e contando) discriminações em
//!    que o exemplo não tem verdade conhecida.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::datapoint::DataPoint;
use crate::error::{PlrmError, Result};
use crate::renum::{RenumMap, Renumber};
use crate::suite::Suite;

/// Log-softmax estável. Vetor vazio produz vetor vazio.
pub fn log_softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return scores.iter().map(|_| -(scores.len() as f64).ln()).collect();
    }
    let sum: f64 = scores.iter().map(|s| (s - max).exp()).sum();
    let log_z = max + sum.ln();
    scores.iter().map(|s| s - log_z).collect()
}

/// Softmax estável (espaço linear), usada nos passos de gradiente.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Converte probabilidades lineares em logaritmos. Zero vira `-inf`.
///
/// É o caminho dos modelos que produzem probabilidades diretamente; o resultado segue o
/// mesmo contrato de [`log_softmax`].
pub fn log_prob(probs: &[f64]) -> Vec<f64> {
    probs.iter().map(|p| p.ln()).collect()
}

/// Índice do maior valor (o primeiro, em caso de empate).
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Formata uma sequência de scores colapsando valores consecutivos iguais (na precisão
/// impressa) em `valor*repetições`.
///
/// ```
/// use plrm_core::scores::format_score_dump;
/// assert_eq!(format_score_dump(&[0.5, 0.5, 0.5, 0.25], 2), "0.50*3 0.25");
/// ```
pub fn format_score_dump(values: &[f64], precision: usize) -> String {
    let mut out = String::new();
    let mut run: Option<(String, usize)> = None;
    let flush = |out: &mut String, run: (String, usize)| {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&run.0);
        if run.1 > 1 {
            let _ = write!(out, "*{}", run.1);
        }
    };
    for v in values {
        let text = format!("{v:.precision$}");
        run = match run.take() {
            Some((prev, n)) if prev == text => Some((prev, n + 1)),
            Some(prev) => {
                flush(&mut out, prev);
                Some((text, 1))
            }
            None => Some((text, 1)),
        };
    }
    if let Some(last) = run {
        flush(&mut out, last);
    }
    out
}

/// Dump legível das probabilidades de um exemplo: uma linha por discriminação.
pub fn format_probability_dump(suite: &Suite, log_probs: &[Vec<f64>], precision: usize) -> String {
    let mut out = String::new();
    for (dis, row) in suite.discriminations().iter().zip(log_probs) {
        let probs: Vec<f64> = row.iter().map(|l| l.exp()).collect();
        let _ = writeln!(out, "{}: {}", dis.name(), format_score_dump(&probs, precision));
    }
    out
}

/// Recall de uma classe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecall {
    pub class: String,
    pub hits: u64,
    pub total: u64,
    pub recall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminationRecall {
    pub discrimination: String,
    pub classes: Vec<ClassRecall>,
    /// Acertos / exemplos rotulados (média ponderada pelo suporte).
    pub weighted_recall: Option<f64>,
    /// Média simples sobre as classes com suporte.
    pub macro_recall: Option<f64>,
}

/// Resumo serializável de uma avaliação.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub examples: u64,
    pub labeled: u64,
    pub skipped: u64,
    pub log_likelihood: f64,
    pub linear_likelihood: f64,
    pub mean_log_likelihood: Option<f64>,
    pub discriminations: Vec<DiscriminationRecall>,
}

/// Acumulador de avaliação, indexado pelo espaço global de classes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scores {
    hits: Vec<u64>,
    totals: Vec<u64>,
    examples: u64,
    labeled: u64,
    skipped: u64,
    log_likelihood: f64,
    linear_likelihood: f64,
}

impl Scores {
    pub fn new(suite: &Suite) -> Self {
        let n = suite.total_classes();
        Self {
            hits: vec![0; n],
            totals: vec![0; n],
            ..Self::default()
        }
    }

    /// Número de colunas (classes globais) do acumulador.
    pub fn columns(&self) -> usize {
        self.hits.len()
    }

    /// Conta, para cada discriminação com verdade conhecida, se a classe de maior
    /// probabilidade é a verdadeira.
    ///
    /// O acumulador precisa ter o mesmo número de colunas que a suite: depois de uma
    /// mudança estrutural, aplique o [`RenumMap`] devolvido por ela com [`Renumber::renumber`].
    pub fn eval_scores(&mut self, suite: &Suite, point: &DataPoint, log_probs: &[Vec<f64>]) -> Result<()> {
        let total = suite.total_classes();
        if self.hits.len() != total {
            return Err(PlrmError::Renumbering(format!(
                "o acumulador tem {} colunas e a suite '{}' tem {total} classes",
                self.hits.len(),
                suite.name()
            )));
        }
        self.examples += 1;
        let mut offset = 0;
        for (dis, row) in suite.discriminations().iter().zip(log_probs) {
            if let Some(truth) = point.class_in(dis) {
                let global = offset + truth;
                self.totals[global] += 1;
                if argmax(row) == Some(truth) {
                    self.hits[global] += 1;
                }
            }
            offset += dis.class_count();
        }
        Ok(())
    }

    /// Soma $\log P$ e $P$ da classe verdadeira de cada discriminação rotulada.
    pub fn add_log_lin_lik(&mut self, suite: &Suite, point: &DataPoint, log_probs: &[Vec<f64>]) {
        for (dis, row) in suite.discriminations().iter().zip(log_probs) {
            match point.class_in(dis).and_then(|truth| row.get(truth)) {
                Some(&lp) => {
                    self.log_likelihood += lp;
                    self.linear_likelihood += lp.exp();
                    self.labeled += 1;
                }
                None => {
                    self.skipped += 1;
                    tracing::warn!(
                        example = point.name(),
                        discrimination = dis.name(),
                        "exemplo sem classe verdadeira; ignorado na verossimilhança"
                    );
                }
            }
        }
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn linear_likelihood(&self) -> f64 {
        self.linear_likelihood
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn labeled(&self) -> u64 {
        self.labeled
    }

    pub fn summary(&self, suite: &Suite) -> EvaluationSummary {
        let mut offset = 0;
        let mut discriminations = Vec::with_capacity(suite.discriminations().len());
        for dis in suite.discriminations() {
            let mut classes = Vec::with_capacity(dis.class_count());
            let (mut hits_sum, mut total_sum) = (0, 0);
            let mut recalls = Vec::new();
            for class in dis.classes() {
                let g = offset + class.pos();
                let hits = self.hits.get(g).copied().unwrap_or(0);
                let total = self.totals.get(g).copied().unwrap_or(0);
                let recall = (total > 0).then(|| hits as f64 / total as f64);
                recalls.extend(recall);
                hits_sum += hits;
                total_sum += total;
                classes.push(ClassRecall {
                    class: class.name().to_string(),
                    hits,
                    total,
                    recall,
                });
            }
            discriminations.push(DiscriminationRecall {
                discrimination: dis.name().to_string(),
                classes,
                weighted_recall: (total_sum > 0).then(|| hits_sum as f64 / total_sum as f64),
                macro_recall: (!recalls.is_empty()).then(|| recalls.iter().sum::<f64>() / recalls.len() as f64),
            });
            offset += dis.class_count();
        }
        EvaluationSummary {
            examples: self.examples,
            labeled: self.labeled,
            skipped: self.skipped,
            log_likelihood: self.log_likelihood,
            linear_likelihood: self.linear_likelihood,
            mean_log_likelihood: (self.labeled > 0).then(|| self.log_likelihood / self.labeled as f64),
            discriminations,
        }
    }

    /// Relatório textual de recall por classe e por discriminação.
    pub fn recall_summary(&self, suite: &Suite) -> String {
        let summary = self.summary(suite);
        let pct = |r: Option<f64>| r.map_or_else(|| "-".to_string(), |r| format!("{:.1}%", r * 100.0));
        let mut out = String::new();
        let _ = writeln!(
            out,
            "exemplos: {}  rotulados: {}  pulados: {}  log-verossimilhança: {:.4}",
            summary.examples, summary.labeled, summary.skipped, summary.log_likelihood
        );
        for dis in &summary.discriminations {
            let _ = writeln!(
                out,
                "{}: recall ponderado {}  macro {}",
                dis.discrimination,
                pct(dis.weighted_recall),
                pct(dis.macro_recall)
            );
            for class in &dis.classes {
                let _ = writeln!(
                    out,
                    "  {:<16} {:>5}/{:<5} {}",
                    class.class,
                    class.hits,
                    class.total,
                    pct(class.recall)
                );
            }
        }
        out
    }
}

impl Renumber for Scores {
    fn renumber(&mut self, map: &RenumMap) -> Result<()> {
        self.hits = map.apply(&self.hits, 0)?;
        self.totals = map.apply(&self.totals, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteConfig;
    use crate::features::FeatureDictionary;

    #[test]
    fn test_log_softmax_sums_to_one() {
        let lp = log_softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = lp.iter().map(|l| l.exp()).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(lp[2] > lp[1] && lp[1] > lp[0]);
    }

    #[test]
    fn test_log_softmax_survives_extreme_scores() {
        let lp = log_softmax(&[-1e6, -1e6 - 5.0, -2e6]);
        assert!(lp.iter().all(|l| !l.is_nan()));
        assert!(lp[0].abs() < 1e-2);
        assert!((lp[1] - (-5.0)).abs() < 1e-2);
        assert!(lp[2] < -1e5);
    }

    #[test]
    fn test_log_prob_matches_log_softmax_contract() {
        let linear = softmax(&[0.3, -1.2]);
        let a = log_prob(&linear);
        let b = log_softmax(&[0.3, -1.2]);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-12);
        }
        assert_eq!(log_prob(&[0.0])[0], f64::NEG_INFINITY);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_run_length_dump() {
        assert_eq!(format_score_dump(&[0.1, 0.1, 0.2, 0.1], 1), "0.1*2 0.2 0.1");
        assert_eq!(format_score_dump(&[], 3), "");
    }

    #[test]
    fn test_scores_skip_unlabeled_discriminations() {
        let mut suite = Suite::new("t", SuiteConfig::default());
        let azul = suite.resolve_label("Cor:Azul", true).unwrap();
        suite.resolve_label("Cor:Verde", true).unwrap();
        suite.resolve_label("Forma:Bola", true).unwrap();
        suite.resolve_label("Forma:Cubo", true).unwrap();

        let mut dict = FeatureDictionary::new();
        let mut p = DataPoint::from_named::<&str>("d", &[], &mut dict).unwrap();
        p.set_classes(vec![azul], &suite).unwrap();

        let log_probs = vec![log_prob(&[0.75, 0.25]), log_prob(&[0.5, 0.5])];
        let mut scores = Scores::new(&suite);
        scores.eval_scores(&suite, &p, &log_probs).unwrap();
        scores.add_log_lin_lik(&suite, &p, &log_probs);

        assert_eq!(scores.labeled(), 1);
        assert_eq!(scores.skipped(), 1);
        assert!((scores.log_likelihood() - 0.75f64.ln()).abs() < 1e-12);

        let summary = scores.summary(&suite);
        assert_eq!(summary.discriminations[0].weighted_recall, Some(1.0));
        assert_eq!(summary.discriminations[1].weighted_recall, None);
        assert!(scores.recall_summary(&suite).contains("Cor: recall ponderado 100.0%"));
    }

    #[test]
    fn test_scores_follow_deletion() {
        let mut suite = Suite::new("t", SuiteConfig::default());
        suite.resolve_label("Cor:Azul", true).unwrap();
        let bola = suite.resolve_label("Forma:Bola", true).unwrap();
        let mut dict = FeatureDictionary::new();
        let mut p = DataPoint::from_named::<&str>("d", &[], &mut dict).unwrap();
        p.set_classes(vec![bola], &suite).unwrap();

        let mut scores = Scores::new(&suite);
        scores.eval_scores(&suite, &p, &[vec![0.0], vec![0.0]]).unwrap();
        let cor = suite.find_discrimination("Cor").unwrap().id();
        let map = suite.delete_discrimination(cor).unwrap();
        scores.renumber(&map).unwrap();

        let summary = scores.summary(&suite);
        assert_eq!(summary.discriminations.len(), 1);
        assert_eq!(summary.discriminations[0].classes[0].hits, 1);
    }

    #[test]
    fn test_scores_follow_class_insertion() {
        let mut suite = Suite::new("t", SuiteConfig::default());
        let azul = suite.resolve_label("Cor:Azul", true).unwrap();
        let bola = suite.resolve_label("Forma:Bola", true).unwrap();
        let mut dict = FeatureDictionary::new();
        let mut p = DataPoint::from_named::<&str>("d", &[], &mut dict).unwrap();
        p.set_classes(vec![azul, bola], &suite).unwrap();

        let mut scores = Scores::new(&suite);
        scores.eval_scores(&suite, &p, &[vec![0.0], vec![0.0]]).unwrap();

        let cor = suite.find_discrimination("Cor").unwrap().id();
        let (verde, map) = suite.add_class_with_map(cor, "Verde").unwrap();
        assert_eq!(suite.global_class_id(verde), Some(1));

        // sem reindexar, o acumulador é rejeitado
        let mut stale = scores.clone();
        assert!(matches!(
            stale.eval_scores(&suite, &p, &[vec![0.0, -1.0], vec![0.0]]),
            Err(PlrmError::Renumbering(_))
        ));

        scores.renumber(&map).unwrap();
        assert_eq!(scores.columns(), 3);
        let summary = scores.summary(&suite);
        let cor_classes: Vec<(&str, u64)> = summary.discriminations[0]
            .classes
            .iter()
            .map(|c| (c.class.as_str(), c.hits))
            .collect();
        assert_eq!(cor_classes, vec![("Azul", 1), ("Verde", 0)]);
        assert_eq!(summary.discriminations[1].classes[0].hits, 1);

        scores.eval_scores(&suite, &p, &[vec![0.0, -1.0], vec![0.0]]).unwrap();
        assert_eq!(scores.summary(&suite).discriminations[1].classes[0].hits, 2);
    }
}
