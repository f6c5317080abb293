//! # Priors — Regularização por Coeficiente
//!
//! Um prior diz, para cada coeficiente $w_{j,c}$, para onde ele deve ser puxado (a
//! **moda** $\mu$) e com que força: uma penalidade L1 (Laplace) e uma L2 (Gauss).
//!
//! $$ \text{penalidade}(w) = l_1 |w - \mu| + \frac{l_2}{2} (w - \mu)^2 $$
//!
//! Os termos podem ser dados em quatro níveis; o mais específico vence:
//!
//! | Nível | Chave |
//! |-------|-------|
//! | par | `(feature, classe global)` |
//! | feature | `feature` |
//! | classe | `classe global` |
//! | geral | — |
//!
//! As colunas por classe vivem no espaço global de classes e por isso implementam
//! [`Renumber`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlrmError, Result};
use crate::renum::{RenumMap, Renumber};
use crate::suite::Suite;

/// Moda e forças de regularização de um coeficiente.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorTerm {
    pub mode: f64,
    pub l1: f64,
    pub l2: f64,
}

impl PriorTerm {
    pub fn is_neutral(&self) -> bool {
        self.mode == 0.0 && self.l1 == 0.0 && self.l2 == 0.0
    }

    fn validate(&self, at: &str) -> Result<()> {
        for (name, value) in [("l1", self.l1), ("l2", self.l2)] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(PlrmError::InvalidParameter {
                    name: format!("{name} ({at})"),
                    value,
                });
            }
        }
        if !self.mode.is_finite() {
            return Err(PlrmError::InvalidParameter {
                name: format!("mode ({at})"),
                value: self.mode,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Priors {
    overall: PriorTerm,
    by_class: Vec<Option<PriorTerm>>,
    by_feature: BTreeMap<usize, PriorTerm>,
    by_pair: BTreeMap<(usize, usize), PriorTerm>,
}

impl Priors {
    /// Priors neutros para um espaço de `total_classes` classes globais.
    pub fn new(total_classes: usize) -> Self {
        Self {
            by_class: vec![None; total_classes],
            ..Self::default()
        }
    }

    pub fn class_columns(&self) -> usize {
        self.by_class.len()
    }

    pub fn set_overall(&mut self, term: PriorTerm) {
        self.overall = term;
    }

    /// Define o termo de uma classe global. Índices além das colunas são ignorados.
    pub fn set_class(&mut self, class: usize, term: PriorTerm) {
        if let Some(slot) = self.by_class.get_mut(class) {
            *slot = Some(term);
        }
    }

    pub fn set_feature(&mut self, feature: usize, term: PriorTerm) {
        self.by_feature.insert(feature, term);
    }

    pub fn set_pair(&mut self, feature: usize, class: usize, term: PriorTerm) {
        self.by_pair.insert((feature, class), term);
    }

    /// Termo efetivo do coeficiente `(feature, classe global)`.
    pub fn term(&self, feature: usize, class: usize) -> PriorTerm {
        if let Some(t) = self.by_pair.get(&(feature, class)) {
            return *t;
        }
        if let Some(t) = self.by_feature.get(&feature) {
            return *t;
        }
        if let Some(Some(t)) = self.by_class.get(class) {
            return *t;
        }
        self.overall
    }

    /// `true` se algum termo puxa coeficientes (moda ou força diferente de zero).
    pub fn is_regularizing(&self) -> bool {
        !self.overall.is_neutral()
            || self.by_class.iter().flatten().any(|t| !t.is_neutral())
            || self.by_feature.values().any(|t| !t.is_neutral())
            || self.by_pair.values().any(|t| !t.is_neutral())
    }

    /// Converte para o formato com nomes.
    pub fn to_doc(&self, suite: &Suite) -> PriorsDoc {
        let dict = suite.dictionary();
        let feature_name = |f: usize| dict.name(f).unwrap_or("?").to_string();
        let labels = global_labels(suite);
        let class_name = |c: usize| labels.get(c).cloned().unwrap_or_else(|| format!("#{c}"));

        PriorsDoc {
            overall: self.overall,
            classes: self
                .by_class
                .iter()
                .enumerate()
                .filter_map(|(c, t)| t.map(|t| (class_name(c), t)))
                .collect(),
            features: self
                .by_feature
                .iter()
                .map(|(f, t)| (feature_name(*f), *t))
                .collect(),
            pairs: self
                .by_pair
                .iter()
                .map(|((f, c), t)| PairPrior {
                    feature: feature_name(*f),
                    class: class_name(*c),
                    term: *t,
                })
                .collect(),
        }
    }

    /// Resolve um documento contra a suite. Features desconhecidas são registradas no
    /// dicionário; classes desconhecidas são erro.
    pub fn from_doc(doc: &PriorsDoc, suite: &mut Suite) -> Result<Self> {
        let mut priors = Self::new(suite.total_classes());
        doc.overall.validate("geral")?;
        priors.overall = doc.overall;
        for (label, term) in &doc.classes {
            term.validate(label)?;
            let class = global_id(suite, label)?;
            priors.set_class(class, *term);
        }
        for (name, term) in &doc.features {
            term.validate(name)?;
            let feature = suite.dictionary_mut().intern(name);
            priors.set_feature(feature, *term);
        }
        for pair in &doc.pairs {
            pair.term.validate(&pair.feature)?;
            let class = global_id(suite, &pair.class)?;
            let feature = suite.dictionary_mut().intern(&pair.feature);
            priors.set_pair(feature, class, pair.term);
        }
        Ok(priors)
    }
}

impl Renumber for Priors {
    fn renumber(&mut self, map: &RenumMap) -> Result<()> {
        self.by_class = map.apply(&self.by_class, None)?;
        self.by_pair = std::mem::take(&mut self.by_pair)
            .into_iter()
            .filter_map(|((f, c), t)| map.get(c).map(|c| ((f, c), t)))
            .collect();
        Ok(())
    }
}

fn global_labels(suite: &Suite) -> Vec<String> {
    suite
        .discriminations()
        .iter()
        .flat_map(|d| d.classes().iter().map(move |c| format!("{}:{}", d.name(), c.name())))
        .collect()
}

fn global_id(suite: &mut Suite, label: &str) -> Result<usize> {
    let class = suite.resolve_label(label, false)?;
    suite
        .global_class_id(class)
        .ok_or_else(|| PlrmError::MalformedDocument(format!("classe '{label}' sem id global")))
}

/// Prior de um par `(feature, classe)` no documento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPrior {
    pub feature: String,
    pub class: String,
    #[serde(flatten)]
    pub term: PriorTerm,
}

/// Priors com nomes em vez de ids, como aparecem em arquivos e no learner complex.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PriorsDoc {
    #[serde(default)]
    pub overall: PriorTerm,
    /// `"Discriminação:Classe"` → termo.
    #[serde(default)]
    pub classes: BTreeMap<String, PriorTerm>,
    #[serde(default)]
    pub features: BTreeMap<String, PriorTerm>,
    #[serde(default)]
    pub pairs: Vec<PairPrior>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteConfig;

    fn term(mode: f64) -> PriorTerm {
        PriorTerm { mode, l1: 0.0, l2: 1.0 }
    }

    #[test]
    fn test_precedence() {
        let mut p = Priors::new(3);
        p.set_overall(term(1.0));
        p.set_class(2, term(2.0));
        p.set_feature(5, term(3.0));
        p.set_pair(5, 2, term(4.0));

        assert_eq!(p.term(5, 2).mode, 4.0);
        assert_eq!(p.term(5, 1).mode, 3.0);
        assert_eq!(p.term(6, 2).mode, 2.0);
        assert_eq!(p.term(6, 0).mode, 1.0);
    }

    #[test]
    fn test_neutral_priors_do_not_regularize() {
        let mut p = Priors::new(2);
        assert!(!p.is_regularizing());
        p.set_feature(1, PriorTerm::default());
        assert!(!p.is_regularizing());
        p.set_pair(1, 0, PriorTerm { mode: 0.0, l1: 0.1, l2: 0.0 });
        assert!(p.is_regularizing());
    }

    #[test]
    fn test_renumber_drops_deleted_columns() {
        let mut p = Priors::new(4);
        p.set_class(3, term(7.0));
        p.set_pair(1, 1, term(8.0));
        p.set_pair(1, 3, term(9.0));
        let map = RenumMap::deleting(4, 1..2).unwrap();
        p.renumber(&map).unwrap();
        assert_eq!(p.class_columns(), 3);
        assert_eq!(p.term(0, 2).mode, 7.0);
        assert_eq!(p.term(1, 2).mode, 9.0);
        assert!(p.by_pair.get(&(1, 1)).is_none());
    }

    #[test]
    fn test_doc_round_trip_through_names() {
        let mut suite = Suite::new("t", SuiteConfig::default());
        suite.resolve_label("Cor:Azul", true).unwrap();
        suite.resolve_label("Cor:Verde", true).unwrap();

        let mut doc = PriorsDoc::default();
        doc.classes.insert("Cor:Verde".into(), term(0.5));
        doc.features.insert("Size".into(), term(-1.0));
        doc.pairs.push(PairPrior {
            feature: "Heat".into(),
            class: "Cor:Azul".into(),
            term: term(2.0),
        });

        let priors = Priors::from_doc(&doc, &mut suite).unwrap();
        let heat = suite.dictionary().id("Heat").unwrap();
        assert_eq!(priors.term(heat, 0).mode, 2.0);
        assert_eq!(priors.to_doc(&suite), doc);

        doc.classes.insert("Cor:Roxo".into(), term(0.0));
        assert!(Priors::from_doc(&doc, &mut suite).is_err());
    }
}
