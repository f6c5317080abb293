//! # DataPoint — Exemplo Esparso Rotulado
//!
//! Um `DataPoint` é um exemplo nomeado: um [`SparseVector`] de features (sempre com a
//! feature de viés) e uma lista de rótulos com **no máximo uma classe por discriminação**.
//!
//! O nome e as features são imutáveis após a criação. Os rótulos só mudam por chamadas
//! explícitas ([`DataPoint::set_classes`], [`DataPoint::add_class`]); os algoritmos de
//! aprendizado nunca os alteram.
//!
//! ## Classe padrão, avaliada na leitura
//!
//! A lista guardada contém apenas os rótulos explícitos. [`DataPoint::get_classes`]
//! completa, **a cada leitura**, as discriminações sem rótulo com a classe padrão atual
//! de cada uma. Nada é memorizado: se uma discriminação for criada ou tiver a classe
//! padrão trocada depois que o exemplo existe, a próxima leitura já reflete a mudança.

use crate::error::{PlrmError, Result};
use crate::features::{FeatureDictionary, SparseVector, BIAS_FEATURE, BIAS_ID};
use crate::suite::{ClassRef, DisId, Discrimination, Suite};

#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    name: String,
    features: SparseVector,
    labels: Vec<ClassRef>,
}

impl DataPoint {
    /// Cria o exemplo a partir de pares `(feature id, valor)`; a feature de viés é acrescentada aqui.
    pub fn from_ids(name: impl Into<String>, mut pairs: Vec<(usize, f64)>, dict: &FeatureDictionary) -> Result<Self> {
        let name = name.into();
        for &(id, _) in &pairs {
            if id == BIAS_ID {
                return Err(PlrmError::DuplicateFeature {
                    example: name,
                    feature: BIAS_FEATURE.to_string(),
                });
            }
            if id >= dict.len() {
                return Err(PlrmError::UnknownFeatureId { id, size: dict.len() });
            }
        }
        pairs.push((BIAS_ID, 1.0));
        let features = SparseVector::from_pairs(pairs).map_err(|id| PlrmError::DuplicateFeature {
            example: name.clone(),
            feature: dict.name(id).unwrap_or("?").to_string(),
        })?;
        Ok(Self {
            name,
            features,
            labels: Vec::new(),
        })
    }

    /// Cria o exemplo a partir de nomes de features, registrando os nomes novos no dicionário.
    pub fn from_named<S: AsRef<str>>(
        name: impl Into<String>,
        features: &[(S, f64)],
        dict: &mut FeatureDictionary,
    ) -> Result<Self> {
        let name = name.into();
        let mut pairs = Vec::with_capacity(features.len() + 1);
        for (feature, value) in features {
            let feature = feature.as_ref();
            if feature == BIAS_FEATURE {
                return Err(PlrmError::DuplicateFeature {
                    example: name,
                    feature: feature.to_string(),
                });
            }
            pairs.push((dict.intern(feature), *value));
        }
        Self::from_ids(name, pairs, dict)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &SparseVector {
        &self.features
    }

    /// Rótulos explícitos, sem completar com classes padrão.
    pub fn stored_classes(&self) -> &[ClassRef] {
        &self.labels
    }

    /// Substitui a lista de rótulos.
    ///
    /// Duas classes da mesma discriminação em `labels` são sempre um erro, que nomeia as
    /// duas classes. Classes de discriminações removidas também são rejeitadas.
    pub fn set_classes(&mut self, labels: Vec<ClassRef>, suite: &Suite) -> Result<()> {
        let mut accepted: Vec<ClassRef> = Vec::with_capacity(labels.len());
        for class in labels {
            suite.check_class(class)?;
            if let Some(prev) = accepted.iter().find(|c| c.dis == class.dis) {
                if *prev == class {
                    continue;
                }
                return Err(self.conflict(*prev, class, suite));
            }
            accepted.push(class);
        }
        self.labels = accepted;
        Ok(())
    }

    /// Acrescenta um rótulo. Se já houver outra classe da mesma discriminação, `replace`
    /// decide entre substituí-la ou falhar.
    pub fn add_class(&mut self, class: ClassRef, suite: &Suite, replace: bool) -> Result<()> {
        suite.check_class(class)?;
        match self.labels.iter().position(|c| c.dis == class.dis) {
            Some(i) if self.labels[i] == class => Ok(()),
            Some(i) if replace => {
                self.labels[i] = class;
                Ok(())
            }
            Some(i) => Err(self.conflict(self.labels[i], class, suite)),
            None => {
                self.labels.push(class);
                Ok(())
            }
        }
    }

    /// Rótulos explícitos (ignorando discriminações removidas) seguidos da classe padrão de
    /// cada discriminação sem rótulo. Função pura do estado atual da suite.
    pub fn get_classes(&self, suite: &Suite) -> Vec<ClassRef> {
        let mut out: Vec<ClassRef> = self
            .labels
            .iter()
            .copied()
            .filter(|c| suite.discrimination_by_id(c.dis).is_some())
            .collect();
        for dis in suite.discriminations() {
            if self.stored_class_for(dis.id()).is_none() {
                if let Some(default) = dis.default_class() {
                    out.push(default);
                }
            }
        }
        out
    }

    /// Rótulo explícito para a discriminação `dis`, se houver.
    pub fn stored_class_for(&self, dis: DisId) -> Option<ClassRef> {
        self.labels.iter().copied().find(|c| c.dis == dis)
    }

    /// Posição da classe verdadeira em `dis`: o rótulo explícito ou, na falta dele, a classe padrão.
    pub fn class_in(&self, dis: &Discrimination) -> Option<usize> {
        self.stored_class_for(dis.id())
            .map(|c| c.pos)
            .or_else(|| dis.default_class().map(|c| c.pos))
    }

    fn conflict(&self, first: ClassRef, second: ClassRef, suite: &Suite) -> PlrmError {
        let dis = suite.discrimination_by_id(first.dis);
        let class_name = |c: ClassRef| {
            dis.and_then(|d| d.class(c.pos))
                .map(|k| k.name().to_string())
                .unwrap_or_else(|| format!("#{}", c.pos))
        };
        PlrmError::ConflictingLabels {
            example: self.name.clone(),
            discrimination: dis.map(|d| d.name().to_string()).unwrap_or_default(),
            first: class_name(first),
            second: class_name(second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteConfig;

    fn suite_with_colors() -> (Suite, ClassRef, ClassRef, ClassRef) {
        let mut suite = Suite::new("teste", SuiteConfig::default());
        let cor = suite.add_discrimination("Cor").unwrap();
        let azul = suite.add_class(cor, "Azul").unwrap();
        let verde = suite.add_class(cor, "Verde").unwrap();
        let forma = suite.add_discrimination("Forma").unwrap();
        let bola = suite.add_class(forma, "Bola").unwrap();
        (suite, azul, verde, bola)
    }

    #[test]
    fn test_bias_is_added() {
        let mut dict = FeatureDictionary::new();
        let p = DataPoint::from_named("d1", &[("Size", 2.0)], &mut dict).unwrap();
        assert_eq!(p.features().get(BIAS_ID), Some(1.0));
        assert_eq!(p.features().len(), 2);
        let empty = DataPoint::from_named::<&str>("d0", &[], &mut dict).unwrap();
        assert_eq!(empty.features().len(), 1);
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let mut dict = FeatureDictionary::new();
        let err = DataPoint::from_named("d1", &[("Size", 2.0), ("Size", 3.0)], &mut dict).unwrap_err();
        assert!(matches!(err, PlrmError::DuplicateFeature { ref feature, .. } if feature == "Size"));
    }

    #[test]
    fn test_conflicting_labels_name_both_classes() {
        let (suite, azul, verde, _) = suite_with_colors();
        let mut dict = FeatureDictionary::new();
        let mut p = DataPoint::from_named::<&str>("d1", &[], &mut dict).unwrap();
        let err = p.set_classes(vec![azul, verde], &suite).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Azul") && msg.contains("Verde") && msg.contains("Cor"));
    }

    #[test]
    fn test_add_class_replace_flag() {
        let (suite, azul, verde, bola) = suite_with_colors();
        let mut dict = FeatureDictionary::new();
        let mut p = DataPoint::from_named::<&str>("d1", &[], &mut dict).unwrap();
        p.add_class(azul, &suite, false).unwrap();
        p.add_class(bola, &suite, false).unwrap();
        assert!(p.add_class(verde, &suite, false).is_err());
        p.add_class(verde, &suite, true).unwrap();
        assert_eq!(p.stored_classes(), &[verde, bola]);
    }

    #[test]
    fn test_default_completion_is_evaluated_on_read() {
        let (mut suite, azul, _, _) = suite_with_colors();
        let mut dict = FeatureDictionary::new();
        let mut p = DataPoint::from_named::<&str>("d1", &[], &mut dict).unwrap();
        p.set_classes(vec![azul], &suite).unwrap();
        assert_eq!(p.get_classes(&suite), vec![azul]);

        // Uma classe padrão definida depois aparece na próxima leitura...
        let forma = suite.find_discrimination("Forma").unwrap().id();
        suite.set_default_class(forma, Some("Bola")).unwrap();
        let classes = p.get_classes(&suite);
        assert_eq!(classes.len(), 2);
        // ...sem alterar os rótulos guardados.
        assert_eq!(p.stored_classes(), &[azul]);

        // Um rótulo explícito nunca é sobrescrito pela classe padrão.
        let cor = suite.find_discrimination("Cor").unwrap().id();
        suite.set_default_class(cor, Some("Verde")).unwrap();
        assert_eq!(p.get_classes(&suite)[0], azul);
    }
}
