//! # Suite — Contexto Compartilhado de Treino
//!
//! A [`Suite`] é dona de tudo o que os learners compartilham:
//!
//! - as **discriminações** (cada uma um problema multiclasse independente),
//! - o **dicionário de features**,
//! - os **priors** opcionais,
//! - e a lista de **learners** anexados.
//!
//! ## Identidade das discriminações
//!
//! Cada discriminação recebe um [`DisId`] estável, nunca reutilizado. Um [`ClassRef`]
//! guarda `(DisId, posição)`; assim, quando uma discriminação é removida, as referências
//! para as outras continuam válidas e as que apontavam para a removida são detectadas
//! como obsoletas em vez de passarem a apontar para outra coisa.
//!
//! A posição da discriminação no vetor (`did`) muda com remoções; ela é usada apenas
//! para alinhar os blocos dos learners e o espaço global de classes.
//!
//! ## Espaço global de classes
//!
//! Concatenando as classes de todas as discriminações, na ordem, obtemos o **id global
//! de classe**. Priors e contadores de avaliação usam esse espaço e são reindexados por
//! um [`RenumMap`] sempre que ele muda.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{LearnerSpec, SuiteConfig, Verbosity};
use crate::datapoint::DataPoint;
use crate::error::{PlrmError, Result};
use crate::features::FeatureDictionary;
use crate::learner::{AbsorbStats, Learner, TrainContext};
use crate::priors::{Priors, PriorsDoc};
use crate::renum::{RenumMap, Renumber};
use crate::schedule::{PassReport, Schedule, TrainingReport};
use crate::scores::Scores;

/// Identidade estável de uma discriminação dentro da suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisId(pub u32);

impl fmt::Display for DisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dis#{}", self.0)
    }
}

/// Referência a uma classe: discriminação dona + posição dentro dela.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub dis: DisId,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    name: String,
    pos: usize,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pos(&self) -> usize {
        self.pos
    }
}

/// Conjunto ordenado de classes mutuamente exclusivas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrimination {
    id: DisId,
    name: String,
    classes: Vec<Class>,
    default_class: Option<usize>,
}

impl Discrimination {
    pub fn id(&self) -> DisId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class(&self, pos: usize) -> Option<&Class> {
        self.classes.get(pos)
    }

    pub fn find_class(&self, name: &str) -> Option<ClassRef> {
        self.classes
            .iter()
            .position(|c| c.name == name)
            .map(|pos| ClassRef { dis: self.id, pos })
    }

    pub fn default_class(&self) -> Option<ClassRef> {
        self.default_class.map(|pos| ClassRef { dis: self.id, pos })
    }

    fn push_class(&mut self, name: &str) -> Result<ClassRef> {
        if self.find_class(name).is_some() {
            return Err(PlrmError::DuplicateClass {
                discrimination: self.name.clone(),
                class: name.to_string(),
            });
        }
        let pos = self.classes.len();
        self.classes.push(Class {
            name: name.to_string(),
            pos,
        });
        Ok(ClassRef { dis: self.id, pos })
    }
}

/// Estimativa de memória por learner, em bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEstimate {
    pub learner: String,
    pub bytes: usize,
}

/// Contexto de treino: discriminações, dicionário, priors e learners.
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    config: SuiteConfig,
    dictionary: FeatureDictionary,
    discriminations: Vec<Discrimination>,
    next_dis_id: u32,
    priors: Option<Priors>,
    learners: Vec<Learner>,
}

impl Suite {
    pub fn new(name: impl Into<String>, config: SuiteConfig) -> Self {
        Self {
            name: name.into(),
            config,
            dictionary: FeatureDictionary::new(),
            discriminations: Vec::new(),
            next_dis_id: 0,
            priors: None,
            learners: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn verbosity(&self) -> Verbosity {
        self.config.verbosity
    }

    pub fn dictionary(&self) -> &FeatureDictionary {
        &self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut FeatureDictionary {
        &mut self.dictionary
    }

    /// Substitui o dicionário. Usado ao restaurar documentos; o novo não pode ser menor.
    pub(crate) fn replace_dictionary(&mut self, dictionary: FeatureDictionary) -> Result<()> {
        dictionary.check_min_len(self.dictionary.len())?;
        self.dictionary = dictionary;
        Ok(())
    }

    // --- Discriminações e classes ---

    pub fn discriminations(&self) -> &[Discrimination] {
        &self.discriminations
    }

    pub fn discrimination(&self, did: usize) -> Option<&Discrimination> {
        self.discriminations.get(did)
    }

    pub fn find_discrimination(&self, name: &str) -> Option<&Discrimination> {
        self.discriminations.iter().find(|d| d.name == name)
    }

    pub fn discrimination_by_id(&self, id: DisId) -> Option<&Discrimination> {
        self.discriminations.iter().find(|d| d.id == id)
    }

    /// Posição atual (`did`) da discriminação `id`.
    pub fn did_of(&self, id: DisId) -> Option<usize> {
        self.discriminations.iter().position(|d| d.id == id)
    }

    /// Posição atual (`did`) da discriminação dona de `class`.
    pub fn did_of_class(&self, class: ClassRef) -> Option<usize> {
        self.did_of(class.dis)
    }

    fn require_did(&self, id: DisId) -> Result<usize> {
        self.did_of(id).ok_or(PlrmError::StaleClass { dis: id.0 })
    }

    pub fn add_discrimination(&mut self, name: &str) -> Result<DisId> {
        if self.find_discrimination(name).is_some() {
            return Err(PlrmError::DuplicateDiscrimination {
                name: name.to_string(),
            });
        }
        let id = DisId(self.next_dis_id);
        self.next_dis_id += 1;
        self.discriminations.push(Discrimination {
            id,
            name: name.to_string(),
            classes: Vec::new(),
            default_class: None,
        });
        for learner in &mut self.learners {
            learner.push_block(id);
        }
        tracing::debug!(suite = %self.name, discrimination = name, "discriminação criada");
        Ok(id)
    }

    /// Acrescenta uma classe ao fim da discriminação `dis`.
    ///
    /// O espaço global de classes ganha uma coluna no fim do intervalo de `dis`; os priors
    /// são reindexados. Os blocos dos learners crescem sob demanda.
    pub fn add_class(&mut self, dis: DisId, name: &str) -> Result<ClassRef> {
        self.add_class_with_map(dis, name).map(|(class, _)| class)
    }

    /// Como [`Suite::add_class`], devolvendo também o mapa que insere a coluna nova, para
    /// que o chamador reindexe estruturas próprias (por exemplo um [`Scores`]).
    pub fn add_class_with_map(&mut self, dis: DisId, name: &str) -> Result<(ClassRef, RenumMap)> {
        let did = self.require_did(dis)?;
        if self.discriminations[did].find_class(name).is_some() {
            return Err(PlrmError::DuplicateClass {
                discrimination: self.discriminations[did].name.clone(),
                class: name.to_string(),
            });
        }
        let at = self.class_offset(did) + self.discriminations[did].class_count();
        let map = RenumMap::inserting(self.total_classes(), at, 1)?;
        if let Some(priors) = &mut self.priors {
            priors.renumber(&map)?;
        }
        let class = self.discriminations[did].push_class(name)?;
        Ok((class, map))
    }

    /// Define (ou remove, com `None`) a classe padrão de `dis`.
    pub fn set_default_class(&mut self, dis: DisId, class: Option<&str>) -> Result<()> {
        let did = self.require_did(dis)?;
        let discrimination = &mut self.discriminations[did];
        discrimination.default_class = match class {
            None => None,
            Some(name) => Some(
                discrimination
                    .find_class(name)
                    .ok_or_else(|| PlrmError::UnknownClass {
                        discrimination: discrimination.name.clone(),
                        class: name.to_string(),
                    })?
                    .pos,
            ),
        };
        Ok(())
    }

    /// Remove a discriminação `dis` de todos os lugares: lista, blocos dos learners e colunas
    /// dos priors. Devolve o mapa aplicado ao espaço global de classes, para que o chamador
    /// reindexe estruturas próprias (por exemplo um [`Scores`]).
    pub fn delete_discrimination(&mut self, dis: DisId) -> Result<RenumMap> {
        let did = self.require_did(dis)?;
        let offset = self.class_offset(did);
        let count = self.discriminations[did].class_count();
        let map = RenumMap::deleting(self.total_classes(), offset..offset + count)?;
        if let Some(priors) = &mut self.priors {
            priors.renumber(&map)?;
        }
        let removed = self.discriminations.remove(did);
        for learner in &mut self.learners {
            learner.remove_block(did);
        }
        tracing::debug!(
            suite = %self.name,
            discrimination = %removed.name,
            classes = count,
            "discriminação removida"
        );
        Ok(map)
    }

    /// Verifica que `class` aponta para uma classe existente.
    pub fn check_class(&self, class: ClassRef) -> Result<()> {
        let dis = self
            .discrimination_by_id(class.dis)
            .ok_or(PlrmError::StaleClass { dis: class.dis.0 })?;
        if class.pos >= dis.class_count() {
            return Err(PlrmError::UnknownClass {
                discrimination: dis.name.clone(),
                class: format!("#{}", class.pos),
            });
        }
        Ok(())
    }

    /// Resolve um rótulo `"Discriminação:Classe"` sem criar nada.
    pub fn resolve_label_existing(&self, label: &str) -> Result<ClassRef> {
        let (dis_name, class_name) = split_label(label)?;
        let dis = self
            .find_discrimination(dis_name)
            .ok_or_else(|| PlrmError::UnknownDiscrimination {
                name: dis_name.to_string(),
            })?;
        dis.find_class(class_name).ok_or_else(|| PlrmError::UnknownClass {
            discrimination: dis_name.to_string(),
            class: class_name.to_string(),
        })
    }

    /// Resolve um rótulo `"Discriminação:Classe"`.
    ///
    /// Com `create`, discriminação e classe desconhecidas são criadas (modo definicional).
    pub fn resolve_label(&mut self, label: &str, create: bool) -> Result<ClassRef> {
        if !create {
            return self.resolve_label_existing(label);
        }
        let (dis_name, class_name) = split_label(label)?;
        let dis = match self.find_discrimination(dis_name) {
            Some(d) => d.id,
            None => self.add_discrimination(dis_name)?,
        };
        let existing = self
            .discrimination_by_id(dis)
            .and_then(|d| d.find_class(class_name));
        match existing {
            Some(class) => Ok(class),
            None => self.add_class(dis, class_name),
        }
    }

    /// Nome `"Discriminação:Classe"` de uma classe.
    pub fn class_label(&self, class: ClassRef) -> Option<String> {
        let dis = self.discrimination_by_id(class.dis)?;
        let c = dis.class(class.pos)?;
        Some(format!("{}:{}", dis.name, c.name))
    }

    pub fn total_classes(&self) -> usize {
        self.discriminations.iter().map(Discrimination::class_count).sum()
    }

    /// Primeiro id global das classes da discriminação na posição `did`.
    pub fn class_offset(&self, did: usize) -> usize {
        self.discriminations[..did.min(self.discriminations.len())]
            .iter()
            .map(Discrimination::class_count)
            .sum()
    }

    pub fn global_class_id(&self, class: ClassRef) -> Option<usize> {
        let did = self.did_of(class.dis)?;
        (class.pos < self.discriminations[did].class_count()).then(|| self.class_offset(did) + class.pos)
    }

    // --- Priors ---

    pub fn priors(&self) -> Option<&Priors> {
        self.priors.as_ref()
    }

    /// Anexa priors. As colunas precisam cobrir o espaço global de classes atual e nenhum
    /// learner anexado pode ser incompatível com regularização.
    pub fn set_priors(&mut self, priors: Priors) -> Result<()> {
        if priors.class_columns() != self.total_classes() {
            return Err(PlrmError::Renumbering(format!(
                "priors com {} colunas de classe, a suite tem {}",
                priors.class_columns(),
                self.total_classes()
            )));
        }
        for learner in &self.learners {
            learner.spec().validate(priors.is_regularizing())?;
        }
        self.priors = Some(priors);
        Ok(())
    }

    pub fn clear_priors(&mut self) {
        self.priors = None;
    }

    /// Resolve um documento de priors (nomes) contra a suite e o anexa.
    pub fn load_priors(&mut self, doc: &PriorsDoc) -> Result<()> {
        let priors = Priors::from_doc(doc, self)?;
        self.set_priors(priors)
    }

    pub fn priors_doc(&self) -> Option<PriorsDoc> {
        self.priors.as_ref().map(|p| p.to_doc(self))
    }

    // --- Learners ---

    pub fn learners(&self) -> &[Learner] {
        &self.learners
    }

    pub fn learner(&self, index: usize) -> Result<&Learner> {
        self.learners.get(index).ok_or(PlrmError::NoSuchLearner {
            index,
            count: self.learners.len(),
        })
    }

    fn is_regularized(&self) -> bool {
        self.priors.as_ref().is_some_and(Priors::is_regularizing)
    }

    /// Anexa um learner novo, com um bloco vazio por discriminação. Devolve seu índice.
    pub fn add_learner(&mut self, spec: LearnerSpec) -> Result<usize> {
        self.add_named_learner(spec.kind().name(), spec)
    }

    pub fn add_named_learner(&mut self, name: &str, spec: LearnerSpec) -> Result<usize> {
        spec.validate(self.is_regularized())?;
        let dis_ids: Vec<DisId> = self.discriminations.iter().map(|d| d.id).collect();
        let learner = Learner::new(name, spec, self.config.verbosity, &dis_ids);
        self.learners.push(learner);
        tracing::debug!(suite = %self.name, learner = name, "learner anexado");
        Ok(self.learners.len() - 1)
    }

    pub(crate) fn push_learner(&mut self, learner: Learner) {
        self.learners.push(learner);
    }

    pub fn delete_all_learners(&mut self) {
        self.learners.clear();
    }

    fn train_context(&self) -> TrainContext<'_> {
        TrainContext {
            discriminations: &self.discriminations,
            priors: self.priors.as_ref(),
            feature_count: self.dictionary.len(),
        }
    }

    /// Treina o learner `index` com os exemplos dados, na ordem dada, numa única chamada.
    pub fn absorb(&mut self, index: usize, points: &[&DataPoint]) -> Result<AbsorbStats> {
        let count = self.learners.len();
        let ctx = TrainContext {
            discriminations: &self.discriminations,
            priors: self.priors.as_ref(),
            feature_count: self.dictionary.len(),
        };
        let learner = self
            .learners
            .get_mut(index)
            .ok_or(PlrmError::NoSuchLearner { index, count })?;
        learner.absorb(&ctx, points)
    }

    /// Treina o learner com um único exemplo.
    pub fn absorb_example(&mut self, index: usize, point: &DataPoint) -> Result<AbsorbStats> {
        self.absorb(index, &[point])
    }

    /// Treina o learner com `points[from..to]`, preservando a ordem.
    pub fn absorb_range(&mut self, index: usize, points: &[DataPoint], from: usize, to: usize) -> Result<AbsorbStats> {
        let slice = points.get(from..to).ok_or_else(|| {
            PlrmError::MalformedDocument(format!(
                "intervalo {from}..{to} fora dos {} exemplos",
                points.len()
            ))
        })?;
        let refs: Vec<&DataPoint> = slice.iter().collect();
        self.absorb(index, &refs)
    }

    /// Treina por várias passadas segundo `schedule`, registrando a log-verossimilhança de
    /// treino ao fim de cada passada.
    pub fn train(&mut self, index: usize, points: &[DataPoint], schedule: &Schedule) -> Result<TrainingReport> {
        let spec = *self.learner(index)?.spec();
        schedule.validate(&spec)?;
        spec.validate(self.is_regularized())?;

        let verbosity = self.config.verbosity;
        let mut report = TrainingReport::default();
        for (pass, order) in schedule.orders(points.len()).into_iter().enumerate() {
            let refs: Vec<&DataPoint> = order.iter().map(|&i| &points[i]).collect();
            let stats = self.absorb(index, &refs)?;
            let log_likelihood = self.log_likelihood(index, points)?;
            if verbosity >= Verbosity::Verbose {
                tracing::info!(
                    learner = index,
                    pass,
                    log_likelihood,
                    skipped = stats.skipped_labels,
                    "passada concluída"
                );
            }
            report.sd_traces.extend(stats.sd_traces);
            report.passes.push(PassReport {
                pass,
                examples: stats.examples,
                skipped_labels: stats.skipped_labels,
                log_likelihood,
            });
        }
        if verbosity >= Verbosity::Normal {
            tracing::info!(
                learner = index,
                passes = report.passes.len(),
                final_log_likelihood = report.final_log_likelihood(),
                "treino concluído"
            );
        }
        Ok(report)
    }

    // --- Scoring ---

    /// Log-probabilidades do learner `index` para `point`: um vetor por discriminação.
    pub fn apply_model_log(&self, index: usize, point: &DataPoint) -> Result<Vec<Vec<f64>>> {
        let learner = self.learner(index)?;
        Ok(learner.apply_model_log(&self.train_context(), point))
    }

    /// Probabilidades (espaço linear) do learner `index` para `point`.
    pub fn apply_model(&self, index: usize, point: &DataPoint) -> Result<Vec<Vec<f64>>> {
        Ok(self
            .apply_model_log(index, point)?
            .into_iter()
            .map(|row| row.into_iter().map(f64::exp).collect())
            .collect())
    }

    /// Pontua vários exemplos em paralelo (somente leitura). O resultado segue a ordem de `points`.
    pub fn score_all(&self, index: usize, points: &[DataPoint]) -> Result<Vec<Vec<Vec<f64>>>> {
        let learner = self.learner(index)?;
        let ctx = self.train_context();
        Ok(points
            .par_iter()
            .map(|p| learner.apply_model_log(&ctx, p))
            .collect())
    }

    /// Soma de $\log P(\text{classe verdadeira})$ sobre exemplos e discriminações rotuladas.
    pub fn log_likelihood(&self, index: usize, points: &[DataPoint]) -> Result<f64> {
        let scored = self.score_all(index, points)?;
        let mut total = 0.0;
        for (point, log_probs) in points.iter().zip(&scored) {
            for (dis, row) in self.discriminations.iter().zip(log_probs) {
                if let Some(truth) = point.class_in(dis) {
                    total += row[truth];
                }
            }
        }
        Ok(total)
    }

    /// Avalia o learner sobre `points`, acumulando num [`Scores`] novo.
    pub fn evaluate(&self, index: usize, points: &[DataPoint]) -> Result<Scores> {
        let scored = self.score_all(index, points)?;
        let mut scores = Scores::new(self);
        for (point, log_probs) in points.iter().zip(&scored) {
            scores.eval_scores(self, point, log_probs)?;
            scores.add_log_lin_lik(self, point, log_probs);
        }
        Ok(scores)
    }

    pub fn memory_estimate(&self) -> Vec<MemoryEstimate> {
        self.learners
            .iter()
            .map(|l| MemoryEstimate {
                learner: l.name().to_string(),
                bytes: l.memory_estimate(),
            })
            .collect()
    }

    /// Monta uma suite vazia com as mesmas discriminações, classes e dicionário.
    pub(crate) fn restore(
        name: String,
        config: SuiteConfig,
        dictionary: FeatureDictionary,
        discriminations: Vec<(String, Vec<String>, Option<String>)>,
    ) -> Result<Self> {
        let mut suite = Self::new(name, config);
        suite.replace_dictionary(dictionary)?;
        for (dis_name, classes, default) in discriminations {
            let dis = suite.add_discrimination(&dis_name)?;
            for class in &classes {
                suite.add_class(dis, class)?;
            }
            if default.is_some() {
                suite.set_default_class(dis, default.as_deref())?;
            }
        }
        Ok(suite)
    }
}

/// Separa `"Discriminação:Classe"` no primeiro `:`.
pub fn split_label(label: &str) -> Result<(&str, &str)> {
    match label.split_once(':') {
        Some((dis, class)) if !dis.trim().is_empty() && !class.trim().is_empty() => {
            Ok((dis.trim(), class.trim()))
        }
        _ => Err(PlrmError::MalformedDocument(format!(
            "rótulo '{label}' não está no formato Discriminação:Classe"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priors::PriorTerm;

    fn suite() -> Suite {
        let mut suite = Suite::new("teste", SuiteConfig::default());
        suite.resolve_label("Cor:Azul", true).unwrap();
        suite.resolve_label("Cor:Verde", true).unwrap();
        suite.resolve_label("Forma:Bola", true).unwrap();
        suite.resolve_label("Forma:Cubo", true).unwrap();
        suite.resolve_label("Forma:Cone", true).unwrap();
        suite.resolve_label("Peso:Leve", true).unwrap();
        suite
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut s = suite();
        assert!(matches!(
            s.add_discrimination("Cor"),
            Err(PlrmError::DuplicateDiscrimination { .. })
        ));
        let cor = s.find_discrimination("Cor").unwrap().id();
        assert!(matches!(s.add_class(cor, "Azul"), Err(PlrmError::DuplicateClass { .. })));
    }

    #[test]
    fn test_global_class_ids() {
        let s = suite();
        assert_eq!(s.total_classes(), 6);
        let cubo = s.find_discrimination("Forma").unwrap().find_class("Cubo").unwrap();
        assert_eq!(s.global_class_id(cubo), Some(3));
        assert_eq!(s.class_label(cubo).as_deref(), Some("Forma:Cubo"));
    }

    #[test]
    fn test_resolve_label_without_create() {
        let mut s = suite();
        assert!(matches!(
            s.resolve_label("Tamanho:Grande", false),
            Err(PlrmError::UnknownDiscrimination { .. })
        ));
        assert!(matches!(
            s.resolve_label("Cor:Roxo", false),
            Err(PlrmError::UnknownClass { .. })
        ));
        assert!(s.resolve_label("sem-separador", true).is_err());
    }

    #[test]
    fn test_delete_discrimination_keeps_other_ids_valid() {
        let mut s = suite();
        let leve = s.resolve_label("Peso:Leve", false).unwrap();
        let forma = s.find_discrimination("Forma").unwrap().id();
        let bola = s.resolve_label("Forma:Bola", false).unwrap();

        let map = s.delete_discrimination(forma).unwrap();
        assert_eq!(map.old_len(), 6);
        assert_eq!(map.new_len(), 3);
        assert_eq!(map.get(5), Some(2));

        assert_eq!(s.global_class_id(leve), Some(2));
        assert_eq!(s.did_of_class(leve), Some(1));
        assert_eq!(s.did_of_class(bola), None);
        assert!(s.check_class(leve).is_ok());
        assert!(matches!(s.check_class(bola), Err(PlrmError::StaleClass { .. })));
        // o id nunca é reutilizado
        let nova = s.add_discrimination("Forma").unwrap();
        assert_ne!(nova, forma);
    }

    #[test]
    fn test_priors_follow_class_insertion() {
        let mut s = suite();
        let mut priors = Priors::new(s.total_classes());
        let leve = s.resolve_label("Peso:Leve", false).unwrap();
        let term = PriorTerm { mode: 0.5, l1: 0.0, l2: 1.0 };
        priors.set_class(s.global_class_id(leve).unwrap(), term);
        s.set_priors(priors).unwrap();

        let cor = s.find_discrimination("Cor").unwrap().id();
        let (roxo, map) = s.add_class_with_map(cor, "Roxo").unwrap();
        assert_eq!(s.global_class_id(roxo), Some(2));
        assert_eq!((map.old_len(), map.new_len()), (6, 7));
        assert_eq!(map.get(2), Some(3));
        assert_eq!(s.global_class_id(leve), Some(6));
        assert_eq!(s.priors().unwrap().term(1, 6), term);
        assert_eq!(s.priors().unwrap().term(1, 5), PriorTerm::default());
    }

    #[test]
    fn test_learners_get_blocks_for_new_discriminations() {
        let mut s = suite();
        let idx = s.add_learner(LearnerSpec::default()).unwrap();
        assert_eq!(s.learner(idx).unwrap().blocks().len(), 3);
        s.add_discrimination("Material").unwrap();
        assert_eq!(s.learner(idx).unwrap().blocks().len(), 4);
        let cor = s.find_discrimination("Cor").unwrap().id();
        s.delete_discrimination(cor).unwrap();
        let learner = s.learner(idx).unwrap();
        assert_eq!(learner.blocks().len(), 3);
        assert!(learner.find_block_for_dis(cor).is_none());
        assert!(matches!(s.learner(7), Err(PlrmError::NoSuchLearner { index: 7, count: 1 })));
    }
}
