//! # plrm-core — Regressão Logística Multinomial Online, Multitarefa
//!
//! Este crate treina, de forma incremental, um ou mais classificadores ("learners") sobre
//! um espaço de features esparso compartilhado. Cada classificador resolve várias tarefas
//! independentes ("discriminações"), cada uma com suas classes mutuamente exclusivas.
//!
//! ## Arquitetura
//!
//! ```text
//! Suite
//!  ├── FeatureDictionary      nome ↔ id (id 0 = viés)
//!  ├── Discrimination[]       classes + classe padrão
//!  ├── Priors?                moda e penalidades L1/L2 por coeficiente
//!  └── Learner[]
//!       └── LearnerBlock[]    um por discriminação
//!            ├── Truncated    SGD + truncagem (esparsificação)
//!            ├── Exponentiated  EG± multiplicativo
//!            └── Trivial      frequências suavizadas
//! ```
//!
//! 1. **Entrada** ([`dataset`], [`adapters`]): documentos viram [`DataPoint`]s contra a suite.
//! 2. **Treino** ([`Suite::absorb`], [`Suite::train`]): os exemplos são absorvidos **na
//!    ordem dada**; os algoritmos online dependem dessa ordem.
//! 3. **Scoring** ([`Suite::apply_model_log`]): log-probabilidades por classe, por
//!    discriminação, calculadas de forma estável ([`scores`]).
//! 4. **Troca** ([`complex`]): o learner complex grava e restaura tudo, bit a bit.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use plrm_core::{parse_dataset, tiny_docs, LearnerSpec, ParseOptions, Schedule, Suite, SuiteConfig, SuiteMode};
//!
//! let config = SuiteConfig { mode: SuiteMode { definitional: true }, ..SuiteConfig::default() };
//! let mut suite = Suite::new("tiny", config);
//! let options = ParseOptions::for_suite(&suite);
//! let points = parse_dataset(&tiny_docs(), &mut suite, options).unwrap().points;
//!
//! let tg = suite.add_learner(LearnerSpec::default()).unwrap();
//! suite.train(tg, &points, &Schedule::cyclic(1)).unwrap();
//!
//! let log_probs = suite.apply_model_log(tg, &points[0]).unwrap();
//! let total: f64 = log_probs[0].iter().map(|l| l.exp()).sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! ```

pub mod adapters;
pub mod beta;
pub mod complex;
pub mod config;
pub mod datapoint;
pub mod dataset;
pub mod error;
pub mod exponentiated;
pub mod features;
pub mod learner;
pub mod priors;
pub mod renum;
pub mod schedule;
pub mod scores;
pub mod suite;
pub mod trivial;
pub mod truncated;

pub use adapters::{FlatFileReader, FlatFormat};
pub use beta::BetaMatrix;
pub use complex::{
    deserialize_learner_complex, deserialize_suite_only, serialize_learner_complex, serialize_suite_only,
    LearnerComplex, SuiteDoc,
};
pub use config::{EgParams, LearnerKind, LearnerSpec, SuiteConfig, SuiteMode, TgMode, TgParams, Verbosity};
pub use datapoint::DataPoint;
pub use dataset::{parse_dataset, parse_dataset_frozen, tiny_docs, DatasetDoc, ExampleDoc, ParseOptions, ParsePolicy, ParsedDataset};
pub use error::{PlrmError, Result};
pub use features::{FeatureDictionary, SparseVector, BIAS_FEATURE, BIAS_ID};
pub use learner::{AbsorbStats, Learner, LearnerBlock, SdTrace};
pub use priors::{PriorTerm, Priors, PriorsDoc};
pub use renum::{RenumMap, Renumber};
pub use schedule::{ExampleOrder, PassReport, Schedule, TrainingReport};
pub use scores::{EvaluationSummary, Scores};
pub use suite::{Class, ClassRef, DisId, Discrimination, MemoryEstimate, Suite};
