//! Servidor HTTP que hospeda uma [`Suite`] em memória.
//!
//! A suite fica atrás de um `tokio::sync::RwLock`: treino, troca de documentos e
//! mudanças estruturais pegam o lock de escrita; consultas e scoring pegam o de leitura.
//! Treino e scoring rodam em `spawn_blocking` para não travar o runtime.

pub mod config;
pub mod error;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use plrm_core::scores::argmax;
use plrm_core::{
    parse_dataset, parse_dataset_frozen, DatasetDoc, EvaluationSummary, LearnerComplex, LearnerKind, LearnerSpec, ParseOptions,
    ParsePolicy, Schedule, Scores, Suite, SuiteDoc, TrainingReport,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::ApiError;

/// Estado compartilhado entre os handlers.
pub struct AppState {
    suite: Arc<RwLock<Suite>>,
    default_learner: LearnerSpec,
}

impl AppState {
    pub fn new(suite: Suite, default_learner: LearnerSpec) -> Self {
        Self {
            suite: Arc::new(RwLock::new(suite)),
            default_learner,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(Suite::new(config.suite_name.as_str(), config.suite), config.default_learner)
    }

    pub fn suite(&self) -> &Arc<RwLock<Suite>> {
        &self.suite
    }
}

/// Monta o roteador com CORS aberto e trace de requisições.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/suite", get(get_suite_handler).put(put_suite_handler))
        .route(
            "/learners",
            get(list_learners_handler)
                .post(add_learner_handler)
                .delete(delete_learners_handler),
        )
        .route("/discriminations/:name", delete(delete_discrimination_handler))
        .route("/train", post(train_handler))
        .route("/score", post(score_handler))
        .route("/complex", get(get_complex_handler).put(put_complex_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let suite = state.suite.read().await;
    Json(json!({
        "status": "ok",
        "suite": suite.name(),
        "discriminations": suite.discriminations().len(),
        "features": suite.dictionary().len(),
        "learners": suite.learners().len(),
    }))
}

// --- Suite ---

async fn get_suite_handler(State(state): State<Arc<AppState>>) -> Json<SuiteDoc> {
    let suite = state.suite.read().await;
    Json(SuiteDoc::from_suite(&suite))
}

/// Substitui a suite inteira. Learners anteriores são descartados.
async fn put_suite_handler(
    State(state): State<Arc<AppState>>,
    Json(doc): Json<SuiteDoc>,
) -> Result<Json<Value>, ApiError> {
    let replacement = doc.to_suite()?;
    let mut suite = state.suite.write().await;
    *suite = replacement;
    tracing::info!(suite = suite.name(), "suite substituída");
    Ok(Json(json!({
        "suite": suite.name(),
        "discriminations": suite.discriminations().len(),
    })))
}

// --- Learners ---

/// Pedido de `POST /learners`: uma spec completa, um nome de tipo, ou nada (usa o padrão).
#[derive(Debug, Default, Deserialize)]
pub struct AddLearnerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub spec: Option<LearnerSpec>,
    #[serde(default)]
    pub learner_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LearnerSummary {
    pub index: usize,
    pub name: String,
    pub kind: LearnerKind,
    pub examples_absorbed: u64,
    pub memory_bytes: usize,
}

async fn list_learners_handler(State(state): State<Arc<AppState>>) -> Json<Vec<LearnerSummary>> {
    let suite = state.suite.read().await;
    let memory = suite.memory_estimate();
    let learners = suite
        .learners()
        .iter()
        .zip(memory)
        .enumerate()
        .map(|(index, (learner, estimate))| LearnerSummary {
            index,
            name: learner.name().to_string(),
            kind: learner.kind(),
            examples_absorbed: learner.examples_absorbed(),
            memory_bytes: estimate.bytes,
        })
        .collect();
    Json(learners)
}

async fn add_learner_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddLearnerRequest>,
) -> Result<Json<Value>, ApiError> {
    let spec = match (req.spec, req.learner_type.as_deref()) {
        (Some(spec), _) => spec,
        (None, Some(type_name)) => LearnerSpec::from_name(type_name)?,
        (None, None) => state.default_learner,
    };
    let name = req.name.unwrap_or_else(|| spec.kind().name().to_string());
    let mut suite = state.suite.write().await;
    let index = suite.add_named_learner(&name, spec)?;
    Ok(Json(json!({ "index": index, "name": name, "spec": spec })))
}

async fn delete_learners_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut suite = state.suite.write().await;
    let deleted = suite.learners().len();
    suite.delete_all_learners();
    Json(json!({ "deleted": deleted }))
}

async fn delete_discrimination_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut suite = state.suite.write().await;
    let dis = suite
        .find_discrimination(&name)
        .map(|d| d.id())
        .ok_or_else(|| plrm_core::PlrmError::UnknownDiscrimination { name: name.clone() })?;
    let map = suite.delete_discrimination(dis)?;
    tracing::info!(discrimination = %name, "discriminação removida");
    Ok(Json(json!({
        "deleted": name,
        "classes_before": map.old_len(),
        "classes_after": map.new_len(),
    })))
}

// --- Treino e scoring ---

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub learner: usize,
    pub dataset: DatasetDoc,
    #[serde(default)]
    pub schedule: Schedule,
    /// Sem política explícita, vale o modo da suite.
    #[serde(default)]
    pub policy: Option<ParsePolicy>,
    #[serde(default)]
    pub expected_features: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrainResponse {
    pub examples: usize,
    pub ignored_labels: usize,
    #[serde(flatten)]
    pub report: TrainingReport,
}

async fn train_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrainRequest>,
) -> Result<Json<TrainResponse>, ApiError> {
    let mut suite = state.suite.clone().write_owned().await;
    let response = tokio::task::spawn_blocking(move || -> plrm_core::Result<TrainResponse> {
        let options = parse_options(&suite, req.policy, req.expected_features);
        let parsed = parse_dataset(&req.dataset, &mut suite, options)?;
        let report = suite.train(req.learner, &parsed.points, &req.schedule)?;
        Ok(TrainResponse {
            examples: parsed.points.len(),
            ignored_labels: parsed.ignored_labels,
            report,
        })
    })
    .await??;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub learner: usize,
    pub dataset: DatasetDoc,
    /// Padrão `lenient`. `strict` também vale; `definitional` é rejeitada.
    #[serde(default)]
    pub policy: Option<ParsePolicy>,
    #[serde(default)]
    pub expected_features: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoredExample {
    pub name: String,
    /// Log-probabilidades, uma linha por discriminação.
    pub log_probs: Vec<Vec<f64>>,
    /// Classe mais provável de cada discriminação, como `Discriminação:Classe`.
    pub predicted: Vec<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub examples: Vec<ScoredExample>,
    /// Features fora do dicionário, descartadas na leitura.
    pub ignored_features: usize,
    pub ignored_labels: usize,
    pub summary: EvaluationSummary,
}

async fn score_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let suite = state.suite.clone().read_owned().await;
    let response = tokio::task::spawn_blocking(move || -> plrm_core::Result<ScoreResponse> {
        let options = ParseOptions {
            policy: req.policy.unwrap_or(ParsePolicy::Lenient),
            expected_features: req.expected_features,
        };
        let parsed = parse_dataset_frozen(&req.dataset, &suite, options)?;

        let scored = suite.score_all(req.learner, &parsed.points)?;
        let mut scores = Scores::new(&suite);
        let mut examples = Vec::with_capacity(scored.len());
        for (point, log_probs) in parsed.points.iter().zip(scored) {
            scores.eval_scores(&suite, point, &log_probs)?;
            scores.add_log_lin_lik(&suite, point, &log_probs);
            let predicted = suite
                .discriminations()
                .iter()
                .zip(&log_probs)
                .map(|(dis, row)| {
                    argmax(row)
                        .and_then(|pos| dis.class(pos))
                        .map(|class| format!("{}:{}", dis.name(), class.name()))
                })
                .collect();
            examples.push(ScoredExample {
                name: point.name().to_string(),
                log_probs,
                predicted,
            });
        }
        Ok(ScoreResponse {
            examples,
            ignored_features: parsed.ignored_features,
            ignored_labels: parsed.ignored_labels,
            summary: scores.summary(&suite),
        })
    })
    .await??;
    Ok(Json(response))
}

fn parse_options(suite: &Suite, policy: Option<ParsePolicy>, expected_features: Option<usize>) -> ParseOptions {
    let mut options = ParseOptions::for_suite(suite);
    if let Some(policy) = policy {
        options.policy = policy;
    }
    options.expected_features = expected_features;
    options
}

// --- Learner complex ---

async fn get_complex_handler(State(state): State<Arc<AppState>>) -> Json<LearnerComplex> {
    let suite = state.suite.read().await;
    Json(LearnerComplex::from_suite(&suite))
}

/// Substitui a suite pelo conteúdo de um learner complex (validado por inteiro antes).
async fn put_complex_handler(
    State(state): State<Arc<AppState>>,
    Json(complex): Json<LearnerComplex>,
) -> Result<Json<Value>, ApiError> {
    let replacement = complex.to_suite()?;
    let mut suite = state.suite.write().await;
    *suite = replacement;
    tracing::info!(suite = suite.name(), learners = suite.learners().len(), "learner complex carregado");
    Ok(Json(json!({
        "suite": suite.name(),
        "learners": suite.learners().len(),
    })))
}
