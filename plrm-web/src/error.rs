//! Conversão de erros do núcleo em respostas HTTP com corpo JSON.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use plrm_core::PlrmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Plrm(#[from] PlrmError),
    #[error("tarefa de treino interrompida: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Plrm(e) if e.is_consistency() => StatusCode::CONFLICT,
            ApiError::Plrm(_) => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "falha interna");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "requisição rejeitada");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_by_family() {
        let conflict: ApiError = PlrmError::DictionaryShrunk { expected: 9, actual: 2 }.into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let bad: ApiError = PlrmError::UnknownLearner { name: "svm".into() }.into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
