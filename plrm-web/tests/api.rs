use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use plrm_core::{tiny_docs, LearnerSpec, Suite, SuiteConfig, SuiteMode};
use plrm_web::{app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> Router {
    let config = SuiteConfig {
        mode: SuiteMode { definitional: true },
        ..SuiteConfig::default()
    };
    let state = AppState::new(Suite::new("api", config), LearnerSpec::default());
    app(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn tiny() -> Value {
    serde_json::to_value(tiny_docs()).unwrap()
}

async fn trained_app(passes: usize) -> Router {
    let app = test_app();
    let (status, _) = send(&app, "POST", "/learners", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &app,
        "POST",
        "/train",
        Some(json!({ "learner": 0, "dataset": tiny(), "schedule": { "passes": passes } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    app
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["suite"], "api");
    assert_eq!(body["learners"], 0);
}

#[tokio::test]
async fn test_train_then_score() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/learners", Some(json!({ "learner_type": "eg" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], 0);
    assert_eq!(body["spec"]["type"], "exponentiated_gradient");

    let (status, body) = send(
        &app,
        "POST",
        "/train",
        Some(json!({ "learner": 0, "dataset": tiny(), "schedule": { "order": { "kind": "random", "seed": 7 }, "passes": 3 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["examples"], 7);
    assert_eq!(body["passes"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, "POST", "/score", Some(json!({ "learner": 0, "dataset": tiny() }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let examples = body["examples"].as_array().unwrap();
    assert_eq!(examples.len(), 7);
    for example in examples {
        let row = example["log_probs"][0].as_array().unwrap();
        let total: f64 = row.iter().map(|l| l.as_f64().unwrap().exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(example["predicted"][0].as_str().unwrap().starts_with("Kind:"));
    }
    assert_eq!(body["summary"]["labeled"], 7);

    let (_, learners) = send(&app, "GET", "/learners", None).await;
    assert_eq!(learners[0]["examples_absorbed"], 21);
    assert!(learners[0]["memory_bytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_unknown_learner_type_is_bad_request() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/learners", Some(json!({ "learner_type": "svm" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("svm"));
}

#[tokio::test]
async fn test_missing_learner_is_bad_request() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/train", Some(json!({ "learner": 3, "dataset": tiny() }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_shrunk_dictionary_is_conflict() {
    let app = trained_app(1).await;
    let (status, body) = send(
        &app,
        "POST",
        "/score",
        Some(json!({ "learner": 0, "dataset": tiny(), "expected_features": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("1000"));
}

#[tokio::test]
async fn test_score_does_not_grow_dictionary() {
    let app = trained_app(1).await;
    let (_, before) = send(&app, "GET", "/health", None).await;
    assert_eq!(before["features"], 4);

    let dataset = json!({ "examples": [
        { "name": "novo", "labels": ["Kind:WIDGET", "Cor:Azul"], "features": { "Size": 2.0, "Cheiro": 1.0, "Brilho": 3.0 } }
    ] });
    let (status, body) = send(&app, "POST", "/score", Some(json!({ "learner": 0, "dataset": dataset.clone() }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ignored_features"], 2);
    assert_eq!(body["ignored_labels"], 1);
    assert_eq!(body["examples"][0]["log_probs"][0].as_array().unwrap().len(), 2);

    let (_, after) = send(&app, "GET", "/health", None).await;
    assert_eq!(after["features"], 4);
    assert_eq!(after["discriminations"], 1);

    let (status, body) = send(
        &app,
        "POST",
        "/score",
        Some(json!({ "learner": 0, "dataset": dataset, "policy": "definitional" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_complex_round_trip() {
    let app = trained_app(2).await;
    let (status, first) = send(&app, "GET", "/complex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["format"], "plrm-learner-complex");

    let (status, body) = send(&app, "PUT", "/complex", Some(first.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["learners"], 1);

    let (_, second) = send(&app, "GET", "/complex", None).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_delete_discrimination() {
    let app = trained_app(1).await;
    let (status, body) = send(&app, "DELETE", "/discriminations/Kind", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classes_before"], 2);
    assert_eq!(body["classes_after"], 0);

    let (status, _) = send(&app, "DELETE", "/discriminations/Kind", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_put_suite_drops_learners() {
    let app = trained_app(1).await;
    let (status, doc) = send(&app, "GET", "/suite", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "PUT", "/suite", Some(doc)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["discriminations"], 1);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["learners"], 0);
    assert_eq!(health["features"], 1);
}

#[tokio::test]
async fn test_delete_learners() {
    let app = trained_app(1).await;
    let (status, body) = send(&app, "DELETE", "/learners", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 1);
}
