//! Prediction client against an in-process mock backend.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use gp_predictor::config::{resolve_endpoint, ApiConfig, MissingProbability};
use gp_predictor::engine::features::{derive, RawInputs};
use gp_predictor::engine::ConfidenceBand;
use gp_predictor::predictor::error::PredictError;
use gp_predictor::predictor::types::ResponseBody;
use gp_predictor::predictor::{PredictionBackend, PredictionClient};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn spawn_backend(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(url: &str, api: ApiConfig) -> PredictionClient {
    let (endpoint, rejected) = resolve_endpoint(Some(url), None);
    assert!(rejected.is_empty());
    PredictionClient::new(endpoint, &api).unwrap()
}

fn fast_api() -> ApiConfig {
    ApiConfig {
        request_timeout_ms: 300,
        health_timeout_ms: 300,
        ..ApiConfig::default()
    }
}

#[derive(Clone, Default)]
struct Captured {
    body: Arc<Mutex<Option<Value>>>,
    content_type: Arc<Mutex<Option<String>>>,
}

async fn capture_predict(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    *captured.content_type.lock().unwrap() = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *captured.body.lock().unwrap() = Some(body);
    Json(json!({ "winner_probability": 0.27, "model_version": "v3" }))
}

#[tokio::test]
async fn test_predict_posts_twenty_features_as_json() {
    let captured = Captured::default();
    let app = Router::new()
        .route("/predict", post(capture_predict))
        .with_state(captured.clone());
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let vector = derive(&RawInputs::default()).unwrap();
    let result = client.predict(&vector).await.unwrap();

    assert_eq!(result.winner_probability, 0.27);
    assert!(!result.defaulted);
    assert_eq!(result.band(), ConfidenceBand::Podium);
    assert_eq!(result.body["model_version"], "v3");

    let body = captured.body.lock().unwrap().clone().unwrap();
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 20);
    assert_eq!(features[0], 2025.0);
    assert_eq!(features[1], 5.0);
    assert_eq!(features[19], 0.0);
    assert_eq!(
        captured.content_type.lock().unwrap().as_deref(),
        Some("application/json")
    );
}

#[tokio::test]
async fn test_empty_object_yields_zero_probability() {
    let app = Router::new().route("/predict", post(|| async { Json(json!({})) }));
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let vector = derive(&RawInputs::default()).unwrap();
    let result = client.predict(&vector).await.unwrap();
    assert_eq!(result.winner_probability, 0.0);
    assert!(result.defaulted);
    assert_eq!(result.band(), ConfidenceBand::MidPack);
}

#[tokio::test]
async fn test_empty_object_is_malformed_under_strict_policy() {
    let app = Router::new().route("/predict", post(|| async { Json(json!({})) }));
    let addr = spawn_backend(app).await;
    let api = ApiConfig {
        missing_probability: MissingProbability::Error,
        ..fast_api()
    };
    let client = client_for(&format!("http://{}/predict", addr), api);

    let vector = derive(&RawInputs::default()).unwrap();
    let err = client.predict(&vector).await.unwrap_err();
    assert!(matches!(err, PredictError::MalformedResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_non_200_keeps_json_diagnostic() {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": "expected 20 features" })),
            )
        }),
    );
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let vector = derive(&RawInputs::default()).unwrap();
    match client.predict(&vector).await {
        Err(PredictError::Status { status, body }) => {
            assert_eq!(status, 422);
            assert_eq!(body, ResponseBody::Json(json!({ "detail": "expected 20 features" })));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_200_keeps_text_diagnostic() {
    let app = Router::new().route(
        "/predict",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream sleeping".to_string()) }),
    );
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let vector = derive(&RawInputs::default()).unwrap();
    let err = client.predict(&vector).await.unwrap_err();
    assert_eq!(err.kind(), "STATUS");
    assert_eq!(
        err.diagnostic(),
        Some(&ResponseBody::Text("upstream sleeping".to_string()))
    );
}

#[tokio::test]
async fn test_non_json_success_body_is_malformed() {
    let app = Router::new().route("/predict", post(|| async { "<html>ok</html>" }));
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let vector = derive(&RawInputs::default()).unwrap();
    let err = client.predict(&vector).await.unwrap_err();
    assert!(matches!(err, PredictError::MalformedResponse { .. }), "got {err:?}");
    let shown = err.diagnostic().map(|b| b.to_string()).unwrap_or_default();
    assert!(shown.contains("<html>ok</html>"), "diagnostic was {shown:?}");
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let app = Router::new().route(
        "/predict",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "winner_probability": 0.9 }))
        }),
    );
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let vector = derive(&RawInputs::default()).unwrap();
    let err = client.predict(&vector).await.unwrap_err();
    match &err {
        PredictError::Timeout { timeout, .. } => assert_eq!(*timeout, Duration::from_millis(300)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(err.kind(), "TIMEOUT");
}

#[tokio::test]
async fn test_refused_connection_is_distinct_from_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}/predict", addr), fast_api());
    let vector = derive(&RawInputs::default()).unwrap();
    let err = client.predict(&vector).await.unwrap_err();
    assert!(matches!(err, PredictError::Connection { .. }), "got {err:?}");
    assert_eq!(err.kind(), "CONNECTION");
}

#[tokio::test]
async fn test_default_request_timeout_is_ten_seconds() {
    assert_eq!(ApiConfig::default().request_timeout(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_health_uses_sibling_path() {
    let app = Router::new()
        .route("/api/predict", post(|| async { Json(json!({})) }))
        .route("/api/health", get(|| async { Json(json!({ "status": "ok", "model_loaded": true })) }));
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/api/predict", addr), fast_api());

    let report = client.health().await.unwrap();
    assert_eq!(report.status, 200);
    assert_eq!(
        report.body,
        ResponseBody::Json(json!({ "status": "ok", "model_loaded": true }))
    );
}

#[tokio::test]
async fn test_health_missing_route_is_status_error() {
    let app = Router::new().route("/predict", post(|| async { Json(json!({})) }));
    let addr = spawn_backend(app).await;
    let client = client_for(&format!("http://{}/predict", addr), fast_api());

    let err = client.health().await.unwrap_err();
    assert!(matches!(err, PredictError::Status { status: 404, .. }), "got {err:?}");
}
