//! Router tests against mock ports.
//!
//! Requests go through `tower::ServiceExt::oneshot`, no network server.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use cfmid_api_http::{build_router, AppState, RateLimiter};
use cfmid_core::application::PredictionService;
use cfmid_core::domain::{OutputMode, ToolSettings};
use cfmid_core::port::id_provider::SequentialIdProvider;
use cfmid_core::port::prediction_tool::mocks::{MockBehavior, MockPredictionTool};
use cfmid_core::port::scratch_store::mocks::MockScratchStore;
use cfmid_core::port::time_provider::SystemTimeProvider;

const FORM: &str = "application/x-www-form-urlencoded";

fn app_with(
    tool: Arc<MockPredictionTool>,
    store: Arc<MockScratchStore>,
    mode: OutputMode,
    limiter: RateLimiter,
) -> Router {
    let service = PredictionService::new(
        tool,
        store,
        Arc::new(SequentialIdProvider::new("req")),
        Arc::new(SystemTimeProvider),
        ToolSettings::default(),
        4,
    )
    .with_output_mode(mode);
    build_router(AppState::new(Arc::new(service), limiter))
}

fn app(tool: Arc<MockPredictionTool>, store: Arc<MockScratchStore>) -> Router {
    app_with(tool, store, OutputMode::Buffered, RateLimiter::new(100, 100))
}

fn post_form(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn test_healthz() {
    let app = app(
        Arc::new(MockPredictionTool::new_success()),
        Arc::new(MockScratchStore::with_output("")),
    );

    let request = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_get_predict_is_method_not_allowed() {
    let tool = Arc::new(MockPredictionTool::new_success());
    let app = app(tool.clone(), Arc::new(MockScratchStore::with_output("")));

    for method in ["GET", "PUT", "DELETE"] {
        let request = Request::builder()
            .method(method)
            .uri("/predict")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(body, "Only POST allowed");
    }
    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn test_missing_smiles_is_bad_request() {
    let tool = Arc::new(MockPredictionTool::new_success());
    let app = app(tool.clone(), Arc::new(MockScratchStore::with_output("")));

    let (status, body) = send(&app, post_form("prob_thresh=0.01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing 'smiles' parameter");

    let (status, _) = send(&app, post_form("smiles=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn test_non_form_body_is_bad_request() {
    let app = app(
        Arc::new(MockPredictionTool::new_success()),
        Arc::new(MockScratchStore::with_output("")),
    );

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"smiles":"CCO"}"#))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Bad form data");
}

#[tokio::test]
async fn test_invalid_threshold_is_bad_request() {
    let app = app(
        Arc::new(MockPredictionTool::new_success()),
        Arc::new(MockScratchStore::with_output("")),
    );

    let (status, body) = send(&app, post_form("smiles=CCO&prob_thresh=7")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("probability threshold"));
}

#[tokio::test]
async fn test_buffered_success_returns_output_file() {
    let tool = Arc::new(MockPredictionTool::new_success());
    let store = Arc::new(MockScratchStore::with_output("energy0\n65.0 100.0\n"));
    let app = app(tool.clone(), store.clone());

    let response = app
        .clone()
        .oneshot(post_form("smiles=C1%3DCC%3DCC%3DC1&prob_thresh=0.01"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()["x-request-id"], "req-1");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"energy0\n65.0 100.0\n");

    assert_eq!(store.inputs(), vec!["C1=CC=CC=C1".to_string()]);
    assert_eq!(tool.last_invocation().unwrap().args()[1], "0.01");
    assert_eq!(store.live_spaces(), 0);
}

#[tokio::test]
async fn test_tool_failure_is_server_error_without_output() {
    let store = Arc::new(MockScratchStore::with_output("partial spectrum"));
    let app = app(
        Arc::new(MockPredictionTool::new_exit_code(1, "segfault")),
        store.clone(),
    );

    let (status, body) = send(&app, post_form("smiles=CCO")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Prediction failed");
    assert!(!body.contains("partial"));
    assert_eq!(store.live_spaces(), 0);
}

#[tokio::test]
async fn test_timeout_is_gateway_timeout() {
    let app = app(
        Arc::new(MockPredictionTool::new(MockBehavior::Timeout(30_000))),
        Arc::new(MockScratchStore::with_output("")),
    );

    let (status, body) = send(&app, post_form("smiles=CCO")).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, "Prediction timed out");
}

#[tokio::test]
async fn test_scratch_failure_is_server_error() {
    let tool = Arc::new(MockPredictionTool::new_success());
    let app = app(tool.clone(), Arc::new(MockScratchStore::failing()));

    let (status, body) = send(&app, post_form("smiles=CCO")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Create input file failed"));
    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn test_rate_limited() {
    let tool = Arc::new(MockPredictionTool::new_success());
    let app = app_with(
        tool.clone(),
        Arc::new(MockScratchStore::with_output("x")),
        OutputMode::Buffered,
        RateLimiter::new(1, 0),
    );

    let (status, _) = send(&app, post_form("smiles=CCO")).await;
    assert_eq!(status, StatusCode::OK);

    let response = app.clone().oneshot(post_form("smiles=CCO")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(tool.call_count(), 1);
}

#[tokio::test]
async fn test_streaming_mode_relays_chunks() {
    let tool = Arc::new(MockPredictionTool::new(MockBehavior::Success(vec![
        "warning: kekulization\n".to_string(),
        "energy0\n".to_string(),
    ])));
    let store = Arc::new(MockScratchStore::with_output(""));
    let app = app_with(
        tool,
        store.clone(),
        OutputMode::Streaming,
        RateLimiter::new(100, 100),
    );

    let (status, body) = send(&app, post_form("smiles=CCO")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "warning: kekulization\nenergy0\n");
    assert_eq!(store.live_spaces(), 0);
}

#[tokio::test]
async fn test_healthz_ignores_rate_limit() {
    let app = app_with(
        Arc::new(MockPredictionTool::new_success()),
        Arc::new(MockScratchStore::with_output("x")),
        OutputMode::Buffered,
        RateLimiter::new(1, 0),
    );

    send(&app, post_form("smiles=CCO")).await;
    for _ in 0..3 {
        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_query_string_smiles_is_ignored() {
    let tool = Arc::new(MockPredictionTool::new_success());
    let app = app(tool.clone(), Arc::new(MockScratchStore::with_output("x")));

    let request = Request::builder()
        .method("POST")
        .uri("/predict?smiles=CCO")
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from("prob_thresh=0.01"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Missing 'smiles' parameter");
    assert_eq!(tool.call_count(), 0);
}
