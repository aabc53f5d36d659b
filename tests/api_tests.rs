//! Integration tests for the query endpoint.
//!
//! The inference engine is replaced by scripted [`Generator`] impls so the
//! HTTP layer and request log can be exercised without a model file.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use response_service::inference::{EngineError, Generation, Generator};
use response_service::request_log::RequestLog;
use response_service::server::api::{build_router, AppState};

/// Generator that returns a fixed response and records the prompts it saw.
struct ScriptedGenerator {
    text: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, EngineError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Generation {
            text: self.text.clone(),
            prompt_tokens: 4,
            completion_tokens: 50,
        })
    }
}

/// Generator that always fails.
struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Generation, EngineError> {
        Err(EngineError::Decode("llama_decode returned 1".to_string()))
    }
}

async fn test_app(generator: Arc<dyn Generator>) -> (Router, tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("requests.log");
    let request_log = RequestLog::open(&log_path).await.unwrap();

    let state = Arc::new(AppState {
        generator,
        request_log,
    });

    (build_router(state), dir, log_path)
}

fn post_query(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/zapytanie")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn test_query_returns_generated_text() {
    let generator = Arc::new(ScriptedGenerator::new(
        "Niebo jest niebieskie przez rozpraszanie Rayleigha.",
    ));
    let (app, _dir, _log_path) = test_app(generator.clone()).await;

    let response = app
        .oneshot(post_query("dlaczego niebo jest niebieskie?"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        &body[..],
        "Niebo jest niebieskie przez rozpraszanie Rayleigha.".as_bytes()
    );
    assert_eq!(
        generator.prompts(),
        vec!["dlaczego niebo jest niebieskie?".to_string()]
    );
}

#[tokio::test]
async fn test_query_appends_log_entry() {
    let generator = Arc::new(ScriptedGenerator::new("odpowiedź"));
    let (app, _dir, log_path) = test_app(generator).await;

    let response = app.oneshot(post_query("ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(
        contents,
        "Prompt: ping\nResponse: odpowiedź\n---------------------\n"
    );
}

#[tokio::test]
async fn test_generation_failure_returns_500() {
    let (app, _dir, log_path) = test_app(Arc::new(FailingGenerator)).await;

    let response = app.oneshot(post_query("ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Failed exchanges are not logged.
    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(contents.is_empty());
}

#[tokio::test]
async fn test_empty_body_is_accepted() {
    let generator = Arc::new(ScriptedGenerator::new("something"));
    let (app, _dir, _log_path) = test_app(generator.clone()).await;

    let response = app.oneshot(post_query("")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(generator.prompts(), vec![String::new()]);
}

#[tokio::test]
async fn test_non_utf8_body_is_accepted() {
    let generator = Arc::new(ScriptedGenerator::new("something"));
    let (app, _dir, _log_path) = test_app(generator.clone()).await;

    let response = app
        .oneshot(post_query(vec![0xff, 0xfe, b'a']))
        .await
        .unwrap();

    // Invalid bytes are replaced, not rejected.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(generator.prompts(), vec!["\u{FFFD}\u{FFFD}a".to_string()]);
}

#[tokio::test]
async fn test_sequential_queries_log_in_order() {
    let generator = Arc::new(ScriptedGenerator::new("ok"));
    let (app, _dir, log_path) = test_app(generator).await;

    for i in 0..3 {
        let response = app
            .clone()
            .oneshot(post_query(format!("zapytanie {i}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let positions: Vec<usize> = (0..3)
        .map(|i| contents.find(&format!("Prompt: zapytanie {i}\n")).unwrap())
        .collect();
    assert!(positions[0] < positions[1]);
    assert!(positions[1] < positions[2]);
}
