#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use argon2::Params;
use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use db::DBService;
use serde_json::{Value, json};
use server::{DeploymentImpl, app};
use services::services::{
    auth::AuthService,
    claude_api::ClaudeApiError,
    config::Config,
    flashcard_generator::{FlashcardDraft, FlashcardGenerator, GeneratorError},
};

/// Deterministic stand-in for the AI provider. Every call yields a new
/// numbered batch so regenerations are distinguishable.
#[derive(Default)]
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl FlashcardGenerator for FakeGenerator {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn generate(
        &self,
        _text: &str,
        max_flashcards: usize,
    ) -> Result<Vec<FlashcardDraft>, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(GeneratorError::ClaudeApi(ClaudeApiError::Timeout));
        }
        Ok((1..=max_flashcards.min(3))
            .map(|i| FlashcardDraft {
                front: format!("Question {call}.{i}"),
                back: format!("Answer {call}.{i}"),
            })
            .collect())
    }
}

pub struct TestEnv {
    pub db: DBService,
    pub generator: Arc<FakeGenerator>,
    pub router: Router,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::build(true).await
    }

    /// Same environment with no AI provider configured.
    pub async fn without_generator() -> Self {
        Self::build(false).await
    }

    async fn build(with_generator: bool) -> Self {
        let db = DBService::new_in_memory()
            .await
            .expect("Failed to open in-memory database");
        let config = Arc::new(
            Config::from_lookup(|key| match key {
                "JWT_SECRET" => Some("integration-test-secret-0123456789abcdef".to_string()),
                "AI_MAX_FLASHCARDS" => Some("5".to_string()),
                _ => None,
            })
            .expect("Failed to build config"),
        );
        let generator = Arc::new(FakeGenerator::default());
        let auth = AuthService::new(db.pool.clone(), &config.jwt_secret, config.session_ttl)
            .with_hasher_params(Params::new(8, 1, 1, None).expect("valid argon2 params"));

        let shared: Option<Arc<dyn FlashcardGenerator>> = if with_generator {
            Some(generator.clone())
        } else {
            None
        };
        let deployment = DeploymentImpl::new(db.clone(), config, shared).with_auth(auth);

        Self {
            db,
            generator,
            router: app(deployment),
        }
    }

    /// Server that tracks cookies; status is asserted per request.
    pub fn server(&self) -> TestServer {
        TestServer::builder()
            .save_cookies()
            .build(self.router.clone())
    }
}

pub async fn register(server: &TestServer, email: &str, password: &str) {
    server
        .post("/api/auth/register")
        .json(&json!({ "email": email, "password": password }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

/// Registers `email` and returns a bearer token for it.
pub async fn login_as(server: &TestServer, email: &str) -> String {
    register(server, email, "password123").await;
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": email, "password": "password123" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"]["token"]
        .as_str()
        .expect("token in login response")
        .to_string()
}

pub fn document_content(chars: usize) -> String {
    "Ownership moves values between bindings. "
        .chars()
        .cycle()
        .take(chars)
        .collect()
}

pub async fn create_topic(server: &TestServer, token: &str, name: &str) -> String {
    let response = server
        .post("/api/topics")
        .authorization_bearer(token)
        .json(&json!({ "name": name }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["id"].as_str().expect("topic id").to_string()
}

pub async fn create_document(
    server: &TestServer,
    token: &str,
    topic_id: &str,
    generate: bool,
) -> Value {
    let response = server
        .post(&format!("/api/topics/{topic_id}/documents"))
        .authorization_bearer(token)
        .json(&json!({
            "name": "Ownership",
            "content": document_content(1200),
            "generate_flashcards": generate,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    body["data"].clone()
}
