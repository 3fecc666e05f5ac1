mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn create_without_generation() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;

    let created = common::create_document(&server, &token, &topic, false).await;
    assert!(created["generation"].is_null());
    assert!(created["generation_error"].is_null());
    assert_eq!(created["document"]["flashcard_count"], 0);
    assert_eq!(env.generator.calls.load(Ordering::SeqCst), 0);

    let body: Value = server
        .get(&format!("/api/topics/{topic}/documents"))
        .authorization_bearer(&token)
        .await
        .json();
    let item = &body["data"]["items"][0];
    assert_eq!(item["name"], "Ownership");
    assert!(item.get("content").is_none());
    assert!(item["content_length"].as_i64().unwrap() >= 1000);
}

#[tokio::test]
async fn create_with_generation_returns_pending_cards() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;

    let created = common::create_document(&server, &token, &topic, true).await;
    let cards = created["generation"]["flashcards"].as_array().unwrap();
    assert_eq!(cards.len(), 3);
    assert!(cards.iter().all(|c| c["source"] == "ai" && c["is_approved"] == false));
    assert_eq!(created["document"]["pending_flashcard_count"], 3);
    assert_eq!(created["generation"]["generation"]["model"], "fake-model");
}

#[tokio::test]
async fn failed_generation_keeps_the_document() {
    let env = common::TestEnv::start().await;
    env.generator.fail.store(true, Ordering::SeqCst);
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;

    let created = common::create_document(&server, &token, &topic, true).await;
    assert!(created["generation"].is_null());
    assert!(created["generation_error"].as_str().is_some());

    let id = created["document"]["id"].as_str().unwrap();
    server
        .get(&format!("/api/documents/{id}"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    server
        .post(&format!("/api/documents/{id}/generate"))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn generation_without_provider_is_unavailable() {
    let env = common::TestEnv::without_generator().await;
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;

    let created = common::create_document(&server, &token, &topic, true).await;
    assert!(created["generation_error"].as_str().is_some());
    let id = created["document"]["id"].as_str().unwrap();

    server
        .post(&format!("/api/documents/{id}/generate"))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn regeneration_keeps_reviewed_cards() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;
    let created = common::create_document(&server, &token, &topic, true).await;
    let document = created["document"]["id"].as_str().unwrap().to_string();
    let cards = created["generation"]["flashcards"].as_array().unwrap();
    let approved = cards[0]["id"].as_str().unwrap();
    let edited = cards[1]["id"].as_str().unwrap();

    server
        .post(&format!("/api/flashcards/{approved}/approve"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    let body: Value = server
        .put(&format!("/api/flashcards/{edited}"))
        .authorization_bearer(&token)
        .json(&json!({ "back": "My own answer" }))
        .await
        .json();
    assert_eq!(body["data"]["is_modified"], true);

    let response = server
        .post(&format!("/api/documents/{document}/generate"))
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["replaced_count"], 1);

    let body: Value = server
        .get(&format!("/api/documents/{document}/flashcards"))
        .authorization_bearer(&token)
        .add_query_param("sort", "front")
        .add_query_param("order", "asc")
        .await
        .json();
    let fronts: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["front"].as_str().unwrap())
        .collect();
    assert_eq!(
        fronts,
        ["Question 1.1", "Question 1.2", "Question 2.1", "Question 2.2", "Question 2.3"]
    );

    let body: Value = server
        .get(&format!("/api/documents/{document}/generations"))
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn content_length_is_counted_in_characters() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;

    // 1000 two-byte chars: 2000 bytes but exactly at the lower bound.
    server
        .post(&format!("/api/topics/{topic}/documents"))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Polish", "content": "ż".repeat(1000) }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .post(&format!("/api/topics/{topic}/documents"))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Too short", "content": "ż".repeat(999) }))
        .await
        .assert_status_bad_request();

    server
        .post(&format!("/api/topics/{topic}/documents"))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Too long", "content": "a".repeat(10_001) }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn update_and_delete_cascade() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let token = common::login_as(&server, "ada@example.com").await;
    let topic = common::create_topic(&server, &token, "Rust").await;
    let created = common::create_document(&server, &token, &topic, true).await;
    let document = created["document"]["id"].as_str().unwrap().to_string();
    let card = created["generation"]["flashcards"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let body: Value = server
        .put(&format!("/api/documents/{document}"))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Borrowing" }))
        .await
        .json();
    assert_eq!(body["data"]["name"], "Borrowing");

    server
        .put(&format!("/api/documents/{document}"))
        .authorization_bearer(&token)
        .json(&json!({ "content": "too short" }))
        .await
        .assert_status_bad_request();

    server
        .delete(&format!("/api/topics/{topic}"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    server
        .get(&format!("/api/documents/{document}"))
        .authorization_bearer(&token)
        .await
        .assert_status_not_found();
    server
        .get(&format!("/api/flashcards/{card}"))
        .authorization_bearer(&token)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn documents_are_private() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let ada = common::login_as(&server, "ada@example.com").await;
    let bob = common::login_as(&server, "bob@example.com").await;
    let topic = common::create_topic(&server, &ada, "Rust").await;
    let created = common::create_document(&server, &ada, &topic, false).await;
    let document = created["document"]["id"].as_str().unwrap();

    server
        .get(&format!("/api/documents/{document}"))
        .authorization_bearer(&bob)
        .await
        .assert_status_not_found();
    server
        .post(&format!("/api/documents/{document}/generate"))
        .authorization_bearer(&bob)
        .await
        .assert_status_not_found();
    server
        .get(&format!("/api/topics/{topic}/documents"))
        .authorization_bearer(&bob)
        .await
        .assert_status_not_found();
    server
        .post(&format!("/api/topics/{topic}/documents"))
        .authorization_bearer(&bob)
        .json(&json!({ "name": "x", "content": common::document_content(1500) }))
        .await
        .assert_status_not_found();
    assert_eq!(env.generator.calls.load(Ordering::SeqCst), 0);
}
