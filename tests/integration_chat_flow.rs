//! End-to-end chat turns over SQLite storage, a mocked Ollama server, and
//! the HTTP router.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatstream::config::{ChatConfig, OllamaConfig};
use chatstream::orchestrator::{ChatRequest, ChatService, StreamChunk};
use chatstream::providers::OllamaProvider;
use chatstream::server::{router, AppState};
use chatstream::storage::{HistoryStore, Role, SqliteStorage};

mod common;

async fn mock_ollama(fragments: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(common::ollama_ndjson(fragments), "application/x-ndjson"),
        )
        .mount(&server)
        .await;
    server
}

fn service_for(server: &MockServer, storage: Arc<SqliteStorage>) -> ChatService {
    let provider = OllamaProvider::new(OllamaConfig {
        host: server.uri(),
        model: "test-model".to_string(),
    })
    .expect("create ollama provider");

    ChatService::new(&ChatConfig::default(), storage, Arc::new(provider), None)
}

#[tokio::test]
async fn test_first_turn_is_persisted_with_title() {
    let server = mock_ollama(&["你好", "你好", "你好"]).await;
    let (storage, _tmp) = common::create_temp_storage();
    let storage = Arc::new(storage);
    let service = service_for(&server, Arc::clone(&storage));

    let turn = service
        .start_turn(ChatRequest::new(
            "This is a fairly long opening question about design",
        ))
        .await
        .expect("start turn");
    let conversation_id = turn.conversation_id.clone();

    let chunks: Vec<StreamChunk> = turn
        .stream
        .map(|chunk| chunk.expect("chunk"))
        .collect()
        .await;

    match chunks.last().expect("terminal chunk") {
        StreamChunk::Done { message, .. } => assert_eq!(message.content, "你好"),
        other => panic!("expected done, got {:?}", other),
    }

    let messages = storage.list(&conversation_id).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "你好");

    let conversation = storage.get_conversation(&conversation_id).unwrap().unwrap();
    assert!(conversation.title.ends_with("..."));
    assert_eq!(conversation.title, "This is a fairly lon...");
}

#[tokio::test]
async fn test_second_turn_sees_history() {
    let server = mock_ollama(&["Sure."]).await;
    let (storage, _tmp) = common::create_temp_storage();
    let storage = Arc::new(storage);
    let service = service_for(&server, Arc::clone(&storage));

    let first = service.start_turn(ChatRequest::new("Hi")).await.unwrap();
    let id = first.conversation_id.clone();
    first.stream.collect::<Vec<_>>().await;

    let second = service
        .start_turn(ChatRequest::new("And again").in_conversation(&id))
        .await
        .unwrap();
    second.stream.collect::<Vec<_>>().await;

    let requests = server.received_requests().await.unwrap();
    let last: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let context = last["messages"][1]["content"].as_str().unwrap();
    assert!(context.contains("User: Hi"));
    assert!(context.contains("Assistant: Sure."));
    assert!(context.ends_with("Current question: And again"));

    assert_eq!(storage.list(&id).unwrap().len(), 4);
    assert_eq!(storage.get_conversation(&id).unwrap().unwrap().title, "Hi");
}

#[tokio::test]
async fn test_provider_error_persists_only_user_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let (storage, _tmp) = common::create_temp_storage();
    let storage = Arc::new(storage);
    let service = service_for(&server, Arc::clone(&storage));

    let turn = service.start_turn(ChatRequest::new("hello")).await.unwrap();
    let id = turn.conversation_id.clone();
    let chunks: Vec<StreamChunk> = turn.stream.map(|c| c.unwrap()).collect().await;

    assert!(matches!(chunks.last(), Some(StreamChunk::Error { .. })));
    let messages = storage.list(&id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_http_stream_and_listing() {
    let server = mock_ollama(&["Hello", " there"]).await;
    let (storage, _tmp) = common::create_temp_storage();
    let service = Arc::new(service_for(&server, Arc::new(storage)));
    let app = router(AppState::new(service));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat/stream")
                .header("content-type", "application/json")
                .body(Body::from(json!({"message": "greet me"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    let chunks: Vec<StreamChunk> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect();
    assert!(matches!(chunks.first(), Some(StreamChunk::Start { .. })));
    assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/conversations")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let summaries: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summaries[0]["title"], "greet me");
    assert_eq!(summaries[0]["message_count"], 2);
    assert_eq!(summaries[0]["last_message"], "Hello there");
}
