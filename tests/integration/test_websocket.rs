//! Integration tests for the HTTP surface and WebSocket event streaming.
//!
//! These tests run the real router on an ephemeral port, drive the session
//! over HTTP with reqwest, and observe the resulting events over `/ws`.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::{json, Value};
use sqlcoach_session::{
    create_router, AppState, Config, DatasetSeed, EventBroadcaster, LessonCatalog, Role, Session,
    SessionController, SessionEvent, SessionStatus, SqlCoachError, TutorAssembler, TutorBackend,
    TutorErrorKind, BACKEND_FAILURE_FALLBACK,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Replies with the question it was asked.
struct EchoBackend;

#[async_trait]
impl TutorBackend for EchoBackend {
    async fn generate(&self, prompt: &str, _model: &str) -> sqlcoach_session::Result<String> {
        let question = prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix("Student Question: "))
            .unwrap_or_default();
        Ok(format!("You asked: {question}"))
    }
}

/// Always fails like an unreachable service.
struct UnreachableBackend;

#[async_trait]
impl TutorBackend for UnreachableBackend {
    async fn generate(&self, _prompt: &str, _model: &str) -> sqlcoach_session::Result<String> {
        Err(SqlCoachError::tutor_backend(
            TutorErrorKind::Network,
            "connection refused",
        ))
    }
}

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Helper type for WebSocket client
type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds app state over the built-in course with the given seed and backend.
async fn app_state(seed: DatasetSeed, backend: Arc<dyn TutorBackend>) -> AppState {
    let config = Config::default();
    let controller = SessionController::new(
        Session::new(LessonCatalog::builtin(), seed),
        TutorAssembler::new(backend, config.tutor.model.clone()),
        EventBroadcaster::new(config.event_capacity),
    );
    let _ = controller.initialize().await;
    AppState::new(config, controller)
}

/// Spawns the test server and returns the HTTP base URL and WebSocket URL.
async fn spawn_test_server(state: AppState) -> (String, String) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), format!("ws://{addr}/ws"))
}

/// Connects a WebSocket client to the given URL.
async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next text message and parses it as a `SessionEvent`.
/// Automatically handles ping frames by responding with pong.
async fn receive_event(client: &mut WsClient) -> SessionEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => panic!("Expected text message, got: {other:?}"),
        }
    }
}

async fn post(http: &reqwest::Client, url: String, body: Option<Value>) -> (u16, Value) {
    let mut request = http.post(url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("Request failed");
    let status = response.status().as_u16();
    let body = response.json().await.expect("Invalid JSON body");
    (status, body)
}

// ============================================================================
// Connection Tests
// ============================================================================

/// Tests that a WebSocket client receives a snapshot on connection.
#[tokio::test]
async fn test_client_receives_connected_snapshot() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (_http_url, ws_url) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    let event = receive_event(&mut client).await;

    let SessionEvent::Connected(payload) = event else {
        panic!("Expected Connected event, got: {event:?}");
    };
    assert_eq!(payload.snapshot.status, SessionStatus::Ready);
    assert_eq!(payload.snapshot.lesson_index, 0);
    assert_eq!(payload.snapshot.query, "SELECT * FROM employees;");
    assert_eq!(payload.snapshot.transcript.len(), 1);
}

/// Tests that an unloadable dataset is visible to connecting clients.
#[tokio::test]
async fn test_connected_snapshot_reports_uninitialized() {
    let state = app_state(DatasetSeed::new("CREATE TABL nope"), Arc::new(EchoBackend)).await;
    let (http_url, ws_url) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    let SessionEvent::Connected(payload) = receive_event(&mut client).await else {
        panic!("Expected Connected event");
    };
    assert_eq!(payload.snapshot.status, SessionStatus::Uninitialized);

    let http = reqwest::Client::new();
    let (status, body) = post(&http, format!("{http_url}/api/query/run"), None).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "engine not initialized");
}

/// Tests that multiple clients can connect concurrently.
#[tokio::test]
async fn test_multiple_clients_can_connect() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (_http_url, ws_url) = spawn_test_server(state).await;

    let mut client1 = connect_client(&ws_url).await;
    let mut client2 = connect_client(&ws_url).await;
    let mut client3 = connect_client(&ws_url).await;

    assert!(matches!(receive_event(&mut client1).await, SessionEvent::Connected(_)));
    assert!(matches!(receive_event(&mut client2).await, SessionEvent::Connected(_)));
    assert!(matches!(receive_event(&mut client3).await, SessionEvent::Connected(_)));
}

// ============================================================================
// HTTP-triggered Event Tests
// ============================================================================

/// Tests that selecting a lesson over HTTP is broadcast to every client.
#[tokio::test]
async fn test_lesson_selection_broadcast_to_all_clients() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (http_url, ws_url) = spawn_test_server(state).await;

    let mut client1 = connect_client(&ws_url).await;
    let mut client2 = connect_client(&ws_url).await;
    receive_event(&mut client1).await;
    receive_event(&mut client2).await;

    let http = reqwest::Client::new();
    let (status, body) = post(
        &http,
        format!("{http_url}/api/lesson/select"),
        Some(json!({"index": 2})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["changed"], true);

    for client in [&mut client1, &mut client2] {
        let SessionEvent::LessonSelected(payload) = receive_event(client).await else {
            panic!("Expected LessonSelected event");
        };
        assert_eq!(payload.index, 2);
        assert_eq!(payload.lesson.title, "Filtering Data");
        assert_eq!(payload.query, "SELECT * FROM employees WHERE ...;");
        assert_eq!(payload.progress.position, 3);
    }
}

/// Tests editing and running a query over HTTP.
#[tokio::test]
async fn test_edit_and_run_query_events() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (http_url, ws_url) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let http = reqwest::Client::new();
    let response = http
        .put(format!("{http_url}/api/query"))
        .json(&json!({"text": "SELECT name FROM employees WHERE department = 'HR'"}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 200);

    let SessionEvent::QueryChanged(payload) = receive_event(&mut client).await else {
        panic!("Expected QueryChanged event");
    };
    assert!(!payload.outcome_cleared);

    let (status, body) = post(&http, format!("{http_url}/api/query/run"), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["rows"], json!([["Diana Ross"]]));

    let SessionEvent::QueryExecuted(payload) = receive_event(&mut client).await else {
        panic!("Expected QueryExecuted event");
    };
    assert_eq!(
        payload.query,
        "SELECT name FROM employees WHERE department = 'HR'"
    );
    assert!(payload.outcome.is_success());
}

/// Tests the fire-and-forget tutor flow: 202 first, reply over the stream.
#[tokio::test]
async fn test_dispatched_question_answer_arrives_on_stream() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (http_url, ws_url) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let http = reqwest::Client::new();
    let (status, body) = post(
        &http,
        format!("{http_url}/api/tutor/ask"),
        Some(json!({"question": "What does * mean?"})),
    )
    .await;
    assert_eq!(status, 202);
    assert_eq!(body["state"], "pending");
    let ticket = body["pending"]["ticket"].as_u64().expect("ticket");

    let SessionEvent::TranscriptAppended(learner) = receive_event(&mut client).await else {
        panic!("Expected learner TranscriptAppended event");
    };
    assert_eq!(learner.message.role, Role::Learner);
    assert_eq!(learner.ticket, ticket);

    let SessionEvent::TranscriptAppended(tutor) = receive_event(&mut client).await else {
        panic!("Expected tutor TranscriptAppended event");
    };
    assert_eq!(tutor.message.role, Role::Tutor);
    assert_eq!(tutor.message.text, "You asked: What does * mean?");
    assert_eq!(tutor.ticket, ticket);
}

/// Tests that an unreachable tutor produces exactly one fallback reply.
#[tokio::test]
async fn test_unreachable_tutor_falls_back() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(UnreachableBackend)).await;
    let (http_url, _ws_url) = spawn_test_server(state).await;

    let http = reqwest::Client::new();
    let (status, body) = post(
        &http,
        format!("{http_url}/api/tutor/ask"),
        Some(json!({"question": "help", "wait": true})),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"]["text"], BACKEND_FAILURE_FALLBACK);

    let session: Value = http
        .get(format!("{http_url}/api/session"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON body");
    let transcript = session["transcript"].as_array().expect("transcript");
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1]["role"], "learner");
    assert_eq!(transcript[2]["role"], "tutor");
    assert!(!session.to_string().contains("connection refused"));
}

/// Tests that a database reset is announced with engine status.
#[tokio::test]
async fn test_database_reset_broadcasts_engine_status() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (http_url, ws_url) = spawn_test_server(state).await;

    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let http = reqwest::Client::new();
    let (status, body) = post(&http, format!("{http_url}/api/database/reset"), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ready");

    let SessionEvent::EngineStatus(payload) = receive_event(&mut client).await else {
        panic!("Expected EngineStatus event");
    };
    assert_eq!(payload.status, SessionStatus::Ready);
}

/// Tests that lesson listing reflects progress after navigation.
#[tokio::test]
async fn test_lessons_listing_tracks_progress() {
    let state = app_state(DatasetSeed::builtin(), Arc::new(EchoBackend)).await;
    let (http_url, _ws_url) = spawn_test_server(state).await;

    let http = reqwest::Client::new();
    post(&http, format!("{http_url}/api/lesson/next"), None).await;
    post(&http, format!("{http_url}/api/lesson/next"), None).await;

    let body: Value = http
        .get(format!("{http_url}/api/lessons"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON body");

    let completed: Vec<bool> = body["lessons"]
        .as_array()
        .expect("lessons")
        .iter()
        .map(|l| l["completed"].as_bool().expect("completed flag"))
        .collect();
    assert_eq!(completed, vec![true, true, false, false, false]);
    assert_eq!(body["progress"]["position"], 3);
}
