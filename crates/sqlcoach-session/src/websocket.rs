//! WebSocket event types and broadcasting for live session observation.
//!
//! Every state change made through the controller is broadcast to all
//! connected clients, so a learner surface can render without polling.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes a session snapshot
//! - `lesson_selected` - A different lesson became current
//! - `query_changed` - The live query was edited or reset
//! - `query_executed` - A run finished, with its outcome
//! - `transcript_appended` - A learner or tutor message was appended
//! - `engine_status` - The engine became ready or was lost
//! - `error` - A session-level failure (seed load, database reset)
//!
//! # Example
//!
//! ```no_run
//! use sqlcoach_session::websocket::{EventBroadcaster, SessionEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(SessionEvent::error("seed failed"));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {}", event.event_name());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::lesson::Lesson;
use crate::query::Outcome;
use crate::session::{Progress, SessionSnapshot, SessionStatus};
use crate::transcript::Message;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as it was when the client connected.
    pub snapshot: SessionSnapshot,
}

/// Payload for the `lesson_selected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSelectedPayload {
    /// Catalog index of the new lesson.
    pub index: usize,
    /// The new lesson, without its solution.
    pub lesson: Lesson,
    /// Live query text after the reset.
    pub query: String,
    /// Course position.
    pub progress: Progress,
}

/// Payload for the `query_changed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryChangedPayload {
    /// The live query text.
    pub query: String,
    /// Whether the last outcome was cleared with it.
    pub outcome_cleared: bool,
}

/// Payload for the `query_executed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExecutedPayload {
    /// The query text that was run.
    pub query: String,
    /// What the engine returned.
    pub outcome: Outcome,
}

/// Payload for the `transcript_appended` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptAppendedPayload {
    /// The appended message.
    pub message: Message,
    /// Ticket of the question this message belongs to.
    pub ticket: u64,
}

/// Payload for the `engine_status` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatusPayload {
    /// Current readiness.
    pub status: SessionStatus,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// WebSocket event types for session observation.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when the selected lesson changes.
    LessonSelected(LessonSelectedPayload),
    /// Sent when the live query is edited or reset.
    QueryChanged(QueryChangedPayload),
    /// Sent when a run finishes.
    QueryExecuted(QueryExecutedPayload),
    /// Sent when a transcript message is appended.
    TranscriptAppended(TranscriptAppendedPayload),
    /// Sent when engine readiness changes.
    EngineStatus(EngineStatusPayload),
    /// Sent when a session-level operation fails.
    Error(ErrorPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(snapshot: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { snapshot })
    }

    /// Creates a `LessonSelected` event.
    #[must_use]
    pub const fn lesson_selected(
        index: usize,
        lesson: Lesson,
        query: String,
        progress: Progress,
    ) -> Self {
        Self::LessonSelected(LessonSelectedPayload {
            index,
            lesson,
            query,
            progress,
        })
    }

    /// Creates a `QueryChanged` event.
    #[must_use]
    pub const fn query_changed(query: String, outcome_cleared: bool) -> Self {
        Self::QueryChanged(QueryChangedPayload {
            query,
            outcome_cleared,
        })
    }

    /// Creates a `QueryExecuted` event.
    #[must_use]
    pub const fn query_executed(query: String, outcome: Outcome) -> Self {
        Self::QueryExecuted(QueryExecutedPayload { query, outcome })
    }

    /// Creates a `TranscriptAppended` event.
    #[must_use]
    pub const fn transcript_appended(message: Message, ticket: u64) -> Self {
        Self::TranscriptAppended(TranscriptAppendedPayload { message, ticket })
    }

    /// Creates an `EngineStatus` event.
    #[must_use]
    pub const fn engine_status(status: SessionStatus) -> Self {
        Self::EngineStatus(EngineStatusPayload { status })
    }

    /// Creates an `Error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::LessonSelected(_) => "lesson_selected",
            Self::QueryChanged(_) => "query_changed",
            Self::QueryExecuted(_) => "query_executed",
            Self::TranscriptAppended(_) => "transcript_appended",
            Self::EngineStatus(_) => "engine_status",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to all connected WebSocket clients.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a new `EventBroadcaster` with the specified per-subscriber
    /// buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber for receiving events.
    ///
    /// If a subscriber falls behind, it will receive a `Lagged` error and
    /// miss some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event and returns the number of receivers reached.
    pub fn send(&self, event: SessionEvent) -> usize {
        // Err only means nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// - Sends `connected` with a session snapshot immediately
/// - Forwards every broadcast event to the client
/// - Sends heartbeat pings every 30 seconds
/// - Closes the connection after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so no change falls in between
    let mut event_receiver = state.controller.broadcaster().subscribe();
    let snapshot = state.controller.snapshot().await;

    let connected_json = match serde_json::to_string(&SessionEvent::connected(snapshot)) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(WsMessage::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent session snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
    // The first tick completes immediately
    heartbeat_interval.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(WsMessage::Text(_) | WsMessage::Binary(_))) => {
                        // Learner events arrive over HTTP
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sender.send(WsMessage::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(session_event) => {
                        let json = match serde_json::to_string(&session_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(WsMessage::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
