//! The live channel: one WebSocket per (trip, member) carrying document
//! updates, membership changes, task events, presence and typing.
//!
//! The connection task doubles as the presence disconnect hook: however the
//! socket ends (clean close, crash, network drop), the task falls through to
//! `mark_offline` server-side. Nothing relies on the client sending a
//! goodbye.

use axum::{
    Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{PresenceUpdate, User};
use crate::policy;
use crate::realtime::TripEvent;

/// Message received from a connected client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Partial presence update (status, current page, cursor)
    Presence {
        #[serde(flatten)]
        update: PresenceUpdate,
    },
    /// Typing indicator on/off
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
    /// Keep-alive; refreshes the presence heartbeat
    Ping,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/trips/{id}/ws", get(trip_ws))
}

async fn trip_ws(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    policy::fetch_trip(&state.db, &trip_id).await?;
    policy::require_member(&state.db, &trip_id, &user.email).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(state, socket, trip_id, user)))
}

async fn handle_socket(state: AppState, socket: WebSocket, trip_id: String, user: User) {
    // Subscribe before announcing ourselves so we see our own join.
    let mut events = state.hub.subscribe(&trip_id);
    state
        .hub
        .update_presence(&trip_id, &user.email, &user.name, PresenceUpdate::default());
    touch_last_active(&state, &trip_id, &user.email).await;

    let (mut sender, mut receiver) = socket.split();

    if let Err(e) = send_snapshot(&state, &mut sender, &trip_id, &user).await {
        debug!("Snapshot send failed for {}: {e}", user.email);
        state.hub.mark_offline(&trip_id, &user.email);
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    // Typing lists are per-subscriber: nobody is told about
                    // their own keystrokes.
                    let event = match event {
                        TripEvent::TypingChanged { trip_id, mut user_ids } => {
                            user_ids.retain(|id| id != &user.email);
                            TripEvent::TypingChanged { trip_id, user_ids }
                        }
                        other => other,
                    };
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize trip event: {e}");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
                // A slow client that missed events just keeps going; it will
                // catch up from the next full-document broadcast.
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Client {} lagged {skipped} events", user.email);
                    continue;
                }
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(&state, &trip_id, &user, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // binary/ping/pong: nothing to do
                Some(Err(e)) => {
                    debug!("WebSocket error for {}: {e}", user.email);
                    break;
                }
            },
        }
    }

    // Durable disconnect hook: runs on every exit path above.
    state.hub.mark_offline(&trip_id, &user.email);
}

async fn send_snapshot(
    state: &AppState,
    sender: &mut SplitSink<WebSocket, Message>,
    trip_id: &str,
    user: &User,
) -> Result<(), axum::Error> {
    let trip = match policy::fetch_trip(&state.db, trip_id).await {
        Ok(row) => row.into_trip(),
        Err(_) => return Ok(()), // trip vanished between upgrade and here
    };

    let mut typing = state.hub.typing_snapshot(trip_id);
    typing.retain(|id| id != &user.email);

    let snapshot = TripEvent::Snapshot {
        trip: Box::new(trip),
        members: state.hub.presence_snapshot(trip_id),
        typing,
    };

    match serde_json::to_string(&snapshot) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!("Failed to serialize snapshot: {e}");
            Ok(())
        }
    }
}

async fn handle_client_message(state: &AppState, trip_id: &str, user: &User, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Ignoring malformed client message from {}: {e}", user.email);
            return;
        }
    };

    match msg {
        ClientMessage::Presence { update } => {
            state
                .hub
                .update_presence(trip_id, &user.email, &user.name, update);
            touch_last_active(state, trip_id, &user.email).await;
        }
        ClientMessage::Typing { is_typing } => {
            state.hub.set_typing(trip_id, &user.email, is_typing);
        }
        ClientMessage::Ping => {
            state
                .hub
                .update_presence(trip_id, &user.email, &user.name, PresenceUpdate::default());
        }
    }
}

/// Presence heartbeats also refresh the durable `last_active` stamp on the
/// collaborator row. Best-effort: a failed write never interrupts the
/// connection.
async fn touch_last_active(state: &AppState, trip_id: &str, user_id: &str) {
    let result = sqlx::query(
        "UPDATE trip_collaborators SET last_active = ? WHERE trip_id = ? AND user_id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(trip_id)
    .bind(user_id)
    .execute(&state.db)
    .await;

    if let Err(e) = result {
        debug!("last_active update failed for {user_id}: {e}");
    }
}
