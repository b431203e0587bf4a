//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket endpoint. Each connection subscribes to the caller's three
//! cache slots and forwards every new snapshot to the browser until the
//! client leaves or the session ends.

use crate::web::protocol::{ClientMessage, ServerMessage};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use study_tracker_core::domain::Identity;
use study_tracker_core::session::SessionState;
use study_tracker_core::workspace::Workspace;
use tracing::{error, info, warn};

type WsSender = SplitSink<WebSocket, Message>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(user_id): Extension<Identity>,
    Extension(workspace): Extension<Arc<Workspace>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, workspace, user_id))
}

async fn handle_socket(socket: WebSocket, workspace: Arc<Workspace>, user_id: Identity) {
    info!("New WebSocket connection established for user: {}", user_id);
    let (mut sender, mut receiver) = socket.split();

    let mut topics = workspace.cache.subscribe_topics();
    let mut snippets = workspace.cache.subscribe_snippets();
    let mut exams = workspace.cache.subscribe_exams();
    let mut session = workspace.session.watch();

    // --- 1. Initial Snapshots ---
    let initial = [
        ServerMessage::Topics {
            topics: topics.borrow_and_update().to_vec(),
        },
        ServerMessage::Snippets {
            snippets: snippets.borrow_and_update().to_vec(),
        },
        ServerMessage::Exams {
            exams: exams.borrow_and_update().to_vec(),
        },
    ];
    for msg in &initial {
        if send(&mut sender, msg).await.is_err() {
            return;
        }
    }

    // --- 2. Main Loop ---
    loop {
        let outgoing = tokio::select! {
            changed = topics.changed() => match changed {
                Ok(()) => ServerMessage::Topics { topics: topics.borrow_and_update().to_vec() },
                Err(_) => break,
            },
            changed = snippets.changed() => match changed {
                Ok(()) => ServerMessage::Snippets { snippets: snippets.borrow_and_update().to_vec() },
                Err(_) => break,
            },
            changed = exams.changed() => match changed {
                Ok(()) => ServerMessage::Exams { exams: exams.borrow_and_update().to_vec() },
                Err(_) => break,
            },
            changed = session.changed() => {
                let signed_in = changed.is_ok()
                    && matches!(*session.borrow_and_update(), SessionState::Authenticated(id) if id == user_id);
                if signed_in {
                    continue;
                }
                let _ = send(&mut sender, &ServerMessage::SignedOut).await;
                info!("Session ended for user {}, closing socket.", user_id);
                break;
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match handle_text_message(text.as_str(), &workspace).await {
                    Some(reply) => reply,
                    None => continue,
                },
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
        };

        if send(&mut sender, &outgoing).await.is_err() {
            break;
        }
    }

    info!("WebSocket connection closed.");
}

/// Handles one client text frame; returns a message to send back, if any.
async fn handle_text_message(text: &str, workspace: &Workspace) -> Option<ServerMessage> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Reload) => match workspace.cache.reload().await {
            // Fresh snapshots reach the client through the slot subscriptions.
            Ok(report) if report.is_ok() => None,
            Ok(report) => Some(ServerMessage::Error {
                message: format!("Some data failed to load: {:?}", report),
            }),
            Err(e) => Some(ServerMessage::Error {
                message: e.to_string(),
            }),
        },
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            Some(ServerMessage::Error {
                message: "Unrecognised message".to_string(),
            })
        }
    }
}

async fn send(sender: &mut WsSender, msg: &ServerMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| {
        error!("Failed to serialise server message: {}", e);
    })?;
    sender.send(Message::Text(json.into())).await.map_err(|e| {
        warn!("Failed to send WebSocket message: {}", e);
    })
}
