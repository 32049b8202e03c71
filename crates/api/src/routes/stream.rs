//! Live Result Stream
//!
//! Pushes every detection event to connected viewers over a WebSocket.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use occupancy::DetectionEvent;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::AppState;

/// Envelope for everything sent to viewers
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    Status { message: &'a str },
    DetectionResult(&'a DetectionEvent),
}

impl ServerMessage<'_> {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let events = state.publisher.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, events))
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<Arc<DetectionEvent>>) {
    let (mut sender, mut receiver) = socket.split();
    info!("Viewer connected");
    metrics::gauge!("stream_viewers").increment(1.0);

    let greeting = ServerMessage::Status {
        message: "Connected to server",
    };
    match greeting.to_text() {
        Ok(text) => {
            if sender.send(Message::Text(text)).await.is_err() {
                metrics::gauge!("stream_viewers").decrement(1.0);
                return;
            }
        }
        Err(e) => warn!("Failed to encode greeting: {}", e),
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match ServerMessage::DetectionResult(event.as_ref()).to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Viewer lagging, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    metrics::gauge!("stream_viewers").decrement(1.0);
    info!("Viewer disconnected");
}
