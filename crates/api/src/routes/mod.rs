//! HTTP and WebSocket route handlers

pub mod detection;
pub mod spaces;
pub mod stream;

use serde::Serialize;

/// `{ "message": ... }` acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
