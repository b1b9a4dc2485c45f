//! Error types for the push transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel url {0}: expected ws:// or wss://")]
    InvalidUrl(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed channel frame: {0}")]
    Frame(#[from] serde_json::Error),
}
