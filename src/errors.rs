use thiserror::Error;

use crate::channel::stomp::StompError;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("not authenticated")]
    Unauthorized,

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("stomp error: {0}")]
    Stomp(#[from] StompError),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("heart-beat timed out after {0:?}")]
    HeartbeatTimeout(std::time::Duration),
}

impl NotifyError {
    /// Transport-level failures are retried by the channel's reconnect loop
    /// and never reach user-facing code.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            NotifyError::WebSocket(_)
                | NotifyError::Stomp(_)
                | NotifyError::Broker(_)
                | NotifyError::ConnectionClosed
                | NotifyError::HeartbeatTimeout(_)
        )
    }

    /// The auth collaborator should send the user back to login.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, NotifyError::Unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
