use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response, with the server's `message` when it sent one.
    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },

    #[error("push channel error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed push frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("push authentication rejected: {0}")]
    PushAuth(String),

    #[error("push channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SyncError>;
