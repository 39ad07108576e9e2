use thiserror::Error;

/// Error types for the interview-channel library
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Send error: {0}")]
    SendError(String),
    #[error("Backend returned {status} for {endpoint}")]
    Backend { status: u16, endpoint: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("No authenticated user")]
    Unauthenticated,
    #[error("Collaborator error: {0}")]
    Port(String),
}
