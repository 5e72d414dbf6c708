use inworld_realtime_types::InworldError;

/// Failures raised by the client itself, as opposed to errors reported by the server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    MissingCredential(&'static str),
    #[error("Error Get Token: {0}")]
    TokenRequest(String),
    #[error("Get Token Failed")]
    InvalidToken,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Error processing packets {0}")]
    UnexpectedFrame(String),
    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    #[error("Transport is closed")]
    TransportClosed,
    #[error("Client task has stopped")]
    ClientClosed,
    #[error("{0}")]
    Other(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(Box::new(err))
    }
}

impl From<ClientError> for InworldError {
    fn from(err: ClientError) -> Self {
        InworldError::client(err.to_string())
    }
}
