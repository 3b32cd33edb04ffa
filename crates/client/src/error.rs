use holdmap_core::error::CoreError;

/// Errors surfaced by the browser-side client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the realtime connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A frame could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The realtime channel is down; intents are not queued.
    #[error("Realtime channel is not connected")]
    NotConnected,

    /// The rental system returned a non-2xx status code.
    #[error("Rental backend error ({status}): {body}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The rental system answered but refused the operation.
    #[error("Rejected by rental backend: {0}")]
    Rejected(String),
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        Self::Protocol(err.to_string())
    }
}
