use thiserror::Error;

/// Listener and connector lifecycle errors.
#[derive(Debug, Error)]
pub enum GsiError {
    /// `start()` was called while the listener is already running.
    #[error("GSI listener is already running")]
    AlreadyRunning,

    /// The listening socket could not be bound.
    #[error("failed to bind GSI listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O failure outside the scope of a single connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload mapping failures. Always scoped to a single request: the
/// stored snapshot is never touched when mapping fails.
#[derive(Debug, Error)]
pub enum MapError {
    /// The body is not syntactically valid JSON.
    #[error("invalid JSON payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The body parsed, but the JSON root is not an object.
    #[error("JSON root is not an object")]
    NotAnObject,
}
