use thiserror::Error;

#[derive(Error, Debug)]
pub enum JunctionError {
    #[error("Invalid time format: {0} (expected HH:MM:SS)")]
    InvalidFormat(String),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("All nodes failed")]
    AllNodesFailed,

    #[error("Remote fault ({code}): {message}")]
    RemoteFault { code: i32, message: String },

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JunctionError {
    /// Validation failures are the caller's fault; retrying them elsewhere
    /// cannot succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            JunctionError::InvalidFormat(_)
                | JunctionError::InvalidResource(_)
                | JunctionError::InvalidRequest(_)
        )
    }
}

impl From<std::net::AddrParseError> for JunctionError {
    fn from(err: std::net::AddrParseError) -> Self {
        JunctionError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, JunctionError>;
