use thiserror::Error;

/// Errors that can occur while synchronizing with the recipe backend
#[derive(Error, Debug)]
pub enum SyncError {
    /// Input rejected before any request was made
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No response reached the client
    #[error("Failed to reach backend: {0}")]
    Transport(#[source] reqwest::Error),

    /// Backend responded with a non-success status
    #[error("Backend returned {status}: {reason}")]
    Upstream { status: u16, reason: String },

    /// Requested summary or favourite target does not exist
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    /// Backend responded successfully but the body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Builder configuration error
    #[error("Builder error: {0}")]
    Builder(String),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation(message.into())
    }

    /// Map a non-success HTTP status to the matching upstream error.
    pub fn from_status(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if status == 404 {
            SyncError::NotFound { reason }
        } else {
            SyncError::Upstream { status, reason }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// True for every error the backend itself reported, `NotFound` included.
    pub fn is_upstream(&self) -> bool {
        matches!(self, SyncError::Upstream { .. } | SyncError::NotFound { .. })
    }

    /// HTTP status carried by upstream errors
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Upstream { status, .. } => Some(*status),
            SyncError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::from_status(status.as_u16(), err.to_string())
        } else {
            SyncError::Transport(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
