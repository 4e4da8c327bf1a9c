use thiserror::Error;

/// Errors that can occur while relaying archives into the store
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{message}")]
    InvalidInput { message: String },

    #[error("Repository {repo} is private or does not exist")]
    SourceUnavailable { repo: String },

    #[error("Remote store rejected write ({status}): {body}")]
    RemoteWriteFailed { status: u16, body: String },

    #[error("Remote store rejected delete of {path} ({status}): {body}")]
    RemoteDeleteFailed {
        index: usize,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Remote store listing failed ({status}): {body}")]
    RemoteListFailed { status: u16, body: String },

    #[error("Archive download from {branch} was interrupted: {message}")]
    ArchiveInterrupted { branch: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl RelayError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RelayError::InvalidInput {
            message: message.into(),
        }
    }

    /// HTTP-like status code the transport layer should answer with.
    ///
    /// Remote rejections keep the remote's own code so callers see exactly
    /// what the store said; anything unclassified is a server error.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::InvalidInput { .. } | RelayError::SourceUnavailable { .. } => 400,
            RelayError::RemoteWriteFailed { status, .. }
            | RelayError::RemoteDeleteFailed { status, .. }
            | RelayError::RemoteListFailed { status, .. } => *status,
            RelayError::ArchiveInterrupted { .. }
            | RelayError::Network(_)
            | RelayError::Io(_)
            | RelayError::Serialization(_)
            | RelayError::InvalidConfig { .. } => 500,
        }
    }

    /// Raw remote body, for failures that carry one
    pub fn remote_body(&self) -> Option<&str> {
        match self {
            RelayError::RemoteWriteFailed { body, .. }
            | RelayError::RemoteDeleteFailed { body, .. }
            | RelayError::RemoteListFailed { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
