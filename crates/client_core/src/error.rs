use shared::domain::TaskId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Auth,
    Validation,
    Server,
    Session,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not signed in: no authenticated session")]
    NoSession,
    #[error("session expired (401 unauthorized)")]
    Unauthorized,
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("server fault ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("deleting task {0} requires confirmation")]
    ConfirmationRequired(TaskId),
    #[error("failed to persist session: {0}")]
    SessionStore(String),
}

impl ClientError {
    /// Maps a non-success HTTP status and its message onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized,
            400..=499 => Self::Rejected { status, message },
            _ => Self::Server { status, message },
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: 422,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoSession | Self::SessionStore(_) => ErrorCategory::Session,
            Self::Unauthorized => ErrorCategory::Auth,
            Self::Rejected { .. } | Self::ConfirmationRequired(_) => ErrorCategory::Validation,
            Self::Server { .. } | Self::Decode(_) => ErrorCategory::Server,
            Self::Transport(_) => ErrorCategory::Transport,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NoSession)
    }

    /// Text suitable for a user-facing notification body.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } | Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        Self::Transport(err.to_string())
    }
}
