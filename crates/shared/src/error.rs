use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the task backend (`{"message": "..."}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} value: {value}")]
pub struct ParseFilterError {
    pub field: &'static str,
    pub value: String,
}

impl ParseFilterError {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}
