//! Error types for the bridge.

use serde_json::Value;
use thiserror::Error;

/// Rejected configuration input from the host. State is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("temperature {0} is not a number")]
    Temperature(String),

    #[error("max_tokens {0} is not a number")]
    MaxTokens(String),

    #[error("role {0} is not user, assistant or system")]
    Role(String),

    #[error("history could not be loaded: {0}")]
    History(String),
}

/// Failure of a remote chat completion call.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The service answered with a non-success status.
    #[error("remote service returned status {status}")]
    Status { status: u16, body: Value },

    /// The request never completed or its response body could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("response contained no choices")]
    NoChoices,
}

impl CompletionError {
    /// Lines reported to the host console: status and body when the service
    /// answered, otherwise just the message.
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            CompletionError::Status { status, body } => {
                let body = match body {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                vec![status.to_string(), body]
            }
            other => vec![other.to_string()],
        }
    }
}

/// A note table row that strict decoding refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoteTableError {
    #[error("line {line}: expected 4 fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: {field} is not a number: {value:?}")]
    NotANumber {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// Everything that can end a prompt without a result.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("reply is not a valid note table: {0}")]
    Notes(#[from] NoteTableError),
}

impl PromptError {
    pub fn detail_lines(&self) -> Vec<String> {
        match self {
            PromptError::Completion(err) => err.detail_lines(),
            other => vec![other.to_string()],
        }
    }
}
