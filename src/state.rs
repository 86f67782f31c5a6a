//! Conversation state: sampling settings and the message history.

use crate::client::ChatMessage;
use crate::error::ValidationError;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Who a new prompt is attributed to in the history.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(ValidationError::Role(other.to_string())),
        }
    }
}

/// Settings and history for one process. Created once at startup and handed
/// by reference to whatever needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    role: Role,
    temperature: f32,
    max_tokens: Option<u32>, // None = no cap
    history: Vec<ChatMessage>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            role: Role::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            history: Vec::new(),
        }
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    /// Current history, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn set_role(&mut self, value: &str) -> Result<Role, ValidationError> {
        let role = value.parse::<Role>()?;
        self.role = role;
        info!("role: {role}");
        Ok(role)
    }

    /// Clamped to [0, 2].
    pub fn set_temperature(&mut self, value: &Value) -> Result<f32, ValidationError> {
        let number =
            numeric(value).ok_or_else(|| ValidationError::Temperature(display_arg(value)))?;
        let clamped = number.clamp(MIN_TEMPERATURE as f64, MAX_TEMPERATURE as f64) as f32;
        self.temperature = clamped;
        info!("temperature: {clamped}");
        Ok(clamped)
    }

    /// Floored and raised to at least 1. Positive infinity removes the cap.
    pub fn set_max_tokens(&mut self, value: &Value) -> Result<Option<u32>, ValidationError> {
        let number =
            numeric(value).ok_or_else(|| ValidationError::MaxTokens(display_arg(value)))?;
        let cap = if number == f64::INFINITY {
            None
        } else {
            // `as` saturates at u32::MAX
            Some(number.floor().max(1.0) as u32)
        };
        self.max_tokens = cap;
        info!("max_tokens: {}", display_max_tokens(cap));
        Ok(cap)
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Replaces the history wholesale; `None` empties it.
    pub fn load(&mut self, history: Option<Vec<ChatMessage>>) {
        self.history = history.unwrap_or_default();
    }
}

pub fn display_max_tokens(cap: Option<u32>) -> String {
    match cap {
        Some(n) => n.to_string(),
        None => "unbounded".to_string(),
    }
}

/// Numbers and numeric strings are accepted, anything else (including NaN) is not.
fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (!number.is_nan()).then_some(number)
}

fn display_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
