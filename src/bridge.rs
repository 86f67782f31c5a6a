//! Host side of the bridge: Max-style messages in, outlet events out.
//!
//! Every inbound line is `<selector> [argument]`. The argument is JSON when
//! it starts with `{` or `[`, otherwise a whitespace separated list of atoms.

use crate::client::{ChatBackend, ChatMessage};
use crate::error::ValidationError;
use crate::notes::Note;
use crate::orchestrator::Orchestrator;
use crate::prompt::PromptPayload;
use crate::state::{display_max_tokens, ConversationState};
use log::warn;
use serde_json::{json, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown message {0}")]
    Unknown(String),

    #[error("{selector}: invalid JSON argument: {source}")]
    Json {
        selector: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Prompt(Value),
    Temperature(Value),
    MaxTokens(Value),
    Role(Value),
    Clear,
    History,
    LoadHistory(Value),
}

impl Command {
    /// `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (selector, rest) = match line.split_once(char::is_whitespace) {
            Some((selector, rest)) => (selector, rest.trim()),
            None => (line, ""),
        };
        // prompt text goes to the model exactly as typed
        let atoms_as_text = selector == "prompt";
        let arg = parse_argument(rest, atoms_as_text).map_err(|source| CommandError::Json {
            selector: selector.to_string(),
            source,
        })?;

        let command = match selector {
            "prompt" => Command::Prompt(arg),
            "temperature" => Command::Temperature(arg),
            "max_tokens" => Command::MaxTokens(arg),
            "role" => Command::Role(arg),
            "clear" => Command::Clear,
            "history" => Command::History,
            "load_history" => Command::LoadHistory(arg),
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn parse_argument(text: &str, atoms_as_text: bool) -> Result<Value, serde_json::Error> {
    if text.starts_with('{') || text.starts_with('[') {
        return serde_json::from_str(text);
    }

    let mut atoms: Vec<Value> = text
        .split_whitespace()
        .map(|word| {
            if atoms_as_text {
                Value::String(word.to_string())
            } else {
                atom(word)
            }
        })
        .collect();
    Ok(match atoms.len() {
        0 => Value::Null,
        1 => atoms.remove(0),
        _ => Value::Array(atoms),
    })
}

/// Integers stay integers; other numbers become floats, the rest strings.
fn atom(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Console message.
    Post(String),
    Notes(Vec<Note>),
    History(Vec<ChatMessage>),
    Status(Status),
}

impl Event {
    /// Wire form, one line without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            Event::Post(text) => format!("post {text}"),
            Event::Notes(notes) => json!({ "notes": notes }).to_string(),
            Event::History(history) => format!("history {}", json!({ "history": history })),
            Event::Status(Status::Done) => "done".to_string(),
            Event::Status(Status::Error) => "error".to_string(),
        }
    }
}

/// Owns the conversation and dispatches host commands one at a time.
pub struct Bridge<B> {
    state: ConversationState,
    orchestrator: Orchestrator<B>,
}

impl<B: ChatBackend> Bridge<B> {
    pub fn new(orchestrator: Orchestrator<B>) -> Self {
        Self {
            state: ConversationState::new(),
            orchestrator,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub async fn handle(&mut self, command: Command) -> Vec<Event> {
        match command {
            Command::Prompt(arg) => self.prompt(arg).await,
            Command::Temperature(arg) => confirm(
                self.state
                    .set_temperature(&arg)
                    .map(|t| format!("temperature: {t}")),
            ),
            Command::MaxTokens(arg) => confirm(
                self.state
                    .set_max_tokens(&arg)
                    .map(|cap| format!("max_tokens: {}", display_max_tokens(cap))),
            ),
            Command::Role(arg) => confirm(
                self.state
                    .set_role(&atom_text(&arg))
                    .map(|role| format!("role: {role}")),
            ),
            Command::Clear => {
                self.state.clear();
                Vec::new()
            }
            Command::History => vec![self.history_event()],
            Command::LoadHistory(arg) => match history_from_dict(arg) {
                Ok(history) => {
                    self.state.load(history);
                    Vec::new()
                }
                Err(err) => confirm(Err(err)),
            },
        }
    }

    async fn prompt(&mut self, arg: Value) -> Vec<Event> {
        let payload = PromptPayload::from_value(arg);
        match self.orchestrator.submit(&mut self.state, payload).await {
            Ok(completion) => vec![
                Event::Notes(completion.notes),
                self.history_event(),
                Event::Status(Status::Done),
            ],
            Err(err) => {
                let mut events: Vec<Event> =
                    err.detail_lines().into_iter().map(Event::Post).collect();
                events.push(Event::Status(Status::Error));
                events
            }
        }
    }

    fn history_event(&self) -> Event {
        Event::History(self.state.history().to_vec())
    }
}

fn confirm(result: Result<String, ValidationError>) -> Vec<Event> {
    match result {
        Ok(message) => vec![Event::Post(message)],
        Err(err) => {
            warn!("{err}");
            vec![Event::Post(format!("Error: {err}"))]
        }
    }
}

/// `{"history": [...]}`; a missing or null history means empty. Entries are
/// taken as they are, only the list itself is required.
fn history_from_dict(arg: Value) -> Result<Option<Vec<ChatMessage>>, ValidationError> {
    let history = match arg {
        Value::Object(mut dict) => dict.remove("history").unwrap_or(Value::Null),
        Value::Null => Value::Null,
        other => {
            return Err(ValidationError::History(format!(
                "expected a dictionary, got {other}"
            )))
        }
    };
    if history.is_null() {
        return Ok(None);
    }
    serde_json::from_value(history)
        .map(Some)
        .map_err(|err| ValidationError::History(err.to_string()))
}

fn atom_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
