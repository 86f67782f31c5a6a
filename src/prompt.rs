//! Prompt payloads as they arrive from the host.

use crate::notes::{encode, Note};
use log::warn;
use serde_json::{Map, Value};

/// Key under which a clip dictionary (`{"notes": [...]}`) is embedded.
pub const MIDI_KEY: &str = "promptMidi";

#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    /// Free text, already joined from the host's atoms.
    Plain(String),
    /// Any other value, sent as is.
    Structured(Value),
    /// An object carrying a clip. `rest` holds the other fields plus a null
    /// placeholder under `promptMidi` that marks where the table goes.
    WithNotes {
        notes: Vec<Note>,
        rest: Map<String, Value>,
    },
}

impl PromptPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => PromptPayload::Plain(text),
            Value::Array(atoms) => PromptPayload::Plain(
                atoms
                    .iter()
                    .map(atom_text)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Value::Object(mut fields) => match embedded_notes(&fields) {
                Some(notes) => {
                    // insert on an existing key keeps its position
                    fields.insert(MIDI_KEY.to_string(), Value::Null);
                    PromptPayload::WithNotes {
                        notes,
                        rest: fields,
                    }
                }
                None => PromptPayload::Structured(Value::Object(fields)),
            },
            other => PromptPayload::Structured(other),
        }
    }

    /// Message content for the history: the JSON text of the payload, with
    /// any embedded clip replaced by its note table.
    pub fn into_content(self) -> String {
        match self {
            PromptPayload::Plain(text) => Value::String(text).to_string(),
            PromptPayload::Structured(value) => value.to_string(),
            PromptPayload::WithNotes { notes, mut rest } => {
                rest.insert(MIDI_KEY.to_string(), Value::String(encode(&notes)));
                Value::Object(rest).to_string()
            }
        }
    }
}

fn embedded_notes(fields: &Map<String, Value>) -> Option<Vec<Note>> {
    let notes = fields.get(MIDI_KEY)?.get("notes")?;
    match serde_json::from_value::<Vec<Note>>(notes.clone()) {
        Ok(notes) => Some(notes),
        Err(err) => {
            warn!("{MIDI_KEY}.notes is not a note list, sending it unchanged: {err}");
            None
        }
    }
}

fn atom_text(atom: &Value) -> String {
    match atom {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
