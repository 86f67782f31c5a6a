//! Note table codec.
//!
//! Notes travel to the model as a comma separated table, one row per note,
//! with start times written as the offset from the previous row. The model
//! only ever sees this text form and answers in the same shape.

use crate::error::NoteTableError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

pub const HEADER: &str = "pitch,start_time_offset,duration,velocity";

const FIELDS: [&str; 4] = ["pitch", "start_time_offset", "duration", "velocity"];

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("invalid fence regex"));

/// One note of a clip. `start_time` is absolute from the clip start.
///
/// Fields are floats so that values decoded leniently from model output can
/// carry NaN. Whole numbers serialize as JSON integers and NaN as `null`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Note {
    #[serde(serialize_with = "host_number")]
    pub pitch: f64,
    #[serde(serialize_with = "host_number")]
    pub start_time: f64,
    #[serde(serialize_with = "host_number")]
    pub duration: f64,
    #[serde(serialize_with = "host_number")]
    pub velocity: f64,
}

/// Largest magnitude below which every whole f64 is exact as an i64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn host_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

impl Note {
    pub fn new(pitch: f64, start_time: f64, duration: f64, velocity: f64) -> Self {
        Self {
            pitch,
            start_time,
            duration,
            velocity,
        }
    }
}

/// Header row followed by one row per note, in input order.
pub fn encode(notes: &[Note]) -> String {
    let mut table = String::with_capacity(HEADER.len() + 1 + notes.len() * 16);
    table.push_str(HEADER);
    table.push('\n');

    let mut last_start = 0.0;
    for note in notes {
        let offset = note.start_time - last_start;
        last_start = note.start_time;
        table.push_str(&format!(
            "{},{},{},{}\n",
            note.pitch, offset, note.duration, note.velocity
        ));
    }
    table
}

/// Lenient decode: never fails. Unparseable fields become NaN, an empty field
/// reads as 0. The first line is dropped without looking at it.
pub fn decode(table: &str) -> Vec<Note> {
    let mut start_time = 0.0;
    rows(table)
        .map(|line| {
            let mut fields = line.split(',');
            let pitch = lenient_number(fields.next());
            let offset = lenient_number(fields.next());
            let duration = lenient_number(fields.next());
            let velocity = lenient_number(fields.next());
            start_time += offset;
            Note::new(pitch, start_time, duration, velocity)
        })
        .collect()
}

/// Like [`decode`] but refuses rows that are not exactly four finite numbers.
/// Line numbers in errors count the header as line 1.
pub fn decode_strict(table: &str) -> Result<Vec<Note>, NoteTableError> {
    let mut start_time = 0.0;
    let mut notes = Vec::new();

    for (index, line) in rows(table).enumerate() {
        let line_no = index + 2;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != FIELDS.len() {
            return Err(NoteTableError::FieldCount {
                line: line_no,
                found: fields.len(),
            });
        }

        let mut values = [0.0; 4];
        for (slot, (&name, &text)) in values.iter_mut().zip(FIELDS.iter().zip(&fields)) {
            *slot = text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| NoteTableError::NotANumber {
                    line: line_no,
                    field: name,
                    value: text.to_string(),
                })?;
        }

        start_time += values[1];
        notes.push(Note::new(values[0], start_time, values[2], values[3]));
    }
    Ok(notes)
}

/// The part of a model reply that holds the table: the first fenced code
/// block if there is one, otherwise the whole reply.
pub fn table_in_reply(content: &str) -> &str {
    FENCE_RE
        .captures(content)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .unwrap_or(content)
}

fn rows(table: &str) -> impl Iterator<Item = &str> {
    table.trim().lines().skip(1)
}

fn lenient_number(field: Option<&str>) -> f64 {
    match field.map(str::trim) {
        None => f64::NAN,
        Some("") => 0.0,
        Some(text) => text.parse().unwrap_or(f64::NAN),
    }
}
