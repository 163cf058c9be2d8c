//! Line encoders for the log sink.
//!
//! # Encodings
//! - `Json`: one JSON object per line with `time`, `level`, `msg`, an
//!   optional `caller`, then the record's fields.
//! - `Text`: logfmt-style `time="..." level=info msg="..." key=value`, or
//!   when coloured, `INFO[time] msg  key=value` with ANSI level colours.
//!
//! Field keys that clash with the reserved keys are written as
//! `fields.<key>` so they never overwrite the envelope.

use serde_json::{Map, Value};
use std::fmt::Write as _;

use crate::observability::record::Record;

/// Timestamp format used by every encoding.
pub const LOGGING_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

const RESERVED_KEYS: [&str; 4] = ["time", "level", "msg", "caller"];

/// How records are turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Text { colour: bool },
}

impl Encoding {
    /// Encode a record as one newline-terminated line.
    pub fn encode(&self, record: &Record) -> String {
        match self {
            Encoding::Json => encode_json(record),
            Encoding::Text { colour: false } => encode_text(record),
            Encoding::Text { colour: true } => encode_coloured(record),
        }
    }
}

fn field_key(key: &str) -> String {
    if RESERVED_KEYS.contains(&key) {
        format!("fields.{}", key)
    } else {
        key.to_string()
    }
}

fn encode_json(record: &Record) -> String {
    let mut map = Map::new();
    for (key, value) in &record.fields {
        map.insert(field_key(key), value.clone());
    }
    map.insert(
        "time".into(),
        Value::String(record.time.format(LOGGING_TIMESTAMP).to_string()),
    );
    map.insert("level".into(), Value::String(record.level.as_str().into()));
    map.insert("msg".into(), Value::String(record.message.clone()));
    if let Some(caller) = &record.caller {
        map.insert("caller".into(), Value::String(caller.clone()));
    }

    let mut line = Value::Object(map).to_string();
    line.push('\n');
    line
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || !text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-._/@^+:".contains(c))
}

fn render_value(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if needs_quoting(&raw) {
        format!("{:?}", raw)
    } else {
        raw
    }
}

fn encode_text(record: &Record) -> String {
    let mut line = String::new();
    let time = record.time.format(LOGGING_TIMESTAMP).to_string();
    let _ = write!(
        line,
        "time={} level={} msg={}",
        render_value(&Value::String(time)),
        record.level.as_str(),
        render_value(&Value::String(record.message.clone())),
    );
    if let Some(caller) = &record.caller {
        let _ = write!(line, " caller={}", render_value(&Value::String(caller.clone())));
    }
    for (key, value) in &record.fields {
        let _ = write!(line, " {}={}", field_key(key), render_value(value));
    }
    line.push('\n');
    line
}

fn encode_coloured(record: &Record) -> String {
    let colour = record.level.colour_code();
    let mut line = String::new();
    let _ = write!(
        line,
        "\x1b[{}m{}\x1b[0m[{}] ",
        colour,
        record.level.short_tag(),
        record.time.format(LOGGING_TIMESTAMP),
    );
    if let Some(caller) = &record.caller {
        let _ = write!(line, "{} ", caller);
    }
    // pad so fields line up across messages
    let _ = write!(line, "{:<44}", record.message);
    for (key, value) in &record.fields {
        let _ = write!(
            line,
            " \x1b[{}m{}\x1b[0m={}",
            colour,
            field_key(key),
            render_value(value)
        );
    }
    line.push('\n');
    line
}
