//! A single log event, independent of how it is encoded.

use std::collections::BTreeMap;
use std::panic::Location;

use chrono::{DateTime, Local};

use crate::observability::level::Level;

/// Open mapping of contextual key/value pairs attached to a log line.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// One log event.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Local>,
    pub level: Level,
    pub message: String,
    pub fields: Fields,
    /// `file:line` of the call site, filled in by the sink when caller
    /// annotation is enabled.
    pub caller: Option<String>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Local::now(),
            level,
            message: message.into(),
            fields: Fields::new(),
            caller: None,
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub(crate) fn with_location(mut self, location: &Location<'_>) -> Self {
        self.caller = Some(format!("{}:{}", location.file(), location.line()));
        self
    }
}
