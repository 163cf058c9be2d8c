//! `tracing` layer that forwards events into a [`LogSink`].
//!
//! Span fields (such as a task's `task_id`) are captured when the span is
//! created and merged into every event recorded inside it, root first, so
//! the innermost value wins on key clashes.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanRecord};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::observability::level::Level;
use crate::observability::record::{Fields, Record};
use crate::observability::sink::LogSink;

pub struct SinkLayer {
    sink: Arc<LogSink>,
}

impl SinkLayer {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self { sink }
    }
}

/// Fields recorded on a span, stored in its extensions.
struct SpanFields(Fields);

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Fields,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut collector = FieldCollector::default();
        attrs.record(&mut collector);
        span.extensions_mut().insert(SpanFields(collector.fields));
    }

    fn on_record(&self, id: &Id, values: &SpanRecord<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut collector = FieldCollector::default();
        values.record(&mut collector);

        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(SpanFields(fields)) => fields.extend(collector.fields),
            None => extensions.insert(SpanFields(collector.fields)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(metadata.level());
        if !self.sink.enabled(level) {
            return;
        }

        let mut fields = Fields::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(span_fields)) = span.extensions().get::<SpanFields>() {
                    fields.extend(span_fields.clone());
                }
            }
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        fields.extend(collector.fields);

        let mut record =
            Record::new(level, collector.message.unwrap_or_default()).with_fields(fields);
        if self.sink.reports_caller() {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                record.caller = Some(format!("{}:{}", file, line));
            }
        }
        self.sink.emit(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::observability::capture::SharedBuffer;

    fn sink(level: &str, buffer: &SharedBuffer) -> Arc<LogSink> {
        let config = LogConfig {
            level: level.into(),
            format: "json".into(),
            ..LogConfig::default()
        };
        Arc::new(
            LogSink::builder(&config)
                .console(buffer.clone())
                .configure()
                .unwrap(),
        )
    }

    #[test]
    fn test_tracing_events_reach_the_sink() {
        let buffer = SharedBuffer::default();
        let dispatch = sink("info", &buffer).dispatch();

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::debug!("filtered out");
            tracing::info!(target_name = "lib", jobs = 3u64, "Compiling");
        });

        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["msg"], "Compiling");
        assert_eq!(lines[0]["target_name"], "lib");
        assert_eq!(lines[0]["jobs"], 3);
        assert_eq!(lines[0]["level"], "info");
    }

    #[test]
    fn test_span_fields_are_merged_into_events() {
        let buffer = SharedBuffer::default();
        let dispatch = sink("debug", &buffer).dispatch();

        tracing::dispatcher::with_default(&dispatch, || {
            let span = tracing::info_span!("task", task_id = "abc");
            let _guard = span.enter();
            tracing::warn!(step = "link", "Slow step");
        });

        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["task_id"], "abc");
        assert_eq!(lines[0]["step"], "link");
        assert_eq!(lines[0]["level"], "warning");
    }
}
