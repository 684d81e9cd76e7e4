//! Tracing layer that turns spans and events into log graph entries

use crate::graph::{EntryKey, EntryStatus, LogGraph, LogLevel, NewEntry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

const OWN_TARGET: &str = "live_log";

/// Spans become `active` entries that turn `done` when closed; events become
/// finished child entries of the span they occur in.
///
/// Diagnostics of this crate itself are ignored, otherwise every render would
/// log into the graph and trigger another render.
#[derive(Debug, Clone)]
pub struct GraphTracingLayer {
    graph: Arc<LogGraph>,
}

impl GraphTracingLayer {
    pub fn new(graph: Arc<LogGraph>) -> Self {
        Self { graph }
    }
}

/// Graph entry of a span, kept in the span's extensions.
struct SpanEntry(EntryKey);

/// Collects the `message` field and every other field separately
#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: BTreeMap<String, String>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }

    /// The message, or the fields as `key=value` pairs when there is none.
    fn text(&self) -> String {
        if !self.message.is_empty() {
            return self.message.clone();
        }
        self.fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut text = format!("{:?}", value);
        // Remove quotes from debug format if it's a simple string
        if text.len() > 2 && text.starts_with('"') && text.ends_with('"') {
            text = text[1..text.len() - 1].to_string();
        }
        self.push(field, text);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }
}

fn is_own(metadata: &Metadata<'_>) -> bool {
    let target = metadata.target();
    target == OWN_TARGET || target.starts_with("live_log::")
}

impl<S> Layer<S> for GraphTracingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let metadata = attrs.metadata();
        if is_own(metadata) {
            return;
        }
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut collector = FieldCollector::default();
        attrs.record(&mut collector);

        let parent = span
            .parent()
            .and_then(|parent| parent.extensions().get::<SpanEntry>().map(|entry| entry.0));
        let entry = NewEntry::task(metadata.name(), collector.text())
            .with_metadata(collector.fields);
        let entry = NewEntry {
            level: LogLevel::from_tracing(metadata.level()),
            ..entry
        };

        if let Ok(key) = self.graph.insert(parent, entry) {
            span.extensions_mut().insert(SpanEntry(key));
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let Some(key) = span.extensions().get::<SpanEntry>().map(|entry| entry.0) else {
            return;
        };

        let mut collector = FieldCollector::default();
        values.record(&mut collector);
        if !collector.message.is_empty() {
            let _ = self.graph.update_message(key, collector.message);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own(metadata) {
            return;
        }

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let parent = ctx
            .event_span(event)
            .and_then(|span| span.extensions().get::<SpanEntry>().map(|entry| entry.0));
        let level = LogLevel::from_tracing(metadata.level());
        let mut fields = collector.fields;
        fields.insert("target".to_string(), metadata.target().to_string());
        let entry = NewEntry::new(level, collector.message)
            .with_status(EntryStatus::Done)
            .with_metadata(fields);

        let _ = self.graph.insert(parent, entry);
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let Some(key) = span.extensions().get::<SpanEntry>().map(|entry| entry.0) else {
            return;
        };
        let _ = self.graph.set_status(key, EntryStatus::Done);
    }
}
