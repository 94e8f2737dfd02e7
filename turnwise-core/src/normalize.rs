// Normalizer: raw transcript entries -> canonical messages
// Tool-role entries are set aside for the reconciler; visible output order is not final yet

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::telemetry::{PipelineEvent, TelemetrySink};
use crate::timestamp::parse_instant;
use crate::tool_call::ToolCallShape;
use crate::types::{CanonicalMessage, RawEntry, Role, ToolCall};

/// Output of the normalization stage
#[derive(Debug)]
pub struct Normalized<'a> {
    /// Visible messages in input order
    pub messages: Vec<CanonicalMessage>,
    /// Every tool-role entry, whether or not it is also visible
    pub tool_entries: Vec<(usize, &'a RawEntry)>,
}

pub struct Normalizer {
    filter_tool_messages: bool,
    now: DateTime<Utc>,
}

impl Normalizer {
    /// `now` is the fallback timestamp for entries without a usable one
    pub fn new(filter_tool_messages: bool, now: DateTime<Utc>) -> Self {
        Self {
            filter_tool_messages,
            now,
        }
    }

    pub fn normalize<'a>(&self, entries: &'a [RawEntry], sink: &dyn TelemetrySink) -> Normalized<'a> {
        let mut ids = IdAllocator::new(entries);
        let mut messages = Vec::with_capacity(entries.len());
        let mut tool_entries = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            let Some(role) = Role::parse(&entry.role) else {
                sink.record(PipelineEvent::UnknownRole {
                    index,
                    role: entry.role.clone(),
                });
                continue;
            };

            if role == Role::Tool {
                tool_entries.push((index, entry));
                if self.filter_tool_messages {
                    continue;
                }
            }

            let id = ids.assign(index, entry.id.as_deref(), sink);
            messages.push(self.normalize_entry(entry, role, id, sink));
        }

        Normalized {
            messages,
            tool_entries,
        }
    }

    fn normalize_entry(&self, entry: &RawEntry, role: Role, id: String, sink: &dyn TelemetrySink) -> CanonicalMessage {
        let timestamp = resolve_timestamp(entry).unwrap_or_else(|| {
            sink.record(PipelineEvent::TimestampFallback {
                message_id: id.clone(),
            });
            self.now
        });

        let mut tool_calls = normalize_tool_calls(&id, entry.tool_calls.as_ref(), sink);
        if role != Role::Assistant && !tool_calls.is_empty() {
            sink.record(PipelineEvent::StrayToolCalls {
                message_id: id.clone(),
                role,
                count: tool_calls.len(),
            });
            tool_calls.clear();
        }

        let tool_call_id = match role {
            Role::Tool => entry.tool_call_id.clone(),
            _ => None,
        };

        CanonicalMessage {
            original_id: entry.original_id.clone().unwrap_or_else(|| id.clone()),
            id,
            role,
            content: entry.content.clone().unwrap_or_default(),
            timestamp,
            tool_calls,
            tool_call_id,
            model: entry.model_used.clone(),
            merged_from: entry.merged_from.clone(),
        }
    }
}

/// Explicit `timestamp` first, then `created_at`
fn resolve_timestamp(entry: &RawEntry) -> Option<DateTime<Utc>> {
    entry
        .timestamp
        .as_ref()
        .and_then(parse_instant)
        .or_else(|| entry.created_at.as_ref().and_then(parse_instant))
}

fn normalize_tool_calls(message_id: &str, raw: Option<&Value>, sink: &dyn TelemetrySink) -> Vec<ToolCall> {
    let records: Vec<&Value> = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        // A lone record where a list was expected
        Some(single) => vec![single],
    };

    let mut calls = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match ToolCallShape::from_value(record) {
            Some(shape) => {
                let fallback_id = format!("{message_id}-call-{index}");
                let sequence = calls.len();
                calls.push(shape.into_tool_call(fallback_id, sequence, sink));
            }
            None => sink.record(PipelineEvent::MalformedToolCall {
                message_id: message_id.to_string(),
                index,
            }),
        }
    }
    calls
}

/// Hands out batch-unique message ids.
///
/// Explicit ids are reserved up front so that generated ones never steal them.
struct IdAllocator<'a> {
    reserved: HashSet<&'a str>,
    used: HashSet<String>,
}

impl<'a> IdAllocator<'a> {
    fn new(entries: &'a [RawEntry]) -> Self {
        Self {
            reserved: entries.iter().filter_map(|e| e.id.as_deref()).collect(),
            used: HashSet::new(),
        }
    }

    fn assign(&mut self, index: usize, explicit: Option<&str>, sink: &dyn TelemetrySink) -> String {
        let id = match explicit {
            Some(id) if !self.used.contains(id) => id.to_string(),
            Some(id) => {
                let assigned = self.suffixed(id);
                sink.record(PipelineEvent::DuplicateId {
                    index,
                    id: id.to_string(),
                    assigned: assigned.clone(),
                });
                assigned
            }
            None => {
                let generated = format!("entry-{index}");
                if self.is_free(&generated) {
                    generated
                } else {
                    self.suffixed(&generated)
                }
            }
        };

        self.used.insert(id.clone());
        id
    }

    fn is_free(&self, candidate: &str) -> bool {
        !self.used.contains(candidate) && !self.reserved.contains(candidate)
    }

    fn suffixed(&self, base: &str) -> String {
        (2..)
            .map(|n| format!("{base}~{n}"))
            .find(|candidate| self.is_free(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}
