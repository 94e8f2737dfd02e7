// Tool-result reconciliation
// Joins tool-role entries to the tool calls they answer, by tool_call_id

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::telemetry::{PipelineEvent, TelemetrySink};
use crate::types::{CanonicalMessage, RawEntry, Role, ToolCallStatus};

/// Width of the display-only window attached to results without timing
pub const ESTIMATED_WINDOW_MS: u64 = 2_000;

/// Parsed tool results keyed by tool-call id
#[derive(Debug, Default)]
pub struct ToolResults {
    results: HashMap<String, Value>,
}

impl ToolResults {
    /// Index every tool-role entry. Later entries for the same id replace earlier ones.
    pub fn collect(tool_entries: &[(usize, &RawEntry)], sink: &dyn TelemetrySink) -> Self {
        let mut results = HashMap::with_capacity(tool_entries.len());

        for &(index, entry) in tool_entries {
            let Some(tool_call_id) = entry.tool_call_id.as_deref() else {
                sink.record(PipelineEvent::OrphanToolResult { index });
                continue;
            };

            let content = entry.content.as_deref().unwrap_or_default();
            let result = parse_tool_result(tool_call_id, content, sink);
            if results.insert(tool_call_id.to_string(), result).is_some() {
                sink.record(PipelineEvent::DuplicateToolResult {
                    tool_call_id: tool_call_id.to_string(),
                });
            }
        }

        Self { results }
    }

    pub fn get(&self, tool_call_id: &str) -> Option<&Value> {
        self.results.get(tool_call_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Returns the parsed JSON value, or the content verbatim as a JSON string
pub fn parse_tool_result(tool_call_id: &str, content: &str, sink: &dyn TelemetrySink) -> Value {
    match serde_json::from_str(content) {
        Ok(json) => json,
        Err(_) => {
            sink.record(PipelineEvent::UnparsedToolResult {
                tool_call_id: tool_call_id.to_string(),
            });
            Value::String(content.to_string())
        }
    }
}

pub struct Reconciler {
    now: DateTime<Utc>,
}

impl Reconciler {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Attach results to matching tool calls on assistant messages.
    ///
    /// A match always sets the status to success, even over a prior error.
    /// Calls with no timing at all get an estimated window ending at `now`.
    /// Returns the number of tool calls that received a result.
    pub fn reconcile(&self, messages: &mut [CanonicalMessage], results: &ToolResults, sink: &dyn TelemetrySink) -> usize {
        if results.is_empty() {
            return 0;
        }

        let mut reconciled = 0;
        for message in messages.iter_mut().filter(|m| m.role == Role::Assistant) {
            for call in message.tool_calls.iter_mut() {
                let Some(result) = results.get(&call.id) else {
                    continue;
                };

                let previous = call.status;
                call.result = Some(result.clone());
                call.status = ToolCallStatus::Success;

                if !call.has_timing() {
                    call.start_time = Some(self.now - Duration::milliseconds(ESTIMATED_WINDOW_MS as i64));
                    call.end_time = Some(self.now);
                    call.execution_time = Some(ESTIMATED_WINDOW_MS);
                    call.estimated = true;
                    sink.record(PipelineEvent::TimingSynthesized {
                        tool_call_id: call.id.clone(),
                    });
                }

                sink.record(PipelineEvent::ToolCallReconciled {
                    message_id: message.id.clone(),
                    tool_call_id: call.id.clone(),
                    previous,
                });
                reconciled += 1;
            }
        }
        reconciled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::testing::MemorySink;
    use crate::telemetry::NoopSink;
    use crate::types::ToolCall;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_800_000_000_000).unwrap()
    }

    fn call(id: &str, status: ToolCallStatus) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "lookup".to_string(),
            arguments: json!({}),
            result: None,
            status,
            execution_time: None,
            start_time: None,
            end_time: None,
            estimated: false,
            sequence: 0,
        }
    }

    fn assistant(id: &str, calls: Vec<ToolCall>) -> CanonicalMessage {
        CanonicalMessage {
            id: id.to_string(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: now(),
            tool_calls: calls,
            tool_call_id: None,
            model: None,
            original_id: id.to_string(),
            merged_from: Vec::new(),
        }
    }

    fn results(entries: &[RawEntry]) -> ToolResults {
        let indexed: Vec<_> = entries.iter().enumerate().collect();
        ToolResults::collect(&indexed, &NoopSink)
    }

    #[test]
    fn test_result_attached_and_status_forced() {
        let entries = vec![RawEntry::new("tool", Some(r#"{"ok":true}"#)).with_tool_call_id("t1")];
        let mut messages = vec![assistant("a1", vec![call("t1", ToolCallStatus::Pending)])];

        let count = Reconciler::new(now()).reconcile(&mut messages, &results(&entries), &NoopSink);

        let reconciled = &messages[0].tool_calls[0];
        assert_eq!(count, 1);
        assert_eq!(reconciled.status, ToolCallStatus::Success);
        assert_eq!(reconciled.result, Some(json!({"ok": true})));
    }

    #[test]
    fn test_error_status_overridden_by_result() {
        let entries = vec![RawEntry::new("tool", Some("boom")).with_tool_call_id("t1")];
        let mut messages = vec![assistant("a1", vec![call("t1", ToolCallStatus::Error)])];

        Reconciler::new(now()).reconcile(&mut messages, &results(&entries), &NoopSink);
        assert_eq!(messages[0].tool_calls[0].status, ToolCallStatus::Success);
    }

    #[test]
    fn test_malformed_result_kept_verbatim() {
        let sink = MemorySink::default();
        let entries = vec![RawEntry::new("tool", Some("not-json")).with_tool_call_id("t1")];
        let indexed: Vec<_> = entries.iter().enumerate().collect();
        let results = ToolResults::collect(&indexed, &sink);

        assert_eq!(results.get("t1"), Some(&json!("not-json")));
        assert!(sink.events().contains(&PipelineEvent::UnparsedToolResult {
            tool_call_id: "t1".to_string()
        }));
    }

    #[test]
    fn test_null_content_becomes_empty_string() {
        let entries = vec![RawEntry::new("tool", None).with_tool_call_id("t1")];
        assert_eq!(results(&entries).get("t1"), Some(&json!("")));
    }

    #[test]
    fn test_estimated_window_only_without_timing() {
        let entries = vec![
            RawEntry::new("tool", Some("1")).with_tool_call_id("t1"),
            RawEntry::new("tool", Some("2")).with_tool_call_id("t2"),
        ];
        let mut measured = call("t2", ToolCallStatus::Running);
        measured.execution_time = Some(0);
        let mut messages = vec![assistant("a1", vec![call("t1", ToolCallStatus::Pending), measured])];

        Reconciler::new(now()).reconcile(&mut messages, &results(&entries), &NoopSink);

        let estimated = &messages[0].tool_calls[0];
        assert!(estimated.estimated);
        assert_eq!(estimated.execution_time, Some(ESTIMATED_WINDOW_MS));
        assert_eq!(estimated.end_time, Some(now()));
        assert_eq!(
            estimated.start_time.map(|t| t.timestamp_millis()),
            Some(now().timestamp_millis() - 2_000)
        );

        let measured = &messages[0].tool_calls[1];
        assert!(!measured.estimated);
        assert_eq!(measured.execution_time, Some(0));
        assert_eq!(measured.start_time, None);
    }

    #[test]
    fn test_unmatched_calls_untouched() {
        let entries = vec![RawEntry::new("tool", Some("1")).with_tool_call_id("other")];
        let original = vec![assistant("a1", vec![call("t1", ToolCallStatus::Pending)])];
        let mut messages = original.clone();

        let count = Reconciler::new(now()).reconcile(&mut messages, &results(&entries), &NoopSink);
        assert_eq!(count, 0);
        assert_eq!(messages, original);
    }

    #[test]
    fn test_later_result_wins() {
        let sink = MemorySink::default();
        let entries = vec![
            RawEntry::new("tool", Some("1")).with_tool_call_id("t1"),
            RawEntry::new("tool", Some("2")).with_tool_call_id("t1"),
            RawEntry::new("tool", Some("3")),
        ];
        let indexed: Vec<_> = entries.iter().enumerate().collect();
        let results = ToolResults::collect(&indexed, &sink);

        assert_eq!(results.len(), 1);
        assert_eq!(results.get("t1"), Some(&json!(2)));
        let events = sink.events();
        assert!(events.contains(&PipelineEvent::DuplicateToolResult {
            tool_call_id: "t1".to_string()
        }));
        assert!(events.contains(&PipelineEvent::OrphanToolResult { index: 2 }));
    }

    #[test]
    fn test_non_assistant_messages_ignored() {
        let entries = vec![RawEntry::new("tool", Some("1")).with_tool_call_id("t1")];
        let mut message = assistant("u1", vec![call("t1", ToolCallStatus::Pending)]);
        message.role = Role::User;
        let mut messages = vec![message];

        let count = Reconciler::new(now()).reconcile(&mut messages, &results(&entries), &NoopSink);
        assert_eq!(count, 0);
        assert_eq!(messages[0].tool_calls[0].status, ToolCallStatus::Pending);
    }
}
