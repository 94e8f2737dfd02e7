// Core type definitions for Turnwise

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Parse a producer's role string. Anything unrecognized yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// Lifecycle state of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Success,
    Error,
}

impl ToolCallStatus {
    /// Status assigned when a producer omits one.
    ///
    /// This mirrors what upstream producers mean by a bare tool call: it was
    /// issued and finished. It is a documented default, not an inference.
    pub const DEFAULT: ToolCallStatus = ToolCallStatus::Success;

    pub const ALL: [ToolCallStatus; 4] = [
        ToolCallStatus::Pending,
        ToolCallStatus::Running,
        ToolCallStatus::Success,
        ToolCallStatus::Error,
    ];

    /// Parse a producer status string, accepting common aliases
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => Some(Self::Pending),
            "running" | "in_progress" => Some(Self::Running),
            "success" | "completed" => Some(Self::Success),
            "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Unprocessed transcript record, as handed over by an upstream producer.
///
/// Every field is optional at decode time so that one producer's quirks never
/// reject a whole batch. Shape checks happen in the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(default, alias = "toolCalls", skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(
        default,
        alias = "toolCallId",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_call_id: Option<String>,
    #[serde(default, alias = "model", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(
        default,
        alias = "originalId",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_id: Option<String>,
    #[serde(default, alias = "mergedFrom", skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
}

impl RawEntry {
    pub fn new(role: &str, content: Option<&str>) -> Self {
        RawEntry {
            role: role.to_string(),
            content: content.map(String::from),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Set an explicit timestamp in epoch milliseconds
    pub fn with_timestamp_ms(mut self, millis: i64) -> Self {
        self.timestamp = Some(Value::from(millis));
        self
    }

    pub fn with_created_at(mut self, created_at: &str) -> Self {
        self.created_at = Some(Value::from(created_at));
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<Value>) -> Self {
        self.tool_calls = Some(Value::Array(tool_calls));
        self
    }

    pub fn with_tool_call_id(mut self, tool_call_id: &str) -> Self {
        self.tool_call_id = Some(tool_call_id.to_string());
        self
    }
}

/// Record of one tool invocation requested within an assistant turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// Absent means no result yet; a JSON `null` result is kept as `Some(Value::Null)`
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub status: ToolCallStatus,
    /// Duration in milliseconds. `None` means unknown, which is not the same as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(
        rename = "startTime",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        rename = "endTime",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    /// Set when the timing window was synthesized for display rather than measured
    #[serde(default, skip_serializing_if = "is_false")]
    pub estimated: bool,
    pub sequence: usize,
}

impl ToolCall {
    /// True when any start, end or duration information is present
    pub fn has_timing(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some() || self.execution_time.is_some()
    }
}

/// Normalized conversation turn, ready for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Only set on tool-role messages, which are visible when filtering is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub original_id: String,
    /// Source ids of a merged turn, earliest first. Empty unless merged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
}

impl CanonicalMessage {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn is_merged(&self) -> bool {
        !self.merged_from.is_empty()
    }
}

// Processed output can be fed back in as raw input
impl From<&CanonicalMessage> for RawEntry {
    fn from(message: &CanonicalMessage) -> Self {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(Value::Array(
                message
                    .tool_calls
                    .iter()
                    .filter_map(|call| serde_json::to_value(call).ok())
                    .collect(),
            ))
        };

        RawEntry {
            id: Some(message.id.clone()),
            role: message.role.as_str().to_string(),
            content: Some(message.content.clone()),
            timestamp: Some(Value::from(message.timestamp.to_rfc3339())),
            created_at: None,
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
            model_used: message.model.clone(),
            original_id: Some(message.original_id.clone()),
            merged_from: message.merged_from.clone(),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accept strings and numbers for identifier-like fields; anything else is absent
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Any present value, `null` included. Pair with `#[serde(default)]` so only a
/// missing key yields `None`.
pub(crate) fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Content is usually a string, but some producers send an array of text blocks
fn lenient_content<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Array(blocks)) => Some(
            blocks
                .iter()
                .filter_map(|block| match block {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Some(other) => Some(other.to_string()),
    })
}
