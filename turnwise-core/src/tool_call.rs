// Tool-call shape normalization
// Producers emit either a flat record or an OpenAI-style nested `function` record

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::telemetry::{PipelineEvent, TelemetrySink};
use crate::timestamp::{parse_instant, truncate_millis};
use crate::types::{lenient_string, present_value, ToolCall, ToolCallStatus};

/// Fields both producer shapes may carry at the top level
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallEnvelope {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, alias = "executionTime", alias = "duration_ms")]
    pub execution_time: Option<Value>,
    #[serde(default, rename = "startTime", alias = "start_time")]
    pub start_time: Option<Value>,
    #[serde(default, rename = "endTime", alias = "end_time")]
    pub end_time: Option<Value>,
    #[serde(default, deserialize_with = "present_value")]
    pub result: Option<Value>,
    #[serde(default)]
    pub estimated: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSpec {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NestedToolCall {
    pub function: FunctionSpec,
    #[serde(flatten)]
    pub envelope: ToolCallEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlatToolCall {
    #[serde(flatten)]
    pub envelope: ToolCallEnvelope,
}

/// The two known producer shapes, decided once per record
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolCallShape {
    /// `{id, type, function: {name, arguments}}`
    NestedFunction(NestedToolCall),
    /// `{id, name, arguments, ...}`
    Flat(FlatToolCall),
}

impl ToolCallShape {
    /// Decode a producer record. Non-objects are rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    fn envelope(&self) -> &ToolCallEnvelope {
        match self {
            ToolCallShape::NestedFunction(nested) => &nested.envelope,
            ToolCallShape::Flat(flat) => &flat.envelope,
        }
    }

    /// `function.name` wins over a top-level `name`
    pub fn name(&self) -> Option<&str> {
        let nested = match self {
            ToolCallShape::NestedFunction(nested) => nested.function.name.as_deref(),
            ToolCallShape::Flat(_) => None,
        };
        nested.or(self.envelope().name.as_deref())
    }

    /// `function.arguments` wins over top-level `arguments`
    pub fn arguments(&self) -> Option<&Value> {
        let nested = match self {
            ToolCallShape::NestedFunction(nested) => nested.function.arguments.as_ref(),
            ToolCallShape::Flat(_) => None,
        };
        nested.or(self.envelope().arguments.as_ref())
    }

    /// Resolve into the canonical record.
    ///
    /// `fallback_id` is used when the producer left the id out. A missing
    /// status becomes [`ToolCallStatus::DEFAULT`].
    pub fn into_tool_call(self, fallback_id: String, sequence: usize, sink: &dyn TelemetrySink) -> ToolCall {
        let name = self.name().unwrap_or_default().to_string();
        let arguments = self.arguments().cloned().unwrap_or(Value::Null);
        let envelope = match self {
            ToolCallShape::NestedFunction(nested) => nested.envelope,
            ToolCallShape::Flat(flat) => flat.envelope,
        };
        let id = envelope.id.unwrap_or(fallback_id);

        let status = match envelope.status.as_deref() {
            None => ToolCallStatus::DEFAULT,
            Some(raw) => ToolCallStatus::parse(raw).unwrap_or_else(|| {
                sink.record(PipelineEvent::UnknownToolStatus {
                    tool_call_id: id.clone(),
                    status: raw.to_string(),
                });
                ToolCallStatus::DEFAULT
            }),
        };

        let start_time = envelope.start_time.as_ref().and_then(parse_instant).map(truncate_millis);
        let end_time = envelope.end_time.as_ref().and_then(parse_instant).map(truncate_millis);
        let execution_time = resolve_execution_time(envelope.execution_time.as_ref(), start_time, end_time);

        ToolCall {
            id,
            name,
            arguments,
            result: envelope.result,
            status,
            execution_time,
            start_time,
            end_time,
            estimated: envelope.estimated.as_ref().and_then(Value::as_bool).unwrap_or(false),
            sequence,
        }
    }
}

/// Explicit duration wins; otherwise derive it from the window when both ends exist.
/// Unknown stays `None` rather than collapsing to zero.
pub fn resolve_execution_time(
    explicit: Option<&Value>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<u64> {
    if let Some(millis) = explicit.and_then(duration_millis) {
        return Some(millis);
    }

    match (start, end) {
        (Some(start), Some(end)) => u64::try_from((end - start).num_milliseconds()).ok(),
        _ => None,
    }
}

fn duration_millis(value: &Value) -> Option<u64> {
    let millis = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if millis.is_finite() && millis >= 0.0 {
        Some(millis.round() as u64)
    } else {
        None
    }
}
