// Telemetry sink for pipeline diagnostics
// Stages report degradations here instead of logging through a global side channel

use crate::types::{Role, ToolCallStatus};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Reconcile,
    Merge,
    Order,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Reconcile => "reconcile",
            Stage::Merge => "merge",
            Stage::Order => "order",
        }
    }
}

/// Something worth knowing that happened while processing a batch
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Entry dropped because its role is not one we know
    UnknownRole { index: usize, role: String },
    /// Explicit id already used earlier in the batch; a suffixed id was assigned
    DuplicateId { index: usize, id: String, assigned: String },
    /// Neither `timestamp` nor `created_at` parsed; current time was used
    TimestampFallback { message_id: String },
    /// Tool calls found on a non-assistant entry were discarded
    StrayToolCalls { message_id: String, role: Role, count: usize },
    /// A tool-call record could not be decoded in either known shape
    MalformedToolCall { message_id: String, index: usize },
    /// Status string not recognized; the documented default was applied
    UnknownToolStatus { tool_call_id: String, status: String },
    /// Tool entry without a `tool_call_id`; its result cannot be joined
    OrphanToolResult { index: usize },
    /// A later tool entry replaced an earlier result for the same id
    DuplicateToolResult { tool_call_id: String },
    /// Tool result content was not JSON and was kept as a raw string
    UnparsedToolResult { tool_call_id: String },
    ToolCallReconciled {
        message_id: String,
        tool_call_id: String,
        previous: ToolCallStatus,
    },
    /// A display-only timing window was attached to a reconciled tool call
    TimingSynthesized { tool_call_id: String },
    MessagesMerged { first: String, second: String, merged: String },
    StageCompleted { stage: Stage, messages: usize },
}

/// Receives pipeline events. Implementations must only observe.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: PipelineEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _event: PipelineEvent) {}
}

/// Forwards events to `tracing` as structured records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::UnknownRole { index, role } => {
                tracing::warn!(index, %role, "dropping entry with unrecognized role");
            }
            PipelineEvent::DuplicateId { index, id, assigned } => {
                tracing::warn!(index, %id, %assigned, "duplicate message id, reassigned");
            }
            PipelineEvent::TimestampFallback { message_id } => {
                tracing::debug!(%message_id, "no usable timestamp, using current time");
            }
            PipelineEvent::StrayToolCalls { message_id, role, count } => {
                tracing::warn!(%message_id, role = role.as_str(), count, "discarding tool calls on non-assistant message");
            }
            PipelineEvent::MalformedToolCall { message_id, index } => {
                tracing::warn!(%message_id, index, "skipping malformed tool call");
            }
            PipelineEvent::UnknownToolStatus { tool_call_id, status } => {
                tracing::debug!(%tool_call_id, %status, "unknown tool status, using default");
            }
            PipelineEvent::OrphanToolResult { index } => {
                tracing::warn!(index, "tool entry has no tool_call_id");
            }
            PipelineEvent::DuplicateToolResult { tool_call_id } => {
                tracing::debug!(%tool_call_id, "tool result superseded by a later entry");
            }
            PipelineEvent::UnparsedToolResult { tool_call_id } => {
                tracing::trace!(%tool_call_id, "tool result is not JSON, keeping raw string");
            }
            PipelineEvent::ToolCallReconciled {
                message_id,
                tool_call_id,
                previous,
            } => {
                tracing::trace!(%message_id, %tool_call_id, previous = previous.as_str(), "attached tool result");
            }
            PipelineEvent::TimingSynthesized { tool_call_id } => {
                tracing::trace!(%tool_call_id, "synthesized estimated timing window");
            }
            PipelineEvent::MessagesMerged { first, second, merged } => {
                tracing::trace!(%first, %second, %merged, "merged assistant fragments");
            }
            PipelineEvent::StageCompleted { stage, messages } => {
                tracing::debug!(stage = stage.as_str(), messages, "stage completed");
            }
        }
    }
}
