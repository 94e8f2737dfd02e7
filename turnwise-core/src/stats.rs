// Read-only aggregates over processed messages

use serde::Serialize;

use crate::types::{CanonicalMessage, Role, ToolCallStatus};

/// Tool calls in one status, with their summed duration in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub count: usize,
    pub execution_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub system_messages: usize,
    pub tool_messages: usize,
    pub messages_with_tool_calls: usize,
    pub total_tool_calls: usize,
    pub pending: StatusTally,
    pub running: StatusTally,
    pub success: StatusTally,
    pub error: StatusTally,
    /// Portion of the summed execution time that comes from estimated windows
    pub estimated_execution_time: u64,
}

impl PipelineStats {
    pub fn from_messages(messages: &[CanonicalMessage]) -> Self {
        let mut stats = PipelineStats {
            total_messages: messages.len(),
            ..Default::default()
        };

        for message in messages {
            match message.role {
                Role::User => stats.user_messages += 1,
                Role::Assistant => stats.assistant_messages += 1,
                Role::System => stats.system_messages += 1,
                Role::Tool => stats.tool_messages += 1,
            }

            if message.has_tool_calls() {
                stats.messages_with_tool_calls += 1;
            }

            for call in &message.tool_calls {
                stats.total_tool_calls += 1;
                let elapsed = call.execution_time.unwrap_or(0);
                let tally = stats.tally_mut(call.status);
                tally.count += 1;
                tally.execution_time = tally.execution_time.saturating_add(elapsed);
                if call.estimated {
                    stats.estimated_execution_time = stats.estimated_execution_time.saturating_add(elapsed);
                }
            }
        }

        stats
    }

    pub fn tally(&self, status: ToolCallStatus) -> StatusTally {
        match status {
            ToolCallStatus::Pending => self.pending,
            ToolCallStatus::Running => self.running,
            ToolCallStatus::Success => self.success,
            ToolCallStatus::Error => self.error,
        }
    }

    fn tally_mut(&mut self, status: ToolCallStatus) -> &mut StatusTally {
        match status {
            ToolCallStatus::Pending => &mut self.pending,
            ToolCallStatus::Running => &mut self.running,
            ToolCallStatus::Success => &mut self.success,
            ToolCallStatus::Error => &mut self.error,
        }
    }

    /// Summed execution time across every status, saturating at `u64::MAX`
    pub fn total_execution_time(&self) -> u64 {
        ToolCallStatus::ALL
            .iter()
            .fold(0u64, |total, s| total.saturating_add(self.tally(*s).execution_time))
    }
}
