// Turn merger: folds a content-only assistant fragment into the tool-call turn before it

use std::collections::HashSet;

use crate::telemetry::{PipelineEvent, TelemetrySink};
use crate::types::{CanonicalMessage, Role};

#[derive(Debug, Default)]
pub struct TurnMerger;

impl TurnMerger {
    pub fn new() -> Self {
        TurnMerger
    }

    /// Single forward scan.
    ///
    /// A tool-call-bearing assistant message absorbs at most one immediately
    /// following assistant message that has content and no tool calls. Merges
    /// are pairwise: three qualifying messages in a row produce two records.
    pub fn merge(&self, messages: Vec<CanonicalMessage>, sink: &dyn TelemetrySink) -> Vec<CanonicalMessage> {
        let mut taken: HashSet<String> = messages.iter().map(|m| m.id.clone()).collect();
        let mut merged = Vec::with_capacity(messages.len());
        let mut iter = messages.into_iter().peekable();

        while let Some(mut current) = iter.next() {
            if can_absorb(&current) && iter.peek().is_some_and(is_content_fragment) {
                if let Some(next) = iter.next() {
                    let first = current.id.clone();
                    fold_into(&mut current, next, &mut taken);
                    sink.record(PipelineEvent::MessagesMerged {
                        first,
                        second: current.merged_from[1].clone(),
                        merged: current.id.clone(),
                    });
                }
            }
            merged.push(current);
        }

        merged
    }
}

/// Assistant turn with tool calls that has not already absorbed a fragment
fn can_absorb(message: &CanonicalMessage) -> bool {
    message.role == Role::Assistant && message.has_tool_calls() && !message.is_merged()
}

fn is_content_fragment(message: &CanonicalMessage) -> bool {
    message.role == Role::Assistant && !message.has_tool_calls() && !message.content.trim().is_empty()
}

fn fold_into(current: &mut CanonicalMessage, next: CanonicalMessage, taken: &mut HashSet<String>) {
    let base = format!("{}+{}", current.id, next.id);
    let id = if taken.contains(&base) {
        (2..)
            .map(|n| format!("{base}~{n}"))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or(base)
    } else {
        base
    };
    taken.insert(id.clone());

    current.content = format!("{}\n\n{}", current.content, next.content).trim().to_string();
    current.merged_from = vec![std::mem::replace(&mut current.id, id), next.id];
    if current.model.is_none() {
        current.model = next.model;
    }
}
