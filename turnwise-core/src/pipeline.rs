// Pipeline driver: normalize -> reconcile -> merge -> order
// Every run allocates its own state; nothing is shared between calls

use chrono::{DateTime, Utc};

use crate::merge::TurnMerger;
use crate::normalize::Normalizer;
use crate::options::{Preset, ProcessOptions};
use crate::order::{is_chronological, order_by_timestamp};
use crate::reconcile::{Reconciler, ToolResults};
use crate::stats::PipelineStats;
use crate::telemetry::{PipelineEvent, Stage, TelemetrySink, TracingSink};
use crate::timestamp::{now_millis, truncate_millis};
use crate::types::{CanonicalMessage, RawEntry};

static TRACING_SINK: TracingSink = TracingSink;

/// Configured pipeline run.
///
/// Events go to `tracing` unless another sink is supplied with [`Pipeline::with_sink`].
pub struct Pipeline<'s> {
    options: ProcessOptions,
    sink: &'s dyn TelemetrySink,
    clock: Option<DateTime<Utc>>,
}

impl Pipeline<'static> {
    pub fn new(options: ProcessOptions) -> Self {
        Pipeline {
            options,
            sink: &TRACING_SINK,
            clock: None,
        }
    }

    pub fn preset(preset: Preset) -> Self {
        Self::new(preset.options())
    }
}

impl<'s> Pipeline<'s> {
    pub fn with_sink<'t>(self, sink: &'t dyn TelemetrySink) -> Pipeline<'t> {
        Pipeline {
            options: self.options,
            sink,
            clock: self.clock,
        }
    }

    /// Pin "now", used for timestamp fallbacks and estimated tool timing.
    /// Truncated to milliseconds like the wall clock.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(truncate_millis(now));
        self
    }

    pub fn options(&self) -> ProcessOptions {
        self.options
    }

    /// Process one batch. Never fails; malformed input degrades fidelity only.
    pub fn run(&self, entries: &[RawEntry]) -> Vec<CanonicalMessage> {
        let now = self.clock.unwrap_or_else(now_millis);
        let sink = self.sink;

        let normalized = Normalizer::new(self.options.filter_tool_messages, now).normalize(entries, sink);
        let mut messages = normalized.messages;
        self.stage_completed(Stage::Normalize, messages.len());

        if self.options.enhance_tool_calls {
            let results = ToolResults::collect(&normalized.tool_entries, sink);
            Reconciler::new(now).reconcile(&mut messages, &results, sink);
            self.stage_completed(Stage::Reconcile, messages.len());
        }

        if self.options.merge_assistant_messages {
            messages = TurnMerger::new().merge(messages, sink);
            self.stage_completed(Stage::Merge, messages.len());
        }

        if self.options.preserve_order {
            order_by_timestamp(&mut messages);
            debug_assert!(is_chronological(&messages));
            self.stage_completed(Stage::Order, messages.len());
        }

        messages
    }

    /// Process one batch and compute its stats
    pub fn run_with_stats(&self, entries: &[RawEntry]) -> (Vec<CanonicalMessage>, PipelineStats) {
        let messages = self.run(entries);
        let stats = PipelineStats::from_messages(&messages);
        (messages, stats)
    }

    fn stage_completed(&self, stage: Stage, messages: usize) {
        self.sink.record(PipelineEvent::StageCompleted { stage, messages });
    }
}

/// Run the pipeline with explicit options
pub fn process(entries: &[RawEntry], options: &ProcessOptions) -> Vec<CanonicalMessage> {
    Pipeline::new(*options).run(entries)
}

/// Filter tool entries and order; no reconciliation or merging
pub fn quick_process(entries: &[RawEntry]) -> Vec<CanonicalMessage> {
    Pipeline::preset(Preset::Quick).run(entries)
}

/// Every stage enabled
pub fn deep_process(entries: &[RawEntry]) -> Vec<CanonicalMessage> {
    Pipeline::preset(Preset::Deep).run(entries)
}

/// Same output as [`quick_process`]
pub fn inline_process(entries: &[RawEntry]) -> Vec<CanonicalMessage> {
    Pipeline::preset(Preset::Inline).run(entries)
}
