// Turnwise Core Library
// Normalizes raw transcript entries into display-ready conversation turns

pub mod types;
pub mod timestamp;
pub mod tool_call;
pub mod telemetry;
pub mod normalize;
pub mod reconcile;
pub mod merge;
pub mod order;
pub mod stats;
pub mod options;
pub mod pipeline;
pub mod adapters;

// Re-export commonly used types
pub use types::*;
pub use adapters::EntrySource;
pub use options::{Preset, ProcessOptions};
pub use pipeline::{deep_process, inline_process, process, quick_process, Pipeline};
pub use stats::{PipelineStats, StatusTally};
pub use telemetry::{NoopSink, PipelineEvent, Stage, TelemetrySink, TracingSink};
