// Entry sources: where raw transcript batches come from
// The pipeline never does I/O itself; these collaborators hand it a decoded batch

use color_eyre::{eyre::Context, Result};
use serde_json::Value;

use crate::types::RawEntry;

pub mod document;
pub mod jsonl;

pub use document::DocumentSource;
pub use jsonl::JsonlSource;

/// Trait for reading a batch of raw entries from some external producer
pub trait EntrySource {
    /// Name of the source (e.g., "document", "jsonl")
    fn name(&self) -> &'static str;

    /// Read the whole batch.
    ///
    /// Individual elements that cannot be decoded are skipped with a warning;
    /// only source-level failures are errors.
    fn read_entries(&self) -> Result<Vec<RawEntry>>;
}

/// Decode JSON values into entries, skipping ones that do not fit
pub fn decode_entries(values: impl IntoIterator<Item = Value>) -> Vec<RawEntry> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| decode_entry(index, value))
        .collect()
}

fn decode_entry(index: usize, value: Value) -> Option<RawEntry> {
    if !value.is_object() {
        tracing::warn!(index, "skipping entry that is not a JSON object");
        return None;
    }

    match serde_json::from_value(value) {
        Ok(entry) => Some(entry),
        Err(error) => {
            tracing::warn!(index, %error, "skipping undecodable entry");
            None
        }
    }
}

/// Parse a whole document holding a batch.
///
/// Accepts a JSON array of entries, an object with a `messages` array, a
/// single entry object, or JSONL (one entry per line).
pub fn parse_document(text: &str) -> Result<Vec<RawEntry>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(trimmed).context("Failed to parse JSON array of entries")?;
        return Ok(decode_entries(values));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(mut object)) => match object.remove("messages") {
            Some(Value::Array(values)) => Ok(decode_entries(values)),
            Some(other) => {
                object.insert("messages".to_string(), other);
                Ok(decode_entries([Value::Object(object)]))
            }
            None => Ok(decode_entries([Value::Object(object)])),
        },
        Ok(_) => Err(color_eyre::eyre::eyre!("Expected a JSON array, object, or JSONL document")),
        // More than one top-level value: treat as JSONL
        Err(_) => jsonl::parse_lines(trimmed.lines().map(|line| Ok(line.to_string()))),
    }
}
