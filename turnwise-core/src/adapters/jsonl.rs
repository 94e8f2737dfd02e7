// JSONL source: one raw entry per line

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use color_eyre::{eyre::Context, Result};
use serde_json::Value;

use super::{decode_entries, EntrySource};
use crate::types::RawEntry;

pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: PathBuf) -> Self {
        JsonlSource { path }
    }
}

impl EntrySource for JsonlSource {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn read_entries(&self) -> Result<Vec<RawEntry>> {
        let file = File::open(&self.path).with_context(|| format!("Failed to open {}", self.path.display()))?;
        let reader = BufReader::new(file);

        parse_lines(
            reader
                .lines()
                .map(|line| line.map_err(|e| color_eyre::eyre::eyre!("Failed to read line: {}", e))),
        )
    }
}

/// Decode a stream of lines. Blank lines are ignored and lines that are not
/// JSON are skipped with a warning; read errors abort.
pub fn parse_lines(lines: impl Iterator<Item = Result<String>>) -> Result<Vec<RawEntry>> {
    let mut values = Vec::new();

    for (line_number, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(&line) {
            Ok(value) => values.push(value),
            Err(error) => tracing::warn!(line = line_number + 1, %error, "skipping line that is not JSON"),
        }
    }

    Ok(decode_entries(values))
}
