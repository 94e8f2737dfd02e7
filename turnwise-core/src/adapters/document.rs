// Document source: a whole file (or stdin) holding a batch in any supported layout

use std::io::Read;
use std::path::PathBuf;

use color_eyre::{eyre::Context, Result};

use super::{parse_document, EntrySource};
use crate::types::RawEntry;

pub enum DocumentSource {
    File(PathBuf),
    Stdin,
}

impl DocumentSource {
    /// `-` means stdin
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            DocumentSource::Stdin
        } else {
            DocumentSource::File(PathBuf::from(arg))
        }
    }
}

impl EntrySource for DocumentSource {
    fn name(&self) -> &'static str {
        "document"
    }

    fn read_entries(&self) -> Result<Vec<RawEntry>> {
        let text = match self {
            DocumentSource::File(path) => {
                std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
            }
            DocumentSource::Stdin => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read stdin")?;
                buffer
            }
        };

        parse_document(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_arg() {
        assert!(matches!(DocumentSource::from_arg("-"), DocumentSource::Stdin));
        assert!(matches!(DocumentSource::from_arg("log.json"), DocumentSource::File(_)));
    }

    #[test]
    fn test_read_json_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("batch.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "u1", "role": "user", "content": "hi", "timestamp": 1000},
                {"id": "r1", "role": "tool", "content": "{}", "tool_call_id": "t1"}
            ]"#,
        )?;

        let entries = DocumentSource::File(path).read_entries()?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].tool_call_id.as_deref(), Some("t1"));
        Ok(())
    }
}
