// Pipeline configuration and named presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which stages run. Each flag toggles independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessOptions {
    /// Hide tool-role entries from the output (they still feed reconciliation)
    pub filter_tool_messages: bool,
    /// Fold content-only assistant fragments into the preceding tool-call turn
    pub merge_assistant_messages: bool,
    /// Attach tool results to the calls they answer
    pub enhance_tool_calls: bool,
    /// Sort the output chronologically (stable)
    pub preserve_order: bool,
}

impl ProcessOptions {
    pub const QUICK: ProcessOptions = ProcessOptions {
        filter_tool_messages: true,
        merge_assistant_messages: false,
        enhance_tool_calls: false,
        preserve_order: true,
    };

    pub const DEEP: ProcessOptions = ProcessOptions {
        filter_tool_messages: true,
        merge_assistant_messages: true,
        enhance_tool_calls: true,
        preserve_order: true,
    };
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self::QUICK
    }
}

/// Named option sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Filter tool entries and order; no reconciliation, no merging
    Quick,
    /// Every stage enabled
    Deep,
    /// Same stages as `Quick`, named for inline call sites
    Inline,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Quick, Preset::Deep, Preset::Inline];

    pub fn options(self) -> ProcessOptions {
        match self {
            Preset::Quick | Preset::Inline => ProcessOptions::QUICK,
            Preset::Deep => ProcessOptions::DEEP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Quick => "quick",
            Preset::Deep => "deep",
            Preset::Inline => "inline",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| format!("unknown preset '{}', expected one of: quick, deep, inline", s.trim()))
    }
}
