//! Durability mode configuration
//!
//! Controls when journal writes reach the disk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When journal records are made durable
///
/// | Mode | Written | fsync | Data Loss Window |
/// |------|---------|-------|------------------|
/// | Cache | never | never | everything |
/// | Standard | every record | on flush and close | since last flush |
/// | Always | every record | every record | none |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// No journal; all data lost when the process exits
    Cache,
    /// Records handed to the OS on append, synced on flush and close
    #[default]
    Standard,
    /// Records synced before append returns
    Always,
}

impl DurabilityMode {
    /// Whether this mode writes a journal file at all
    pub fn requires_wal(&self) -> bool {
        !matches!(self, DurabilityMode::Cache)
    }

    /// Whether every append is followed by fsync
    pub fn requires_immediate_fsync(&self) -> bool {
        matches!(self, DurabilityMode::Always)
    }
}

impl fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DurabilityMode::Cache => "cache",
            DurabilityMode::Standard => "standard",
            DurabilityMode::Always => "always",
        };
        f.write_str(s)
    }
}

impl FromStr for DurabilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cache" => Ok(DurabilityMode::Cache),
            "standard" => Ok(DurabilityMode::Standard),
            "always" => Ok(DurabilityMode::Always),
            other => Err(format!("unknown durability mode: {}", other)),
        }
    }
}
