use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowEngineConfig {
    /// Sort the input by (partition keys, order keys) before evaluation. Disable
    /// when the upstream operator already delivers partitioned, ordered rows.
    pub sort_input: bool,
    /// Let the row source drop rows below the lowest mark of all window contexts.
    pub release_marked_rows: bool,
    /// Upper bound on rows per partition, `None` means unbounded.
    pub max_partition_rows: Option<usize>,
}

impl Default for WindowEngineConfig {
    fn default() -> Self {
        Self {
            sort_input: true,
            release_marked_rows: true,
            max_partition_rows: None,
        }
    }
}

impl WindowEngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse window engine config")
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read window engine config {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("failed to serialize window engine config")
    }
}
