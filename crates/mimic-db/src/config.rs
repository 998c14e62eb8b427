use serde::{Deserialize, Serialize};

/// Database-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database name reported in map-reduce results.
    pub name: String,
    /// Upper bound, in characters, on one script unit of map calls. Larger
    /// inputs are split across several units that share one scope.
    pub script_batch_chars: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "test".into(),
            script_batch_chars: 65_536,
        }
    }
}
