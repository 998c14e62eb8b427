use std::fmt;

/// A script failed to compile or raised at run time.
///
/// Carries the unit name and the source that failed so callers can report
/// which user function broke.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{name}: {message}")]
pub struct ScriptError {
    pub name: String,
    pub script: String,
    pub message: String,
}

impl ScriptError {
    pub fn new(name: impl Into<String>, script: impl Into<String>, err: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
            message: err.to_string(),
        }
    }
}
