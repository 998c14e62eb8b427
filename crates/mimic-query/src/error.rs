use mimic_vm::ScriptError;

/// Failure to compile or evaluate a query document.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// Unknown operator or an operand of the wrong shape. Raised at compile
    /// time, before any document is scanned.
    #[error("malformed query: {0}")]
    Malformed(String),
    /// A `$where` script failed to parse or raised.
    #[error("$where failed: {0}")]
    Script(#[from] ScriptError),
}

impl QueryError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        QueryError::Malformed(message.into())
    }
}
