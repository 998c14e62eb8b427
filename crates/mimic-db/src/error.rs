use mimic_query::QueryError;
use mimic_store::StoreError;
use mimic_value::{Document, Value};
use mimic_vm::ScriptError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Query(QueryError),
    #[error("script execution failed: {0}")]
    Script(ScriptError),
    #[error("output mode error: {0}")]
    OutputMode(String),
    #[error("invalid map-reduce job: {0}")]
    InvalidJob(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DbError {
    /// Numeric code reported alongside the message.
    pub fn code(&self) -> i32 {
        match self {
            DbError::Script(_) => 16722,
            DbError::Query(_) => 2,
            DbError::InvalidJob(_) => 9,
            DbError::OutputMode(_) => 13522,
            DbError::Store(_) => 1,
        }
    }

    /// The `{ok: 0, errmsg, code}` error-result document.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("ok", 0.0);
        doc.insert("errmsg", self.to_string());
        doc.insert("code", Value::Int32(self.code()));
        doc
    }
}

impl From<QueryError> for DbError {
    fn from(e: QueryError) -> Self {
        match e {
            // A failing `$where` is a script failure like any other.
            QueryError::Script(e) => DbError::Script(e),
            other => DbError::Query(other),
        }
    }
}

impl From<ScriptError> for DbError {
    fn from(e: ScriptError) -> Self {
        DbError::Script(e)
    }
}
