use mimic_query::SortSpec;
use mimic_store::Store;
use mimic_value::{Document, ObjectId, Value};

use crate::error::DbError;

use super::outcome::MapReduceResults;

/// Where and how map-reduce results are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputStrategy {
    /// Clear the destination, then insert every result.
    Replace { collection: String },
    /// Upsert each result by `_id`.
    Merge { collection: String },
    /// Insert results into the destination. Combining a result with an
    /// existing document of the same `_id` is not supported and fails.
    Reduce { collection: String },
    /// Write to a throwaway collection and return its contents.
    Inline { collection: String },
}

impl OutputStrategy {
    /// Parse an output specification: a collection name (replace), or a
    /// document with exactly one of `replace`, `merge`, `reduce` or `inline`.
    pub fn parse(spec: &Value) -> Result<Self, DbError> {
        let doc = match spec {
            Value::String(name) => return Ok(OutputStrategy::Replace { collection: collection_name(name)? }),
            Value::Document(doc) => doc,
            other => {
                return Err(DbError::OutputMode(format!(
                    "output must be a collection name or a document, got {other}"
                )));
            }
        };
        let (mode, target) = match doc.first() {
            Some(first) if doc.len() == 1 => first,
            _ => {
                return Err(DbError::OutputMode(format!(
                    "output document needs exactly one of replace, merge, reduce or inline, got {doc}"
                )));
            }
        };
        match mode {
            "replace" => Ok(OutputStrategy::Replace { collection: target_name(mode, target)? }),
            "merge" => Ok(OutputStrategy::Merge { collection: target_name(mode, target)? }),
            "reduce" => Ok(OutputStrategy::Reduce { collection: target_name(mode, target)? }),
            "inline" if target.is_truthy() => Ok(OutputStrategy::Inline {
                collection: format!("tmp.mr.{}", ObjectId::new().to_hex()),
            }),
            "inline" => Err(DbError::OutputMode("inline output must be enabled with a truthy value".into())),
            other => Err(DbError::OutputMode(format!("unknown output mode: {other}"))),
        }
    }

    pub fn collection_name(&self) -> &str {
        match self {
            OutputStrategy::Replace { collection }
            | OutputStrategy::Merge { collection }
            | OutputStrategy::Reduce { collection }
            | OutputStrategy::Inline { collection } => collection,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            OutputStrategy::Replace { .. } => "replace",
            OutputStrategy::Merge { .. } => "merge",
            OutputStrategy::Reduce { .. } => "reduce",
            OutputStrategy::Inline { .. } => "inline",
        }
    }

    /// Make sure the destination exists; replace and inline also empty it.
    pub fn init_collection<S: Store>(&self, store: &S) -> Result<(), DbError> {
        let name = self.collection_name();
        store.create_collection(name)?;
        if matches!(self, OutputStrategy::Replace { .. } | OutputStrategy::Inline { .. }) {
            store.remove_all(name)?;
        }
        Ok(())
    }

    /// Write one result document.
    pub fn new_result<S: Store>(&self, store: &S, result: Document) -> Result<(), DbError> {
        self.new_results(store, vec![result])
    }

    /// Write a batch of result documents.
    ///
    /// In reduce mode every `_id` is checked first, so a collision leaves
    /// the destination untouched.
    pub fn new_results<S: Store>(&self, store: &S, results: Vec<Document>) -> Result<(), DbError> {
        let name = self.collection_name();
        match self {
            OutputStrategy::Replace { .. } | OutputStrategy::Inline { .. } => {
                store.insert_many(name, results)?;
            }
            OutputStrategy::Merge { .. } => {
                for result in results {
                    store.upsert(name, result)?;
                }
            }
            OutputStrategy::Reduce { .. } => {
                for result in &results {
                    if let Some(id) = result.get("_id") {
                        if store.contains_id(name, id)? {
                            return Err(DbError::OutputMode(format!(
                                "reduce output cannot combine with existing document {id} in {name}"
                            )));
                        }
                    }
                }
                store.insert_many(name, results)?;
            }
        }
        Ok(())
    }

    /// Build the result reference: inline results are read back ordered by
    /// `_id`, other modes name the destination.
    pub fn create_result<S: Store>(&self, store: &S, db: &str) -> Result<MapReduceResults, DbError> {
        match self {
            OutputStrategy::Inline { collection } => {
                let mut docs = store.scan(collection)?;
                let mut by_id = Document::new();
                by_id.insert("_id", 1);
                SortSpec::parse(&by_id)?.sort(&mut docs);
                Ok(MapReduceResults::Inline(docs))
            }
            other => Ok(MapReduceResults::Collection {
                collection: other.collection_name().to_string(),
                db: db.to_string(),
            }),
        }
    }
}

fn target_name(mode: &str, target: &Value) -> Result<String, DbError> {
    match target {
        Value::String(name) => collection_name(name),
        other => Err(DbError::OutputMode(format!("{mode} target must be a collection name, got {other}"))),
    }
}

fn collection_name(name: &str) -> Result<String, DbError> {
    if name.is_empty() {
        return Err(DbError::OutputMode("output collection name must not be empty".into()));
    }
    Ok(name.to_string())
}

/// Drops an inline job's temporary collection when the job ends, whether it
/// succeeded or not.
pub(crate) struct TempCollection<'a, S: Store> {
    store: &'a S,
    name: Option<String>,
}

impl<'a, S: Store> TempCollection<'a, S> {
    pub(crate) fn for_output(store: &'a S, output: &OutputStrategy) -> Self {
        let name = match output {
            OutputStrategy::Inline { collection } => Some(collection.clone()),
            _ => None,
        };
        Self { store, name }
    }
}

impl<S: Store> Drop for TempCollection<'_, S> {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            if let Err(e) = self.store.drop_collection(&name) {
                tracing::warn!(collection = %name, error = %e, "failed to drop inline output collection");
            }
        }
    }
}
