use mimic_value::{Document, Value};

use crate::error::StoreError;

/// Outcome of an upsert by `_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Named collections of documents keyed by `_id`.
///
/// Every method takes `&self`; implementations serialize writers
/// internally so one store can be shared across threads.
pub trait Store {
    /// Create a collection. Creating one that exists is a no-op.
    fn create_collection(&self, name: &str) -> Result<(), StoreError>;
    /// Drop a collection, returning whether it existed.
    fn drop_collection(&self, name: &str) -> Result<bool, StoreError>;
    fn has_collection(&self, name: &str) -> Result<bool, StoreError>;
    fn collection_names(&self) -> Result<Vec<String>, StoreError>;

    /// Every document in insertion order.
    fn scan(&self, name: &str) -> Result<Vec<Document>, StoreError>;
    fn contains_id(&self, name: &str, id: &Value) -> Result<bool, StoreError>;

    /// Insert one document, assigning a fresh ObjectId `_id` when it has
    /// none. Returns the `_id`.
    fn insert(&self, name: &str, doc: Document) -> Result<Value, StoreError> {
        let mut ids = self.insert_many(name, vec![doc])?;
        ids.pop()
            .ok_or_else(|| StoreError::Storage("insert returned no id".into()))
    }
    /// Insert all documents or none: a duplicate `_id`, against stored
    /// documents or within the batch, rejects the whole batch.
    fn insert_many(&self, name: &str, docs: Vec<Document>) -> Result<Vec<Value>, StoreError>;
    /// Replace the document with the same `_id`, or insert it.
    fn upsert(&self, name: &str, doc: Document) -> Result<Upsert, StoreError>;
    /// Remove every document, returning how many were removed.
    fn remove_all(&self, name: &str) -> Result<usize, StoreError>;
}
