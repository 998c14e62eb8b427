use mimic_value::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("duplicate key in {collection}: _id {id}")]
    DuplicateKey { collection: String, id: Value },
    #[error("storage error: {0}")]
    Storage(String),
}
