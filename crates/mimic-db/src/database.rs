use mimic_query::{Predicate, SortSpec, compile_filter};
use mimic_store::{Store, StoreError};
use mimic_value::{Document, Value};

use crate::config::DatabaseConfig;
use crate::error::DbError;
use crate::map_reduce::{self, MapReduceJob, MapReduceOutcome};

/// Filter, sort and limit for [`Database::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Document,
    pub sort: Document,
    /// `None` or zero returns every match.
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new(filter: impl Into<Document>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    pub fn sort(mut self, sort: impl Into<Document>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A named database over a [`Store`].
pub struct Database<S: Store> {
    store: S,
    config: DatabaseConfig,
}

impl<S: Store> Database<S> {
    pub fn open(store: S, config: DatabaseConfig) -> Self {
        tracing::debug!(name = %config.name, "database opened");
        Self { store, config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create_collection(&self, name: &str) -> Result<(), DbError> {
        Ok(self.store.create_collection(name)?)
    }

    /// Drop a collection, returning whether it existed.
    pub fn drop_collection(&self, name: &str) -> Result<bool, DbError> {
        Ok(self.store.drop_collection(name)?)
    }

    /// Insert documents, creating the collection if needed. Returns the
    /// `_id` of each document in order.
    pub fn insert_many<I>(&self, collection: &str, docs: I) -> Result<Vec<Value>, DbError>
    where
        I: IntoIterator,
        I::Item: Into<Document>,
    {
        self.store.create_collection(collection)?;
        let docs: Vec<Document> = docs.into_iter().map(Into::into).collect();
        Ok(self.store.insert_many(collection, docs)?)
    }

    /// Documents matching `options.filter`, sorted and limited. A missing
    /// collection has no documents.
    pub fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Document>, DbError> {
        let predicate = compile_filter(&options.filter)?;
        let sort = SortSpec::parse(&options.sort)?;
        let limit = options.limit.filter(|n| *n > 0);
        select(&self.store, collection, &predicate, &sort, limit)
    }

    pub fn map_reduce(&self, collection: &str, job: &MapReduceJob) -> Result<MapReduceOutcome, DbError> {
        map_reduce::run(&self.store, &self.config, collection, job).inspect_err(|e| {
            tracing::warn!(collection, code = e.code(), error = %e, "map-reduce failed");
        })
    }
}

/// Matching documents of `collection`, ordered by `sort` (stable, so ties
/// keep insertion order) and cut to `limit`.
pub(crate) fn select<S: Store>(
    store: &S,
    collection: &str,
    predicate: &Predicate,
    sort: &SortSpec,
    limit: Option<usize>,
) -> Result<Vec<Document>, DbError> {
    let docs = match store.scan(collection) {
        Ok(docs) => docs,
        Err(StoreError::CollectionNotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let mut matched = predicate.filter(docs)?;
    sort.sort(&mut matched);
    if let Some(limit) = limit {
        matched.truncate(limit);
    }
    Ok(matched)
}
