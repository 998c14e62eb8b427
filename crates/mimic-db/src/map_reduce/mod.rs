//! Map-reduce over a collection, with user functions written in Lua.
//!
//! A job runs in one [`ScriptScope`]: map calls are batched into script
//! units that all share the scope's key registry, then reduce and the
//! optional finalize step run once per distinct key in first-emit order.
//! Results are handed to the job's [`OutputStrategy`] only after every
//! script has succeeded.

mod outcome;
mod output;
mod script;

use std::time::Instant;

use mimic_query::{SortSpec, compile_filter};
use mimic_store::Store;
use mimic_value::{Document, Value};
use mimic_vm::{ScriptError, ScriptScope};

use crate::config::DatabaseConfig;
use crate::database::select;
use crate::error::DbError;

pub use outcome::{MapReduceCounts, MapReduceOutcome, MapReduceResults};
pub use output::OutputStrategy;

use output::TempCollection;
use script::{
    BatchBuilder, EMIT_COUNT, EMIT_REGISTRY, FINALIZE_FN, FINALIZE_UNIT, KEYS, MAP_FN, REDUCE_FN,
    REDUCE_UNIT, REDUCED, map_call,
};

/// A map-reduce job description.
///
/// ```ignore
/// let job = MapReduceJob::new(
///     "function() emit(this.x, 1) end",
///     "function(key, values) return Array.sum(values) end",
/// )
/// .query(doc! { "x": { "$gt": 0 } })
/// .out("totals");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MapReduceJob {
    map: String,
    reduce: String,
    finalize: Option<String>,
    out: Value,
    query: Document,
    sort: Document,
    limit: Option<usize>,
    scope: Document,
}

impl MapReduceJob {
    /// A job with inline output over the whole collection.
    pub fn new(map: impl Into<String>, reduce: impl Into<String>) -> Self {
        let mut inline = Document::new();
        inline.insert("inline", 1);
        Self {
            map: map.into(),
            reduce: reduce.into(),
            finalize: None,
            out: Value::Document(inline),
            query: Document::new(),
            sort: Document::new(),
            limit: None,
            scope: Document::new(),
        }
    }

    pub fn finalize(mut self, finalize: impl Into<String>) -> Self {
        self.finalize = Some(finalize.into());
        self
    }

    /// Output specification: a collection name, or one of
    /// `{replace: name}`, `{merge: name}`, `{reduce: name}`, `{inline: 1}`.
    pub fn out(mut self, out: impl Into<Value>) -> Self {
        self.out = out.into();
        self
    }

    pub fn query(mut self, query: impl Into<Document>) -> Self {
        self.query = query.into();
        self
    }

    pub fn sort(mut self, sort: impl Into<Document>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Map at most `limit` documents. Zero means no limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Fields installed as script globals before map runs.
    pub fn scope(mut self, scope: impl Into<Document>) -> Self {
        self.scope = scope.into();
        self
    }

    fn validate(&self) -> Result<(), DbError> {
        if self.map.trim().is_empty() {
            return Err(DbError::InvalidJob("map function is required".into()));
        }
        if self.reduce.trim().is_empty() {
            return Err(DbError::InvalidJob("reduce function is required".into()));
        }
        if self.finalize.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(DbError::InvalidJob("finalize function must not be empty".into()));
        }
        Ok(())
    }
}

/// Run `job` over `collection`.
pub(crate) fn run<S: Store>(
    store: &S,
    config: &DatabaseConfig,
    collection: &str,
    job: &MapReduceJob,
) -> Result<MapReduceOutcome, DbError> {
    let started = Instant::now();
    job.validate()?;
    let output = OutputStrategy::parse(&job.out)?;
    let predicate = compile_filter(&job.query)?;
    let sort = SortSpec::parse(&job.sort)?;

    let selected = select(store, collection, &predicate, &sort, job.limit)?;
    tracing::debug!(collection, selected = selected.len(), "map-reduce input selected");

    let _temp = TempCollection::for_output(store, &output);
    output.init_collection(store)?;
    tracing::debug!(
        mode = output.mode(),
        destination = output.collection_name(),
        "map-reduce output initialized"
    );

    let scope = ScriptScope::new()?;
    scope.exec("emit", EMIT_REGISTRY)?;
    for (name, value) in job.scope.iter() {
        scope.set_global(name, value)?;
    }

    scope.bind(MAP_FN, "map", &job.map).map_err(script_failed)?;
    let batches = map_documents(&scope, config, job, &selected)?;
    let keys = into_array(scope.global(KEYS)?, KEYS)?;
    tracing::debug!(batches, keys = keys.len(), "map phase complete");

    scope.bind(REDUCE_FN, "reduce", &job.reduce).map_err(script_failed)?;
    scope
        .exec("reduce", REDUCE_UNIT)
        .map_err(|e| script_failed(ScriptError::new("reduce", &job.reduce, e.message)))?;
    tracing::debug!(keys = keys.len(), "reduce phase complete");

    if let Some(finalize) = &job.finalize {
        scope.bind(FINALIZE_FN, "finalize", finalize).map_err(script_failed)?;
        scope
            .exec("finalize", FINALIZE_UNIT)
            .map_err(|e| script_failed(ScriptError::new("finalize", finalize, e.message)))?;
        tracing::debug!("finalize phase complete");
    }

    let values = into_array(scope.global(REDUCED)?, REDUCED)?;
    let emitted = match scope.global(EMIT_COUNT)? {
        Value::Int32(n) => u64::try_from(n).unwrap_or(0),
        Value::Int64(n) => u64::try_from(n).unwrap_or(0),
        _ => 0,
    };
    drop(scope);

    let results: Vec<Document> = keys
        .into_iter()
        .zip(values)
        .map(|(key, value)| {
            let mut doc = Document::new();
            doc.insert("_id", key);
            doc.insert("value", value);
            doc
        })
        .collect();

    let counts = MapReduceCounts {
        input: selected.len() as u64,
        emit: emitted,
        reduce: results.len() as u64,
        output: results.len() as u64,
    };
    output.new_results(store, results)?;
    let results = output.create_result(store, &config.name)?;

    let elapsed_millis = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        collection,
        mode = output.mode(),
        input = counts.input,
        emit = counts.emit,
        reduce = counts.reduce,
        output = counts.output,
        elapsed_millis,
        "map-reduce complete"
    );

    Ok(MapReduceOutcome {
        results,
        counts,
        elapsed_millis,
    })
}

/// Apply the map function to every document, returning how many script
/// units were run.
fn map_documents(
    scope: &ScriptScope,
    config: &DatabaseConfig,
    job: &MapReduceJob,
    docs: &[Document],
) -> Result<usize, DbError> {
    let mut batches = BatchBuilder::new(config.script_batch_chars);
    let mut run = 0;
    let mut exec = |unit: String| -> Result<(), DbError> {
        run += 1;
        scope
            .exec("map", &unit)
            .map_err(|e| script_failed(ScriptError::new("map", &job.map, e.message)))
    };
    for doc in docs {
        if let Some(unit) = batches.push(&map_call(doc)) {
            exec(unit)?;
        }
    }
    if let Some(unit) = batches.finish() {
        exec(unit)?;
    }
    Ok(run)
}

fn into_array(value: Value, global: &str) -> Result<Vec<Value>, DbError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(DbError::Script(ScriptError::new(
            global,
            "",
            format!("expected an array, got {other}"),
        ))),
    }
}

fn script_failed(e: ScriptError) -> DbError {
    tracing::error!(unit = %e.name, source = %e.script, message = %e.message, "map-reduce script failed");
    DbError::Script(e)
}
