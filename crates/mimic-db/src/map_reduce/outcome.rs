use mimic_value::{Document, Value};

/// Where a finished job's results can be found.
#[derive(Debug, Clone, PartialEq)]
pub enum MapReduceResults {
    /// `{_id, value}` documents ordered by `_id`.
    Inline(Vec<Document>),
    Collection { collection: String, db: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapReduceCounts {
    /// Documents selected by the query.
    pub input: u64,
    /// `emit` calls made by the map function.
    pub emit: u64,
    /// Distinct keys reduced.
    pub reduce: u64,
    /// Result documents written.
    pub output: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapReduceOutcome {
    pub results: MapReduceResults,
    pub counts: MapReduceCounts,
    pub elapsed_millis: u64,
}

impl MapReduceOutcome {
    /// Inline result documents, if the job ran inline.
    pub fn inline(&self) -> Option<&[Document]> {
        match &self.results {
            MapReduceResults::Inline(docs) => Some(docs),
            MapReduceResults::Collection { .. } => None,
        }
    }

    /// The success document: `results` or `result`, then `counts`,
    /// `timeMillis` and `ok`.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        match &self.results {
            MapReduceResults::Inline(docs) => {
                let docs = docs.iter().cloned().map(Value::Document).collect::<Vec<_>>();
                doc.insert("results", docs);
            }
            MapReduceResults::Collection { collection, db } => {
                let mut result = Document::new();
                result.insert("collection", collection.as_str());
                result.insert("db", db.as_str());
                doc.insert("result", result);
            }
        }

        let mut counts = Document::new();
        counts.insert("input", count(self.counts.input));
        counts.insert("emit", count(self.counts.emit));
        counts.insert("reduce", count(self.counts.reduce));
        counts.insert("output", count(self.counts.output));
        doc.insert("counts", counts);
        doc.insert("timeMillis", count(self.elapsed_millis));
        doc.insert("ok", 1.0);
        doc
    }
}

fn count(n: u64) -> Value {
    Value::Int64(i64::try_from(n).unwrap_or(i64::MAX))
}
