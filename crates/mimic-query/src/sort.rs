use std::cmp::Ordering;

use mimic_value::{Document, Path, Value, compare};

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: Path,
    pub direction: SortDirection,
}

/// Compound sort order parsed from `{field: 1 | -1, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<Sort>,
}

impl SortSpec {
    pub fn parse(spec: &Document) -> Result<Self, QueryError> {
        let mut keys = Vec::with_capacity(spec.len());
        for (field, value) in spec.iter() {
            let direction = match value.as_f64() {
                Some(d) if d > 0.0 => SortDirection::Asc,
                Some(d) if d < 0.0 => SortDirection::Desc,
                _ => {
                    return Err(QueryError::malformed(format!(
                        "sort direction for {field} must be 1 or -1, got {value}"
                    )));
                }
            };
            keys.push(Sort {
                field: Path::parse(field),
                direction,
            });
        }
        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Sort] {
        &self.keys
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for sort in &self.keys {
            let a_key = sort_key(a, sort);
            let b_key = sort_key(b, sort);
            let ord = match sort.direction {
                SortDirection::Asc => compare(a_key, b_key),
                SortDirection::Desc => compare(b_key, a_key),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable: documents with equal keys keep their order.
    pub fn sort(&self, docs: &mut [Document]) {
        if !self.is_empty() {
            docs.sort_by(|a, b| self.compare(a, b));
        }
    }
}

/// A field with several values (an array, or a path through an array)
/// sorts by its smallest value ascending and its largest descending.
/// Missing sorts as null.
fn sort_key<'a>(doc: &'a Document, sort: &Sort) -> &'a Value {
    const NULL: &Value = &Value::Null;
    let resolved = sort.field.resolve(doc);
    let values = resolved.into_iter().flat_map(|value| match value {
        Value::Array(items) if !items.is_empty() => items.iter().collect::<Vec<_>>(),
        other => vec![other],
    });
    let picked = match sort.direction {
        SortDirection::Asc => values.min_by(|a, b| compare(a, b)),
        SortDirection::Desc => values.max_by(|a, b| compare(a, b)),
    };
    picked.unwrap_or(NULL)
}
