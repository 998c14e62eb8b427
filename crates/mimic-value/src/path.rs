use std::fmt;

use crate::value::{Document, Value};

/// A dot-separated field path such as `a.0.b` or `owner.$id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    raw: String,
    segments: Vec<String>,
}

impl Path {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('.').map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every value reachable at this path, in document order.
    ///
    /// - `"status"`       → the field itself (an array stays one value)
    /// - `"items.sku"`    → `sku` of each document element of `items`
    /// - `"items.0.sku"`  → `sku` of the first element only
    /// - `"owner.$id"`    → the id held by a reference
    ///
    /// Never fails: an unresolvable segment contributes nothing.
    pub fn resolve<'a>(&self, doc: &'a Document) -> Vec<&'a Value> {
        let mut out = Vec::new();
        resolve_in_document(doc, &self.segments, &mut out);
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

/// Shorthand for `Path::parse(path).resolve(doc)`.
pub fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    Path::parse(path).resolve(doc)
}

fn resolve_in_document<'a>(doc: &'a Document, segments: &[String], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    if let Some(value) = doc.get(head) {
        resolve_value(value, rest, out);
    }
}

fn resolve_value<'a>(value: &'a Value, segments: &[String], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Value::Document(doc) => resolve_in_document(doc, segments, out),
        Value::Reference(reference) => {
            if head == "$id" {
                resolve_value(&reference.id, rest, out);
            }
        }
        Value::Array(items) => match array_index(head) {
            Some(idx) => {
                if let Some(item) = items.get(idx) {
                    resolve_value(item, rest, out);
                }
            }
            None => {
                for item in items {
                    if matches!(item, Value::Document(_) | Value::Reference(_)) {
                        resolve_value(item, segments, out);
                    }
                }
            }
        },
        _ => {}
    }
}

fn array_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
