//! Hashable identity for values, used to index documents by `_id`.

use crate::compare::{BEYOND_I64, EXACT_INTEGER_LIMIT, shortest_decimal};
use crate::value::{Document, Value};

/// Canonical form of a value: two values have the same key exactly when
/// [`values_equal`](crate::values_equal) holds for them.
///
/// Numbers that compare equal share a key whatever their width, and a
/// top-level ObjectId keys as its hex string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueKey(Part);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Part {
    MinKey,
    Null,
    Integer(i128),
    Float(u64),
    String(String),
    ObjectId([u8; 12]),
    Boolean(bool),
    DateTime(i64),
    Binary(u8, Vec<u8>),
    Regex(String, String),
    Document(Vec<(String, Part)>),
    Reference(Option<String>, String, Box<Part>),
    Array(Vec<Part>),
    MaxKey,
}

impl ValueKey {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::ObjectId(oid) => ValueKey(Part::String(oid.to_hex())),
            other => ValueKey(part(other)),
        }
    }
}

fn part(value: &Value) -> Part {
    match value {
        Value::MinKey => Part::MinKey,
        Value::Null => Part::Null,
        Value::Int32(i) => Part::Integer(i128::from(*i)),
        Value::Int64(i) => Part::Integer(i128::from(*i)),
        Value::Double(f) => float_part(*f),
        Value::String(s) => Part::String(s.clone()),
        Value::Boolean(b) => Part::Boolean(*b),
        Value::DateTime(ms) => Part::DateTime(*ms),
        Value::Binary { subtype, bytes } => Part::Binary(*subtype, bytes.clone()),
        Value::ObjectId(oid) => Part::ObjectId(oid.bytes()),
        Value::Regex(re) => Part::Regex(re.pattern.clone(), re.options.clone()),
        Value::Document(doc) => document_part(doc),
        Value::Array(items) => Part::Array(items.iter().map(part).collect()),
        Value::Reference(reference) => Part::Reference(
            reference.database.clone(),
            reference.collection.clone(),
            Box::new(part(&reference.id)),
        ),
        Value::MaxKey => Part::MaxKey,
    }
}

fn document_part(doc: &Document) -> Part {
    Part::Document(doc.iter().map(|(k, v)| (k.to_string(), part(v))).collect())
}

/// Integral doubles key as the integer they compare equal to.
fn float_part(f: f64) -> Part {
    if f.is_nan() {
        return Part::Float(f64::NAN.to_bits());
    }
    if f.fract() == 0.0 && f.abs() < BEYOND_I64 {
        if f.abs() < EXACT_INTEGER_LIMIT as f64 {
            return Part::Integer(f as i128);
        }
        if let Some(decimal) = shortest_decimal(f) {
            return Part::Integer(decimal);
        }
    }
    Part::Float(f.to_bits())
}
