//! Total order over [`Value`].
//!
//! Values of different type classes order by class rank alone; values in the
//! same class order by content. Missing values order as `Null`.

use std::cmp::Ordering;

use crate::value::{Document, Reference, Value};

/// Type classes in ascending sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeClass {
    MinKey,
    Null,
    Numeric,
    String,
    Document,
    Reference,
    Array,
    Binary,
    ObjectId,
    Boolean,
    DateTime,
    Regex,
    MaxKey,
}

impl Value {
    pub fn type_class(&self) -> TypeClass {
        match self {
            Value::MinKey => TypeClass::MinKey,
            Value::Null => TypeClass::Null,
            Value::Int32(_) | Value::Int64(_) | Value::Double(_) => TypeClass::Numeric,
            Value::String(_) => TypeClass::String,
            Value::Document(_) => TypeClass::Document,
            Value::Reference(_) => TypeClass::Reference,
            Value::Array(_) => TypeClass::Array,
            Value::Binary { .. } => TypeClass::Binary,
            Value::ObjectId(_) => TypeClass::ObjectId,
            Value::Boolean(_) => TypeClass::Boolean,
            Value::DateTime(_) => TypeClass::DateTime,
            Value::Regex(_) => TypeClass::Regex,
            Value::MaxKey => TypeClass::MaxKey,
        }
    }

    pub fn compare(&self, other: &Value) -> Ordering {
        compare(self, other)
    }
}

/// Compare two values.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let (class_a, class_b) = (a.type_class(), b.type_class());
    if class_a != class_b {
        return class_a.cmp(&class_b);
    }

    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (Value::ObjectId(a), Value::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
        (
            Value::Binary { subtype: sa, bytes: ba },
            Value::Binary { subtype: sb, bytes: bb },
        ) => ba.cmp(bb).then(sa.cmp(sb)),
        (Value::Regex(a), Value::Regex(b)) => a
            .pattern
            .cmp(&b.pattern)
            .then_with(|| a.options.cmp(&b.options)),
        (Value::Array(a), Value::Array(b)) => compare_arrays(a, b),
        (Value::Reference(a), Value::Reference(b)) => compare_references(a, b),
        (Value::Document(a), Value::Document(b)) => compare_documents(a, b),
        _ => match (Number::of(a), Number::of(b)) {
            (Some(a), Some(b)) => compare_numbers(a, b),
            // MinKey, Null, MaxKey: one value per class.
            _ => Ordering::Equal,
        },
    }
}

/// Compare where `None` stands for a missing value, which orders as `Null`.
pub fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    const NULL: &Value = &Value::Null;
    compare(a.unwrap_or(NULL), b.unwrap_or(NULL))
}

/// Equality as queries and `_id` lookups see it: [`compare`] equality, plus
/// an ObjectId equals its hex string. The ordering itself keeps the two in
/// separate type classes.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::ObjectId(oid), Value::String(s)) | (Value::String(s), Value::ObjectId(oid)) => {
            oid.to_hex() == *s
        }
        _ => compare(a, b) == Ordering::Equal,
    }
}

// ── Composite values ────────────────────────────────────────────

/// Pairwise by key then value, in insertion order. A document that runs out
/// of entries first sorts first.
pub fn compare_documents(a: &Document, b: &Document) -> Ordering {
    let mut left = a.iter();
    let mut right = b.iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((ka, va)), Some((kb, vb))) => {
                let ord = ka.cmp(kb).then_with(|| compare(va, vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Database, then collection, then id. A reference without a database
/// sorts before one with.
fn compare_references(a: &Reference, b: &Reference) -> Ordering {
    a.database
        .cmp(&b.database)
        .then_with(|| a.collection.cmp(&b.collection))
        .then_with(|| compare(&a.id, &b.id))
}

/// Positional. A missing slot compares as `Null`, so `[] > [MinKey]`;
/// on a full tie the shorter array sorts first.
fn compare_arrays(a: &[Value], b: &[Value]) -> Ordering {
    for i in 0..a.len().max(b.len()) {
        let ord = compare_optional(a.get(i), b.get(i));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

// ── Numbers ─────────────────────────────────────────────────────

/// Largest magnitude below which every i64 converts to f64 exactly.
pub(crate) const EXACT_INTEGER_LIMIT: u64 = 1 << 53;

/// Above this magnitude no f64 can tie with an i64.
pub(crate) const BEYOND_I64: f64 = 1e19;

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Int32(i) => Some(Number::Int(i64::from(*i))),
            Value::Int64(i) => Some(Number::Int(*i)),
            Value::Double(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

fn compare_numbers(a: Number, b: Number) -> Ordering {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => a.cmp(&b),
        (Number::Float(a), Number::Float(b)) => compare_floats(a, b),
        (Number::Int(i), Number::Float(f)) => compare_int_float(i, f),
        (Number::Float(f), Number::Int(i)) => compare_int_float(i, f).reverse(),
    }
}

/// NaN equals NaN and sorts below every other number.
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn compare_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    // Either the conversion is exact or the magnitudes cannot overlap.
    if i.unsigned_abs() <= EXACT_INTEGER_LIMIT
        || f.abs() < EXACT_INTEGER_LIMIT as f64
        || f.abs() >= BEYOND_I64
    {
        return (i as f64).partial_cmp(&f).unwrap_or(Ordering::Equal);
    }
    match shortest_decimal(f) {
        Some(decimal) => i128::from(i).cmp(&decimal),
        None => (i as f64).partial_cmp(&f).unwrap_or(Ordering::Equal),
    }
}

/// The integer spelled by the shortest round-trip decimal form of `f`.
///
/// Only called for integral magnitudes in `[2^53, 1e19)`, where that form is
/// `d.ddd…e<exp>` with no more fraction digits than the exponent.
pub(crate) fn shortest_decimal(f: f64) -> Option<i128> {
    let repr = format!("{f:e}");
    let (mantissa, exponent) = repr.split_once('e')?;
    let exponent: u32 = exponent.parse().ok()?;
    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let fraction_len = u32::try_from(digits.len().checked_sub(1)?).ok()?;
    let shift = exponent.checked_sub(fraction_len)?;
    let magnitude = digits.parse::<i128>().ok()?.checked_mul(10_i128.checked_pow(shift)?)?;
    Some(if negative { -magnitude } else { magnitude })
}
