//! Rendering of values as Lua source text.
//!
//! Documents reach the script scope as literals so that per-document calls can
//! be concatenated into script units of bounded size.

use std::fmt::Write;

use mimic_value::{Document, Value};

/// Lua expression that rebuilds `value` using the prelude constructors.
pub fn value_literal(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Lua expression that rebuilds `doc`, keeping its key order.
pub fn document_literal(doc: &Document) -> String {
    let mut out = String::new();
    write_document(&mut out, doc);
    out
}

/// A quoted Lua string literal. Every byte outside printable ASCII is
/// written as a three-digit decimal escape.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_bytes(&mut out, s.as_bytes());
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::MinKey => out.push_str("MinKey"),
        Value::MaxKey => out.push_str("MaxKey"),
        Value::Null => out.push_str("null"),
        Value::Int32(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Int64(i) => write_integer(out, *i),
        Value::Double(f) => write_float(out, *f),
        Value::String(s) => write_bytes(out, s.as_bytes()),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::DateTime(ms) => {
            out.push_str("Date(");
            write_integer(out, *ms);
            out.push(')');
        }
        Value::Binary { subtype, bytes } => {
            let _ = write!(out, "BinData({subtype}, ");
            write_bytes(out, bytes);
            out.push(')');
        }
        Value::ObjectId(oid) => {
            let _ = write!(out, "ObjectId(\"{}\")", oid.to_hex());
        }
        Value::Regex(re) => {
            out.push_str("RegExp(");
            write_bytes(out, re.pattern.as_bytes());
            out.push_str(", ");
            write_bytes(out, re.options.as_bytes());
            out.push(')');
        }
        Value::Document(doc) => write_document(out, doc),
        Value::Array(items) => {
            out.push_str("Array({");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push_str("})");
        }
        Value::Reference(reference) => {
            out.push_str("DBRef(");
            write_bytes(out, reference.collection.as_bytes());
            out.push_str(", ");
            write_value(out, &reference.id);
            if let Some(db) = &reference.database {
                out.push_str(", ");
                write_bytes(out, db.as_bytes());
            }
            out.push(')');
        }
    }
}

fn write_document(out: &mut String, doc: &Document) {
    out.push_str("Document({");
    for (i, (key, value)) in doc.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('[');
        write_bytes(out, key.as_bytes());
        out.push_str("] = ");
        write_value(out, value);
    }
    out.push_str("}, {");
    for (i, key) in doc.keys().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_bytes(out, key.as_bytes());
    }
    out.push_str("})");
}

fn write_integer(out: &mut String, i: i64) {
    // `-9223372036854775808` lexes as a float in Lua.
    if i == i64::MIN {
        out.push_str("math.mininteger");
    } else {
        let _ = write!(out, "{i}");
    }
}

fn write_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("(0/0)");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "math.huge" } else { "(-math.huge)" });
    } else {
        // Debug always keeps a `.` or exponent, so Lua reads a float back.
        let _ = write!(out, "{f:?}");
    }
}

fn write_bytes(out: &mut String, bytes: &[u8]) {
    out.push('"');
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "\\{b:03}");
            }
        }
    }
    out.push('"');
}
