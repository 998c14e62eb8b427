//! Conversion of Lua results back into [`Value`]s.

use mimic_value::{Document, ObjectId, Reference, RegexValue, Value};
use mlua::Table;

/// Deepest table nesting accepted when converting; also stops cycles.
pub const MAX_DEPTH: usize = 100;

/// Convert a Lua value produced by a script.
///
/// Tables built by the prelude constructors are recognised by the `__name`
/// of their metatable. Untagged tables become arrays when they are a
/// non-empty `1..n` sequence and documents (keys sorted) otherwise.
/// Functions, coroutines and userdata cannot be converted.
pub fn from_lua(value: &mlua::Value) -> mlua::Result<Value> {
    convert(value, 0)
}

fn convert(value: &mlua::Value, depth: usize) -> mlua::Result<Value> {
    match value {
        mlua::Value::Nil => Ok(Value::Null),
        mlua::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        mlua::Value::Integer(i) => Ok(match i32::try_from(*i) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(*i),
        }),
        mlua::Value::Number(n) => Ok(Value::Double(*n)),
        mlua::Value::String(s) => Ok(Value::String(s.to_string_lossy())),
        mlua::Value::Table(table) => {
            if depth >= MAX_DEPTH {
                return Err(conversion_error(format!(
                    "value nesting exceeds {MAX_DEPTH} levels"
                )));
            }
            convert_table(table, depth + 1)
        }
        other => Err(conversion_error(format!(
            "cannot convert a Lua {} to a document value",
            other.type_name()
        ))),
    }
}

fn convert_table(table: &Table, depth: usize) -> mlua::Result<Value> {
    let Some(meta) = table.metatable() else {
        return convert_plain(table, depth);
    };
    let tag: Option<String> = meta.raw_get("__name")?;
    match tag.as_deref() {
        Some("null") => Ok(Value::Null),
        Some("MinKey") => Ok(Value::MinKey),
        Some("MaxKey") => Ok(Value::MaxKey),
        Some("Date") => {
            let ms = integer_field(table, "ms")?;
            Ok(Value::DateTime(ms))
        }
        Some("ObjectId") => {
            let hex: String = table.raw_get("hex")?;
            ObjectId::parse_str(&hex)
                .map(Value::ObjectId)
                .map_err(|e| conversion_error(format!("invalid ObjectId {hex:?}: {e}")))
        }
        Some("RegExp") => {
            let pattern: String = table.raw_get("pattern")?;
            let options: Option<String> = table.raw_get("options")?;
            Ok(Value::Regex(RegexValue::new(
                pattern,
                options.as_deref().unwrap_or(""),
            )))
        }
        Some("BinData") => {
            let subtype = integer_field(table, "subtype")?;
            let subtype = u8::try_from(subtype)
                .map_err(|_| conversion_error(format!("binary subtype {subtype} out of range")))?;
            let bytes: mlua::String = table.raw_get("bytes")?;
            Ok(Value::Binary {
                subtype,
                bytes: bytes.as_bytes().to_vec(),
            })
        }
        Some("DBRef") => {
            let collection: String = table.raw_get("$ref")?;
            let id: mlua::Value = table.raw_get("$id")?;
            let database: Option<String> = table.raw_get("$db")?;
            Ok(Value::Reference(Reference {
                database,
                collection,
                id: Box::new(convert(&id, depth)?),
            }))
        }
        Some("Array") => convert_sequence(table, table.raw_len(), depth),
        Some("Document") => {
            let keys: Option<Table> = meta.raw_get("__keys")?;
            convert_ordered(table, keys, depth)
        }
        _ => convert_plain(table, depth),
    }
}

fn convert_plain(table: &Table, depth: usize) -> mlua::Result<Value> {
    let len = table.raw_len();
    if len > 0 && is_sequence(table, len)? {
        return convert_sequence(table, len, depth);
    }
    convert_ordered(table, None, depth)
}

fn is_sequence(table: &Table, len: usize) -> mlua::Result<bool> {
    let mut count = 0;
    for pair in table.clone().pairs::<mlua::Value, mlua::Value>() {
        let (key, _) = pair?;
        match key {
            mlua::Value::Integer(i) if i >= 1 && (i as usize) <= len => count += 1,
            _ => return Ok(false),
        }
    }
    Ok(count == len)
}

fn convert_sequence(table: &Table, len: usize, depth: usize) -> mlua::Result<Value> {
    let mut items = Vec::with_capacity(len);
    for i in 1..=len {
        let item: mlua::Value = table.raw_get(i)?;
        items.push(convert(&item, depth)?);
    }
    Ok(Value::Array(items))
}

/// Fields named in `order` come first, in that order; any other fields
/// follow sorted by key.
fn convert_ordered(table: &Table, order: Option<Table>, depth: usize) -> mlua::Result<Value> {
    let mut doc = Document::new();
    if let Some(order) = order {
        for i in 1..=order.raw_len() {
            let key: String = order.raw_get(i)?;
            let field: mlua::Value = table.raw_get(key.as_str())?;
            if !field.is_nil() {
                doc.insert(key, convert(&field, depth)?);
            }
        }
    }

    let mut rest = Vec::new();
    for pair in table.clone().pairs::<mlua::Value, mlua::Value>() {
        let (key, field) = pair?;
        let key = match key {
            mlua::Value::String(s) => s.to_string_lossy(),
            mlua::Value::Integer(i) => i.to_string(),
            mlua::Value::Number(n) => n.to_string(),
            other => {
                return Err(conversion_error(format!(
                    "document keys must be strings, found a Lua {}",
                    other.type_name()
                )));
            }
        };
        if !doc.contains_key(&key) {
            rest.push((key, field));
        }
    }
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, field) in rest {
        doc.insert(key, convert(&field, depth)?);
    }
    Ok(Value::Document(doc))
}

fn integer_field(table: &Table, name: &str) -> mlua::Result<i64> {
    match table.raw_get::<mlua::Value>(name)? {
        mlua::Value::Integer(i) => Ok(i),
        mlua::Value::Number(n) if n.is_finite() => Ok(n as i64),
        other => Err(conversion_error(format!(
            "expected a number in field {name}, found a Lua {}",
            other.type_name()
        ))),
    }
}

fn conversion_error(message: String) -> mlua::Error {
    mlua::Error::RuntimeError(message)
}
