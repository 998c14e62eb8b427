use std::fmt;

use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson};

/// A single value held by a document.
///
/// Every value belongs to exactly one variant. Integer and floating point
/// variants are kept apart for round-tripping, but compare by magnitude
/// (see [`crate::compare`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    MinKey,
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Binary { subtype: u8, bytes: Vec<u8> },
    ObjectId(ObjectId),
    Regex(RegexValue),
    Document(Document),
    Array(Vec<Value>),
    Reference(Reference),
    MaxKey,
}

/// A regular expression literal: pattern plus flag characters.
///
/// Flags are stored sorted and deduplicated so two literals with the same
/// flags in a different order are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexValue {
    pub pattern: String,
    pub options: String,
}

impl RegexValue {
    pub fn new(pattern: impl Into<String>, options: &str) -> Self {
        let mut flags: Vec<char> = options.chars().collect();
        flags.sort_unstable();
        flags.dedup();
        Self {
            pattern: pattern.into(),
            options: flags.into_iter().collect(),
        }
    }

    pub fn case_insensitive(&self) -> bool {
        self.options.contains('i')
    }

    pub fn dot_all(&self) -> bool {
        self.options.contains('s')
    }

    pub fn extended(&self) -> bool {
        self.options.contains('x')
    }

    pub fn multiline(&self) -> bool {
        self.options.contains('m')
    }
}

/// A pointer to a document in another collection (`{$ref, $id, $db}`).
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub database: Option<String>,
    pub collection: String,
    pub id: Box<Value>,
}

impl Reference {
    pub fn new(collection: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            database: None,
            collection: collection.into(),
            id: Box::new(id.into()),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// The `{$ref, $id, $db}` document form.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("$ref", self.collection.clone());
        doc.insert("$id", (*self.id).clone());
        if let Some(db) = &self.database {
            doc.insert("$db", db.clone());
        }
        doc
    }

    fn from_document(doc: &bson::Document) -> Option<Self> {
        let collection = doc.get_str("$ref").ok()?;
        let id = doc.get("$id")?;
        if doc.keys().any(|k| !matches!(k.as_str(), "$ref" | "$id" | "$db")) {
            return None;
        }
        let database = match doc.get("$db") {
            None => None,
            Some(Bson::String(db)) => Some(db.clone()),
            Some(_) => return None,
        };
        Some(Self {
            database,
            collection: collection.to_string(),
            id: Box::new(Value::from(id.clone())),
        })
    }
}

impl Value {
    /// Numeric view, `None` for non-numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(*i as f64),
            Value::Int64(i) => Some(*i as f64),
            Value::Double(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Truthiness as the query and output layers see it: null, false and
    /// numeric zero are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int32(i) => *i != 0,
            Value::Int64(i) => *i != 0,
            Value::Double(f) => *f != 0.0 && !f.is_nan(),
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::MinKey => write!(f, "MinKey"),
            Value::MaxKey => write!(f, "MaxKey"),
            Value::Reference(r) => match &r.database {
                Some(db) => write!(f, "DBRef({db}.{}, {})", r.collection, r.id),
                None => write!(f, "DBRef({}, {})", r.collection, r.id),
            },
            other => write!(f, "{}", Bson::from(other.clone())),
        }
    }
}

// ── Document ────────────────────────────────────────────────────

/// Ordered mapping of unique string keys to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert `key` as the first entry, removing any existing entry for it.
    pub fn insert_first(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.insert(0, (key, value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn first(&self) -> Option<(&str, &Value)> {
        self.entries.first().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bson::Document::from(self.clone()))
    }
}

// ── bson interop ────────────────────────────────────────────────

/// Converts a bson value into the comparable value model.
///
/// Types outside that model are narrowed rather than rejected:
///
/// * `Undefined` becomes `Null`.
/// * `Symbol` and JavaScript code become strings; a code scope is dropped.
/// * `Timestamp` becomes a date at its `time` seconds; the increment is lost.
/// * `Decimal128` and `DbPointer` become `Null`.
impl From<Bson> for Value {
    fn from(bson: Bson) -> Self {
        match bson {
            Bson::MinKey => Value::MinKey,
            Bson::MaxKey => Value::MaxKey,
            Bson::Null | Bson::Undefined => Value::Null,
            Bson::Int32(i) => Value::Int32(i),
            Bson::Int64(i) => Value::Int64(i),
            Bson::Double(f) => Value::Double(f),
            Bson::String(s) | Bson::Symbol(s) | Bson::JavaScriptCode(s) => Value::String(s),
            Bson::JavaScriptCodeWithScope(code) => Value::String(code.code),
            Bson::Boolean(b) => Value::Boolean(b),
            Bson::DateTime(dt) => Value::DateTime(dt.timestamp_millis()),
            Bson::Timestamp(ts) => Value::DateTime(i64::from(ts.time) * 1000),
            Bson::Binary(bin) => Value::Binary {
                subtype: u8::from(bin.subtype),
                bytes: bin.bytes,
            },
            Bson::ObjectId(oid) => Value::ObjectId(oid),
            Bson::RegularExpression(re) => Value::Regex(RegexValue::new(re.pattern, &re.options)),
            Bson::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Bson::Document(doc) => match Reference::from_document(&doc) {
                Some(reference) => Value::Reference(reference),
                None => Value::Document(Document::from(doc)),
            },
            Bson::Decimal128(_) | Bson::DbPointer(_) => Value::Null,
        }
    }
}

impl From<Value> for Bson {
    fn from(value: Value) -> Self {
        match value {
            Value::MinKey => Bson::MinKey,
            Value::MaxKey => Bson::MaxKey,
            Value::Null => Bson::Null,
            Value::Int32(i) => Bson::Int32(i),
            Value::Int64(i) => Bson::Int64(i),
            Value::Double(f) => Bson::Double(f),
            Value::String(s) => Bson::String(s),
            Value::Boolean(b) => Bson::Boolean(b),
            Value::DateTime(ms) => Bson::DateTime(bson::DateTime::from_millis(ms)),
            Value::Binary { subtype, bytes } => Bson::Binary(Binary {
                subtype: BinarySubtype::from(subtype),
                bytes,
            }),
            Value::ObjectId(oid) => Bson::ObjectId(oid),
            Value::Regex(re) => Bson::RegularExpression(bson::Regex {
                pattern: re.pattern,
                options: re.options,
            }),
            Value::Document(doc) => Bson::Document(bson::Document::from(doc)),
            Value::Array(items) => Bson::Array(items.into_iter().map(Bson::from).collect()),
            Value::Reference(r) => Bson::Document(bson::Document::from(r.to_document())),
        }
    }
}

impl From<bson::Document> for Document {
    fn from(doc: bson::Document) -> Self {
        doc.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
    }
}

impl From<Document> for bson::Document {
    fn from(doc: Document) -> Self {
        doc.into_iter().map(|(k, v)| (k, Bson::from(v))).collect()
    }
}

impl From<bson::Document> for Value {
    fn from(doc: bson::Document) -> Self {
        Value::from(Bson::Document(doc))
    }
}

// ── Scalar conversions ──────────────────────────────────────────

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectId> for Value {
    fn from(oid: ObjectId) -> Self {
        Value::ObjectId(oid)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Document(doc)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Reference> for Value {
    fn from(reference: Reference) -> Self {
        Value::Reference(reference)
    }
}

impl From<RegexValue> for Value {
    fn from(re: RegexValue) -> Self {
        Value::Regex(re)
    }
}
