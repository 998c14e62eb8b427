use mimic_value::{Path, RegexValue, Value};
use regex::{Regex, RegexBuilder};

use crate::error::QueryError;

/// A compiled filter tree.
///
/// Owns every field path and operand so it can outlive the query document
/// it was compiled from and be shared between threads.
#[derive(Debug, Clone)]
pub enum Expression {
    // Logical
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Nor(Vec<Expression>),
    // Leaf: every value resolved at the path is offered to the test
    Field(Path, FieldTest),
    // Script evaluated with the document bound as `this`
    Where(String),
}

/// Test applied to the values resolved at one field path.
///
/// Unless noted otherwise a test holds when **any** candidate satisfies it.
/// The candidates are the resolved values plus the elements of resolved
/// arrays; a path that resolves to nothing offers a single `Null`.
#[derive(Debug, Clone)]
pub enum FieldTest {
    Eq(Value),
    /// No candidate equals the operand.
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Operand>),
    /// No candidate matches any operand.
    Nin(Vec<Operand>),
    /// Every operand matches some candidate.
    All(Vec<Operand>),
    /// The path resolves to at least one value (or to none).
    Exists(bool),
    Mod { divisor: i64, remainder: i64 },
    /// A resolved array has exactly this many elements.
    Size(usize),
    Regex(CompiledRegex),
    ElemMatch(ElemMatch),
    Not(Box<FieldTest>),
    /// Several operators given for one field.
    And(Vec<FieldTest>),
}

/// Member of an `$in`, `$nin` or `$all` list.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Regex(CompiledRegex),
}

/// The body of an `$elemMatch`.
#[derive(Debug, Clone)]
pub enum ElemMatch {
    /// `{$gt: 1, $lt: 5}`: applied to each element directly.
    Operators(Box<FieldTest>),
    /// `{qty: {$gt: 1}}`: applied to each document element.
    Query(Box<Expression>),
}

/// A regex literal together with its compiled matcher.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    value: RegexValue,
    regex: Regex,
}

impl CompiledRegex {
    /// Compile a pattern with `i`, `m`, `s` and `x` flags. `u` and `l` are
    /// accepted and ignored; any other flag is rejected.
    pub fn new(value: RegexValue) -> Result<Self, QueryError> {
        for flag in value.options.chars() {
            if !matches!(flag, 'i' | 'm' | 's' | 'x' | 'u' | 'l') {
                return Err(QueryError::malformed(format!("unknown regex option: {flag}")));
            }
        }
        let regex = RegexBuilder::new(&value.pattern)
            .case_insensitive(value.case_insensitive())
            .multi_line(value.multiline())
            .dot_matches_new_line(value.dot_all())
            .ignore_whitespace(value.extended())
            .build()
            .map_err(|e| QueryError::malformed(format!("invalid regex pattern: {e}")))?;
        Ok(Self { value, regex })
    }

    pub fn value(&self) -> &RegexValue {
        &self.value
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}
