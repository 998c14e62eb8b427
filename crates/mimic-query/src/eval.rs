use std::cmp::Ordering;

use mimic_value::{Document, Value, compare, values_equal};
use mimic_vm::ScriptScope;

use crate::error::QueryError;
use crate::expression::{CompiledRegex, ElemMatch, Expression, FieldTest, Operand};

const NULL: &Value = &Value::Null;

impl Expression {
    /// Evaluate against one document. Only `$where` can fail.
    pub fn matches(&self, doc: &Document) -> Result<bool, QueryError> {
        match self {
            Expression::And(children) => {
                for child in children {
                    if !child.matches(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expression::Or(children) => {
                for child in children {
                    if child.matches(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expression::Nor(children) => {
                for child in children {
                    if child.matches(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Expression::Field(path, test) => test.matches(&path.resolve(doc)),
            Expression::Where(source) => {
                // A fresh scope per document: evaluations share nothing.
                let scope = ScriptScope::new()?;
                Ok(scope.eval_predicate("$where", source, doc)?)
            }
        }
    }
}

impl FieldTest {
    /// Evaluate against the values resolved at the test's path.
    pub fn matches(&self, resolved: &[&Value]) -> Result<bool, QueryError> {
        Ok(match self {
            FieldTest::Eq(operand) => candidates(resolved).any(|v| values_equal(v, operand)),
            FieldTest::Ne(operand) => !candidates(resolved).any(|v| values_equal(v, operand)),
            FieldTest::Gt(operand) => in_range(resolved, operand, |o| o == Ordering::Greater),
            FieldTest::Gte(operand) => in_range(resolved, operand, |o| o != Ordering::Less),
            FieldTest::Lt(operand) => in_range(resolved, operand, |o| o == Ordering::Less),
            FieldTest::Lte(operand) => in_range(resolved, operand, |o| o != Ordering::Greater),
            FieldTest::In(operands) => {
                candidates(resolved).any(|v| operands.iter().any(|op| op.matches(v)))
            }
            FieldTest::Nin(operands) => {
                !candidates(resolved).any(|v| operands.iter().any(|op| op.matches(v)))
            }
            FieldTest::All(operands) => {
                !operands.is_empty()
                    && operands
                        .iter()
                        .all(|op| candidates(resolved).any(|v| op.matches(v)))
            }
            FieldTest::Exists(expected) => resolved.is_empty() != *expected,
            FieldTest::Mod { divisor, remainder } => candidates(resolved)
                .filter_map(as_integer)
                .any(|n| n.wrapping_rem(*divisor) == *remainder),
            FieldTest::Size(len) => resolved
                .iter()
                .any(|v| matches!(v, Value::Array(items) if items.len() == *len)),
            FieldTest::Regex(re) => candidates(resolved).any(|v| regex_matches(re, v)),
            FieldTest::ElemMatch(body) => {
                for value in resolved {
                    let Value::Array(items) = value else { continue };
                    for item in items {
                        if body.matches(item)? {
                            return Ok(true);
                        }
                    }
                }
                false
            }
            FieldTest::Not(inner) => !inner.matches(resolved)?,
            FieldTest::And(tests) => {
                for test in tests {
                    if !test.matches(resolved)? {
                        return Ok(false);
                    }
                }
                true
            }
        })
    }
}

impl ElemMatch {
    fn matches(&self, element: &Value) -> Result<bool, QueryError> {
        match self {
            ElemMatch::Operators(test) => test.matches(&[element]),
            ElemMatch::Query(expr) => match element {
                Value::Document(doc) => expr.matches(doc),
                _ => Ok(false),
            },
        }
    }
}

impl Operand {
    fn matches(&self, candidate: &Value) -> bool {
        match self {
            Operand::Value(operand) => values_equal(candidate, operand),
            Operand::Regex(re) => regex_matches(re, candidate),
        }
    }
}

/// Resolved values followed by the elements of resolved arrays. Nothing
/// resolved offers a single `Null`.
fn candidates<'a>(resolved: &'a [&'a Value]) -> impl Iterator<Item = &'a Value> + 'a {
    let missing = resolved.is_empty().then_some(NULL);
    resolved
        .iter()
        .flat_map(|value| {
            let elements = match value {
                Value::Array(items) => items.as_slice(),
                _ => &[],
            };
            std::iter::once(*value).chain(elements.iter())
        })
        .chain(missing)
}

/// Range tests only compare within the operand's type class, except that
/// `MinKey` and `MaxKey` operands bound every class.
fn in_range(resolved: &[&Value], operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    let any_class = matches!(operand, Value::MinKey | Value::MaxKey);
    let class = operand.type_class();
    candidates(resolved)
        .filter(|v| any_class || v.type_class() == class)
        .any(|v| accept(compare(v, operand)))
}

fn regex_matches(re: &CompiledRegex, candidate: &Value) -> bool {
    match candidate {
        Value::String(s) => re.is_match(s),
        Value::Regex(value) => value == re.value(),
        _ => false,
    }
}

/// Integer view of a numeric value; doubles truncate toward zero.
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(i) => Some(i64::from(*i)),
        Value::Int64(i) => Some(*i),
        Value::Double(f) if f.is_finite() => Some(*f as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_value::RegexValue;

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().map(|i| Value::Int32(*i)).collect()
    }

    #[test]
    fn candidates_expand_arrays_one_level() {
        let nested = Value::Array(vec![Value::Int32(1), Value::Array(ints(&[2]))]);
        let resolved = [&nested];
        let found: Vec<&Value> = candidates(&resolved).collect();
        assert_eq!(found.len(), 3);
        assert_eq!(found[1], &Value::Int32(1));
        assert_eq!(found[2], &Value::Array(ints(&[2])));
    }

    #[test]
    fn missing_offers_null() {
        assert!(FieldTest::Eq(Value::Null).matches(&[]).unwrap());
        assert!(FieldTest::Ne(Value::Int32(3)).matches(&[]).unwrap());
        assert!(!FieldTest::Gt(Value::Int32(0)).matches(&[]).unwrap());
    }

    #[test]
    fn range_is_type_bracketed() {
        let s = Value::String("a".into());
        assert!(!FieldTest::Gt(Value::Int32(1)).matches(&[&s]).unwrap());
        assert!(FieldTest::Gt(Value::MinKey).matches(&[&s]).unwrap());
        assert!(FieldTest::Lt(Value::MaxKey).matches(&[&Value::Null]).unwrap());
        assert!(!FieldTest::Lte(Value::Int32(3)).matches(&[&Value::Null]).unwrap());
    }

    #[test]
    fn mod_truncates_doubles() {
        let test = FieldTest::Mod { divisor: 10, remainder: 1 };
        assert!(test.matches(&[&Value::Double(21.9)]).unwrap());
        assert!(!test.matches(&[&Value::Double(f64::NAN)]).unwrap());
        assert!(!test.matches(&[&Value::String("1".into())]).unwrap());
    }

    #[test]
    fn size_ignores_nested_arrays() {
        let nested = Value::Array(vec![Value::Array(ints(&[1, 2]))]);
        assert!(FieldTest::Size(1).matches(&[&nested]).unwrap());
        assert!(!FieldTest::Size(2).matches(&[&nested]).unwrap());
    }

    #[test]
    fn regex_matches_strings_and_equal_literals() {
        let re = CompiledRegex::new(RegexValue::new("^foo", "")).unwrap();
        let test = FieldTest::Regex(re);
        assert!(test.matches(&[&Value::from("foobar")]).unwrap());
        assert!(test
            .matches(&[&Value::Regex(RegexValue::new("^foo", ""))])
            .unwrap());
        assert!(!test.matches(&[&Value::Int32(1)]).unwrap());
    }

    #[test]
    fn all_requires_operands() {
        let arr = Value::Array(ints(&[1, 2]));
        assert!(!FieldTest::All(vec![]).matches(&[&arr]).unwrap());
        assert!(FieldTest::All(vec![Operand::Value(Value::Int64(2))])
            .matches(&[&arr])
            .unwrap());
    }
}
