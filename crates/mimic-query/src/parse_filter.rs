use mimic_value::{Document, Path, RegexValue, Value};
use mimic_vm::ScriptScope;

use crate::error::QueryError;
use crate::eval::as_integer;
use crate::expression::{CompiledRegex, ElemMatch, Expression, FieldTest, Operand};
use crate::predicate::Predicate;

/// Compile a query document into a reusable [`Predicate`].
pub fn compile_filter(query: &Document) -> Result<Predicate, QueryError> {
    parse_filter(query).map(Predicate::new)
}

/// Parse a query document into an Expression tree.
///
/// Top-level keys are combined conjunctively. An empty document matches
/// every document.
pub fn parse_filter(query: &Document) -> Result<Expression, QueryError> {
    parse_query(query, true)
}

fn parse_query(query: &Document, allow_where: bool) -> Result<Expression, QueryError> {
    let mut children = Vec::new();

    for (key, value) in query.iter() {
        match key {
            "$and" => children.push(Expression::And(parse_logical_array(key, value, allow_where)?)),
            "$or" => children.push(Expression::Or(parse_logical_array(key, value, allow_where)?)),
            "$nor" => children.push(Expression::Nor(parse_logical_array(key, value, allow_where)?)),
            "$where" if allow_where => children.push(parse_where(value)?),
            "$where" => {
                return Err(QueryError::malformed("$where is not allowed inside $elemMatch"));
            }
            "$comment" => {}
            k if k.starts_with('$') => {
                return Err(QueryError::malformed(format!("unknown top-level operator: {k}")));
            }
            field => children.push(Expression::Field(Path::parse(field), parse_field_condition(value)?)),
        }
    }

    Ok(match <[Expression; 1]>::try_from(children) {
        Ok([only]) => only,
        Err(children) => Expression::And(children),
    })
}

/// Parse a `$and`, `$or` or `$nor` array of query documents.
fn parse_logical_array(
    op: &str,
    value: &Value,
    allow_where: bool,
) -> Result<Vec<Expression>, QueryError> {
    let Value::Array(items) = value else {
        return Err(QueryError::malformed(format!("{op} value must be an array")));
    };
    if items.is_empty() {
        return Err(QueryError::malformed(format!("{op} array must not be empty")));
    }
    items
        .iter()
        .map(|item| match item {
            Value::Document(doc) => parse_query(doc, allow_where),
            _ => Err(QueryError::malformed(format!("{op} array elements must be documents"))),
        })
        .collect()
}

/// Syntax is checked now so a broken script fails before any scan.
fn parse_where(value: &Value) -> Result<Expression, QueryError> {
    let Value::String(source) = value else {
        return Err(QueryError::malformed("$where value must be a script string"));
    };
    ScriptScope::check_syntax("$where", source)?;
    Ok(Expression::Where(source.clone()))
}

/// Parse a field condition: a regex, an operator document, or a literal
/// compared for equality.
fn parse_field_condition(value: &Value) -> Result<FieldTest, QueryError> {
    match value {
        Value::Regex(re) => Ok(FieldTest::Regex(CompiledRegex::new(re.clone())?)),
        Value::Document(doc) if is_operator_doc(doc) => parse_operator_doc(doc),
        literal => Ok(FieldTest::Eq(literal.clone())),
    }
}

/// A document whose first key starts with `$` holds operators.
fn is_operator_doc(doc: &Document) -> bool {
    doc.first().is_some_and(|(key, _)| key.starts_with('$'))
}

/// Parse an operator document like `{ "$gt": 21, "$lte": 100 }`.
///
/// Keys without a `$` prefix are ignored.
fn parse_operator_doc(doc: &Document) -> Result<FieldTest, QueryError> {
    let mut tests = Vec::new();

    if let Some(regex) = parse_regex(doc)? {
        tests.push(FieldTest::Regex(regex));
    }

    for (key, value) in doc.iter() {
        let test = match key {
            "$eq" => FieldTest::Eq(value.clone()),
            "$ne" => FieldTest::Ne(value.clone()),
            "$gt" => FieldTest::Gt(value.clone()),
            "$gte" => FieldTest::Gte(value.clone()),
            "$lt" => FieldTest::Lt(value.clone()),
            "$lte" => FieldTest::Lte(value.clone()),
            "$in" => FieldTest::In(parse_operands(key, value)?),
            "$nin" => FieldTest::Nin(parse_operands(key, value)?),
            "$all" => FieldTest::All(parse_operands(key, value)?),
            "$exists" => FieldTest::Exists(value.is_truthy()),
            "$mod" => parse_mod(value)?,
            "$size" => FieldTest::Size(parse_size(value)?),
            "$not" => FieldTest::Not(Box::new(parse_not(value)?)),
            "$elemMatch" => FieldTest::ElemMatch(parse_elem_match(value)?),
            "$regex" | "$options" => continue,
            k if k.starts_with('$') => {
                return Err(QueryError::malformed(format!("unknown field operator: {k}")));
            }
            _ => continue,
        };
        tests.push(test);
    }

    match <[FieldTest; 1]>::try_from(tests) {
        Ok([only]) => Ok(only),
        Err(tests) if tests.is_empty() => Err(QueryError::malformed("empty operator document")),
        Err(tests) => Ok(FieldTest::And(tests)),
    }
}

/// Build the regex named by `$regex` and an optional `$options` sibling.
/// The pattern may be a string or a regex literal; `$options` wins over the
/// literal's own flags.
fn parse_regex(doc: &Document) -> Result<Option<CompiledRegex>, QueryError> {
    let options = match doc.get("$options") {
        None => None,
        Some(Value::String(options)) => Some(options.as_str()),
        Some(_) => return Err(QueryError::malformed("$options value must be a string")),
    };
    let value = match (doc.get("$regex"), options) {
        (None, None) => return Ok(None),
        (None, Some(_)) => return Err(QueryError::malformed("$options without $regex")),
        (Some(Value::String(pattern)), options) => {
            RegexValue::new(pattern.clone(), options.unwrap_or(""))
        }
        (Some(Value::Regex(re)), options) => {
            RegexValue::new(re.pattern.clone(), options.unwrap_or(re.options.as_str()))
        }
        (Some(_), _) => return Err(QueryError::malformed("$regex value must be a string")),
    };
    CompiledRegex::new(value).map(Some)
}

fn parse_operands(op: &str, value: &Value) -> Result<Vec<Operand>, QueryError> {
    let Value::Array(items) = value else {
        return Err(QueryError::malformed(format!("{op} needs an array")));
    };
    items
        .iter()
        .map(|item| match item {
            Value::Regex(re) => CompiledRegex::new(re.clone()).map(Operand::Regex),
            other => Ok(Operand::Value(other.clone())),
        })
        .collect()
}

fn parse_mod(value: &Value) -> Result<FieldTest, QueryError> {
    let operands = match value {
        Value::Array(items) if items.len() == 2 => (as_integer(&items[0]), as_integer(&items[1])),
        _ => return Err(QueryError::malformed("$mod needs an array of [divisor, remainder]")),
    };
    match operands {
        (Some(0), _) => Err(QueryError::malformed("$mod divisor cannot be 0")),
        (Some(divisor), Some(remainder)) => Ok(FieldTest::Mod { divisor, remainder }),
        _ => Err(QueryError::malformed("$mod divisor and remainder must be numbers")),
    }
}

fn parse_size(value: &Value) -> Result<usize, QueryError> {
    let size = match value {
        Value::Int32(i) => usize::try_from(*i).ok(),
        Value::Int64(i) => usize::try_from(*i).ok(),
        Value::Double(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
        _ => None,
    };
    size.ok_or_else(|| QueryError::malformed("$size needs a non-negative whole number"))
}

/// `$not` negates a regex, an operator document, or equality with a literal.
fn parse_not(value: &Value) -> Result<FieldTest, QueryError> {
    parse_field_condition(value)
}

/// `$elemMatch` takes either operators applied to each element or a query
/// applied to each document element.
fn parse_elem_match(value: &Value) -> Result<ElemMatch, QueryError> {
    let Value::Document(doc) = value else {
        return Err(QueryError::malformed("$elemMatch needs a document"));
    };
    let logical = doc
        .first()
        .is_some_and(|(key, _)| matches!(key, "$and" | "$or" | "$nor" | "$where"));
    if is_operator_doc(doc) && !logical {
        Ok(ElemMatch::Operators(Box::new(parse_operator_doc(doc)?)))
    } else {
        Ok(ElemMatch::Query(Box::new(parse_query(doc, false)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn parse(query: bson::Document) -> Result<Expression, QueryError> {
        parse_filter(&Document::from(query))
    }

    #[test]
    fn bare_field_implicit_eq() {
        let expr = parse(doc! { "status": "active" }).unwrap();
        match expr {
            Expression::Field(path, FieldTest::Eq(v)) => {
                assert_eq!(path.as_str(), "status");
                assert_eq!(v, Value::from("active"));
            }
            _ => panic!("expected Eq, got {:?}", expr),
        }
    }

    #[test]
    fn multiple_bare_fields_become_and() {
        let expr = parse(doc! { "status": "active", "age": 30_i32 }).unwrap();
        match expr {
            Expression::And(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Expression::Field(p, _) if p.as_str() == "status"));
                assert!(matches!(&children[1], Expression::Field(p, _) if p.as_str() == "age"));
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn empty_query_is_empty_and() {
        let expr = parse(doc! {}).unwrap();
        assert!(matches!(expr, Expression::And(children) if children.is_empty()));
    }

    #[test]
    fn multiple_operators_same_field() {
        let expr = parse(doc! { "score": { "$gt": 50_i32, "$lte": 100_i32 } }).unwrap();
        match expr {
            Expression::Field(_, FieldTest::And(tests)) => {
                assert_eq!(tests.len(), 2);
                assert!(matches!(&tests[0], FieldTest::Gt(_)));
                assert!(matches!(&tests[1], FieldTest::Lte(_)));
            }
            _ => panic!("expected field And"),
        }
    }

    #[test]
    fn logical_operators() {
        let expr = parse(doc! {
            "$or": [
                { "status": "active" },
                { "$nor": [{ "score": { "$gt": 90_i32 } }, { "verified": true }] }
            ]
        })
        .unwrap();
        match expr {
            Expression::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], Expression::Field(..)));
                assert!(matches!(&children[1], Expression::Nor(c) if c.len() == 2));
            }
            _ => panic!("expected Or"),
        }
    }

    #[test]
    fn logical_operand_must_be_non_empty_array_of_documents() {
        assert!(parse(doc! { "$and": {} }).is_err());
        assert!(parse(doc! { "$or": [] }).is_err());
        assert!(parse(doc! { "$nor": [1] }).is_err());
    }

    #[test]
    fn regex_with_options() {
        let expr = parse(doc! { "name": { "$regex": "^john", "$options": "i" } }).unwrap();
        match expr {
            Expression::Field(_, FieldTest::Regex(re)) => {
                assert_eq!(re.value().pattern, "^john");
                assert!(re.is_match("JOHNNY"));
            }
            _ => panic!("expected Regex"),
        }
    }

    #[test]
    fn regex_errors() {
        assert!(parse(doc! { "a": { "$options": "i" } }).is_err());
        assert!(parse(doc! { "a": { "$regex": "(" } }).is_err());
        assert!(parse(doc! { "a": { "$regex": "a", "$options": "q" } }).is_err());
        assert!(parse(doc! { "a": { "$regex": 1 } }).is_err());
    }

    #[test]
    fn unknown_operators_rejected() {
        let err = parse(doc! { "a": { "$near": 1 } }).unwrap_err();
        assert!(err.to_string().contains("$near"));
        assert!(parse(doc! { "$text": "x" }).is_err());
    }

    #[test]
    fn comment_is_skipped() {
        let expr = parse(doc! { "$comment": "why", "a": 1 }).unwrap();
        assert!(matches!(expr, Expression::Field(..)));
    }

    #[test]
    fn operand_shapes_checked() {
        assert!(parse(doc! { "a": { "$in": 1 } }).is_err());
        assert!(parse(doc! { "a": { "$mod": [0, 1] } }).is_err());
        assert!(parse(doc! { "a": { "$mod": [3] } }).is_err());
        assert!(parse(doc! { "a": { "$size": -1 } }).is_err());
        assert!(parse(doc! { "a": { "$size": 1.5 } }).is_err());
        assert!(parse(doc! { "a": { "$elemMatch": 1 } }).is_err());
    }

    #[test]
    fn not_of_literal_is_negated_equality() {
        let expr = parse(doc! { "a": { "$not": 3 } }).unwrap();
        assert!(matches!(
            expr,
            Expression::Field(_, FieldTest::Not(inner)) if matches!(*inner, FieldTest::Eq(Value::Int32(3)))
        ));
    }

    #[test]
    fn elem_match_forms() {
        let ops = parse(doc! { "a": { "$elemMatch": { "$gt": 1 } } }).unwrap();
        assert!(matches!(ops, Expression::Field(_, FieldTest::ElemMatch(ElemMatch::Operators(_)))));
        let query = parse(doc! { "a": { "$elemMatch": { "b": 1, "c": { "$lt": 2 } } } }).unwrap();
        assert!(matches!(query, Expression::Field(_, FieldTest::ElemMatch(ElemMatch::Query(_)))));
        assert!(parse(doc! { "a": { "$elemMatch": { "$where": "true" } } }).is_err());
    }

    #[test]
    fn where_syntax_checked_at_compile_time() {
        assert!(matches!(parse(doc! { "$where": "this.a == 1" }).unwrap(), Expression::Where(_)));
        assert!(matches!(
            parse(doc! { "$where": "this.a ==" }),
            Err(QueryError::Script(_))
        ));
        assert!(parse(doc! { "$where": 1 }).is_err());
    }
}
