use mimic_value::Document;

use crate::error::QueryError;
use crate::expression::Expression;

/// A compiled query, reusable across documents and threads.
///
/// Holds no interpreter state: a `$where` clause gets a fresh script scope
/// on every evaluation.
#[derive(Debug, Clone)]
pub struct Predicate {
    expr: Expression,
}

impl Predicate {
    pub fn new(expr: Expression) -> Self {
        Self { expr }
    }

    /// Matches every document.
    pub fn always() -> Self {
        Self::new(Expression::And(Vec::new()))
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn matches(&self, doc: &Document) -> Result<bool, QueryError> {
        self.expr.matches(doc)
    }

    /// Keep the documents that match, in order.
    pub fn filter<I>(&self, docs: I) -> Result<Vec<Document>, QueryError>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut out = Vec::new();
        for doc in docs {
            if self.matches(&doc)? {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_filter;
    use bson::doc;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn predicate_is_shareable() {
        assert_send_sync::<Predicate>();
    }

    #[test]
    fn always_matches_everything() {
        let p = Predicate::always();
        assert!(p.matches(&Document::new()).unwrap());
        assert!(p.matches(&Document::from(doc! { "a": 1 })).unwrap());
    }

    #[test]
    fn concurrent_evaluation() {
        let p = compile_filter(&Document::from(doc! { "a": { "$gt": 10 } })).unwrap();
        std::thread::scope(|s| {
            for i in 0..4 {
                let p = &p;
                s.spawn(move || {
                    let doc = Document::from(doc! { "a": i * 10 });
                    assert_eq!(p.matches(&doc).unwrap(), i * 10 > 10);
                });
            }
        });
    }
}
