//! Query filter compiler.
//!
//! [`compile_filter`] turns a query document into a [`Predicate`] that can
//! be evaluated against any number of documents. Operators apply to every
//! value reachable at a field path, so a test against an array field holds
//! when any element satisfies it.

mod error;
mod eval;
mod expression;
mod parse_filter;
mod predicate;
mod sort;

pub use error::QueryError;
pub use expression::{CompiledRegex, ElemMatch, Expression, FieldTest, Operand};
pub use parse_filter::{compile_filter, parse_filter};
pub use predicate::Predicate;
pub use sort::{Sort, SortDirection, SortSpec};
