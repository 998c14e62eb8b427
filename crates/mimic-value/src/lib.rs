//! Value model shared by the query compiler, the script runtime and the
//! in-memory store: tagged values, their total order, and dot-path lookup.

pub mod compare;
mod key;
pub mod path;
mod value;

pub use compare::{TypeClass, compare, compare_documents, compare_optional, values_equal};
pub use key::ValueKey;
pub use path::Path;
pub use value::{Document, Reference, RegexValue, Value};

pub use bson::oid::ObjectId;
