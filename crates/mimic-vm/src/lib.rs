//! Lua script runtime for user-supplied predicates and map-reduce functions.
//!
//! Every [`ScriptScope`] owns an isolated Lua state with a prelude that
//! provides constructors for the document value types (`Date`, `ObjectId`,
//! `RegExp`, `BinData`, `DBRef`, `Array`, `Document`) and the `null`,
//! `MinKey` and `MaxKey` sentinels. Values cross the boundary as Lua source
//! literals going in and through [`from_lua`] coming out.

mod convert;
mod error;
pub mod literal;
mod runtime;

pub use convert::{MAX_DEPTH, from_lua};
pub use error::ScriptError;
pub use literal::{document_literal, string_literal, value_literal};
pub use runtime::ScriptScope;
