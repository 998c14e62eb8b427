//! Document database facade: filtered queries and Lua map-reduce over a
//! [`Store`](mimic_store::Store).

pub mod config;
mod database;
pub mod error;
pub mod map_reduce;

pub use config::DatabaseConfig;
pub use database::{Database, FindOptions};
pub use error::DbError;
pub use map_reduce::{
    MapReduceCounts, MapReduceJob, MapReduceOutcome, MapReduceResults, OutputStrategy,
};

pub use mimic_store::{MemoryStore, Store};
pub use mimic_value::{Document, Value};
