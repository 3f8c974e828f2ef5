//! Query layer: cache keys, request execution and result normalization.

pub mod data;
pub mod error;
pub mod executor;
pub mod key;

pub use data::{QueryData, QueryRequest};
pub use error::QueryError;
pub use executor::QueryExecutor;
pub use key::{KeyParam, KeyPrefix, QueryKey};
