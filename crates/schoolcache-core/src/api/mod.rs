//! Storage backend module.
//!
//! The core never talks to a database directly. It issues `SelectRequest`s
//! and row mutations through the `Backend` trait, which has two
//! implementations:
//!
//! - `RestBackend`: the remote PostgREST-style store, over HTTP
//! - `MemoryBackend`: in-process tables with the same join and filter
//!   semantics, for tests and offline demos

pub mod backend;
pub mod error;
pub mod memory;
pub mod request;
pub mod rest;

pub use backend::Backend;
pub use error::ApiError;
pub use memory::MemoryBackend;
pub use request::{Columns, Embed, Filter, FilterOp, OrderBy, SelectRequest};
pub use rest::RestBackend;
