//! SQLite backend for the Infinity platform store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One embedded database serves both the
//! relational side (users, API keys, model definitions, views) and the
//! document side (records as JSON rows with an optional vector column).

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
