//! SQLite backend for the gradebook result engine.
//!
//! Implements every collaborator trait from [`gradebook_core::store`] over one
//! database file. Wraps [`tokio_rusqlite`] so all database access runs on a
//! dedicated thread without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{AuditEntry, SqliteStore};

#[cfg(test)]
mod tests;
