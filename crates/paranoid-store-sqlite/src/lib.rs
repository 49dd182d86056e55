//! SQLite backend for the paranoid record engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Rows of every model live in one
//! `records` table with their fields stored as JSON.

mod encode;
mod schema;
mod store;

pub mod config;
pub mod error;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use store::SqliteStore;
