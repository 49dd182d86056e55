//! Soft-delete ("paranoid") semantics over an externally supplied record
//! store.
//!
//! Deleting a record marks it deleted instead of removing it. Every read goes
//! through a [`QuerySet`](manager::QuerySet), which hides deleted rows unless
//! the caller widens its [`Visibility`](query::Visibility). Delete and restore
//! cascade through the relations declared in the [`Schema`](schema::Schema).
//!
//! This crate has no database dependency. Storage is reached through the
//! [`RecordStore`](store::RecordStore) trait.

// Native `async fn` in traits; the store trait spells out `Send` futures.
#![allow(async_fn_in_trait)]

pub mod cascade;
pub mod error;
mod lookup;
pub mod manager;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use manager::{Manager, QuerySet};
pub use query::{Filter, Query, Visibility};
pub use record::{NewRecord, Record, RecordKey};
pub use schema::{FieldDef, FieldKind, ModelDef, RelationKind, Schema};
pub use store::{Operation, RecordStore, Transition};
pub use value::Value;
