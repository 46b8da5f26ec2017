//! # RecordFlow Store
//!
//! The record-store collaborator for RecordFlow.
//!
//! This crate provides the lowest layer the lifecycle core talks to: a
//! relational record store that can begin and finish transactions, render a
//! [`Query`] to its native SQL dialect, execute raw SQL, and insert, update
//! or delete single rows.
//!
//! ## Design Principles
//!
//! - Stores are connection-shaped: one active transaction at a time
//! - All methods take `&self`; implementations use interior mutability
//! - Stores know nothing about entities, validation or trust levels
//! - Must be `Send + Sync` so a store can be shared behind an `Arc`
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - reference implementation for tests and examples
//!
//! ## Example
//!
//! ```rust
//! use recordflow_store::{InMemoryStore, Query, RecordStore, Row, TableDef, Value};
//!
//! let store = InMemoryStore::new();
//! store.create_table(TableDef::new("users").primary_key(["id"]).auto_increment("id"));
//!
//! let mut row = Row::new();
//! row.insert("email".into(), Value::from("a@example.com"));
//! let generated = store.insert("users", &row).unwrap();
//! assert_eq!(generated.get("id"), Some(&Value::Integer(1)));
//!
//! let sql = store.render_query(&Query::table("users").where_eq("id", 1));
//! let rows = store.execute_raw(&sql).unwrap();
//! assert_eq!(rows.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod query;
pub mod sql;
mod store;
mod types;
mod value;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, StoreEvent, TableDef};
pub use query::{ColumnRef, Comparison, Join, Order, Predicate, Query};
pub use store::RecordStore;
pub use types::{IsolationLevel, LockMode, StoreOp};
pub use value::{Row, Value};
