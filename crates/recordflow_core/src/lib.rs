//! # RecordFlow Core
//!
//! Transactional persistence lifecycle for records and forms.
//!
//! This crate provides:
//! - The save/delete state machine with pre- and post-transaction hooks
//! - Attribute trust partitioning into backend-only and frontend fields
//! - Validation escalation of backend-only field failures into
//!   configuration faults
//! - Locked reads and refresh-under-lock inside an open transaction
//! - The error/result signal helpers shared by records and forms
//! - Clone-to between record types of the same table
//!
//! ## Example
//!
//! ```rust
//! use recordflow_core::prelude::*;
//! use recordflow_store::{InMemoryStore, LockMode, Row, Value};
//! use std::sync::Arc;
//!
//! struct Account {
//!     record: Record,
//! }
//!
//! impl DomainModel for Account {
//!     fn core(&self) -> &ModelCore {
//!         self.record.core()
//!     }
//!     fn core_mut(&mut self) -> &mut ModelCore {
//!         self.record.core_mut()
//!     }
//!     fn rules(&self) -> RuleSet {
//!         RuleSet::new().rule(Rule::required(["owner"]))
//!     }
//! }
//!
//! impl DomainRecord for Account {
//!     const TABLE: TableSchema = TableSchema::new("accounts", &["id"]).auto_increment("id");
//!
//!     fn record(&self) -> &Record {
//!         &self.record
//!     }
//!     fn record_mut(&mut self) -> &mut Record {
//!         &mut self.record
//!     }
//!     fn from_record(record: Record) -> Self {
//!         Self { record }
//!     }
//!     fn transaction_isolation(&self) -> TransactionIsolation {
//!         TransactionIsolation::Serializable
//!     }
//! }
//!
//! let store = Arc::new(InMemoryStore::with_tables([Account::TABLE.table_def()]));
//! let db = Database::new(store);
//!
//! let mut account = Account::from_record(Record::new(&db));
//! account.set("owner", "ada");
//! assert!(account.save(true)?.is_success());
//!
//! let mut key = Row::new();
//! key.insert("id".into(), Value::Integer(1));
//! let found = Account::find_one(&db, &key, LockMode::None)?.expect("row exists");
//! assert_eq!(found.get("owner"), Some(&Value::from("ada")));
//! # Ok::<(), recordflow_core::LifecycleError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clone;
mod config;
mod database;
mod error;
mod finder;
mod form;
mod lifecycle;
mod model;
mod persist;
mod record;
mod schema;
mod signal;
pub mod trust;
mod types;
pub mod validation;

pub use clone::CloneTo;
pub use config::{LifecycleConfig, DEFAULT_ERROR, VALIDATION_ERROR};
pub use database::Database;
pub use error::{ConfigFault, LifecycleError, LifecycleResult};
pub use finder::LockedQuery;
pub use form::{DomainForm, FormExt};
pub use lifecycle::Lifecycle;
pub use model::{DomainModel, ModelCore, ModelExt};
pub use record::{DomainRecord, Record};
pub use schema::TableSchema;
pub use signal::Signal;
pub use trust::{Safety, SafetyConfig};
pub use types::{FaultKind, Flow, Operation, OperationSet, Outcome, TransactionIsolation};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::validation::{ErrorBag, Rule, RuleSet, Validator};
    pub use crate::{
        CloneTo, ConfigFault, Database, DomainForm, DomainModel, DomainRecord, FaultKind, Flow,
        FormExt, LifecycleConfig, LifecycleError, LifecycleResult, Lifecycle, LockedQuery,
        ModelCore, ModelExt, Operation, OperationSet, Outcome, Record, Signal, TableSchema,
        TransactionIsolation,
    };
}
