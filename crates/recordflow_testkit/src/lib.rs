//! # RecordFlow Testkit
//!
//! Test utilities for RecordFlow.
//!
//! This crate provides:
//! - An in-memory database helper and a configurable record fixture
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use recordflow_core::prelude::*;
//! use recordflow_testkit::prelude::*;
//!
//! let (store, db) = test_db();
//! let mut member = Member::new(&db);
//! member.set("email", "ada@example.com");
//! assert!(member.save(true).unwrap().is_success());
//! assert_eq!(store.rows("members").len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
