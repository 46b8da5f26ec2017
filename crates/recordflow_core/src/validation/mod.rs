//! Validation collaborator.
//!
//! The lifecycle layer only needs two things from a validator: run the rules
//! for a list of fields, and name the fields the rules cover. [`RuleSet`] is
//! the bundled implementation.

mod errors;
mod rules;

pub use errors::ErrorBag;
pub use rules::{CustomCheck, Rule, RuleSet};

use recordflow_store::Row;

/// A validation rule engine.
pub trait Validator {
    /// Validates `fields` of `attributes`, adding messages to `errors`.
    fn validate(&self, attributes: &Row, fields: &[String], errors: &mut ErrorBag);

    /// Fields covered by at least one rule, in declaration order.
    fn fields(&self) -> Vec<String>;
}
