//! Error types for the lifecycle layer.

use crate::types::Operation;
use recordflow_store::StoreError;
use thiserror::Error;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// A defect in how a record or form type is wired.
///
/// Configuration faults are never converted into a `false` outcome. They
/// always reach the outermost caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigFault {
    /// The lifecycle transaction and the store's own per-operation
    /// transaction are both enabled for the same operation.
    #[error(
        "{operation} on {table} is wrapped by both the lifecycle transaction and \
         store_transactions(); disable one of them"
    )]
    DoubleTransaction {
        /// The record's table.
        table: String,
        /// The operation being run.
        operation: Operation,
    },

    /// A row lock was requested while no transaction is active.
    #[error("row of {table} cannot be locked outside of a transaction")]
    LockOutsideTransaction {
        /// The record's table.
        table: String,
    },

    /// A row lock was requested for a record that was never persisted.
    #[error("new record of {table} has no row to lock")]
    LockNewRecord {
        /// The record's table.
        table: String,
    },

    /// Validation failed on backend-only fields, which callers cannot set.
    #[error("validation failed on backend-only fields: {errors}")]
    UntrustedFieldInvalid {
        /// The full error set, serialized as JSON.
        errors: String,
    },

    /// The clone target does not share the clone base of the origin type.
    #[error("{target} does not share the clone base of {origin}")]
    CloneBaseMismatch {
        /// Type being cloned from.
        origin: &'static str,
        /// Type being cloned to.
        target: &'static str,
    },

    /// The clone target maps to a different table.
    #[error("{target} maps to table {target_table}, but {origin} maps to {origin_table}")]
    CloneTableMismatch {
        /// Type being cloned from.
        origin: &'static str,
        /// Table of the origin type.
        origin_table: &'static str,
        /// Type being cloned to.
        target: &'static str,
        /// Table of the target type.
        target_table: &'static str,
    },

    /// A primary key column has no value.
    #[error("primary key column {column} of {table} has no value")]
    MissingPrimaryKey {
        /// The record's table.
        table: String,
        /// The column without a value.
        column: String,
    },

    /// A finder was given a query over another table.
    #[error("query over {found} cannot hydrate records of {expected}")]
    ForeignQuery {
        /// The record's table.
        expected: String,
        /// The table the query selects from.
        found: String,
    },
}

/// Errors that can occur in lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration fault.
    #[error("configuration fault: {0}")]
    Config(#[from] ConfigFault),

    /// Domain failure raised by domain code.
    #[error("domain error: {message}")]
    Domain {
        /// The recorded domain error.
        message: String,
    },

    /// Diagnostics could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LifecycleError {
    /// Creates a domain error.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }

    /// Returns true for configuration faults.
    #[must_use]
    pub fn is_config_fault(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns the configuration fault, if this is one.
    #[must_use]
    pub fn config_fault(&self) -> Option<&ConfigFault> {
        match self {
            Self::Config(fault) => Some(fault),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_faults_are_classified() {
        let err: LifecycleError = ConfigFault::LockNewRecord {
            table: "users".into(),
        }
        .into();
        assert!(err.is_config_fault());
        assert_eq!(
            err.to_string(),
            "configuration fault: new record of users has no row to lock"
        );

        let err = LifecycleError::domain("out of stock");
        assert!(!err.is_config_fault());
        assert!(err.config_fault().is_none());
    }

    #[test]
    fn store_errors_convert() {
        let err: LifecycleError = StoreError::TransactionActive.into();
        assert!(matches!(err, LifecycleError::Store(_)));
        assert!(!err.is_config_fault());
    }

    #[test]
    fn double_transaction_message_names_operation() {
        let fault = ConfigFault::DoubleTransaction {
            table: "orders".into(),
            operation: Operation::Delete,
        };
        assert!(fault.to_string().starts_with("delete on orders"));
    }
}
