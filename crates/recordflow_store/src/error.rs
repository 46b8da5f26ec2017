//! Error types for store operations.

use crate::types::StoreOp;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced table does not exist.
    #[error("unknown table: {name}")]
    UnknownTable {
        /// Name of the table.
        name: String,
    },

    /// A column reference could not be resolved.
    #[error("unknown column reference: {column}")]
    UnknownColumn {
        /// The unresolved column reference as written.
        column: String,
    },

    /// A row with the same primary key already exists.
    #[error("duplicate primary key {key} in table {table}")]
    DuplicateKey {
        /// The table written to.
        table: String,
        /// Rendered primary key values.
        key: String,
    },

    /// A primary key column had no value.
    #[error("missing value for primary key column {column} in table {table}")]
    MissingPrimaryKey {
        /// The table written to.
        table: String,
        /// The primary key column without a value.
        column: String,
    },

    /// The SQL text could not be parsed.
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        /// Description of the problem.
        message: String,
        /// Byte offset into the statement.
        position: usize,
    },

    /// The statement is valid SQL but not supported by this store.
    #[error("unsupported statement: {message}")]
    Unsupported {
        /// Description of the unsupported construct.
        message: String,
    },

    /// A transaction is already active on this connection.
    #[error("a transaction is already active")]
    TransactionActive,

    /// Commit or rollback was requested without an active transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// A failure injected through [`crate::InMemoryStore::fail_next`].
    #[error("injected failure during {op:?}")]
    Injected {
        /// The operation that was made to fail.
        op: StoreOp,
    },
}

impl StoreError {
    /// Creates an unknown table error.
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Self::UnknownTable { name: name.into() }
    }

    /// Creates an unknown column error.
    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
        }
    }

    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Creates an unsupported statement error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}
