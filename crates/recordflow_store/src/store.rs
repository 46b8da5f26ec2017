//! Record store trait definition.

use crate::error::StoreResult;
use crate::query::Query;
use crate::types::IsolationLevel;
use crate::value::Row;

/// A relational record store, seen through one connection.
///
/// Stores are **connection-shaped**: there is at most one active transaction,
/// and every call made while it is active takes part in it. The lifecycle
/// layer relies on [`in_transaction`](RecordStore::in_transaction) to decide
/// whether a row lock is meaningful.
///
/// # Invariants
///
/// - `begin_transaction` fails if a transaction is already active
/// - `commit`/`rollback` fail if no transaction is active
/// - `rollback` restores every row to its state at `begin_transaction`
/// - `transaction_id` is `Some` exactly while `in_transaction` is true
/// - `render_query` never includes a lock clause; callers append one
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - reference implementation
pub trait RecordStore: Send + Sync {
    /// Begins a transaction at `isolation`, or at the store default when
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already active or the store
    /// cannot start one.
    fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> StoreResult<()>;

    /// Commits the active transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is active or the commit fails.
    fn commit(&self) -> StoreResult<()>;

    /// Rolls back the active transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is active.
    fn rollback(&self) -> StoreResult<()>;

    /// Returns true while a transaction is active.
    fn in_transaction(&self) -> bool;

    /// Identifies the active transaction, or `None` outside one.
    ///
    /// A store never hands out the same id twice.
    fn transaction_id(&self) -> Option<u64>;

    /// Renders a query to the store's native SQL, without a lock clause.
    fn render_query(&self, query: &Query) -> String;

    /// Executes raw SQL and returns the selected rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL cannot be parsed or executed.
    fn execute_raw(&self, sql: &str) -> StoreResult<Vec<Row>>;

    /// Inserts one row into `table`.
    ///
    /// Returns the values the store generated (for example an
    /// auto-increment key). Columns the caller supplied are not repeated.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables, key violations or store failures.
    fn insert(&self, table: &str, values: &Row) -> StoreResult<Row>;

    /// Updates the rows of `table` matching every column in `key`.
    ///
    /// Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables, key violations or store failures.
    fn update(&self, table: &str, key: &Row, values: &Row) -> StoreResult<u64>;

    /// Deletes the rows of `table` matching every column in `key`.
    ///
    /// Returns the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown tables or store failures.
    fn delete(&self, table: &str, key: &Row) -> StoreResult<u64>;
}
