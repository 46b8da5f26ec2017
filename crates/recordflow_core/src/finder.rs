//! Locked reads.
//!
//! Finders render a query through the store, append the requested lock
//! clause and hydrate records from the returned rows. Records read with
//! [`LockMode::ForUpdate`] are flagged so that
//! [`refresh_for_update`](LockedQuery::refresh_for_update) does not lock
//! them a second time.

use crate::database::Database;
use crate::error::{ConfigFault, LifecycleResult};
use crate::record::{DomainRecord, Record};
use recordflow_store::{LockMode, Query, Row};
use tracing::{debug, warn};

fn locked_sql(db: &Database, query: &Query, lock: LockMode) -> String {
    let mut sql = db.store().render_query(query);
    if let Some(clause) = lock.clause() {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql
}

fn fetch<T: DomainRecord>(db: &Database, query: &Query, lock: LockMode) -> LifecycleResult<Vec<T>> {
    let table = T::TABLE.name;
    if query.table != table {
        return Err(ConfigFault::ForeignQuery {
            expected: table.to_string(),
            found: query.table.clone(),
        }
        .into());
    }
    if lock.is_locking() && !db.in_transaction() {
        warn!(table, lock = %lock, "locked read outside of a transaction");
    }

    let rows = db.store().execute_raw(&locked_sql(db, query, lock))?;
    debug!(table, lock = %lock, rows = rows.len(), "rows fetched");

    let locked = lock == LockMode::ForUpdate;
    Ok(rows
        .into_iter()
        .map(|row| T::from_record(Record::hydrated(db, row, locked)))
        .collect())
}

/// Finders with an optional row lock, plus the refresh-under-lock idiom.
pub trait LockedQuery: DomainRecord {
    /// Finds the first record whose columns equal `condition`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails. A missing row is `Ok(None)`.
    fn find_one(db: &Database, condition: &Row, lock: LockMode) -> LifecycleResult<Option<Self>> {
        Self::find_one_by_query(db, Query::from_condition(Self::TABLE.name, condition), lock)
    }

    /// Finds every record whose columns equal `condition`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn find_all(db: &Database, condition: &Row, lock: LockMode) -> LifecycleResult<Vec<Self>> {
        Self::find_all_by_query(db, Query::from_condition(Self::TABLE.name, condition), lock)
    }

    /// Runs `query` with a limit of one row.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFault::ForeignQuery`] if `query` selects from another
    /// table, or an error if the store fails.
    fn find_one_by_query(db: &Database, query: Query, lock: LockMode) -> LifecycleResult<Option<Self>> {
        Ok(fetch(db, &query.limit(1), lock)?.into_iter().next())
    }

    /// Runs `query`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFault::ForeignQuery`] if `query` selects from another
    /// table, or an error if the store fails.
    fn find_all_by_query(db: &Database, query: Query, lock: LockMode) -> LifecycleResult<Vec<Self>> {
        fetch(db, &query, lock)
    }

    /// Re-reads this record's row under an exclusive lock.
    ///
    /// The baseline of `fields` (or of every column) is replaced by the
    /// locked row; attributes edited since the last read keep their value.
    /// A record already read under lock is not read again unless `force`
    /// is set.
    ///
    /// Returns `Ok(false)` if the row no longer exists.
    ///
    /// # Errors
    ///
    /// - [`ConfigFault::LockNewRecord`] for records never persisted
    /// - [`ConfigFault::LockOutsideTransaction`] when no transaction is active
    /// - store errors
    fn refresh_for_update(&mut self, fields: Option<&[&str]>, force: bool) -> LifecycleResult<bool> {
        let table = Self::TABLE.name;
        let record = self.record();
        if record.is_new_record() {
            return Err(ConfigFault::LockNewRecord {
                table: table.to_string(),
            }
            .into());
        }
        let db = record.db().clone();
        if !db.in_transaction() {
            return Err(ConfigFault::LockOutsideTransaction {
                table: table.to_string(),
            }
            .into());
        }
        if record.already_locked_for_update() && !force {
            debug!(table, "row already locked; refresh skipped");
            return Ok(true);
        }

        let key = record.primary_key(&Self::TABLE, Some(table))?;
        let query = Query::from_condition(table, &key).alias(table).limit(1);
        let rows = db
            .store()
            .execute_raw(&locked_sql(&db, &query, LockMode::ForUpdate))?;
        let Some(row) = rows.into_iter().next() else {
            debug!(table, "row vanished before it could be locked");
            return Ok(false);
        };

        let record = self.record_mut();
        record.merge_locked_row(&row, fields);
        record.set_already_locked_for_update(true);
        debug!(table, force, "row refreshed under lock");
        Ok(true)
    }
}

impl<T: DomainRecord> LockedQuery for T {}
