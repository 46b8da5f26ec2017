//! In-memory record store for testing.

use crate::error::{StoreError, StoreResult};
use crate::query::{ColumnRef, Comparison, Order, Predicate, Query};
use crate::sql::{self, Statement};
use crate::store::RecordStore;
use crate::types::{IsolationLevel, LockMode, StoreOp};
use crate::value::{Row, Value};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Declaration of an in-memory table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Primary key columns, in order.
    pub primary_key: Vec<String>,
    /// Column filled from a per-table counter when inserted without a value.
    pub auto_increment: Option<String>,
}

impl TableDef {
    /// Declares a table with no key columns yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            auto_increment: None,
        }
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the auto-increment column.
    #[must_use]
    pub fn auto_increment(mut self, column: impl Into<String>) -> Self {
        self.auto_increment = Some(column.into());
        self
    }

    fn key_of(&self, row: &Row) -> Vec<Value> {
        self.primary_key
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// One call observed by an [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A transaction began.
    Begin {
        /// Requested isolation level.
        isolation: Option<IsolationLevel>,
    },
    /// The active transaction committed.
    Commit,
    /// The active transaction rolled back.
    Rollback,
    /// A raw statement was executed.
    Query {
        /// The statement text.
        sql: String,
        /// Lock requested by the statement.
        lock: LockMode,
        /// Number of rows returned.
        rows: usize,
    },
    /// A row was inserted.
    Insert {
        /// Target table.
        table: String,
    },
    /// Rows were updated.
    Update {
        /// Target table.
        table: String,
        /// Rows affected.
        affected: u64,
    },
    /// Rows were deleted.
    Delete {
        /// Target table.
        table: String,
        /// Rows affected.
        affected: u64,
    },
}

#[derive(Debug, Clone)]
struct Table {
    def: TableDef,
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug)]
struct ActiveTransaction {
    id: u64,
    snapshot: HashMap<String, Table>,
    locks: HashSet<(String, Vec<Value>)>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Table>,
    transaction: Option<ActiveTransaction>,
    transactions_started: u64,
    events: Vec<StoreEvent>,
    failures: Vec<StoreOp>,
}

/// An in-memory record store.
///
/// This store keeps every table in memory and is suitable for:
/// - Unit and integration tests of the lifecycle layer
/// - Examples and documentation
///
/// It models a single connection: transactions snapshot all tables on begin
/// and restore the snapshot on rollback, and locked reads are remembered for
/// the duration of the active transaction. Every call is appended to an event
/// log that tests can inspect with [`events`](InMemoryStore::events).
///
/// # Example
///
/// ```rust
/// use recordflow_store::{InMemoryStore, RecordStore, Row, StoreOp, TableDef};
///
/// let store = InMemoryStore::new();
/// store.create_table(TableDef::new("notes").primary_key(["id"]).auto_increment("id"));
/// store.fail_next(StoreOp::Insert);
/// assert!(store.insert("notes", &Row::new()).is_err());
/// assert!(store.insert("notes", &Row::new()).is_ok());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given tables.
    #[must_use]
    pub fn with_tables(defs: impl IntoIterator<Item = TableDef>) -> Self {
        let store = Self::new();
        for def in defs {
            store.create_table(def);
        }
        store
    }

    /// Creates (or replaces) a table.
    pub fn create_table(&self, def: TableDef) {
        let table = Table {
            def: def.clone(),
            rows: Vec::new(),
            next_id: 1,
        };
        self.inner.lock().tables.insert(def.name, table);
    }

    /// Returns a copy of the rows of `table` (empty for unknown tables).
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Returns a copy of the event log.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.inner.lock().events.clone()
    }

    /// Clears the event log.
    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }

    /// Makes the next call of `op` fail with [`StoreError::Injected`].
    ///
    /// Multiple calls queue multiple failures.
    pub fn fail_next(&self, op: StoreOp) {
        self.inner.lock().failures.push(op);
    }

    /// Number of row locks held by the active transaction.
    #[must_use]
    pub fn held_locks(&self) -> usize {
        self.inner
            .lock()
            .transaction
            .as_ref()
            .map_or(0, |t| t.locks.len())
    }
}

impl Inner {
    fn take_failure(&mut self, op: StoreOp) -> StoreResult<()> {
        match self.failures.iter().position(|f| *f == op) {
            Some(index) => {
                self.failures.remove(index);
                Err(StoreError::Injected { op })
            }
            None => Ok(()),
        }
    }

    fn table(&self, name: &str) -> StoreResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::unknown_table(name))
    }

    fn table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StoreError::unknown_table(name))
    }

    fn select(&self, query: &Query) -> StoreResult<Vec<Row>> {
        let main = self.table(&query.table)?;
        let mut aliases: Vec<&str> = vec![query.effective_alias()];
        let mut combos: Vec<Vec<&Row>> = main.rows.iter().map(|row| vec![row]).collect();

        for join in &query.joins {
            let joined = self.table(&join.table)?;
            aliases.push(join.effective_alias());
            let mut next = Vec::new();
            for combo in &combos {
                for candidate in &joined.rows {
                    let mut extended = combo.clone();
                    extended.push(candidate);
                    let left = resolve(&aliases, &extended, &join.left)?;
                    let right = resolve(&aliases, &extended, &join.right)?;
                    if left.cmp_sql(&right) == Some(Ordering::Equal) {
                        next.push(extended);
                    }
                }
            }
            combos = next;
        }

        let mut matched = Vec::new();
        for combo in combos {
            let mut keep = true;
            for predicate in &query.filters {
                let value = resolve(&aliases, &combo, predicate.column())?;
                if !evaluate(predicate, &value) {
                    keep = false;
                    break;
                }
            }
            if keep {
                matched.push(combo);
            }
        }

        if !query.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(matched.len());
            for combo in matched {
                let mut keys = Vec::with_capacity(query.order_by.len());
                for (column, _) in &query.order_by {
                    keys.push(resolve(&aliases, &combo, column)?);
                }
                keyed.push((keys, combo));
            }
            keyed.sort_by(|(a, _), (b, _)| {
                for (i, (_, order)) in query.order_by.iter().enumerate() {
                    let ord = a[i].cmp_sort(&b[i]);
                    let ord = match order {
                        Order::Asc => ord,
                        Order::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            matched = keyed.into_iter().map(|(_, combo)| combo).collect();
        }

        if let Some(limit) = query.limit {
            matched.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(matched.into_iter().map(|combo| combo[0].clone()).collect())
    }
}

fn resolve(aliases: &[&str], combo: &[&Row], column: &ColumnRef) -> StoreResult<Value> {
    let index = match &column.qualifier {
        Some(qualifier) => aliases
            .iter()
            .take(combo.len())
            .position(|alias| *alias == qualifier.as_str())
            .ok_or_else(|| StoreError::unknown_column(column.to_string()))?,
        None => 0,
    };
    Ok(combo[index]
        .get(&column.name)
        .cloned()
        .unwrap_or(Value::Null))
}

fn evaluate(predicate: &Predicate, value: &Value) -> bool {
    match predicate {
        Predicate::Compare { op, value: rhs, .. } => match value.cmp_sql(rhs) {
            None => false,
            Some(ord) => match op {
                Comparison::Eq => ord == Ordering::Equal,
                Comparison::Ne => ord != Ordering::Equal,
                Comparison::Lt => ord == Ordering::Less,
                Comparison::Le => ord != Ordering::Greater,
                Comparison::Gt => ord == Ordering::Greater,
                Comparison::Ge => ord != Ordering::Less,
            },
        },
        Predicate::IsNull(_) => value.is_null(),
        Predicate::IsNotNull(_) => !value.is_null(),
        Predicate::In { values, .. } => values
            .iter()
            .any(|candidate| value.cmp_sql(candidate) == Some(Ordering::Equal)),
    }
}

fn matches_key(row: &Row, key: &Row) -> bool {
    key.iter()
        .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
}

fn render_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(Value::to_sql_literal).collect();
    format!("({})", parts.join(", "))
}

fn check_unique(table: &Table, rows: &[Row]) -> StoreResult<()> {
    if table.def.primary_key.is_empty() {
        return Ok(());
    }
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        let key = table.def.key_of(row);
        if !seen.insert(key.clone()) {
            return Err(StoreError::DuplicateKey {
                table: table.def.name.clone(),
                key: render_key(&key),
            });
        }
    }
    Ok(())
}

impl RecordStore for InMemoryStore {
    fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.take_failure(StoreOp::Begin)?;
        if inner.transaction.is_some() {
            return Err(StoreError::TransactionActive);
        }
        inner.transactions_started += 1;
        inner.transaction = Some(ActiveTransaction {
            id: inner.transactions_started,
            snapshot: inner.tables.clone(),
            locks: HashSet::new(),
        });
        inner.events.push(StoreEvent::Begin { isolation });
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.transaction.is_none() {
            return Err(StoreError::NoActiveTransaction);
        }
        if let Err(err) = inner.take_failure(StoreOp::Commit) {
            // A failed commit leaves nothing applied.
            if let Some(transaction) = inner.transaction.take() {
                inner.tables = transaction.snapshot;
            }
            inner.events.push(StoreEvent::Rollback);
            return Err(err);
        }
        inner.transaction = None;
        inner.events.push(StoreEvent::Commit);
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.take_failure(StoreOp::Rollback)?;
        let transaction = inner
            .transaction
            .take()
            .ok_or(StoreError::NoActiveTransaction)?;
        inner.tables = transaction.snapshot;
        inner.events.push(StoreEvent::Rollback);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.inner.lock().transaction.is_some()
    }

    fn transaction_id(&self) -> Option<u64> {
        self.inner.lock().transaction.as_ref().map(|t| t.id)
    }

    fn render_query(&self, query: &Query) -> String {
        sql::render(query)
    }

    fn execute_raw(&self, sql: &str) -> StoreResult<Vec<Row>> {
        let mut inner = self.inner.lock();
        inner.take_failure(StoreOp::Query)?;
        let Statement { query, lock } = sql::parse(sql)?;
        let rows = inner.select(&query)?;

        if lock.is_locking() {
            let def = inner.table(&query.table)?.def.clone();
            if let Some(transaction) = inner.transaction.as_mut() {
                for row in &rows {
                    transaction
                        .locks
                        .insert((def.name.clone(), def.key_of(row)));
                }
            }
        }

        inner.events.push(StoreEvent::Query {
            sql: sql.to_string(),
            lock,
            rows: rows.len(),
        });
        Ok(rows)
    }

    fn insert(&self, table: &str, values: &Row) -> StoreResult<Row> {
        let mut inner = self.inner.lock();
        inner.take_failure(StoreOp::Insert)?;
        let target = inner.table_mut(table)?;

        let mut row = values.clone();
        let mut generated = Row::new();
        let mut next_id = target.next_id;
        if let Some(column) = &target.def.auto_increment {
            match row.get(column) {
                None | Some(Value::Null) => {
                    row.insert(column.clone(), Value::Integer(next_id));
                    generated.insert(column.clone(), Value::Integer(next_id));
                    next_id += 1;
                }
                Some(Value::Integer(explicit)) => {
                    next_id = next_id.max(explicit.saturating_add(1));
                }
                Some(_) => {}
            }
        }

        for column in &target.def.primary_key {
            if row.get(column).map_or(true, Value::is_null) {
                return Err(StoreError::MissingPrimaryKey {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }

        let key = target.def.key_of(&row);
        if !target.def.primary_key.is_empty()
            && target.rows.iter().any(|existing| target.def.key_of(existing) == key)
        {
            return Err(StoreError::DuplicateKey {
                table: table.to_string(),
                key: render_key(&key),
            });
        }

        target.rows.push(row);
        target.next_id = next_id;
        inner.events.push(StoreEvent::Insert {
            table: table.to_string(),
        });
        Ok(generated)
    }

    fn update(&self, table: &str, key: &Row, values: &Row) -> StoreResult<u64> {
        let mut inner = self.inner.lock();
        inner.take_failure(StoreOp::Update)?;
        let target = inner.table_mut(table)?;

        let mut rows = target.rows.clone();
        let mut affected = 0_u64;
        for row in rows.iter_mut().filter(|row| matches_key(row, key)) {
            for (column, value) in values {
                row.insert(column.clone(), value.clone());
            }
            affected += 1;
        }
        check_unique(target, &rows)?;
        target.rows = rows;

        inner.events.push(StoreEvent::Update {
            table: table.to_string(),
            affected,
        });
        Ok(affected)
    }

    fn delete(&self, table: &str, key: &Row) -> StoreResult<u64> {
        let mut inner = self.inner.lock();
        inner.take_failure(StoreOp::Delete)?;
        let target = inner.table_mut(table)?;

        let before = target.rows.len();
        target.rows.retain(|row| !matches_key(row, key));
        let affected = (before - target.rows.len()) as u64;

        inner.events.push(StoreEvent::Delete {
            table: table.to_string(),
            affected,
        });
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn create_store() -> InMemoryStore {
        InMemoryStore::with_tables([
            TableDef::new("accounts")
                .primary_key(["id"])
                .auto_increment("id"),
            TableDef::new("owners").primary_key(["id"]),
        ])
    }

    #[test]
    fn insert_generates_keys() {
        let store = create_store();
        let first = store
            .insert("accounts", &row(&[("name", "a".into())]))
            .unwrap();
        let second = store
            .insert("accounts", &row(&[("name", "b".into())]))
            .unwrap();

        assert_eq!(first.get("id"), Some(&Value::Integer(1)));
        assert_eq!(second.get("id"), Some(&Value::Integer(2)));
        assert_eq!(store.rows("accounts").len(), 2);
    }

    #[test]
    fn explicit_key_advances_counter() {
        let store = create_store();
        let explicit = store
            .insert("accounts", &row(&[("id", Value::Integer(10))]))
            .unwrap();
        assert!(explicit.is_empty());

        let next = store.insert("accounts", &Row::new()).unwrap();
        assert_eq!(next.get("id"), Some(&Value::Integer(11)));
    }

    #[test]
    fn duplicate_and_missing_keys() {
        let store = create_store();
        store
            .insert("owners", &row(&[("id", Value::Integer(1))]))
            .unwrap();

        let dup = store
            .insert("owners", &row(&[("id", Value::Integer(1))]))
            .unwrap_err();
        assert!(matches!(dup, StoreError::DuplicateKey { .. }));

        let missing = store.insert("owners", &Row::new()).unwrap_err();
        assert!(matches!(missing, StoreError::MissingPrimaryKey { .. }));
    }

    #[test]
    fn rollback_restores_rows() {
        let store = create_store();
        store.begin_transaction(None).unwrap();
        store.insert("accounts", &Row::new()).unwrap();
        assert_eq!(store.rows("accounts").len(), 1);

        store.rollback().unwrap();
        assert!(store.rows("accounts").is_empty());
        assert!(!store.in_transaction());
    }

    #[test]
    fn nested_begin_is_rejected() {
        let store = create_store();
        store
            .begin_transaction(Some(IsolationLevel::Serializable))
            .unwrap();
        assert!(matches!(
            store.begin_transaction(None),
            Err(StoreError::TransactionActive)
        ));
        store.commit().unwrap();
        assert!(matches!(store.commit(), Err(StoreError::NoActiveTransaction)));
    }

    #[test]
    fn transaction_ids_are_not_reused() {
        let store = create_store();
        assert_eq!(store.transaction_id(), None);

        store.begin_transaction(None).unwrap();
        let first = store.transaction_id();
        store.commit().unwrap();
        assert_eq!(store.transaction_id(), None);

        store.begin_transaction(None).unwrap();
        let second = store.transaction_id();
        store.rollback().unwrap();

        assert!(first.is_some() && second.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn injected_commit_failure_discards_changes() {
        let store = create_store();
        store.begin_transaction(None).unwrap();
        store.insert("accounts", &Row::new()).unwrap();
        store.fail_next(StoreOp::Commit);

        assert!(matches!(
            store.commit(),
            Err(StoreError::Injected {
                op: StoreOp::Commit
            })
        ));
        assert!(!store.in_transaction());
        assert!(store.rows("accounts").is_empty());
    }

    #[test]
    fn update_and_delete_by_key() {
        let store = create_store();
        store
            .insert("accounts", &row(&[("name", "a".into())]))
            .unwrap();
        let key = row(&[("id", Value::Integer(1))]);

        let updated = store
            .update("accounts", &key, &row(&[("name", "z".into())]))
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(
            store.rows("accounts")[0].get("name"),
            Some(&Value::from("z"))
        );

        assert_eq!(store.delete("accounts", &key).unwrap(), 1);
        assert_eq!(store.delete("accounts", &key).unwrap(), 0);
    }

    #[test]
    fn update_rejects_key_collision() {
        let store = create_store();
        store.insert("accounts", &Row::new()).unwrap();
        store.insert("accounts", &Row::new()).unwrap();

        let err = store
            .update(
                "accounts",
                &row(&[("id", Value::Integer(2))]),
                &row(&[("id", Value::Integer(1))]),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.rows("accounts")[1].get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn select_with_join_filter_and_order() {
        let store = create_store();
        store
            .insert("owners", &row(&[("id", 1.into()), ("active", true.into())]))
            .unwrap();
        store
            .insert("owners", &row(&[("id", 2.into()), ("active", false.into())]))
            .unwrap();
        for owner in [1, 2, 1] {
            store
                .insert("accounts", &row(&[("owner_id", owner.into())]))
                .unwrap();
        }

        let query = Query::table("accounts")
            .alias("a")
            .inner_join("owners", "o", "a.owner_id", "o.id")
            .filter(Predicate::eq("o.active", true))
            .order_by("a.id", Order::Desc);
        let rows = store.execute_raw(&store.render_query(&query)).unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(Value::Integer(3)), Some(Value::Integer(1))]);
        assert!(rows.iter().all(|r| !r.contains_key("active")));
    }

    #[test]
    fn unknown_alias_is_an_error() {
        let store = create_store();
        store.insert("accounts", &Row::new()).unwrap();
        let err = store
            .execute_raw("SELECT * FROM \"accounts\" WHERE \"x\".\"id\" = 1")
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[test]
    fn locked_reads_are_tracked_inside_transactions() {
        let store = create_store();
        store.insert("accounts", &Row::new()).unwrap();
        let sql = format!(
            "{} FOR UPDATE",
            store.render_query(&Query::table("accounts").where_eq("id", 1))
        );

        store.execute_raw(&sql).unwrap();
        assert_eq!(store.held_locks(), 0);

        store.begin_transaction(None).unwrap();
        store.execute_raw(&sql).unwrap();
        assert_eq!(store.held_locks(), 1);
        store.commit().unwrap();
        assert_eq!(store.held_locks(), 0);

        let locked_queries = store
            .events()
            .iter()
            .filter(|e| matches!(e, StoreEvent::Query { lock: LockMode::ForUpdate, .. }))
            .count();
        assert_eq!(locked_queries, 2);
    }

    #[test]
    fn null_semantics_in_filters() {
        let store = create_store();
        store
            .insert("accounts", &row(&[("note", Value::Null)]))
            .unwrap();
        store
            .insert("accounts", &row(&[("note", "x".into())]))
            .unwrap();

        let eq_null = Query::table("accounts").where_eq("note", Value::Null);
        assert!(store
            .execute_raw(&store.render_query(&eq_null))
            .unwrap()
            .is_empty());

        let is_null = Query::table("accounts").filter(Predicate::is_null("note"));
        assert_eq!(
            store.execute_raw(&store.render_query(&is_null)).unwrap().len(),
            1
        );
    }
}
