//! Persisted records.

use crate::database::Database;
use crate::error::{ConfigFault, LifecycleResult};
use crate::model::{DomainModel, ModelCore};
use crate::schema::TableSchema;
use crate::types::{Flow, OperationSet, TransactionIsolation};
use recordflow_store::{Row, Value};
use std::any::TypeId;

/// State of one record: its model core, the baseline snapshot of the stored
/// row, and the row-lock flag.
///
/// A record without a baseline is new. The lock flag can only be set by the
/// locked query executor and remembers the transaction that took the lock,
/// so it reads false once that transaction is over.
#[derive(Debug, Clone)]
pub struct Record {
    core: ModelCore,
    old: Option<Row>,
    locked_in: Option<u64>,
    db: Database,
}

/// Record state restored when a transaction rolls back.
#[derive(Debug, Clone)]
pub(crate) struct RecordSnapshot {
    attributes: Row,
    old: Option<Row>,
    locked_in: Option<u64>,
}

impl Record {
    /// Creates a new, unsaved record.
    #[must_use]
    pub fn new(db: &Database) -> Self {
        Self {
            core: ModelCore::new(db.shared_config()),
            old: None,
            locked_in: None,
            db: db.clone(),
        }
    }

    /// Creates a record for a row read from the store.
    pub(crate) fn hydrated(db: &Database, row: Row, locked: bool) -> Self {
        let mut record = Self::new(db);
        record.core.replace_attributes(row.clone());
        record.old = Some(row);
        record.set_already_locked_for_update(locked);
        record
    }

    /// Returns the model core.
    #[must_use]
    pub fn core(&self) -> &ModelCore {
        &self.core
    }

    /// Returns the model core for modification.
    pub fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    /// Returns the database handle.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Returns true until the record is first inserted.
    #[must_use]
    pub fn is_new_record(&self) -> bool {
        self.old.is_none()
    }

    /// Returns true once the row was read under an exclusive lock in the
    /// transaction that is still active.
    #[must_use]
    pub fn already_locked_for_update(&self) -> bool {
        self.locked_in.is_some() && self.locked_in == self.db.transaction_id()
    }

    /// Ties the lock flag to the active transaction. Outside a transaction
    /// no lock is held, so the flag stays clear.
    pub(crate) fn set_already_locked_for_update(&mut self, locked: bool) {
        self.locked_in = if locked { self.db.transaction_id() } else { None };
    }

    /// The baseline snapshot of the stored row.
    #[must_use]
    pub fn old_attributes(&self) -> Option<&Row> {
        self.old.as_ref()
    }

    /// The baseline value of `field`.
    #[must_use]
    pub fn old_attribute(&self, field: &str) -> Option<&Value> {
        self.old.as_ref().and_then(|old| old.get(field))
    }

    /// Returns true if `field` differs from the baseline.
    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        match &self.old {
            None => self.core.get(field).is_some(),
            Some(old) => self.core.get(field) != old.get(field),
        }
    }

    /// Attributes that differ from the baseline (all of them for new records).
    #[must_use]
    pub fn dirty_attributes(&self) -> Row {
        self.core
            .attributes()
            .iter()
            .filter(|(field, _)| self.is_dirty(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// Primary key values of the stored row.
    ///
    /// Uses the baseline when there is one. With an `alias`, keys are
    /// qualified as `alias.column`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFault::MissingPrimaryKey`] when a key column has no
    /// value.
    pub fn primary_key(&self, schema: &TableSchema, alias: Option<&str>) -> LifecycleResult<Row> {
        let source = self.old.as_ref().unwrap_or(self.core.attributes());
        let mut key = Row::new();
        for column in schema.primary_key {
            let value = source
                .get(*column)
                .filter(|value| !value.is_null())
                .ok_or_else(|| ConfigFault::MissingPrimaryKey {
                    table: schema.name.to_string(),
                    column: (*column).to_string(),
                })?;
            let name = match alias {
                Some(alias) => format!("{alias}.{column}"),
                None => (*column).to_string(),
            };
            key.insert(name, value.clone());
        }
        Ok(key)
    }

    /// Makes the current attributes the baseline.
    pub(crate) fn mark_persisted(&mut self) {
        self.old = Some(self.core.attributes().clone());
    }

    /// Drops the baseline after the row was deleted.
    pub(crate) fn mark_deleted(&mut self) {
        self.old = None;
        self.locked_in = None;
    }

    /// Replaces attributes and baseline with `row`.
    pub(crate) fn populate(&mut self, row: Row) {
        self.core.replace_attributes(row.clone());
        self.old = Some(row);
    }

    /// Merges a freshly locked row into the baseline.
    ///
    /// Only `fields` (or every column of `row`) are touched; fields the row
    /// does not carry are skipped. Attributes that were not edited follow the
    /// new baseline; edited ones keep their in-flight value.
    pub(crate) fn merge_locked_row(&mut self, row: &Row, fields: Option<&[&str]>) {
        let names: Vec<String> = match fields {
            Some(fields) => fields.iter().map(ToString::to_string).collect(),
            None => row.keys().cloned().collect(),
        };
        for name in names {
            let Some(fresh) = row.get(&name).cloned() else {
                continue;
            };
            if !self.is_dirty(&name) {
                self.core.set(name.clone(), fresh.clone());
            }
            self.old.get_or_insert_with(Row::new).insert(name, fresh);
        }
    }

    pub(crate) fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            attributes: self.core.attributes().clone(),
            old: self.old.clone(),
            locked_in: self.locked_in,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: RecordSnapshot) {
        self.core.replace_attributes(snapshot.attributes);
        self.old = snapshot.old;
        self.locked_in = snapshot.locked_in;
    }
}

/// A [`DomainModel`] persisted as one row of [`DomainRecord::TABLE`].
///
/// Implementors hold a [`Record`] and expose it through
/// [`record`](DomainRecord::record) / [`record_mut`](DomainRecord::record_mut);
/// their [`DomainModel::core`] should return the record's core. Every hook
/// has a default.
///
/// Hooks run in this order for a save:
///
/// ```text
/// before_transaction -> [begin] -> before_save -> insert/update -> after_save
///     -> [commit | rollback] -> after_transaction
/// ```
///
/// and for a delete:
///
/// ```text
/// before_delete_transaction -> [begin] -> before_delete -> delete -> after_delete
///     -> [commit | rollback] -> after_delete_transaction
/// ```
pub trait DomainRecord: DomainModel + Sized + 'static {
    /// The table this type maps to.
    const TABLE: TableSchema;

    /// Returns the record state.
    fn record(&self) -> &Record;

    /// Returns the record state for modification.
    fn record_mut(&mut self) -> &mut Record;

    /// Wraps record state read from the store.
    fn from_record(record: Record) -> Self;

    /// Isolation of the lifecycle transaction around save and delete.
    fn transaction_isolation(&self) -> TransactionIsolation {
        TransactionIsolation::None
    }

    /// Master switch for the lifecycle transaction.
    fn transactions_activate(&self) -> bool {
        true
    }

    /// Operations the record layer wraps in its own store transaction.
    fn store_transactions(&self) -> OperationSet {
        OperationSet::NONE
    }

    /// Runs before a save opens its transaction.
    ///
    /// # Errors
    ///
    /// An error aborts the save and reaches the caller unchanged.
    fn before_transaction(&mut self) -> LifecycleResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Runs exactly once after a save attempt that passed
    /// [`before_transaction`](DomainRecord::before_transaction).
    fn after_transaction(&mut self, _success: bool) {}

    /// Runs before a delete opens its transaction.
    ///
    /// # Errors
    ///
    /// An error aborts the delete and reaches the caller unchanged.
    fn before_delete_transaction(&mut self) -> LifecycleResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Runs exactly once after a delete attempt that passed
    /// [`before_delete_transaction`](DomainRecord::before_delete_transaction).
    fn after_delete_transaction(&mut self, _success: bool) {}

    /// Runs inside the transaction before the row is written.
    ///
    /// # Errors
    ///
    /// An error rolls the operation back.
    fn before_save(&mut self, _insert: bool) -> LifecycleResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Runs inside the transaction after the row is written.
    ///
    /// # Errors
    ///
    /// An error rolls the operation back.
    fn after_save(&mut self, _insert: bool) -> LifecycleResult<()> {
        Ok(())
    }

    /// Runs inside the transaction before the row is deleted.
    ///
    /// # Errors
    ///
    /// An error rolls the operation back.
    fn before_delete(&mut self) -> LifecycleResult<Flow> {
        Ok(Flow::Continue)
    }

    /// Runs inside the transaction after the row is deleted.
    ///
    /// # Errors
    ///
    /// An error rolls the operation back.
    fn after_delete(&mut self) -> LifecycleResult<()> {
        Ok(())
    }

    /// Identifies the family of types this one may be cloned into.
    ///
    /// Types that return the same id (and map to the same table) can
    /// re-interpret each other's rows with
    /// [`clone_to`](crate::CloneTo::clone_to).
    fn clone_base() -> TypeId {
        TypeId::of::<Self>()
    }

    /// Copies auxiliary state into a clone.
    fn after_clone_to<T: DomainRecord>(&self, _target: &mut T) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordflow_store::{InMemoryStore, RecordStore};
    use std::sync::Arc;

    const ITEMS: TableSchema = TableSchema::new("items", &["shop", "sku"]);

    fn db() -> Database {
        Database::new(Arc::new(InMemoryStore::new()))
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn new_record_is_all_dirty() {
        let mut record = Record::new(&db());
        assert!(record.is_new_record());
        record.core_mut().set("sku", "A-1");
        assert!(record.is_dirty("sku"));
        assert_eq!(record.dirty_attributes().len(), 1);
    }

    #[test]
    fn hydrated_record_tracks_edits() {
        let mut record = Record::hydrated(
            &db(),
            row(&[("shop", 1.into()), ("sku", "A-1".into()), ("qty", 5.into())]),
            false,
        );
        assert!(!record.is_new_record());
        assert!(record.dirty_attributes().is_empty());

        record.core_mut().set("qty", 4);
        assert_eq!(record.dirty_attributes(), row(&[("qty", 4.into())]));
        assert_eq!(record.old_attribute("qty"), Some(&Value::Integer(5)));
    }

    #[test]
    fn primary_key_uses_baseline_and_alias() {
        let mut record =
            Record::hydrated(&db(), row(&[("shop", 1.into()), ("sku", "A-1".into())]), false);
        record.core_mut().set("sku", "B-2");

        let key = record.primary_key(&ITEMS, None).unwrap();
        assert_eq!(key, row(&[("shop", 1.into()), ("sku", "A-1".into())]));

        let key = record.primary_key(&ITEMS, Some("items")).unwrap();
        assert!(key.contains_key("items.shop"));
        assert!(key.contains_key("items.sku"));
    }

    #[test]
    fn missing_primary_key_is_a_fault() {
        let mut record = Record::new(&db());
        record.core_mut().set("shop", 1);
        let err = record.primary_key(&ITEMS, None).unwrap_err();
        assert_eq!(
            err.config_fault(),
            Some(&ConfigFault::MissingPrimaryKey {
                table: "items".into(),
                column: "sku".into()
            })
        );
    }

    #[test]
    fn locked_merge_keeps_edits() {
        let mut record = Record::hydrated(
            &db(),
            row(&[("sku", "A".into()), ("qty", 5.into()), ("note", "x".into())]),
            false,
        );
        record.core_mut().set("qty", 9);

        let fresh = row(&[("sku", "A".into()), ("qty", 7.into()), ("note", "y".into())]);
        record.merge_locked_row(&fresh, None);

        assert_eq!(record.old_attribute("qty"), Some(&Value::Integer(7)));
        assert_eq!(record.core().get("qty"), Some(&Value::Integer(9)));
        assert_eq!(record.core().get("note"), Some(&Value::from("y")));
        assert_eq!(record.old_attribute("note"), Some(&Value::from("y")));
    }

    #[test]
    fn locked_merge_of_selected_fields() {
        let mut record =
            Record::hydrated(&db(), row(&[("qty", 5.into()), ("note", "x".into())]), false);
        let fresh = row(&[("qty", 7.into()), ("note", "y".into())]);
        record.merge_locked_row(&fresh, Some(&["qty"]));

        assert_eq!(record.core().get("qty"), Some(&Value::Integer(7)));
        assert_eq!(record.core().get("note"), Some(&Value::from("x")));
    }

    #[test]
    fn locked_merge_skips_fields_the_row_lacks() {
        let mut record = Record::hydrated(&db(), row(&[("qty", 5.into())]), false);
        let fresh = row(&[("qty", 7.into())]);
        record.merge_locked_row(&fresh, Some(&["qty", "ghost"]));

        assert_eq!(record.core().get("qty"), Some(&Value::Integer(7)));
        assert_eq!(record.core().get("ghost"), None);
        assert_eq!(record.old_attribute("ghost"), None);
        assert!(!record.is_dirty("ghost"));
    }

    #[test]
    fn snapshot_restore() {
        let db = db();
        db.store().begin_transaction(None).unwrap();
        let mut record = Record::new(&db);
        record.core_mut().set("sku", "A");
        let snapshot = record.snapshot();

        record.core_mut().set("id", 10);
        record.mark_persisted();
        record.set_already_locked_for_update(true);
        assert!(record.already_locked_for_update());

        record.restore(snapshot);
        assert!(record.is_new_record());
        assert!(record.core().get("id").is_none());
        assert!(!record.already_locked_for_update());
    }

    #[test]
    fn lock_flag_ends_with_its_transaction() {
        let db = db();
        let mut record = Record::hydrated(&db, row(&[("sku", "A".into())]), false);

        record.set_already_locked_for_update(true);
        assert!(!record.already_locked_for_update());

        db.store().begin_transaction(None).unwrap();
        record.set_already_locked_for_update(true);
        assert!(record.already_locked_for_update());
        db.store().commit().unwrap();
        assert!(!record.already_locked_for_update());

        db.store().begin_transaction(None).unwrap();
        assert!(!record.already_locked_for_update());
        db.store().rollback().unwrap();
    }
}
