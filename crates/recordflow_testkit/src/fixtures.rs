//! Test fixtures and database helpers.
//!
//! Provides an in-memory database, a record type whose transaction settings
//! and hook behavior are configurable per test, a clone target sharing its
//! table, and a small form.

use recordflow_core::prelude::*;
use recordflow_store::{InMemoryStore, LockMode, RecordStore, Row, StoreError, StoreEvent, Value};
use std::any::TypeId;
use std::sync::Arc;

/// Table of [`Member`] and [`MemberSummary`].
pub const MEMBERS: TableSchema = TableSchema::new("members", &["id"]).auto_increment("id");

/// Creates an in-memory store with the fixture tables and a database on it.
pub fn test_db() -> (Arc<InMemoryStore>, Database) {
    test_db_with_config(LifecycleConfig::default())
}

/// Like [`test_db`], with a custom configuration.
pub fn test_db_with_config(config: LifecycleConfig) -> (Arc<InMemoryStore>, Database) {
    let store = Arc::new(InMemoryStore::with_tables([MEMBERS.table_def()]));
    let db = Database::with_config(store.clone(), config);
    (store, db)
}

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .collect()
}

/// Inserts a member row directly through the store and returns its id.
pub fn seed_member(store: &InMemoryStore, email: &str, name: &str) -> i64 {
    let generated = store
        .insert("members", &row([("email", email), ("name", name)]))
        .expect("Failed to seed member");
    generated
        .get("id")
        .and_then(Value::as_i64)
        .expect("Seeded member has no id")
}

/// Number of `FOR UPDATE` queries the store has seen.
pub fn locked_queries(store: &InMemoryStore) -> usize {
    store
        .events()
        .iter()
        .filter(|event| {
            matches!(
                event,
                StoreEvent::Query {
                    lock: LockMode::ForUpdate,
                    ..
                }
            )
        })
        .count()
}

/// Begin, commit and rollback events, in order.
pub fn transaction_events(store: &InMemoryStore) -> Vec<StoreEvent> {
    store
        .events()
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                StoreEvent::Begin { .. } | StoreEvent::Commit | StoreEvent::Rollback
            )
        })
        .collect()
}

/// How [`Member::after_save`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterSaveFailure {
    /// Returns an error without recording a domain error.
    Unexpected,
    /// Records the message through the signal helpers, then fails.
    Signalled(String),
}

/// Per-test knobs of a [`Member`].
#[derive(Debug, Clone)]
pub struct MemberBehavior {
    /// Lifecycle transaction isolation.
    pub isolation: TransactionIsolation,
    /// Lifecycle transaction master switch.
    pub transactions_activate: bool,
    /// Operations wrapped by the record layer's own transaction.
    pub store_transactions: OperationSet,
    /// Stops the save in `before_transaction` with this message.
    pub veto_before_transaction: Option<String>,
    /// Stops the delete in `before_delete_transaction` with this message.
    pub veto_before_delete_transaction: Option<String>,
    /// Stops the save in `before_save` with this message.
    pub veto_before_save: Option<String>,
    /// Makes `after_save` fail.
    pub after_save_failure: Option<AfterSaveFailure>,
    /// Calls `refresh_for_update` from `before_save` on updates.
    pub refresh_in_before_save: bool,
    /// Makes `internal_flag` required.
    pub strict_internal_flag: bool,
    /// Reports this message from `after_transaction(false)`.
    pub failure_notice: Option<String>,
}

impl Default for MemberBehavior {
    fn default() -> Self {
        Self {
            isolation: TransactionIsolation::None,
            transactions_activate: true,
            store_transactions: OperationSet::NONE,
            veto_before_transaction: None,
            veto_before_delete_transaction: None,
            veto_before_save: None,
            after_save_failure: None,
            refresh_in_before_save: false,
            strict_internal_flag: false,
            failure_notice: None,
        }
    }
}

impl MemberBehavior {
    /// Behavior with the given lifecycle isolation.
    pub fn isolated(isolation: TransactionIsolation) -> Self {
        Self {
            isolation,
            ..Self::default()
        }
    }
}

/// A record of the `members` table that logs every hook it runs.
///
/// `email` and `name` are frontend fields; `internal_flag` is backend-only.
#[derive(Debug, Clone)]
pub struct Member {
    record: Record,
    /// Hook behavior.
    pub behavior: MemberBehavior,
    /// Hooks in the order they ran, e.g. `after_transaction(true)`.
    pub hooks: Vec<String>,
    /// `is_new_record` as seen by the last post-transaction hook.
    pub observed_new_in_post_hook: Option<bool>,
}

impl Member {
    /// A new member with default behavior.
    pub fn new(db: &Database) -> Self {
        Self::from_record(Record::new(db))
    }

    /// A new member with `behavior`.
    pub fn with_behavior(db: &Database, behavior: MemberBehavior) -> Self {
        let mut member = Self::new(db);
        member.behavior = behavior;
        member
    }

    /// The member's id, once it has one.
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(Value::as_i64)
    }

    fn log(&mut self, hook: impl Into<String>) {
        self.hooks.push(hook.into());
    }
}

impl DomainModel for Member {
    fn core(&self) -> &ModelCore {
        self.record.core()
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        self.record.core_mut()
    }

    fn rules(&self) -> RuleSet {
        let rules = RuleSet::new()
            .rule(Rule::required(["email"]))
            .rule(Rule::max_length(["name"], 40));
        if self.behavior.strict_internal_flag {
            rules.rule(Rule::required(["internal_flag"]))
        } else {
            rules.rule(Rule::integer(["internal_flag"]))
        }
    }

    fn scenarios_backend(&self) -> &'static [&'static str] {
        &["internal_flag"]
    }

    fn scenarios_frontend(&self) -> &'static [&'static str] {
        &["email", "name"]
    }
}

impl DomainRecord for Member {
    const TABLE: TableSchema = MEMBERS;

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn from_record(record: Record) -> Self {
        Self {
            record,
            behavior: MemberBehavior::default(),
            hooks: Vec::new(),
            observed_new_in_post_hook: None,
        }
    }

    fn transaction_isolation(&self) -> TransactionIsolation {
        self.behavior.isolation
    }

    fn transactions_activate(&self) -> bool {
        self.behavior.transactions_activate
    }

    fn store_transactions(&self) -> OperationSet {
        self.behavior.store_transactions
    }

    fn before_transaction(&mut self) -> LifecycleResult<Flow> {
        self.log("before_transaction");
        Ok(match self.behavior.veto_before_transaction.clone() {
            Some(message) => Flow::stop(message),
            None => Flow::Continue,
        })
    }

    fn after_transaction(&mut self, success: bool) {
        self.log(format!("after_transaction({success})"));
        self.observed_new_in_post_hook = Some(self.record.is_new_record());
        if let (false, Some(notice)) = (success, self.behavior.failure_notice.clone()) {
            self.false_with_error(notice, None);
        }
    }

    fn before_delete_transaction(&mut self) -> LifecycleResult<Flow> {
        self.log("before_delete_transaction");
        Ok(match self.behavior.veto_before_delete_transaction.clone() {
            Some(message) => Flow::stop(message),
            None => Flow::Continue,
        })
    }

    fn after_delete_transaction(&mut self, success: bool) {
        self.log(format!("after_delete_transaction({success})"));
        self.observed_new_in_post_hook = Some(self.record.is_new_record());
    }

    fn before_save(&mut self, insert: bool) -> LifecycleResult<Flow> {
        self.log(format!("before_save({insert})"));
        if self.behavior.refresh_in_before_save && !insert {
            let refreshed = self.refresh_for_update(None, false)?;
            self.log(format!("refreshed({refreshed})"));
        }
        Ok(match self.behavior.veto_before_save.clone() {
            Some(message) => Flow::stop(message),
            None => Flow::Continue,
        })
    }

    fn after_save(&mut self, insert: bool) -> LifecycleResult<()> {
        self.log(format!("after_save({insert})"));
        match self.behavior.after_save_failure.clone() {
            None => Ok(()),
            Some(AfterSaveFailure::Unexpected) => {
                Err(StoreError::unsupported("audit sink offline").into())
            }
            Some(AfterSaveFailure::Signalled(message)) => self.false_with_exception(message),
        }
    }

    fn before_delete(&mut self) -> LifecycleResult<Flow> {
        self.log("before_delete");
        Ok(Flow::Continue)
    }

    fn after_delete(&mut self) -> LifecycleResult<()> {
        self.log("after_delete");
        Ok(())
    }
}

/// A read-side view of the `members` table that [`Member`] can be cloned
/// into.
#[derive(Debug, Clone)]
pub struct MemberSummary {
    record: Record,
}

impl DomainModel for MemberSummary {
    fn core(&self) -> &ModelCore {
        self.record.core()
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        self.record.core_mut()
    }

    fn scenarios_frontend(&self) -> &'static [&'static str] {
        &["name"]
    }
}

impl DomainRecord for MemberSummary {
    const TABLE: TableSchema = MEMBERS;

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn from_record(record: Record) -> Self {
        Self { record }
    }

    fn clone_base() -> TypeId {
        TypeId::of::<Member>()
    }
}

/// Address that [`SignupForm`] treats as already registered.
pub const TAKEN_EMAIL: &str = "taken@example.com";

/// A form that "registers" an email address.
#[derive(Debug, Default)]
pub struct SignupForm {
    core: ModelCore,
    /// Number of times the action ran.
    pub runs: usize,
}

impl DomainModel for SignupForm {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn rules(&self) -> RuleSet {
        RuleSet::new()
            .rule(Rule::required(["email"]))
            .rule(Rule::integer(["invited_by"]))
    }

    fn scenarios_backend(&self) -> &'static [&'static str] {
        &["invited_by"]
    }

    fn scenarios_frontend(&self) -> &'static [&'static str] {
        &["email"]
    }
}

impl DomainForm for SignupForm {
    fn run(&mut self) -> LifecycleResult<Flow> {
        self.runs += 1;
        if self.get("email").and_then(Value::as_str) == Some(TAKEN_EMAIL) {
            return Ok(Flow::stop("email already registered"));
        }
        Ok(Flow::Continue)
    }
}
