//! The save/delete state machine.
//!
//! ```text
//! PRE_HOOK -> (TX_BEGIN) -> MUTATE -> (TX_COMMIT | TX_ROLLBACK) -> POST_HOOK -> DONE
//! ```
//!
//! The post-hook runs exactly once per attempt that got past the pre-hook,
//! after the commit/rollback decision. When a transaction this module opened
//! is rolled back, the record is first restored to its state before the
//! attempt, so the post-hook never sees keys generated by a discarded
//! insert.

use crate::database::Database;
use crate::error::{ConfigFault, LifecycleResult};
use crate::model::ModelExt;
use crate::persist;
use crate::record::{DomainRecord, RecordSnapshot};
use crate::types::{FaultKind, Flow, Operation, Outcome, TransactionIsolation};
use recordflow_store::IsolationLevel;
use tracing::{debug, error, warn};

/// Which transaction, if any, wraps one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Nothing is opened; the attempt runs bare or inside a caller's
    /// transaction.
    Unwrapped,
    /// The record type's lifecycle transaction.
    Lifecycle(TransactionIsolation),
    /// The record layer's own per-operation transaction.
    Store(Option<IsolationLevel>),
}

impl Scope {
    const fn owns_transaction(self) -> bool {
        !matches!(self, Self::Unwrapped)
    }

    const fn level(self) -> Option<IsolationLevel> {
        match self {
            Self::Unwrapped => None,
            Self::Lifecycle(isolation) => isolation.level(),
            Self::Store(level) => level,
        }
    }
}

fn transaction_scope<T: DomainRecord>(
    entity: &T,
    operation: Operation,
    db: &Database,
) -> LifecycleResult<Scope> {
    let isolation = entity.transaction_isolation();
    if entity.transactions_activate() && isolation.is_enabled() {
        entity.check_transactions_config(operation)?;
        if db.in_transaction() {
            debug!(table = T::TABLE.name, %operation, "joining the active transaction");
            return Ok(Scope::Unwrapped);
        }
        return Ok(Scope::Lifecycle(isolation));
    }
    if entity.store_transactions().contains(operation) && !db.in_transaction() {
        return Ok(Scope::Store(db.config().store_transaction_isolation));
    }
    Ok(Scope::Unwrapped)
}

fn post_hook<T: DomainRecord>(entity: &mut T, operation: Operation, success: bool) {
    match operation {
        Operation::Delete => entity.after_delete_transaction(success),
        Operation::Insert | Operation::Update => entity.after_transaction(success),
    }
}

fn roll_back<T: DomainRecord>(entity: &mut T, db: &Database, operation: Operation, snapshot: RecordSnapshot) {
    if db.in_transaction() {
        match db.store().rollback() {
            Ok(()) => debug!(table = T::TABLE.name, %operation, "transaction rolled back"),
            Err(err) => error!(
                table = T::TABLE.name,
                %operation,
                error = %err,
                "rollback failed"
            ),
        }
    }
    let record = entity.record_mut();
    record.restore(snapshot);
    record.set_already_locked_for_update(false);
}

fn run<T: DomainRecord>(entity: &mut T, operation: Operation) -> LifecycleResult<Outcome> {
    let table = T::TABLE.name;

    let flow = match operation {
        Operation::Delete => entity.before_delete_transaction()?,
        Operation::Insert | Operation::Update => entity.before_transaction()?,
    };
    if let Flow::Stop { message } = flow {
        if let Some(message) = message {
            entity.core_mut().set_last_error(message);
        }
        debug!(table, %operation, "vetoed before the transaction");
        return Ok(Outcome::failure(
            FaultKind::Vetoed,
            entity.last_domain_error_or_default(),
        ));
    }

    let db = entity.record().db().clone();
    let scope = match transaction_scope(entity, operation, &db) {
        Ok(scope) => scope,
        Err(err) => {
            post_hook(entity, operation, false);
            return Err(err);
        }
    };

    let snapshot = entity.record().snapshot();
    if scope.owns_transaction() {
        if let Err(err) = db.store().begin_transaction(scope.level()) {
            error!(table, %operation, error = %err, "transaction could not be started");
            post_hook(entity, operation, false);
            return Err(err.into());
        }
        debug!(table, %operation, scope = ?scope, "transaction started");
    }

    let result = match operation {
        Operation::Insert => persist::insert(entity),
        Operation::Update => persist::update(entity),
        Operation::Delete => persist::delete(entity),
    };

    match result {
        Ok(outcome) if outcome.is_success() => {
            if scope.owns_transaction() {
                if let Err(err) = db.store().commit() {
                    error!(table, %operation, error = %err, "commit failed");
                    roll_back(entity, &db, operation, snapshot);
                    post_hook(entity, operation, false);
                    return Err(err.into());
                }
                entity.record_mut().set_already_locked_for_update(false);
                debug!(table, %operation, "transaction committed");
            }
            post_hook(entity, operation, true);
            Ok(outcome)
        }
        Ok(outcome) => {
            if scope.owns_transaction() {
                roll_back(entity, &db, operation, snapshot);
            }
            post_hook(entity, operation, false);
            Ok(outcome)
        }
        Err(err) => {
            let signalled = entity.last_domain_error().is_some();
            if scope.owns_transaction() {
                roll_back(entity, &db, operation, snapshot);
            }
            post_hook(entity, operation, false);

            if err.is_config_fault() || !signalled {
                warn!(table, %operation, error = %err, "operation failed");
                return Err(err);
            }
            debug!(table, %operation, error = %err, "expected domain failure");
            Ok(Outcome::failure(
                FaultKind::Domain,
                entity.last_domain_error_or_default(),
            ))
        }
    }
}

/// Save and delete with hooks, transactions and outcome reporting.
pub trait Lifecycle: DomainRecord {
    /// Inserts a new record or updates a persisted one.
    ///
    /// With `run_validation`, an ordinary validation failure returns a
    /// [`FaultKind::Validation`] outcome before any hook runs.
    ///
    /// # Errors
    ///
    /// - configuration faults, always
    /// - errors of `before_transaction`
    /// - store errors and hook errors, unless domain code recorded a domain
    ///   error first (then the outcome is [`FaultKind::Domain`])
    fn save(&mut self, run_validation: bool) -> LifecycleResult<Outcome> {
        self.core_mut().clear_last_error();
        if run_validation && !self.validate(None, true)? {
            return Ok(Outcome::failure(
                FaultKind::Validation,
                self.last_domain_error_or_default(),
            ));
        }
        let operation = if self.record().is_new_record() {
            Operation::Insert
        } else {
            Operation::Update
        };
        run(self, operation)
    }

    /// Deletes the record's row.
    ///
    /// Resolves to a [`FaultKind::NotApplied`] outcome when no row was
    /// deleted.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Lifecycle::save).
    fn delete(&mut self) -> LifecycleResult<Outcome> {
        self.core_mut().clear_last_error();
        run(self, Operation::Delete)
    }

    /// Rejects a lifecycle transaction combined with the record layer's own
    /// transaction for the same operation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFault::DoubleTransaction`].
    fn check_transactions_config(&self, operation: Operation) -> LifecycleResult<()> {
        if self.store_transactions().contains(operation) {
            error!(table = Self::TABLE.name, %operation, "double transaction configured");
            return Err(ConfigFault::DoubleTransaction {
                table: Self::TABLE.name.to_string(),
                operation,
            }
            .into());
        }
        Ok(())
    }
}

impl<T: DomainRecord> Lifecycle for T {}
