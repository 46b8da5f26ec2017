//! Database facade.

use crate::config::LifecycleConfig;
use crate::error::LifecycleResult;
use recordflow_store::{IsolationLevel, RecordStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handle to a record store plus the lifecycle configuration.
///
/// `Database` is cheap to clone; every record holds one so that lifecycle
/// operations can reach the store without extra arguments.
///
/// # Example
///
/// ```rust
/// use recordflow_core::{Database, LifecycleConfig};
/// use recordflow_store::{InMemoryStore, RecordStore};
/// use std::sync::Arc;
///
/// let db = Database::with_config(Arc::new(InMemoryStore::new()), LifecycleConfig::new().debug(true));
/// assert!(db.config().debug);
///
/// let answer = db.transaction(None, |db| {
///     assert!(db.in_transaction());
///     Ok(42)
/// }).unwrap();
/// assert_eq!(answer, 42);
/// assert!(!db.in_transaction());
/// ```
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn RecordStore>,
    config: Arc<LifecycleConfig>,
}

impl Database {
    /// Creates a database with the default configuration.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(store, LifecycleConfig::default())
    }

    /// Creates a database with a custom configuration.
    pub fn with_config(store: Arc<dyn RecordStore>, config: LifecycleConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Returns the record store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Arc<LifecycleConfig> {
        Arc::clone(&self.config)
    }

    /// Returns true while the store has an active transaction.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.store.in_transaction()
    }

    /// Identifies the store's active transaction, or `None` outside one.
    #[must_use]
    pub fn transaction_id(&self) -> Option<u64> {
        self.store.transaction_id()
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok`, rolls back otherwise. Records saved
    /// inside `f` join this transaction instead of opening their own.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a store error if the transaction cannot
    /// be started or committed.
    pub fn transaction<T, F>(&self, isolation: Option<IsolationLevel>, f: F) -> LifecycleResult<T>
    where
        F: FnOnce(&Database) -> LifecycleResult<T>,
    {
        self.store.begin_transaction(isolation)?;
        debug!(isolation = ?isolation, "caller transaction started");

        match f(self) {
            Ok(value) => {
                self.store.commit()?;
                debug!("caller transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.store.rollback() {
                    warn!(error = %rollback, "rollback of caller transaction failed");
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("in_transaction", &self.in_transaction())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
