//! Shared store type definitions.

use std::fmt;

/// Transaction isolation level understood by the store.
///
/// A store may map these onto whatever its engine supports. The absence of
/// a level (`None` where an `Option<IsolationLevel>` is taken) means "use the
/// store's default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationLevel {
    /// Dirty reads allowed.
    ReadUncommitted,
    /// Only committed data is visible.
    ReadCommitted,
    /// Rows read once stay stable for the transaction.
    RepeatableRead,
    /// Full serializability.
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL spelling of this level.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Row lock requested by a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockMode {
    /// Plain read, no lock.
    #[default]
    None,
    /// Exclusive row lock (`FOR UPDATE`).
    ForUpdate,
    /// Shared row lock (`FOR SHARE`).
    Share,
}

impl LockMode {
    /// Returns the clause appended to a `SELECT`, if any.
    #[must_use]
    pub const fn clause(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::ForUpdate => Some("FOR UPDATE"),
            Self::Share => Some("FOR SHARE"),
        }
    }

    /// Returns true if this mode acquires any lock.
    #[must_use]
    pub const fn is_locking(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.clause().unwrap_or("NONE"))
    }
}

/// Store operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `begin_transaction`.
    Begin,
    /// `commit`.
    Commit,
    /// `rollback`.
    Rollback,
    /// `execute_raw`.
    Query,
    /// `insert`.
    Insert,
    /// `update`.
    Update,
    /// `delete`.
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_clauses() {
        assert_eq!(LockMode::None.clause(), None);
        assert_eq!(LockMode::ForUpdate.clause(), Some("FOR UPDATE"));
        assert_eq!(LockMode::Share.clause(), Some("FOR SHARE"));
        assert!(!LockMode::default().is_locking());
    }

    #[test]
    fn isolation_display() {
        assert_eq!(IsolationLevel::Serializable.to_string(), "SERIALIZABLE");
        assert_eq!(format!("{}", IsolationLevel::ReadCommitted), "READ COMMITTED");
    }
}
