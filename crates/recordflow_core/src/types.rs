//! Core type definitions for the lifecycle layer.

use recordflow_store::IsolationLevel;
use std::fmt;

/// Isolation a record type declares for its mutating operations.
///
/// `None` means the lifecycle layer does not wrap the operation in a
/// transaction of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionIsolation {
    /// No lifecycle transaction.
    #[default]
    None,
    /// `READ UNCOMMITTED`.
    ReadUncommitted,
    /// `READ COMMITTED`.
    ReadCommitted,
    /// `REPEATABLE READ`.
    RepeatableRead,
    /// `SERIALIZABLE`.
    Serializable,
}

impl TransactionIsolation {
    /// Returns the store isolation level, or `None` when no transaction is
    /// wanted.
    #[must_use]
    pub const fn level(self) -> Option<IsolationLevel> {
        match self {
            Self::None => None,
            Self::ReadUncommitted => Some(IsolationLevel::ReadUncommitted),
            Self::ReadCommitted => Some(IsolationLevel::ReadCommitted),
            Self::RepeatableRead => Some(IsolationLevel::RepeatableRead),
            Self::Serializable => Some(IsolationLevel::Serializable),
        }
    }

    /// Returns true unless this is [`TransactionIsolation::None`].
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for TransactionIsolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level() {
            Some(level) => fmt::Display::fmt(&level, f),
            None => f.write_str("NONE"),
        }
    }
}

/// A mutating operation on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert of a new record.
    Insert,
    /// Update of a persisted record.
    Update,
    /// Delete of a persisted record.
    Delete,
}

impl Operation {
    /// Returns the lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Insert => 0b001,
            Self::Update => 0b010,
            Self::Delete => 0b100,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`Operation`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperationSet(u8);

impl OperationSet {
    /// No operations.
    pub const NONE: Self = Self(0);
    /// Insert only.
    pub const INSERT: Self = Self(0b001);
    /// Update only.
    pub const UPDATE: Self = Self(0b010);
    /// Delete only.
    pub const DELETE: Self = Self(0b100);
    /// Every operation.
    pub const ALL: Self = Self(0b111);

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if `operation` is in the set.
    #[must_use]
    pub const fn contains(self, operation: Operation) -> bool {
        self.0 & operation.bit() != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// What a hook wants the lifecycle to do next.
///
/// Hard faults are reported through `Err`, not through `Flow`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Flow {
    /// Carry on.
    #[default]
    Continue,
    /// Stop the operation with a `false` outcome.
    Stop {
        /// Message recorded as the last domain error, if any.
        message: Option<String>,
    },
}

impl Flow {
    /// Stops with a message.
    pub fn stop(message: impl Into<String>) -> Self {
        Self::Stop {
            message: Some(message.into()),
        }
    }

    /// Stops without a message of its own.
    #[must_use]
    pub const fn halt() -> Self {
        Self::Stop { message: None }
    }

    /// Returns true for [`Flow::Continue`].
    #[must_use]
    pub const fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Why an operation resolved to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Ordinary validation failure.
    Validation,
    /// A hook stopped the operation.
    Vetoed,
    /// Domain code signalled an expected failure and raised an error.
    Domain,
    /// The store applied nothing (for example a delete of a vanished row).
    NotApplied,
}

/// Result of a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable failure message.
    pub message: Option<String>,
    /// Failure classification.
    pub fault: Option<FaultKind>,
}

impl Outcome {
    /// A successful outcome.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            message: None,
            fault: None,
        }
    }

    /// A failed outcome.
    pub fn failure(fault: FaultKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            fault: Some(fault),
        }
    }

    /// Returns true if the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<&Outcome> for bool {
    fn from(outcome: &Outcome) -> Self {
        outcome.success
    }
}
