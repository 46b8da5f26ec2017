//! Lifecycle configuration.

use recordflow_store::IsolationLevel;

/// Message reported when no specific domain error was recorded.
pub const DEFAULT_ERROR: &str = "unknown error";

/// Message recorded when validation fails.
pub const VALIDATION_ERROR: &str = "model validation failed";

/// Configuration shared by every record and form of a [`crate::Database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Message used when nothing more specific was recorded.
    pub default_error: String,

    /// Message recorded by the default validation-failure behaviour.
    pub validation_error: String,

    /// Field the validation message is also attached to, for display.
    pub validation_error_attribute: Option<String>,

    /// Development mode. Turns debug-only warnings into errors.
    pub debug: bool,

    /// Isolation used when a record's own per-operation transaction wraps a
    /// mutation (`None` = store default).
    pub store_transaction_isolation: Option<IsolationLevel>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_error: DEFAULT_ERROR.to_string(),
            validation_error: VALIDATION_ERROR.to_string(),
            validation_error_attribute: None,
            debug: false,
            store_transaction_isolation: None,
        }
    }
}

impl LifecycleConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default error message.
    #[must_use]
    pub fn default_error(mut self, message: impl Into<String>) -> Self {
        self.default_error = message.into();
        self
    }

    /// Sets the validation failure message.
    #[must_use]
    pub fn validation_error(mut self, message: impl Into<String>) -> Self {
        self.validation_error = message.into();
        self
    }

    /// Attaches the validation failure message to `field` as well.
    #[must_use]
    pub fn validation_error_attribute(mut self, field: impl Into<String>) -> Self {
        self.validation_error_attribute = Some(field.into());
        self
    }

    /// Sets development mode.
    #[must_use]
    pub const fn debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    /// Sets the isolation of store-level per-operation transactions.
    #[must_use]
    pub const fn store_transaction_isolation(mut self, level: Option<IsolationLevel>) -> Self {
        self.store_transaction_isolation = level;
        self
    }
}
