//! The error/result signal.
//!
//! Helpers that record a domain error on the model and hand back the value
//! the caller should return, so domain code can write
//! `return Ok(self.false_with_error("out of stock", None));`.

use crate::error::{LifecycleError, LifecycleResult};
use crate::model::DomainModel;
use std::any::type_name;
use tracing::{info, warn};

/// Error/result helpers available on every [`DomainModel`].
pub trait Signal: DomainModel {
    /// Records `message` as the last domain error and returns `false`.
    ///
    /// When `attach` names a field, the message is also added to that
    /// field's validation errors.
    fn false_with_error(&mut self, message: impl Into<String>, attach: Option<&str>) -> bool {
        let message = message.into();
        if let Some(field) = attach {
            self.core_mut()
                .errors_mut()
                .add_error(field, message.clone());
        }
        self.core_mut().set_last_error(message);
        false
    }

    /// Records `message` and returns it as a [`LifecycleError::Domain`].
    ///
    /// # Errors
    ///
    /// Always.
    fn false_with_exception<T>(&mut self, message: impl Into<String>) -> LifecycleResult<T> {
        self.false_with_exception_as(message, LifecycleError::domain)
    }

    /// Records `message` and returns the error built by `fault`.
    ///
    /// # Errors
    ///
    /// Always.
    fn false_with_exception_as<T, F>(
        &mut self,
        message: impl Into<String>,
        fault: F,
    ) -> LifecycleResult<T>
    where
        F: FnOnce(String) -> LifecycleError,
    {
        let message = message.into();
        self.core_mut().set_last_error(message.clone());
        Err(fault(message))
    }

    /// Records `message`, logs it as a warning and returns `false`.
    fn false_with_warning(&mut self, message: impl Into<String>, category: Option<&str>) -> bool {
        let message = message.into();
        warn!(
            model = type_name::<Self>(),
            category = category.unwrap_or_default(),
            "{message}"
        );
        self.core_mut().set_last_error(message);
        false
    }

    /// Like [`false_with_warning`](Signal::false_with_warning), but in debug
    /// mode the failure is raised as a domain error.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Domain`] when the configuration has `debug`
    /// set.
    fn false_with_warning_on_debug_exception(
        &mut self,
        message: impl Into<String>,
        category: Option<&str>,
    ) -> LifecycleResult<bool> {
        let message = message.into();
        self.false_with_warning(message.clone(), category);
        if self.core().config().debug {
            return Err(LifecycleError::domain(message));
        }
        Ok(false)
    }

    /// Logs `message` (when given) at info level and returns `true`.
    fn true_with_info(&self, message: Option<&str>, category: Option<&str>) -> bool {
        if let Some(message) = message {
            info!(
                model = type_name::<Self>(),
                category = category.unwrap_or_default(),
                "{message}"
            );
        }
        true
    }
}

impl<T: DomainModel + ?Sized> Signal for T {}
