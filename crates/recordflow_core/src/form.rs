//! Non-persisted models.

use crate::error::{LifecycleError, LifecycleResult};
use crate::model::{DomainModel, ModelExt};
use crate::types::{FaultKind, Flow, Outcome};
use std::any::type_name;
use tracing::debug;

/// A model that is validated and then runs an action instead of being
/// stored.
pub trait DomainForm: DomainModel {
    /// The form's action. Runs only after successful validation.
    ///
    /// # Errors
    ///
    /// Errors reach the caller of [`FormExt::execute`] unchanged.
    fn run(&mut self) -> LifecycleResult<Flow>;
}

/// Execution of every [`DomainForm`].
pub trait FormExt: DomainForm {
    /// Validates the form, then runs it.
    ///
    /// # Errors
    ///
    /// Configuration faults from validation and errors of
    /// [`DomainForm::run`].
    fn execute(&mut self) -> LifecycleResult<Outcome> {
        self.core_mut().clear_last_error();
        if !self.validate(None, true)? {
            return Ok(Outcome::failure(
                FaultKind::Validation,
                self.last_domain_error_or_default(),
            ));
        }
        match self.run()? {
            Flow::Continue => Ok(Outcome::success()),
            Flow::Stop { message } => {
                if let Some(message) = message {
                    self.core_mut().set_last_error(message);
                }
                debug!(form = type_name::<Self>(), "form stopped");
                Ok(Outcome::failure(
                    FaultKind::Vetoed,
                    self.last_domain_error_or_default(),
                ))
            }
        }
    }

    /// Like [`execute`](FormExt::execute), but a failed outcome becomes a
    /// [`LifecycleError::Domain`].
    ///
    /// Without a `message`, the error names the form type.
    ///
    /// # Errors
    ///
    /// Returns a domain error on failure, or any error of `execute`.
    fn execute_or_exception(&mut self, message: Option<&str>) -> LifecycleResult<()> {
        if self.execute()?.is_success() {
            return Ok(());
        }
        let message = match message {
            Some(message) => message.to_string(),
            None => {
                let name = type_name::<Self>();
                let short = name.rsplit("::").next().unwrap_or(name);
                format!("execution failed: {short}")
            }
        };
        Err(LifecycleError::domain(message))
    }
}

impl<T: DomainForm + ?Sized> FormExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelCore;
    use crate::validation::{Rule, RuleSet};

    #[derive(Default)]
    struct Ping {
        core: ModelCore,
        halt: bool,
    }

    impl DomainModel for Ping {
        fn core(&self) -> &ModelCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ModelCore {
            &mut self.core
        }

        fn rules(&self) -> RuleSet {
            RuleSet::new().rule(Rule::required(["host"]))
        }
    }

    impl DomainForm for Ping {
        fn run(&mut self) -> LifecycleResult<Flow> {
            Ok(if self.halt { Flow::halt() } else { Flow::Continue })
        }
    }

    #[test]
    fn halt_without_message_uses_default_error() {
        let mut ping = Ping {
            halt: true,
            ..Ping::default()
        };
        ping.set("host", "localhost");

        let outcome = ping.execute().unwrap();

        assert_eq!(outcome.fault, Some(FaultKind::Vetoed));
        assert_eq!(outcome.message(), Some(crate::config::DEFAULT_ERROR));
    }

    #[test]
    fn default_exception_names_the_form() {
        let mut ping = Ping::default();

        let err = ping.execute_or_exception(None).unwrap_err();

        assert_eq!(err.to_string(), "domain error: execution failed: Ping");
    }
}
