//! The model component shared by records and forms.
//!
//! Records and forms both hold a [`ModelCore`] and implement
//! [`DomainModel`]. Everything built on top of that pair (validation
//! escalation, mass assignment, the error/result signal) is provided by
//! blanket extension traits, so both kinds get the same behaviour.

use crate::config::LifecycleConfig;
use crate::error::{ConfigFault, LifecycleResult};
use crate::signal::Signal;
use crate::trust::{single_scenario, SafetyConfig, Scenarios};
use crate::validation::{ErrorBag, RuleSet, Validator};
use recordflow_store::{Row, Value};
use std::any::type_name;
use std::sync::Arc;
use tracing::{debug, error};

/// Attributes plus domain state of one model instance.
#[derive(Debug, Clone)]
pub struct ModelCore {
    attributes: Row,
    last_error: Option<String>,
    errors: ErrorBag,
    config: Arc<LifecycleConfig>,
}

impl Default for ModelCore {
    fn default() -> Self {
        Self::new(Arc::new(LifecycleConfig::default()))
    }
}

impl ModelCore {
    /// Creates an empty model core.
    #[must_use]
    pub fn new(config: Arc<LifecycleConfig>) -> Self {
        Self {
            attributes: Row::new(),
            last_error: None,
            errors: ErrorBag::new(),
            config,
        }
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Sets the value of `field`.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(field.into(), value.into());
    }

    /// Returns every attribute.
    #[must_use]
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub(crate) fn replace_attributes(&mut self, attributes: Row) {
        self.attributes = attributes;
    }

    /// Returns the last domain error.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub(crate) fn set_last_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Forgets the last domain error.
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    /// Returns the validation errors.
    #[must_use]
    pub fn errors(&self) -> &ErrorBag {
        &self.errors
    }

    /// Returns the validation errors for modification.
    pub fn errors_mut(&mut self) -> &mut ErrorBag {
        &mut self.errors
    }

    /// Returns the lifecycle configuration.
    #[must_use]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    fn run_validator(&mut self, validator: &dyn Validator, fields: &[String]) {
        validator.validate(&self.attributes, fields, &mut self.errors);
    }
}

/// A model with declared fields, rules and trust lists.
///
/// Only [`core`](DomainModel::core) and [`core_mut`](DomainModel::core_mut)
/// are required; everything else has a default.
pub trait DomainModel {
    /// Returns the model core.
    fn core(&self) -> &ModelCore;

    /// Returns the model core for modification.
    fn core_mut(&mut self) -> &mut ModelCore;

    /// Validation rules.
    fn rules(&self) -> RuleSet {
        RuleSet::new()
    }

    /// Fields only privileged code may set.
    fn scenarios_backend(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fields external input may set.
    fn scenarios_frontend(&self) -> &'static [&'static str] {
        &[]
    }

    /// Runs when ordinary validation fails.
    ///
    /// Records the configured validation message as the last domain error,
    /// attaching it to the configured field when there is one.
    fn validate_failed_default_behavior(&mut self) {
        let config = self.core().config();
        let message = config.validation_error.clone();
        let attribute = config.validation_error_attribute.clone();
        self.false_with_error(message, attribute.as_deref());
    }
}

/// Operations every [`DomainModel`] gets.
pub trait ModelExt: DomainModel {
    /// Returns the value of `field`.
    fn get(&self, field: &str) -> Option<&Value> {
        self.core().get(field)
    }

    /// Sets `field` directly, regardless of its safety.
    fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.core_mut().set(field, value);
    }

    /// The merged field-safety configuration.
    fn safety_config(&self) -> SafetyConfig {
        SafetyConfig::merge(
            self.scenarios_backend(),
            self.scenarios_frontend(),
            &self.rules().fields(),
        )
    }

    /// Scenario buckets; always exactly one.
    fn scenarios(&self) -> Scenarios {
        single_scenario(self.safety_config())
    }

    /// Validates the model.
    ///
    /// Validates `fields`, or every configured field when `None`. Returns
    /// `Ok(false)` for ordinary validation failures, after running
    /// [`DomainModel::validate_failed_default_behavior`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFault::UntrustedFieldInvalid`] when any backend-only
    /// field fails validation.
    fn validate(&mut self, fields: Option<&[&str]>, clear_errors: bool) -> LifecycleResult<bool> {
        let rules = self.rules();
        let safety = self.safety_config();
        let targets = match fields {
            Some(fields) => fields.iter().map(ToString::to_string).collect(),
            None => safety.active_fields(),
        };

        if clear_errors {
            self.core_mut().errors_mut().clear();
        }
        self.core_mut().run_validator(&rules, &targets);

        let errors = self.core().errors();
        if !errors.has_errors() {
            return Ok(true);
        }

        let tainted: Vec<&str> = safety
            .unsafe_fields()
            .filter(|field| errors.has_errors_on(field))
            .collect();
        if !tainted.is_empty() {
            error!(
                model = type_name::<Self>(),
                fields = ?tainted,
                "validation failed on backend-only fields"
            );
            let errors = errors.to_json()?;
            return Err(ConfigFault::UntrustedFieldInvalid { errors }.into());
        }

        debug!(model = type_name::<Self>(), "validation failed");
        self.validate_failed_default_behavior();
        Ok(false)
    }

    /// Assigns the safe fields of `input` and returns the names it rejected.
    fn load(&mut self, input: &Row) -> Vec<String> {
        let safety = self.safety_config();
        let mut rejected = Vec::new();
        for (field, value) in input {
            if safety.is_safe(field) {
                self.core_mut().set(field.clone(), value.clone());
            } else {
                rejected.push(field.clone());
            }
        }
        if !rejected.is_empty() {
            debug!(
                model = type_name::<Self>(),
                rejected = ?rejected,
                "ignored unsafe attributes in mass assignment"
            );
        }
        rejected
    }

    /// Returns the last domain error.
    fn last_domain_error(&self) -> Option<&str> {
        self.core().last_error()
    }

    /// Returns the last domain error, or the configured default message.
    fn last_domain_error_or_default(&self) -> String {
        let core = self.core();
        core.last_error()
            .map_or_else(|| core.config().default_error.clone(), ToString::to_string)
    }
}

impl<T: DomainModel + ?Sized> ModelExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Rule;

    #[derive(Default)]
    struct Profile {
        core: ModelCore,
    }

    impl DomainModel for Profile {
        fn core(&self) -> &ModelCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ModelCore {
            &mut self.core
        }

        fn rules(&self) -> RuleSet {
            RuleSet::new()
                .rule(Rule::required(["email", "role"]))
                .rule(Rule::max_length(["nick"], 8))
        }

        fn scenarios_backend(&self) -> &'static [&'static str] {
            &["role"]
        }

        fn scenarios_frontend(&self) -> &'static [&'static str] {
            &["email", "nick"]
        }
    }

    #[derive(Default)]
    struct Open {
        core: ModelCore,
    }

    impl DomainModel for Open {
        fn core(&self) -> &ModelCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ModelCore {
            &mut self.core
        }

        fn rules(&self) -> RuleSet {
            RuleSet::new().rule(Rule::required(["title"]))
        }
    }

    #[test]
    fn validation_passes() {
        let mut profile = Profile::default();
        profile.set("email", "a@example.com");
        profile.set("role", "admin");
        assert!(profile.validate(None, true).unwrap());
        assert!(profile.last_domain_error().is_none());
    }

    #[test]
    fn ordinary_failure_records_default_message() {
        let mut profile = Profile::default();
        profile.set("role", "admin");

        assert!(!profile.validate(None, true).unwrap());
        assert_eq!(profile.last_domain_error(), Some("model validation failed"));
        assert!(profile.core().errors().has_errors_on("email"));
    }

    #[test]
    fn backend_failure_is_a_config_fault() {
        let mut profile = Profile::default();
        profile.set("email", "a@example.com");

        let err = profile.validate(None, true).unwrap_err();
        match err.config_fault() {
            Some(ConfigFault::UntrustedFieldInvalid { errors }) => {
                assert_eq!(errors, r#"{"role":["role cannot be blank."]}"#);
            }
            other => panic!("expected untrusted field fault, got {other:?}"),
        }
        assert!(profile.last_domain_error().is_none());
    }

    #[test]
    fn validate_subset_and_keep_errors() {
        let mut profile = Profile::default();
        profile.core_mut().errors_mut().add_error("nick", "taken");

        assert!(!profile.validate(Some(&["email"]), false).unwrap());
        assert!(profile.core().errors().has_errors_on("nick"));
        assert!(profile.core().errors().has_errors_on("email"));
        assert!(!profile.core().errors().has_errors_on("role"));
    }

    #[test]
    fn load_assigns_only_safe_fields() {
        let mut profile = Profile::default();
        let mut input = Row::new();
        input.insert("email".into(), Value::from("x@example.com"));
        input.insert("role".into(), Value::from("admin"));
        input.insert("unknown".into(), Value::from(1));

        let rejected = profile.load(&input);
        assert_eq!(rejected, vec!["role".to_string(), "unknown".to_string()]);
        assert_eq!(profile.get("email"), Some(&Value::from("x@example.com")));
        assert!(profile.get("role").is_none());
    }

    #[test]
    fn undeclared_lists_trust_rule_fields() {
        let mut open = Open::default();
        let scenarios = open.scenarios();
        assert_eq!(scenarios.len(), 1);
        assert!(open.safety_config().is_safe("title"));

        let mut input = Row::new();
        input.insert("title".into(), Value::from("hello"));
        assert!(open.load(&input).is_empty());
        assert!(open.validate(None, true).unwrap());
    }

    #[test]
    fn default_error_fallback() {
        let mut open = Open::default();
        assert_eq!(open.last_domain_error_or_default(), "unknown error");
        open.core_mut().set_last_error("boom");
        assert_eq!(open.last_domain_error_or_default(), "boom");
        open.core_mut().clear_last_error();
        assert!(open.last_domain_error().is_none());
    }

    #[test]
    fn failure_attaches_to_configured_field() {
        let config = LifecycleConfig::new().validation_error_attribute("form");
        let mut open = Open {
            core: ModelCore::new(Arc::new(config)),
        };
        assert!(!open.validate(None, true).unwrap());
        assert_eq!(
            open.core().errors().first_error("form"),
            Some("model validation failed")
        );
    }
}
