//! Attribute trust partitioning.
//!
//! A model type declares two field lists: backend fields, which only
//! privileged code may set, and frontend fields, which external input may
//! set. [`SafetyConfig::merge`] folds them into the single configuration the
//! validator and mass assignment work from.

use std::collections::BTreeMap;

/// Name of the only scenario a model has.
pub const DEFAULT_SCENARIO: &str = "default";

/// Whether a field may be assigned from untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Safety {
    /// Frontend field: mass assignment allowed.
    Safe,
    /// Backend-only field: set by privileged code only.
    Unsafe,
}

/// A field with its safety tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldSafety {
    /// Field name.
    pub field: String,
    /// Safety tag.
    pub safety: Safety,
}

/// The merged field-safety configuration of a model type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SafetyConfig {
    fields: Vec<FieldSafety>,
}

impl SafetyConfig {
    /// Merges backend and frontend declarations.
    ///
    /// Backend-only fields come first, tagged [`Safety::Unsafe`]. Frontend
    /// fields follow, tagged [`Safety::Safe`]; a field declared in both lists
    /// is safe. When both lists are empty every field in `rule_fields` is
    /// safe.
    #[must_use]
    pub fn merge<B, F>(backend: &[B], frontend: &[F], rule_fields: &[String]) -> Self
    where
        B: AsRef<str>,
        F: AsRef<str>,
    {
        let mut config = Self::default();

        if backend.is_empty() && frontend.is_empty() {
            for field in rule_fields {
                config.push(field, Safety::Safe);
            }
            return config;
        }

        let frontend: Vec<&str> = frontend.iter().map(AsRef::as_ref).collect();
        for field in backend.iter().map(AsRef::as_ref) {
            if !frontend.contains(&field) {
                config.push(field, Safety::Unsafe);
            }
        }
        for field in frontend {
            config.push(field, Safety::Safe);
        }
        config
    }

    fn push(&mut self, field: &str, safety: Safety) {
        if self.safety_of(field).is_none() {
            self.fields.push(FieldSafety {
                field: field.to_string(),
                safety,
            });
        }
    }

    /// Every field with its tag, in merge order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSafety] {
        &self.fields
    }

    /// Names of every field, in merge order.
    #[must_use]
    pub fn active_fields(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.field.clone()).collect()
    }

    /// Names of the safe fields.
    pub fn safe_fields(&self) -> impl Iterator<Item = &str> {
        self.with_safety(Safety::Safe)
    }

    /// Names of the backend-only fields.
    pub fn unsafe_fields(&self) -> impl Iterator<Item = &str> {
        self.with_safety(Safety::Unsafe)
    }

    fn with_safety(&self, safety: Safety) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |f| f.safety == safety)
            .map(|f| f.field.as_str())
    }

    /// Returns the tag of `field`, if the field is configured.
    #[must_use]
    pub fn safety_of(&self, field: &str) -> Option<Safety> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.safety)
    }

    /// Returns true if `field` may be mass-assigned.
    #[must_use]
    pub fn is_safe(&self, field: &str) -> bool {
        self.safety_of(field) == Some(Safety::Safe)
    }

    /// Returns true if no field is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Scenario buckets of a model. There is always exactly one.
pub type Scenarios = BTreeMap<&'static str, SafetyConfig>;

/// Wraps a configuration as the single [`DEFAULT_SCENARIO`] bucket.
#[must_use]
pub fn single_scenario(config: SafetyConfig) -> Scenarios {
    let mut scenarios = Scenarios::new();
    scenarios.insert(DEFAULT_SCENARIO, config);
    scenarios
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    const NONE: &[&str] = &[];

    #[test]
    fn backend_fields_are_unsafe_and_listed_first() {
        let config = SafetyConfig::merge(&["internal_flag"], &["email", "name"], &[]);
        assert_eq!(
            config.active_fields(),
            vec!["internal_flag", "email", "name"]
        );
        assert_eq!(config.safety_of("internal_flag"), Some(Safety::Unsafe));
        assert!(config.is_safe("email"));
        assert_eq!(config.unsafe_fields().collect::<Vec<_>>(), vec!["internal_flag"]);
    }

    #[test]
    fn frontend_wins_on_conflict() {
        let config = SafetyConfig::merge(&["email", "role"], &["email"], &[]);
        assert!(config.is_safe("email"));
        assert_eq!(config.unsafe_fields().collect::<Vec<_>>(), vec!["role"]);
        assert_eq!(config.fields().len(), 2);
    }

    #[test]
    fn empty_declarations_fall_back_to_rule_fields() {
        let rules = vec!["email".to_string(), "name".to_string()];
        let config = SafetyConfig::merge(NONE, NONE, &rules);
        assert_eq!(config.safe_fields().collect::<Vec<_>>(), vec!["email", "name"]);
        assert_eq!(config.unsafe_fields().count(), 0);

        let config = SafetyConfig::merge(NONE, &["bio"], &rules);
        assert_eq!(config.active_fields(), vec!["bio"]);
    }

    #[test]
    fn duplicates_collapse() {
        let config = SafetyConfig::merge(&["a", "a"], &["b", "b"], &[]);
        assert_eq!(config.active_fields(), vec!["a", "b"]);
    }

    #[test]
    fn single_bucket() {
        let scenarios = single_scenario(SafetyConfig::default());
        assert_eq!(scenarios.len(), 1);
        assert!(scenarios.contains_key(DEFAULT_SCENARIO));
    }

    proptest! {
        #[test]
        fn shared_fields_are_never_unsafe(
            backend in vec("[a-e]", 0..6),
            frontend in vec("[a-e]", 0..6),
        ) {
            let config = SafetyConfig::merge(backend.as_slice(), frontend.as_slice(), &[]);
            for field in config.unsafe_fields() {
                prop_assert!(!frontend.iter().any(|f| f == field));
                prop_assert!(backend.iter().any(|b| b == field));
            }
            for field in &frontend {
                prop_assert!(config.is_safe(field));
            }
        }
    }
}
