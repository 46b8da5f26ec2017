//! A small declarative rule engine.

use super::{ErrorBag, Validator};
use recordflow_store::{Row, Value};
use std::fmt;
use std::sync::Arc;

/// Check run by a [`Rule::custom`] rule. Returns an error message on failure.
pub type CustomCheck = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

#[derive(Clone)]
enum Check {
    Required,
    MaxLength(usize),
    Integer,
    OneOf(Vec<Value>),
    Custom(CustomCheck),
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::MaxLength(max) => f.debug_tuple("MaxLength").field(max).finish(),
            Self::Integer => f.write_str("Integer"),
            Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One validation rule bound to a list of fields.
///
/// Every rule except `required` and `custom` skips blank values.
#[derive(Debug, Clone)]
pub struct Rule {
    fields: Vec<String>,
    check: Check,
}

fn field_list<I, S>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(Into::into).collect()
}

impl Rule {
    /// The fields must not be blank.
    pub fn required<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: field_list(fields),
            check: Check::Required,
        }
    }

    /// Text fields must have at most `max` characters.
    pub fn max_length<I, S>(fields: I, max: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: field_list(fields),
            check: Check::MaxLength(max),
        }
    }

    /// The fields must be integers, or text that parses as one.
    pub fn integer<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: field_list(fields),
            check: Check::Integer,
        }
    }

    /// The fields must equal one of `values`.
    pub fn one_of<I, S, V>(fields: I, values: impl IntoIterator<Item = V>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: field_list(fields),
            check: Check::OneOf(values.into_iter().map(Into::into).collect()),
        }
    }

    /// The fields must pass `check`.
    pub fn custom<I, S, F>(fields: I, check: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            fields: field_list(fields),
            check: Check::Custom(Arc::new(check)),
        }
    }

    /// The fields this rule applies to.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn apply(&self, field: &str, value: &Value) -> Option<String> {
        match &self.check {
            Check::Required => value
                .is_blank()
                .then(|| format!("{field} cannot be blank.")),
            Check::Custom(check) => check(value),
            _ if value.is_blank() => None,
            Check::MaxLength(max) => match value {
                Value::Text(text) if text.chars().count() > *max => Some(format!(
                    "{field} should contain at most {max} characters."
                )),
                Value::Text(_) => None,
                _ => Some(format!("{field} must be a string.")),
            },
            Check::Integer => {
                let ok = match value {
                    Value::Integer(_) => true,
                    Value::Text(text) => text.trim().parse::<i64>().is_ok(),
                    _ => false,
                };
                (!ok).then(|| format!("{field} must be an integer."))
            }
            Check::OneOf(values) => {
                (!values.contains(value)).then(|| format!("{field} is invalid."))
            }
        }
    }
}

/// An ordered list of [`Rule`]s.
///
/// # Example
///
/// ```rust
/// use recordflow_core::validation::{ErrorBag, Rule, RuleSet, Validator};
/// use recordflow_store::{Row, Value};
///
/// let rules = RuleSet::new()
///     .rule(Rule::required(["email"]))
///     .rule(Rule::max_length(["email"], 5));
///
/// let mut row = Row::new();
/// row.insert("email".into(), Value::from("someone@example.com"));
///
/// let mut errors = ErrorBag::new();
/// rules.validate(&row, &["email".to_string()], &mut errors);
/// assert_eq!(errors.first_error("email"), Some("email should contain at most 5 characters."));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends a rule in place.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over the rules.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

impl Validator for RuleSet {
    fn validate(&self, attributes: &Row, fields: &[String], errors: &mut ErrorBag) {
        for rule in &self.rules {
            for field in rule.fields.iter().filter(|f| fields.contains(*f)) {
                let value = attributes.get(field).unwrap_or(&Value::Null);
                if let Some(message) = rule.apply(field, value) {
                    errors.add_error(field.clone(), message);
                }
            }
        }
    }

    fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in self.rules.iter().flat_map(|rule| rule.fields.iter()) {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn names(fields: &[&str]) -> Vec<String> {
        fields.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn required_rejects_blank_and_missing() {
        let rules = RuleSet::new().rule(Rule::required(["email", "name"]));
        let mut errors = ErrorBag::new();
        rules.validate(
            &row(&[("email", Value::from("  "))]),
            &names(&["email", "name"]),
            &mut errors,
        );

        assert_eq!(errors.first_error("email"), Some("email cannot be blank."));
        assert_eq!(errors.first_error("name"), Some("name cannot be blank."));
    }

    #[test]
    fn only_requested_fields_are_checked() {
        let rules = RuleSet::new().rule(Rule::required(["email", "name"]));
        let mut errors = ErrorBag::new();
        rules.validate(&Row::new(), &names(&["name"]), &mut errors);

        assert!(!errors.has_errors_on("email"));
        assert!(errors.has_errors_on("name"));
    }

    #[test]
    fn non_required_rules_skip_blank_values() {
        let rules = RuleSet::new()
            .rule(Rule::integer(["age"]))
            .rule(Rule::max_length(["nick"], 3))
            .rule(Rule::one_of(["role"], ["admin", "user"]));
        let mut errors = ErrorBag::new();
        rules.validate(&Row::new(), &names(&["age", "nick", "role"]), &mut errors);
        assert!(!errors.has_errors());
    }

    #[test]
    fn value_checks() {
        let rules = RuleSet::new()
            .rule(Rule::integer(["age"]))
            .rule(Rule::max_length(["nick"], 3))
            .rule(Rule::one_of(["role"], ["admin", "user"]));
        let attributes = row(&[
            ("age", Value::from("12x")),
            ("nick", Value::from("abcd")),
            ("role", Value::from("root")),
        ]);
        let mut errors = ErrorBag::new();
        rules.validate(&attributes, &names(&["age", "nick", "role"]), &mut errors);

        assert_eq!(errors.first_error("age"), Some("age must be an integer."));
        assert_eq!(
            errors.first_error("nick"),
            Some("nick should contain at most 3 characters.")
        );
        assert_eq!(errors.first_error("role"), Some("role is invalid."));

        let mut errors = ErrorBag::new();
        rules.validate(
            &row(&[("age", Value::from(" 42 ")), ("role", Value::from("user"))]),
            &names(&["age", "role"]),
            &mut errors,
        );
        assert!(!errors.has_errors());
    }

    #[test]
    fn custom_rules_see_every_value() {
        let rules = RuleSet::new().rule(Rule::custom(["code"], |value| {
            (!value.is_null()).then(|| "code must stay empty".to_string())
        }));
        let mut errors = ErrorBag::new();
        rules.validate(&row(&[("code", Value::Integer(1))]), &names(&["code"]), &mut errors);
        assert_eq!(errors.first_error("code"), Some("code must stay empty"));
    }

    #[test]
    fn fields_are_unique_in_declaration_order() {
        let rules = RuleSet::new()
            .rule(Rule::required(["email", "name"]))
            .rule(Rule::max_length(["name", "bio"], 10));
        assert_eq!(rules.fields(), names(&["email", "name", "bio"]));
    }
}
