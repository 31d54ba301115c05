//! # Validation Module
//!
//! Declarative per-field rules written as pipe-separated strings:
//!
//! ```text
//! name  => "required|string|max:40"
//! age   => "integer|min:18"
//! role  => "in:admin,editor"
//! ```
//!
//! Rules run in the order they are listed and stop at the first failure.
//! A rule name nobody registered is itself an error, so a typo never
//! silently passes.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Value is invalid type
    InvalidType,
    /// Value is below minimum
    TooSmall,
    /// Value is above maximum
    TooLarge,
    /// Value is not in allowed set
    InvalidChoice,
    /// Custom validation failed
    Custom,
}

/// A single failed rule for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Rule that failed, without its argument (`min`, not `min:3`)
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
        code: ValidationCode,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
            code,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a single rule check: `Err((code, message))` on failure
pub type RuleOutcome = std::result::Result<(), (ValidationCode, String)>;

/// A rule check: field name, value (if present), rule argument (if any)
pub type RuleFn = Arc<dyn Fn(&str, Option<&Value>, Option<&str>) -> RuleOutcome + Send + Sync>;

/// Rule registry and evaluator
///
/// `Validator::default()` knows `required`, `string`, `integer`, `numeric`,
/// `boolean`, `min`, `max` and `in`. More can be added with [`Validator::rule`].
#[derive(Clone)]
pub struct Validator {
    rules: HashMap<String, RuleFn>,
}

impl Default for Validator {
    fn default() -> Self {
        let mut validator = Self {
            rules: HashMap::new(),
        };
        validator.insert("required", required);
        validator.insert("string", string);
        validator.insert("integer", integer);
        validator.insert("numeric", numeric);
        validator.insert("boolean", boolean);
        validator.insert("min", min);
        validator.insert("max", max);
        validator.insert("in", one_of);
        validator
    }
}

impl Validator {
    /// Validator with the built-in rules
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a rule
    ///
    /// The check returns `true` when the value passes.
    #[must_use]
    pub fn rule<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&str>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let rule_name = name.clone();
        self.insert(name, move |field, value, arg| {
            if check(value, arg) {
                Ok(())
            } else {
                Err((
                    ValidationCode::Custom,
                    format!("The parameter '{field}' failed the '{rule_name}' rule."),
                ))
            }
        });
        self
    }

    /// Check if a rule name is registered
    #[must_use]
    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    fn insert<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&str, Option<&Value>, Option<&str>) -> RuleOutcome + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(check));
    }

    /// Validate fields in declaration order
    ///
    /// `lookup` supplies the value for a field name.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for the first failing rule, or
    /// `Error::UnknownValidationRule` when a rule string names an
    /// unregistered rule.
    pub fn validate<F>(&self, fields: &[(&str, &str)], lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<Value>,
    {
        for &(field, rules) in fields {
            let value = lookup(field);
            for token in rules.split('|').map(str::trim).filter(|t| !t.is_empty()) {
                let (name, arg) = match token.split_once(':') {
                    Some((name, arg)) => (name, Some(arg)),
                    None => (token, None),
                };
                let check = self.rules.get(name).ok_or_else(|| Error::UnknownValidationRule {
                    field: field.to_string(),
                    rule: token.to_string(),
                })?;
                if let Err((code, message)) = check(field, value.as_ref(), arg) {
                    return Err(FieldError::new(field, name, message, code).into());
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("Validator").field("rules", &names).finish()
    }
}

fn fail(code: ValidationCode, message: String) -> RuleOutcome {
    Err((code, message))
}

fn required(field: &str, value: Option<&Value>, _: Option<&str>) -> RuleOutcome {
    match value {
        None | Some(Value::Null) => fail(
            ValidationCode::Required,
            format!("The parameter '{field}' is required."),
        ),
        Some(Value::String(s)) if s.is_empty() => fail(
            ValidationCode::Required,
            format!("The parameter '{field}' is required."),
        ),
        Some(_) => Ok(()),
    }
}

fn string(field: &str, value: Option<&Value>, _: Option<&str>) -> RuleOutcome {
    match value {
        Some(Value::String(_)) => Ok(()),
        _ => fail(
            ValidationCode::InvalidType,
            format!("The parameter '{field}' must be a string."),
        ),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(field: &str, value: Option<&Value>, _: Option<&str>) -> RuleOutcome {
    if value.and_then(as_integer).is_some() {
        Ok(())
    } else {
        fail(
            ValidationCode::InvalidType,
            format!("The parameter '{field}' must be an integer."),
        )
    }
}

fn numeric(field: &str, value: Option<&Value>, _: Option<&str>) -> RuleOutcome {
    if value.and_then(as_number).is_some() {
        Ok(())
    } else {
        fail(
            ValidationCode::InvalidType,
            format!("The parameter '{field}' must be numeric."),
        )
    }
}

fn boolean(field: &str, value: Option<&Value>, _: Option<&str>) -> RuleOutcome {
    let ok = match value {
        Some(Value::Bool(_)) => true,
        Some(Value::Number(n)) => matches!(n.as_i64(), Some(0 | 1)),
        Some(Value::String(s)) => matches!(
            s.to_lowercase().as_str(),
            "true" | "false" | "1" | "0" | "yes" | "no" | "on" | "off"
        ),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        fail(
            ValidationCode::InvalidType,
            format!("The parameter '{field}' must be a boolean."),
        )
    }
}

/// Size used by `min`/`max`: numeric value for numbers, char count for strings
fn measure(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        #[allow(clippy::cast_precision_loss)]
        Value::String(s) => Some(s.chars().count() as f64),
        #[allow(clippy::cast_precision_loss)]
        Value::Array(items) => Some(items.len() as f64),
        _ => None,
    }
}

fn bound(field: &str, rule: &str, arg: Option<&str>) -> std::result::Result<f64, (ValidationCode, String)> {
    arg.and_then(|a| a.trim().parse::<f64>().ok()).ok_or_else(|| {
        (
            ValidationCode::Custom,
            format!("The '{rule}' rule for parameter '{field}' needs a numeric argument."),
        )
    })
}

fn min(field: &str, value: Option<&Value>, arg: Option<&str>) -> RuleOutcome {
    let limit = bound(field, "min", arg)?;
    match measure(value) {
        Some(size) if size >= limit => Ok(()),
        _ => fail(
            ValidationCode::TooSmall,
            format!("The parameter '{field}' must be at least {limit}."),
        ),
    }
}

fn max(field: &str, value: Option<&Value>, arg: Option<&str>) -> RuleOutcome {
    let limit = bound(field, "max", arg)?;
    match measure(value) {
        Some(size) if size <= limit => Ok(()),
        _ => fail(
            ValidationCode::TooLarge,
            format!("The parameter '{field}' may not be greater than {limit}."),
        ),
    }
}

fn one_of(field: &str, value: Option<&Value>, arg: Option<&str>) -> RuleOutcome {
    let text = match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Some(v.to_string()),
        _ => None,
    };
    let allowed = arg.unwrap_or_default();
    match text {
        Some(t) if allowed.split(',').any(|choice| choice.trim() == t) => Ok(()),
        _ => fail(
            ValidationCode::InvalidChoice,
            format!("The parameter '{field}' must be one of: {allowed}."),
        ),
    }
}
