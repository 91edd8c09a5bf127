use std::collections::{BTreeMap, BTreeSet};

use crate::agent::RuntimeError;

/// A value rendered into a `--name=value` argument. Anything outside this
/// set is rejected before it can reach a child's argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArgValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Str(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

/// Uniform argument model for kinds whose CLI takes `--flag`,
/// `--name=value`, and `--config=key=value` overrides. Ordering is
/// deterministic (sorted by name).
#[derive(Debug, Clone, Default)]
pub(crate) struct ArgumentSet {
    flags: BTreeSet<String>,
    values: BTreeMap<String, String>,
    config_overrides: BTreeMap<String, String>,
}

impl ArgumentSet {
    pub fn set_flag(&mut self, name: &str) {
        self.flags.insert(name.to_string());
    }

    pub fn set_value(&mut self, name: &str, value: ArgValue) -> Result<(), RuntimeError> {
        let rendered = render_value(name, value)?;
        self.values.insert(name.to_string(), rendered);
        Ok(())
    }

    pub fn set_config_override(&mut self, key: &str, value: ArgValue) -> Result<(), RuntimeError> {
        let rendered = render_value(key, value)?;
        self.config_overrides.insert(key.to_string(), rendered);
        Ok(())
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for flag in &self.flags {
            args.push(format!("--{flag}"));
        }
        for (name, value) in &self.values {
            args.push(format!("--{name}={value}"));
        }
        for (key, value) in &self.config_overrides {
            args.push(format!("--config={key}={value}"));
        }
        args
    }
}

fn render_value(name: &str, value: ArgValue) -> Result<String, RuntimeError> {
    match value {
        ArgValue::Str(raw) => {
            if raw.trim().is_empty() {
                return Err(RuntimeError::UnsupportedArgument {
                    name: name.to_string(),
                    reason: "empty string".to_string(),
                });
            }
            Ok(raw)
        }
        ArgValue::Bool(true) => Ok("true".to_string()),
        ArgValue::Bool(false) => Ok("false".to_string()),
        ArgValue::Int(number) => Ok(number.to_string()),
    }
}
