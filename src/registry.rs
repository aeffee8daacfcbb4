//! Environment registry: the variables every spawned script inherits.
//!
//! The registry is an explicit value owned by the session. Nothing here
//! touches the real process environment except [`EnvRegistry::from_process`],
//! which only reads it.

use crate::core::paths::vars;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("Invalid variable name '{0}': expected NAME=VALUE with a non-empty NAME free of '=' and whitespace")]
    InvalidName(String),
}

/// In-memory NAME → VALUE store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvRegistry {
    vars: BTreeMap<String, String>,
}

impl EnvRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the node variables from the ambient environment, if exported there.
    pub fn from_process() -> Self {
        let mut registry = Self::new();
        for name in vars::NODE {
            if let Ok(value) = std::env::var(name) {
                registry.vars.insert(name.to_string(), value);
            }
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Snapshot of every variable
    pub fn get_all(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Insert or overwrite
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<(), EnvError> {
        let name = name.into();
        validate_name(&name)?;
        self.vars.insert(name, value.into());
        Ok(())
    }

    /// Insert under one of the crate's own variable names
    pub(crate) fn insert(&mut self, name: &'static str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }

    /// Apply a `NAME=VALUE` assignment. Splits on the first `=`; both sides are trimmed.
    pub fn parse_assignment(&mut self, assignment: &str) -> Result<(String, String), EnvError> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| EnvError::InvalidName(assignment.trim().to_string()))?;
        let (name, value) = (name.trim().to_string(), value.trim().to_string());
        self.set(name.clone(), value.clone())?;
        Ok((name, value))
    }

    /// One `NAME=value` line per variable, sorted by name
    pub fn format_for_display(&self) -> String {
        self.vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Like [`format_for_display`](Self::format_for_display) but with the
    /// private key shortened to its first 10 and last 8 characters.
    pub fn format_masked(&self) -> String {
        self.vars
            .iter()
            .map(|(k, v)| match k.as_str() {
                vars::PRIVATE_KEY => format!("{}={}", k, mask(v)),
                _ => format!("{}={}", k, v),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 18 {
        return secret.to_string();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

fn validate_name(name: &str) -> Result<(), EnvError> {
    if name.is_empty() || name.contains('=') || name.chars().any(char::is_whitespace) {
        return Err(EnvError::InvalidName(name.to_string()));
    }
    Ok(())
}
