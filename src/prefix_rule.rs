use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::ValidationError;

pub const PREFIX_LEN: usize = 3;
pub const IDENTIFIER_LEN: usize = 5;
pub const MAX_TAIL: u16 = 9999;

/// A named base: the fixed head of every code issued under it plus the tail
/// the sequence starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixRule {
    pub name: String,
    pub prefix: String,
    pub identifier: String,
    #[serde(default)]
    pub initial_tail: u16,
}

fn rule_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static pattern"))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

impl PrefixRule {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        identifier: impl Into<String>,
        initial_tail: u16,
    ) -> Result<Self, ValidationError> {
        let rule = PrefixRule {
            name: name.into(),
            prefix: prefix.into(),
            identifier: identifier.into(),
            initial_tail,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_rule_name(&self.name)?;
        if !is_digits(&self.prefix, PREFIX_LEN) {
            return Err(ValidationError::InvalidPrefix(self.prefix.clone()));
        }
        if !is_digits(&self.identifier, IDENTIFIER_LEN) {
            return Err(ValidationError::InvalidIdentifier(self.identifier.clone()));
        }
        if self.initial_tail > MAX_TAIL {
            return Err(ValidationError::InvalidTail(u32::from(self.initial_tail)));
        }
        Ok(())
    }

    /// Prefix followed by identifier; the part of the base code that never moves.
    pub fn head(&self) -> String {
        format!("{}{}", self.prefix, self.identifier)
    }
}

pub fn validate_rule_name(name: &str) -> Result<(), ValidationError> {
    if rule_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidRuleName(name.to_string()))
    }
}
