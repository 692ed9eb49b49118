//! Incident tags.
//!
//! A tag is a `key=value` label. The key is restricted to lowercase ascii
//! letters, digits and underscores; the value is any non-empty text and may
//! itself contain `=`.

use super::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Separator between tag key and value.
pub const TAG_DELIMITER: char = '=';

static TAG_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid tag key regex"));

/// One `key=value` label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Builds a tag from separate key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        let value = value.into();
        validate_key(&key, &value)?;
        if value.is_empty() {
            return Err(ValidationError::InvalidTag {
                tag: format!("{key}{TAG_DELIMITER}{value}"),
                reason: "value cannot be empty",
            });
        }
        Ok(Self { key, value })
    }

    /// Parses `key=value`, splitting on the first delimiter.
    pub fn parse(tag: &str) -> Result<Self, ValidationError> {
        let Some((key, value)) = tag.split_once(TAG_DELIMITER) else {
            return Err(ValidationError::InvalidTag {
                tag: tag.to_string(),
                reason: "expected `key=value`",
            });
        };
        Self::new(key, value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

fn validate_key(key: &str, value: &str) -> Result<(), ValidationError> {
    if TAG_KEY_RE.is_match(key) {
        return Ok(());
    }
    Err(ValidationError::InvalidTag {
        tag: format!("{key}{TAG_DELIMITER}{value}"),
        reason: "key must consist of lowercase letters, digits and underscores",
    })
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{TAG_DELIMITER}{}", self.key, self.value)
    }
}

impl FromStr for Tag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.to_string()
    }
}
