//! Service identifiers.
//!
//! Identifiers name proxy variables (`$s…`), upstream groups and stream file
//! names. Both namespaces are global to the proxy process, so identifiers
//! must be unique across every service, not just within a domain.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ControlError, ControlResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Generate a fresh identifier from a random v4 UUID.
    pub fn generate() -> Self {
        Self(format!("s{}", Uuid::new_v4().simple()))
    }

    /// Accept `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn parse(value: &str) -> ControlResult<Self> {
        let mut chars = value.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(ControlError::validation(
                "identifier",
                format!("`{value}` is not a valid identifier"),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = ControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
