//! Externally-visible entity identifiers.

use core::str::FromStr;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Length of generated ids.
pub const ID_LEN: usize = 11;

/// Opaque entity identifier.
///
/// Generated once at creation and never reused. Ids arriving from the wire are
/// accepted as-is as long as they can be embedded in a hyperlink path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh 11-character alphanumeric id (`[0-9A-Za-z]`).
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DomainError::invalid_id("EntityId: empty"));
        }
        if s.chars().any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace()) {
            return Err(DomainError::invalid_id(format!("EntityId: {s:?} is not a path segment")));
        }
        Ok(Self(s.to_string()))
    }
}
