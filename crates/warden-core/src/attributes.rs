//! Creation/update attributes.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Capability requested for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoOperation {
    Signing,
    Encryption,
}

/// Soft-delete retention requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recovery {
    /// How long a deleted entity stays restorable.
    pub retention: Duration,
}

/// Input-only attributes for create, import, set and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default)]
    pub operations: Vec<CryptoOperation>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub ttl: Option<Duration>,
    #[serde(default)]
    pub recovery: Option<Recovery>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_operation(mut self, operation: CryptoOperation) -> Self {
        if !self.operations.contains(&operation) {
            self.operations.push(operation);
        }
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_recovery(mut self, retention: Duration) -> Self {
        self.recovery = Some(Recovery { retention });
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}
