use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::metadata::Metadata;

/// Opaque secret. Each `set` creates a new immutable version.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    /// `None` when the value was not fetched from the vault.
    pub value: Option<String>,
    pub tags: HashMap<String, String>,
    pub metadata: Metadata,
}

impl Secret {
    /// The same secret without its value, as the metadata database stores it.
    pub fn without_value(&self) -> Self {
        Self {
            value: None,
            ..self.clone()
        }
    }
}

// Values are redacted so secrets never end up in logs.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("tags", &self.tags)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_debug_redacts_value() {
        let secret = Secret {
            id: "db-password".into(),
            value: Some("hunter2".into()),
            tags: HashMap::new(),
            metadata: Metadata::new("1", Utc::now()),
        };
        let printed = format!("{secret:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
        assert!(secret.without_value().value.is_none());
    }
}
