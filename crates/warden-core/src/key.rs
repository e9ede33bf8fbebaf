use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::algorithm::Algorithm;
use crate::metadata::Metadata;

/// Asymmetric key. The private half never leaves the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub id: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    pub algorithm: Algorithm,
    pub tags: HashMap<String, String>,
    pub metadata: Metadata,
}

impl Key {
    pub fn is_disabled(&self) -> bool {
        self.metadata.disabled
    }
}

pub(crate) mod hex_bytes {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
