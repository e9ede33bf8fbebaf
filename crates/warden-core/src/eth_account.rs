use std::collections::HashMap;

use ethers_core::types::Address;
use secp256k1::PublicKey;
use serde::Deserialize;
use serde::Serialize;
use warden_errors::Error;
use warden_errors::Result;

use crate::algorithm::Algorithm;
use crate::hash::keccak256;
use crate::key::Key;
use crate::key::hex_bytes;
use crate::metadata::Metadata;

/// Ethereum account view of a secp256k1 key.
///
/// The account and its key stay separate records linked by `key_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthAccount {
    pub key_id: String,
    pub address: Address,
    /// Uncompressed SEC1 encoding (65 bytes, `0x04` prefix).
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    /// Compressed SEC1 encoding (33 bytes).
    #[serde(with = "hex_bytes")]
    pub compressed_public_key: Vec<u8>,
    pub tags: HashMap<String, String>,
    pub metadata: Metadata,
}

impl EthAccount {
    /// Derive the account from a freshly created or imported key.
    pub fn from_key(key: &Key) -> Result<Self> {
        if key.algorithm != Algorithm::ethereum() {
            return Err(Error::invalid_parameter(format!(
                "key '{}' uses {}, ethereum accounts require {}",
                key.id,
                key.algorithm,
                Algorithm::ethereum()
            )));
        }

        let public_key = parse_public_key(&key.public_key)?;
        let uncompressed = public_key.serialize_uncompressed();

        Ok(Self {
            key_id: key.id.clone(),
            address: address_from_uncompressed(&uncompressed),
            public_key: uncompressed.to_vec(),
            compressed_public_key: public_key.serialize().to_vec(),
            tags: key.tags.clone(),
            metadata: key.metadata.clone(),
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.metadata.disabled
    }
}

/// Address of a secp256k1 public key in compressed or uncompressed form.
pub fn address_from_public_key(public_key: &[u8]) -> Result<Address> {
    let public_key = parse_public_key(public_key)?;
    Ok(address_from_uncompressed(&public_key.serialize_uncompressed()))
}

fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_slice(bytes)
        .map_err(|e| Error::invalid_parameter(format!("invalid secp256k1 public key: {e}")))
}

fn address_from_uncompressed(uncompressed: &[u8; 65]) -> Address {
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use secp256k1::Secp256k1;
    use secp256k1::SecretKey;

    use super::*;
    use crate::algorithm::EllipticCurve;
    use crate::algorithm::KeyType;

    // Private key 0x...01 maps to a well-known address.
    fn generator_key() -> Key {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let secret = SecretKey::from_slice(&bytes).unwrap();
        let public = secret.public_key(&Secp256k1::new());
        Key {
            id: "gen".into(),
            public_key: public.serialize_uncompressed().to_vec(),
            algorithm: Algorithm::ethereum(),
            tags: HashMap::from([("env".to_string(), "test".to_string())]),
            metadata: Metadata::new("1", Utc::now()),
        }
    }

    #[test]
    fn test_address_derivation() {
        let account = EthAccount::from_key(&generator_key()).unwrap();
        let expected = Address::from_str("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").unwrap();
        assert_eq!(account.address, expected);
        assert_eq!(account.public_key.len(), 65);
        assert_eq!(account.compressed_public_key.len(), 33);
        assert_eq!(account.key_id, "gen");
        assert_eq!(account.tags.get("env").map(String::as_str), Some("test"));
    }

    #[test]
    fn test_compressed_and_uncompressed_agree() {
        let account = EthAccount::from_key(&generator_key()).unwrap();
        assert_eq!(address_from_public_key(&account.compressed_public_key).unwrap(), account.address);
    }

    #[test]
    fn test_rejects_non_ethereum_key() {
        let mut key = generator_key();
        key.algorithm = Algorithm::new(KeyType::Eddsa, EllipticCurve::Ed25519);
        assert!(EthAccount::from_key(&key).unwrap_err().is_invalid_parameter());

        let mut key = generator_key();
        key.public_key = vec![1, 2, 3];
        assert!(EthAccount::from_key(&key).unwrap_err().is_invalid_parameter());
    }
}
