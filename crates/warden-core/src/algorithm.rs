//! Key algorithms.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use warden_errors::Error;
use warden_errors::Result;

/// Signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Ecdsa,
    Eddsa,
}

/// Curve the scheme operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EllipticCurve {
    Secp256k1,
    Babyjubjub,
    Bn254,
    Ed25519,
}

/// Algorithm of a key. Fixed for the lifetime of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Algorithm {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    #[serde(rename = "curve")]
    pub curve: EllipticCurve,
}

impl Algorithm {
    pub const fn new(key_type: KeyType, curve: EllipticCurve) -> Self {
        Self { key_type, curve }
    }

    /// ECDSA over secp256k1, the only algorithm Ethereum accounts use.
    pub const fn ethereum() -> Self {
        Self::new(KeyType::Ecdsa, EllipticCurve::Secp256k1)
    }

    pub const fn ed25519() -> Self {
        Self::new(KeyType::Eddsa, EllipticCurve::Ed25519)
    }

    pub const fn is_supported(&self) -> bool {
        matches!(
            (self.key_type, self.curve),
            (KeyType::Ecdsa, EllipticCurve::Secp256k1)
                | (KeyType::Eddsa, EllipticCurve::Babyjubjub)
                | (KeyType::Eddsa, EllipticCurve::Bn254)
                | (KeyType::Eddsa, EllipticCurve::Ed25519)
        )
    }

    /// Reject unsupported (type, curve) combinations with `InvalidParameter`.
    pub fn validate(&self) -> Result<()> {
        if self.is_supported() {
            return Ok(());
        }
        Err(Error::invalid_parameter(format!("unsupported algorithm {self}")))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Ecdsa => f.write_str("ecdsa"),
            KeyType::Eddsa => f.write_str("eddsa"),
        }
    }
}

impl fmt::Display for EllipticCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EllipticCurve::Secp256k1 => "secp256k1",
            EllipticCurve::Babyjubjub => "babyjubjub",
            EllipticCurve::Bn254 => "bn254",
            EllipticCurve::Ed25519 => "ed25519",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key_type, self.curve)
    }
}
