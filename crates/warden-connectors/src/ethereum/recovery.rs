//! Public-key recovery and signature canonicality for secp256k1.

use ethers_core::types::Address;
use ethers_core::types::Signature;
use ethers_core::types::U256;
use secp256k1::Message;
use secp256k1::Secp256k1;
use secp256k1::constants::CURVE_ORDER;
use secp256k1::ecdsa::RecoverableSignature;
use secp256k1::ecdsa::RecoveryId;
use warden_core::address_from_public_key;
use warden_errors::Error;
use warden_errors::Result;

/// Offset EIP-191 style signatures add to the recovery id.
pub const LEGACY_V_OFFSET: u8 = 27;

fn half_order() -> U256 {
    U256::from_big_endian(&CURVE_ORDER) >> 1
}

/// `true` when `S` (bytes 32..64) is above `N/2`.
pub fn is_high_s(signature: &[u8]) -> bool {
    signature.len() >= 64 && U256::from_big_endian(&signature[32..64]) > half_order()
}

/// Uncompressed public key that signed `digest`.
pub fn recover_public_key(digest: &[u8; 32], signature: &[u8], recovery_id: u8) -> Result<[u8; 65]> {
    if signature.len() < 64 {
        return Err(Error::invalid_parameter(format!(
            "signature must be at least 64 bytes, got {}",
            signature.len()
        )));
    }
    let rec_id = RecoveryId::try_from(i32::from(recovery_id))
        .map_err(|e| Error::invalid_parameter(format!("invalid recovery id {recovery_id}: {e}")))?;
    let rec_sig = RecoverableSignature::from_compact(&signature[..64], rec_id)
        .map_err(|e| Error::invalid_parameter(format!("malformed signature: {e}")))?;
    let public_key = Secp256k1::verification_only()
        .recover_ecdsa(&Message::from_digest(*digest), &rec_sig)
        .map_err(|e| Error::invalid_parameter(format!("public key recovery failed: {e}")))?;
    Ok(public_key.serialize_uncompressed())
}

pub fn recover_address(digest: &[u8; 32], signature: &[u8], recovery_id: u8) -> Result<Address> {
    address_from_public_key(&recover_public_key(digest, signature, recovery_id)?)
}

/// Recovery id (0 or 1) under which `signature` recovers to `public_key`.
pub fn recovery_id(digest: &[u8; 32], signature: &[u8], public_key: &[u8]) -> Result<u8> {
    for candidate in [0u8, 1] {
        if let Ok(recovered) = recover_public_key(digest, signature, candidate)
            && recovered[..] == *public_key
        {
            return Ok(candidate);
        }
    }
    Err(Error::crypto_operation("signature does not recover to the account public key"))
}

/// Splits a 65-byte `R || S || V` signature, checking its length.
pub fn split_signature(signature: &[u8]) -> Result<(&[u8], u8)> {
    match signature {
        [rs @ .., v] if signature.len() == 65 => Ok((rs, *v)),
        _ => Err(Error::invalid_parameter(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        ))),
    }
}

/// `V` of a legacy (EIP-191) signature back to its recovery id.
pub fn legacy_recovery_id(v: u8) -> Result<u8> {
    match v.checked_sub(LEGACY_V_OFFSET) {
        Some(id @ (0 | 1)) => Ok(id),
        _ => Err(Error::invalid_parameter(format!("invalid recovery byte {v}, expected 27 or 28"))),
    }
}

pub(crate) fn to_signature(signature: &[u8; 65], v: u64) -> Signature {
    Signature {
        r: U256::from_big_endian(&signature[..32]),
        s: U256::from_big_endian(&signature[32..64]),
        v,
    }
}
