//! Key generation, signing, verification and data-key encryption.
//!
//! [`verify_signature`] is stateless: any backend may delegate its `verify`
//! to it. The remaining helpers back the local store.

use aes_gcm::Aes256Gcm;
use aes_gcm::aead::Aead;
use aes_gcm::aead::KeyInit;
use aes_gcm::aead::generic_array::GenericArray;
use rand::RngCore;
use secp256k1::Message;
use secp256k1::PublicKey;
use secp256k1::Secp256k1;
use secp256k1::SecretKey;
use secp256k1::ecdsa;
use warden_core::Algorithm;
use warden_core::EllipticCurve;
use warden_core::KeyType;
use warden_errors::Error;
use warden_errors::Result;

const AES_GCM_NONCE_LEN: usize = 12;
pub(crate) const DATA_KEY_LEN: usize = 32;

/// Verify `signature` over `data` with `public_key`.
///
/// ECDSA/secp256k1 expects a 32-byte digest and a 64-byte `R || S` signature,
/// optionally followed by a recovery byte that is ignored. High-S signatures
/// are normalized first. Ed25519 verifies the raw data.
pub fn verify_signature(public_key: &[u8], data: &[u8], signature: &[u8], algorithm: &Algorithm) -> Result<()> {
    algorithm.validate()?;
    match (algorithm.key_type, algorithm.curve) {
        (KeyType::Ecdsa, EllipticCurve::Secp256k1) => verify_secp256k1(public_key, data, signature),
        (KeyType::Eddsa, EllipticCurve::Ed25519) => verify_ed25519(public_key, data, signature),
        _ => Err(Error::not_supported(format!("verification is not supported for {algorithm}"))),
    }
}

fn verify_secp256k1(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let message = digest_message(data)?;
    let public_key = PublicKey::from_slice(public_key)
        .map_err(|e| Error::invalid_parameter(format!("invalid secp256k1 public key: {e}")))?;

    if signature.len() != 64 && signature.len() != 65 {
        return Err(Error::invalid_parameter(format!(
            "ecdsa signature must be 64 or 65 bytes, got {}",
            signature.len()
        )));
    }
    let mut signature = ecdsa::Signature::from_compact(&signature[..64])
        .map_err(|e| Error::invalid_parameter(format!("malformed ecdsa signature: {e}")))?;
    signature.normalize_s();

    Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| Error::invalid_parameter("signature does not match public key"))
}

fn verify_ed25519(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    use ed25519_dalek::Verifier;

    let public_key: &[u8; 32] = public_key
        .try_into()
        .map_err(|_| Error::invalid_parameter(format!("ed25519 public key must be 32 bytes, got {}", public_key.len())))?;
    let signature: &[u8; 64] = signature
        .try_into()
        .map_err(|_| Error::invalid_parameter(format!("ed25519 signature must be 64 bytes, got {}", signature.len())))?;

    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::invalid_parameter(format!("invalid ed25519 public key: {e}")))?;
    let signature = ed25519_dalek::Signature::from_bytes(signature);

    verifying_key
        .verify(data, &signature)
        .map_err(|_| Error::invalid_parameter("signature does not match public key"))
}

fn digest_message(data: &[u8]) -> Result<Message> {
    let digest: [u8; 32] = data
        .try_into()
        .map_err(|_| Error::invalid_parameter(format!("ecdsa expects a 32-byte digest, got {} bytes", data.len())))?;
    Ok(Message::from_digest(digest))
}

/// Fresh `(private, public)` key material. secp256k1 public keys are
/// uncompressed (65 bytes).
pub(crate) fn generate_key_material(algorithm: &Algorithm) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut rng = rand::rng();
    match algorithm.curve {
        EllipticCurve::Secp256k1 => {
            let mut seed = [0u8; 32];
            loop {
                rng.fill_bytes(&mut seed);
                if let Ok(secret) = SecretKey::from_slice(&seed) {
                    let public = secret.public_key(&Secp256k1::signing_only());
                    return Ok((seed.to_vec(), public.serialize_uncompressed().to_vec()));
                }
            }
        }
        EllipticCurve::Ed25519 => {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            let public = ed25519_public_key(&seed)?;
            Ok((seed.to_vec(), public))
        }
        EllipticCurve::Babyjubjub | EllipticCurve::Bn254 => {
            Err(Error::not_supported(format!("{algorithm} keys are not supported by this store")))
        }
    }
}

/// Public key for imported material, rejecting invalid private keys.
pub(crate) fn public_key_for(private_key: &[u8], algorithm: &Algorithm) -> Result<Vec<u8>> {
    match algorithm.curve {
        EllipticCurve::Secp256k1 => {
            let secret = SecretKey::from_slice(private_key)
                .map_err(|e| Error::invalid_parameter(format!("invalid secp256k1 private key: {e}")))?;
            Ok(secret.public_key(&Secp256k1::signing_only()).serialize_uncompressed().to_vec())
        }
        EllipticCurve::Ed25519 => ed25519_public_key(private_key),
        EllipticCurve::Babyjubjub | EllipticCurve::Bn254 => {
            Err(Error::not_supported(format!("{algorithm} keys are not supported by this store")))
        }
    }
}

fn ed25519_seed(private_key: &[u8]) -> Result<[u8; 32]> {
    private_key
        .try_into()
        .map_err(|_| Error::invalid_parameter(format!("ed25519 private key must be 32 bytes, got {}", private_key.len())))
}

fn ed25519_public_key(private_key: &[u8]) -> Result<Vec<u8>> {
    let signing_key = ed25519_dalek::SigningKey::from_bytes(&ed25519_seed(private_key)?);
    Ok(signing_key.verifying_key().as_bytes().to_vec())
}

/// Deterministic (RFC 6979) secp256k1 signature over a 32-byte digest.
pub(crate) fn sign_secp256k1(private_key: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
    let message = digest_message(digest)?;
    let secret = SecretKey::from_slice(private_key)
        .map_err(|e| Error::crypto_operation(format!("stored secp256k1 key is invalid: {e}")))?;
    let signature = Secp256k1::signing_only().sign_ecdsa(&message, &secret);
    Ok(signature.serialize_compact().to_vec())
}

pub(crate) fn sign_ed25519(private_key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    use ed25519_dalek::Signer;

    let signing_key = ed25519_dalek::SigningKey::from_bytes(&ed25519_seed(private_key)?);
    Ok(signing_key.sign(data).to_bytes().to_vec())
}

pub(crate) fn generate_data_key() -> Vec<u8> {
    let mut key = vec![0u8; DATA_KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    key
}

/// AES-256-GCM; output is `nonce || ciphertext`.
pub(crate) fn encrypt_aes_gcm(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| Error::crypto_operation(format!("invalid data key: {e}")))?;

    let mut nonce = [0u8; AES_GCM_NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|e| Error::crypto_operation(format!("AES-256-GCM encryption failed: {e}")))?;

    let mut out = nonce.to_vec();
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn decrypt_aes_gcm(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < AES_GCM_NONCE_LEN {
        return Err(Error::invalid_parameter("ciphertext too short for AES-256-GCM"));
    }
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| Error::crypto_operation(format!("invalid data key: {e}")))?;

    let (nonce, ciphertext) = data.split_at(AES_GCM_NONCE_LEN);
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| Error::invalid_parameter("ciphertext could not be decrypted with this key"))
}

#[cfg(test)]
mod tests {
    use warden_core::keccak256;

    use super::*;

    #[test]
    fn test_secp256k1_sign_verify() {
        let alg = Algorithm::ethereum();
        let (private, public) = generate_key_material(&alg).unwrap();
        assert_eq!(public.len(), 65);
        assert_eq!(public_key_for(&private, &alg).unwrap(), public);

        let digest = keccak256(b"hello");
        let signature = sign_secp256k1(&private, &digest).unwrap();
        assert_eq!(signature.len(), 64);
        verify_signature(&public, &digest, &signature, &alg).unwrap();

        let mut with_recid = signature.clone();
        with_recid.push(1);
        verify_signature(&public, &digest, &with_recid, &alg).unwrap();

        let other = keccak256(b"bye");
        assert!(verify_signature(&public, &other, &signature, &alg).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_high_s_is_normalized_before_verify() {
        let alg = Algorithm::ethereum();
        let (private, public) = generate_key_material(&alg).unwrap();
        let digest = keccak256(b"malleable");
        let signature = sign_secp256k1(&private, &digest).unwrap();

        // S' = N - S gives the malleable twin of the same signature.
        let order = secp256k1::constants::CURVE_ORDER;
        let mut high = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = order[i] as i16 - signature[32 + i] as i16 - borrow;
            borrow = if diff < 0 {
                diff += 256;
                1
            } else {
                0
            };
            high[i] = diff as u8;
        }
        let mut twin = signature[..32].to_vec();
        twin.extend_from_slice(&high);
        assert_ne!(twin, signature);

        verify_signature(&public, &digest, &twin, &alg).unwrap();
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let alg = Algorithm::ed25519();
        let (private, public) = generate_key_material(&alg).unwrap();
        assert_eq!(public.len(), 32);

        let signature = sign_ed25519(&private, b"raw message").unwrap();
        verify_signature(&public, b"raw message", &signature, &alg).unwrap();
        assert!(verify_signature(&public, b"tampered", &signature, &alg).is_err());
    }

    #[test]
    fn test_unsupported_curves() {
        let alg = Algorithm::new(KeyType::Eddsa, EllipticCurve::Bn254);
        assert!(generate_key_material(&alg).unwrap_err().is_not_supported());
        assert!(verify_signature(&[], &[], &[], &alg).unwrap_err().is_not_supported());

        let invalid = Algorithm::new(KeyType::Ecdsa, EllipticCurve::Ed25519);
        assert!(verify_signature(&[], &[], &[], &invalid).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_invalid_import_material() {
        assert!(public_key_for(&[0u8; 32], &Algorithm::ethereum()).unwrap_err().is_invalid_parameter());
        assert!(public_key_for(&[1u8; 31], &Algorithm::ed25519()).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_aes_gcm_round_trip() {
        let key = generate_data_key();
        let ciphertext = encrypt_aes_gcm(&key, b"plaintext").unwrap();
        assert_ne!(&ciphertext[AES_GCM_NONCE_LEN..], b"plaintext");
        assert_eq!(decrypt_aes_gcm(&key, &ciphertext).unwrap(), b"plaintext");

        let other = generate_data_key();
        assert!(decrypt_aes_gcm(&other, &ciphertext).unwrap_err().is_invalid_parameter());
        assert!(decrypt_aes_gcm(&key, &[0u8; 4]).is_err());
    }
}
