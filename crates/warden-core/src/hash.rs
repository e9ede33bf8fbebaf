use sha3::Digest;
use sha3::Keccak256;

/// Keccak-256 (the pre-standard SHA-3 variant Ethereum uses).
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}
