use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use warden_core::Algorithm;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Key;
use warden_errors::Result;

/// Vault capability set for asymmetric keys.
///
/// A backend that cannot perform an operation answers `NotSupported`. Private
/// key material never crosses this interface except as `import` input.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn create(&self, ctx: &Context, id: &str, algorithm: &Algorithm, attr: &Attributes) -> Result<Key>;

    async fn import(
        &self,
        ctx: &Context,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attr: &Attributes,
    ) -> Result<Key>;

    async fn get(&self, ctx: &Context, id: &str) -> Result<Key>;

    /// Ids of live keys, sorted. `limit = 0` means no limit.
    async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>>;

    /// Replaces tags. The disabled flag is fixed at creation.
    async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Key>;

    /// Moves the expiry of a live key.
    async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Key>;

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Key>;

    async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>>;

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()>;

    /// Permanently removes a deleted key.
    async fn destroy(&self, ctx: &Context, id: &str) -> Result<()>;

    /// ECDSA keys sign a 32-byte digest and return `R || S` (64 bytes, no
    /// recovery id). EdDSA keys sign the data itself.
    async fn sign(&self, ctx: &Context, id: &str, data: &[u8], algorithm: &Algorithm) -> Result<Vec<u8>>;

    /// `Ok(())` when `signature` is valid, `InvalidParameter` otherwise.
    async fn verify(
        &self,
        ctx: &Context,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
        algorithm: &Algorithm,
    ) -> Result<()>;

    async fn encrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>>;

    async fn decrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>>;
}
