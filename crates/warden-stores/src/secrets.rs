use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Secret;
use warden_errors::Result;

/// Vault capability set for versioned secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Stores `value` as a new version of `id`, creating the secret if needed.
    async fn set(&self, ctx: &Context, id: &str, value: &str, attr: &Attributes) -> Result<Secret>;

    /// Reads one version, the latest when `version` is `None`.
    async fn get(&self, ctx: &Context, id: &str, version: Option<&str>) -> Result<Secret>;

    async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>>;

    /// Replaces tags on every version.
    async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Secret>;

    /// Moves the expiry of a live secret. The returned secret carries no value.
    async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Secret>;

    /// Soft-deletes every version of `id`.
    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;

    /// Latest version of a deleted secret, without its value.
    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Secret>;

    async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>>;

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()>;

    async fn destroy(&self, ctx: &Context, id: &str) -> Result<()>;
}
