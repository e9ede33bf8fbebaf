use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Metadata;
use warden_core::Secret;
use warden_errors::Error;
use warden_errors::Result;

use super::StorageBackend;
use super::decode;
use super::encode;
use super::expire_at;
use super::local;
use super::paginate;
use super::validate_id;
use crate::secrets::SecretStore;

const SECRET_PREFIX: &str = "secrets/";

#[derive(Serialize, Deserialize)]
struct StoredVersion {
    value: String,
    created_at: DateTime<Utc>,
}

/// Every version of one secret. Delete, restore and destroy act on the
/// whole record.
#[derive(Serialize, Deserialize)]
struct StoredSecret {
    id: String,
    tags: HashMap<String, String>,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
    current_version: u64,
    versions: BTreeMap<u64, StoredVersion>,
}

impl StoredSecret {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn to_secret(&self, version: u64, with_value: bool) -> Result<Secret> {
        let stored = self.versions.get(&version).ok_or_else(|| {
            local(Error::not_found(format!("secret '{}' has no version {version}", self.id)))
        })?;

        let mut metadata = Metadata::new(version.to_string(), stored.created_at);
        metadata.disabled = self.disabled;
        metadata.updated_at = self.updated_at;
        metadata.deleted_at = self.deleted_at;
        metadata.expire_at = self.expire_at;

        Ok(Secret {
            id: self.id.clone(),
            value: with_value.then(|| stored.value.clone()),
            tags: self.tags.clone(),
            metadata,
        })
    }
}

/// Versioned secret store holding values itself.
pub struct LocalSecretStore {
    backend: Arc<dyn StorageBackend>,
}

impl LocalSecretStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn secret_path(id: &str) -> String {
        format!("{SECRET_PREFIX}{id}")
    }

    async fn load(&self, id: &str) -> Result<Option<(StoredSecret, u64)>> {
        match self.backend.get_with_version(&Self::secret_path(id)).await? {
            Some((bytes, version)) => Ok(Some((decode(&bytes).map_err(local)?, version))),
            None => Ok(None),
        }
    }

    async fn load_live(&self, id: &str) -> Result<(StoredSecret, u64)> {
        match self.load(id).await? {
            Some((stored, version)) if !stored.is_deleted() => Ok((stored, version)),
            _ => Err(local(Error::not_found(format!("secret '{id}' not found")))),
        }
    }

    async fn load_deleted(&self, id: &str) -> Result<(StoredSecret, u64)> {
        match self.load(id).await? {
            Some((stored, version)) if stored.is_deleted() => Ok((stored, version)),
            _ => Err(local(Error::not_found(format!("deleted secret '{id}' not found")))),
        }
    }

    /// `expected = None` creates the record.
    async fn save(&self, stored: &StoredSecret, expected: Option<u64>) -> Result<()> {
        let bytes = encode(stored).map_err(local)?;
        if !self.backend.put_cas(&Self::secret_path(&stored.id), &bytes, expected).await? {
            return Err(local(Error::status_conflict(format!(
                "secret '{}' was modified concurrently",
                stored.id
            ))));
        }
        Ok(())
    }

    async fn ids(&self, deleted: bool) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for id in self.backend.list(SECRET_PREFIX).await? {
            if let Some((stored, _)) = self.load(&id).await?
                && stored.is_deleted() == deleted
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn parse_version(id: &str, version: &str) -> Result<u64> {
        version
            .parse()
            .map_err(|_| local(Error::invalid_format(format!("secret '{id}': invalid version '{version}'"))))
    }
}

#[async_trait]
impl SecretStore for LocalSecretStore {
    async fn set(&self, ctx: &Context, id: &str, value: &str, attr: &Attributes) -> Result<Secret> {
        ctx.check()?;
        validate_id(id)?;

        let now = Utc::now();
        let (mut stored, expected) = match self.load(id).await? {
            Some((stored, _)) if stored.is_deleted() => {
                return Err(local(Error::status_conflict(format!(
                    "secret '{id}' is deleted, restore it before setting a new version"
                ))));
            }
            Some((stored, version)) => (stored, Some(version)),
            None => (
                StoredSecret {
                    id: id.to_string(),
                    tags: HashMap::new(),
                    disabled: false,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                    expire_at: None,
                    current_version: 0,
                    versions: BTreeMap::new(),
                },
                None,
            ),
        };

        stored.current_version += 1;
        stored.versions.insert(stored.current_version, StoredVersion {
            value: value.to_string(),
            created_at: now,
        });
        stored.tags = attr.tags.clone();
        stored.disabled = attr.disabled;
        stored.updated_at = now;
        stored.expire_at = expire_at(now, attr)?;
        self.save(&stored, expected).await?;

        debug!(id = %id, version = stored.current_version, "stored secret version");
        stored.to_secret(stored.current_version, true)
    }

    async fn get(&self, ctx: &Context, id: &str, version: Option<&str>) -> Result<Secret> {
        ctx.check()?;
        let (stored, _) = self.load_live(id).await?;
        let version = match version {
            Some(version) => Self::parse_version(id, version)?,
            None => stored.current_version,
        };
        stored.to_secret(version, true)
    }

    async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        ctx.check()?;
        Ok(paginate(self.ids(false).await?, limit, offset))
    }

    async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Secret> {
        ctx.check()?;
        let (mut stored, version) = self.load_live(id).await?;
        stored.tags = attr.tags.clone();
        stored.updated_at = Utc::now();
        self.save(&stored, Some(version)).await?;

        debug!(id = %id, "updated secret");
        stored.to_secret(stored.current_version, true)
    }

    async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Secret> {
        ctx.check()?;
        let (mut stored, version) = self.load_live(id).await?;
        stored.expire_at = Some(expire_at);
        stored.updated_at = Utc::now();
        self.save(&stored, Some(version)).await?;

        debug!(id = %id, expire_at = %expire_at, "refreshed secret");
        stored.to_secret(stored.current_version, false)
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        let (mut stored, version) = self.load_live(id).await?;
        let now = Utc::now();
        stored.deleted_at = Some(now);
        stored.updated_at = now;
        self.save(&stored, Some(version)).await?;

        debug!(id = %id, "deleted secret");
        Ok(())
    }

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Secret> {
        ctx.check()?;
        let (stored, _) = self.load_deleted(id).await?;
        stored.to_secret(stored.current_version, false)
    }

    async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        ctx.check()?;
        Ok(paginate(self.ids(true).await?, limit, offset))
    }

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        let (mut stored, version) = self.load_deleted(id).await?;
        stored.deleted_at = None;
        stored.updated_at = Utc::now();
        self.save(&stored, Some(version)).await?;

        debug!(id = %id, "restored secret");
        Ok(())
    }

    async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.load_deleted(id).await?;
        self.backend.delete(&Self::secret_path(id)).await?;

        debug!(id = %id, "destroyed secret");
        Ok(())
    }
}
