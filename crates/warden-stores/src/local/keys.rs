use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use warden_core::Algorithm;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Key;
use warden_core::Metadata;
use warden_errors::Error;
use warden_errors::Result;

use super::StorageBackend;
use super::decode;
use super::encode;
use super::expire_at;
use super::local;
use super::paginate;
use super::validate_id;
use crate::crypto;
use crate::keys::KeyStore;

const KEY_PREFIX: &str = "keys/";

#[derive(Serialize, Deserialize)]
struct StoredKey {
    key: Key,
    private_key: Vec<u8>,
    data_key: Vec<u8>,
}

/// Key store that holds key material itself.
///
/// secp256k1 signatures are deterministic (RFC 6979) and always low-S.
/// Babyjubjub and BN254 keys are `NotSupported`.
pub struct LocalKeyStore {
    backend: Arc<dyn StorageBackend>,
}

impl LocalKeyStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn key_path(id: &str) -> String {
        format!("{KEY_PREFIX}{id}")
    }

    async fn load(&self, id: &str) -> Result<Option<(StoredKey, u64)>> {
        match self.backend.get_with_version(&Self::key_path(id)).await? {
            Some((bytes, version)) => Ok(Some((decode(&bytes).map_err(local)?, version))),
            None => Ok(None),
        }
    }

    async fn load_live(&self, id: &str) -> Result<(StoredKey, u64)> {
        match self.load(id).await? {
            Some((stored, version)) if !stored.key.metadata.is_deleted() => Ok((stored, version)),
            _ => Err(local(Error::not_found(format!("key '{id}' not found")))),
        }
    }

    async fn load_deleted(&self, id: &str) -> Result<(StoredKey, u64)> {
        match self.load(id).await? {
            Some((stored, version)) if stored.key.metadata.is_deleted() => Ok((stored, version)),
            _ => Err(local(Error::not_found(format!("deleted key '{id}' not found")))),
        }
    }

    /// Compare-and-set write of an existing record.
    async fn save(&self, stored: &StoredKey, version: u64) -> Result<()> {
        let bytes = encode(stored).map_err(local)?;
        if !self.backend.put_cas(&Self::key_path(&stored.key.id), &bytes, Some(version)).await? {
            return Err(local(Error::status_conflict(format!(
                "key '{}' was modified concurrently",
                stored.key.id
            ))));
        }
        Ok(())
    }

    async fn insert(
        &self,
        id: &str,
        algorithm: &Algorithm,
        private_key: Vec<u8>,
        public_key: Vec<u8>,
        attr: &Attributes,
    ) -> Result<Key> {
        let now = Utc::now();
        let mut metadata = Metadata::new("1", now);
        metadata.disabled = attr.disabled;
        metadata.expire_at = expire_at(now, attr)?;

        let stored = StoredKey {
            key: Key {
                id: id.to_string(),
                public_key,
                algorithm: *algorithm,
                tags: attr.tags.clone(),
                metadata,
            },
            private_key,
            data_key: crypto::generate_data_key(),
        };

        let bytes = encode(&stored).map_err(local)?;
        if !self.backend.put_cas(&Self::key_path(id), &bytes, None).await? {
            return Err(local(Error::already_exists(format!("key '{id}' already exists"))));
        }
        Ok(stored.key)
    }

    async fn ids(&self, deleted: bool) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for id in self.backend.list(KEY_PREFIX).await? {
            if let Some((stored, _)) = self.load(&id).await?
                && stored.key.metadata.is_deleted() == deleted
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn usable(stored: &StoredKey) -> Result<()> {
        let key = &stored.key;
        if key.is_disabled() {
            return Err(local(Error::status_conflict(format!("key '{}' is disabled", key.id))));
        }
        if key.metadata.is_expired(Utc::now()) {
            return Err(local(Error::status_conflict(format!("key '{}' has expired", key.id))));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyStore for LocalKeyStore {
    async fn create(&self, ctx: &Context, id: &str, algorithm: &Algorithm, attr: &Attributes) -> Result<Key> {
        ctx.check()?;
        validate_id(id)?;
        algorithm.validate()?;

        let (private_key, public_key) = crypto::generate_key_material(algorithm).map_err(local)?;
        let key = self.insert(id, algorithm, private_key, public_key, attr).await?;

        debug!(id = %id, algorithm = %algorithm, "created local key");
        Ok(key)
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attr: &Attributes,
    ) -> Result<Key> {
        ctx.check()?;
        validate_id(id)?;
        algorithm.validate()?;

        let public_key = crypto::public_key_for(private_key, algorithm).map_err(local)?;
        let key = self.insert(id, algorithm, private_key.to_vec(), public_key, attr).await?;

        debug!(id = %id, algorithm = %algorithm, "imported local key");
        Ok(key)
    }

    async fn get(&self, ctx: &Context, id: &str) -> Result<Key> {
        ctx.check()?;
        Ok(self.load_live(id).await?.0.key)
    }

    async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        ctx.check()?;
        Ok(paginate(self.ids(false).await?, limit, offset))
    }

    async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Key> {
        ctx.check()?;
        let (mut stored, version) = self.load_live(id).await?;

        stored.key.tags = attr.tags.clone();
        stored.key.metadata.updated_at = Utc::now();
        self.save(&stored, version).await?;

        debug!(id = %id, "updated local key");
        Ok(stored.key)
    }

    async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Key> {
        ctx.check()?;
        let (mut stored, version) = self.load_live(id).await?;

        stored.key.metadata.expire_at = Some(expire_at);
        stored.key.metadata.updated_at = Utc::now();
        self.save(&stored, version).await?;

        debug!(id = %id, expire_at = %expire_at, "refreshed local key");
        Ok(stored.key)
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        let (mut stored, version) = self.load_live(id).await?;
        stored.key.metadata.mark_deleted(Utc::now());
        self.save(&stored, version).await?;

        debug!(id = %id, "deleted local key");
        Ok(())
    }

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Key> {
        ctx.check()?;
        Ok(self.load_deleted(id).await?.0.key)
    }

    async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        ctx.check()?;
        Ok(paginate(self.ids(true).await?, limit, offset))
    }

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        let (mut stored, version) = self.load_deleted(id).await?;
        stored.key.metadata.mark_restored(Utc::now());
        self.save(&stored, version).await?;

        debug!(id = %id, "restored local key");
        Ok(())
    }

    async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.load_deleted(id).await?;
        self.backend.delete(&Self::key_path(id)).await?;

        debug!(id = %id, "destroyed local key");
        Ok(())
    }

    async fn sign(&self, ctx: &Context, id: &str, data: &[u8], algorithm: &Algorithm) -> Result<Vec<u8>> {
        ctx.check()?;
        let (stored, _) = self.load_live(id).await?;
        if stored.key.algorithm != *algorithm {
            return Err(local(Error::invalid_parameter(format!(
                "key '{id}' uses {}, not {algorithm}",
                stored.key.algorithm
            ))));
        }
        Self::usable(&stored)?;

        let signature = match algorithm.curve {
            warden_core::EllipticCurve::Secp256k1 => crypto::sign_secp256k1(&stored.private_key, data),
            warden_core::EllipticCurve::Ed25519 => crypto::sign_ed25519(&stored.private_key, data),
            _ => Err(Error::not_supported(format!("signing with {algorithm} is not supported"))),
        }
        .map_err(local)?;

        debug!(id = %id, "signed payload with local key");
        Ok(signature)
    }

    async fn verify(
        &self,
        ctx: &Context,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
        algorithm: &Algorithm,
    ) -> Result<()> {
        ctx.check()?;
        crypto::verify_signature(public_key, data, signature, algorithm)
    }

    async fn encrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        ctx.check()?;
        let (stored, _) = self.load_live(id).await?;
        Self::usable(&stored)?;
        crypto::encrypt_aes_gcm(&stored.data_key, data).map_err(local)
    }

    async fn decrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        ctx.check()?;
        let (stored, _) = self.load_live(id).await?;
        Self::usable(&stored)?;
        crypto::decrypt_aes_gcm(&stored.data_key, data).map_err(local)
    }
}
