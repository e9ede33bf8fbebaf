//! Scripted vault doubles.
//!
//! Both stores wrap the in-process local backend and let a test inject
//! failures per method, record every call made, and (for keys) turn the next
//! signatures into their malleable high-S twins.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ethers_core::types::U256;
use secp256k1::constants::CURVE_ORDER;
use warden_auth::Authorizator;
use warden_auth::PermissionAuthorizator;
use warden_auth::UserInfo;
use warden_core::Algorithm;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Key;
use warden_core::Secret;
use warden_errors::Error;
use warden_errors::Result;
use warden_stores::KeyStore;
use warden_stores::SecretStore;
use warden_stores::local::InMemoryBackend;
use warden_stores::local::LocalKeyStore;
use warden_stores::local::LocalSecretStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Failures and call log shared by the scripted stores.
#[derive(Debug, Default)]
struct Script {
    failures: Mutex<HashMap<&'static str, Error>>,
    calls: Mutex<Vec<&'static str>>,
}

impl Script {
    fn enter(&self, method: &'static str) -> Result<()> {
        lock(&self.calls).push(method);
        match lock(&self.failures).get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|called| **called == method).count()
    }
}

/// Authorizator for a test user holding `permissions`.
pub fn authorizator(permissions: &[&str]) -> Arc<dyn Authorizator> {
    let user = UserInfo::new("tester", "tenant").with_permissions(permissions.iter().copied());
    Arc::new(PermissionAuthorizator::new(&user))
}

/// Same signature with `S` replaced by `N - S`.
pub fn high_s_twin(signature: &[u8]) -> Vec<u8> {
    let mut twin = signature.to_vec();
    if signature.len() < 64 {
        return twin;
    }
    let n = U256::from_big_endian(&CURVE_ORDER);
    let s = U256::from_big_endian(&signature[32..64]);
    (n - s).to_big_endian(&mut twin[32..64]);
    twin
}

/// [`KeyStore`] over the local backend with scripted behavior.
pub struct ScriptedKeyStore {
    inner: LocalKeyStore,
    script: Script,
    malleable: Mutex<u32>,
}

impl Default for ScriptedKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedKeyStore {
    pub fn new() -> Self {
        Self {
            inner: LocalKeyStore::new(Arc::new(InMemoryBackend::new())),
            script: Script::default(),
            malleable: Mutex::new(0),
        }
    }

    /// Every later call to `method` fails with `err`.
    pub fn fail(&self, method: &'static str, err: Error) {
        lock(&self.script.failures).insert(method, err);
    }

    pub fn clear_failures(&self) {
        lock(&self.script.failures).clear();
    }

    /// The next `count` ECDSA signatures come back with a high `S`.
    pub fn malleate_next(&self, count: u32) {
        *lock(&self.malleable) = count;
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.script.call_count(method)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.script.calls).len()
    }
}

#[async_trait]
impl KeyStore for ScriptedKeyStore {
    async fn create(&self, ctx: &Context, id: &str, algorithm: &Algorithm, attr: &Attributes) -> Result<Key> {
        self.script.enter("create")?;
        self.inner.create(ctx, id, algorithm, attr).await
    }

    async fn import(
        &self,
        ctx: &Context,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attr: &Attributes,
    ) -> Result<Key> {
        self.script.enter("import")?;
        self.inner.import(ctx, id, private_key, algorithm, attr).await
    }

    async fn get(&self, ctx: &Context, id: &str) -> Result<Key> {
        self.script.enter("get")?;
        self.inner.get(ctx, id).await
    }

    async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.script.enter("list")?;
        self.inner.list(ctx, limit, offset).await
    }

    async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Key> {
        self.script.enter("update")?;
        self.inner.update(ctx, id, attr).await
    }

    async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Key> {
        self.script.enter("refresh")?;
        self.inner.refresh(ctx, id, expire_at).await
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        self.script.enter("delete")?;
        self.inner.delete(ctx, id).await
    }

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Key> {
        self.script.enter("get_deleted")?;
        self.inner.get_deleted(ctx, id).await
    }

    async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.script.enter("list_deleted")?;
        self.inner.list_deleted(ctx, limit, offset).await
    }

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        self.script.enter("restore")?;
        self.inner.restore(ctx, id).await
    }

    async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        self.script.enter("destroy")?;
        self.inner.destroy(ctx, id).await
    }

    async fn sign(&self, ctx: &Context, id: &str, data: &[u8], algorithm: &Algorithm) -> Result<Vec<u8>> {
        self.script.enter("sign")?;
        let signature = self.inner.sign(ctx, id, data, algorithm).await?;
        let mut malleable = lock(&self.malleable);
        if *malleable > 0 && *algorithm == Algorithm::ethereum() {
            *malleable -= 1;
            return Ok(high_s_twin(&signature));
        }
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
        self.script.enter("verify")?;
        self.inner.verify(ctx, public_key, data, signature, algorithm).await
    }

    async fn encrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.script.enter("encrypt")?;
        self.inner.encrypt(ctx, id, data).await
    }

    async fn decrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.script.enter("decrypt")?;
        self.inner.decrypt(ctx, id, data).await
    }
}

/// [`SecretStore`] over the local backend with scripted failures.
pub struct ScriptedSecretStore {
    inner: LocalSecretStore,
    script: Script,
}

impl Default for ScriptedSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSecretStore {
    pub fn new() -> Self {
        Self {
            inner: LocalSecretStore::new(Arc::new(InMemoryBackend::new())),
            script: Script::default(),
        }
    }

    pub fn fail(&self, method: &'static str, err: Error) {
        lock(&self.script.failures).insert(method, err);
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.script.call_count(method)
    }
}

#[async_trait]
impl SecretStore for ScriptedSecretStore {
    async fn set(&self, ctx: &Context, id: &str, value: &str, attr: &Attributes) -> Result<Secret> {
        self.script.enter("set")?;
        self.inner.set(ctx, id, value, attr).await
    }

    async fn get(&self, ctx: &Context, id: &str, version: Option<&str>) -> Result<Secret> {
        self.script.enter("get")?;
        self.inner.get(ctx, id, version).await
    }

    async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.script.enter("list")?;
        self.inner.list(ctx, limit, offset).await
    }

    async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Secret> {
        self.script.enter("update")?;
        self.inner.update(ctx, id, attr).await
    }

    async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Secret> {
        self.script.enter("refresh")?;
        self.inner.refresh(ctx, id, expire_at).await
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        self.script.enter("delete")?;
        self.inner.delete(ctx, id).await
    }

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Secret> {
        self.script.enter("get_deleted")?;
        self.inner.get_deleted(ctx, id).await
    }

    async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.script.enter("list_deleted")?;
        self.inner.list_deleted(ctx, limit, offset).await
    }

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        self.script.enter("restore")?;
        self.inner.restore(ctx, id).await
    }

    async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        self.script.enter("destroy")?;
        self.inner.destroy(ctx, id).await
    }
}
