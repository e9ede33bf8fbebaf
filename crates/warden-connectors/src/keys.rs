//! Keys connector.

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use warden_auth::Action;
use warden_auth::Authorizator;
use warden_auth::Operation;
use warden_auth::Resource;
use warden_core::Algorithm;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Key;
use warden_database::KeysRepository;
use warden_database::keys_tx;
use warden_errors::Error;
use warden_errors::Result;
use warden_stores::KeyStore;

use crate::config::PaginationConfig;
use crate::vault::attach_existing;
use crate::vault::check_expiry;
use crate::vault::tolerate_not_supported;
use crate::vault::update_attributes;

const fn op(action: Action) -> Operation {
    Operation::new(action, Resource::Key)
}

/// Asymmetric keys: material in a [`KeyStore`], metadata in a
/// [`KeysRepository`].
#[derive(Clone)]
pub struct KeysConnector {
    store: Arc<dyn KeyStore>,
    db: Arc<dyn KeysRepository>,
    auth: Arc<dyn Authorizator>,
    pagination: PaginationConfig,
}

impl KeysConnector {
    pub fn new(
        store: Arc<dyn KeyStore>,
        db: Arc<dyn KeysRepository>,
        auth: Arc<dyn Authorizator>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            store,
            db,
            auth,
            pagination,
        }
    }

    #[instrument(skip_all, fields(key.id = %id, algorithm = %algorithm))]
    pub async fn create(&self, ctx: &Context, id: &str, algorithm: &Algorithm, attr: &Attributes) -> Result<Key> {
        self.auth.check(op(Action::Write))?;

        let created = self.store.create(ctx, id, algorithm, attr).await;
        let key = attach_existing(created, id, || self.store.get(ctx, id))
            .await
            .inspect_err(|e| error!(error = %e, "failed to create key in vault"))?;

        self.add(ctx, key).await.inspect(|_| info!("key created successfully"))
    }

    #[instrument(skip_all, fields(key.id = %id, algorithm = %algorithm))]
    pub async fn import(
        &self,
        ctx: &Context,
        id: &str,
        private_key: &[u8],
        algorithm: &Algorithm,
        attr: &Attributes,
    ) -> Result<Key> {
        self.auth.check(op(Action::Write))?;

        if private_key.is_empty() {
            warn!("rejecting import with empty private key");
            return Err(Error::invalid_parameter("private key must not be empty"));
        }
        algorithm.validate().inspect_err(|e| warn!(error = %e, "rejecting import"))?;

        let imported = self.store.import(ctx, id, private_key, algorithm, attr).await;
        let key = attach_existing(imported, id, || self.store.get(ctx, id))
            .await
            .inspect_err(|e| error!(error = %e, "failed to import key in vault"))?;

        self.add(ctx, key).await.inspect(|_| info!("key imported successfully"))
    }

    async fn add(&self, ctx: &Context, key: Key) -> Result<Key> {
        self.db
            .add(ctx, &key)
            .await
            .inspect_err(|e| error!(error = %e, "failed to record key metadata"))
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn get(&self, ctx: &Context, id: &str) -> Result<Key> {
        self.auth.check(op(Action::Read))?;
        let key = self.db.get(ctx, id).await?;
        debug!("key retrieved");
        Ok(key)
    }

    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.auth.check(op(Action::Read))?;
        let ids = self.db.search_ids(ctx, false, self.pagination.effective_limit(limit), offset).await?;
        debug!(count = ids.len(), "keys listed");
        Ok(ids)
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Key> {
        self.auth.check(op(Action::Write))?;

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let (tx_ctx, id_owned, attr) = (ctx.clone(), id.to_string(), update_attributes(attr));
        self.db
            .run_in_transaction(
                ctx,
                keys_tx(move |tx| async move {
                    let mut key = tx.get(&tx_ctx, &id_owned).await?;
                    key.tags = attr.tags.clone();
                    key.metadata.updated_at = Utc::now();
                    let key = tx.update(&tx_ctx, &key).await?;
                    tolerate_not_supported(store.update(&tx_ctx, &id_owned, &attr).await, "update", &id_owned)?;
                    let _ = sender.send(key);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to update key"))?;

        let key = receiver.await.map_err(|_| Error::internal("key update committed without a result"))?;
        info!("key updated successfully");
        Ok(key)
    }

    /// Moves the key's expiry in the database and the vault.
    #[instrument(skip_all, fields(key.id = %id, expire_at = %expire_at))]
    pub async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Key> {
        self.auth.check(op(Action::Write))?;
        check_expiry(expire_at).inspect_err(|e| warn!(error = %e, "rejecting refresh"))?;

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                keys_tx(move |tx| async move {
                    let mut key = tx.get(&tx_ctx, &id_owned).await?;
                    key.metadata.expire_at = Some(expire_at);
                    key.metadata.updated_at = Utc::now();
                    let key = tx.update(&tx_ctx, &key).await?;
                    tolerate_not_supported(store.refresh(&tx_ctx, &id_owned, expire_at).await, "refresh", &id_owned)?;
                    let _ = sender.send(key);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to refresh key"))?;

        let key = receiver.await.map_err(|_| Error::internal("key refresh committed without a result"))?;
        info!("key refreshed successfully");
        Ok(key)
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        self.auth.check(op(Action::Delete))?;

        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                keys_tx(move |tx| async move {
                    tx.delete(&tx_ctx, &id_owned).await?;
                    tolerate_not_supported(store.delete(&tx_ctx, &id_owned).await, "delete", &id_owned)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to delete key"))?;

        info!("key deleted successfully");
        Ok(())
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Key> {
        self.auth.check(op(Action::Read))?;
        let key = self.db.get_deleted(ctx, id).await?;
        debug!("deleted key retrieved");
        Ok(key)
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.auth.check(op(Action::Read))?;
        let ids = self.db.search_ids(ctx, true, self.pagination.effective_limit(limit), offset).await?;
        debug!(count = ids.len(), "deleted keys listed");
        Ok(ids)
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        self.auth.check(op(Action::Delete))?;
        self.db.get_deleted(ctx, id).await?;

        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                keys_tx(move |tx| async move {
                    tx.restore(&tx_ctx, &id_owned).await?;
                    tolerate_not_supported(store.restore(&tx_ctx, &id_owned).await, "restore", &id_owned)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to restore key"))?;

        info!("key restored successfully");
        Ok(())
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        self.auth.check(op(Action::Destroy))?;
        self.db.get_deleted(ctx, id).await?;

        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                keys_tx(move |tx| async move {
                    tx.purge(&tx_ctx, &id_owned).await?;
                    tolerate_not_supported(store.destroy(&tx_ctx, &id_owned).await, "destroy", &id_owned)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to destroy key"))?;

        info!("key destroyed successfully");
        Ok(())
    }

    /// Signs with the key's stored algorithm unless `algorithm` overrides it.
    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn sign(&self, ctx: &Context, id: &str, data: &[u8], algorithm: Option<&Algorithm>) -> Result<Vec<u8>> {
        self.auth.check(op(Action::Sign))?;

        let key = self.db.get(ctx, id).await?;
        if key.is_disabled() {
            warn!("refusing to sign with disabled key");
            return Err(Error::status_conflict(format!("key '{id}' is disabled")));
        }
        let algorithm = algorithm.copied().unwrap_or(key.algorithm);

        let signature = self
            .store
            .sign(ctx, id, data, &algorithm)
            .await
            .inspect_err(|e| error!(error = %e, "failed to sign payload"))?;
        debug!("payload signed successfully");
        Ok(signature)
    }

    /// Public operation: no permission is required to check a signature.
    #[instrument(skip_all, fields(algorithm = %algorithm))]
    pub async fn verify(
        &self,
        ctx: &Context,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
        algorithm: &Algorithm,
    ) -> Result<()> {
        self.store.verify(ctx, public_key, data, signature, algorithm).await
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn encrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.auth.check(op(Action::Encrypt))?;
        self.store
            .encrypt(ctx, id, data)
            .await
            .inspect_err(|e| error!(error = %e, "failed to encrypt payload"))
    }

    #[instrument(skip_all, fields(key.id = %id))]
    pub async fn decrypt(&self, ctx: &Context, id: &str, data: &[u8]) -> Result<Vec<u8>> {
        self.auth.check(op(Action::Encrypt))?;
        self.store
            .decrypt(ctx, id, data)
            .await
            .inspect_err(|e| error!(error = %e, "failed to decrypt payload"))
    }
}
