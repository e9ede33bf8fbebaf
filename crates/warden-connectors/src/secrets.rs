//! Secrets connector.
//!
//! The vault keeps every version's value; the database keeps one metadata
//! row per version and never the value itself.

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
use warden_core::Attributes;
use warden_core::Context;
use warden_core::Secret;
use warden_database::SecretsRepository;
use warden_database::secrets_tx;
use warden_errors::Error;
use warden_errors::Result;
use warden_stores::SecretStore;

use crate::config::PaginationConfig;
use crate::vault::check_expiry;
use crate::vault::tolerate_not_supported;
use crate::vault::update_attributes;

const fn op(action: Action) -> Operation {
    Operation::new(action, Resource::Secret)
}

#[derive(Clone)]
pub struct SecretsConnector {
    store: Arc<dyn SecretStore>,
    db: Arc<dyn SecretsRepository>,
    auth: Arc<dyn Authorizator>,
    pagination: PaginationConfig,
}

impl SecretsConnector {
    pub fn new(
        store: Arc<dyn SecretStore>,
        db: Arc<dyn SecretsRepository>,
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

    /// Stores a new version of `id`. The returned secret carries the value.
    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn set(&self, ctx: &Context, id: &str, value: &str, attr: &Attributes) -> Result<Secret> {
        self.auth.check(op(Action::Write))?;

        let secret = self
            .store
            .set(ctx, id, value, attr)
            .await
            .inspect_err(|e| error!(error = %e, "failed to set secret in vault"))?;
        self.db
            .add(ctx, &secret)
            .await
            .inspect_err(|e| error!(error = %e, "failed to record secret metadata"))?;

        info!(version = %secret.metadata.version, "secret set successfully");
        Ok(secret)
    }

    /// Metadata comes from the database, the value from the vault at the
    /// same version. `None` reads the latest version.
    #[instrument(skip_all, fields(secret.id = %id, version = ?version))]
    pub async fn get(&self, ctx: &Context, id: &str, version: Option<&str>) -> Result<Secret> {
        self.auth.check(op(Action::Read))?;

        let version = match version {
            Some(version) => version.to_string(),
            None => self.db.get_latest_version(ctx, id, false).await?,
        };
        let mut secret = self.db.get(ctx, id, &version).await?;
        let stored = self
            .store
            .get(ctx, id, Some(&version))
            .await
            .inspect_err(|e| warn!(error = %e, "secret metadata exists but vault read failed"))?;
        secret.value = stored.value;

        debug!("secret retrieved");
        Ok(secret)
    }

    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn list_versions(&self, ctx: &Context, id: &str) -> Result<Vec<String>> {
        self.auth.check(op(Action::Read))?;
        self.db.list_versions(ctx, id, false).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.auth.check(op(Action::Read))?;
        let ids = self.db.search_ids(ctx, false, self.pagination.effective_limit(limit), offset).await?;
        debug!(count = ids.len(), "secrets listed");
        Ok(ids)
    }

    /// Replaces the tags of the latest version.
    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn update(&self, ctx: &Context, id: &str, attr: &Attributes) -> Result<Secret> {
        self.auth.check(op(Action::Write))?;

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let (tx_ctx, id_owned, attr) = (ctx.clone(), id.to_string(), update_attributes(attr));
        self.db
            .run_in_transaction(
                ctx,
                secrets_tx(move |tx| async move {
                    let version = tx.get_latest_version(&tx_ctx, &id_owned, false).await?;
                    let mut secret = tx.get(&tx_ctx, &id_owned, &version).await?;
                    secret.tags = attr.tags.clone();
                    secret.metadata.updated_at = Utc::now();
                    let secret = tx.update(&tx_ctx, &secret).await?;
                    tolerate_not_supported(store.update(&tx_ctx, &id_owned, &attr).await, "update", &id_owned)?;
                    let _ = sender.send(secret);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to update secret"))?;

        let secret = receiver.await.map_err(|_| Error::internal("secret update committed without a result"))?;
        info!("secret updated successfully");
        Ok(secret)
    }

    /// Moves the expiry of the latest version.
    #[instrument(skip_all, fields(secret.id = %id, expire_at = %expire_at))]
    pub async fn refresh(&self, ctx: &Context, id: &str, expire_at: DateTime<Utc>) -> Result<Secret> {
        self.auth.check(op(Action::Write))?;
        check_expiry(expire_at).inspect_err(|e| warn!(error = %e, "rejecting refresh"))?;

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                secrets_tx(move |tx| async move {
                    let version = tx.get_latest_version(&tx_ctx, &id_owned, false).await?;
                    let mut secret = tx.get(&tx_ctx, &id_owned, &version).await?;
                    secret.metadata.expire_at = Some(expire_at);
                    secret.metadata.updated_at = Utc::now();
                    let secret = tx.update(&tx_ctx, &secret).await?;
                    tolerate_not_supported(store.refresh(&tx_ctx, &id_owned, expire_at).await, "refresh", &id_owned)?;
                    let _ = sender.send(secret);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to refresh secret"))?;

        let secret = receiver.await.map_err(|_| Error::internal("secret refresh committed without a result"))?;
        info!("secret refreshed successfully");
        Ok(secret)
    }

    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        self.auth.check(op(Action::Delete))?;

        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                secrets_tx(move |tx| async move {
                    tx.delete(&tx_ctx, &id_owned).await?;
                    tolerate_not_supported(store.delete(&tx_ctx, &id_owned).await, "delete", &id_owned)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to delete secret"))?;

        info!("secret deleted successfully");
        Ok(())
    }

    /// Latest version of a deleted secret, without its value.
    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Secret> {
        self.auth.check(op(Action::Read))?;
        self.db.get_deleted(ctx, id).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<String>> {
        self.auth.check(op(Action::Read))?;
        self.db.search_ids(ctx, true, self.pagination.effective_limit(limit), offset).await
    }

    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        self.auth.check(op(Action::Delete))?;
        self.db.get_deleted(ctx, id).await?;

        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                secrets_tx(move |tx| async move {
                    tx.restore(&tx_ctx, &id_owned).await?;
                    tolerate_not_supported(store.restore(&tx_ctx, &id_owned).await, "restore", &id_owned)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to restore secret"))?;

        info!("secret restored successfully");
        Ok(())
    }

    #[instrument(skip_all, fields(secret.id = %id))]
    pub async fn destroy(&self, ctx: &Context, id: &str) -> Result<()> {
        self.auth.check(op(Action::Destroy))?;
        self.db.get_deleted(ctx, id).await?;

        let store = self.store.clone();
        let (tx_ctx, id_owned) = (ctx.clone(), id.to_string());
        self.db
            .run_in_transaction(
                ctx,
                secrets_tx(move |tx| async move {
                    tx.purge(&tx_ctx, &id_owned).await?;
                    tolerate_not_supported(store.destroy(&tx_ctx, &id_owned).await, "destroy", &id_owned)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to destroy secret"))?;

        info!("secret destroyed successfully");
        Ok(())
    }
}
