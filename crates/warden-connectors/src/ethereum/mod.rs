//! Ethereum accounts connector.
//!
//! An account is a secp256k1 key in a [`KeyStore`] plus a database row keyed
//! by its address. Lifecycle operations live here; signing, verification and
//! encryption live in `signing`.

pub mod encoding;
pub mod recovery;
mod signing;

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
use warden_core::Address;
use warden_core::Algorithm;
use warden_core::Attributes;
use warden_core::Context;
use warden_core::EthAccount;
use warden_core::Key;
use warden_database::EthAccountsRepository;
use warden_database::eth_accounts_tx;
use warden_errors::Error;
use warden_errors::Result;
use warden_stores::KeyStore;

pub use self::encoding::PrivateArgs;
use crate::config::ConnectorsConfig;
use crate::vault::attach_existing;
use crate::vault::check_expiry;
use crate::vault::tolerate_not_supported;
use crate::vault::update_attributes;

const fn op(action: Action) -> Operation {
    Operation::new(action, Resource::EthAccount)
}

#[derive(Clone)]
pub struct EthConnector {
    store: Arc<dyn KeyStore>,
    db: Arc<dyn EthAccountsRepository>,
    auth: Arc<dyn Authorizator>,
    config: ConnectorsConfig,
}

impl EthConnector {
    pub fn new(
        store: Arc<dyn KeyStore>,
        db: Arc<dyn EthAccountsRepository>,
        auth: Arc<dyn Authorizator>,
        config: ConnectorsConfig,
    ) -> Self {
        Self { store, db, auth, config }
    }

    /// Generates a secp256k1 key named `key_id` and records its account.
    #[instrument(skip_all, fields(key.id = %key_id))]
    pub async fn create(&self, ctx: &Context, key_id: &str, attr: &Attributes) -> Result<EthAccount> {
        self.auth.check(op(Action::Write))?;

        let created = self.store.create(ctx, key_id, &Algorithm::ethereum(), attr).await;
        let key = attach_existing(created, key_id, || self.store.get(ctx, key_id))
            .await
            .inspect_err(|e| error!(error = %e, "failed to create account key in vault"))?;

        let account = self.add(ctx, &key).await?;
        info!(address = ?account.address, "ethereum account created successfully");
        Ok(account)
    }

    #[instrument(skip_all, fields(key.id = %key_id))]
    pub async fn import(&self, ctx: &Context, key_id: &str, private_key: &[u8], attr: &Attributes) -> Result<EthAccount> {
        self.auth.check(op(Action::Write))?;

        if private_key.is_empty() {
            warn!("rejecting import with empty private key");
            return Err(Error::invalid_parameter("private key must not be empty"));
        }

        let imported = self.store.import(ctx, key_id, private_key, &Algorithm::ethereum(), attr).await;
        let key = attach_existing(imported, key_id, || self.store.get(ctx, key_id))
            .await
            .inspect_err(|e| error!(error = %e, "failed to import account key in vault"))?;

        let account = self.add(ctx, &key).await?;
        info!(address = ?account.address, "ethereum account imported successfully");
        Ok(account)
    }

    async fn add(&self, ctx: &Context, key: &Key) -> Result<EthAccount> {
        let account = EthAccount::from_key(key).inspect_err(|e| error!(error = %e, "vault returned an unusable key"))?;
        self.db
            .add(ctx, &account)
            .await
            .inspect_err(|e| error!(error = %e, "failed to record account metadata"))
    }

    /// The account must also still be present in the vault.
    #[instrument(skip_all, fields(address = ?address))]
    pub async fn get(&self, ctx: &Context, address: Address) -> Result<EthAccount> {
        self.auth.check(op(Action::Read))?;

        let account = self.db.get(ctx, address).await?;
        self.store
            .get(ctx, &account.key_id)
            .await
            .inspect_err(|e| warn!(key.id = %account.key_id, error = %e, "account key missing from vault"))?;

        debug!("ethereum account retrieved");
        Ok(account)
    }

    #[instrument(skip(self, ctx))]
    pub async fn list(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<Address>> {
        self.auth.check(op(Action::Read))?;
        let limit = self.config.pagination.effective_limit(limit);
        self.db.search_addresses(ctx, false, limit, offset).await
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn update(&self, ctx: &Context, address: Address, attr: &Attributes) -> Result<EthAccount> {
        self.auth.check(op(Action::Write))?;

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let (tx_ctx, attr) = (ctx.clone(), update_attributes(attr));
        self.db
            .run_in_transaction(
                ctx,
                eth_accounts_tx(move |tx| async move {
                    let mut account = tx.get(&tx_ctx, address).await?;
                    account.tags = attr.tags.clone();
                    account.metadata.updated_at = Utc::now();
                    let account = tx.update(&tx_ctx, &account).await?;
                    let updated = store.update(&tx_ctx, &account.key_id, &attr).await;
                    tolerate_not_supported(updated, "update", &account.key_id)?;
                    let _ = sender.send(account);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to update ethereum account"))?;

        let account = receiver.await.map_err(|_| Error::internal("account update committed without a result"))?;
        info!("ethereum account updated successfully");
        Ok(account)
    }

    /// Moves the account's expiry, and its key's in the vault.
    #[instrument(skip_all, fields(address = ?address, expire_at = %expire_at))]
    pub async fn refresh(&self, ctx: &Context, address: Address, expire_at: DateTime<Utc>) -> Result<EthAccount> {
        self.auth.check(op(Action::Write))?;
        check_expiry(expire_at).inspect_err(|e| warn!(error = %e, "rejecting refresh"))?;

        let (sender, receiver) = oneshot::channel();
        let store = self.store.clone();
        let tx_ctx = ctx.clone();
        self.db
            .run_in_transaction(
                ctx,
                eth_accounts_tx(move |tx| async move {
                    let mut account = tx.get(&tx_ctx, address).await?;
                    account.metadata.expire_at = Some(expire_at);
                    account.metadata.updated_at = Utc::now();
                    let account = tx.update(&tx_ctx, &account).await?;
                    let refreshed = store.refresh(&tx_ctx, &account.key_id, expire_at).await;
                    tolerate_not_supported(refreshed, "refresh", &account.key_id)?;
                    let _ = sender.send(account);
                    Ok(())
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to refresh ethereum account"))?;

        let account = receiver.await.map_err(|_| Error::internal("account refresh committed without a result"))?;
        info!("ethereum account refreshed successfully");
        Ok(account)
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn delete(&self, ctx: &Context, address: Address) -> Result<()> {
        self.auth.check(op(Action::Delete))?;

        let store = self.store.clone();
        let tx_ctx = ctx.clone();
        self.db
            .run_in_transaction(
                ctx,
                eth_accounts_tx(move |tx| async move {
                    let account = tx.get(&tx_ctx, address).await?;
                    tx.delete(&tx_ctx, address).await?;
                    tolerate_not_supported(store.delete(&tx_ctx, &account.key_id).await, "delete", &account.key_id)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to delete ethereum account"))?;

        info!("ethereum account deleted successfully");
        Ok(())
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn get_deleted(&self, ctx: &Context, address: Address) -> Result<EthAccount> {
        self.auth.check(op(Action::Read))?;
        self.db.get_deleted(ctx, address).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn list_deleted(&self, ctx: &Context, limit: u64, offset: u64) -> Result<Vec<Address>> {
        self.auth.check(op(Action::Read))?;
        let limit = self.config.pagination.effective_limit(limit);
        self.db.search_addresses(ctx, true, limit, offset).await
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn restore(&self, ctx: &Context, address: Address) -> Result<()> {
        self.auth.check(op(Action::Delete))?;
        let key_id = self.db.get_deleted(ctx, address).await?.key_id;

        let store = self.store.clone();
        let tx_ctx = ctx.clone();
        self.db
            .run_in_transaction(
                ctx,
                eth_accounts_tx(move |tx| async move {
                    tx.restore(&tx_ctx, address).await?;
                    tolerate_not_supported(store.restore(&tx_ctx, &key_id).await, "restore", &key_id)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to restore ethereum account"))?;

        info!("ethereum account restored successfully");
        Ok(())
    }

    #[instrument(skip_all, fields(address = ?address))]
    pub async fn destroy(&self, ctx: &Context, address: Address) -> Result<()> {
        self.auth.check(op(Action::Destroy))?;
        let key_id = self.db.get_deleted(ctx, address).await?.key_id;

        let store = self.store.clone();
        let tx_ctx = ctx.clone();
        self.db
            .run_in_transaction(
                ctx,
                eth_accounts_tx(move |tx| async move {
                    tx.purge(&tx_ctx, address).await?;
                    tolerate_not_supported(store.destroy(&tx_ctx, &key_id).await, "destroy", &key_id)
                }),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "failed to destroy ethereum account"))?;

        info!("ethereum account destroyed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use warden_database::Database;
    use warden_database::MemoryDatabase;

    use super::*;
    use crate::test_mocks::ScriptedKeyStore;
    use crate::test_mocks::authorizator;

    pub(super) fn fixture(permissions: &[&str], config: ConnectorsConfig) -> (Arc<ScriptedKeyStore>, EthConnector) {
        let store = Arc::new(ScriptedKeyStore::new());
        let connector = EthConnector::new(
            store.clone(),
            MemoryDatabase::new().eth_accounts("eth-store"),
            authorizator(permissions),
            config,
        );
        (store, connector)
    }

    pub(super) fn generator_private_key() -> [u8; 32] {
        let mut private_key = [0u8; 32];
        private_key[31] = 1;
        private_key
    }

    #[tokio::test]
    async fn test_import_derives_address() {
        let (_, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();

        let account = connector.import(&ctx, "gen", &generator_private_key(), &Attributes::new()).await.unwrap();
        assert_eq!(account.address, Address::from_str("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").unwrap());
        assert_eq!(account.key_id, "gen");
        assert_eq!(connector.get(&ctx, account.address).await.unwrap(), account);
        assert_eq!(connector.list(&ctx, 0, 0).await.unwrap(), vec![account.address]);
    }

    #[tokio::test]
    async fn test_import_empty_key_never_reaches_vault() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let err = connector.import(&Context::background(), "k", &[], &Attributes::new()).await.unwrap_err();
        assert!(err.is_invalid_parameter());
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_requires_vault_key() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let account = connector.create(&ctx, "k", &Attributes::new()).await.unwrap();

        store.fail("get", Error::not_found("key vanished"));
        assert!(connector.get(&ctx, account.address).await.unwrap_err().is_not_found());
        assert!(connector.get(&ctx, Address::repeat_byte(9)).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_tags() {
        let (_, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let account = connector.create(&ctx, "k", &Attributes::new().with_tag("a", "1")).await.unwrap();

        let updated = connector.update(&ctx, account.address, &Attributes::new().with_tag("b", "2")).await.unwrap();
        assert!(updated.tags.contains_key("b"));
        assert!(!updated.tags.contains_key("a"));
        assert_eq!(connector.get(&ctx, account.address).await.unwrap().tags, updated.tags);
    }

    #[tokio::test]
    async fn test_update_keeps_disabled_flag_in_step() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let off = connector.create(&ctx, "off", &Attributes::new().disabled()).await.unwrap().address;
        let on = connector.create(&ctx, "on", &Attributes::new()).await.unwrap().address;

        connector.update(&ctx, off, &Attributes::new().with_tag("a", "1")).await.unwrap();
        connector.update(&ctx, on, &Attributes::new().with_tag("a", "1").disabled()).await.unwrap();

        for (address, key_id, disabled) in [(off, "off", true), (on, "on", false)] {
            assert_eq!(connector.get(&ctx, address).await.unwrap().is_disabled(), disabled);
            assert_eq!(store.get(&ctx, key_id).await.unwrap().is_disabled(), disabled);
        }
    }

    #[tokio::test]
    async fn test_refresh_follows_key_id() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let address = connector.create(&ctx, "k", &Attributes::new()).await.unwrap().address;
        let expire_at = Utc::now() + chrono::Duration::days(90);

        let account = connector.refresh(&ctx, address, expire_at).await.unwrap();
        assert_eq!(account.metadata.expire_at, Some(expire_at));
        assert_eq!(connector.get(&ctx, address).await.unwrap().metadata.expire_at, Some(expire_at));
        assert_eq!(store.get(&ctx, "k").await.unwrap().metadata.expire_at, Some(expire_at));

        store.fail("refresh", Error::not_supported("no expiry support"));
        let later = expire_at + chrono::Duration::days(1);
        connector.refresh(&ctx, address, later).await.unwrap();
        assert_eq!(connector.get(&ctx, address).await.unwrap().metadata.expire_at, Some(later));
        assert_eq!(store.get(&ctx, "k").await.unwrap().metadata.expire_at, Some(expire_at));

        let err = connector.refresh(&ctx, Address::repeat_byte(3), later).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cancelled_context_leaves_account_untouched() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let address = connector.create(&ctx, "k", &Attributes::new()).await.unwrap().address;

        let cancelled = ctx.child();
        cancelled.cancel();
        assert!(connector.create(&cancelled, "other", &Attributes::new()).await.unwrap_err().is_cancelled());
        assert!(connector.delete(&cancelled, address).await.unwrap_err().is_cancelled());
        assert!(connector.sign_message(&cancelled, address, b"hello").await.unwrap_err().is_cancelled());

        assert_eq!(connector.list(&ctx, 0, 0).await.unwrap(), vec![address]);
        assert!(connector.list_deleted(&ctx, 0, 0).await.unwrap().is_empty());
        assert_eq!(store.call_count("delete"), 0);
        assert_eq!(store.call_count("sign"), 0);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let address = connector.create(&ctx, "k", &Attributes::new()).await.unwrap().address;

        connector.delete(&ctx, address).await.unwrap();
        assert!(store.get_deleted(&ctx, "k").await.is_ok());
        assert_eq!(connector.get_deleted(&ctx, address).await.unwrap().key_id, "k");
        assert_eq!(connector.list_deleted(&ctx, 0, 0).await.unwrap(), vec![address]);

        connector.restore(&ctx, address).await.unwrap();
        assert!(connector.get(&ctx, address).await.is_ok());

        connector.delete(&ctx, address).await.unwrap();
        connector.destroy(&ctx, address).await.unwrap();
        assert!(connector.get(&ctx, address).await.unwrap_err().is_not_found());
        assert!(connector.get_deleted(&ctx, address).await.unwrap_err().is_not_found());
        assert!(connector.restore(&ctx, address).await.unwrap_err().is_not_found());
        assert!(store.get_deleted(&ctx, "k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_not_supported_destroy_is_tolerated() {
        let (store, connector) = fixture(&["*:*"], ConnectorsConfig::default());
        let ctx = Context::background();
        let address = connector.create(&ctx, "k", &Attributes::new()).await.unwrap().address;
        store.fail("destroy", Error::not_supported("hsm keeps keys"));

        connector.delete(&ctx, address).await.unwrap();
        connector.destroy(&ctx, address).await.unwrap();
        assert!(connector.get_deleted(&ctx, address).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_forbidden() {
        let (store, connector) = fixture(&["read:eth_account"], ConnectorsConfig::default());
        let ctx = Context::background();
        assert!(connector.create(&ctx, "k", &Attributes::new()).await.unwrap_err().is_forbidden());
        assert!(connector.delete(&ctx, Address::zero()).await.unwrap_err().is_forbidden());
        let err = connector.refresh(&ctx, Address::zero(), Utc::now() + chrono::Duration::days(1)).await.unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(store.total_calls(), 0);
        assert!(connector.list(&ctx, 0, 0).await.unwrap().is_empty());
    }
}
