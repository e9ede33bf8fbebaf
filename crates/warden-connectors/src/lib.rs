//! Entity connectors for warden.
//!
//! A connector is the only way callers touch a store: it checks the caller's
//! permission, talks to the vault ([`KeyStore`] / [`SecretStore`]) and keeps
//! the metadata database in step with it.
//!
//! ```text
//!  caller ──► Authorizator::check ──► vault call ──► Database (in a transaction)
//! ```
//!
//! - [`SecretsConnector`]: versioned secrets.
//! - [`KeysConnector`]: generic signing/encryption keys.
//! - [`EthConnector`]: Ethereum accounts backed by secp256k1 vault keys, with
//!   message, typed data and transaction signing.
//!
//! Create/import write to the vault first and record the entity afterwards;
//! re-running one after a database failure re-attaches the existing vault
//! entry. Update/delete/restore/destroy commit their database change only
//! when the vault call succeeds, where `NotSupported` from the vault counts
//! as success.

pub mod config;
pub mod ethereum;
pub mod keys;
pub mod secrets;
mod vault;

#[cfg(any(test, feature = "testing"))]
pub mod test_mocks;

use std::sync::Arc;

pub use config::ConnectorsConfig;
pub use ethereum::EthConnector;
pub use ethereum::PrivateArgs;
pub use keys::KeysConnector;
pub use secrets::SecretsConnector;
use tracing::debug;
use tracing::warn;
use warden_auth::Authorizator;
use warden_database::Database;
use warden_errors::Result;
use warden_stores::KeyStore;
use warden_stores::SecretStore;

/// Vault stores backing one store namespace.
///
/// Ethereum accounts are secp256k1 keys, so `ethereum` is a [`KeyStore`];
/// it may be the same store as `keys`.
#[derive(Clone)]
pub struct Vaults {
    pub secrets: Arc<dyn SecretStore>,
    pub keys: Arc<dyn KeyStore>,
    pub ethereum: Arc<dyn KeyStore>,
}

/// The three connectors of one store, sharing a database and authorizator.
#[derive(Clone)]
pub struct Connectors {
    pub secrets: SecretsConnector,
    pub keys: KeysConnector,
    pub eth: EthConnector,
}

impl Connectors {
    pub fn new(
        store: &str,
        db: &dyn Database,
        vaults: Vaults,
        auth: Arc<dyn Authorizator>,
        config: &ConnectorsConfig,
    ) -> Self {
        debug!(store, "building connectors");
        Self {
            secrets: SecretsConnector::new(vaults.secrets, db.secrets(store), auth.clone(), config.pagination.clone()),
            keys: KeysConnector::new(vaults.keys, db.keys(store), auth.clone(), config.pagination.clone()),
            eth: EthConnector::new(vaults.ethereum, db.eth_accounts(store), auth, config.clone()),
        }
    }

    /// Like [`Connectors::new`], but only for callers whose tenant may use
    /// the store. An empty `allowed_tenants` makes the store public.
    pub fn open(
        store: &str,
        allowed_tenants: &[String],
        db: &dyn Database,
        vaults: Vaults,
        auth: Arc<dyn Authorizator>,
        config: &ConnectorsConfig,
    ) -> Result<Self> {
        auth.check_access(allowed_tenants)
            .inspect_err(|e| warn!(store, error = %e, "store access denied"))?;
        Ok(Self::new(store, db, vaults, auth, config))
    }
}

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use warden_auth::PermissionAuthorizator;
    use warden_auth::UserInfo;
    use warden_core::Attributes;
    use warden_core::Context;
    use warden_database::MemoryDatabase;
    use warden_stores::local::InMemoryBackend;
    use warden_stores::local::LocalKeyStore;
    use warden_stores::local::LocalSecretStore;

    use super::*;

    fn vaults() -> Vaults {
        let backend = Arc::new(InMemoryBackend::new());
        let keys: Arc<dyn KeyStore> = Arc::new(LocalKeyStore::new(backend.clone()));
        Vaults {
            secrets: Arc::new(LocalSecretStore::new(backend)),
            keys: keys.clone(),
            ethereum: keys,
        }
    }

    fn admin(tenant: &str) -> Arc<dyn Authorizator> {
        Arc::new(PermissionAuthorizator::new(&UserInfo::new("admin", tenant).with_permissions(["*:*"])))
    }

    #[tokio::test]
    async fn test_connectors_share_one_store() {
        init_test_tracing();
        let db = MemoryDatabase::new();
        let connectors = Connectors::new("main", &db, vaults(), admin("acme"), &ConnectorsConfig::default());
        let ctx = Context::background();

        connectors.secrets.set(&ctx, "s", "v", &Attributes::new()).await.unwrap();
        connectors.keys.create(&ctx, "k", &warden_core::Algorithm::ed25519(), &Attributes::new()).await.unwrap();
        let account = connectors.eth.create(&ctx, "eth", &Attributes::new()).await.unwrap();

        assert_eq!(connectors.secrets.list(&ctx, 0, 0).await.unwrap(), vec!["s".to_string()]);
        assert_eq!(connectors.keys.list(&ctx, 0, 0).await.unwrap(), vec!["k".to_string()]);
        assert_eq!(connectors.eth.list(&ctx, 0, 0).await.unwrap(), vec![account.address]);

        let other = Connectors::new("other", &db, vaults(), admin("acme"), &ConnectorsConfig::default());
        assert!(other.secrets.list(&ctx, 0, 0).await.unwrap().is_empty());
    }

    #[test]
    fn test_open_checks_tenancy() {
        let db = MemoryDatabase::new();
        let config = ConnectorsConfig::default();
        let allowed = vec!["acme".to_string()];

        assert!(Connectors::open("main", &allowed, &db, vaults(), admin("acme"), &config).is_ok());
        assert!(Connectors::open("main", &[], &db, vaults(), admin("globex"), &config).is_ok());
        let err = Connectors::open("main", &allowed, &db, vaults(), admin("globex"), &config).err().unwrap();
        assert!(err.is_forbidden());
    }
}
