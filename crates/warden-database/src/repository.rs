use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use warden_core::Address;
use warden_core::Context;
use warden_core::EthAccount;
use warden_core::Key;
use warden_core::Secret;
use warden_errors::Result;

/// Work run inside [`KeysRepository::run_in_transaction`], handed a
/// transactional repository.
pub type KeysTxFn = Box<dyn FnOnce(Arc<dyn KeysRepository>) -> BoxFuture<'static, Result<()>> + Send>;
pub type SecretsTxFn = Box<dyn FnOnce(Arc<dyn SecretsRepository>) -> BoxFuture<'static, Result<()>> + Send>;
pub type EthAccountsTxFn = Box<dyn FnOnce(Arc<dyn EthAccountsRepository>) -> BoxFuture<'static, Result<()>> + Send>;

/// Boxes an async closure as a [`KeysTxFn`].
pub fn keys_tx<F, Fut>(f: F) -> KeysTxFn
where
    F: FnOnce(Arc<dyn KeysRepository>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move |repo: Arc<dyn KeysRepository>| f(repo).boxed())
}

pub fn secrets_tx<F, Fut>(f: F) -> SecretsTxFn
where
    F: FnOnce(Arc<dyn SecretsRepository>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move |repo: Arc<dyn SecretsRepository>| f(repo).boxed())
}

pub fn eth_accounts_tx<F, Fut>(f: F) -> EthAccountsTxFn
where
    F: FnOnce(Arc<dyn EthAccountsRepository>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Box::new(move |repo: Arc<dyn EthAccountsRepository>| f(repo).boxed())
}

/// Key metadata, keyed by id.
///
/// `get`/`update`/`delete` see live rows only, `get_deleted`/`restore`/`purge`
/// deleted ones. Missing rows are `NotFound`.
#[async_trait]
pub trait KeysRepository: Send + Sync {
    async fn get(&self, ctx: &Context, id: &str) -> Result<Key>;

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Key>;

    async fn get_all(&self, ctx: &Context) -> Result<Vec<Key>>;

    async fn get_all_deleted(&self, ctx: &Context) -> Result<Vec<Key>>;

    /// Ids ordered by creation time, then id. `limit = 0` means no limit.
    async fn search_ids(&self, ctx: &Context, deleted: bool, limit: u64, offset: u64) -> Result<Vec<String>>;

    /// `AlreadyExists` if the id is taken, deleted rows included.
    async fn add(&self, ctx: &Context, key: &Key) -> Result<Key>;

    async fn update(&self, ctx: &Context, key: &Key) -> Result<Key>;

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()>;

    /// Removes a deleted row for good.
    async fn purge(&self, ctx: &Context, id: &str) -> Result<()>;

    /// Commits only when `f` succeeds; `f`'s error is returned unchanged.
    async fn run_in_transaction(&self, ctx: &Context, f: KeysTxFn) -> Result<()>;
}

/// Secret metadata, one row per `(id, version)`. Values are never stored.
#[async_trait]
pub trait SecretsRepository: Send + Sync {
    async fn get(&self, ctx: &Context, id: &str, version: &str) -> Result<Secret>;

    /// Latest version of a deleted secret.
    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Secret>;

    async fn get_latest_version(&self, ctx: &Context, id: &str, deleted: bool) -> Result<String>;

    /// Versions in creation order.
    async fn list_versions(&self, ctx: &Context, id: &str, deleted: bool) -> Result<Vec<String>>;

    /// Latest live version of every secret.
    async fn get_all(&self, ctx: &Context) -> Result<Vec<Secret>>;

    async fn get_all_deleted(&self, ctx: &Context) -> Result<Vec<Secret>>;

    async fn search_ids(&self, ctx: &Context, deleted: bool, limit: u64, offset: u64) -> Result<Vec<String>>;

    async fn add(&self, ctx: &Context, secret: &Secret) -> Result<Secret>;

    /// Replaces the row of `secret.metadata.version`.
    async fn update(&self, ctx: &Context, secret: &Secret) -> Result<Secret>;

    /// Acts on every version of `id`.
    async fn delete(&self, ctx: &Context, id: &str) -> Result<()>;

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()>;

    async fn purge(&self, ctx: &Context, id: &str) -> Result<()>;

    async fn run_in_transaction(&self, ctx: &Context, f: SecretsTxFn) -> Result<()>;
}

/// Ethereum account metadata, keyed by address.
#[async_trait]
pub trait EthAccountsRepository: Send + Sync {
    async fn get(&self, ctx: &Context, address: Address) -> Result<EthAccount>;

    async fn get_deleted(&self, ctx: &Context, address: Address) -> Result<EthAccount>;

    async fn get_all(&self, ctx: &Context) -> Result<Vec<EthAccount>>;

    async fn get_all_deleted(&self, ctx: &Context) -> Result<Vec<EthAccount>>;

    async fn search_addresses(&self, ctx: &Context, deleted: bool, limit: u64, offset: u64) -> Result<Vec<Address>>;

    async fn add(&self, ctx: &Context, account: &EthAccount) -> Result<EthAccount>;

    async fn update(&self, ctx: &Context, account: &EthAccount) -> Result<EthAccount>;

    async fn delete(&self, ctx: &Context, address: Address) -> Result<()>;

    async fn restore(&self, ctx: &Context, address: Address) -> Result<()>;

    async fn purge(&self, ctx: &Context, address: Address) -> Result<()>;

    async fn run_in_transaction(&self, ctx: &Context, f: EthAccountsTxFn) -> Result<()>;
}

/// Hands out the repositories of one store namespace.
pub trait Database: Send + Sync {
    fn keys(&self, store: &str) -> Arc<dyn KeysRepository>;

    fn secrets(&self, store: &str) -> Arc<dyn SecretsRepository>;

    fn eth_accounts(&self, store: &str) -> Arc<dyn EthAccountsRepository>;
}
