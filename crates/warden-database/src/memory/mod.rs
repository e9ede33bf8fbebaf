//! In-memory metadata database.
//!
//! All stores share one table set. A transaction runs against a private copy
//! of the tables that replaces the committed set only when the transaction's
//! closure succeeds. One writer at a time: plain writes and whole
//! transactions take the same writer lock, readers never wait for it.

mod eth_accounts;
mod keys;
mod secrets;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;
use warden_core::Address;
use warden_core::Context;
use warden_core::EthAccount;
use warden_core::Key;
use warden_core::Secret;
use warden_errors::Backend;
use warden_errors::Error;
use warden_errors::Result;

use self::eth_accounts::MemoryEthAccounts;
use self::keys::MemoryKeys;
use self::secrets::MemorySecrets;
use crate::repository::Database;
use crate::repository::EthAccountsRepository;
use crate::repository::KeysRepository;
use crate::repository::SecretsRepository;

#[derive(Debug, Clone, Default)]
struct StoreTables {
    keys: HashMap<String, Key>,
    /// Versions of each secret in insertion order.
    secrets: HashMap<String, Vec<Secret>>,
    eth_accounts: HashMap<Address, EthAccount>,
}

type Tables = HashMap<String, StoreTables>;

#[derive(Debug, Default)]
struct Shared {
    committed: RwLock<Tables>,
    writer: Mutex<()>,
}

/// Shared, cloneable in-memory database.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, store: &str) -> Handle {
        Handle {
            shared: self.shared.clone(),
            store: store.to_string(),
            tx: None,
        }
    }
}

impl Database for MemoryDatabase {
    fn keys(&self, store: &str) -> Arc<dyn KeysRepository> {
        Arc::new(MemoryKeys(self.handle(store)))
    }

    fn secrets(&self, store: &str) -> Arc<dyn SecretsRepository> {
        Arc::new(MemorySecrets(self.handle(store)))
    }

    fn eth_accounts(&self, store: &str) -> Arc<dyn EthAccountsRepository> {
        Arc::new(MemoryEthAccounts(self.handle(store)))
    }
}

/// Access to one store's tables, either committed or inside a transaction.
#[derive(Debug, Clone)]
struct Handle {
    shared: Arc<Shared>,
    store: String,
    tx: Option<Arc<Mutex<Tables>>>,
}

impl Handle {
    async fn read<T>(&self, f: impl FnOnce(&StoreTables) -> T + Send) -> T {
        let empty = StoreTables::default();
        match &self.tx {
            Some(tx) => {
                let tables = tx.lock().await;
                f(tables.get(&self.store).unwrap_or(&empty))
            }
            None => {
                let tables = self.shared.committed.read().await;
                f(tables.get(&self.store).unwrap_or(&empty))
            }
        }
    }

    /// `f` must check before it mutates: an error leaves the tables as they were.
    async fn write<T>(&self, f: impl FnOnce(&mut StoreTables) -> Result<T> + Send) -> Result<T> {
        match &self.tx {
            Some(tx) => {
                let mut tables = tx.lock().await;
                f(tables.entry(self.store.clone()).or_default())
            }
            None => {
                let _writer = self.shared.writer.lock().await;
                let mut tables = self.shared.committed.write().await;
                f(tables.entry(self.store.clone()).or_default())
            }
        }
    }

    /// Nested transactions join the enclosing one.
    async fn transaction<R: ?Sized>(
        &self,
        ctx: &Context,
        wrap: fn(Handle) -> Arc<R>,
        f: Box<dyn FnOnce(Arc<R>) -> BoxFuture<'static, Result<()>> + Send>,
    ) -> Result<()> {
        ctx.check()?;
        if self.tx.is_some() {
            return f(wrap(self.clone())).await;
        }

        let _writer = self.shared.writer.lock().await;
        let snapshot = self.shared.committed.read().await.clone();
        let tx = Arc::new(Mutex::new(snapshot));
        let handle = Handle {
            shared: self.shared.clone(),
            store: self.store.clone(),
            tx: Some(tx.clone()),
        };

        if let Err(e) = f(wrap(handle)).await {
            debug!(store = %self.store, error = %e, "transaction rolled back");
            return Err(e);
        }
        if let Err(e) = ctx.check() {
            debug!(store = %self.store, "transaction rolled back, context done before commit");
            return Err(e);
        }

        let tables = std::mem::take(&mut *tx.lock().await);
        *self.shared.committed.write().await = tables;
        debug!(store = %self.store, "transaction committed");
        Ok(())
    }
}

fn memory(err: Error) -> Error {
    err.with_backend(Backend::Memory)
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> Error {
    memory(Error::not_found(format!("{kind} '{id}' not found")))
}

fn deleted_not_found(kind: &str, id: impl std::fmt::Display) -> Error {
    memory(Error::not_found(format!("deleted {kind} '{id}' not found")))
}

/// Orders by creation time then id and applies `limit`/`offset`.
/// `limit = 0` means no limit.
fn paginate<I: Ord>(mut rows: Vec<(DateTime<Utc>, I)>, limit: u64, offset: u64) -> Vec<I> {
    rows.sort();
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = match limit {
        0 => usize::MAX,
        n => usize::try_from(n).unwrap_or(usize::MAX),
    };
    rows.into_iter().skip(offset).take(limit).map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_paginate_orders_by_creation_then_id() {
        let t0 = Utc::now();
        let rows = vec![
            (t0 + Duration::seconds(2), "a".to_string()),
            (t0, "c".to_string()),
            (t0, "b".to_string()),
        ];
        assert_eq!(paginate(rows.clone(), 0, 0), vec!["b", "c", "a"]);
        assert_eq!(paginate(rows.clone(), 1, 1), vec!["c"]);
        assert!(paginate(rows, 5, 3).is_empty());
    }
}
