use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use warden_core::Address;
use warden_core::Context;
use warden_core::EthAccount;
use warden_errors::Error;
use warden_errors::Result;

use super::Handle;
use super::deleted_not_found;
use super::memory;
use super::not_found;
use super::paginate;
use crate::repository::EthAccountsRepository;
use crate::repository::EthAccountsTxFn;

pub(super) struct MemoryEthAccounts(pub(super) Handle);

fn account_id(address: &Address) -> String {
    format!("{address:?}")
}

#[async_trait]
impl EthAccountsRepository for MemoryEthAccounts {
    async fn get(&self, ctx: &Context, address: Address) -> Result<EthAccount> {
        ctx.check()?;
        self.0
            .read(|t| t.eth_accounts.get(&address).filter(|account| !account.metadata.is_deleted()).cloned())
            .await
            .ok_or_else(|| not_found("account", account_id(&address)))
    }

    async fn get_deleted(&self, ctx: &Context, address: Address) -> Result<EthAccount> {
        ctx.check()?;
        self.0
            .read(|t| t.eth_accounts.get(&address).filter(|account| account.metadata.is_deleted()).cloned())
            .await
            .ok_or_else(|| deleted_not_found("account", account_id(&address)))
    }

    async fn get_all(&self, ctx: &Context) -> Result<Vec<EthAccount>> {
        ctx.check()?;
        Ok(self
            .0
            .read(|t| t.eth_accounts.values().filter(|account| !account.metadata.is_deleted()).cloned().collect())
            .await)
    }

    async fn get_all_deleted(&self, ctx: &Context) -> Result<Vec<EthAccount>> {
        ctx.check()?;
        Ok(self
            .0
            .read(|t| t.eth_accounts.values().filter(|account| account.metadata.is_deleted()).cloned().collect())
            .await)
    }

    async fn search_addresses(&self, ctx: &Context, deleted: bool, limit: u64, offset: u64) -> Result<Vec<Address>> {
        ctx.check()?;
        let rows: Vec<_> = self
            .0
            .read(|t| {
                t.eth_accounts
                    .values()
                    .filter(|account| account.metadata.is_deleted() == deleted)
                    .map(|account| (account.metadata.created_at, account.address))
                    .collect()
            })
            .await;
        Ok(paginate(rows, limit, offset))
    }

    async fn add(&self, ctx: &Context, account: &EthAccount) -> Result<EthAccount> {
        ctx.check()?;
        self.0
            .write(|t| {
                if t.eth_accounts.contains_key(&account.address) {
                    return Err(memory(Error::already_exists(format!(
                        "account '{}' already exists",
                        account_id(&account.address)
                    ))));
                }
                t.eth_accounts.insert(account.address, account.clone());
                Ok(account.clone())
            })
            .await
    }

    async fn update(&self, ctx: &Context, account: &EthAccount) -> Result<EthAccount> {
        ctx.check()?;
        self.0
            .write(|t| match t.eth_accounts.get_mut(&account.address) {
                Some(row) if !row.metadata.is_deleted() => {
                    *row = account.clone();
                    Ok(account.clone())
                }
                _ => Err(not_found("account", account_id(&account.address))),
            })
            .await
    }

    async fn delete(&self, ctx: &Context, address: Address) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| match t.eth_accounts.get_mut(&address) {
                Some(row) if !row.metadata.is_deleted() => {
                    row.metadata.mark_deleted(Utc::now());
                    Ok(())
                }
                _ => Err(not_found("account", account_id(&address))),
            })
            .await
    }

    async fn restore(&self, ctx: &Context, address: Address) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| match t.eth_accounts.get_mut(&address) {
                Some(row) if row.metadata.is_deleted() => {
                    row.metadata.mark_restored(Utc::now());
                    Ok(())
                }
                _ => Err(deleted_not_found("account", account_id(&address))),
            })
            .await
    }

    async fn purge(&self, ctx: &Context, address: Address) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| {
                if !t.eth_accounts.get(&address).is_some_and(|row| row.metadata.is_deleted()) {
                    return Err(deleted_not_found("account", account_id(&address)));
                }
                t.eth_accounts.remove(&address);
                Ok(())
            })
            .await
    }

    async fn run_in_transaction(&self, ctx: &Context, f: EthAccountsTxFn) -> Result<()> {
        self.0
            .transaction(ctx, |handle| Arc::new(MemoryEthAccounts(handle)) as Arc<dyn EthAccountsRepository>, f)
            .await
    }
}
