use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use warden_core::Context;
use warden_core::Key;
use warden_errors::Error;
use warden_errors::Result;

use super::Handle;
use super::deleted_not_found;
use super::memory;
use super::not_found;
use super::paginate;
use crate::repository::KeysRepository;
use crate::repository::KeysTxFn;

pub(super) struct MemoryKeys(pub(super) Handle);

#[async_trait]
impl KeysRepository for MemoryKeys {
    async fn get(&self, ctx: &Context, id: &str) -> Result<Key> {
        ctx.check()?;
        self.0
            .read(|t| t.keys.get(id).filter(|key| !key.metadata.is_deleted()).cloned())
            .await
            .ok_or_else(|| not_found("key", id))
    }

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Key> {
        ctx.check()?;
        self.0
            .read(|t| t.keys.get(id).filter(|key| key.metadata.is_deleted()).cloned())
            .await
            .ok_or_else(|| deleted_not_found("key", id))
    }

    async fn get_all(&self, ctx: &Context) -> Result<Vec<Key>> {
        ctx.check()?;
        Ok(self.0.read(|t| t.keys.values().filter(|key| !key.metadata.is_deleted()).cloned().collect()).await)
    }

    async fn get_all_deleted(&self, ctx: &Context) -> Result<Vec<Key>> {
        ctx.check()?;
        Ok(self.0.read(|t| t.keys.values().filter(|key| key.metadata.is_deleted()).cloned().collect()).await)
    }

    async fn search_ids(&self, ctx: &Context, deleted: bool, limit: u64, offset: u64) -> Result<Vec<String>> {
        ctx.check()?;
        let rows: Vec<_> = self
            .0
            .read(|t| {
                t.keys
                    .values()
                    .filter(|key| key.metadata.is_deleted() == deleted)
                    .map(|key| (key.metadata.created_at, key.id.clone()))
                    .collect()
            })
            .await;
        Ok(paginate(rows, limit, offset))
    }

    async fn add(&self, ctx: &Context, key: &Key) -> Result<Key> {
        ctx.check()?;
        self.0
            .write(|t| {
                if t.keys.contains_key(&key.id) {
                    return Err(memory(Error::already_exists(format!("key '{}' already exists", key.id))));
                }
                t.keys.insert(key.id.clone(), key.clone());
                Ok(key.clone())
            })
            .await
    }

    async fn update(&self, ctx: &Context, key: &Key) -> Result<Key> {
        ctx.check()?;
        self.0
            .write(|t| match t.keys.get_mut(&key.id) {
                Some(row) if !row.metadata.is_deleted() => {
                    *row = key.clone();
                    Ok(key.clone())
                }
                _ => Err(not_found("key", &key.id)),
            })
            .await
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| match t.keys.get_mut(id) {
                Some(row) if !row.metadata.is_deleted() => {
                    row.metadata.mark_deleted(Utc::now());
                    Ok(())
                }
                _ => Err(not_found("key", id)),
            })
            .await
    }

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| match t.keys.get_mut(id) {
                Some(row) if row.metadata.is_deleted() => {
                    row.metadata.mark_restored(Utc::now());
                    Ok(())
                }
                _ => Err(deleted_not_found("key", id)),
            })
            .await
    }

    async fn purge(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| {
                if !t.keys.get(id).is_some_and(|row| row.metadata.is_deleted()) {
                    return Err(deleted_not_found("key", id));
                }
                t.keys.remove(id);
                Ok(())
            })
            .await
    }

    async fn run_in_transaction(&self, ctx: &Context, f: KeysTxFn) -> Result<()> {
        self.0.transaction(ctx, |handle| Arc::new(MemoryKeys(handle)) as Arc<dyn KeysRepository>, f).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use warden_core::Algorithm;
    use warden_core::Metadata;

    use super::*;
    use crate::MemoryDatabase;
    use crate::repository::Database;
    use crate::repository::keys_tx;

    fn key(id: &str) -> Key {
        Key {
            id: id.to_string(),
            public_key: vec![4; 65],
            algorithm: Algorithm::ethereum(),
            tags: HashMap::new(),
            metadata: Metadata::new("1", Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_add_get_update() {
        let repo = MemoryDatabase::new().keys("store");
        let ctx = Context::background();

        repo.add(&ctx, &key("k1")).await.unwrap();
        assert!(repo.add(&ctx, &key("k1")).await.unwrap_err().is_already_exists());

        let mut updated = key("k1");
        updated.tags.insert("env".into(), "prod".into());
        repo.update(&ctx, &updated).await.unwrap();
        assert_eq!(repo.get(&ctx, "k1").await.unwrap().tags, updated.tags);

        assert!(repo.get(&ctx, "missing").await.unwrap_err().is_not_found());
        assert!(repo.update(&ctx, &key("missing")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_soft_delete_and_purge() {
        let repo = MemoryDatabase::new().keys("store");
        let ctx = Context::background();
        repo.add(&ctx, &key("k1")).await.unwrap();

        assert!(repo.purge(&ctx, "k1").await.unwrap_err().is_not_found());
        repo.delete(&ctx, "k1").await.unwrap();
        assert!(repo.get(&ctx, "k1").await.unwrap_err().is_not_found());
        assert!(repo.get_deleted(&ctx, "k1").await.unwrap().metadata.is_deleted());
        assert!(repo.add(&ctx, &key("k1")).await.unwrap_err().is_already_exists());
        assert_eq!(repo.search_ids(&ctx, true, 0, 0).await.unwrap(), vec!["k1"]);
        assert!(repo.search_ids(&ctx, false, 0, 0).await.unwrap().is_empty());

        repo.restore(&ctx, "k1").await.unwrap();
        assert!(repo.get(&ctx, "k1").await.is_ok());

        repo.delete(&ctx, "k1").await.unwrap();
        repo.purge(&ctx, "k1").await.unwrap();
        assert!(repo.get_deleted(&ctx, "k1").await.unwrap_err().is_not_found());
        assert!(repo.get_all_deleted(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let db = MemoryDatabase::new();
        let ctx = Context::background();
        db.keys("a").add(&ctx, &key("k1")).await.unwrap();

        assert!(db.keys("b").get(&ctx, "k1").await.unwrap_err().is_not_found());
        db.keys("b").add(&ctx, &key("k1")).await.unwrap();
        assert_eq!(db.keys("a").get_all(&ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_commits_on_success() {
        let repo = MemoryDatabase::new().keys("store");
        let ctx = Context::background();
        repo.add(&ctx, &key("k1")).await.unwrap();

        let tx_ctx = ctx.clone();
        repo.run_in_transaction(
            &ctx,
            keys_tx(move |tx| async move {
                tx.delete(&tx_ctx, "k1").await?;
                // The transaction sees its own writes.
                tx.get_deleted(&tx_ctx, "k1").await?;
                Ok(())
            }),
        )
        .await
        .unwrap();

        assert!(repo.get_deleted(&ctx, "k1").await.is_ok());
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let repo = MemoryDatabase::new().keys("store");
        let ctx = Context::background();
        repo.add(&ctx, &key("k1")).await.unwrap();

        let tx_ctx = ctx.clone();
        let err = repo
            .run_in_transaction(
                &ctx,
                keys_tx(move |tx| async move {
                    tx.delete(&tx_ctx, "k1").await?;
                    Err(Error::dependency_failure("vault unavailable"))
                }),
            )
            .await
            .unwrap_err();

        assert!(err.is_dependency_failure());
        assert!(repo.get(&ctx, "k1").await.is_ok());
        assert!(repo.get_deleted(&ctx, "k1").await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let repo = MemoryDatabase::new().keys("store");
        let ctx = Context::background();
        ctx.cancel();
        assert!(repo.add(&ctx, &key("k1")).await.unwrap_err().is_cancelled());
    }
}
