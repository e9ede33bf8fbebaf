use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use warden_core::Context;
use warden_core::Secret;
use warden_errors::Error;
use warden_errors::Result;

use super::Handle;
use super::deleted_not_found;
use super::memory;
use super::not_found;
use super::paginate;
use crate::repository::SecretsRepository;
use crate::repository::SecretsTxFn;

pub(super) struct MemorySecrets(pub(super) Handle);

fn latest(versions: &[Secret], deleted: bool) -> Option<&Secret> {
    versions.iter().rev().find(|secret| secret.metadata.is_deleted() == deleted)
}

impl MemorySecrets {
    async fn latest_rows(&self, deleted: bool) -> Vec<Secret> {
        self.0
            .read(|t| t.secrets.values().filter_map(|versions| latest(versions, deleted)).cloned().collect())
            .await
    }
}

#[async_trait]
impl SecretsRepository for MemorySecrets {
    async fn get(&self, ctx: &Context, id: &str, version: &str) -> Result<Secret> {
        ctx.check()?;
        self.0
            .read(|t| {
                t.secrets.get(id).and_then(|versions| {
                    versions
                        .iter()
                        .find(|secret| secret.metadata.version == version && !secret.metadata.is_deleted())
                        .cloned()
                })
            })
            .await
            .ok_or_else(|| memory(Error::not_found(format!("secret '{id}' version '{version}' not found"))))
    }

    async fn get_deleted(&self, ctx: &Context, id: &str) -> Result<Secret> {
        ctx.check()?;
        self.0
            .read(|t| t.secrets.get(id).and_then(|versions| latest(versions, true)).cloned())
            .await
            .ok_or_else(|| deleted_not_found("secret", id))
    }

    async fn get_latest_version(&self, ctx: &Context, id: &str, deleted: bool) -> Result<String> {
        ctx.check()?;
        self.0
            .read(|t| {
                t.secrets
                    .get(id)
                    .and_then(|versions| latest(versions, deleted))
                    .map(|secret| secret.metadata.version.clone())
            })
            .await
            .ok_or_else(|| if deleted { deleted_not_found("secret", id) } else { not_found("secret", id) })
    }

    async fn list_versions(&self, ctx: &Context, id: &str, deleted: bool) -> Result<Vec<String>> {
        ctx.check()?;
        let versions: Vec<String> = self
            .0
            .read(|t| {
                t.secrets
                    .get(id)
                    .map(|versions| {
                        versions
                            .iter()
                            .filter(|secret| secret.metadata.is_deleted() == deleted)
                            .map(|secret| secret.metadata.version.clone())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .await;
        if versions.is_empty() {
            return Err(if deleted { deleted_not_found("secret", id) } else { not_found("secret", id) });
        }
        Ok(versions)
    }

    async fn get_all(&self, ctx: &Context) -> Result<Vec<Secret>> {
        ctx.check()?;
        Ok(self.latest_rows(false).await)
    }

    async fn get_all_deleted(&self, ctx: &Context) -> Result<Vec<Secret>> {
        ctx.check()?;
        Ok(self.latest_rows(true).await)
    }

    async fn search_ids(&self, ctx: &Context, deleted: bool, limit: u64, offset: u64) -> Result<Vec<String>> {
        ctx.check()?;
        let rows: Vec<_> = self
            .latest_rows(deleted)
            .await
            .into_iter()
            .map(|secret| {
                let created_at = secret.metadata.created_at;
                (created_at, secret.id)
            })
            .collect();
        Ok(paginate(rows, limit, offset))
    }

    async fn add(&self, ctx: &Context, secret: &Secret) -> Result<Secret> {
        ctx.check()?;
        let row = secret.without_value();
        self.0
            .write(|t| {
                let versions = t.secrets.entry(row.id.clone()).or_default();
                if versions.iter().any(|existing| existing.metadata.version == row.metadata.version) {
                    return Err(memory(Error::already_exists(format!(
                        "secret '{}' version '{}' already exists",
                        row.id, row.metadata.version
                    ))));
                }
                versions.push(row.clone());
                Ok(row)
            })
            .await
    }

    async fn update(&self, ctx: &Context, secret: &Secret) -> Result<Secret> {
        ctx.check()?;
        let row = secret.without_value();
        self.0
            .write(|t| {
                let existing = t.secrets.get_mut(&row.id).and_then(|versions| {
                    versions.iter_mut().find(|existing| {
                        existing.metadata.version == row.metadata.version && !existing.metadata.is_deleted()
                    })
                });
                match existing {
                    Some(existing) => {
                        *existing = row.clone();
                        Ok(row)
                    }
                    None => Err(not_found("secret", &row.id)),
                }
            })
            .await
    }

    async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| {
                let versions = t.secrets.get_mut(id).filter(|versions| latest(versions, false).is_some());
                let Some(versions) = versions else {
                    return Err(not_found("secret", id));
                };
                let now = Utc::now();
                versions.iter_mut().for_each(|secret| secret.metadata.mark_deleted(now));
                Ok(())
            })
            .await
    }

    async fn restore(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| {
                let versions = t.secrets.get_mut(id).filter(|versions| latest(versions, true).is_some());
                let Some(versions) = versions else {
                    return Err(deleted_not_found("secret", id));
                };
                let now = Utc::now();
                versions.iter_mut().for_each(|secret| secret.metadata.mark_restored(now));
                Ok(())
            })
            .await
    }

    async fn purge(&self, ctx: &Context, id: &str) -> Result<()> {
        ctx.check()?;
        self.0
            .write(|t| {
                if !t.secrets.get(id).is_some_and(|versions| latest(versions, true).is_some()) {
                    return Err(deleted_not_found("secret", id));
                }
                t.secrets.remove(id);
                Ok(())
            })
            .await
    }

    async fn run_in_transaction(&self, ctx: &Context, f: SecretsTxFn) -> Result<()> {
        self.0.transaction(ctx, |handle| Arc::new(MemorySecrets(handle)) as Arc<dyn SecretsRepository>, f).await
    }
}
