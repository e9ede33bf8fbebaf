//! Property-based tests for the in-memory metadata database.
//!
//! Covers:
//! - a failed transaction leaves no trace
//! - a committed transaction equals the same operations applied directly
//! - search pagination visits every id exactly once

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use warden_core::Algorithm;
use warden_core::Context;
use warden_core::Key;
use warden_core::Metadata;
use warden_database::Database;
use warden_database::KeysRepository;
use warden_database::MemoryDatabase;
use warden_database::keys_tx;
use warden_errors::Error;
use warden_errors::Result;

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    Delete(String),
    Restore(String),
    Purge(String),
}

fn key_id() -> impl Strategy<Value = String> {
    "k[0-4]"
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        key_id().prop_map(Op::Add),
        key_id().prop_map(Op::Delete),
        key_id().prop_map(Op::Restore),
        key_id().prop_map(Op::Purge),
    ]
}

fn key(id: &str) -> Key {
    Key {
        id: id.to_string(),
        public_key: vec![4; 65],
        algorithm: Algorithm::ethereum(),
        tags: HashMap::new(),
        metadata: Metadata::new("1", Utc::now()),
    }
}

/// Applies `ops`, ignoring individual failures.
async fn apply(repo: &dyn KeysRepository, ctx: &Context, ops: &[Op]) {
    for op in ops {
        let _ = match op {
            Op::Add(id) => repo.add(ctx, &key(id)).await.map(|_| ()),
            Op::Delete(id) => repo.delete(ctx, id).await,
            Op::Restore(id) => repo.restore(ctx, id).await,
            Op::Purge(id) => repo.purge(ctx, id).await,
        };
    }
}

async fn snapshot(repo: &dyn KeysRepository, ctx: &Context) -> Result<(Vec<String>, Vec<String>)> {
    Ok((repo.search_ids(ctx, false, 0, 0).await?, repo.search_ids(ctx, true, 0, 0).await?))
}

fn sorted((mut live, mut deleted): (Vec<String>, Vec<String>)) -> (Vec<String>, Vec<String>) {
    live.sort();
    deleted.sort();
    (live, deleted)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_proptest_failed_transaction_is_invisible(
        setup in prop::collection::vec(op(), 0..10),
        inside in prop::collection::vec(op(), 1..10),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = Context::background();
            let repo = MemoryDatabase::new().keys("store");
            apply(repo.as_ref(), &ctx, &setup).await;
            let before = snapshot(repo.as_ref(), &ctx).await.unwrap();

            let tx_ctx = ctx.clone();
            let err = repo
                .run_in_transaction(&ctx, keys_tx(move |tx| async move {
                    apply(tx.as_ref(), &tx_ctx, &inside).await;
                    Err(Error::dependency_failure("abort"))
                }))
                .await
                .unwrap_err();

            prop_assert!(err.is_dependency_failure());
            prop_assert_eq!(snapshot(repo.as_ref(), &ctx).await.unwrap(), before);
            Ok(())
        })?;
    }

    #[test]
    fn test_proptest_committed_transaction_matches_direct(
        ops in prop::collection::vec(op(), 0..16),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = Context::background();

            let direct = MemoryDatabase::new().keys("store");
            apply(direct.as_ref(), &ctx, &ops).await;

            let transactional = MemoryDatabase::new().keys("store");
            let tx_ctx = ctx.clone();
            transactional
                .run_in_transaction(&ctx, keys_tx(move |tx| async move {
                    apply(tx.as_ref(), &tx_ctx, &ops).await;
                    Ok(())
                }))
                .await
                .unwrap();

            prop_assert_eq!(
                sorted(snapshot(direct.as_ref(), &ctx).await.unwrap()),
                sorted(snapshot(transactional.as_ref(), &ctx).await.unwrap())
            );
            Ok(())
        })?;
    }

    #[test]
    fn test_proptest_pagination_is_complete(count in 0usize..20, limit in 1u64..7) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ctx = Context::background();
            let repo = MemoryDatabase::new().keys("store");
            for i in 0..count {
                repo.add(&ctx, &key(&format!("key-{i:02}"))).await.unwrap();
            }

            let all = repo.search_ids(&ctx, false, 0, 0).await.unwrap();
            let mut paged = Vec::new();
            let mut offset = 0;
            loop {
                let page = repo.search_ids(&ctx, false, limit, offset).await.unwrap();
                prop_assert!(page.len() as u64 <= limit);
                if page.is_empty() {
                    break;
                }
                offset += page.len() as u64;
                paged.extend(page);
            }

            prop_assert_eq!(paged, all);
            prop_assert_eq!(offset as usize, count);
            Ok(())
        })?;
    }
}
