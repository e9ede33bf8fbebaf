//! Property-based tests for the entity lifecycle shared by all connectors.
//!
//! Each case runs against the in-memory database and a scripted vault, so
//! tests can inject `NotSupported` answers and count vault calls:
//! - Create is idempotent against the vault (orphan keys are re-attached)
//! - Delete then Restore brings an entity back
//! - Destroy is terminal
//! - `NotSupported` from the vault never fails Update/Refresh/Delete/Restore/Destroy
use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use warden::connectors::KeysConnector;
use warden::connectors::SecretsConnector;
use warden::connectors::config::PaginationConfig;
use warden::connectors::test_mocks::ScriptedKeyStore;
use warden::connectors::test_mocks::ScriptedSecretStore;
use warden::connectors::test_mocks::authorizator;
use warden::database::Database;
use warden::database::MemoryDatabase;
use warden::model::Algorithm;
use warden::model::Attributes;
use warden::model::Context;
use warden::model::keccak256;
use warden::stores::KeyStore;

fn arbitrary_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

fn arbitrary_tags() -> impl Strategy<Value = HashMap<String, String>> {
    prop::collection::hash_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}", 0..4)
}

fn keys_fixture() -> (Arc<ScriptedKeyStore>, KeysConnector) {
    let store = Arc::new(ScriptedKeyStore::new());
    let connector = KeysConnector::new(
        store.clone(),
        MemoryDatabase::new().keys("proptest"),
        authorizator(&["*:*"]),
        PaginationConfig::default(),
    );
    (store, connector)
}

fn secrets_fixture() -> (Arc<ScriptedSecretStore>, SecretsConnector) {
    let store = Arc::new(ScriptedSecretStore::new());
    let connector = SecretsConnector::new(
        store.clone(),
        MemoryDatabase::new().secrets("proptest"),
        authorizator(&["*:*"]),
        PaginationConfig::default(),
    );
    (store, connector)
}

fn fail(err: warden::Error) -> TestCaseError {
    TestCaseError::fail(err.to_string())
}

// Test 1: Create is idempotent against the vault
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn test_create_reattaches_vault_key(id in arbitrary_id()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, connector) = keys_fixture();
            let ctx = Context::background();

            // A previous create reached the vault but never the database.
            let orphan = store
                .create(&ctx, &id, &Algorithm::ethereum(), &Attributes::new())
                .await
                .map_err(fail)?;

            let key = connector
                .create(&ctx, &id, &Algorithm::ethereum(), &Attributes::new())
                .await
                .map_err(fail)?;
            prop_assert_eq!(&key.public_key, &orphan.public_key);
            prop_assert_eq!(store.call_count("get"), 1);

            // The second attempt is rejected by the database, not re-created.
            let err = connector
                .create(&ctx, &id, &Algorithm::ethereum(), &Attributes::new())
                .await
                .unwrap_err();
            prop_assert!(err.is_already_exists(), "unexpected error: {}", err);
            prop_assert_eq!(connector.get(&ctx, &id).await.map_err(fail)?.public_key, orphan.public_key);

            Ok::<(), TestCaseError>(())
        })?;
    }
}

// Test 2: Delete then Restore round-trips
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn test_delete_restore_round_trip(
        id in arbitrary_id(),
        value in "[a-zA-Z0-9]{1,32}",
        tags in arbitrary_tags(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (_, connector) = secrets_fixture();
            let ctx = Context::background();
            let created = connector
                .set(&ctx, &id, &value, &Attributes::new().with_tags(tags.clone()))
                .await
                .map_err(fail)?;

            connector.delete(&ctx, &id).await.map_err(fail)?;
            prop_assert!(connector.get(&ctx, &id, None).await.unwrap_err().is_not_found());
            prop_assert_eq!(connector.list_deleted(&ctx, 0, 0).await.map_err(fail)?, vec![id.clone()]);

            connector.restore(&ctx, &id).await.map_err(fail)?;
            let restored = connector.get(&ctx, &id, None).await.map_err(fail)?;
            prop_assert_eq!(restored.value.as_deref(), Some(value.as_str()));
            prop_assert_eq!(&restored.tags, &tags);
            prop_assert_eq!(restored.metadata.version, created.metadata.version);
            prop_assert!(connector.get_deleted(&ctx, &id).await.unwrap_err().is_not_found());

            Ok::<(), TestCaseError>(())
        })?;
    }
}

// Test 3: Destroy is terminal
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn test_destroy_is_terminal(id in arbitrary_id(), ed25519 in any::<bool>()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, connector) = keys_fixture();
            let ctx = Context::background();
            let algorithm = if ed25519 { Algorithm::ed25519() } else { Algorithm::ethereum() };
            connector.create(&ctx, &id, &algorithm, &Attributes::new()).await.map_err(fail)?;

            // Destroy needs a prior delete.
            prop_assert!(connector.destroy(&ctx, &id).await.unwrap_err().is_not_found());

            connector.delete(&ctx, &id).await.map_err(fail)?;
            connector.destroy(&ctx, &id).await.map_err(fail)?;

            prop_assert!(connector.get(&ctx, &id).await.unwrap_err().is_not_found());
            prop_assert!(connector.get_deleted(&ctx, &id).await.unwrap_err().is_not_found());
            prop_assert!(connector.restore(&ctx, &id).await.unwrap_err().is_not_found());
            prop_assert!(store.get_deleted(&ctx, &id).await.unwrap_err().is_not_found());
            prop_assert!(connector.list_deleted(&ctx, 0, 0).await.map_err(fail)?.is_empty());

            Ok::<(), TestCaseError>(())
        })?;
    }
}

// Test 4: NotSupported vault answers are tolerated
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn test_not_supported_is_tolerated(id in arbitrary_id(), tags in arbitrary_tags()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, connector) = keys_fixture();
            let ctx = Context::background();
            connector.create(&ctx, &id, &Algorithm::ethereum(), &Attributes::new()).await.map_err(fail)?;
            for method in ["update", "refresh", "delete", "restore", "destroy"] {
                store.fail(method, warden::Error::not_supported("capability not available"));
            }

            let updated = connector
                .update(&ctx, &id, &Attributes::new().with_tags(tags.clone()))
                .await
                .map_err(fail)?;
            prop_assert_eq!(&updated.tags, &tags);
            prop_assert_eq!(&connector.get(&ctx, &id).await.map_err(fail)?.tags, &tags);

            let expire_at = chrono::Utc::now() + chrono::Duration::days(1);
            let refreshed = connector.refresh(&ctx, &id, expire_at).await.map_err(fail)?;
            prop_assert_eq!(refreshed.metadata.expire_at, Some(expire_at));

            connector.delete(&ctx, &id).await.map_err(fail)?;
            prop_assert!(connector.get(&ctx, &id).await.unwrap_err().is_not_found());
            // The vault kept its copy live.
            prop_assert!(store.get(&ctx, &id).await.is_ok());

            connector.restore(&ctx, &id).await.map_err(fail)?;
            prop_assert!(connector.get(&ctx, &id).await.is_ok());

            connector.delete(&ctx, &id).await.map_err(fail)?;
            connector.destroy(&ctx, &id).await.map_err(fail)?;
            prop_assert!(connector.get_deleted(&ctx, &id).await.unwrap_err().is_not_found());
            prop_assert_eq!(store.call_count("destroy"), 1);

            Ok::<(), TestCaseError>(())
        })?;
    }
}

// Test 5: any other vault failure rolls the database back
proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]
    #[test]
    fn test_vault_failure_rolls_back(id in arbitrary_id()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (store, connector) = keys_fixture();
            let ctx = Context::background();
            connector.create(&ctx, &id, &Algorithm::ethereum(), &Attributes::new()).await.map_err(fail)?;
            store.fail("delete", warden::Error::dependency_failure("vault unreachable"));

            let err = connector.delete(&ctx, &id).await.unwrap_err();
            prop_assert!(err.is_dependency_failure());
            prop_assert!(connector.get(&ctx, &id).await.is_ok());
            prop_assert!(connector.get_deleted(&ctx, &id).await.unwrap_err().is_not_found());

            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn test_sign_and_verify_tagged_secp256k1_key() {
    let (store, connector) = keys_fixture();
    let ctx = Context::background();
    let key = connector
        .create(&ctx, "signer", &Algorithm::ethereum(), &Attributes::new().with_tag("env", "test"))
        .await
        .unwrap();
    assert_eq!(key.tags.get("env").map(String::as_str), Some("test"));

    let digest = keccak256(b"hello");
    let signature = connector.sign(&ctx, "signer", &digest, None).await.unwrap();
    connector
        .verify(&ctx, &key.public_key, &digest, &signature, &Algorithm::ethereum())
        .await
        .unwrap();
    assert_eq!(store.call_count("verify"), 1);
}

#[tokio::test]
async fn test_get_unknown_key_is_not_found() {
    let (store, connector) = keys_fixture();
    let err = connector.get(&Context::background(), "never-created").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn test_import_empty_private_key_never_reaches_vault() {
    let (store, connector) = keys_fixture();
    let err = connector
        .import(&Context::background(), "empty", &[], &Algorithm::ethereum(), &Attributes::new())
        .await
        .unwrap_err();
    assert!(err.is_invalid_parameter());
    assert_eq!(store.total_calls(), 0);
}
