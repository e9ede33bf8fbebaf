//! Warden: a key-management connector layer.
//!
//! Warden sits between callers and pluggable vaults. For every store it
//! keeps the vault (key material, secret values) and a metadata database
//! (listing, soft-delete state, tags) consistent, checks every operation
//! against the caller's permissions, and turns raw vault ECDSA signatures
//! into Ethereum signatures: low-S, with recovery id, for messages, typed
//! data and transactions.
//!
//! # Crates
//!
//! | Crate | Re-exported as |
//! |-------|----------------|
//! | `warden-errors` | [`errors`] |
//! | `warden-core` | [`model`] |
//! | `warden-auth` | [`auth`] |
//! | `warden-stores` | [`stores`] |
//! | `warden-database` | [`database`] |
//! | `warden-connectors` | [`connectors`] |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use warden::auth::PermissionAuthorizator;
//! use warden::auth::UserInfo;
//! use warden::connectors::Connectors;
//! use warden::connectors::ConnectorsConfig;
//! use warden::connectors::Vaults;
//! use warden::database::MemoryDatabase;
//! use warden::model::Attributes;
//! use warden::model::Context;
//! use warden::stores::local::InMemoryBackend;
//! use warden::stores::local::LocalKeyStore;
//! use warden::stores::local::LocalSecretStore;
//!
//! # async fn run() -> warden::Result<()> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let keys = Arc::new(LocalKeyStore::new(backend.clone()));
//! let vaults = Vaults {
//!     secrets: Arc::new(LocalSecretStore::new(backend)),
//!     keys: keys.clone(),
//!     ethereum: keys,
//! };
//! let user = UserInfo::new("alice", "acme").with_permissions(["*:eth_account"]);
//! let auth = Arc::new(PermissionAuthorizator::new(&user));
//! let connectors = Connectors::new("main", &MemoryDatabase::new(), vaults, auth, &ConnectorsConfig::from_env()?);
//!
//! let ctx = Context::background();
//! let account = connectors.eth.create(&ctx, "treasury", &Attributes::new()).await?;
//! let signature = connectors.eth.sign_message(&ctx, account.address, b"hello").await?;
//! assert_eq!(connectors.eth.ec_recover(b"hello", &signature)?, account.address);
//! # Ok(())
//! # }
//! ```

pub use warden_auth as auth;
pub use warden_connectors as connectors;
pub use warden_database as database;
pub use warden_errors as errors;
pub use warden_errors::Error;
pub use warden_errors::Result;
pub use warden_stores as stores;
pub use warden_core as model;
