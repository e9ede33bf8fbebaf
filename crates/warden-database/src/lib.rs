//! Metadata database for warden.
//!
//! The database is authoritative for metadata, listing and soft-delete state;
//! the vault is authoritative for key material. Each store namespace gets a
//! [`KeysRepository`], a [`SecretsRepository`] and an
//! [`EthAccountsRepository`], all handed out by a [`Database`].
//!
//! Mutations that must stay consistent with a vault call run inside
//! `run_in_transaction`: the closure receives a transactional repository and
//! nothing is committed unless it returns `Ok`.

pub mod memory;
pub mod repository;

pub use memory::MemoryDatabase;
pub use repository::Database;
pub use repository::EthAccountsRepository;
pub use repository::EthAccountsTxFn;
pub use repository::KeysRepository;
pub use repository::KeysTxFn;
pub use repository::SecretsRepository;
pub use repository::SecretsTxFn;
pub use repository::eth_accounts_tx;
pub use repository::keys_tx;
pub use repository::secrets_tx;
