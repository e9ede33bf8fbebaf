//! Shared data model for warden.
//!
//! Entities come in three kinds, each with the same lifecycle [`Metadata`]:
//!
//! - [`Secret`]: an opaque versioned value,
//! - [`Key`]: an asymmetric key whose private half stays in the vault,
//! - [`EthAccount`]: the Ethereum view of a secp256k1 [`Key`], linked to it by
//!   `key_id` and identified by its [`Address`].
//!
//! [`Attributes`] are the input side of create/import/update; [`Context`]
//! carries cancellation and deadlines to the collaborators.

pub mod algorithm;
pub mod attributes;
pub mod context;
pub mod eth_account;
pub mod hash;
pub mod key;
pub mod metadata;
pub mod secret;

pub use algorithm::Algorithm;
pub use algorithm::EllipticCurve;
pub use algorithm::KeyType;
pub use attributes::Attributes;
pub use attributes::CryptoOperation;
pub use attributes::Recovery;
pub use context::Context;
pub use eth_account::EthAccount;
pub use eth_account::address_from_public_key;
pub use ethers_core::types::Address;
pub use hash::keccak256;
pub use key::Key;
pub use metadata::Metadata;
pub use secret::Secret;
