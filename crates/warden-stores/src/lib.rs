//! Vault store capability sets.
//!
//! A vault store is the system of record for cryptographic material. Each
//! backend implements [`KeyStore`] and/or [`SecretStore`]; anything it cannot
//! do fails with `NotSupported`. Ethereum accounts are ECDSA/secp256k1 keys
//! in a [`KeyStore`].
//!
//! [`local`] is an in-process backend for tests and development.

pub mod crypto;
pub mod keys;
pub mod local;
pub mod secrets;

pub use keys::KeyStore;
pub use secrets::SecretStore;
