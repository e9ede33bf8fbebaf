//! In-process vault backend.
//!
//! Keeps key material and secret values in a [`StorageBackend`], serialized
//! with postcard. Used in tests and for local development; errors are
//! attributed to [`Backend::Local`].

mod backend;
mod keys;
mod secrets;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use warden_core::Attributes;
use warden_errors::Backend;
use warden_errors::Error;
use warden_errors::Result;

pub use self::backend::InMemoryBackend;
pub use self::backend::StorageBackend;
pub use self::keys::LocalKeyStore;
pub use self::secrets::LocalSecretStore;

/// Maximum id length accepted by the local stores.
pub const MAX_ID_LENGTH: usize = 256;

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid_parameter("id must not be empty"));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(Error::invalid_parameter(format!(
            "id is {} bytes long, the maximum is {MAX_ID_LENGTH}",
            id.len()
        )));
    }
    if id.contains('/') {
        return Err(Error::invalid_format(format!("id '{id}' must not contain '/'")));
    }
    Ok(())
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(record).map_err(|e| Error::encoding(format!("failed to serialize record: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(|e| Error::internal(format!("corrupted record: {e}")))
}

fn expire_at(created_at: DateTime<Utc>, attr: &Attributes) -> Result<Option<DateTime<Utc>>> {
    attr.ttl
        .map(|ttl| {
            chrono::Duration::from_std(ttl)
                .map(|ttl| created_at + ttl)
                .map_err(|e| Error::invalid_parameter(format!("ttl out of range: {e}")))
        })
        .transpose()
}

/// `limit = 0` means no limit.
fn paginate(ids: Vec<String>, limit: u64, offset: u64) -> Vec<String> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = match limit {
        0 => usize::MAX,
        n => usize::try_from(n).unwrap_or(usize::MAX),
    };
    ids.into_iter().skip(offset).take(limit).collect()
}

fn local(err: Error) -> Error {
    err.with_backend(Backend::Local)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("my-key").is_ok());
        assert!(validate_id("").unwrap_err().is_invalid_parameter());
        assert!(validate_id(&"k".repeat(MAX_ID_LENGTH + 1)).unwrap_err().is_invalid_parameter());
        assert!(validate_id("a/b").unwrap_err().is_invalid_format());
    }

    #[test]
    fn test_paginate() {
        let ids: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(paginate(ids.clone(), 0, 0).len(), 5);
        assert_eq!(paginate(ids.clone(), 2, 1), vec!["1".to_string(), "2".to_string()]);
        assert!(paginate(ids, 2, 10).is_empty());
    }

    #[test]
    fn test_expire_at() {
        let now = Utc::now();
        assert_eq!(expire_at(now, &Attributes::new()).unwrap(), None);
        let attr = Attributes::new().with_ttl(Duration::from_secs(60));
        assert_eq!(expire_at(now, &attr).unwrap(), Some(now + chrono::Duration::seconds(60)));
    }
}
