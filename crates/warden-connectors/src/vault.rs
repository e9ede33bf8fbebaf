//! Rules shared by every connector for combining vault and database calls.

use std::future::Future;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use warden_core::Attributes;
use warden_errors::Error;
use warden_errors::Result;

/// Vault result of a mutation mirrored after a database change.
///
/// `NotSupported` means the vault has no such capability: the database change
/// stands on its own. Any other error aborts the enclosing transaction.
pub(crate) fn tolerate_not_supported<T>(result: Result<T>, operation: &'static str, id: &str) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_supported() => {
            debug!(operation, id, error = %e, "vault does not support operation, keeping database change");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// What an update forwards to the vault: tags only. The disabled flag is
/// fixed at creation and expiry only moves through refresh.
pub(crate) fn update_attributes(attr: &Attributes) -> Attributes {
    Attributes::new().with_tags(attr.tags.clone())
}

pub(crate) fn check_expiry(expire_at: DateTime<Utc>) -> Result<()> {
    if expire_at <= Utc::now() {
        return Err(Error::invalid_parameter(format!("expiry {expire_at} is not in the future")));
    }
    Ok(())
}

/// Turns a vault `AlreadyExists` on create/import into a read of the existing
/// entity. The vault is authoritative for existence.
pub(crate) async fn attach_existing<T, F, Fut>(result: Result<T>, id: &str, get: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match result {
        Err(e) if e.is_already_exists() => {
            debug!(id, "entity already exists in vault, attaching it");
            get().await
        }
        other => other,
    }
}
