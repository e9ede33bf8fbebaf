//! Lifecycle metadata shared by every entity.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Lifecycle metadata.
///
/// `None` timestamps mean the event has not happened. When both are set,
/// `deleted_at <= destroyed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Backend-defined monotonic version marker.
    pub version: String,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub destroyed_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new(version: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            disabled: false,
            created_at,
            updated_at: created_at,
            deleted_at: None,
            destroyed_at: None,
            expire_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at <= now)
    }

    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_restored(&mut self, now: DateTime<Utc>) {
        self.deleted_at = None;
        self.updated_at = now;
    }

    /// Destruction implies deletion; a never-deleted entity gets both stamps.
    pub fn mark_destroyed(&mut self, now: DateTime<Utc>) {
        let deleted_at = *self.deleted_at.get_or_insert(now);
        self.destroyed_at = Some(now.max(deleted_at));
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_lifecycle_stamps() {
        let t0 = Utc::now();
        let mut meta = Metadata::new("1", t0);
        assert!(!meta.is_deleted());

        meta.mark_deleted(t0 + Duration::seconds(1));
        assert!(meta.is_deleted());

        meta.mark_restored(t0 + Duration::seconds(2));
        assert!(!meta.is_deleted());

        meta.mark_destroyed(t0 + Duration::seconds(3));
        assert!(meta.is_deleted());
        assert!(meta.is_destroyed());
        assert!(meta.deleted_at <= meta.destroyed_at);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut meta = Metadata::new("1", now);
        assert!(!meta.is_expired(now));

        meta.expire_at = Some(now + Duration::seconds(10));
        assert!(!meta.is_expired(now));
        assert!(meta.is_expired(now + Duration::seconds(10)));
    }
}
