//! Authorization gate.
//!
//! Connectors call the gate before touching either the vault or the
//! metadata database and return its error unchanged.

use std::collections::HashSet;

use tracing::debug;
use tracing::warn;
use warden_errors::Error;
use warden_errors::Result;

use crate::operation::Operation;
use crate::operation::Permission;
use crate::user::UserInfo;

/// Permission checks for one caller.
pub trait Authorizator: Send + Sync {
    /// Every operation must be authorized.
    fn check_permission(&self, ops: &[Operation]) -> Result<()>;

    /// Caller's tenant must be among `allowed_tenants`. An empty list means
    /// the store is public.
    fn check_access(&self, allowed_tenants: &[String]) -> Result<()>;

    fn check(&self, op: Operation) -> Result<()> {
        self.check_permission(&[op])
    }
}

/// Authorizator backed by the permission strings of a [`UserInfo`].
#[derive(Debug, Clone)]
pub struct PermissionAuthorizator {
    username: String,
    tenant: String,
    permissions: HashSet<Permission>,
}

impl PermissionAuthorizator {
    /// Unparseable permission strings are dropped with a warning: a typo in
    /// a role definition must never widen access.
    pub fn new(user: &UserInfo) -> Self {
        let permissions = user
            .permissions
            .iter()
            .filter_map(|raw| match raw.parse::<Permission>() {
                Ok(permission) => Some(permission),
                Err(e) => {
                    warn!(username = %user.username, permission = %raw, error = %e, "ignoring invalid permission");
                    None
                }
            })
            .collect();

        Self {
            username: user.username.clone(),
            tenant: user.tenant.clone(),
            permissions,
        }
    }

    fn is_authorized(&self, op: &Operation) -> bool {
        self.permissions.contains(&Permission::all())
            || self.permissions.contains(&Permission::exact(*op))
            || self.permissions.iter().any(|permission| permission.authorizes(op))
    }
}

impl Authorizator for PermissionAuthorizator {
    fn check_permission(&self, ops: &[Operation]) -> Result<()> {
        for op in ops {
            if !self.is_authorized(op) {
                warn!(username = %self.username, operation = %op, "permission denied");
                return Err(Error::forbidden(format!("user '{}' lacks permission {op}", self.username)));
            }
            debug!(username = %self.username, operation = %op, "permission granted");
        }
        Ok(())
    }

    fn check_access(&self, allowed_tenants: &[String]) -> Result<()> {
        if allowed_tenants.is_empty() || allowed_tenants.iter().any(|tenant| *tenant == self.tenant) {
            return Ok(());
        }
        warn!(username = %self.username, tenant = %self.tenant, "tenant not allowed");
        Err(Error::forbidden(format!("tenant '{}' cannot access this store", self.tenant)))
    }
}
