use serde::Deserialize;
use serde::Serialize;

/// Identity of the caller, as resolved by the transport's authenticator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub tenant: String,
    /// Permission strings, `"<action>:<resource>"`.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserInfo {
    pub fn new(username: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            tenant: tenant.into(),
            permissions: Vec::new(),
            roles: Vec::new(),
        }
    }

    /// Caller that presented no credentials. Holds no permission.
    pub fn anonymous() -> Self {
        Self::new("anonymous", "")
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }
}
