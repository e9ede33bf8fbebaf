//! Operations and the permissions that authorize them.
//!
//! A permission is written `"<action>:<resource>"`, either side may be `*`.
//! Matching is exact per side; there are no partial globs.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use warden_errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Delete,
    Destroy,
    Sign,
    Encrypt,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Read,
        Action::Write,
        Action::Delete,
        Action::Destroy,
        Action::Sign,
        Action::Encrypt,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
            Action::Destroy => "destroy",
            Action::Sign => "sign",
            Action::Encrypt => "encrypt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Key,
    Secret,
    EthAccount,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Key, Resource::Secret, Resource::EthAccount];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Resource::Key => "key",
            Resource::Secret => "secret",
            Resource::EthAccount => "eth_account",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| Error::invalid_format(format!("unknown action '{s}'")))
    }
}

impl FromStr for Resource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.as_str() == s)
            .ok_or_else(|| Error::invalid_format(format!("unknown resource '{s}'")))
    }
}

/// What a connector method is about to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub action: Action,
    pub resource: Resource,
}

impl Operation {
    pub const fn new(action: Action, resource: Resource) -> Self {
        Self { action, resource }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action.as_str(), self.resource.as_str())
    }
}

/// One side of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Pattern<T> {
    Any,
    Exact(T),
}

impl<T: PartialEq> Pattern<T> {
    fn matches(&self, value: &T) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(expected) => expected == value,
        }
    }
}

/// Parsed permission string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    action: Pattern<Action>,
    resource: Pattern<Resource>,
}

impl Permission {
    /// `*:*`
    pub const fn all() -> Self {
        Self {
            action: Pattern::Any,
            resource: Pattern::Any,
        }
    }

    pub const fn exact(op: Operation) -> Self {
        Self {
            action: Pattern::Exact(op.action),
            resource: Pattern::Exact(op.resource),
        }
    }

    pub fn authorizes(&self, op: &Operation) -> bool {
        self.action.matches(&op.action) && self.resource.matches(&op.resource)
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, resource) = s
            .split_once(':')
            .ok_or_else(|| Error::invalid_format(format!("permission '{s}' is not of the form action:resource")))?;

        let action = match action {
            "*" => Pattern::Any,
            other => Pattern::Exact(other.parse()?),
        };
        let resource = match resource {
            "*" => Pattern::Any,
            other => Pattern::Exact(other.parse()?),
        };

        Ok(Self { action, resource })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            Pattern::Any => "*",
            Pattern::Exact(action) => action.as_str(),
        };
        let resource = match self.resource {
            Pattern::Any => "*",
            Pattern::Exact(resource) => resource.as_str(),
        };
        write!(f, "{action}:{resource}")
    }
}
