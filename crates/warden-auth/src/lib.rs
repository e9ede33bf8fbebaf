//! Authorization for warden connectors.
//!
//! Each connector method maps to one [`Operation`] (an action on a resource
//! kind). The caller's [`UserInfo`] carries permission strings such as
//! `"sign:eth_account"` or `"read:*"`; a [`PermissionAuthorizator`] built from
//! it answers whether an operation may proceed.
//!
//! ```
//! use warden_auth::{Action, Authorizator, Operation, PermissionAuthorizator, Resource, UserInfo};
//!
//! let user = UserInfo::new("alice", "acme").with_permissions(["read:*", "sign:key"]);
//! let auth = PermissionAuthorizator::new(&user);
//!
//! assert!(auth.check(Operation::new(Action::Sign, Resource::Key)).is_ok());
//! assert!(auth.check(Operation::new(Action::Delete, Resource::Key)).is_err());
//! ```

pub mod authorizator;
pub mod operation;
pub mod user;

pub use authorizator::Authorizator;
pub use authorizator::PermissionAuthorizator;
pub use operation::Action;
pub use operation::Operation;
pub use operation::Permission;
pub use operation::Resource;
pub use user::UserInfo;
