//! Error taxonomy for warden.
//!
//! Every component reports failures as a single [`Error`] value carrying a
//! human-readable message and an [`ErrorCode`]. Codes are hierarchical:
//!
//! - an [`ErrorClass`] (connection, authentication, invalid request, data,
//!   crypto, internal),
//! - an optional [`Backend`] subclass naming the vault or database that
//!   reported the error,
//! - a specific [`ErrorKind`].
//!
//! Callers classify with the `is_*` predicates, which never inspect the
//! message, so new kinds can be added under an existing class without
//! touching any caller. Errors that arrive from outside the taxonomy are
//! coerced to [`ErrorKind::Internal`].
//!
//! ```rust
//! use warden_errors::Backend;
//! use warden_errors::Error;
//!
//! let err = Error::not_found("key 'treasury' not found").with_backend(Backend::HashicorpVault);
//! assert!(err.is_not_found());
//! assert!(err.is_data_error());
//! assert_eq!(err.code().http_status(), 404);
//! ```

mod code;
mod error;

pub use code::Backend;
pub use code::ErrorClass;
pub use code::ErrorCode;
pub use code::ErrorKind;
pub use error::Error;
pub use error::Result;
