//! The classified error value.

use serde::Deserialize;
use serde::Serialize;

use crate::code::Backend;
use crate::code::ErrorClass;
use crate::code::ErrorCode;
use crate::code::ErrorKind;

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Classified error.
///
/// Immutable once constructed: the `with_*` helpers return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct Error {
    code: ErrorCode,
    message: String,
}

macro_rules! constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorKind::$kind, message)
            }
        )*
    };
}

macro_rules! predicates {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $name(&self) -> bool {
                self.code.kind == ErrorKind::$kind
            }
        )*
    };
}

impl Error {
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    constructors! {
        /// A collaborator failed or answered with something unusable.
        dependency_failure => DependencyFailure,
        /// The operation's context was cancelled or timed out.
        cancelled => Cancelled,
        unauthorized => Unauthorized,
        /// The caller is known but lacks a permission.
        forbidden => Forbidden,
        invalid_format => InvalidFormat,
        invalid_parameter => InvalidParameter,
        encoding => Encoding,
        /// The backend does not offer this capability.
        not_supported => NotSupported,
        not_implemented => NotImplemented,
        already_exists => AlreadyExists,
        not_found => NotFound,
        status_conflict => StatusConflict,
        crypto_operation => CryptoOperation,
        internal => Internal,
        config => Config,
    }

    /// Same error, attributed to `backend`.
    pub fn with_backend(self, backend: Backend) -> Self {
        Self {
            code: ErrorCode::with_backend(self.code.kind, backend),
            message: self.message,
        }
    }

    /// Same code, different message.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        Self {
            code: self.code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind
    }

    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Keep an already classified error, classify anything else as internal.
    pub fn coerce(err: &(dyn std::error::Error + 'static)) -> Self {
        match err.downcast_ref::<Error>() {
            Some(classified) => classified.clone(),
            None => Error::internal(err.to_string()),
        }
    }

    predicates! {
        is_dependency_failure => DependencyFailure,
        is_cancelled => Cancelled,
        is_unauthorized => Unauthorized,
        is_forbidden => Forbidden,
        is_invalid_format => InvalidFormat,
        is_invalid_parameter => InvalidParameter,
        is_encoding => Encoding,
        is_not_supported => NotSupported,
        is_not_implemented => NotImplemented,
        is_already_exists => AlreadyExists,
        is_not_found => NotFound,
        is_status_conflict => StatusConflict,
        is_crypto_operation => CryptoOperation,
        is_internal => Internal,
        is_config => Config,
    }

    pub fn is_connection_error(&self) -> bool {
        self.class() == ErrorClass::Connection
    }

    pub fn is_authentication_error(&self) -> bool {
        self.class() == ErrorClass::Authentication
    }

    pub fn is_invalid_request(&self) -> bool {
        self.class() == ErrorClass::InvalidRequest
    }

    pub fn is_data_error(&self) -> bool {
        self.class() == ErrorClass::Data
    }

    pub fn is_crypto_error(&self) -> bool {
        self.class() == ErrorClass::Crypto
    }

    pub fn is_internal_class(&self) -> bool {
        self.class() == ErrorClass::Internal
    }

    pub fn is_backend(&self, backend: Backend) -> bool {
        self.code.backend == Some(backend)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(classified) => classified,
            Err(other) => Error::internal(format!("{other:#}")),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::internal(err.to_string())
    }
}
