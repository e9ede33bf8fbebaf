//! Error codes.
//!
//! A code is a specific [`ErrorKind`] optionally tagged with the [`Backend`]
//! that produced it. Every kind belongs to exactly one [`ErrorClass`], so
//! classification is a single match rather than string or type inspection.
//!
//! The packed numeric form returned by [`ErrorCode::bits`] is kept stable for
//! clients that persist or compare raw codes:
//!
//! ```text
//!  bits 12..  class
//!  bits 8..12 backend (0 = none)
//!  bits 0..8  specific error
//! ```

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Broad family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    /// A collaborator could not be reached or failed to answer.
    Connection,
    /// The caller is not authenticated or lacks a permission.
    Authentication,
    /// The request itself is malformed or asks for something unavailable.
    InvalidRequest,
    /// The request conflicts with persisted state.
    Data,
    /// A cryptographic primitive failed.
    Crypto,
    /// Anything the system cannot attribute to the caller.
    Internal,
}

impl ErrorClass {
    const fn bits(self) -> u32 {
        match self {
            ErrorClass::Connection => 0x08,
            ErrorClass::Authentication => 0x09,
            ErrorClass::InvalidRequest => 0x40,
            ErrorClass::Data => 0x42,
            ErrorClass::Crypto => 0x50,
            ErrorClass::Internal => 0xFF,
        }
    }
}

/// Subclass: the backend that reported the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    HashicorpVault,
    AzureKeyVault,
    AwsKms,
    /// In-process reference vault.
    Local,
    Postgres,
    /// In-memory metadata database.
    Memory,
}

impl Backend {
    const fn bits(self) -> u32 {
        match self {
            Backend::HashicorpVault => 1,
            Backend::AzureKeyVault => 2,
            Backend::AwsKms => 3,
            Backend::Local => 4,
            Backend::Postgres => 5,
            Backend::Memory => 6,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::HashicorpVault => "hashicorp",
            Backend::AzureKeyVault => "akv",
            Backend::AwsKms => "aws",
            Backend::Local => "local",
            Backend::Postgres => "postgres",
            Backend::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Specific error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    // Connection
    DependencyFailure,
    Cancelled,

    // Authentication
    Unauthorized,
    Forbidden,

    // Invalid request
    InvalidFormat,
    InvalidParameter,
    Encoding,
    NotSupported,
    NotImplemented,

    // Data
    AlreadyExists,
    NotFound,
    StatusConflict,

    // Crypto
    CryptoOperation,

    // Internal
    Internal,
    Config,
}

impl ErrorKind {
    /// Class this kind belongs to.
    pub const fn class(self) -> ErrorClass {
        match self {
            ErrorKind::DependencyFailure | ErrorKind::Cancelled => ErrorClass::Connection,
            ErrorKind::Unauthorized | ErrorKind::Forbidden => ErrorClass::Authentication,
            ErrorKind::InvalidFormat
            | ErrorKind::InvalidParameter
            | ErrorKind::Encoding
            | ErrorKind::NotSupported
            | ErrorKind::NotImplemented => ErrorClass::InvalidRequest,
            ErrorKind::AlreadyExists | ErrorKind::NotFound | ErrorKind::StatusConflict => ErrorClass::Data,
            ErrorKind::CryptoOperation => ErrorClass::Crypto,
            ErrorKind::Internal | ErrorKind::Config => ErrorClass::Internal,
        }
    }

    const fn bits(self) -> u32 {
        match self {
            ErrorKind::DependencyFailure => 0x01,
            ErrorKind::Cancelled => 0x02,
            ErrorKind::Unauthorized => 0x01,
            ErrorKind::Forbidden => 0x02,
            ErrorKind::InvalidFormat => 0x01,
            ErrorKind::InvalidParameter => 0x02,
            ErrorKind::Encoding => 0x03,
            ErrorKind::NotSupported => 0x04,
            ErrorKind::NotImplemented => 0x05,
            ErrorKind::AlreadyExists => 0x01,
            ErrorKind::NotFound => 0x02,
            ErrorKind::StatusConflict => 0x03,
            ErrorKind::CryptoOperation => 0x01,
            ErrorKind::Internal => 0x00,
            ErrorKind::Config => 0x01,
        }
    }
}

/// Full error code: specific kind plus optional backend subclass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    pub kind: ErrorKind,
    pub backend: Option<Backend>,
}

impl ErrorCode {
    pub const fn new(kind: ErrorKind) -> Self {
        Self { kind, backend: None }
    }

    pub const fn with_backend(kind: ErrorKind, backend: Backend) -> Self {
        Self {
            kind,
            backend: Some(backend),
        }
    }

    pub const fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    /// Packed numeric representation.
    pub const fn bits(&self) -> u32 {
        let backend = match self.backend {
            Some(b) => b.bits(),
            None => 0,
        };
        (self.kind.class().bits() << 12) | (backend << 8) | self.kind.bits()
    }

    /// Status code the transport layer reports for this error.
    pub const fn http_status(&self) -> u16 {
        match self.kind {
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists | ErrorKind::StatusConflict => 409,
            ErrorKind::InvalidFormat | ErrorKind::Encoding => 400,
            ErrorKind::InvalidParameter => 422,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotSupported | ErrorKind::NotImplemented => 501,
            ErrorKind::DependencyFailure => 424,
            ErrorKind::Cancelled => 499,
            ErrorKind::CryptoOperation | ErrorKind::Internal | ErrorKind::Config => 500,
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        ErrorCode::new(kind)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05X}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_layout() {
        let code = ErrorCode::with_backend(ErrorKind::NotFound, Backend::HashicorpVault);
        assert_eq!(code.bits(), 0x42102);
        assert_eq!(code.to_string(), "42102");

        let internal = ErrorCode::new(ErrorKind::Internal);
        assert_eq!(internal.to_string(), "FF000");
    }

    #[test]
    fn test_class_is_independent_of_backend() {
        for backend in [Backend::HashicorpVault, Backend::AwsKms, Backend::Memory] {
            let code = ErrorCode::with_backend(ErrorKind::AlreadyExists, backend);
            assert_eq!(code.class(), ErrorClass::Data);
        }
    }

    #[test]
    fn test_codes_are_distinct() {
        let kinds = [
            ErrorKind::DependencyFailure,
            ErrorKind::Cancelled,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
            ErrorKind::InvalidFormat,
            ErrorKind::InvalidParameter,
            ErrorKind::Encoding,
            ErrorKind::NotSupported,
            ErrorKind::NotImplemented,
            ErrorKind::AlreadyExists,
            ErrorKind::NotFound,
            ErrorKind::StatusConflict,
            ErrorKind::CryptoOperation,
            ErrorKind::Internal,
            ErrorKind::Config,
        ];
        let mut seen = std::collections::HashSet::new();
        for kind in kinds {
            assert!(seen.insert(ErrorCode::new(kind).bits()), "duplicate code for {kind:?}");
        }
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::new(ErrorKind::NotFound).http_status(), 404);
        assert_eq!(ErrorCode::new(ErrorKind::NotSupported).http_status(), 501);
        assert_eq!(ErrorCode::new(ErrorKind::Forbidden).http_status(), 403);
    }
}
