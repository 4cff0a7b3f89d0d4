use crate::{parse::ParseError, statement::StatementError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable internal classification.
/// Every fallible surface in the crate converges on this type so
/// callers can map failures onto a transport response without matching
/// on per-module enums.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a malformed-filter-shape rejection.
    pub fn invalid_argument(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidArgument, origin, message)
    }

    /// Construct a disallowed-operation rejection.
    ///
    /// Raised when untrusted input names a method outside an allowlist.
    /// Never recovered.
    pub fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Wrap an opaque failure raised by the external builder collaborator.
    pub fn builder(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Builder, ErrorOrigin::Builder, message)
    }

    /// Construct an internal invariant violation for a specific origin.
    pub fn internal(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, origin, message)
    }

    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self.class, ErrorClass::InvalidArgument)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    /// True when the failure came from the builder collaborator rather
    /// than this crate's own parsing or dispatch.
    #[must_use]
    pub const fn is_builder(&self) -> bool {
        matches!(self.class, ErrorClass::Builder)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        let class = match &err {
            ParseError::UnsupportedMethod { .. } => ErrorClass::Unsupported,
            _ => ErrorClass::InvalidArgument,
        };

        Self::new(class, ErrorOrigin::Parse, err.to_string())
    }
}

impl From<StatementError> for Error {
    fn from(err: StatementError) -> Self {
        let class = match &err {
            StatementError::UnsupportedMethod { .. } => ErrorClass::Unsupported,
            _ => ErrorClass::InvalidArgument,
        };

        Self::new(class, ErrorOrigin::Statement, err.to_string())
    }
}

///
/// ErrorClass
/// Failure taxonomy mapped onto caller-visible behavior:
/// `InvalidArgument` and `Unsupported` surface as rejected requests,
/// `Builder` as a generic operation failure, `Internal` as a defect.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvalidArgument,
    Unsupported,
    Builder,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Unsupported => "unsupported",
            Self::Builder => "builder",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Statement,
    Parse,
    Engine,
    Request,
    Relation,
    Session,
    Builder,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Statement => "statement",
            Self::Parse => "parse",
            Self::Engine => "engine",
            Self::Request => "request",
            Self::Relation => "relation",
            Self::Session => "session",
            Self::Builder => "builder",
        };
        write!(f, "{label}")
    }
}
