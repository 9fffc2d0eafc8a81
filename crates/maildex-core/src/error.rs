use std::fmt;
use thiserror::Error as ThisError;

///
/// QueryError
///
/// Structured runtime error with a stable internal classification.
/// Carried unchanged from the failing backend call to the original caller;
/// the engine performs no retries.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct QueryError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct an index-origin backend failure.
    ///
    /// A tree that observed one of these is in an undefined state: the
    /// caller must release it with `done_with_search_results` and discard it.
    pub fn index_backend(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Backend, ErrorOrigin::Index, message)
    }

    /// Construct a cleanup failure for a specific origin.
    ///
    /// Cleanup failures are reported to the engine sink, never raised.
    pub fn cleanup(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Cleanup, origin, message)
    }

    /// Construct a session-origin internal error.
    pub(crate) fn session_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Session, message)
    }

    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(self.class, ErrorClass::Backend)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The index capability failed to open or advance a hit source.
    Backend,
    /// A resource release failed during `done_with_search_results`.
    Cleanup,
    /// Unexpected engine-internal failure.
    Internal,
    /// A structural invariant was breached (programming defect).
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Backend => "backend",
            Self::Cleanup => "cleanup",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
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
    Index,
    Operation,
    Optimizer,
    Session,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Index => "index",
            Self::Operation => "operation",
            Self::Optimizer => "optimizer",
            Self::Session => "session",
        };
        write!(f, "{label}")
    }
}
