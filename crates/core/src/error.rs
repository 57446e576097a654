//! Uniform error contract for every repository backend.
//!
//! Each variant carries the name of the operation that failed so callers can
//! locate the failure without a backtrace. Backends translate their native
//! errors into these variants; nothing here retries.

/// Boxed source error from a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of an [`AdvSuggestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    DecodeMismatch,
    Constraint,
    Canceled,
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum AdvSuggestError {
    #[error("{operation}: storage connection failed: {source}")]
    Connection {
        operation: &'static str,
        source: BoxError,
    },

    #[error("{operation}: decode mismatch: {reason}")]
    DecodeMismatch {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation}: constraint violation: {source}")]
    Constraint {
        operation: &'static str,
        source: BoxError,
    },

    #[error("{operation}: canceled")]
    Canceled { operation: &'static str },

    #[error("{operation}: deadline exceeded")]
    DeadlineExceeded { operation: &'static str },

    #[error("{operation}: storage error: {source}")]
    Storage {
        operation: &'static str,
        source: BoxError,
    },
}

impl AdvSuggestError {
    pub fn connection(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            operation,
            source: source.into(),
        }
    }

    pub fn decode(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::DecodeMismatch {
            operation,
            reason: reason.into(),
        }
    }

    pub fn constraint(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Constraint {
            operation,
            source: source.into(),
        }
    }

    pub fn canceled(operation: &'static str) -> Self {
        Self::Canceled { operation }
    }

    pub fn deadline_exceeded(operation: &'static str) -> Self {
        Self::DeadlineExceeded { operation }
    }

    pub fn storage(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            operation,
            source: source.into(),
        }
    }

    /// The operation that produced this error.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Connection { operation, .. }
            | Self::DecodeMismatch { operation, .. }
            | Self::Constraint { operation, .. }
            | Self::Canceled { operation }
            | Self::DeadlineExceeded { operation }
            | Self::Storage { operation, .. } => operation,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::DecodeMismatch { .. } => ErrorKind::DecodeMismatch,
            Self::Constraint { .. } => ErrorKind::Constraint,
            Self::Canceled { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Canceled,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// True for both caller cancellation and an expired deadline.
    pub fn is_canceled(&self) -> bool {
        self.kind() == ErrorKind::Canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn display_names_the_operation() {
        let err = AdvSuggestError::connection("add", std::io::Error::other("refused"));
        assert_eq!(err.to_string(), "add: storage connection failed: refused");
        assert_eq!(err.operation(), "add");
    }

    #[test]
    fn deadline_is_a_cancellation() {
        let err = AdvSuggestError::deadline_exceeded("get_list_adv_suggest");
        assert!(err.is_canceled());
        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert_matches!(err, AdvSuggestError::DeadlineExceeded { .. });
    }

    #[test]
    fn source_is_preserved() {
        use std::error::Error as _;

        let err = AdvSuggestError::constraint("add", std::io::Error::other("duplicate key"));
        assert_eq!(err.source().map(|s| s.to_string()), Some("duplicate key".into()));
        assert!(!err.is_canceled());
    }
}
