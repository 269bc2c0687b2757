//! Dispatch error types
//!
//! Every lifecycle failure the dispatcher can observe, tagged with the
//! 0-based index of the execution context it happened on.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Lifecycle failure of one execution context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Platform could not allocate co-processor state
    #[error("Failed creating context {index}: {reason}")]
    ContextCreateFailed { index: usize, reason: String },

    /// Program image could not be installed into the context
    #[error("Failed loading program into context {index}: {reason}")]
    ProgramLoadFailed { index: usize, reason: String },

    /// Control thread could not be started
    #[error("Failed creating control thread for context {index}: {reason}")]
    ThreadCreateFailed { index: usize, reason: String },

    /// Context run returned a failure
    #[error("Failed running context {index}: {reason}")]
    ContextRunFailed { index: usize, reason: String },

    /// Control thread terminated abnormally
    #[error("Failed joining control thread of context {index}: {reason}")]
    JoinFailed { index: usize, reason: String },

    /// Context resources could not be released
    #[error("Failed destroying context {index}: {reason}")]
    ContextDestroyFailed { index: usize, reason: String },

    /// Handshake or run did not finish in time
    #[error("Context {index} timed out after {after:?}")]
    Timeout { index: usize, after: Duration },
}

/// Discriminant of a [`DispatchError`], used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ContextCreateFailed,
    ProgramLoadFailed,
    ThreadCreateFailed,
    ContextRunFailed,
    JoinFailed,
    ContextDestroyFailed,
    Timeout,
}

impl DispatchError {
    /// 0-based index of the context the failure belongs to
    ///
    /// Contexts are numbered in creation order, so index 2 is the third.
    pub fn index(&self) -> usize {
        match self {
            Self::ContextCreateFailed { index, .. }
            | Self::ProgramLoadFailed { index, .. }
            | Self::ThreadCreateFailed { index, .. }
            | Self::ContextRunFailed { index, .. }
            | Self::JoinFailed { index, .. }
            | Self::ContextDestroyFailed { index, .. }
            | Self::Timeout { index, .. } => *index,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContextCreateFailed { .. } => ErrorKind::ContextCreateFailed,
            Self::ProgramLoadFailed { .. } => ErrorKind::ProgramLoadFailed,
            Self::ThreadCreateFailed { .. } => ErrorKind::ThreadCreateFailed,
            Self::ContextRunFailed { .. } => ErrorKind::ContextRunFailed,
            Self::JoinFailed { .. } => ErrorKind::JoinFailed,
            Self::ContextDestroyFailed { .. } => ErrorKind::ContextDestroyFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_and_kind() {
        let err = DispatchError::ProgramLoadFailed {
            index: 2,
            reason: "bad image".to_string(),
        };
        assert_eq!(err.index(), 2);
        assert_eq!(err.kind(), ErrorKind::ProgramLoadFailed);
        assert_eq!(
            err.to_string(),
            "Failed loading program into context 2: bad image"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = DispatchError::Timeout {
            index: 0,
            after: Duration::from_secs(3),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "Context 0 timed out after 3s");
    }
}
