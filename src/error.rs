//! Error types
//!
//! Two layers: [`Status`] is what the core (object pools, scheduler, stack
//! allocator) reports internally, [`ThreadError`] is what the POSIX thread
//! manager hands back to callers. Every `ThreadError` maps onto exactly one
//! errno value.

use thiserror::Error;

// ============================================================================
// errno values
// ============================================================================

/// No such process
pub const ESRCH: i32 = 3;
/// Try again
pub const EAGAIN: i32 = 11;
/// Bad address
pub const EFAULT: i32 = 14;
/// Device or resource busy
pub const EBUSY: i32 = 16;
/// Invalid argument
pub const EINVAL: i32 = 22;
/// Operation not supported
pub const ENOTSUP: i32 = 95;

// ============================================================================
// Public errors
// ============================================================================

/// Errors returned by the thread manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// The entry function is missing
    #[error("entry function is null")]
    Fault,
    /// Malformed attributes, out-of-range priority, bad affinity, ...
    #[error("invalid argument")]
    InvalidArgument,
    /// The request is valid POSIX but not supported by this kernel
    #[error("operation not supported")]
    NotSupported,
    /// No free control block or no stack memory
    #[error("resource temporarily unavailable")]
    ResourceExhausted,
    /// The identifier does not name a live thread
    #[error("no such thread")]
    NoSuchThread,
    /// The thread has not terminated yet
    #[error("thread is busy")]
    Busy,
}

impl ThreadError {
    /// Convert to a POSIX errno value
    pub fn to_errno(&self) -> i32 {
        match self {
            ThreadError::Fault => EFAULT,
            ThreadError::InvalidArgument => EINVAL,
            ThreadError::NotSupported => ENOTSUP,
            ThreadError::ResourceExhausted => EAGAIN,
            ThreadError::NoSuchThread => ESRCH,
            ThreadError::Busy => EBUSY,
        }
    }
}

// ============================================================================
// Core status codes
// ============================================================================

/// Status reported by core services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Status {
    #[error("out of memory")]
    NoMemory,
    #[error("too many objects")]
    TooMany,
    #[error("invalid priority")]
    InvalidPriority,
    #[error("invalid number")]
    InvalidNumber,
    #[error("object in incorrect state")]
    IncorrectState,
    #[error("request unsatisfied")]
    Unsatisfied,
}

impl From<Status> for ThreadError {
    fn from(status: Status) -> Self {
        match status {
            Status::NoMemory | Status::TooMany | Status::Unsatisfied => {
                ThreadError::ResourceExhausted
            }
            Status::InvalidPriority | Status::InvalidNumber | Status::IncorrectState => {
                ThreadError::InvalidArgument
            }
        }
    }
}

/// Shorthand used throughout the thread manager
pub type Result<T> = core::result::Result<T, ThreadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(ThreadError::Fault.to_errno(), EFAULT);
        assert_eq!(ThreadError::InvalidArgument.to_errno(), EINVAL);
        assert_eq!(ThreadError::NotSupported.to_errno(), ENOTSUP);
        assert_eq!(ThreadError::ResourceExhausted.to_errno(), EAGAIN);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ThreadError::from(Status::NoMemory),
            ThreadError::ResourceExhausted
        );
        assert_eq!(
            ThreadError::from(Status::InvalidPriority),
            ThreadError::InvalidArgument
        );
        assert_eq!(
            ThreadError::from(Status::IncorrectState),
            ThreadError::InvalidArgument
        );
    }
}
