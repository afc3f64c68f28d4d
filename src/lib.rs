//! rt_pthread - thread lifecycle and sporadic server core of a real-time kernel
//!
//! This crate builds schedulable threads on demand, maps POSIX scheduling
//! policies onto the kernel's priority model and enforces the Sporadic
//! Server budget discipline from the clock tick.
//!
//! - [`kern`] holds the policy-agnostic pieces: priorities and priority
//!   nodes, CPU budgets, thread control objects, pools, stacks, watchdogs
//!   and the user extension table.
//! - [`posix`] holds the POSIX layer: attributes, `pthread_create`,
//!   `pthread_getschedparam`, exit/join/cancel and the sporadic server.
//! - [`manager::ThreadManager`] is the context object tying them together.
//!
//! The ready queue itself is not part of this crate; the manager reports
//! every readiness and priority change to a [`kern::Dispatcher`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
// Kernel-appropriate clippy configuration
// Many kernel types have specialized initialization that doesn't fit Default
#![allow(clippy::new_without_default)]

// Standard library replacement for no_std
extern crate alloc;

// Core types
pub mod config;
pub mod error;
pub mod types;

pub mod kern;
pub mod manager;
pub mod posix;

pub use config::Configuration;
pub use error::{Result, Status, ThreadError};
pub use manager::{ThreadManager, ThreadManagerBuilder};
pub use types::{CpuIndex, ObjectApi, ThreadEntry, ThreadId, Ticks};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = "rt_pthread";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(NAME, "rt_pthread");
        assert!(!VERSION.is_empty());
    }
}
