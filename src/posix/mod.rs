//! POSIX threads
//!
//! The POSIX layer on top of the core thread manager: attribute
//! translation, `pthread_create` and friends, the sporadic server and the
//! API extension set that wires them into the thread lifecycle.

pub mod api;
pub mod attr;
pub mod extensions;
pub mod pthread;
pub mod pthread_create;
pub mod signals;
pub mod sporadic;

pub use attr::{
    ThreadAttr, ThreadDescriptor, PTHREAD_CREATE_DETACHED, PTHREAD_CREATE_JOINABLE,
    PTHREAD_EXPLICIT_SCHED, PTHREAD_INHERIT_SCHED, PTHREAD_SCOPE_PROCESS, PTHREAD_SCOPE_SYSTEM,
};
pub use pthread::PTHREAD_CANCELED;
pub use signals::{SigSet, SIGNAL_ALL_MASK};
pub use sporadic::SporadicState;
