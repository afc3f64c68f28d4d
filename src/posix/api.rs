//! POSIX per-thread extension block

use crate::kern::priority::Priority;
use crate::posix::signals::SigSet;
use crate::posix::sporadic::SporadicState;
use crate::types::ThreadId;

/// State the POSIX API keeps for every thread
#[derive(Debug)]
pub struct PosixApi {
    /// Signals the thread accepts
    pub signals_unblocked: SigSet,
    pub sporadic: SporadicState,
}

impl PosixApi {
    pub fn new(owner: ThreadId, priority: Priority) -> Self {
        Self {
            signals_unblocked: SigSet::empty(),
            sporadic: SporadicState::new(owner, priority),
        }
    }
}
