//! Scheduler instance and dispatcher interface
//!
//! The ready-queue algorithm itself lives outside this crate. The thread
//! manager only tells the [`Dispatcher`] when a thread's contribution to the
//! ready set changes: it became runnable, it left, or its effective priority
//! moved.

use crate::error::Status;
use crate::kern::cpuset::CpuSet;
use crate::kern::priority::Priority;
use crate::kern::thread::Thread;

/// Identifier of a thread queue a thread may be blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitQueueId(pub u32);

// ============================================================================
// Scheduler
// ============================================================================

/// A scheduler instance: a priority range and the processors it owns
#[derive(Debug, Clone)]
pub struct Scheduler {
    name: &'static str,
    maximum_priority: u64,
    processors: CpuSet,
}

impl Scheduler {
    pub fn new(name: &'static str, maximum_priority: u64, processors: CpuSet) -> Self {
        Self {
            name,
            maximum_priority,
            processors,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn maximum_priority(&self) -> u64 {
        self.maximum_priority
    }

    pub fn processors(&self) -> CpuSet {
        self.processors
    }

    /// Map a user priority into the scheduler's internal encoding
    pub fn map_priority(&self, priority: Priority) -> Priority {
        priority
    }

    pub fn unmap_priority(&self, priority: Priority) -> Priority {
        priority
    }

    /// Validate an affinity request against this scheduler
    ///
    /// The set must name at least one processor and only processors that
    /// this scheduler owns.
    pub fn check_affinity(&self, affinity: &CpuSet) -> Result<(), Status> {
        if affinity.is_empty() || !affinity.is_subset_of(&self.processors) {
            return Err(Status::InvalidNumber);
        }
        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Hooks into the ready queue and dispatcher
///
/// Every method is called with interrupts disabled and must not block.
/// Defaults describe a dispatcher with nothing to do.
pub trait Dispatcher: Send + Sync {
    /// Set up the scheduler's per-thread node during core initialization
    fn node_initialize(&self, _thread: &Thread, _priority: Priority) -> Result<(), Status> {
        Ok(())
    }

    /// Release what `node_initialize` set up
    fn node_destroy(&self, _thread: &Thread) {}

    /// The thread became ready
    fn unblock(&self, _thread: &Thread) {}

    /// The thread left the ready set
    fn block(&self, _thread: &Thread) {}

    /// The thread's effective priority changed
    ///
    /// `wait_queue` names the queue the thread is blocked on, if any, so it
    /// can be reordered.
    fn update_priority(
        &self,
        _thread: &Thread,
        _priority: Priority,
        _wait_queue: Option<WaitQueueId>,
    ) {
    }

    /// The executing thread used up its timeslice
    fn yield_processor(&self, _thread: &Thread) {}
}

/// Dispatcher that ignores every notification
#[derive(Debug, Default)]
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {}
