//! Thread Control Objects
//!
//! A [`Thread`] is the durable record of one schedulable thread. The fields
//! fixed at construction (identifier, stack, home scheduler, preemptibility)
//! sit directly in the object; everything the tick path, the dispatcher and
//! the extension hooks mutate lives in [`ThreadCore`] behind the thread's
//! state lock.

use alloc::sync::Arc;
use spin::{Mutex, MutexGuard};

use crate::error::Status;
use crate::kern::budget::{BudgetAlgorithm, CpuBudget};
use crate::kern::cpuset::CpuSet;
use crate::kern::priority::{Priority, SchedPolicy};
use crate::kern::priority_node::{NodeKind, PriorityAggregation, PriorityNode};
use crate::kern::scheduler::{Scheduler, WaitQueueId};
use crate::kern::stack::{Stack, StackArea};
use crate::posix::api::PosixApi;
use crate::types::{ThreadEntry, ThreadId, Ticks};

// ============================================================================
// Thread State Flags
// ============================================================================

/// Thread state flags; no flag set means ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadState(pub u32);

impl ThreadState {
    /// Runnable
    pub const READY: Self = Self(0);
    /// Created but not started
    pub const DORMANT: Self = Self(0x01);
    /// Blocked on a thread queue
    pub const WAITING: Self = Self(0x02);
    /// Terminated, waiting to be joined
    pub const ZOMBIE: Self = Self(0x04);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn is_ready(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for ThreadState {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for ThreadState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl core::ops::BitAnd for ThreadState {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl core::ops::Not for ThreadState {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

// ============================================================================
// Life State Flags
// ============================================================================

/// Lifecycle flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifeState(pub u32);

impl LifeState {
    /// Resources are released at exit, no join
    pub const DETACHED: Self = Self(0x01);
    /// Termination requests are held back until the thread first runs
    pub const CHANGE_DEFERRED: Self = Self(0x02);
    /// Exit path entered
    pub const TERMINATING: Self = Self(0x04);
    /// A cancellation arrived while changes were deferred
    pub const CANCEL_PENDING: Self = Self(0x08);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

// ============================================================================
// Construction configuration
// ============================================================================

/// Where the stack comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackRequest {
    /// Caller-supplied region
    Caller(StackArea),
    /// Kernel allocates this many bytes
    Kernel(usize),
}

/// Everything core initialization needs to build a thread
#[derive(Debug, Clone)]
pub struct ThreadConfig {
    pub scheduler: Arc<Scheduler>,
    pub stack: StackRequest,
    pub is_fp: bool,
    pub is_preemptible: bool,
    pub policy: SchedPolicy,
    pub priority: Priority,
    pub budget_algorithm: BudgetAlgorithm,
}

/// Effective priority change to hand to the dispatcher once the state lock
/// is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct PriorityUpdate {
    pub priority: Priority,
    pub wait_queue: Option<WaitQueueId>,
}

// ============================================================================
// Thread Core (state-lock protected)
// ============================================================================

/// Mutable thread state, guarded by the thread's state lock
#[derive(Debug)]
pub struct ThreadCore {
    pub state: ThreadState,
    pub life: LifeState,
    pub policy: SchedPolicy,
    /// The thread's own normal-priority contribution
    pub real_priority: PriorityNode,
    /// All active contributions
    pub priorities: PriorityAggregation,
    pub budget: CpuBudget,
    pub affinity: CpuSet,
    /// Queue the thread is blocked on, if any
    pub wait_queue: Option<WaitQueueId>,
    pub entry: Option<(ThreadEntry, usize)>,
    pub return_value: usize,
    pub created_with_inherited_scheduler: bool,
    /// POSIX extension block
    pub api: PosixApi,
}

impl ThreadCore {
    /// Effective priority: the most important active contribution
    pub fn effective_priority(&self) -> Priority {
        self.priorities
            .effective()
            .unwrap_or(self.real_priority.priority())
    }

    /// Report a change of effective priority relative to `before`
    pub fn priority_update_since(&self, before: Priority) -> Option<PriorityUpdate> {
        let now = self.effective_priority();
        (now != before).then_some(PriorityUpdate {
            priority: now,
            wait_queue: self.wait_queue,
        })
    }

    /// Attach an inherited contribution
    pub fn add_inherited(&mut self, key: u32, priority: Priority) -> Result<(), Status> {
        self.priorities.add_inherited(key, priority)
    }

    pub fn remove_inherited(&mut self, key: u32) -> Result<(), Status> {
        self.priorities.remove_inherited(key)
    }

    /// Exactly one of the Real and sporadic Low nodes is active
    pub fn own_nodes_exclusive(&self) -> bool {
        let real = self.real_priority.is_active();
        let low = self.api.sporadic.low_priority.is_active();
        real != low
            && self.priorities.contains(NodeKind::Real) == real
            && self.priorities.contains(NodeKind::SporadicLow) == low
    }
}

// ============================================================================
// Thread Structure
// ============================================================================

/// A thread control object
#[derive(Debug)]
pub struct Thread {
    id: ThreadId,
    home_scheduler: Arc<Scheduler>,
    stack: Stack,
    is_fp: bool,
    is_preemptible: bool,
    /// State lock
    core: Mutex<ThreadCore>,
}

impl Thread {
    /// Core initialization: dormant, Real node active, budget loaded
    pub fn new(id: ThreadId, config: &ThreadConfig, stack: Stack, timeslice: Ticks) -> Self {
        let mut real_priority = PriorityNode::new(config.priority);
        let mut priorities = PriorityAggregation::new();
        priorities.add(NodeKind::Real, &mut real_priority);

        let initial_budget = match config.budget_algorithm {
            BudgetAlgorithm::ResetTimeslice | BudgetAlgorithm::ExhaustTimeslice => timeslice,
            BudgetAlgorithm::None | BudgetAlgorithm::Sporadic => 0,
        };

        Self {
            id,
            home_scheduler: Arc::clone(&config.scheduler),
            stack,
            is_fp: config.is_fp,
            is_preemptible: config.is_preemptible,
            core: Mutex::new(ThreadCore {
                state: ThreadState::DORMANT,
                life: LifeState::default(),
                policy: config.policy,
                real_priority,
                priorities,
                budget: CpuBudget::new(config.budget_algorithm, initial_budget),
                affinity: CpuSet::empty(),
                wait_queue: None,
                entry: None,
                return_value: 0,
                created_with_inherited_scheduler: false,
                api: PosixApi::new(id, config.priority),
            }),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn home_scheduler(&self) -> &Arc<Scheduler> {
        &self.home_scheduler
    }

    pub fn stack(&self) -> Stack {
        self.stack
    }

    pub fn is_fp(&self) -> bool {
        self.is_fp
    }

    pub fn is_preemptible(&self) -> bool {
        self.is_preemptible
    }

    /// Acquire the thread's state lock
    pub fn lock(&self) -> MutexGuard<'_, ThreadCore> {
        self.core.lock()
    }

    /// Publish a dormant thread as runnable
    ///
    /// Fails if anything but the creator touched the thread's state first.
    pub fn start(&self, entry: ThreadEntry, arg: usize) -> Result<(), Status> {
        let mut core = self.lock();
        if core.state != ThreadState::DORMANT {
            return Err(Status::IncorrectState);
        }
        core.entry = Some((entry, arg));
        core.state = ThreadState::READY;
        Ok(())
    }

    pub fn current_priority(&self) -> Priority {
        self.lock().effective_priority()
    }

    pub fn is_ready(&self) -> bool {
        self.lock().state.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kern::stack::StackOwner;
    use crate::types::ObjectApi;

    fn config(algorithm: BudgetAlgorithm) -> ThreadConfig {
        ThreadConfig {
            scheduler: Arc::new(Scheduler::new("test", 255, CpuSet::first(1))),
            stack: StackRequest::Kernel(4096),
            is_fp: true,
            is_preemptible: true,
            policy: SchedPolicy::RoundRobin,
            priority: Priority::new(100),
            budget_algorithm: algorithm,
        }
    }

    fn stack() -> Stack {
        Stack {
            area: StackArea::new(0x1000, 4096),
            owner: StackOwner::Kernel,
        }
    }

    fn noop(arg: usize) -> usize {
        arg
    }

    #[test]
    fn test_thread_state() {
        let state = ThreadState::DORMANT | ThreadState::WAITING;
        assert!(state.contains(ThreadState::DORMANT));
        assert!(!state.is_ready());
        assert!((state & !ThreadState::DORMANT & !ThreadState::WAITING).is_ready());
    }

    #[test]
    fn test_new_thread_is_dormant_with_real_node() {
        let id = ThreadId::build(ObjectApi::Posix, 0, 0);
        let thread = Thread::new(id, &config(BudgetAlgorithm::ExhaustTimeslice), stack(), 50);
        let core = thread.lock();
        assert_eq!(core.state, ThreadState::DORMANT);
        assert!(core.real_priority.is_active());
        assert_eq!(core.effective_priority(), Priority::new(100));
        assert_eq!(core.budget.available(), 50);
        assert!(core.own_nodes_exclusive());
    }

    #[test]
    fn test_start_only_once() {
        let id = ThreadId::build(ObjectApi::Posix, 0, 0);
        let thread = Thread::new(id, &config(BudgetAlgorithm::None), stack(), 50);
        assert_eq!(thread.start(noop, 1), Ok(()));
        assert!(thread.is_ready());
        assert_eq!(thread.start(noop, 1), Err(Status::IncorrectState));
    }

    #[test]
    fn test_priority_update_reports_changes_only() {
        let id = ThreadId::build(ObjectApi::Posix, 0, 0);
        let thread = Thread::new(id, &config(BudgetAlgorithm::None), stack(), 50);
        let mut core = thread.lock();
        let before = core.effective_priority();
        assert_eq!(core.priority_update_since(before), None);

        core.add_inherited(1, Priority::new(10)).unwrap();
        let update = core.priority_update_since(before).unwrap();
        assert_eq!(update.priority, Priority::new(10));
    }
}
