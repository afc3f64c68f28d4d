//! Sporadic server budget engine
//!
//! A sporadic thread alternates between two phases:
//!
//! - *normal*: its Real priority node is active and every tick it executes
//!   charges one tick of budget;
//! - *low*: the budget ran out, the Low node replaced the Real node and the
//!   thread waits for its replenishment.
//!
//! Demotion happens synchronously from the tick path and arms a one-shot
//! replenishment one period later on the timer processor's watchdog. A
//! thread only leaves the low phase through that replenishment, so at most
//! one is ever outstanding. When it fires the thread gets its Real node and
//! its full budget back.
//!
//! All functions here run with the thread's state lock held and return the
//! priority change, if any, for the caller to propagate once the lock is
//! dropped.

use log::trace;

use crate::kern::priority::{Priority, SchedParam};
use crate::kern::priority_node::{NodeKind, PriorityNode};
use crate::kern::thread::{PriorityUpdate, ThreadCore};
use crate::kern::watchdog::{WatchdogHeader, WatchdogId, WatchdogRoutine};
use crate::manager::ThreadManager;
use crate::types::{ThreadId, Ticks};

/// Sporadic server state of one thread
#[derive(Debug)]
pub struct SporadicState {
    /// Owner of this state
    pub thread: ThreadId,
    /// Reduced priority contribution used while the budget is exhausted
    pub low_priority: PriorityNode,
    pub repl_period: Ticks,
    pub init_budget: Ticks,
    /// Raw `sched_ss_max_repl`, as reported back to callers
    pub max_repl: i32,
    /// Armed replenishment timer on the timer processor
    pub timer: Option<WatchdogId>,
    /// Tick at which the armed replenishment fires
    pub deadline: Option<Ticks>,
}

impl SporadicState {
    pub fn new(thread: ThreadId, priority: Priority) -> Self {
        Self {
            thread,
            low_priority: PriorityNode::new(priority),
            repl_period: 0,
            init_budget: 0,
            max_repl: 0,
            timer: None,
            deadline: None,
        }
    }

    /// Take over the creation parameters
    pub fn configure(&mut self, low_priority: Priority, param: &SchedParam) {
        self.low_priority.set_priority(low_priority);
        self.repl_period = param.ss_repl_period;
        self.init_budget = param.ss_init_budget;
        self.max_repl = param.ss_max_repl;
    }

    /// Forget the armed replenishment
    ///
    /// Safe to call any number of times.
    pub fn cancel(&mut self, watchdogs: &mut WatchdogHeader) {
        if let Some(timer) = self.timer.take() {
            watchdogs.remove_ticks(timer);
        }
        self.deadline = None;
    }
}

/// Budget exhausted: swap to the low priority and arm the replenishment
pub fn budget_callout(manager: &ThreadManager, core: &mut ThreadCore) -> Option<PriorityUpdate> {
    let before = core.effective_priority();

    if core.real_priority.is_active() {
        let ThreadCore {
            priorities,
            real_priority,
            api,
            ..
        } = &mut *core;
        priorities.add(NodeKind::SporadicLow, &mut api.sporadic.low_priority);
        priorities.remove(NodeKind::Real, real_priority);
        trace!(
            "sporadic: {} demoted to {:?}",
            api.sporadic.thread,
            api.sporadic.low_priority.priority()
        );
    }
    debug_assert!(core.own_nodes_exclusive());

    let mut watchdogs = manager.timer_watchdogs();
    arm_replenishment(&mut watchdogs, &mut core.api.sporadic);

    core.priority_update_since(before)
}

fn arm_replenishment(watchdogs: &mut WatchdogHeader, sporadic: &mut SporadicState) {
    if sporadic.timer.is_some() {
        return;
    }
    let deadline = watchdogs.ticks().saturating_add(sporadic.repl_period);
    let routine = WatchdogRoutine::SporadicReplenish(sporadic.thread);
    sporadic.timer = Some(watchdogs.insert_ticks(sporadic.repl_period, routine));
    sporadic.deadline = Some(deadline);
}

/// Replenishment timer `fired` expired: restore the normal priority and the
/// full budget
pub fn replenish(
    manager: &ThreadManager,
    core: &mut ThreadCore,
    fired: WatchdogId,
) -> Option<PriorityUpdate> {
    if core.api.sporadic.timer != Some(fired) {
        // Cancelled between expiry and delivery
        return None;
    }

    let before = core.effective_priority();

    if !core.real_priority.is_active() {
        let ThreadCore {
            priorities,
            real_priority,
            api,
            ..
        } = &mut *core;
        priorities.add(NodeKind::Real, real_priority);
        priorities.remove(NodeKind::SporadicLow, &mut api.sporadic.low_priority);
    }
    debug_assert!(core.own_nodes_exclusive());

    let init_budget = core.api.sporadic.init_budget;
    core.budget.reload(init_budget);
    core.api.sporadic.cancel(&mut manager.timer_watchdogs());
    trace!(
        "sporadic: {} replenished with {} ticks",
        core.api.sporadic.thread,
        init_budget
    );

    core.priority_update_since(before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectApi;

    fn state() -> SporadicState {
        let mut sporadic = SporadicState::new(
            ThreadId::build(ObjectApi::Posix, 0, 1),
            Priority::new(225),
        );
        sporadic.configure(Priority::new(245), &SchedParam::sporadic(30, 10, 20, 5, 3));
        sporadic
    }

    #[test]
    fn test_configure_keeps_max_repl() {
        let sporadic = state();
        assert_eq!(sporadic.max_repl, 3);
        assert_eq!(sporadic.repl_period, 20);
        assert_eq!(sporadic.init_budget, 5);
        assert_eq!(sporadic.low_priority.priority(), Priority::new(245));
    }

    #[test]
    fn test_one_replenishment_armed() {
        let mut watchdogs = WatchdogHeader::new();
        let mut sporadic = state();

        watchdogs.advance();
        arm_replenishment(&mut watchdogs, &mut sporadic);
        let first = sporadic.timer;
        watchdogs.advance();
        arm_replenishment(&mut watchdogs, &mut sporadic);

        assert_eq!(sporadic.timer, first);
        assert_eq!(sporadic.deadline, Some(21));
        assert_eq!(watchdogs.pending(), 1);
        assert_eq!(watchdogs.next_deadline(), Some(21));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut watchdogs = WatchdogHeader::new();
        let mut sporadic = state();
        arm_replenishment(&mut watchdogs, &mut sporadic);
        assert_eq!(watchdogs.pending(), 1);

        sporadic.cancel(&mut watchdogs);
        sporadic.cancel(&mut watchdogs);
        assert_eq!(sporadic.timer, None);
        assert_eq!(sporadic.deadline, None);
        assert_eq!(watchdogs.pending(), 0);
    }
}
