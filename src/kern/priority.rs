//! Thread Priority Mapping
//!
//! Converts a POSIX scheduling policy and `sched_param` block into the
//! scheduler's internal priority representation.
//!
//! ## Priority Spaces
//!
//! ```text
//! POSIX:  1 ................................ maximum_priority - 1
//!         (least important)                  (most important)
//! core:   maximum_priority - 1 ............. 1
//! ```
//!
//! Core priorities follow the scheduler convention that a numerically lower
//! value is more important. Core priority 0 and `maximum_priority` are kept
//! out of reach of POSIX threads.

use crate::error::{Status, ThreadError};
use crate::kern::budget::BudgetAlgorithm;
use crate::kern::scheduler::Scheduler;
use crate::types::Ticks;

// ============================================================================
// Policy Constants
// ============================================================================

/// Implementation-defined time-sharing policy
pub const SCHED_OTHER: i32 = 0;

/// First-in-first-out policy
pub const SCHED_FIFO: i32 = 1;

/// Round-robin policy
pub const SCHED_RR: i32 = 2;

/// Sporadic server policy
pub const SCHED_SPORADIC: i32 = 4;

/// Lowest valid POSIX priority
pub const POSIX_MINIMUM_PRIORITY: i32 = 1;

/// Upper bound on `sched_ss_max_repl`
pub const SS_REPL_MAX: usize = 4;

// ============================================================================
// Priority Type
// ============================================================================

/// A core priority value; lower is more important
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Priority(u64);

impl Priority {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// The more important of two priorities
    pub fn most_important(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Returns true if `self` should run before `other`
    pub fn is_higher_than(self, other: Self) -> bool {
        self.0 < other.0
    }
}

// ============================================================================
// Scheduling Policy
// ============================================================================

/// POSIX scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum SchedPolicy {
    /// Time-sharing with timeslice reset on every dispatch
    Other = SCHED_OTHER,
    /// Runs until it blocks or yields
    Fifo = SCHED_FIFO,
    /// Fixed priority with timeslice rotation
    #[default]
    RoundRobin = SCHED_RR,
    /// Budgeted normal priority with a low-priority fallback
    Sporadic = SCHED_SPORADIC,
}

impl SchedPolicy {
    /// Create from raw policy value
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            SCHED_OTHER => Some(Self::Other),
            SCHED_FIFO => Some(Self::Fifo),
            SCHED_RR => Some(Self::RoundRobin),
            SCHED_SPORADIC => Some(Self::Sporadic),
            _ => None,
        }
    }

    /// Get raw policy value
    pub fn to_raw(self) -> i32 {
        self as i32
    }

    pub fn is_sporadic(self) -> bool {
        matches!(self, Self::Sporadic)
    }
}

// ============================================================================
// Scheduling Parameters
// ============================================================================

/// `struct sched_param`
///
/// The `ss_*` fields are only consulted for [`SchedPolicy::Sporadic`].
/// Periods and budgets are expressed in scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedParam {
    pub priority: i32,
    pub ss_low_priority: i32,
    pub ss_repl_period: Ticks,
    pub ss_init_budget: Ticks,
    pub ss_max_repl: i32,
}

impl SchedParam {
    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    pub fn sporadic(
        priority: i32,
        low_priority: i32,
        repl_period: Ticks,
        init_budget: Ticks,
        max_repl: i32,
    ) -> Self {
        Self {
            priority,
            ss_low_priority: low_priority,
            ss_repl_period: repl_period,
            ss_init_budget: init_budget,
            ss_max_repl: max_repl,
        }
    }
}

// ============================================================================
// POSIX <-> core conversion
// ============================================================================

/// Largest POSIX priority the scheduler accepts
pub fn posix_maximum_priority(scheduler: &Scheduler) -> i32 {
    let max = scheduler.maximum_priority().saturating_sub(1);
    max.min(i32::MAX as u64) as i32
}

pub fn posix_priority_is_valid(scheduler: &Scheduler, posix: i32) -> bool {
    posix >= POSIX_MINIMUM_PRIORITY && posix <= posix_maximum_priority(scheduler)
}

/// Convert a POSIX priority to the scheduler's core priority
pub fn posix_to_core(scheduler: &Scheduler, posix: i32) -> Result<Priority, Status> {
    if !posix_priority_is_valid(scheduler, posix) {
        return Err(Status::InvalidPriority);
    }
    let core = scheduler.maximum_priority() - posix as u64;
    Ok(scheduler.map_priority(Priority::new(core)))
}

/// Convert a core priority back to the POSIX value callers see
pub fn core_to_posix(scheduler: &Scheduler, priority: Priority) -> i32 {
    let core = scheduler.unmap_priority(priority).value();
    scheduler.maximum_priority().saturating_sub(core) as i32
}

// ============================================================================
// Policy translation
// ============================================================================

/// Select the CPU budget algorithm for a policy, validating sporadic fields
pub fn translate_sched_param(
    policy: i32,
    param: &SchedParam,
) -> Result<BudgetAlgorithm, ThreadError> {
    match SchedPolicy::from_raw(policy) {
        Some(SchedPolicy::Other) => Ok(BudgetAlgorithm::ResetTimeslice),
        Some(SchedPolicy::Fifo) => Ok(BudgetAlgorithm::None),
        Some(SchedPolicy::RoundRobin) => Ok(BudgetAlgorithm::ExhaustTimeslice),
        Some(SchedPolicy::Sporadic) => {
            if param.ss_repl_period == 0 || param.ss_init_budget == 0 {
                return Err(ThreadError::InvalidArgument);
            }
            if param.ss_repl_period < param.ss_init_budget {
                return Err(ThreadError::InvalidArgument);
            }
            if param.ss_max_repl < 1 || param.ss_max_repl as usize > SS_REPL_MAX {
                return Err(ThreadError::InvalidArgument);
            }
            Ok(BudgetAlgorithm::Sporadic)
        }
        None => Err(ThreadError::InvalidArgument),
    }
}

/// Result of mapping a policy/parameter pair onto a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPriorities {
    /// Priority of the Real node
    pub normal: Priority,
    /// Priority of the sporadic Low node; equals `normal` for other policies
    pub low: Priority,
}

/// Extract and map the normal and low priorities
pub fn map_priorities(
    policy: i32,
    param: &SchedParam,
    scheduler: &Scheduler,
) -> Result<MappedPriorities, ThreadError> {
    let normal = posix_to_core(scheduler, param.priority)?;

    let low_posix = if policy == SCHED_SPORADIC {
        param.ss_low_priority
    } else {
        param.priority
    };
    let low = posix_to_core(scheduler, low_posix)?;

    Ok(MappedPriorities { normal, low })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kern::cpuset::CpuSet;

    fn scheduler() -> Scheduler {
        Scheduler::new("test", 255, CpuSet::first(1))
    }

    #[test]
    fn test_posix_range() {
        let sched = scheduler();
        assert!(!posix_priority_is_valid(&sched, 0));
        assert!(posix_priority_is_valid(&sched, 1));
        assert!(posix_priority_is_valid(&sched, 254));
        assert!(!posix_priority_is_valid(&sched, 255));
    }

    #[test]
    fn test_posix_core_roundtrip() {
        let sched = scheduler();
        let core = posix_to_core(&sched, 10).unwrap();
        assert_eq!(core.value(), 245);
        assert_eq!(core_to_posix(&sched, core), 10);

        // Higher POSIX priority is a lower (more important) core value.
        let hi = posix_to_core(&sched, 200).unwrap();
        assert!(hi.is_higher_than(core));
    }

    #[test]
    fn test_translate_policies() {
        let param = SchedParam::with_priority(10);
        assert_eq!(
            translate_sched_param(SCHED_FIFO, &param),
            Ok(BudgetAlgorithm::None)
        );
        assert_eq!(
            translate_sched_param(SCHED_RR, &param),
            Ok(BudgetAlgorithm::ExhaustTimeslice)
        );
        assert_eq!(
            translate_sched_param(SCHED_OTHER, &param),
            Ok(BudgetAlgorithm::ResetTimeslice)
        );
        assert_eq!(
            translate_sched_param(3, &param),
            Err(ThreadError::InvalidArgument)
        );
    }

    #[test]
    fn test_translate_sporadic_validation() {
        let good = SchedParam::sporadic(10, 30, 20, 5, 2);
        assert_eq!(
            translate_sched_param(SCHED_SPORADIC, &good),
            Ok(BudgetAlgorithm::Sporadic)
        );

        let zero_budget = SchedParam::sporadic(10, 30, 20, 0, 2);
        assert!(translate_sched_param(SCHED_SPORADIC, &zero_budget).is_err());

        let budget_exceeds_period = SchedParam::sporadic(10, 30, 4, 5, 2);
        assert!(translate_sched_param(SCHED_SPORADIC, &budget_exceeds_period).is_err());

        let too_many_repl = SchedParam::sporadic(10, 30, 20, 5, SS_REPL_MAX as i32 + 1);
        assert!(translate_sched_param(SCHED_SPORADIC, &too_many_repl).is_err());
    }

    #[test]
    fn test_map_priorities() {
        let sched = scheduler();

        let rr = map_priorities(SCHED_RR, &SchedParam::with_priority(10), &sched).unwrap();
        assert_eq!(rr.normal, rr.low);

        let ss = map_priorities(
            SCHED_SPORADIC,
            &SchedParam::sporadic(10, 30, 20, 5, 1),
            &sched,
        )
        .unwrap();
        assert_eq!(core_to_posix(&sched, ss.normal), 10);
        assert_eq!(core_to_posix(&sched, ss.low), 30);

        let bad_low = SchedParam::sporadic(10, 0, 20, 5, 1);
        assert_eq!(
            map_priorities(SCHED_SPORADIC, &bad_low, &sched),
            Err(ThreadError::InvalidArgument)
        );
    }
}
