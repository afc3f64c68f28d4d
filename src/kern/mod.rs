//! Kern subsystem - policy-agnostic thread core
//!
//! Contains the priority model, CPU budgets, thread control objects,
//! control-block pools, stacks, per-processor watchdogs and the user
//! extension table.

pub mod budget;
pub mod cpuset;
pub mod lock;
pub mod objects;
pub mod priority;
pub mod priority_node;
pub mod scheduler;
pub mod stack;
pub mod thread;
pub mod userext;
pub mod watchdog;

pub use budget::{BudgetAlgorithm, CpuBudget, TickOutcome};
pub use cpuset::CpuSet;
pub use lock::{InterruptLock, IsrGuard};
pub use objects::{ObjectPool, ObjectTable};
pub use priority::{Priority, SchedParam, SchedPolicy};
pub use priority_node::{NodeKind, PriorityAggregation, PriorityNode};
pub use scheduler::{Dispatcher, NullDispatcher, Scheduler, WaitQueueId};
pub use stack::{Stack, StackAllocator, StackArea, StackOwner, Workspace};
pub use thread::{LifeState, StackRequest, Thread, ThreadConfig, ThreadState};
pub use userext::{ExtensionRegistry, ExtensionTable, UserExtensions};
pub use watchdog::{WatchdogHeader, WatchdogId, WatchdogRoutine};
