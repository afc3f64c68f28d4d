//! Thread attributes
//!
//! [`ThreadAttr`] mirrors `pthread_attr_t`. [`translate`] validates an
//! attribute set against the creating thread and the configuration and turns
//! it into a [`ThreadDescriptor`]; nothing is allocated until the descriptor
//! reaches the thread manager.

use alloc::sync::Arc;

use crate::error::{Result, ThreadError};
use crate::kern::cpuset::CpuSet;
use crate::kern::priority::{
    map_priorities, translate_sched_param, Priority, SchedParam, SchedPolicy, SCHED_FIFO,
};
use crate::kern::stack::{ensure_minimum, extend_size, stack_is_enough, StackArea};
use crate::kern::thread::{StackRequest, Thread, ThreadConfig};
use crate::manager::ThreadManager;
use crate::types::ThreadEntry;

pub const PTHREAD_INHERIT_SCHED: i32 = 1;
pub const PTHREAD_EXPLICIT_SCHED: i32 = 2;

pub const PTHREAD_SCOPE_PROCESS: i32 = 0;
pub const PTHREAD_SCOPE_SYSTEM: i32 = 1;

pub const PTHREAD_CREATE_DETACHED: i32 = 0;
pub const PTHREAD_CREATE_JOINABLE: i32 = 1;

/// `pthread_attr_t`
///
/// The fields hold raw POSIX values so that malformed attribute sets can
/// be represented and rejected at creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadAttr {
    pub is_initialized: bool,
    /// Caller-supplied stack
    pub stackaddr: Option<usize>,
    pub stacksize: usize,
    pub contentionscope: i32,
    pub inheritsched: i32,
    pub schedpolicy: i32,
    pub schedparam: SchedParam,
    pub detachstate: i32,
    pub affinity: Option<CpuSet>,
}

impl ThreadAttr {
    /// Default attributes for a system with the given processors
    pub fn new(affinity: CpuSet) -> Self {
        Self {
            is_initialized: true,
            stackaddr: None,
            stacksize: 0,
            contentionscope: PTHREAD_SCOPE_PROCESS,
            inheritsched: PTHREAD_INHERIT_SCHED,
            schedpolicy: SCHED_FIFO,
            schedparam: SchedParam::with_priority(2),
            detachstate: PTHREAD_CREATE_JOINABLE,
            affinity: Some(affinity),
        }
    }

    /// `pthread_attr_destroy`
    pub fn destroy(&mut self) -> Result<()> {
        if !self.is_initialized {
            return Err(ThreadError::InvalidArgument);
        }
        self.is_initialized = false;
        Ok(())
    }

    pub fn set_stack(&mut self, addr: usize, size: usize) -> Result<()> {
        self.check_initialized()?;
        self.stackaddr = Some(addr);
        self.stacksize = size;
        Ok(())
    }

    pub fn set_stacksize(&mut self, size: usize) -> Result<()> {
        self.check_initialized()?;
        self.stacksize = size;
        Ok(())
    }

    pub fn set_inheritsched(&mut self, inheritsched: i32) -> Result<()> {
        self.check_initialized()?;
        match inheritsched {
            PTHREAD_INHERIT_SCHED | PTHREAD_EXPLICIT_SCHED => {
                self.inheritsched = inheritsched;
                Ok(())
            }
            _ => Err(ThreadError::NotSupported),
        }
    }

    pub fn set_schedpolicy(&mut self, policy: i32) -> Result<()> {
        self.check_initialized()?;
        SchedPolicy::from_raw(policy).ok_or(ThreadError::NotSupported)?;
        self.schedpolicy = policy;
        Ok(())
    }

    pub fn set_schedparam(&mut self, param: SchedParam) -> Result<()> {
        self.check_initialized()?;
        self.schedparam = param;
        Ok(())
    }

    pub fn set_scope(&mut self, scope: i32) -> Result<()> {
        self.check_initialized()?;
        match scope {
            PTHREAD_SCOPE_PROCESS => {
                self.contentionscope = scope;
                Ok(())
            }
            PTHREAD_SCOPE_SYSTEM => Err(ThreadError::NotSupported),
            _ => Err(ThreadError::InvalidArgument),
        }
    }

    pub fn set_detachstate(&mut self, state: i32) -> Result<()> {
        self.check_initialized()?;
        match state {
            PTHREAD_CREATE_DETACHED | PTHREAD_CREATE_JOINABLE => {
                self.detachstate = state;
                Ok(())
            }
            _ => Err(ThreadError::InvalidArgument),
        }
    }

    /// `pthread_attr_setaffinity_np`: a CPU set of `bytes.len()` bytes
    pub fn set_affinity(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_initialized()?;
        self.affinity = Some(CpuSet::from_bytes(bytes).ok_or(ThreadError::InvalidArgument)?);
        Ok(())
    }

    fn check_initialized(&self) -> Result<()> {
        if self.is_initialized {
            Ok(())
        } else {
            Err(ThreadError::InvalidArgument)
        }
    }
}

/// A validated creation request
#[derive(Debug, Clone)]
pub struct ThreadDescriptor {
    pub config: ThreadConfig,
    /// Priority of the sporadic Low node
    pub low_priority: Priority,
    /// Parameters the thread was created with
    pub sched_param: SchedParam,
    pub affinity: CpuSet,
    pub detached: bool,
    pub inherited: bool,
    pub entry: ThreadEntry,
    pub arg: usize,
}

/// Validate a creation request
///
/// Checks run in a fixed order and the first failure is reported. Nothing
/// is acquired here.
pub fn translate(
    manager: &ThreadManager,
    executing: Option<&Thread>,
    attr: Option<&ThreadAttr>,
    start_routine: Option<ThreadEntry>,
    arg: usize,
) -> Result<ThreadDescriptor> {
    let entry = start_routine.ok_or(ThreadError::Fault)?;

    let defaults;
    let attr = match attr {
        Some(attr) => attr,
        None => {
            defaults = manager.attr_init();
            &defaults
        }
    };
    if !attr.is_initialized {
        return Err(ThreadError::InvalidArgument);
    }

    // POSIX threads always get an FP context
    let is_fp = true;
    let configuration = manager.config();
    let stack = match attr.stackaddr {
        Some(begin) => {
            if !stack_is_enough(configuration, attr.stacksize, is_fp) {
                return Err(ThreadError::InvalidArgument);
            }
            StackRequest::Caller(StackArea::new(begin, attr.stacksize))
        }
        None => {
            let size = ensure_minimum(configuration, attr.stacksize);
            StackRequest::Kernel(extend_size(configuration, size, is_fp))
        }
    };

    let (policy, param) = match attr.inheritsched {
        PTHREAD_INHERIT_SCHED => {
            let executing = executing.ok_or(ThreadError::InvalidArgument)?;
            let (policy, param) = manager.sched_param_of(executing);
            (policy.to_raw(), param)
        }
        PTHREAD_EXPLICIT_SCHED => (attr.schedpolicy, attr.schedparam),
        _ => return Err(ThreadError::InvalidArgument),
    };

    if attr.contentionscope != PTHREAD_SCOPE_PROCESS {
        return Err(ThreadError::NotSupported);
    }

    let budget_algorithm = translate_sched_param(policy, &param)?;
    let sched_policy = SchedPolicy::from_raw(policy).ok_or(ThreadError::InvalidArgument)?;

    let scheduler = match executing {
        Some(executing) => Arc::clone(executing.home_scheduler()),
        None => Arc::clone(manager.scheduler()),
    };
    let priorities = map_priorities(policy, &param, &scheduler)?;

    let affinity = attr
        .affinity
        .filter(|set| !set.is_empty())
        .ok_or(ThreadError::InvalidArgument)?;

    Ok(ThreadDescriptor {
        config: ThreadConfig {
            scheduler,
            stack,
            is_fp,
            is_preemptible: true,
            policy: sched_policy,
            priority: priorities.normal,
            budget_algorithm,
        },
        low_priority: priorities.low,
        sched_param: param,
        affinity,
        detached: attr.detachstate == PTHREAD_CREATE_DETACHED,
        inherited: attr.inheritsched == PTHREAD_INHERIT_SCHED,
        entry,
        arg,
    })
}
