//! Thread creation

use alloc::sync::Arc;

use crate::error::Result;
use crate::kern::priority::{posix_to_core, translate_sched_param, SchedParam, SchedPolicy};
use crate::kern::stack::extend_size;
use crate::kern::thread::{StackRequest, Thread, ThreadConfig};
use crate::manager::ThreadManager;
use crate::posix::attr::{self, ThreadAttr, ThreadDescriptor};
use crate::types::{ObjectApi, ThreadEntry, ThreadId};

impl ThreadManager {
    /// `pthread_attr_init`: the attributes used when none are given
    pub fn attr_init(&self) -> ThreadAttr {
        ThreadAttr::new(self.scheduler().processors())
    }

    /// Create and start a POSIX thread
    ///
    /// `executing` is the creating thread, if any thread runs yet. On
    /// failure nothing the call acquired remains allocated.
    pub fn create(
        &self,
        executing: Option<&Thread>,
        attr: Option<&ThreadAttr>,
        start_routine: Option<ThreadEntry>,
        arg: usize,
    ) -> Result<ThreadId> {
        let descriptor = attr::translate(self, executing, attr, start_routine, arg)?;
        self.construct(ObjectApi::Posix, executing, &descriptor)
    }

    /// `pthread_create`: 0 on success, an errno value otherwise
    pub fn pthread_create(
        &self,
        executing: Option<&Thread>,
        thread: &mut ThreadId,
        attr: Option<&ThreadAttr>,
        start_routine: Option<ThreadEntry>,
        arg: usize,
    ) -> i32 {
        match self.create(executing, attr, start_routine, arg) {
            Ok(id) => {
                *thread = id;
                0
            }
            Err(err) => err.to_errno(),
        }
    }

    /// Create and start a kernel-internal thread
    ///
    /// Internal threads run on a minimum-size kernel stack, may use every
    /// processor of the scheduler and are never joined.
    pub fn create_internal(
        &self,
        executing: Option<&Thread>,
        policy: SchedPolicy,
        priority: i32,
        entry: ThreadEntry,
        arg: usize,
    ) -> Result<ThreadId> {
        let param = SchedParam::with_priority(priority);
        let budget_algorithm = translate_sched_param(policy.to_raw(), &param)?;
        let scheduler = Arc::clone(self.scheduler());
        let core_priority = posix_to_core(&scheduler, priority)?;
        let stack_size = extend_size(self.config(), self.config().minimum_stack_size, true);

        let descriptor = ThreadDescriptor {
            affinity: scheduler.processors(),
            config: ThreadConfig {
                scheduler,
                stack: StackRequest::Kernel(stack_size),
                is_fp: true,
                is_preemptible: true,
                policy,
                priority: core_priority,
                budget_algorithm,
            },
            low_priority: core_priority,
            sched_param: param,
            detached: true,
            inherited: false,
            entry,
            arg,
        };
        self.construct(ObjectApi::Internal, executing, &descriptor)
    }
}
