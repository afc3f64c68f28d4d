//! Operations on existing threads

use log::error;

use crate::error::{Result, ThreadError};
use crate::kern::priority::{core_to_posix, SchedParam, SchedPolicy};
use crate::kern::thread::{LifeState, Thread, ThreadState};
use crate::manager::ThreadManager;
use crate::posix::signals::SigSet;
use crate::types::{ThreadId, Ticks};

/// Return value of a cancelled thread
pub const PTHREAD_CANCELED: usize = usize::MAX;

impl ThreadManager {
    /// Policy and parameters of a thread, priorities in POSIX terms
    pub fn sched_param_of(&self, thread: &Thread) -> (SchedPolicy, SchedParam) {
        let scheduler = thread.home_scheduler();
        let core = thread.lock();
        let sporadic = &core.api.sporadic;
        let param = SchedParam {
            priority: core_to_posix(scheduler, core.real_priority.priority()),
            ss_low_priority: core_to_posix(scheduler, sporadic.low_priority.priority()),
            ss_repl_period: sporadic.repl_period,
            ss_init_budget: sporadic.init_budget,
            ss_max_repl: sporadic.max_repl,
        };
        (core.policy, param)
    }

    pub fn getschedparam(&self, id: ThreadId) -> Result<(SchedPolicy, SchedParam)> {
        let thread = self.lookup(id)?;
        Ok(self.sched_param_of(&thread))
    }

    /// `pthread_getschedparam`
    pub fn pthread_getschedparam(
        &self,
        id: ThreadId,
        policy: &mut i32,
        param: &mut SchedParam,
    ) -> i32 {
        match self.getschedparam(id) {
            Ok((p, sp)) => {
                *policy = p.to_raw();
                *param = sp;
                0
            }
            Err(err) => err.to_errno(),
        }
    }

    /// Effective priority in POSIX terms
    pub fn current_priority(&self, id: ThreadId) -> Result<i32> {
        let thread = self.lookup(id)?;
        let priority = thread.current_priority();
        Ok(core_to_posix(thread.home_scheduler(), priority))
    }

    /// Budget left before the next sporadic demotion or timeslice expiry
    pub fn remaining_budget(&self, id: ThreadId) -> Result<Ticks> {
        Ok(self.lookup(id)?.lock().budget.available())
    }

    pub fn signals_unblocked(&self, id: ThreadId) -> Result<SigSet> {
        Ok(self.lookup(id)?.lock().api.signals_unblocked)
    }

    /// `pthread_exit` on behalf of thread `id`
    pub fn exit(&self, id: ThreadId, value: usize) -> Result<()> {
        let thread = self.lookup(id)?;
        self.exit_thread(&thread, value);
        Ok(())
    }

    /// `pthread_detach`
    pub fn detach(&self, id: ThreadId) -> Result<()> {
        let thread = self.lookup(id)?;
        let zombie = {
            let mut core = thread.lock();
            if core.life.contains(LifeState::DETACHED) {
                return Err(ThreadError::InvalidArgument);
            }
            core.life.insert(LifeState::DETACHED);
            core.state.contains(ThreadState::ZOMBIE)
        };
        if zombie {
            self.release(&thread);
        }
        Ok(())
    }

    /// Join a terminated thread without waiting
    ///
    /// Returns [`ThreadError::Busy`] while the thread is still running.
    pub fn try_join(&self, id: ThreadId) -> Result<usize> {
        let thread = self.lookup(id)?;
        let value = {
            let mut core = thread.lock();
            if core.life.contains(LifeState::DETACHED) {
                return Err(ThreadError::InvalidArgument);
            }
            if !core.state.contains(ThreadState::ZOMBIE) {
                return Err(ThreadError::Busy);
            }
            // Claim the zombie so no second joiner releases it
            core.life.insert(LifeState::DETACHED);
            core.return_value
        };
        self.release(&thread);
        Ok(value)
    }

    /// `pthread_cancel`
    ///
    /// A thread that has not run yet records the request and acts on it
    /// when it is first run.
    pub fn cancel(&self, id: ThreadId) -> Result<()> {
        let thread = self.lookup(id)?;
        {
            let mut core = thread.lock();
            if core.life.contains(LifeState::TERMINATING) {
                return Ok(());
            }
            if core.life.contains(LifeState::CHANGE_DEFERRED) {
                core.life.insert(LifeState::CANCEL_PENDING);
                return Ok(());
            }
        }
        self.exit_thread(&thread, PTHREAD_CANCELED);
        Ok(())
    }

    /// Run a started thread's entry function to completion
    ///
    /// The entry's return value goes through the exit extensions, which
    /// terminate POSIX threads with it.
    ///
    /// # Panics
    ///
    /// Panics if the thread is still alive once the exit extensions ran;
    /// a kernel-internal thread must never return from its entry.
    pub fn run(&self, id: ThreadId) -> Result<usize> {
        let thread = self.lookup(id)?;
        let (entry, arg) = {
            let mut core = thread.lock();
            if !core.state.is_ready() || core.life.contains(LifeState::TERMINATING) {
                return Err(ThreadError::InvalidArgument);
            }
            core.life.remove(LifeState::CHANGE_DEFERRED);
            if core.life.contains(LifeState::CANCEL_PENDING) {
                drop(core);
                self.exit_thread(&thread, PTHREAD_CANCELED);
                return Ok(PTHREAD_CANCELED);
            }
            core.entry.ok_or(ThreadError::InvalidArgument)?
        };

        let value = entry(arg);
        thread.lock().return_value = value;
        self.extensions().thread_exitted(self, &thread);

        if !thread.lock().life.contains(LifeState::TERMINATING) {
            error!("thread {} returned from its entry", id);
            panic!("thread {} exited without an exit handler", id);
        }
        Ok(value)
    }
}
