//! Thread manager
//!
//! [`ThreadManager`] is the single context object of the thread subsystem.
//! It owns the control-block pools and the stack allocator (both behind the
//! allocation lock), the published-thread tables, the per-processor tick
//! sources and the sealed extension table.
//!
//! Lock order, outermost first: allocation lock, interrupt lock, thread
//! state lock, watchdog header. The per-processor executing slot is never
//! held across any other lock.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, error, warn};
use spin::{Mutex, MutexGuard};

use crate::config::Configuration;
use crate::error::{Result, Status, ThreadError};
use crate::kern::budget::TickOutcome;
use crate::kern::cpuset::CpuSet;
use crate::kern::lock::InterruptLock;
use crate::kern::objects::{ObjectPool, ObjectTable};
use crate::kern::priority::posix_to_core;
use crate::kern::scheduler::{Dispatcher, NullDispatcher, Scheduler, WaitQueueId};
use crate::kern::stack::{Stack, StackAllocator, StackArea, StackOwner, Workspace};
use crate::kern::thread::{
    LifeState, PriorityUpdate, StackRequest, Thread, ThreadConfig, ThreadState,
};
use crate::kern::userext::{ExtensionRegistry, ExtensionTable, UserExtensions};
use crate::kern::watchdog::{WatchdogHeader, WatchdogId, WatchdogRoutine};
use crate::posix::attr::ThreadDescriptor;
use crate::posix::{extensions, sporadic};
use crate::types::{CpuIndex, ObjectApi, ThreadId, Ticks};

/// Processor whose watchdog carries the sporadic replenishment timers
pub const TIMER_CPU: CpuIndex = 0;

/// Base address of the default stack workspace
pub const WORKSPACE_BASE: usize = 0x4000_0000;

// ============================================================================
// Allocator state
// ============================================================================

/// Everything guarded by the allocation lock
pub(crate) struct Allocator {
    posix: ObjectPool,
    internal: ObjectPool,
    stacks: Box<dyn StackAllocator>,
}

impl Allocator {
    fn pool(&self, api: ObjectApi) -> &ObjectPool {
        match api {
            ObjectApi::Posix => &self.posix,
            ObjectApi::Internal => &self.internal,
        }
    }

    fn pool_mut(&mut self, api: ObjectApi) -> &mut ObjectPool {
        match api {
            ObjectApi::Posix => &mut self.posix,
            ObjectApi::Internal => &mut self.internal,
        }
    }
}

struct PerCpu {
    watchdogs: Mutex<WatchdogHeader>,
    executing: Mutex<Option<Arc<Thread>>>,
}

impl PerCpu {
    fn new() -> Self {
        Self {
            watchdogs: Mutex::new(WatchdogHeader::new()),
            executing: Mutex::new(None),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Boot-time assembly of a [`ThreadManager`]
pub struct ThreadManagerBuilder {
    config: Configuration,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    stacks: Option<Box<dyn StackAllocator>>,
    extensions: Vec<UserExtensions>,
}

impl ThreadManagerBuilder {
    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn stack_allocator(mut self, stacks: Box<dyn StackAllocator>) -> Self {
        self.stacks = Some(stacks);
        self
    }

    /// Register an extension set; sets run after the built-in POSIX set
    pub fn extension(mut self, set: UserExtensions) -> Self {
        self.extensions.push(set);
        self
    }

    pub fn build(self) -> core::result::Result<ThreadManager, Status> {
        let config = self.config;
        config.validate()?;

        let mut registry = ExtensionRegistry::new();
        registry.add(extensions::POSIX_EXTENSIONS)?;
        for set in self.extensions {
            registry.add(set)?;
        }

        let scheduler = Arc::new(Scheduler::new(
            "priority",
            config.maximum_priority,
            CpuSet::first(config.processor_count),
        ));
        let stacks = self
            .stacks
            .unwrap_or_else(|| Box::new(Workspace::new(WORKSPACE_BASE, config.workspace_size)));
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(NullDispatcher));

        debug!(
            "threads: {} POSIX, {} internal, {} processors, {} extension sets",
            config.maximum_posix_threads,
            config.maximum_internal_threads,
            config.processor_count,
            registry.len()
        );

        Ok(ThreadManager {
            allocator: Mutex::new(Allocator {
                posix: ObjectPool::new(ObjectApi::Posix, config.maximum_posix_threads),
                internal: ObjectPool::new(ObjectApi::Internal, config.maximum_internal_threads),
                stacks,
            }),
            posix_threads: ObjectTable::new(config.maximum_posix_threads),
            internal_threads: ObjectTable::new(config.maximum_internal_threads),
            per_cpu: (0..config.processor_count).map(|_| PerCpu::new()).collect(),
            isr: InterruptLock::new(),
            extensions: registry.seal(),
            scheduler,
            dispatcher,
            config,
        })
    }
}

// ============================================================================
// Thread manager
// ============================================================================

/// The thread subsystem
pub struct ThreadManager {
    config: Configuration,
    scheduler: Arc<Scheduler>,
    dispatcher: Arc<dyn Dispatcher>,
    allocator: Mutex<Allocator>,
    posix_threads: ObjectTable<Thread>,
    internal_threads: ObjectTable<Thread>,
    isr: InterruptLock,
    per_cpu: Vec<PerCpu>,
    extensions: ExtensionTable,
}

impl ThreadManager {
    pub fn builder(config: Configuration) -> ThreadManagerBuilder {
        ThreadManagerBuilder {
            config,
            dispatcher: None,
            stacks: None,
            extensions: Vec::new(),
        }
    }

    /// Manager with the default dispatcher, workspace and extensions
    pub fn new(config: Configuration) -> core::result::Result<Self, Status> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        &*self.dispatcher
    }

    pub fn extensions(&self) -> &ExtensionTable {
        &self.extensions
    }

    pub fn timeslice(&self) -> Ticks {
        Ticks::from(self.config.ticks_per_timeslice)
    }

    // ------------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------------

    pub fn allocation_lock_held(&self) -> bool {
        self.allocator.is_locked()
    }

    pub fn interrupts_disabled(&self) -> bool {
        self.isr.is_disabled()
    }

    /// Free control blocks of one API class
    pub fn free_slots(&self, api: ObjectApi) -> usize {
        self.allocator.lock().pool(api).free_count()
    }

    pub fn free_stack_bytes(&self) -> usize {
        self.allocator.lock().stacks.free_bytes()
    }

    /// Published threads of one API class
    pub fn thread_count(&self, api: ObjectApi) -> usize {
        self.table(api).count()
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    fn table(&self, api: ObjectApi) -> &ObjectTable<Thread> {
        match api {
            ObjectApi::Posix => &self.posix_threads,
            ObjectApi::Internal => &self.internal_threads,
        }
    }

    /// Find a published thread
    pub fn get(&self, id: ThreadId) -> Option<Arc<Thread>> {
        self.table(id.api()?).get(id)
    }

    pub fn lookup(&self, id: ThreadId) -> Result<Arc<Thread>> {
        self.get(id).ok_or(ThreadError::NoSuchThread)
    }

    // ------------------------------------------------------------------------
    // Per-processor state
    // ------------------------------------------------------------------------

    pub(crate) fn timer_watchdogs(&self) -> MutexGuard<'_, WatchdogHeader> {
        self.per_cpu[TIMER_CPU].watchdogs.lock()
    }

    /// Ticks seen by a processor
    pub fn ticks(&self, cpu: CpuIndex) -> Option<Ticks> {
        self.per_cpu.get(cpu).map(|c| c.watchdogs.lock().ticks())
    }

    /// Timers armed on a processor
    pub fn armed_watchdogs(&self, cpu: CpuIndex) -> Option<usize> {
        self.per_cpu.get(cpu).map(|c| c.watchdogs.lock().pending())
    }

    pub fn executing(&self, cpu: CpuIndex) -> Option<Arc<Thread>> {
        self.per_cpu.get(cpu)?.executing.lock().clone()
    }

    /// Dispatch `id` on `cpu`, or leave the processor idle
    pub fn set_executing(&self, cpu: CpuIndex, id: Option<ThreadId>) -> Result<()> {
        let per_cpu = self.per_cpu.get(cpu).ok_or(ThreadError::InvalidArgument)?;
        let thread = id.map(|id| self.lookup(id)).transpose()?;

        let _isr = self.isr.disable();
        if let Some(thread) = &thread {
            let mut core = thread.lock();
            if !core.state.is_ready() || !core.affinity.contains(cpu) {
                return Err(ThreadError::InvalidArgument);
            }
            core.budget.at_context_switch(self.timeslice());
        }
        *per_cpu.executing.lock() = thread;
        Ok(())
    }

    fn clear_executing(&self, id: ThreadId) {
        for per_cpu in &self.per_cpu {
            let mut executing = per_cpu.executing.lock();
            if executing.as_ref().is_some_and(|t| t.id() == id) {
                *executing = None;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Clock tick
    // ------------------------------------------------------------------------

    /// Clock tick on `cpu`
    ///
    /// The processor's clock advances first, then the executing thread is
    /// charged, then the watchdogs due at the new tick run.
    pub fn tick(&self, cpu: CpuIndex) {
        let Some(per_cpu) = self.per_cpu.get(cpu) else {
            warn!("tick on unknown processor {}", cpu);
            return;
        };

        let _isr = self.isr.disable();
        per_cpu.watchdogs.lock().advance();

        let executing = per_cpu.executing.lock().clone();
        if let Some(thread) = executing {
            self.budget_at_tick(&thread);
        }

        let expired = per_cpu.watchdogs.lock().expire();
        for (id, routine) in expired {
            self.fire_watchdog(id, routine);
        }
    }

    fn budget_at_tick(&self, thread: &Thread) {
        let mut core = thread.lock();
        if !thread.is_preemptible()
            || !core.state.is_ready()
            || core.life.contains(LifeState::TERMINATING)
        {
            return;
        }

        match core.budget.consume(self.timeslice()) {
            TickOutcome::Charged => {}
            TickOutcome::Yield => {
                drop(core);
                self.dispatcher.yield_processor(thread);
            }
            TickOutcome::Exhausted => {
                let update = sporadic::budget_callout(self, &mut core);
                drop(core);
                self.update_priority(thread, update);
            }
        }
    }

    fn fire_watchdog(&self, id: WatchdogId, routine: WatchdogRoutine) {
        match routine {
            WatchdogRoutine::SporadicReplenish(owner) => {
                let Some(thread) = self.get(owner) else {
                    return;
                };
                let update = sporadic::replenish(self, &mut thread.lock(), id);
                self.update_priority(&thread, update);
            }
        }
    }

    /// Propagate a priority change collected under the state lock
    pub(crate) fn update_priority(&self, thread: &Thread, update: Option<PriorityUpdate>) {
        if let Some(update) = update {
            self.dispatcher
                .update_priority(thread, update.priority, update.wait_queue);
        }
    }

    // ------------------------------------------------------------------------
    // Blocking
    // ------------------------------------------------------------------------

    /// Block a ready thread on a wait queue
    pub fn block_on(&self, id: ThreadId, queue: WaitQueueId) -> Result<()> {
        let thread = self.lookup(id)?;
        let _isr = self.isr.disable();
        {
            let mut core = thread.lock();
            if !core.state.is_ready() {
                return Err(ThreadError::InvalidArgument);
            }
            core.state |= ThreadState::WAITING;
            core.wait_queue = Some(queue);
        }
        self.dispatcher.block(&thread);
        self.clear_executing(id);
        Ok(())
    }

    /// Release a thread from its wait queue
    pub fn unblock(&self, id: ThreadId) -> Result<()> {
        let thread = self.lookup(id)?;
        let _isr = self.isr.disable();
        let ready = {
            let mut core = thread.lock();
            if !core.state.contains(ThreadState::WAITING) {
                return Err(ThreadError::InvalidArgument);
            }
            core.state = core.state & !ThreadState::WAITING;
            core.wait_queue = None;
            core.state.is_ready()
        };
        if ready {
            self.dispatcher.unblock(&thread);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Priority contributions
    // ------------------------------------------------------------------------

    /// Attach an inherited priority (for example from a mutex the thread
    /// holds) under `key`
    pub fn add_inherited_priority(&self, id: ThreadId, key: u32, priority: i32) -> Result<()> {
        let thread = self.lookup(id)?;
        let priority = posix_to_core(thread.home_scheduler(), priority)?;

        let _isr = self.isr.disable();
        let update = {
            let mut core = thread.lock();
            let before = core.effective_priority();
            core.add_inherited(key, priority)?;
            core.priority_update_since(before)
        };
        self.update_priority(&thread, update);
        Ok(())
    }

    pub fn remove_inherited_priority(&self, id: ThreadId, key: u32) -> Result<()> {
        let thread = self.lookup(id)?;

        let _isr = self.isr.disable();
        let update = {
            let mut core = thread.lock();
            let before = core.effective_priority();
            core.remove_inherited(key)?;
            core.priority_update_since(before)
        };
        self.update_priority(&thread, update);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Build, start and publish a thread described by `descriptor`
    ///
    /// Runs entirely under the allocation lock. Every failure after the
    /// first acquisition releases what was acquired before returning.
    pub(crate) fn construct(
        &self,
        api: ObjectApi,
        executing: Option<&Thread>,
        descriptor: &ThreadDescriptor,
    ) -> Result<ThreadId> {
        let mut construction = Construction::begin(self, api);

        let id = construction.allocate_slot()?;
        let stack = construction.acquire_stack(descriptor.config.stack)?;
        let thread = construction.initialize(id, &descriptor.config, stack)?;

        {
            let mut core = thread.lock();
            if descriptor.detached {
                core.life.insert(LifeState::DETACHED);
            }
            core.life.insert(LifeState::CHANGE_DEFERRED);
        }

        {
            let _isr = self.isr.disable();
            if let Err(status) = self.set_affinity(&thread, &descriptor.affinity) {
                warn!("thread {}: affinity rejected ({})", id, status);
                return Err(ThreadError::InvalidArgument);
            }
        }

        if !self.extensions.thread_create(self, executing, &thread) {
            debug_assert!(false, "create extension failed for {}", id);
            warn!("thread {}: create extension failed", id);
        }

        {
            let mut core = thread.lock();
            core.created_with_inherited_scheduler = descriptor.inherited;
            core.api
                .sporadic
                .configure(descriptor.low_priority, &descriptor.sched_param);
            if descriptor.config.policy.is_sporadic() {
                core.budget.reload(descriptor.sched_param.ss_init_budget);
            }
        }

        {
            let _isr = self.isr.disable();
            if let Err(status) = thread.start(descriptor.entry, descriptor.arg) {
                warn!("thread {}: start failed ({})", id, status);
                return Err(ThreadError::InvalidArgument);
            }
            self.dispatcher.unblock(&thread);
        }

        let id = construction.commit(thread);
        debug!(
            "thread {} created: {:?} at {:?}",
            id,
            descriptor.config.policy,
            descriptor.config.priority
        );
        Ok(id)
    }

    /// Bind a thread to a processor set; interrupts must be disabled
    fn set_affinity(&self, thread: &Thread, affinity: &CpuSet) -> core::result::Result<(), Status> {
        debug_assert!(self.isr.is_disabled());
        thread.home_scheduler().check_affinity(affinity)?;
        thread.lock().affinity = *affinity;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Termination
    // ------------------------------------------------------------------------

    /// Terminate a thread with `value` as its return value
    ///
    /// Detached threads are released immediately; joinable ones stay around
    /// as zombies until joined. Terminating a thread twice does nothing.
    pub(crate) fn exit_thread(&self, thread: &Arc<Thread>, value: usize) {
        {
            let mut core = thread.lock();
            if core.life.contains(LifeState::TERMINATING) {
                return;
            }
            core.life.insert(LifeState::TERMINATING);
            core.life.remove(LifeState::CANCEL_PENDING);
            core.return_value = value;
        }

        self.extensions.thread_terminate(self, thread);

        let detached = {
            let _isr = self.isr.disable();
            let (was_ready, detached) = {
                let mut core = thread.lock();
                let was_ready = core.state.is_ready();
                core.state = ThreadState::ZOMBIE;
                core.wait_queue = None;
                core.entry = None;
                (was_ready, core.life.contains(LifeState::DETACHED))
            };
            if was_ready {
                self.dispatcher.block(thread);
            }
            self.clear_executing(thread.id());
            detached
        };

        debug!("thread {} exited with {:#x}", thread.id(), value);
        if detached {
            self.release(thread);
        }
    }

    /// Give a terminated thread's resources back, newest first
    pub(crate) fn release(&self, thread: &Arc<Thread>) {
        let id = thread.id();
        let Some(api) = id.api() else {
            error!("releasing thread with malformed id {}", id);
            return;
        };

        let mut allocator = self.allocator.lock();
        self.table(api).unpublish(id);
        self.dispatcher.node_destroy(thread);
        let stack = thread.stack();
        if stack.owner == StackOwner::Kernel {
            allocator.stacks.free(stack.area);
        }
        allocator.pool_mut(api).free(id);
    }
}

// ============================================================================
// Rollback guard
// ============================================================================

/// An in-progress construction
///
/// Holds the allocation lock and remembers every resource acquired so far.
/// Dropping it without [`commit`](Construction::commit) gives them back in
/// reverse order.
struct Construction<'a> {
    manager: &'a ThreadManager,
    allocator: MutexGuard<'a, Allocator>,
    api: ObjectApi,
    id: Option<ThreadId>,
    kernel_stack: Option<StackArea>,
    thread: Option<Arc<Thread>>,
}

impl<'a> Construction<'a> {
    fn begin(manager: &'a ThreadManager, api: ObjectApi) -> Self {
        Self {
            manager,
            allocator: manager.allocator.lock(),
            api,
            id: None,
            kernel_stack: None,
            thread: None,
        }
    }

    fn allocate_slot(&mut self) -> core::result::Result<ThreadId, Status> {
        let id = self
            .allocator
            .pool_mut(self.api)
            .allocate()
            .ok_or(Status::TooMany)?;
        self.id = Some(id);
        Ok(id)
    }

    fn acquire_stack(&mut self, request: StackRequest) -> core::result::Result<Stack, Status> {
        match request {
            StackRequest::Caller(area) => Ok(Stack {
                area,
                owner: StackOwner::Caller,
            }),
            StackRequest::Kernel(size) => {
                let area = self.allocator.stacks.allocate(size).ok_or(Status::NoMemory)?;
                self.kernel_stack = Some(area);
                Ok(Stack {
                    area,
                    owner: StackOwner::Kernel,
                })
            }
        }
    }

    /// Core initialization
    fn initialize(
        &mut self,
        id: ThreadId,
        config: &ThreadConfig,
        stack: Stack,
    ) -> core::result::Result<Arc<Thread>, Status> {
        let thread = Arc::new(Thread::new(id, config, stack, self.manager.timeslice()));
        self.manager
            .dispatcher
            .node_initialize(&thread, config.priority)?;
        self.thread = Some(Arc::clone(&thread));
        Ok(thread)
    }

    /// Publish the thread and keep everything acquired
    fn commit(mut self, thread: Arc<Thread>) -> ThreadId {
        let id = thread.id();
        self.manager.table(self.api).publish(id, thread);
        self.id = None;
        self.kernel_stack = None;
        self.thread = None;
        id
    }
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.manager.dispatcher.node_destroy(&thread);
        }
        if let Some(area) = self.kernel_stack.take() {
            self.allocator.stacks.free(area);
        }
        if let Some(id) = self.id.take() {
            self.allocator.pool_mut(self.api).free(id);
            warn!("thread {}: construction rolled back", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_rejects_bad_config() {
        let config = Configuration {
            processor_count: 0,
            ..Configuration::default()
        };
        assert!(ThreadManager::new(config).is_err());
    }

    #[test]
    fn test_fresh_manager_counters() {
        let mgr = ThreadManager::new(Configuration::default()).unwrap();
        assert_eq!(mgr.free_slots(ObjectApi::Posix), 32);
        assert_eq!(mgr.free_slots(ObjectApi::Internal), 4);
        assert_eq!(mgr.free_stack_bytes(), mgr.config().workspace_size);
        assert_eq!(mgr.extensions().len(), 1);
        assert_eq!(mgr.ticks(0), Some(0));
        assert_eq!(mgr.ticks(1), None);
        assert!(!mgr.allocation_lock_held());
    }

    #[test]
    fn test_tick_on_unknown_processor_is_ignored() {
        let mgr = ThreadManager::new(Configuration::default()).unwrap();
        mgr.tick(3);
        assert_eq!(mgr.ticks(0), Some(0));
        mgr.tick(0);
        assert_eq!(mgr.ticks(0), Some(1));
        assert!(!mgr.interrupts_disabled());
    }
}
