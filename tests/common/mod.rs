//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rt_pthread::kern::priority::{Priority, SchedParam, SchedPolicy, SCHED_SPORADIC};
use rt_pthread::kern::scheduler::{Dispatcher, WaitQueueId};
use rt_pthread::kern::thread::Thread;
use rt_pthread::posix::attr::{ThreadAttr, PTHREAD_EXPLICIT_SCHED};
use rt_pthread::{Configuration, Status, ThreadId, ThreadManager};

/// What the manager told the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    NodeInitialize(ThreadId),
    NodeDestroy(ThreadId),
    Unblock(ThreadId),
    Block(ThreadId),
    UpdatePriority(ThreadId, Priority, Option<WaitQueueId>),
    Yield(ThreadId),
}

/// Dispatcher that records every call
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    pub events: Mutex<Vec<Event>>,
    pub fail_node_initialize: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn priority_updates(&self, id: ThreadId) -> Vec<Priority> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::UpdatePriority(t, p, _) if t == id => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| wanted(e)).count()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn node_initialize(&self, thread: &Thread, _priority: Priority) -> Result<(), Status> {
        if self.fail_node_initialize.load(Ordering::SeqCst) {
            return Err(Status::Unsatisfied);
        }
        self.record(Event::NodeInitialize(thread.id()));
        Ok(())
    }

    fn node_destroy(&self, thread: &Thread) {
        self.record(Event::NodeDestroy(thread.id()));
    }

    fn unblock(&self, thread: &Thread) {
        self.record(Event::Unblock(thread.id()));
    }

    fn block(&self, thread: &Thread) {
        self.record(Event::Block(thread.id()));
    }

    fn update_priority(&self, thread: &Thread, priority: Priority, wait_queue: Option<WaitQueueId>) {
        self.record(Event::UpdatePriority(thread.id(), priority, wait_queue));
    }

    fn yield_processor(&self, thread: &Thread) {
        self.record(Event::Yield(thread.id()));
    }
}

pub fn config() -> Configuration {
    Configuration {
        maximum_posix_threads: 8,
        maximum_internal_threads: 2,
        ..Configuration::default()
    }
}

pub fn manager_with(config: Configuration) -> (ThreadManager, Arc<RecordingDispatcher>) {
    let dispatcher = RecordingDispatcher::new();
    let manager = ThreadManager::builder(config)
        .dispatcher(dispatcher.clone())
        .build()
        .unwrap();
    (manager, dispatcher)
}

pub fn manager() -> (ThreadManager, Arc<RecordingDispatcher>) {
    manager_with(config())
}

pub fn entry(arg: usize) -> usize {
    arg * 2
}

pub fn idle(_arg: usize) -> usize {
    0
}

/// Internal bootstrap thread at round-robin priority 10
pub fn bootstrap(manager: &ThreadManager) -> Arc<Thread> {
    let id = manager
        .create_internal(None, SchedPolicy::RoundRobin, 10, idle, 0)
        .unwrap();
    manager.get(id).unwrap()
}

pub fn explicit(manager: &ThreadManager, policy: i32, param: SchedParam) -> ThreadAttr {
    let mut attr = manager.attr_init();
    attr.set_inheritsched(PTHREAD_EXPLICIT_SCHED).unwrap();
    attr.set_schedpolicy(policy).unwrap();
    attr.set_schedparam(param).unwrap();
    attr
}

pub fn sporadic_attr(
    manager: &ThreadManager,
    priority: i32,
    low: i32,
    period: u64,
    budget: u64,
    max_repl: i32,
) -> ThreadAttr {
    explicit(
        manager,
        SCHED_SPORADIC,
        SchedParam::sporadic(priority, low, period, budget, max_repl),
    )
}
