//! Signals, exit, join, detach, cancel and running entry functions

mod common;

use common::*;
use rt_pthread::kern::priority::{SchedParam, SchedPolicy, SCHED_FIFO};
use rt_pthread::kern::thread::{LifeState, ThreadState};
use rt_pthread::posix::attr::PTHREAD_CREATE_DETACHED;
use rt_pthread::posix::signals::SigSet;
use rt_pthread::posix::PTHREAD_CANCELED;
use rt_pthread::{ObjectApi, ThreadError};

#[test]
fn signal_mask_rules() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    assert_eq!(mgr.signals_unblocked(boot.id()), Ok(SigSet::empty()));

    // Created by an internal thread: everything unblocked
    let parent = mgr.create(Some(&boot), None, Some(entry), 0).unwrap();
    assert_eq!(mgr.signals_unblocked(parent), Ok(SigSet::all()));

    // Created by a POSIX thread: inherit its current mask
    let parent_thread = mgr.get(parent).unwrap();
    let mut narrowed = SigSet::all();
    narrowed.remove(10);
    parent_thread.lock().api.signals_unblocked = narrowed;
    let child = mgr.create(Some(&parent_thread), None, Some(entry), 0).unwrap();
    assert_eq!(mgr.signals_unblocked(child), Ok(narrowed));

    // No creator at all
    let attr = explicit(&mgr, SCHED_FIFO, SchedParam::with_priority(3));
    let orphan = mgr.create(None, Some(&attr), Some(entry), 0).unwrap();
    assert_eq!(mgr.signals_unblocked(orphan), Ok(SigSet::all()));

    // Internal thread created by a POSIX thread still gets nothing
    let service = mgr
        .create_internal(Some(&parent_thread), SchedPolicy::Fifo, 200, idle, 0)
        .unwrap();
    assert_eq!(mgr.signals_unblocked(service), Ok(SigSet::empty()));
}

#[test]
fn new_threads_defer_changes_until_run() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let id = mgr.create(Some(&boot), None, Some(entry), 21).unwrap();
    let thread = mgr.get(id).unwrap();
    assert!(thread.lock().life.contains(LifeState::CHANGE_DEFERRED));
    assert!(!thread.lock().life.contains(LifeState::DETACHED));

    assert_eq!(mgr.run(id), Ok(42));
    assert!(thread.lock().state.contains(ThreadState::ZOMBIE));
    assert_eq!(mgr.try_join(id), Ok(42));
    assert_eq!(mgr.free_slots(ObjectApi::Posix), mgr.config().maximum_posix_threads);
}

#[test]
fn cancel_before_first_run_is_deferred() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let id = mgr.create(Some(&boot), None, Some(entry), 1).unwrap();

    mgr.cancel(id).unwrap();
    let thread = mgr.get(id).unwrap();
    assert!(thread.lock().life.contains(LifeState::CANCEL_PENDING));
    assert!(thread.is_ready());

    assert_eq!(mgr.run(id), Ok(PTHREAD_CANCELED));
    assert_eq!(mgr.try_join(id), Ok(PTHREAD_CANCELED));
}

#[test]
fn cancel_after_run_terminates_immediately() {
    let (mgr, dispatcher) = manager();
    let boot = bootstrap(&mgr);
    let id = mgr.create(Some(&boot), None, Some(entry), 1).unwrap();
    mgr.get(id).unwrap().lock().life.remove(LifeState::CHANGE_DEFERRED);

    mgr.cancel(id).unwrap();
    assert_eq!(dispatcher.count(|e| matches!(e, Event::Block(_))), 1);
    assert_eq!(mgr.try_join(id), Ok(PTHREAD_CANCELED));

    // Already gone
    assert_eq!(mgr.cancel(id), Err(ThreadError::NoSuchThread));
}

#[test]
fn join_semantics() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let id = mgr.create(Some(&boot), None, Some(entry), 0).unwrap();

    assert_eq!(mgr.try_join(id), Err(ThreadError::Busy));
    mgr.exit(id, 9).unwrap();
    // Exiting twice keeps the first value
    mgr.exit(id, 10).unwrap();
    assert_eq!(mgr.try_join(id), Ok(9));
    assert_eq!(mgr.try_join(id), Err(ThreadError::NoSuchThread));
}

#[test]
fn detached_threads_cannot_be_joined() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let mut attr = mgr.attr_init();
    attr.set_detachstate(PTHREAD_CREATE_DETACHED).unwrap();
    let id = mgr.create(Some(&boot), Some(&attr), Some(entry), 0).unwrap();

    assert_eq!(mgr.try_join(id), Err(ThreadError::InvalidArgument));
    assert_eq!(mgr.detach(id), Err(ThreadError::InvalidArgument));

    let free = mgr.free_stack_bytes();
    assert_eq!(mgr.run(id), Ok(0));
    assert!(mgr.get(id).is_none(), "detached thread released at exit");
    assert!(mgr.free_stack_bytes() > free);
}

#[test]
fn detaching_a_zombie_releases_it() {
    let (mgr, dispatcher) = manager();
    let boot = bootstrap(&mgr);
    let id = mgr.create(Some(&boot), None, Some(entry), 0).unwrap();
    mgr.exit(id, 0).unwrap();
    assert!(mgr.get(id).is_some());

    mgr.detach(id).unwrap();
    assert!(mgr.get(id).is_none());
    assert_eq!(dispatcher.count(|e| matches!(e, Event::NodeDestroy(_))), 1);
}

#[test]
fn run_requires_a_ready_thread() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let id = mgr.create(Some(&boot), None, Some(entry), 0).unwrap();
    mgr.block_on(id, rt_pthread::kern::scheduler::WaitQueueId(1)).unwrap();
    assert_eq!(mgr.run(id), Err(ThreadError::InvalidArgument));
    assert_eq!(mgr.block_on(id, rt_pthread::kern::scheduler::WaitQueueId(1)), Err(ThreadError::InvalidArgument));
    mgr.unblock(id).unwrap();
    assert_eq!(mgr.unblock(id), Err(ThreadError::InvalidArgument));
    assert_eq!(mgr.run(id), Ok(0));
}

#[test]
#[should_panic(expected = "exited without an exit handler")]
fn internal_thread_must_not_return() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let _ = mgr.run(boot.id());
}

#[test]
fn getschedparam_errno_wrapper() {
    let (mgr, _) = manager();
    let boot = bootstrap(&mgr);
    let attr = sporadic_attr(&mgr, 40, 20, 100, 10, 3);
    let id = mgr.create(Some(&boot), Some(&attr), Some(entry), 0).unwrap();

    let mut policy = -1;
    let mut param = SchedParam::default();
    assert_eq!(mgr.pthread_getschedparam(id, &mut policy, &mut param), 0);
    assert_eq!(policy, rt_pthread::kern::priority::SCHED_SPORADIC);
    assert_eq!(param, SchedParam::sporadic(40, 20, 100, 10, 3));

    mgr.exit(id, 0).unwrap();
    mgr.try_join(id).unwrap();
    assert_eq!(
        mgr.pthread_getschedparam(id, &mut policy, &mut param),
        rt_pthread::error::ESRCH
    );
}
