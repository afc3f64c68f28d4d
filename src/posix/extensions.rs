//! POSIX API extension set

use alloc::sync::Arc;

use crate::kern::thread::Thread;
use crate::kern::userext::UserExtensions;
use crate::manager::ThreadManager;
use crate::posix::signals::SigSet;
use crate::types::ObjectApi;

/// Registered first on every manager
pub const POSIX_EXTENSIONS: UserExtensions = UserExtensions {
    thread_create: Some(thread_create),
    thread_terminate: Some(thread_terminate),
    thread_exitted: Some(thread_exitted),
};

/// Signal mask a new thread starts with
///
/// Internal threads accept no signals. A thread created by an internal
/// thread, or before any thread runs, accepts all of them. Otherwise the
/// creator's mask is inherited.
fn initial_signals(executing: Option<&Thread>, created: &Thread) -> SigSet {
    if created.id().api() == Some(ObjectApi::Internal) {
        return SigSet::empty();
    }
    match executing {
        Some(executing) if executing.id().api() != Some(ObjectApi::Internal) => {
            executing.lock().api.signals_unblocked
        }
        _ => SigSet::all(),
    }
}

fn thread_create(_manager: &ThreadManager, executing: Option<&Thread>, created: &Thread) -> bool {
    let signals = initial_signals(executing, created);

    let mut core = created.lock();
    let sporadic = &mut core.api.sporadic;
    sporadic.thread = created.id();
    sporadic.timer = None;
    sporadic.deadline = None;
    sporadic.low_priority.set_inactive();
    core.api.signals_unblocked = signals;
    true
}

fn thread_terminate(manager: &ThreadManager, thread: &Thread) {
    let mut core = thread.lock();
    let mut watchdogs = manager.timer_watchdogs();
    core.api.sporadic.cancel(&mut watchdogs);
}

fn thread_exitted(manager: &ThreadManager, thread: &Arc<Thread>) {
    if thread.id().api() == Some(ObjectApi::Posix) {
        let value = thread.lock().return_value;
        manager.exit_thread(thread, value);
    }
}
