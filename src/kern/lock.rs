//! Interrupt lock
//!
//! Stands in for "interrupts disabled": the clock tick and the creation
//! steps that must not interleave with a tick both run under it. Sections
//! are short and never sleep, so a bare atomic flag is enough.
//!
//! Longer-lived state (allocation lock, thread state locks) uses
//! `spin::Mutex` directly.

use core::sync::atomic::{AtomicBool, Ordering};

/// Serializes interrupt-disabled sections against the tick path
pub struct InterruptLock {
    disabled: AtomicBool,
}

impl core::fmt::Debug for InterruptLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InterruptLock")
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

impl InterruptLock {
    pub const fn new() -> Self {
        Self {
            disabled: AtomicBool::new(false),
        }
    }

    /// Disable interrupts until the guard is dropped
    ///
    /// Not reentrant: disabling twice on one path spins forever.
    pub fn disable(&self) -> IsrGuard<'_> {
        while self
            .disabled
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.disabled.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
        IsrGuard { owner: self }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }
}

impl Default for InterruptLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupts stay disabled while this is alive
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct IsrGuard<'a> {
    owner: &'a InterruptLock,
}

impl Drop for IsrGuard<'_> {
    fn drop(&mut self) {
        self.owner.disabled.store(false, Ordering::Release);
    }
}
