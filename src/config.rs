//! Kernel configuration
//!
//! One [`Configuration`] is handed to [`crate::ThreadManager::new`] at kernel
//! start. It sizes the object pools and the stack workspace and fixes the
//! scheduler's priority range; nothing in here changes after boot.

use crate::error::Status;

// ============================================================================
// Defaults
// ============================================================================

/// Smallest stack the kernel will hand out
pub const MINIMUM_STACK_SIZE: usize = 4096;

/// Bytes reserved in every floating-point thread's stack for the FP context
pub const FP_CONTEXT_SIZE: usize = 512;

/// Stack alignment required by the ABI
pub const STACK_ALIGNMENT: usize = 16;

/// Default scheduler priority count (core priorities `0..=255`)
pub const DEFAULT_MAXIMUM_PRIORITY: u64 = 255;

/// Ticks a round-robin thread runs before yielding
pub const DEFAULT_TICKS_PER_TIMESLICE: u32 = 50;

/// Upper bound on the identifier index field
pub const MAXIMUM_OBJECTS_PER_CLASS: usize = 0xFFFF;

/// Upper bound on processors (size of [`crate::kern::cpuset::CpuSet`])
pub const MAXIMUM_PROCESSORS: usize = 64;

// ============================================================================
// Configuration
// ============================================================================

/// Kernel configuration table
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Control blocks available to `pthread_create`
    pub maximum_posix_threads: usize,
    /// Control blocks available to kernel-internal threads
    pub maximum_internal_threads: usize,
    /// Minimum stack size, before the FP context is added
    pub minimum_stack_size: usize,
    /// Extra stack bytes for the FP context
    pub fp_context_size: usize,
    /// Stack size alignment
    pub stack_alignment: usize,
    /// Scheduler priority count; valid POSIX priorities are `1..maximum_priority`
    pub maximum_priority: u64,
    /// Number of online processors
    pub processor_count: usize,
    /// Timeslice length for round-robin and "other" threads
    pub ticks_per_timeslice: u32,
    /// Bytes available to the kernel stack allocator
    pub workspace_size: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            maximum_posix_threads: 32,
            maximum_internal_threads: 4,
            minimum_stack_size: MINIMUM_STACK_SIZE,
            fp_context_size: FP_CONTEXT_SIZE,
            stack_alignment: STACK_ALIGNMENT,
            maximum_priority: DEFAULT_MAXIMUM_PRIORITY,
            processor_count: 1,
            ticks_per_timeslice: DEFAULT_TICKS_PER_TIMESLICE,
            workspace_size: 256 * 1024,
        }
    }
}

impl Configuration {
    /// Reject tables the kernel cannot boot with
    pub fn validate(&self) -> Result<(), Status> {
        if self.maximum_posix_threads > MAXIMUM_OBJECTS_PER_CLASS
            || self.maximum_internal_threads > MAXIMUM_OBJECTS_PER_CLASS
        {
            return Err(Status::TooMany);
        }
        if self.maximum_internal_threads == 0 {
            // The bootstrap thread lives in the internal pool.
            return Err(Status::InvalidNumber);
        }
        if self.processor_count == 0 || self.processor_count > MAXIMUM_PROCESSORS {
            return Err(Status::InvalidNumber);
        }
        if !self.stack_alignment.is_power_of_two() {
            return Err(Status::InvalidNumber);
        }
        // Stack sizes are grown by the FP context and rounded to alignment
        if self
            .minimum_stack_size
            .checked_add(self.fp_context_size)
            .and_then(|size| size.checked_add(self.stack_alignment))
            .is_none()
        {
            return Err(Status::InvalidNumber);
        }
        if self.maximum_priority < 2 {
            return Err(Status::InvalidPriority);
        }
        if self.ticks_per_timeslice == 0 {
            return Err(Status::InvalidNumber);
        }
        Ok(())
    }
}
