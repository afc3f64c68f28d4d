//! Common types used across rt_pthread
//!
//! This module defines shared types to avoid circular dependencies.

use core::fmt;

// ============================================================================
// Object API class
// ============================================================================

/// Which API a thread object was created through
///
/// The class is encoded in the thread identifier, so hooks can tell an
/// internal system thread from a POSIX thread without touching the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectApi {
    /// Kernel-internal threads (idle, bootstrap, service threads)
    Internal = 1,
    /// Threads created through `pthread_create`
    Posix = 3,
}

impl ObjectApi {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Internal),
            3 => Some(Self::Posix),
            _ => None,
        }
    }
}

// ============================================================================
// Thread identifier
// ============================================================================

const INDEX_BITS: u32 = 16;
const GENERATION_BITS: u32 = 8;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;
const API_SHIFT: u32 = INDEX_BITS + GENERATION_BITS;

/// Thread identifier
///
/// Layout: `| api:8 | generation:8 | index:16 |`. The generation changes
/// every time a slot is reused so a stale identifier never resolves to the
/// slot's next occupant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const NULL: Self = Self(0);

    /// Build an identifier from its parts
    pub const fn build(api: ObjectApi, generation: u8, index: u16) -> Self {
        Self(
            ((api as u32) << API_SHIFT)
                | (((generation as u32) & GENERATION_MASK) << INDEX_BITS)
                | (index as u32),
        )
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// API class encoded in the identifier
    pub fn api(self) -> Option<ObjectApi> {
        ObjectApi::from_raw(self.0 >> API_SHIFT)
    }

    /// Slot index within the API's object pool
    pub fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    /// Slot generation
    pub fn generation(self) -> u8 {
        ((self.0 >> INDEX_BITS) & GENERATION_MASK) as u8
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({:#010x})", self.0)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Processor index
pub type CpuIndex = usize;

/// Scheduler tick count
pub type Ticks = u64;

/// Thread entry point: takes the start argument, returns the exit value
pub type ThreadEntry = fn(usize) -> usize;
