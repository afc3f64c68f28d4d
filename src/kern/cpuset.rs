//! Processor sets
//!
//! Affinity is passed in as a CPU set plus its size in bytes, the way
//! `pthread_attr_setaffinity_np` takes it.

use crate::config::MAXIMUM_PROCESSORS;
use crate::types::CpuIndex;

/// A set of processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSet {
    bits: u64,
}

impl CpuSet {
    /// Size of the set in bytes as seen by callers
    pub const BYTE_SIZE: usize = core::mem::size_of::<u64>();

    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Set containing processors `0..count`
    pub const fn first(count: usize) -> Self {
        if count >= MAXIMUM_PROCESSORS {
            Self { bits: u64::MAX }
        } else {
            Self {
                bits: (1u64 << count) - 1,
            }
        }
    }

    /// Build from a caller-supplied byte buffer
    ///
    /// Bytes past the first eight must be zero; a processor we cannot
    /// represent makes the set invalid rather than silently dropped.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut bits = 0u64;
        for (i, byte) in bytes.iter().enumerate() {
            if i < Self::BYTE_SIZE {
                bits |= (*byte as u64) << (i * 8);
            } else if *byte != 0 {
                return None;
            }
        }
        Some(Self { bits })
    }

    pub fn set(&mut self, cpu: CpuIndex) {
        if cpu < MAXIMUM_PROCESSORS {
            self.bits |= 1 << cpu;
        }
    }

    pub fn clear(&mut self, cpu: CpuIndex) {
        if cpu < MAXIMUM_PROCESSORS {
            self.bits &= !(1 << cpu);
        }
    }

    pub fn contains(&self, cpu: CpuIndex) -> bool {
        cpu < MAXIMUM_PROCESSORS && self.bits & (1 << cpu) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn count(&self) -> u32 {
        self.bits.count_ones()
    }

    pub fn is_subset_of(&self, other: &CpuSet) -> bool {
        self.bits & !other.bits == 0
    }

    /// Lowest-numbered processor in the set
    pub fn first_cpu(&self) -> Option<CpuIndex> {
        if self.bits == 0 {
            None
        } else {
            Some(self.bits.trailing_zeros() as CpuIndex)
        }
    }
}
