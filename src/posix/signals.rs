//! Per-thread signal masks

/// Every signal unblocked
pub const SIGNAL_ALL_MASK: u32 = 0xFFFF_FFFF;

/// Highest signal number a set can hold
pub const SIGRTMAX: u32 = 32;

/// Set of unblocked signals, bit `n - 1` for signal `n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SigSet(u32);

impl SigSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(SIGNAL_ALL_MASK)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    fn mask(signo: u32) -> Option<u32> {
        (1..=SIGRTMAX).contains(&signo).then(|| 1 << (signo - 1))
    }

    pub fn contains(self, signo: u32) -> bool {
        Self::mask(signo).is_some_and(|bit| self.0 & bit != 0)
    }

    pub fn add(&mut self, signo: u32) {
        if let Some(bit) = Self::mask(signo) {
            self.0 |= bit;
        }
    }

    pub fn remove(&mut self, signo: u32) {
        if let Some(bit) = Self::mask(signo) {
            self.0 &= !bit;
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}
