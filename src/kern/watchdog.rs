//! Per-processor watchdogs
//!
//! Every processor has its own tick source and its own queue of one-shot
//! timers measured in that processor's ticks. Expired timers are collected
//! under the header lock and run after it is released, so a routine may
//! re-arm itself.

use alloc::collections::{BTreeSet, BinaryHeap};
use alloc::vec::Vec;
use core::cmp::Ordering as CmpOrdering;

use crate::types::{ThreadId, Ticks};

// ============================================================================
// Timer element
// ============================================================================

/// What to run when a watchdog fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogRoutine {
    /// Sporadic server replenishment for a thread
    SporadicReplenish(ThreadId),
}

/// Handle of an armed watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchdogId(u32);

#[derive(Debug, Clone, Copy)]
struct WatchdogEntry {
    deadline: Ticks,
    id: WatchdogId,
    routine: WatchdogRoutine,
}

impl PartialEq for WatchdogEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WatchdogEntry {}

impl PartialOrd for WatchdogEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for WatchdogEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse order for min-heap (earliest deadline first, then
        // insertion order)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

// ============================================================================
// Watchdog header
// ============================================================================

/// Tick counter and pending timers of one processor
#[derive(Debug)]
pub struct WatchdogHeader {
    ticks: Ticks,
    timers: BinaryHeap<WatchdogEntry>,
    /// Timers that are armed and not yet removed
    armed: BTreeSet<WatchdogId>,
    next_id: u32,
}

impl WatchdogHeader {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            timers: BinaryHeap::new(),
            armed: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Ticks seen by this processor since boot
    pub fn ticks(&self) -> Ticks {
        self.ticks
    }

    /// Arm a one-shot timer `interval` ticks from now
    pub fn insert_ticks(&mut self, interval: Ticks, routine: WatchdogRoutine) -> WatchdogId {
        let id = WatchdogId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.timers.push(WatchdogEntry {
            deadline: self.ticks.saturating_add(interval),
            id,
            routine,
        });
        self.armed.insert(id);
        id
    }

    /// Disarm a timer
    ///
    /// Removing a timer that already fired or was already removed is a
    /// no-op; returns whether the timer was still armed.
    pub fn remove_ticks(&mut self, id: WatchdogId) -> bool {
        // Lazy removal: the heap entry is dropped when it surfaces
        self.armed.remove(&id)
    }

    pub fn is_armed(&self, id: WatchdogId) -> bool {
        self.armed.contains(&id)
    }

    /// Advance the clock by one tick
    pub fn advance(&mut self) -> Ticks {
        self.ticks += 1;
        self.ticks
    }

    /// Collect the timers due at the current tick
    pub fn expire(&mut self) -> Vec<(WatchdogId, WatchdogRoutine)> {
        let now = self.ticks;
        let mut expired = Vec::new();

        while let Some(timer) = self.timers.peek() {
            if timer.deadline > now {
                break;
            }
            if let Some(timer) = self.timers.pop() {
                if self.armed.remove(&timer.id) {
                    expired.push((timer.id, timer.routine));
                }
            }
        }

        expired
    }

    /// Advance the clock and collect what expired
    pub fn tick(&mut self) -> Vec<(WatchdogId, WatchdogRoutine)> {
        self.advance();
        self.expire()
    }

    /// Earliest deadline among armed timers
    pub fn next_deadline(&self) -> Option<Ticks> {
        self.timers
            .iter()
            .filter(|t| self.armed.contains(&t.id))
            .map(|t| t.deadline)
            .min()
    }

    pub fn pending(&self) -> usize {
        self.armed.len()
    }
}

impl Default for WatchdogHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectApi;

    fn routine(index: u16) -> WatchdogRoutine {
        WatchdogRoutine::SporadicReplenish(ThreadId::build(ObjectApi::Posix, 0, index))
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut header = WatchdogHeader::new();
        let late = header.insert_ticks(3, routine(1));
        let early = header.insert_ticks(1, routine(2));

        let fired = header.tick();
        assert_eq!(fired, alloc::vec![(early, routine(2))]);
        assert!(header.tick().is_empty());

        let fired = header.tick();
        assert_eq!(fired, alloc::vec![(late, routine(1))]);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.ticks(), 3);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut header = WatchdogHeader::new();
        let id = header.insert_ticks(2, routine(1));
        assert_eq!(header.next_deadline(), Some(2));

        assert!(header.remove_ticks(id));
        assert!(!header.remove_ticks(id));
        assert_eq!(header.next_deadline(), None);

        header.tick();
        assert!(header.tick().is_empty());

        // Removing after expiry does nothing either
        let fired_id = header.insert_ticks(1, routine(3));
        assert_eq!(header.tick().len(), 1);
        assert!(!header.remove_ticks(fired_id));
    }

    #[test]
    fn test_timer_armed_between_advance_and_expire() {
        let mut header = WatchdogHeader::new();
        assert_eq!(header.advance(), 1);
        let id = header.insert_ticks(2, routine(4));
        assert!(header.expire().is_empty());
        header.tick();
        assert_eq!(header.tick(), alloc::vec![(id, routine(4))]);
        assert_eq!(header.ticks(), 3);
    }
}
