//! Control-block pools
//!
//! Each API class owns a fixed number of control-block slots. An
//! [`ObjectPool`] hands out slot identifiers and takes them back; it is only
//! touched with the allocation lock held. An [`ObjectTable`] maps published
//! identifiers to live objects and is what lookup-by-id reads; an object only
//! enters the table once it is completely constructed.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::RwLock;

use crate::types::{ObjectApi, ThreadId};

// ============================================================================
// Object pool
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free { generation: u8 },
    InUse { generation: u8 },
}

/// Fixed-capacity pool of control-block slots
#[derive(Debug)]
pub struct ObjectPool {
    api: ObjectApi,
    slots: Vec<Slot>,
    /// Free slot indices, oldest first
    inactive: VecDeque<u16>,
}

impl ObjectPool {
    pub fn new(api: ObjectApi, capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize);
        Self {
            api,
            slots: (0..capacity).map(|_| Slot::Free { generation: 0 }).collect(),
            inactive: (0..capacity as u16).collect(),
        }
    }

    pub fn api(&self) -> ObjectApi {
        self.api
    }

    /// Reserve a slot; the returned identifier is not yet published
    pub fn allocate(&mut self) -> Option<ThreadId> {
        let index = self.inactive.pop_front()?;

        let slot = &mut self.slots[index as usize];
        let generation = match *slot {
            Slot::Free { generation } => generation,
            Slot::InUse { .. } => unreachable!("inactive chain holds a used slot"),
        };
        *slot = Slot::InUse { generation };

        Some(ThreadId::build(self.api, generation, index))
    }

    /// Return a slot; the next occupant gets a new generation
    pub fn free(&mut self, id: ThreadId) {
        let index = id.index();
        debug_assert_eq!(id.api(), Some(self.api));

        match self.slots.get(index).copied() {
            Some(Slot::InUse { generation }) if generation == id.generation() => {
                self.slots[index] = Slot::Free {
                    generation: generation.wrapping_add(1),
                };
                self.inactive.push_back(index as u16);
            }
            other => debug_assert!(false, "freeing {:?} in slot state {:?}", id, other),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.inactive.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity() - self.free_count()
    }
}

// ============================================================================
// Object table
// ============================================================================

/// Published objects of one API class, indexed by slot
#[derive(Debug)]
pub struct ObjectTable<T> {
    entries: RwLock<Vec<Option<(ThreadId, Arc<T>)>>>,
}

impl<T> ObjectTable<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new((0..capacity).map(|_| None).collect()),
        }
    }

    /// Make a fully constructed object visible to lookups
    pub fn publish(&self, id: ThreadId, object: Arc<T>) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(id.index()) {
            debug_assert!(entry.is_none(), "slot of {:?} already published", id);
            *entry = Some((id, object));
        }
    }

    /// Remove an object from lookups
    pub fn unpublish(&self, id: ThreadId) -> Option<Arc<T>> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id.index())?;
        if matches!(*entry, Some((found, _)) if found == id) {
            entry.take().map(|(_, object)| object)
        } else {
            None
        }
    }

    /// Look up a published object; stale identifiers resolve to nothing
    pub fn get(&self, id: ThreadId) -> Option<Arc<T>> {
        let entries = self.entries.read();
        match entries.get(id.index()) {
            Some(Some((found, object))) if *found == id => Some(Arc::clone(object)),
            _ => None,
        }
    }

    pub fn count(&self) -> usize {
        self.entries.read().iter().filter(|e| e.is_some()).count()
    }

    /// Snapshot of all published objects
    pub fn all(&self) -> Vec<Arc<T>> {
        self.entries
            .read()
            .iter()
            .filter_map(|e| e.as_ref().map(|(_, object)| Arc::clone(object)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = ObjectPool::new(ObjectApi::Posix, 2);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.free_count(), 0);
        assert!(pool.allocate().is_none());
        assert_eq!(pool.in_use(), 2);

        pool.free(a);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.allocate().map(|id| id.index()), Some(a.index()));
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn test_pool_generation_changes_on_reuse() {
        let mut pool = ObjectPool::new(ObjectApi::Posix, 1);
        let first = pool.allocate().unwrap();
        pool.free(first);
        let second = pool.allocate().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
    }

    #[test]
    fn test_table_lookup() {
        let table: ObjectTable<u32> = ObjectTable::new(4);
        let id = ThreadId::build(ObjectApi::Posix, 0, 2);
        assert!(table.get(id).is_none());

        table.publish(id, Arc::new(7));
        assert_eq!(table.get(id).as_deref(), Some(&7));
        assert_eq!(table.count(), 1);

        let stale = ThreadId::build(ObjectApi::Posix, 1, 2);
        assert!(table.get(stale).is_none());
        assert!(table.unpublish(stale).is_none());

        assert_eq!(table.unpublish(id).as_deref(), Some(&7));
        assert!(table.get(id).is_none());
    }
}
