//! User extensions
//!
//! Policy-specific behaviour plugs into the thread manager through sets of
//! lifecycle callbacks. Sets are appended while the manager is being built
//! and the table is sealed before the first thread exists; after that it is
//! only ever read, so invoking the hooks takes no lock.

use alloc::sync::Arc;
use heapless::Vec;

use crate::error::Status;
use crate::kern::thread::Thread;
use crate::manager::ThreadManager;

/// Maximum number of extension sets, including the built-in API set
pub const MAX_EXTENSION_SETS: usize = 8;

/// Runs after core initialization of `created`; `false` reports failure
pub type ThreadCreateExtension =
    fn(manager: &ThreadManager, executing: Option<&Thread>, created: &Thread) -> bool;

/// Runs when a thread starts terminating
pub type ThreadTerminateExtension = fn(manager: &ThreadManager, thread: &Thread);

/// Runs when a thread returns from its entry function
pub type ThreadExittedExtension = fn(manager: &ThreadManager, thread: &Arc<Thread>);

/// One set of lifecycle callbacks
#[derive(Debug, Clone, Copy, Default)]
pub struct UserExtensions {
    pub thread_create: Option<ThreadCreateExtension>,
    pub thread_terminate: Option<ThreadTerminateExtension>,
    pub thread_exitted: Option<ThreadExittedExtension>,
}

/// Extension sets collected during boot
#[derive(Debug, Default)]
pub struct ExtensionRegistry {
    sets: Vec<UserExtensions, MAX_EXTENSION_SETS>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self { sets: Vec::new() }
    }

    /// Append a set; sets run in registration order
    pub fn add(&mut self, set: UserExtensions) -> Result<(), Status> {
        self.sets.push(set).map_err(|_| Status::TooMany)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Freeze the table
    pub fn seal(self) -> ExtensionTable {
        ExtensionTable { sets: self.sets }
    }
}

/// Sealed, read-only extension table
#[derive(Debug)]
pub struct ExtensionTable {
    sets: Vec<UserExtensions, MAX_EXTENSION_SETS>,
}

impl ExtensionTable {
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Run the create hooks in order
    ///
    /// Once a hook fails the remaining create hooks are skipped.
    pub fn thread_create(
        &self,
        manager: &ThreadManager,
        executing: Option<&Thread>,
        created: &Thread,
    ) -> bool {
        self.sets
            .iter()
            .filter_map(|set| set.thread_create)
            .all(|hook| hook(manager, executing, created))
    }

    /// Run the terminate hooks, most recently registered first
    pub fn thread_terminate(&self, manager: &ThreadManager, thread: &Thread) {
        for hook in self.sets.iter().rev().filter_map(|set| set.thread_terminate) {
            hook(manager, thread);
        }
    }

    pub fn thread_exitted(&self, manager: &ThreadManager, thread: &Arc<Thread>) {
        for hook in self.sets.iter().filter_map(|set| set.thread_exitted) {
            hook(manager, thread);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_capacity() {
        let mut registry = ExtensionRegistry::new();
        for _ in 0..MAX_EXTENSION_SETS {
            assert_eq!(registry.add(UserExtensions::default()), Ok(()));
        }
        assert_eq!(
            registry.add(UserExtensions::default()),
            Err(Status::TooMany)
        );

        let table = registry.seal();
        assert_eq!(table.len(), MAX_EXTENSION_SETS);
    }
}
