//! Priority nodes
//!
//! A thread's effective priority is the most important of the priority
//! contributions currently attached to it. Each contribution is a named
//! [`PriorityNode`]; attaching it makes it active, detaching makes it
//! inactive. The thread's own Real node, the sporadic Low node and nodes
//! inherited from mutex waiters all go through the same aggregation.

use heapless::Vec;

use crate::error::Status;
use crate::kern::priority::Priority;

/// Maximum contributions attached to one thread
pub const MAX_PRIORITY_NODES: usize = 8;

/// Slots kept free for the thread's own Real and Low nodes
const RESERVED_NODES: usize = 2;

/// Name of a priority contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The thread's normal priority
    Real,
    /// Sporadic server low priority
    SporadicLow,
    /// Inherited from a thread waiting on a resource this thread holds
    Inherited(u32),
}

/// A priority contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityNode {
    priority: Priority,
    active: bool,
}

impl PriorityNode {
    /// Create an inactive node
    pub const fn new(priority: Priority) -> Self {
        Self {
            priority,
            active: false,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_inactive(&mut self) {
        self.active = false;
    }
}

/// The set of active contributions of one thread
#[derive(Debug, Clone, Default)]
pub struct PriorityAggregation {
    contributions: Vec<(NodeKind, Priority), MAX_PRIORITY_NODES>,
}

impl PriorityAggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `node` under `kind` and mark it active
    pub fn add(&mut self, kind: NodeKind, node: &mut PriorityNode) {
        debug_assert!(!node.active, "priority node {:?} already active", kind);
        debug_assert!(!self.contains(kind));

        let pushed = self.contributions.push((kind, node.priority));
        debug_assert!(pushed.is_ok(), "priority aggregation overflow");
        node.active = true;
    }

    /// Detach `node` and mark it inactive
    pub fn remove(&mut self, kind: NodeKind, node: &mut PriorityNode) {
        debug_assert!(node.active, "priority node {:?} not active", kind);

        if let Some(pos) = self.contributions.iter().position(|(k, _)| *k == kind) {
            self.contributions.swap_remove(pos);
        }
        node.active = false;
    }

    /// Attach an inherited contribution
    pub fn add_inherited(&mut self, key: u32, priority: Priority) -> Result<(), Status> {
        let kind = NodeKind::Inherited(key);
        if self.contains(kind) {
            return Err(Status::IncorrectState);
        }
        let inherited = self
            .contributions
            .iter()
            .filter(|(k, _)| matches!(k, NodeKind::Inherited(_)))
            .count();
        if inherited >= MAX_PRIORITY_NODES - RESERVED_NODES {
            return Err(Status::TooMany);
        }
        self.contributions
            .push((kind, priority))
            .map_err(|_| Status::TooMany)
    }

    pub fn remove_inherited(&mut self, key: u32) -> Result<(), Status> {
        let kind = NodeKind::Inherited(key);
        match self.contributions.iter().position(|(k, _)| *k == kind) {
            Some(pos) => {
                self.contributions.swap_remove(pos);
                Ok(())
            }
            None => Err(Status::IncorrectState),
        }
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.contributions.iter().any(|(k, _)| *k == kind)
    }

    /// Most important active contribution
    pub fn effective(&self) -> Option<Priority> {
        self.contributions
            .iter()
            .map(|(_, p)| *p)
            .reduce(Priority::most_important)
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }
}
