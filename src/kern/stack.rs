//! Thread stacks
//!
//! A thread runs either on a stack the caller handed in through the
//! attributes, or on one the kernel carved out of its workspace. Only the
//! second kind is ever given back by the kernel.

use alloc::collections::BTreeMap;

use crate::config::Configuration;

// ============================================================================
// Stack area
// ============================================================================

/// A contiguous stack region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackArea {
    pub begin: usize,
    pub size: usize,
}

impl StackArea {
    pub const fn new(begin: usize, size: usize) -> Self {
        Self { begin, size }
    }

    pub fn end(&self) -> usize {
        self.begin + self.size
    }
}

/// Who releases the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOwner {
    /// Supplied through the attributes; never freed by the kernel
    Caller,
    /// Allocated by the kernel; freed on thread destruction
    Kernel,
}

/// A thread's stack and its ownership
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stack {
    pub area: StackArea,
    pub owner: StackOwner,
}

// ============================================================================
// Size policy
// ============================================================================

/// Is a caller-supplied stack of `size` bytes large enough?
pub fn stack_is_enough(config: &Configuration, size: usize, is_fp: bool) -> bool {
    let mut minimum = config.minimum_stack_size;
    if is_fp {
        minimum += config.fp_context_size;
    }
    size >= minimum
}

pub fn ensure_minimum(config: &Configuration, size: usize) -> usize {
    size.max(config.minimum_stack_size)
}

/// Grow a requested size by the FP context and round up to alignment
///
/// On overflow the original size is returned; the allocation will then
/// fail on its own.
pub fn extend_size(config: &Configuration, size: usize, is_fp: bool) -> usize {
    let extra = if is_fp { config.fp_context_size } else { 0 };
    let align = config.stack_alignment;

    size.checked_add(extra)
        .and_then(|s| s.checked_add(align - 1))
        .map(|s| s & !(align - 1))
        .unwrap_or(size)
}

// ============================================================================
// Allocator interface
// ============================================================================

/// Low-level stack memory allocator
///
/// Only called with the allocation lock held.
pub trait StackAllocator: Send {
    fn allocate(&mut self, size: usize) -> Option<StackArea>;
    fn free(&mut self, area: StackArea);
    /// Bytes still available
    fn free_bytes(&self) -> usize;
}

// ============================================================================
// Workspace allocator
// ============================================================================

/// First-fit allocator over a fixed address range
#[derive(Debug)]
pub struct Workspace {
    base: usize,
    size: usize,
    /// Free blocks: begin -> size, never adjacent
    free_blocks: BTreeMap<usize, usize>,
    free_bytes: usize,
}

impl Workspace {
    pub fn new(base: usize, size: usize) -> Self {
        let mut free_blocks = BTreeMap::new();
        if size > 0 {
            free_blocks.insert(base, size);
        }
        Self {
            base,
            size,
            free_blocks,
            free_bytes: size,
        }
    }

    pub fn capacity(&self) -> usize {
        self.size
    }

    fn owns(&self, area: &StackArea) -> bool {
        area.begin >= self.base && area.end() <= self.base + self.size
    }
}

impl StackAllocator for Workspace {
    fn allocate(&mut self, size: usize) -> Option<StackArea> {
        if size == 0 {
            return None;
        }
        let (&begin, &block) = self.free_blocks.iter().find(|(_, len)| **len >= size)?;

        self.free_blocks.remove(&begin);
        if block > size {
            self.free_blocks.insert(begin + size, block - size);
        }
        self.free_bytes -= size;
        Some(StackArea::new(begin, size))
    }

    fn free(&mut self, area: StackArea) {
        debug_assert!(self.owns(&area), "freeing foreign stack {:?}", area);

        let mut begin = area.begin;
        let mut size = area.size;

        // Coalesce with the preceding block
        let before = self.free_blocks.range(..begin).next_back().map(|(&b, &l)| (b, l));
        if let Some((prev, prev_len)) = before {
            if prev + prev_len == begin {
                self.free_blocks.remove(&prev);
                begin = prev;
                size += prev_len;
            }
        }
        // ... and the following one
        if let Some(next_len) = self.free_blocks.remove(&(begin + size)) {
            size += next_len;
        }

        self.free_blocks.insert(begin, size);
        self.free_bytes += area.size;
    }

    fn free_bytes(&self) -> usize {
        self.free_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_policy() {
        let config = Configuration::default();
        assert!(stack_is_enough(&config, config.minimum_stack_size, false));
        assert!(!stack_is_enough(&config, config.minimum_stack_size, true));
        assert!(stack_is_enough(
            &config,
            config.minimum_stack_size + config.fp_context_size,
            true
        ));

        assert_eq!(ensure_minimum(&config, 100), config.minimum_stack_size);
        assert_eq!(ensure_minimum(&config, 10_000), 10_000);

        let extended = extend_size(&config, 4097, true);
        assert!(extended >= 4097 + config.fp_context_size);
        assert_eq!(extended % config.stack_alignment, 0);

        assert_eq!(extend_size(&config, usize::MAX, true), usize::MAX);
    }

    #[test]
    fn test_workspace_allocate_free() {
        let mut ws = Workspace::new(0x1000, 0x3000);
        let a = ws.allocate(0x1000).unwrap();
        let b = ws.allocate(0x1000).unwrap();
        let c = ws.allocate(0x1000).unwrap();
        assert_eq!(ws.free_bytes(), 0);
        assert!(ws.allocate(1).is_none());

        ws.free(b);
        assert_eq!(ws.free_bytes(), 0x1000);
        ws.free(a);
        ws.free(c);
        assert_eq!(ws.free_bytes(), 0x3000);

        // Everything coalesced back into one block
        let all = ws.allocate(0x3000).unwrap();
        assert_eq!(all, StackArea::new(0x1000, 0x3000));
    }
}
