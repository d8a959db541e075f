//! Entity handles and the per-match allocator.
//!
//! An [`Entity`] is an opaque non-negative index into the registry's sparse
//! component stores. Indices are handed out monotonically and are never
//! reused within a match; validity is tracked by the allocator from
//! [`spawn`](EntityAllocator::allocate) until
//! [`kill`](EntityAllocator::deallocate).

use std::fmt;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An opaque handle to an entity.
///
/// The wrapped index is stable for the lifetime of the match and doubles as
/// the wire identifier in snapshots (truncated to `u16` by the codec).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Entity(u32);

impl Entity {
    /// Build an entity handle from a raw index.
    ///
    /// Intended for back-references stored as integers (e.g. a boss part
    /// pointing at its boss) and for ids arriving off the wire. The handle
    /// may refer to a dead entity; all registry operations re-check validity.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw index into the sparse stores.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The raw id, as sent on the wire.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates entity indices and tracks which are alive.
///
/// Indices grow monotonically; a killed index is never handed out again, so
/// stale handles can always be detected by the `alive` bitmap.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// `alive[i]` is true while entity `i` is valid.
    alive: Vec<bool>,
    /// Number of currently alive entities.
    live_count: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next free index, marked alive.
    pub fn allocate(&mut self) -> Entity {
        let index = self.alive.len();
        self.alive.push(true);
        self.live_count += 1;
        Entity::from_index(index)
    }

    /// Mark an entity dead. Returns `false` if it was not alive.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        match self.alive.get_mut(entity.index()) {
            Some(slot) if *slot => {
                *slot = false;
                self.live_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Whether the entity is currently valid.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Number of alive entities.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Total indices ever allocated (alive or dead).
    pub fn allocated(&self) -> usize {
        self.alive.len()
    }

    /// Iterate over all alive entities in ascending index order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| Entity::from_index(i))
    }

    /// Kill everything and forget all indices (match reset).
    pub fn clear(&mut self) {
        self.alive.clear();
        self.live_count = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
