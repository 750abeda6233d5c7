//! Entity keys and key allocation.
//!
//! An [`EntityKey`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. Keys are handed out when an
//! admission is requested, so the host and other entities can address an
//! entity before it is admitted. Retiring an entity bumps the generation for
//! its index, which makes every outstanding copy of the old key stale.
//!
//! Keys are the registry's only back-reference to an entity: they confer no
//! ownership and are resolved through the [`World`](crate::world::World).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityKey
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey(u64);

impl EntityKey {
    /// Construct an `EntityKey` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// KeyAllocator
// ---------------------------------------------------------------------------

/// Issues and recycles [`EntityKey`]s with generational tracking.
///
/// A key is *live* from the moment it is issued (admission requested) until
/// it is released (entity retired). Free indices are recycled in FIFO order
/// so generations spread out instead of piling up on one hot index.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    generations: Vec<u32>,
    live: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl KeyAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh key, reusing a released index when one is available.
    pub fn issue(&mut self) -> EntityKey {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on release.
            self.live[index as usize] = true;
            EntityKey::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.live.push(true);
            EntityKey::new(index, 0)
        }
    }

    /// Release a key so that any outstanding copies become stale.
    ///
    /// Returns `false` if the key was already released or has a stale
    /// generation.
    pub fn release(&mut self, key: EntityKey) -> bool {
        if !self.is_live(key) {
            return false;
        }
        let idx = key.index() as usize;
        self.live[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(key.index());
        true
    }

    /// Returns `true` if `key` was issued and has not been released since.
    pub fn is_live(&self, key: EntityKey) -> bool {
        let idx = key.index() as usize;
        idx < self.generations.len() && self.live[idx] && self.generations[idx] == key.generation()
    }

    /// Number of keys currently live (admitted or awaiting admission).
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|&&l| l).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
