//! Admission identities.
//!
//! A [`WorldId`] is assigned when an entity is admitted (at flush time), not
//! when the admission is requested. Ids increase monotonically and are never
//! reused for the lifetime of a [`World`](crate::world::World), unlike
//! [`EntityKey`](crate::entity::EntityKey) indices which are recycled.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an admitted entity, unique for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(pub u64);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic [`WorldId`] source.
#[derive(Debug, Default)]
pub struct IdentityCounter {
    next: u64,
}

impl IdentityCounter {
    /// A counter whose first id is `WorldId(0)`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id.
    pub fn next_id(&mut self) -> WorldId {
        let id = WorldId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut ids = IdentityCounter::new();
        let a = ids.next_id();
        let b = ids.next_id();
        let c = ids.next_id();
        assert_eq!((a, b, c), (WorldId(0), WorldId(1), WorldId(2)));
        assert_eq!(ids.issued(), 3);
    }

    #[test]
    fn display_uses_hash_prefix() {
        assert_eq!(WorldId(12).to_string(), "#12");
    }
}
