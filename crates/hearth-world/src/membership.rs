//! Swap-remove membership lists and the per-entity slot cache.
//!
//! A [`MembershipList`] supports O(1) removal by moving its last element into
//! the vacated slot. The list knows nothing about the slots cached on
//! entities: when [`MembershipList::remove_at`] moves an element it reports
//! the move as a [`Displaced`], and the caller must write the new slot back
//! onto the moved entity's [`Membership`]. The registry upholds this for the
//! update list, the draw list and every tag list.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;
use crate::identity::WorldId;

/// Slot caches of every admitted entity, keyed by entity key.
pub(crate) type Records = HashMap<EntityKey, Membership>;

// ---------------------------------------------------------------------------
// MembershipList
// ---------------------------------------------------------------------------

/// An element that was moved by a swap-remove, and the slot it now occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Displaced<T> {
    /// The element that moved (formerly the last element).
    pub item: T,
    /// Its new slot (the slot that was removed).
    pub slot: usize,
}

/// An ordered list with O(1) removal by swap-remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipList<T> {
    items: Vec<T>,
}

impl<T: Copy> MembershipList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append `item`, returning the slot it occupies.
    pub fn push(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    /// Remove the element at `slot` by moving the last element into it.
    ///
    /// Returns the moved element and its new slot, or `None` when nothing
    /// moved (the removed element was last, or `slot` is out of range).
    pub fn remove_at(&mut self, slot: usize) -> Option<Displaced<T>> {
        debug_assert!(slot < self.items.len(), "slot {slot} out of range");
        if slot >= self.items.len() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap_remove(slot);
        if slot == last {
            None
        } else {
            Some(Displaced {
                item: self.items[slot],
                slot,
            })
        }
    }

    /// The element at `slot`, if any.
    pub fn get(&self, slot: usize) -> Option<T> {
        self.items.get(slot).copied()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The elements in list order.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterate in list order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Copy> Default for MembershipList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ListKind
// ---------------------------------------------------------------------------

/// The two fixed per-frame lists an entity can participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    /// Entities receiving `on_update` each frame.
    Update,
    /// Entities receiving `on_draw` each frame.
    Draw,
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Cached list positions of one admitted entity.
///
/// Owned and mutated only by the registry. For every list the entity is in,
/// the cached slot equals its current position in that list. A tag added more
/// than once occupies several slots; all of them are tracked, most recent
/// last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub(crate) world_id: WorldId,
    pub(crate) update_slot: Option<usize>,
    pub(crate) draw_slot: Option<usize>,
    pub(crate) tag_slots: BTreeMap<String, Vec<usize>>,
}

impl Membership {
    pub(crate) fn new(world_id: WorldId) -> Self {
        Self {
            world_id,
            update_slot: None,
            draw_slot: None,
            tag_slots: BTreeMap::new(),
        }
    }

    /// Identity assigned at admission.
    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// Position in the update list, if participating.
    pub fn update_slot(&self) -> Option<usize> {
        self.update_slot
    }

    /// Position in the draw list, if participating.
    pub fn draw_slot(&self) -> Option<usize> {
        self.draw_slot
    }

    /// Cached slot for one of the fixed lists.
    pub fn slot(&self, list: ListKind) -> Option<usize> {
        match list {
            ListKind::Update => self.update_slot,
            ListKind::Draw => self.draw_slot,
        }
    }

    pub(crate) fn slot_mut(&mut self, list: ListKind) -> &mut Option<usize> {
        match list {
            ListKind::Update => &mut self.update_slot,
            ListKind::Draw => &mut self.draw_slot,
        }
    }

    /// Whether the entity currently holds `tag`.
    pub fn holds_tag(&self, tag: &str) -> bool {
        self.tag_slots.contains_key(tag)
    }

    /// Slots held in `tag`'s list (more than one if tagged repeatedly).
    pub fn tag_slots(&self, tag: &str) -> &[usize] {
        self.tag_slots.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names of all tags held, in name order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tag_slots.keys().map(String::as_str)
    }

    /// Repoint the cached slot for `tag` from `from` to `to` after a swap.
    pub(crate) fn patch_tag_slot(&mut self, tag: &str, from: usize, to: usize) -> bool {
        match self
            .tag_slots
            .get_mut(tag)
            .and_then(|slots| slots.iter_mut().find(|s| **s == from))
        {
            Some(slot) => {
                *slot = to;
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
