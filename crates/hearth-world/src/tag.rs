//! Named, many-to-many entity groups.
//!
//! Each tag name maps to its own [`MembershipList`], created on first use and
//! kept (possibly empty) for the rest of the registry's life. Tag names are
//! case-sensitive. Adding a tag the entity already holds appends a second
//! entry; callers that want idempotent tagging check
//! [`Membership::holds_tag`] first.

use std::collections::HashMap;

use tracing::{info, trace, warn};

use crate::entity::EntityKey;
use crate::membership::{MembershipList, Records};
use crate::WorldError;

/// Tag name -> membership list.
#[derive(Debug, Default)]
pub struct TagTable {
    lists: HashMap<String, MembershipList<EntityKey>>,
}

impl TagTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities tagged `name`, in list order. Empty for unknown tags.
    pub fn get_tagged(&self, name: &str) -> &[EntityKey] {
        self.lists
            .get(name)
            .map(MembershipList::as_slice)
            .unwrap_or(&[])
    }

    /// Number of entries in `name`'s list (duplicates included).
    pub fn tag_count(&self, name: &str) -> usize {
        self.get_tagged(name).len()
    }

    /// Every tag name ever used, sorted.
    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.lists.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Append `key` to `name`'s list and record the slot on its membership.
    ///
    /// Returns the slot the new entry occupies.
    pub(crate) fn add_tag(
        &mut self,
        records: &mut Records,
        key: EntityKey,
        name: &str,
    ) -> Result<usize, WorldError> {
        let membership = records
            .get_mut(&key)
            .ok_or(WorldError::NotAdmitted { key })?;
        let list = self.lists.entry(name.to_owned()).or_default();
        let slot = list.push(key);
        membership
            .tag_slots
            .entry(name.to_owned())
            .or_default()
            .push(slot);

        info!(key = %key, world_id = %membership.world_id, tag = %name, slot, "added tag");
        Ok(slot)
    }

    /// Remove one `name` entry of `key` (its most recent) and back-patch
    /// whichever entity the swap-remove moved.
    ///
    /// Returns `Ok(false)` when `name` has no list or `key` does not hold
    /// `name`. Fails with [`WorldError::NotHoldingTag`] when the cached slot
    /// no longer points at `key`.
    pub(crate) fn remove_tag(
        &mut self,
        records: &mut Records,
        key: EntityKey,
        name: &str,
    ) -> Result<bool, WorldError> {
        let membership = records
            .get_mut(&key)
            .ok_or(WorldError::NotAdmitted { key })?;

        let Some(list) = self.lists.get_mut(name) else {
            membership.tag_slots.remove(name);
            warn!(key = %key, tag = %name, "no tag named '{name}' to remove");
            return Ok(false);
        };

        let Some(slots) = membership.tag_slots.get_mut(name) else {
            trace!(key = %key, tag = %name, "untag skipped: tag not held");
            return Ok(false);
        };
        let slot = match slots.last() {
            Some(&slot) if list.get(slot) == Some(key) => slot,
            _ => {
                return Err(WorldError::NotHoldingTag {
                    key,
                    tag: name.to_owned(),
                })
            }
        };
        slots.pop();
        if slots.is_empty() {
            membership.tag_slots.remove(name);
        }
        let world_id = membership.world_id;

        if let Some(moved) = list.remove_at(slot) {
            let from = list.len();
            let patched = records
                .get_mut(&moved.item)
                .is_some_and(|m| m.patch_tag_slot(name, from, moved.slot));
            debug_assert!(patched, "displaced entity {} lost its '{name}' slot", moved.item);
        }

        info!(key = %key, world_id = %world_id, tag = %name, slot, "removed tag");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
