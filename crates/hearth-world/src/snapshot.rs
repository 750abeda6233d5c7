//! Membership snapshots for inspection and determinism checks.
//!
//! A [`MembershipSnapshot`] captures the list layout of a [`World`]: the
//! update and draw lists, every tag list, and each admitted entity's cached
//! slots. Entities are identified by [`WorldId`] so that two runs fed the same
//! requests produce identical snapshots. Snapshots are read-only; there is no
//! restore path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;
use crate::identity::WorldId;
use crate::world::World;

/// Cached slots of one admitted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Identity assigned at admission.
    pub world_id: WorldId,
    /// Key naming the entity.
    pub key: EntityKey,
    /// Diagnostic label of the entity.
    pub label: String,
    /// Slot in the update list.
    pub update_slot: Option<usize>,
    /// Slot in the draw list.
    pub draw_slot: Option<usize>,
    /// Slots per held tag. `BTreeMap` keeps serialization order stable.
    pub tags: BTreeMap<String, Vec<usize>>,
}

/// List layout of a registry at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    /// Update list, in iteration order.
    pub update: Vec<WorldId>,
    /// Draw list, in iteration order.
    pub draw: Vec<WorldId>,
    /// Every tag list ever created, by name.
    pub tags: BTreeMap<String, Vec<WorldId>>,
    /// Admitted entities, ordered by identity.
    pub entities: Vec<EntitySnapshot>,
}

impl MembershipSnapshot {
    /// BLAKE3 hex digest of the snapshot's JSON form.
    pub fn state_hash(&self) -> String {
        let json_bytes =
            serde_json::to_vec(self).expect("MembershipSnapshot should always be JSON-serializable");
        blake3::hash(&json_bytes).to_hex().to_string()
    }

    /// Pretty JSON, for logging.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .expect("MembershipSnapshot should always be JSON-serializable")
    }
}

impl<R> World<R> {
    /// Capture the current list layout.
    pub fn membership_snapshot(&self) -> MembershipSnapshot {
        let ids = |keys: &[EntityKey]| -> Vec<WorldId> {
            keys.iter().filter_map(|k| self.world_id(*k)).collect()
        };

        let tags = self
            .tags()
            .tag_names()
            .into_iter()
            .map(|name| (name.to_owned(), ids(self.get_tagged(name))))
            .collect();

        let mut entities: Vec<EntitySnapshot> = self
            .admitted_keys()
            .filter_map(|key| {
                let membership = self.membership(key)?;
                let entity = self.get(key)?;
                Some(EntitySnapshot {
                    world_id: membership.world_id(),
                    key,
                    label: entity.label().to_owned(),
                    update_slot: membership.update_slot(),
                    draw_slot: membership.draw_slot(),
                    tags: membership.tag_slots.clone(),
                })
            })
            .collect();
        entities.sort_by_key(|e| e.world_id);

        MembershipSnapshot {
            update: ids(self.update_list()),
            draw: ids(self.draw_list()),
            tags,
            entities,
        }
    }
}
