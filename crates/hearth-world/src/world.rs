//! The [`World`] is the entity registry. It owns every admitted entity, the
//! update and draw lists, the tag table, and the queue of pending requests.
//!
//! # Frame contract
//!
//! The host calls, once per frame and in this order:
//!
//! 1. [`World::update`] -- `on_update` for every entity in the update list.
//! 2. [`World::draw`] -- `on_draw` for every entity in the draw list.
//! 3. [`World::flush_queues`] -- apply every request queued since the last
//!    flush.
//!
//! Requests (`request_*`) only ever enqueue. Nothing an entity asks for
//! during the update or draw pass becomes visible before the flush, so the
//! lists are never mutated while they are being walked.
//!
//! # Slot invariant
//!
//! For every entity in the update list, the draw list or a tag list, the slot
//! cached on its [`Membership`] equals its position in that list. Removal is a
//! swap-remove, so after every removal the entity that moved into the gap has
//! its cached slot rewritten. [`World::check_consistency`] verifies this.

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use crate::command::{AdmitRequest, CommandQueue, FlushReport, ParticipationRequest, TagRequest};
use crate::entity::{EntityKey, KeyAllocator};
use crate::identity::{IdentityCounter, WorldId};
use crate::lifecycle::{Context, Entity};
use crate::membership::{ListKind, Membership, MembershipList, Records};
use crate::tag::TagTable;
use crate::WorldError;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The entity registry, generic over the renderer type passed to `on_draw`.
pub struct World<R> {
    keys: KeyAllocator,
    ids: IdentityCounter,
    records: Records,
    entities: HashMap<EntityKey, Box<dyn Entity<R>>>,
    update_list: MembershipList<EntityKey>,
    draw_list: MembershipList<EntityKey>,
    tags: TagTable,
    queue: CommandQueue<R>,
}

impl<R> World<R> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            keys: KeyAllocator::new(),
            ids: IdentityCounter::new(),
            records: Records::new(),
            entities: HashMap::new(),
            update_list: MembershipList::new(),
            draw_list: MembershipList::new(),
            tags: TagTable::new(),
            queue: CommandQueue::new(),
        }
    }

    // -- frame passes -------------------------------------------------------

    /// Run `on_update(dt)` on every entity in the update list, in list order.
    pub fn update(&mut self, dt: f32) {
        let len = self.update_list.len();
        for slot in 0..len {
            let Some(key) = self.update_list.get(slot) else {
                break;
            };
            let (Some(entity), Some(membership)) =
                (self.entities.get_mut(&key), self.records.get(&key))
            else {
                continue;
            };
            let mut ctx = Context::new(
                key,
                membership.world_id,
                &self.records,
                &self.tags,
                &mut self.keys,
                &mut self.queue,
            );
            entity.on_update(&mut ctx, dt);
        }
    }

    /// Run `on_draw(renderer)` on every entity in the draw list, in list
    /// order.
    pub fn draw(&mut self, renderer: &mut R) {
        let len = self.draw_list.len();
        for slot in 0..len {
            let Some(key) = self.draw_list.get(slot) else {
                break;
            };
            let (Some(entity), Some(membership)) =
                (self.entities.get_mut(&key), self.records.get(&key))
            else {
                continue;
            };
            let mut ctx = Context::new(
                key,
                membership.world_id,
                &self.records,
                &self.tags,
                &mut self.keys,
                &mut self.queue,
            );
            entity.on_draw(&mut ctx, renderer);
        }
    }

    /// Apply every request queued since the last flush.
    ///
    /// Phases run in a fixed order, each draining its queue completely:
    /// tag adds, tag removals, admissions, retirements, participation
    /// changes. Because tags are applied before admissions, a tag requested
    /// for an entity whose admission is queued in the same batch fails with
    /// [`WorldError::NotAdmitted`].
    ///
    /// Requests issued by `on_admit` / `on_retire` while the flush runs are
    /// queued for the next flush. Failed requests are logged and counted in
    /// the returned report; they never abort the flush.
    pub fn flush_queues(&mut self) -> FlushReport {
        let CommandQueue {
            admissions,
            retirements,
            tag_adds,
            tag_removals,
            participation,
        } = self.queue.take();
        let mut report = FlushReport::default();

        for TagRequest { key, tag } in tag_adds {
            let result = self
                .resolve(key)
                .and_then(|()| self.tags.add_tag(&mut self.records, key, &tag));
            match result {
                Ok(_) => report.tags_added += 1,
                Err(e) => self.note_failure(&mut report, "tag", &e),
            }
        }

        for TagRequest { key, tag } in tag_removals {
            let result = self
                .resolve(key)
                .and_then(|()| self.tags.remove_tag(&mut self.records, key, &tag));
            match result {
                Ok(true) => report.tags_removed += 1,
                Ok(false) => {}
                Err(e) => self.note_failure(&mut report, "untag", &e),
            }
        }

        for request in admissions {
            match self.apply_admit(request) {
                Ok(()) => report.admitted += 1,
                Err(e) => self.note_failure(&mut report, "admit", &e),
            }
        }

        for key in retirements {
            match self.apply_retire(key) {
                Ok(()) => report.retired += 1,
                Err(e) => self.note_failure(&mut report, "retire", &e),
            }
        }

        for request in participation {
            match self.apply_participation(request) {
                Ok(true) => report.participation_changed += 1,
                Ok(false) => {}
                Err(e) => self.note_failure(&mut report, "participation", &e),
            }
        }

        if report.applied() > 0 || report.failed > 0 {
            debug!(
                admitted = report.admitted,
                retired = report.retired,
                tags_added = report.tags_added,
                tags_removed = report.tags_removed,
                participation_changed = report.participation_changed,
                failed = report.failed,
                "flushed request queues"
            );
        }
        report
    }

    // -- requests -----------------------------------------------------------

    /// Queue `entity` for admission and return the key that names it.
    ///
    /// The entity gets its [`WorldId`] and joins the update list (if
    /// `update`) and the draw list (if `draw`) at the next flush.
    pub fn request_admit(&mut self, entity: Box<dyn Entity<R>>, update: bool, draw: bool) -> EntityKey {
        let key = self.keys.issue();
        trace!(key = %key, entity = entity.label(), update, draw, "admission requested");
        self.queue.push_admit(key, entity, update, draw);
        key
    }

    /// Queue `entity` for admission into both the update and draw lists.
    pub fn request_admit_default(&mut self, entity: Box<dyn Entity<R>>) -> EntityKey {
        self.request_admit(entity, true, true)
    }

    /// Queue `key` for retirement.
    pub fn request_retire(&mut self, key: EntityKey) {
        self.queue.push_retire(key);
    }

    /// Queue a tag add. Tagging twice produces two entries.
    pub fn request_tag(&mut self, key: EntityKey, tag: &str) {
        self.queue.push_tag(key, tag);
    }

    /// Queue a tag removal. Dropped silently if `key` does not hold `tag`
    /// right now.
    pub fn request_untag(&mut self, key: EntityKey, tag: &str) {
        if self.records.get(&key).is_some_and(|m| m.holds_tag(tag)) {
            self.queue.push_untag(key, tag);
        } else {
            trace!(key = %key, tag = %tag, "untag dropped: tag not held");
        }
    }

    /// Queue joining (`true`) or leaving (`false`) the update list.
    pub fn request_set_update(&mut self, key: EntityKey, enabled: bool) {
        self.queue.push_participation(key, ListKind::Update, enabled);
    }

    /// Queue joining (`true`) or leaving (`false`) the draw list.
    pub fn request_set_draw(&mut self, key: EntityKey, enabled: bool) {
        self.queue.push_participation(key, ListKind::Draw, enabled);
    }

    // -- queries ------------------------------------------------------------

    /// Entities tagged `name`, in tag-list order. Empty for unknown tags.
    pub fn get_tagged(&self, name: &str) -> &[EntityKey] {
        self.tags.get_tagged(name)
    }

    /// First entity in `name`'s list, if any.
    pub fn first_tagged(&self, name: &str) -> Option<EntityKey> {
        self.tags.get_tagged(name).first().copied()
    }

    /// The tag table.
    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    /// Keys in the update list, in iteration order.
    pub fn update_list(&self) -> &[EntityKey] {
        self.update_list.as_slice()
    }

    /// Keys in the draw list, in iteration order.
    pub fn draw_list(&self) -> &[EntityKey] {
        self.draw_list.as_slice()
    }

    /// Cached slots of an admitted entity.
    pub fn membership(&self, key: EntityKey) -> Option<&Membership> {
        self.records.get(&key)
    }

    /// Identity of an admitted entity.
    pub fn world_id(&self, key: EntityKey) -> Option<WorldId> {
        self.records.get(&key).map(Membership::world_id)
    }

    /// Whether `key` names an admitted (not pending, not retired) entity.
    pub fn is_admitted(&self, key: EntityKey) -> bool {
        self.records.contains_key(&key)
    }

    /// Shared access to an admitted entity.
    pub fn get(&self, key: EntityKey) -> Option<&dyn Entity<R>> {
        self.entities.get(&key).map(|e| e.as_ref())
    }

    /// Exclusive access to an admitted entity.
    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut (dyn Entity<R> + 'static)> {
        self.entities.get_mut(&key).map(|e| e.as_mut())
    }

    /// `"<label> #<world id>"` for an admitted entity.
    pub fn describe(&self, key: EntityKey) -> Option<String> {
        let entity = self.entities.get(&key)?;
        let membership = self.records.get(&key)?;
        Some(format!("{} {}", entity.label(), membership.world_id))
    }

    /// Keys of all admitted entities, in no particular order.
    pub fn admitted_keys(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.records.keys().copied()
    }

    /// Number of admitted entities.
    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    /// Requests waiting for the next flush.
    pub fn pending(&self) -> &CommandQueue<R> {
        &self.queue
    }

    /// Number of requests waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Number of identities handed out over the registry's lifetime.
    pub fn admitted_total(&self) -> u64 {
        self.ids.issued()
    }

    /// Verify the slot invariant for every list.
    ///
    /// Returns the first mismatch found.
    pub fn check_consistency(&self) -> Result<(), WorldError> {
        for (list, name, kind) in [
            (&self.update_list, "update", ListKind::Update),
            (&self.draw_list, "draw", ListKind::Draw),
        ] {
            for (pos, key) in list.iter().enumerate() {
                let cached = self.records.get(key).and_then(|m| m.slot(kind));
                if cached != Some(pos) {
                    return Err(WorldError::SlotMismatch {
                        key: *key,
                        list: name.to_owned(),
                        slot: pos,
                    });
                }
            }
        }

        for name in self.tags.tag_names() {
            let list = self.tags.get_tagged(name);
            for (pos, key) in list.iter().enumerate() {
                let cached = self.records.get(key).map(|m| m.tag_slots(name));
                if !cached.is_some_and(|slots| slots.contains(&pos)) {
                    return Err(WorldError::SlotMismatch {
                        key: *key,
                        list: format!("tag '{name}'"),
                        slot: pos,
                    });
                }
            }
        }

        for (key, membership) in &self.records {
            for (kind, list, name) in [
                (ListKind::Update, &self.update_list, "update"),
                (ListKind::Draw, &self.draw_list, "draw"),
            ] {
                if let Some(slot) = membership.slot(kind) {
                    if list.get(slot) != Some(*key) {
                        return Err(WorldError::SlotMismatch {
                            key: *key,
                            list: name.to_owned(),
                            slot,
                        });
                    }
                }
            }
            for (tag, slots) in &membership.tag_slots {
                let list = self.tags.get_tagged(tag);
                for &slot in slots {
                    if list.get(slot) != Some(key) {
                        return Err(WorldError::SlotMismatch {
                            key: *key,
                            list: format!("tag '{tag}'"),
                            slot,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    // -- request application ------------------------------------------------

    /// Distinguish a stale key from one whose admission is still pending.
    fn resolve(&self, key: EntityKey) -> Result<(), WorldError> {
        if self.records.contains_key(&key) {
            Ok(())
        } else if self.keys.is_live(key) {
            Err(WorldError::NotAdmitted { key })
        } else {
            Err(WorldError::StaleEntity { key })
        }
    }

    fn apply_admit(&mut self, request: AdmitRequest<R>) -> Result<(), WorldError> {
        let AdmitRequest {
            key,
            entity,
            update,
            draw,
        } = request;
        if !self.keys.is_live(key) {
            return Err(WorldError::StaleEntity { key });
        }
        if self.records.contains_key(&key) {
            return Err(WorldError::AlreadyAdmitted { key });
        }

        let world_id = self.ids.next_id();
        let mut membership = Membership::new(world_id);
        if update {
            membership.update_slot = Some(self.update_list.push(key));
        }
        if draw {
            membership.draw_slot = Some(self.draw_list.push(key));
        }
        self.records.insert(key, membership);
        let entity = self.entities.entry(key).or_insert(entity);

        info!(key = %key, world_id = %world_id, entity = entity.label(), update, draw, "admitted");

        let mut ctx = Context::new(
            key,
            world_id,
            &self.records,
            &self.tags,
            &mut self.keys,
            &mut self.queue,
        );
        entity.on_admit(&mut ctx);
        Ok(())
    }

    fn apply_retire(&mut self, key: EntityKey) -> Result<(), WorldError> {
        self.resolve(key)?;
        let world_id = self
            .records
            .get(&key)
            .map(Membership::world_id)
            .ok_or(WorldError::NotAdmitted { key })?;

        // The hook runs while every slot is still valid.
        if let Some(entity) = self.entities.get_mut(&key) {
            let mut ctx = Context::new(
                key,
                world_id,
                &self.records,
                &self.tags,
                &mut self.keys,
                &mut self.queue,
            );
            entity.on_retire(&mut ctx);
        }

        self.leave_list(key, ListKind::Update)?;
        self.leave_list(key, ListKind::Draw)?;

        let held: Vec<String> = self
            .records
            .get(&key)
            .map(|m| m.tag_slots.keys().cloned().collect())
            .unwrap_or_default();
        for tag in held {
            while self.records.get(&key).is_some_and(|m| m.holds_tag(&tag)) {
                self.tags.remove_tag(&mut self.records, key, &tag)?;
            }
        }

        self.records.remove(&key);
        let entity = self.entities.remove(&key);
        self.keys.release(key);

        info!(
            key = %key,
            world_id = %world_id,
            entity = entity.as_ref().map(|e| e.label()).unwrap_or("?"),
            "retired"
        );
        Ok(())
    }

    fn apply_participation(&mut self, request: ParticipationRequest) -> Result<bool, WorldError> {
        let ParticipationRequest { key, list, enabled } = request;
        self.resolve(key)?;
        if enabled {
            self.join_list(key, list)
        } else {
            self.leave_list(key, list)
        }
    }

    /// Append `key` to one of the fixed lists unless it is already in it.
    fn join_list(&mut self, key: EntityKey, kind: ListKind) -> Result<bool, WorldError> {
        let membership = self
            .records
            .get_mut(&key)
            .ok_or(WorldError::NotAdmitted { key })?;
        if membership.slot(kind).is_some() {
            return Ok(false);
        }
        let list = match kind {
            ListKind::Update => &mut self.update_list,
            ListKind::Draw => &mut self.draw_list,
        };
        *membership.slot_mut(kind) = Some(list.push(key));
        Ok(true)
    }

    /// Swap-remove `key` from one of the fixed lists and back-patch the
    /// entity that moved into its slot.
    fn leave_list(&mut self, key: EntityKey, kind: ListKind) -> Result<bool, WorldError> {
        let slot = self
            .records
            .get_mut(&key)
            .ok_or(WorldError::NotAdmitted { key })?
            .slot_mut(kind)
            .take();
        let Some(slot) = slot else {
            return Ok(false);
        };
        let list = match kind {
            ListKind::Update => &mut self.update_list,
            ListKind::Draw => &mut self.draw_list,
        };
        if let Some(moved) = list.remove_at(slot) {
            if let Some(m) = self.records.get_mut(&moved.item) {
                *m.slot_mut(kind) = Some(moved.slot);
            }
        }
        Ok(true)
    }

    fn note_failure(&self, report: &mut FlushReport, request: &str, error: &WorldError) {
        report.failed += 1;
        warn!(request, error = %error, "request could not be applied");
    }
}

impl<R> Default for World<R> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
