//! Entity lifecycle hooks and the context they run in.
//!
//! An entity is any type implementing [`Entity<R>`], where `R` is the
//! renderer handed to [`World::draw`](crate::world::World::draw). All four
//! hooks default to no-ops, so an entity only implements what it needs.
//!
//! Every hook receives a [`Context`]: the entity's own key and identity, read
//! access to the registry's tag lists and slot caches, and the request entry
//! points. Requests made through the context are queued and take effect at
//! the next flush; the live lists cannot be touched from a hook.

use crate::command::CommandQueue;
use crate::entity::{EntityKey, KeyAllocator};
use crate::identity::WorldId;
use crate::membership::{ListKind, Membership, Records};
use crate::tag::TagTable;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Lifecycle hooks invoked by the registry.
///
/// ```
/// use hearth_world::prelude::*;
///
/// struct Ticker { ticks: u32 }
///
/// impl Entity<()> for Ticker {
///     fn on_update(&mut self, ctx: &mut Context<'_, ()>, _dt: f32) {
///         self.ticks += 1;
///         if self.ticks == 3 {
///             ctx.retire_self();
///         }
///     }
/// }
///
/// let mut world: World<()> = World::new();
/// let key = world.request_admit_default(Box::new(Ticker { ticks: 0 }));
/// world.flush_queues();
/// for _ in 0..3 {
///     world.update(0.016);
///     world.flush_queues();
/// }
/// assert!(!world.is_admitted(key));
/// ```
pub trait Entity<R> {
    /// Called once, right after the entity joined its lists.
    fn on_admit(&mut self, _ctx: &mut Context<'_, R>) {}

    /// Called once, before the entity leaves any of its lists.
    fn on_retire(&mut self, _ctx: &mut Context<'_, R>) {}

    /// Called every frame while the entity is in the update list.
    fn on_update(&mut self, _ctx: &mut Context<'_, R>, _dt: f32) {}

    /// Called every frame while the entity is in the draw list.
    fn on_draw(&mut self, _ctx: &mut Context<'_, R>, _renderer: &mut R) {}

    /// Name used in diagnostics: the type name without its module path or
    /// generic arguments.
    fn label(&self) -> &str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// What a hook can see and do.
pub struct Context<'w, R> {
    key: EntityKey,
    world_id: WorldId,
    records: &'w Records,
    tags: &'w TagTable,
    keys: &'w mut KeyAllocator,
    queue: &'w mut CommandQueue<R>,
}

impl<'w, R> Context<'w, R> {
    pub(crate) fn new(
        key: EntityKey,
        world_id: WorldId,
        records: &'w Records,
        tags: &'w TagTable,
        keys: &'w mut KeyAllocator,
        queue: &'w mut CommandQueue<R>,
    ) -> Self {
        Self {
            key,
            world_id,
            records,
            tags,
            keys,
            queue,
        }
    }

    /// Key of the entity whose hook is running.
    pub fn key(&self) -> EntityKey {
        self.key
    }

    /// Identity of the entity whose hook is running.
    pub fn world_id(&self) -> WorldId {
        self.world_id
    }

    /// Slot cache of the running entity.
    pub fn membership(&self) -> Option<&'w Membership> {
        self.records.get(&self.key)
    }

    /// Slot cache of any admitted entity.
    pub fn membership_of(&self, key: EntityKey) -> Option<&'w Membership> {
        self.records.get(&key)
    }

    /// Entities tagged `name`, as of the last flush.
    pub fn get_tagged(&self, name: &str) -> &'w [EntityKey] {
        self.tags.get_tagged(name)
    }

    /// Whether `key` currently holds `tag`.
    pub fn holds_tag(&self, key: EntityKey, tag: &str) -> bool {
        self.records.get(&key).is_some_and(|m| m.holds_tag(tag))
    }

    // -- requests -----------------------------------------------------------

    /// Queue `entity` for admission. See
    /// [`World::request_admit`](crate::world::World::request_admit).
    pub fn request_admit(
        &mut self,
        entity: Box<dyn Entity<R>>,
        update: bool,
        draw: bool,
    ) -> EntityKey {
        let key = self.keys.issue();
        self.queue.push_admit(key, entity, update, draw);
        key
    }

    /// Queue `key` for retirement.
    pub fn request_retire(&mut self, key: EntityKey) {
        self.queue.push_retire(key);
    }

    /// Queue a tag add for `key`.
    pub fn request_tag(&mut self, key: EntityKey, tag: &str) {
        self.queue.push_tag(key, tag);
    }

    /// Queue a tag removal for `key`; dropped if `key` does not hold `tag`.
    pub fn request_untag(&mut self, key: EntityKey, tag: &str) {
        if self.holds_tag(key, tag) {
            self.queue.push_untag(key, tag);
        } else {
            tracing::trace!(key = %key, tag = %tag, "untag dropped: tag not held");
        }
    }

    /// Queue joining or leaving the update list.
    pub fn request_set_update(&mut self, key: EntityKey, enabled: bool) {
        self.queue.push_participation(key, ListKind::Update, enabled);
    }

    /// Queue joining or leaving the draw list.
    pub fn request_set_draw(&mut self, key: EntityKey, enabled: bool) {
        self.queue.push_participation(key, ListKind::Draw, enabled);
    }

    // -- self-service -------------------------------------------------------

    /// Queue retirement of the running entity.
    pub fn retire_self(&mut self) {
        self.request_retire(self.key);
    }

    /// Queue a tag add for the running entity.
    pub fn tag_self(&mut self, tag: &str) {
        self.request_tag(self.key, tag);
    }

    /// Queue a tag removal for the running entity.
    pub fn untag_self(&mut self, tag: &str) {
        self.request_untag(self.key, tag);
    }
}
