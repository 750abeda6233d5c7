//! Hearth World -- entity registry with deferred, reentrancy-safe mutation.
//!
//! A [`World`](world::World) owns a dynamic set of entities and keeps three
//! kinds of membership list: the update list, the draw list, and any number of
//! named tag lists. Entities can ask to be admitted, retired, tagged or
//! untagged at any time -- including from inside their own hooks while the
//! registry is walking a list -- because every request is queued and applied
//! at one point per frame, [`World::flush_queues`](world::World::flush_queues).
//!
//! Lists remove in O(1) by swap-remove; each entity caches its slot in every
//! list it belongs to, and the registry rewrites the cached slot of whichever
//! entity a removal moves.
//!
//! # Quick Start
//!
//! ```
//! use hearth_world::prelude::*;
//!
//! struct Spawner;
//!
//! impl Entity<()> for Spawner {
//!     fn on_update(&mut self, ctx: &mut Context<'_, ()>, _dt: f32) {
//!         if ctx.get_tagged("minion").is_empty() {
//!             ctx.request_admit(Box::new(Minion), true, true);
//!         }
//!     }
//! }
//!
//! struct Minion;
//!
//! impl Entity<()> for Minion {
//!     fn on_admit(&mut self, ctx: &mut Context<'_, ()>) {
//!         ctx.tag_self("minion");
//!     }
//! }
//!
//! let mut world: World<()> = World::new();
//! world.request_admit(Box::new(Spawner), true, false);
//! world.flush_queues();
//!
//! world.update(1.0 / 60.0);
//! world.draw(&mut ());
//! world.flush_queues(); // minion admitted, queues its own tag
//! world.flush_queues(); // tag applied
//!
//! assert_eq!(world.get_tagged("minion").len(), 1);
//! assert_eq!(world.entity_count(), 2);
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod entity;
pub mod identity;
pub mod lifecycle;
pub mod membership;
pub mod snapshot;
pub mod tag;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Invariant violations detected while applying requests.
///
/// None of these reach the host loop: the flush logs them and moves on. They
/// are returned directly by [`World::check_consistency`](world::World::check_consistency).
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The key was retired or never issued by this registry.
    #[error("entity {key:?} does not exist (retired or never issued)")]
    StaleEntity { key: entity::EntityKey },

    /// The key was issued but its admission has not been flushed yet.
    #[error("entity {key:?} is not admitted yet")]
    NotAdmitted { key: entity::EntityKey },

    /// An admission targeted a key that is already admitted.
    #[error("entity {key:?} is already admitted")]
    AlreadyAdmitted { key: entity::EntityKey },

    /// A tag removal targeted an entity with no recorded slot for the tag.
    #[error("entity {key:?} holds no slot for tag '{tag}'")]
    NotHoldingTag { key: entity::EntityKey, tag: String },

    /// A cached slot disagrees with the list it points into.
    #[error("entity {key:?} has a stale slot {slot} in the {list} list")]
    SlotMismatch {
        key: entity::EntityKey,
        list: String,
        slot: usize,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{CommandQueue, FlushReport};
    pub use crate::entity::EntityKey;
    pub use crate::identity::WorldId;
    pub use crate::lifecycle::{Context, Entity};
    pub use crate::membership::{ListKind, Membership, MembershipList};
    pub use crate::snapshot::MembershipSnapshot;
    pub use crate::tag::TagTable;
    pub use crate::world::World;
    pub use crate::WorldError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Counts hook calls and optionally acts on the registry from inside them.
    #[derive(Default)]
    struct Counters {
        updates: u32,
        draws: u32,
        admits: u32,
        retires: u32,
    }

    struct Actor {
        counters: Rc<RefCell<Counters>>,
        retire_on_update: bool,
        spawn_on_update: bool,
    }

    impl Actor {
        fn new(counters: &Rc<RefCell<Counters>>) -> Self {
            Self {
                counters: Rc::clone(counters),
                retire_on_update: false,
                spawn_on_update: false,
            }
        }
    }

    impl Entity<u32> for Actor {
        fn on_admit(&mut self, _ctx: &mut Context<'_, u32>) {
            self.counters.borrow_mut().admits += 1;
        }
        fn on_retire(&mut self, _ctx: &mut Context<'_, u32>) {
            self.counters.borrow_mut().retires += 1;
        }
        fn on_update(&mut self, ctx: &mut Context<'_, u32>, _dt: f32) {
            self.counters.borrow_mut().updates += 1;
            if self.retire_on_update {
                ctx.retire_self();
            }
            if self.spawn_on_update {
                self.spawn_on_update = false;
                let child = Actor::new(&self.counters);
                ctx.request_admit(Box::new(child), true, true);
            }
        }
        fn on_draw(&mut self, _ctx: &mut Context<'_, u32>, renderer: &mut u32) {
            self.counters.borrow_mut().draws += 1;
            *renderer += 1;
        }
    }

    fn counters() -> Rc<RefCell<Counters>> {
        Rc::new(RefCell::new(Counters::default()))
    }

    // -- scenarios ----------------------------------------------------------

    #[test]
    fn update_and_draw_lists_follow_admission_flags() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let a = world.request_admit(Box::new(Actor::new(&c)), true, false);
        let b = world.request_admit(Box::new(Actor::new(&c)), true, true);
        world.flush_queues();
        assert_eq!(world.update_list(), &[a, b]);
        assert_eq!(world.draw_list(), &[b]);

        world.request_retire(a);
        world.flush_queues();
        assert_eq!(world.update_list(), &[b]);
        assert_eq!(world.membership(b).unwrap().update_slot(), Some(0));
        assert_eq!(world.membership(b).unwrap().draw_slot(), Some(0));
    }

    #[test]
    fn double_tag_is_not_deduplicated() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let e = world.request_admit_default(Box::new(Actor::new(&c)));
        world.flush_queues();
        world.request_tag(e, "enemy");
        world.request_tag(e, "enemy");
        world.flush_queues();
        assert_eq!(world.get_tagged("enemy"), &[e, e]);
        world.check_consistency().unwrap();
    }

    #[test]
    fn self_retire_during_update_still_draws_this_frame() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let mut actor = Actor::new(&c);
        actor.retire_on_update = true;
        let d = world.request_admit_default(Box::new(actor));
        world.flush_queues();

        world.update(0.016);
        assert_eq!(world.update_list(), &[d]);
        let mut draw_calls = 0u32;
        world.draw(&mut draw_calls);
        assert_eq!(draw_calls, 1);
        assert_eq!(world.draw_list(), &[d]);

        world.flush_queues();
        assert!(world.update_list().is_empty());
        assert!(world.draw_list().is_empty());
        let c = c.borrow();
        assert_eq!((c.updates, c.draws, c.retires), (1, 1, 1));
    }

    #[test]
    fn admission_requested_mid_update_is_invisible_until_flush() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let mut parent = Actor::new(&c);
        parent.spawn_on_update = true;
        world.request_admit_default(Box::new(parent));
        world.flush_queues();

        world.update(0.016);
        assert_eq!(world.update_list().len(), 1);
        let mut draw_calls = 0u32;
        world.draw(&mut draw_calls);
        assert_eq!(draw_calls, 1);
        assert_eq!(world.entity_count(), 1);
        assert_eq!(world.pending_count(), 1);

        world.flush_queues();
        assert_eq!(world.update_list().len(), 2);
        assert_eq!(world.draw_list().len(), 2);
        assert_eq!(c.borrow().admits, 2);
    }

    #[test]
    fn world_ids_are_unique_and_not_reused() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let mut seen = std::collections::HashSet::new();
        for round in 0..5 {
            let keys: Vec<_> = (0..4)
                .map(|_| world.request_admit_default(Box::new(Actor::new(&c))))
                .collect();
            world.flush_queues();
            for key in &keys {
                assert!(seen.insert(world.world_id(*key).unwrap()), "round {round}");
            }
            for key in keys {
                world.request_retire(key);
            }
            world.flush_queues();
        }
        assert_eq!(seen.len(), 20);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn untag_unknown_tag_changes_nothing() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let a = world.request_admit_default(Box::new(Actor::new(&c)));
        world.flush_queues();
        world.request_tag(a, "enemy");
        world.flush_queues();
        let before = world.membership_snapshot();

        world.request_untag(a, "ally");
        let report = world.flush_queues();
        assert_eq!(report, FlushReport::default());
        assert_eq!(world.membership_snapshot(), before);
    }

    /// Tags itself on admission and names an heir on retirement.
    struct Herald {
        heir: Option<EntityKey>,
    }

    impl Entity<u32> for Herald {
        fn on_admit(&mut self, ctx: &mut Context<'_, u32>) {
            ctx.tag_self("herald");
        }
        fn on_retire(&mut self, ctx: &mut Context<'_, u32>) {
            if let Some(heir) = self.heir {
                ctx.request_tag(heir, "heir");
            }
        }
    }

    #[test]
    fn hook_requests_wait_for_the_next_flush() {
        let c = counters();
        let mut world: World<u32> = World::new();
        let survivor = world.request_admit_default(Box::new(Actor::new(&c)));
        let herald = world.request_admit_default(Box::new(Herald {
            heir: Some(survivor),
        }));

        let report = world.flush_queues();
        assert_eq!(report.admitted, 2);
        assert_eq!(report.tags_added, 0);
        assert!(world.get_tagged("herald").is_empty());
        assert_eq!(world.pending_count(), 1);

        world.flush_queues();
        assert_eq!(world.get_tagged("herald"), &[herald]);

        world.request_retire(herald);
        let report = world.flush_queues();
        assert_eq!(report.retired, 1);
        assert!(world.get_tagged("herald").is_empty());
        assert!(world.get_tagged("heir").is_empty());
        assert_eq!(world.pending_count(), 1);

        world.flush_queues();
        assert_eq!(world.get_tagged("heir"), &[survivor]);
        world.check_consistency().unwrap();
    }
}
