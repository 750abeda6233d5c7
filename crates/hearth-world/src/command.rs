//! Deferred mutation requests and the per-flush report.
//!
//! Every structural change to the registry -- admitting, retiring, tagging,
//! untagging, toggling update/draw participation -- is recorded here first
//! and applied later by [`World::flush_queues`](crate::world::World::flush_queues).
//! Requests can therefore be issued at any time, including from inside an
//! entity's own hooks while the update or draw list is being walked.
//!
//! The queue keeps one FIFO per request kind. The flush drains them in a fixed
//! order: tag adds, tag removals, admissions, retirements, participation
//! changes. Each phase is drained completely before the next starts.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;
use crate::lifecycle::Entity;
use crate::membership::ListKind;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A queued admission. The entity is owned by the queue until it is admitted.
pub struct AdmitRequest<R> {
    /// Key issued when the admission was requested.
    pub key: EntityKey,
    /// The entity being admitted.
    pub entity: Box<dyn Entity<R>>,
    /// Whether the entity joins the update list.
    pub update: bool,
    /// Whether the entity joins the draw list.
    pub draw: bool,
}

impl<R> fmt::Debug for AdmitRequest<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmitRequest")
            .field("key", &self.key)
            .field("entity", &self.entity.label())
            .field("update", &self.update)
            .field("draw", &self.draw)
            .finish()
    }
}

/// A queued tag add or tag removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRequest {
    /// Entity being tagged or untagged.
    pub key: EntityKey,
    /// Tag name (case-sensitive).
    pub tag: String,
}

/// A queued change of update or draw participation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipationRequest {
    /// Entity whose participation changes.
    pub key: EntityKey,
    /// Which list.
    pub list: ListKind,
    /// Join (`true`) or leave (`false`) the list.
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Pending requests, one FIFO per kind.
pub struct CommandQueue<R> {
    pub(crate) admissions: VecDeque<AdmitRequest<R>>,
    pub(crate) retirements: VecDeque<EntityKey>,
    pub(crate) tag_adds: VecDeque<TagRequest>,
    pub(crate) tag_removals: VecDeque<TagRequest>,
    pub(crate) participation: VecDeque<ParticipationRequest>,
}

impl<R> CommandQueue<R> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            admissions: VecDeque::new(),
            retirements: VecDeque::new(),
            tag_adds: VecDeque::new(),
            tag_removals: VecDeque::new(),
            participation: VecDeque::new(),
        }
    }

    pub(crate) fn push_admit(
        &mut self,
        key: EntityKey,
        entity: Box<dyn Entity<R>>,
        update: bool,
        draw: bool,
    ) {
        self.admissions.push_back(AdmitRequest {
            key,
            entity,
            update,
            draw,
        });
    }

    pub(crate) fn push_retire(&mut self, key: EntityKey) {
        self.retirements.push_back(key);
    }

    pub(crate) fn push_tag(&mut self, key: EntityKey, tag: &str) {
        self.tag_adds.push_back(TagRequest {
            key,
            tag: tag.to_owned(),
        });
    }

    pub(crate) fn push_untag(&mut self, key: EntityKey, tag: &str) {
        self.tag_removals.push_back(TagRequest {
            key,
            tag: tag.to_owned(),
        });
    }

    pub(crate) fn push_participation(&mut self, key: EntityKey, list: ListKind, enabled: bool) {
        self.participation.push_back(ParticipationRequest { key, list, enabled });
    }

    /// Pending admissions in request order.
    pub fn admissions(&self) -> impl Iterator<Item = &AdmitRequest<R>> {
        self.admissions.iter()
    }

    /// Pending retirements in request order.
    pub fn retirements(&self) -> impl Iterator<Item = EntityKey> + '_ {
        self.retirements.iter().copied()
    }

    /// Pending tag adds in request order.
    pub fn tag_adds(&self) -> impl Iterator<Item = &TagRequest> {
        self.tag_adds.iter()
    }

    /// Pending tag removals in request order.
    pub fn tag_removals(&self) -> impl Iterator<Item = &TagRequest> {
        self.tag_removals.iter()
    }

    /// Pending participation changes in request order.
    pub fn participation_changes(&self) -> impl Iterator<Item = &ParticipationRequest> {
        self.participation.iter()
    }

    /// Total number of pending requests of all kinds.
    pub fn len(&self) -> usize {
        self.admissions.len()
            + self.retirements.len()
            + self.tag_adds.len()
            + self.tag_removals.len()
            + self.participation.len()
    }

    /// Whether no requests are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every pending request out, leaving this queue empty so that
    /// requests issued while the taken batch is applied land in the next
    /// flush.
    pub(crate) fn take(&mut self) -> Self {
        std::mem::replace(self, Self::new())
    }
}

impl<R> Default for CommandQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for CommandQueue<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("admissions", &self.admissions.len())
            .field("retirements", &self.retirements.len())
            .field("tag_adds", &self.tag_adds.len())
            .field("tag_removals", &self.tag_removals.len())
            .field("participation", &self.participation.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FlushReport
// ---------------------------------------------------------------------------

/// Summary of one [`World::flush_queues`](crate::world::World::flush_queues)
/// call.
///
/// Failed requests (stale keys, tags on entities not yet admitted, ...) are
/// logged as warnings and counted in `failed`; they never abort the flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Tag entries appended.
    pub tags_added: usize,
    /// Tag entries removed (removals on unknown tag names are not counted).
    pub tags_removed: usize,
    /// Entities admitted.
    pub admitted: usize,
    /// Entities retired.
    pub retired: usize,
    /// Participation changes that altered a list.
    pub participation_changed: usize,
    /// Requests that could not be applied.
    pub failed: usize,
}

impl FlushReport {
    /// Total number of requests that changed registry state.
    pub fn applied(&self) -> usize {
        self.tags_added
            + self.tags_removed
            + self.admitted
            + self.retired
            + self.participation_changed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;
    impl Entity<()> for Dummy {}

    #[test]
    fn requests_keep_fifo_order_per_kind() {
        let mut queue: CommandQueue<()> = CommandQueue::new();
        let a = EntityKey::new(0, 0);
        let b = EntityKey::new(1, 0);
        queue.push_tag(a, "x");
        queue.push_tag(b, "y");
        queue.push_retire(b);
        queue.push_retire(a);

        let tags: Vec<_> = queue.tag_adds().map(|r| (r.key, r.tag.as_str())).collect();
        assert_eq!(tags, vec![(a, "x"), (b, "y")]);
        let retired: Vec<_> = queue.retirements().collect();
        assert_eq!(retired, vec![b, a]);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn take_leaves_queue_empty() {
        let mut queue: CommandQueue<()> = CommandQueue::new();
        queue.push_admit(EntityKey::new(0, 0), Box::new(Dummy), true, false);
        queue.push_untag(EntityKey::new(0, 0), "x");
        queue.push_participation(EntityKey::new(0, 0), ListKind::Draw, true);

        let taken = queue.take();
        assert!(queue.is_empty());
        assert_eq!(taken.len(), 3);
        let admit = taken.admissions().next().unwrap();
        assert!(admit.update);
        assert!(!admit.draw);
    }

    #[test]
    fn report_sums_applied_requests() {
        let report = FlushReport {
            tags_added: 2,
            tags_removed: 1,
            admitted: 3,
            retired: 1,
            participation_changed: 1,
            failed: 4,
        };
        assert_eq!(report.applied(), 8);
    }
}
