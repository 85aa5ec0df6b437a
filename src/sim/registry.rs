//! Per-match entity registry
//!
//! Entities live in slots addressed by generational [`EntityId`] handles.
//! Removal is two-phase: [`Registry::despawn`] tombstones an entity (it stays
//! readable, and every handle stays valid) and [`Registry::sweep`] reclaims all
//! tombstoned slots at the end of the frame. This keeps iteration over the
//! live collections safe while the interaction passes run.
//!
//! ```text
//! slots:    [P1, P2, Bullet, ~Explosion~, (vacant)]
//! pending:  [3]          <- tombstoned, reclaimed by sweep()
//! free:     [4]          <- vacant slots available for reuse
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entities::{Entity, EntityKind};

/// Handle to a registered entity. Stale handles (slot reused) resolve to nothing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Serialize)]
enum SlotState {
    Vacant,
    Live(Entity),
    /// Marked for removal, still readable until the next sweep
    Tombstoned(Entity),
}

#[derive(Debug, Clone, Serialize)]
struct Slot {
    generation: u32,
    /// Monotonic registration key (render order)
    key: u64,
    state: SlotState,
}

/// Keyed collection of every entity in a match
#[derive(Debug, Clone, Serialize)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pending: Vec<EntityId>,
    /// Category lists in registration order, one per [`EntityKind`]
    by_kind: [Vec<EntityId>; EntityKind::COUNT],
    next_key: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            pending: Vec::new(),
            by_kind: Default::default(),
            next_key: 0,
        }
    }

    /// Register an entity built with its own id (so its collider can name its owner)
    pub fn spawn_with(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = match self.free.pop() {
            Some(index) => EntityId {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    key: 0,
                    state: SlotState::Vacant,
                });
                EntityId {
                    index,
                    generation: 0,
                }
            }
        };

        let entity = build(id);
        let kind = entity.kind();
        let slot = &mut self.slots[id.index as usize];
        slot.key = self.next_key;
        slot.state = SlotState::Live(entity);
        self.next_key += 1;
        self.by_kind[kind.index()].push(id);
        id
    }

    fn slot(&self, id: EntityId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    fn slot_mut(&mut self, id: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    /// Entity behind a handle (live or tombstoned)
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        match &self.slot(id)?.state {
            SlotState::Live(entity) | SlotState::Tombstoned(entity) => Some(entity),
            SlotState::Vacant => None,
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        match &mut self.slot_mut(id)?.state {
            SlotState::Live(entity) | SlotState::Tombstoned(entity) => Some(entity),
            SlotState::Vacant => None,
        }
    }

    /// Mutable access to two distinct entities at once
    pub fn pair_mut(&mut self, a: EntityId, b: EntityId) -> Option<(&mut Entity, &mut Entity)> {
        if a.index == b.index || self.slot(a).is_none() || self.slot(b).is_none() {
            return None;
        }
        let (ia, ib) = (a.index as usize, b.index as usize);
        let (first, second) = if ia < ib {
            let (low, high) = self.slots.split_at_mut(ib);
            (&mut low[ia], &mut high[0])
        } else {
            let (low, high) = self.slots.split_at_mut(ia);
            (&mut high[0], &mut low[ib])
        };
        match (&mut first.state, &mut second.state) {
            (
                SlotState::Live(x) | SlotState::Tombstoned(x),
                SlotState::Live(y) | SlotState::Tombstoned(y),
            ) => Some((x, y)),
            _ => None,
        }
    }

    /// Registered and not tombstoned
    pub fn is_live(&self, id: EntityId) -> bool {
        matches!(self.slot(id).map(|s| &s.state), Some(SlotState::Live(_)))
    }

    /// Handle still resolves (live or waiting for the sweep)
    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Tombstone an entity for reclamation by the next [`sweep`](Self::sweep).
    ///
    /// Returns `false` if it was already tombstoned or the handle is stale.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let tombstoned = match self.slot_mut(id) {
            Some(slot) => match std::mem::replace(&mut slot.state, SlotState::Vacant) {
                SlotState::Live(entity) => {
                    slot.state = SlotState::Tombstoned(entity);
                    true
                }
                other => {
                    slot.state = other;
                    false
                }
            },
            None => false,
        };
        if tombstoned {
            self.pending.push(id);
        }
        tombstoned
    }

    /// Number of entities waiting for the sweep
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reclaim every tombstoned entity: remove it from its category list,
    /// free the slot and invalidate its handles. Each entity is returned once.
    pub fn sweep(&mut self) -> Vec<(EntityId, Entity)> {
        let mut reclaimed = Vec::with_capacity(self.pending.len());
        for id in std::mem::take(&mut self.pending) {
            let Some(slot) = self.slot_mut(id) else {
                continue;
            };
            if !matches!(slot.state, SlotState::Tombstoned(_)) {
                continue;
            }
            let SlotState::Tombstoned(entity) = std::mem::replace(&mut slot.state, SlotState::Vacant)
            else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            self.by_kind[entity.kind().index()].retain(|other| *other != id);
            reclaimed.push((id, entity));
        }
        reclaimed
    }

    /// Category list for one kind, in registration order (includes tombstoned)
    pub fn ids(&self, kind: EntityKind) -> &[EntityId] {
        &self.by_kind[kind.index()]
    }

    /// Owned snapshot of a category list, for passes that mutate while iterating
    pub fn snapshot(&self, kind: EntityKind) -> Vec<EntityId> {
        self.by_kind[kind.index()].clone()
    }

    /// Entities of one kind that are live and not flagged dead
    pub fn count_alive(&self, kind: EntityKind) -> usize {
        self.ids(kind)
            .iter()
            .filter(|id| self.is_live(**id))
            .filter_map(|id| self.get(*id))
            .filter(|entity| !entity.is_dead())
            .count()
    }

    /// Total registered entities, including tombstoned ones
    pub fn len(&self) -> usize {
        self.by_kind.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entities in registration-key order (draw order for a renderer)
    pub fn render_order(&self) -> Vec<(u64, EntityId)> {
        let mut order: Vec<(u64, EntityId)> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot.state, SlotState::Live(_)))
            .map(|(index, slot)| {
                (
                    slot.key,
                    EntityId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                )
            })
            .collect();
        order.sort_by_key(|(key, _)| *key);
        order
    }
}
