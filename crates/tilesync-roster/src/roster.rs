//! The set of known remote entities.
//!
//! The roster is the only owner of [`RemoteEntity`] values. Everyone else
//! reads them through [`MultiplayerRoster::get`] and
//! [`MultiplayerRoster::iter`].
//!
//! Attack pulses end on a deadline. Deadlines live next to the entities,
//! keyed by the same id, and fire during [`MultiplayerRoster::tick`].
//! Removing an entity removes its deadline too, so a pulse can never end on
//! an entity that has since left (or on a new one that reused the id).

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tilesync_protocol::{
    AreaId, EntityId, GameStateSnapshot, PlayerAttacked, PlayerMoved,
    PlayerState,
};

use crate::{
    InterpolationConfig, RemoteEntity, RemoteEntityInterpolator, RosterError,
};

/// What one [`reconcile`](MultiplayerRoster::reconcile) pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    pub removed: Vec<EntityId>,
}

#[derive(Debug, Default)]
pub struct MultiplayerRoster {
    interpolator: RemoteEntityInterpolator,
    entities: HashMap<EntityId, RemoteEntity>,
    attack_resets: HashMap<EntityId, Instant>,
}

impl MultiplayerRoster {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            interpolator: RemoteEntityInterpolator::new(config),
            entities: HashMap::new(),
            attack_resets: HashMap::new(),
        }
    }

    pub fn interpolator(&self) -> &RemoteEntityInterpolator {
        &self.interpolator
    }

    /// Adds a newly announced entity, resting at its reported position.
    ///
    /// # Errors
    /// Returns `RosterError::AlreadyPresent` if the id is known. The
    /// existing entity is left untouched.
    pub fn add(
        &mut self,
        state: &PlayerState,
        now: Instant,
    ) -> Result<&RemoteEntity, RosterError> {
        if self.entities.contains_key(&state.id) {
            tracing::warn!(entity_id = %state.id, "entity already in roster");
            return Err(RosterError::AlreadyPresent(state.id.clone()));
        }

        let mut entity = RemoteEntity::from_state(state, now);
        if state.is_attacking == Some(true) {
            let facing = entity.facing;
            let deadline = self.interpolator.on_attack(
                &mut entity,
                facing,
                state.x,
                state.y,
                now,
            );
            self.attack_resets.insert(state.id.clone(), deadline);
        }

        tracing::info!(
            entity_id = %entity.id,
            nickname = %entity.display_name,
            area = %entity.area,
            "remote entity added"
        );
        Ok(self.entities.entry(state.id.clone()).or_insert(entity))
    }

    /// Removes an entity and any pending attack deadline. Returns the
    /// entity if it was present.
    pub fn remove(&mut self, id: &EntityId) -> Option<RemoteEntity> {
        self.attack_resets.remove(id);
        let removed = self.entities.remove(id);
        if removed.is_some() {
            tracing::info!(entity_id = %id, "remote entity removed");
        }
        removed
    }

    /// Applies an incremental position update.
    ///
    /// # Errors
    /// Returns `RosterError::UnknownEntity` if the id isn't known.
    pub fn update_position(
        &mut self,
        moved: &PlayerMoved,
        now: Instant,
    ) -> Result<(), RosterError> {
        let Some(entity) = self.entities.get_mut(&moved.player_id) else {
            tracing::warn!(
                entity_id = %moved.player_id,
                "position update for unknown entity"
            );
            return Err(RosterError::UnknownEntity(moved.player_id.clone()));
        };

        self.interpolator.on_update(
            entity,
            moved.x,
            moved.y,
            moved.direction,
            moved.is_moving,
            now,
        );
        if let Some(area) = &moved.area {
            entity.area = area.clone();
        }
        if moved.timestamp.is_some() {
            entity.last_server_timestamp = moved.timestamp;
        }
        Ok(())
    }

    /// Starts an attack pulse on an entity. A pulse already running is
    /// restarted with a fresh deadline.
    ///
    /// # Errors
    /// Returns `RosterError::UnknownEntity` if the id isn't known.
    pub fn apply_attack(
        &mut self,
        attack: &PlayerAttacked,
        now: Instant,
    ) -> Result<(), RosterError> {
        let Some(entity) = self.entities.get_mut(&attack.player_id) else {
            tracing::warn!(
                entity_id = %attack.player_id,
                "attack from unknown entity"
            );
            return Err(RosterError::UnknownEntity(attack.player_id.clone()));
        };

        let deadline = self.interpolator.on_attack(
            entity,
            attack.direction,
            attack.x,
            attack.y,
            now,
        );
        self.attack_resets.insert(attack.player_id.clone(), deadline);
        Ok(())
    }

    /// Converges the roster on a full server snapshot.
    ///
    /// Unknown entries are added, known ones updated, and known ids missing
    /// from the snapshot removed. `local_id` is never added or removed.
    ///
    /// A known entity's position is left alone when both it and the
    /// snapshot entry carry server timestamps and the snapshot's is older.
    /// Without timestamps the snapshot wins. Applying the same snapshot
    /// twice leaves the roster as the first pass did.
    pub fn reconcile(
        &mut self,
        snapshot: &GameStateSnapshot,
        local_id: Option<&EntityId>,
        now: Instant,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let is_local = |id: &EntityId| local_id == Some(id);

        for state in &snapshot.players {
            if is_local(&state.id) {
                continue;
            }
            if self.entities.contains_key(&state.id) {
                if self.refresh(state, now) {
                    summary.updated.push(state.id.clone());
                }
            } else if self.add(state, now).is_ok() {
                summary.added.push(state.id.clone());
            }
        }

        let listed: HashSet<&EntityId> = snapshot.players.iter().map(|p| &p.id).collect();
        let stale: Vec<EntityId> = self
            .entities
            .keys()
            .filter(|&id| !is_local(id) && !listed.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.remove(&id);
            summary.removed.push(id);
        }

        tracing::debug!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            removed = summary.removed.len(),
            "roster reconciled"
        );
        summary
    }

    /// Applies one snapshot entry to a known entity. Returns `true` if
    /// anything changed.
    fn refresh(&mut self, state: &PlayerState, now: Instant) -> bool {
        let Some(entity) = self.entities.get_mut(&state.id) else {
            return false;
        };
        let before = entity.clone();
        entity.apply_metadata(state);

        let stale = matches!(
            (state.timestamp, entity.last_server_timestamp),
            (Some(theirs), Some(ours)) if theirs < ours
        );
        if stale {
            tracing::debug!(
                entity_id = %state.id,
                "snapshot older than last update, keeping position"
            );
            return *entity != before;
        }

        let facing = state.direction.unwrap_or(entity.facing);
        let moving = state.is_moving.unwrap_or(entity.moving);
        let target_changed = entity.target.x != state.x
            || entity.target.y != state.y
            || entity.facing != facing
            || entity.moving != moving;
        if target_changed {
            self.interpolator
                .on_update(entity, state.x, state.y, facing, moving, now);
        }
        if state.timestamp.is_some() {
            entity.last_server_timestamp = state.timestamp;
        }
        *entity != before
    }

    /// Ends due attack pulses, then advances every entity in `active_area`.
    /// Entities elsewhere keep their state but don't animate.
    pub fn tick(&mut self, now: Instant, active_area: &AreaId) {
        let due: Vec<EntityId> = self
            .attack_resets
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in due {
            self.attack_resets.remove(&id);
            if let Some(entity) = self.entities.get_mut(&id) {
                self.interpolator.end_attack(entity, now);
            }
        }

        for entity in self.entities.values_mut() {
            if &entity.area == active_area {
                self.interpolator.tick(entity, now);
            }
        }
    }

    /// Drops every entity and deadline.
    pub fn clear(&mut self) {
        if !self.entities.is_empty() {
            tracing::info!(count = self.entities.len(), "roster cleared");
        }
        self.entities.clear();
        self.attack_resets.clear();
    }

    pub fn get(&self, id: &EntityId) -> Option<&RemoteEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity> {
        self.entities.values()
    }

    /// Entities in the given area, in no particular order.
    pub fn in_area<'a, 'b>(
        &'a self,
        area: &'b AreaId,
    ) -> impl Iterator<Item = &'a RemoteEntity> + use<'a, 'b> {
        self.entities.values().filter(move |e| &e.area == area)
    }

    /// When the entity's attack pulse ends, if one is running.
    pub fn attack_deadline(&self, id: &EntityId) -> Option<Instant> {
        self.attack_resets.get(id).copied()
    }
}
