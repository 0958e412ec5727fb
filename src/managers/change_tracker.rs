//! Change tracker: per-entity sync bookkeeping produced by the merge.
//!
//! Every tracked entity is reachable by node, UUID and (when it has one) server
//! id. Tombstones keep only their server id and UUID; they are never revived.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::managers::bookmark_tree::BookmarkTreeTrait;
use crate::types::bookmark::NodeId;
use crate::types::errors::{TrackerError, TreeError};
use crate::types::position::PositionKey;
use crate::types::tracker::{EntityState, TrackedEntity};

#[derive(Debug, Default)]
pub struct ChangeTracker {
    entities: Vec<TrackedEntity>,
    by_node: HashMap<NodeId, usize>,
    by_uuid: HashMap<Uuid, usize>,
    by_server_id: HashMap<String, usize>,
    num_ignored_updates_due_to_missing_parent: usize,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a live node.
    pub fn add(
        &mut self,
        node: NodeId,
        uuid: Uuid,
        server_id: Option<String>,
        position: Option<PositionKey>,
        state: EntityState,
    ) -> Result<(), TrackerError> {
        if self.by_node.contains_key(&node) {
            return Err(TrackerError::NodeAlreadyTracked(node));
        }
        if self.by_uuid.contains_key(&uuid) {
            return Err(TrackerError::UuidAlreadyTracked(uuid));
        }
        if let Some(server_id) = &server_id {
            if self.by_server_id.contains_key(server_id) {
                return Err(TrackerError::ServerIdAlreadyTracked(server_id.clone()));
            }
        }

        let index = self.entities.len();
        self.by_node.insert(node, index);
        self.by_uuid.insert(uuid, index);
        if let Some(server_id) = &server_id {
            self.by_server_id.insert(server_id.clone(), index);
        }
        self.entities.push(TrackedEntity {
            node: Some(node),
            uuid,
            server_id,
            position,
            state,
        });
        Ok(())
    }

    /// Flags a live entity for upload. Returns false if the node is not tracked.
    pub fn mark_unsynced(&mut self, node: NodeId) -> bool {
        self.set_state(node, EntityState::Unsynced)
    }

    /// Returns false if the node is not tracked.
    pub fn mark_synced(&mut self, node: NodeId) -> bool {
        self.set_state(node, EntityState::Synced)
    }

    /// Turns the entity with `server_id` into a tombstone, detaching it from
    /// its node. Creates the tombstone if the server id was never tracked.
    /// Idempotent.
    pub fn mark_tombstone(&mut self, server_id: &str, uuid: Uuid) {
        match self.by_server_id.get(server_id).copied() {
            Some(index) => {
                let entity = &mut self.entities[index];
                if entity.state == EntityState::Tombstone {
                    return;
                }
                if let Some(node) = entity.node.take() {
                    self.by_node.remove(&node);
                }
                if self.by_uuid.get(&entity.uuid) == Some(&index) {
                    self.by_uuid.remove(&entity.uuid);
                }
                entity.state = EntityState::Tombstone;
                entity.position = None;
            }
            None => {
                self.by_server_id
                    .insert(server_id.to_string(), self.entities.len());
                self.entities.push(TrackedEntity {
                    node: None,
                    uuid,
                    server_id: Some(server_id.to_string()),
                    position: None,
                    state: EntityState::Tombstone,
                });
            }
        }
        debug!(server_id, "entity tombstoned");
    }

    pub fn entity_for_node(&self, node: NodeId) -> Option<&TrackedEntity> {
        self.by_node.get(&node).map(|&index| &self.entities[index])
    }

    pub fn entity_for_uuid(&self, uuid: &Uuid) -> Option<&TrackedEntity> {
        self.by_uuid.get(uuid).map(|&index| &self.entities[index])
    }

    /// Also finds tombstones.
    pub fn entity_for_server_id(&self, server_id: &str) -> Option<&TrackedEntity> {
        self.by_server_id
            .get(server_id)
            .map(|&index| &self.entities[index])
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.by_node.contains_key(&node)
    }

    /// Every entity, tombstones included, in the order it was first tracked.
    pub fn entities(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.iter()
    }

    /// Entities that are `Unsynced` or `Tombstone`, in tracking order.
    pub fn entities_with_local_changes(&self) -> Vec<&TrackedEntity> {
        self.entities
            .iter()
            .filter(|entity| entity.has_local_changes())
            .collect()
    }

    /// Live entities (tombstones excluded).
    pub fn tracked_entities_count(&self) -> usize {
        self.by_node.len()
    }

    pub fn unsynced_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.state == EntityState::Unsynced)
            .count()
    }

    pub fn tombstones(&self) -> Vec<&TrackedEntity> {
        self.entities
            .iter()
            .filter(|entity| entity.state == EntityState::Tombstone)
            .collect()
    }

    pub fn num_ignored_updates_due_to_missing_parent(&self) -> usize {
        self.num_ignored_updates_due_to_missing_parent
    }

    pub fn set_num_ignored_updates_due_to_missing_parent(&mut self, count: usize) {
        self.num_ignored_updates_due_to_missing_parent = count;
    }

    /// Checks that, below `parent`, tracked siblings appear in ascending
    /// position order (non-decreasing). Untracked nodes are skipped.
    pub fn positions_match_tree(
        &self,
        tree: &dyn BookmarkTreeTrait,
        parent: NodeId,
    ) -> Result<bool, TreeError> {
        let mut pending = vec![parent];
        while let Some(folder) = pending.pop() {
            let mut previous: Option<&PositionKey> = None;
            for child in tree.children(folder)? {
                let Some(entity) = self.entity_for_node(child) else {
                    continue;
                };
                if let Some(position) = &entity.position {
                    if previous.is_some_and(|previous| previous > position) {
                        return Ok(false);
                    }
                    previous = Some(position);
                }
                pending.push(child);
            }
        }
        Ok(true)
    }

    fn set_state(&mut self, node: NodeId, state: EntityState) -> bool {
        match self.by_node.get(&node) {
            Some(&index) => {
                self.entities[index].state = state;
                true
            }
            None => false,
        }
    }
}
