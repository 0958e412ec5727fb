use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::bookmark::NodeId;
use crate::types::position::PositionKey;

/// Sync state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Local and remote agree.
    Synced,
    /// Local state must be uploaded.
    Unsynced,
    /// The server identity is dead and its deletion must be uploaded. Terminal.
    Tombstone,
}

/// Sync bookkeeping for one entity.
///
/// Tombstones have no node. Entities created locally have no server id until
/// their first commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub node: Option<NodeId>,
    pub uuid: Uuid,
    pub server_id: Option<String>,
    pub position: Option<PositionKey>,
    pub state: EntityState,
}

impl TrackedEntity {
    pub fn has_local_changes(&self) -> bool {
        matches!(self.state, EntityState::Unsynced | EntityState::Tombstone)
    }
}
