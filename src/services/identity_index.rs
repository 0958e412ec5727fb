//! Identity index: the validated remote forest plus UUID lookups on both sides.
//!
//! Building the index never touches the local tree. Invalid records, orphans
//! and losing duplicates are dropped here and reported as problems for the
//! metrics sink.

use std::collections::HashMap;
use std::iter;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::managers::bookmark_tree::BookmarkTreeTrait;
use crate::services::specifics;
use crate::types::bookmark::{NodeId, PermanentFolder, ROOT_SERVER_TAG};
use crate::types::errors::TreeError;
use crate::types::metrics::{RemoteUpdateError, UuidDuplicateKind};
use crate::types::position::PositionKey;
use crate::types::settings::MergeSettings;
use crate::types::update::UpdateRecord;

/// A validated remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    /// Index of the record in the update stream.
    pub arrival: usize,
    pub uuid: Uuid,
    /// `None` only for permanent folders.
    pub parent_uuid: Option<Uuid>,
    pub permanent: Option<PermanentFolder>,
    pub server_id: String,
    pub title: String,
    pub url: Option<String>,
    /// `None` only for permanent folders.
    pub position: Option<PositionKey>,
    pub icon_url: Option<String>,
    pub favicon: Option<Vec<u8>>,
    pub creation_time: DateTime<Utc>,
    pub uuid_inferred: bool,
    pub position_backfilled: bool,
    pub requires_migration: bool,
}

impl RemoteEntity {
    fn permanent(arrival: usize, folder: PermanentFolder, record: UpdateRecord) -> Self {
        Self {
            arrival,
            uuid: folder.uuid(),
            parent_uuid: None,
            permanent: Some(folder),
            title: specifics::title_from_specifics(&record.specifics),
            server_id: record.server_id,
            url: None,
            position: None,
            icon_url: None,
            favicon: None,
            creation_time: record.creation_time,
            uuid_inferred: false,
            position_backfilled: false,
            requires_migration: false,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// A remote entity placed in the forest.
#[derive(Debug, Clone)]
pub struct RemoteNode {
    pub entity: RemoteEntity,
    /// Distance from the permanent folder; the folder itself is at depth 0.
    pub depth: usize,
    /// Forest indices, sorted by position.
    pub children: Vec<usize>,
}

/// What the index remembers about a syncable local node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNodeInfo {
    pub node: NodeId,
    pub url: Option<String>,
}

impl LocalNodeInfo {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }

    /// Same type and, for bookmarks, same URL.
    pub fn is_compatible_with(&self, remote: &RemoteEntity) -> bool {
        self.is_folder() == remote.is_folder() && self.url == remote.url
    }
}

#[derive(Debug, Default)]
pub struct IdentityIndex {
    nodes: Vec<RemoteNode>,
    roots: Vec<usize>,
    remote_by_uuid: HashMap<Uuid, usize>,
    local_by_uuid: HashMap<Uuid, LocalNodeInfo>,
    problems: Vec<RemoteUpdateError>,
    duplicates: Vec<UuidDuplicateKind>,
    valid_updates: usize,
    beyond_depth_limit: usize,
}

impl IdentityIndex {
    /// Validates `updates`, resolves UUID duplicates and assembles the forest
    /// of permanent folders. Only reads `tree`.
    pub fn build(
        updates: Vec<UpdateRecord>,
        tree: &dyn BookmarkTreeTrait,
        settings: &MergeSettings,
    ) -> Result<Self, TreeError> {
        let mut index = Self::default();
        index.collect_local(tree)?;

        let mut permanent_roots: Vec<RemoteEntity> = Vec::new();
        let mut survivors: Vec<Option<RemoteEntity>> = Vec::new();
        let mut slot_by_uuid: HashMap<Uuid, usize> = HashMap::new();
        let mut uuid_by_server_id: HashMap<String, Uuid> = HashMap::new();

        for (arrival, record) in updates.into_iter().enumerate() {
            if let Some(tag) = record.server_tag.as_deref() {
                if tag == ROOT_SERVER_TAG {
                    continue;
                }
                match PermanentFolder::from_server_tag(tag) {
                    Some(folder) => {
                        if !claim_server_id(&mut uuid_by_server_id, &record.server_id, folder.uuid()) {
                            index.problems.push(RemoteUpdateError::UuidChangedForServerId);
                            continue;
                        }
                        index.valid_updates += 1;
                        if permanent_roots.iter().any(|root| root.permanent == Some(folder)) {
                            debug!(tag, "repeated permanent folder ignored");
                        } else {
                            permanent_roots.push(RemoteEntity::permanent(arrival, folder, record));
                        }
                    }
                    None => {
                        warn!(tag, server_id = %record.server_id, "unsupported permanent folder");
                        index.problems.push(RemoteUpdateError::UnsupportedPermanentFolder);
                    }
                }
                continue;
            }

            let server_id = record.server_id.clone();
            let entity = match specifics::validate_update(arrival, record) {
                Ok(entity) => entity,
                Err(problem) => {
                    debug!(%server_id, ?problem, "remote update ignored");
                    index.problems.push(problem);
                    continue;
                }
            };
            if !claim_server_id(&mut uuid_by_server_id, &server_id, entity.uuid) {
                warn!(%server_id, uuid = %entity.uuid, "server id already used by another UUID");
                index.problems.push(RemoteUpdateError::UuidChangedForServerId);
                continue;
            }
            index.valid_updates += 1;

            match slot_by_uuid.get(&entity.uuid).copied() {
                None => {
                    slot_by_uuid.insert(entity.uuid, survivors.len());
                    survivors.push(Some(entity));
                }
                Some(slot) => {
                    if let Some(existing) = survivors[slot].take() {
                        let (winner, loser) = index.resolve_duplicate(existing, entity);
                        let kind = duplicate_kind(&winner, &loser);
                        debug!(uuid = %winner.uuid, ?kind, "duplicate remote UUID");
                        index.duplicates.push(kind);
                        survivors[slot] = Some(winner);
                    }
                }
            }
        }

        index.build_forest(permanent_roots, survivors, settings.max_tree_depth);
        Ok(index)
    }

    /// Forest indices of the permanent folders, in arrival order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, index: usize) -> &RemoteNode {
        &self.nodes[index]
    }

    /// All reachable remote nodes. Parents precede their children.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, &RemoteNode)> {
        self.nodes.iter().enumerate()
    }

    pub fn remote_for_uuid(&self, uuid: &Uuid) -> Option<usize> {
        self.remote_by_uuid.get(uuid).copied()
    }

    /// Syncable local node carrying `uuid`.
    pub fn local_for_uuid(&self, uuid: &Uuid) -> Option<&LocalNodeInfo> {
        self.local_by_uuid.get(uuid)
    }

    /// Records dropped during validation or forest assembly.
    pub fn problems(&self) -> &[RemoteUpdateError] {
        &self.problems
    }

    /// One entry per discarded duplicate.
    pub fn duplicates(&self) -> &[UuidDuplicateKind] {
        &self.duplicates
    }

    /// Records that passed validation, permanent folders included.
    pub fn valid_updates(&self) -> usize {
        self.valid_updates
    }

    pub fn reachable_updates(&self) -> usize {
        self.nodes.len()
    }

    /// Valid records left out because they sit below the depth cap.
    pub fn beyond_depth_limit(&self) -> usize {
        self.beyond_depth_limit
    }

    pub fn missing_parent_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|problem| **problem == RemoteUpdateError::MissingParentEntity)
            .count()
    }

    fn collect_local(&mut self, tree: &dyn BookmarkTreeTrait) -> Result<(), TreeError> {
        let mut pending = tree.children(tree.root())?;
        while let Some(id) = pending.pop() {
            if !tree.is_node_editable(id) {
                continue;
            }
            let node = tree.node(id)?;
            if node.permanent.is_none() {
                self.local_by_uuid.insert(
                    node.uuid,
                    LocalNodeInfo {
                        node: id,
                        url: node.url,
                    },
                );
            }
            pending.extend(tree.children(id)?);
        }
        Ok(())
    }

    /// Picks the surviving record of two sharing a UUID. A record agreeing
    /// with the local node of that UUID wins when only one of them does;
    /// otherwise the newer one wins and ties keep the earlier arrival.
    fn resolve_duplicate(
        &self,
        existing: RemoteEntity,
        candidate: RemoteEntity,
    ) -> (RemoteEntity, RemoteEntity) {
        if let Some(local) = self.local_by_uuid.get(&existing.uuid) {
            let existing_matches = local.is_compatible_with(&existing);
            let candidate_matches = local.is_compatible_with(&candidate);
            if existing_matches && !candidate_matches {
                return (existing, candidate);
            }
            if candidate_matches && !existing_matches {
                return (candidate, existing);
            }
        }
        if candidate.creation_time > existing.creation_time {
            (candidate, existing)
        } else {
            (existing, candidate)
        }
    }

    fn build_forest(
        &mut self,
        permanent_roots: Vec<RemoteEntity>,
        mut survivors: Vec<Option<RemoteEntity>>,
        max_depth: usize,
    ) {
        let mut pending: HashMap<Uuid, Vec<usize>> = HashMap::new();
        for (slot, entity) in survivors.iter().enumerate() {
            if let Some(parent) = entity.as_ref().and_then(|entity| entity.parent_uuid) {
                pending.entry(parent).or_default().push(slot);
            }
        }

        for root in permanent_roots {
            let root_index = self.push_node(root, 0);
            self.roots.push(root_index);

            let mut stack = vec![root_index];
            while let Some(current) = stack.pop() {
                let Some(mut slots) = pending.remove(&self.nodes[current].entity.uuid) else {
                    continue;
                };
                if !self.nodes[current].entity.is_folder() {
                    self.problems
                        .extend(iter::repeat(RemoteUpdateError::ParentNotFolder).take(slots.len()));
                    continue;
                }

                let depth = self.nodes[current].depth + 1;
                if depth > max_depth {
                    let mut skipped = 0;
                    while let Some(slot) = slots.pop() {
                        skipped += 1;
                        if let Some(entity) = &survivors[slot] {
                            slots.extend(pending.remove(&entity.uuid).unwrap_or_default());
                        }
                    }
                    warn!(skipped, max_depth, "remote bookmarks beyond depth limit ignored");
                    self.beyond_depth_limit += skipped;
                    continue;
                }

                slots.sort_by(|a, b| {
                    let position = |slot: usize| survivors[slot].as_ref().and_then(|e| e.position.clone());
                    position(*a).cmp(&position(*b))
                });
                for slot in slots {
                    let Some(entity) = survivors[slot].take() else {
                        continue;
                    };
                    let child = self.push_node(entity, depth);
                    self.nodes[current].children.push(child);
                    stack.push(child);
                }
            }
        }

        let orphans: usize = pending.values().map(Vec::len).sum();
        if orphans > 0 {
            debug!(orphans, "remote updates without reachable parent ignored");
        }
        self.problems
            .extend(iter::repeat(RemoteUpdateError::MissingParentEntity).take(orphans));
    }

    fn push_node(&mut self, entity: RemoteEntity, depth: usize) -> usize {
        let index = self.nodes.len();
        if entity.permanent.is_none() {
            self.remote_by_uuid.insert(entity.uuid, index);
        }
        self.nodes.push(RemoteNode {
            entity,
            depth,
            children: Vec::new(),
        });
        index
    }
}

/// Records `server_id` for `uuid`. False if an earlier record already used it
/// for a different UUID.
fn claim_server_id(claimed: &mut HashMap<String, Uuid>, server_id: &str, uuid: Uuid) -> bool {
    match claimed.get(server_id) {
        Some(owner) => *owner == uuid,
        None => {
            claimed.insert(server_id.to_string(), uuid);
            true
        }
    }
}

fn duplicate_kind(winner: &RemoteEntity, loser: &RemoteEntity) -> UuidDuplicateKind {
    match (winner.is_folder(), loser.is_folder()) {
        (true, true) if winner.title == loser.title => UuidDuplicateKind::MatchingFolders,
        (true, true) => UuidDuplicateKind::DifferentFolders,
        (false, false) if winner.url == loser.url => UuidDuplicateKind::MatchingUrls,
        (false, false) => UuidDuplicateKind::DifferentUrls,
        _ => UuidDuplicateKind::DifferentTypes,
    }
}
