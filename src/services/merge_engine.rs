//! Initial merge of a local bookmark tree with the remote update stream.
//!
//! The merge runs in three passes:
//!
//! 1. Build the identity index (validation, duplicate resolution, forest).
//! 2. Match remote entities to local nodes by UUID across the whole tree. A
//!    local node whose type or URL disagrees with the remote entity of the
//!    same UUID gets a fresh UUID instead.
//! 3. Walk each permanent folder top-down. Every remote child is matched by
//!    UUID, then by semantics among the unmatched local siblings, and created
//!    otherwise; it ends up at the remote index. Local siblings left over
//!    after the remote children are tracked as new local entities.
//!
//! The remote side wins every conflict. The returned change tracker lists the
//! entities the caller must upload.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::managers::bookmark_tree::{replace_node_uuid, BookmarkTreeTrait};
use crate::managers::change_tracker::ChangeTracker;
use crate::services::favicon_service::FaviconServiceTrait;
use crate::services::identity_index::{IdentityIndex, RemoteEntity};
use crate::services::metrics::MetricsSinkTrait;
use crate::services::specifics;
use crate::types::bookmark::{NewNode, NodeId};
use crate::types::errors::{MergeError, TreeError};
use crate::types::metrics::MergeSizeBucket;
use crate::types::position::{PositionKey, PositionSuffix};
use crate::types::settings::MergeSettings;
use crate::types::tracker::EntityState;
use crate::types::update::UpdateRecord;

/// Merges `updates` into `tree` and returns the resulting change tracker.
pub fn merge(
    updates: Vec<UpdateRecord>,
    tree: &mut dyn BookmarkTreeTrait,
    favicons: &mut dyn FaviconServiceTrait,
    metrics: &mut dyn MetricsSinkTrait,
    settings: &MergeSettings,
) -> Result<ChangeTracker, MergeError> {
    MergeEngine::new(tree, favicons, metrics, settings).merge(updates)
}

enum LocalMatch {
    Uuid(NodeId),
    Semantics(NodeId),
}

/// One merge run. Consumed by [`MergeEngine::merge`].
pub struct MergeEngine<'a> {
    tree: &'a mut dyn BookmarkTreeTrait,
    favicons: &'a mut dyn FaviconServiceTrait,
    metrics: &'a mut dyn MetricsSinkTrait,
    settings: &'a MergeSettings,
    tracker: ChangeTracker,
    uuid_matches: HashMap<Uuid, NodeId>,
    matched_locals: HashSet<NodeId>,
}

impl<'a> MergeEngine<'a> {
    pub fn new(
        tree: &'a mut dyn BookmarkTreeTrait,
        favicons: &'a mut dyn FaviconServiceTrait,
        metrics: &'a mut dyn MetricsSinkTrait,
        settings: &'a MergeSettings,
    ) -> Self {
        Self {
            tree,
            favicons,
            metrics,
            settings,
            tracker: ChangeTracker::new(),
            uuid_matches: HashMap::new(),
            matched_locals: HashSet::new(),
        }
    }

    #[instrument(skip_all, fields(updates = updates.len()))]
    pub fn merge(mut self, updates: Vec<UpdateRecord>) -> Result<ChangeTracker, MergeError> {
        let started = Instant::now();
        let update_count = updates.len();

        let index = IdentityIndex::build(updates, &*self.tree, self.settings)?;
        self.report_index(&index);

        self.match_by_uuid(&index)?;
        for &root in index.roots() {
            self.merge_permanent_folder(&index, root)?;
        }
        self.tracker
            .set_num_ignored_updates_due_to_missing_parent(index.missing_parent_count());

        let with_local_changes = self.tracker.entities_with_local_changes().len();
        self.metrics.record_unsynced_upon_completion(with_local_changes);
        let elapsed = started.elapsed();
        for bucket in MergeSizeBucket::for_update_count(update_count) {
            self.metrics.record_merge_time(bucket, elapsed);
        }

        debug!(
            tracked = self.tracker.tracked_entities_count(),
            with_local_changes,
            ignored = index.problems().len(),
            beyond_depth_limit = index.beyond_depth_limit(),
            ?elapsed,
            "initial bookmark merge finished"
        );
        Ok(self.tracker)
    }

    fn report_index(&mut self, index: &IdentityIndex) {
        for &problem in index.problems() {
            self.metrics.record_problematic_update(problem);
        }
        for &kind in index.duplicates() {
            self.metrics.record_uuid_duplicate(kind);
        }
        self.metrics.record_valid_input_updates(index.valid_updates());
        self.metrics
            .record_reachable_input_updates(index.reachable_updates());
        self.metrics.record_beyond_depth_limit(index.beyond_depth_limit());
    }

    fn match_by_uuid(&mut self, index: &IdentityIndex) -> Result<(), MergeError> {
        for (_, remote) in index.nodes() {
            let entity = &remote.entity;
            if entity.permanent.is_some() {
                continue;
            }
            let Some(local) = index.local_for_uuid(&entity.uuid) else {
                continue;
            };
            if local.is_compatible_with(entity) {
                self.uuid_matches.insert(entity.uuid, local.node);
                self.matched_locals.insert(local.node);
            } else {
                warn!(uuid = %entity.uuid, "local bookmark conflicts with remote type or URL, reassigning local UUID");
                replace_node_uuid(&mut *self.tree, local.node, Uuid::new_v4())?;
            }
        }
        Ok(())
    }

    fn merge_permanent_folder(&mut self, index: &IdentityIndex, root: usize) -> Result<(), MergeError> {
        let entity = &index.node(root).entity;
        let Some(folder) = entity.permanent else {
            return Ok(());
        };
        let local = self
            .tree
            .permanent_node(folder)
            .ok_or(MergeError::MissingPermanentFolder(folder))?;
        self.tracker.add(
            local,
            folder.uuid(),
            Some(entity.server_id.clone()),
            None,
            EntityState::Synced,
        )?;
        self.merge_subtree(index, local, root, false)
    }

    fn merge_subtree(
        &mut self,
        index: &IdentityIndex,
        local_parent: NodeId,
        remote_parent: usize,
        parent_migrated: bool,
    ) -> Result<(), MergeError> {
        let remote_children = &index.node(remote_parent).children;

        for (i, &remote_child) in remote_children.iter().enumerate() {
            let entity = &index.node(remote_child).entity;
            let node = match self.find_match(local_parent, i, entity)? {
                Some(LocalMatch::Uuid(node)) => {
                    self.place(node, local_parent, i)?;
                    self.update_from_remote(node, entity)?;
                    node
                }
                Some(LocalMatch::Semantics(node)) => {
                    self.place(node, local_parent, i)?;
                    let node = replace_node_uuid(&mut *self.tree, node, entity.uuid)?;
                    self.update_from_remote(node, entity)?;
                    node
                }
                None => self.create_from_remote(local_parent, i, entity)?,
            };
            self.merge_favicon(entity);

            let next_position = remote_children
                .get(i + 1)
                .and_then(|&next| index.node(next).entity.position.as_ref());
            let (node, migrated) =
                self.track_remote(local_parent, i, node, entity, next_position, parent_migrated)?;

            if entity.is_folder() {
                self.merge_subtree(index, node, remote_child, migrated)?;
            }
        }

        self.process_local_only_children(local_parent, remote_children.len())
    }

    /// Finds the local node a remote entity maps to: its UUID match, or else
    /// the first unmatched sibling at or after `start` with the same type,
    /// canonical title and URL.
    fn find_match(
        &self,
        parent: NodeId,
        start: usize,
        entity: &RemoteEntity,
    ) -> Result<Option<LocalMatch>, TreeError> {
        if let Some(&node) = self.uuid_matches.get(&entity.uuid) {
            return Ok(Some(LocalMatch::Uuid(node)));
        }
        for candidate in self.syncable_children(parent)?.into_iter().skip(start) {
            if self.matched_locals.contains(&candidate) || self.tracker.is_tracked(candidate) {
                continue;
            }
            let local = self.tree.node(candidate)?;
            if local.is_folder() == entity.is_folder()
                && local.url == entity.url
                && specifics::titles_match(
                    &local.title,
                    &entity.title,
                    self.settings.legacy_title_max_bytes,
                )
            {
                debug!(uuid = %entity.uuid, node = %candidate, "remote entity matched by semantics");
                return Ok(Some(LocalMatch::Semantics(candidate)));
            }
        }
        Ok(None)
    }

    fn create_from_remote(
        &mut self,
        parent: NodeId,
        syncable_index: usize,
        entity: &RemoteEntity,
    ) -> Result<NodeId, TreeError> {
        let at = self.insertion_index(parent, syncable_index, None)?;
        self.tree.create_node(
            parent,
            at,
            NewNode {
                uuid: entity.uuid,
                title: entity.title.clone(),
                url: entity.url.clone(),
                created_at: entity.creation_time,
            },
        )
    }

    fn update_from_remote(&mut self, node: NodeId, entity: &RemoteEntity) -> Result<(), TreeError> {
        let local = self.tree.node(node)?;
        if self.should_take_remote_title(&local.title, &entity.title) {
            self.tree.set_title(node, &entity.title)?;
        }
        if let Some(url) = &entity.url {
            if local.url.as_deref() != Some(url.as_str()) {
                self.tree.set_url(node, url)?;
            }
        }
        Ok(())
    }

    /// Remote titles win, except a legacy truncation of the local title.
    fn should_take_remote_title(&self, local: &str, remote: &str) -> bool {
        local != remote
            && !(local.starts_with(remote)
                && specifics::titles_match(local, remote, self.settings.legacy_title_max_bytes))
    }

    fn merge_favicon(&mut self, entity: &RemoteEntity) {
        if let (Some(url), Some(bytes)) = (&entity.url, &entity.favicon) {
            self.favicons.associate_favicon(url, &entity.title);
            self.favicons
                .merge_favicon(url, entity.icon_url.as_deref(), bytes);
        }
    }

    /// Tracks a merged remote entity. Entities that must change identity are
    /// tombstoned and tracked again as new local entities; the returned flag
    /// reports that.
    fn track_remote(
        &mut self,
        parent: NodeId,
        syncable_index: usize,
        node: NodeId,
        entity: &RemoteEntity,
        next_position: Option<&PositionKey>,
        parent_migrated: bool,
    ) -> Result<(NodeId, bool), MergeError> {
        if !(entity.requires_migration && self.settings.migrate_legacy_entities) {
            self.tracker.add(
                node,
                entity.uuid,
                Some(entity.server_id.clone()),
                entity.position.clone(),
                EntityState::Synced,
            )?;
            let reupload = entity.uuid_inferred
                || parent_migrated
                || (entity.position_backfilled && self.settings.reupload_backfilled_positions);
            if reupload {
                self.tracker.mark_unsynced(node);
            }
            return Ok((node, false));
        }

        self.tracker.mark_tombstone(&entity.server_id, entity.uuid);
        let uuid = Uuid::new_v4();
        let node = replace_node_uuid(&mut *self.tree, node, uuid)?;

        let previous = self.previous_tracked_position(parent, syncable_index)?;
        let position = PositionKey::for_slot(
            previous.as_ref(),
            next_position,
            &PositionSuffix::for_uuid(&uuid),
        );
        self.tracker
            .add(node, uuid, None, Some(position), EntityState::Unsynced)?;
        debug!(server_id = %entity.server_id, %uuid, "remote entity moved to a new identity");
        Ok((node, true))
    }

    fn process_local_only_children(&mut self, parent: NodeId, start: usize) -> Result<(), MergeError> {
        for child in self.syncable_children(parent)?.into_iter().skip(start) {
            if self.matched_locals.contains(&child) || self.tracker.is_tracked(child) {
                continue;
            }
            self.process_local_creation(parent, child)?;
        }
        Ok(())
    }

    /// Tracks a local-only node and its subtree for upload. Nodes matched by
    /// UUID elsewhere are left for their remote entity.
    fn process_local_creation(&mut self, parent: NodeId, node: NodeId) -> Result<(), MergeError> {
        let local = self.tree.node(node)?;
        let siblings = self.syncable_children(parent)?;
        let at = siblings.iter().position(|sibling| *sibling == node).unwrap_or(siblings.len());

        let suffix = PositionSuffix::for_uuid(&local.uuid);
        let position = match self.previous_tracked_position(parent, at)? {
            Some(previous) => previous.after(&suffix),
            None => PositionKey::initial(&suffix),
        };
        self.tracker
            .add(node, local.uuid, None, Some(position), EntityState::Unsynced)?;

        if local.is_folder() {
            for child in self.syncable_children(node)? {
                if self.matched_locals.contains(&child) {
                    continue;
                }
                self.process_local_creation(node, child)?;
            }
        }
        Ok(())
    }

    /// Position of the nearest tracked sibling before `syncable_index`.
    fn previous_tracked_position(
        &self,
        parent: NodeId,
        syncable_index: usize,
    ) -> Result<Option<PositionKey>, TreeError> {
        let siblings = self.syncable_children(parent)?;
        Ok(siblings
            .iter()
            .take(syncable_index)
            .rev()
            .find_map(|sibling| {
                self.tracker
                    .entity_for_node(*sibling)
                    .and_then(|entity| entity.position.clone())
            }))
    }

    /// Moves `node` to `syncable_index` among the syncable children of `parent`.
    fn place(&mut self, node: NodeId, parent: NodeId, syncable_index: usize) -> Result<(), TreeError> {
        if self.syncable_children(parent)?.get(syncable_index) == Some(&node) {
            return Ok(());
        }
        let at = self.insertion_index(parent, syncable_index, Some(node))?;
        self.tree.move_node(node, parent, at)
    }

    fn syncable_children(&self, parent: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self
            .tree
            .children(parent)?
            .into_iter()
            .filter(|child| self.tree.is_node_editable(*child))
            .collect())
    }

    /// Translates a syncable index into an index of the full child list,
    /// ignoring `moving` (which is detached before insertion).
    fn insertion_index(
        &self,
        parent: NodeId,
        syncable_index: usize,
        moving: Option<NodeId>,
    ) -> Result<usize, TreeError> {
        let children: Vec<NodeId> = self
            .tree
            .children(parent)?
            .into_iter()
            .filter(|child| Some(*child) != moving)
            .collect();
        let mut seen = 0;
        for (at, child) in children.iter().enumerate() {
            if self.tree.is_node_editable(*child) {
                if seen == syncable_index {
                    return Ok(at);
                }
                seen += 1;
            }
        }
        Ok(children.len())
    }
}
