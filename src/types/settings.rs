use serde::{Deserialize, Serialize};

/// Default cap on the depth of the remote tree below a permanent folder.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 200;

/// Default byte limit of the legacy title field.
pub const DEFAULT_TITLE_MAX_BYTES: usize = 255;

/// Tunables of the initial merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MergeSettings {
    /// Remote nodes deeper than this below their permanent folder are not merged.
    pub max_tree_depth: usize,
    /// Titles are compared after truncation to this many bytes.
    pub legacy_title_max_bytes: usize,
    /// Re-create entities flagged as predating client tags under a new identity.
    pub migrate_legacy_entities: bool,
    /// Mark entities with server-backfilled positions for re-upload.
    pub reupload_backfilled_positions: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            legacy_title_max_bytes: DEFAULT_TITLE_MAX_BYTES,
            migrate_legacy_entities: true,
            reupload_backfilled_positions: true,
        }
    }
}
