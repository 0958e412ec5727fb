use thiserror::Error;
use uuid::Uuid;

use crate::types::bookmark::{NodeId, PermanentFolder};

// === TreeError ===

/// Errors raised by a bookmark tree accessor.
#[derive(Debug, Error)]
pub enum TreeError {
    /// No node with the given id exists.
    #[error("Bookmark node not found: {0}")]
    NotFound(NodeId),
    /// The node was used as a parent but is not a folder.
    #[error("Bookmark node is not a folder: {0}")]
    NotAFolder(NodeId),
    /// The root and permanent folders cannot be moved, removed or renamed.
    #[error("Permanent bookmark node cannot be modified: {0}")]
    PermanentNode(NodeId),
    /// Another node already carries this UUID.
    #[error("Bookmark UUID already in use: {0}")]
    UuidInUse(Uuid),
    /// The move would place a node inside its own subtree.
    #[error("Cannot move bookmark node {0} into its own subtree")]
    InvalidMove(NodeId),
    /// A URL was set on a folder or removed from a bookmark.
    #[error("Invalid URL for bookmark node {0}")]
    InvalidUrl(NodeId),
    /// Underlying storage failed.
    #[error("Bookmark database error: {0}")]
    Database(#[from] rusqlite::Error),
}

// === TrackerError ===

/// Errors raised when the change tracker is asked to hold conflicting identities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Bookmark node already tracked: {0}")]
    NodeAlreadyTracked(NodeId),
    #[error("UUID already tracked: {0}")]
    UuidAlreadyTracked(Uuid),
    #[error("Server id already tracked: {0}")]
    ServerIdAlreadyTracked(String),
}

// === MergeError ===

/// Fatal merge failures. Invalid remote input is never fatal; it is counted
/// and skipped instead.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The local tree does not expose a permanent folder the server sent.
    #[error("Local tree has no permanent folder {0}")]
    MissingPermanentFolder(PermanentFolder),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

// === SettingsError ===

/// Errors related to merge settings persistence.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File I/O failed.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// JSON (de)serialization failed.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The key does not name a known setting.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The value has the wrong type or is out of range.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
