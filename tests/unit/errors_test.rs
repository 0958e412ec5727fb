use bookmark_sync::types::bookmark::{NodeId, PermanentFolder};
use bookmark_sync::types::errors::*;
use uuid::Uuid;

// === TreeError Tests ===

#[test]
fn tree_error_display_variants() {
    assert_eq!(
        TreeError::NotFound(NodeId(7)).to_string(),
        "Bookmark node not found: #7"
    );
    assert_eq!(
        TreeError::NotAFolder(NodeId(3)).to_string(),
        "Bookmark node is not a folder: #3"
    );
    assert_eq!(
        TreeError::PermanentNode(NodeId(1)).to_string(),
        "Permanent bookmark node cannot be modified: #1"
    );
    assert_eq!(
        TreeError::InvalidMove(NodeId(9)).to_string(),
        "Cannot move bookmark node #9 into its own subtree"
    );
}

#[test]
fn tree_error_uuid_in_use_names_uuid() {
    let uuid = Uuid::new_v4();
    assert!(TreeError::UuidInUse(uuid).to_string().contains(&uuid.to_string()));
}

#[test]
fn tree_error_wraps_rusqlite_error() {
    let err: TreeError = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, TreeError::Database(_)));
    assert!(err.to_string().starts_with("Bookmark database error:"));
}

// === MergeError Tests ===

#[test]
fn merge_error_is_transparent_over_tree_error() {
    let err: MergeError = TreeError::NotFound(NodeId(4)).into();
    assert_eq!(err.to_string(), "Bookmark node not found: #4");
}

#[test]
fn merge_error_missing_permanent_folder_display() {
    assert_eq!(
        MergeError::MissingPermanentFolder(PermanentFolder::MobileBookmarks).to_string(),
        "Local tree has no permanent folder synced_bookmarks"
    );
}

#[test]
fn merge_error_from_tracker_error() {
    let err: MergeError = TrackerError::ServerIdAlreadyTracked("s1".to_string()).into();
    assert_eq!(err.to_string(), "Server id already tracked: s1");
}

// === SettingsError Tests ===

#[test]
fn settings_error_display_variants() {
    assert_eq!(
        SettingsError::IoError("disk full".to_string()).to_string(),
        "Settings I/O error: disk full"
    );
    assert_eq!(
        SettingsError::SerializationError("bad json".to_string()).to_string(),
        "Settings serialization error: bad json"
    );
    assert_eq!(
        SettingsError::InvalidKey("nope".to_string()).to_string(),
        "Invalid settings key: nope"
    );
    assert_eq!(
        SettingsError::InvalidValue("-1".to_string()).to_string(),
        "Invalid settings value: -1"
    );
}

#[test]
fn settings_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(SettingsError::InvalidKey("k".to_string()));
    assert!(err.source().is_none());
}
