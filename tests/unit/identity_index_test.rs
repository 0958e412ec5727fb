//! Tests for building the identity index: validation, duplicate resolution
//! and forest assembly.

use bookmark_sync::managers::bookmark_tree::{BookmarkTreeTrait, InMemoryBookmarkTree};
use bookmark_sync::services::identity_index::IdentityIndex;
use bookmark_sync::types::bookmark::{NewNode, PermanentFolder, ROOT_NODE_UUID, ROOT_SERVER_TAG};
use bookmark_sync::types::metrics::{RemoteUpdateError, UuidDuplicateKind};
use bookmark_sync::types::settings::MergeSettings;
use bookmark_sync::types::update::UpdateRecord;
use chrono::{Duration, TimeZone, Utc};
use rstest::rstest;
use uuid::Uuid;

fn bar_uuid() -> Uuid {
    PermanentFolder::BookmarkBar.uuid()
}

fn build(updates: Vec<UpdateRecord>) -> IdentityIndex {
    let tree = InMemoryBookmarkTree::new();
    IdentityIndex::build(updates, &tree, &MergeSettings::default()).unwrap()
}

fn with_bar(mut records: Vec<UpdateRecord>) -> Vec<UpdateRecord> {
    records.insert(0, UpdateRecord::permanent_folder(PermanentFolder::BookmarkBar));
    records
}

/// Titles of the remote children of the bookmark bar, in forest order.
fn bar_titles(index: &IdentityIndex) -> Vec<String> {
    index
        .node(index.roots()[0])
        .children
        .iter()
        .map(|&child| index.node(child).entity.title.clone())
        .collect()
}

fn invalid_uuid() -> UpdateRecord {
    let mut record = UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", vec![1]);
    record.specifics.uuid = "not-a-uuid".into();
    record
}

fn reserved_uuid() -> UpdateRecord {
    let other = PermanentFolder::OtherBookmarks.uuid();
    UpdateRecord::folder(other, bar_uuid(), "f", vec![1])
}

fn invalid_parent() -> UpdateRecord {
    let mut record = UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", vec![1]);
    record.specifics.parent_uuid = String::new();
    record
}

fn folder_with_url() -> UpdateRecord {
    let mut record = UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", vec![1]);
    record.specifics.url = Some("http://folder.example/".into());
    record
}

fn unparsable_url() -> UpdateRecord {
    UpdateRecord::bookmark(Uuid::new_v4(), bar_uuid(), "b", "not a url", vec![1])
}

fn missing_url() -> UpdateRecord {
    let mut record = UpdateRecord::bookmark(Uuid::new_v4(), bar_uuid(), "b", "http://b/", vec![1]);
    record.specifics.url = None;
    record
}

fn empty_position() -> UpdateRecord {
    UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", Vec::new())
}

fn trailing_zero_position() -> UpdateRecord {
    UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", vec![4, 0])
}

fn mismatched_originator() -> UpdateRecord {
    let mut record = UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", vec![1]);
    record.originator_client_item_id = Some(Uuid::new_v4().to_string());
    record
}

fn unknown_tag() -> UpdateRecord {
    let mut record = UpdateRecord::permanent_folder(PermanentFolder::OtherBookmarks);
    record.server_tag = Some("tablet_bookmarks".into());
    record
}

#[rstest]
#[case::invalid_uuid(invalid_uuid(), RemoteUpdateError::InvalidSpecifics)]
#[case::reserved_uuid(reserved_uuid(), RemoteUpdateError::InvalidSpecifics)]
#[case::invalid_parent(invalid_parent(), RemoteUpdateError::InvalidSpecifics)]
#[case::folder_with_url(folder_with_url(), RemoteUpdateError::InvalidSpecifics)]
#[case::unparsable_url(unparsable_url(), RemoteUpdateError::InvalidSpecifics)]
#[case::missing_url(missing_url(), RemoteUpdateError::InvalidSpecifics)]
#[case::empty_position(empty_position(), RemoteUpdateError::InvalidUniquePosition)]
#[case::trailing_zero(trailing_zero_position(), RemoteUpdateError::InvalidUniquePosition)]
#[case::unexpected_uuid(mismatched_originator(), RemoteUpdateError::UnexpectedUuid)]
#[case::unknown_tag(unknown_tag(), RemoteUpdateError::UnsupportedPermanentFolder)]
fn test_invalid_record_is_dropped(#[case] record: UpdateRecord, #[case] expected: RemoteUpdateError) {
    let index = build(with_bar(vec![record]));

    assert_eq!(index.problems(), &[expected]);
    assert_eq!(index.valid_updates(), 1);
    assert_eq!(index.reachable_updates(), 1);
    assert!(bar_titles(&index).is_empty());
}

#[test]
fn test_uuid_inferred_from_originator() {
    let uuid = Uuid::new_v4();
    let mut record = UpdateRecord::folder(uuid, bar_uuid(), "f", vec![1]);
    record.specifics.uuid = String::new();

    let index = build(with_bar(vec![record]));

    let node = index.remote_for_uuid(&uuid).unwrap();
    assert!(index.node(node).entity.uuid_inferred);
    assert!(index.problems().is_empty());
}

#[test]
fn test_empty_uuid_without_usable_originator() {
    let mut record = UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "f", vec![1]);
    record.specifics.uuid = String::new();
    record.originator_client_item_id = Some("legacy-item-42".into());

    let index = build(with_bar(vec![record]));
    assert_eq!(index.problems(), &[RemoteUpdateError::InvalidSpecifics]);
}

#[test]
fn test_type_root_is_skipped_silently() {
    let mut root = UpdateRecord::permanent_folder(PermanentFolder::BookmarkBar);
    root.server_tag = Some(ROOT_SERVER_TAG.into());
    root.server_id = "root_server_id".into();

    let index = build(with_bar(vec![root]));

    assert!(index.problems().is_empty());
    assert_eq!(index.valid_updates(), 1);
    assert_eq!(index.roots().len(), 1);
}

#[test]
fn test_repeated_permanent_folder_keeps_first() {
    let first = UpdateRecord::permanent_folder(PermanentFolder::BookmarkBar);
    let second = UpdateRecord::permanent_folder(PermanentFolder::BookmarkBar)
        .with_server_id("second_bar");

    let index = build(vec![first, second]);

    assert_eq!(index.roots().len(), 1);
    assert_eq!(
        index.node(index.roots()[0]).entity.server_id,
        "bookmark_bar_server_id"
    );
}

#[test]
fn test_children_sorted_by_position() {
    let index = build(with_bar(vec![
        UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "c", vec![3]),
        UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "a", vec![1]),
        UpdateRecord::folder(Uuid::new_v4(), bar_uuid(), "b", vec![2, 7]),
    ]));
    assert_eq!(bar_titles(&index), vec!["a", "b", "c"]);
}

/// Children arriving before their parent are still attached.
#[test]
fn test_children_before_parent_attach() {
    let folder = Uuid::new_v4();
    let child = Uuid::new_v4();
    let index = build(with_bar(vec![
        UpdateRecord::bookmark(child, folder, "child", "http://child/", vec![1]),
        UpdateRecord::folder(folder, bar_uuid(), "folder", vec![1]),
    ]));

    let folder_index = index.remote_for_uuid(&folder).unwrap();
    let child_index = index.remote_for_uuid(&child).unwrap();
    assert_eq!(index.node(folder_index).children, vec![child_index]);
    assert_eq!(index.node(child_index).depth, 2);
    assert!(folder_index < child_index);
}

#[test]
fn test_children_of_bookmark_are_parent_not_folder() {
    let bookmark = Uuid::new_v4();
    let index = build(with_bar(vec![
        UpdateRecord::bookmark(bookmark, bar_uuid(), "b", "http://b/", vec![1]),
        UpdateRecord::folder(Uuid::new_v4(), bookmark, "x", vec![1]),
        UpdateRecord::folder(Uuid::new_v4(), bookmark, "y", vec![2]),
    ]));

    assert!(index.remote_for_uuid(&bookmark).is_some());
    assert_eq!(
        index.problems(),
        &[RemoteUpdateError::ParentNotFolder, RemoteUpdateError::ParentNotFolder]
    );
    assert_eq!(index.reachable_updates(), 2);
}

#[test]
fn test_orphans_and_their_descendants_are_missing_parent() {
    let orphan = Uuid::new_v4();
    let index = build(with_bar(vec![
        UpdateRecord::folder(orphan, Uuid::new_v4(), "orphan", vec![1]),
        UpdateRecord::bookmark(Uuid::new_v4(), orphan, "under orphan", "http://o/", vec![1]),
    ]));

    assert_eq!(index.missing_parent_count(), 2);
    assert_eq!(index.valid_updates(), 3);
    assert_eq!(index.reachable_updates(), 1);
}

#[test]
fn test_child_of_tree_root_is_missing_parent() {
    let index = build(with_bar(vec![UpdateRecord::folder(
        Uuid::new_v4(),
        ROOT_NODE_UUID,
        "top level",
        vec![1],
    )]));
    assert_eq!(index.problems(), &[RemoteUpdateError::MissingParentEntity]);
}

#[test]
fn test_depth_cap_skips_deeper_nodes() {
    let settings = MergeSettings {
        max_tree_depth: 2,
        ..MergeSettings::default()
    };
    let mut records = vec![UpdateRecord::permanent_folder(PermanentFolder::BookmarkBar)];
    let mut parent = bar_uuid();
    for depth in 1..=4 {
        let uuid = Uuid::new_v4();
        records.push(UpdateRecord::folder(uuid, parent, &format!("level {}", depth), vec![1]));
        parent = uuid;
    }

    let tree = InMemoryBookmarkTree::new();
    let index = IdentityIndex::build(records, &tree, &settings).unwrap();

    assert_eq!(index.reachable_updates(), 3);
    assert_eq!(index.beyond_depth_limit(), 2);
    assert!(index.problems().is_empty());
    assert!(index.nodes().all(|(_, node)| node.depth <= 2));
}

/// Managed subtrees are left out of the local UUID map entirely.
#[test]
fn test_local_uuids_skip_managed_nodes() {
    let mut tree = InMemoryBookmarkTree::new();
    let bar = tree.permanent_node(PermanentFolder::BookmarkBar).unwrap();
    let local = tree.add_url(bar, "local", "http://local/").unwrap();
    let local_uuid = tree.node(local).unwrap().uuid;
    let managed = tree.add_managed_folder("Managed").unwrap();
    let managed_child = tree.add_url(managed, "corp", "http://corp/").unwrap();
    let managed_uuid = tree.node(managed_child).unwrap().uuid;

    let index = IdentityIndex::build(Vec::new(), &tree, &MergeSettings::default()).unwrap();

    assert_eq!(index.local_for_uuid(&local_uuid).map(|info| info.node), Some(local));
    assert!(index.local_for_uuid(&managed_uuid).is_none());
    assert!(index.local_for_uuid(&tree.node(managed).unwrap().uuid).is_none());
    assert!(index.local_for_uuid(&bar_uuid()).is_none());
}

/// A server id reused by a record with another UUID keeps its first owner.
#[test]
fn test_repeated_server_id_keeps_first_record() {
    let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
    let index = build(with_bar(vec![
        UpdateRecord::bookmark(first, bar_uuid(), "first", "http://first/", vec![1])
            .with_server_id("shared"),
        UpdateRecord::bookmark(second, bar_uuid(), "second", "http://second/", vec![2])
            .with_server_id("shared"),
    ]));

    assert_eq!(bar_titles(&index), vec!["first"]);
    assert!(index.remote_for_uuid(&second).is_none());
    assert_eq!(index.problems(), &[RemoteUpdateError::UuidChangedForServerId]);
    assert_eq!(index.valid_updates(), 2);
    assert!(index.duplicates().is_empty());
}

/// Records repeating a UUID may repeat its server id too; that is a plain
/// duplicate, not a server id conflict.
#[test]
fn test_same_uuid_same_server_id_is_a_duplicate() {
    let uuid = Uuid::new_v4();
    let index = build(with_bar(vec![
        UpdateRecord::bookmark(uuid, bar_uuid(), "b", "http://b/", vec![1]),
        UpdateRecord::bookmark(uuid, bar_uuid(), "b", "http://b/", vec![1]),
    ]));

    assert!(index.problems().is_empty());
    assert_eq!(index.duplicates(), &[UuidDuplicateKind::MatchingUrls]);
}

// === Duplicates ===

/// UUID shared by the duplicate records below.
const DUP: Uuid = Uuid::from_u128(0x5e1f_0000_0000_4000_8000_0000_0000_0d0d);

fn at(seconds: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000, 0).unwrap() + Duration::seconds(seconds)
}

#[rstest]
#[case::matching_folders(
    UpdateRecord::folder(DUP, bar_uuid(), "same", vec![1]),
    UpdateRecord::folder(DUP, bar_uuid(), "same", vec![2]),
    UuidDuplicateKind::MatchingFolders
)]
#[case::different_folders(
    UpdateRecord::folder(DUP, bar_uuid(), "one", vec![1]),
    UpdateRecord::folder(DUP, bar_uuid(), "two", vec![2]),
    UuidDuplicateKind::DifferentFolders
)]
#[case::matching_urls(
    UpdateRecord::bookmark(DUP, bar_uuid(), "a", "http://same/", vec![1]),
    UpdateRecord::bookmark(DUP, bar_uuid(), "b", "http://same/", vec![2]),
    UuidDuplicateKind::MatchingUrls
)]
#[case::different_urls(
    UpdateRecord::bookmark(DUP, bar_uuid(), "a", "http://one/", vec![1]),
    UpdateRecord::bookmark(DUP, bar_uuid(), "a", "http://two/", vec![2]),
    UuidDuplicateKind::DifferentUrls
)]
#[case::different_types(
    UpdateRecord::folder(DUP, bar_uuid(), "a", vec![1]),
    UpdateRecord::bookmark(DUP, bar_uuid(), "a", "http://a/", vec![2]),
    UuidDuplicateKind::DifferentTypes
)]
fn test_duplicate_newest_survives(
    #[case] older: UpdateRecord,
    #[case] newer: UpdateRecord,
    #[case] kind: UuidDuplicateKind,
) {
    let newer_server_id = "newer".to_string();
    let index = build(with_bar(vec![
        newer.with_server_id(newer_server_id.clone()).with_creation_time(at(10)),
        older.with_server_id("older").with_creation_time(at(0)),
    ]));

    assert_eq!(index.duplicates(), &[kind]);
    let survivor = index.remote_for_uuid(&DUP).unwrap();
    assert_eq!(index.node(survivor).entity.server_id, newer_server_id);
    assert_eq!(bar_titles(&index).len(), 1);
    assert!(index.problems().is_empty());
}

#[test]
fn test_duplicate_tie_keeps_first_arrival() {
    let uuid = Uuid::new_v4();
    let index = build(with_bar(vec![
        UpdateRecord::folder(uuid, bar_uuid(), "first", vec![1]).with_creation_time(at(5)),
        UpdateRecord::folder(uuid, bar_uuid(), "second", vec![2]).with_creation_time(at(5)),
    ]));
    assert_eq!(bar_titles(&index), vec!["first"]);
}

#[test]
fn test_duplicate_agreeing_with_local_node_survives() {
    let uuid = Uuid::new_v4();
    let mut tree = InMemoryBookmarkTree::new();
    let bar = tree.permanent_node(PermanentFolder::BookmarkBar).unwrap();
    tree.create_node(bar, 0, NewNode::bookmark(uuid, "local", "http://local/"))
        .unwrap();

    let updates = with_bar(vec![
        UpdateRecord::bookmark(uuid, bar_uuid(), "local", "http://local/", vec![1])
            .with_server_id("agrees")
            .with_creation_time(at(0)),
        UpdateRecord::folder(uuid, bar_uuid(), "newer folder", vec![2])
            .with_server_id("conflicts")
            .with_creation_time(at(60)),
    ]);
    let index = IdentityIndex::build(updates, &tree, &MergeSettings::default()).unwrap();

    let survivor = index.remote_for_uuid(&uuid).unwrap();
    assert_eq!(index.node(survivor).entity.server_id, "agrees");
    assert_eq!(index.duplicates(), &[UuidDuplicateKind::DifferentTypes]);
}

/// The loser's children attach to the survivor.
#[test]
fn test_duplicate_folder_children_attach_to_survivor() {
    let uuid = Uuid::new_v4();
    let index = build(with_bar(vec![
        UpdateRecord::folder(uuid, bar_uuid(), "old", vec![1]).with_creation_time(at(0)),
        UpdateRecord::folder(uuid, bar_uuid(), "new", vec![1]).with_creation_time(at(9)),
        UpdateRecord::bookmark(Uuid::new_v4(), uuid, "child", "http://child/", vec![1]),
    ]));

    let survivor = index.remote_for_uuid(&uuid).unwrap();
    assert_eq!(index.node(survivor).entity.title, "new");
    assert_eq!(index.node(survivor).children.len(), 1);
    assert_eq!(index.valid_updates(), 4);
    assert_eq!(index.reachable_updates(), 3);
}
