//! Contract tests for the in-memory bookmark tree accessor.

use bookmark_sync::managers::bookmark_tree::{
    replace_node_uuid, BookmarkTreeTrait, InMemoryBookmarkTree,
};
use bookmark_sync::types::bookmark::{NewNode, NodeId, PermanentFolder};
use bookmark_sync::types::errors::TreeError;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

fn setup() -> (InMemoryBookmarkTree, NodeId) {
    let tree = InMemoryBookmarkTree::new();
    let bar = tree.permanent_node(PermanentFolder::BookmarkBar).unwrap();
    (tree, bar)
}

fn titles(tree: &InMemoryBookmarkTree, parent: NodeId) -> Vec<String> {
    tree.children(parent)
        .unwrap()
        .into_iter()
        .map(|id| tree.node(id).unwrap().title)
        .collect()
}

/// Inserting at an index shifts later siblings; indices past the end append.
#[test]
fn test_create_node_at_index() {
    let (mut tree, bar) = setup();
    tree.create_node(bar, 0, NewNode::folder(Uuid::new_v4(), "b")).unwrap();
    tree.create_node(bar, 0, NewNode::folder(Uuid::new_v4(), "a")).unwrap();
    tree.create_node(bar, 99, NewNode::bookmark(Uuid::new_v4(), "c", "http://c/")).unwrap();
    assert_eq!(titles(&tree, bar), vec!["a", "b", "c"]);
}

/// The index of a move counts positions after the node was detached.
#[test]
fn test_move_within_same_parent() {
    let (mut tree, bar) = setup();
    let a = tree.add_folder(bar, "a").unwrap();
    tree.add_folder(bar, "b").unwrap();
    tree.add_folder(bar, "c").unwrap();

    tree.move_node(a, bar, 2).unwrap();
    assert_eq!(titles(&tree, bar), vec!["b", "c", "a"]);
}

#[test]
fn test_move_across_parents_keeps_subtree() {
    let (mut tree, bar) = setup();
    let other = tree.permanent_node(PermanentFolder::OtherBookmarks).unwrap();
    let folder = tree.add_folder(bar, "folder").unwrap();
    let child = tree.add_url(folder, "child", "http://child/").unwrap();

    tree.move_node(folder, other, 0).unwrap();

    assert!(tree.children(bar).unwrap().is_empty());
    assert_eq!(tree.children(other).unwrap(), vec![folder]);
    assert_eq!(tree.node(child).unwrap().parent, Some(folder));
}

#[test]
fn test_remove_node_removes_subtree_and_frees_uuids() {
    let (mut tree, bar) = setup();
    let folder = tree.add_folder(bar, "folder").unwrap();
    let child = tree.add_url(folder, "child", "http://child/").unwrap();
    let child_uuid = tree.node(child).unwrap().uuid;

    tree.remove_node(folder).unwrap();

    assert!(matches!(tree.node(child), Err(TreeError::NotFound(_))));
    assert!(tree.node_for_uuid(&child_uuid).is_none());
    tree.create_node(bar, 0, NewNode::bookmark(child_uuid, "again", "http://child/"))
        .unwrap();
}

#[test]
fn test_duplicate_uuid_rejected() {
    let (mut tree, bar) = setup();
    let uuid = Uuid::new_v4();
    tree.create_node(bar, 0, NewNode::folder(uuid, "one")).unwrap();
    assert!(matches!(
        tree.create_node(bar, 0, NewNode::folder(uuid, "two")),
        Err(TreeError::UuidInUse(_))
    ));
}

#[test]
fn test_permanent_nodes_are_protected() {
    let (mut tree, bar) = setup();
    let other = tree.permanent_node(PermanentFolder::OtherBookmarks).unwrap();
    assert!(matches!(tree.remove_node(bar), Err(TreeError::PermanentNode(_))));
    assert!(matches!(tree.set_title(bar, "x"), Err(TreeError::PermanentNode(_))));
    assert!(matches!(tree.move_node(bar, other, 0), Err(TreeError::PermanentNode(_))));
    let root = tree.root();
    assert!(matches!(
        tree.create_node(root, 0, NewNode::folder(Uuid::new_v4(), "top")),
        Err(TreeError::PermanentNode(_))
    ));
}

#[test]
fn test_cannot_add_children_to_bookmark() {
    let (mut tree, bar) = setup();
    let url = tree.add_url(bar, "u", "http://u/").unwrap();
    assert!(matches!(
        tree.create_node(url, 0, NewNode::folder(Uuid::new_v4(), "f")),
        Err(TreeError::NotAFolder(_))
    ));
}

#[test]
fn test_set_url_on_folder_rejected() {
    let (mut tree, bar) = setup();
    let folder = tree.add_folder(bar, "f").unwrap();
    assert!(matches!(
        tree.set_url(folder, "http://x/"),
        Err(TreeError::InvalidUrl(_))
    ));
    let url = tree.add_url(bar, "u", "http://u/").unwrap();
    tree.set_url(url, "http://v/").unwrap();
    assert_eq!(tree.node(url).unwrap().url.as_deref(), Some("http://v/"));
}

#[test]
fn test_replace_node_uuid_for_bookmark() {
    let (mut tree, bar) = setup();
    tree.add_folder(bar, "before").unwrap();
    let created_at = Utc.with_ymd_and_hms(2014, 3, 1, 12, 0, 0).unwrap();
    let url = tree
        .create_node(
            bar,
            1,
            NewNode::bookmark(Uuid::new_v4(), "u", "http://u/").with_created_at(created_at),
        )
        .unwrap();
    tree.add_folder(bar, "after").unwrap();

    let new_uuid = Uuid::new_v4();
    let replacement = replace_node_uuid(&mut tree, url, new_uuid).unwrap();

    let node = tree.node(replacement).unwrap();
    assert_eq!(node.uuid, new_uuid);
    assert_eq!(node.url.as_deref(), Some("http://u/"));
    assert_eq!(node.created_at, created_at);
    assert_eq!(titles(&tree, bar), vec!["before", "u", "after"]);
}

#[test]
fn test_replace_permanent_uuid_rejected() {
    let (mut tree, bar) = setup();
    assert!(matches!(
        replace_node_uuid(&mut tree, bar, Uuid::new_v4()),
        Err(TreeError::PermanentNode(_))
    ));
}

/// Managed nodes keep their own UUID space: a synced node may carry the same
/// UUID, and nothing crosses the managed boundary.
#[test]
fn test_managed_uuid_does_not_block_editable_node() {
    let (mut tree, bar) = setup();
    let managed = tree.add_managed_folder("Managed").unwrap();
    let shared = Uuid::new_v4();
    let policy = tree
        .create_node(managed, 0, NewNode::bookmark(shared, "policy", "http://corp/"))
        .unwrap();

    let synced = tree
        .create_node(bar, 0, NewNode::bookmark(shared, "policy", "http://corp/"))
        .unwrap();
    assert_eq!(tree.node_for_uuid(&shared), Some(synced));

    assert!(matches!(
        tree.create_node(managed, 1, NewNode::folder(shared, "again")),
        Err(TreeError::UuidInUse(_))
    ));
    assert!(matches!(tree.move_node(policy, bar, 0), Err(TreeError::InvalidMove(_))));
    assert!(matches!(tree.move_node(synced, managed, 0), Err(TreeError::InvalidMove(_))));

    tree.remove_node(synced).unwrap();
    assert_eq!(tree.node_for_uuid(&shared), None);
    assert_eq!(tree.node(policy).unwrap().uuid, shared);
}
