//! Bookmark tree accessor.
//!
//! Defines `BookmarkTreeTrait`, the narrow interface the merge engine uses to
//! read and mutate the local tree, and `InMemoryBookmarkTree`, a plain
//! in-memory implementation.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::types::bookmark::{BookmarkNode, NewNode, NodeId, PermanentFolder, ROOT_NODE_UUID};
use crate::types::errors::TreeError;

/// Trait defining the operations the merge performs on a local bookmark tree.
///
/// Child indices are positions in the full child list. `move_node` removes the
/// node first and then inserts it at `index` in the new parent; indices past
/// the end append.
pub trait BookmarkTreeTrait {
    fn root(&self) -> NodeId;
    fn permanent_node(&self, folder: PermanentFolder) -> Option<NodeId>;
    fn node(&self, id: NodeId) -> Result<BookmarkNode, TreeError>;
    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError>;
    fn create_node(&mut self, parent: NodeId, index: usize, node: NewNode) -> Result<NodeId, TreeError>;
    fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<(), TreeError>;
    /// Removes the node together with its subtree.
    fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError>;
    fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), TreeError>;
    fn set_url(&mut self, id: NodeId, url: &str) -> Result<(), TreeError>;
    /// False for nodes sync must never touch, such as managed bookmarks.
    /// UUIDs are unique among editable nodes; non-editable nodes keep their
    /// own UUID space and never block a syncable node.
    fn is_node_editable(&self, id: NodeId) -> bool;
}

/// Gives `id` a new UUID by re-creating it in place.
///
/// The replacement takes the same parent, index, title, URL and creation time;
/// children move across and the old node is removed. Returns the new node id.
pub fn replace_node_uuid(
    tree: &mut dyn BookmarkTreeTrait,
    id: NodeId,
    new_uuid: Uuid,
) -> Result<NodeId, TreeError> {
    let node = tree.node(id)?;
    if node.is_permanent() {
        return Err(TreeError::PermanentNode(id));
    }
    let parent = node.parent.ok_or(TreeError::PermanentNode(id))?;
    let index = tree
        .children(parent)?
        .iter()
        .position(|child| *child == id)
        .ok_or(TreeError::NotFound(id))?;

    let replacement = tree.create_node(
        parent,
        index,
        NewNode {
            uuid: new_uuid,
            title: node.title,
            url: node.url,
            created_at: node.created_at,
        },
    )?;
    for (i, child) in tree.children(id)?.into_iter().enumerate() {
        tree.move_node(child, replacement, i)?;
    }
    tree.remove_node(id)?;
    Ok(replacement)
}

struct Entry {
    node: BookmarkNode,
    children: Vec<NodeId>,
    managed: bool,
}

/// Bookmark tree held entirely in memory.
///
/// Starts with the root and the three permanent folders.
pub struct InMemoryBookmarkTree {
    entries: HashMap<NodeId, Entry>,
    uuids: HashMap<Uuid, NodeId>,
    managed_uuids: HashMap<Uuid, NodeId>,
    permanent: HashMap<PermanentFolder, NodeId>,
    root: NodeId,
    next_id: i64,
}

impl Default for InMemoryBookmarkTree {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBookmarkTree {
    pub fn new() -> Self {
        let now = Utc::now();
        let root = NodeId(1);
        let mut tree = Self {
            entries: HashMap::new(),
            uuids: HashMap::new(),
            managed_uuids: HashMap::new(),
            permanent: HashMap::new(),
            root,
            next_id: 2,
        };
        tree.insert_entry(
            BookmarkNode {
                id: root,
                uuid: ROOT_NODE_UUID,
                parent: None,
                title: String::new(),
                url: None,
                permanent: None,
                created_at: now,
                updated_at: now,
            },
            false,
        );
        for folder in PermanentFolder::ALL {
            let id = tree.allocate_id();
            tree.insert_entry(
                BookmarkNode {
                    id,
                    uuid: folder.uuid(),
                    parent: Some(root),
                    title: folder.default_title().to_string(),
                    url: None,
                    permanent: Some(folder),
                    created_at: now,
                    updated_at: now,
                },
                false,
            );
            tree.attach(root, id, usize::MAX);
            tree.permanent.insert(folder, id);
        }
        tree
    }

    /// Appends a folder with a random UUID.
    pub fn add_folder(&mut self, parent: NodeId, title: &str) -> Result<NodeId, TreeError> {
        let index = self.children(parent)?.len();
        self.create_node(parent, index, NewNode::folder(Uuid::new_v4(), title))
    }

    /// Appends a bookmark with a random UUID.
    pub fn add_url(&mut self, parent: NodeId, title: &str, url: &str) -> Result<NodeId, TreeError> {
        let index = self.children(parent)?.len();
        self.create_node(parent, index, NewNode::bookmark(Uuid::new_v4(), title, url))
    }

    /// Adds a managed folder under the root. It and everything below it are
    /// read-only for sync.
    pub fn add_managed_folder(&mut self, title: &str) -> Result<NodeId, TreeError> {
        let index = self.children(self.root)?.len();
        self.create_unchecked(self.root, index, NewNode::folder(Uuid::new_v4(), title), true)
    }

    /// Looks up an editable node by UUID.
    pub fn node_for_uuid(&self, uuid: &Uuid) -> Option<NodeId> {
        self.uuids.get(uuid).copied()
    }

    /// Number of nodes, including the root and permanent folders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert_entry(&mut self, node: BookmarkNode, managed: bool) {
        let in_managed_subtree = managed
            || node
                .parent
                .is_some_and(|parent| !self.is_node_editable(parent));
        if in_managed_subtree {
            self.managed_uuids.insert(node.uuid, node.id);
        } else {
            self.uuids.insert(node.uuid, node.id);
        }
        self.entries.insert(
            node.id,
            Entry {
                node,
                children: Vec::new(),
                managed,
            },
        );
    }

    fn attach(&mut self, parent: NodeId, id: NodeId, index: usize) {
        if let Some(entry) = self.entries.get_mut(&parent) {
            let index = index.min(entry.children.len());
            entry.children.insert(index, id);
        }
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.node.parent = Some(parent);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.entries.get(&id).and_then(|entry| entry.node.parent);
        if let Some(entry) = parent.and_then(|p| self.entries.get_mut(&p)) {
            entry.children.retain(|child| *child != id);
        }
    }

    fn entry(&self, id: NodeId) -> Result<&Entry, TreeError> {
        self.entries.get(&id).ok_or(TreeError::NotFound(id))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut Entry, TreeError> {
        self.entries.get_mut(&id).ok_or(TreeError::NotFound(id))
    }

    fn ensure_mutable(&self, id: NodeId) -> Result<(), TreeError> {
        if self.entry(id)?.node.is_permanent() {
            return Err(TreeError::PermanentNode(id));
        }
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.entries.get(&id).and_then(|entry| entry.node.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn create_unchecked(
        &mut self,
        parent: NodeId,
        index: usize,
        new_node: NewNode,
        managed: bool,
    ) -> Result<NodeId, TreeError> {
        if !self.entry(parent)?.node.is_folder() {
            return Err(TreeError::NotAFolder(parent));
        }
        let uuids = if managed || !self.is_node_editable(parent) {
            &self.managed_uuids
        } else {
            &self.uuids
        };
        if uuids.contains_key(&new_node.uuid) {
            return Err(TreeError::UuidInUse(new_node.uuid));
        }
        let id = self.allocate_id();
        self.insert_entry(
            BookmarkNode {
                id,
                uuid: new_node.uuid,
                parent: Some(parent),
                title: new_node.title,
                url: new_node.url,
                permanent: None,
                created_at: new_node.created_at,
                updated_at: Utc::now(),
            },
            managed,
        );
        self.attach(parent, id, index);
        Ok(id)
    }
}

impl BookmarkTreeTrait for InMemoryBookmarkTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn permanent_node(&self, folder: PermanentFolder) -> Option<NodeId> {
        self.permanent.get(&folder).copied()
    }

    fn node(&self, id: NodeId) -> Result<BookmarkNode, TreeError> {
        Ok(self.entry(id)?.node.clone())
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        Ok(self.entry(id)?.children.clone())
    }

    fn create_node(&mut self, parent: NodeId, index: usize, node: NewNode) -> Result<NodeId, TreeError> {
        if parent == self.root {
            return Err(TreeError::PermanentNode(parent));
        }
        self.create_unchecked(parent, index, node, false)
    }

    fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        if new_parent == self.root {
            return Err(TreeError::PermanentNode(new_parent));
        }
        if !self.entry(new_parent)?.node.is_folder() {
            return Err(TreeError::NotAFolder(new_parent));
        }
        if self.is_ancestor_or_self(id, new_parent)
            || self.is_node_editable(id) != self.is_node_editable(new_parent)
        {
            return Err(TreeError::InvalidMove(id));
        }
        self.detach(id);
        self.attach(new_parent, id, index);
        Ok(())
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        self.detach(id);
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(entry) = self.entries.remove(&current) {
                for uuids in [&mut self.uuids, &mut self.managed_uuids] {
                    if uuids.get(&entry.node.uuid) == Some(&current) {
                        uuids.remove(&entry.node.uuid);
                    }
                }
                pending.extend(entry.children);
            }
        }
        Ok(())
    }

    fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        let entry = self.entry_mut(id)?;
        entry.node.title = title.to_string();
        entry.node.updated_at = Utc::now();
        Ok(())
    }

    fn set_url(&mut self, id: NodeId, url: &str) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        let entry = self.entry_mut(id)?;
        if entry.node.is_folder() {
            return Err(TreeError::InvalidUrl(id));
        }
        entry.node.url = Some(url.to_string());
        entry.node.updated_at = Utc::now();
        Ok(())
    }

    fn is_node_editable(&self, mut id: NodeId) -> bool {
        loop {
            match self.entries.get(&id) {
                Some(entry) if entry.managed => return false,
                Some(entry) => match entry.node.parent {
                    Some(parent) => id = parent,
                    None => return true,
                },
                None => return false,
            }
        }
    }
}
