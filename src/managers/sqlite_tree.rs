//! SQLite-backed bookmark tree.
//!
//! Implements `BookmarkTreeTrait` over the `bookmark_nodes` table. Sibling
//! order is kept as a dense `position` column that every structural change
//! rewrites inside a transaction.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::managers::bookmark_tree::BookmarkTreeTrait;
use crate::types::bookmark::{BookmarkNode, NewNode, NodeId, PermanentFolder, ROOT_NODE_UUID};
use crate::types::errors::TreeError;

const NODE_COLUMNS: &str =
    "id, uuid, parent_id, title, url, permanent_tag, created_at, updated_at";

/// Bookmark tree stored in SQLite.
pub struct SqliteBookmarkTree<'a> {
    conn: &'a Connection,
    root: NodeId,
}

impl<'a> SqliteBookmarkTree<'a> {
    /// Wraps a migrated connection (see [`Database`](crate::database::Database)).
    pub fn new(conn: &'a Connection) -> Result<Self, TreeError> {
        let root: i64 = conn.query_row(
            "SELECT id FROM bookmark_nodes WHERE uuid = ?1 AND parent_id IS NULL",
            params![ROOT_NODE_UUID.to_string()],
            |row| row.get(0),
        )?;
        Ok(Self {
            conn,
            root: NodeId(root),
        })
    }

    /// Appends a managed folder under the root. Sync never touches it.
    pub fn add_managed_folder(&mut self, title: &str) -> Result<NodeId, TreeError> {
        let tx = self.conn.unchecked_transaction()?;
        let position: i64 = tx.query_row(
            "SELECT COUNT(*) FROM bookmark_nodes WHERE parent_id = ?1",
            params![self.root.0],
            |row| row.get(0),
        )?;
        let now = Utc::now().timestamp_millis();
        tx.execute(
            "INSERT INTO bookmark_nodes (uuid, parent_id, position, title, url, managed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, 1, ?5, ?5)",
            params![Uuid::new_v4().to_string(), self.root.0, position, title, now],
        )?;
        let id = NodeId(tx.last_insert_rowid());
        tx.commit()?;
        Ok(id)
    }

    /// Looks up an editable node by UUID.
    pub fn node_for_uuid(&self, uuid: &Uuid) -> Result<Option<NodeId>, TreeError> {
        self.node_for_uuid_in(uuid, false)
    }

    fn node_for_uuid_in(&self, uuid: &Uuid, managed: bool) -> Result<Option<NodeId>, TreeError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM bookmark_nodes WHERE uuid = ?1 AND managed = ?2",
                params![uuid.to_string(), managed],
                |row| row.get(0),
            )
            .optional()?
            .map(NodeId))
    }

    fn row_to_node(row: &Row<'_>) -> Result<BookmarkNode, rusqlite::Error> {
        let uuid: String = row.get(1)?;
        let uuid = Uuid::parse_str(&uuid)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let permanent: Option<String> = row.get(5)?;
        Ok(BookmarkNode {
            id: NodeId(row.get(0)?),
            uuid,
            parent: row.get::<_, Option<i64>>(2)?.map(NodeId),
            title: row.get(3)?,
            url: row.get(4)?,
            permanent: permanent.as_deref().and_then(PermanentFolder::from_server_tag),
            created_at: from_millis(row.get(6)?),
            updated_at: from_millis(row.get(7)?),
        })
    }

    fn location(&self, id: NodeId) -> Result<(Option<NodeId>, i64), TreeError> {
        self.conn
            .query_row(
                "SELECT parent_id, position FROM bookmark_nodes WHERE id = ?1",
                params![id.0],
                |row| Ok((row.get::<_, Option<i64>>(0)?.map(NodeId), row.get(1)?)),
            )
            .optional()?
            .ok_or(TreeError::NotFound(id))
    }

    fn child_count(&self, parent: NodeId, excluding: Option<NodeId>) -> Result<i64, TreeError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM bookmark_nodes WHERE parent_id = ?1 AND id != ?2",
            params![parent.0, excluding.map_or(-1, |id| id.0)],
            |row| row.get(0),
        )?)
    }

    fn ensure_mutable(&self, id: NodeId) -> Result<(), TreeError> {
        if self.node(id)?.is_permanent() {
            return Err(TreeError::PermanentNode(id));
        }
        Ok(())
    }

    fn ensure_folder_target(&self, parent: NodeId) -> Result<(), TreeError> {
        if parent == self.root {
            return Err(TreeError::PermanentNode(parent));
        }
        if !self.node(parent)?.is_folder() {
            return Err(TreeError::NotAFolder(parent));
        }
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> Result<bool, TreeError> {
        loop {
            if id == ancestor {
                return Ok(true);
            }
            match self.location(id)?.0 {
                Some(parent) => id = parent,
                None => return Ok(false),
            }
        }
    }

    fn touch(&self, id: NodeId) -> Result<(), TreeError> {
        self.conn.execute(
            "UPDATE bookmark_nodes SET updated_at = ?1 WHERE id = ?2",
            params![Utc::now().timestamp_millis(), id.0],
        )?;
        Ok(())
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}

fn clamp_index(index: usize, len: i64) -> i64 {
    i64::try_from(index).map_or(len, |index| index.min(len))
}

impl<'a> BookmarkTreeTrait for SqliteBookmarkTree<'a> {
    fn root(&self) -> NodeId {
        self.root
    }

    fn permanent_node(&self, folder: PermanentFolder) -> Option<NodeId> {
        self.conn
            .query_row(
                "SELECT id FROM bookmark_nodes WHERE permanent_tag = ?1",
                params![folder.server_tag()],
                |row| row.get(0),
            )
            .optional()
            .ok()
            .flatten()
            .map(NodeId)
    }

    fn node(&self, id: NodeId) -> Result<BookmarkNode, TreeError> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM bookmark_nodes WHERE id = ?1", NODE_COLUMNS),
                params![id.0],
                Self::row_to_node,
            )
            .optional()?
            .ok_or(TreeError::NotFound(id))
    }

    fn children(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        self.location(id)?;
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM bookmark_nodes WHERE parent_id = ?1 ORDER BY position")?;
        let rows = stmt.query_map(params![id.0], |row| row.get(0))?;
        let mut children = Vec::new();
        for row in rows {
            children.push(NodeId(row?));
        }
        Ok(children)
    }

    fn create_node(&mut self, parent: NodeId, index: usize, node: NewNode) -> Result<NodeId, TreeError> {
        self.ensure_folder_target(parent)?;
        let managed = !self.is_node_editable(parent);
        if self.node_for_uuid_in(&node.uuid, managed)?.is_some() {
            return Err(TreeError::UuidInUse(node.uuid));
        }
        let position = clamp_index(index, self.child_count(parent, None)?);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE bookmark_nodes SET position = position + 1 WHERE parent_id = ?1 AND position >= ?2",
            params![parent.0, position],
        )?;
        tx.execute(
            "INSERT INTO bookmark_nodes (uuid, parent_id, position, title, url, managed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                node.uuid.to_string(),
                parent.0,
                position,
                node.title,
                node.url,
                managed,
                node.created_at.timestamp_millis(),
                Utc::now().timestamp_millis()
            ],
        )?;
        let id = NodeId(tx.last_insert_rowid());
        tx.commit()?;
        Ok(id)
    }

    fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        self.ensure_folder_target(new_parent)?;
        if self.is_ancestor_or_self(id, new_parent)?
            || self.is_node_editable(id) != self.is_node_editable(new_parent)
        {
            return Err(TreeError::InvalidMove(id));
        }
        let (old_parent, old_position) = self.location(id)?;
        let position = clamp_index(index, self.child_count(new_parent, Some(id))?);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE bookmark_nodes SET position = position - 1 WHERE parent_id = ?1 AND position > ?2",
            params![old_parent.map(|p| p.0), old_position],
        )?;
        tx.execute(
            "UPDATE bookmark_nodes SET position = position + 1
             WHERE parent_id = ?1 AND position >= ?2 AND id != ?3",
            params![new_parent.0, position, id.0],
        )?;
        tx.execute(
            "UPDATE bookmark_nodes SET parent_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
            params![new_parent.0, position, Utc::now().timestamp_millis(), id.0],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_node(&mut self, id: NodeId) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        let (parent, position) = self.location(id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM bookmark_nodes WHERE id = ?1", params![id.0])?;
        tx.execute(
            "UPDATE bookmark_nodes SET position = position - 1 WHERE parent_id = ?1 AND position > ?2",
            params![parent.map(|p| p.0), position],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        self.conn.execute(
            "UPDATE bookmark_nodes SET title = ?1 WHERE id = ?2",
            params![title, id.0],
        )?;
        self.touch(id)
    }

    fn set_url(&mut self, id: NodeId, url: &str) -> Result<(), TreeError> {
        self.ensure_mutable(id)?;
        if self.node(id)?.is_folder() {
            return Err(TreeError::InvalidUrl(id));
        }
        self.conn.execute(
            "UPDATE bookmark_nodes SET url = ?1 WHERE id = ?2",
            params![url, id.0],
        )?;
        self.touch(id)
    }

    /// Every node of a managed subtree carries the `managed` flag.
    fn is_node_editable(&self, id: NodeId) -> bool {
        let managed = self
            .conn
            .query_row(
                "SELECT managed FROM bookmark_nodes WHERE id = ?1",
                params![id.0],
                |row| row.get::<_, bool>(0),
            )
            .optional();
        matches!(managed, Ok(Some(false)))
    }
}
