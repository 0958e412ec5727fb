use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UUID of the invisible tree root. Never synced.
pub const ROOT_NODE_UUID: Uuid = Uuid::from_u128(0x00000000_0000_4000_a000_000000000001);

/// Server tag of the bookmark type root. The server sends it but it is never merged.
pub const ROOT_SERVER_TAG: &str = "google_chrome_bookmarks";

/// Local handle of a bookmark node. Stable for the lifetime of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fixed folders directly under the tree root that sync knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentFolder {
    BookmarkBar,
    OtherBookmarks,
    MobileBookmarks,
}

impl PermanentFolder {
    pub const ALL: [PermanentFolder; 3] = [
        PermanentFolder::BookmarkBar,
        PermanentFolder::OtherBookmarks,
        PermanentFolder::MobileBookmarks,
    ];

    /// Server-defined unique tag identifying this folder in the update stream.
    pub fn server_tag(self) -> &'static str {
        match self {
            PermanentFolder::BookmarkBar => "bookmark_bar",
            PermanentFolder::OtherBookmarks => "other_bookmarks",
            PermanentFolder::MobileBookmarks => "synced_bookmarks",
        }
    }

    pub fn from_server_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|folder| folder.server_tag() == tag)
    }

    /// Well-known UUID shared by every client.
    pub fn uuid(self) -> Uuid {
        match self {
            PermanentFolder::BookmarkBar => Uuid::from_u128(0x00000000_0000_4000_a000_000000000002),
            PermanentFolder::OtherBookmarks => {
                Uuid::from_u128(0x00000000_0000_4000_a000_000000000003)
            }
            PermanentFolder::MobileBookmarks => {
                Uuid::from_u128(0x00000000_0000_4000_a000_000000000004)
            }
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            PermanentFolder::BookmarkBar => "Bookmarks bar",
            PermanentFolder::OtherBookmarks => "Other bookmarks",
            PermanentFolder::MobileBookmarks => "Mobile bookmarks",
        }
    }
}

impl fmt::Display for PermanentFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.server_tag())
    }
}

/// A node of the local bookmark tree as seen through the accessor.
///
/// A node is a folder exactly when it has no URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkNode {
    pub id: NodeId,
    pub uuid: Uuid,
    pub parent: Option<NodeId>,
    pub title: String,
    pub url: Option<String>,
    pub permanent: Option<PermanentFolder>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookmarkNode {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }

    /// True for the root and the permanent folders.
    pub fn is_permanent(&self) -> bool {
        self.permanent.is_some() || self.parent.is_none()
    }
}

/// Data needed to create a node. The accessor assigns the [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub uuid: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNode {
    pub fn folder(uuid: Uuid, title: impl Into<String>) -> Self {
        Self {
            uuid,
            title: title.into(),
            url: None,
            created_at: Utc::now(),
        }
    }

    pub fn bookmark(uuid: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            uuid,
            title: title.into(),
            url: Some(url.into()),
            created_at: Utc::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
