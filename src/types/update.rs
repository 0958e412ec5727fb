use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::bookmark::PermanentFolder;

/// Bookmark payload of a remote update, as sent over the wire.
///
/// UUID fields are kept as text: the server may send empty or malformed values
/// and validation decides what to do with them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookmarkSpecifics {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: String,
    /// Title in the legacy form: truncated and with server-illegal names padded.
    #[serde(default)]
    pub legacy_canonicalized_title: String,
    #[serde(default)]
    pub full_title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub unique_position: Vec<u8>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub favicon: Option<Vec<u8>>,
}

/// One record of the initial remote update stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRecord {
    pub server_id: String,
    /// Set only for permanent folders and the type root.
    #[serde(default)]
    pub server_tag: Option<String>,
    #[serde(default)]
    pub originator_client_item_id: Option<String>,
    pub specifics: BookmarkSpecifics,
    pub creation_time: DateTime<Utc>,
    /// The server filled in the position on behalf of a legacy client.
    #[serde(default)]
    pub position_backfilled: bool,
    /// Entity predates client tags and must be re-created under a new identity.
    #[serde(default)]
    pub requires_migration: bool,
}

impl UpdateRecord {
    /// Record announcing a permanent folder.
    pub fn permanent_folder(folder: PermanentFolder) -> Self {
        Self {
            server_id: format!("{}_server_id", folder.server_tag()),
            server_tag: Some(folder.server_tag().to_string()),
            originator_client_item_id: None,
            specifics: BookmarkSpecifics {
                uuid: folder.uuid().to_string(),
                legacy_canonicalized_title: folder.default_title().to_string(),
                is_folder: true,
                ..BookmarkSpecifics::default()
            },
            creation_time: DateTime::<Utc>::UNIX_EPOCH,
            position_backfilled: false,
            requires_migration: false,
        }
    }

    pub fn folder(uuid: Uuid, parent_uuid: Uuid, title: &str, position: Vec<u8>) -> Self {
        Self::entity(uuid, parent_uuid, title, None, position)
    }

    pub fn bookmark(
        uuid: Uuid,
        parent_uuid: Uuid,
        title: &str,
        url: &str,
        position: Vec<u8>,
    ) -> Self {
        Self::entity(uuid, parent_uuid, title, Some(url.to_string()), position)
    }

    fn entity(
        uuid: Uuid,
        parent_uuid: Uuid,
        title: &str,
        url: Option<String>,
        position: Vec<u8>,
    ) -> Self {
        Self {
            server_id: format!("server_{}", uuid.simple()),
            server_tag: None,
            originator_client_item_id: Some(uuid.to_string()),
            specifics: BookmarkSpecifics {
                uuid: uuid.to_string(),
                parent_uuid: parent_uuid.to_string(),
                legacy_canonicalized_title: crate::services::specifics::legacy_canonicalized_title(
                    title,
                    crate::types::settings::DEFAULT_TITLE_MAX_BYTES,
                ),
                full_title: Some(title.to_string()),
                is_folder: url.is_none(),
                url,
                unique_position: position,
                icon_url: None,
                favicon: None,
            },
            creation_time: Utc::now(),
            position_backfilled: false,
            requires_migration: false,
        }
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = server_id.into();
        self
    }

    pub fn with_creation_time(mut self, creation_time: DateTime<Utc>) -> Self {
        self.creation_time = creation_time;
        self
    }

    pub fn with_favicon(mut self, icon_url: Option<&str>, favicon: Vec<u8>) -> Self {
        self.specifics.icon_url = icon_url.map(str::to_string);
        self.specifics.favicon = Some(favicon);
        self
    }

    /// Drops the full title, as legacy clients do.
    pub fn with_legacy_title_only(mut self, legacy_title: &str) -> Self {
        self.specifics.full_title = None;
        self.specifics.legacy_canonicalized_title = legacy_title.to_string();
        self
    }
}
