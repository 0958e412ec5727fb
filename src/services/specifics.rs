//! Validation of remote bookmark payloads and the legacy title rules.
//!
//! Legacy clients store titles truncated to a byte limit, and pad the names
//! the server rejects ("", ".", "..", optionally followed by spaces) with one
//! extra space. Titles are compared in that canonical form.

use url::Url;
use uuid::Uuid;

use crate::services::identity_index::RemoteEntity;
use crate::types::bookmark::{PermanentFolder, ROOT_NODE_UUID};
use crate::types::metrics::RemoteUpdateError;
use crate::types::position::PositionKey;
use crate::types::update::{BookmarkSpecifics, UpdateRecord};

/// True for names the server refuses once trailing spaces are trimmed.
pub fn is_name_server_illegal_after_trimming(name: &str) -> bool {
    matches!(name.trim_end_matches(' '), "" | "." | "..")
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Converts a full title into the legacy form.
pub fn legacy_canonicalized_title(title: &str, max_bytes: usize) -> String {
    let padded = if is_name_server_illegal_after_trimming(title) {
        format!("{} ", title)
    } else {
        title.to_string()
    };
    truncate_utf8(&padded, max_bytes).to_string()
}

/// Title to show locally. Prefers the full title; otherwise undoes the
/// padding of the legacy title.
pub fn title_from_specifics(specifics: &BookmarkSpecifics) -> String {
    if let Some(full_title) = &specifics.full_title {
        return full_title.clone();
    }
    let legacy = &specifics.legacy_canonicalized_title;
    match legacy.strip_suffix(' ') {
        Some(stripped) if is_name_server_illegal_after_trimming(legacy) => stripped.to_string(),
        _ => legacy.clone(),
    }
}

/// Whether two titles are equal in their legacy canonical form.
pub fn titles_match(local: &str, remote: &str, max_bytes: usize) -> bool {
    legacy_canonicalized_title(local, max_bytes) == legacy_canonicalized_title(remote, max_bytes)
}

fn is_reserved_uuid(uuid: &Uuid) -> bool {
    *uuid == ROOT_NODE_UUID || PermanentFolder::ALL.iter().any(|folder| folder.uuid() == *uuid)
}

/// Resolves the entity UUID. An empty payload UUID is inferred from the
/// originator client item id; the flag in the result reports inference.
pub fn resolve_uuid(record: &UpdateRecord) -> Result<(Uuid, bool), RemoteUpdateError> {
    let originator = record
        .originator_client_item_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok());

    if record.specifics.uuid.is_empty() {
        return originator
            .map(|uuid| (uuid, true))
            .ok_or(RemoteUpdateError::InvalidSpecifics);
    }

    let uuid =
        Uuid::parse_str(&record.specifics.uuid).map_err(|_| RemoteUpdateError::InvalidSpecifics)?;
    if originator.is_some_and(|originator| originator != uuid) {
        return Err(RemoteUpdateError::UnexpectedUuid);
    }
    Ok((uuid, false))
}

/// Validates a non-permanent update record and turns it into a remote entity.
pub fn validate_update(
    arrival: usize,
    record: UpdateRecord,
) -> Result<RemoteEntity, RemoteUpdateError> {
    let (uuid, uuid_inferred) = resolve_uuid(&record)?;
    if is_reserved_uuid(&uuid) {
        return Err(RemoteUpdateError::InvalidSpecifics);
    }
    let parent_uuid = Uuid::parse_str(&record.specifics.parent_uuid)
        .map_err(|_| RemoteUpdateError::InvalidSpecifics)?;

    let specifics = &record.specifics;
    let url = match (specifics.is_folder, specifics.url.as_deref()) {
        (true, None) => None,
        (true, Some(_)) => return Err(RemoteUpdateError::InvalidSpecifics),
        (false, Some(url)) => {
            Url::parse(url).map_err(|_| RemoteUpdateError::InvalidSpecifics)?;
            Some(url.to_string())
        }
        (false, None) => return Err(RemoteUpdateError::InvalidSpecifics),
    };

    let position = PositionKey::from_bytes(specifics.unique_position.clone())
        .ok_or(RemoteUpdateError::InvalidUniquePosition)?;

    let title = title_from_specifics(specifics);
    let favicon = specifics.favicon.clone().filter(|bytes| !bytes.is_empty());
    let icon_url = specifics.icon_url.clone();

    Ok(RemoteEntity {
        arrival,
        uuid,
        parent_uuid: Some(parent_uuid),
        title,
        url,
        position: Some(position),
        icon_url,
        favicon,
        permanent: None,
        uuid_inferred,
        server_id: record.server_id,
        creation_time: record.creation_time,
        position_backfilled: record.position_backfilled,
        requires_migration: record.requires_migration,
    })
}
