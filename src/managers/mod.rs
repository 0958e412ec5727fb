// bookmark-sync state managers
// Managers own mutable state: the local bookmark tree (in memory or SQLite) and the change tracker.

pub mod bookmark_tree;
pub mod change_tracker;
pub mod sqlite_tree;
