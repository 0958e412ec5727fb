//! bookmark-sync: merges a local bookmark tree with the initial remote update
//! stream of a sync server.
//!
//! The crate exposes the merge engine and its collaborators: the identity
//! index, the change tracker, the bookmark tree accessor (in memory or backed
//! by SQLite), the favicon hook, and the metrics sink.
//!
//! ```no_run
//! use bookmark_sync::managers::bookmark_tree::InMemoryBookmarkTree;
//! use bookmark_sync::services::favicon_service::NoopFaviconService;
//! use bookmark_sync::services::merge_engine::merge;
//! use bookmark_sync::services::metrics::MergeCounters;
//! use bookmark_sync::types::settings::MergeSettings;
//!
//! let mut tree = InMemoryBookmarkTree::new();
//! let mut favicons = NoopFaviconService;
//! let mut metrics = MergeCounters::default();
//! let tracker = merge(Vec::new(), &mut tree, &mut favicons, &mut metrics, &MergeSettings::default())
//!     .expect("merge failed");
//! assert_eq!(tracker.unsynced_count(), 0);
//! ```

pub mod database;
pub mod managers;
pub mod services;
pub mod types;
