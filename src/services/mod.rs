// bookmark-sync services
// Services hold the merge algorithm and the hooks it reports to: specifics validation,
// identity index, merge engine, favicons, metrics and settings.

pub mod favicon_service;
pub mod identity_index;
pub mod merge_engine;
pub mod metrics;
pub mod settings_engine;
pub mod specifics;
