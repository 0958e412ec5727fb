// bookmark-sync shared type definitions
// Each submodule defines plain data types used across managers and services.

pub mod bookmark;
pub mod errors;
pub mod metrics;
pub mod position;
pub mod settings;
pub mod tracker;
pub mod update;
