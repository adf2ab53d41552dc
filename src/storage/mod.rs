//! Storage Layer
//!
//! Handles all data persistence: JSON config and the JSON workspace file.

pub mod config;
pub mod workspace_store;

pub use config::*;
pub use workspace_store::*;
