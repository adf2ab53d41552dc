//! Data Models
//!
//! Engine-level data structures. The project data model lives in
//! `prompt_forge_core`.

pub mod settings;

pub use settings::*;
