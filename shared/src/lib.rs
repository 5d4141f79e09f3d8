//! Shared types and utilities for Shutter
//!
//! This crate contains the data model exchanged between the coordinator,
//! the per-process agents, and the CLI: endpoints, toggle requests,
//! per-endpoint outcomes and aggregated round results.

pub mod error;
pub mod naming;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::ToggleError;
pub use types::{endpoint::*, toggle::*};
