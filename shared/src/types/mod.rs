//! Core data model

pub mod endpoint;
pub mod toggle;
