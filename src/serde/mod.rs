//! Serde helpers for configuration types.

pub mod duration;
pub mod hash_map;
