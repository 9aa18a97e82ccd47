//! Data models for the card sync service.
//!
//! Field names match the JSON documents the mobile app reads and writes.

mod card;
mod collection;

pub use card::*;
pub use collection::*;
