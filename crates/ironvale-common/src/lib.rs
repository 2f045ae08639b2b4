//! # Ironvale Common
//!
//! Common types shared by the Ironvale simulation crates:
//! - ID types (EntityId, SpawnPointId, LootTableId, ItemTypeId)
//! - World positions and planar movement helpers
//! - Simulation clock timestamps
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;
pub mod time;

pub use glam::Vec3;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::time::*;
    pub use glam::Vec3;
}

pub use prelude::*;
