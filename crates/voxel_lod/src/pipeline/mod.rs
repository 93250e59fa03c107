//! Render Octree Build Pipeline
//!
//! Rebuilds the render octree on rayon and hands chunk diffs to the renderer.
//!
//! ```text
//! ┌────────────┐  settings   ┌───────────────────┐  OctreeBuildResult  ┌────────────────┐
//! │ LodManager ├────────────►│ AsyncOctreeBuilder├────────────────────►│ ChunkUpdateSink│
//! └─────┬──────┘  + previous └───────────────────┘   (sorted updates)  └────────────────┘
//!       │            tree              │
//!       └──── installed tree ◄─────────┘
//! ```
//!
//! # Stages
//!
//! 1. **LodManager**: tracks invokers, decides when a rebuild is due
//! 2. **AsyncOctreeBuilder**: clones the previous tree and runs the LOD passes
//!    on a worker thread
//! 3. **ChunkUpdateSink**: receives the height-sorted diff (meshing, collisions,
//!    navmesh)
//!
//! A build that hits the node cap is discarded; the manager keeps the previous
//! tree and reports it once.

pub mod async_builder;
pub mod lod_manager;

// Test utilities
#[cfg(test)]
pub mod test_utils;


// Re-exports
pub use async_builder::{
  build_octree, AsyncOctreeBuilder, BuildId, BuildStats, BuilderConfig, OctreeBuildResult,
};
pub use lod_manager::{ChunkUpdateSink, LodManager, LodManagerSettings};
