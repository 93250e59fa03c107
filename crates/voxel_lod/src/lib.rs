//! voxel_lod - Framework/engine independent render LOD octree for voxel worlds
//!
//! This crate decides which cubic regions of a voxel world are rendered at
//! which resolution. A render octree is rebuilt off the main thread whenever
//! the points of interest ("invokers") move, and every rebuild produces a
//! minimal, height-sorted diff of chunk create/update/delete operations.
//!
//! # Features
//!
//! - **Distance LODs**: chunks near invokers subdivide down to the requested
//!   height
//! - **Neighbor Consistency**: adjacent visible chunks never differ by more
//!   than one LOD level
//! - **Transition Masks**: per-face seam flags for LOD boundaries
//! - **Collisions / Navmesh**: height-0 chunks where invokers need them
//! - **Node Cap**: builds that would grow past a node budget are discarded,
//!   keeping the last good tree
//!
//! # Example
//!
//! ```ignore
//! use voxel_lod::{BuilderConfig, Invoker, LodManager, LodManagerSettings};
//!
//! let mut manager = LodManager::new(BuilderConfig::default(), LodManagerSettings::default());
//! manager.set_invokers(vec![Invoker::new(player_pos).with_lod(0, 256)]);
//!
//! // Each frame
//! manager.tick(&mut renderer);
//! ```

pub mod error;
pub use error::LodError;

// Render LOD octree
pub mod octree;
pub use octree::{
  ChunkBudget, ChunkId, ChunkSettings, ChunkUpdate, ChunkUpdateKind, IntBox, Invoker,
  OctreeGeometry, OctreeSettings, RenderOctree, TransitionMask,
};

// Async build pipeline
pub mod pipeline;
pub use pipeline::{
  build_octree, AsyncOctreeBuilder, BuildId, BuildStats, BuilderConfig, ChunkUpdateSink,
  LodManager, LodManagerSettings, OctreeBuildResult,
};

// Build statistics
pub mod metrics;
pub use metrics::OctreeMetrics;
