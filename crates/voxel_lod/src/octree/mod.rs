//! Render LOD octree.
//!
//! An explicit, arena-backed octree decides which chunks exist, at which LOD
//! they render, and which need collisions or navmesh. Every build produces a
//! new generation of the tree plus the list of chunk changes since the
//! previous one.
//!
//! # LOD Convention
//!
//! Height 0 = finest detail (smallest chunks), higher height = coarser. The
//! root sits at height `depth`.
//!
//! ```text
//! Node Size = chunk_size * 2^height
//! Root Bounds = [-S/2, S/2) on every axis, S = chunk_size * 2^depth
//! ```
//!
//! # Module Structure
//!
//! - [`bounds`]: `IntBox` - integer half-open boxes
//! - [`node`]: `OctreeNode` - grid position + height value type
//! - [`config`]: `OctreeGeometry`, `Invoker`, `OctreeSettings`
//! - [`budget`]: `ChunkBudget` - node-count cap
//! - [`spatial`]: `SpatialOctree` - generic arena octree
//! - [`chunk`]: chunk ids, settings and diff records
//! - [`transition`]: face directions and seam masks
//! - [`render`]: `RenderOctree` - the LOD passes

pub mod bounds;
pub mod budget;
pub mod chunk;
pub mod config;
pub mod node;
pub mod render;
pub mod spatial;
pub mod transition;

// Re-exports
pub use bounds::IntBox;
pub use budget::ChunkBudget;
pub use chunk::{ChunkId, ChunkSettings, ChunkUpdate, ChunkUpdateKind, DivisionType};
pub use config::{Invoker, OctreeGeometry, OctreeSettings, DEFAULT_CHUNK_SIZE, DEFAULT_DEPTH};
pub use node::OctreeNode;
pub use render::{RenderNode, RenderOctree};
pub use spatial::{NodeId, SpatialNode, SpatialOctree};
pub use transition::{Direction, TransitionMask};
