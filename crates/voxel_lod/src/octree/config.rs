//! Octree geometry and per-build LOD settings.

use glam::IVec3;

use super::{IntBox, OctreeNode};
use crate::error::LodError;

/// Default chunk size in voxels (size of a height-0 node).
pub const DEFAULT_CHUNK_SIZE: i32 = 32;

/// Default octree depth (height of the root).
pub const DEFAULT_DEPTH: u8 = 10;

/// Largest supported root size, as a power of two, so that every node bound
/// and neighbor probe fits in `i32` voxel coordinates.
const MAX_ROOT_SIZE_LOG2: u32 = 30;

/// Shape of a render octree: chunk size and depth.
///
/// The root is centered on the origin and spans `[-S/2, S/2)` on every axis,
/// with `S = chunk_size << depth`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OctreeGeometry {
  chunk_size: i32,
  depth: u8,
}

impl OctreeGeometry {
  /// Create a geometry, validating chunk size and depth.
  pub fn new(chunk_size: i32, depth: u8) -> Result<Self, LodError> {
    if chunk_size < 4 || !(chunk_size as u32).is_power_of_two() {
      return Err(LodError::InvalidChunkSize(chunk_size));
    }
    if depth == 0 || (chunk_size as u32).trailing_zeros() + depth as u32 > MAX_ROOT_SIZE_LOG2 {
      return Err(LodError::InvalidDepth { depth, chunk_size });
    }
    Ok(Self { chunk_size, depth })
  }

  /// Size of a height-0 node in voxels.
  #[inline]
  pub fn chunk_size(&self) -> i32 {
    self.chunk_size
  }

  /// Height of the root node.
  #[inline]
  pub fn depth(&self) -> u8 {
    self.depth
  }

  /// Node size at the given height.
  /// size = chunk_size * 2^height
  #[inline]
  pub fn node_size(&self, height: u8) -> i32 {
    self.chunk_size << height
  }

  /// Minimum corner of the root.
  #[inline]
  pub fn root_min(&self) -> IVec3 {
    IVec3::splat(-self.node_size(self.depth) / 2)
  }

  /// Bounds of the root node.
  pub fn root_bounds(&self) -> IntBox {
    let min = self.root_min();
    IntBox::new(min, min + IVec3::splat(self.node_size(self.depth)))
  }

  /// Voxel-space bounds of a node.
  pub fn node_bounds(&self, node: &OctreeNode) -> IntBox {
    let size = self.node_size(node.height);
    let min = self.root_min() + IVec3::new(node.x, node.y, node.z) * size;
    IntBox::new(min, min + IVec3::splat(size))
  }

  /// The node of the given height containing `point`, if inside the root.
  pub fn node_at(&self, point: IVec3, height: u8) -> Option<OctreeNode> {
    if height > self.depth || !self.root_bounds().contains_point(point) {
      return None;
    }
    let cell = (point - self.root_min()) / self.node_size(height);
    Some(OctreeNode::new(cell.x, cell.y, cell.z, height))
  }
}

impl Default for OctreeGeometry {
  fn default() -> Self {
    Self {
      chunk_size: DEFAULT_CHUNK_SIZE,
      depth: DEFAULT_DEPTH,
    }
  }
}

/// A point of interest driving subdivision: LOD, collisions and navmesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invoker {
  /// Position in voxel space.
  pub position: IVec3,

  /// Whether this invoker drives render LODs.
  pub use_for_lod: bool,
  /// Nodes intersecting `lod_bounds` subdivide down to this height.
  pub lod_to_set: u8,
  /// Region where `lod_to_set` applies.
  pub lod_bounds: IntBox,

  /// Whether this invoker requests collision chunks.
  pub use_for_collisions: bool,
  /// Region needing height-0 collision chunks.
  pub collisions_bounds: IntBox,

  /// Whether this invoker requests navmesh chunks.
  pub use_for_navmesh: bool,
  /// Region needing height-0 navmesh chunks.
  pub navmesh_bounds: IntBox,
}

impl Invoker {
  /// Invoker at `position` that drives nothing yet.
  pub fn new(position: IVec3) -> Self {
    let point = IntBox::from_point(position);
    Self {
      position,
      use_for_lod: false,
      lod_to_set: 0,
      lod_bounds: point,
      use_for_collisions: false,
      collisions_bounds: point,
      use_for_navmesh: false,
      navmesh_bounds: point,
    }
  }

  /// Subdivide down to `lod_to_set` within `radius` voxels.
  pub fn with_lod(mut self, lod_to_set: u8, radius: i32) -> Self {
    self.use_for_lod = true;
    self.lod_to_set = lod_to_set;
    self.lod_bounds = IntBox::from_center_radius(self.position, radius);
    self
  }

  /// Subdivide down to `lod_to_set` within explicit bounds.
  pub fn with_lod_bounds(mut self, lod_to_set: u8, bounds: IntBox) -> Self {
    self.use_for_lod = true;
    self.lod_to_set = lod_to_set;
    self.lod_bounds = bounds;
    self
  }

  /// Request collision chunks within `radius` voxels.
  pub fn with_collisions(mut self, radius: i32) -> Self {
    self.use_for_collisions = true;
    self.collisions_bounds = IntBox::from_center_radius(self.position, radius);
    self
  }

  /// Request navmesh chunks within `radius` voxels.
  pub fn with_navmesh(mut self, radius: i32) -> Self {
    self.use_for_navmesh = true;
    self.navmesh_bounds = IntBox::from_center_radius(self.position, radius);
    self
  }

  /// Move the invoker, translating all of its bounds with it.
  pub fn moved_to(mut self, position: IVec3) -> Self {
    let delta = position - self.position;
    self.position = position;
    for bounds in [
      &mut self.lod_bounds,
      &mut self.collisions_bounds,
      &mut self.navmesh_bounds,
    ] {
      *bounds = IntBox::new(bounds.min + delta, bounds.max + delta);
    }
    self
  }
}

/// Snapshot of everything one octree build reads.
///
/// Captured by value when a build starts so the caller can keep mutating its
/// own invoker list while the worker runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OctreeSettings {
  /// Nodes outside these bounds never subdivide nor render.
  pub world_bounds: IntBox,
  /// Points of interest for this build.
  pub invokers: Vec<Invoker>,

  /// Nodes at or below this height never subdivide by distance.
  pub min_lod: u8,
  /// Nodes above this height always subdivide.
  pub max_lod: u8,
  /// Nodes above this height are never visible.
  pub chunks_culling_lod: u8,

  /// Master switch for render chunks.
  pub enable_render: bool,

  /// Master switch for collision chunks.
  pub enable_collisions: bool,
  /// Visible chunks also get collisions, up to `visible_chunks_collisions_max_lod`.
  pub compute_visible_chunks_collisions: bool,
  /// Coarsest height receiving visible-chunk collisions.
  pub visible_chunks_collisions_max_lod: u8,

  /// Master switch for navmesh chunks.
  pub enable_navmesh: bool,
  /// Visible chunks also get navmesh, up to `visible_chunks_navmesh_max_lod`.
  pub compute_visible_chunks_navmesh: bool,
  /// Coarsest height receiving visible-chunk navmesh.
  pub visible_chunks_navmesh_max_lod: u8,

  /// Compute transition masks for visible chunks.
  pub enable_transitions: bool,
  /// Flag the coarser side of a LOD seam instead of the finer side.
  pub invert_transitions: bool,
}

impl OctreeSettings {
  /// Settings with the given world bounds and invokers, defaults elsewhere.
  pub fn new(world_bounds: IntBox, invokers: Vec<Invoker>) -> Self {
    Self {
      world_bounds,
      invokers,
      ..Default::default()
    }
  }

  /// Check if any invoker selected by `select` has bounds intersecting `bounds`.
  #[inline]
  pub(crate) fn any_invoker_in_range(
    &self,
    bounds: &IntBox,
    select: impl Fn(&Invoker) -> Option<&IntBox>,
  ) -> bool {
    self
      .invokers
      .iter()
      .filter_map(|invoker| select(invoker))
      .any(|range| range.intersects(bounds))
  }
}

impl Default for OctreeSettings {
  fn default() -> Self {
    Self {
      world_bounds: IntBox::INFINITE,
      invokers: Vec::new(),
      min_lod: 0,
      max_lod: 30,
      chunks_culling_lod: 30,
      enable_render: true,
      enable_collisions: false,
      compute_visible_chunks_collisions: false,
      visible_chunks_collisions_max_lod: 0,
      enable_navmesh: false,
      compute_visible_chunks_navmesh: false,
      visible_chunks_navmesh_max_lod: 0,
      enable_transitions: true,
      invert_transitions: false,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
