//! Test utilities for octree and pipeline tests.
//!
//! Provides fixture builders, a synchronous pass runner and invariant
//! checkers shared by the octree and pipeline test suites.

use std::collections::HashMap;
use std::time::Duration;

use glam::IVec3;

use super::async_builder::{run_passes, BuildStats};
use super::lod_manager::ChunkUpdateSink;
use crate::octree::{
  ChunkId, ChunkSettings, ChunkUpdate, Direction, Invoker, OctreeGeometry, OctreeNode,
  OctreeSettings, RenderNode, RenderOctree, SpatialNode,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Geometry from known-good parameters.
pub fn geometry(chunk_size: i32, depth: u8) -> OctreeGeometry {
  OctreeGeometry::new(chunk_size, depth).unwrap()
}

/// Invoker subdividing down to `lod` within `radius` voxels of `position`.
pub fn lod_invoker(position: IVec3, lod: u8, radius: i32) -> Invoker {
  Invoker::new(position).with_lod(lod, radius)
}

/// Default settings with the given invokers.
pub fn settings_with(invokers: Vec<Invoker>) -> OctreeSettings {
  OctreeSettings {
    invokers,
    ..Default::default()
  }
}

/// Run every pass on `octree` in place, returning the unsorted updates.
pub fn rebuild(
  octree: &mut RenderOctree,
  settings: &OctreeSettings,
) -> (Vec<ChunkUpdate>, BuildStats) {
  let mut stats = BuildStats::default();
  let updates = run_passes(octree, settings, &mut stats);
  (updates, stats)
}

/// Poll `f` with short sleeps until it yields, panicking after ~5s.
pub fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> T {
  for _ in 0..5000 {
    if let Some(value) = f() {
      return value;
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  panic!("timed out waiting for async result");
}

// =============================================================================
// Inspection
// =============================================================================

/// Chunk id of every live node, by key.
pub fn chunk_ids(octree: &RenderOctree) -> HashMap<OctreeNode, ChunkId> {
  octree
    .nodes()
    .map(|node| (node.key(), node.data.chunk_id))
    .collect()
}

/// Settings of every node that has a render chunk.
pub fn rendered_chunks(octree: &RenderOctree) -> HashMap<ChunkId, ChunkSettings> {
  octree
    .nodes()
    .filter(|node| node.data.settings.has_render_chunk())
    .map(|node| (node.data.chunk_id, node.data.settings))
    .collect()
}

/// The node at `min` with the given height.
pub fn node_at(octree: &RenderOctree, min: IVec3, height: u8) -> &SpatialNode<RenderNode> {
  octree
    .nodes()
    .find(|node| node.bounds().min == min && node.height() == height)
    .unwrap_or_else(|| panic!("no node at {min} with height {height}"))
}

/// Pairs of face-adjacent final chunks more than one level apart.
///
/// Probes the 4 child-sized cells across every face of every visible chunk
/// inside the world, descending through visible parents only.
pub fn neighbor_violations(
  octree: &RenderOctree,
  settings: &OctreeSettings,
) -> Vec<(OctreeNode, OctreeNode)> {
  let tree = octree.tree();
  let mut violations = Vec::new();

  for node in octree.visible_chunks() {
    let half = node.size() / 2;
    let quarter = node.size() / 4;
    let center = node.bounds().min + IVec3::splat(half);

    let cells = [
      (quarter, quarter),
      (-quarter, quarter),
      (quarter, -quarter),
      (-quarter, -quarter),
    ];
    for direction in Direction::ALL {
      for (u, v) in cells {
        let probe = center + direction.offset(half + quarter, u, v);
        let visible_parent = |other: &SpatialNode<RenderNode>| other.data.division_type.is_visible_parent();
        let Some(adjacent) = tree.descend(probe, visible_parent) else {
          continue;
        };
        let adjacent = tree.node(adjacent);
        if !adjacent.bounds().intersects(&settings.world_bounds) {
          continue;
        }
        if adjacent.height().abs_diff(node.height()) > 1 {
          violations.push((node.key(), adjacent.key()));
        }
      }
    }
  }
  violations
}

/// Visible chunks lying entirely outside the world bounds.
pub fn visible_outside_world(octree: &RenderOctree, settings: &OctreeSettings) -> usize {
  octree
    .visible_chunks()
    .filter(|node| !node.bounds().intersects(&settings.world_bounds))
    .count()
}

/// Check that updates are sorted by ascending height.
pub fn is_sorted_by_height(updates: &[ChunkUpdate]) -> bool {
  updates.windows(2).all(|pair| pair[0].height <= pair[1].height)
}

// =============================================================================
// Mirror sink
// =============================================================================

/// Sink replaying updates into a map, as a renderer would.
#[derive(Default)]
pub struct MirrorSink {
  /// Rendered chunks after every applied update.
  pub chunks: HashMap<ChunkId, ChunkSettings>,
  /// Number of `apply_chunk_updates` calls.
  pub batches: usize,
  /// Number of `report_too_many_chunks` calls.
  pub too_many_chunks_reports: usize,
}

impl MirrorSink {
  /// Apply one build's raw updates in height order.
  pub fn replay(&mut self, mut updates: Vec<ChunkUpdate>) {
    updates.sort_by_key(|update| update.height);
    self.apply_chunk_updates(&updates);
  }
}

impl ChunkUpdateSink for MirrorSink {
  fn apply_chunk_updates(&mut self, updates: &[ChunkUpdate]) {
    assert!(is_sorted_by_height(updates));

    for update in updates {
      // Previous visible chunks come from the generation being replaced
      for previous in &update.previous_visible_chunks {
        let settings = self.chunks.get(previous);
        assert!(settings.is_some_and(|settings| settings.visible));
      }
    }

    for update in updates {
      assert_eq!(
        self.chunks.get(&update.chunk_id).copied().unwrap_or_default(),
        update.old_settings
      );
      let settings = update.settings();
      if settings.has_render_chunk() {
        self.chunks.insert(update.chunk_id, settings);
      } else {
        self.chunks.remove(&update.chunk_id);
      }
    }
    self.batches += 1;
  }

  fn report_too_many_chunks(&mut self, _max_chunks: usize) {
    self.too_many_chunks_reports += 1;
  }
}
