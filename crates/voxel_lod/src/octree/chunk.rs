//! Chunk identity, chunk state and the diff records sent to the renderer.

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::{IntBox, TransitionMask};

/// Process-unique chunk identifier.
///
/// Minted when a node is created and copied when a tree is cloned for the next
/// build, so the same logical chunk keeps its id across generations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ChunkId(u64);

impl ChunkId {
  pub(crate) fn next() -> Self {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    Self(COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

/// Why a node is subdivided in the current build.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum DivisionType {
  /// Not subdivided (or not decided yet this build).
  #[default]
  Uninitialized,
  /// Close enough to an invoker to need finer chunks.
  ByDistance,
  /// A neighbor is more than one level finer.
  ByNeighbors,
  /// Needed at height 0 for collisions or navmesh only.
  ByOthers,
}

impl DivisionType {
  /// Visible parents hand visibility to their children.
  #[inline]
  pub fn is_visible_parent(self) -> bool {
    matches!(self, DivisionType::ByDistance | DivisionType::ByNeighbors)
  }
}

/// Observable state of a chunk, diffed between builds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ChunkSettings {
  /// Rendered with a mesh.
  pub visible: bool,
  /// Hosts collision geometry.
  pub enable_collisions: bool,
  /// Hosts navmesh geometry.
  pub enable_navmesh: bool,
  /// Faces needing seam geometry.
  pub transitions_mask: TransitionMask,
}

impl ChunkSettings {
  /// Settings of a plain visible chunk.
  pub fn visible() -> Self {
    Self {
      visible: true,
      ..Default::default()
    }
  }

  /// Does this chunk need any geometry at all?
  #[inline]
  pub fn has_render_chunk(&self) -> bool {
    self.visible || self.enable_collisions || self.enable_navmesh
  }
}

/// What a [`ChunkUpdate`] asks the renderer to do.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ChunkUpdateKind {
  /// Create the chunk.
  Add,
  /// Change an existing chunk.
  Update,
  /// Destroy the chunk.
  Remove,
}

/// One entry of the diff between two octree generations.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChunkUpdate {
  /// Chunk identity.
  pub chunk_id: ChunkId,
  /// Node height (0 = finest).
  pub height: u8,
  /// Node bounds in voxel space.
  pub bounds: IntBox,
  /// Settings in the previous generation.
  pub old_settings: ChunkSettings,
  /// Settings in the new generation; None if the node was destroyed.
  pub new_settings: Option<ChunkSettings>,
  /// Chunks of the previous generation that were visible over `bounds`,
  /// filled when this update makes the chunk visible.
  pub previous_visible_chunks: SmallVec<[ChunkId; 8]>,
}

impl ChunkUpdate {
  /// Classify this update.
  pub fn kind(&self) -> ChunkUpdateKind {
    let old = self.old_settings.has_render_chunk();
    let new = self.new_settings.is_some_and(|s| s.has_render_chunk());
    match (old, new) {
      (false, _) => ChunkUpdateKind::Add,
      (true, true) => ChunkUpdateKind::Update,
      (true, false) => ChunkUpdateKind::Remove,
    }
  }

  /// Settings after this update (default if destroyed).
  pub fn settings(&self) -> ChunkSettings {
    self.new_settings.unwrap_or_default()
  }

  /// Does this update turn an invisible chunk visible?
  pub fn becomes_visible(&self) -> bool {
    !self.old_settings.visible && self.settings().visible
  }
}
