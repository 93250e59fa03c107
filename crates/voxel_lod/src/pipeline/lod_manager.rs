//! LodManager - decides when to rebuild the render octree and hands the
//! results to the renderer.

use std::sync::Arc;

use glam::IVec3;

use super::async_builder::{AsyncOctreeBuilder, BuildStats, BuilderConfig, OctreeBuildResult};
use crate::metrics::OctreeMetrics;
use crate::octree::{ChunkId, ChunkUpdate, IntBox, Invoker, OctreeSettings, RenderOctree};

/// Consumer of chunk updates (the renderer side).
pub trait ChunkUpdateSink {
  /// Apply one build's worth of updates, sorted by ascending height.
  fn apply_chunk_updates(&mut self, updates: &[ChunkUpdate]);

  /// A build was discarded for hitting `max_chunks`; the previous LODs stay.
  ///
  /// Called once until a build succeeds again.
  fn report_too_many_chunks(&mut self, _max_chunks: usize) {}
}

impl ChunkUpdateSink for Vec<ChunkUpdate> {
  fn apply_chunk_updates(&mut self, updates: &[ChunkUpdate]) {
    self.extend_from_slice(updates);
  }
}

/// Rebuild policy of a [`LodManager`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LodManagerSettings {
  /// An invoker moving farther than this (in voxels) since the last build
  /// triggers a rebuild.
  pub invoker_distance_threshold: i32,
  /// Template for every build; its invokers are replaced by the manager's.
  pub octree: OctreeSettings,
}

impl LodManagerSettings {
  /// Default movement threshold in voxels.
  pub const DEFAULT_INVOKER_DISTANCE_THRESHOLD: i32 = 16;
}

impl Default for LodManagerSettings {
  fn default() -> Self {
    Self {
      invoker_distance_threshold: Self::DEFAULT_INVOKER_DISTANCE_THRESHOLD,
      octree: OctreeSettings::default(),
    }
  }
}

/// Drives an [`AsyncOctreeBuilder`] from the main thread.
///
/// Owns the installed octree. Call [`tick`](Self::tick) once per frame.
pub struct LodManager {
  settings: LodManagerSettings,
  builder: AsyncOctreeBuilder,
  octree: Option<Arc<RenderOctree>>,
  invokers: Vec<Invoker>,
  /// Invoker positions captured by the last build start; None before the first.
  built_positions: Option<Vec<IVec3>>,
  force_update: bool,
  warned_too_many_chunks: bool,
  metrics: OctreeMetrics,
}

impl LodManager {
  /// Create a manager with no octree yet.
  pub fn new(config: BuilderConfig, settings: LodManagerSettings) -> Self {
    Self {
      settings,
      builder: AsyncOctreeBuilder::new(config),
      octree: None,
      invokers: Vec::new(),
      built_positions: None,
      force_update: false,
      warned_too_many_chunks: false,
      metrics: OctreeMetrics::new(),
    }
  }

  /// Current rebuild policy.
  pub fn settings(&self) -> &LodManagerSettings {
    &self.settings
  }

  /// Replace the rebuild policy; the next tick rebuilds.
  pub fn set_settings(&mut self, settings: LodManagerSettings) {
    self.settings = settings;
    self.force_update = true;
  }

  /// The installed octree, if a build has succeeded.
  pub fn octree(&self) -> Option<&Arc<RenderOctree>> {
    self.octree.as_ref()
  }

  /// Collected build statistics.
  pub fn metrics(&self) -> &OctreeMetrics {
    &self.metrics
  }

  /// Check if a build is in flight.
  pub fn is_building(&self) -> bool {
    self.builder.is_busy()
  }

  /// Replace the invoker list used by upcoming builds.
  pub fn set_invokers(&mut self, invokers: Vec<Invoker>) {
    self.invokers = invokers;
  }

  /// Rebuild on the next tick even if no invoker moved.
  pub fn force_lods_update(&mut self) {
    self.force_update = true;
  }

  /// Check if the next tick should start a build.
  pub fn needs_update(&self) -> bool {
    if self.force_update {
      return true;
    }
    let Some(built_positions) = &self.built_positions else {
      return true;
    };
    if built_positions.len() != self.invokers.len() {
      return true;
    }

    let threshold = self.settings.invoker_distance_threshold as i64;
    built_positions
      .iter()
      .zip(&self.invokers)
      .any(|(built, invoker)| {
        let delta = (invoker.position - *built).as_i64vec3();
        delta.length_squared() > threshold * threshold
      })
  }

  /// Apply a finished build, then start the next one if needed.
  ///
  /// Returns the stats of the build applied this tick.
  pub fn tick(&mut self, sink: &mut impl ChunkUpdateSink) -> Option<BuildStats> {
    let applied = self.builder.poll().map(|result| self.apply_result(result, sink));

    if !self.builder.is_busy() && self.needs_update() {
      self.start_build();
    }

    applied
  }

  /// Block until the build in flight finishes and apply it.
  pub fn finish_pending(&mut self, sink: &mut impl ChunkUpdateSink) -> Option<BuildStats> {
    let result = self.builder.wait()?;
    Some(self.apply_result(result, sink))
  }

  /// Chunks to remesh after editing `bounds`.
  pub fn update_bounds(&self, bounds: &IntBox) -> Vec<ChunkId> {
    // Meshes sample one voxel past their bounds
    self
      .octree
      .as_ref()
      .map(|octree| octree.get_chunks_to_update_for_bounds(&bounds.extend(2)))
      .unwrap_or_default()
  }

  /// Chunks to remesh after editing every region in `regions`, each listed
  /// once.
  pub fn update_bounds_many(&self, regions: &[IntBox]) -> Vec<ChunkId> {
    let Some(octree) = self.octree.as_ref() else {
      return Vec::new();
    };
    let mut chunks: Vec<ChunkId> = regions
      .iter()
      .flat_map(|bounds| octree.get_chunks_to_update_for_bounds(&bounds.extend(2)))
      .collect();
    chunks.sort_unstable();
    chunks.dedup();
    chunks
  }

  /// Height of the chunk hosting collisions at `point`, if any.
  pub fn are_collisions_enabled(&self, point: IVec3) -> Option<u8> {
    self.octree.as_ref()?.collisions_at(point)
  }

  fn start_build(&mut self) {
    let settings = OctreeSettings {
      invokers: self.invokers.clone(),
      ..self.settings.octree.clone()
    };

    match self.builder.start(settings, self.octree.clone()) {
      Ok(build_id) => {
        tracing::trace!(
          build = build_id.raw(),
          invokers = self.invokers.len(),
          "octree build started"
        );
        self.built_positions = Some(self.invokers.iter().map(|invoker| invoker.position).collect());
        self.force_update = false;
      }
      Err(error) => tracing::warn!(%error, "octree build not started"),
    }
  }

  fn apply_result(
    &mut self,
    result: OctreeBuildResult,
    sink: &mut impl ChunkUpdateSink,
  ) -> BuildStats {
    let OctreeBuildResult {
      octree,
      chunk_updates,
      too_many_chunks,
      stats,
      ..
    } = result;

    self.metrics.record_build(&stats, too_many_chunks, chunk_updates.len());

    if too_many_chunks {
      let max_chunks = self.builder.config().budget.max_chunks;
      if !self.warned_too_many_chunks {
        tracing::warn!(
          max_chunks,
          "too many chunks: LOD settings too aggressive for the chunk cap, keeping previous LODs"
        );
        self.warned_too_many_chunks = true;
        sink.report_too_many_chunks(max_chunks);
      }
      return stats;
    }

    self.warned_too_many_chunks = false;
    // Release the previous generation before installing the new one
    self.octree = None;
    self.octree = octree;
    sink.apply_chunk_updates(&chunk_updates);

    if let Some(octree) = &self.octree {
      self.metrics.update_from_octree(octree);
    }
    stats
  }
}

#[cfg(test)]
#[path = "lod_manager_test.rs"]
mod lod_manager_test;
