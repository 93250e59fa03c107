//! Engine-agnostic statistics about render octree builds.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use voxel_lod::metrics::{OctreeMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // After each completed build:
//! metrics.record_build(&result.stats, result.too_many_chunks, result.chunk_updates.len());
//! metrics.update_from_octree(&octree);
//! ```

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

use crate::octree::RenderOctree;
use crate::pipeline::BuildStats;

/// Number of heights tracked by the per-height histograms.
pub const MAX_TRACKED_HEIGHTS: usize = 32;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
    #[cfg(feature = "metrics")]
    {
        COLLECT_METRICS.load(Ordering::Relaxed)
    }
    #[cfg(not(feature = "metrics"))]
    {
        false
    }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Create a new rolling window with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a new value, evicting the oldest if at capacity.
    pub fn push(&mut self, value: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(value);
    }

    /// Get the number of values in the window.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the window is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear all values.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Iterate over values (oldest to newest).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Get the most recent value.
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

impl RollingWindow<u64> {
    /// Compute the average of all values.
    pub fn average(&self) -> f64 {
        if self.buffer.is_empty() {
            0.0
        } else {
            self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
        }
    }

    /// Get min and max values.
    pub fn min_max(&self) -> Option<(u64, u64)> {
        let min = *self.buffer.iter().min()?;
        let max = *self.buffer.iter().max()?;
        Some((min, max))
    }
}

impl Default for RollingWindow<u64> {
    fn default() -> Self {
        Self::new(64) // Builds are rare compared to frames
    }
}

/// Statistics over recent render octree builds.
#[derive(Debug, Clone)]
pub struct OctreeMetrics {
    // Octree snapshot
    /// Count of visible chunks at each height (index = height).
    pub visible_per_height: [u32; MAX_TRACKED_HEIGHTS],
    /// Number of currently visible chunks.
    pub visible_chunks: u32,
    /// Number of chunks hosting collisions.
    pub collision_chunks: u32,
    /// Number of chunks hosting navmesh.
    pub navmesh_chunks: u32,
    /// Live nodes in the installed octree.
    pub node_count: usize,

    // Timing
    /// Rolling window of total build times in microseconds.
    pub build_timings: RollingWindow<u64>,
    /// Rolling window of neighbor pass times in microseconds.
    pub neighbor_timings: RollingWindow<u64>,

    // Counters
    /// Last build time in microseconds.
    pub last_build_us: u64,
    /// Completed builds this session.
    pub total_builds: u64,
    /// Builds discarded for hitting the node cap.
    pub too_many_chunks_builds: u64,
    /// Chunk updates delivered this session.
    pub total_chunk_updates: u64,
}

impl Default for OctreeMetrics {
    fn default() -> Self {
        Self {
            visible_per_height: [0; MAX_TRACKED_HEIGHTS],
            visible_chunks: 0,
            collision_chunks: 0,
            navmesh_chunks: 0,
            node_count: 0,
            build_timings: RollingWindow::default(),
            neighbor_timings: RollingWindow::default(),
            last_build_us: 0,
            total_builds: 0,
            too_many_chunks_builds: 0,
            total_chunk_updates: 0,
        }
    }
}

impl OctreeMetrics {
    /// Create new metrics with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the snapshot and timings, keeping cumulative counters.
    pub fn reset(&mut self) {
        self.visible_per_height.fill(0);
        self.visible_chunks = 0;
        self.collision_chunks = 0;
        self.navmesh_chunks = 0;
        self.node_count = 0;
        self.build_timings.clear();
        self.neighbor_timings.clear();
        self.last_build_us = 0;
    }

    /// Record a completed build.
    pub fn record_build(&mut self, stats: &BuildStats, too_many_chunks: bool, update_count: usize) {
        if !is_enabled() {
            return;
        }

        self.build_timings.push(stats.total_us);
        self.neighbor_timings.push(stats.neighbors_us);
        self.last_build_us = stats.total_us;
        self.total_builds += 1;
        if too_many_chunks {
            self.too_many_chunks_builds += 1;
        }
        self.total_chunk_updates += update_count as u64;
    }

    /// Refresh the snapshot from the installed octree.
    pub fn update_from_octree(&mut self, octree: &RenderOctree) {
        if !is_enabled() {
            return;
        }

        self.visible_per_height.fill(0);
        self.visible_chunks = 0;
        self.collision_chunks = 0;
        self.navmesh_chunks = 0;
        self.node_count = octree.chunk_count();

        for node in octree.nodes() {
            let settings = node.data.settings;
            if settings.visible {
                let height = (node.height() as usize).min(MAX_TRACKED_HEIGHTS - 1);
                self.visible_per_height[height] += 1;
                self.visible_chunks += 1;
            }
            self.collision_chunks += settings.enable_collisions as u32;
            self.navmesh_chunks += settings.enable_navmesh as u32;
        }
    }

    /// Get average build timing in microseconds.
    pub fn avg_build_timing_us(&self) -> f64 {
        self.build_timings.average()
    }
}
