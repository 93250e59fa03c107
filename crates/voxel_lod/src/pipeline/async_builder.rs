//! Async Octree Builder
//!
//! Rebuilds the render octree off the main thread. One builder runs at most
//! one build at a time.
//!
//! # Flow
//!
//! ```text
//! Main Thread                       Async (rayon)
//! ┌──────────────────┐
//! │ Capture settings │
//! │ + previous tree  │
//! └───────┬──────────┘
//!         │ start()
//!         ▼
//!                                  ┌────────────────────┐
//!                                  │ clone_for_rebuild  │
//!                                  └─────────┬──────────┘
//!                                            ▼
//!                                  ┌────────────────────┐
//!                                  │ reset, distance,   │
//!                                  │ neighbors, others, │
//!                                  │ delete, updates    │
//!                                  └─────────┬──────────┘
//!                                            ▼
//!                                  ┌────────────────────┐
//!                                  │ sort by height,    │
//!                                  │ previous visible   │
//!                                  └─────────┬──────────┘
//!                                            │
//! ┌──────────────────┐                       │
//! │ poll()           │◄──────────────────────┘
//! │ - Install tree   │
//! │ - Apply updates  │
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut builder = AsyncOctreeBuilder::new(BuilderConfig::default());
//!
//! // Start (non-blocking)
//! builder.start(settings, current_octree.clone())?;
//!
//! // Poll each frame
//! if let Some(result) = builder.poll() {
//!     if !result.too_many_chunks {
//!         current_octree = result.octree;
//!         renderer.apply(&result.chunk_updates);
//!     }
//! }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, TryRecvError};
use web_time::Instant;

use crate::error::LodError;
use crate::octree::{ChunkBudget, ChunkUpdate, OctreeGeometry, OctreeSettings, RenderOctree};

/// Unique identifier for a build started by an [`AsyncOctreeBuilder`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BuildId(u64);

impl BuildId {
	fn next() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}

	/// Get the raw ID value.
	pub fn raw(&self) -> u64 {
		self.0
	}
}

/// Shape and node cap of the trees a builder produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuilderConfig {
	/// Chunk size and depth of fresh trees.
	pub geometry: OctreeGeometry,
	/// Node-count cap applied to every build.
	pub budget: ChunkBudget,
}

impl Default for BuilderConfig {
	fn default() -> Self {
		Self {
			geometry: OctreeGeometry::default(),
			budget: ChunkBudget::DEFAULT,
		}
	}
}

/// Timing and size statistics of one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
	/// Cloning the previous tree (or creating a fresh root).
	pub clone_us: u64,
	/// Division type reset.
	pub reset_us: u64,
	/// Distance subdivision.
	pub distance_us: u64,
	/// Neighbor fixpoint, or reuse of the previous decisions.
	pub neighbors_us: u64,
	/// Collision/navmesh subdivision.
	pub others_us: u64,
	/// Collapsing unneeded branches.
	pub delete_us: u64,
	/// Settings computation and diff.
	pub updates_us: u64,
	/// Sorting updates and looking up previous visible chunks.
	pub finish_us: u64,
	/// Whole build.
	pub total_us: u64,
	/// False when distance decisions were unchanged and neighbor decisions reused.
	pub neighbors_recomputed: bool,
	/// Neighbor sweeps that subdivided something.
	pub neighbor_iterations: u32,
	/// Live nodes at the end of the build.
	pub chunk_count: usize,
	/// Highest live node count during the build.
	pub peak_chunk_count: usize,
	/// Number of chunk updates emitted.
	pub update_count: usize,
}

impl fmt::Display for BuildStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"octree build {}us: clone {}us, reset {}us, distance {}us, ",
			self.total_us, self.clone_us, self.reset_us, self.distance_us
		)?;
		if self.neighbors_recomputed {
			write!(f, "neighbors {}us ({} iterations), ", self.neighbors_us, self.neighbor_iterations)?;
		} else {
			write!(f, "neighbors {}us (reused), ", self.neighbors_us)?;
		}
		write!(
			f,
			"others {}us, delete {}us, updates {}us, finish {}us; {} chunks (peak {}), {} updates",
			self.others_us,
			self.delete_us,
			self.updates_us,
			self.finish_us,
			self.chunk_count,
			self.peak_chunk_count,
			self.update_count
		)
	}
}

/// Result of one octree build.
#[derive(Debug)]
pub struct OctreeBuildResult {
	/// Build this result belongs to.
	pub build_id: BuildId,
	/// Tree to keep as the previous generation for the next build.
	///
	/// The new tree on success. When `too_many_chunks` is set this is the
	/// previous tree passed in (None on a first build).
	pub octree: Option<Arc<RenderOctree>>,
	/// Chunk changes, sorted by ascending height. Empty when `too_many_chunks`.
	pub chunk_updates: Vec<ChunkUpdate>,
	/// The build hit the node cap and was discarded.
	pub too_many_chunks: bool,
	/// Build statistics.
	pub stats: BuildStats,
}

/// Non-blocking render octree builder.
///
/// Runs builds on rayon's thread pool, one at a time.
pub struct AsyncOctreeBuilder {
	config: BuilderConfig,
	/// Id and receiver of the build in flight.
	pending: Option<(BuildId, Receiver<OctreeBuildResult>)>,
	on_finished: Option<Arc<dyn Fn(BuildId) + Send + Sync>>,
}

impl AsyncOctreeBuilder {
	/// Create a new builder.
	pub fn new(config: BuilderConfig) -> Self {
		Self {
			config,
			pending: None,
			on_finished: None,
		}
	}

	/// Configuration applied to every build.
	pub fn config(&self) -> &BuilderConfig {
		&self.config
	}

	/// Check if a build is running or its result is waiting to be polled.
	pub fn is_busy(&self) -> bool {
		self.pending.is_some()
	}

	/// Id of the build in flight, if any.
	pub fn pending_build(&self) -> Option<BuildId> {
		self.pending.as_ref().map(|(id, _)| *id)
	}

	/// Register a callback invoked on the worker thread once a build's result
	/// is ready to poll.
	pub fn set_on_finished(&mut self, on_finished: impl Fn(BuildId) + Send + Sync + 'static) {
		self.on_finished = Some(Arc::new(on_finished));
	}

	/// Start a build from a settings snapshot and the previous tree.
	///
	/// `previous` is only read by the build; the caller may keep its own
	/// handle. Fails if a build is already in flight.
	pub fn start(
		&mut self,
		settings: OctreeSettings,
		previous: Option<Arc<RenderOctree>>,
	) -> Result<BuildId, LodError> {
		if let Some(build_id) = self.pending_build() {
			return Err(LodError::BuildInFlight(build_id));
		}

		let build_id = BuildId::next();
		let (sender, receiver) = channel::bounded(1);
		self.pending = Some((build_id, receiver));

		let config = self.config;
		let on_finished = self.on_finished.clone();

		// Spawn on rayon thread pool
		rayon::spawn(move || {
			let result = run_build(build_id, &config, &settings, previous);
			// Ignore send error (receiver dropped = builder dropped)
			let _ = sender.send(result);
			if let Some(on_finished) = on_finished {
				on_finished(build_id);
			}
		});

		Ok(build_id)
	}

	/// Poll for the result (non-blocking).
	///
	/// Returns `Some(result)` when complete, `None` if still running or idle.
	pub fn poll(&mut self) -> Option<OctreeBuildResult> {
		let (_, receiver) = self.pending.as_ref()?;

		match receiver.try_recv() {
			Ok(result) => {
				self.pending = None;
				Some(result)
			}
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => {
				self.pending = None;
				None
			}
		}
	}

	/// Block until the build in flight finishes.
	///
	/// Returns None if idle.
	pub fn wait(&mut self) -> Option<OctreeBuildResult> {
		let (_, receiver) = self.pending.take()?;
		receiver.recv().ok()
	}
}

impl Default for AsyncOctreeBuilder {
	fn default() -> Self {
		Self::new(BuilderConfig::default())
	}
}

/// Run a build synchronously on the calling thread.
pub fn build_octree(
	config: &BuilderConfig,
	settings: &OctreeSettings,
	previous: Option<Arc<RenderOctree>>,
) -> OctreeBuildResult {
	run_build(BuildId::next(), config, settings, previous)
}

/// Full build (called on worker thread).
fn run_build(
	build_id: BuildId,
	config: &BuilderConfig,
	settings: &OctreeSettings,
	previous: Option<Arc<RenderOctree>>,
) -> OctreeBuildResult {
	let _span = tracing::info_span!("octree_build", build = build_id.raw()).entered();
	let total_start = Instant::now();
	let mut stats = BuildStats::default();

	let mut octree = timed("clone", &mut stats.clone_us, || match &previous {
		Some(previous) => previous.clone_for_rebuild(config.budget),
		None => RenderOctree::new(config.geometry, config.budget),
	});

	let mut chunk_updates = run_passes(&mut octree, settings, &mut stats);

	stats.chunk_count = octree.chunk_count();
	stats.peak_chunk_count = octree.peak_chunk_count();

	if octree.is_canceled() {
		stats.total_us = total_start.elapsed().as_micros() as u64;
		tracing::debug!(
			max_chunks = config.budget.max_chunks,
			peak = stats.peak_chunk_count,
			"octree build canceled: too many chunks"
		);
		return OctreeBuildResult {
			build_id,
			octree: previous,
			chunk_updates: Vec::new(),
			too_many_chunks: true,
			stats,
		};
	}

	timed("finish", &mut stats.finish_us, || {
		// Finest chunks first: they get meshing priority
		chunk_updates.sort_by_key(|update| update.height);

		if let Some(previous) = &previous {
			for update in chunk_updates.iter_mut().filter(|update| update.becomes_visible()) {
				previous.get_visible_chunks_overlapping_bounds(
					&update.bounds,
					&mut update.previous_visible_chunks,
				);
			}
		}
	});
	drop(previous);

	stats.update_count = chunk_updates.len();
	stats.total_us = total_start.elapsed().as_micros() as u64;
	tracing::debug!("{}", stats);

	OctreeBuildResult {
		build_id,
		octree: Some(Arc::new(octree)),
		chunk_updates,
		too_many_chunks: false,
		stats,
	}
}

/// Run the six render octree passes in order, returning the unsorted updates.
pub(crate) fn run_passes(
	octree: &mut RenderOctree,
	settings: &OctreeSettings,
	stats: &mut BuildStats,
) -> Vec<ChunkUpdate> {
	let mut chunk_updates = Vec::new();

	timed("reset", &mut stats.reset_us, || octree.reset_division_type());

	let distance_changed = timed("distance", &mut stats.distance_us, || {
		octree.update_subdivided_by_distance(settings)
	});

	let iterations = timed("neighbors", &mut stats.neighbors_us, || {
		if !distance_changed {
			octree.reuse_old_neighbors(settings);
			return 0;
		}
		let mut iterations = 0;
		while octree.update_subdivided_by_neighbors(settings) {
			iterations += 1;
		}
		tracing::trace!(iterations, "neighbor fixpoint converged");
		iterations
	});
	stats.neighbors_recomputed = distance_changed;
	stats.neighbor_iterations = iterations;

	timed("others", &mut stats.others_us, || octree.update_subdivided_by_others(settings));
	timed("delete", &mut stats.delete_us, || octree.delete_chunks(&mut chunk_updates));
	timed("updates", &mut stats.updates_us, || octree.get_updates(settings, &mut chunk_updates));

	chunk_updates
}

/// Run `f` inside a `pass` span, storing its duration in `elapsed_us`.
fn timed<R>(pass: &'static str, elapsed_us: &mut u64, f: impl FnOnce() -> R) -> R {
	let _span = tracing::debug_span!("pass", pass).entered();
	let start = Instant::now();
	let result = f();
	*elapsed_us = start.elapsed().as_micros() as u64;
	result
}

#[cfg(test)]
#[path = "async_builder_test.rs"]
mod async_builder_test;
