use clap::Parser;
use glam::IVec3;
use tracing_subscriber::EnvFilter;
use voxel_lod::{
  BuilderConfig, ChunkBudget, ChunkUpdate, ChunkUpdateKind, ChunkUpdateSink, Invoker, LodManager,
  LodManagerSettings, OctreeGeometry, OctreeSettings,
};

#[derive(Parser)]
#[command(
  name = "lod_inspect",
  about = "Drive the render LOD octree with a moving invoker and print build statistics"
)]
struct Cli {
  /// Enable verbose logging (per-build timing lines)
  #[arg(short, long)]
  verbose: bool,

  /// Size of a height-0 chunk in voxels (power of two)
  #[arg(long, default_value = "32")]
  chunk_size: i32,

  /// Number of octree levels below the root
  #[arg(long, default_value = "8")]
  depth: u8,

  /// Node cap; builds growing past it are discarded
  #[arg(long, default_value = "1000000")]
  max_chunks: usize,

  /// Number of simulated frames
  #[arg(short, long, default_value = "32")]
  steps: u32,

  /// Invoker movement per frame, in voxels along +X
  #[arg(long, default_value = "24")]
  speed: i32,

  /// Radius of the finest LOD around the invoker
  #[arg(long, default_value = "64")]
  radius: i32,

  /// Also request collision chunks within this radius
  #[arg(long)]
  collisions: Option<i32>,

  /// Minimum movement before a rebuild is triggered
  #[arg(long, default_value = "16")]
  threshold: i32,
}

/// Counts the update stream the way a renderer would consume it.
#[derive(Default)]
struct CountingSink {
  live: usize,
  added: usize,
  updated: usize,
  removed: usize,
  rejected_builds: usize,
}

impl ChunkUpdateSink for CountingSink {
  fn apply_chunk_updates(&mut self, updates: &[ChunkUpdate]) {
    for update in updates {
      match update.kind() {
        ChunkUpdateKind::Add => {
          self.added += 1;
          self.live += 1;
        }
        ChunkUpdateKind::Update => self.updated += 1,
        ChunkUpdateKind::Remove => {
          self.removed += 1;
          self.live -= 1;
        }
      }
    }
  }

  fn report_too_many_chunks(&mut self, max_chunks: usize) {
    self.rejected_builds += 1;
    tracing::error!(max_chunks, "build rejected, raise --max-chunks");
  }
}

fn invokers_at(cli: &Cli, position: IVec3) -> Vec<Invoker> {
  let mut fine = Invoker::new(position).with_lod(0, cli.radius);
  if let Some(radius) = cli.collisions {
    fine = fine.with_collisions(radius);
  }
  vec![
    fine,
    Invoker::new(position).with_lod(1, cli.radius * 4),
    Invoker::new(position).with_lod(3, cli.radius * 16),
  ]
}

fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
    .init();

  let geometry = OctreeGeometry::new(cli.chunk_size, cli.depth)?;
  let config = BuilderConfig {
    geometry,
    budget: ChunkBudget::with_max_chunks(cli.max_chunks),
  };
  let settings = LodManagerSettings {
    invoker_distance_threshold: cli.threshold,
    octree: OctreeSettings {
      world_bounds: geometry.root_bounds(),
      enable_collisions: cli.collisions.is_some(),
      ..Default::default()
    },
  };

  println!(
    "lod_inspect: chunk_size={} depth={} root={} voxels, max_chunks={}",
    cli.chunk_size,
    cli.depth,
    geometry.node_size(cli.depth),
    cli.max_chunks
  );

  let mut manager = LodManager::new(config, settings);
  let mut sink = CountingSink::default();
  let start = geometry.root_min() / 2;

  for step in 0..cli.steps {
    let position = start + IVec3::new(step as i32 * cli.speed, 0, 0);
    manager.set_invokers(invokers_at(&cli, position));
    manager.tick(&mut sink);

    let Some(stats) = manager.finish_pending(&mut sink) else {
      continue;
    };
    println!(
      "step {step:>4} @ {position}: {} updates, {} live chunks, {} nodes, {}us ({})",
      stats.update_count,
      sink.live,
      stats.chunk_count,
      stats.total_us,
      if stats.neighbors_recomputed {
        format!("{} neighbor sweeps", stats.neighbor_iterations)
      } else {
        "neighbors reused".to_string()
      }
    );
  }

  let metrics = manager.metrics();
  println!(
    "totals: {} added, {} updated, {} removed, {} rejected builds",
    sink.added, sink.updated, sink.removed, sink.rejected_builds
  );
  if let Some(octree) = manager.octree() {
    println!(
      "final tree: {} nodes, {} visible chunks, avg build {:.0}us",
      octree.chunk_count(),
      octree.visible_chunks().count(),
      metrics.avg_build_timing_us()
    );
  }

  Ok(())
}
