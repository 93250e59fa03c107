//! Error type for octree construction and the async builder.

use crate::pipeline::BuildId;

/// Errors from configuring or driving an octree build.
///
/// Hitting the node-count cap is not an error: see
/// [`OctreeBuildResult::too_many_chunks`](crate::pipeline::OctreeBuildResult::too_many_chunks).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LodError {
  #[error("chunk size must be a power of two >= 4, got {0}")]
  InvalidChunkSize(i32),
  #[error("octree depth {depth} is invalid for chunk size {chunk_size}")]
  InvalidDepth { depth: u8, chunk_size: i32 },
  #[error("build {0:?} is still in flight")]
  BuildInFlight(BuildId),
}
