//! Node-count cap for render octree builds.
//!
//! Bounds the worst-case latency and memory of a single build regardless of
//! how aggressive the invoker settings are. Once a tree reaches the cap every
//! further subdivision is refused and the build is discarded.

/// Node-count cap for one render octree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkBudget {
	/// Maximum number of live nodes in one tree.
	pub max_chunks: usize,
}

impl ChunkBudget {
	/// Default cap, large enough that only runaway settings hit it.
	pub const DEFAULT: Self = Self {
		max_chunks: 1_000_000,
	};

	/// Cap for testing or special cases.
	pub const UNLIMITED: Self = Self {
		max_chunks: usize::MAX,
	};

	/// Budget with the given cap.
	pub const fn with_max_chunks(max_chunks: usize) -> Self {
		Self { max_chunks }
	}

	/// Check if a tree with `live` nodes has hit the cap.
	#[inline]
	pub fn is_exhausted(&self, live: usize) -> bool {
		live >= self.max_chunks
	}

	/// Check if `additional` nodes can be created on top of `live`.
	#[inline]
	pub fn can_allocate(&self, live: usize, additional: usize) -> bool {
		live
			.checked_add(additional)
			.is_some_and(|total| total <= self.max_chunks)
	}
}

impl Default for ChunkBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_budget() {
		let budget = ChunkBudget::default();
		assert_eq!(budget.max_chunks, 1_000_000);
		assert!(!budget.is_exhausted(999_999));
		assert!(budget.is_exhausted(1_000_000));
	}

	#[test]
	fn test_can_allocate() {
		let budget = ChunkBudget::with_max_chunks(9);
		assert!(budget.can_allocate(1, 8));
		assert!(!budget.can_allocate(2, 8));
		assert!(!budget.can_allocate(9, 1));
	}

	#[test]
	fn test_unlimited_budget_never_overflows() {
		let budget = ChunkBudget::UNLIMITED;
		assert!(budget.can_allocate(usize::MAX - 8, 8));
		assert!(!budget.can_allocate(usize::MAX, 8));
		assert!(!budget.is_exhausted(1 << 40));
	}
}
