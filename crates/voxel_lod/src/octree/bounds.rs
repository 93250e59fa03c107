//! Integer axis-aligned box in voxel space.

use glam::IVec3;

/// Integer axis-aligned bounding box.
///
/// `min` is inclusive and `max` is exclusive, so a box of size `S` starting at
/// `min` covers exactly `S` voxels per axis. Used for octree node bounds, world
/// bounds and invoker ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IntBox {
	/// Minimum corner (inclusive).
	pub min: IVec3,
	/// Maximum corner (exclusive).
	pub max: IVec3,
}

impl IntBox {
	/// A box covering every coordinate an octree can address.
	pub const INFINITE: Self = Self {
		min: IVec3::splat(i32::MIN / 2),
		max: IVec3::splat(i32::MAX / 2),
	};

	/// Create a new box from min (inclusive) and max (exclusive) corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: IVec3, max: IVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"IntBox min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Box containing a single voxel.
	pub fn from_point(point: IVec3) -> Self {
		Self {
			min: point,
			max: point + IVec3::ONE,
		}
	}

	/// Box spanning `radius` voxels on each side of `center`.
	pub fn from_center_radius(center: IVec3, radius: i32) -> Self {
		let radius = radius.max(0);
		Self::new(center - IVec3::splat(radius), center + IVec3::splat(radius))
	}

	/// Check if this box overlaps another.
	///
	/// Boxes that only touch on a face do not overlap.
	#[inline]
	pub fn intersects(&self, other: &IntBox) -> bool {
		self.min.x < other.max.x
			&& other.min.x < self.max.x
			&& self.min.y < other.max.y
			&& other.min.y < self.max.y
			&& self.min.z < other.max.z
			&& other.min.z < self.max.z
	}

	/// Check if this box contains a point.
	#[inline]
	pub fn contains_point(&self, point: IVec3) -> bool {
		point.x >= self.min.x
			&& point.x < self.max.x
			&& point.y >= self.min.y
			&& point.y < self.max.y
			&& point.z >= self.min.z
			&& point.z < self.max.z
	}

	/// Check if `other` lies entirely inside this box.
	#[inline]
	pub fn contains(&self, other: &IntBox) -> bool {
		self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
	}

	/// Get the size of the box (max - min).
	#[inline]
	pub fn size(&self) -> IVec3 {
		self.max - self.min
	}

	/// Get the center of the box, rounded toward min.
	#[inline]
	pub fn center(&self) -> IVec3 {
		self.min + self.size() / 2
	}

	/// Grow the box by `margin` voxels on every side.
	pub fn extend(&self, margin: i32) -> Self {
		Self::new(self.min - IVec3::splat(margin), self.max + IVec3::splat(margin))
	}
}
