//! Face directions and LOD seam ("transition") masks.
//!
//! A visible chunk whose face borders a chunk of a different height needs
//! seam geometry on that face. The mask stores one bit per face.

use glam::IVec3;

/// One of the six faces of a cubic node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
  /// -X
  XMin,
  /// +X
  XMax,
  /// -Y
  YMin,
  /// +Y
  YMax,
  /// -Z
  ZMin,
  /// +Z
  ZMax,
}

impl Direction {
  /// All six faces, in mask bit order.
  pub const ALL: [Direction; 6] = [
    Direction::XMin,
    Direction::XMax,
    Direction::YMin,
    Direction::YMax,
    Direction::ZMin,
    Direction::ZMax,
  ];

  /// Bit of this face in a [`TransitionMask`].
  #[inline]
  pub fn bit(self) -> u8 {
    1 << self as u8
  }

  /// Axis index (0 = X, 1 = Y, 2 = Z).
  #[inline]
  pub fn axis(self) -> usize {
    self as usize / 2
  }

  /// -1 for min faces, +1 for max faces.
  #[inline]
  pub fn sign(self) -> i32 {
    if self as u8 % 2 == 0 {
      -1
    } else {
      1
    }
  }

  /// Opposite face.
  pub fn opposite(self) -> Self {
    Self::ALL[(self as usize) ^ 1]
  }

  /// Offset of `normal` along this face's axis, with `u` and `v` along the
  /// two tangent axes (in X, Y, Z order).
  pub fn offset(self, normal: i32, u: i32, v: i32) -> IVec3 {
    let n = normal * self.sign();
    match self.axis() {
      0 => IVec3::new(n, u, v),
      1 => IVec3::new(u, n, v),
      _ => IVec3::new(u, v, n),
    }
  }
}

/// Six-bit set of faces needing seam geometry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct TransitionMask(u8);

impl TransitionMask {
  /// No transitions.
  pub const NONE: Self = Self(0);
  /// All six faces.
  pub const ALL: Self = Self(0b11_1111);

  /// Mask from raw bits; bits above the sixth are dropped.
  pub fn from_bits(bits: u8) -> Self {
    Self(bits & Self::ALL.0)
  }

  /// Raw bits.
  #[inline]
  pub fn bits(self) -> u8 {
    self.0
  }

  /// Check if a face is set.
  #[inline]
  pub fn contains(self, direction: Direction) -> bool {
    self.0 & direction.bit() != 0
  }

  /// Set a face.
  #[inline]
  pub fn insert(&mut self, direction: Direction) {
    self.0 |= direction.bit();
  }

  /// Check if no face is set.
  #[inline]
  pub fn is_empty(self) -> bool {
    self.0 == 0
  }

  /// Iterate set faces.
  pub fn iter(self) -> impl Iterator<Item = Direction> {
    Direction::ALL.into_iter().filter(move |d| self.contains(*d))
  }
}

#[cfg(test)]
#[path = "transition_test.rs"]
mod transition_test;
