//! Integer key addressing one cell of the render octree.
//!
//! A key counts cells at its own height, measured from the root's min
//! corner: the root is (0, 0, 0) at height `depth`, and height 0 holds the
//! smallest chunks.

/// Grid position plus height of an octree cell.
///
/// Each axis counts cells of this node's size, so a child key is the parent
/// key doubled plus the octant bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OctreeNode {
  /// Cell index along X
  pub x: i32,
  /// Cell index along Y
  pub y: i32,
  /// Cell index along Z
  pub z: i32,
  /// Levels above the smallest chunks
  pub height: u8,
}

impl OctreeNode {
  pub fn new(x: i32, y: i32, z: i32, height: u8) -> Self {
    Self { x, y, z, height }
  }

  /// Key of the root of a tree `depth` levels deep.
  pub fn root(depth: u8) -> Self {
    Self::new(0, 0, 0, depth)
  }

  /// Key of the child in `octant`, one height down.
  ///
  /// `octant` packs the child's offset as X in bit 0, Y in bit 1 and Z in
  /// bit 2. None for height-0 keys and octants past 7.
  pub fn get_child(&self, octant: u8) -> Option<Self> {
    if self.height == 0 || octant >= 8 {
      return None;
    }
    let step = |bit: u8| ((octant >> bit) & 1) as i32;
    Some(Self {
      x: self.x * 2 + step(0),
      y: self.y * 2 + step(1),
      z: self.z * 2 + step(2),
      height: self.height - 1,
    })
  }

  /// Which of its parent's 8 children this key is.
  pub fn octant(&self) -> u8 {
    ((self.x & 1) | ((self.y & 1) << 1) | ((self.z & 1) << 2)) as u8
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
