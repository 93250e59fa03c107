//! SpatialOctree - arena-backed explicit octree.
//!
//! Nodes live in a `Vec` and link to their children by index. A node has
//! either 0 or 8 children, and each child is exactly one height below its
//! parent. There are no parent pointers: upward or sideways navigation goes
//! back through the root by coordinate descent.

use glam::IVec3;

use super::{IntBox, OctreeGeometry, OctreeNode};

/// Index of a node in its [`SpatialOctree`].
///
/// Only valid for the tree that produced it, and only until the node is
/// destroyed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
  /// Raw arena index.
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

/// A node of a [`SpatialOctree`] and its payload.
#[derive(Clone, Debug)]
pub struct SpatialNode<T> {
  key: OctreeNode,
  bounds: IntBox,
  children: Option<[NodeId; 8]>,
  /// Per-node payload.
  pub data: T,
}

impl<T> SpatialNode<T> {
  /// Grid position and height.
  #[inline]
  pub fn key(&self) -> OctreeNode {
    self.key
  }

  /// Distance from the leaf level.
  #[inline]
  pub fn height(&self) -> u8 {
    self.key.height
  }

  /// Voxel-space bounds.
  #[inline]
  pub fn bounds(&self) -> &IntBox {
    &self.bounds
  }

  /// Edge length in voxels.
  #[inline]
  pub fn size(&self) -> i32 {
    self.bounds.max.x - self.bounds.min.x
  }

  /// Children in octant order, if subdivided.
  #[inline]
  pub fn children(&self) -> Option<[NodeId; 8]> {
    self.children
  }

  /// Is this node a leaf?
  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  /// Octant of the child containing `point`.
  ///
  /// Ex: point in the +X, +Z half -> (1, 0, 1) -> 0b101 == 5
  #[inline]
  pub fn octant_of(&self, point: IVec3) -> usize {
    let center = self.bounds.center();
    (point.x >= center.x) as usize
      + 2 * (point.y >= center.y) as usize
      + 4 * (point.z >= center.z) as usize
  }
}

/// Arena-backed octree: the tree owns every node, nodes refer to children by
/// [`NodeId`].
#[derive(Clone, Debug)]
pub struct SpatialOctree<T> {
  geometry: OctreeGeometry,
  nodes: Vec<Option<SpatialNode<T>>>,
  free: Vec<u32>,
  live: usize,
}

impl<T> SpatialOctree<T> {
  /// Create a tree holding only its root.
  pub fn new(geometry: OctreeGeometry, root_data: T) -> Self {
    let key = OctreeNode::root(geometry.depth());
    let root = SpatialNode {
      key,
      bounds: geometry.node_bounds(&key),
      children: None,
      data: root_data,
    };
    Self {
      geometry,
      nodes: vec![Some(root)],
      free: Vec::new(),
      live: 1,
    }
  }

  /// Shape of this tree.
  #[inline]
  pub fn geometry(&self) -> &OctreeGeometry {
    &self.geometry
  }

  /// The root node id. The root is never destroyed.
  #[inline]
  pub fn root(&self) -> NodeId {
    NodeId(0)
  }

  /// Number of live nodes, root included.
  #[inline]
  pub fn len(&self) -> usize {
    self.live
  }

  /// A tree always holds at least its root.
  #[inline]
  pub fn is_empty(&self) -> bool {
    false
  }

  /// Get a live node.
  ///
  /// # Panics
  /// Panics if `id` was destroyed.
  #[inline]
  pub fn node(&self, id: NodeId) -> &SpatialNode<T> {
    match &self.nodes[id.index()] {
      Some(node) => node,
      None => panic!("node {:?} was destroyed", id),
    }
  }

  /// Get a live node mutably.
  ///
  /// # Panics
  /// Panics if `id` was destroyed.
  #[inline]
  pub fn node_mut(&mut self, id: NodeId) -> &mut SpatialNode<T> {
    match &mut self.nodes[id.index()] {
      Some(node) => node,
      None => panic!("node {:?} was destroyed", id),
    }
  }

  /// Get a node if it is still live.
  pub fn get(&self, id: NodeId) -> Option<&SpatialNode<T>> {
    self.nodes.get(id.index()).and_then(Option::as_ref)
  }

  /// Subdivide a leaf, building each child's payload from its key.
  pub fn create_children(
    &mut self,
    id: NodeId,
    mut make: impl FnMut(OctreeNode) -> T,
  ) -> [NodeId; 8] {
    let parent = self.node(id);
    debug_assert!(parent.is_leaf(), "create_children on subdivided node");
    debug_assert!(parent.height() > 0, "create_children at height 0");
    let parent_key = parent.key;

    let mut children = [NodeId(0); 8];
    for (octant, slot) in children.iter_mut().enumerate() {
      let Some(key) = parent_key.get_child(octant as u8) else {
        unreachable!("height checked above");
      };
      let node = SpatialNode {
        key,
        bounds: self.geometry.node_bounds(&key),
        children: None,
        data: make(key),
      };
      *slot = self.alloc(node);
    }

    self.node_mut(id).children = Some(children);
    children
  }

  /// Destroy every descendant of `id`, leaving it a leaf.
  ///
  /// Returns the number of destroyed nodes.
  pub fn destroy_children(&mut self, id: NodeId) -> usize {
    let destroyed = self.free_descendants(id);
    self.live -= destroyed;
    destroyed
  }

  /// Release every descendant slot of `id`; `live` is left to the caller.
  fn free_descendants(&mut self, id: NodeId) -> usize {
    let Some(children) = self.node_mut(id).children.take() else {
      return 0;
    };
    let mut freed = 0;
    for child in children {
      freed += self.free_descendants(child) + 1;
      self.nodes[child.index()] = None;
      self.free.push(child.0);
    }
    freed
  }

  /// Descend from the root toward `point` while `descend_into` accepts the
  /// current node and it has children.
  ///
  /// Returns None if `point` is outside the root.
  pub fn descend(
    &self,
    point: IVec3,
    mut descend_into: impl FnMut(&SpatialNode<T>) -> bool,
  ) -> Option<NodeId> {
    let mut id = self.root();
    if !self.node(id).bounds.contains_point(point) {
      return None;
    }
    loop {
      let node = self.node(id);
      match node.children {
        Some(children) if descend_into(node) => id = children[node.octant_of(point)],
        _ => break,
      }
    }
    debug_assert!(self.node(id).bounds.contains_point(point));
    Some(id)
  }

  /// Leaf containing `point`, if inside the root.
  pub fn leaf_at(&self, point: IVec3) -> Option<NodeId> {
    self.descend(point, |_| true)
  }

  /// Visit `id` and its descendants, parents before children.
  pub fn visit(&self, id: NodeId, f: &mut impl FnMut(NodeId, &SpatialNode<T>)) {
    let node = self.node(id);
    f(id, node);
    if let Some(children) = node.children {
      for child in children {
        self.visit(child, f);
      }
    }
  }

  /// Iterate every live node in arena order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SpatialNode<T>)> {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(index, node)| node.as_ref().map(|node| (NodeId(index as u32), node)))
  }

  fn alloc(&mut self, node: SpatialNode<T>) -> NodeId {
    self.live += 1;
    match self.free.pop() {
      Some(index) => {
        self.nodes[index as usize] = Some(node);
        NodeId(index)
      }
      None => {
        self.nodes.push(Some(node));
        NodeId((self.nodes.len() - 1) as u32)
      }
    }
  }
}

#[cfg(test)]
#[path = "spatial_test.rs"]
mod spatial_test;
