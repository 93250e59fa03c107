//! RenderOctree - which chunks render at which LOD.
//!
//! Each build clones the previous generation and runs these passes in order:
//!
//! 1. [`reset_division_type`](RenderOctree::reset_division_type): stash last
//!    build's division type, clear the current one
//! 2. [`update_subdivided_by_distance`](RenderOctree::update_subdivided_by_distance):
//!    subdivide near invokers, report whether anything changed
//! 3. [`update_subdivided_by_neighbors`](RenderOctree::update_subdivided_by_neighbors):
//!    repeated until stable, so no chunk is more than one level coarser than a
//!    visible neighbor ([`reuse_old_neighbors`](RenderOctree::reuse_old_neighbors)
//!    when step 2 changed nothing)
//! 4. [`update_subdivided_by_others`](RenderOctree::update_subdivided_by_others):
//!    height-0 chunks for collisions and navmesh
//! 5. [`delete_chunks`](RenderOctree::delete_chunks): collapse branches nobody
//!    needs anymore
//! 6. [`get_updates`](RenderOctree::get_updates): final chunk settings and the
//!    diff against the previous generation
//!
//! Every recursive step first checks the node-count cap. Once the cap is hit
//! the tree is canceled: all passes become no-ops and the builder throws the
//! tree away.

use glam::IVec3;

use super::{
  ChunkBudget, ChunkId, ChunkSettings, ChunkUpdate, Direction, DivisionType, IntBox, NodeId,
  OctreeGeometry, OctreeSettings, SpatialNode, SpatialOctree, TransitionMask,
};

/// Per-node LOD state of a [`RenderOctree`].
#[derive(Clone, Debug)]
pub struct RenderNode {
  /// Chunk identity, stable across generations.
  pub chunk_id: ChunkId,
  /// Why the node is subdivided in this build.
  pub division_type: DivisionType,
  /// Why the node was subdivided in the previous build.
  pub old_division_type: DivisionType,
  /// Observable chunk state.
  pub settings: ChunkSettings,
  update_index: u32,
}

impl RenderNode {
  fn new() -> Self {
    Self {
      chunk_id: ChunkId::next(),
      division_type: DivisionType::Uninitialized,
      old_division_type: DivisionType::Uninitialized,
      settings: ChunkSettings::default(),
      update_index: 0,
    }
  }
}

/// Render LOD octree.
///
/// The tree is the arena; the node-count cap and chunk counters are its
/// header. A tree is only ever touched by one thread at a time.
#[derive(Debug)]
pub struct RenderOctree {
  tree: SpatialOctree<RenderNode>,
  budget: ChunkBudget,
  canceled: bool,
  peak_chunks: usize,
  update_index: u32,
}

impl RenderOctree {
  /// Fresh tree holding a single root chunk.
  pub fn new(geometry: OctreeGeometry, budget: ChunkBudget) -> Self {
    Self {
      tree: SpatialOctree::new(geometry, RenderNode::new()),
      budget,
      canceled: false,
      peak_chunks: 1,
      update_index: 0,
    }
  }

  /// Deep copy of this tree for the next build.
  ///
  /// Chunk ids and settings are copied, not minted, so unchanged chunks keep
  /// their identity. The copy counts against `budget` like any other node
  /// creation.
  pub fn clone_for_rebuild(&self, budget: ChunkBudget) -> Self {
    let source_root = self.tree.root();
    let mut octree = Self {
      tree: SpatialOctree::new(
        *self.tree.geometry(),
        self.tree.node(source_root).data.clone(),
      ),
      budget,
      canceled: false,
      peak_chunks: 1,
      update_index: self.update_index,
    };
    let root = octree.tree.root();
    octree.copy_children(self, source_root, root);
    octree
  }

  fn copy_children(&mut self, source: &RenderOctree, from: NodeId, to: NodeId) {
    let Some(source_children) = source.tree.node(from).children() else {
      return;
    };
    if !self.reserve_children() {
      return;
    }
    let children = self.tree.create_children(to, |key| {
      source
        .tree
        .node(source_children[key.octant() as usize])
        .data
        .clone()
    });
    self.peak_chunks = self.peak_chunks.max(self.tree.len());

    for (from_child, to_child) in source_children.into_iter().zip(children) {
      self.copy_children(source, from_child, to_child);
    }
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  /// Shape of this tree.
  #[inline]
  pub fn geometry(&self) -> &OctreeGeometry {
    self.tree.geometry()
  }

  /// Node-count cap of this tree.
  #[inline]
  pub fn budget(&self) -> ChunkBudget {
    self.budget
  }

  /// Underlying arena.
  #[inline]
  pub fn tree(&self) -> &SpatialOctree<RenderNode> {
    &self.tree
  }

  /// Number of live nodes.
  #[inline]
  pub fn chunk_count(&self) -> usize {
    self.tree.len()
  }

  /// Highest live node count this tree ever reached.
  #[inline]
  pub fn peak_chunk_count(&self) -> usize {
    self.peak_chunks
  }

  /// Has this tree hit its node-count cap?
  #[inline]
  pub fn is_canceled(&self) -> bool {
    self.canceled || self.budget.is_exhausted(self.tree.len())
  }

  /// Every live node, in arena order.
  pub fn nodes(&self) -> impl Iterator<Item = &SpatialNode<RenderNode>> {
    self.tree.iter().map(|(_, node)| node)
  }

  /// Nodes currently flagged visible.
  pub fn visible_chunks(&self) -> impl Iterator<Item = &SpatialNode<RenderNode>> {
    self.nodes().filter(|node| node.data.settings.visible)
  }

  // ===========================================================================
  // Subdivision passes
  // ===========================================================================

  /// Pass 1: move every node's division type to `old_division_type`.
  pub fn reset_division_type(&mut self) {
    self.reset_division_type_at(self.tree.root());
  }

  fn reset_division_type_at(&mut self, id: NodeId) {
    let children = {
      let node = self.tree.node_mut(id);
      node.data.old_division_type = node.data.division_type;
      node.data.division_type = DivisionType::Uninitialized;
      node.children()
    };
    for child in children.into_iter().flatten() {
      self.reset_division_type_at(child);
    }
  }

  /// Pass 2: subdivide nodes close to LOD invokers.
  ///
  /// Returns true if any node's distance subdivision differs from the
  /// previous build; if not, neighbor decisions can be reused.
  pub fn update_subdivided_by_distance(&mut self, settings: &OctreeSettings) -> bool {
    self.update_subdivided_by_distance_at(self.tree.root(), settings)
  }

  fn update_subdivided_by_distance_at(&mut self, id: NodeId, settings: &OctreeSettings) -> bool {
    if self.is_canceled() {
      return false;
    }

    let node = self.tree.node(id);
    let was_by_distance = node.data.old_division_type == DivisionType::ByDistance;
    if !should_subdivide_by_distance(node, settings) {
      return was_by_distance;
    }

    self.tree.node_mut(id).data.division_type = DivisionType::ByDistance;
    let Some(children) = self.ensure_children(id) else {
      return false;
    };

    let mut changed = !was_by_distance;
    for child in children {
      changed |= self.update_subdivided_by_distance_at(child, settings);
    }
    changed
  }

  /// Pass 3: one sweep of neighbor enforcement.
  ///
  /// Returns true if any node was newly subdivided; callers repeat the sweep
  /// until it returns false.
  pub fn update_subdivided_by_neighbors(&mut self, settings: &OctreeSettings) -> bool {
    self.update_subdivided_by_neighbors_at(self.tree.root(), settings)
  }

  fn update_subdivided_by_neighbors_at(&mut self, id: NodeId, settings: &OctreeSettings) -> bool {
    if self.is_canceled() {
      return false;
    }

    let mut should_continue = false;

    if self.tree.node(id).data.division_type == DivisionType::Uninitialized
      && self.should_subdivide_by_neighbors(id, settings)
    {
      self.tree.node_mut(id).data.division_type = DivisionType::ByNeighbors;
      if self.ensure_children(id).is_none() {
        return false;
      }
      should_continue = true;
    }

    let node = self.tree.node(id);
    if node.data.division_type != DivisionType::Uninitialized {
      for child in node.children().into_iter().flatten() {
        should_continue |= self.update_subdivided_by_neighbors_at(child, settings);
      }
    }

    should_continue
  }

  /// Pass 3 shortcut: carry last build's neighbor subdivisions forward.
  ///
  /// Only valid when pass 2 reported no change. Nodes that left the world
  /// bounds stay undecided so pass 5 collapses them.
  pub fn reuse_old_neighbors(&mut self, settings: &OctreeSettings) {
    self.reuse_old_neighbors_at(self.tree.root(), settings);
  }

  fn reuse_old_neighbors_at(&mut self, id: NodeId, settings: &OctreeSettings) {
    if self.is_canceled() {
      return;
    }

    let node = self.tree.node_mut(id);
    if node.data.old_division_type == DivisionType::ByNeighbors
      && node.bounds().intersects(&settings.world_bounds)
    {
      debug_assert_eq!(node.data.division_type, DivisionType::Uninitialized);
      node.data.division_type = DivisionType::ByNeighbors;
    }
    if node.data.division_type == DivisionType::Uninitialized {
      return;
    }
    for child in node.children().into_iter().flatten() {
      self.reuse_old_neighbors_at(child, settings);
    }
  }

  /// Pass 4: subdivide down to height 0 where collisions or navmesh need it.
  pub fn update_subdivided_by_others(&mut self, settings: &OctreeSettings) {
    self.update_subdivided_by_others_at(self.tree.root(), settings);
  }

  fn update_subdivided_by_others_at(&mut self, id: NodeId, settings: &OctreeSettings) {
    if self.is_canceled() {
      return;
    }

    let node = self.tree.node(id);
    if node.data.division_type == DivisionType::Uninitialized
      && should_subdivide_by_others(node, settings)
    {
      self.tree.node_mut(id).data.division_type = DivisionType::ByOthers;
      if self.ensure_children(id).is_none() {
        return;
      }
    }

    let node = self.tree.node(id);
    if node.data.division_type != DivisionType::Uninitialized {
      for child in node.children().into_iter().flatten() {
        self.update_subdivided_by_others_at(child, settings);
      }
    }
  }

  /// Pass 5: destroy children of nodes that are no longer subdivided.
  ///
  /// Every destroyed node that still had a render chunk is reported as a
  /// removal.
  pub fn delete_chunks(&mut self, updates: &mut Vec<ChunkUpdate>) {
    self.delete_chunks_at(self.tree.root(), updates);
  }

  fn delete_chunks_at(&mut self, id: NodeId, updates: &mut Vec<ChunkUpdate>) {
    if self.is_canceled() {
      return;
    }

    let node = self.tree.node(id);
    let Some(children) = node.children() else {
      return;
    };

    if node.data.division_type == DivisionType::Uninitialized {
      for child in children {
        self.delete_chunks_at(child, updates);
        let child = self.tree.node(child);
        if child.data.settings.has_render_chunk() {
          updates.push(ChunkUpdate {
            chunk_id: child.data.chunk_id,
            height: child.height(),
            bounds: *child.bounds(),
            old_settings: child.data.settings,
            new_settings: None,
            previous_visible_chunks: Default::default(),
          });
        }
      }
      self.tree.destroy_children(id);
    } else {
      for child in children {
        self.delete_chunks_at(child, updates);
      }
    }
  }

  /// Pass 6: compute final chunk settings and emit the diff.
  pub fn get_updates(&mut self, settings: &OctreeSettings, updates: &mut Vec<ChunkUpdate>) {
    self.update_index = self.update_index.wrapping_add(1);
    self.get_updates_at(self.tree.root(), settings, true, updates);
  }

  fn get_updates_at(
    &mut self,
    id: NodeId,
    settings: &OctreeSettings,
    in_visible: bool,
    updates: &mut Vec<ChunkUpdate>,
  ) {
    if self.is_canceled() {
      return;
    }

    let update_index = self.update_index;
    let (height, bounds, division_type, children) = {
      let node = self.tree.node_mut(id);
      debug_assert_ne!(
        node.data.update_index, update_index,
        "node {:?} visited twice in one generation",
        node.key()
      );
      node.data.update_index = update_index;
      (node.height(), *node.bounds(), node.data.division_type, node.children())
    };

    let mut new_settings = ChunkSettings::default();

    if bounds.intersects(&settings.world_bounds) {
      new_settings.visible =
        settings.enable_render && height <= settings.chunks_culling_lod && in_visible;

      match children {
        None => debug_assert_eq!(division_type, DivisionType::Uninitialized),
        Some(children) => {
          debug_assert_ne!(division_type, DivisionType::Uninitialized);
          // Visible parents hand visibility down; ByOthers children are
          // collision/navmesh hosts only
          let children_visible = division_type.is_visible_parent();
          if children_visible {
            new_settings.visible = false;
          }
          for child in children {
            self.get_updates_at(child, settings, children_visible, updates);
          }
        }
      }

      new_settings.enable_collisions = settings.enable_collisions
        && ((height == 0
          && settings.any_invoker_in_range(&bounds, |invoker| {
            invoker.use_for_collisions.then_some(&invoker.collisions_bounds)
          }))
          || (new_settings.visible
            && settings.compute_visible_chunks_collisions
            && height <= settings.visible_chunks_collisions_max_lod));

      new_settings.enable_navmesh = settings.enable_navmesh
        && ((height == 0
          && settings.any_invoker_in_range(&bounds, |invoker| {
            invoker.use_for_navmesh.then_some(&invoker.navmesh_bounds)
          }))
          || (new_settings.visible
            && settings.compute_visible_chunks_navmesh
            && height <= settings.visible_chunks_navmesh_max_lod));

      if new_settings.visible && settings.enable_transitions {
        new_settings.transitions_mask = self.transitions_mask(id, settings);
      }
    } else {
      debug_assert!(children.is_none(), "subdivided node outside world bounds");
    }

    let node = self.tree.node_mut(id);
    let old_settings = node.data.settings;
    if old_settings != new_settings
      && (old_settings.has_render_chunk() || new_settings.has_render_chunk())
    {
      updates.push(ChunkUpdate {
        chunk_id: node.data.chunk_id,
        height,
        bounds,
        old_settings,
        new_settings: Some(new_settings),
        previous_visible_chunks: Default::default(),
      });
    }
    node.data.settings = new_settings;
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// Chunks with render content overlapping `bounds`: the ids to remesh after
  /// an edit of that region.
  pub fn get_chunks_to_update_for_bounds(&self, bounds: &IntBox) -> Vec<ChunkId> {
    let mut chunks = Vec::new();
    self.collect_overlapping(
      self.tree.root(),
      bounds,
      &|node: &RenderNode| node.settings.has_render_chunk(),
      &mut chunks,
    );
    chunks
  }

  /// Visible chunks overlapping `bounds`.
  pub fn get_visible_chunks_overlapping_bounds(
    &self,
    bounds: &IntBox,
    visible_chunks: &mut impl Extend<ChunkId>,
  ) {
    self.collect_overlapping(
      self.tree.root(),
      bounds,
      &|node: &RenderNode| node.settings.visible,
      visible_chunks,
    );
  }

  fn collect_overlapping(
    &self,
    id: NodeId,
    bounds: &IntBox,
    select: &impl Fn(&RenderNode) -> bool,
    chunks: &mut impl Extend<ChunkId>,
  ) {
    let node = self.tree.node(id);
    if !node.bounds().intersects(bounds) {
      return;
    }
    if select(&node.data) {
      chunks.extend(Some(node.data.chunk_id));
    }
    for child in node.children().into_iter().flatten() {
      self.collect_overlapping(child, bounds, select, chunks);
    }
  }

  /// Height of the chunk hosting collisions at `point`, if any.
  pub fn collisions_at(&self, point: IVec3) -> Option<u8> {
    let id = self
      .tree
      .descend(point, |node| !node.data.settings.enable_collisions)?;
    let node = self.tree.node(id);
    node.data.settings.enable_collisions.then_some(node.height())
  }

  // ===========================================================================
  // Internals
  // ===========================================================================

  /// Check the cap before creating 8 children; cancels the tree on refusal.
  fn reserve_children(&mut self) -> bool {
    if self.canceled {
      return false;
    }
    if !self.budget.can_allocate(self.tree.len(), 8) {
      tracing::debug!(
        live = self.tree.len(),
        max_chunks = self.budget.max_chunks,
        "render octree node cap reached"
      );
      self.canceled = true;
      return false;
    }
    true
  }

  /// Children of `id`, creating fresh ones if it is a leaf.
  ///
  /// Stale children left over from the previous build are reused as-is so
  /// their settings keep diffing against the last generation.
  fn ensure_children(&mut self, id: NodeId) -> Option<[NodeId; 8]> {
    if let Some(children) = self.tree.node(id).children() {
      return Some(children);
    }
    if !self.reserve_children() {
      return None;
    }
    let children = self.tree.create_children(id, |_| RenderNode::new());
    self.peak_chunks = self.peak_chunks.max(self.tree.len());
    Some(children)
  }

  fn should_subdivide_by_neighbors(&self, id: NodeId, settings: &OctreeSettings) -> bool {
    let node = self.tree.node(id);
    let height = node.height();
    if height == 0 || !node.bounds().intersects(&settings.world_bounds) {
      return false;
    }

    for direction in Direction::ALL {
      // The 4 child-sized cells across this face
      for index in 0..4 {
        let Some(adjacent) = self.visible_adjacent_chunk(id, direction, index) else {
          continue;
        };
        let adjacent_height = self.tree.node(adjacent).height();
        if adjacent_height + 1 < height {
          return true;
        }
        if adjacent_height >= height {
          // Same or coarser: all 4 probes land in the same chunk
          debug_assert_eq!(index, 0);
          break;
        }
      }
    }
    false
  }

  /// Final visible chunk across `direction`, probing the child-sized cell
  /// `index` (0-3) of that face.
  ///
  /// Descends from the root while the traversed node is a visible parent.
  fn visible_adjacent_chunk(&self, id: NodeId, direction: Direction, index: u8) -> Option<NodeId> {
    let node = self.tree.node(id);
    let half = node.size() / 2;
    let quarter = node.size() / 4;
    let center = node.bounds().min + IVec3::splat(half);

    let u = if index & 1 != 0 { -quarter } else { quarter };
    let v = if index & 2 != 0 { -quarter } else { quarter };
    // half: on the border, quarter: center of the child-sized cell
    let probe = center + direction.offset(half + quarter, u, v);
    debug_assert!(!node.bounds().contains_point(probe));

    self
      .tree
      .descend(probe, |other| other.data.division_type.is_visible_parent())
  }

  fn transitions_mask(&self, id: NodeId, settings: &OctreeSettings) -> TransitionMask {
    let height = self.tree.node(id).height();
    let mut mask = TransitionMask::NONE;

    for direction in Direction::ALL {
      let Some(adjacent) = self.visible_adjacent_chunk(id, direction, 0) else {
        continue;
      };
      let adjacent = self.tree.node(adjacent);
      if !adjacent.bounds().intersects(&settings.world_bounds) {
        continue;
      }
      debug_assert!(
        adjacent.height().abs_diff(height) <= 1,
        "visible neighbors {} and {} levels apart",
        height,
        adjacent.height()
      );

      let needs_transition = if settings.invert_transitions {
        adjacent.height() < height
      } else {
        adjacent.height() > height
      };
      if needs_transition {
        mask.insert(direction);
      }
    }
    mask
  }
}

fn should_subdivide_by_distance(node: &SpatialNode<RenderNode>, settings: &OctreeSettings) -> bool {
  let height = node.height();
  let bounds = node.bounds();

  if !settings.enable_render
    || height == 0
    || !bounds.intersects(&settings.world_bounds)
    || height <= settings.min_lod
  {
    return false;
  }
  if height > settings.max_lod {
    return true;
  }

  settings.invokers.iter().any(|invoker| {
    invoker.use_for_lod && height > invoker.lod_to_set && invoker.lod_bounds.intersects(bounds)
  })
}

fn should_subdivide_by_others(node: &SpatialNode<RenderNode>, settings: &OctreeSettings) -> bool {
  if !settings.enable_collisions && !settings.enable_navmesh {
    return false;
  }
  let bounds = node.bounds();
  if node.height() == 0 || !bounds.intersects(&settings.world_bounds) {
    return false;
  }

  (settings.enable_collisions
    && settings.any_invoker_in_range(bounds, |invoker| {
      invoker.use_for_collisions.then_some(&invoker.collisions_bounds)
    }))
    || (settings.enable_navmesh
      && settings.any_invoker_in_range(bounds, |invoker| {
        invoker.use_for_navmesh.then_some(&invoker.navmesh_bounds)
      }))
}

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;
