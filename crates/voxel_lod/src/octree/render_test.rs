use glam::IVec3;

use super::*;
use crate::octree::{ChunkUpdateKind, Invoker};
use crate::pipeline::test_utils::*;

// =========================================================================
// First build
// =========================================================================

/// Without invokers the root is the only chunk and it is visible.
#[test]
fn test_fresh_tree_renders_root_only() {
  let mut octree = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let root_id = octree.tree().node(octree.tree().root()).data.chunk_id;

  let (updates, stats) = rebuild(&mut octree, &OctreeSettings::default());

  assert_eq!(octree.chunk_count(), 1);
  assert_eq!(updates.len(), 1);
  assert_eq!(updates[0].chunk_id, root_id);
  assert_eq!(updates[0].height, 3);
  assert_eq!(updates[0].kind(), ChunkUpdateKind::Add);
  assert_eq!(updates[0].settings(), ChunkSettings::visible());
  assert!(!stats.neighbors_recomputed);
}

/// Nodes touching an LOD invoker's range subdivide down to its LOD.
#[test]
fn test_distance_subdivision_reaches_lod_to_set() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let settings = settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]);

  rebuild(&mut octree, &settings);

  let tree = octree.tree();
  let root = tree.node(tree.root());
  assert_eq!(root.data.division_type, DivisionType::ByDistance);
  assert!(!root.data.settings.visible);

  let Some(leaf) = tree.leaf_at(IVec3::new(4, 4, 4)) else {
    panic!("point inside root");
  };
  let leaf = tree.node(leaf);
  assert_eq!(leaf.height(), 0);
  assert_eq!(*leaf.bounds(), IntBox::new(IVec3::ZERO, IVec3::splat(8)));
  assert!(leaf.data.settings.visible);
}

/// `max_lod` forces subdivision everywhere, `min_lod` stops it.
#[test]
fn test_min_and_max_lod_clamp_subdivision() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    min_lod: 2,
    max_lod: 2,
    ..settings_with(vec![lod_invoker(IVec3::ZERO, 0, 4)])
  };

  rebuild(&mut octree, &settings);

  // Root (4) and its children (3) always subdivide, nothing goes below 2
  assert_eq!(octree.chunk_count(), 1 + 8 + 64);
  assert!(octree.visible_chunks().all(|node| node.height() == 2));
  assert_eq!(octree.visible_chunks().count(), 64);
}

/// Every subdivided node has 8 children exactly one height finer, inside it.
#[test]
fn test_children_complete_and_one_height_finer() {
  let mut octree = RenderOctree::new(geometry(8, 5), ChunkBudget::DEFAULT);
  let settings = settings_with(vec![
    lod_invoker(IVec3::new(20, -3, 7), 0, 10),
    lod_invoker(IVec3::new(-100, 60, 0), 1, 30),
  ]);

  rebuild(&mut octree, &settings);

  let tree = octree.tree();
  let mut subdivided = 0;
  tree.visit(tree.root(), &mut |_, node| {
    let Some(children) = node.children() else {
      return;
    };
    subdivided += 1;
    assert!(node.height() > 0);
    assert_ne!(node.data.division_type, DivisionType::Uninitialized);
    for child in children {
      let child = tree.node(child);
      assert_eq!(child.height(), node.height() - 1);
      assert!(node.bounds().contains(child.bounds()));
    }
  });

  assert!(subdivided > 0);
  assert_eq!(octree.chunk_count(), 1 + 8 * subdivided);
}

// =========================================================================
// Neighbor consistency
// =========================================================================

/// Distance subdivision alone leaves a 3-level jump next to a tiny LOD 0
/// range; the neighbor fixpoint removes every jump.
#[test]
fn test_neighbor_fixpoint_removes_lod_jumps() {
  let settings = OctreeSettings {
    enable_transitions: false,
    ..settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)])
  };

  // Distance pass only
  let mut naive = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  naive.reset_division_type();
  assert!(naive.update_subdivided_by_distance(&settings));
  naive.get_updates(&settings, &mut Vec::new());
  let jumps = neighbor_violations(&naive, &settings);
  assert!(!jumps.is_empty());
  assert!(jumps
    .iter()
    .any(|(node, adjacent)| node.height.abs_diff(adjacent.height) >= 3));

  // Full build
  let settings = OctreeSettings {
    enable_transitions: true,
    ..settings
  };
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let (_, stats) = rebuild(&mut octree, &settings);

  assert!(neighbor_violations(&octree, &settings).is_empty());
  assert!(stats.neighbors_recomputed);
  assert!(stats.neighbor_iterations >= 1);
  assert!(stats.neighbor_iterations <= 4);
  assert!(octree
    .nodes()
    .any(|node| node.data.division_type == DivisionType::ByNeighbors));

  let Some(leaf) = octree.tree().leaf_at(IVec3::new(4, 4, 4)) else {
    panic!("point inside root");
  };
  assert_eq!(octree.tree().node(leaf).height(), 0);
}

/// Several scattered invokers still converge to a consistent tree.
#[test]
fn test_neighbor_consistency_with_scattered_invokers() {
  let mut octree = RenderOctree::new(geometry(8, 6), ChunkBudget::DEFAULT);
  let settings = settings_with(vec![
    lod_invoker(IVec3::new(0, 0, 0), 0, 2),
    lod_invoker(IVec3::new(200, -150, 31), 0, 2),
    lod_invoker(IVec3::new(-250, 250, -250), 1, 40),
  ]);

  let (_, stats) = rebuild(&mut octree, &settings);

  assert!(!octree.is_canceled());
  assert!(neighbor_violations(&octree, &settings).is_empty());
  assert!(stats.neighbor_iterations <= 6);
}

// =========================================================================
// Rebuilds
// =========================================================================

/// Rebuilding with unchanged settings emits nothing and reuses neighbor
/// decisions.
#[test]
fn test_unchanged_settings_produce_no_updates() {
  let mut octree = RenderOctree::new(geometry(8, 5), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    enable_collisions: true,
    ..settings_with(vec![
      lod_invoker(IVec3::new(10, 10, 10), 0, 4).with_collisions(8),
    ])
  };

  let (first, _) = rebuild(&mut octree, &settings);
  assert!(!first.is_empty());

  let mut next = octree.clone_for_rebuild(ChunkBudget::DEFAULT);
  let (second, stats) = rebuild(&mut next, &settings);

  assert!(second.is_empty());
  assert!(!stats.neighbors_recomputed);
  assert_eq!(next.chunk_count(), octree.chunk_count());
}

/// Cloning preserves ids; nodes surviving a rebuild keep them, new nodes get
/// fresh ones.
#[test]
fn test_chunk_ids_stable_across_rebuilds() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  rebuild(&mut octree, &settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]));
  let before = chunk_ids(&octree);
  let newest_before = before.values().max().copied().unwrap();

  let mut next = octree.clone_for_rebuild(ChunkBudget::DEFAULT);
  assert_eq!(chunk_ids(&next), before);

  rebuild(&mut next, &settings_with(vec![lod_invoker(IVec3::new(-4, 4, 4), 0, 1)]));
  let after = chunk_ids(&next);

  let mut shared = 0;
  for (key, id) in &after {
    match before.get(key) {
      Some(old_id) => {
        assert_eq!(old_id, id);
        shared += 1;
      }
      None => assert!(*id > newest_before),
    }
  }
  // Root and its children at least
  assert!(shared >= 9);
}

/// Collapsed branches are reported as removals of chunks that are gone.
#[test]
fn test_collapsed_branches_emit_removals() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  rebuild(&mut octree, &settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]));
  let rendered_before = rendered_chunks(&octree);

  let settings = settings_with(vec![lod_invoker(IVec3::new(-4, 4, 4), 0, 1)]);
  let (updates, _) = rebuild(&mut octree, &settings);
  let live = chunk_ids(&octree);

  let removals: Vec<_> = updates
    .iter()
    .filter(|update| update.new_settings.is_none())
    .collect();
  assert!(!removals.is_empty());
  for removal in removals {
    assert_eq!(removal.kind(), ChunkUpdateKind::Remove);
    assert!(rendered_before.contains_key(&removal.chunk_id));
    assert!(!live.values().any(|id| *id == removal.chunk_id));
  }
  assert_eq!(rendered_chunks(&octree).len(), octree.visible_chunks().count());
}

/// Every live node is visited exactly once by the updates pass.
#[test]
fn test_updates_pass_visits_every_node() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let settings = settings_with(vec![lod_invoker(IVec3::new(-20, 3, 9), 0, 6)]);

  rebuild(&mut octree, &settings);
  rebuild(&mut octree, &settings);

  assert_eq!(octree.update_index, 2);
  assert!(octree
    .nodes()
    .all(|node| node.data.update_index == octree.update_index));
}

// =========================================================================
// Node cap
// =========================================================================

/// Hitting the cap cancels the tree without ever exceeding it.
#[test]
fn test_node_cap_cancels_build() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::with_max_chunks(20));
  let settings = settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]);

  let (updates, _) = rebuild(&mut octree, &settings);

  assert!(octree.is_canceled());
  assert!(updates.is_empty());
  assert_eq!(octree.peak_chunk_count(), 17);
  assert!(octree.chunk_count() <= 20);
}

/// The same settings fit comfortably under the default cap.
#[test]
fn test_node_cap_not_reached() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let settings = settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]);

  let (updates, _) = rebuild(&mut octree, &settings);

  assert!(!octree.is_canceled());
  assert!(!updates.is_empty());
  assert_eq!(octree.peak_chunk_count(), octree.chunk_count());
}

/// Cloning a tree larger than the new cap cancels the clone.
#[test]
fn test_clone_respects_cap() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  rebuild(&mut octree, &settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]));
  assert!(octree.chunk_count() > 10);

  let clone = octree.clone_for_rebuild(ChunkBudget::with_max_chunks(10));

  assert!(clone.is_canceled());
  assert!(clone.peak_chunk_count() <= 10);
}

// =========================================================================
// Transitions
// =========================================================================

/// Settings where the +X+Y+Z quarter of a depth-2 tree is one level finer.
fn half_refined_settings() -> OctreeSettings {
  let point = IVec3::splat(12);
  settings_with(vec![Invoker::new(point).with_lod_bounds(0, IntBox::from_point(point))])
}

/// The finer chunk flags faces bordering a coarser chunk; the coarser one
/// flags nothing.
#[test]
fn test_transition_mask_on_finer_side() {
  let mut octree = RenderOctree::new(geometry(8, 2), ChunkBudget::DEFAULT);
  let settings = half_refined_settings();
  rebuild(&mut octree, &settings);

  let fine = node_at(&octree, IVec3::ZERO, 0);
  assert!(fine.data.settings.visible);
  let mask = fine.data.settings.transitions_mask;
  assert!(mask.contains(Direction::XMin));
  assert!(mask.contains(Direction::YMin));
  assert!(mask.contains(Direction::ZMin));
  assert!(!mask.contains(Direction::XMax));
  assert!(!mask.contains(Direction::YMax));
  assert!(!mask.contains(Direction::ZMax));

  let coarse = node_at(&octree, IVec3::new(-16, 0, 0), 1);
  assert!(coarse.data.settings.visible);
  assert!(coarse.data.settings.transitions_mask.is_empty());
}

/// Inverted transitions flag the coarser side instead.
#[test]
fn test_transition_mask_inverted() {
  let mut octree = RenderOctree::new(geometry(8, 2), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    invert_transitions: true,
    ..half_refined_settings()
  };
  rebuild(&mut octree, &settings);

  let fine = node_at(&octree, IVec3::ZERO, 0);
  assert!(fine.data.settings.transitions_mask.is_empty());

  let coarse = node_at(&octree, IVec3::new(-16, 0, 0), 1);
  let mask = coarse.data.settings.transitions_mask;
  assert!(mask.contains(Direction::XMax));
  assert_eq!(mask.iter().count(), 1);
}

/// Disabling transitions clears every mask.
#[test]
fn test_transitions_disabled() {
  let mut octree = RenderOctree::new(geometry(8, 2), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    enable_transitions: false,
    ..half_refined_settings()
  };
  rebuild(&mut octree, &settings);

  assert!(octree
    .visible_chunks()
    .all(|node| node.data.settings.transitions_mask.is_empty()));
}

// =========================================================================
// Visibility, collisions and navmesh
// =========================================================================

/// Chunks outside the world bounds neither subdivide nor render.
#[test]
fn test_world_bounds_limit_chunks() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let world_bounds = IntBox::from_center_radius(IVec3::ZERO, 16);
  let settings = OctreeSettings {
    world_bounds,
    ..settings_with(vec![lod_invoker(IVec3::ZERO, 0, 64)])
  };

  rebuild(&mut octree, &settings);

  assert!(neighbor_violations(&octree, &settings).is_empty());
  for node in octree.nodes() {
    if node.bounds().intersects(&world_bounds) {
      continue;
    }
    assert!(node.is_leaf());
    assert_eq!(node.data.settings, ChunkSettings::default());
  }
  // 4 h0 chunks per axis inside [-16, 16)
  assert_eq!(octree.visible_chunks().count(), 64);
  assert!(octree.visible_chunks().all(|node| node.height() == 0));
}

/// Shrinking the world bounds removes chunks that fell outside.
#[test]
fn test_shrinking_world_bounds_removes_chunks() {
  let mut octree = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let settings = settings_with(vec![lod_invoker(IVec3::ZERO, 2, 32)]);
  rebuild(&mut octree, &settings);
  assert_eq!(octree.visible_chunks().count(), 8);

  let shrunk = OctreeSettings {
    world_bounds: IntBox::new(IVec3::ZERO, IVec3::splat(32)),
    ..settings
  };
  let (updates, _) = rebuild(&mut octree, &shrunk);

  assert_eq!(octree.visible_chunks().count(), 1);
  let removed = updates
    .iter()
    .filter(|update| update.kind() == ChunkUpdateKind::Remove)
    .count();
  assert_eq!(removed, 7);
}

/// Shrinking the world while distance decisions stay put must not keep
/// neighbor subdivisions that now lie outside the world.
#[test]
fn test_shrinking_world_bounds_with_reused_neighbors() {
  let mut octree = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let mut mirror = MirrorSink::default();
  let settings = settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]);
  let (updates, _) = rebuild(&mut octree, &settings);
  mirror.replay(updates);

  let outside = IVec3::new(-32, 0, 0);
  assert_eq!(
    node_at(&octree, outside, 2).data.division_type,
    DivisionType::ByNeighbors
  );

  let shrunk = OctreeSettings {
    world_bounds: IntBox::new(IVec3::ZERO, IVec3::splat(32)),
    ..settings
  };
  let (updates, stats) = rebuild(&mut octree, &shrunk);
  mirror.replay(updates);

  assert!(!stats.neighbors_recomputed);
  assert!(node_at(&octree, outside, 2).is_leaf());
  assert_eq!(visible_outside_world(&octree, &shrunk), 0);
  assert_eq!(mirror.chunks, rendered_chunks(&octree));
  assert!(neighbor_violations(&octree, &shrunk).is_empty());
}

/// Lowering the culling LOD alone reuses neighbors and hides coarse chunks.
#[test]
fn test_culling_lod_change_with_reused_neighbors() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let mut mirror = MirrorSink::default();
  let settings = settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]);
  let (updates, _) = rebuild(&mut octree, &settings);
  mirror.replay(updates);
  assert!(octree.visible_chunks().any(|node| node.height() > 1));

  let culled = OctreeSettings {
    chunks_culling_lod: 1,
    ..settings.clone()
  };
  let (updates, stats) = rebuild(&mut octree, &culled);
  mirror.replay(updates);

  assert!(!stats.neighbors_recomputed);
  assert!(octree.visible_chunks().count() > 0);
  assert!(octree.visible_chunks().all(|node| node.height() <= 1));
  assert_eq!(visible_outside_world(&octree, &culled), 0);
  assert_eq!(mirror.chunks, rendered_chunks(&octree));

  let (updates, stats) = rebuild(&mut octree, &settings);
  mirror.replay(updates);

  assert!(!stats.neighbors_recomputed);
  assert!(octree.visible_chunks().any(|node| node.height() > 1));
  assert_eq!(mirror.chunks, rendered_chunks(&octree));
}

/// Toggling collisions reuses neighbors; collision chunks come and go.
#[test]
fn test_collisions_toggle_with_reused_neighbors() {
  let mut octree = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let mut mirror = MirrorSink::default();
  let position = IVec3::new(4, 4, 4);
  let settings = settings_with(vec![lod_invoker(position, 1, 1).with_collisions(2)]);
  let (updates, _) = rebuild(&mut octree, &settings);
  mirror.replay(updates);
  assert_eq!(octree.collisions_at(position), None);

  let with_collisions = OctreeSettings {
    enable_collisions: true,
    ..settings.clone()
  };
  let (updates, stats) = rebuild(&mut octree, &with_collisions);
  mirror.replay(updates);

  assert!(!stats.neighbors_recomputed);
  assert_eq!(octree.collisions_at(position), Some(0));
  assert_eq!(visible_outside_world(&octree, &with_collisions), 0);
  assert_eq!(mirror.chunks, rendered_chunks(&octree));

  let (updates, stats) = rebuild(&mut octree, &settings);
  mirror.replay(updates);

  assert!(!stats.neighbors_recomputed);
  assert_eq!(octree.collisions_at(position), None);
  assert_eq!(mirror.chunks, rendered_chunks(&octree));
}

/// Chunks above the culling LOD are never visible.
#[test]
fn test_culling_lod_hides_coarse_chunks() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    chunks_culling_lod: 1,
    ..settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)])
  };

  rebuild(&mut octree, &settings);

  assert!(octree.visible_chunks().count() > 0);
  assert!(octree.visible_chunks().all(|node| node.height() <= 1));
}

/// Collision invokers create invisible height-0 chunks under a visible root.
#[test]
fn test_collisions_subdivide_by_others() {
  let mut octree = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    enable_collisions: true,
    ..settings_with(vec![Invoker::new(IVec3::new(4, 4, 4)).with_collisions(1)])
  };

  rebuild(&mut octree, &settings);

  let tree = octree.tree();
  let root = tree.node(tree.root());
  assert_eq!(root.data.division_type, DivisionType::ByOthers);
  assert!(root.data.settings.visible);
  assert!(!root.data.settings.enable_collisions);

  let Some(leaf) = tree.leaf_at(IVec3::new(4, 4, 4)) else {
    panic!("point inside root");
  };
  let leaf = tree.node(leaf);
  assert_eq!(leaf.height(), 0);
  assert!(leaf.data.settings.enable_collisions);
  assert!(!leaf.data.settings.visible);
  assert_eq!(octree.visible_chunks().count(), 1);

  assert_eq!(octree.collisions_at(IVec3::new(4, 4, 4)), Some(0));
  assert_eq!(octree.collisions_at(IVec3::new(-20, 4, 4)), None);
}

/// Visible chunks up to the configured LOD host collisions and navmesh.
#[test]
fn test_visible_chunks_collisions_and_navmesh() {
  let mut octree = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    enable_collisions: true,
    compute_visible_chunks_collisions: true,
    visible_chunks_collisions_max_lod: 1,
    enable_navmesh: true,
    compute_visible_chunks_navmesh: true,
    visible_chunks_navmesh_max_lod: 0,
    ..settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)])
  };

  rebuild(&mut octree, &settings);

  for node in octree.visible_chunks() {
    let chunk = node.data.settings;
    assert_eq!(chunk.enable_collisions, node.height() <= 1);
    assert_eq!(chunk.enable_navmesh, node.height() == 0);
  }
  assert_eq!(octree.collisions_at(IVec3::new(4, 4, 4)), Some(0));
  assert_eq!(octree.collisions_at(IVec3::new(-20, -20, -20)), None);
}

/// Navmesh invokers need navmesh enabled in the settings.
#[test]
fn test_navmesh_invoker_requires_navmesh_enabled() {
  let invoker = Invoker::new(IVec3::new(4, 4, 4)).with_navmesh(1);

  let mut disabled = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  rebuild(&mut disabled, &settings_with(vec![invoker.clone()]));
  assert_eq!(disabled.chunk_count(), 1);

  let mut enabled = RenderOctree::new(geometry(8, 3), ChunkBudget::DEFAULT);
  let settings = OctreeSettings {
    enable_navmesh: true,
    ..settings_with(vec![invoker])
  };
  rebuild(&mut enabled, &settings);
  let Some(leaf) = enabled.tree().leaf_at(IVec3::new(4, 4, 4)) else {
    panic!("point inside root");
  };
  let leaf = enabled.tree().node(leaf);
  assert_eq!(leaf.height(), 0);
  assert!(leaf.data.settings.enable_navmesh);
}

// =========================================================================
// Queries
// =========================================================================

/// Region queries return rendered chunks overlapping the region.
#[test]
fn test_region_queries() {
  let mut octree = RenderOctree::new(geometry(8, 4), ChunkBudget::DEFAULT);
  rebuild(&mut octree, &settings_with(vec![lod_invoker(IVec3::new(4, 4, 4), 0, 1)]));
  let tree = octree.tree();
  let Some(leaf) = tree.leaf_at(IVec3::new(4, 4, 4)) else {
    panic!("point inside root");
  };
  let leaf_id = tree.node(leaf).data.chunk_id;
  let root_id = tree.node(tree.root()).data.chunk_id;

  let point = IntBox::from_point(IVec3::new(4, 4, 4));
  let to_update = octree.get_chunks_to_update_for_bounds(&point);
  assert_eq!(to_update, vec![leaf_id]);

  let mut visible: Vec<ChunkId> = Vec::new();
  let region = IntBox::from_center_radius(IVec3::ZERO, 8);
  octree.get_visible_chunks_overlapping_bounds(&region, &mut visible);
  assert!(visible.contains(&leaf_id));
  assert!(!visible.contains(&root_id));
  assert!(visible.len() > 1);
}
