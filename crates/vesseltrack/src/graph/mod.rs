//! Directed tree of tracked vessel branches.
//!
//! Nodes are bifurcation, root and leaf points referenced by index. Each
//! branch owns one edge `(start, end)` and the per-point data tracked
//! between those nodes. Topology is read from the edges: the parent of a
//! branch is the branch ending where it starts.

mod error;
mod export;

pub use error::GraphError;
pub use export::{GraphExport, LinkExport, NodeExport};

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::Point3;

use crate::geometry::{closest_branch, ClosestPoint};

/// Stable key of a branch, independent of its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchId(u32);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Branch data ────────────────────────────────────────────────────────────

/// Per-point arrays of one branch, all of the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchData {
    pub centerline: Vec<Point3<f64>>,
    pub contours: Vec<Vec<Point3<f64>>>,
    pub radii: Vec<f64>,
}

impl BranchData {
    pub fn new(
        centerline: Vec<Point3<f64>>,
        contours: Vec<Vec<Point3<f64>>>,
        radii: Vec<f64>,
    ) -> Self {
        Self {
            centerline,
            contours,
            radii,
        }
    }

    pub fn len(&self) -> usize {
        self.centerline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centerline.is_empty()
    }

    fn check(&self) -> Result<(), GraphError> {
        let n = self.centerline.len();
        if n == 0 || self.contours.len() != n || self.radii.len() != n {
            return Err(GraphError::LengthMismatch {
                centerline: n,
                contours: self.contours.len(),
                radii: self.radii.len(),
            });
        }
        Ok(())
    }

    fn tail_from(&self, start: usize) -> Self {
        Self {
            centerline: self.centerline[start..].to_vec(),
            contours: self.contours[start..].to_vec(),
            radii: self.radii[start..].to_vec(),
        }
    }

    fn truncate(&mut self, len: usize) {
        self.centerline.truncate(len);
        self.contours.truncate(len);
        self.radii.truncate(len);
    }

    /// Append `other` without its first point, which duplicates our last.
    fn append_skipping_first(&mut self, other: BranchData) {
        self.centerline.extend(other.centerline.into_iter().skip(1));
        self.contours.extend(other.contours.into_iter().skip(1));
        self.radii.extend(other.radii.into_iter().skip(1));
    }
}

/// One tracked vessel segment between two graph nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    name: String,
    edge: (usize, usize),
    data: BranchData,
}

impl Branch {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(start_node, end_node)`.
    pub fn edge(&self) -> (usize, usize) {
        self.edge
    }

    pub fn data(&self) -> &BranchData {
        &self.data
    }

    pub fn centerline(&self) -> &[Point3<f64>] {
        &self.data.centerline
    }

    pub fn contours(&self) -> &[Vec<Point3<f64>>] {
        &self.data.contours
    }

    pub fn radii(&self) -> &[f64] {
        &self.data.radii
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Graph ──────────────────────────────────────────────────────────────────

/// Tree of branches with split, merge and delete operations.
///
/// Every mutating operation validates first and leaves the graph untouched
/// when it returns an error.
#[derive(Debug, Clone, Default)]
pub struct GraphBranches {
    nodes: Vec<Point3<f64>>,
    branches: BTreeMap<BranchId, Branch>,
    next_id: u32,
}

impl GraphBranches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the graph holds no branch.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn nodes(&self) -> &[Point3<f64>] {
        &self.nodes
    }

    /// Append a node and return its index.
    pub fn add_node(&mut self, p: Point3<f64>) -> usize {
        self.nodes.push(p);
        self.nodes.len() - 1
    }

    /// Edges in branch creation order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.branches.values().map(|b| b.edge).collect()
    }

    /// Names in branch creation order.
    pub fn names(&self) -> Vec<&str> {
        self.branches.values().map(|b| b.name.as_str()).collect()
    }

    pub fn branch_ids(&self) -> Vec<BranchId> {
        self.branches.keys().copied().collect()
    }

    pub fn branches(&self) -> impl Iterator<Item = (BranchId, &Branch)> {
        self.branches.iter().map(|(id, b)| (*id, b))
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(&id)
    }

    pub fn contains(&self, id: BranchId) -> bool {
        self.branches.contains_key(&id)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BranchId> {
        self.branches
            .iter()
            .find(|(_, b)| b.name == name)
            .map(|(id, _)| *id)
    }

    /// Like [`GraphBranches::id_by_name`], failing with `UnknownName`.
    pub fn require_name(&self, name: &str) -> Result<BranchId, GraphError> {
        self.id_by_name(name)
            .ok_or_else(|| GraphError::UnknownName(name.to_owned()))
    }

    pub fn branch_by_name(&self, name: &str) -> Option<&Branch> {
        self.branches.values().find(|b| b.name == name)
    }

    pub fn centerlines(&self) -> Vec<&[Point3<f64>]> {
        self.branches
            .values()
            .map(|b| b.data.centerline.as_slice())
            .collect()
    }

    pub fn parent_of(&self, id: BranchId) -> Option<BranchId> {
        let start = self.branches.get(&id)?.edge.0;
        self.branches
            .iter()
            .find(|(k, b)| **k != id && b.edge.1 == start)
            .map(|(k, _)| *k)
    }

    /// Children in creation order.
    pub fn children_of(&self, id: BranchId) -> Vec<BranchId> {
        let Some(end) = self.branches.get(&id).map(|b| b.edge.1) else {
            return Vec::new();
        };
        self.branches
            .iter()
            .filter(|(k, b)| **k != id && b.edge.0 == end)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn is_leaf(&self, id: BranchId) -> bool {
        self.children_of(id).is_empty()
    }

    /// The branch without a parent.
    pub fn root_branch(&self) -> Option<BranchId> {
        self.branches
            .keys()
            .copied()
            .find(|&id| self.parent_of(id).is_none())
    }

    /// Start node of the root branch.
    pub fn root_node(&self) -> Option<usize> {
        self.root_branch()
            .and_then(|id| self.branches.get(&id))
            .map(|b| b.edge.0)
    }

    /// Branch and centerline point nearest to `p`.
    pub fn closest(&self, p: &Point3<f64>) -> Option<ClosestPoint<BranchId>> {
        closest_branch(
            p,
            self.branches
                .iter()
                .map(|(id, b)| (*id, b.data.centerline.as_slice())),
        )
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.branches.clear();
        self.next_id = 0;
    }

    fn get(&self, id: BranchId) -> Result<&Branch, GraphError> {
        self.branches.get(&id).ok_or(GraphError::UnknownBranch(id))
    }

    fn get_mut(&mut self, id: BranchId) -> Result<&mut Branch, GraphError> {
        self.branches
            .get_mut(&id)
            .ok_or(GraphError::UnknownBranch(id))
    }

    fn check_node(&self, index: usize) -> Result<(), GraphError> {
        if index >= self.nodes.len() {
            return Err(GraphError::IndexOutOfRange {
                index,
                len: self.nodes.len(),
            });
        }
        Ok(())
    }

    fn name_taken(&self, name: &str) -> bool {
        self.branches.values().any(|b| b.name == name)
    }

    /// `"b{n}"` with `n` the branch count after insertion, bumped until free.
    fn fresh_name(&self) -> String {
        let mut n = self.branches.len() + 1;
        loop {
            let name = format!("b{}", n);
            if !self.name_taken(&name) {
                return name;
            }
            n += 1;
        }
    }

    fn insert_branch(&mut self, name: String, edge: (usize, usize), data: BranchData) -> BranchId {
        let id = BranchId(self.next_id);
        self.next_id += 1;
        self.branches.insert(id, Branch { name, edge, data });
        id
    }

    // ── Structural operations ──────────────────────────────────────────────

    /// Add a branch on `edge`.
    ///
    /// A child edge must start at the parent's end node; a parentless
    /// branch is only accepted in an empty graph. Unless the branch comes
    /// from a split, the parent is then collapsed with its child if that
    /// child is its only one, in which case the returned id no longer
    /// exists (see [`GraphBranches::contains`]).
    pub fn create_new_branch(
        &mut self,
        edge: (usize, usize),
        data: BranchData,
        parent: Option<BranchId>,
        from_split: bool,
    ) -> Result<BranchId, GraphError> {
        data.check()?;
        self.check_node(edge.0)?;
        self.check_node(edge.1)?;
        match parent {
            Some(pid) => {
                let expected = self.get(pid)?.edge.1;
                if expected != edge.0 {
                    return Err(GraphError::EdgeMismatch {
                        expected,
                        got: edge.0,
                    });
                }
            }
            None if !self.branches.is_empty() => return Err(GraphError::SecondRoot),
            None => {}
        }

        let name = self.fresh_name();
        tracing::info!(
            "new branch {} on edge ({}, {}) with {} points",
            name,
            edge.0,
            edge.1,
            data.len()
        );
        let id = self.insert_branch(name, edge, data);
        if let (false, Some(pid)) = (from_split, parent) {
            self.merge_only_child(pid)?;
        }
        Ok(id)
    }

    /// Truncate a branch to its first `cut` points.
    pub fn update_parent_branch(&mut self, id: BranchId, cut: usize) -> Result<(), GraphError> {
        let branch = self.get_mut(id)?;
        let len = branch.len();
        if cut == 0 || cut > len {
            return Err(GraphError::IndexOutOfRange { index: cut, len });
        }
        branch.data.truncate(cut);
        Ok(())
    }

    /// Split a branch at interior point `point_idx`.
    ///
    /// The branch keeps points `..=point_idx` and now ends at a new node
    /// placed there; the remainder becomes a child branch. Returns the data
    /// of the split point so tracking can start from it.
    pub fn split_branch(
        &mut self,
        id: BranchId,
        point_idx: usize,
    ) -> Result<(Point3<f64>, f64, Vec<Point3<f64>>), GraphError> {
        let branch = self.get(id)?;
        let len = branch.len();
        if point_idx == 0 || point_idx + 1 >= len {
            return Err(GraphError::IndexOutOfRange {
                index: point_idx,
                len,
            });
        }
        let head = (
            branch.data.centerline[point_idx],
            branch.data.radii[point_idx],
            branch.data.contours[point_idx].clone(),
        );
        let remainder = branch.data.tail_from(point_idx);
        let name = branch.name.clone();

        self.update_parent_branch(id, point_idx + 1)?;
        let node = self.add_node(head.0);
        let branch = self.get_mut(id)?;
        let old_end = branch.edge.1;
        branch.edge.1 = node;
        self.create_new_branch((node, old_end), remainder, Some(id), true)?;

        tracing::info!("split branch {} at point {}", name, point_idx);
        Ok(head)
    }

    /// Collapse `id` with its child if it has exactly one.
    ///
    /// The child's points (minus its first, shared one) are appended, the
    /// junction node is removed and the child's branch disappears. Returns
    /// whether a merge happened.
    pub fn merge_only_child(&mut self, id: BranchId) -> Result<bool, GraphError> {
        self.get(id)?;
        let children = self.children_of(id);
        let [child_id] = children.as_slice() else {
            return Ok(false);
        };
        let child_id = *child_id;

        let junction = self.get(child_id)?.edge.0;
        self.delete_node(junction)?;
        let child = self
            .branches
            .remove(&child_id)
            .ok_or(GraphError::UnknownBranch(child_id))?;
        let parent = self.get_mut(id)?;
        parent.edge.1 = child.edge.1;
        parent.data.append_skipping_first(child.data);

        tracing::info!("merged branch {} into {}", child.name, parent.name);
        Ok(true)
    }

    /// Remove node `index`, shifting every edge index above it down by one.
    /// Edges that referenced the removed node are left for the caller.
    pub fn delete_node(&mut self, index: usize) -> Result<Point3<f64>, GraphError> {
        self.check_node(index)?;
        let p = self.nodes.remove(index);
        for b in self.branches.values_mut() {
            if b.edge.0 > index {
                b.edge.0 -= 1;
            }
            if b.edge.1 > index {
                b.edge.1 -= 1;
            }
        }
        Ok(p)
    }

    /// Delete a branch and all its descendants. See [`GraphBranches::delete_branch_with`].
    pub fn delete_branch(&mut self, id: BranchId) -> Result<bool, GraphError> {
        self.delete_branch_with(id, |_| true)
    }

    /// Delete a branch and all its descendants.
    ///
    /// The root cannot be deleted. For a branch with children `confirm` is
    /// asked first; declining returns `Ok(false)` with no change. Afterwards
    /// the former parent is collapsed with its remaining child if it has
    /// only one.
    pub fn delete_branch_with<F>(&mut self, id: BranchId, mut confirm: F) -> Result<bool, GraphError>
    where
        F: FnMut(&str) -> bool,
    {
        let name = self.get(id)?.name.clone();
        let Some(parent) = self.parent_of(id) else {
            return Err(GraphError::RootDeletion);
        };
        if !self.is_leaf(id) && !confirm(&name) {
            return Ok(false);
        }
        self.delete_subtree(id)?;
        self.merge_only_child(parent)?;
        Ok(true)
    }

    fn delete_subtree(&mut self, id: BranchId) -> Result<(), GraphError> {
        for child in self.children_of(id) {
            self.delete_subtree(child)?;
        }
        let end = self.get(id)?.edge.1;
        self.delete_node(end)?;
        if let Some(b) = self.branches.remove(&id) {
            tracing::info!("deleted branch {}", b.name);
        }
        Ok(())
    }

    /// Give a branch a new unique, non-empty name.
    pub fn rename_branch(&mut self, id: BranchId, new_name: &str) -> Result<(), GraphError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(GraphError::EmptyName);
        }
        if self.get(id)?.name == new_name {
            return Ok(());
        }
        if self.name_taken(new_name) {
            return Err(GraphError::DuplicateName(new_name.to_owned()));
        }
        self.get_mut(id)?.name = new_name.to_owned();
        Ok(())
    }

    /// Cut a leaf branch after `point_idx`; its end node moves to that point.
    pub fn remove_branch_end(&mut self, id: BranchId, point_idx: usize) -> Result<(), GraphError> {
        let branch = self.get(id)?;
        if !self.is_leaf(id) {
            return Err(GraphError::NotALeaf(branch.name.clone()));
        }
        let len = branch.len();
        if point_idx == 0 || point_idx >= len {
            return Err(GraphError::IndexOutOfRange {
                index: point_idx,
                len,
            });
        }
        if point_idx + 1 == len {
            return Ok(());
        }
        let p = branch.data.centerline[point_idx];
        let end = branch.edge.1;
        self.check_node(end)?;
        self.nodes[end] = p;
        self.update_parent_branch(id, point_idx + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(zs: &[f64]) -> BranchData {
        let centerline: Vec<Point3<f64>> = zs.iter().map(|&z| Point3::new(0.0, 0.0, z)).collect();
        let contours = centerline
            .iter()
            .map(|p| vec![Point3::new(p.x + 1.0, p.y, p.z)])
            .collect();
        let radii = vec![1.0; centerline.len()];
        BranchData::new(centerline, contours, radii)
    }

    fn side(x_end: f64) -> BranchData {
        let centerline = vec![Point3::new(0.0, 0.0, 2.0), Point3::new(x_end, 0.0, 2.0)];
        let contours = centerline.iter().map(|p| vec![*p]).collect();
        BranchData::new(centerline, contours, vec![0.5, 0.5])
    }

    /// Root branch along z from 0 to 5.
    fn single() -> (GraphBranches, BranchId) {
        let mut g = GraphBranches::new();
        let a = g.add_node(Point3::origin());
        let b = g.add_node(Point3::new(0.0, 0.0, 5.0));
        let id = g
            .create_new_branch((a, b), data(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), None, false)
            .unwrap();
        (g, id)
    }

    /// `single` split at z = 2 with a side branch along x.
    fn bifurcation() -> (GraphBranches, BranchId, BranchId) {
        let (mut g, root) = single();
        g.split_branch(root, 2).unwrap();
        let end = g.add_node(Point3::new(4.0, 0.0, 2.0));
        let start = g.branch(root).unwrap().edge().1;
        let s = g
            .create_new_branch((start, end), side(4.0), Some(root), false)
            .unwrap();
        (g, root, s)
    }

    #[test]
    fn first_branch_is_root_and_only_root() {
        let (mut g, id) = single();
        assert_eq!(g.names(), vec!["b1"]);
        assert_eq!(g.root_branch(), Some(id));
        assert_eq!(g.root_node(), Some(0));
        assert!(g.is_leaf(id));
        let err = g
            .create_new_branch((0, 1), data(&[0.0, 1.0]), None, false)
            .unwrap_err();
        assert_eq!(err, GraphError::SecondRoot);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn create_rejects_bad_input() {
        let (mut g, id) = single();
        let err = g
            .create_new_branch((0, 1), data(&[5.0, 6.0]), Some(id), false)
            .unwrap_err();
        assert_eq!(err, GraphError::EdgeMismatch { expected: 1, got: 0 });
        let err = g
            .create_new_branch((1, 7), data(&[5.0, 6.0]), Some(id), false)
            .unwrap_err();
        assert_eq!(err, GraphError::IndexOutOfRange { index: 7, len: 2 });
        let mut bad = data(&[5.0, 6.0]);
        bad.radii.pop();
        let err = g.create_new_branch((1, 0), bad, Some(id), false).unwrap_err();
        assert!(matches!(err, GraphError::LengthMismatch { .. }));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn split_then_merge_restores_branch() {
        let (mut g, id) = single();
        let before = g.branch(id).unwrap().clone();

        let (p, r, contour) = g.split_branch(id, 2).unwrap();
        assert_eq!(p, Point3::new(0.0, 0.0, 2.0));
        assert_eq!(r, 1.0);
        assert_eq!(contour, vec![Point3::new(1.0, 0.0, 2.0)]);
        assert_eq!(g.nodes().len(), 3);
        assert_eq!(g.edges(), vec![(0, 2), (2, 1)]);
        assert_eq!(g.branch(id).unwrap().len(), 3);
        let child = g.children_of(id);
        assert_eq!(child.len(), 1);
        assert_eq!(g.branch(child[0]).unwrap().centerline()[0], p);
        assert_eq!(g.parent_of(child[0]), Some(id));

        assert!(g.merge_only_child(id).unwrap());
        assert_eq!(g.branch(id), Some(&before));
        assert_eq!(g.nodes().len(), 2);
        assert_eq!(g.edges(), vec![(0, 1)]);
        assert_eq!(g.names(), vec!["b1"]);
    }

    #[test]
    fn split_rejects_endpoints() {
        let (mut g, id) = single();
        assert!(g.split_branch(id, 0).is_err());
        assert!(g.split_branch(id, 5).is_err());
        assert_eq!(g.nodes().len(), 2);
        assert_eq!(g.branch(id).unwrap().len(), 6);
    }

    #[test]
    fn bifurcation_has_four_nodes_and_three_edges() {
        let (mut g, root, s) = bifurcation();
        assert_eq!(g.nodes().len(), 4);
        assert_eq!(g.edges(), vec![(0, 2), (2, 1), (2, 3)]);
        assert_eq!(g.names(), vec!["b1", "b2", "b3"]);
        assert_eq!(g.children_of(root).len(), 2);
        assert_eq!(g.parent_of(s), Some(root));
        assert!(!g.merge_only_child(root).unwrap());
    }

    #[test]
    fn continuation_from_tip_merges_into_parent() {
        let (mut g, id) = single();
        let end = g.add_node(Point3::new(0.0, 0.0, 7.0));
        let new = g
            .create_new_branch((1, end), data(&[5.0, 6.0, 7.0]), Some(id), false)
            .unwrap();
        assert!(!g.contains(new));
        assert_eq!(g.len(), 1);
        assert_eq!(g.branch(id).unwrap().len(), 8);
        assert_eq!(g.nodes(), &[Point3::origin(), Point3::new(0.0, 0.0, 7.0)]);
        assert_eq!(g.edges(), vec![(0, 1)]);
    }

    #[test]
    fn delete_node_shifts_higher_indices() {
        let mut g = GraphBranches::new();
        for z in 0..4 {
            g.add_node(Point3::new(0.0, 0.0, z as f64));
        }
        let a = g.create_new_branch((0, 1), data(&[0.0, 1.0]), None, false).unwrap();
        let b = g
            .create_new_branch((1, 2), data(&[1.0, 2.0]), Some(a), true)
            .unwrap();
        g.create_new_branch((2, 3), data(&[2.0, 3.0]), Some(b), true)
            .unwrap();

        let removed = g.delete_node(1).unwrap();
        assert_eq!(removed, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(g.nodes().len(), 3);
        assert_eq!(g.edges(), vec![(0, 1), (1, 1), (1, 2)]);
        assert!(g.delete_node(3).is_err());
    }

    #[test]
    fn deleting_side_branch_merges_parent_back() {
        let (mut g, root, s) = bifurcation();
        let (original, _) = single();
        assert!(g.delete_branch(s).unwrap());
        assert_eq!(g.nodes(), original.nodes());
        assert_eq!(g.edges(), original.edges());
        assert_eq!(g.names(), vec!["b1"]);
        assert_eq!(g.branch(root).unwrap().data(), original.branch(root).unwrap().data());
    }

    #[test]
    fn root_cannot_be_deleted() {
        let (mut g, root, _) = bifurcation();
        assert_eq!(g.delete_branch(root), Err(GraphError::RootDeletion));
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn deleting_subtree_asks_once_and_removes_descendants() {
        let (mut g, root, _) = bifurcation();
        let trunk = g.children_of(root)[0];
        // Give the trunk two children of its own.
        let trunk_end = g.branch(trunk).unwrap().edge().1;
        for x in [1.0, -1.0] {
            let n = g.add_node(Point3::new(x, 0.0, 6.0));
            g.create_new_branch((trunk_end, n), data(&[5.0, 6.0]), Some(trunk), true)
                .unwrap();
        }
        assert_eq!(g.len(), 5);

        let mut asked = Vec::new();
        let declined = g
            .delete_branch_with(trunk, |name| {
                asked.push(name.to_owned());
                false
            })
            .unwrap();
        assert!(!declined);
        assert_eq!(g.len(), 5);

        asked.clear();
        let deleted = g
            .delete_branch_with(trunk, |name| {
                asked.push(name.to_owned());
                true
            })
            .unwrap();
        assert!(deleted);
        assert_eq!(asked, vec!["b2"]);
        // Root and side branch are left; the side branch is merged into the root.
        assert_eq!(g.len(), 1);
        assert_eq!(g.nodes().len(), 2);
        assert_eq!(g.edges(), vec![(0, 1)]);
        let root_line = g.branch(root).unwrap().centerline();
        assert_eq!(*root_line.last().unwrap(), Point3::new(4.0, 0.0, 2.0));
    }

    #[test]
    fn names_stay_unique() {
        let (mut g, root) = single();
        g.rename_branch(root, "b2").unwrap();
        g.split_branch(root, 3).unwrap();
        assert_eq!(g.names(), vec!["b2", "b3"]);

        let child = g.children_of(root)[0];
        assert_eq!(
            g.rename_branch(child, "b2"),
            Err(GraphError::DuplicateName("b2".into()))
        );
        assert_eq!(g.rename_branch(child, "  "), Err(GraphError::EmptyName));
        assert_eq!(g.names(), vec!["b2", "b3"]);
        g.rename_branch(child, "trunk").unwrap();
        assert_eq!(g.id_by_name("trunk"), Some(child));
        assert_eq!(g.require_name("trunk"), Ok(child));
        assert_eq!(g.require_name("b3"), Err(GraphError::UnknownName("b3".into())));
        assert_eq!(g.branch_by_name("b2").map(|b| b.len()), Some(4));
    }

    #[test]
    fn remove_branch_end_moves_end_node() {
        let (mut g, root, s) = bifurcation();
        assert_eq!(
            g.remove_branch_end(root, 1),
            Err(GraphError::NotALeaf("b1".into()))
        );
        let trunk = g.children_of(root)[0];
        g.remove_branch_end(trunk, 1).unwrap();
        let b = g.branch(trunk).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(g.nodes()[b.edge().1], Point3::new(0.0, 0.0, 3.0));
        assert!(g.remove_branch_end(s, 0).is_err());
        assert!(g.remove_branch_end(s, 2).is_err());
        g.remove_branch_end(s, 1).unwrap();
        assert_eq!(g.branch(s).unwrap().len(), 2);
    }

    #[test]
    fn closest_reports_branch_and_point() {
        let (g, root, s) = bifurcation();
        let hit = g.closest(&Point3::new(3.6, 0.3, 2.0)).unwrap();
        assert_eq!(hit.branch, s);
        assert_eq!(hit.point_index, 1);
        let hit = g.closest(&Point3::new(0.2, 0.0, 0.9)).unwrap();
        assert_eq!(hit.branch, root);
        assert_eq!(hit.point_index, 1);
    }

    #[test]
    fn clear_empties_everything() {
        let (mut g, _, _) = bifurcation();
        g.clear();
        assert!(g.is_empty());
        assert!(g.nodes().is_empty());
        assert_eq!(g.root_node(), None);
    }
}
