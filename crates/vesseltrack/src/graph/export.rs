//! Node-link serialization of the branch graph.

use std::collections::HashSet;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::{BranchData, BranchId, GraphBranches, GraphError};
use crate::geometry::contour_radius;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExport {
    pub id: usize,
    pub pos: [f64; 3],
}

/// One branch, stored on the edge `source -> target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkExport {
    pub source: usize,
    pub target: usize,
    pub name: String,
    #[serde(alias = "center_line")]
    pub centerline: Vec<[f64; 3]>,
    #[serde(default)]
    pub contour_points: Vec<Vec<[f64; 3]>>,
}

/// Directed node-link graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    #[serde(default = "directed_default")]
    pub directed: bool,
    #[serde(default)]
    pub multigraph: bool,
    #[serde(default)]
    pub graph: serde_json::Map<String, serde_json::Value>,
    pub nodes: Vec<NodeExport>,
    /// Branches, parents before children.
    #[serde(alias = "edges")]
    pub links: Vec<LinkExport>,
}

fn directed_default() -> bool {
    true
}

fn to_array(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn invalid(msg: impl Into<String>) -> GraphError {
    GraphError::InvalidExport(msg.into())
}

impl GraphBranches {
    /// Snapshot in node-link form, links in depth-first order from the root.
    pub fn export(&self) -> GraphExport {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(id, p)| NodeExport {
                id,
                pos: to_array(p),
            })
            .collect();

        let mut order = Vec::with_capacity(self.branches.len());
        if let Some(root) = self.root_branch() {
            self.depth_first(root, &mut order);
        }
        // Unreachable branches only exist in hand-built graphs; keep them.
        for id in self.branches.keys() {
            if !order.contains(id) {
                order.push(*id);
            }
        }

        let links = order
            .iter()
            .filter_map(|id| self.branches.get(id))
            .map(|b| LinkExport {
                source: b.edge.0,
                target: b.edge.1,
                name: b.name.clone(),
                centerline: b.data.centerline.iter().map(to_array).collect(),
                contour_points: b
                    .data
                    .contours
                    .iter()
                    .map(|c| c.iter().map(to_array).collect())
                    .collect(),
            })
            .collect();

        GraphExport {
            directed: true,
            multigraph: false,
            graph: serde_json::Map::new(),
            nodes,
            links,
        }
    }

    /// Pre-order walk from `id`, each branch visited once.
    fn depth_first(&self, id: BranchId, order: &mut Vec<BranchId>) {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            stack.extend(self.children_of(current).into_iter().rev());
        }
    }

    /// Exactly one parentless branch, and every branch reachable from it.
    fn check_topology(&self) -> Result<(), GraphError> {
        if self.branches.is_empty() {
            return Ok(());
        }
        let mut roots = self
            .branches
            .keys()
            .copied()
            .filter(|&id| self.parent_of(id).is_none());
        let root = roots.next().ok_or_else(|| invalid("no root branch"))?;
        if roots.next().is_some() {
            return Err(GraphError::SecondRoot);
        }
        let mut order = Vec::with_capacity(self.branches.len());
        self.depth_first(root, &mut order);
        if order.len() != self.branches.len() {
            return Err(invalid(format!(
                "{} of {} branches unreachable from the root",
                self.branches.len() - order.len(),
                self.branches.len()
            )));
        }
        Ok(())
    }

    /// Rebuild a graph, recomputing radii from the contour points.
    pub fn from_export(export: &GraphExport) -> Result<Self, GraphError> {
        let n = export.nodes.len();
        let mut nodes: Vec<Option<Point3<f64>>> = vec![None; n];
        for node in &export.nodes {
            let slot = nodes.get_mut(node.id).ok_or(GraphError::IndexOutOfRange {
                index: node.id,
                len: n,
            })?;
            if slot.is_some() {
                return Err(invalid(format!("node id {} appears twice", node.id)));
            }
            *slot = Some(Point3::from(node.pos));
        }

        let mut graph = GraphBranches::new();
        graph.nodes = nodes.into_iter().flatten().collect();

        let mut targets = HashSet::new();
        for link in &export.links {
            graph.check_node(link.source)?;
            graph.check_node(link.target)?;
            if link.name.trim().is_empty() {
                return Err(GraphError::EmptyName);
            }
            if graph.name_taken(&link.name) {
                return Err(GraphError::DuplicateName(link.name.clone()));
            }
            if link.source == link.target {
                return Err(invalid(format!("branch {:?} is a self-loop", link.name)));
            }
            if !targets.insert(link.target) {
                return Err(invalid(format!("node {} has two incoming edges", link.target)));
            }

            let centerline: Vec<Point3<f64>> =
                link.centerline.iter().copied().map(Point3::from).collect();
            let contours: Vec<Vec<Point3<f64>>> = link
                .contour_points
                .iter()
                .map(|c| c.iter().copied().map(Point3::from).collect())
                .collect();
            let radii = centerline
                .iter()
                .zip(&contours)
                .map(|(p, c)| contour_radius(p, c))
                .collect();
            let data = BranchData::new(centerline, contours, radii);
            data.check()?;
            graph.insert_branch(link.name.clone(), (link.source, link.target), data);
        }

        graph.check_topology()?;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export())
    }

    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        let export: GraphExport =
            serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
        Self::from_export(&export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_graph() -> GraphBranches {
        let mut g = GraphBranches::new();
        let a = g.add_node(Point3::origin());
        let b = g.add_node(Point3::new(0.0, 0.0, 4.0));
        let line: Vec<Point3<f64>> = (0..5).map(|z| Point3::new(0.0, 0.0, z as f64)).collect();
        let contours = line
            .iter()
            .map(|p| vec![Point3::new(2.0, 0.0, p.z), Point3::new(0.0, -1.5, p.z)])
            .collect();
        let root = g
            .create_new_branch((a, b), BranchData::new(line, contours, vec![1.5; 5]), None, false)
            .unwrap();
        g.split_branch(root, 2).unwrap();
        let tip = g.add_node(Point3::new(3.0, 0.0, 2.0));
        let side_line = vec![Point3::new(0.0, 0.0, 2.0), Point3::new(3.0, 0.0, 2.0)];
        let side_contours = side_line.iter().map(|p| vec![p + nalgebra::Vector3::y()]).collect();
        let start = g.branch(root).unwrap().edge().1;
        g.create_new_branch(
            (start, tip),
            BranchData::new(side_line, side_contours, vec![1.0; 2]),
            Some(root),
            false,
        )
        .unwrap();
        g
    }

    #[test]
    fn export_lists_parents_first() {
        let g = sample_graph();
        let e = g.export();
        assert!(e.directed);
        assert!(!e.multigraph);
        assert_eq!(e.nodes.len(), 4);
        assert_eq!(e.nodes[3], NodeExport { id: 3, pos: [3.0, 0.0, 2.0] });
        let names: Vec<&str> = e.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["b1", "b2", "b3"]);
        assert_eq!(e.links[0].source, 0);
        assert_eq!(e.links[1].source, e.links[0].target);
        assert_eq!(e.links[2].source, e.links[0].target);
    }

    #[test]
    fn json_round_trip_rebuilds_graph() {
        let g = sample_graph();
        let json = g.to_json().unwrap();
        let back = GraphBranches::from_json(&json).unwrap();
        assert_eq!(back.nodes(), g.nodes());
        assert_eq!(back.edges(), g.edges());
        assert_eq!(back.names(), g.names());
        for (a, b) in back.centerlines().iter().zip(g.centerlines()) {
            assert_eq!(*a, b);
        }
        let root = back.root_branch().unwrap();
        for r in back.branch(root).unwrap().radii() {
            assert_relative_eq!(*r, 1.5);
        }
    }

    #[test]
    fn import_accepts_legacy_keys() {
        let text = r#"{
            "nodes": [{"id": 1, "pos": [0, 0, 3]}, {"id": 0, "pos": [0, 0, 0]}],
            "edges": [{
                "source": 0, "target": 1, "name": "trunk",
                "center_line": [[0, 0, 0], [0, 0, 3]],
                "contour_points": [[[1, 0, 0]], [[0, 2, 3]]]
            }]
        }"#;
        let g = GraphBranches::from_json(text).unwrap();
        assert_eq!(g.nodes()[1], Point3::new(0.0, 0.0, 3.0));
        assert_eq!(g.names(), vec!["trunk"]);
        assert_eq!(g.branch_by_name("trunk").unwrap().radii(), &[1.0, 2.0]);
    }

    #[test]
    fn import_rejects_inconsistent_documents() {
        let mut e = sample_graph().export();
        e.links[2].name = "b1".into();
        assert_eq!(
            GraphBranches::from_export(&e).unwrap_err(),
            GraphError::DuplicateName("b1".into())
        );

        let mut e = sample_graph().export();
        e.links[1].target = 9;
        assert!(matches!(
            GraphBranches::from_export(&e),
            Err(GraphError::IndexOutOfRange { index: 9, .. })
        ));

        let mut e = sample_graph().export();
        e.links[1].contour_points.pop();
        assert!(matches!(
            GraphBranches::from_export(&e),
            Err(GraphError::LengthMismatch { .. })
        ));

        let mut e = sample_graph().export();
        e.links[2].source = 3;
        e.links[2].target = 2;
        assert!(GraphBranches::from_export(&e).is_err());

        let mut e = sample_graph().export();
        e.links[2].source = 3;
        assert!(matches!(
            GraphBranches::from_export(&e),
            Err(GraphError::InvalidExport(_))
        ));

        assert!(matches!(
            GraphBranches::from_json("{"),
            Err(GraphError::InvalidExport(_))
        ));
    }

    fn link(source: usize, target: usize, name: &str) -> LinkExport {
        LinkExport {
            source,
            target,
            name: name.into(),
            centerline: vec![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            contour_points: vec![vec![[1.0, 0.0, 0.0]], vec![[1.0, 0.0, 1.0]]],
        }
    }

    fn document(n_nodes: usize, links: Vec<LinkExport>) -> GraphExport {
        GraphExport {
            directed: true,
            multigraph: false,
            graph: serde_json::Map::new(),
            nodes: (0..n_nodes)
                .map(|id| NodeExport {
                    id,
                    pos: [0.0, 0.0, id as f64],
                })
                .collect(),
            links,
        }
    }

    #[test]
    fn import_rejects_rootless_document() {
        let e = document(2, vec![link(0, 1, "a"), link(1, 0, "b")]);
        assert!(matches!(
            GraphBranches::from_export(&e),
            Err(GraphError::InvalidExport(_))
        ));
    }

    #[test]
    fn import_rejects_cycle_beside_root() {
        let e = document(4, vec![link(0, 1, "a"), link(2, 3, "b"), link(3, 2, "c")]);
        assert!(matches!(
            GraphBranches::from_export(&e),
            Err(GraphError::InvalidExport(_))
        ));
    }

    #[test]
    fn import_rejects_second_root() {
        let e = document(4, vec![link(0, 1, "a"), link(2, 3, "b")]);
        assert_eq!(
            GraphBranches::from_export(&e).unwrap_err(),
            GraphError::SecondRoot
        );
    }

    #[test]
    fn import_rejects_self_loop() {
        let e = document(2, vec![link(0, 1, "a"), link(1, 1, "b")]);
        assert!(GraphBranches::from_export(&e).is_err());
    }

    #[test]
    fn import_accepts_empty_and_tree_documents() {
        let g = GraphBranches::from_export(&document(0, Vec::new())).unwrap();
        assert!(g.is_empty());

        let e = document(4, vec![link(0, 1, "a"), link(1, 2, "b"), link(1, 3, "c")]);
        let mut g = GraphBranches::from_export(&e).unwrap();
        assert_eq!(g.root_node(), Some(0));
        let b = g.id_by_name("b").unwrap();
        assert!(g.delete_branch(b).unwrap());
        assert_eq!(g.names(), vec!["a"]);
    }
}
