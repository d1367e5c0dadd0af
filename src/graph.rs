//! k-NN similarity graph over cells.
//!
//! Arena layout: vertices and edges live in flat vectors and refer to each
//! other by index; `adjacency[v]` lists the edges incident to vertex `v`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::CellId;
use crate::pairs::PairsView;

pub type VertexIndex = u32;
pub type EdgeIndex = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    /// Global cell id.
    pub cell_id: CellId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub v0: VertexIndex,
    pub v1: VertexIndex,
    pub similarity: f32,
}

impl Edge {
    /// The endpoint that is not `v`.
    pub fn other(&self, v: VertexIndex) -> VertexIndex {
        if self.v0 == v {
            self.v1
        } else {
            self.v0
        }
    }
}

/// Graph construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphParams {
    /// Minimum similarity for an edge.
    pub similarity_threshold: f64,
    /// At most this many of each cell's stored pairs are used.
    pub k: usize,
    pub keep_isolated_vertices: bool,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            k: 20,
            keep_isolated_vertices: false,
        }
    }
}

/// Undirected graph with one vertex per cell and one edge per similar pair.
#[derive(Debug, Clone, Default)]
pub struct SimilarityGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<EdgeIndex>>,
}

impl SimilarityGraph {
    /// Build from sorted similar pairs.
    ///
    /// Every cell contributes edges to its first `k` stored partners with
    /// similarity at least the threshold. A pair listed by both cells gives a
    /// single edge.
    pub fn from_pairs<V: PairsView + ?Sized>(pairs: &V, params: &GraphParams) -> Result<Self> {
        if params.k == 0 {
            return Err(Error::InvalidParameter("graph k must be >= 1".to_string()));
        }
        let n = pairs.cell_count();

        let mut seen: HashSet<(CellId, CellId)> = HashSet::new();
        let mut local_edges: Vec<(CellId, CellId, f32)> = Vec::new();
        for cell0 in 0..n as CellId {
            for pair in pairs.pairs(cell0).iter().take(params.k) {
                if f64::from(pair.similarity) < params.similarity_threshold {
                    continue;
                }
                let key = (cell0.min(pair.cell_id), cell0.max(pair.cell_id));
                if seen.insert(key) {
                    local_edges.push((key.0, key.1, pair.similarity));
                }
            }
        }

        // Local cell id -> vertex index.
        let mut vertex_of = vec![None; n];
        let mut vertices = Vec::new();
        let connected: HashSet<CellId> = local_edges.iter().flat_map(|&(a, b, _)| [a, b]).collect();
        for cell in 0..n as CellId {
            if params.keep_isolated_vertices || connected.contains(&cell) {
                vertex_of[cell as usize] = Some(vertices.len() as VertexIndex);
                vertices.push(Vertex {
                    cell_id: pairs.global_cell_id(cell),
                });
            }
        }

        let mut graph = Self {
            adjacency: vec![Vec::new(); vertices.len()],
            vertices,
            edges: Vec::with_capacity(local_edges.len()),
        };
        for (a, b, similarity) in local_edges {
            if let (Some(v0), Some(v1)) = (vertex_of[a as usize], vertex_of[b as usize]) {
                graph.add_edge(v0, v1, similarity);
            }
        }
        debug!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "built similarity graph"
        );
        Ok(graph)
    }

    fn add_edge(&mut self, v0: VertexIndex, v1: VertexIndex, similarity: f32) {
        let e = self.edges.len() as EdgeIndex;
        self.edges.push(Edge { v0, v1, similarity });
        self.adjacency[v0 as usize].push(e);
        self.adjacency[v1 as usize].push(e);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, v: VertexIndex) -> &Vertex {
        &self.vertices[v as usize]
    }

    pub fn edge(&self, e: EdgeIndex) -> &Edge {
        &self.edges[e as usize]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn degree(&self, v: VertexIndex) -> usize {
        self.adjacency[v as usize].len()
    }

    /// Neighbors of `v` with the similarity of the connecting edge.
    pub fn neighbors(&self, v: VertexIndex) -> impl Iterator<Item = (VertexIndex, f32)> + '_ {
        self.adjacency[v as usize].iter().map(move |&e| {
            let edge = &self.edges[e as usize];
            (edge.other(v), edge.similarity)
        })
    }

    /// Vertex of a global cell id, if the cell is in the graph.
    pub fn vertex_of_cell(&self, cell_id: CellId) -> Option<VertexIndex> {
        self.vertices
            .iter()
            .position(|v| v.cell_id == cell_id)
            .map(|i| i as VertexIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CellSet, GeneSet};
    use crate::pairs::{AdmissionPolicy, SimilarPairs};

    fn pairs() -> SimilarPairs {
        let cells = CellSet::from_sorted(vec![2, 4, 6, 8]).unwrap();
        let mut s = SimilarPairs::new(3, GeneSet::full(3), cells, AdmissionPolicy::LinearScan).unwrap();
        s.add(0, 1, 0.9);
        s.add(0, 2, 0.6);
        s.add(1, 2, 0.2);
        s.sort();
        s
    }

    #[test]
    fn mutual_pairs_give_one_edge() {
        let g = SimilarityGraph::from_pairs(&pairs(), &GraphParams::default()).unwrap();
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 2);
        let v0 = g.vertex_of_cell(2).unwrap();
        assert_eq!(g.degree(v0), 2);
        let mut n: Vec<_> = g.neighbors(v0).map(|(v, _)| g.vertex(v).cell_id).collect();
        n.sort_unstable();
        assert_eq!(n, vec![4, 6]);
        assert_eq!(g.vertex_of_cell(8), None);
    }

    #[test]
    fn isolated_vertices_and_k() {
        let params = GraphParams {
            similarity_threshold: 0.0,
            k: 1,
            keep_isolated_vertices: true,
        };
        let g = SimilarityGraph::from_pairs(&pairs(), &params).unwrap();
        assert_eq!(g.vertex_count(), 4);
        // Top partner of 0 is 1, of 1 is 0, of 2 is 0.
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.degree(g.vertex_of_cell(8).unwrap()), 0);
    }
}
