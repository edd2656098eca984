//! The intra-task vertex DAG.
//!
//! A [`VertexDag`] holds the operator vertices of one task and the data edges
//! between them. The runtime consumes it in topological order to build one
//! execution harness per vertex.

use crate::vertex::IrVertex;
use crate::{PlanError, Result};
use std::collections::{HashMap, HashSet};

/// An intra-task data edge between two vertices of the same task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagEdge {
    /// Source vertex id.
    pub src: String,
    /// Destination vertex id.
    pub dst: String,
    /// Set when the destination consumes a named side output of the source.
    pub output_tag: Option<String>,
}

impl DagEdge {
    /// Create a main-output edge.
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            output_tag: None,
        }
    }

    /// Route this edge from the named side output instead of the main output.
    pub fn with_output_tag(mut self, tag: impl Into<String>) -> Self {
        self.output_tag = Some(tag.into());
        self
    }
}

/// The vertex DAG of one task.
#[derive(Debug, Default)]
pub struct VertexDag {
    vertices: Vec<IrVertex>,
    edges: Vec<DagEdge>,
}

impl VertexDag {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex to the graph.
    pub fn add_vertex(&mut self, vertex: IrVertex) -> &mut Self {
        self.vertices.push(vertex);
        self
    }

    /// Add an edge to the graph.
    pub fn add_edge(&mut self, edge: DagEdge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    pub fn vertices(&self) -> &[IrVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[DagEdge] {
        &self.edges
    }

    /// Outgoing edges of `vertex_id`, in insertion order.
    pub fn outgoing_edges<'a>(&'a self, vertex_id: &'a str) -> impl Iterator<Item = &'a DagEdge> {
        self.edges.iter().filter(move |e| e.src == vertex_id)
    }

    /// Incoming edges of `vertex_id`, in insertion order.
    pub fn incoming_edges<'a>(&'a self, vertex_id: &'a str) -> impl Iterator<Item = &'a DagEdge> {
        self.edges.iter().filter(move |e| e.dst == vertex_id)
    }

    /// Validate the graph structure.
    ///
    /// Checks vertex-id uniqueness, edge endpoints, that no source vertex has
    /// intra-task inputs, and acyclicity.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for vertex in &self.vertices {
            if !seen.insert(vertex.id.as_str()) {
                return Err(PlanError::DuplicateVertex(vertex.id.clone()));
            }
        }

        for edge in &self.edges {
            if !seen.contains(edge.src.as_str()) {
                return Err(PlanError::UnknownVertex(edge.src.clone()));
            }
            if !seen.contains(edge.dst.as_str()) {
                return Err(PlanError::UnknownVertex(edge.dst.clone()));
            }
        }

        for vertex in &self.vertices {
            if vertex.is_source() && self.incoming_edges(&vertex.id).next().is_some() {
                return Err(PlanError::SourceWithInputs(vertex.id.clone()));
            }
        }

        self.topological_sort().map(|_| ())
    }

    /// Vertex ids in a deterministic forward topological order.
    ///
    /// Ties are broken by vertex insertion order, so the same graph always
    /// sorts the same way.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .vertices
            .iter()
            .map(|v| (v.id.as_str(), 0))
            .collect();
        for edge in &self.edges {
            if let Some(d) = in_degree.get_mut(edge.dst.as_str()) {
                *d += 1;
            }
        }

        let mut order: Vec<String> = Vec::with_capacity(self.vertices.len());
        let mut emitted: HashSet<&str> = HashSet::new();
        loop {
            let next = self
                .vertices
                .iter()
                .find(|v| !emitted.contains(v.id.as_str()) && in_degree[v.id.as_str()] == 0);
            let Some(vertex) = next else { break };
            emitted.insert(vertex.id.as_str());
            order.push(vertex.id.clone());
            for edge in self.outgoing_edges(&vertex.id) {
                if let Some(d) = in_degree.get_mut(edge.dst.as_str()) {
                    *d -= 1;
                }
            }
        }

        if order.len() != self.vertices.len() {
            let stuck = self
                .vertices
                .iter()
                .find(|v| !order.iter().any(|id| id == &v.id))
                .map(|v| v.id.clone())
                .unwrap_or_default();
            return Err(PlanError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Consume the graph, yielding its vertices and edges.
    pub fn into_parts(self) -> (Vec<IrVertex>, Vec<DagEdge>) {
        (self.vertices, self.edges)
    }
}
