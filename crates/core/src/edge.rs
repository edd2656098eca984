//! Stage edges of the physical plan.

use serde::{Deserialize, Serialize};

/// A data edge between stages in the physical plan. Stage edges cross task
/// boundaries: the producing and consuming vertices run in different tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEdge {
    /// Runtime id of this edge, unique within the physical plan.
    pub id: String,
    /// Producing vertex id (in the upstream stage).
    pub src_vertex: String,
    /// Consuming vertex id (in the downstream stage).
    pub dst_vertex: String,
    /// Set when the edge carries a broadcast variable instead of a data
    /// stream. Broadcast edges are read through the broadcast manager, not
    /// the fetch loop.
    pub broadcast_id: Option<String>,
    /// Set when the edge consumes a named side output of the source vertex.
    pub output_tag: Option<String>,
}

impl StageEdge {
    /// Create a plain main-output stage edge.
    pub fn new(
        id: impl Into<String>,
        src_vertex: impl Into<String>,
        dst_vertex: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            src_vertex: src_vertex.into(),
            dst_vertex: dst_vertex.into(),
            broadcast_id: None,
            output_tag: None,
        }
    }

    /// Mark this edge as carrying the broadcast variable `broadcast_id`.
    pub fn with_broadcast_id(mut self, broadcast_id: impl Into<String>) -> Self {
        self.broadcast_id = Some(broadcast_id.into());
        self
    }

    /// Route this edge from the named side output instead of the main output.
    pub fn with_output_tag(mut self, tag: impl Into<String>) -> Self {
        self.output_tag = Some(tag.into());
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.broadcast_id.is_some()
    }
}
