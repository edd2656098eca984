//! The task descriptor.

use crate::edge::StageEdge;
use crate::readable::Readable;
use std::collections::HashMap;
use std::fmt;

/// One shard of a stage: the unit of work handed to a task executor.
///
/// The descriptor is immutable for the executor's lifetime; the readable map
/// is drained once during harness construction.
pub struct Task {
    /// Task id of the form `<stage>-<index>-<attempt>`.
    pub task_id: String,
    /// Stage edges feeding this task from upstream stages.
    pub incoming_edges: Vec<StageEdge>,
    /// Stage edges from this task to downstream stages.
    pub outgoing_edges: Vec<StageEdge>,
    /// Bounded sources for the task's source vertices, keyed by vertex id.
    pub readables: HashMap<String, Box<dyn Readable>>,
}

impl Task {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
            readables: HashMap::new(),
        }
    }

    pub fn with_incoming_edge(mut self, edge: StageEdge) -> Self {
        self.incoming_edges.push(edge);
        self
    }

    pub fn with_outgoing_edge(mut self, edge: StageEdge) -> Self {
        self.outgoing_edges.push(edge);
        self
    }

    /// Attach the bounded source backing the source vertex `vertex_id`.
    pub fn with_readable(
        mut self,
        vertex_id: impl Into<String>,
        readable: Box<dyn Readable>,
    ) -> Self {
        self.readables.insert(vertex_id.into(), readable);
        self
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut readables: Vec<&String> = self.readables.keys().collect();
        readables.sort();
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("incoming_edges", &self.incoming_edges)
            .field("outgoing_edges", &self.outgoing_edges)
            .field("readables", &readables)
            .finish()
    }
}
