//! IR vertices of the intra-task operator graph.

use crate::transform::Transform;
use std::fmt;

/// A single operator node in the intra-task vertex DAG.
pub struct IrVertex {
    /// Unique vertex id within the plan.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the vertex does.
    pub kind: VertexKind,
}

/// Vertex variants.
pub enum VertexKind {
    /// Reads a bounded external source through a task-supplied
    /// [`Readable`](crate::Readable).
    Source,
    /// Applies a transform to every incoming element.
    Operator { transform: Box<dyn Transform> },
}

impl IrVertex {
    /// Create a source vertex.
    pub fn source(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: VertexKind::Source,
        }
    }

    /// Create an operator vertex.
    pub fn operator(
        id: impl Into<String>,
        name: impl Into<String>,
        transform: Box<dyn Transform>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: VertexKind::Operator { transform },
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, VertexKind::Source)
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, VertexKind::Operator { .. })
    }
}

impl fmt::Debug for IrVertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            VertexKind::Source => "Source",
            VertexKind::Operator { .. } => "Operator",
        };
        f.debug_struct("IrVertex")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}
