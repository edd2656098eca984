//! Skiff core plan layer.
//!
//! This crate defines the vocabulary shared by the compiler front-end and the
//! per-task runtime: stream elements, the intra-task vertex DAG, stage edges
//! of the physical plan, the task descriptor handed to an executor, and the
//! transform lifecycle contracts user operators implement.

pub mod dag;
pub mod edge;
pub mod element;
pub mod ids;
pub mod readable;
pub mod task;
pub mod transform;
pub mod vertex;

pub use dag::{DagEdge, VertexDag};
pub use edge::StageEdge;
pub use element::{Element, FetchError, Record, Watermark};
pub use readable::{Readable, VecReadable};
pub use task::Task;
pub use transform::{
    AggregateMetricTransform, BroadcastVariables, OutputCollector, Transform, TransformContext,
};
pub use vertex::{IrVertex, VertexKind};

/// Result type for plan-level operations.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors raised while building or validating a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("duplicate vertex id '{0}'")]
    DuplicateVertex(String),

    #[error("vertex '{0}' is not defined in the graph")]
    UnknownVertex(String),

    #[error("the vertex graph contains a cycle through '{0}'")]
    Cycle(String),

    #[error("source vertex '{0}' must not have intra-task inputs")]
    SourceWithInputs(String),

    #[error("malformed task id '{0}'")]
    MalformedTaskId(String),
}
