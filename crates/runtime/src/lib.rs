//! Skiff per-task execution core.
//!
//! Given a [`Task`](skiff_core::Task) and its intra-task vertex DAG, the
//! [`TaskExecutor`](executor::TaskExecutor) builds a local operator graph,
//! pulls input elements from upstream sources, pushes each element through
//! the operator chain in topological order, finalizes transforms and writers
//! deterministically at end of input, and reports the outcome to the master.
//!
//! The executor is strictly single-threaded on its hot path: per-element
//! graph traversal happens on the executing thread through nested collector
//! calls. Multiple tasks run concurrently in distinct executors.

pub mod broadcast;
pub mod executor;
pub mod local;
pub mod master;
pub mod metric;
pub mod state;
pub mod transfer;

mod collector;
mod fetcher;
mod harness;

pub use broadcast::BroadcastManagerWorker;
pub use executor::TaskExecutor;
pub use harness::{HarnessStructure, VertexStructure};
pub use local::{LocalDataPlane, LocalInputReader, LocalOutputWriter};
pub use master::{ControlMessageSender, LocalMasterConnection, MasterConnection};
pub use metric::{LoggingMetricSender, MetricMessageSender};
pub use state::{
    LoggingStateManager, MasterStateReporter, RecoverableFailureCause, TaskState,
    TaskStateManager,
};
pub use transfer::{DataTransferFactory, InputReader, OutputWriter};

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or executing a task.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task {0} execution called again")]
    AlreadyExecuted(String),

    #[error("invalid task plan: {0}")]
    InvalidPlan(String),

    #[error(transparent)]
    Plan(#[from] skiff_core::PlanError),

    #[error("task was cancelled while waiting for input")]
    Interrupted,

    #[error("failed to close a writer of vertex {vertex}: {source}")]
    WriterClose {
        vertex: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send a control message to the master: {0}")]
    MasterSend(String),

    #[error("broadcast variable {0} has no registered reader")]
    UnknownBroadcast(String),

    #[error("local data plane: {0}")]
    DataPlane(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
