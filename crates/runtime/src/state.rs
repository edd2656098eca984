//! Task states and state reporting.

use crate::master::{ControlMessageSender, MasterConnection};
use skiff_core::ids;
use skiff_protocol::{
    ControlMessage, FailureCause, TaskStateChangedMessage, TaskStateKind,
    RUNTIME_MASTER_MESSAGE_LISTENER_ID,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The states a task reports while executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// The task is consuming input.
    Executing,
    /// The task finished and committed its output.
    Complete,
    /// The task finished, but a vertex diverted its output to the master and
    /// awaits a replanning decision.
    OnHold { vertex_id: String },
    /// The task hit a recoverable failure and should be rescheduled.
    ShouldRetry { cause: RecoverableFailureCause },
    /// The task hit an unrecoverable failure.
    Failed,
}

/// Causes the master may recover from by retrying the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverableFailureCause {
    InputReadFailure,
    OutputWriteFailure,
}

/// Receives every state transition of one task.
pub trait TaskStateManager: Send + Sync {
    fn on_task_state_changed(&self, state: TaskState);
}

/// Logs state transitions; for local runs.
pub struct LoggingStateManager {
    task_id: String,
}

impl LoggingStateManager {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

impl TaskStateManager for LoggingStateManager {
    fn on_task_state_changed(&self, state: TaskState) {
        match &state {
            TaskState::Failed | TaskState::ShouldRetry { .. } => {
                warn!(task_id = %self.task_id, state = ?state, "task state changed");
            }
            _ => info!(task_id = %self.task_id, state = ?state, "task state changed"),
        }
    }
}

/// Reports state transitions to the master as `TaskStateChanged` control
/// messages.
pub struct MasterStateReporter {
    task_id: String,
    sender: Arc<dyn ControlMessageSender>,
}

impl MasterStateReporter {
    pub fn new(task_id: impl Into<String>, master: &dyn MasterConnection) -> Self {
        Self {
            task_id: task_id.into(),
            sender: master.message_sender(RUNTIME_MASTER_MESSAGE_LISTENER_ID),
        }
    }
}

impl TaskStateManager for MasterStateReporter {
    fn on_task_state_changed(&self, state: TaskState) {
        let payload = TaskStateChangedMessage {
            task_id: self.task_id.clone(),
            state: task_state_kind(&state) as i32,
            vertex_put_on_hold: match &state {
                TaskState::OnHold { vertex_id } => Some(vertex_id.clone()),
                _ => None,
            },
            failure_cause: match &state {
                TaskState::ShouldRetry { cause } => Some(failure_cause(*cause) as i32),
                _ => None,
            },
        };
        let message = ControlMessage::task_state_changed(ids::generate_message_id(), payload);
        if let Err(e) = self.sender.send(message) {
            // State reporting must never take the task down with it.
            error!(task_id = %self.task_id, error = %e, "failed to report task state");
        }
    }
}

fn task_state_kind(state: &TaskState) -> TaskStateKind {
    match state {
        TaskState::Executing => TaskStateKind::Executing,
        TaskState::Complete => TaskStateKind::Complete,
        TaskState::OnHold { .. } => TaskStateKind::OnHold,
        TaskState::ShouldRetry { .. } => TaskStateKind::ShouldRetry,
        TaskState::Failed => TaskStateKind::Failed,
    }
}

fn failure_cause(cause: RecoverableFailureCause) -> FailureCause {
    match cause {
        RecoverableFailureCause::InputReadFailure => FailureCause::InputReadFailure,
        RecoverableFailureCause::OutputWriteFailure => FailureCause::OutputWriteFailure,
    }
}
