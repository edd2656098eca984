//! Control-message schema.

/// Envelope for every executor-to-master control message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ControlMessage {
    /// Fresh process-wide unique message id.
    #[prost(int64, tag = "1")]
    pub id: i64,
    /// Listener on the master that handles this message.
    #[prost(string, tag = "2")]
    pub listener_id: ::prost::alloc::string::String,
    /// Discriminates which payload field below is set.
    #[prost(enumeration = "MessageType", tag = "3")]
    pub r#type: i32,
    /// Payload for `MessageType::ExecutorDataCollected`.
    #[prost(message, optional, tag = "4")]
    pub data_collected: ::core::option::Option<DataCollectMessage>,
    /// Payload for `MessageType::TaskStateChanged`.
    #[prost(message, optional, tag = "5")]
    pub task_state_changed: ::core::option::Option<TaskStateChangedMessage>,
}

/// Aggregated dynamic-optimization data collected by an executor.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataCollectMessage {
    #[prost(string, tag = "1")]
    pub data: ::prost::alloc::string::String,
}

/// A task state transition observed by an executor.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskStateChangedMessage {
    #[prost(string, tag = "1")]
    pub task_id: ::prost::alloc::string::String,
    #[prost(enumeration = "TaskStateKind", tag = "2")]
    pub state: i32,
    /// Set iff `state` is `OnHold`.
    #[prost(string, optional, tag = "3")]
    pub vertex_put_on_hold: ::core::option::Option<::prost::alloc::string::String>,
    /// Set iff `state` is `ShouldRetry`.
    #[prost(enumeration = "FailureCause", optional, tag = "4")]
    pub failure_cause: ::core::option::Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    TaskStateChanged = 0,
    ExecutorDataCollected = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TaskStateKind {
    Executing = 0,
    Complete = 1,
    OnHold = 2,
    ShouldRetry = 3,
    Failed = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FailureCause {
    InputReadFailure = 0,
    OutputWriteFailure = 1,
}

impl ControlMessage {
    /// Build an `ExecutorDataCollected` message addressed to the master.
    pub fn executor_data_collected(id: i64, data: String) -> Self {
        Self {
            id,
            listener_id: crate::RUNTIME_MASTER_MESSAGE_LISTENER_ID.to_string(),
            r#type: MessageType::ExecutorDataCollected as i32,
            data_collected: Some(DataCollectMessage { data }),
            task_state_changed: None,
        }
    }

    /// Build a `TaskStateChanged` message addressed to the master.
    pub fn task_state_changed(id: i64, payload: TaskStateChangedMessage) -> Self {
        Self {
            id,
            listener_id: crate::RUNTIME_MASTER_MESSAGE_LISTENER_ID.to_string(),
            r#type: MessageType::TaskStateChanged as i32,
            data_collected: None,
            task_state_changed: Some(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_data_collect_wire_format() {
        // string field 1: key 0x0a, then length-delimited payload.
        let message = DataCollectMessage {
            data: "P".to_string(),
        };
        assert_eq!(message.encode_to_vec(), vec![0x0a, 0x01, b'P']);
    }

    #[test]
    fn test_control_message_round_trip() {
        let message = ControlMessage::executor_data_collected(7, "counts".to_string());
        let decoded = ControlMessage::decode(message.encode_to_vec().as_slice()).unwrap();

        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.listener_id, crate::RUNTIME_MASTER_MESSAGE_LISTENER_ID);
        assert_eq!(decoded.r#type, MessageType::ExecutorDataCollected as i32);
        assert_eq!(decoded.data_collected.unwrap().data, "counts");
        assert!(decoded.task_state_changed.is_none());
    }

    #[test]
    fn test_state_changed_round_trip() {
        let payload = TaskStateChangedMessage {
            task_id: "Stage0-0-0".to_string(),
            state: TaskStateKind::ShouldRetry as i32,
            vertex_put_on_hold: None,
            failure_cause: Some(FailureCause::InputReadFailure as i32),
        };
        let message = ControlMessage::task_state_changed(8, payload.clone());
        let decoded = ControlMessage::decode(message.encode_to_vec().as_slice()).unwrap();

        assert_eq!(decoded.task_state_changed.unwrap(), payload);
    }
}
