//! Control-plane messages exchanged between executors and the runtime master.
//!
//! The message structs mirror the master's protobuf schema and must stay
//! wire-compatible with it: field numbers and enum values are part of the
//! contract. They are written out as prost derives rather than generated
//! from `.proto` files so the crate builds without a protoc toolchain.

mod control;

pub use control::{
    ControlMessage, DataCollectMessage, FailureCause, MessageType, TaskStateChangedMessage,
    TaskStateKind,
};

/// Listener id of the runtime master's control-message handler.
pub const RUNTIME_MASTER_MESSAGE_LISTENER_ID: &str = "RUNTIME_MASTER_MESSAGE_LISTENER_ID";
