//! The persistent control-plane connection to the runtime master.

use crate::{Error, Result};
use parking_lot::Mutex;
use skiff_protocol::ControlMessage;
use std::sync::Arc;
use tracing::debug;

/// Sends control messages to one listener on the master.
///
/// Must be safe for concurrent `send`: the connection is shared across every
/// executor in the process.
pub trait ControlMessageSender: Send + Sync {
    fn send(&self, message: ControlMessage) -> Result<()>;
}

/// A persistent connection to the master, multiplexed by listener id.
pub trait MasterConnection: Send + Sync {
    /// The sender for messages addressed to `listener_id` on the master.
    fn message_sender(&self, listener_id: &str) -> Arc<dyn ControlMessageSender>;
}

/// Loopback connection that retains every message; for local runs and tests.
#[derive(Default)]
pub struct LocalMasterConnection {
    messages: Arc<Mutex<Vec<ControlMessage>>>,
}

impl LocalMasterConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message sent so far, in send order.
    pub fn messages(&self) -> Vec<ControlMessage> {
        self.messages.lock().clone()
    }
}

impl MasterConnection for LocalMasterConnection {
    fn message_sender(&self, listener_id: &str) -> Arc<dyn ControlMessageSender> {
        Arc::new(LoopbackSender {
            listener_id: listener_id.to_string(),
            messages: self.messages.clone(),
        })
    }
}

struct LoopbackSender {
    listener_id: String,
    messages: Arc<Mutex<Vec<ControlMessage>>>,
}

impl ControlMessageSender for LoopbackSender {
    fn send(&self, message: ControlMessage) -> Result<()> {
        if message.listener_id != self.listener_id {
            return Err(Error::MasterSend(format!(
                "message for listener {} sent through the {} sender",
                message.listener_id, self.listener_id
            )));
        }
        debug!(
            message_id = message.id,
            listener_id = %self.listener_id,
            "control message recorded"
        );
        self.messages.lock().push(message);
        Ok(())
    }
}
