//! Broadcast-variable handling on the executor side.
//!
//! Broadcast edges do not flow through the fetch loop. Their readers are
//! registered here under their broadcast id, materialized once by draining
//! the reader to its finishmark, and served to transforms from the cache so
//! a transform-time lookup never blocks.

use crate::transfer::InputReader;
use crate::{Error, Result};
use dashmap::DashMap;
use skiff_core::{BroadcastVariables, Element, FetchError, Record};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const MATERIALIZE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Process-wide registry of broadcast readers and materialized variables.
///
/// Shared by every executor in the process; keyed by broadcast id.
#[derive(Default)]
pub struct BroadcastManagerWorker {
    readers: DashMap<String, Box<dyn InputReader>>,
    variables: DashMap<String, Arc<Vec<Record>>>,
}

impl BroadcastManagerWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reader of a broadcast stage edge under its broadcast id.
    pub fn register_reader(&self, broadcast_id: impl Into<String>, reader: Box<dyn InputReader>) {
        let broadcast_id = broadcast_id.into();
        debug!(broadcast_id = %broadcast_id, "broadcast reader registered");
        self.readers.insert(broadcast_id, reader);
    }

    /// Whether a reader is registered under `broadcast_id`.
    pub fn is_registered(&self, broadcast_id: &str) -> bool {
        self.readers.contains_key(broadcast_id) || self.variables.contains_key(broadcast_id)
    }

    /// Drain the registered reader of `broadcast_id` and cache its records.
    ///
    /// Idempotent: a variable already materialized is returned from the
    /// cache. The registered reader is consumed.
    pub async fn materialize(&self, broadcast_id: &str) -> Result<Arc<Vec<Record>>> {
        if let Some(cached) = self.variables.get(broadcast_id) {
            return Ok(cached.clone());
        }

        let (_, mut reader) = self
            .readers
            .remove(broadcast_id)
            .ok_or_else(|| Error::UnknownBroadcast(broadcast_id.to_string()))?;

        let mut records = Vec::new();
        loop {
            match reader.fetch().await {
                Ok(Element::Record(record)) => records.push(record),
                Ok(Element::Watermark(_)) => {}
                Ok(Element::Finishmark) => break,
                Err(FetchError::NotReady) => {
                    tokio::time::sleep(MATERIALIZE_POLL_INTERVAL).await;
                }
                Err(FetchError::Io(e)) => return Err(Error::Io(e)),
            }
        }

        info!(
            broadcast_id = %broadcast_id,
            records = records.len(),
            "broadcast variable materialized"
        );
        let variable = Arc::new(records);
        self.variables
            .insert(broadcast_id.to_string(), variable.clone());
        Ok(variable)
    }
}

impl BroadcastVariables for BroadcastManagerWorker {
    fn broadcast_variable(&self, id: &str) -> Option<Arc<Vec<Record>>> {
        self.variables.get(id).map(|v| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalDataPlane;
    use crate::transfer::{DataTransferFactory, OutputWriter};
    use skiff_core::StageEdge;

    #[tokio::test]
    async fn test_materialize_and_lookup() {
        let plane = LocalDataPlane::new();
        let edge = StageEdge::new("bcast-edge", "src", "dst").with_broadcast_id("bv");
        let mut writer = plane.create_writer("Stage0-0-0", "dst", &edge).unwrap();
        let reader = plane.create_reader(0, "src", &edge).unwrap();

        writer.write(&Record::from("one"));
        writer.write(&Record::from("two"));
        writer.close().unwrap();

        let worker = BroadcastManagerWorker::new();
        worker.register_reader("bv", reader);
        assert!(worker.is_registered("bv"));
        assert!(worker.broadcast_variable("bv").is_none());

        let variable = worker.materialize("bv").await.unwrap();
        assert_eq!(*variable, vec![Record::from("one"), Record::from("two")]);

        // Still registered and served from the cache afterwards.
        assert!(worker.is_registered("bv"));
        let again = worker.materialize("bv").await.unwrap();
        assert_eq!(again, variable);
        assert_eq!(worker.broadcast_variable("bv"), Some(variable));
    }

    #[tokio::test]
    async fn test_unknown_broadcast() {
        let worker = BroadcastManagerWorker::new();
        assert!(matches!(
            worker.materialize("missing").await,
            Err(Error::UnknownBroadcast(_))
        ));
    }
}
