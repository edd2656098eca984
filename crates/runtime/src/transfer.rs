//! Data-transfer contracts to neighboring task shards.
//!
//! Readers and writers are per-stage-edge channels created through a
//! [`DataTransferFactory`]. The runtime consumes these as capability
//! contracts; transports, block placement and storage formats live behind
//! them.

use async_trait::async_trait;
use skiff_core::{Element, FetchError, Record, StageEdge};

/// Pull side of a stage edge: elements produced by an upstream task shard.
#[async_trait]
pub trait InputReader: Send + Sync {
    /// Id of the IR vertex on the producing side of this edge.
    fn src_vertex_id(&self) -> &str;

    /// Pull the next element.
    ///
    /// Ends with exactly one [`Element::Finishmark`]. Returns
    /// [`FetchError::NotReady`] when nothing is available right now and
    /// [`FetchError::Io`] when the channel is broken.
    async fn fetch(&mut self) -> Result<Element, FetchError>;

    /// Serialized bytes moved over this edge; known after end of stream.
    fn serialized_bytes(&self) -> Option<u64> {
        None
    }

    /// Decoded payload bytes moved over this edge; known after end of stream.
    fn encoded_bytes(&self) -> Option<u64> {
        None
    }
}

/// Push side of a stage edge: elements destined for a downstream task shard.
pub trait OutputWriter: Send {
    /// Buffer one record for the destination shard.
    ///
    /// Writes are buffered and cannot fail individually; failures surface
    /// when the writer is closed and its output committed.
    fn write(&mut self, record: &Record);

    /// Flush buffered output, commit it, and end the stream.
    fn close(&mut self) -> std::io::Result<()>;

    /// Bytes written over this edge, where the sink tracks them.
    fn written_bytes(&self) -> Option<u64> {
        None
    }
}

/// Creates the per-edge readers and writers of one task.
pub trait DataTransferFactory: Send + Sync {
    /// Create the reader for an incoming stage edge of shard `task_index`.
    fn create_reader(
        &self,
        task_index: u32,
        src_vertex_id: &str,
        edge: &StageEdge,
    ) -> crate::Result<Box<dyn InputReader>>;

    /// Create the writer for an outgoing stage edge of task `task_id`.
    fn create_writer(
        &self,
        task_id: &str,
        dst_vertex_id: &str,
        edge: &StageEdge,
    ) -> crate::Result<Box<dyn OutputWriter>>;
}
