//! In-process data plane.
//!
//! Backs stage edges with in-memory channels so a task can run and be tested
//! without a cluster. Each edge id maps to one channel: writers share the
//! send side, the single reader takes the receive side.

use crate::transfer::{DataTransferFactory, InputReader, OutputWriter};
use crate::Error;
use async_trait::async_trait;
use dashmap::DashMap;
use skiff_core::{Element, FetchError, Record, StageEdge};
use std::io;
use tokio::sync::mpsc;
use tracing::debug;

struct LocalChannel {
    tx: mpsc::UnboundedSender<Element>,
    rx: Option<mpsc::UnboundedReceiver<Element>>,
}

/// Registry of per-stage-edge channels, keyed by edge id.
#[derive(Default)]
pub struct LocalDataPlane {
    channels: DashMap<String, LocalChannel>,
}

impl LocalDataPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_entry(&self, edge_id: &str) -> dashmap::mapref::one::RefMut<'_, String, LocalChannel> {
        self.channels
            .entry(edge_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                LocalChannel { tx, rx: Some(rx) }
            })
    }
}

impl DataTransferFactory for LocalDataPlane {
    fn create_reader(
        &self,
        _task_index: u32,
        src_vertex_id: &str,
        edge: &StageEdge,
    ) -> crate::Result<Box<dyn InputReader>> {
        let rx = self
            .channel_entry(&edge.id)
            .rx
            .take()
            .ok_or_else(|| {
                Error::DataPlane(format!("reader for edge {} was already created", edge.id))
            })?;
        debug!(edge = %edge.id, src = %src_vertex_id, "local reader created");
        Ok(Box::new(LocalInputReader {
            src_vertex_id: src_vertex_id.to_string(),
            rx,
            serialized_bytes: 0,
            finished: false,
        }))
    }

    fn create_writer(
        &self,
        task_id: &str,
        _dst_vertex_id: &str,
        edge: &StageEdge,
    ) -> crate::Result<Box<dyn OutputWriter>> {
        let tx = self.channel_entry(&edge.id).tx.clone();
        debug!(edge = %edge.id, task_id = %task_id, "local writer created");
        Ok(Box::new(LocalOutputWriter {
            edge_id: edge.id.clone(),
            tx,
            written_bytes: 0,
        }))
    }
}

/// Writer half of a local channel. Counts written payload bytes and appends
/// the finishmark on close.
pub struct LocalOutputWriter {
    edge_id: String,
    tx: mpsc::UnboundedSender<Element>,
    written_bytes: u64,
}

impl OutputWriter for LocalOutputWriter {
    fn write(&mut self, record: &Record) {
        self.written_bytes += record.len() as u64;
        // A dropped receiver discards the element; the failure surfaces when
        // the stream is committed on close.
        let _ = self.tx.send(Element::Record(record.clone()));
    }

    fn close(&mut self) -> io::Result<()> {
        self.tx.send(Element::Finishmark).map_err(|_| {
            io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("edge {} receiver is gone", self.edge_id),
            )
        })
    }

    fn written_bytes(&self) -> Option<u64> {
        Some(self.written_bytes)
    }
}

/// Reader half of a local channel.
///
/// The local plane performs no separate encoding, so the serialized and
/// encoded byte counters both observe payload bytes.
pub struct LocalInputReader {
    src_vertex_id: String,
    rx: mpsc::UnboundedReceiver<Element>,
    serialized_bytes: u64,
    finished: bool,
}

#[async_trait]
impl InputReader for LocalInputReader {
    fn src_vertex_id(&self) -> &str {
        &self.src_vertex_id
    }

    async fn fetch(&mut self) -> Result<Element, FetchError> {
        match self.rx.try_recv() {
            Ok(Element::Record(record)) => {
                self.serialized_bytes += record.len() as u64;
                Ok(Element::Record(record))
            }
            Ok(Element::Finishmark) => {
                self.finished = true;
                Ok(Element::Finishmark)
            }
            Ok(other) => Ok(other),
            Err(mpsc::error::TryRecvError::Empty) => Err(FetchError::NotReady),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(FetchError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "input channel disconnected before end of stream",
            ))),
        }
    }

    fn serialized_bytes(&self) -> Option<u64> {
        self.finished.then_some(self.serialized_bytes)
    }

    fn encoded_bytes(&self) -> Option<u64> {
        self.finished.then_some(self.serialized_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str) -> StageEdge {
        StageEdge::new(id, "src", "dst")
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let plane = LocalDataPlane::new();
        let mut writer = plane.create_writer("Stage0-0-0", "dst", &edge("e1")).unwrap();
        let mut reader = plane.create_reader(0, "src", &edge("e1")).unwrap();

        writer.write(&Record::from("ab"));
        writer.write(&Record::from("cde"));
        writer.close().unwrap();

        assert_eq!(
            reader.fetch().await.unwrap(),
            Element::Record(Record::from("ab"))
        );
        assert_eq!(
            reader.fetch().await.unwrap(),
            Element::Record(Record::from("cde"))
        );
        assert_eq!(reader.fetch().await.unwrap(), Element::Finishmark);

        assert_eq!(writer.written_bytes(), Some(5));
        assert_eq!(reader.serialized_bytes(), Some(5));
        assert_eq!(reader.encoded_bytes(), Some(5));
    }

    #[tokio::test]
    async fn test_counters_unknown_before_end() {
        let plane = LocalDataPlane::new();
        let mut writer = plane.create_writer("Stage0-0-0", "dst", &edge("e1")).unwrap();
        let mut reader = plane.create_reader(0, "src", &edge("e1")).unwrap();

        writer.write(&Record::from("x"));
        assert_eq!(
            reader.fetch().await.unwrap(),
            Element::Record(Record::from("x"))
        );
        assert_eq!(reader.serialized_bytes(), None);
    }

    #[tokio::test]
    async fn test_empty_channel_is_not_ready() {
        let plane = LocalDataPlane::new();
        let _writer = plane.create_writer("Stage0-0-0", "dst", &edge("e1")).unwrap();
        let mut reader = plane.create_reader(0, "src", &edge("e1")).unwrap();

        assert!(matches!(reader.fetch().await, Err(FetchError::NotReady)));
    }

    #[tokio::test]
    async fn test_disconnect_without_finishmark_is_io() {
        let plane = LocalDataPlane::new();
        let writer = plane.create_writer("Stage0-0-0", "dst", &edge("e1")).unwrap();
        let mut reader = plane.create_reader(0, "src", &edge("e1")).unwrap();
        // Drop both the writer and the registry's send side without closing.
        drop(writer);
        plane.channels.remove("e1");

        assert!(matches!(reader.fetch().await, Err(FetchError::Io(_))));
    }

    #[tokio::test]
    async fn test_single_reader_per_edge() {
        let plane = LocalDataPlane::new();
        let _reader = plane.create_reader(0, "src", &edge("e1")).unwrap();
        assert!(plane.create_reader(0, "src", &edge("e1")).is_err());
    }

    #[tokio::test]
    async fn test_close_without_reader_fails() {
        let plane = LocalDataPlane::new();
        let mut writer = plane.create_writer("Stage0-0-0", "dst", &edge("e1")).unwrap();
        let reader = plane.create_reader(0, "src", &edge("e1")).unwrap();
        drop(reader);

        assert!(writer.close().is_err());
    }
}
