//! Pull handles over the task's inputs.
//!
//! Every non-broadcast input of a task is wrapped in a [`DataFetcher`]: a
//! source vertex's bounded [`Readable`], or an [`InputReader`] over a stage
//! edge from a parent task. The fetch loop owns the fetchers and drives them
//! until each has yielded its finishmark.

use crate::transfer::InputReader;
use skiff_core::{Element, FetchError, Readable};
use std::time::{Duration, Instant};

/// Where a fetcher's elements are delivered.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Delivery {
    /// Into the vertex's own collector. Source vertices have no transform;
    /// their elements enter the graph at their fan-out.
    Collector(usize),
    /// Into the destination operator's transform.
    Operator(usize),
}

/// Unified pull interface over a single task input.
pub(crate) enum DataFetcher {
    Source(SourceFetcher),
    ParentTask(ParentTaskFetcher),
}

impl DataFetcher {
    /// Pull the next element.
    ///
    /// [`FetchError::NotReady`] is transient; [`FetchError::Io`] means the
    /// input is broken and the task should be retried. End of stream is an
    /// [`Element::Finishmark`], not an error.
    pub async fn fetch_one(&mut self) -> Result<Element, FetchError> {
        match self {
            DataFetcher::Source(fetcher) => fetcher.fetch_one().await,
            DataFetcher::ParentTask(fetcher) => fetcher.reader.fetch().await,
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            DataFetcher::Source(fetcher) => Delivery::Collector(fetcher.vertex_idx),
            DataFetcher::ParentTask(fetcher) => Delivery::Operator(fetcher.dst_vertex_idx),
        }
    }

    pub fn close(&mut self) {
        match self {
            DataFetcher::Source(fetcher) => fetcher.readable.close(),
            DataFetcher::ParentTask(_) => {}
        }
    }
}

/// Reads a bounded source, timing the underlying reads.
pub(crate) struct SourceFetcher {
    vertex_idx: usize,
    readable: Box<dyn Readable>,
    read_time: Duration,
}

impl SourceFetcher {
    pub fn new(vertex_idx: usize, readable: Box<dyn Readable>) -> Self {
        Self {
            vertex_idx,
            readable,
            read_time: Duration::ZERO,
        }
    }

    async fn fetch_one(&mut self) -> Result<Element, FetchError> {
        let started = Instant::now();
        let result = self.readable.poll_next().await;
        self.read_time += started.elapsed();
        result
    }

    /// Total time spent in underlying reads; folded into the task metrics
    /// when the source finishes.
    pub fn bounded_source_read_time(&self) -> Duration {
        self.read_time
    }
}

/// Reads elements produced by an upstream task shard.
pub(crate) struct ParentTaskFetcher {
    dst_vertex_idx: usize,
    reader: Box<dyn InputReader>,
}

impl ParentTaskFetcher {
    pub fn new(dst_vertex_idx: usize, reader: Box<dyn InputReader>) -> Self {
        Self {
            dst_vertex_idx,
            reader,
        }
    }

    pub fn serialized_bytes(&self) -> Option<u64> {
        self.reader.serialized_bytes()
    }

    pub fn encoded_bytes(&self) -> Option<u64> {
        self.reader.encoded_bytes()
    }
}
