//! The per-task orchestrator.
//!
//! Execution runs in two phases. Phase 1 consumes task-external input:
//! the fetch loop drains every non-broadcast fetcher, pushing each element
//! through the operator chain as it arrives. Phase 2 finalizes task-internal
//! state: transforms close in forward topological order, pending
//! dynamic-optimization payloads ship to the master, writers commit.
//!
//! The executor must be driven by a single thread; it owns every harness and
//! fetcher of its task outright.

use crate::broadcast::BroadcastManagerWorker;
use crate::fetcher::{DataFetcher, Delivery, ParentTaskFetcher, SourceFetcher};
use crate::harness::{CollectorKind, HarnessGraph, HarnessStructure, VertexHarness};
use crate::master::{ControlMessageSender, MasterConnection};
use crate::metric::MetricMessageSender;
use crate::state::{RecoverableFailureCause, TaskState, TaskStateManager};
use crate::transfer::{DataTransferFactory, OutputWriter};
use crate::{Error, Result};
use skiff_core::{
    ids, BroadcastVariables, Element, FetchError, IrVertex, Record, Task, TransformContext,
    VertexDag, VertexKind, Watermark,
};
use skiff_protocol::{ControlMessage, RUNTIME_MASTER_MESSAGE_LISTENER_ID};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info};

/// How often pending fetchers are re-polled, and how long the loop sleeps
/// when nothing is available.
pub(crate) const POLLING_INTERVAL: Duration = Duration::from_millis(100);

const TASK_METRIC: &str = "TaskMetric";

#[derive(Debug, Default)]
struct TaskMetrics {
    bounded_source_read_time: Duration,
    serialized_read_bytes: u64,
    encoded_read_bytes: u64,
}

enum SleepOutcome {
    Completed,
    Cancelled,
    Detached,
}

/// Executes one task.
pub struct TaskExecutor {
    task_id: String,
    is_executed: bool,
    state_manager: Arc<dyn TaskStateManager>,
    metric_sender: Arc<dyn MetricMessageSender>,
    master_sender: Arc<dyn ControlMessageSender>,
    graph: HarnessGraph,
    non_broadcast_fetchers: Vec<DataFetcher>,
    metrics: TaskMetrics,
    cancel: Option<mpsc::Receiver<()>>,
}

impl TaskExecutor {
    /// Build the executor for `task`: one harness per vertex of `dag`, one
    /// reader per incoming stage edge, one writer per outgoing stage edge.
    ///
    /// Plan violations (readable/source mismatches, parent-task edges into
    /// source vertices, malformed DAGs) fail construction.
    pub fn new(
        task: Task,
        dag: VertexDag,
        state_manager: Arc<dyn TaskStateManager>,
        transfer: &dyn DataTransferFactory,
        broadcast: Arc<BroadcastManagerWorker>,
        metric_sender: Arc<dyn MetricMessageSender>,
        master: &dyn MasterConnection,
    ) -> Result<Self> {
        let master_sender = master.message_sender(RUNTIME_MASTER_MESSAGE_LISTENER_ID);
        let task_id = task.task_id.clone();
        let (graph, fetchers) = prepare(task, dag, transfer, broadcast)?;
        info!(
            task_id = %task_id,
            harnesses = graph.len(),
            fetchers = fetchers.len(),
            "task executor prepared"
        );
        Ok(Self {
            task_id,
            is_executed: false,
            state_manager,
            metric_sender,
            master_sender,
            graph,
            non_broadcast_fetchers: fetchers,
            metrics: TaskMetrics::default(),
            cancel: None,
        })
    }

    /// Attach a cancellation channel. A message received while the fetch
    /// loop is asleep aborts the task as an unrecoverable failure.
    pub fn with_cancellation(mut self, cancel: mpsc::Receiver<()>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// A structural snapshot of the harness graph. Building the same task
    /// and DAG twice yields equal structures.
    pub fn structure(&self) -> HarnessStructure {
        self.graph.structure()
    }

    /// The arena index of the harness built for `vertex_id`, if any.
    pub fn vertex_index(&self, vertex_id: &str) -> Option<usize> {
        self.graph.index_of(vertex_id)
    }

    /// Execute the task, reporting every failure to the state manager.
    ///
    /// Never panics on task-level failures: any error escaping the phases
    /// below is reported as FAILED and logged.
    pub async fn execute(&mut self) {
        if let Err(error) = self.do_execute().await {
            self.state_manager.on_task_state_changed(TaskState::Failed);
            error!(task_id = %self.task_id, error = ?error, "task failed");
        }
    }

    async fn do_execute(&mut self) -> Result<()> {
        if self.is_executed {
            return Err(Error::AlreadyExecuted(self.task_id.clone()));
        }
        self.is_executed = true;

        info!(task_id = %self.task_id, "task started");
        self.state_manager
            .on_task_state_changed(TaskState::Executing);

        // Phase 1: consume task-external input (non-broadcasts).
        if !self.handle_data_fetchers().await? {
            // The loop already reported SHOULD_RETRY; skip finalization.
            return Ok(());
        }

        self.send_task_metric(
            "boundedSourceReadTime",
            self.metrics.bounded_source_read_time.as_millis() as u64,
        );
        self.send_task_metric("serializedReadBytes", self.metrics.serialized_read_bytes);
        self.send_task_metric("encodedReadBytes", self.metrics.encoded_read_bytes);

        // Phase 2: finalize task-internal state and elements.
        let mut written_bytes = 0u64;
        for &idx in self.graph.topo_order() {
            written_bytes += self.finalize_vertex(idx)?;
        }
        self.send_task_metric("writtenBytes", written_bytes);

        match self.graph.take_vertex_put_on_hold() {
            None => {
                self.state_manager.on_task_state_changed(TaskState::Complete);
                info!(task_id = %self.task_id, "task completed");
            }
            Some(vertex_id) => {
                self.state_manager
                    .on_task_state_changed(TaskState::OnHold { vertex_id });
                info!(task_id = %self.task_id, "task on hold");
            }
        }
        Ok(())
    }

    // ========================================================================
    // Fetch loop
    // ========================================================================

    /// Drain every non-broadcast fetcher.
    ///
    /// Two lists drive the loop: `available` holds fetchers believed to have
    /// an element ready, `pending` holds fetchers that recently came up
    /// empty. Pending fetchers are re-polled once per polling interval; when
    /// nothing at all is available the loop sleeps one interval.
    ///
    /// Returns `false` after reporting SHOULD_RETRY on an input read
    /// failure.
    async fn handle_data_fetchers(&mut self) -> Result<bool> {
        let mut available = std::mem::take(&mut self.non_broadcast_fetchers);
        let mut pending: Vec<DataFetcher> = Vec::new();
        let mut finished: Vec<DataFetcher> = Vec::new();
        let mut prev_poll = Instant::now();

        while !available.is_empty() || !pending.is_empty() {
            let mut i = 0;
            while i < available.len() {
                match available[i].fetch_one().await {
                    Ok(Element::Finishmark) => {
                        let fetcher = available.remove(i);
                        self.fold_terminal_metrics(&fetcher);
                        finished.push(fetcher);
                    }
                    Ok(Element::Record(record)) => {
                        self.route_record(available[i].delivery(), record);
                        i += 1;
                    }
                    Ok(Element::Watermark(watermark)) => {
                        self.route_watermark(available[i].delivery(), watermark);
                        i += 1;
                    }
                    Err(FetchError::NotReady) => {
                        // Transient: re-polled with the pending sweep.
                        pending.push(available.remove(i));
                    }
                    Err(FetchError::Io(e)) => {
                        self.report_input_read_failure(&e);
                        return Ok(false);
                    }
                }
            }

            // The sweep reads the clock once per loop iteration, so a fresh
            // wave of empties cannot push the next sweep further out.
            let now = Instant::now();
            if !pending.is_empty() && now.duration_since(prev_poll) >= POLLING_INTERVAL {
                prev_poll = now;
                let mut j = 0;
                while j < pending.len() {
                    match pending[j].fetch_one().await {
                        Ok(Element::Finishmark) => {
                            let fetcher = pending.remove(j);
                            self.fold_terminal_metrics(&fetcher);
                            finished.push(fetcher);
                        }
                        Ok(Element::Record(record)) => {
                            self.route_record(pending[j].delivery(), record);
                            available.push(pending.remove(j));
                        }
                        Ok(Element::Watermark(watermark)) => {
                            self.route_watermark(pending[j].delivery(), watermark);
                            available.push(pending.remove(j));
                        }
                        Err(FetchError::NotReady) => {
                            j += 1;
                        }
                        Err(FetchError::Io(e)) => {
                            self.report_input_read_failure(&e);
                            return Ok(false);
                        }
                    }
                }
            }

            if available.is_empty() && !pending.is_empty() {
                match self.sleep_one_interval().await {
                    SleepOutcome::Completed => {}
                    SleepOutcome::Cancelled => return Err(Error::Interrupted),
                    SleepOutcome::Detached => self.cancel = None,
                }
            }
        }

        for fetcher in finished.iter_mut() {
            fetcher.close();
        }
        Ok(true)
    }

    async fn sleep_one_interval(&mut self) -> SleepOutcome {
        match self.cancel.as_mut() {
            Some(cancel) => tokio::select! {
                _ = tokio::time::sleep(POLLING_INTERVAL) => SleepOutcome::Completed,
                received = cancel.recv() => match received {
                    Some(()) => SleepOutcome::Cancelled,
                    // Sender gone: nobody can cancel this task anymore.
                    None => SleepOutcome::Detached,
                },
            },
            None => {
                tokio::time::sleep(POLLING_INTERVAL).await;
                SleepOutcome::Completed
            }
        }
    }

    fn route_record(&self, delivery: Delivery, record: Record) {
        match delivery {
            Delivery::Collector(idx) => self.graph.emit_from(idx, record),
            Delivery::Operator(idx) => self.graph.invoke_transform(idx, record),
        }
    }

    fn route_watermark(&self, delivery: Delivery, watermark: Watermark) {
        match delivery {
            Delivery::Collector(idx) | Delivery::Operator(idx) => {
                self.graph.emit_watermark_from(idx, watermark)
            }
        }
    }

    fn fold_terminal_metrics(&mut self, fetcher: &DataFetcher) {
        match fetcher {
            DataFetcher::Source(fetcher) => {
                self.metrics.bounded_source_read_time += fetcher.bounded_source_read_time();
            }
            DataFetcher::ParentTask(fetcher) => {
                if let Some(bytes) = fetcher.serialized_bytes() {
                    self.metrics.serialized_read_bytes += bytes;
                }
                if let Some(bytes) = fetcher.encoded_bytes() {
                    self.metrics.encoded_read_bytes += bytes;
                }
            }
        }
    }

    fn report_input_read_failure(&self, error: &std::io::Error) {
        self.state_manager.on_task_state_changed(TaskState::ShouldRetry {
            cause: RecoverableFailureCause::InputReadFailure,
        });
        error!(
            task_id = %self.task_id,
            error = %error,
            "task execution failed (recoverable: input read failure)"
        );
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Close the vertex's transform, ship any pending dynamic-optimization
    /// payload to the master, and commit its external writers. Returns the
    /// written bytes the writers report.
    fn finalize_vertex(&self, idx: usize) -> Result<u64> {
        self.graph.close_transform(idx);

        if let Some(data) = self.graph.take_serialized_data(idx) {
            let message =
                ControlMessage::executor_data_collected(ids::generate_message_id(), data);
            self.master_sender.send(message)?;
        }

        self.graph.close_writers(idx)
    }

    fn send_task_metric(&self, metric_key: &str, value: u64) {
        if let Ok(bytes) = serde_json::to_vec(&value) {
            self.metric_sender
                .send(TASK_METRIC, &self.task_id, metric_key, bytes);
        }
    }
}

/// Convert the vertex DAG into the harness arena and the fetcher list.
///
/// Vertices are visited in reverse topological order so every vertex's
/// children already have harnesses when its collector is built; no second
/// patching pass is needed. The returned topological order drives
/// finalization.
fn prepare(
    task: Task,
    dag: VertexDag,
    transfer: &dyn DataTransferFactory,
    broadcast: Arc<BroadcastManagerWorker>,
) -> Result<(HarnessGraph, Vec<DataFetcher>)> {
    let task_id = task.task_id.clone();
    let task_index = ids::task_index(&task_id)?;
    dag.validate()?;
    let topo = dag.topological_sort()?;

    let (vertices, dag_edges) = dag.into_parts();
    let mut vertex_by_id: HashMap<String, IrVertex> =
        vertices.into_iter().map(|v| (v.id.clone(), v)).collect();
    let mut readables = task.readables;

    let mut harnesses: Vec<RefCell<VertexHarness>> = Vec::with_capacity(topo.len());
    let mut index_of: HashMap<String, usize> = HashMap::with_capacity(topo.len());
    let mut fetchers: Vec<DataFetcher> = Vec::new();

    for vertex_id in topo.iter().rev() {
        let vertex = vertex_by_id
            .remove(vertex_id)
            .ok_or_else(|| Error::InvalidPlan(format!("vertex {vertex_id} missing from graph")))?;

        // A readable must be present iff the vertex is a source.
        let readable = readables.remove(vertex_id);
        if readable.is_some() != vertex.is_source() {
            return Err(Error::InvalidPlan(format!(
                "vertex {vertex_id} and the task's readable map do not match"
            )));
        }

        // Classify intra-task outgoing edges into {main, tagged}.
        let mut internal_main: Vec<usize> = Vec::new();
        let mut internal_tagged: HashMap<String, Vec<usize>> = HashMap::new();
        for edge in dag_edges.iter().filter(|e| &e.src == vertex_id) {
            let child = index_of.get(edge.dst.as_str()).copied().ok_or_else(|| {
                Error::InvalidPlan(format!(
                    "edge {}->{} contradicts the topological order",
                    edge.src, edge.dst
                ))
            })?;
            match &edge.output_tag {
                None => internal_main.push(child),
                Some(tag) => internal_tagged.entry(tag.clone()).or_default().push(child),
            }
        }

        // Classify outgoing stage edges into {main, tagged} writers.
        let mut writers_main: Vec<Box<dyn OutputWriter>> = Vec::new();
        let mut writers_tagged: HashMap<String, Vec<Box<dyn OutputWriter>>> = HashMap::new();
        for edge in task.outgoing_edges.iter().filter(|e| &e.src_vertex == vertex_id) {
            let writer = transfer.create_writer(&task_id, &edge.dst_vertex, edge)?;
            match &edge.output_tag {
                None => writers_main.push(writer),
                Some(tag) => writers_tagged.entry(tag.clone()).or_default().push(writer),
            }
        }

        // A metric-aggregating operator gets the diverting collector.
        let is_dyn_opt = match &vertex.kind {
            VertexKind::Operator { transform } => transform.is_aggregate_metric(),
            VertexKind::Source => false,
        };
        let collector = if is_dyn_opt {
            CollectorKind::DynOpt
        } else {
            CollectorKind::Fanout {
                internal_main,
                internal_tagged,
            }
        };

        let IrVertex { id, name, kind } = vertex;
        let (mut transform, is_source) = match kind {
            VertexKind::Source => (None, true),
            VertexKind::Operator { transform } => (Some(transform), false),
        };

        let mut context =
            TransformContext::new(broadcast.clone() as Arc<dyn BroadcastVariables>);
        if let Some(transform) = transform.as_mut() {
            transform.prepare(&mut context);
        }

        let idx = harnesses.len();
        harnesses.push(RefCell::new(VertexHarness {
            id: id.clone(),
            name,
            is_source,
            transform,
            context,
            collector,
            writers_main,
            writers_tagged,
        }));
        index_of.insert(id.clone(), idx);

        // Source read.
        if let Some(readable) = readable {
            fetchers.push(DataFetcher::Source(SourceFetcher::new(idx, readable)));
        }

        // Parent-task reads: one reader per incoming stage edge. Broadcast
        // edges go to the broadcast manager and never enter the fetch loop.
        for edge in task.incoming_edges.iter().filter(|e| &e.dst_vertex == vertex_id) {
            let reader = transfer.create_reader(task_index, &edge.src_vertex, edge)?;
            match &edge.broadcast_id {
                Some(broadcast_id) => broadcast.register_reader(broadcast_id.clone(), reader),
                None => {
                    if is_source {
                        return Err(Error::InvalidPlan(format!(
                            "parent-task edge {} targets source vertex {id}",
                            edge.id
                        )));
                    }
                    fetchers.push(DataFetcher::ParentTask(ParentTaskFetcher::new(idx, reader)));
                }
            }
        }
    }

    let topo_order = topo
        .iter()
        .map(|id| {
            index_of
                .get(id)
                .copied()
                .ok_or_else(|| Error::InvalidPlan(format!("vertex {id} has no harness")))
        })
        .collect::<Result<Vec<usize>>>()?;

    let graph = HarnessGraph::new(harnesses, index_of, topo_order);
    Ok((graph, fetchers))
}
