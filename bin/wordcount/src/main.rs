//! Word count on the local data plane.
//!
//! Runs one complete task through the executor: a bounded text source, a
//! splitter, a counter, and an external writer that a local reader drains
//! and prints. With `--on-hold` the counter is swapped for an aggregating
//! vertex, so the run demonstrates the dynamic-optimization hand-off: the
//! aggregate goes to the master and the task finishes on hold.

use anyhow::{Context as _, Result};
use clap::Parser;
use skiff_core::{
    AggregateMetricTransform, DagEdge, Element, FetchError, IrVertex, OutputCollector, Record,
    StageEdge, Task, Transform, TransformContext, VecReadable, VertexDag,
};
use skiff_runtime::{
    BroadcastManagerWorker, DataTransferFactory, LocalDataPlane, LocalMasterConnection,
    LoggingMetricSender, MasterStateReporter, TaskExecutor,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SAMPLE: &str = "the quick brown fox\njumps over the lazy dog\nthe fox again";

/// Run a word-count task on the local data plane.
#[derive(Debug, Parser)]
#[command(name = "wordcount")]
struct Args {
    /// Input text file; a built-in sample is used when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Divert the aggregated count to the master and finish on hold.
    #[arg(long)]
    on_hold: bool,
}

/// Splits each line into whitespace-separated words.
struct SplitWords;

impl Transform for SplitWords {
    fn prepare(&mut self, _context: &mut TransformContext) {}

    fn on_data(&mut self, record: Record, out: &mut dyn OutputCollector) {
        let line = String::from_utf8_lossy(record.as_bytes()).into_owned();
        for word in line.split_whitespace() {
            out.emit(Record::from(word));
        }
    }

    fn close(&mut self, _out: &mut dyn OutputCollector) {}
}

/// Counts words and emits `word:count` records once the input ends.
#[derive(Default)]
struct CountWords {
    counts: HashMap<String, u64>,
}

impl Transform for CountWords {
    fn prepare(&mut self, _context: &mut TransformContext) {}

    fn on_data(&mut self, record: Record, _out: &mut dyn OutputCollector) {
        let word = String::from_utf8_lossy(record.as_bytes()).into_owned();
        *self.counts.entry(word).or_insert(0) += 1;
    }

    fn close(&mut self, out: &mut dyn OutputCollector) {
        let mut counts: Vec<(String, u64)> = self.counts.drain().collect();
        counts.sort();
        for (word, count) in counts {
            out.emit(Record::from(format!("{word}:{count}").as_str()));
        }
    }
}

/// Counts every word into a single decimal record; the aggregate-metric
/// variant of the counter used for the on-hold demonstration.
fn total_word_count() -> AggregateMetricTransform {
    AggregateMetricTransform::new(Record::from("0"), |_record, acc| {
        let total: u64 = String::from_utf8_lossy(acc.as_bytes())
            .parse()
            .unwrap_or(0);
        Record::from((total + 1).to_string().as_str())
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let text = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => SAMPLE.to_string(),
    };
    let lines: Vec<Record> = text.lines().map(Record::from).collect();

    let mut dag = VertexDag::new();
    dag.add_vertex(IrVertex::source("source", "text source"))
        .add_vertex(IrVertex::operator("split", "split words", Box::new(SplitWords)));
    if args.on_hold {
        dag.add_vertex(IrVertex::operator(
            "count",
            "total words",
            Box::new(total_word_count()),
        ));
    } else {
        dag.add_vertex(IrVertex::operator(
            "count",
            "count words",
            Box::new(CountWords::default()),
        ));
    }
    dag.add_edge(DagEdge::new("source", "split"))
        .add_edge(DagEdge::new("split", "count"));

    let out_edge = StageEdge::new("edge-out", "count", "printer");
    let task = Task::new("WordCount-0-0")
        .with_readable("source", Box::new(VecReadable::new(lines)))
        .with_outgoing_edge(out_edge.clone());

    let plane = LocalDataPlane::new();
    let mut sink = plane.create_reader(0, "count", &out_edge)?;

    let master = LocalMasterConnection::new();
    let state_manager = Arc::new(MasterStateReporter::new(task.task_id.clone(), &master));
    let broadcast = Arc::new(BroadcastManagerWorker::new());
    let metric_sender = Arc::new(LoggingMetricSender);

    let mut executor = TaskExecutor::new(
        task,
        dag,
        state_manager,
        &plane,
        broadcast,
        metric_sender,
        &master,
    )?;
    executor.execute().await;

    loop {
        match sink.fetch().await {
            Ok(Element::Record(record)) => {
                println!("{}", String::from_utf8_lossy(record.as_bytes()));
            }
            Ok(Element::Finishmark) | Err(FetchError::NotReady) => break,
            Ok(Element::Watermark(_)) => {}
            Err(FetchError::Io(e)) => return Err(e.into()),
        }
    }

    for message in master.messages() {
        if let Some(collected) = message.data_collected {
            info!(data = %collected.data, "master received collected data");
            println!("collected by master: {}", collected.data);
        }
    }
    Ok(())
}
