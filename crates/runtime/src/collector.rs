//! Live output collectors.
//!
//! A collector is constructed on the fly from the split borrows of the
//! emitting vertex's harness: its routing tables, its external writers and
//! its context. Emissions to intra-task children recurse into the child's
//! transform on the same call stack, so per-element push order is preserved
//! end to end.

use crate::harness::{CollectorKind, HarnessGraph};
use crate::transfer::OutputWriter;
use skiff_core::{OutputCollector, Record, TransformContext, Watermark};
use std::collections::HashMap;
use tracing::warn;

/// Build the live collector for one vertex from its harness parts.
pub(crate) fn live_collector<'a>(
    graph: &'a HarnessGraph,
    vertex_id: &'a str,
    collector: &'a CollectorKind,
    writers_main: &'a mut Vec<Box<dyn OutputWriter>>,
    writers_tagged: &'a mut HashMap<String, Vec<Box<dyn OutputWriter>>>,
    context: &'a mut TransformContext,
) -> LiveCollector<'a> {
    match collector {
        CollectorKind::Fanout {
            internal_main,
            internal_tagged,
        } => LiveCollector::Fanout(FanoutCollector {
            graph,
            vertex_id,
            internal_main,
            internal_tagged,
            writers_main,
            writers_tagged,
        }),
        CollectorKind::DynOpt => LiveCollector::DynOpt(DynOptCollector {
            graph,
            vertex_id,
            context,
        }),
    }
}

pub(crate) enum LiveCollector<'a> {
    Fanout(FanoutCollector<'a>),
    DynOpt(DynOptCollector<'a>),
}

impl OutputCollector for LiveCollector<'_> {
    fn emit(&mut self, record: Record) {
        match self {
            LiveCollector::Fanout(collector) => collector.emit(record),
            LiveCollector::DynOpt(collector) => collector.emit(record),
        }
    }

    fn emit_tagged(&mut self, tag: &str, record: Record) {
        match self {
            LiveCollector::Fanout(collector) => collector.emit_tagged(tag, record),
            LiveCollector::DynOpt(collector) => collector.emit_tagged(tag, record),
        }
    }

    fn emit_watermark(&mut self, watermark: Watermark) {
        match self {
            LiveCollector::Fanout(collector) => collector.emit_watermark(watermark),
            LiveCollector::DynOpt(collector) => collector.emit_watermark(watermark),
        }
    }
}

/// Fan-out collector of a source or operator vertex.
///
/// Within one emit, intra-task children are served first and external
/// writers second, each in registration order.
pub(crate) struct FanoutCollector<'a> {
    graph: &'a HarnessGraph,
    vertex_id: &'a str,
    internal_main: &'a [usize],
    internal_tagged: &'a HashMap<String, Vec<usize>>,
    writers_main: &'a mut Vec<Box<dyn OutputWriter>>,
    writers_tagged: &'a mut HashMap<String, Vec<Box<dyn OutputWriter>>>,
}

impl OutputCollector for FanoutCollector<'_> {
    fn emit(&mut self, record: Record) {
        for &child in self.internal_main {
            self.graph.invoke_transform(child, record.clone());
        }
        for writer in self.writers_main.iter_mut() {
            writer.write(&record);
        }
    }

    fn emit_tagged(&mut self, tag: &str, record: Record) {
        let internal = self.internal_tagged.get(tag);
        let external = self.writers_tagged.get_mut(tag);
        if internal.is_none() && external.is_none() {
            // Tagged side outputs are optional consumers.
            warn!(vertex = %self.vertex_id, tag = %tag, "no consumer for tag, dropping record");
            return;
        }
        for &child in internal.map(Vec::as_slice).unwrap_or(&[]) {
            self.graph.invoke_transform(child, record.clone());
        }
        for writer in external.map(|writers| writers.iter_mut()).into_iter().flatten() {
            writer.write(&record);
        }
    }

    fn emit_watermark(&mut self, watermark: Watermark) {
        // Reserved: watermarks are swallowed here until transforms expose an
        // event-time hook to forward them into.
        let _ = watermark;
    }
}

/// Collector of a metric-aggregating vertex.
///
/// Instead of fanning out, the emitted payload is serialized onto the
/// vertex's context; finalization ships it to the master, and the task
/// finishes on hold awaiting the master's replanning decision.
pub(crate) struct DynOptCollector<'a> {
    graph: &'a HarnessGraph,
    vertex_id: &'a str,
    context: &'a mut TransformContext,
}

impl OutputCollector for DynOptCollector<'_> {
    fn emit(&mut self, record: Record) {
        let data = String::from_utf8_lossy(record.as_bytes()).into_owned();
        self.context.set_serialized_data(data);
        self.graph.set_vertex_put_on_hold(self.vertex_id);
    }

    fn emit_tagged(&mut self, tag: &str, _record: Record) {
        warn!(
            vertex = %self.vertex_id,
            tag = %tag,
            "side output on a metric-aggregating vertex, dropping record"
        );
    }

    fn emit_watermark(&mut self, _watermark: Watermark) {}
}
