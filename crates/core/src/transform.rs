//! Transform lifecycle contracts.
//!
//! A [`Transform`] is the user-defined processing logic of an operator
//! vertex. The runtime drives it through a fixed lifecycle: `prepare` once
//! before any element, `on_data` per element, `close` once after end of
//! input. Outputs always go through an [`OutputCollector`]; transforms never
//! talk to writers or downstream vertices directly.

use crate::element::{Record, Watermark};
use std::sync::Arc;

/// The push sink a vertex uses to emit to its downstream consumers.
pub trait OutputCollector {
    /// Emit a record to the main output.
    fn emit(&mut self, record: Record);

    /// Emit a record to the named side output `tag`.
    ///
    /// Tagged side outputs are optional consumers: emitting to a tag nothing
    /// is registered under drops the record silently.
    fn emit_tagged(&mut self, tag: &str, record: Record);

    /// Forward an event-time watermark.
    ///
    /// Watermark propagation is reserved; the runtime currently swallows
    /// watermarks at this extension point.
    fn emit_watermark(&mut self, watermark: Watermark);
}

/// Read access to materialized broadcast variables.
pub trait BroadcastVariables: Send + Sync {
    /// The records of broadcast variable `id`, if it has been materialized.
    fn broadcast_variable(&self, id: &str) -> Option<Arc<Vec<Record>>>;
}

/// Per-vertex execution context handed to a transform at prepare time.
pub struct TransformContext {
    broadcast: Arc<dyn BroadcastVariables>,
    serialized_data: Option<String>,
}

impl TransformContext {
    pub fn new(broadcast: Arc<dyn BroadcastVariables>) -> Self {
        Self {
            broadcast,
            serialized_data: None,
        }
    }

    /// Look up a materialized broadcast variable.
    pub fn broadcast_variable(&self, id: &str) -> Option<Arc<Vec<Record>>> {
        self.broadcast.broadcast_variable(id)
    }

    /// Stash a serialized payload for the master hand-off. The payload is
    /// picked up and shipped when the vertex is finalized.
    pub fn set_serialized_data(&mut self, data: String) {
        self.serialized_data = Some(data);
    }

    /// Take the pending hand-off payload, if any.
    pub fn take_serialized_data(&mut self) -> Option<String> {
        self.serialized_data.take()
    }
}

/// A per-vertex element processor.
pub trait Transform: Send {
    /// Called exactly once, before any element is processed.
    fn prepare(&mut self, context: &mut TransformContext);

    /// Process one element, emitting any outputs through `out`.
    ///
    /// Must not block: the runtime traverses the whole operator chain on the
    /// caller's stack.
    fn on_data(&mut self, record: Record, out: &mut dyn OutputCollector);

    /// Called exactly once after end of input; may emit final elements.
    fn close(&mut self, out: &mut dyn OutputCollector);

    /// Whether this transform aggregates dynamic-optimization data for the
    /// master. The runtime diverts such a vertex's output to the master
    /// control channel and finishes the task on hold.
    fn is_aggregate_metric(&self) -> bool {
        false
    }
}

/// Folds every element into an accumulated record and emits the accumulation
/// once, on close.
///
/// This is the transform variant that triggers the dynamic-optimization
/// hand-off: its collected output informs the master's replanning decision.
pub struct AggregateMetricTransform {
    data: Record,
    aggregate: Box<dyn FnMut(&Record, Record) -> Record + Send>,
}

impl AggregateMetricTransform {
    pub fn new(
        initial: Record,
        aggregate: impl FnMut(&Record, Record) -> Record + Send + 'static,
    ) -> Self {
        Self {
            data: initial,
            aggregate: Box::new(aggregate),
        }
    }
}

impl Transform for AggregateMetricTransform {
    fn prepare(&mut self, _context: &mut TransformContext) {}

    fn on_data(&mut self, record: Record, _out: &mut dyn OutputCollector) {
        let data = std::mem::take(&mut self.data);
        self.data = (self.aggregate)(&record, data);
    }

    fn close(&mut self, out: &mut dyn OutputCollector) {
        out.emit(std::mem::take(&mut self.data));
    }

    fn is_aggregate_metric(&self) -> bool {
        true
    }
}
