//! Vertex harnesses and the element-routing engine.
//!
//! Harnesses live in an arena: a vector indexed by position, with a
//! `vertex id -> index` map on the side. Collectors hold indices into the
//! arena, never references, which keeps the graph traversable from safe code
//! and localizes the single-thread invariant to the `RefCell` slots.

use crate::collector::live_collector;
use crate::transfer::OutputWriter;
use crate::{Error, Result};
use skiff_core::{OutputCollector, Record, Transform, TransformContext, Watermark};
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::error;

/// How a vertex's emissions are routed.
pub(crate) enum CollectorKind {
    /// Fan out to intra-task children and external writers.
    Fanout {
        internal_main: Vec<usize>,
        internal_tagged: HashMap<String, Vec<usize>>,
    },
    /// Divert emitted payloads to the master control channel.
    DynOpt,
}

/// Mutable execution record for one IR vertex.
///
/// Created once during harness construction, mutated only by the executing
/// thread, dropped with the task.
pub(crate) struct VertexHarness {
    pub id: String,
    pub name: String,
    pub is_source: bool,
    /// Present iff the vertex is an operator.
    pub transform: Option<Box<dyn Transform>>,
    pub context: TransformContext,
    pub collector: CollectorKind,
    /// External writers for the main output, in registration order.
    pub writers_main: Vec<Box<dyn OutputWriter>>,
    /// External writers per side-output tag.
    pub writers_tagged: HashMap<String, Vec<Box<dyn OutputWriter>>>,
}

/// The arena of harnesses plus the routing engine over it.
pub(crate) struct HarnessGraph {
    harnesses: Vec<RefCell<VertexHarness>>,
    index_of: HashMap<String, usize>,
    /// Arena indices in forward topological order; finalization order.
    topo_order: Vec<usize>,
    /// Id of the vertex that diverted its output to the master, if any.
    /// Last writer wins when several vertices do.
    vertex_put_on_hold: RefCell<Option<String>>,
}

impl HarnessGraph {
    pub fn new(
        harnesses: Vec<RefCell<VertexHarness>>,
        index_of: HashMap<String, usize>,
        topo_order: Vec<usize>,
    ) -> Self {
        Self {
            harnesses,
            index_of,
            topo_order,
            vertex_put_on_hold: RefCell::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.harnesses.len()
    }

    pub fn topo_order(&self) -> &[usize] {
        &self.topo_order
    }

    pub fn index_of(&self, vertex_id: &str) -> Option<usize> {
        self.index_of.get(vertex_id).copied()
    }

    pub fn set_vertex_put_on_hold(&self, vertex_id: &str) {
        *self.vertex_put_on_hold.borrow_mut() = Some(vertex_id.to_string());
    }

    pub fn take_vertex_put_on_hold(&self) -> Option<String> {
        self.vertex_put_on_hold.borrow_mut().take()
    }

    /// Push a record through vertex `idx`'s transform.
    ///
    /// The transform's emissions recurse into its children on the same call
    /// stack; recursion depth is bounded by the depth of the vertex DAG.
    pub fn invoke_transform(&self, idx: usize, record: Record) {
        let mut guard = self.harnesses[idx].borrow_mut();
        let harness = &mut *guard;
        let Some(transform) = harness.transform.as_mut() else {
            error!(vertex = %harness.id, "record routed to a vertex without a transform");
            return;
        };
        let mut out = live_collector(
            self,
            &harness.id,
            &harness.collector,
            &mut harness.writers_main,
            &mut harness.writers_tagged,
            &mut harness.context,
        );
        transform.on_data(record, &mut out);
    }

    /// Emit a record through vertex `idx`'s own collector. Entry point for
    /// source vertices, which have no transform of their own.
    pub fn emit_from(&self, idx: usize, record: Record) {
        let mut guard = self.harnesses[idx].borrow_mut();
        let harness = &mut *guard;
        let mut out = live_collector(
            self,
            &harness.id,
            &harness.collector,
            &mut harness.writers_main,
            &mut harness.writers_tagged,
            &mut harness.context,
        );
        out.emit(record);
    }

    /// Forward a watermark into vertex `idx`'s collector.
    pub fn emit_watermark_from(&self, idx: usize, watermark: Watermark) {
        let mut guard = self.harnesses[idx].borrow_mut();
        let harness = &mut *guard;
        let mut out = live_collector(
            self,
            &harness.id,
            &harness.collector,
            &mut harness.writers_main,
            &mut harness.writers_tagged,
            &mut harness.context,
        );
        out.emit_watermark(watermark);
    }

    /// Close vertex `idx`'s transform; closing emissions route normally, so
    /// downstream transforms must still be open.
    pub fn close_transform(&self, idx: usize) {
        let mut guard = self.harnesses[idx].borrow_mut();
        let harness = &mut *guard;
        let Some(transform) = harness.transform.as_mut() else {
            return;
        };
        let mut out = live_collector(
            self,
            &harness.id,
            &harness.collector,
            &mut harness.writers_main,
            &mut harness.writers_tagged,
            &mut harness.context,
        );
        transform.close(&mut out);
    }

    /// Take the pending master hand-off payload of vertex `idx`, if any.
    pub fn take_serialized_data(&self, idx: usize) -> Option<String> {
        self.harnesses[idx]
            .borrow_mut()
            .context
            .take_serialized_data()
    }

    /// Close every external writer of vertex `idx`; returns the sum of the
    /// written-byte counts the writers report.
    pub fn close_writers(&self, idx: usize) -> Result<u64> {
        let mut guard = self.harnesses[idx].borrow_mut();
        let harness = &mut *guard;
        let vertex_id = harness.id.clone();
        let mut written = 0u64;

        for writer in harness.writers_main.iter_mut() {
            writer.close().map_err(|source| Error::WriterClose {
                vertex: vertex_id.clone(),
                source,
            })?;
            if let Some(bytes) = writer.written_bytes() {
                written += bytes;
            }
        }
        for writers in harness.writers_tagged.values_mut() {
            for writer in writers.iter_mut() {
                writer.close().map_err(|source| Error::WriterClose {
                    vertex: vertex_id.clone(),
                    source,
                })?;
                if let Some(bytes) = writer.written_bytes() {
                    written += bytes;
                }
            }
        }
        Ok(written)
    }

    /// A structural snapshot of the harness graph, for equality checks:
    /// building the same DAG twice must yield identical structures.
    pub fn structure(&self) -> HarnessStructure {
        let vertices = self
            .topo_order
            .iter()
            .map(|&idx| {
                let harness = self.harnesses[idx].borrow();
                let (dyn_opt, internal_main, internal_tagged) = match &harness.collector {
                    CollectorKind::Fanout {
                        internal_main,
                        internal_tagged,
                    } => {
                        let main = internal_main
                            .iter()
                            .map(|&child| self.harnesses[child].borrow().id.clone())
                            .collect();
                        let mut tagged: Vec<(String, Vec<String>)> = internal_tagged
                            .iter()
                            .map(|(tag, children)| {
                                let ids = children
                                    .iter()
                                    .map(|&child| self.harnesses[child].borrow().id.clone())
                                    .collect();
                                (tag.clone(), ids)
                            })
                            .collect();
                        tagged.sort();
                        (false, main, tagged)
                    }
                    CollectorKind::DynOpt => (true, Vec::new(), Vec::new()),
                };
                let mut external_tagged_writers: Vec<(String, usize)> = harness
                    .writers_tagged
                    .iter()
                    .map(|(tag, writers)| (tag.clone(), writers.len()))
                    .collect();
                external_tagged_writers.sort();

                VertexStructure {
                    id: harness.id.clone(),
                    name: harness.name.clone(),
                    is_source: harness.is_source,
                    dyn_opt,
                    internal_main,
                    internal_tagged,
                    external_main_writers: harness.writers_main.len(),
                    external_tagged_writers,
                }
            })
            .collect();
        HarnessStructure { vertices }
    }
}

/// Structural description of a harness graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessStructure {
    /// One entry per vertex, in forward topological order.
    pub vertices: Vec<VertexStructure>,
}

/// Structural description of one harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStructure {
    pub id: String,
    pub name: String,
    pub is_source: bool,
    pub dyn_opt: bool,
    /// Ids of intra-task main-output children, in registration order.
    pub internal_main: Vec<String>,
    /// Ids of intra-task side-output children, sorted by tag.
    pub internal_tagged: Vec<(String, Vec<String>)>,
    pub external_main_writers: usize,
    /// External writer counts, sorted by tag.
    pub external_tagged_writers: Vec<(String, usize)>,
}
