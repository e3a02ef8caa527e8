//! Graph Nodes
//!
//! This module defines the node record that lives in the dependency graph,
//! along with the small value types a node carries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use serde_json::Value;
use smallvec::SmallVec;

use crate::optics::Lens;

/// Unique identifier for a node in the dependency graph.
///
/// Ids are unique across every graph in the process, so a handle from one
/// graph is never mistaken for a node of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A root cell holding a raw value. Directly writable.
    Source,

    /// A readonly node deriving its value from one or more sources.
    Computed,

    /// A focused view of its parent's value. Writes land on the nearest
    /// non-lensed ancestor.
    Lensed,

    /// Terminal state: no edges, no further mutation.
    Ended,
}

/// Where a node stands in the current propagation wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSlot {
    /// Not part of a wave (the state outside of every wave).
    Unscheduled,

    /// The node that was written to start this wave.
    Root,

    /// Waiting in the wave stack at the given position.
    Queued(usize),

    /// An upstream node halted; this node sits the wave out.
    Skipped,
}

impl ScheduleSlot {
    /// How recently this node became active in the current wave.
    ///
    /// The written root ranks 0, a queued node ranks after every node
    /// queued before it. Unscheduled and skipped nodes are inactive.
    pub fn recency(self) -> Option<usize> {
        match self {
            ScheduleSlot::Root => Some(0),
            ScheduleSlot::Queued(position) => Some(position + 1),
            ScheduleSlot::Unscheduled | ScheduleSlot::Skipped => None,
        }
    }
}

/// Outcome of a recompute.
///
/// `Halt` means "no update this wave": the node keeps its previous value and
/// every node downstream of it is skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Value(Value),
    Halt,
}

impl Update {
    pub fn is_halt(&self) -> bool {
        matches!(self, Update::Halt)
    }

    /// `None` for `Halt`.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Update::Value(value) => Some(value),
            Update::Halt => None,
        }
    }
}

impl From<Value> for Update {
    fn from(value: Value) -> Self {
        Update::Value(value)
    }
}

impl From<Option<Value>> for Update {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Update::Halt, Update::Value)
    }
}

/// Per-source bookkeeping handed to a compute function next to the values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    /// The source has no value yet; its entry in the values slice is `null`.
    pub pending: bool,
    /// See [`ScheduleSlot::recency`].
    pub recency: Option<usize>,
}

/// What a compute function sees: its sources' current values, in declaration
/// order, and how each source stands in the running wave.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    values: &'a [Value],
    states: &'a [InputState],
}

impl<'a> Inputs<'a> {
    pub(crate) fn new(values: &'a [Value], states: &'a [InputState]) -> Self {
        debug_assert_eq!(values.len(), states.len());
        Self { values, states }
    }

    /// Inputs for a node's first computation: nothing pending, nothing active.
    pub(crate) fn initial(values: &'a [Value]) -> Self {
        Self { values, states: &[] }
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn state(&self, index: usize) -> InputState {
        self.states.get(index).copied().unwrap_or_default()
    }

    pub fn is_pending(&self, index: usize) -> bool {
        self.state(index).pending
    }

    pub fn any_pending(&self) -> bool {
        self.states.iter().any(|state| state.pending)
    }

    /// Whether the `index`th source took part in the running wave.
    /// Always false while a node computes its initial value.
    pub fn is_active(&self, index: usize) -> bool {
        self.state(index).recency.is_some()
    }

    /// Index of the source that became active last in the running wave.
    pub fn most_recent(&self) -> Option<usize> {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(index, state)| state.recency.map(|rank| (rank, index)))
            .max()
            .map(|(_, index)| index)
    }
}

/// The function a computed node derives its value with.
pub type ComputeFn = Arc<dyn Fn(&Inputs<'_>) -> Update + Send + Sync>;

/// Box a closure as a [`ComputeFn`].
pub fn compute_fn<F>(f: F) -> ComputeFn
where
    F: Fn(&Inputs<'_>) -> Update + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A node in the dependency graph.
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// What kind of node this is.
    kind: NodeKind,

    readonly: bool,

    /// Current value. `None` while pending: an initial input halted and no
    /// wave has supplied a value since.
    value: Option<Value>,

    /// Nodes that this node derives from, in declaration order.
    sources: SmallVec<[NodeId; 2]>,

    /// Nodes that derive from this node. Insertion order decides wave
    /// discovery order.
    sinks: IndexSet<NodeId>,

    compute: Option<ComputeFn>,

    /// Composed lens from `root` down to this node.
    lens: Option<Arc<Lens>>,

    /// Nearest non-lensed ancestor; lensed writes are applied there.
    root: Option<NodeId>,

    slot: ScheduleSlot,

    /// Shared by every handle to this node; dead once the last one drops.
    handle: Weak<()>,
}

impl Node {
    fn new(kind: NodeKind, readonly: bool, value: Option<Value>) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            readonly,
            value,
            sources: SmallVec::new(),
            sinks: IndexSet::new(),
            compute: None,
            lens: None,
            root: None,
            slot: ScheduleSlot::Unscheduled,
            handle: Weak::new(),
        }
    }

    /// Create a new source node. `None` creates it pending.
    pub fn source(value: Option<Value>) -> Self {
        Self::new(NodeKind::Source, false, value)
    }

    /// Create a new computed node over `sources`.
    pub fn computed(
        sources: impl IntoIterator<Item = NodeId>,
        compute: ComputeFn,
        value: Option<Value>,
    ) -> Self {
        let mut node = Self::new(NodeKind::Computed, true, value);
        node.sources = sources.into_iter().collect();
        node.compute = Some(compute);
        node
    }

    /// Create a new lensed node under `parent`, writing through to `root`.
    pub fn lensed(
        parent: NodeId,
        root: NodeId,
        lens: Arc<Lens>,
        readonly: bool,
        value: Option<Value>,
    ) -> Self {
        let mut node = Self::new(NodeKind::Lensed, readonly, value);
        node.sources.push(parent);
        node.root = Some(root);
        node.lens = Some(lens);
        node
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_ended(&self) -> bool {
        self.kind == NodeKind::Ended
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }

    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn sinks(&self) -> &IndexSet<NodeId> {
        &self.sinks
    }

    pub fn add_sink(&mut self, node_id: NodeId) {
        self.sinks.insert(node_id);
    }

    /// Remove a sink, keeping the order of the others.
    pub fn remove_sink(&mut self, node_id: NodeId) {
        self.sinks.shift_remove(&node_id);
    }

    pub fn compute(&self) -> Option<&ComputeFn> {
        self.compute.as_ref()
    }

    pub fn lens(&self) -> Option<&Arc<Lens>> {
        self.lens.as_ref()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn slot(&self) -> ScheduleSlot {
        self.slot
    }

    pub fn set_slot(&mut self, slot: ScheduleSlot) {
        self.slot = slot;
    }

    pub fn set_handle(&mut self, handle: Weak<()>) {
        self.handle = handle;
    }

    /// Whether any handle to this node is still alive.
    pub fn is_held(&self) -> bool {
        self.handle.strong_count() > 0
    }

    /// Move to the ended state, handing back the edges the caller still has
    /// to sever. The value is kept as a frozen snapshot.
    pub fn end(&mut self) -> (SmallVec<[NodeId; 2]>, IndexSet<NodeId>) {
        self.kind = NodeKind::Ended;
        self.readonly = true;
        self.compute = None;
        self.lens = None;
        self.root = None;
        self.slot = ScheduleSlot::Unscheduled;
        (
            std::mem::take(&mut self.sources),
            std::mem::take(&mut self.sinks),
        )
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("readonly", &self.readonly)
            .field("value", &self.value)
            .field("sources", &self.sources)
            .field("sinks", &self.sinks)
            .field("slot", &self.slot)
            .finish()
    }
}
