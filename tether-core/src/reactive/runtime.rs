//! Graph Runtime
//!
//! [`Graph`] is the handle every atom hangs off. It owns the node arena (an
//! [`UpdateScheduler`] behind a mutex) and runs the write path:
//!
//! 1. Validate the target and translate lensed writes into a write to the
//!    lens root.
//! 2. Store the root's new value and build the wave stack.
//! 3. Recompute each queued node in stack order. Compute functions run with
//!    the arena unlocked so they can read other atoms; their result is
//!    stored (or the node's downstream closure skipped) once the lock is
//!    taken again.
//! 4. Reset every slot the wave touched.
//!
//! The whole sequence runs inside a [`WaveContext`], so a second mutation
//! that arrives mid-wave fails with [`GraphError::Reentrant`].

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::atom::Atom;
use super::context::WaveContext;
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::graph::{
    ComputeFn, InputState, Inputs, Node, NodeId, NodeKind, Update, UpdateScheduler,
};
use crate::optics::{self, Lens};

static NULL: Value = Value::Null;

/// A reactive graph.
///
/// Cloning a `Graph` clones the handle; every clone sees the same atoms.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

struct GraphInner {
    scheduler: Mutex<UpdateScheduler>,
    busy: AtomicBool,
    config: GraphConfig,
}

/// A write request after the public entry points have had their say.
#[derive(Debug, Clone)]
pub(crate) enum Write {
    Value(Value),
    Halt,
    /// Delete through a lens; stores `null` on a source.
    Remove,
}

impl From<Update> for Write {
    fn from(update: Update) -> Self {
        match update {
            Update::Value(value) => Write::Value(value),
            Update::Halt => Write::Halt,
        }
    }
}

impl Write {
    fn into_value(self) -> Option<Value> {
        match self {
            Write::Value(value) => Some(value),
            Write::Halt | Write::Remove => None,
        }
    }
}

/// Work for one queued node, prepared under the lock.
enum Job {
    /// The result is already known; lens views run no user code.
    Ready(Update),
    Compute {
        compute: ComputeFn,
        values: Vec<Value>,
        states: SmallVec<[InputState; 2]>,
    },
}

impl Job {
    fn prepare(scheduler: &UpdateScheduler, node_id: NodeId) -> Option<Self> {
        let node = scheduler.get_node(node_id)?;
        match node.kind() {
            NodeKind::Lensed => {
                let lens = node.lens()?;
                let update = match scheduler.value(node.root()?) {
                    Some(target) => Update::Value(view_or_null(lens, target)),
                    None => Update::Halt,
                };
                Some(Job::Ready(update))
            }
            NodeKind::Computed => {
                let compute = node.compute()?.clone();
                let mut values = Vec::with_capacity(node.sources().len());
                let mut states = SmallVec::new();
                for &source_id in node.sources() {
                    let source = scheduler.get_node(source_id);
                    let value = source.and_then(Node::value);
                    states.push(InputState {
                        pending: value.is_none(),
                        recency: source.and_then(|s| s.slot().recency()),
                    });
                    values.push(value.cloned().unwrap_or(Value::Null));
                }
                Some(Job::Compute {
                    compute,
                    values,
                    states,
                })
            }
            NodeKind::Source | NodeKind::Ended => None,
        }
    }

    fn run(self) -> Update {
        match self {
            Job::Ready(update) => update,
            Job::Compute {
                compute,
                values,
                states,
            } => compute(&Inputs::new(&values, &states)),
        }
    }
}

/// Slots touched by a running wave. Dropping it resets them, also when a
/// compute function unwinds.
struct Wave<'a> {
    scheduler: &'a Mutex<UpdateScheduler>,
    root: NodeId,
    nodes: Vec<NodeId>,
}

impl Drop for Wave<'_> {
    fn drop(&mut self) {
        self.scheduler.lock().finish_wave(self.root, &self.nodes);
    }
}

fn view_or_null(lens: &Lens, target: &Value) -> Value {
    optics::view(lens, target).cloned().unwrap_or(Value::Null)
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                scheduler: Mutex::new(UpdateScheduler::new()),
                busy: AtomicBool::new(false),
                config,
            }),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Number of atoms held by this graph.
    ///
    /// Ended atoms count until their last handle is dropped and a later
    /// [`Atom::end`] releases them.
    pub fn node_count(&self) -> usize {
        self.inner.scheduler.lock().node_count()
    }

    /// Create a writable source atom holding `value`.
    pub fn source(&self, value: impl Into<Value>) -> Atom {
        self.add_source(Some(value.into()))
    }

    /// Create a writable source atom with no value yet.
    ///
    /// Reading it yields `null`, and atoms derived from it stay pending until
    /// it is first written.
    pub fn pending(&self) -> Atom {
        self.add_source(None)
    }

    fn add_source(&self, value: Option<Value>) -> Atom {
        let pending = value.is_none();
        let atom = self.attach(&mut self.inner.scheduler.lock(), Node::source(value));
        debug!(graph = %self.inner.config.label, node = %atom.id(), pending, "created source");
        atom
    }

    /// Add `node` to the arena and hand out its first handle.
    fn attach(&self, scheduler: &mut UpdateScheduler, mut node: Node) -> Atom {
        let handle = Arc::new(());
        node.set_handle(Arc::downgrade(&handle));
        let id = scheduler.add_node(node);
        Atom::new(self.clone(), id, handle)
    }

    /// Whether a write, construction or `end` is running right now. Compute
    /// functions always observe `true`.
    pub fn is_busy(&self) -> bool {
        WaveContext::is_active(&self.inner.busy)
    }

    /// Whether `other` is a handle to this same graph.
    pub fn same_graph(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a computed node over `sources`.
    ///
    /// `initial` receives the sources' current values, or `None` if any of
    /// them is pending, together with the compute function, and decides the
    /// node's first value.
    pub(crate) fn derive<I>(
        &self,
        op: &'static str,
        sources: &[&Atom],
        compute: ComputeFn,
        initial: I,
    ) -> Result<Atom>
    where
        I: FnOnce(Option<&[Value]>, &ComputeFn) -> Option<Value>,
    {
        if sources.is_empty() {
            return Err(GraphError::EmptySources { op });
        }
        let _ctx = WaveContext::enter(&self.inner.busy, op)?;

        let ids: SmallVec<[NodeId; 2]> = sources.iter().map(|atom| atom.id()).collect();
        let snapshot = {
            let scheduler = self.inner.scheduler.lock();
            let mut values = Vec::with_capacity(ids.len());
            let mut pending = false;
            for &id in &ids {
                match scheduler.live_source(op, id)?.value() {
                    Some(value) => values.push(value.clone()),
                    None => pending = true,
                }
            }
            (!pending).then_some(values)
        };

        // Runs user code, so the arena stays unlocked.
        let value = initial(snapshot.as_deref(), &compute);
        let pending = value.is_none();

        let atom = self.attach(
            &mut self.inner.scheduler.lock(),
            Node::computed(ids.iter().copied(), compute, value),
        );
        debug!(
            graph = %self.inner.config.label,
            node = %atom.id(),
            op,
            sources = ids.len(),
            pending,
            "derived atom"
        );
        Ok(atom)
    }

    /// Create a lensed node focused on `lens` within `parent`.
    pub(crate) fn view(&self, lens: Lens, parent: &Atom) -> Result<Atom> {
        let op = "view";
        let _ctx = WaveContext::enter(&self.inner.busy, op)?;
        let mut scheduler = self.inner.scheduler.lock();

        let node = scheduler.live_source(op, parent.id())?;
        let (root, lens) = match (node.kind(), node.root(), node.lens()) {
            (NodeKind::Lensed, Some(root), Some(outer)) => (root, Lens::clone(outer).then(lens)),
            _ => (parent.id(), lens),
        };
        let readonly = node.is_readonly();
        let value = scheduler
            .value(root)
            .map(|target| view_or_null(&lens, target));

        let atom = self.attach(
            &mut scheduler,
            Node::lensed(parent.id(), root, Arc::new(lens), readonly, value),
        );
        debug!(
            graph = %self.inner.config.label,
            node = %atom.id(),
            parent = %parent.id(),
            root = %root,
            readonly,
            "created lensed atom"
        );
        Ok(atom)
    }

    /// Write to `id` and propagate.
    pub(crate) fn write(&self, id: NodeId, write: Write) -> Result<()> {
        let _ctx = WaveContext::enter(&self.inner.busy, "write")?;
        self.apply_write(id, write)
    }

    /// Write `f(current)` to `id` and propagate.
    ///
    /// The read and the write share one context, so no other mutation can
    /// land in between. `f` runs with the arena unlocked; a write it attempts
    /// fails with [`GraphError::Reentrant`].
    pub(crate) fn modify<F>(&self, id: NodeId, f: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Value,
    {
        let _ctx = WaveContext::enter(&self.inner.busy, "write")?;
        let next = f(&self.read(id));
        self.apply_write(id, Write::Value(next))
    }

    fn apply_write(&self, id: NodeId, write: Write) -> Result<()> {
        let (root, nodes) = {
            let mut scheduler = self.inner.scheduler.lock();
            let node = scheduler
                .get_node(id)
                .ok_or(GraphError::ForeignAtom { op: "write", id })?;
            if node.is_ended() {
                return Err(GraphError::EndedWrite { id });
            }
            if node.is_readonly() {
                return Err(GraphError::ReadonlyWrite { id });
            }
            if matches!(write, Write::Halt) {
                return Err(GraphError::HaltWrite);
            }

            let (root, value) = match (node.kind(), node.root(), node.lens()) {
                (NodeKind::Lensed, Some(root), Some(lens)) => {
                    let target = scheduler.value(root).unwrap_or(&NULL);
                    (root, optics::set(lens, write.into_value(), target).into_owned())
                }
                _ => (id, write.into_value().unwrap_or(Value::Null)),
            };

            match scheduler.get_node_mut(root) {
                Some(node) => node.set_value(value),
                None => return Err(GraphError::ForeignAtom { op: "write", id: root }),
            }
            let nodes = scheduler.schedule_wave(root);
            (root, nodes)
        };

        debug!(
            graph = %self.inner.config.label,
            node = %id,
            root = %root,
            wave = nodes.len(),
            "write"
        );

        let wave = Wave {
            scheduler: &self.inner.scheduler,
            root,
            nodes,
        };
        for &node_id in &wave.nodes {
            self.recompute(node_id);
        }
        Ok(())
    }

    fn recompute(&self, node_id: NodeId) {
        let job = {
            let scheduler = self.inner.scheduler.lock();
            if !scheduler.is_queued(node_id) {
                return;
            }
            match Job::prepare(&scheduler, node_id) {
                Some(job) => job,
                None => return,
            }
        };

        let update = job.run();
        let halted = update.is_halt();

        let mut scheduler = self.inner.scheduler.lock();
        match update {
            Update::Value(value) => {
                if let Some(node) = scheduler.get_node_mut(node_id) {
                    node.set_value(value);
                }
            }
            Update::Halt => scheduler.halt_offspring(node_id),
        }

        if self.inner.config.trace_recompute {
            trace!(graph = %self.inner.config.label, node = %node_id, halted, "recomputed");
        }
    }

    /// End `id` and everything downstream of it.
    pub(crate) fn end(&self, id: NodeId) -> Result<()> {
        let _ctx = WaveContext::enter(&self.inner.busy, "end")?;
        let mut scheduler = self.inner.scheduler.lock();
        if scheduler.get_node(id).is_none() {
            return Err(GraphError::ForeignAtom { op: "end", id });
        }

        let ended = scheduler.end_node(id);
        let released = scheduler.release_ended();
        debug!(
            graph = %self.inner.config.label,
            node = %id,
            ended = ended.len(),
            released,
            "ended atom"
        );
        Ok(())
    }

    /// Current value of `id`; `null` while pending.
    pub(crate) fn read(&self, id: NodeId) -> Value {
        self.inner
            .scheduler
            .lock()
            .value(id)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Read `lens` within the current value of `id` without creating a node.
    pub(crate) fn read_through(&self, id: NodeId, lens: &Lens) -> Value {
        let scheduler = self.inner.scheduler.lock();
        view_or_null(lens, scheduler.value(id).unwrap_or(&NULL))
    }

    pub(crate) fn is_pending(&self, id: NodeId) -> bool {
        self.inner.scheduler.lock().value(id).is_none()
    }

    pub(crate) fn with_node<T>(&self, id: NodeId, f: impl FnOnce(&Node) -> T) -> Option<T> {
        self.inner.scheduler.lock().get_node(id).map(f)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("label", &self.inner.config.label)
            .field("nodes", &self.node_count())
            .finish()
    }
}
