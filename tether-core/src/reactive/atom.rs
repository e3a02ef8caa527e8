//! Atom handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::derive;
use super::runtime::{Graph, Write};
use super::update::{self, LogArg};
use crate::error::Result;
use crate::graph::{NodeId, NodeKind, Update};
use crate::optics::Lens;

/// A handle to one node of a [`Graph`].
///
/// Atoms are cheap to clone; clones refer to the same node. A live node
/// stays in its graph whether or not any handle to it remains. An ended
/// node is dropped once its last handle is gone and a later `end` sweeps it.
#[derive(Clone)]
pub struct Atom {
    graph: Graph,
    id: NodeId,
    /// Keeps an ended node from being released.
    _handle: Arc<()>,
}

impl Atom {
    pub(crate) fn new(graph: Graph, id: NodeId, handle: Arc<()>) -> Self {
        Self {
            graph,
            id,
            _handle: handle,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The graph this atom belongs to.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Current value. A pending atom reads as `null`.
    pub fn read(&self) -> Value {
        self.graph.read(self.id)
    }

    /// Write a new value and propagate it to every dependent atom.
    ///
    /// Writing through a lensed atom updates its root. Fails for computed
    /// (and other readonly) atoms, for ended atoms, and for [`Update::Halt`].
    ///
    /// ```rust
    /// use serde_json::json;
    /// use tether_core::Graph;
    ///
    /// let graph = Graph::new();
    /// let count = graph.source(json!(1));
    /// let doubled = count.map(|n| json!(n.as_i64().unwrap_or(0) * 2).into()).unwrap();
    ///
    /// count.write(json!(21)).unwrap();
    /// assert_eq!(doubled.read(), json!(42));
    /// ```
    pub fn write(&self, value: impl Into<Update>) -> Result<&Self> {
        self.graph.write(self.id, Write::from(value.into()))?;
        Ok(self)
    }

    pub(crate) fn write_raw(&self, write: Write) -> Result<&Self> {
        self.graph.write(self.id, write)?;
        Ok(self)
    }

    pub fn kind(&self) -> NodeKind {
        self.graph
            .with_node(self.id, |node| node.kind())
            .unwrap_or(NodeKind::Ended)
    }

    pub fn is_readonly(&self) -> bool {
        self.graph
            .with_node(self.id, |node| node.is_readonly())
            .unwrap_or(true)
    }

    pub fn is_ended(&self) -> bool {
        self.kind() == NodeKind::Ended
    }

    /// Whether the atom is still waiting for its first value.
    pub fn is_pending(&self) -> bool {
        self.graph.is_pending(self.id)
    }

    /// Ids of the atoms this one derives from, in declaration order.
    pub fn sources(&self) -> Vec<NodeId> {
        self.graph
            .with_node(self.id, |node| node.sources().to_vec())
            .unwrap_or_default()
    }

    /// Ids of the atoms that derive from this one, in creation order.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.graph
            .with_node(self.id, |node| node.sinks().iter().copied().collect())
            .unwrap_or_default()
    }

    /// The current value, for serialization.
    pub fn to_json(&self) -> Value {
        self.read()
    }

    // Bound forms of the combinators in `derive` and `update`.

    pub fn map<F>(&self, f: F) -> Result<Atom>
    where
        F: Fn(&Value) -> Update + Send + Sync + 'static,
    {
        derive::map(f, self)
    }

    pub fn view(&self, lens: impl Into<Lens>) -> Result<Atom> {
        derive::view(lens, self)
    }

    pub fn scan<F>(&self, f: F, seed: impl Into<Value>) -> Result<Atom>
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        derive::scan(f, seed, self)
    }

    pub fn merge(&self, other: &Atom) -> Result<Atom> {
        derive::merge(self, other)
    }

    pub fn get(&self, lens: impl Into<Lens>) -> Value {
        update::get(lens, self)
    }

    pub fn set(&self, lens: impl Into<Lens>, value: impl Into<Value>) -> Result<&Self> {
        update::set(lens, value, self)
    }

    pub fn over<F>(&self, lens: impl Into<Lens>, f: F) -> Result<&Self>
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        update::over(lens, f, self)
    }

    pub fn modify<F>(&self, f: F) -> Result<&Self>
    where
        F: FnOnce(&Value) -> Value,
    {
        update::modify(f, self)
    }

    pub fn remove(&self) -> Result<&Self> {
        update::remove(self)
    }

    pub fn end(&self) -> Result<&Self> {
        update::end(self)
    }

    /// Log this atom's current value. See [`update::log`].
    pub fn log(&self) -> Value {
        update::log([LogArg::from(self)]).pop().unwrap_or(Value::Null)
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Serialize for Atom {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.read().serialize(serializer)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.read())
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("value", &self.read())
            .finish()
    }
}
