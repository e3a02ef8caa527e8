//! Update Scheduler
//!
//! The scheduler owns every node of a graph and decides the order in which
//! they recompute after a write.
//!
//! # Algorithm
//!
//! A write to node `W` builds a "wave stack":
//!
//! 1. Walk `W`'s sinks in order. For each sink, append it to the stack. If it
//!    is already in the stack, pull it out of its current position and append
//!    it again.
//! 2. Immediately descend into that sink's own sinks before moving on to the
//!    next sibling.
//!
//! Every time a node is rediscovered through a new edge it moves behind
//! everything found so far. A node reached along several paths therefore
//! ends up after each of its in-wave ancestors, which gives a valid
//! topological order for any DAG and recomputes every node exactly once,
//! diamonds included.
//!
//! 3. Recompute the stack front to back. A node that halts marks its whole
//!    downstream closure [`ScheduleSlot::Skipped`]; skipped nodes are passed
//!    over and keep their old values.

use std::collections::HashMap;

use indexmap::IndexSet;
use serde_json::Value;

use super::node::{Node, NodeId, NodeKind, ScheduleSlot};
use crate::error::{GraphError, Result};

/// The update scheduler manages the dependency graph and coordinates updates.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID. Ended nodes stay here while
    /// a handle can still read their last value.
    nodes: HashMap<NodeId, Node>,

    /// Ended nodes not yet released.
    ended: Vec<NodeId>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            ended: Vec::new(),
        }
    }

    /// Add a node to the graph and register it as a sink of each of its
    /// sources. The sources must already be in the graph.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        for source_id in node.sources() {
            if let Some(source) = self.nodes.get_mut(source_id) {
                source.add_sink(id);
            }
        }
        self.nodes.insert(id, node);
        id
    }

    /// Get a reference to a node.
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable reference to a node.
    pub fn get_node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Look up a node that is about to become the source of a new node.
    pub fn live_source(&self, op: &'static str, node_id: NodeId) -> Result<&Node> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::ForeignAtom { op, id: node_id })?;
        if node.is_ended() {
            return Err(GraphError::EndedSource { op, id: node_id });
        }
        Ok(node)
    }

    /// Current value of a node, `None` while pending or unknown.
    pub fn value(&self, node_id: NodeId) -> Option<&Value> {
        self.nodes.get(&node_id).and_then(Node::value)
    }

    /// Build the wave stack for a write to `root` and mark every participant.
    ///
    /// Returns the stack in recompute order. `root` itself is not in it.
    pub fn schedule_wave(&mut self, root: NodeId) -> Vec<NodeId> {
        let mut stack = IndexSet::new();
        if let Some(node) = self.nodes.get(&root) {
            self.push_sinks(&mut stack, node.sinks());
        }

        if let Some(node) = self.nodes.get_mut(&root) {
            node.set_slot(ScheduleSlot::Root);
        }
        for (position, node_id) in stack.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.set_slot(ScheduleSlot::Queued(position));
            }
        }

        stack.into_iter().collect()
    }

    /// Depth-first walk over `sinks`, driven by an explicit frame stack so
    /// arbitrarily deep chains cannot exhaust the thread's stack.
    fn push_sinks<'a>(&'a self, stack: &mut IndexSet<NodeId>, sinks: &'a IndexSet<NodeId>) {
        let mut frames: Vec<(&'a IndexSet<NodeId>, usize)> = vec![(sinks, 0)];

        while let Some((sinks, next)) = frames.last_mut() {
            let Some(&sink) = sinks.get_index(*next) else {
                frames.pop();
                continue;
            };
            *next += 1;

            // Rediscovered nodes move to the back.
            stack.shift_remove(&sink);
            stack.insert(sink);

            if let Some(node) = self.nodes.get(&sink) {
                frames.push((node.sinks(), 0));
            }
        }
    }

    /// Whether `node_id` should still recompute in the running wave.
    pub fn is_queued(&self, node_id: NodeId) -> bool {
        matches!(
            self.nodes.get(&node_id).map(Node::slot),
            Some(ScheduleSlot::Queued(_))
        )
    }

    /// Skip every node downstream of `node_id` for the rest of the wave.
    pub fn halt_offspring(&mut self, node_id: NodeId) {
        let mut pending: Vec<NodeId> = match self.nodes.get(&node_id) {
            Some(node) => node.sinks().iter().copied().collect(),
            None => return,
        };

        while let Some(sink) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(&sink) {
                if node.slot() == ScheduleSlot::Skipped {
                    continue;
                }
                node.set_slot(ScheduleSlot::Skipped);
                pending.extend(node.sinks().iter().copied());
            }
        }
    }

    /// Reset the slots of a finished (or abandoned) wave.
    pub fn finish_wave(&mut self, root: NodeId, wave: &[NodeId]) {
        for node_id in std::iter::once(&root).chain(wave) {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.set_slot(ScheduleSlot::Unscheduled);
            }
        }
    }

    /// End `node_id` and everything downstream of it.
    ///
    /// Edges are severed only in the upstream direction: the node leaves its
    /// sources' sink sets, and ancestors are never ended. Returns the ids that
    /// changed state, in the order they were ended.
    pub fn end_node(&mut self, node_id: NodeId) -> Vec<NodeId> {
        let mut ended = Vec::new();
        let mut pending = vec![node_id];

        while let Some(node_id) = pending.pop() {
            let (sources, sinks) = match self.nodes.get_mut(&node_id) {
                Some(node) if node.kind() != NodeKind::Ended => node.end(),
                _ => continue,
            };

            for source_id in sources {
                if let Some(source) = self.nodes.get_mut(&source_id) {
                    source.remove_sink(node_id);
                }
            }
            ended.push(node_id);
            self.ended.push(node_id);

            // Reversed so sinks are ended in their discovery order.
            pending.extend(sinks.into_iter().rev());
        }
        ended
    }

    /// Drop ended nodes that no handle refers to any more.
    ///
    /// Nothing live points at an ended node: its sources forgot it when it
    /// ended and its sinks ended with it. Returns the number of nodes dropped.
    pub fn release_ended(&mut self) -> usize {
        let before = self.nodes.len();
        let nodes = &mut self.nodes;
        self.ended.retain(|node_id| {
            let held = nodes.get(node_id).is_some_and(Node::is_held);
            if !held {
                nodes.remove(node_id);
            }
            held
        });
        before - self.nodes.len()
    }

    /// Get the total number of nodes in the graph, unreleased ended ones
    /// included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{compute_fn, Update};
    use serde_json::json;
    use std::sync::Arc;

    fn derived(scheduler: &mut UpdateScheduler, sources: &[NodeId]) -> NodeId {
        let compute = compute_fn(|_| Update::Value(Value::Null));
        scheduler.add_node(Node::computed(sources.iter().copied(), compute, None))
    }

    fn position(wave: &[NodeId], id: NodeId) -> usize {
        wave.iter().position(|&n| n == id).unwrap()
    }

    #[test]
    fn add_node_registers_sinks() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source(Some(json!(1))));
        let b = scheduler.add_node(Node::source(Some(json!(2))));
        let c = derived(&mut scheduler, &[a, b]);

        assert_eq!(scheduler.node_count(), 3);
        assert!(scheduler.get_node(a).unwrap().sinks().contains(&c));
        assert!(scheduler.get_node(b).unwrap().sinks().contains(&c));
        assert_eq!(scheduler.get_node(c).unwrap().sources(), &[a, b]);
    }

    #[test]
    fn live_source_rejects_unknown_and_ended() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source(None));
        let stranger = NodeId::new();

        assert!(scheduler.live_source("map", a).is_ok());
        assert_eq!(
            scheduler.live_source("map", stranger).unwrap_err(),
            GraphError::ForeignAtom { op: "map", id: stranger }
        );

        scheduler.end_node(a);
        assert_eq!(
            scheduler.live_source("map", a).unwrap_err(),
            GraphError::EndedSource { op: "map", id: a }
        );
    }

    #[test]
    fn chain_is_scheduled_in_order() {
        let mut scheduler = UpdateScheduler::new();
        let source = scheduler.add_node(Node::source(Some(json!(0))));
        let derived1 = derived(&mut scheduler, &[source]);
        let derived2 = derived(&mut scheduler, &[derived1]);

        let wave = scheduler.schedule_wave(source);
        assert_eq!(wave, vec![derived1, derived2]);
        assert_eq!(scheduler.get_node(source).unwrap().slot(), ScheduleSlot::Root);
        assert_eq!(
            scheduler.get_node(derived2).unwrap().slot(),
            ScheduleSlot::Queued(1)
        );
    }

    #[test]
    fn diamond_is_scheduled_once_after_both_parents() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source(Some(json!(2))));
        let b = derived(&mut scheduler, &[a]);
        let b2 = derived(&mut scheduler, &[b]);
        let c = derived(&mut scheduler, &[a]);
        let bc = derived(&mut scheduler, &[b, c]);
        let c2 = derived(&mut scheduler, &[c]);
        let ac = derived(&mut scheduler, &[a, c]);

        let wave = scheduler.schedule_wave(a);
        assert_eq!(wave.len(), 6);

        for (parent, child) in [(b, b2), (b, bc), (c, bc), (c, c2), (c, ac)] {
            assert!(position(&wave, parent) < position(&wave, child));
        }
    }

    #[test]
    fn rediscovered_node_moves_behind_new_ancestor() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source(Some(json!(0))));
        // `joined` is first reached through `early`, before `late_parent` is walked.
        let early = derived(&mut scheduler, &[a]);
        let late_parent = derived(&mut scheduler, &[a]);
        let joined = derived(&mut scheduler, &[early, late_parent]);
        let tail = derived(&mut scheduler, &[joined]);

        let wave = scheduler.schedule_wave(a);
        assert_eq!(wave, vec![early, late_parent, joined, tail]);
    }

    #[test]
    fn halt_skips_whole_downstream_closure() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source(Some(json!(0))));
        let b = derived(&mut scheduler, &[a]);
        let c = derived(&mut scheduler, &[b]);
        let d = derived(&mut scheduler, &[c]);
        let side = derived(&mut scheduler, &[a]);

        let wave = scheduler.schedule_wave(a);
        scheduler.halt_offspring(b);

        assert!(scheduler.is_queued(b));
        assert!(!scheduler.is_queued(c));
        assert!(!scheduler.is_queued(d));
        assert!(scheduler.is_queued(side));

        scheduler.finish_wave(a, &wave);
        for id in [a, b, c, d, side] {
            assert_eq!(
                scheduler.get_node(id).unwrap().slot(),
                ScheduleSlot::Unscheduled
            );
        }
    }

    #[test]
    fn end_cascades_downstream_only() {
        let mut scheduler = UpdateScheduler::new();
        let source = scheduler.add_node(Node::source(Some(json!(4))));
        let middle = derived(&mut scheduler, &[source]);
        let leaf = derived(&mut scheduler, &[middle]);

        let ended = scheduler.end_node(middle);
        assert_eq!(ended, vec![middle, leaf]);

        assert!(!scheduler.get_node(source).unwrap().is_ended());
        assert!(scheduler.get_node(source).unwrap().sinks().is_empty());
        assert!(scheduler.get_node(middle).unwrap().is_ended());
        assert!(scheduler.get_node(leaf).unwrap().is_ended());

        // Ending again changes nothing.
        assert!(scheduler.end_node(middle).is_empty());
    }

    #[test]
    fn deep_chain_is_walked_without_recursion() {
        let mut scheduler = UpdateScheduler::new();
        let source = scheduler.add_node(Node::source(Some(json!(0))));
        let mut last = source;
        for _ in 0..100_000 {
            last = derived(&mut scheduler, &[last]);
        }

        let wave = scheduler.schedule_wave(source);
        assert_eq!(wave.len(), 100_000);
        assert_eq!(wave.last(), Some(&last));
        scheduler.finish_wave(source, &wave);

        assert_eq!(scheduler.end_node(source).len(), 100_001);
        assert!(scheduler.get_node(last).unwrap().is_ended());
    }

    #[test]
    fn release_drops_only_unheld_ended_nodes() {
        let mut scheduler = UpdateScheduler::new();
        let held = Arc::new(());
        let mut root = Node::source(Some(json!(1)));
        root.set_handle(Arc::downgrade(&held));
        let a = scheduler.add_node(root);
        let b = derived(&mut scheduler, &[a]);
        let live = scheduler.add_node(Node::source(None));

        scheduler.end_node(a);
        assert_eq!(scheduler.release_ended(), 1);
        assert!(scheduler.get_node(a).unwrap().is_ended());
        assert!(scheduler.get_node(b).is_none());
        assert!(scheduler.get_node(live).is_some());

        drop(held);
        assert_eq!(scheduler.release_ended(), 1);
        assert_eq!(scheduler.node_count(), 1);
        assert_eq!(scheduler.release_ended(), 0);
    }

    #[test]
    fn end_handles_shared_descendants() {
        let mut scheduler = UpdateScheduler::new();
        let a = scheduler.add_node(Node::source(Some(json!(0))));
        let b = derived(&mut scheduler, &[a]);
        let c = derived(&mut scheduler, &[a]);
        let d = derived(&mut scheduler, &[b, c]);

        let ended = scheduler.end_node(a);
        assert_eq!(ended.len(), 4);
        assert!(ended.contains(&d));
        assert!(scheduler.get_node(c).unwrap().sinks().is_empty());
    }
}
