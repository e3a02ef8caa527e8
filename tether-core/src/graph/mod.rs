//! Dependency Graph
//!
//! This module implements the dependency graph that atoms live in.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes are atoms: raw sources, computed values, and lensed views
//! - Edges point downstream: if B derives from A, B is a sink of A and A is
//!   a source of B
//!
//! When a node is written, the scheduler collects everything reachable
//! through sinks into a wave stack and recomputes it in dependency order.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena keyed by [`NodeId`]. Edges are stored as ids on
//!    both ends, and ending a node removes ids rather than relying on handles
//!    being dropped.
//!
//! 2. Edges are only ever added when a node is created, from nodes that
//!    already exist. A cycle cannot be built, so there is no cycle check.
//!
//! 3. Sinks are kept in insertion order so that wave order, and anything
//!    that depends on it such as `merge` tie-breaks, is deterministic.

mod node;
mod scheduler;

pub use node::{
    compute_fn, ComputeFn, InputState, Inputs, Node, NodeId, NodeKind, ScheduleSlot, Update,
};
pub use scheduler::UpdateScheduler;
