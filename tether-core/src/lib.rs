//! Tether Core
//!
//! This crate provides a synchronous reactive value engine. It implements:
//!
//! - Atoms: cells holding JSON values, either written directly or derived
//!   from other atoms
//! - Glitch-free propagation: every atom affected by a write recomputes
//!   exactly once, after everything it depends on
//! - Halting: a derived atom can stop a write from travelling further
//! - Lensed atoms: read/write views onto part of another atom's value
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `optics`: pure `view` / `set` / `over` over `serde_json::Value`
//! - `graph`: node records and the update scheduler
//! - `reactive`: the `Graph` and `Atom` handles and the combinators
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tether_core::{combine, Graph, Update};
//!
//! let graph = Graph::new();
//! let todos = graph.source(json!([
//!     { "title": "write docs", "done": false },
//!     { "title": "ship", "done": false },
//! ]));
//!
//! // A writable view onto the first item's flag
//! let first_done = todos.view(tether_core::path!(0, "done")).unwrap();
//!
//! // A derived count of finished items
//! let finished = combine(
//!     |values| {
//!         let count = values[0]
//!             .as_array()
//!             .map(|items| items.iter().filter(|item| item["done"] == json!(true)).count())
//!             .unwrap_or(0);
//!         Update::Value(json!(count))
//!     },
//!     &[&todos],
//! )
//! .unwrap();
//!
//! first_done.write(json!(true)).unwrap();
//! assert_eq!(finished.read(), json!(1));
//! assert_eq!(todos.read()[0]["done"], json!(true));
//! ```

pub mod graph;
pub mod optics;
pub mod reactive;

mod config;
mod error;

pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use graph::{InputState, Inputs, NodeId, NodeKind, Update};
pub use optics::{Lens, Segment};
pub use reactive::{
    combine, end, get, is_atom, log, map, merge, modify, over, reducer, remove, scan, scan_merge,
    set, view, Atom, Graph, LogArg, Reducer,
};
