//! Atoms and Combinators
//!
//! This module implements the user-facing side of the engine: the [`Graph`]
//! handle, the [`Atom`] handles it hands out, and the combinators that build
//! new atoms out of existing ones.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An atom is a node holding a JSON value. Source atoms are written directly.
//! Computed atoms (`map`, `combine`, `scan`, `merge`, `scan_merge`) are
//! readonly and recompute whenever an atom they derive from changes.
//!
//! ## Lensed Atoms
//!
//! `view` focuses on part of another atom's value. A lensed atom is writable
//! when its parent is: the write is translated through the lens into a new
//! value for the nearest non-lensed ancestor, which is then propagated like
//! any other write.
//!
//! ## Halting
//!
//! A compute function may answer
//! [`Update::Halt`](crate::graph::Update::Halt) instead of a value. The atom
//! keeps its previous value and nothing downstream of it recomputes for that
//! write.
//!
//! ## Pending Atoms
//!
//! An atom with no value yet is pending. Sources start pending when created
//! with [`Graph::pending`], and atoms derived from a pending atom stay
//! pending until a write gives them an input to work with.
//!
//! # Implementation Notes
//!
//! Writes are synchronous: [`Atom::write`] returns after every dependent atom
//! has been recomputed. Dependencies are declared when an atom is created,
//! never discovered by tracking reads.

mod atom;
mod context;
mod derive;
mod runtime;
mod update;

pub use atom::Atom;
pub use derive::{combine, map, merge, reducer, scan, scan_merge, view, Reducer};
pub use runtime::Graph;
pub use update::{end, get, is_atom, log, modify, over, remove, set, LogArg};
