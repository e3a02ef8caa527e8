//! Writing helpers and small utilities over atoms.
//!
//! Each write helper reads the atom's current value, computes the new one
//! and writes it back as one mutation: no other write can slip in between,
//! even from another thread. Lensed atoms write back to their root and
//! readonly atoms refuse the write, exactly as with [`Atom::write`].

use std::any::Any;

use serde_json::Value;
use tracing::info;

use super::atom::Atom;
use super::runtime::Write;
use crate::error::Result;
use crate::optics::{self, Lens};

/// Replace the value of `atom` with `f(current)`.
pub fn modify<F>(f: F, atom: &Atom) -> Result<&Atom>
where
    F: FnOnce(&Value) -> Value,
{
    atom.graph().modify(atom.id(), f)?;
    Ok(atom)
}

/// Write `value` at `lens` within `atom`'s current value.
///
/// ```rust
/// use serde_json::json;
/// use tether_core::{path, set, Graph};
///
/// let graph = Graph::new();
/// let state = graph.source(json!({"todos": [{"done": false}]}));
///
/// set(path!("todos", 0, "done"), true, &state).unwrap();
/// assert_eq!(state.read(), json!({"todos": [{"done": true}]}));
/// ```
pub fn set(lens: impl Into<Lens>, value: impl Into<Value>, atom: &Atom) -> Result<&Atom> {
    let lens = lens.into();
    let value = value.into();
    modify(|current| optics::set(&lens, Some(value), current).into_owned(), atom)
}

/// Write `f(focus)` at `lens` within `atom`'s current value. `f` sees `None`
/// for an absent focus and may return `None` to delete it.
pub fn over<F>(lens: impl Into<Lens>, f: F, atom: &Atom) -> Result<&Atom>
where
    F: FnOnce(Option<&Value>) -> Option<Value>,
{
    let lens = lens.into();
    modify(|current| optics::over(&lens, f, current).into_owned(), atom)
}

/// Read `lens` within `atom`'s current value without creating an atom.
/// An absent focus reads as `null`.
pub fn get(lens: impl Into<Lens>, atom: &Atom) -> Value {
    atom.graph().read_through(atom.id(), &lens.into())
}

/// Delete `atom`'s focus from its root, or store `null` in a source.
pub fn remove(atom: &Atom) -> Result<&Atom> {
    atom.write_raw(Write::Remove)
}

/// End `atom` and every atom derived from it. Ended atoms keep their last
/// value but take no further writes and cannot be derived from.
pub fn end(atom: &Atom) -> Result<&Atom> {
    atom.graph().end(atom.id())?;
    Ok(atom)
}

pub fn is_atom(value: &dyn Any) -> bool {
    value.is::<Atom>()
}

/// One argument to [`log`]: an atom or a plain value.
#[derive(Debug, Clone)]
pub enum LogArg {
    Atom(Atom),
    Value(Value),
}

impl LogArg {
    fn resolve(self) -> Value {
        match self {
            LogArg::Atom(atom) => atom.read(),
            LogArg::Value(value) => value,
        }
    }
}

impl From<&Atom> for LogArg {
    fn from(atom: &Atom) -> Self {
        LogArg::Atom(atom.clone())
    }
}

impl From<Atom> for LogArg {
    fn from(atom: Atom) -> Self {
        LogArg::Atom(atom)
    }
}

impl From<Value> for LogArg {
    fn from(value: Value) -> Self {
        LogArg::Value(value)
    }
}

impl From<&Value> for LogArg {
    fn from(value: &Value) -> Self {
        LogArg::Value(value.clone())
    }
}

impl From<&str> for LogArg {
    fn from(text: &str) -> Self {
        LogArg::Value(Value::from(text))
    }
}

/// Log the current values of `args` at `INFO` on target `tether::log` and
/// return them.
pub fn log<I>(args: I) -> Vec<Value>
where
    I: IntoIterator,
    I::Item: Into<LogArg>,
{
    let values: Vec<Value> = args.into_iter().map(|arg| arg.into().resolve()).collect();
    let rendered = values
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    info!(target: "tether::log", values = %rendered, "log");
    values
}
