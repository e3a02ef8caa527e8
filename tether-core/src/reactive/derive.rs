//! Derived atoms: `map`, `combine`, `view`, `scan`, `merge` and
//! `scan_merge`.
//!
//! Every combinator here builds exactly one node. The free functions take
//! the function first and the atoms last; [`Atom`] carries bound forms of
//! the single-source ones.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::atom::Atom;
use crate::error::{GraphError, Result};
use crate::graph::{compute_fn, ComputeFn, Inputs, Update};
use crate::optics::Lens;

/// A `scan_merge` step: `(accumulator, input) -> accumulator`.
pub type Reducer = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Box a closure as a [`Reducer`].
pub fn reducer<F>(f: F) -> Reducer
where
    F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

fn first_source<'a>(op: &'static str, sources: &[&'a Atom]) -> Result<&'a Atom> {
    sources
        .first()
        .copied()
        .ok_or(GraphError::EmptySources { op })
}

/// Run `compute` once over the sources' initial values; stay pending if any
/// of them is pending or the result is `Halt`.
fn compute_initial(values: Option<&[Value]>, compute: &ComputeFn) -> Option<Value> {
    values.and_then(|values| compute(&Inputs::initial(values)).into_value())
}

/// Derive an atom from several sources.
///
/// `f` sees the sources' values in declaration order. It is not called while
/// any source is pending, and returning [`Update::Halt`] keeps the previous
/// value and stops propagation below this atom for the current write.
///
/// ```rust
/// use serde_json::{json, Value};
/// use tether_core::{combine, Graph, Update};
///
/// let graph = Graph::new();
/// let a = graph.source(json!(2));
/// let b = graph.source(json!(3));
/// let sum = combine(
///     |values: &[Value]| {
///         json!(values.iter().filter_map(Value::as_i64).sum::<i64>()).into()
///     },
///     &[&a, &b],
/// )
/// .unwrap();
///
/// assert_eq!(sum.read(), json!(5));
/// b.write(json!(10)).unwrap();
/// assert_eq!(sum.read(), json!(12));
/// ```
pub fn combine<F>(f: F, sources: &[&Atom]) -> Result<Atom>
where
    F: Fn(&[Value]) -> Update + Send + Sync + 'static,
{
    let op = "combine";
    let compute = compute_fn(move |inputs| {
        if inputs.any_pending() {
            Update::Halt
        } else {
            f(inputs.values())
        }
    });
    first_source(op, sources)?
        .graph()
        .derive(op, sources, compute, compute_initial)
}

/// Derive an atom from one source.
pub fn map<F>(f: F, source: &Atom) -> Result<Atom>
where
    F: Fn(&Value) -> Update + Send + Sync + 'static,
{
    let compute = compute_fn(move |inputs| {
        if inputs.any_pending() {
            Update::Halt
        } else {
            f(&inputs.values()[0])
        }
    });
    source
        .graph()
        .derive("map", &[source], compute, compute_initial)
}

/// A writable (unless `source` is readonly) atom focused on part of
/// `source`. Writes to it are written back through the lens.
pub fn view(lens: impl Into<Lens>, source: &Atom) -> Result<Atom> {
    source.graph().view(lens.into(), source)
}

/// Fold every value of `source` into an accumulator.
///
/// The first value is `f(seed, source)`, or `seed` itself while `source` is
/// pending. Halted writes never reach the fold.
pub fn scan<F>(f: F, seed: impl Into<Value>, source: &Atom) -> Result<Atom>
where
    F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
{
    let seed = seed.into();
    let acc = Arc::new(Mutex::new(seed.clone()));

    let compute = compute_fn(move |inputs| {
        if inputs.any_pending() {
            return Update::Halt;
        }
        let mut acc = acc.lock();
        let next = f(&*acc, &inputs.values()[0]);
        *acc = next.clone();
        Update::Value(next)
    });

    source
        .graph()
        .derive("scan", &[source], compute, move |values, compute| match values {
            Some(values) => compute(&Inputs::initial(values)).into_value(),
            None => Some(seed),
        })
}

/// An atom that follows whichever of `a` and `b` changed last.
///
/// On creation it takes `b`'s value. When one write reaches both, the
/// source that the write reached later wins.
pub fn merge(a: &Atom, b: &Atom) -> Result<Atom> {
    let compute = compute_fn(|inputs| {
        let winner = match inputs.most_recent() {
            Some(0) => 0,
            _ => 1,
        };
        if inputs.is_pending(winner) {
            Update::Halt
        } else {
            Update::Value(inputs.values()[winner].clone())
        }
    });
    a.graph().derive("merge", &[a, b], compute, compute_initial)
}

/// Fold several sources into one accumulator, each with its own reducer.
///
/// A write runs the reducers of the sources it reached, in declaration
/// order. The initial value folds every source's current value, or is
/// `seed` while any source is pending.
///
/// ```rust
/// use serde_json::json;
/// use tether_core::{reducer, scan_merge, Graph};
///
/// let graph = Graph::new();
/// let add = graph.source(json!(0));
/// let reset = graph.source(json!(null));
///
/// let total = scan_merge(
///     vec![
///         (reducer(|acc, n| json!(acc.as_i64().unwrap_or(0) + n.as_i64().unwrap_or(0))), &add),
///         (reducer(|_, _| json!(0)), &reset),
///     ],
///     json!(0),
/// )
/// .unwrap();
///
/// add.write(json!(5)).unwrap();
/// add.write(json!(2)).unwrap();
/// assert_eq!(total.read(), json!(7));
///
/// reset.write(json!(null)).unwrap();
/// assert_eq!(total.read(), json!(0));
/// ```
pub fn scan_merge(pairs: Vec<(Reducer, &Atom)>, seed: impl Into<Value>) -> Result<Atom> {
    let op = "scan_merge";
    let seed = seed.into();
    let (reducers, sources): (Vec<Reducer>, Vec<&Atom>) = pairs.into_iter().unzip();
    let graph = first_source(op, &sources)?.graph();

    let reducers: Arc<[Reducer]> = reducers.into();
    let acc = Arc::new(Mutex::new(seed.clone()));

    let compute = {
        let reducers = Arc::clone(&reducers);
        let acc = Arc::clone(&acc);
        compute_fn(move |inputs| {
            let mut acc = acc.lock();
            for (index, reducer) in reducers.iter().enumerate() {
                if inputs.is_active(index) && !inputs.is_pending(index) {
                    let next = reducer(&*acc, &inputs.values()[index]);
                    *acc = next;
                }
            }
            Update::Value(acc.clone())
        })
    };

    graph.derive(op, &sources, compute, move |values, _| {
        let values = match values {
            Some(values) => values,
            None => return Some(seed),
        };
        let folded = reducers
            .iter()
            .zip(values)
            .fold(seed, |acc, (reducer, value)| reducer(&acc, value));
        *acc.lock() = folded.clone();
        Some(folded)
    })
}
