//! Optics
//!
//! Pure structural reads and writes over plain nested data
//! ([`serde_json::Value`]). Nothing in here knows about the graph.
//!
//! # Write Semantics
//!
//! [`set`] never mutates its input. It returns a [`Cow`]:
//!
//! - `Cow::Borrowed(target)` when the write changes nothing (deleting a key
//!   that is not there, touching an index that is out of range). The borrow
//!   points at the very value that was passed in, so callers can detect a
//!   no-op by reference.
//! - `Cow::Owned(new)` otherwise, a fresh container.
//!
//! A value of `None` means "delete": the key is dropped from its object, or
//! the element is removed from its array with later elements shifted down.
//!
//! Writing through a missing (or `null`) intermediate step creates the
//! container the step needs: an object for a name, a `null`-padded array for
//! an index. An index above [`MAX_PADDED_INDEX`] is out of range for such a
//! fresh array, so the write is a no-op instead of an unbounded allocation.

mod lens;

pub use lens::{Lens, Segment};

use std::borrow::Cow;

use serde_json::{Map, Value};

use lens::Step;

/// Largest index a write may pad a freshly created array up to.
pub const MAX_PADDED_INDEX: usize = 1 << 16;

/// Read the focus of `lens` inside `target`.
///
/// Returns `None` when the focus does not exist.
pub fn view<'a>(lens: &Lens, target: &'a Value) -> Option<&'a Value> {
    match lens {
        Lens::Identity => Some(target),
        Lens::Prop(name) => view_step(Step::Prop(name), target),
        Lens::Index(index) => view_step(Step::Index(*index), target),
        Lens::Path(segments) => segments
            .iter()
            .try_fold(target, |focus, segment| view_step(segment.step(), focus)),
    }
}

/// Write `value` at the focus of `lens` inside `target`.
///
/// `None` deletes the focus. See the module docs for the no-op rules.
pub fn set<'a>(lens: &Lens, value: Option<Value>, target: &'a Value) -> Cow<'a, Value> {
    match lens {
        Lens::Identity => set_step(Step::Identity, value, target),
        Lens::Prop(name) => set_prop(name, value, target),
        Lens::Index(index) => set_index(*index, value, target),
        Lens::Path(segments) => set_path(segments, value, target),
    }
}

/// Replace the focus of `lens` with `f(focus)`.
pub fn over<'a, F>(lens: &Lens, f: F, target: &'a Value) -> Cow<'a, Value>
where
    F: FnOnce(Option<&Value>) -> Option<Value>,
{
    let value = f(view(lens, target));
    set(lens, value, target)
}

fn resolve_index(index: isize, len: usize) -> Option<usize> {
    if index < 0 {
        let from_end = len as isize + index;
        (from_end >= 0).then_some(from_end as usize)
    } else {
        let index = index as usize;
        (index < len).then_some(index)
    }
}

fn view_step<'a>(step: Step<'_>, target: &'a Value) -> Option<&'a Value> {
    match step {
        Step::Identity => Some(target),
        Step::Prop(name) => target.as_object()?.get(name),
        Step::Index(index) => {
            let items = target.as_array()?;
            items.get(resolve_index(index, items.len())?)
        }
    }
}

fn set_step<'a>(step: Step<'_>, value: Option<Value>, target: &'a Value) -> Cow<'a, Value> {
    match step {
        Step::Identity => Cow::Owned(value.unwrap_or(Value::Null)),
        Step::Prop(name) => set_prop(name, value, target),
        Step::Index(index) => set_index(index, value, target),
    }
}

fn set_prop<'a>(name: &str, value: Option<Value>, target: &'a Value) -> Cow<'a, Value> {
    let Value::Object(entries) = target else {
        return match value {
            Some(value) => {
                let mut entries = Map::new();
                entries.insert(name.to_string(), value);
                Cow::Owned(Value::Object(entries))
            }
            None => Cow::Borrowed(target),
        };
    };

    match value {
        Some(value) => {
            let mut entries = entries.clone();
            entries.insert(name.to_string(), value);
            Cow::Owned(Value::Object(entries))
        }
        None if entries.contains_key(name) => Cow::Owned(Value::Object(
            entries
                .iter()
                .filter(|(key, _)| key.as_str() != name)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )),
        None => Cow::Borrowed(target),
    }
}

fn set_index<'a>(index: isize, value: Option<Value>, target: &'a Value) -> Cow<'a, Value> {
    let Value::Array(items) = target else {
        return match value {
            Some(value) if (0..=MAX_PADDED_INDEX as isize).contains(&index) => {
                let mut items = vec![Value::Null; index as usize];
                items.push(value);
                Cow::Owned(Value::Array(items))
            }
            _ => Cow::Borrowed(target),
        };
    };

    let Some(position) = resolve_index(index, items.len()) else {
        return Cow::Borrowed(target);
    };

    let mut items = items.clone();
    match value {
        Some(value) => items[position] = value,
        None => {
            items.remove(position);
        }
    }
    Cow::Owned(Value::Array(items))
}

fn set_path<'a>(segments: &[Segment], value: Option<Value>, target: &'a Value) -> Cow<'a, Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Cow::Owned(value.unwrap_or(Value::Null));
    };

    let step = first.step();
    if let Step::Identity = step {
        return set_path(rest, value, target);
    }
    if rest.is_empty() {
        return set_step(step, value, target);
    }

    match view_step(step, target) {
        Some(child) => match set_path(rest, value, child) {
            Cow::Borrowed(_) => Cow::Borrowed(target),
            Cow::Owned(child) => set_step(step, Some(child), target),
        },
        // Nothing to delete below a missing step.
        None if value.is_none() => Cow::Borrowed(target),
        None => match set_path(rest, value, &Value::Null) {
            Cow::Borrowed(_) => Cow::Borrowed(target),
            Cow::Owned(child) => set_step(step, Some(child), target),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    fn assert_same(result: Cow<'_, Value>, target: &Value) {
        match result {
            Cow::Borrowed(result) => assert!(std::ptr::eq(result, target)),
            Cow::Owned(result) => panic!("expected the input back, got new value {result}"),
        }
    }

    #[test]
    fn identity_replaces_whole_target() {
        let target = json!({ "a": 3 });
        assert_eq!(set(&Lens::Identity, Some(json!(3)), &target).into_owned(), json!(3));
        assert_eq!(view(&Lens::Identity, &target), Some(&target));
    }

    #[test]
    fn identity_inside_path_passes_through() {
        let target = json!({ "a": [0, 1] });
        let lens = path!("a", Segment::Identity);
        assert_eq!(set(&lens, Some(json!("foo")), &target).into_owned(), json!({ "a": "foo" }));

        let lens = path!("a", None::<&str>, 1);
        assert_eq!(
            set(&lens, Some(json!("foo")), &target).into_owned(),
            json!({ "a": [0, "foo"] })
        );
        assert_eq!(view(&lens, &target), Some(&json!(1)));
    }

    #[test]
    fn prop_adds_and_overrides() {
        let target = json!({ "a": 1, "b": 2 });
        assert_eq!(
            set(&"c".into(), Some(json!(3)), &target).into_owned(),
            json!({ "a": 1, "b": 2, "c": 3 })
        );
        assert_eq!(
            set(&"b".into(), Some(json!(7)), &target).into_owned(),
            json!({ "a": 1, "b": 7 })
        );
        // Input untouched.
        assert_eq!(target, json!({ "a": 1, "b": 2 }));
    }

    #[test]
    fn prop_keeps_key_order_on_override() {
        let target = json!({ "b": 1, "a": 2 });
        let result = set(&"b".into(), Some(json!(5)), &target).into_owned();
        let keys: Vec<_> = result.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn prop_on_non_object_makes_object() {
        assert_eq!(set(&"a".into(), Some(json!(7)), &json!([])).into_owned(), json!({ "a": 7 }));
        assert_eq!(set(&"a".into(), Some(json!(7)), &Value::Null).into_owned(), json!({ "a": 7 }));
    }

    #[test]
    fn prop_delete_removes_present_key() {
        let target = json!({ "a": 1, "b": 2, "c": 3 });
        assert_eq!(set(&"b".into(), None, &target).into_owned(), json!({ "a": 1, "c": 3 }));
    }

    #[test]
    fn prop_delete_of_absent_key_returns_input() {
        let target = json!({ "a": 1, "c": 2 });
        assert_same(set(&"b".into(), None, &target), &target);
    }

    #[test]
    fn index_replaces_element() {
        let target = json!([0, 1, 2]);
        assert_eq!(set(&1.into(), Some(json!("foo")), &target).into_owned(), json!([0, "foo", 2]));
        assert_eq!(set(&(-3).into(), Some(json!("foo")), &target).into_owned(), json!(["foo", 1, 2]));
    }

    #[test]
    fn index_out_of_range_returns_input() {
        let target = json!([0, 1, 2]);
        assert_same(set(&3.into(), Some(json!("foo")), &target), &target);
        assert_same(set(&(-4).into(), Some(json!("foo")), &target), &target);
        assert_same(set(&3.into(), None, &target), &target);
        assert_same(set(&(-4).into(), None, &target), &target);
    }

    #[test]
    fn index_on_non_array_makes_array() {
        assert_eq!(set(&1.into(), Some(json!(7)), &json!({})).into_owned(), json!([null, 7]));
    }

    #[test]
    fn padding_is_capped() {
        let null = Value::Null;
        let at_cap = set(&MAX_PADDED_INDEX.into(), Some(json!(1)), &null).into_owned();
        assert_eq!(at_cap.as_array().map(Vec::len), Some(MAX_PADDED_INDEX + 1));

        let target = json!({ "a": 1 });
        assert_same(set(&(MAX_PADDED_INDEX + 1).into(), Some(json!(1)), &null), &null);
        assert_same(set(&path!("x", usize::MAX), Some(json!(1)), &target), &target);
        assert_same(set(&path!("x", -1, "y"), Some(json!(1)), &target), &target);
    }

    #[test]
    fn index_delete_shifts_elements() {
        let target = json!([0, "foo", 2]);
        assert_eq!(set(&1.into(), None, &target).into_owned(), json!([0, 2]));
        assert_eq!(set(&(-1).into(), None, &target).into_owned(), json!([0, "foo"]));
    }

    #[test]
    fn path_changes_nested_value() {
        let target = json!({ "a": [0, { "b": "foo", "c": "bar" }] });
        assert_eq!(
            set(&path!("a", 1, "c"), Some(json!("biz")), &target).into_owned(),
            json!({ "a": [0, { "b": "foo", "c": "biz" }] })
        );
    }

    #[test]
    fn path_autovivifies() {
        assert_eq!(
            set(&path!("a", 1, "b"), Some(json!(7)), &Value::Null).into_owned(),
            json!({ "a": [null, { "b": 7 }] })
        );
        assert_eq!(
            set(&path!("a", "b", "c"), Some(json!(7)), &json!({ "a": { "b": null } })).into_owned(),
            json!({ "a": { "b": { "c": 7 } } })
        );
    }

    #[test]
    fn path_delete() {
        let target = json!({ "a": [0, { "b": 7 }] });
        assert_eq!(set(&path!("a", 1, "b"), None, &target).into_owned(), json!({ "a": [0, {}] }));
        assert_eq!(set(&path!("a", -1), None, &target).into_owned(), json!({ "a": [0] }));
    }

    #[test]
    fn path_delete_of_missing_focus_returns_input() {
        let target = json!({ "a": [0, { "c": 7 }] });
        assert_same(set(&path!("a", 1, "b"), None, &target), &target);
        assert_same(set(&path!("a", 2), None, &target), &target);
        assert_same(set(&path!("x", "y"), None, &target), &target);
    }

    #[test]
    fn view_reads_nested_focus() {
        let target = json!({ "a": [0, { "b": 7 }] });
        assert_eq!(view(&"a".into(), &target), Some(&json!([0, { "b": 7 }])));
        assert_eq!(view(&path!("a", -1, "b"), &target), Some(&json!(7)));
        assert_eq!(view(&path!("a", 5), &target), None);
        assert_eq!(view(&"a".into(), &Value::Null), None);
    }

    #[test]
    fn over_applies_function_at_focus() {
        let target = json!({ "count": 2 });
        let result = over(
            &"count".into(),
            |count| count.and_then(Value::as_i64).map(|n| json!(n * 10)),
            &target,
        );
        assert_eq!(result.into_owned(), json!({ "count": 20 }));
    }

    #[test]
    fn over_can_delete() {
        let target = json!({ "a": 1, "b": 2 });
        let result = over(&"a".into(), |_| None, &target);
        assert_eq!(result.into_owned(), json!({ "b": 2 }));
    }
}
