//! ValueOps (C2): nested-field access, heterogeneous comparison, and
//! expression-reference resolution, per §4.2.
//!
//! Diverges from the teacher's `value_utils.rs` in two places the spec is
//! explicit about:
//! - `get_nested_value` descends only into mapping nodes; array-index path
//!   segments (`items.0.name`) are *not* supported (§4.2 -- dotted-path
//!   traversal of list indexes is not supported here).
//! - `compare_values` only treats Number/Number and String/String as
//!   comparable; the teacher additionally orders booleans, which §4.2 does
//!   not mention and which would make `$gt`/`$lt` accept arguments the spec
//!   calls incomparable.

use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Split `path` on `.` and descend only into object nodes. Any step through
/// a non-object value (including arrays) returns `None` ("missing").
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return doc.get(path);
    }

    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            _ => return None,
        }
    }
    Some(value)
}

/// Write `value` at `path` in `doc`, creating intermediate objects for any
/// missing segment. Used by `$unwind`/`$geoNear` to write back at the same
/// dotted path they read from, so a nested field doesn't end up with a
/// stray literal-dotted sibling key alongside the untouched original.
pub fn set_nested_value(doc: &mut Value, path: &str, value: Value) {
    if !path.contains('.') {
        if let Value::Object(map) = doc {
            map.insert(path.to_string(), value);
        }
        return;
    }

    let mut parts = path.split('.').peekable();
    let mut current = doc;
    while let Some(part) = parts.next() {
        let map = match current {
            Value::Object(map) => map,
            _ => return,
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// `deref(expr, doc)`: if `expr` is a string beginning with `$`, resolve the
/// remainder as a dotted path against `doc`; otherwise return `expr` as-is.
/// Used by `$group`/accumulator expressions and by `$unwind`'s path
/// argument.
pub fn deref<'a>(expr: &'a Value, doc: &'a Value) -> Option<&'a Value> {
    match expr {
        Value::String(s) if s.starts_with('$') => get_nested_value(doc, &s[1..]),
        other => Some(other),
    }
}

/// Compare two JSON values. `Some(Ordering)` only for Number/Number and
/// String/String pairs; everything else -- including cross-type pairs -- is
/// incomparable and returns `None`, per §4.2's "otherwise incomparable"
/// rule, which orderings translate to `false`.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => {
            let f1 = n1.as_f64()?;
            let f2 = n2.as_f64()?;
            f1.partial_cmp(&f2)
        }
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        _ => None,
    }
}

/// Compare two optional JSON values for `$sort`'s per-field tie rule (§4.4):
/// both missing -> equal; one missing -> missing sorts less; both present
/// and comparable -> by `compare_values`; otherwise equal (ties broken by
/// the next sort key, or left in stable input order).
pub fn compare_values_with_none(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => compare_values(av, bv).unwrap_or(Ordering::Equal),
    }
}

/// Structural deep equality for `$eq`/`$ne`/scalar-equality matching and for
/// `$in`/`$nin` membership tests. `serde_json::Value`'s derived `PartialEq`
/// already implements deep structural equality for scalars and containers
/// alike, which matches §4.2 ("structural deep equality for scalars; for
/// nested structures, equality is unspecified [but] not exercised by
/// current operators").
pub fn equals(a: &Value, b: &Value) -> bool {
    a == b
}
