// src/query/operators.rs
//! Field-operator registry (§4.3 step 2), a Strategy-pattern reuse of the
//! teacher's `OPERATOR_REGISTRY` shape: one struct per operator, registered
//! in a `lazy_static!` map keyed by the operator string. Restricted to the
//! nine operators §4.3's table names -- the teacher's broader set (`$all`,
//! `$elemMatch`, `$size`, `$type`, `$not`, `$expr`) has no counterpart in
//! this spec and is not carried over.

use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::value_utils::{compare_values, equals};

/// One field-level comparison operator (`$eq`, `$gt`, ...).
///
/// `dv` is the document's value at the queried field (`None` if missing,
/// per `get_nested`'s "missing" result); `arg` is the operator's argument
/// from the query. Returns whether the operator holds.
pub trait FieldOperator: Send + Sync {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool;
}

struct EqOperator;
impl FieldOperator for EqOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        dv.map(|v| equals(v, arg)).unwrap_or(false)
    }
}

struct NeOperator;
impl FieldOperator for NeOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        !dv.map(|v| equals(v, arg)).unwrap_or(false)
    }
}

struct GtOperator;
impl FieldOperator for GtOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        dv.and_then(|v| compare_values(v, arg))
            .map(|o| o.is_gt())
            .unwrap_or(false)
    }
}

struct GteOperator;
impl FieldOperator for GteOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        dv.and_then(|v| compare_values(v, arg))
            .map(|o| o.is_ge())
            .unwrap_or(false)
    }
}

struct LtOperator;
impl FieldOperator for LtOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        dv.and_then(|v| compare_values(v, arg))
            .map(|o| o.is_lt())
            .unwrap_or(false)
    }
}

struct LteOperator;
impl FieldOperator for LteOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        dv.and_then(|v| compare_values(v, arg))
            .map(|o| o.is_le())
            .unwrap_or(false)
    }
}

/// `$in`: `arg` is a list and `dv` overlaps it -- a scalar `dv` must equal
/// one of `arg`'s elements; a list-valued `dv` matches if *any* of its own
/// elements equals one of `arg`'s (§8 scenario 6: a shared `tags` array
/// matches `{$in: ["developer"]}` without the query needing to name the
/// whole array back).
struct InOperator;
impl FieldOperator for InOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        let list = match arg.as_array() {
            Some(list) => list,
            None => return false,
        };
        match dv {
            Some(v) => in_overlaps(v, list),
            None => false,
        }
    }
}

struct NinOperator;
impl FieldOperator for NinOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        let list = match arg.as_array() {
            Some(list) => list,
            None => return false,
        };
        match dv {
            Some(v) => !in_overlaps(v, list),
            None => true,
        }
    }
}

/// Shared `$in`/`$nin` overlap test: if `dv` is itself a list, any one of
/// its elements equaling any element of `arg` is enough; otherwise `dv`
/// must equal one of `arg`'s elements outright.
fn in_overlaps(dv: &Value, arg: &[Value]) -> bool {
    match dv.as_array() {
        Some(items) => items.iter().any(|item| arg.iter().any(|a| equals(item, a))),
        None => arg.iter().any(|a| equals(a, dv)),
    }
}

/// `$exists`: present-in-mapping (`dv.is_some()`), the standard reading --
/// decided over a conflated `containsKey || value != null` rule some
/// Mongo-alikes use instead.
struct ExistsOperator;
impl FieldOperator for ExistsOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        let want = arg.as_bool().unwrap_or(false);
        dv.is_some() == want
    }
}

const REGEX_CACHE_SIZE: usize = 100;

lazy_static! {
    static ref REGEX_CACHE: Mutex<LruCache<String, Regex>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap()));
}

fn compiled_regex(pattern: &str) -> Option<Regex> {
    let mut cache = REGEX_CACHE.lock().unwrap();
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(pattern).ok()?;
    cache.put(pattern.to_string(), re.clone());
    Some(re)
}

struct RegexOperator;
impl FieldOperator for RegexOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        let (dv, pattern) = match (dv.and_then(Value::as_str), arg.as_str()) {
            (Some(dv), Some(pattern)) => (dv, pattern),
            _ => return false,
        };
        match compiled_regex(pattern) {
            Some(re) => re.is_match(dv),
            None => false,
        }
    }
}

struct LikeOperator;
impl FieldOperator for LikeOperator {
    fn matches(&self, dv: Option<&Value>, arg: &Value) -> bool {
        match (dv.and_then(Value::as_str), arg.as_str()) {
            (Some(dv), Some(needle)) => dv.contains(needle),
            _ => false,
        }
    }
}

lazy_static! {
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn FieldOperator>> = {
        let mut m: HashMap<&'static str, Box<dyn FieldOperator>> = HashMap::new();
        m.insert("$eq", Box::new(EqOperator));
        m.insert("$ne", Box::new(NeOperator));
        m.insert("$gt", Box::new(GtOperator));
        m.insert("$gte", Box::new(GteOperator));
        m.insert("$lt", Box::new(LtOperator));
        m.insert("$lte", Box::new(LteOperator));
        m.insert("$in", Box::new(InOperator));
        m.insert("$nin", Box::new(NinOperator));
        m.insert("$exists", Box::new(ExistsOperator));
        m.insert("$regex", Box::new(RegexOperator));
        m.insert("$like", Box::new(LikeOperator));
        m
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(name: &str) -> &'static dyn FieldOperator {
        OPERATOR_REGISTRY.get(name).unwrap().as_ref()
    }

    #[test]
    fn eq_and_ne() {
        assert!(op("$eq").matches(Some(&json!(5)), &json!(5)));
        assert!(!op("$eq").matches(Some(&json!(5)), &json!(6)));
        assert!(op("$ne").matches(Some(&json!(5)), &json!(6)));
        // A missing field is never equal to `arg`, so `$ne` holds (§4.3:
        // `$ne` is not among the operators forced false on a missing field).
        assert!(op("$ne").matches(None, &json!(6)));
    }

    #[test]
    fn ordered_comparisons_false_when_incomparable() {
        assert!(op("$gt").matches(Some(&json!(10)), &json!(5)));
        assert!(!op("$gt").matches(Some(&json!("a")), &json!(5)));
        assert!(!op("$lt").matches(None, &json!(5)));
    }

    #[test]
    fn in_matches_scalar_membership() {
        assert!(op("$in").matches(Some(&json!("developer")), &json!(["developer", "flutter"])));
        assert!(!op("$in").matches(Some(&json!("designer")), &json!(["developer", "flutter"])));
    }

    #[test]
    fn in_overlaps_list_valued_field() {
        // §8 scenario 6: a shared tags array overlaps a single-element arg.
        assert!(op("$in").matches(Some(&json!(["developer", "flutter"])), &json!(["developer"])));
        assert!(!op("$in").matches(Some(&json!(["designer"])), &json!(["developer", "flutter"])));
    }

    #[test]
    fn nin_is_inverse_of_in_but_true_on_missing() {
        assert!(op("$nin").matches(None, &json!(["a", "b"])));
        assert!(!op("$nin").matches(Some(&json!("a")), &json!(["a", "b"])));
    }

    #[test]
    fn exists_is_present_in_mapping() {
        assert!(op("$exists").matches(Some(&json!(1)), &json!(true)));
        assert!(op("$exists").matches(Some(&json!(null)), &json!(true)));
        assert!(!op("$exists").matches(None, &json!(true)));
        assert!(op("$exists").matches(None, &json!(false)));
    }

    #[test]
    fn regex_matches_substring_pattern() {
        assert!(op("$regex").matches(Some(&json!("hello world")), &json!("wor.d")));
        assert!(!op("$regex").matches(Some(&json!(42)), &json!("wor.d")));
    }

    #[test]
    fn like_is_plain_substring() {
        assert!(op("$like").matches(Some(&json!("hello world")), &json!("lo wo")));
        assert!(!op("$like").matches(Some(&json!("hello")), &json!("xyz")));
    }
}
