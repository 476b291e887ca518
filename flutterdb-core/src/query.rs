// src/query.rs
//! Matcher (C3, §4.3): `matches(doc, query) -> bool`.
//!
//! Kept as a thin module over the `operators` registry: the field-operator
//! dispatch lives in `operators::OPERATOR_REGISTRY`, this module owns only
//! the top-level query-shape logic -- the implicit AND over query entries,
//! the `$and/$or/$nor` logical combinators, and the
//! absorb-structural-errors-into-`false` boundary (§7).

pub mod operators;

use serde_json::Value;

use self::operators::OPERATOR_REGISTRY;
use crate::value_utils::{equals, get_nested_value};

/// Evaluate `query` against `doc`. The query mapping is an implicit AND
/// over its entries; all must hold (§4.3).
pub fn matches(doc: &Value, query: &Value) -> bool {
    let query = match query.as_object() {
        Some(map) => map,
        // A non-object query has no entries to satisfy -- vacuously true,
        // mirroring `find({})` matching everything.
        None => return true,
    };

    for (key, value) in query {
        if key.starts_with('$') {
            if !matches_top_level_operator(doc, key, value) {
                return false;
            }
            continue;
        }

        let dv = get_nested_value(doc, key);

        if let Some(op_map) = value.as_object() {
            if !matches_field_operators(dv, op_map) {
                return false;
            }
        } else if !dv.map(|v| equals(v, value)).unwrap_or(false) {
            return false;
        }
    }

    true
}

fn matches_top_level_operator(doc: &Value, key: &str, arg: &Value) -> bool {
    let subqueries = match arg.as_array() {
        Some(list) => list,
        // Wrong arg type for a logical combinator is a structural error;
        // absorbed into non-match, never an exception (§7).
        None => return false,
    };

    match key {
        "$and" => subqueries.iter().all(|q| matches(doc, q)),
        "$or" => subqueries.iter().any(|q| matches(doc, q)),
        "$nor" => !subqueries.iter().any(|q| matches(doc, q)),
        // Any other top-level `$`-key is a query structural error: the
        // document fails to match (§4.3 step 1, decided in SPEC_FULL.md §9).
        _ => false,
    }
}

fn matches_field_operators(dv: Option<&Value>, op_map: &serde_json::Map<String, Value>) -> bool {
    for (op, arg) in op_map {
        let matched = match OPERATOR_REGISTRY.get(op.as_str()) {
            Some(operator) => operator.matches(dv, arg),
            // Unrecognized operator: document fails the match (§4.3 step 2).
            None => false,
        };
        if !matched {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_query_matches_everything() {
        assert!(matches(&json!({"name": "Alice"}), &json!({})));
    }

    #[test]
    fn implicit_and_across_top_level_fields() {
        let doc = json!({"age": 30, "city": "LA"});
        assert!(matches(&doc, &json!({"age": 30, "city": "LA"})));
        assert!(!matches(&doc, &json!({"age": 30, "city": "NYC"})));
    }

    #[test]
    fn scalar_equality_on_missing_field_is_false() {
        assert!(!matches(&json!({"age": 30}), &json!({"city": "LA"})));
    }

    #[test]
    fn field_operator_mapping() {
        let doc = json!({"age": 30});
        assert!(matches(&doc, &json!({"age": {"$gt": 18, "$lt": 40}})));
        assert!(!matches(&doc, &json!({"age": {"$gt": 18, "$lt": 20}})));
    }

    #[test]
    fn logical_combinators() {
        let doc = json!({"age": 25, "status": "ok"});
        assert!(matches(&doc, &json!({"$or": [{"age": {"$lt": 10}}, {"status": "ok"}]})));
        assert!(matches(&doc, &json!({"$and": [{"age": 25}, {"status": "ok"}]})));
        assert!(matches(&doc, &json!({"$nor": [{"age": 99}]})));
        assert!(!matches(&doc, &json!({"$nor": [{"age": 25}]})));
    }

    #[test]
    fn unknown_top_level_operator_fails_the_document() {
        assert!(!matches(&json!({"age": 30}), &json!({"$unknown": [{"age": 30}]})));
    }

    #[test]
    fn nested_field_access_via_dot_path() {
        let doc = json!({"address": {"city": "Budapest"}});
        assert!(matches(&doc, &json!({"address.city": "Budapest"})));
    }

    #[test]
    fn shared_tags_array_in_matches_both_documents() {
        // §8 scenario 6: `$in` against a list-valued field is "any overlap"
        // -- the query's arg need not name the whole array back.
        let doc = json!({"tags": ["developer", "flutter"]});
        assert!(matches(&doc, &json!({"tags": {"$in": ["developer"]}})));
        assert!(!matches(&doc, &json!({"tags": {"$in": ["designer"]}})));
    }
}
