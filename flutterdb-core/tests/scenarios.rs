// flutterdb-core/tests/scenarios.rs
//! The six end-to-end scenarios from the engineering spec, run against a
//! real `tempfile::TempDir`-backed `Store` rather than an in-memory one, so
//! the on-disk WAL/pragma path gets exercised too.

use flutterdb_core::Store;
use serde_json::{json, Value};
use std::collections::HashMap;
use tempfile::TempDir;

fn people_store() -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();
    (dir, store)
}

fn doc(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn seed_people(store: &Store) -> HashMap<String, String> {
    let people = store.collection("people").unwrap();
    let mut ids = HashMap::new();
    for (name, age, city) in [
        ("Alice", 25, "New York"),
        ("Bob", 30, "LA"),
        ("Charlie", 35, "New York"),
        ("Diana", 28, "Chicago"),
    ] {
        let id = people
            .insert(doc(vec![("name", json!(name)), ("age", json!(age)), ("city", json!(city))]))
            .unwrap();
        ids.insert(name.to_string(), id.as_str().to_string());
    }
    ids
}

#[test]
fn scenario_1_query_by_age_threshold() {
    let (_dir, store) = people_store();
    seed_people(&store);
    let people = store.collection("people").unwrap();

    let mut names: Vec<String> = people
        .find(&json!({"age": {"$gt": 26}}))
        .unwrap()
        .into_iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();

    let mut expected = vec!["Bob".to_string(), "Charlie".to_string(), "Diana".to_string()];
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn scenario_2_group_by_city_counts() {
    let (_dir, store) = people_store();
    seed_people(&store);
    let people = store.collection("people").unwrap();

    let groups = people
        .aggregate(&json!([{"$group": {"_id": "$city", "count": {"$sum": 1}}}]))
        .unwrap();

    let mut counts: HashMap<String, i64> = HashMap::new();
    for g in groups {
        let city = g["_id"].as_str().unwrap().to_string();
        let count = g["count"].as_i64().unwrap();
        counts.insert(city, count);
    }
    assert_eq!(counts.get("New York"), Some(&2));
    assert_eq!(counts.get("LA"), Some(&1));
    assert_eq!(counts.get("Chicago"), Some(&1));
}

#[test]
fn scenario_3_sort_limit_project() {
    let (_dir, store) = people_store();
    seed_people(&store);
    let people = store.collection("people").unwrap();

    let projected = people
        .aggregate(&json!([
            {"$sort": {"_id": 1}},
            {"$limit": 10},
            {"$project": {"name": 1, "age": 1, "city": 1, "_id": 0}},
        ]))
        .unwrap();

    assert_eq!(projected.len(), 4);
    for d in &projected {
        let map = d.as_object().unwrap();
        assert_eq!(map.len(), 3);
        assert!(map.contains_key("name"));
        assert!(map.contains_key("age"));
        assert!(map.contains_key("city"));
        assert!(!map.contains_key("_id"));
    }
}

#[test]
fn scenario_4_update_many_new_york_residents() {
    let (_dir, store) = people_store();
    seed_people(&store);
    let people = store.collection("people").unwrap();

    let affected = people
        .update_many(&json!({"city": "New York"}), &json!({"status": "NY Resident"}))
        .unwrap();
    assert_eq!(affected, 2);

    let mut flagged: Vec<String> = people
        .find(&json!({"status": {"$exists": true}}))
        .unwrap()
        .into_iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect();
    flagged.sort();
    assert_eq!(flagged, vec!["Alice".to_string(), "Charlie".to_string()]);
}

#[test]
fn scenario_5_or_combinator_deduplicates_alice() {
    let (_dir, store) = people_store();
    seed_people(&store);
    let people = store.collection("people").unwrap();
    people
        .update_many(&json!({"city": "New York"}), &json!({"status": "NY Resident"}))
        .unwrap();

    let mut names: Vec<String> = people
        .find(&json!({"$or": [
            {"age": {"$lt": 28}},
            {"status": {"$exists": true}},
        ]}))
        .unwrap()
        .into_iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    names.dedup();

    assert_eq!(names, vec!["Alice".to_string(), "Charlie".to_string()]);
}

#[test]
fn scenario_6_shared_tags_array_in_operator() {
    let (_dir, store) = people_store();
    let tags = store.collection("profiles").unwrap();
    tags.insert(doc(vec![("tags", json!(["developer", "flutter"]))])).unwrap();
    tags.insert(doc(vec![("tags", json!(["developer", "flutter"]))])).unwrap();

    let found = tags.find(&json!({"tags": {"$in": ["developer"]}})).unwrap();
    assert_eq!(found.len(), 2);
}
