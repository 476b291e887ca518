// src/aggregation.rs
//! Pipeline (C4, §4.4): `aggregate(stages) -> list<document>`.
//!
//! Kept in an enum-of-structs idiom (`Pipeline { stages: Vec<Stage> }`, one
//! struct per stage with `from_json`/`execute`), extended with four stages
//! (`$count`, `$unwind`, `$lookup`, `$geoNear`) and two accumulators
//! (`$push`, `$addToSet`) beyond the core MongoDB-style set.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::query;
use crate::value_utils::{compare_values_with_none, deref, get_nested_value, set_nested_value};

/// Callback the Pipeline uses to resolve `$lookup`'s foreign collection. The
/// Collection/Store layer supplies this so the Pipeline itself never touches
/// the storage adapter directly: Collections own the adapter, Pipeline only
/// borrows what one stage needs.
pub trait CollectionLookup {
    fn all_documents(&self, collection: &str) -> crate::error::Result<Vec<Value>>;
}

pub struct Pipeline {
    stages: Vec<Stage>,
}

enum Stage {
    Match(Value),
    Sort(Vec<(String, i64)>),
    Limit(usize),
    Skip(usize),
    Project(ProjectStage),
    Group(GroupStage),
    Count(String),
    Unwind(String),
    Lookup(LookupStage),
    GeoNear(GeoNearStage),
    /// An unrecognized stage: a documented no-op (§4.4).
    Unknown,
}

impl Pipeline {
    /// Parse a JSON array of single-keyed stage objects (§4.4).
    pub fn from_json(value: &Value) -> Pipeline {
        let stages = match value.as_array() {
            Some(arr) => arr.iter().map(Stage::from_json).collect(),
            None => Vec::new(),
        };
        Pipeline { stages }
    }

    /// Run the pipeline over `docs` (the full collection scan), in order,
    /// the output of one stage feeding the next.
    pub fn execute(
        &self,
        mut docs: Vec<Value>,
        lookup: &dyn CollectionLookup,
    ) -> crate::error::Result<Vec<Value>> {
        for stage in &self.stages {
            docs = stage.execute(docs, lookup)?;
        }
        Ok(docs)
    }
}

impl Stage {
    fn from_json(value: &Value) -> Stage {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return Stage::Unknown,
        };
        let (key, arg) = match obj.iter().next() {
            Some(kv) => kv,
            None => return Stage::Unknown,
        };

        match key.as_str() {
            "$match" => Stage::Match(arg.clone()),
            "$sort" => Stage::Sort(parse_sort_spec(arg)),
            "$limit" => Stage::Limit(arg.as_u64().unwrap_or(0) as usize),
            "$skip" => Stage::Skip(arg.as_u64().unwrap_or(0) as usize),
            "$project" => Stage::Project(ProjectStage::from_json(arg)),
            "$group" => Stage::Group(GroupStage::from_json(arg)),
            "$count" => match arg.as_str() {
                Some(name) => Stage::Count(name.to_string()),
                None => Stage::Unknown,
            },
            "$unwind" => match arg.as_str() {
                Some(path) => Stage::Unwind(path.trim_start_matches('$').to_string()),
                None => Stage::Unknown,
            },
            "$lookup" => LookupStage::from_json(arg)
                .map(Stage::Lookup)
                .unwrap_or(Stage::Unknown),
            "$geoNear" => GeoNearStage::from_json(arg)
                .map(Stage::GeoNear)
                .unwrap_or(Stage::Unknown),
            _ => Stage::Unknown,
        }
    }

    fn execute(
        &self,
        docs: Vec<Value>,
        lookup: &dyn CollectionLookup,
    ) -> crate::error::Result<Vec<Value>> {
        Ok(match self {
            Stage::Match(predicate) => docs
                .into_iter()
                .filter(|d| query::matches(d, predicate))
                .collect(),
            Stage::Sort(spec) => {
                let mut docs = docs;
                docs.sort_by(|a, b| sort_compare(a, b, spec));
                docs
            }
            Stage::Limit(n) => docs.into_iter().take(*n).collect(),
            Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
            Stage::Project(p) => docs.iter().map(|d| p.project(d)).collect(),
            Stage::Group(g) => g.execute(&docs),
            Stage::Count(name) => vec![Value::Object({
                let mut m = Map::new();
                m.insert(name.clone(), Value::from(docs.len()));
                m
            })],
            Stage::Unwind(path) => docs.iter().flat_map(|d| unwind_one(d, path)).collect(),
            Stage::Lookup(l) => l.execute(docs, lookup)?,
            Stage::GeoNear(g) => g.execute(docs),
            Stage::Unknown => docs,
        })
    }
}

fn parse_sort_spec(value: &Value) -> Vec<(String, i64)> {
    match value.as_object() {
        Some(obj) => obj
            .iter()
            .map(|(k, v)| (k.clone(), v.as_i64().unwrap_or(1)))
            .collect(),
        None => Vec::new(),
    }
}

fn sort_compare(a: &Value, b: &Value, spec: &[(String, i64)]) -> Ordering {
    for (field, dir) in spec {
        let av = get_nested_value(a, field);
        let bv = get_nested_value(b, field);
        let ord = compare_values_with_none(av, bv);
        let ord = if *dir < 0 { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// ---------------------------------------------------------------------
// $project
// ---------------------------------------------------------------------

struct ProjectStage {
    include: Vec<String>,
    exclude: Vec<String>,
    /// Whether any key was marked `1`: determines the default for keys not
    /// mentioned at all (unspecified keys default to excluded when any `1`
    /// is present, else included).
    has_inclusion: bool,
}

impl ProjectStage {
    fn from_json(value: &Value) -> ProjectStage {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        if let Some(obj) = value.as_object() {
            for (k, v) in obj {
                let truthy =
                    v.as_i64().map(|n| n != 0).unwrap_or(false) || v.as_bool().unwrap_or(false);
                if truthy {
                    include.push(k.clone());
                } else {
                    exclude.push(k.clone());
                }
            }
        }
        let has_inclusion = !include.is_empty();
        ProjectStage {
            include,
            exclude,
            has_inclusion,
        }
    }

    /// Only top-level values are projected; dotted paths are not traversed
    /// (the projected value is carried whole from the input).
    fn project(&self, doc: &Value) -> Value {
        let obj = match doc.as_object() {
            Some(obj) => obj,
            None => return doc.clone(),
        };

        let mut out = Map::new();
        if self.has_inclusion {
            for key in &self.include {
                if let Some(v) = obj.get(key) {
                    out.insert(key.clone(), v.clone());
                }
            }
        } else {
            for (k, v) in obj {
                if !self.exclude.iter().any(|e| e == k) {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
        Value::Object(out)
    }
}

// ---------------------------------------------------------------------
// $group
// ---------------------------------------------------------------------

struct GroupStage {
    id_expr: Value,
    accumulators: Vec<(String, String, Value)>, // (output field, op, arg expr)
}

impl GroupStage {
    fn from_json(value: &Value) -> GroupStage {
        let obj = value.as_object().cloned().unwrap_or_default();
        let id_expr = obj.get("_id").cloned().unwrap_or(Value::Null);
        let mut accumulators = Vec::new();
        for (field, spec) in &obj {
            if field == "_id" {
                continue;
            }
            if let Some(spec_obj) = spec.as_object() {
                if let Some((op, arg)) = spec_obj.iter().next() {
                    accumulators.push((field.clone(), op.clone(), arg.clone()));
                }
            }
        }
        GroupStage {
            id_expr,
            accumulators,
        }
    }

    fn execute(&self, docs: &[Value]) -> Vec<Value> {
        // Preserve first-seen partition order for deterministic output,
        // while keying lookups by the key's serialized form so finding a
        // document's partition is O(1) instead of an O(n) linear scan.
        let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut partitions: Vec<(Value, Vec<&Value>)> = Vec::new();

        for doc in docs {
            let key = deref(&self.id_expr, doc).cloned().unwrap_or(Value::Null);
            let serialized = serde_json::to_string(&key).unwrap_or_default();
            match index.get(&serialized) {
                Some(&idx) => partitions[idx].1.push(doc),
                None => {
                    index.insert(serialized, partitions.len());
                    partitions.push((key, vec![doc]));
                }
            }
        }

        partitions
            .into_iter()
            .map(|(key, members)| {
                let mut out = Map::new();
                out.insert("_id".to_string(), key);
                for (field, op, arg) in &self.accumulators {
                    out.insert(field.clone(), compute_accumulator(op, arg, &members));
                }
                Value::Object(out)
            })
            .collect()
    }
}

fn compute_accumulator(op: &str, arg: &Value, members: &[&Value]) -> Value {
    match op {
        // Integer when every summed term is integral (§8 scenario 2 expects
        // plain group counts like "New York=2", not "2.0"); falls back to a
        // float result the moment any term isn't.
        "$sum" => {
            let total = sum(arg, members);
            if sum_is_integral(arg, members) {
                Value::from(total as i64)
            } else {
                Value::from(total)
            }
        }
        // True mean, not a sum alias.
        "$avg" => {
            if members.is_empty() {
                Value::from(0.0)
            } else {
                Value::from(sum(arg, members) / members.len() as f64)
            }
        }
        "$max" => members
            .iter()
            .filter_map(|d| deref(arg, d).and_then(Value::as_f64))
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v))))
            .map(Value::from)
            .unwrap_or(Value::Null),
        "$min" => members
            .iter()
            .filter_map(|d| deref(arg, d).and_then(Value::as_f64))
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))))
            .map(Value::from)
            .unwrap_or(Value::Null),
        "$first" => members
            .first()
            .and_then(|d| deref(arg, d).cloned())
            .unwrap_or(Value::Null),
        "$last" => members
            .last()
            .and_then(|d| deref(arg, d).cloned())
            .unwrap_or(Value::Null),
        "$push" => Value::Array(
            members
                .iter()
                .filter_map(|d| deref(arg, d).cloned())
                .collect(),
        ),
        "$addToSet" => {
            let mut seen: Vec<Value> = Vec::new();
            for d in members {
                if let Some(v) = deref(arg, d) {
                    if !seen.contains(v) {
                        seen.push(v.clone());
                    }
                }
            }
            Value::Array(seen)
        }
        _ => Value::Null,
    }
}

fn sum(arg: &Value, members: &[&Value]) -> f64 {
    members
        .iter()
        .filter_map(|d| deref(arg, d).and_then(Value::as_f64))
        .sum()
}

/// Whether every numeric term `sum` would add is itself an integer --
/// non-numeric terms are ignored by `sum` too, so they don't break this.
fn sum_is_integral(arg: &Value, members: &[&Value]) -> bool {
    members.iter().filter_map(|d| deref(arg, d)).all(|v| match v {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => true,
    })
}

// ---------------------------------------------------------------------
// $unwind
// ---------------------------------------------------------------------

/// Non-list values pass through unchanged, matching the normative text over
/// the "drop the document" reading some Mongo-alikes use.
fn unwind_one(doc: &Value, path: &str) -> Vec<Value> {
    let field_value = get_nested_value(doc, path);
    match field_value.and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items
            .iter()
            .map(|item| {
                let mut out = doc.clone();
                set_nested_value(&mut out, path, item.clone());
                out
            })
            .collect(),
        _ => vec![doc.clone()],
    }
}

// ---------------------------------------------------------------------
// $lookup
// ---------------------------------------------------------------------

struct LookupStage {
    from: String,
    local_field: String,
    foreign_field: String,
    as_field: String,
}

impl LookupStage {
    fn from_json(value: &Value) -> Option<LookupStage> {
        let obj = value.as_object()?;
        Some(LookupStage {
            from: obj.get("from")?.as_str()?.to_string(),
            local_field: obj.get("localField")?.as_str()?.to_string(),
            foreign_field: obj.get("foreignField")?.as_str()?.to_string(),
            as_field: obj.get("as")?.as_str()?.to_string(),
        })
    }

    fn execute(
        &self,
        docs: Vec<Value>,
        lookup: &dyn CollectionLookup,
    ) -> crate::error::Result<Vec<Value>> {
        let foreign = lookup.all_documents(&self.from)?;
        Ok(docs
            .into_iter()
            .map(|mut doc| {
                let local = get_nested_value(&doc, &self.local_field).cloned();
                let matches: Vec<Value> = match &local {
                    Some(local_value) => foreign
                        .iter()
                        .filter(|f| {
                            get_nested_value(f, &self.foreign_field)
                                .map(|fv| fv == local_value)
                                .unwrap_or(false)
                        })
                        .cloned()
                        .collect(),
                    None => Vec::new(),
                };
                if let Some(obj) = doc.as_object_mut() {
                    obj.insert(self.as_field.clone(), Value::Array(matches));
                }
                doc
            })
            .collect())
    }
}

// ---------------------------------------------------------------------
// $geoNear
// ---------------------------------------------------------------------

struct GeoNearStage {
    near: (f64, f64),
    distance_field: String,
    max_distance: Option<f64>,
}

impl GeoNearStage {
    fn from_json(value: &Value) -> Option<GeoNearStage> {
        let obj = value.as_object()?;
        let near = obj.get("near")?.as_array()?;
        let x = near.first()?.as_f64()?;
        let y = near.get(1)?.as_f64()?;
        let distance_field = obj.get("distanceField")?.as_str()?.to_string();
        let max_distance = obj.get("maxDistance").and_then(Value::as_f64);
        Some(GeoNearStage {
            near: (x, y),
            distance_field,
            max_distance,
        })
    }

    fn execute(&self, docs: Vec<Value>) -> Vec<Value> {
        docs.into_iter()
            .filter_map(|mut doc| {
                let point = get_nested_value(&doc, &self.distance_field)?
                    .as_array()?
                    .clone();
                if point.len() != 2 {
                    return None;
                }
                let x = point[0].as_f64()?;
                let y = point[1].as_f64()?;
                let dx = x - self.near.0;
                let dy = y - self.near.1;
                let distance = (dx * dx + dy * dy).sqrt();
                if let Some(max) = self.max_distance {
                    if distance > max {
                        return None;
                    }
                }
                set_nested_value(&mut doc, &self.distance_field, Value::from(distance));
                Some(doc)
            })
            .collect()
    }
}
