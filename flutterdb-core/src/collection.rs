// src/collection.rs
//! Collection (C5, §4.5): the CRUD surface every `Store::collection(name)`
//! call hands back. A thin layer over [`crate::storage::SqliteStorage`] --
//! no secondary indexes, query planner/cache, or transaction log of its
//! own -- since the relational engine underneath already owns indexing and
//! transactional durability (§4.7/§6).

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::aggregation::{CollectionLookup, Pipeline};
use crate::document::{Document, DocumentId};
use crate::error::{Error, Result};
use crate::query;
use crate::storage::SqliteStorage;
use crate::{log_debug, log_trace};

/// One named collection of schemaless documents (§3).
pub struct Collection {
    name: String,
    storage: Arc<SqliteStorage>,
}

impl Collection {
    pub(crate) fn new(name: String, storage: Arc<SqliteStorage>) -> Self {
        Collection { name, storage }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Decode a stored row into its document payload, re-asserting `_id`
    /// agreement (I2) from the row's primary key rather than trusting
    /// whatever the `data` column happens to carry.
    fn decode_row(row: crate::storage::DocumentRow) -> Result<Value> {
        let mut value: Value = serde_json::from_str(&row.data)?;
        if let Value::Object(ref mut map) = value {
            map.insert("_id".to_string(), Value::String(row.id));
        } else {
            return Err(Error::CorruptDocument(row.id));
        }
        Ok(value)
    }

    /// `insert(fields) -> _id` (§4.5).
    pub fn insert(&self, fields: std::collections::HashMap<String, Value>) -> Result<DocumentId> {
        let doc = Document::from_input(fields);
        let now = Self::now_ms();
        let data = serde_json::to_string(&doc.to_value())?;
        self.storage
            .insert_document(&self.name, doc.id.as_str(), &data, now, now)?;
        log_debug!("inserted document {} into {}", doc.id, self.name);
        Ok(doc.id)
    }

    /// `insertMany(docs) -> [_id]`, a single transaction (§4.5).
    pub fn insert_many(
        &self,
        docs: Vec<std::collections::HashMap<String, Value>>,
    ) -> Result<Vec<DocumentId>> {
        let now = Self::now_ms();
        let mut ids = Vec::with_capacity(docs.len());
        let mut rows = Vec::with_capacity(docs.len());
        for fields in docs {
            let doc = Document::from_input(fields);
            let data = serde_json::to_string(&doc.to_value())?;
            rows.push((doc.id.as_str().to_string(), data, now, now));
            ids.push(doc.id);
        }
        self.storage.insert_documents(&self.name, &rows)?;
        log_debug!("inserted {} documents into {}", ids.len(), self.name);
        Ok(ids)
    }

    /// `findById(id)` (§4.5).
    pub fn find_by_id(&self, id: &str) -> Result<Option<Value>> {
        match self.storage.get_document(&self.name, id)? {
            Some(row) => Ok(Some(Self::decode_row(row)?)),
            None => Ok(None),
        }
    }

    /// `find(query)` (§4.5): full scan, filtered by the Matcher.
    pub fn find(&self, query: &Value) -> Result<Vec<Value>> {
        let rows = self.storage.all_documents(&self.name)?;
        let mut out = Vec::new();
        for row in rows {
            let value = Self::decode_row(row)?;
            if query::matches(&value, query) {
                out.push(value);
            }
        }
        log_trace!("find on {} returned {} documents", self.name, out.len());
        Ok(out)
    }

    /// `count(query)` (§4.5): a raw `COUNT(*)` when the query is absent or
    /// empty, otherwise a full scan through the Matcher.
    pub fn count(&self, query: Option<&Value>) -> Result<u64> {
        match query {
            None => Ok(self.storage.count_all(&self.name)? as u64),
            Some(q) if q.as_object().map(|m| m.is_empty()).unwrap_or(false) => {
                Ok(self.storage.count_all(&self.name)? as u64)
            }
            Some(q) => Ok(self.find(q)?.len() as u64),
        }
    }

    /// `updateById(id, patch) -> bool` (§4.5): shallow merge, `_id`
    /// preserved (§3 Lifecycle).
    pub fn update_by_id(&self, id: &str, patch: &Value) -> Result<bool> {
        let row = match self.storage.get_document(&self.name, id)? {
            Some(row) => row,
            None => return Ok(false),
        };
        let existing: Value = serde_json::from_str(&row.data)?;
        let mut doc = Document::from_value(DocumentId::from(id), existing)?;
        if let Some(patch_map) = patch.as_object() {
            doc.merge_patch(patch_map);
        }
        let data = serde_json::to_string(&doc.to_value())?;
        let now = Self::now_ms();
        self.storage.update_document(&self.name, id, &data, now)
    }

    /// `updateMany(query, patch) -> count` (§4.5): every matched document is
    /// rewritten inside a single batched transaction.
    pub fn update_many(&self, query: &Value, patch: &Value) -> Result<u64> {
        let patch_map = match patch.as_object() {
            Some(map) => map,
            None => return Ok(0),
        };
        let rows = self.storage.all_documents(&self.name)?;
        let now = Self::now_ms();
        let mut batch = self.storage.batch();
        for row in rows {
            let id = row.id.clone();
            let existing: Value = serde_json::from_str(&row.data)?;
            if !query::matches(&existing, query) {
                continue;
            }
            let mut doc = Document::from_value(DocumentId::from(id.as_str()), existing)?;
            doc.merge_patch(patch_map);
            let data = serde_json::to_string(&doc.to_value())?;
            batch.update(&self.name, &id, &data, now);
        }
        let affected = batch.commit()?;
        log_debug!("updateMany on {} affected {} documents", self.name, affected);
        Ok(affected as u64)
    }

    /// `deleteById(id) -> bool` (§4.5).
    pub fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.storage.delete_document(&self.name, id)
    }

    /// `deleteMany(query) -> count` (§4.5): every matched document deleted
    /// inside a single batched transaction.
    pub fn delete_many(&self, query: &Value) -> Result<u64> {
        let rows = self.storage.all_documents(&self.name)?;
        let mut batch = self.storage.batch();
        for row in rows {
            let value: Value = serde_json::from_str(&row.data)?;
            if query::matches(&value, query) {
                batch.delete(&self.name, &row.id);
            }
        }
        let affected = batch.commit()?;
        log_debug!("deleteMany on {} removed {} documents", self.name, affected);
        Ok(affected as u64)
    }

    /// `aggregate(stages) -> [document]` (§4.4): runs the Pipeline over a
    /// full scan of this collection, resolving `$lookup` against sibling
    /// collections via the same storage adapter.
    pub fn aggregate(&self, stages: &Value) -> Result<Vec<Value>> {
        let docs = self
            .storage
            .all_documents(&self.name)?
            .into_iter()
            .map(Self::decode_row)
            .collect::<Result<Vec<_>>>()?;
        let pipeline = Pipeline::from_json(stages);
        pipeline.execute(docs, self)
    }
}

impl CollectionLookup for Collection {
    fn all_documents(&self, collection: &str) -> Result<Vec<Value>> {
        self.storage
            .all_documents(collection)?
            .into_iter()
            .map(Self::decode_row)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Options;
    use serde_json::json;
    use std::collections::HashMap;

    fn collection() -> Collection {
        let storage = Arc::new(SqliteStorage::open_in_memory(&Options::default()).unwrap());
        storage.ensure_collection("people").unwrap();
        Collection::new("people".to_string(), storage)
    }

    fn fields(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn insert_then_find_by_id_round_trips() {
        let c = collection();
        let id = c.insert(fields(&[("name", json!("Alice")), ("age", json!(30))])).unwrap();
        let found = c.find_by_id(id.as_str()).unwrap().unwrap();
        assert_eq!(found["name"], json!("Alice"));
        assert_eq!(found["_id"], json!(id.as_str()));
    }

    #[test]
    fn find_filters_by_query() {
        let c = collection();
        c.insert(fields(&[("age", json!(20))])).unwrap();
        c.insert(fields(&[("age", json!(40))])).unwrap();
        let results = c.find(&json!({"age": {"$gt": 30}})).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["age"], json!(40));
    }

    #[test]
    fn count_without_query_uses_fast_path() {
        let c = collection();
        c.insert(fields(&[("age", json!(20))])).unwrap();
        c.insert(fields(&[("age", json!(40))])).unwrap();
        assert_eq!(c.count(None).unwrap(), 2);
        assert_eq!(c.count(Some(&json!({}))).unwrap(), 2);
    }

    #[test]
    fn update_by_id_merges_and_keeps_id() {
        let c = collection();
        let id = c.insert(fields(&[("status", json!("old")), ("age", json!(1))])).unwrap();
        assert!(c
            .update_by_id(id.as_str(), &json!({"status": "new", "_id": "hacked"}))
            .unwrap());
        let found = c.find_by_id(id.as_str()).unwrap().unwrap();
        assert_eq!(found["status"], json!("new"));
        assert_eq!(found["age"], json!(1));
        assert_eq!(found["_id"], json!(id.as_str()));
    }

    #[test]
    fn update_many_touches_only_matched_documents() {
        let c = collection();
        c.insert(fields(&[("city", json!("LA")), ("age", json!(1))])).unwrap();
        c.insert(fields(&[("city", json!("NYC")), ("age", json!(1))])).unwrap();
        let affected = c
            .update_many(&json!({"city": "LA"}), &json!({"age": 2}))
            .unwrap();
        assert_eq!(affected, 1);
        let ages: Vec<_> = c
            .find(&json!({}))
            .unwrap()
            .into_iter()
            .map(|d| d["age"].clone())
            .collect();
        assert!(ages.contains(&json!(2)));
        assert!(ages.contains(&json!(1)));
    }

    #[test]
    fn delete_many_removes_matched_documents() {
        let c = collection();
        c.insert(fields(&[("status", json!("stale"))])).unwrap();
        c.insert(fields(&[("status", json!("active"))])).unwrap();
        let affected = c.delete_many(&json!({"status": "stale"})).unwrap();
        assert_eq!(affected, 1);
        assert_eq!(c.count(None).unwrap(), 1);
    }

    #[test]
    fn aggregate_runs_match_and_count_stages() {
        let c = collection();
        c.insert(fields(&[("city", json!("LA"))])).unwrap();
        c.insert(fields(&[("city", json!("LA"))])).unwrap();
        c.insert(fields(&[("city", json!("NYC"))])).unwrap();
        let result = c
            .aggregate(&json!([{"$match": {"city": "LA"}}, {"$count": "total"}]))
            .unwrap();
        assert_eq!(result, vec![json!({"total": 2})]);
    }
}
