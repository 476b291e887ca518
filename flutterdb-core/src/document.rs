// src/document.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::id::new_id;

/// A schemaless document: a JSON mapping that always carries `_id`.
///
/// This crate has exactly one identifier shape end to end (§3), rather than
/// a tagged union of several possible primary-key representations, so
/// `DocumentId` is a single newtype around the 24-hex string produced by
/// [`crate::id`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Generate a new identifier per §3/§4.1.
    pub fn generate() -> Self {
        DocumentId(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

/// In-memory representation of a document used for inserts and updates.
///
/// Reads go straight through `serde_json::Value` (decoded from the
/// `documents.data` column) to the Matcher/Pipeline, which operate on plain
/// `Value` trees per §4.2-§4.4; `Document` exists only at the write-path
/// seam where `_id` assignment and the shallow-merge update rule (§3
/// Lifecycle, §4.5 `updateById`) need a typed home.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub fields: HashMap<String, Value>,
}

impl Document {
    pub fn new(id: DocumentId, fields: HashMap<String, Value>) -> Self {
        Document { id, fields }
    }

    /// Build a document from caller-supplied fields, assigning `_id` if the
    /// caller didn't supply one (§4.5 `insert`).
    pub fn from_input(mut fields: HashMap<String, Value>) -> Self {
        let id = match fields.remove("_id") {
            Some(Value::String(s)) => DocumentId(s),
            _ => DocumentId::generate(),
        };
        Document { id, fields }
    }

    /// Decode a stored JSON payload (the `data` column) back into a document.
    /// Per I2, the payload's `_id` is expected to equal the row id passed in.
    pub fn from_value(id: DocumentId, value: Value) -> crate::error::Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            _ => return Err(crate::error::Error::CorruptDocument(id.0)),
        };
        map.remove("_id");
        let fields = map.into_iter().collect();
        Ok(Document { id, fields })
    }

    /// Render as the JSON payload stored in `documents.data`: `_id` plus the
    /// flat field map (§6 Document wire format — `_id` appears both as the
    /// primary-key column and as a field of the payload, and both must
    /// agree).
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert("_id".to_string(), Value::String(self.id.0.clone()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }

    /// Shallow top-level merge of `patch` into this document, per §3
    /// Lifecycle and §4.5 `updateById`/`updateMany`: top-level keys in
    /// `patch` overwrite; `_id` is always restored to the original,
    /// regardless of what `patch` contains.
    pub fn merge_patch(&mut self, patch: &Map<String, Value>) {
        for (k, v) in patch {
            if k == "_id" {
                continue;
            }
            self.fields.insert(k.clone(), v.clone());
        }
    }
}
