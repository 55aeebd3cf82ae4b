//! Documents and document identifiers
//!
//! A [`Document`] is a client-side value: an optional id, the revision it
//! was read at (if any), and a body of named properties. The body lives
//! behind an `Arc`, so cloning a document or handing one to every change
//! listener is cheap; mutating a shared body copies it first.

use crate::contract::Revision;
use crate::value::{walk, Value};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Property map of a document
pub type Body = HashMap<String, Value>;

/// Property of `body` reached by a dotted path such as `address.city`
///
/// Array elements are addressed by position: `phones.0`.
pub fn resolve_path<'a>(body: &'a Body, path: &'a str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    walk(body.get(first)?, segments)
}

/// Stable document identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        DocId(id.into())
    }

    /// Generate a fresh random identifier (UUID v4)
    pub fn generate() -> Self {
        DocId(Uuid::new_v4().to_string())
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifiers must be non-empty
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        DocId(s)
    }
}

impl From<&DocId> for DocId {
    fn from(id: &DocId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for DocId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A document: identity, revision and body
///
/// Documents returned by the database carry the revision and commit sequence
/// they were read at. Documents built by the caller start with neither; an
/// id is assigned on first save when none is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    id: Option<DocId>,
    revision: Option<Revision>,
    sequence: u64,
    deleted: bool,
    body: Arc<Body>,
}

impl Document {
    /// Empty document without an id
    pub fn new() -> Self {
        Document::default()
    }

    /// Empty document with the given id
    pub fn with_id(id: impl Into<DocId>) -> Self {
        Document {
            id: Some(id.into()),
            ..Document::default()
        }
    }

    /// Document built from a JSON object
    ///
    /// Returns `None` if `json` is not an object.
    pub fn from_json(id: Option<DocId>, json: serde_json::Value) -> Option<Self> {
        match Value::from(json) {
            Value::Object(body) => Some(Document {
                id,
                body: Arc::new(body),
                ..Document::default()
            }),
            _ => None,
        }
    }

    /// Rebuild a stored document state
    pub fn from_parts(
        id: DocId,
        revision: Revision,
        sequence: u64,
        deleted: bool,
        body: Arc<Body>,
    ) -> Self {
        Document {
            id: Some(id),
            revision: Some(revision),
            sequence,
            deleted,
            body,
        }
    }

    /// Document id, if assigned
    pub fn id(&self) -> Option<&DocId> {
        self.id.as_ref()
    }

    /// Revision this state was read at, if it came from the database
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    /// Commit sequence of this state (0 for caller-built documents)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether this is a tombstone
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Shared body
    pub fn body(&self) -> &Arc<Body> {
        &self.body
    }

    /// Number of top-level properties
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// True if the body has no properties
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Top-level property
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Property reached by a dotted path such as `address.city`
    pub fn get_path<'a>(&'a self, path: &'a str) -> Option<&'a Value> {
        resolve_path(&self.body, path)
    }

    /// Top-level string property
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Set a top-level property, copying the body if it is shared
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        Arc::make_mut(&mut self.body).insert(key.into(), value.into());
        self
    }

    /// Builder form of [`Document::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove a top-level property
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        Arc::make_mut(&mut self.body).remove(key)
    }

    /// Mutable access to the body, copying it if shared
    pub fn body_mut(&mut self) -> &mut Body {
        Arc::make_mut(&mut self.body)
    }

    /// Body as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(Value::Object((*self.body).clone()))
    }
}
