//! Query expressions

use std::fmt;
use tessera_core::{resolve_path, Body, DocId, Value};

use super::plan::QueryPlan;

/// A field a predicate can compare
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    /// The document id
    Id,
    /// A property, addressed by dotted path (`address.city`, `phones.0`)
    Path(String),
}

impl FieldRef {
    /// The document id
    pub fn id() -> Self {
        FieldRef::Id
    }

    /// A property path
    pub fn path(path: impl Into<String>) -> Self {
        FieldRef::Path(path.into())
    }

    fn equals(&self, id: &DocId, body: &Body, value: &Value) -> bool {
        match self {
            FieldRef::Id => value.as_str() == Some(id.as_str()),
            FieldRef::Path(path) => resolve_path(body, path) == Some(value),
        }
    }
}

impl From<&str> for FieldRef {
    fn from(path: &str) -> Self {
        FieldRef::Path(path.to_string())
    }
}

impl From<String> for FieldRef {
    fn from(path: String) -> Self {
        FieldRef::Path(path)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Id => f.write_str("_id"),
            FieldRef::Path(p) => f.write_str(p),
        }
    }
}

/// Row filter
///
/// Equality follows [`Value`] equality: `Int(1)` does not equal
/// `Float(1.0)`, and a missing property equals nothing, not even `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every row
    All,
    /// Field equals a literal
    Eq(FieldRef, Value),
    /// Every inner predicate holds
    And(Vec<Predicate>),
}

impl Predicate {
    /// `field = value`
    pub fn eq(field: impl Into<FieldRef>, value: impl Into<Value>) -> Self {
        Predicate::Eq(field.into(), value.into())
    }

    /// `_id = id`
    pub fn id_eq(id: impl Into<String>) -> Self {
        Predicate::Eq(FieldRef::Id, Value::String(id.into()))
    }

    /// Conjunction of `self` and `other`, flattened
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (a, b) => Predicate::And(vec![a, b]),
        }
    }

    /// Whether the document `id` with `body` satisfies the predicate
    pub fn matches(&self, id: &DocId, body: &Body) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq(field, value) => field.equals(id, body, value),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(id, body)),
        }
    }

    /// Id pinned by an `_id = '...'` term, if any
    pub(crate) fn primary_key(&self) -> Option<&str> {
        match self {
            Predicate::Eq(FieldRef::Id, value) => value.as_str(),
            Predicate::And(parts) => parts.iter().find_map(Predicate::primary_key),
            _ => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::All => f.write_str("TRUE"),
            Predicate::Eq(field, value) => write!(f, "{} = {}", field, Literal(value)),
            Predicate::And(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
        }
    }
}

struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Timestamp(ts) => write!(f, "TIMESTAMP '{}'", ts),
            other => write!(f, "{}", serde_json::Value::from(other.clone())),
        }
    }
}

/// A projected column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectItem {
    /// The document id, as column `_id`
    Id,
    /// The revision, as column `_rev`
    Revision,
    /// One property by dotted path; missing properties project as `Null`
    Field(String),
    /// Every top-level property, in key order
    All,
}

impl SelectItem {
    /// Column for a property path
    pub fn field(path: impl Into<String>) -> Self {
        SelectItem::Field(path.into())
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Id => f.write_str("_id"),
            SelectItem::Revision => f.write_str("_rev"),
            SelectItem::Field(p) => f.write_str(p),
            SelectItem::All => f.write_str("*"),
        }
    }
}

/// A query over live documents
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    select: Vec<SelectItem>,
    predicate: Predicate,
    limit: Option<usize>,
}

impl Query {
    /// Query projecting `items` from every live document
    pub fn select(items: impl IntoIterator<Item = SelectItem>) -> Self {
        Query {
            select: items.into_iter().collect(),
            predicate: Predicate::All,
            limit: None,
        }
    }

    /// `SELECT *` over every live document
    pub fn all() -> Self {
        Query::select([SelectItem::All])
    }

    /// Add a filter, combined with any existing one by AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = std::mem::replace(&mut self.predicate, Predicate::All).and(predicate);
        self
    }

    /// Stop after `n` rows
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Projected columns
    pub fn select_items(&self) -> &[SelectItem] {
        &self.select
    }

    /// Row filter
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Row limit, if set
    pub fn max_rows(&self) -> Option<usize> {
        self.limit
    }

    /// Human-readable execution plan
    pub fn explain(&self) -> String {
        QueryPlan::build(self).explain()
    }
}
