// SPDX-License-Identifier: Apache-2.0

//! Field-level CRDT deltas.
//!
//! Sync workers never write a whole record back to the document store. They
//! load the last known document state, capture its heads, apply their own
//! field sets and deletes in one transaction, and ship only the changes made
//! after those heads. Merging that delta into the store combines with any
//! concurrent local edit instead of overwriting it.

use automerge::transaction::Transactable;
use automerge::{Automerge, ObjId, ObjType, ReadDoc, ScalarValue, Value as AmValue, ROOT};
use serde_json::{Map, Value};

use crate::Result;
use crate::error::SyncError;

/// A set of top-level field assignments and deletions on one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    set: Map<String, Value>,
    delete: Vec<String>,
}

impl FieldChanges {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns `value` to `field`, replacing any pending delete of it.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.delete.retain(|f| f != field);
        self.set.insert(field.to_string(), value.into());
        self
    }

    /// Removes `field`, replacing any pending assignment of it.
    #[must_use]
    pub fn delete(mut self, field: &str) -> Self {
        self.set.remove(field);
        if !self.delete.iter().any(|f| f == field) {
            self.delete.push(field.to_string());
        }
        self
    }

    /// Inverse of [`FieldChanges::projection`]: `null` entries become deletes.
    #[must_use]
    pub fn from_projection(projection: &Map<String, Value>) -> Self {
        projection
            .iter()
            .fold(Self::new(), |changes, (field, value)| match value {
                Value::Null => changes.delete(field),
                v => changes.set(field, v.clone()),
            })
    }

    /// Fields being assigned.
    #[must_use]
    pub fn sets(&self) -> &Map<String, Value> {
        &self.set
    }

    /// Fields being removed.
    #[must_use]
    pub fn deletes(&self) -> &[String] {
        &self.delete
    }

    /// Returns `true` if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }

    /// Materialized projection of these changes: assignments as-is, deletes as `null`.
    #[must_use]
    pub fn projection(&self) -> Map<String, Value> {
        let mut projection = self.set.clone();
        for field in &self.delete {
            projection.insert(field.clone(), Value::Null);
        }
        projection
    }
}

/// Builds an incremental update expressing exactly `changes` on top of `base`.
///
/// `base` is the opaque document state last read from the store; `None`
/// starts from an empty document. Deleting a field the base does not have is
/// a no-op.
pub fn build_delta(base: Option<&[u8]>, changes: &FieldChanges) -> Result<Vec<u8>> {
    let mut doc = match base {
        Some(bytes) if !bytes.is_empty() => Automerge::load(bytes)?,
        _ => Automerge::new(),
    };
    let heads = doc.get_heads();

    apply_changes(&mut doc, changes)?;

    Ok(doc.save_after(&heads))
}

/// Applies `changes` to the root map of `doc` in a single transaction.
pub fn apply_changes(doc: &mut Automerge, changes: &FieldChanges) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }

    let mut tx = doc.transaction();
    for (field, value) in changes.sets() {
        put_json(&mut tx, &ROOT, field, value)?;
    }
    for field in changes.deletes() {
        if tx.get(ROOT, field.as_str())?.is_some() {
            tx.delete(ROOT, field.as_str())?;
        }
    }
    let _hash = tx.commit();
    Ok(())
}

/// Writes a JSON value under `key` in the map object `obj`.
fn put_json<T: Transactable>(tx: &mut T, obj: &ObjId, key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => {
            let child = tx.put_object(obj, key, ObjType::Map)?;
            for (k, v) in map {
                put_json(tx, &child, k, v)?;
            }
        }
        Value::Array(items) => {
            let child = tx.put_object(obj, key, ObjType::List)?;
            for (index, item) in items.iter().enumerate() {
                insert_json(tx, &child, index, item)?;
            }
        }
        scalar => tx.put(obj, key, to_scalar(scalar)?)?,
    }
    Ok(())
}

fn insert_json<T: Transactable>(
    tx: &mut T,
    list: &ObjId,
    index: usize,
    value: &Value,
) -> Result<()> {
    match value {
        Value::Object(map) => {
            let child = tx.insert_object(list, index, ObjType::Map)?;
            for (k, v) in map {
                put_json(tx, &child, k, v)?;
            }
        }
        Value::Array(items) => {
            let child = tx.insert_object(list, index, ObjType::List)?;
            for (i, item) in items.iter().enumerate() {
                insert_json(tx, &child, i, item)?;
            }
        }
        scalar => tx.insert(list, index, to_scalar(scalar)?)?,
    }
    Ok(())
}

fn to_scalar(value: &Value) -> Result<ScalarValue> {
    let scalar = match value {
        Value::Null => ScalarValue::Null,
        Value::Bool(b) => ScalarValue::Boolean(*b),
        Value::String(s) => ScalarValue::Str(s.as_str().into()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                ScalarValue::Uint(u)
            } else if let Some(f) = n.as_f64() {
                ScalarValue::F64(f)
            } else {
                return Err(SyncError::Delta {
                    message: format!("unsupported number {n}"),
                });
            }
        }
        Value::Array(_) | Value::Object(_) => {
            return Err(SyncError::Delta {
                message: "nested value where a scalar was expected".to_string(),
            });
        }
    };
    Ok(scalar)
}

/// Reads the root map of `doc` back as a JSON object.
pub fn materialize(doc: &Automerge) -> Result<Map<String, Value>> {
    read_map(doc, &ROOT)
}

fn read_map(doc: &Automerge, obj: &ObjId) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for key in doc.keys(obj) {
        if let Some((value, id)) = doc.get(obj, key.as_str())? {
            map.insert(key, read_value(doc, value, &id)?);
        }
    }
    Ok(map)
}

fn read_value(doc: &Automerge, value: AmValue<'_>, id: &ObjId) -> Result<Value> {
    let json = match value {
        AmValue::Object(ObjType::Map | ObjType::Table) => Value::Object(read_map(doc, id)?),
        AmValue::Object(ObjType::List) => {
            let mut items = Vec::new();
            for index in 0..doc.length(id) {
                if let Some((item, item_id)) = doc.get(id, index)? {
                    items.push(read_value(doc, item, &item_id)?);
                }
            }
            Value::Array(items)
        }
        AmValue::Object(ObjType::Text) => Value::String(doc.text(id)?),
        AmValue::Scalar(scalar) => match scalar.as_ref() {
            ScalarValue::Str(s) => Value::String(s.to_string()),
            ScalarValue::Int(i) | ScalarValue::Timestamp(i) => Value::from(*i),
            ScalarValue::Uint(u) => Value::from(*u),
            ScalarValue::F64(f) => Value::from(*f),
            ScalarValue::Boolean(b) => Value::Bool(*b),
            _ => Value::Null,
        },
    };
    Ok(json)
}
