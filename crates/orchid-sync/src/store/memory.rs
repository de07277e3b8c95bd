// SPDX-License-Identifier: Apache-2.0

//! In-process document store backed by `automerge` documents.
//!
//! Keeps one CRDT document and one materialized row per record. Useful for
//! embedding the engine next to a single replica and for exercising the
//! merge behaviour in tests: `local_update` plays the part of a user editing
//! the record while a worker is in flight, and records inserted late stand in
//! for replication lag.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use automerge::Automerge;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{DocumentState, DocumentStore};
use crate::Result;
use crate::crdt::{self, FieldChanges};
use crate::error::SyncError;
use crate::model::Collection;

struct Entry {
    doc: Automerge,
    seq: u64,
    row: Map<String, Value>,
}

impl Entry {
    /// Re-reads the row from the document after a merge.
    fn refresh(&mut self) -> Result<()> {
        self.row = crdt::materialize(&self.doc)?;
        self.seq += 1;
        Ok(())
    }
}

/// A [`DocumentStore`] held entirely in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    entries: Mutex<HashMap<(Collection, String), Entry>>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(Collection, String), Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a record, or merges its fields into an existing one.
    pub fn insert<T: Serialize>(&self, collection: Collection, id: &str, record: &T) -> Result<()> {
        let Value::Object(fields) = serde_json::to_value(record)? else {
            return Err(SyncError::store(format!(
                "{collection}/{id}: record must serialize to an object"
            )));
        };
        let changes = FieldChanges::from_projection(&fields);

        let mut entries = self.entries();
        let entry = entries
            .entry((collection, id.to_string()))
            .or_insert_with(|| Entry {
                doc: Automerge::new(),
                seq: 0,
                row: Map::new(),
            });
        crdt::apply_changes(&mut entry.doc, &changes)?;
        entry.refresh()?;
        debug!(%collection, id, seq = entry.seq, "Inserted record");
        Ok(())
    }

    /// Applies a local edit directly to the stored document.
    pub fn local_update(
        &self,
        collection: Collection,
        id: &str,
        changes: &FieldChanges,
    ) -> Result<()> {
        let mut entries = self.entries();
        let entry = entries
            .get_mut(&(collection, id.to_string()))
            .ok_or_else(|| SyncError::store(format!("{collection}/{id} does not exist")))?;
        crdt::apply_changes(&mut entry.doc, changes)?;
        entry.refresh()
    }

    /// Reads a record back from its CRDT document rather than the materialized row.
    pub fn materialize(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        self.entries()
            .get(&(collection, id.to_string()))
            .map(|entry| crdt::materialize(&entry.doc))
            .transpose()
    }

    /// Current sequence number of a record.
    #[must_use]
    pub fn seq(&self, collection: Collection, id: &str) -> Option<u64> {
        self.entries()
            .get(&(collection, id.to_string()))
            .map(|entry| entry.seq)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        Ok(self
            .entries()
            .get(&(collection, id.to_string()))
            .map(|entry| entry.row.clone()))
    }

    async fn get_state(&self, collection: Collection, id: &str) -> Result<Option<DocumentState>> {
        Ok(self
            .entries()
            .get(&(collection, id.to_string()))
            .map(|entry| DocumentState {
                bytes: entry.doc.save(),
                seq: entry.seq,
            }))
    }

    #[instrument(skip(self, delta, projection), fields(delta_len = delta.len()))]
    async fn apply_delta(
        &self,
        collection: Collection,
        id: &str,
        delta: &[u8],
        projection: &Map<String, Value>,
    ) -> Result<()> {
        let mut entries = self.entries();
        let entry = entries
            .get_mut(&(collection, id.to_string()))
            .ok_or_else(|| SyncError::store(format!("{collection}/{id} does not exist")))?;
        entry.doc.load_incremental(delta)?;
        entry.refresh()?;
        debug!(
            seq = entry.seq,
            projected = projection.len(),
            "Merged delta"
        );
        Ok(())
    }

    #[instrument(skip(self, projection))]
    async fn patch_record(
        &self,
        collection: Collection,
        id: &str,
        projection: &Map<String, Value>,
    ) -> Result<()> {
        self.local_update(collection, id, &FieldChanges::from_projection(projection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_row() -> Value {
        json!({
            "id": "i1",
            "title": "A",
            "status": "todo",
            "createdAt": 1,
            "updatedAt": 1,
        })
    }

    #[tokio::test]
    async fn projection_matches_merged_document() {
        let store = MemoryDocumentStore::new();
        store.insert(Collection::Issues, "i1", &issue_row()).unwrap();

        let base = store.get_state(Collection::Issues, "i1").await.unwrap().unwrap();
        let changes = FieldChanges::new()
            .set("githubSyncStatus", "creating")
            .delete("githubSyncError");
        let delta = crdt::build_delta(Some(&base.bytes), &changes).unwrap();
        store
            .apply_delta(Collection::Issues, "i1", &delta, &changes.projection())
            .await
            .unwrap();

        let row = store.get_record(Collection::Issues, "i1").await.unwrap().unwrap();
        let doc = store.materialize(Collection::Issues, "i1").unwrap().unwrap();
        assert_eq!(row, doc);
        assert_eq!(row["githubSyncStatus"], json!("creating"));
    }

    #[tokio::test]
    async fn row_keeps_field_written_after_base_was_read() {
        let store = MemoryDocumentStore::new();
        store.insert(Collection::Issues, "i1", &issue_row()).unwrap();

        let base = store.get_state(Collection::Issues, "i1").await.unwrap().unwrap();
        store
            .local_update(
                Collection::Issues,
                "i1",
                &FieldChanges::new().set("githubSyncError", "boom"),
            )
            .unwrap();

        let changes = FieldChanges::new()
            .set("githubSyncStatus", "synced")
            .delete("githubSyncError");
        let delta = crdt::build_delta(Some(&base.bytes), &changes).unwrap();
        store
            .apply_delta(Collection::Issues, "i1", &delta, &changes.projection())
            .await
            .unwrap();

        let row = store.get_record(Collection::Issues, "i1").await.unwrap().unwrap();
        let doc = store.materialize(Collection::Issues, "i1").unwrap().unwrap();
        assert_eq!(row, doc);
        assert_eq!(row["githubSyncStatus"], json!("synced"));
        assert_eq!(row["githubSyncError"], json!("boom"));
    }

    #[tokio::test]
    async fn seq_is_monotonic() {
        let store = MemoryDocumentStore::new();
        store.insert(Collection::Issues, "i1", &issue_row()).unwrap();
        let first = store.seq(Collection::Issues, "i1").unwrap();

        store
            .local_update(Collection::Issues, "i1", &FieldChanges::new().set("title", "B"))
            .unwrap();
        let second = store.get_state(Collection::Issues, "i1").await.unwrap().unwrap();
        assert!(second.seq > first);
    }

    #[tokio::test]
    async fn missing_record_is_absent() {
        let store = MemoryDocumentStore::new();
        assert!(store.get_record(Collection::Replies, "r1").await.unwrap().is_none());
        assert!(store.get_state(Collection::Replies, "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delta_for_unknown_record_is_rejected() {
        let store = MemoryDocumentStore::new();
        let delta = crdt::build_delta(None, &FieldChanges::new().set("x", 1)).unwrap();
        let err = store
            .apply_delta(Collection::Issues, "ghost", &delta, &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store { .. }));
    }
}
