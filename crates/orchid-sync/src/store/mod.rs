// SPDX-License-Identifier: Apache-2.0

//! Document store boundary.
//!
//! The replication layer is an external collaborator. The engine only needs
//! to read a record's materialized projection, read its opaque CRDT state,
//! merge a field-level delta, and patch worker-owned fields directly.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::Result;
use crate::model::{Collection, Issue, Reply};

pub mod memory;

pub use memory::MemoryDocumentStore;

/// Last known merged state of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    /// Opaque encoded CRDT document.
    pub bytes: Vec<u8>,
    /// Monotonic sequence number, bumped on every merge.
    pub seq: u64,
}

/// Storage operations the sync engine consumes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the materialized projection of a record, or `None` if it is not visible yet.
    async fn get_record(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Map<String, Value>>>;

    /// Reads the opaque CRDT state of a record.
    async fn get_state(&self, collection: Collection, id: &str) -> Result<Option<DocumentState>>;

    /// Merges an incremental update and applies its materialized projection.
    ///
    /// `projection` carries the changed fields; `null` means the field was removed.
    async fn apply_delta(
        &self,
        collection: Collection,
        id: &str,
        delta: &[u8],
        projection: &Map<String, Value>,
    ) -> Result<()>;

    /// Writes fields straight onto the materialized record, without a merge base.
    ///
    /// Only for fields no user edits (reply link fields).
    async fn patch_record(
        &self,
        collection: Collection,
        id: &str,
        projection: &Map<String, Value>,
    ) -> Result<()>;
}

/// Reads and deserializes a record.
pub async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<T>> {
    match store.get_record(collection, id).await? {
        Some(row) => Ok(Some(serde_json::from_value(Value::Object(row))?)),
        None => Ok(None),
    }
}

/// Reads an issue record.
pub async fn load_issue(store: &dyn DocumentStore, id: &str) -> Result<Option<Issue>> {
    load(store, Collection::Issues, id).await
}

/// Reads a reply record.
pub async fn load_reply(store: &dyn DocumentStore, id: &str) -> Result<Option<Reply>> {
    load(store, Collection::Replies, id).await
}
