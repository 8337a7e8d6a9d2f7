use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use indexmap::IndexMap;

use super::ObjectStore;
use crate::errors::ObjectStoreError;

const URL_SCHEME: &str = "memory://";

/// Calls kept in the log; older ones are dropped first.
pub const CALL_LOG_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    StageBlock { key: String, block_id: String, len: usize },
    Commit { key: String, block_ids: Vec<String> },
    Delete { key: String },
    Abort { key: String },
    ReadFull { url: String },
}

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct MemoryState {
    staged: HashMap<String, HashMap<String, Bytes>>,
    objects: IndexMap<String, StoredObject>,
    calls: VecDeque<StoreCall>,
    largest_block: usize,
    fail_commits: bool,
    fail_deletes: bool,
}

/// Object store held entirely in process memory. Records the most recent calls it receives.
#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<MemoryState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn url_for(key: &str) -> String {
        format!("{}{}", URL_SCHEME, key)
    }

    pub fn fail_commits(&self, fail: bool) {
        self.state().fail_commits = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    /// Logged calls, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.iter().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.state().objects.get(key).cloned()
    }

    pub fn object_keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    /// Number of blocks staged but not yet committed or discarded.
    pub fn pending_blocks(&self) -> usize {
        self.state().staged.values().map(HashMap::len).sum()
    }

    /// Largest block ever staged, including blocks whose calls left the log.
    pub fn largest_block(&self) -> usize {
        self.state().largest_block
    }

    /// Stores a complete object directly, bypassing block staging.
    pub fn insert(&self, key: &str, bytes: impl Into<Bytes>, content_type: &str) -> String {
        self.state().objects.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.into(),
                content_type: content_type.to_string(),
            },
        );
        Self::url_for(key)
    }
}

impl MemoryState {
    fn log(&mut self, call: StoreCall) {
        if let StoreCall::StageBlock { len, .. } = &call {
            self.largest_block = self.largest_block.max(*len);
        }
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let mut state = self.state();
        state.log(StoreCall::StageBlock {
            key: key.to_string(),
            block_id: block_id.to_string(),
            len: bytes.len(),
        });
        state
            .staged
            .entry(key.to_string())
            .or_default()
            .insert(block_id.to_string(), bytes);
        Ok(())
    }

    async fn commit(
        &self,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let mut state = self.state();
        state.log(StoreCall::Commit {
            key: key.to_string(),
            block_ids: block_ids.to_vec(),
        });
        if state.fail_commits {
            return Err(ObjectStoreError::CommitFailed {
                key: key.to_string(),
                reason: "commits disabled".to_string(),
            });
        }

        let mut staged = state.staged.remove(key).unwrap_or_default();
        let mut assembled = BytesMut::new();
        for block_id in block_ids {
            let block = staged.remove(block_id).ok_or_else(|| ObjectStoreError::CommitFailed {
                key: key.to_string(),
                reason: format!("block {} was never staged", block_id),
            })?;
            assembled.extend_from_slice(&block);
        }

        state.objects.insert(
            key.to_string(),
            StoredObject {
                bytes: assembled.freeze(),
                content_type: content_type.to_string(),
            },
        );
        Ok(Self::url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let mut state = self.state();
        state.log(StoreCall::Delete { key: key.to_string() });
        if state.fail_deletes {
            return Err(ObjectStoreError::Status {
                status: 503,
                body: "deletes disabled".to_string(),
            });
        }
        state
            .objects
            .shift_remove(key)
            .map(|_| ())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn read_full(&self, url: &str) -> Result<Bytes, ObjectStoreError> {
        let mut state = self.state();
        state.log(StoreCall::ReadFull { url: url.to_string() });
        let key = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| ObjectStoreError::InvalidLocation(url.to_string()))?;
        state
            .objects
            .get(key)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn abort(&self, key: &str) -> Result<(), ObjectStoreError> {
        let mut state = self.state();
        state.log(StoreCall::Abort { key: key.to_string() });
        state.staged.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_assembles_blocks_in_listed_order() {
        let store = MemoryObjectStore::new();
        store.stage_block("k", "b", Bytes::from_static(b"world")).await.unwrap();
        store.stage_block("k", "a", Bytes::from_static(b"hello ")).await.unwrap();

        let url = store
            .commit("k", &["a".to_string(), "b".to_string()], "text/plain")
            .await
            .unwrap();

        assert_eq!(url, "memory://k");
        assert_eq!(store.read_full(&url).await.unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(store.pending_blocks(), 0);
    }

    #[tokio::test]
    async fn commit_with_unknown_block_fails() {
        let store = MemoryObjectStore::new();
        let err = store.commit("k", &["missing".to_string()], "text/plain").await;
        assert!(matches!(err, Err(ObjectStoreError::CommitFailed { .. })));
        assert!(store.object("k").is_none());
    }

    #[tokio::test]
    async fn call_log_keeps_only_recent_calls() {
        let store = MemoryObjectStore::new();
        store.stage_block("k", "big", Bytes::from(vec![0u8; 64])).await.unwrap();
        for i in 0..CALL_LOG_CAPACITY + 10 {
            store.abort(&format!("k{}", i)).await.unwrap();
        }

        let calls = store.calls();
        assert_eq!(calls.len(), CALL_LOG_CAPACITY);
        assert_eq!(calls.last(), Some(&StoreCall::Abort { key: format!("k{}", CALL_LOG_CAPACITY + 9) }));
        assert!(!calls.iter().any(|call| matches!(call, StoreCall::StageBlock { .. })));
        assert_eq!(store.largest_block(), 64);
    }

    #[tokio::test]
    async fn abort_discards_staged_blocks() {
        let store = MemoryObjectStore::new();
        store.stage_block("k", "a", Bytes::from_static(b"x")).await.unwrap();
        store.abort("k").await.unwrap();
        assert_eq!(store.pending_blocks(), 0);
        assert!(store.object_keys().is_empty());
    }
}
