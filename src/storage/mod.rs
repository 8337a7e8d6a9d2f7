//! Block-oriented object store.
//!
//! Objects are written by staging numbered blocks and then committing the ordered block
//! list. Nothing is visible under a key until its commit succeeds.

pub mod azure;
pub mod local;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::ObjectStoreBackend;
use crate::errors::ObjectStoreError;

pub use azure::AzureBlobStore;
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stages one block under `key`. Staged blocks are invisible until committed.
    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<(), ObjectStoreError>;

    /// Assembles the staged blocks in the given order and returns the object's URL.
    async fn commit(
        &self,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    async fn read_full(&self, url: &str) -> Result<Bytes, ObjectStoreError>;

    /// Discards blocks staged under `key` that were never committed.
    async fn abort(&self, _key: &str) -> Result<(), ObjectStoreError> {
        Ok(())
    }
}

pub fn object_store_from_config(
    backend: &ObjectStoreBackend,
) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
    let store: Arc<dyn ObjectStore> = match backend {
        ObjectStoreBackend::Azure {
            container_url,
            sas_token,
        } => Arc::new(AzureBlobStore::new(container_url, sas_token.clone())?),
        ObjectStoreBackend::Local { root } => Arc::new(LocalObjectStore::new(root.clone())),
        ObjectStoreBackend::Memory => Arc::new(MemoryObjectStore::new()),
    };
    Ok(store)
}
