//! Ephemeral code-execution sandbox.
//!
//! Sandboxes are reclaimed by the provider after a period of inactivity, so callers
//! re-check existence with [`ExecutionSandbox::list`] instead of caching ids.

pub mod openai;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::SandboxError;

pub use openai::OpenAiSandbox;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
}

impl SandboxInfo {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

#[async_trait]
pub trait ExecutionSandbox: Send + Sync {
    async fn create(&self, name: &str) -> Result<SandboxInfo, SandboxError>;

    async fn list(&self) -> Result<Vec<SandboxInfo>, SandboxError>;

    /// Uploads a file and returns its path inside the sandbox.
    async fn upload_file(&self, sandbox_id: &str, file_name: &str, bytes: Bytes) -> Result<String, SandboxError>;

    async fn download_file(&self, sandbox_id: &str, file_id: &str) -> Result<Bytes, SandboxError>;
}

/// Returns the first running sandbox, creating one when none is available.
pub async fn acquire_sandbox(sandbox: &dyn ExecutionSandbox, name: &str) -> Result<SandboxInfo, SandboxError> {
    if let Some(running) = sandbox.list().await?.into_iter().find(SandboxInfo::is_running) {
        return Ok(running);
    }
    sandbox.create(name).await
}
