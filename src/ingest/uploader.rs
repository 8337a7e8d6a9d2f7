//! Bounded-memory streaming upload.
//!
//! The source is read in fixed read-chunks which are coalesced into write-blocks. A block
//! is staged as soon as it is full, so at most one write-block plus one read-chunk is
//! held at any time. The object only becomes visible when the ordered block list is
//! committed; every failure before that discards the staged blocks instead.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::preview::{extract_preview, Preview};
use crate::config::UploadLimits;
use crate::errors::{UploadError, UploadResult};
use crate::storage::ObjectStore;

/// Positional block id. Every id has the same encoded length, as block stores require.
pub fn block_id(index: usize) -> String {
    STANDARD.encode(format!("block-{:08}", index))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub total_bytes: u64,
    pub blocks_staged: usize,
    /// Largest number of payload bytes held at once (write-block plus current read-chunk).
    pub peak_buffered_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub key: String,
    pub url: String,
    pub block_ids: Vec<String>,
    pub preview: Option<Preview>,
    pub stats: UploadStats,
}

#[derive(Clone)]
pub struct ChunkedUploader {
    store: Arc<dyn ObjectStore>,
    limits: UploadLimits,
}

impl ChunkedUploader {
    pub fn new(store: Arc<dyn ObjectStore>, limits: UploadLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Streams a CSV file, extracting a preview from its first read-chunk.
    pub async fn upload_csv<R>(&self, reader: R, key: &str) -> UploadResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.stream(reader, key, "text/csv", Some(self.limits.preview_rows))
            .await
    }

    /// Streams arbitrary bytes without inspecting them.
    pub async fn upload_stream<R>(&self, reader: R, key: &str, content_type: &str) -> UploadResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.stream(reader, key, content_type, None).await
    }

    pub async fn upload_bytes(&self, bytes: Bytes, key: &str, content_type: &str) -> UploadResult<UploadOutcome> {
        self.upload_stream(bytes.as_ref(), key, content_type).await
    }

    async fn stream<R>(
        &self,
        reader: R,
        key: &str,
        content_type: &str,
        preview_rows: Option<usize>,
    ) -> UploadResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        match self.stage_all(reader, key, preview_rows).await {
            Ok((block_ids, preview, stats)) => {
                let url = match self.store.commit(key, &block_ids, content_type).await {
                    Ok(url) => url,
                    Err(e) => {
                        self.discard(key).await;
                        return Err(e.into());
                    }
                };
                debug!(
                    key = %key,
                    bytes = stats.total_bytes,
                    blocks = stats.blocks_staged,
                    peak = stats.peak_buffered_bytes,
                    "Upload committed"
                );
                Ok(UploadOutcome {
                    key: key.to_string(),
                    url,
                    block_ids,
                    preview,
                    stats,
                })
            }
            Err(e) => {
                self.discard(key).await;
                Err(e)
            }
        }
    }

    async fn stage_all<R>(
        &self,
        mut reader: R,
        key: &str,
        preview_rows: Option<usize>,
    ) -> UploadResult<(Vec<String>, Option<Preview>, UploadStats)>
    where
        R: AsyncRead + Unpin + Send,
    {
        let chunk_size = self.limits.read_chunk_bytes.max(1);
        let block_size = self.limits.write_block_bytes.max(1);

        let mut chunk = vec![0u8; chunk_size];
        let mut block = BytesMut::with_capacity(block_size);
        let mut block_ids = Vec::new();
        let mut preview = None;
        let mut stats = UploadStats::default();
        let mut first_chunk = true;
        let mut carry = None;

        loop {
            let filled = fill_chunk(&mut reader, &mut chunk, carry.take()).await?;

            if first_chunk {
                first_chunk = false;
                if let Some(rows) = preview_rows {
                    if filled == 0 {
                        return Err(UploadError::EmptyFile);
                    }
                    // A full first chunk may still be the whole file.
                    let is_whole_file = filled < chunk_size || {
                        carry = peek_byte(&mut reader).await?;
                        carry.is_none()
                    };
                    preview = Some(extract_preview(&chunk[..filled], is_whole_file, rows)?);
                }
            }

            if filled == 0 {
                break;
            }

            stats.total_bytes += filled as u64;
            if stats.total_bytes > self.limits.max_upload_bytes as u64 {
                return Err(UploadError::FileTooLarge {
                    limit: self.limits.max_upload_bytes,
                });
            }

            let mut offset = 0;
            while offset < filled {
                let take = (filled - offset).min(block_size - block.len());
                block.extend_from_slice(&chunk[offset..offset + take]);
                offset += take;
                stats.peak_buffered_bytes = stats.peak_buffered_bytes.max(block.len() + filled);

                if block.len() == block_size {
                    self.stage(key, &mut block, &mut block_ids).await?;
                }
            }

            if filled < chunk_size {
                break;
            }
        }

        if !block.is_empty() {
            self.stage(key, &mut block, &mut block_ids).await?;
        }
        stats.blocks_staged = block_ids.len();

        Ok((block_ids, preview, stats))
    }

    async fn stage(&self, key: &str, block: &mut BytesMut, block_ids: &mut Vec<String>) -> UploadResult<()> {
        let id = block_id(block_ids.len());
        let payload = block.split().freeze();
        self.store.stage_block(key, &id, payload).await?;
        block_ids.push(id);
        Ok(())
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.abort(key).await {
            warn!(key = %key, error = %e, "Failed to discard staged blocks");
        }
    }
}

/// Reads until `chunk` is full or the source is exhausted. A `carry` byte taken by
/// [`peek_byte`] goes first.
async fn fill_chunk<R>(reader: &mut R, chunk: &mut [u8], carry: Option<u8>) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin + Send,
{
    let mut filled = 0;
    if let Some(byte) = carry {
        chunk[0] = byte;
        filled = 1;
    }
    while filled < chunk.len() {
        let read = reader.read(&mut chunk[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

async fn peek_byte<R>(reader: &mut R) -> std::io::Result<Option<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut byte = [0u8; 1];
    match reader.read(&mut byte).await? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}
