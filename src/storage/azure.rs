//! Azure Blob Storage block blobs over the REST API.
//!
//! Authentication is a container-level SAS token appended to every request.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, Url};
use tracing::debug;

use super::ObjectStore;
use crate::errors::ObjectStoreError;

const API_VERSION: &str = "2021-08-06";

pub struct AzureBlobStore {
    client: Client,
    container_url: Url,
    sas_token: Option<String>,
}

impl AzureBlobStore {
    pub fn new(container_url: &str, sas_token: Option<String>) -> Result<Self, ObjectStoreError> {
        let container_url = Url::parse(container_url.trim_end_matches('/'))
            .map_err(|e| ObjectStoreError::InvalidLocation(format!("{}: {}", container_url, e)))?;
        Ok(Self {
            client: Client::new(),
            container_url,
            sas_token: sas_token.map(|token| token.trim_start_matches('?').to_string()),
        })
    }

    /// Public URL of a blob, without credentials.
    pub fn blob_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        let mut url = self.container_url.clone();
        url.path_segments_mut()
            .map_err(|_| ObjectStoreError::InvalidLocation(self.container_url.to_string()))?
            .extend(key.split('/'));
        Ok(url)
    }

    fn signed(&self, mut url: Url, params: &[(&str, &str)]) -> Url {
        if let Some(token) = &self.sas_token {
            if url.query().is_none() {
                url.set_query(Some(token));
            }
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url
    }

    async fn check(response: Response, key: &str) -> Result<Response, ObjectStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(ObjectStoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for block_id in block_ids {
        xml.push_str("<Latest>");
        xml.push_str(block_id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        let url = self.signed(self.blob_url(key)?, &[("comp", "block"), ("blockid", block_id)]);
        let response = self
            .client
            .put(url)
            .header("x-ms-version", API_VERSION)
            .body(bytes)
            .send()
            .await?;

        match Self::check(response, key).await {
            Ok(_) => Ok(()),
            Err(ObjectStoreError::Status { body, .. }) => Err(ObjectStoreError::BlockRejected {
                key: key.to_string(),
                block_id: block_id.to_string(),
                reason: body,
            }),
            Err(e) => Err(e),
        }
    }

    async fn commit(
        &self,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let blob_url = self.blob_url(key)?;
        let url = self.signed(blob_url.clone(), &[("comp", "blocklist")]);
        let response = self
            .client
            .put(url)
            .header("x-ms-version", API_VERSION)
            .header("x-ms-blob-content-type", content_type)
            .header("content-type", "application/xml")
            .body(block_list_xml(block_ids))
            .send()
            .await?;

        match Self::check(response, key).await {
            Ok(_) => {
                debug!("Committed {} blocks to {}", block_ids.len(), blob_url);
                Ok(blob_url.to_string())
            }
            Err(ObjectStoreError::Status { body, .. }) => Err(ObjectStoreError::CommitFailed {
                key: key.to_string(),
                reason: body,
            }),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let url = self.signed(self.blob_url(key)?, &[]);
        let response = self
            .client
            .delete(url)
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        Self::check(response, key).await.map(|_| ())
    }

    async fn read_full(&self, url: &str) -> Result<Bytes, ObjectStoreError> {
        let parsed = Url::parse(url).map_err(|e| ObjectStoreError::InvalidLocation(format!("{}: {}", url, e)))?;
        let response = self
            .client
            .get(self.signed(parsed, &[]))
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        Ok(Self::check(response, url).await?.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_urls_encode_each_path_segment() {
        let store = AzureBlobStore::new("https://acct.blob.core.windows.net/data/", None).unwrap();
        let url = store.blob_url("uploads/my file.csv").unwrap();
        assert_eq!(url.as_str(), "https://acct.blob.core.windows.net/data/uploads/my%20file.csv");
    }

    #[test]
    fn block_requests_carry_sas_and_encoded_block_id() {
        let store =
            AzureBlobStore::new("https://acct.blob.core.windows.net/data", Some("?sv=1&sig=abc".to_string()))
                .unwrap();
        let url = store.signed(
            store.blob_url("a.csv").unwrap(),
            &[("comp", "block"), ("blockid", "YmxvY2s+MDA=")],
        );
        assert_eq!(
            url.as_str(),
            "https://acct.blob.core.windows.net/data/a.csv?sv=1&sig=abc&comp=block&blockid=YmxvY2s%2BMDA%3D"
        );
    }

    #[test]
    fn block_list_keeps_order() {
        let xml = block_list_xml(&["b".to_string(), "a".to_string()]);
        assert!(xml.ends_with("<BlockList><Latest>b</Latest><Latest>a</Latest></BlockList>"));
    }
}
