//! OpenAI containers API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{ExecutionSandbox, SandboxInfo};
use crate::config::LlmConfig;
use crate::errors::SandboxError;

#[derive(Clone)]
pub struct OpenAiSandbox {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ContainerList {
    data: Vec<SandboxInfo>,
}

#[derive(Deserialize)]
struct ContainerFile {
    id: String,
    path: Option<String>,
}

impl OpenAiSandbox {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, SandboxError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SandboxError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ExecutionSandbox for OpenAiSandbox {
    async fn create(&self, name: &str) -> Result<SandboxInfo, SandboxError> {
        let request = self
            .client
            .post(format!("{}/containers", self.base_url))
            .json(&json!({ "name": name }));
        let response = Self::check(self.authorized(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list(&self) -> Result<Vec<SandboxInfo>, SandboxError> {
        let request = self.client.get(format!("{}/containers", self.base_url));
        let response = Self::check(self.authorized(request).send().await?).await?;
        let list: ContainerList = response.json().await?;
        Ok(list.data)
    }

    async fn upload_file(&self, sandbox_id: &str, file_name: &str, bytes: Bytes) -> Result<String, SandboxError> {
        let part = Part::bytes(bytes.to_vec()).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let request = self
            .client
            .post(format!("{}/containers/{}/files", self.base_url, sandbox_id))
            .multipart(form);

        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SandboxError::Expired(sandbox_id.to_string()));
        }
        let file: ContainerFile = Self::check(response).await?.json().await?;
        file.path
            .ok_or_else(|| SandboxError::InvalidResponse(format!("file {} has no path", file.id)))
    }

    async fn download_file(&self, sandbox_id: &str, file_id: &str) -> Result<Bytes, SandboxError> {
        let request = self.client.get(format!(
            "{}/containers/{}/files/{}/content",
            self.base_url, sandbox_id, file_id
        ));
        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SandboxError::FileNotFound {
                sandbox_id: sandbox_id.to_string(),
                file_id: file_id.to_string(),
            });
        }
        Ok(Self::check(response).await?.bytes().await?)
    }
}
