//! LLM service boundary.
//!
//! Two call shapes are consumed: free-text generation, optionally bound to an execution
//! sandbox, and schema-validated parsing. Responses are normalised into a tagged
//! [`OutputItem`] list so callers never inspect provider payloads directly.

pub mod openai;
pub mod schemas;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

pub use openai::OpenAiLlmClient;
pub use schemas::{FileIdResponse, OutputSchema, UnitAnalysis, UnitList};

/// Which configured model a request should run on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelTier {
    #[default]
    Standard,
    /// Used for tool-augmented unit analysis.
    Analysis,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LlmRequest {
    pub tier: ModelTier,
    pub instructions: Option<String>,
    pub prompt: String,
    /// Image attached as a `data:` URL.
    pub image_url: Option<String>,
    /// Sandbox the code tool runs in. When set, the model must use the tool.
    pub sandbox_id: Option<String>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_image(mut self, data_url: impl Into<String>) -> Self {
        self.image_url = Some(data_url.into());
        self
    }

    pub fn with_sandbox(mut self, sandbox_id: impl Into<String>) -> Self {
        self.sandbox_id = Some(sandbox_id.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCitation {
    pub file_id: String,
    pub container_id: Option<String>,
    pub filename: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolOutput {
    Logs { logs: String },
    Image { file_id: Option<String>, url: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        text: String,
        citations: Vec<FileCitation>,
    },
    ToolCall {
        container_id: Option<String>,
        code: Option<String>,
        outputs: Vec<ToolOutput>,
    },
    Other {
        kind: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub id: Option<String>,
    pub output: Vec<OutputItem>,
}

impl LlmResponse {
    /// Concatenated text of all message items.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Full response as JSON, used when a later call has to reason about it.
    pub fn raw_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.output_text())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Generates output constrained to `schema` and returns it as parsed JSON.
    async fn parse(
        &self,
        request: LlmRequest,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value, LlmError>;
}

/// Runs a parse call for `T` and validates the result against it.
pub async fn parse_as<T>(client: &dyn LlmClient, request: LlmRequest) -> Result<T, LlmError>
where
    T: OutputSchema + DeserializeOwned,
{
    let value = client.parse(request, T::NAME, T::json_schema()).await?;
    serde_json::from_value(value).map_err(|e| LlmError::Schema {
        schema: T::NAME.to_string(),
        reason: e.to_string(),
    })
}
