//! OpenAI Responses API adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{FileCitation, LlmClient, LlmRequest, LlmResponse, ModelTier, OutputItem, ToolOutput};
use crate::config::LlmConfig;
use crate::errors::LlmError;

#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAiLlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.config.model,
            ModelTier::Analysis => &self.config.analysis_model,
        }
    }

    fn request_body(&self, request: &LlmRequest, format: Option<Value>) -> Value {
        let mut content = vec![json!({ "type": "input_text", "text": request.prompt })];
        if let Some(image_url) = &request.image_url {
            content.push(json!({ "type": "input_image", "image_url": image_url }));
        }

        let mut body = json!({
            "model": self.model(request.tier),
            "input": [{ "role": "user", "content": content }],
        });
        if let Some(instructions) = &request.instructions {
            body["instructions"] = json!(instructions);
        }
        if let Some(sandbox_id) = &request.sandbox_id {
            body["tools"] = json!([{ "type": "code_interpreter", "container": sandbox_id }]);
            body["tool_choice"] = json!("required");
            body["include"] = json!(["code_interpreter_call.outputs"]);
        }
        if let Some(format) = format {
            body["text"] = json!({ "format": format });
        }
        body
    }

    async fn send(&self, body: Value) -> Result<LlmResponse, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured("no API key".to_string()))?;

        let response = self
            .client
            .post(format!("{}/responses", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let wire: WireResponse = response.json().await?;
        let response = wire.into_response();
        debug!(
            response_id = response.id.as_deref().unwrap_or("-"),
            items = response.output.len(),
            "LLM response received"
        );
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.request_body(&request, None);
        self.send(body).await
    }

    async fn parse(&self, request: LlmRequest, schema_name: &str, schema: Value) -> Result<Value, LlmError> {
        let format = json!({
            "type": "json_schema",
            "name": schema_name,
            "schema": schema,
            "strict": true,
        });
        let body = self.request_body(&request, Some(format));
        let response = self.send(body).await?;

        let text = response.output_text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        serde_json::from_str(&text).map_err(|e| LlmError::Schema {
            schema: schema_name.to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: Option<String>,
    #[serde(default)]
    output: Vec<WireOutput>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireOutput {
    Message {
        #[serde(default)]
        content: Vec<WireContent>,
    },
    CodeInterpreterCall {
        container_id: Option<String>,
        code: Option<String>,
        #[serde(default)]
        outputs: Option<Vec<WireToolOutput>>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<WireAnnotation>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireAnnotation {
    ContainerFileCitation {
        file_id: String,
        container_id: Option<String>,
        filename: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireToolOutput {
    Logs {
        logs: String,
    },
    Image {
        url: Option<String>,
        file_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl WireResponse {
    fn into_response(self) -> LlmResponse {
        let output = self
            .output
            .into_iter()
            .map(|item| match item {
                WireOutput::Message { content } => {
                    let mut text = Vec::new();
                    let mut citations = Vec::new();
                    for part in content {
                        if let WireContent::OutputText { text: part_text, annotations } = part {
                            text.push(part_text);
                            citations.extend(annotations.into_iter().filter_map(|annotation| match annotation {
                                WireAnnotation::ContainerFileCitation {
                                    file_id,
                                    container_id,
                                    filename,
                                } => Some(FileCitation {
                                    file_id,
                                    container_id,
                                    filename,
                                }),
                                WireAnnotation::Unknown => None,
                            }));
                        }
                    }
                    OutputItem::Message {
                        text: text.join(""),
                        citations,
                    }
                }
                WireOutput::CodeInterpreterCall {
                    container_id,
                    code,
                    outputs,
                } => OutputItem::ToolCall {
                    container_id,
                    code,
                    outputs: outputs
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|output| match output {
                            WireToolOutput::Logs { logs } => Some(ToolOutput::Logs { logs }),
                            WireToolOutput::Image { url, file_id } => Some(ToolOutput::Image { file_id, url }),
                            WireToolOutput::Unknown => None,
                        })
                        .collect(),
                },
                WireOutput::Unknown => OutputItem::Other {
                    kind: "unknown".to_string(),
                },
            })
            .collect();

        LlmResponse { id: self.id, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> LlmConfig {
        LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "small".to_string(),
            analysis_model: "large".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn sandbox_requests_require_the_code_tool() {
        let client = OpenAiLlmClient::new(config());
        let request = LlmRequest::new("analyse")
            .with_tier(ModelTier::Analysis)
            .with_sandbox("cntr_9");
        let body = client.request_body(&request, None);

        assert_eq!(body["model"], "large");
        assert_eq!(body["tools"][0]["container"], "cntr_9");
        assert_eq!(body["tool_choice"], "required");
        assert!(body.get("text").is_none());
    }

    #[test]
    fn image_input_is_attached_after_text() {
        let client = OpenAiLlmClient::new(config());
        let request = LlmRequest::new("look").with_image("data:image/png;base64,AA==");
        let body = client.request_body(&request, None);
        let content = body["input"][0]["content"].as_array().unwrap();
        assert_eq!(content[1]["type"], "input_image");
        assert_eq!(body["model"], "small");
    }

    #[test]
    fn wire_response_is_normalised() {
        let wire: WireResponse = serde_json::from_value(json!({
            "id": "resp_1",
            "output": [
                { "type": "reasoning", "summary": [] },
                {
                    "type": "code_interpreter_call",
                    "container_id": "cntr_1",
                    "code": "plot()",
                    "outputs": [{ "type": "logs", "logs": "ok" }, { "type": "image", "url": "https://x" }]
                },
                {
                    "type": "message",
                    "content": [{
                        "type": "output_text",
                        "text": "See chart",
                        "annotations": [
                            { "type": "url_citation", "url": "https://y" },
                            { "type": "container_file_citation", "file_id": "cfile_1", "container_id": "cntr_1", "filename": "chart.png" }
                        ]
                    }]
                }
            ]
        }))
        .unwrap();

        let response = wire.into_response();
        assert_eq!(response.output.len(), 3);
        assert!(matches!(response.output[0], OutputItem::Other { .. }));
        assert!(matches!(&response.output[1], OutputItem::ToolCall { outputs, .. } if outputs.len() == 2));
        match &response.output[2] {
            OutputItem::Message { text, citations } => {
                assert_eq!(text, "See chart");
                assert_eq!(citations[0].file_id, "cfile_1");
            }
            other => panic!("unexpected item {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let mut config = config();
        config.api_key = None;
        let client = OpenAiLlmClient::new(config);
        let err = client.generate(LlmRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
