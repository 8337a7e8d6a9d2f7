//! Locating the chart a unit analysis produced.
//!
//! Matchers are tried in order and the first one that yields a reference wins:
//! file citations on message text, then image outputs of the code tool, then a parse
//! call that asks the LLM to find a file id in the raw response.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::prompts::file_id_prompt;
use crate::llm::{parse_as, FileIdResponse, LlmClient, LlmRequest, LlmResponse, OutputItem, ToolOutput};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactSource {
    Citation,
    ToolOutput,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactRef {
    pub file_id: String,
    /// Sandbox holding the file, when the response names one.
    pub sandbox_id: Option<String>,
    pub source: ArtifactSource,
}

#[async_trait]
pub trait ArtifactMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn find(&self, response: &LlmResponse) -> Option<ArtifactRef>;
}

pub struct CitationMatcher;

#[async_trait]
impl ArtifactMatcher for CitationMatcher {
    fn name(&self) -> &'static str {
        "citation"
    }

    async fn find(&self, response: &LlmResponse) -> Option<ArtifactRef> {
        response.output.iter().find_map(|item| match item {
            OutputItem::Message { citations, .. } => citations.first().map(|citation| ArtifactRef {
                file_id: citation.file_id.clone(),
                sandbox_id: citation.container_id.clone(),
                source: ArtifactSource::Citation,
            }),
            _ => None,
        })
    }
}

pub struct ToolOutputMatcher;

#[async_trait]
impl ArtifactMatcher for ToolOutputMatcher {
    fn name(&self) -> &'static str {
        "tool_output"
    }

    async fn find(&self, response: &LlmResponse) -> Option<ArtifactRef> {
        response.output.iter().find_map(|item| match item {
            OutputItem::ToolCall {
                container_id, outputs, ..
            } => outputs.iter().find_map(|output| match output {
                ToolOutput::Image {
                    file_id: Some(file_id), ..
                } => Some(ArtifactRef {
                    file_id: file_id.clone(),
                    sandbox_id: container_id.clone(),
                    source: ArtifactSource::ToolOutput,
                }),
                _ => None,
            }),
            _ => None,
        })
    }
}

/// Last resort: ask the LLM to spot a file id in the serialized response.
pub struct LlmFallbackMatcher {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LlmFallbackMatcher {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }
}

fn file_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(cfile_|file-)[A-Za-z0-9_-]+$").expect("file id pattern is valid"))
}

#[async_trait]
impl ArtifactMatcher for LlmFallbackMatcher {
    fn name(&self) -> &'static str {
        "llm_fallback"
    }

    async fn find(&self, response: &LlmResponse) -> Option<ArtifactRef> {
        let request = LlmRequest::new(file_id_prompt(&response.raw_text()));
        let parsed = match tokio::time::timeout(self.timeout, parse_as::<FileIdResponse>(self.llm.as_ref(), request)).await {
            Ok(Ok(parsed)) => parsed,
            Ok(Err(e)) => {
                debug!(error = %e, "File id extraction failed");
                return None;
            }
            Err(_) => {
                debug!("File id extraction timed out after {:?}", self.timeout);
                return None;
            }
        };

        let file_id = parsed.file_id?.trim().to_string();
        if !file_id_pattern().is_match(&file_id) {
            debug!(file_id = %file_id, "Ignoring malformed file id");
            return None;
        }
        Some(ArtifactRef {
            file_id,
            sandbox_id: None,
            source: ArtifactSource::Fallback,
        })
    }
}

/// Ordered chain of matchers.
pub struct ArtifactExtractor {
    matchers: Vec<Box<dyn ArtifactMatcher>>,
}

impl ArtifactExtractor {
    pub fn new(matchers: Vec<Box<dyn ArtifactMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn standard(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self::new(vec![
            Box::new(CitationMatcher),
            Box::new(ToolOutputMatcher),
            Box::new(LlmFallbackMatcher::new(llm, timeout)),
        ])
    }

    pub async fn extract(&self, response: &LlmResponse) -> Option<ArtifactRef> {
        for matcher in &self.matchers {
            if let Some(found) = matcher.find(response).await {
                debug!(matcher = matcher.name(), file_id = %found.file_id, "Artifact located");
                return Some(found);
            }
        }
        None
    }
}
