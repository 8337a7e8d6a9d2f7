use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const KIB: usize = 1024;
pub const MIB: usize = 1024 * KIB;

/// Hard upper bound on preview rows regardless of configuration.
pub const MAX_PREVIEW_ROWS: usize = 5;

const MIN_UNITS: usize = 3;
const MAX_UNITS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectStoreBackend {
    Azure {
        container_url: String,
        sas_token: Option<String>,
    },
    Local {
        root: PathBuf,
    },
    Memory,
}

/// Buffering granularities and limits of the streaming uploader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
    pub read_chunk_bytes: usize,
    pub write_block_bytes: usize,
    pub preview_rows: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 30 * MIB,
            read_chunk_bytes: 64 * KIB,
            write_block_bytes: 4 * MIB,
            preview_rows: MAX_PREVIEW_ROWS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub analysis_model: String,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub max_units: usize,
    pub sandbox_name: String,
    pub queue_capacity: usize,
}

/// Service configuration loaded from environment variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub upload: UploadLimits,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    pub object_store: ObjectStoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_map(&HashMap::new())
    }
}

impl Config {
    pub fn from_env() -> Self {
        let values: HashMap<String, String> = Self::tracked_keys()
            .into_iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_map(&values)
    }

    /// Builds a configuration from explicit values. Missing or empty keys fall back to
    /// defaults; unparsable numbers are ignored rather than rejected.
    pub fn from_map(values: &HashMap<String, String>) -> Self {
        fn value(values: &HashMap<String, String>, key: &str) -> Option<String> {
            values
                .get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }

        fn number(values: &HashMap<String, String>, key: &str, default: usize) -> usize {
            value(values, key)
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|parsed| *parsed > 0)
                .unwrap_or(default)
        }

        let defaults = UploadLimits::default();
        let upload = UploadLimits {
            max_upload_bytes: number(values, "DEEP_ANALYSIS_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
            read_chunk_bytes: number(values, "DEEP_ANALYSIS_READ_CHUNK_BYTES", defaults.read_chunk_bytes),
            write_block_bytes: number(values, "DEEP_ANALYSIS_WRITE_BLOCK_BYTES", defaults.write_block_bytes),
            preview_rows: number(values, "DEEP_ANALYSIS_PREVIEW_ROWS", defaults.preview_rows)
                .min(MAX_PREVIEW_ROWS),
        };

        let model = value(values, "DEEP_ANALYSIS_LLM_MODEL").unwrap_or_else(|| "gpt-4.1-mini".to_string());
        let llm = LlmConfig {
            api_key: value(values, "DEEP_ANALYSIS_OPENAI_API_KEY")
                .or_else(|| value(values, "OPENAI_API_KEY")),
            base_url: value(values, "OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            analysis_model: value(values, "DEEP_ANALYSIS_LLM_ANALYSIS_MODEL").unwrap_or_else(|| model.clone()),
            model,
            request_timeout: Duration::from_secs(number(values, "DEEP_ANALYSIS_LLM_TIMEOUT_SECS", 300) as u64),
        };

        let analysis = AnalysisConfig {
            max_units: number(values, "DEEP_ANALYSIS_MAX_UNITS", 5).clamp(MIN_UNITS, MAX_UNITS),
            sandbox_name: value(values, "DEEP_ANALYSIS_SANDBOX_NAME")
                .unwrap_or_else(|| "deep-analysis".to_string()),
            queue_capacity: number(values, "DEEP_ANALYSIS_WORKER_QUEUE_CAPACITY", 64),
        };

        let object_store = match value(values, "DEEP_ANALYSIS_OBJECT_STORE")
            .map(|raw| raw.to_lowercase())
            .as_deref()
        {
            Some("azure") => ObjectStoreBackend::Azure {
                container_url: value(values, "DEEP_ANALYSIS_AZURE_CONTAINER_URL").unwrap_or_default(),
                sas_token: value(values, "DEEP_ANALYSIS_AZURE_SAS_TOKEN"),
            },
            Some("memory") => ObjectStoreBackend::Memory,
            _ => ObjectStoreBackend::Local {
                root: value(values, "DEEP_ANALYSIS_LOCAL_STORE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("objects")),
            },
        };

        Self {
            upload,
            llm,
            analysis,
            object_store,
        }
    }

    fn tracked_keys() -> Vec<&'static str> {
        vec![
            "DEEP_ANALYSIS_MAX_UPLOAD_BYTES",
            "DEEP_ANALYSIS_READ_CHUNK_BYTES",
            "DEEP_ANALYSIS_WRITE_BLOCK_BYTES",
            "DEEP_ANALYSIS_PREVIEW_ROWS",
            "DEEP_ANALYSIS_LLM_MODEL",
            "DEEP_ANALYSIS_LLM_ANALYSIS_MODEL",
            "DEEP_ANALYSIS_LLM_TIMEOUT_SECS",
            "DEEP_ANALYSIS_OPENAI_API_KEY",
            "OPENAI_API_KEY",
            "OPENAI_BASE_URL",
            "DEEP_ANALYSIS_MAX_UNITS",
            "DEEP_ANALYSIS_SANDBOX_NAME",
            "DEEP_ANALYSIS_WORKER_QUEUE_CAPACITY",
            "DEEP_ANALYSIS_OBJECT_STORE",
            "DEEP_ANALYSIS_AZURE_CONTAINER_URL",
            "DEEP_ANALYSIS_AZURE_SAS_TOKEN",
            "DEEP_ANALYSIS_LOCAL_STORE_DIR",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_documented_limits() {
        let config = Config::from_map(&HashMap::new());
        assert_eq!(config.upload.max_upload_bytes, 30 * MIB);
        assert_eq!(config.upload.read_chunk_bytes, 64 * KIB);
        assert_eq!(config.upload.write_block_bytes, 4 * MIB);
        assert_eq!(config.upload.preview_rows, 5);
        assert_eq!(config.analysis.max_units, 5);
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.llm.analysis_model, "gpt-4.1-mini");
        assert_eq!(config.llm.request_timeout, Duration::from_secs(300));
        assert!(matches!(config.object_store, ObjectStoreBackend::Local { .. }));
    }

    #[test]
    fn preview_rows_and_units_are_clamped() {
        let config = Config::from_map(&map(&[
            ("DEEP_ANALYSIS_PREVIEW_ROWS", "50"),
            ("DEEP_ANALYSIS_MAX_UNITS", "40"),
        ]));
        assert_eq!(config.upload.preview_rows, MAX_PREVIEW_ROWS);
        assert_eq!(config.analysis.max_units, 10);

        let config = Config::from_map(&map(&[("DEEP_ANALYSIS_MAX_UNITS", "1")]));
        assert_eq!(config.analysis.max_units, 3);
    }

    #[test]
    fn garbage_numbers_fall_back_to_defaults() {
        let config = Config::from_map(&map(&[
            ("DEEP_ANALYSIS_MAX_UPLOAD_BYTES", "lots"),
            ("DEEP_ANALYSIS_WRITE_BLOCK_BYTES", "0"),
        ]));
        assert_eq!(config.upload.max_upload_bytes, 30 * MIB);
        assert_eq!(config.upload.write_block_bytes, 4 * MIB);
    }

    #[test]
    fn object_store_backend_selection() {
        let config = Config::from_map(&map(&[
            ("DEEP_ANALYSIS_OBJECT_STORE", "Azure"),
            ("DEEP_ANALYSIS_AZURE_CONTAINER_URL", "https://acct.blob.core.windows.net/data"),
            ("DEEP_ANALYSIS_AZURE_SAS_TOKEN", "sv=1&sig=abc"),
        ]));
        assert_eq!(
            config.object_store,
            ObjectStoreBackend::Azure {
                container_url: "https://acct.blob.core.windows.net/data".to_string(),
                sas_token: Some("sv=1&sig=abc".to_string()),
            }
        );

        let config = Config::from_map(&map(&[("DEEP_ANALYSIS_OBJECT_STORE", "memory")]));
        assert_eq!(config.object_store, ObjectStoreBackend::Memory);
    }

    #[test]
    fn api_key_prefers_prefixed_variable() {
        let config = Config::from_map(&map(&[
            ("OPENAI_API_KEY", "plain"),
            ("DEEP_ANALYSIS_OPENAI_API_KEY", "prefixed"),
        ]));
        assert_eq!(config.llm.api_key.as_deref(), Some("prefixed"));
    }
}
