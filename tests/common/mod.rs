#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use bytes::Bytes;
use deep_analysis::config::{Config, ObjectStoreBackend};
use deep_analysis::database::connection::setup_database;
use deep_analysis::database::entities::upload_sessions;
use deep_analysis::errors::{LlmError, SandboxError};
use deep_analysis::llm::{FileCitation, LlmClient, LlmRequest, LlmResponse, OutputItem, ToolOutput};
use deep_analysis::orchestrator::DefaultProgressReporter;
use deep_analysis::sandbox::{ExecutionSandbox, SandboxInfo};
use deep_analysis::server::app::create_app;
use deep_analysis::services::{AppServices, Collaborators, DbSessionStore, NewSession, SessionStore};
use deep_analysis::storage::MemoryObjectStore;
use sea_orm::{Database, DatabaseConnection};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

pub const USER: &str = "user-1";
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-chart";

/// Chart content the fake sandbox serves for `file_id`.
pub fn chart_bytes(file_id: &str) -> Vec<u8> {
    [PNG, file_id.as_bytes()].concat()
}

/// Unit name a prompt is about, taken from its leading `KPI:` line.
fn unit_of(request: &LlmRequest) -> String {
    request
        .prompt
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("KPI: "))
        .unwrap_or_default()
        .to_string()
}

/// LLM double that answers every call shape from a fixed script.
pub struct ScriptedLlm {
    pub units: Vec<String>,
    pub failing_units: Vec<String>,
    pub slow_units: Vec<String>,
    pub slow_delay: Duration,
    pub unit_delay: Duration,
    pub cite_charts: bool,
    pub requests: Mutex<Vec<(String, LlmRequest)>>,
}

impl ScriptedLlm {
    pub fn new(units: &[&str]) -> Self {
        Self {
            units: units.iter().map(|unit| unit.to_string()).collect(),
            failing_units: Vec::new(),
            slow_units: Vec::new(),
            slow_delay: Duration::ZERO,
            unit_delay: Duration::ZERO,
            cite_charts: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, unit: &str) -> Self {
        self.failing_units.push(unit.to_string());
        self
    }

    pub fn slow(mut self, unit: &str, delay: Duration) -> Self {
        self.slow_units.push(unit.to_string());
        self.slow_delay = delay;
        self
    }

    pub fn with_unit_delay(mut self, delay: Duration) -> Self {
        self.unit_delay = delay;
        self
    }

    pub fn without_citations(mut self) -> Self {
        self.cite_charts = false;
        self
    }

    pub fn recorded(&self, kind: &str) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, request)| request.clone())
            .collect()
    }

    fn record(&self, kind: &str, request: &LlmRequest) {
        self.requests.lock().unwrap().push((kind.to_string(), request.clone()));
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        if request.sandbox_id.is_none() {
            self.record("summary", &request);
            return Ok(LlmResponse {
                id: Some("resp_summary".to_string()),
                output: vec![OutputItem::Message {
                    text: "Executive summary: revenue is concentrated in the north.".to_string(),
                    citations: vec![],
                }],
            });
        }

        self.record("unit", &request);
        let unit = unit_of(&request);
        tokio::time::sleep(self.unit_delay).await;
        if self.slow_units.contains(&unit) {
            tokio::time::sleep(self.slow_delay).await;
        }
        if self.failing_units.contains(&unit) {
            return Err(LlmError::Status {
                status: 500,
                body: format!("tool run for {} crashed", unit),
            });
        }

        let file_id = format!("cfile_{}", unit.replace(' ', "_"));
        let citations = if self.cite_charts {
            vec![FileCitation {
                file_id: file_id.clone(),
                container_id: request.sandbox_id.clone(),
                filename: Some("chart.png".to_string()),
            }]
        } else {
            vec![]
        };
        Ok(LlmResponse {
            id: Some(format!("resp_{}", unit)),
            output: vec![
                OutputItem::ToolCall {
                    container_id: request.sandbox_id.clone(),
                    code: Some("df.groupby('region').amount.sum().plot()".to_string()),
                    outputs: vec![ToolOutput::Logs { logs: "ok".to_string() }],
                },
                OutputItem::Message {
                    text: format!("{} computed", unit),
                    citations,
                },
            ],
        })
    }

    async fn parse(&self, request: LlmRequest, schema_name: &str, _schema: Value) -> Result<Value, LlmError> {
        self.record(schema_name, &request);
        match schema_name {
            "kpi_list" => Ok(json!({ "kpi_list": self.units })),
            "kpi_analysis" => {
                let unit = unit_of(&request);
                Ok(json!({
                    "business_analysis": format!("{} analysis", unit),
                    "code": "df.groupby('region').amount.sum()",
                    "code_explanation": "Sums amount per region",
                    "analysis_steps": "1. Load\n2. Group\n3. Plot"
                }))
            }
            "file_id" => Ok(json!({ "file_id": null })),
            other => Err(LlmError::Schema {
                schema: other.to_string(),
                reason: "not scripted".to_string(),
            }),
        }
    }
}

/// Sandbox double. Starts with only an expired sandbox listed.
#[derive(Default)]
pub struct FakeSandbox {
    pub fail_uploads: bool,
    pub created: AtomicUsize,
    pub uploads: Mutex<Vec<(String, String, usize)>>,
}

impl FakeSandbox {
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ExecutionSandbox for FakeSandbox {
    async fn create(&self, name: &str) -> Result<SandboxInfo, SandboxError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SandboxInfo {
            id: "cntr_test".to_string(),
            name: Some(name.to_string()),
            status: "running".to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<SandboxInfo>, SandboxError> {
        let mut sandboxes = vec![SandboxInfo {
            id: "cntr_old".to_string(),
            name: None,
            status: "expired".to_string(),
        }];
        if self.created.load(Ordering::SeqCst) > 0 {
            sandboxes.push(SandboxInfo {
                id: "cntr_test".to_string(),
                name: None,
                status: "running".to_string(),
            });
        }
        Ok(sandboxes)
    }

    async fn upload_file(&self, sandbox_id: &str, file_name: &str, bytes: Bytes) -> Result<String, SandboxError> {
        if self.fail_uploads {
            return Err(SandboxError::Expired(sandbox_id.to_string()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((sandbox_id.to_string(), file_name.to_string(), bytes.len()));
        Ok(format!("/mnt/data/{}", file_name))
    }

    async fn download_file(&self, _sandbox_id: &str, file_id: &str) -> Result<Bytes, SandboxError> {
        Ok(Bytes::from(chart_bytes(file_id)))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::from_map(&HashMap::new());
    config.object_store = ObjectStoreBackend::Memory;
    config.llm.request_timeout = Duration::from_secs(5);
    config
}

pub fn csv_text(rows: usize) -> String {
    let regions = ["north", "south", "east"];
    let mut text = String::from("id,amount,region\n");
    for i in 0..rows {
        text.push_str(&format!("{},{}.25,{}\n", i + 1, (i + 1) * 100, regions[i % regions.len()]));
    }
    text
}

pub async fn test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());
    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;
    Ok((db, temp_file))
}

/// Stores `csv` in `store` and records a session for it, bypassing the uploader.
pub async fn seed_session(
    db: &DatabaseConnection,
    store: &MemoryObjectStore,
    session_id: &str,
    csv: &str,
) -> Result<upload_sessions::Model> {
    let key = format!("uploads/{}_seed.csv", session_id);
    let file_url = store.insert(&key, csv.to_string(), "text/csv");
    let sessions = DbSessionStore::new(db.clone());
    let session = sessions
        .insert_session(NewSession {
            session_id: session_id.to_string(),
            owner_id: USER.to_string(),
            original_filename: "sales.csv".to_string(),
            object_key: key,
            file_url,
            content_type: "text/csv".to_string(),
            file_size: csv.len() as i64,
            column_names: vec!["id".to_string(), "amount".to_string(), "region".to_string()],
            preview_rows: vec![],
        })
        .await?;
    Ok(session)
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<MemoryObjectStore>,
    pub llm: Arc<ScriptedLlm>,
    pub sandbox: Arc<FakeSandbox>,
    pub db: DatabaseConnection,
    _db_file: NamedTempFile,
}

pub async fn setup_app(llm: ScriptedLlm, sandbox: FakeSandbox, config: Config) -> Result<TestApp> {
    let (db, db_file) = test_db().await?;
    let store = Arc::new(MemoryObjectStore::new());
    let llm = Arc::new(llm);
    let sandbox = Arc::new(sandbox);

    let collaborators = Collaborators {
        object_store: store.clone(),
        llm: llm.clone(),
        sandbox: sandbox.clone(),
        reporter: Arc::new(DefaultProgressReporter),
    };
    let (services, _worker): (AppServices, _) = AppServices::start(db.clone(), &config, collaborators);
    let app = create_app(services, Some("*")).await?;
    let server = TestServer::new(app)?;

    Ok(TestApp {
        server,
        store,
        llm,
        sandbox,
        db,
        _db_file: db_file,
    })
}

pub fn user_header(user: &str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("x-user-id"), HeaderValue::from_str(user).unwrap())
}

const BOUNDARY: &str = "deep-analysis-test-boundary";

/// Hand-built `multipart/form-data` body with one file part.
pub fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> (String, Bytes) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), Bytes::from(body))
}

pub async fn upload(app: &TestApp, file_name: &str, content: &[u8]) -> axum_test::TestResponse {
    let (content_type, body) = multipart_body("file", file_name, content);
    let (name, value) = user_header(USER);
    app.server
        .post("/api/v1/uploads")
        .add_header(name, value)
        .content_type(&content_type)
        .bytes(body)
        .await
}

pub async fn status(app: &TestApp, session_id: &str) -> axum_test::TestResponse {
    let (name, value) = user_header(USER);
    app.server
        .get(&format!("/api/v1/analysis/status/{}", session_id))
        .add_header(name, value)
        .await
}

/// Polls the status endpoint until the run reaches `Complete` or `Failed`.
pub async fn wait_for_terminal(app: &TestApp, session_id: &str) -> Result<Value> {
    for _ in 0..500 {
        let response = status(app, session_id).await;
        if response.status_code().is_success() {
            let body: Value = response.json();
            if body["status"] == "Complete" || body["status"] == "Failed" {
                return Ok(body);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("run for session {} never finished", session_id)
}
