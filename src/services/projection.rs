//! Read-only views of a run for pollers.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::database::entities::{analysis_runs, analysis_unit_results};
use crate::orchestrator::stage::UnitOutcome;

/// Poll-able progress of a run. Fields a run has not reached yet are omitted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunProjection {
    pub session_id: String,
    pub run_id: i32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpi_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpi_status: Option<IndexMap<String, UnitOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&analysis_runs::Model> for RunProjection {
    fn from(run: &analysis_runs::Model) -> Self {
        Self {
            session_id: run.session_id.clone(),
            run_id: run.id,
            status: run.stage().to_string(),
            kpi_list: run.units(),
            kpi_status: run.unit_outcomes(),
            report_url: run.report_url.clone(),
            error: run.error.clone(),
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

/// Full data of a run, including per-unit results and errors.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResults {
    #[serde(flatten)]
    pub progress: RunProjection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub unit_errors: IndexMap<String, String>,
    pub results: Vec<analysis_unit_results::Model>,
}

impl RunResults {
    pub fn new(run: &analysis_runs::Model, results: Vec<analysis_unit_results::Model>) -> Self {
        Self {
            progress: RunProjection::from(run),
            summary: run.summary.clone(),
            unit_errors: run.unit_error_map(),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run() -> analysis_runs::Model {
        let now = Utc::now();
        analysis_runs::Model {
            id: 3,
            session_id: "s".to_string(),
            owner_id: "u".to_string(),
            status: "UnitsProposed".to_string(),
            blob_url: "memory://a.csv".to_string(),
            sandbox_id: Some("cntr".to_string()),
            file_path: Some("/mnt/data/a.csv".to_string()),
            unit_list: Some(r#"["Sales","Churn"]"#.to_string()),
            unit_status: Some(r#"{"Sales":1,"Churn":0}"#.to_string()),
            unit_errors: Some("{}".to_string()),
            summary: None,
            report_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unreached_fields_are_absent() {
        let value = serde_json::to_value(RunProjection::from(&run())).unwrap();
        assert_eq!(value["status"], "UnitsProposed");
        assert_eq!(value["kpi_list"], json!(["Sales", "Churn"]));
        assert_eq!(value["kpi_status"], json!({"Sales": 1, "Churn": 0}));
        assert!(value.get("report_url").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("sandbox_id").is_none());
    }

    #[test]
    fn kpi_status_keeps_list_order() {
        let text = serde_json::to_string(&RunProjection::from(&run())).unwrap();
        let sales = text.find("\"Sales\":1").unwrap();
        let churn = text.find("\"Churn\":0").unwrap();
        assert!(sales < churn);
    }
}
