//! Structured output shapes requested from the LLM.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub trait OutputSchema {
    const NAME: &'static str;

    fn json_schema() -> Value;
}

fn object_of_strings(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|field| (field.to_string(), json!({ "type": "string" })))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": fields,
        "additionalProperties": false
    })
}

/// Proposed analysis units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitList {
    pub kpi_list: Vec<String>,
}

impl OutputSchema for UnitList {
    const NAME: &'static str = "kpi_list";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "kpi_list": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["kpi_list"],
            "additionalProperties": false
        })
    }
}

/// Distilled record of one unit's analysis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitAnalysis {
    pub business_analysis: String,
    pub code: String,
    pub code_explanation: String,
    pub analysis_steps: String,
}

impl OutputSchema for UnitAnalysis {
    const NAME: &'static str = "kpi_analysis";

    fn json_schema() -> Value {
        object_of_strings(&["business_analysis", "code", "code_explanation", "analysis_steps"])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdResponse {
    pub file_id: Option<String>,
}

impl OutputSchema for FileIdResponse {
    const NAME: &'static str = "file_id";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_id": { "type": ["string", "null"] }
            },
            "required": ["file_id"],
            "additionalProperties": false
        })
    }
}
