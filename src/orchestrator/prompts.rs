//! Prompt text for each LLM call of a run.

use crate::database::entities::{analysis_unit_results, upload_sessions};

pub const UNIT_PROPOSAL_INSTRUCTIONS: &str = "\
You are a senior data analytics manager deciding which KPIs to analyse first.
Examine the column names, the sample values and the likely meaning of each column.
Choose KPIs that are specific, measurable and directly supported by the columns present.
Prefer metrics that lead to business decisions. For high-cardinality columns phrase the KPI
as a top 5 or bottom 5 ranking or as a distribution.
Return the KPI names only, most important first.";

pub const UNIT_ANALYSIS_INSTRUCTIONS: &str = "\
You are a data analyst working in a Python sandbox that already contains the dataset.
Load the file with pandas, compute the requested KPI and save exactly one chart as a PNG.
Explain what the numbers mean for the business in plain language.";

pub const DISTILL_INSTRUCTIONS: &str = "\
You turn an analyst's working notes into a structured record. Keep the business analysis
concise, copy the final code verbatim, explain the code briefly and list the analysis steps
as a numbered list.";

pub const SUMMARY_INSTRUCTIONS: &str = "\
You are writing the executive summary of a data analysis report for business stakeholders.
Summarise the key findings across all KPIs, call out risks and opportunities and finish with
three concrete recommendations.";

pub fn unit_proposal_prompt(session: &upload_sessions::Model, max_units: usize) -> String {
    let preview = serde_json::to_string_pretty(&session.preview_rows()).unwrap_or_default();
    format!(
        "Propose at most {max_units} KPIs for this dataset.\n\n\
         File: {file}\n\
         Columns ({count}): {columns}\n\
         Sample rows:\n{preview}",
        max_units = max_units,
        file = session.original_filename,
        count = session.total_columns,
        columns = session.column_names().join(", "),
        preview = preview,
    )
}

pub fn unit_analysis_prompt(unit: &str, file_path: &str) -> String {
    format!(
        "KPI: {unit}\n\
         Dataset path in the sandbox: {file_path}\n\n\
         Compute this KPI, create a chart that visualises it and save the chart as a PNG file. \
         Report the key figures and what they mean.",
    )
}

pub fn distill_prompt(unit: &str, analysis: &str) -> String {
    format!(
        "KPI: {unit}\n\n\
         Analyst output:\n{analysis}\n\n\
         Produce the business analysis, the code that was used, an explanation of that code and \
         the analysis steps. If a chart is attached, describe what it shows in the business analysis.",
    )
}

pub fn summary_prompt(results: &[analysis_unit_results::Model]) -> String {
    let mut prompt = String::from("KPI analyses:\n");
    for result in results {
        prompt.push_str(&format!("\n## {}\n{}\n", result.unit_name, result.business_analysis));
    }
    prompt
}

pub fn file_id_prompt(raw_response: &str) -> String {
    format!(
        "Look for the id of a generated file in this response. File ids start with \"cfile_\" or \
         \"file-\" followed by letters and digits. Return only the id, or null when there is none.\n\n\
         Response: {raw_response}",
    )
}
