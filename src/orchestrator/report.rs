//! HTML report rendering.

use handlebars::{handlebars_helper, Handlebars};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::stage::UnitOutcome;
use crate::database::entities::analysis_unit_results;
use crate::errors::AnalysisResult;

const REPORT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{title}}</title>
<style>
body { font-family: sans-serif; max-width: 960px; margin: 2rem auto; line-height: 1.5; }
pre { background: #f5f5f5; padding: 1rem; overflow-x: auto; }
img { max-width: 100%; }
</style>
</head>
<body>
<h1>{{title}}</h1>
<p>Dataset: {{file_name}} &middot; Generated {{generated_at}}</p>
<h2>Executive summary</h2>
<div class="summary">{{summary}}</div>
{{#if units}}<h2>Contents</h2>
<ul>
{{#each units}}<li><a href="#{{anchor}}">{{name}}</a></li>
{{/each}}</ul>
{{/if}}{{#each units}}<section id="{{anchor}}">
<h2>{{name}}</h2>
{{#if (exists chart_url)}}<img src="{{chart_url}}" alt="{{name}}">
{{/if}}<h3>Analysis</h3>
<div>{{business_analysis}}</div>
{{#if (exists analysis_steps)}}<h3>Steps</h3>
<pre>{{analysis_steps}}</pre>
{{/if}}{{#if (exists code)}}<h3>Code</h3>
<pre><code>{{code}}</code></pre>
{{/if}}{{#if (exists code_explanation)}}<p>{{code_explanation}}</p>
{{/if}}</section>
{{/each}}</body>
</html>
"##;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportUnit {
    pub name: String,
    /// Section id, unique within the report.
    pub anchor: String,
    pub business_analysis: String,
    pub code: Option<String>,
    pub code_explanation: Option<String>,
    pub chart_url: Option<String>,
    pub analysis_steps: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportContext {
    pub title: String,
    pub file_name: String,
    pub generated_at: String,
    pub summary: String,
    pub units: Vec<ReportUnit>,
}

pub fn get_handlebars() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    handlebars_helper!(exists: |v: Value| {
        match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        }
    });
    handlebars.register_helper("exists", Box::new(exists));

    handlebars
}

/// Section id for the unit at `position` in the unit list. The position keeps ids
/// distinct for names that only differ in case or punctuation.
pub fn section_anchor(position: usize, name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("unit-{}-{}", position + 1, slug)
}

/// Picks the units that belong in the report: units marked `Done`, in list order, each
/// with its most recent result.
pub fn report_units(
    units: &[String],
    outcomes: &IndexMap<String, UnitOutcome>,
    results: &[analysis_unit_results::Model],
) -> Vec<ReportUnit> {
    units
        .iter()
        .enumerate()
        .filter(|(_, unit)| outcomes.get(*unit) == Some(&UnitOutcome::Done))
        .filter_map(|(position, unit)| {
            results
                .iter()
                .filter(|result| &result.unit_name == unit)
                .max_by_key(|result| (result.created_at, result.id))
                .map(|result| (position, result))
        })
        .map(|(position, result)| ReportUnit {
            name: result.unit_name.clone(),
            anchor: section_anchor(position, &result.unit_name),
            business_analysis: result.business_analysis.clone(),
            code: result.code.clone(),
            code_explanation: result.code_explanation.clone(),
            chart_url: result.chart_url.clone(),
            analysis_steps: result.analysis_steps.clone(),
        })
        .collect()
}

pub fn render_report(context: &ReportContext) -> AnalysisResult<String> {
    Ok(get_handlebars().render_template(REPORT_TEMPLATE, context)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn result(id: i32, unit: &str, analysis: &str) -> analysis_unit_results::Model {
        let now = Utc::now() + Duration::seconds(id as i64);
        analysis_unit_results::Model {
            id,
            run_id: 1,
            unit_name: unit.to_string(),
            business_analysis: analysis.to_string(),
            code: Some("print(1 < 2)".to_string()),
            code_explanation: None,
            chart_url: Some("memory://charts/a.png".to_string()),
            analysis_steps: "1. load".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_done_units_with_latest_result() {
        let units = vec!["Sales".to_string(), "Churn".to_string(), "Margin".to_string()];
        let outcomes: IndexMap<String, UnitOutcome> = [
            ("Sales".to_string(), UnitOutcome::Done),
            ("Churn".to_string(), UnitOutcome::Failed),
            ("Margin".to_string(), UnitOutcome::Done),
        ]
        .into_iter()
        .collect();
        let results = vec![
            result(1, "Margin", "old margin"),
            result(2, "Sales", "sales"),
            result(3, "Churn", "churn"),
            result(4, "Margin", "new margin"),
        ];

        let selected = report_units(&units, &outcomes, &results);

        let names: Vec<&str> = selected.iter().map(|unit| unit.name.as_str()).collect();
        assert_eq!(names, vec!["Sales", "Margin"]);
        assert_eq!(selected[1].business_analysis, "new margin");
    }

    #[test]
    fn report_escapes_content_and_links_sections() {
        let context = ReportContext {
            title: "Deep analysis".to_string(),
            file_name: "sales.csv".to_string(),
            generated_at: "2024-01-01".to_string(),
            summary: "Revenue grew <fast>".to_string(),
            units: vec![ReportUnit {
                name: "Sales by Region".to_string(),
                anchor: section_anchor(0, "Sales by Region"),
                business_analysis: "North leads".to_string(),
                code: Some("x < 1".to_string()),
                code_explanation: None,
                chart_url: None,
                analysis_steps: String::new(),
            }],
        };

        let html = render_report(&context).unwrap();

        assert!(html.contains("Revenue grew &lt;fast&gt;"));
        assert!(html.contains(r#"<section id="unit-1-sales-by-region">"#));
        assert!(html.contains("x &lt; 1"));
        assert!(!html.contains("<img"));
        assert!(!html.contains("<h3>Steps</h3>"));
    }

    #[test]
    fn similar_unit_names_get_distinct_sections() {
        let units = vec![
            "Sales by Region".to_string(),
            "Sales by region".to_string(),
            "Sales-by-Region".to_string(),
        ];
        let outcomes: IndexMap<String, UnitOutcome> =
            units.iter().map(|unit| (unit.clone(), UnitOutcome::Done)).collect();
        let results: Vec<_> = units
            .iter()
            .enumerate()
            .map(|(i, unit)| result(i as i32 + 1, unit, "analysis"))
            .collect();

        let selected = report_units(&units, &outcomes, &results);
        let anchors: std::collections::HashSet<&str> = selected.iter().map(|unit| unit.anchor.as_str()).collect();
        assert_eq!(anchors.len(), 3);

        let html = render_report(&ReportContext {
            title: "Deep analysis".to_string(),
            file_name: "sales.csv".to_string(),
            generated_at: "2024-01-01".to_string(),
            summary: "ok".to_string(),
            units: selected,
        })
        .unwrap();
        assert!(html.contains(r##"<a href="#unit-1-sales-by-region">"##));
        assert!(html.contains(r#"<section id="unit-3-sales-by-region">"#));
    }
}
