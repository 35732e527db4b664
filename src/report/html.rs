//! The analysis report document

use std::path::Path;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use super::insights::{insights_html, parse_insights};
use super::{display_value, esc, relative_to};
use crate::agent::{AgentKind, AgentReport, ChartArtifact};
use crate::config::Variant;

/// Score shown when the anomaly result has no issue count
pub const DEFAULT_QUALITY_SCORE: i64 = 85;
const MIN_QUALITY_SCORE: i64 = 50;
const OUTLIER_ROWS: usize = 20;
const RAW_EXCERPT_CHARS: usize = 2000;
const OUTLIER_COLUMNS: [&str; 5] = ["row", "column", "value", "reason", "z_score"];

/// Everything the report is rendered from
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    /// Coordinator prose
    pub insights: &'a str,
    pub stats: &'a AgentReport,
    pub viz: &'a AgentReport,
    pub anomalies: &'a AgentReport,
    /// Dataset name shown in the header
    pub dataset: &'a str,
    pub variant: Variant,
    pub generated_at: DateTime<Local>,
    /// Directory the report is written to; chart paths are made relative to it
    pub base_dir: &'a Path,
}

/// Data-quality score: `max(50, 100 - 5 * total_issues)`, 85 without a count
pub fn quality_score(anomalies: &AgentReport) -> i64 {
    match anomalies.get("total_issues").and_then(issue_count) {
        Some(issues) => 100i64.saturating_sub(issues.saturating_mul(5)).max(MIN_QUALITY_SCORE),
        None => DEFAULT_QUALITY_SCORE,
    }
}

fn issue_count(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

/// Render the full report
pub fn render_report(input: &ReportInput<'_>) -> String {
    let mut body = String::new();
    body.push_str(&header(input));
    body.push_str(&error_notices(input));
    body.push_str("<div class=\"kpi-dashboard\">\n");
    body.push_str(&kpi_cards(input));
    body.push_str("</div>\n");

    body.push_str(&section(
        "Executive Insights",
        &insights_html(&parse_insights(input.insights)),
    ));
    body.push_str(&section(
        "Data Visualizations",
        &charts_gallery(input.viz, input.base_dir),
    ));
    body.push_str(&section("Detailed Analysis", &statistics_panel(input.stats)));
    body.push_str(&section(
        "Data Quality Assessment",
        &anomalies_panel(input.anomalies),
    ));

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Data Intelligence Report - {}</title>\n<style>{}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n{}\
         <div class=\"footer\"><p>Generated by the datasquad multi-agent pipeline</p></div>\n\
         </div>\n</body>\n</html>\n",
        esc(input.dataset),
        REPORT_CSS,
        body
    )
}

fn section(title: &str, content: &str) -> String {
    format!(
        "<div class=\"section\">\n<h2>{}</h2>\n{}</div>\n",
        esc(title),
        content
    )
}

fn header(input: &ReportInput<'_>) -> String {
    format!(
        "<div class=\"header\">\n<h1>Data Intelligence Report</h1>\n<div class=\"meta\">\n\
         <p>Dataset: {}</p>\n<p>{}</p>\n</div>\n<div class=\"badges\">\n\
         <span class=\"badge\">3 Agents</span>\n\
         <span class=\"badge\">{} Visualizations</span>\n\
         <span class=\"badge\">{} variant</span>\n</div>\n</div>\n",
        esc(input.dataset),
        esc(&input.generated_at.format("%B %d, %Y at %I:%M %p").to_string()),
        input.viz.chart_count(),
        esc(input.variant.as_str()),
    )
}

fn failed_agents<'a>(input: &ReportInput<'a>) -> Vec<(AgentKind, &'a str)> {
    [
        (AgentKind::Statistical, input.stats),
        (AgentKind::Visualization, input.viz),
        (AgentKind::Anomaly, input.anomalies),
    ]
    .into_iter()
    .filter_map(|(kind, report)| report.error().map(|e| (kind, e)))
    .collect()
}

fn error_notices(input: &ReportInput<'_>) -> String {
    let failed = failed_agents(input);
    if failed.is_empty() {
        return String::new();
    }
    let mut html = String::from("<div class=\"notice error\">\n<h4>Some agents reported errors</h4>\n<ul>\n");
    for (kind, message) in failed {
        html.push_str(&format!(
            "<li><strong>{}</strong>: {}</li>\n",
            esc(kind.as_str()),
            esc(message)
        ));
    }
    html.push_str("</ul>\n</div>\n");
    html
}

fn kpi_cards(input: &ReportInput<'_>) -> String {
    let failed = failed_agents(input).len();
    let issues = input
        .anomalies
        .get("total_issues")
        .and_then(issue_count)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "–".to_string());
    let status = if failed == 0 { "✓ Complete" } else { "⚠ Partial" };

    let cards = [
        ("Data Issues", issues, "Detected"),
        ("Analysis Status", status.to_string(), "3 agents run"),
        ("Charts", input.viz.chart_count().to_string(), "Generated"),
        ("Agent Errors", failed.to_string(), "Agents with errors"),
    ];

    let mut html = String::new();
    for (label, value, subtitle) in cards {
        html.push_str(&format!(
            "<div class=\"kpi-card\"><div class=\"kpi-label\">{}</div>\
             <div class=\"kpi-value\">{}</div><div class=\"kpi-subtitle\">{}</div></div>\n",
            esc(label),
            esc(&value),
            esc(subtitle)
        ));
    }
    html
}

fn charts_gallery(viz: &AgentReport, base_dir: &Path) -> String {
    let charts = viz.chart_artifacts();
    if charts.is_empty() {
        return "<p class=\"muted\">No charts were produced.</p>\n".to_string();
    }

    let mut html = String::from("<div class=\"charts-container\">\n");
    for (i, chart) in charts.iter().enumerate() {
        let src = match chart {
            ChartArtifact::File(path) => relative_to(path, base_dir),
            ChartArtifact::Embedded { png } => format!("data:image/png;base64,{}", png),
        };
        html.push_str(&format!(
            "<div class=\"chart-card\"><div class=\"chart-title\">Visualization {n}</div>\
             <img src=\"{}\" alt=\"Chart {n}\" class=\"chart-image\"></div>\n",
            esc(&src),
            n = i + 1
        ));
    }
    html.push_str("</div>\n");
    html
}

fn statistics_panel(stats: &AgentReport) -> String {
    let mut html = String::new();

    let summary = ["summary_statistics", "summary_stats"]
        .into_iter()
        .filter_map(|key| stats.get(key).and_then(Value::as_object))
        .find(|m| !m.is_empty());
    if let Some(summary) = summary {
        html.push_str("<h3>Summary Statistics</h3>\n");
        html.push_str(&summary_table(summary));
    }

    if let Some(correlations) = stats.get("correlations").filter(|v| !is_empty_collection(v)) {
        html.push_str("<h3>Correlations</h3>\n<ul class=\"correlations\">\n");
        for item in list_items(correlations) {
            html.push_str(&format!("<li>{}</li>\n", esc(&item)));
        }
        html.push_str("</ul>\n");
    }

    if let Some(raw) = stats.get("raw_output").and_then(Value::as_str) {
        let excerpt: String = raw.chars().take(RAW_EXCERPT_CHARS).collect();
        html.push_str("<h3>Program Output</h3>\n");
        html.push_str(&format!("<pre class=\"raw-output\">{}</pre>\n", esc(&excerpt)));
    }

    html.push_str(&interpretation(stats));

    if html.is_empty() {
        html.push_str("<p class=\"muted\">No statistics available.</p>\n");
    }
    html
}

/// Column-by-statistic table; non-object entries become single-value rows
fn summary_table(summary: &Map<String, Value>) -> String {
    let mut stat_names: Vec<&str> = Vec::new();
    for value in summary.values() {
        if let Some(stats) = value.as_object() {
            for name in stats.keys() {
                if !stat_names.contains(&name.as_str()) {
                    stat_names.push(name);
                }
            }
        }
    }
    if stat_names.is_empty() {
        stat_names.push("value");
    }

    let mut html = String::from("<table class=\"stats-table\">\n<tr><th>Column</th>");
    for name in &stat_names {
        html.push_str(&format!("<th>{}</th>", esc(name)));
    }
    html.push_str("</tr>\n");

    for (column, value) in summary {
        html.push_str(&format!("<tr><td>{}</td>", esc(column)));
        for name in &stat_names {
            let cell = match value.as_object() {
                Some(stats) => stats.get(*name).map(display_value).unwrap_or_default(),
                None if *name == stat_names[0] => display_value(value),
                None => String::new(),
            };
            html.push_str(&format!("<td>{}</td>", esc(&cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

fn anomalies_panel(anomalies: &AgentReport) -> String {
    let score = quality_score(anomalies);
    let mut html = format!(
        "<div class=\"quality-score\"><div class=\"score-circle\">{}%</div>\
         <div><div class=\"score-quality\">Data Quality Score</div>\
         <p>Based on detected anomalies and data validation checks</p></div></div>\n",
        score
    );

    if let Some(severity) = anomalies.get("severity").and_then(Value::as_str) {
        let class = match severity.to_ascii_lowercase().as_str() {
            "high" => "high",
            "medium" => "medium",
            _ => "low",
        };
        html.push_str(&format!(
            "<p>Severity: <span class=\"importance {}\">{}</span></p>\n",
            class,
            esc(severity)
        ));
    }

    if let Some(issues) = anomalies.get("total_issues").and_then(issue_count).filter(|n| *n > 0) {
        html.push_str(&format!(
            "<div class=\"finding-card\"><span class=\"importance high\">⚠ Attention Required</span>\
             <h4>Issues Found</h4><p>Total anomalies detected: <strong>{}</strong></p></div>\n",
            issues
        ));
    }

    if let Some(quality) = anomalies.get("data_quality").and_then(Value::as_object) {
        html.push_str(&data_quality_list(quality));
    }

    if let Some(outliers) = anomalies.get("outliers").and_then(Value::as_array) {
        if !outliers.is_empty() {
            html.push_str(&outlier_table(outliers));
        }
    }

    html.push_str(&interpretation(anomalies));
    html
}

fn data_quality_list(quality: &Map<String, Value>) -> String {
    if quality.is_empty() {
        return String::new();
    }
    let mut html = String::from("<h3>Data Quality Checks</h3>\n<ul class=\"quality\">\n");
    for (key, value) in quality {
        let label = key.replace('_', " ");
        let detail = if is_empty_collection(value) {
            "none".to_string()
        } else {
            list_items(value).join("; ")
        };
        html.push_str(&format!(
            "<li><strong>{}</strong>: {}</li>\n",
            esc(&label),
            esc(&detail)
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn outlier_table(outliers: &[Value]) -> String {
    let mut html = format!(
        "<h3>Outliers (showing {} of {})</h3>\n<table class=\"outliers\">\n<tr>",
        outliers.len().min(OUTLIER_ROWS),
        outliers.len()
    );
    for column in OUTLIER_COLUMNS {
        html.push_str(&format!("<th>{}</th>", column));
    }
    html.push_str("</tr>\n");

    for outlier in outliers.iter().take(OUTLIER_ROWS) {
        html.push_str("<tr>");
        for column in OUTLIER_COLUMNS {
            let cell = match outlier {
                Value::Object(map) => map.get(column).map(display_value).unwrap_or_default(),
                other if column == "value" => display_value(other),
                _ => String::new(),
            };
            html.push_str(&format!("<td>{}</td>", esc(&cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

fn interpretation(report: &AgentReport) -> String {
    match report.get("interpretation").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => {
            let mut html = String::from("<div class=\"interpretation\">\n<h3>Interpretation</h3>\n");
            for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                html.push_str(&format!("<p>{}</p>\n", esc(para)));
            }
            html.push_str("</div>\n");
            html
        }
        _ => String::new(),
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// One line per entry: arrays by element, objects as `key: value`
fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(flatten).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, flatten(v)))
            .collect(),
        other => vec![display_value(other)],
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, display_value(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => display_value(other),
    }
}

const REPORT_CSS: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
       background: #f4f6fb; color: #1f2430; line-height: 1.6; }
.container { max-width: 1200px; margin: 0 auto; padding: 32px 20px; }
.header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white;
          border-radius: 16px; padding: 36px; margin-bottom: 24px; }
.header h1 { font-size: 2.2em; margin-bottom: 8px; }
.header .meta p { opacity: 0.9; }
.badges { margin-top: 16px; }
.badge { display: inline-block; background: rgba(255,255,255,0.2); border-radius: 999px;
         padding: 4px 14px; margin-right: 8px; font-size: 0.9em; }
.kpi-dashboard { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
                 gap: 16px; margin-bottom: 24px; }
.kpi-card { background: white; border-radius: 12px; padding: 20px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.06); }
.kpi-label { color: #6b7280; font-size: 0.85em; text-transform: uppercase; }
.kpi-value { font-size: 2em; font-weight: 700; color: #4c51bf; }
.kpi-subtitle { color: #9ca3af; font-size: 0.85em; }
.section { background: white; border-radius: 12px; padding: 28px; margin-bottom: 24px;
           box-shadow: 0 2px 8px rgba(0,0,0,0.06); }
.section h2 { margin-bottom: 16px; color: #2d3748; }
.section h3 { margin: 18px 0 8px; color: #4a5568; }
details.insight { border: 1px solid #e2e8f0; border-radius: 8px; margin-bottom: 10px; }
details.insight summary { cursor: pointer; padding: 12px 16px; font-weight: 600; background: #f7fafc; }
details.insight .content { padding: 12px 16px; }
.finding-card { border-left: 4px solid #667eea; background: #f8f9ff; padding: 10px 14px;
                margin: 8px 0; border-radius: 4px; }
.charts-container { display: grid; grid-template-columns: repeat(auto-fit, minmax(480px, 1fr)); gap: 20px; }
.chart-card { border: 1px solid #e2e8f0; border-radius: 8px; padding: 12px; }
.chart-title { font-weight: 600; margin-bottom: 8px; }
.chart-image { width: 100%; height: auto; }
table { border-collapse: collapse; width: 100%; font-size: 0.9em; margin-bottom: 12px; }
th, td { border-bottom: 1px solid #e2e8f0; padding: 6px 10px; text-align: left; }
th { background: #f7fafc; }
.quality-score { display: flex; align-items: center; gap: 20px; margin-bottom: 16px; }
.score-circle { width: 96px; height: 96px; border-radius: 50%; background: #667eea; color: white;
                display: flex; align-items: center; justify-content: center; font-size: 1.6em; font-weight: 700; }
.score-quality { font-weight: 600; }
.importance { border-radius: 4px; padding: 2px 8px; font-size: 0.8em; color: white; }
.importance.high { background: #e53e3e; }
.importance.medium { background: #dd6b20; }
.importance.low { background: #38a169; }
.notice.error { background: #fff5f5; border: 1px solid #feb2b2; border-radius: 8px;
                padding: 14px 18px; margin-bottom: 24px; }
.raw-output { background: #1a202c; color: #e2e8f0; padding: 12px; border-radius: 6px;
              overflow-x: auto; font-size: 0.85em; white-space: pre-wrap; }
.muted { color: #9ca3af; }
.footer { text-align: center; color: #9ca3af; font-size: 0.85em; margin-top: 24px; }
"#;
