//! HTML rendering of the final report and the chart dashboard
//!
//! Rendering is a pure function of its inputs: the timestamp is passed in,
//! so the same results always produce the same document. Every piece of
//! interpolated text goes through [`esc`].

pub mod dashboard;
pub mod html;
pub mod insights;

use std::path::Path;

use serde_json::Value;

pub use dashboard::visualization_dashboard;
pub use html::{quality_score, render_report, ReportInput};
pub use insights::{insights_html, parse_insights, InsightLine, InsightSection};

/// HTML-escape text for element content and attribute values
pub fn esc(text: &str) -> String {
    askama_escape::escape(text, askama_escape::Html).to_string()
}

/// `path` as referenced from a document in `base_dir`
///
/// Paths under `base_dir` become relative; anything else is kept as given.
pub fn relative_to(path: &Path, base_dir: &Path) -> String {
    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compact cell rendering for loosely typed result values
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "–".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => format_float(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{:.0}", f);
    }
    let digits = if f.abs() >= 1000.0 { 1 } else { 4 };
    let s = format!("{:.*}", digits, f);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_relative_to() {
        let base = PathBuf::from("results");
        assert_eq!(relative_to(&base.join("chart_1.png"), &base), "chart_1.png");
        assert_eq!(
            relative_to(&PathBuf::from("results/charts/c.png"), &base),
            "charts/c.png"
        );
        assert_eq!(relative_to(&PathBuf::from("other/c.png"), &base), "other/c.png");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(2.5)), "2.5");
        assert_eq!(display_value(&json!(0.123456)), "0.1235");
        assert_eq!(display_value(&json!(12345.678)), "12345.7");
        assert_eq!(display_value(&json!(4.0)), "4");
        assert_eq!(display_value(&json!("north")), "north");
        assert_eq!(display_value(&json!(null)), "–");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_esc() {
        assert_eq!(esc("<b class=\"x\">&"), "&lt;b class=&quot;x&quot;&gt;&amp;");
    }
}
