//! Agent result model
//!
//! Results stay loosely typed: the statistical and anomaly payloads are
//! whatever JSON the generated program printed. What is fixed is the shape
//! of the degraded cases, so consumers can rely on the kind's collection
//! fields being present whenever `error` is set.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The three analysis roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Statistical,
    Anomaly,
    Visualization,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Statistical => "statistical",
            AgentKind::Anomaly => "anomaly",
            AgentKind::Visualization => "visualization",
        }
    }

    /// Console prefix for progress lines
    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Statistical => "STATS",
            AgentKind::Anomaly => "ANOMALY",
            AgentKind::Visualization => "VIZ",
        }
    }

    /// Collection fields every degraded result of this kind carries
    pub fn empty_defaults(&self) -> Map<String, Value> {
        let defaults = match self {
            AgentKind::Statistical => json!({
                "summary_statistics": {},
                "correlations": [],
                "distribution_tests": {},
            }),
            AgentKind::Anomaly => json!({
                "outliers": [],
                "data_quality": {},
            }),
            AgentKind::Visualization => json!({
                "charts": [],
                "count": 0,
            }),
        };
        match defaults {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chart produced by a visualization agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartArtifact {
    /// PNG written to disk by the local renderer
    File(PathBuf),
    /// Base64 PNG captured from the sandbox
    Embedded { png: String },
}

/// Structured output of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentReport(Map<String, Value>);

impl AgentReport {
    /// An empty result (the generator answered without code)
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Error-shaped result: `{error, ...empty defaults}`
    pub fn failed(kind: AgentKind, message: impl Into<String>) -> Self {
        let mut map = kind.empty_defaults();
        map.insert("error".to_string(), Value::String(message.into()));
        Self(map)
    }

    /// Unparseable stdout kept verbatim next to the kind's defaults
    pub fn raw_output(kind: AgentKind, stdout: impl Into<String>, results: Vec<String>) -> Self {
        let mut map = kind.empty_defaults();
        map.insert("raw_output".to_string(), Value::String(stdout.into()));
        map.insert("results".to_string(), json!(results));
        Self(map)
    }

    /// Chart result from an ordered artifact list
    pub fn charts(charts: Vec<ChartArtifact>) -> Self {
        let mut map = Map::new();
        map.insert("count".to_string(), json!(charts.len()));
        map.insert("charts".to_string(), json!(charts));
        Self(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `error` message, if this result is degraded
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(|v| v.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

    /// Chart artifacts in order; entries of unknown shape are skipped
    pub fn chart_artifacts(&self) -> Vec<ChartArtifact> {
        self.0
            .get("charts")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Chart count, falling back to the artifact list length
    pub fn chart_count(&self) -> usize {
        self.0
            .get("count")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or_else(|| self.chart_artifacts().len())
    }

    /// Label recorded in the run metrics
    pub fn outcome(&self) -> &'static str {
        if self.is_error() {
            "error"
        } else if self.is_empty() {
            "empty"
        } else if self.contains("raw_output") {
            "raw_output"
        } else {
            "success"
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for AgentReport {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_reports_keep_empty_collections() {
        let stats = AgentReport::failed(AgentKind::Statistical, "boom");
        assert_eq!(stats.error(), Some("boom"));
        assert_eq!(stats.get("summary_statistics"), Some(&json!({})));
        assert_eq!(stats.get("correlations"), Some(&json!([])));

        let anomaly = AgentReport::failed(AgentKind::Anomaly, "boom");
        assert_eq!(anomaly.get("outliers"), Some(&json!([])));
        assert_eq!(anomaly.get("data_quality"), Some(&json!({})));

        let viz = AgentReport::failed(AgentKind::Visualization, "boom");
        assert_eq!(viz.get("charts"), Some(&json!([])));
        assert_eq!(viz.chart_count(), 0);
    }

    #[test]
    fn test_chart_artifacts_both_shapes() {
        let report = AgentReport::charts(vec![
            ChartArtifact::File(PathBuf::from("results/chart_1.png")),
            ChartArtifact::Embedded { png: "iVBOR".to_string() },
        ]);

        assert_eq!(report.chart_count(), 2);
        assert_eq!(report.get("charts").unwrap()[0], json!("results/chart_1.png"));
        assert_eq!(report.get("charts").unwrap()[1], json!({"png": "iVBOR"}));
        assert_eq!(
            report.chart_artifacts()[1],
            ChartArtifact::Embedded { png: "iVBOR".to_string() }
        );
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AgentReport::new().outcome(), "empty");
        assert_eq!(AgentReport::failed(AgentKind::Anomaly, "x").outcome(), "error");
        assert_eq!(
            AgentReport::raw_output(AgentKind::Statistical, "text", vec![]).outcome(),
            "raw_output"
        );
        assert_eq!(AgentReport::new().with("total_issues", 3).outcome(), "success");
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let report = AgentReport::new().with("severity", "low");
        assert_eq!(serde_json::to_value(&report).unwrap(), json!({"severity": "low"}));
    }
}
