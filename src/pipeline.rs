//! Top-level orchestration: fan out the agents, synthesize, persist
//!
//! ```text
//! Phase 1  statistical ─┐
//!          anomaly     ─┼─ settle_all (join, no short-circuit)
//!          (viz remote)─┘
//! Phase 2  LocalVisualizer (local variant only)
//! Phase 3  Coordinator::synthesize
//! Phase 4  analysis_report.html, visualizations.html, raw_results.json, metrics.prom
//! ```

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use futures_util::future::{join_all, LocalBoxFuture};
use futures_util::FutureExt;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::agent::remote::panic_message;
use crate::agent::{AgentConfig, AgentKind, AgentReport, ChartArtifact, RemoteAgent};
use crate::charts::LocalVisualizer;
use crate::config::{PipelineConfig, Variant};
use crate::coordinator::Coordinator;
use crate::llm::CodeGenerator;
use crate::metrics::{self, PHASE_DURATION};
use crate::report::{render_report, visualization_dashboard, ReportInput};
use crate::sandbox::SandboxProvider;

pub const REPORT_FILE: &str = "analysis_report.html";
pub const DASHBOARD_FILE: &str = "visualizations.html";
pub const RAW_RESULTS_FILE: &str = "raw_results.json";
pub const METRICS_FILE: &str = "metrics.prom";

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

/// Error type for pipeline runs
#[derive(Debug)]
pub enum PipelineError {
    /// The input dataset does not exist; nothing was started
    DatasetMissing(PathBuf),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::DatasetMissing(path) => {
                write!(f, "Dataset not found: {}", path.display())
            }
            PipelineError::Io(e) => write!(f, "IO error: {}", e),
            PipelineError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Json(e)
    }
}

/// Await every task to completion, in input order
///
/// A task that panics yields an error-shaped report for its kind; siblings
/// are never cancelled.
pub async fn settle_all(
    tasks: Vec<(AgentKind, LocalBoxFuture<'_, AgentReport>)>,
) -> Vec<AgentReport> {
    let guarded = tasks.into_iter().map(|(kind, task)| async move {
        match AssertUnwindSafe(task).catch_unwind().await {
            Ok(report) => report,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(agent = %kind, error = %message, "Agent task panicked");
                AgentReport::failed(kind, message)
            }
        }
    });
    join_all(guarded).await
}

/// Wall-clock seconds per phase, in execution order
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings(Vec<(&'static str, f64)>);

impl PhaseTimings {
    fn record(&mut self, phase: &'static str, started: Instant) -> f64 {
        let secs = started.elapsed().as_secs_f64();
        PHASE_DURATION.with_label_values(&[phase]).observe(secs);
        self.0.push((phase, secs));
        secs
    }

    pub fn get(&self, phase: &str) -> Option<f64> {
        self.0.iter().find(|(p, _)| *p == phase).map(|(_, s)| *s)
    }

    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(phase, secs)| (phase.to_string(), json!(secs)))
            .collect();
        Value::Object(map)
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub stats: AgentReport,
    pub viz: AgentReport,
    pub anomalies: AgentReport,
    pub insights: String,
    pub timings: PhaseTimings,
    /// Files written in phase 4
    pub files: Vec<PathBuf>,
}

enum Visualizer {
    Local(LocalVisualizer),
    Remote(RemoteAgent),
}

/// The four-phase analysis pipeline
pub struct Pipeline {
    dataset: PathBuf,
    results_dir: PathBuf,
    variant: Variant,
    statistical: RemoteAgent,
    anomaly: RemoteAgent,
    visualizer: Visualizer,
    coordinator: Coordinator,
}

impl Pipeline {
    /// Wire the agents from resolved configuration and injected clients
    pub fn new(
        config: &PipelineConfig,
        generator: Arc<dyn CodeGenerator>,
        sandboxes: Arc<dyn SandboxProvider>,
    ) -> Self {
        let agent_config = AgentConfig::from_llm(&config.llm);
        let visualizer = match config.variant {
            Variant::LocalCharts => Visualizer::Local(LocalVisualizer::new(&config.results_dir)),
            Variant::AllRemote => Visualizer::Remote(RemoteAgent::visualization(
                generator.clone(),
                sandboxes.clone(),
                agent_config.clone(),
            )),
        };

        Self {
            dataset: config.dataset.clone(),
            results_dir: config.results_dir.clone(),
            variant: config.variant,
            statistical: RemoteAgent::statistical(
                generator.clone(),
                sandboxes.clone(),
                agent_config.clone(),
            ),
            anomaly: RemoteAgent::anomaly(generator.clone(), sandboxes, agent_config),
            visualizer,
            coordinator: Coordinator::from_config(generator, &config.llm),
        }
    }

    /// Run all phases
    ///
    /// Only a missing dataset is an error, and it is detected before any
    /// agent starts or any file is written.
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        if !tokio::fs::try_exists(&self.dataset).await.unwrap_or(false) {
            return Err(PipelineError::DatasetMissing(self.dataset.clone()));
        }

        let remote_viz = matches!(self.visualizer, Visualizer::Remote(_));
        println!("\n{}\n[PIPELINE] PARALLEL DATA ANALYSIS PIPELINE\n{}\n", RULE, RULE);
        println!("[PIPELINE] Dataset: {}", self.dataset.display());
        println!("[PIPELINE] Agents: 3 (Statistical, Visualization, Anomaly)");
        println!("[PIPELINE] Variant: {}\n", self.variant.as_str());
        info!(dataset = %self.dataset.display(), variant = self.variant.as_str(), "Pipeline starting");

        let mut timings = PhaseTimings::default();
        let run_start = Instant::now();

        // Phase 1
        banner("Phase 1: Running Analysis Agents in Parallel...");
        let started = Instant::now();
        let dataset = self.dataset.as_path();
        let mut tasks: Vec<(AgentKind, LocalBoxFuture<'_, AgentReport>)> = vec![
            (AgentKind::Statistical, self.statistical.run(dataset).boxed_local()),
            (AgentKind::Anomaly, self.anomaly.run(dataset).boxed_local()),
        ];
        if let Visualizer::Remote(agent) = &self.visualizer {
            tasks.push((AgentKind::Visualization, agent.run(dataset).boxed_local()));
        }
        let mut settled = settle_all(tasks).await.into_iter();
        let stats = settled.next().unwrap_or_default();
        let anomalies = settled.next().unwrap_or_default();
        let remote_viz_report = settled.next();
        let secs = timings.record("analysis", started);
        done(&format!("ANALYSIS AGENTS COMPLETE ({:.1}s)", secs));

        // Phase 2
        let viz = match (&self.visualizer, remote_viz_report) {
            (Visualizer::Local(visualizer), _) => {
                banner("Phase 2: Creating Visualizations...");
                let started = Instant::now();
                let report = visualizer.run(dataset);
                let secs = timings.record("visualization", started);
                done(&format!("VISUALIZATIONS COMPLETE ({:.1}s)", secs));
                report
            }
            (Visualizer::Remote(_), report) => report.unwrap_or_default(),
        };

        // Phase 3
        banner("Phase 3: Synthesizing Insights...");
        let started = Instant::now();
        let insights = self.coordinator.synthesize(&stats, &viz, &anomalies).await;
        let secs = timings.record("synthesis", started);
        done(&format!("INSIGHTS SYNTHESIS COMPLETE ({:.1}s)", secs));

        // Phase 4
        banner("Phase 4: Generating Final Report...");
        let started = Instant::now();
        let files = self
            .persist(&stats, &viz, &anomalies, &insights, &timings, remote_viz)
            .await;
        timings.record("report", started);
        let total = timings.record("total", run_start);

        println!("\n{}\n[PIPELINE] ANALYSIS COMPLETE!\n{}", RULE, RULE);
        println!("\n[PIPELINE] Total time: {:.1}s", total);
        println!("[PIPELINE] Charts generated: {}", viz.chart_count());
        println!("[PIPELINE] Results saved in: {}", self.results_dir.display());
        println!("\n[PIPELINE] Files generated:");
        for (i, file) in files.iter().enumerate() {
            println!("   {}. {}", i + 1, file.display());
        }
        if !remote_viz && viz.chart_count() > 0 {
            println!("   + {} individual chart PNG files", viz.chart_count());
        }
        println!();
        info!(total_secs = total, files = files.len(), "Pipeline complete");

        Ok(PipelineOutcome {
            stats,
            viz,
            anomalies,
            insights,
            timings,
            files,
        })
    }

    /// Write the phase 4 artifacts; each failure is reported and skipped
    async fn persist(
        &self,
        stats: &AgentReport,
        viz: &AgentReport,
        anomalies: &AgentReport,
        insights: &str,
        timings: &PhaseTimings,
        remote_viz: bool,
    ) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if let Err(e) = tokio::fs::create_dir_all(&self.results_dir).await {
            error!(dir = %self.results_dir.display(), error = %e, "Cannot create results directory");
            println!("[PIPELINE] ✗ Cannot create {}: {}", self.results_dir.display(), e);
            return files;
        }

        let chart_paths: Vec<PathBuf> = viz
            .chart_artifacts()
            .into_iter()
            .filter_map(|c| match c {
                ChartArtifact::File(path) => Some(path),
                ChartArtifact::Embedded { .. } => None,
            })
            .collect();

        if !remote_viz && !chart_paths.is_empty() {
            let html = visualization_dashboard(&chart_paths, &self.results_dir);
            self.write(DASHBOARD_FILE, html.into_bytes(), "Standalone visualization dashboard", &mut files)
                .await;
        }

        let dataset_name = self
            .dataset
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dataset.display().to_string());
        let report = render_report(&ReportInput {
            insights,
            stats,
            viz,
            anomalies,
            dataset: &dataset_name,
            variant: self.variant,
            generated_at: Local::now(),
            base_dir: &self.results_dir,
        });
        self.write(REPORT_FILE, report.into_bytes(), "HTML report", &mut files)
            .await;

        let visualizations = if remote_viz {
            viz.to_value()
        } else {
            let mut value = json!({
                "count": chart_paths.len(),
                "chart_paths": chart_paths,
            });
            if let (Some(error), Some(map)) = (viz.error(), value.as_object_mut()) {
                map.insert("error".to_string(), json!(error));
            }
            value
        };
        let raw = json!({
            "timestamp": Local::now().to_rfc3339(),
            "variant": self.variant.as_str(),
            "dataset": self.dataset.display().to_string(),
            "statistics": stats,
            "visualizations": visualizations,
            "anomalies": anomalies,
            "insights": insights,
            "phase_timings": timings.to_value(),
        });
        match serde_json::to_vec_pretty(&raw) {
            Ok(bytes) => {
                self.write(RAW_RESULTS_FILE, bytes, "Raw results", &mut files)
                    .await
            }
            Err(e) => report_failure(RAW_RESULTS_FILE, &PipelineError::from(e)),
        }

        self.write(METRICS_FILE, metrics::gather_text().into_bytes(), "Metrics", &mut files)
            .await;
        files
    }

    async fn write(&self, name: &str, contents: Vec<u8>, label: &str, files: &mut Vec<PathBuf>) {
        let path = self.results_dir.join(name);
        match tokio::fs::write(&path, contents).await {
            Ok(()) => {
                println!("   ✓ {} saved to {}", label, path.display());
                files.push(path);
            }
            Err(e) => report_failure(name, &PipelineError::from(e)),
        }
    }
}

fn report_failure(name: &str, e: &PipelineError) {
    warn!(file = name, error = %e, "Failed to write artifact");
    println!("   ✗ Failed to write {}: {}", name, e);
}

fn banner(title: &str) {
    println!("{}\n{}\n", title, THIN_RULE);
}

fn done(message: &str) {
    println!("{}\n✅ {}\n{}\n", RULE, message, RULE);
}

/// Diagnostic printed when the dataset is absent
pub fn describe_missing(path: &Path) -> String {
    format!(
        "❌ Error: {} not found!\n   Point DATASQUAD_DATASET at a CSV file and run again.",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn fail_immediately() -> AgentReport {
        panic!("immediate failure")
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_all_waits_for_every_task() {
        let start = tokio::time::Instant::now();
        let tasks: Vec<(AgentKind, LocalBoxFuture<'_, AgentReport>)> = vec![
            (
                AgentKind::Statistical,
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    AgentReport::new().with("n", 10)
                }
                .boxed_local(),
            ),
            (
                AgentKind::Visualization,
                async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    AgentReport::new().with("n", 1)
                }
                .boxed_local(),
            ),
            (AgentKind::Anomaly, fail_immediately().boxed_local()),
        ];

        let results = settle_all(tasks).await;

        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].get("n"), Some(&json!(10)));
        assert_eq!(results[1].get("n"), Some(&json!(1)));
        assert!(results[2].error().unwrap().contains("immediate failure"));
        assert_eq!(results[2].get("outliers"), Some(&json!([])));
    }

    #[test]
    fn test_phase_timings_keep_order() {
        let mut timings = PhaseTimings::default();
        let now = Instant::now();
        timings.record("analysis", now);
        timings.record("synthesis", now);
        assert!(timings.get("analysis").is_some());
        assert!(timings.get("report").is_none());
        let value = timings.to_value();
        assert!(value["synthesis"].is_number());
    }
}
