//! Prometheus metrics for pipeline observability
//!
//! All metrics live in the default registry. [`gather_text`] renders them in
//! the text exposition format; the pipeline writes that next to the report.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Agent runs by agent kind and outcome (success, empty, raw_output, error)
    pub static ref AGENT_RUNS: IntCounterVec = register_int_counter_vec!(
        "datasquad_agent_runs_total",
        "Analysis agent runs by outcome",
        &["agent", "outcome"]
    )
    .unwrap();

    /// Latency of generator calls
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "datasquad_llm_call_duration_seconds",
        "Duration of prompted generator calls",
        &["model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]
    )
    .unwrap();

    /// Sandbox code executions by agent and status (success, error)
    pub static ref CODE_EXECUTIONS: IntCounterVec = register_int_counter_vec!(
        "datasquad_code_executions_total",
        "Sandbox code executions",
        &["agent", "status"]
    )
    .unwrap();

    /// Wall time of sandbox code executions
    pub static ref CODE_EXECUTION_DURATION: HistogramVec = register_histogram_vec!(
        "datasquad_code_execution_duration_seconds",
        "Duration of sandbox code executions",
        &["agent"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    /// Stricter-prompt retries issued after failed plot validation
    pub static ref CODEGEN_RETRIES: IntCounterVec = register_int_counter_vec!(
        "datasquad_codegen_retries_total",
        "Code generation retries",
        &["agent"]
    )
    .unwrap();

    /// Wall time per pipeline phase
    pub static ref PHASE_DURATION: HistogramVec = register_histogram_vec!(
        "datasquad_phase_duration_seconds",
        "Duration of pipeline phases",
        &["phase"],
        vec![0.1, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap();

    /// Charts produced, by variant (local, remote)
    pub static ref CHARTS_RENDERED: IntCounterVec = register_int_counter_vec!(
        "datasquad_charts_rendered_total",
        "Charts produced by the visualization agents",
        &["variant"]
    )
    .unwrap();
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
