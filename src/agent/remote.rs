//! Remote analysis agent - generate code, run it in a sandbox, read the output
//!
//! One `RemoteAgent` drives one analysis role through a fixed protocol:
//! upload the dataset, ask the generator for a program, (visualization only)
//! validate it and retry once with a stricter prompt, execute it, recover
//! structured output, and optionally ask for a prose interpretation. The
//! sandbox is killed on every exit path, and no failure escapes `run`: it
//! always returns a report, error-shaped if need be.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::extract::last_json_object;
use super::prompts::{task_prompt, visualization_retry_prompt, INTERPRETATION_REQUEST};
use super::report::{AgentKind, AgentReport, ChartArtifact};
use super::validation::{is_png_payload, PlotCheck};
use crate::config::LlmConfig;
use crate::llm::{
    execute_code_tool, ChatMessage, CodeGenerator, LlmError, MessageRequest, MessageResponse,
    Tool, ToolInvocation,
};
use crate::metrics::{AGENT_RUNS, CHARTS_RENDERED, CODEGEN_RETRIES, CODE_EXECUTIONS, CODE_EXECUTION_DURATION};
use crate::sandbox::{Execution, SandboxError, SandboxProvider, SandboxSession};

/// File name the dataset is uploaded under
pub const DATASET_FILE_NAME: &str = "data.csv";

/// Configuration for a remote agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Generator model
    pub model: String,
    /// Token limit for the code generation request
    pub codegen_max_tokens: u32,
    /// Token limit for the interpretation request
    pub interpretation_max_tokens: u32,
    /// Ask for a prose interpretation after a successful run
    pub request_interpretation: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_llm(&LlmConfig::default())
    }
}

impl AgentConfig {
    pub fn from_llm(llm: &LlmConfig) -> Self {
        Self {
            model: llm.agent_model.clone(),
            codegen_max_tokens: llm.codegen_max_tokens,
            interpretation_max_tokens: llm.interpretation_max_tokens,
            request_interpretation: true,
        }
    }
}

/// Error type for a single agent run
///
/// Never crosses the agent boundary; `run` folds it into the report.
#[derive(Debug)]
pub enum AgentError {
    /// The local dataset could not be read
    Dataset(std::io::Error),
    /// Sandbox creation, upload or execution transport failed
    Sandbox(SandboxError),
    /// The generator request failed
    Llm(LlmError),
    /// The generator invoked the tool without a program
    MissingCode,
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::Dataset(e) => write!(f, "Failed to read dataset: {}", e),
            AgentError::Sandbox(e) => write!(f, "{}", e),
            AgentError::Llm(e) => write!(f, "Code generation failed: {}", e),
            AgentError::MissingCode => write!(f, "Tool invocation carried no code"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<SandboxError> for AgentError {
    fn from(e: SandboxError) -> Self {
        AgentError::Sandbox(e)
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        AgentError::Llm(e)
    }
}

/// Analysis agent backed by the generator + sandbox pair
pub struct RemoteAgent {
    kind: AgentKind,
    generator: Arc<dyn CodeGenerator>,
    sandboxes: Arc<dyn SandboxProvider>,
    config: AgentConfig,
}

impl RemoteAgent {
    pub fn new(
        kind: AgentKind,
        generator: Arc<dyn CodeGenerator>,
        sandboxes: Arc<dyn SandboxProvider>,
        config: AgentConfig,
    ) -> Self {
        Self {
            kind,
            generator,
            sandboxes,
            config,
        }
    }

    pub fn statistical(
        generator: Arc<dyn CodeGenerator>,
        sandboxes: Arc<dyn SandboxProvider>,
        config: AgentConfig,
    ) -> Self {
        Self::new(AgentKind::Statistical, generator, sandboxes, config)
    }

    pub fn anomaly(
        generator: Arc<dyn CodeGenerator>,
        sandboxes: Arc<dyn SandboxProvider>,
        config: AgentConfig,
    ) -> Self {
        Self::new(AgentKind::Anomaly, generator, sandboxes, config)
    }

    pub fn visualization(
        generator: Arc<dyn CodeGenerator>,
        sandboxes: Arc<dyn SandboxProvider>,
        config: AgentConfig,
    ) -> Self {
        Self::new(AgentKind::Visualization, generator, sandboxes, config)
    }

    /// Run the agent against a dataset file
    ///
    /// Always returns a report; failures come back as `{error, ...}`.
    pub async fn run(&self, dataset: &Path) -> AgentReport {
        let trace_id = Uuid::now_v7().to_string();
        let label = self.kind.label();

        let root_span = info_span!(
            "agent_run",
            agent = %self.kind,
            trace_id = %trace_id,
            model = %self.config.model,
            otel.name = "agent_run"
        );

        async {
            info!(trace_id = %trace_id, dataset = %dataset.display(), "Starting agent");
            println!("[{}] Starting {} agent (trace {})", label, self.kind, trace_id);

            let report = self.run_with_cleanup(dataset).await;

            match report.error() {
                Some(message) => {
                    warn!(trace_id = %trace_id, error = %message, "Agent failed");
                    println!("[{}] ❌ {} agent failed: {}", label, self.kind, message);
                }
                None => {
                    info!(trace_id = %trace_id, outcome = report.outcome(), "Agent complete");
                    println!("[{}] ✅ {} agent complete", label, self.kind);
                }
            }
            AGENT_RUNS
                .with_label_values(&[self.kind.as_str(), report.outcome()])
                .inc();
            report
        }
        .instrument(root_span)
        .await
    }

    /// Session lifecycle: read, create, drive, kill
    async fn run_with_cleanup(&self, dataset: &Path) -> AgentReport {
        let label = self.kind.label();

        let data = match tokio::fs::read(dataset).await {
            Ok(data) => data,
            Err(e) => return AgentReport::failed(self.kind, AgentError::Dataset(e).to_string()),
        };

        let session = match self.sandboxes.create().await {
            Ok(session) => session,
            Err(e) => return AgentReport::failed(self.kind, AgentError::from(e).to_string()),
        };
        println!("[{}] ✓ Sandbox {} created", label, session.id());

        let sandbox_span = info_span!("sandbox_session", sandbox_id = %session.id(), otel.name = "sandbox_session");
        let outcome = AssertUnwindSafe(self.drive(session.as_ref(), data))
            .catch_unwind()
            .instrument(sandbox_span)
            .await;

        match session.kill().await {
            Ok(()) => println!("[{}] ✓ Sandbox closed", label),
            Err(e) => warn!(sandbox_id = %session.id(), error = %e, "Failed to kill sandbox"),
        }

        match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => AgentReport::failed(self.kind, e.to_string()),
            Err(panic) => AgentReport::failed(self.kind, panic_message(panic.as_ref())),
        }
    }

    /// The per-agent protocol, strictly ordered
    async fn drive(
        &self,
        session: &dyn SandboxSession,
        data: Vec<u8>,
    ) -> Result<AgentReport, AgentError> {
        let label = self.kind.label();

        let remote_path = session.write_file(DATASET_FILE_NAME, data).await?;
        println!("[{}] ✓ Dataset uploaded to {}", label, remote_path);

        let tools = vec![execute_code_tool()];
        let mut messages = vec![ChatMessage::user(task_prompt(self.kind, &remote_path))];

        let mut response = self.generate(&messages, &tools, self.config.codegen_max_tokens).await?;
        let Some(mut call) = response.tool_invocation() else {
            info!(stop_reason = ?response.stop_reason, "Generator answered without code");
            println!("[{}] ℹ Generator returned no code; nothing to execute", label);
            return Ok(AgentReport::new());
        };

        if self.kind == AgentKind::Visualization {
            let check = PlotCheck::inspect(call.code().unwrap_or_default());
            if !check.passed() {
                warn!(
                    has_plotting = check.has_plotting,
                    show_calls = check.show_calls,
                    "Generated code failed plot validation, retrying once"
                );
                println!(
                    "[{}] ⚠ Code failed plot validation (plotting: {}, show calls: {}); retrying with stricter prompt",
                    label, check.has_plotting, check.show_calls
                );
                CODEGEN_RETRIES.with_label_values(&[self.kind.as_str()]).inc();

                messages = vec![ChatMessage::user(visualization_retry_prompt(&remote_path))];
                let retry = self.generate(&messages, &tools, self.config.codegen_max_tokens).await?;
                match retry.tool_invocation() {
                    Some(retry_call) => {
                        call = retry_call;
                        response = retry;
                    }
                    None => {
                        // keep the first program; the original prompt stands in the history
                        warn!("Retry produced no code, keeping first attempt");
                        messages = vec![ChatMessage::user(task_prompt(self.kind, &remote_path))];
                    }
                }
            }
        }

        messages.push(ChatMessage::assistant(response.content.clone()));

        let code = call.code().unwrap_or_default();
        if code.trim().is_empty() {
            return Err(AgentError::MissingCode);
        }
        println!("[{}] ✓ Received {} lines of code", label, code.lines().count());
        println!("┌─────────────────────────────────────────");
        for line in code.lines() {
            println!("│ {}", line);
        }
        println!("└─────────────────────────────────────────");

        let execution = self.execute(session, code).await?;

        if let Some(failure) = &execution.error {
            println!("[{}] ✗ Execution error: {}", label, failure);
            return Ok(AgentReport::failed(self.kind, failure.to_string())
                .with("traceback", failure.traceback.clone()));
        }
        println!("[{}] ✓ Code executed successfully", label);

        let stdout = execution.stdout_text();
        let mut report = match self.kind {
            AgentKind::Visualization => collect_charts(&execution),
            _ => parse_output(self.kind, &stdout, &execution),
        };

        if self.config.request_interpretation && self.kind != AgentKind::Visualization {
            if let Some(text) = self.interpret(&mut messages, &tools, &call, &stdout).await {
                report.insert("interpretation", text);
                println!("[{}] ✓ Interpretation added", label);
            }
        }

        Ok(report)
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[Tool],
        max_tokens: u32,
    ) -> Result<MessageResponse, LlmError> {
        let request = MessageRequest {
            model: self.config.model.clone(),
            max_tokens,
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        };

        let llm_span = info_span!("llm_call", model = %self.config.model, otel.name = "llm_call");
        let start = Instant::now();
        let response = self.generator.send(&request).instrument(llm_span).await?;
        info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            stop_reason = ?response.stop_reason,
            "LLM call completed"
        );
        Ok(response)
    }

    async fn execute(
        &self,
        session: &dyn SandboxSession,
        code: &str,
    ) -> Result<Execution, SandboxError> {
        let exec_span = info_span!(
            "code_execution",
            code_len = code.len(),
            otel.name = "code_execution"
        );
        let start = Instant::now();
        let result = session.run_code(code).instrument(exec_span).await;
        let elapsed = start.elapsed().as_secs_f64();

        let status = match &result {
            Ok(execution) if execution.error.is_none() => "success",
            _ => "error",
        };
        CODE_EXECUTIONS
            .with_label_values(&[self.kind.as_str(), status])
            .inc();
        CODE_EXECUTION_DURATION
            .with_label_values(&[self.kind.as_str()])
            .observe(elapsed);

        if let Ok(execution) = &result {
            for line in execution.stderr.iter().flat_map(|s| s.lines()) {
                println!("[stderr] {}", line);
            }
        }
        result
    }

    /// Acknowledge the tool call and ask for prose; failures are dropped
    async fn interpret(
        &self,
        messages: &mut Vec<ChatMessage>,
        tools: &[Tool],
        call: &ToolInvocation,
        stdout: &str,
    ) -> Option<String> {
        messages.push(
            ChatMessage::tool_result(call.id.clone(), stdout).with_text(INTERPRETATION_REQUEST),
        );

        match self
            .generate(messages, tools, self.config.interpretation_max_tokens)
            .await
        {
            Ok(response) => response.text().map(str::to_string),
            Err(e) => {
                warn!(error = %e, "Interpretation request failed");
                None
            }
        }
    }
}

/// Structured output from stdout, or the raw text when there is none
fn parse_output(kind: AgentKind, stdout: &str, execution: &Execution) -> AgentReport {
    match last_json_object(stdout) {
        Some(map) => AgentReport::from(map),
        None => {
            warn!(agent = %kind, stdout_len = stdout.len(), "No JSON object in output, keeping raw text");
            let results = execution.results.iter().map(|r| r.describe()).collect();
            AgentReport::raw_output(kind, stdout, results)
        }
    }
}

/// Figures captured by the interpreter, in emission order
fn collect_charts(execution: &Execution) -> AgentReport {
    let payloads = execution.png_payloads();
    let total = payloads.len();
    let charts: Vec<ChartArtifact> = payloads
        .into_iter()
        .filter(|png| is_png_payload(png))
        .map(|png| ChartArtifact::Embedded { png })
        .collect();
    if charts.len() < total {
        warn!(dropped = total - charts.len(), "Discarded figure payloads that are not PNG data");
    }

    CHARTS_RENDERED
        .with_label_values(&["remote"])
        .inc_by(charts.len() as u64);
    println!("[VIZ] ✓ Captured {} charts", charts.len());

    let stdout = execution.stdout_text();
    let report = AgentReport::charts(charts);
    if stdout.trim().is_empty() {
        report
    } else {
        report.with("raw_output", stdout)
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Agent panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Agent panicked: {}", s)
    } else {
        "Agent panicked".to_string()
    }
}
