//! Pipeline configuration
//!
//! Everything the pipeline needs is resolved once at startup by
//! [`PipelineConfig::from_env`] and then handed to each client and agent
//! constructor. Agents never read the process environment themselves.

use std::path::PathBuf;
use std::time::Duration;

/// Default Anthropic Messages API endpoint
pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
/// Anthropic API version header value
pub const DEFAULT_LLM_API_VERSION: &str = "2023-06-01";
/// Default E2B control-plane API
pub const DEFAULT_SANDBOX_API_URL: &str = "https://api.e2b.dev";
/// Default E2B sandbox domain (`<port>-<sandbox id>.<domain>`)
pub const DEFAULT_SANDBOX_DOMAIN: &str = "e2b.app";

/// Which visualization path the pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Statistics and anomalies remote, charts rendered locally
    LocalCharts,
    /// All three agents run through the generator + sandbox pair
    AllRemote,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::LocalCharts => "local",
            Variant::AllRemote => "remote",
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "local-charts" => Ok(Variant::LocalCharts),
            "remote" | "all-remote" => Ok(Variant::AllRemote),
            other => Err(ConfigError::Invalid {
                key: "DATASQUAD_VARIANT",
                value: other.to_string(),
            }),
        }
    }
}

/// Settings for the prompted code generator
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Messages endpoint
    pub endpoint: String,
    /// Value of the `anthropic-version` header
    pub api_version: String,
    /// API key, sent as `x-api-key`
    pub api_key: String,
    /// Model used by the analysis agents
    pub agent_model: String,
    /// Model used by the coordinator
    pub coordinator_model: String,
    /// Token limit for code generation requests
    pub codegen_max_tokens: u32,
    /// Token limit for interpretation requests
    pub interpretation_max_tokens: u32,
    /// Token limit for the coordinator's report
    pub report_max_tokens: u32,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_LLM_ENDPOINT.to_string(),
            api_version: DEFAULT_LLM_API_VERSION.to_string(),
            api_key: String::new(),
            agent_model: "claude-haiku-4-5-20251001".to_string(),
            coordinator_model: "claude-sonnet-4-5-20250929".to_string(),
            codegen_max_tokens: 4000,
            interpretation_max_tokens: 2000,
            report_max_tokens: 3000,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Settings for the remote code-execution sandbox
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Control-plane API base URL
    pub api_url: String,
    /// Domain sandboxes are served under
    pub domain: String,
    /// URL scheme for per-sandbox hosts
    pub scheme: String,
    /// API key, sent as `X-API-Key`
    pub api_key: String,
    /// Sandbox template to boot
    pub template: String,
    /// Sandbox lifetime in seconds
    pub sandbox_timeout_secs: u64,
    /// Port of the in-sandbox filesystem daemon
    pub envd_port: u16,
    /// Port of the in-sandbox code interpreter
    pub interpreter_port: u16,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Route all in-sandbox requests through this base URL instead of
    /// `<port>-<id>.<domain>` (self-hosted gateways, local mocks)
    pub gateway_url: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SANDBOX_API_URL.to_string(),
            domain: DEFAULT_SANDBOX_DOMAIN.to_string(),
            scheme: "https".to_string(),
            api_key: String::new(),
            template: "code-interpreter-v1".to_string(),
            sandbox_timeout_secs: 300,
            envd_port: 49983,
            interpreter_port: 49999,
            request_timeout: Duration::from_secs(300),
            gateway_url: None,
        }
    }
}

/// Top-level configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input dataset (CSV)
    pub dataset: PathBuf,
    /// Directory receiving the report, charts and JSON dump
    pub results_dir: PathBuf,
    /// Visualization variant
    pub variant: Variant,
    /// Generator settings
    pub llm: LlmConfig,
    /// Sandbox settings
    pub sandbox: SandboxConfig,
    /// OTLP collector endpoint; tracing export is off when unset
    pub otlp_endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("test_data/sales_data.csv"),
            results_dir: PathBuf::from("results"),
            variant: Variant::LocalCharts,
            llm: LlmConfig::default(),
            sandbox: SandboxConfig::default(),
            otlp_endpoint: None,
        }
    }
}

impl PipelineConfig {
    /// Resolve the configuration from the process environment
    ///
    /// Loads `.env` first if present. A missing API key resolves to an empty
    /// string; the calls needing it then fail per agent, see
    /// [`PipelineConfig::missing_credentials`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = PipelineConfig::default();

        if let Some(path) = get("DATASQUAD_DATASET") {
            config.dataset = PathBuf::from(path);
        }
        if let Some(dir) = get("DATASQUAD_RESULTS_DIR") {
            config.results_dir = PathBuf::from(dir);
        }
        if let Some(variant) = get("DATASQUAD_VARIANT") {
            config.variant = variant.parse()?;
        }
        if let Some(model) = get("DATASQUAD_AGENT_MODEL") {
            config.llm.agent_model = model;
        }
        if let Some(model) = get("DATASQUAD_COORDINATOR_MODEL") {
            config.llm.coordinator_model = model;
        }
        if let Some(endpoint) = get("ANTHROPIC_API_URL") {
            config.llm.endpoint = endpoint;
        }
        if let Some(api_url) = get("E2B_API_URL") {
            config.sandbox.api_url = api_url;
        }
        if let Some(domain) = get("E2B_DOMAIN") {
            config.sandbox.domain = domain;
        }
        config.sandbox.gateway_url = get("E2B_GATEWAY_URL");
        config.otlp_endpoint = get("OTEL_EXPORTER_OTLP_ENDPOINT");

        config.llm.api_key = get("ANTHROPIC_API_KEY").unwrap_or_default();
        config.sandbox.api_key = get("E2B_API_KEY").unwrap_or_default();

        Ok(config)
    }

    /// Names of the API key variables that resolved empty
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.llm.api_key.is_empty() {
            missing.push("ANTHROPIC_API_KEY");
        }
        if self.sandbox.api_key.is_empty() {
            missing.push("E2B_API_KEY");
        }
        missing
    }
}

/// Error type for configuration resolution
#[derive(Debug)]
pub enum ConfigError {
    /// A variable holds a value that cannot be used
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
