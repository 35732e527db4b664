//! Sandbox session contract and execution results

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A rich result object produced by the interpreter (figures, reprs)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichResult {
    /// Base64-encoded PNG, present for rendered figures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub png: Option<String>,
    /// Plain-text representation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Whether this is the value of the last expression
    #[serde(default)]
    pub is_main_result: bool,
}

impl RichResult {
    /// Text rendering used when stdout cannot be parsed
    pub fn describe(&self) -> String {
        match (&self.text, &self.png) {
            (Some(text), _) => text.clone(),
            (None, Some(png)) => format!("<image/png, {} base64 bytes>", png.len()),
            (None, None) => "<empty result>".to_string(),
        }
    }
}

/// Error raised by the submitted program itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub traceback: String,
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Captured output of one program run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    /// Stdout fragments in arrival order
    pub stdout: Vec<String>,
    /// Stderr fragments in arrival order
    pub stderr: Vec<String>,
    /// Rich results (figures, expression values)
    pub results: Vec<RichResult>,
    /// Program error, if the run failed
    pub error: Option<ExecutionFailure>,
}

impl Execution {
    /// Stdout joined the way the interpreter emitted it
    pub fn stdout_text(&self) -> String {
        self.stdout.join("")
    }

    /// Base64 PNG payloads in result order
    pub fn png_payloads(&self) -> Vec<String> {
        self.results.iter().filter_map(|r| r.png.clone()).collect()
    }
}

/// Error type for sandbox operations
#[derive(Debug)]
pub enum SandboxError {
    Request(reqwest::Error),
    Status { status: u16, body: String },
    Protocol(String),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::Request(e) => write!(f, "Sandbox request error: {}", e),
            SandboxError::Status { status, body } => {
                write!(f, "Sandbox API error {}: {}", status, body)
            }
            SandboxError::Protocol(msg) => write!(f, "Sandbox protocol error: {}", msg),
        }
    }
}

impl std::error::Error for SandboxError {}

impl From<reqwest::Error> for SandboxError {
    fn from(e: reqwest::Error) -> Self {
        SandboxError::Request(e)
    }
}

/// Creates disposable sandbox sessions
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn create(&self) -> Result<Box<dyn SandboxSession>, SandboxError>;
}

/// One live sandbox owned by exactly one agent
///
/// Callers must invoke [`SandboxSession::kill`] on every exit path.
#[async_trait]
pub trait SandboxSession: Send + Sync {
    /// Identifier assigned by the provider
    fn id(&self) -> &str;

    /// Write a file into the sandbox and return its remote path
    async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<String, SandboxError>;

    /// Run a program and capture its output
    async fn run_code(&self, code: &str) -> Result<Execution, SandboxError>;

    /// Destroy the sandbox
    async fn kill(&self) -> Result<(), SandboxError>;
}
