//! datasquad - multi-agent analysis of a tabular dataset
//!
//! Three analysis agents (statistical, anomaly, visualization) run
//! concurrently against one CSV file. The remote agents have a hosted LLM
//! write Python for their task and run it in a disposable code sandbox; the
//! local variant renders the charts in-process instead. A coordinator turns
//! the three results into prose, and the pipeline renders an HTML report.
//!
//! # Modules
//!
//! - `config` - Environment-driven configuration
//! - `llm` - Messages API client and the `CodeGenerator` seam
//! - `sandbox` - Code sandbox sessions (E2B) and execution results
//! - `agent` - Remote analysis agents and their result model
//! - `charts` - Local chart rendering
//! - `coordinator` - Insight synthesis
//! - `report` - HTML report and chart dashboard
//! - `pipeline` - Phase orchestration and persistence
//! - `metrics` - Prometheus metrics
//! - `tracing` - Subscriber and optional OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use datasquad::{E2bProvider, MessagesClient, Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::from_env()?;
//! let generator = Arc::new(MessagesClient::new(&config.llm)?);
//! let sandboxes = Arc::new(E2bProvider::new(config.sandbox.clone())?);
//! let outcome = Pipeline::new(&config, generator, sandboxes).run().await?;
//! ```

pub mod agent;
pub mod charts;
pub mod config;
pub mod coordinator;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sandbox;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentKind, AgentReport, RemoteAgent};
pub use config::{PipelineConfig, Variant};
pub use llm::{CodeGenerator, MessagesClient};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use sandbox::{E2bProvider, SandboxProvider};
