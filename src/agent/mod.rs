//! Analysis agents driven by generated code
//!
//! Each agent owns one sandbox session for its whole run and never lets a
//! failure escape: the result is always an [`AgentReport`], error-shaped
//! when something went wrong.
//!
//! # Architecture
//!
//! ```text
//! dataset.csv → RemoteAgent::run
//!                  ↓
//!           SandboxProvider.create() → session
//!                  ↓
//!           session.write_file("data.csv")
//!                  ↓
//!           CodeGenerator (tool: execute_python)
//!                  ↓
//!           PlotCheck (visualization only, one retry)
//!                  ↓
//!           session.run_code() → stdout / figures / error
//!                  ↓
//!           last JSON object in stdout, or raw output
//!                  ↓
//!           interpretation request (non-visualization, best effort)
//!                  ↓
//!           session.kill() (every path)
//! ```

pub mod extract;
pub mod prompts;
pub mod remote;
pub mod report;
pub mod validation;

pub use extract::last_json_object;
pub use remote::{AgentConfig, AgentError, RemoteAgent, DATASET_FILE_NAME};
pub use report::{AgentKind, AgentReport, ChartArtifact};
pub use validation::{is_png_payload, PlotCheck};
