//! Remote code-execution sandboxes
//!
//! Every remote agent owns one session for its whole run:
//!
//! ```text
//! SandboxProvider::create() → session
//!        ↓
//! session.write_file("data.csv")      (dataset upload)
//!        ↓
//! session.run_code(generated program) → stdout / rich results / error
//!        ↓
//! session.kill()                      (always, on every exit path)
//! ```

pub mod e2b;
pub mod execution;

pub use e2b::{parse_execution_stream, E2bProvider, E2bSession};
pub use execution::{
    Execution, ExecutionFailure, RichResult, SandboxError, SandboxProvider, SandboxSession,
};
