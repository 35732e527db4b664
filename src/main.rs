//! datasquad - multi-agent dataset analysis
//!
//! Reads its configuration from the environment (and `.env`), runs the
//! pipeline once and writes the results directory. See `config` for the
//! variables.

use std::process::ExitCode;
use std::sync::Arc;

use datasquad::config::PipelineConfig;
use datasquad::llm::MessagesClient;
use datasquad::pipeline::{describe_missing, Pipeline, PipelineError};
use datasquad::sandbox::E2bProvider;
use datasquad::tracing::{init_tracing, shutdown_tracing};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing("datasquad", config.otlp_endpoint.as_deref()) {
        eprintln!("⚠ Tracing setup failed: {}", e);
    }
    for key in config.missing_credentials() {
        tracing::warn!(variable = key, "API key not set, remote calls will fail");
        println!("⚠ {} is not set; agents that need it will report errors", key);
    }

    let generator = match MessagesClient::new(&config.llm) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("❌ Failed to build generator client: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let sandboxes = match E2bProvider::new(config.sandbox.clone()) {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            eprintln!("❌ Failed to build sandbox client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = Pipeline::new(&config, generator, sandboxes);
    let result = pipeline.run().await;
    shutdown_tracing();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(PipelineError::DatasetMissing(path)) => {
            println!("{}", describe_missing(&path));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
