//! Coordinator - turns the three agent results into one prose report

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};

use crate::agent::prompts::synthesis_prompt;
use crate::agent::AgentReport;
use crate::config::LlmConfig;
use crate::llm::{ChatMessage, CodeGenerator, MessageRequest};

/// Summarizes agent results with a single generator call
pub struct Coordinator {
    generator: Arc<dyn CodeGenerator>,
    model: String,
    max_tokens: u32,
}

impl Coordinator {
    pub fn new(generator: Arc<dyn CodeGenerator>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            generator,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn from_config(generator: Arc<dyn CodeGenerator>, llm: &LlmConfig) -> Self {
        Self::new(generator, llm.coordinator_model.clone(), llm.report_max_tokens)
    }

    /// Prose report from the three results
    ///
    /// Never fails: any problem comes back as an `Error generating insights`
    /// message in place of the report.
    pub async fn synthesize(
        &self,
        stats: &AgentReport,
        viz: &AgentReport,
        anomalies: &AgentReport,
    ) -> String {
        println!("[COORDINATOR] Synthesizing insights with {}", self.model);

        let prompt = synthesis_prompt(&stats.to_value(), viz.chart_count(), &anomalies.to_value());
        let request = MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage::user(prompt)],
            tools: vec![],
        };

        let span = info_span!("llm_call", model = %self.model, role = "coordinator", otel.name = "llm_call");
        let start = Instant::now();
        let result = self.generator.send(&request).instrument(span).await;

        match result {
            Ok(response) => match response.text() {
                Some(text) => {
                    info!(
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        chars = text.len(),
                        "Insights synthesized"
                    );
                    println!("[COORDINATOR] ✓ Insights synthesized");
                    text.to_string()
                }
                None => {
                    warn!(stop_reason = ?response.stop_reason, "Coordinator response had no text");
                    println!("[COORDINATOR] ✗ Response contained no text");
                    "Error generating insights: response contained no text".to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Coordinator call failed");
                println!("[COORDINATOR] ✗ Error: {}", e);
                format!("Error generating insights: {}", e)
            }
        }
    }
}
