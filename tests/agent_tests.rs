//! Integration tests for the remote analysis agents
//!
//! These tests drive `RemoteAgent` against a scripted generator and an
//! in-process sandbox, covering every exit path of the agent protocol.
//! The live test needs real API keys and is marked #[ignore].

mod common;

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use common::*;
use datasquad::agent::{AgentConfig, AgentKind, ChartArtifact, RemoteAgent};
use datasquad::llm::{ContentBlock, MessageContent, EXECUTE_CODE_TOOL};

fn agent(
    kind: AgentKind,
    generator: &Arc<ScriptedGenerator>,
    provider: &Arc<FakeProvider>,
) -> RemoteAgent {
    RemoteAgent::new(kind, generator.clone(), provider.clone(), AgentConfig::default())
}

/// Test that a missing dataset fails before any sandbox is created
#[tokio::test]
async fn test_missing_dataset_creates_no_sandbox() {
    let cases = [
        (AgentKind::Statistical, "correlations", json!([])),
        (AgentKind::Anomaly, "outliers", json!([])),
        (AgentKind::Visualization, "charts", json!([])),
    ];

    for (kind, field, empty) in cases {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::new());
        let provider = Arc::new(FakeProvider::printing("{}"));

        let report = agent(kind, &generator, &provider)
            .run(&dir.path().join("absent.csv"))
            .await;

        assert!(
            report.error().unwrap().starts_with("Failed to read dataset"),
            "{} agent: {:?}",
            kind,
            report.error()
        );
        assert_eq!(report.get(field), Some(&empty), "{} agent", kind);
        if kind == AgentKind::Visualization {
            assert_eq!(report.get("count"), Some(&json!(0)));
            assert_eq!(report.chart_count(), 0);
        }
        assert_eq!(provider.log.created(), 0, "{} agent", kind);
        assert_eq!(generator.calls(), 0, "{} agent", kind);
    }
}

/// Test that a sandbox creation failure becomes an error result
#[tokio::test]
async fn test_sandbox_create_failure() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new());
    let provider = Arc::new(FakeProvider::printing("{}").failing_create());

    let report = agent(AgentKind::Anomaly, &generator, &provider)
        .run(&dataset)
        .await;

    assert!(report.error().unwrap().contains("401"));
    assert_eq!(report.get("outliers"), Some(&json!([])));
    assert_eq!(report.get("data_quality"), Some(&json!({})));
    assert_eq!(provider.log.killed(), 0);
    assert_eq!(generator.calls(), 0);
}

/// Test that the sandbox is killed when the upload fails
#[tokio::test]
async fn test_upload_failure_still_kills_sandbox() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new());
    let provider = Arc::new(FakeProvider::printing("{}").failing_upload());

    let report = agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    assert!(report.error().unwrap().contains("upload rejected"));
    assert_eq!(provider.log.created(), 1);
    assert_eq!(provider.log.killed(), 1);
    assert_eq!(generator.calls(), 0);
}

/// Test that the dataset is uploaded under its fixed name and referenced in the prompt
#[tokio::test]
async fn test_dataset_upload_and_prompt() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().reply(text_reply("No code today.")));
    let provider = Arc::new(FakeProvider::printing("{}"));

    agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    let uploads = provider.log.uploads.lock().unwrap().clone();
    assert_eq!(uploads, vec![("data.csv".to_string(), SALES_CSV.len())]);

    let request = &generator.requests()[0];
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].name, EXECUTE_CODE_TOOL);
    match &request.messages[0].content {
        MessageContent::Text(prompt) => {
            assert!(prompt.contains("/home/user/data.csv"));
            assert!(prompt.contains("statistical analyst"));
        }
        other => panic!("expected a text prompt, got {:?}", other),
    }
}

/// Test that an answer without a tool call yields an empty result and runs nothing
#[tokio::test]
async fn test_no_tool_call_yields_empty_result() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().reply(text_reply("Looks fine to me.")));
    let provider = Arc::new(FakeProvider::printing("{}"));

    let report = agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    assert!(report.is_empty());
    assert!(provider.log.executed().is_empty());
    assert_eq!(provider.log.killed(), 1);
}

/// Test that a program error keeps empty collections and the traceback
#[tokio::test]
async fn test_execution_error_is_reported() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().reply(tool_call("df['total']")));
    let provider = Arc::new(FakeProvider::new(|_| {
        Ok(failed_execution("KeyError", "'total'"))
    }));

    let report = agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    assert_eq!(report.error(), Some("KeyError: 'total'"));
    assert!(report
        .get("traceback")
        .and_then(|t| t.as_str())
        .unwrap()
        .contains("Traceback"));
    assert_eq!(report.get("summary_statistics"), Some(&json!({})));
    assert_eq!(report.get("correlations"), Some(&json!([])));
    // no interpretation after a failed run
    assert_eq!(generator.calls(), 1);
    assert_eq!(provider.log.killed(), 1);
}

/// Test that the last JSON object in stdout wins and the interpretation is attached
#[tokio::test]
async fn test_structured_output_and_interpretation() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(tool_call("print(results)"))
            .reply(text_reply("Revenue is concentrated in Books.")),
    );
    let stdout = "Loading...\n{\"draft\": true}\n{\"summary_statistics\": {\"total\": {\"mean\": 9.5}}, \"correlations\": [{\"a\": \"price\", \"b\": \"total\", \"r\": 0.4}]}\n";
    let provider = Arc::new(FakeProvider::printing(stdout));

    let report = agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    assert!(!report.is_error());
    assert!(!report.contains("draft"));
    assert_eq!(
        report.get("summary_statistics"),
        Some(&json!({"total": {"mean": 9.5}}))
    );
    assert_eq!(
        report.get("interpretation"),
        Some(&json!("Revenue is concentrated in Books."))
    );

    let requests = generator.requests();
    assert_eq!(requests.len(), 2);
    let follow_up = &requests[1];
    assert_eq!(follow_up.messages.len(), 3);
    assert_eq!(follow_up.messages[1].role, "assistant");
    match &follow_up.messages[2].content {
        MessageContent::Blocks(blocks) => {
            assert!(matches!(
                &blocks[0],
                ContentBlock::ToolResult { tool_use_id, content }
                    if tool_use_id == "toolu_01" && content == stdout
            ));
            assert!(matches!(&blocks[1], ContentBlock::Text { .. }));
        }
        other => panic!("expected content blocks, got {:?}", other),
    }
}

/// Test that a failed interpretation request does not fail the agent
#[tokio::test]
async fn test_interpretation_failure_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(tool_call("print(results)"))
            .fail("overloaded"),
    );
    let provider = Arc::new(FakeProvider::printing(
        "{\"outliers\": [{\"row\": 4, \"column\": \"quantity\", \"value\": -1}], \"data_quality\": {}}",
    ));

    let report = agent(AgentKind::Anomaly, &generator, &provider)
        .run(&dataset)
        .await;

    assert!(!report.is_error());
    assert!(!report.contains("interpretation"));
    assert_eq!(report.get("outliers").unwrap().as_array().unwrap().len(), 1);
    assert_eq!(generator.calls(), 2);
}

/// Test that stdout without a JSON object is kept verbatim
#[tokio::test]
async fn test_unparseable_output_kept_raw() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().reply(tool_call("print('mean 9.5')")));
    let provider = Arc::new(FakeProvider::printing("mean 9.5\n"));

    let report = agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    assert!(!report.is_error());
    assert_eq!(report.get("raw_output"), Some(&json!("mean 9.5\n")));
    assert_eq!(report.get("results"), Some(&json!([])));
    assert_eq!(report.get("summary_statistics"), Some(&json!({})));
    assert_eq!(report.outcome(), "raw_output");
}

/// Test that a generator failure becomes an error result and kills the sandbox
#[tokio::test]
async fn test_generator_failure() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().fail("bad gateway"));
    let provider = Arc::new(FakeProvider::printing("{}"));

    let report = agent(AgentKind::Anomaly, &generator, &provider)
        .run(&dataset)
        .await;

    let message = report.error().unwrap();
    assert!(message.starts_with("Code generation failed"));
    assert!(message.contains("bad gateway"));
    assert_eq!(provider.log.killed(), 1);
}

/// Test that a panic inside the sandbox call is contained
#[tokio::test]
async fn test_panic_is_contained_and_sandbox_killed() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().reply(tool_call("print(1)")));
    let provider = Arc::new(FakeProvider::new(|_| panic!("interpreter crashed")));

    let report = agent(AgentKind::Statistical, &generator, &provider)
        .run(&dataset)
        .await;

    assert_eq!(report.error(), Some("Agent panicked: interpreter crashed"));
    assert_eq!(report.get("correlations"), Some(&json!([])));
    assert_eq!(provider.log.killed(), 1);
}

/// Test that plot validation retries exactly once and runs the retry's code
#[tokio::test]
async fn test_visualization_retry_is_capped() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(tool_call("print('first')"))
            .reply(tool_call("print('second')")),
    );
    let provider = Arc::new(FakeProvider::new(|_| Ok(figure_execution(vec![]))));

    let report = agent(AgentKind::Visualization, &generator, &provider)
        .run(&dataset)
        .await;

    assert_eq!(generator.calls(), 2);
    assert_eq!(provider.log.executed(), vec!["print('second')".to_string()]);
    assert_eq!(report.chart_count(), 0);
    assert!(!report.is_error());

    let retry = &generator.requests()[1];
    assert_eq!(retry.messages.len(), 1);
    match &retry.messages[0].content {
        MessageContent::Text(prompt) => assert!(prompt.contains("plt.show()")),
        other => panic!("expected a text prompt, got {:?}", other),
    }
}

/// Test that a retry without code keeps the first program
#[tokio::test]
async fn test_visualization_retry_without_code_keeps_first() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(
        ScriptedGenerator::new()
            .reply(tool_call("print('first')"))
            .reply(text_reply("I cannot plot this.")),
    );
    let provider = Arc::new(FakeProvider::new(|_| Ok(figure_execution(vec![]))));

    agent(AgentKind::Visualization, &generator, &provider)
        .run(&dataset)
        .await;

    assert_eq!(provider.log.executed(), vec!["print('first')".to_string()]);
}

/// Test that valid plotting code is executed without a retry
#[tokio::test]
async fn test_visualization_valid_code_skips_retry() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let code = plotting_code("charts");
    let generator = Arc::new(ScriptedGenerator::new().reply(tool_call(&code)));
    let provider = Arc::new(FakeProvider::new(|_| {
        Ok(figure_execution(vec![png_payload(); 4]))
    }));

    let report = agent(AgentKind::Visualization, &generator, &provider)
        .run(&dataset)
        .await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(provider.log.executed(), vec![code]);
    assert_eq!(report.chart_count(), 4);
}

/// Test that captured figures are embedded in order and non-PNG payloads dropped
#[tokio::test]
async fn test_visualization_embeds_png_figures() {
    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let generator = Arc::new(ScriptedGenerator::new().reply(tool_call(&plotting_code("charts"))));
    let provider = Arc::new(FakeProvider::new(|_| {
        Ok(figure_execution(vec![
            png_payload(),
            "bm90IGFuIGltYWdl".to_string(),
            png_payload(),
        ]))
    }));

    let report = agent(AgentKind::Visualization, &generator, &provider)
        .run(&dataset)
        .await;

    assert_eq!(report.chart_count(), 2);
    let charts = report.chart_artifacts();
    assert_eq!(charts.len(), 2);
    assert!(charts
        .iter()
        .all(|c| matches!(c, ChartArtifact::Embedded { png } if *png == png_payload())));
    assert!(!report.contains("interpretation"));
}

/// Test the statistical agent against the live services
#[tokio::test]
#[ignore = "Requires ANTHROPIC_API_KEY and E2B_API_KEY"]
async fn test_live_statistical_agent() {
    let config = datasquad::PipelineConfig::from_env().expect("API keys in environment");
    let generator = Arc::new(datasquad::MessagesClient::new(&config.llm).unwrap());
    let sandboxes = Arc::new(datasquad::E2bProvider::new(config.sandbox.clone()).unwrap());

    let dir = TempDir::new().unwrap();
    let dataset = write_dataset(dir.path(), SALES_CSV);
    let report = RemoteAgent::statistical(generator, sandboxes, AgentConfig::from_llm(&config.llm))
        .run(&dataset)
        .await;

    assert!(!report.is_error(), "agent failed: {:?}", report.error());
}
