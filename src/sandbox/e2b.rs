//! E2B code-interpreter sandbox client
//!
//! Each session is a fresh cloud sandbox reached over HTTPS:
//!
//! ```text
//! POST   {api_url}/sandboxes                 → sandboxID (+ envd token)
//! POST   {49983-id.domain}/files?path=...     ← multipart dataset upload
//! POST   {49999-id.domain}/execute            → NDJSON output stream
//! DELETE {api_url}/sandboxes/{id}
//! ```
//!
//! The execute stream carries one JSON object per line, tagged by `type`:
//! `stdout`/`stderr` text fragments, `result` objects (figures carry a base64
//! `png`), an optional `error`, and a closing `end_of_execution`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::execution::{
    Execution, ExecutionFailure, RichResult, SandboxError, SandboxProvider, SandboxSession,
};
use crate::config::SandboxConfig;

/// Home directory files are written into
const SANDBOX_HOME: &str = "/home/user";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSandboxResponse {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
    #[serde(default)]
    envd_access_token: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

/// Creates E2B sandboxes
#[derive(Clone)]
pub struct E2bProvider {
    config: SandboxConfig,
    client: reqwest::Client,
}

impl E2bProvider {
    /// Create a provider from resolved configuration
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SandboxProvider for E2bProvider {
    async fn create(&self) -> Result<Box<dyn SandboxSession>, SandboxError> {
        let endpoint = format!("{}/sandboxes", self.config.api_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&endpoint)
            .header("X-API-Key", &self.config.api_key)
            .json(&json!({
                "templateID": self.config.template,
                "timeout": self.config.sandbox_timeout_secs,
            }))
            .send()
            .await?;

        let response = check_status(response).await?;
        let created: CreateSandboxResponse = response.json().await?;
        info!(sandbox_id = %created.sandbox_id, "Sandbox created");

        let domain = created
            .domain
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.config.domain.clone());

        Ok(Box::new(E2bSession {
            id: created.sandbox_id,
            access_token: created.envd_access_token,
            domain,
            config: self.config.clone(),
            client: self.client.clone(),
        }))
    }
}

/// A live E2B sandbox
pub struct E2bSession {
    id: String,
    access_token: Option<String>,
    domain: String,
    config: SandboxConfig,
    client: reqwest::Client,
}

impl E2bSession {
    /// Base URL of a service port inside this sandbox
    fn service_url(&self, port: u16) -> String {
        match &self.config.gateway_url {
            Some(gateway) => gateway.trim_end_matches('/').to_string(),
            None => format!("{}://{}-{}.{}", self.config.scheme, port, self.id, self.domain),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("E2B-Sandbox-Id", &self.id);
        match &self.access_token {
            Some(token) => request.header("X-Access-Token", token),
            None => request,
        }
    }
}

#[async_trait]
impl SandboxSession for E2bSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<String, SandboxError> {
        let remote_path = format!("{}/{}", SANDBOX_HOME, name);
        let endpoint = format!("{}/files", self.service_url(self.config.envd_port));
        let size = data.len();

        let form = Form::new().part("file", Part::bytes(data).file_name(name.to_string()));
        let request = self
            .client
            .post(&endpoint)
            .query(&[("path", remote_path.as_str()), ("username", "user")])
            .multipart(form);

        let response = self.authorize(request).send().await?;
        check_status(response).await?;

        debug!(sandbox_id = %self.id, path = %remote_path, bytes = size, "File written");
        Ok(remote_path)
    }

    async fn run_code(&self, code: &str) -> Result<Execution, SandboxError> {
        let endpoint = format!("{}/execute", self.service_url(self.config.interpreter_port));

        let request = self.client.post(&endpoint).json(&json!({ "code": code }));
        let response = self.authorize(request).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;

        parse_execution_stream(&body)
    }

    async fn kill(&self) -> Result<(), SandboxError> {
        let endpoint = format!(
            "{}/sandboxes/{}",
            self.config.api_url.trim_end_matches('/'),
            self.id
        );

        let response = self
            .client
            .delete(&endpoint)
            .header("X-API-Key", &self.config.api_key)
            .send()
            .await?;

        // Already gone counts as killed
        if response.status().as_u16() == 404 {
            warn!(sandbox_id = %self.id, "Sandbox already terminated");
            return Ok(());
        }
        check_status(response).await?;
        info!(sandbox_id = %self.id, "Sandbox killed");
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SandboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SandboxError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Fold an NDJSON execute stream into an [`Execution`]
pub fn parse_execution_stream(body: &str) -> Result<Execution, SandboxError> {
    let mut execution = Execution::default();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| SandboxError::Protocol(format!("invalid stream line: {}", e)))?;

        let kind = event["type"].as_str().unwrap_or_default().to_string();
        match kind.as_str() {
            "stdout" => {
                execution
                    .stdout
                    .push(event["text"].as_str().unwrap_or_default().to_string());
            }
            "stderr" => {
                execution
                    .stderr
                    .push(event["text"].as_str().unwrap_or_default().to_string());
            }
            "result" => {
                let result: RichResult = serde_json::from_value(event)
                    .map_err(|e| SandboxError::Protocol(format!("invalid result: {}", e)))?;
                execution.results.push(result);
            }
            "error" => {
                execution.error = Some(ExecutionFailure {
                    name: event["name"].as_str().unwrap_or("Error").to_string(),
                    value: event["value"].as_str().unwrap_or_default().to_string(),
                    traceback: event["traceback"].as_str().unwrap_or_default().to_string(),
                });
            }
            // end_of_execution, number_of_executions, ...
            _ => {}
        }
    }

    Ok(execution)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_execution_stream() {
        let body = concat!(
            "{\"type\":\"number_of_executions\",\"execution_count\":1}\n",
            "{\"type\":\"stdout\",\"text\":\"loading\\n\",\"timestamp\":1}\n",
            "\n",
            "{\"type\":\"result\",\"png\":\"iVBORw0\",\"text\":\"<Figure>\",\"is_main_result\":false}\n",
            "{\"type\":\"stdout\",\"text\":\"{\\\"a\\\": 1}\\n\",\"timestamp\":2}\n",
            "{\"type\":\"end_of_execution\"}\n"
        );

        let execution = parse_execution_stream(body).unwrap();
        assert_eq!(execution.stdout, vec!["loading\n", "{\"a\": 1}\n"]);
        assert_eq!(execution.png_payloads(), vec!["iVBORw0".to_string()]);
        assert!(execution.error.is_none());
    }

    #[test]
    fn test_parse_execution_error() {
        let body = "{\"type\":\"error\",\"name\":\"KeyError\",\"value\":\"'total'\",\"traceback\":\"Traceback...\"}\n";
        let execution = parse_execution_stream(body).unwrap();
        let error = execution.error.unwrap();
        assert_eq!(error.name, "KeyError");
        assert_eq!(error.traceback, "Traceback...");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_execution_stream("not json\n").unwrap_err();
        assert!(matches!(err, SandboxError::Protocol(_)));
    }

    #[test]
    fn test_service_url_patterns() {
        let session = E2bSession {
            id: "sbx123".to_string(),
            access_token: None,
            domain: "e2b.app".to_string(),
            config: SandboxConfig::default(),
            client: reqwest::Client::new(),
        };
        assert_eq!(session.service_url(49999), "https://49999-sbx123.e2b.app");

        let gateway = E2bSession {
            config: SandboxConfig {
                gateway_url: Some("http://127.0.0.1:9000/".to_string()),
                ..SandboxConfig::default()
            },
            ..session
        };
        assert_eq!(gateway.service_url(49999), "http://127.0.0.1:9000");
    }
}
