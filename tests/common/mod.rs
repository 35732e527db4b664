//! In-process fakes for the generator and the sandbox
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use serde_json::json;

use datasquad::llm::{
    CodeGenerator, ContentBlock, LlmError, MessageContent, MessageRequest, MessageResponse,
};
use datasquad::sandbox::{
    Execution, ExecutionFailure, RichResult, SandboxError, SandboxProvider, SandboxSession,
};

pub const SALES_CSV: &str = "\
order_date,categories,product_names,quantity,price,total
2024-01-01,Books,Atlas,2,10.0,20.0
2024-01-01,Toys,Kite,1,5.5,5.5
2024-01-02,Books,Novel,3,8.0,24.0
2024-01-03,Garden,Hose,4,2.5,10.0
2024-01-03,Toys,Puzzle,-1,12.0,-12.0
";

/// Write `body` as `data.csv` under `dir`
pub fn write_dataset(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("data.csv");
    std::fs::write(&path, body).unwrap();
    path
}

/// Response carrying one `execute_python` invocation
pub fn tool_call(code: &str) -> MessageResponse {
    serde_json::from_value(json!({
        "id": "msg_tool",
        "stop_reason": "tool_use",
        "content": [
            {"type": "text", "text": "I'll run this."},
            {"type": "tool_use", "id": "toolu_01", "name": "execute_python", "input": {"code": code}}
        ]
    }))
    .unwrap()
}

/// Plain text response
pub fn text_reply(text: &str) -> MessageResponse {
    serde_json::from_value(json!({
        "id": "msg_text",
        "stop_reason": "end_turn",
        "content": [{"type": "text", "text": text}]
    }))
    .unwrap()
}

/// Visualization program that passes plot validation
pub fn plotting_code(tag: &str) -> String {
    format!(
        "# {}\nimport matplotlib.pyplot as plt\n{}",
        tag,
        "plt.figure()\nplt.bar([1], [2])\nplt.show()\n".repeat(4)
    )
}

/// Base64 payload that decodes to PNG bytes
pub fn png_payload() -> String {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(b"fake image body");
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Successful execution printing `stdout`
pub fn stdout_execution(stdout: &str) -> Execution {
    Execution {
        stdout: vec![stdout.to_string()],
        ..Default::default()
    }
}

/// Execution that raised inside the program
pub fn failed_execution(name: &str, value: &str) -> Execution {
    Execution {
        stdout: vec!["partial output\n".to_string()],
        error: Some(ExecutionFailure {
            name: name.to_string(),
            value: value.to_string(),
            traceback: format!("Traceback (most recent call last):\n{}: {}", name, value),
        }),
        ..Default::default()
    }
}

/// Execution capturing the given figures
pub fn figure_execution(payloads: Vec<String>) -> Execution {
    Execution {
        results: payloads
            .into_iter()
            .map(|png| RichResult {
                png: Some(png),
                text: Some("<Figure size 640x480>".to_string()),
                is_main_result: false,
            })
            .collect(),
        ..Default::default()
    }
}

enum Scripted {
    Reply(MessageResponse),
    Fail(String),
}

/// Generator answering from a fixed queue, recording every request
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<MessageRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, response: MessageResponse) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Reply(response));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(body)) => Err(LlmError::Status { status: 500, body }),
            None => Err(LlmError::EmptyResponse),
        }
    }
}

/// Generator that answers by role, for runs where agents interleave
///
/// First prompts get a tool call with a program tagged by role; follow-ups
/// get an interpretation; tool-less requests get the coordinator prose.
pub struct RoleGenerator {
    pub insights: Option<String>,
    calls: AtomicUsize,
}

impl RoleGenerator {
    pub fn new(insights: Option<&str>) -> Self {
        Self {
            insights: insights.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn first_prompt(request: &MessageRequest) -> String {
    match request.messages.first().map(|m| &m.content) {
        Some(MessageContent::Text(text)) => text.clone(),
        Some(MessageContent::Blocks(blocks)) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect(),
        None => String::new(),
    }
}

#[async_trait]
impl CodeGenerator for RoleGenerator {
    async fn send(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // let sibling agents interleave
        tokio::task::yield_now().await;

        if request.tools.is_empty() {
            return match &self.insights {
                Some(text) => Ok(text_reply(text)),
                None => Err(LlmError::Status {
                    status: 529,
                    body: "overloaded".to_string(),
                }),
            };
        }
        if request.messages.len() > 1 {
            return Ok(text_reply("The numbers look healthy."));
        }

        let prompt = first_prompt(request);
        let code = if prompt.contains("statistical analyst") {
            "# role: stats\nprint(results)".to_string()
        } else if prompt.contains("anomaly detection") {
            "# role: anomaly\nprint(results)".to_string()
        } else {
            plotting_code("role: viz")
        };
        Ok(tool_call(&code))
    }
}

type Responder = dyn Fn(&str) -> Result<Execution, SandboxError> + Send + Sync;

/// Counters shared by a provider and its sessions
#[derive(Default)]
pub struct SandboxLog {
    pub created: AtomicUsize,
    pub killed: AtomicUsize,
    pub uploads: Mutex<Vec<(String, usize)>>,
    pub executed: Mutex<Vec<String>>,
}

impl SandboxLog {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

/// Sandbox provider whose sessions run programs through `responder`
pub struct FakeProvider {
    pub log: Arc<SandboxLog>,
    responder: Arc<Responder>,
    fail_create: bool,
    fail_upload: bool,
}

impl FakeProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<Execution, SandboxError> + Send + Sync + 'static,
    {
        Self {
            log: Arc::new(SandboxLog::default()),
            responder: Arc::new(responder),
            fail_create: false,
            fail_upload: false,
        }
    }

    /// Every program prints `stdout`
    pub fn printing(stdout: &str) -> Self {
        let stdout = stdout.to_string();
        Self::new(move |_| Ok(stdout_execution(&stdout)))
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }
}

#[async_trait]
impl SandboxProvider for FakeProvider {
    async fn create(&self) -> Result<Box<dyn SandboxSession>, SandboxError> {
        if self.fail_create {
            return Err(SandboxError::Status {
                status: 401,
                body: "invalid api key".to_string(),
            });
        }
        let n = self.log.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            id: format!("sbx-{}", n),
            log: self.log.clone(),
            responder: self.responder.clone(),
            fail_upload: self.fail_upload,
        }))
    }
}

struct FakeSession {
    id: String,
    log: Arc<SandboxLog>,
    responder: Arc<Responder>,
    fail_upload: bool,
}

#[async_trait]
impl SandboxSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<String, SandboxError> {
        if self.fail_upload {
            return Err(SandboxError::Protocol("upload rejected".to_string()));
        }
        self.log
            .uploads
            .lock()
            .unwrap()
            .push((name.to_string(), data.len()));
        Ok(format!("/home/user/{}", name))
    }

    async fn run_code(&self, code: &str) -> Result<Execution, SandboxError> {
        self.log.executed.lock().unwrap().push(code.to_string());
        tokio::task::yield_now().await;
        (self.responder)(code)
    }

    async fn kill(&self) -> Result<(), SandboxError> {
        self.log.killed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
