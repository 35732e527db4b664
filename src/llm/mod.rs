//! Prompted code generator integration
//!
//! This module provides the client for the hosted LLM that writes analysis
//! code. Agents declare one tool (`execute_python`) and the model answers
//! either with prose or with a tool invocation carrying the program text.

pub mod messages;

pub use messages::{
    execute_code_tool, ChatMessage, CodeGenerator, ContentBlock, LlmError, MessageContent,
    MessageRequest, MessageResponse, MessagesClient, Tool, ToolInvocation, EXECUTE_CODE_TOOL,
};
