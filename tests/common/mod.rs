//! Shared fakes for integration tests: a scripted chat service and an
//! in-memory page driven from an accessibility snapshot.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use autoheal::browser::{BrowserDriver, Snapshot};
use autoheal::core::{Message, ToolCall, ToolDefinition, ToolResult};
use autoheal::engine::{AgentEngine, ScriptedEngine};
use autoheal::llm::{GenerateOptions, LLMProvider, LLMResponse};
use autoheal::locator::{HealingResolver, LlmHealer, LocatorResolver, LocatorStrategy, PageHandle};
use autoheal::{AutohealError, Result};

pub const AGENT_MODEL: &str = "agent-model";
pub const SCRIPTED_MODEL: &str = "scripted-model";
pub const HEALER_MODEL: &str = "healer-model";

/// Chat service with a reply queue per model; an empty queue is a service error
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<HashMap<String, VecDeque<LLMResponse>>>,
    /// (model, number of messages sent) for every call
    pub calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn tool(&self, model: &str, name: &str, arguments: serde_json::Value) {
        self.push(
            model,
            LLMResponse {
                tool_calls: vec![ToolCall::new(name, arguments)],
                model: model.to_string(),
                ..Default::default()
            },
        );
    }

    pub fn text(&self, model: &str, content: &str) {
        self.push(
            model,
            LLMResponse {
                content: content.to_string(),
                model: model.to_string(),
                ..Default::default()
            },
        );
    }

    pub fn done(&self, model: &str, summary: &str) {
        self.tool(model, "done", json!({"summary": summary, "success": true}));
    }

    fn push(&self, model: &str, response: LLMResponse) {
        self.replies
            .lock()
            .entry(model.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn message_counts(&self, model: &str) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, n)| *n)
            .collect()
    }
}

#[async_trait]
impl LLMProvider for ScriptedChat {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.chat_with_tools(model, messages, &[], options).await
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.calls.lock().push((model.to_string(), messages.len()));
        self.replies
            .lock()
            .get_mut(model)
            .and_then(|queue| queue.pop_front())
            .ok_or_else(|| AutohealError::llm(format!("connection refused for {}", model)))
    }

    async fn is_model_available(&self, model: &str) -> Result<bool> {
        Ok(self.replies.lock().contains_key(model))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(self.replies.lock().keys().cloned().collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Page answered from a fixed snapshot; every driver command is logged
pub struct SnapshotPage {
    snapshot: Snapshot,
    installed: bool,
    pub commands: Mutex<Vec<String>>,
}

impl SnapshotPage {
    /// Login form whose submit button reads "Log in"
    pub fn login_form() -> Arc<Self> {
        let snapshot = serde_json::from_value(json!({
            "success": true,
            "data": {
                "snapshot": "- textbox \"Email\" [ref=e1]\n- button \"Log in\" [ref=e2]",
                "refs": {
                    "e1": {"role": "textbox", "name": "Email"},
                    "e2": {"role": "button", "name": "Log in"}
                }
            }
        }))
        .expect("valid snapshot");
        Arc::new(Self {
            snapshot,
            installed: true,
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn missing_binary() -> Arc<Self> {
        Arc::new(Self {
            snapshot: Snapshot::default(),
            installed: false,
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn log(&self, command: String) -> Result<()> {
        if !self.installed {
            return Err(AutohealError::DriverNotFound);
        }
        self.commands.lock().push(command);
        Ok(())
    }
}

#[async_trait]
impl PageHandle for SnapshotPage {
    async fn probe(&self, strategy: &LocatorStrategy) -> Result<Option<String>> {
        if !self.installed {
            return Err(AutohealError::DriverNotFound);
        }
        Ok(self.snapshot.locate(strategy))
    }
}

#[async_trait]
impl BrowserDriver for SnapshotPage {
    fn set_headless(&self, _headless: bool) {}

    fn as_page(&self) -> &dyn PageHandle {
        self
    }

    async fn open(&self, url: &str) -> Result<ToolResult> {
        self.log(format!("open {}", url))?;
        Ok(ToolResult::success("navigate", format!("Navigated to {}", url)))
    }

    async fn click(&self, target: &str) -> Result<ToolResult> {
        self.log(format!("click {}", target))?;
        Ok(ToolResult::success("click", format!("Clicked {}", target)))
    }

    async fn fill(&self, target: &str, text: &str) -> Result<ToolResult> {
        self.log(format!("fill {} {}", target, text))?;
        Ok(ToolResult::success("fill", format!("Filled {}", target)))
    }

    async fn type_text(&self, target: &str, text: &str) -> Result<ToolResult> {
        self.log(format!("type {} {}", target, text))?;
        Ok(ToolResult::success("type", format!("Typed into {}", target)))
    }

    async fn select(&self, target: &str, value: &str) -> Result<ToolResult> {
        self.log(format!("select {} {}", target, value))?;
        Ok(ToolResult::success("select", format!("Selected {}", value)))
    }

    async fn press(&self, key: &str) -> Result<ToolResult> {
        self.log(format!("press {}", key))?;
        Ok(ToolResult::success("press", format!("Pressed {}", key)))
    }

    async fn wait_for(&self, target: &str) -> Result<ToolResult> {
        self.log(format!("wait {}", target))?;
        Ok(ToolResult::success("wait", format!("{} visible", target)))
    }

    async fn get_text(&self, target: &str) -> Result<String> {
        self.log(format!("get text {}", target))?;
        Ok("Welcome back".to_string())
    }

    async fn get_title(&self) -> Result<String> {
        Ok("Example".to_string())
    }

    async fn get_url(&self) -> Result<String> {
        Ok("https://example.com/".to_string())
    }

    async fn screenshot(&self, _path: Option<&str>) -> Result<ToolResult> {
        self.log("screenshot".to_string())?;
        Ok(ToolResult::success("screenshot", "captured"))
    }

    async fn snapshot(&self, _interactive_only: bool) -> Result<Snapshot> {
        self.log("snapshot".to_string())?;
        Ok(self.snapshot.clone())
    }

    async fn close(&self) -> Result<()> {
        self.log("close".to_string())
    }
}

pub fn agent_engine(chat: &Arc<ScriptedChat>, page: &Arc<SnapshotPage>) -> AgentEngine {
    let resolver = HealingResolver::new(
        LocatorResolver::new(Duration::from_millis(10)),
        Some(Arc::new(LlmHealer::new(chat.clone(), HEALER_MODEL))),
        Duration::from_millis(100),
    );
    AgentEngine::new(chat.clone(), AGENT_MODEL, page.clone(), resolver, 10)
}

pub fn scripted_engine(chat: &Arc<ScriptedChat>, page: &Arc<SnapshotPage>) -> ScriptedEngine {
    ScriptedEngine::new(chat.clone(), SCRIPTED_MODEL, page.clone(), 10)
}
