//! Secondary engine: deterministic driver over snapshot refs
//!
//! The model sees the accessibility snapshot and acts on `@eN` refs only.
//! Temperature is pinned to zero and there is no healing; when a ref is wrong
//! the model has to take a fresh snapshot.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::browser::BrowserDriver;
use crate::core::{AutohealError, Result, ToolCall, ToolDefinition, ToolResult};
use crate::engine::adapter::EngineAdapter;
use crate::engine::agent::{into_result, normalize_url};
use crate::engine::conversation::Conversation;
use crate::engine::reasoning::{done_definition, ReasoningLoop, Toolbox};
use crate::engine::types::{EngineInfo, EngineKind, ExecutionResult};
use crate::llm::LLMProvider;
use crate::memory::SessionMemory;
use crate::trace::{ActionType, ExecutionTracer};

const SYSTEM_PROMPT: &str = r#"You drive a browser step by step using element refs.

## Workflow
1. `navigate` to the site. The result includes the page elements.
2. Pick the target element's ref from the LATEST snapshot, e.g. `@e12: link "Sign in"`.
3. Act with `click_ref`, `fill_ref` or `press_key` using that exact ref ({"ref": "e12"}).
4. Call `snapshot` whenever you are unsure what is on the page.
5. Call `done` when finished, with success=false if the task cannot be completed.

Never invent refs. Never use descriptions or URLs as refs."#;

/// Accept `e5`, `@e5`, `ref=e5` and `[ref=e5]`
pub(crate) fn normalize_ref(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_start_matches("ref=")
        .trim_start_matches('@');

    let digits = cleaned.strip_prefix('e')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("@{}", cleaned))
}

/// Ref-based tools bound to one driver
struct ScriptedToolbox<'a> {
    driver: &'a dyn BrowserDriver,
}

impl ScriptedToolbox<'_> {
    fn target(call: &ToolCall) -> Result<String> {
        let raw = call
            .get_string("ref")
            .ok_or_else(|| AutohealError::tool(format!("{} needs 'ref'", call.name)))?;
        normalize_ref(&raw).ok_or_else(|| {
            AutohealError::tool(format!(
                "'{}' is not an element ref; take a snapshot and use a ref like e5",
                raw
            ))
        })
    }

    /// Append the current interactive elements to a result. The action has
    /// already happened, so a failed snapshot only leaves a note.
    async fn with_page(&self, mut result: ToolResult) -> ToolResult {
        match self.driver.snapshot(true).await {
            Ok(snapshot) => {
                result.output = format!("{}\n\n{}", result.output, snapshot.format_for_display());
            }
            Err(e) => {
                warn!(tool = %result.tool_name, error = %e, "snapshot after action failed");
                result.output = format!("{}\n\n(snapshot unavailable: {})", result.output, e);
            }
        }
        result
    }
}

#[async_trait]
impl<'a> Toolbox for ScriptedToolbox<'a> {
    fn definitions(&self) -> Vec<ToolDefinition> {
        let with_ref = |name: &str, description: &str, extra: serde_json::Value| {
            let mut properties = json!({
                "ref": {"type": "string", "description": "Element ref from the latest snapshot, e.g. e5"}
            });
            let mut required = vec!["ref".to_string()];
            if let (Some(base), serde_json::Value::Object(extra)) = (properties.as_object_mut(), extra) {
                required.extend(extra.keys().cloned());
                base.extend(extra);
            }
            ToolDefinition::function(
                name,
                description,
                json!({"type": "object", "properties": properties, "required": required}),
            )
        };

        vec![
            ToolDefinition::function(
                "navigate",
                "Open a URL and list the page's interactive elements",
                json!({
                    "type": "object",
                    "properties": {"url": {"type": "string"}},
                    "required": ["url"]
                }),
            ),
            ToolDefinition::function(
                "snapshot",
                "List the interactive elements of the current page with their refs",
                json!({"type": "object", "properties": {}}),
            ),
            with_ref("click_ref", "Click the element with the given ref", json!({})),
            with_ref(
                "fill_ref",
                "Replace the content of the input with the given ref",
                json!({"text": {"type": "string", "description": "Text to enter"}}),
            ),
            ToolDefinition::function(
                "press_key",
                "Press a key, e.g. Enter or Tab",
                json!({
                    "type": "object",
                    "properties": {"key": {"type": "string"}},
                    "required": ["key"]
                }),
            ),
            ToolDefinition::function(
                "extract_text",
                "Read the text of an element by ref, or the whole page without a ref",
                json!({
                    "type": "object",
                    "properties": {"ref": {"type": "string"}}
                }),
            ),
            done_definition(),
        ]
    }

    fn action_type(&self, tool: &str) -> Option<ActionType> {
        match tool {
            "navigate" => Some(ActionType::Navigate),
            "click_ref" => Some(ActionType::Click),
            "fill_ref" => Some(ActionType::Fill),
            "press_key" => Some(ActionType::Type),
            _ => None,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        debug!(tool = %call.name, "scripted tool");

        match call.name.as_str() {
            "navigate" => {
                let raw = call.get_string("url").unwrap_or_default();
                let url = normalize_url(&raw)?;
                let result = self.driver.open(&url).await?;
                Ok(self.with_page(result).await)
            }
            "snapshot" => {
                let snapshot = self.driver.snapshot(true).await?;
                Ok(ToolResult::success(
                    "snapshot",
                    format!(
                        "{} elements\n{}",
                        snapshot.count_elements(),
                        snapshot.format_for_display()
                    ),
                ))
            }
            "click_ref" => {
                let target = Self::target(call)?;
                let mut result = self.driver.click(&target).await?;
                result.data = Some(json!({"target": target}));
                Ok(self.with_page(result).await)
            }
            "fill_ref" => {
                let target = Self::target(call)?;
                let text = call.get_string("text").unwrap_or_default();
                let mut result = self.driver.fill(&target, &text).await?;
                result.data = Some(json!({"target": target}));
                Ok(result)
            }
            "press_key" => {
                let key = call
                    .get_string("key")
                    .ok_or_else(|| AutohealError::tool("press_key needs 'key'"))?;
                self.driver.press(&key).await
            }
            "extract_text" => {
                let target = match call.get_string("ref") {
                    Some(_) => Self::target(call)?,
                    None => "body".to_string(),
                };
                let text = self.driver.get_text(&target).await?;
                Ok(ToolResult::success_with_data(
                    "extract_text",
                    text.clone(),
                    json!({"target": target, "text": text}),
                ))
            }
            other => Ok(ToolResult::failure(other, format!("Unknown tool: {}", other))),
        }
    }
}

/// Secondary engine
pub struct ScriptedEngine {
    llm: Arc<dyn LLMProvider>,
    model: String,
    driver: Arc<dyn BrowserDriver>,
    memory: Option<Arc<SessionMemory>>,
    tracer: ExecutionTracer,
    max_iterations: usize,
    conversation: Mutex<Conversation>,
}

impl ScriptedEngine {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        driver: Arc<dyn BrowserDriver>,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            driver,
            memory: None,
            tracer: ExecutionTracer::new(),
            max_iterations,
            conversation: Mutex::new(Conversation::default()),
        }
    }

    pub fn with_memory(mut self, memory: Arc<SessionMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_tracer(mut self, tracer: ExecutionTracer) -> Self {
        self.tracer = tracer;
        self
    }
}

#[async_trait]
impl EngineAdapter for ScriptedEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Secondary
    }

    fn info(&self) -> EngineInfo {
        EngineInfo::new(
            EngineKind::Secondary.id(),
            "Scripted",
            "Deterministic driver acting on accessibility-snapshot refs, no healing",
        )
    }

    async fn execute(&self, instruction: &str, headless: bool) -> Result<ExecutionResult> {
        self.driver.set_headless(headless);

        let history = self.conversation.lock().history();
        let toolbox = ScriptedToolbox {
            driver: self.driver.as_ref(),
        };

        let run = ReasoningLoop::new(self.llm.as_ref(), &self.model, self.max_iterations, &self.tracer)
            .with_temperature(0.0)
            .run(SYSTEM_PROMPT, &history, instruction, &toolbox)
            .await;

        let outcome = match run {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(memory) = &self.memory {
                    memory.record_execution(instruction, false, &[], Some(&e.to_string()));
                }
                return Err(e);
            }
        };

        if let Some(memory) = &self.memory {
            memory.record_execution(
                instruction,
                outcome.success,
                &outcome.steps,
                outcome.error.as_deref(),
            );
        }
        self.conversation
            .lock()
            .add_exchange(instruction, outcome.message.clone());

        Ok(into_result(EngineKind::Secondary, outcome))
    }

    fn reset(&self) {
        self.conversation.lock().clear();
    }

    async fn shutdown(&self) -> Result<()> {
        self.driver.close().await
    }
}
