//! Primary engine: LLM agent with semantic locators
//!
//! The model names elements by role, label, placeholder or visible text. Each
//! request is expanded into an ordered fallback set and resolved through the
//! healing resolver, so small markup changes do not break a run.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::browser::BrowserDriver;
use crate::core::{AutohealError, Result, ToolCall, ToolDefinition, ToolResult};
use crate::engine::adapter::EngineAdapter;
use crate::engine::conversation::Conversation;
use crate::engine::reasoning::{done_definition, ReasoningLoop, RunOutcome, Toolbox};
use crate::engine::types::{EngineInfo, EngineKind, ExecutionResult};
use crate::llm::LLMProvider;
use crate::locator::{ElementQuery, HealRequest, HealedResolution, HealingResolver, LocatorStrategy};
use crate::memory::{Pattern, SessionMemory};
use crate::trace::{ActionType, ExecutionTracer};

/// Remembered patterns shown to the model per run
const MAX_PROMPT_PATTERNS: usize = 5;

/// Prefix `https://` when no scheme is given, then validate
pub(crate) fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AutohealError::tool("navigate needs a url"));
    }

    let candidate = if trimmed.contains("://") || trimmed.starts_with("about:") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    Url::parse(&candidate)
        .map(|url| url.to_string())
        .map_err(|e| AutohealError::tool(format!("invalid url '{}': {}", raw, e)))
}

/// Convert a run outcome into the engine's result
pub(crate) fn into_result(engine: EngineKind, outcome: RunOutcome) -> ExecutionResult {
    if outcome.success {
        ExecutionResult::succeeded(engine, outcome.message, outcome.steps)
    } else {
        let error = outcome.error.unwrap_or_else(|| outcome.message.clone());
        ExecutionResult {
            message: outcome.message,
            ..ExecutionResult::failed(engine, error, outcome.steps)
        }
    }
}

fn element_properties(extra: serde_json::Value) -> serde_json::Value {
    let mut properties = json!({
        "role": {"type": "string", "description": "ARIA role, e.g. button, link, textbox"},
        "name": {"type": "string", "description": "Accessible name used with role"},
        "label": {"type": "string", "description": "Text of the field's label"},
        "placeholder": {"type": "string", "description": "Placeholder text of an input"},
        "text": {"type": "string", "description": "Visible text of the element"},
        "test_id": {"type": "string", "description": "data-testid attribute"},
        "selector": {"type": "string", "description": "CSS selector, last resort"},
        "xpath": {"type": "string", "description": "XPath expression, last resort"},
        "description": {"type": "string", "description": "Short description of the element"},
        "purpose": {"type": "string", "description": "What the element is used for"}
    });
    if let (Some(base), serde_json::Value::Object(extra)) = (properties.as_object_mut(), extra) {
        base.extend(extra);
    }
    properties
}

fn element_tool(name: &str, description: &str, extra: serde_json::Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition::function(
        name,
        description,
        json!({
            "type": "object",
            "properties": element_properties(extra),
            "required": required
        }),
    )
}

/// Semantic-locator tools bound to one driver
struct AgentToolbox<'a> {
    driver: &'a dyn BrowserDriver,
    resolver: &'a HealingResolver,
}

impl AgentToolbox<'_> {
    /// Resolve the element a call refers to; failures become the step error
    async fn resolve(
        &self,
        call: &ToolCall,
        heal: bool,
    ) -> std::result::Result<HealedResolution, String> {
        let query = ElementQuery::from_arguments(&call.arguments);
        let strategies = query.fallback_strategies();
        if strategies.is_empty() {
            return Err(format!(
                "{} needs at least one of role, label, placeholder, text, test_id, selector, xpath",
                call.name
            ));
        }

        let request = heal.then(|| {
            HealRequest::new(
                call.get_string("description")
                    .unwrap_or_else(|| query.describe()),
                call.get_string("purpose")
                    .unwrap_or_else(|| format!("{} as part of the current task", call.name)),
            )
        });

        self.resolver
            .resolve(&strategies, self.driver.as_page(), request)
            .await
            .map_err(|not_found| not_found.to_string())
    }

    /// Run an action against a resolved element and attach locator details
    async fn on_element<F, Fut>(&self, call: &ToolCall, heal: bool, action: F) -> Result<ToolResult>
    where
        F: FnOnce(String) -> Fut,
        Fut: std::future::Future<Output = Result<ToolResult>>,
    {
        let resolution = match self.resolve(call, heal).await {
            Ok(resolution) => resolution,
            Err(error) => return Ok(ToolResult::failure(&call.name, error)),
        };

        let target = resolution.element.target.clone();
        if resolution.healed() {
            info!(tool = %call.name, strategy = %resolution.element.strategy, "element located after healing");
        }

        let mut result = action(target.clone()).await?;
        result.tool_name = call.name.clone();
        result.data = Some(json!({
            "target": target,
            "strategy": resolution.element.strategy.to_string(),
            "healed": resolution.healed(),
        }));
        Ok(result)
    }

    fn required_string(call: &ToolCall, key: &str) -> Result<String> {
        call.get_string(key)
            .ok_or_else(|| AutohealError::tool(format!("{} needs '{}'", call.name, key)))
    }

    async fn navigate(&self, call: &ToolCall) -> Result<ToolResult> {
        let url = normalize_url(&Self::required_string(call, "url")?)?;
        let mut result = self.driver.open(&url).await?;
        result.data = Some(json!({"url": url}));
        Ok(result)
    }

    async fn assert_text(&self, call: &ToolCall) -> Result<ToolResult> {
        let text = Self::required_string(call, "text")?;
        let strategies = [LocatorStrategy::text(text.clone())];
        match self.resolver.resolve(&strategies, self.driver.as_page(), None).await {
            Ok(found) => Ok(ToolResult::success_with_data(
                "assert_text",
                format!("Text '{}' is visible", text),
                json!({"target": found.element.target}),
            )),
            Err(_) => Ok(ToolResult::failure(
                "assert_text",
                format!("Text '{}' not found on the page", text),
            )),
        }
    }

    async fn extract_text(&self, call: &ToolCall) -> Result<ToolResult> {
        if ElementQuery::from_arguments(&call.arguments).is_empty() {
            let title = self.driver.get_title().await.unwrap_or_default();
            let url = self.driver.get_url().await.unwrap_or_default();
            let body = self.driver.get_text("body").await?;
            return Ok(ToolResult::success_with_data(
                "extract_text",
                format!("Title: {}\nURL: {}\n\n{}", title, url, body),
                json!({"title": title, "url": url, "text": body}),
            ));
        }

        let driver = self.driver;
        let mut result = self
            .on_element(call, true, |target| async move {
                let text = driver.get_text(&target).await?;
                Ok(ToolResult::success("extract_text", text))
            })
            .await?;
        if let Some(serde_json::Value::Object(data)) = result.data.as_mut() {
            data.insert("text".to_string(), json!(result.output));
        }
        Ok(result)
    }
}

#[async_trait]
impl<'a> Toolbox for AgentToolbox<'a> {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::function(
                "navigate",
                "Open a URL in the browser",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "Address to open; https:// is added if missing"}
                    },
                    "required": ["url"]
                }),
            ),
            element_tool("click", "Click an element", json!({}), &[]),
            element_tool(
                "fill",
                "Replace the content of an input",
                json!({"value": {"type": "string", "description": "Text to put in the field"}}),
                &["value"],
            ),
            element_tool(
                "type_text",
                "Type text key by key into an element",
                json!({"value": {"type": "string", "description": "Text to type"}}),
                &["value"],
            ),
            element_tool(
                "select_option",
                "Choose an option of a select element",
                json!({"value": {"type": "string", "description": "Option to choose"}}),
                &["value"],
            ),
            element_tool("wait_for", "Wait until an element is visible", json!({}), &[]),
            ToolDefinition::function(
                "assert_text",
                "Check that some text is visible on the page",
                json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            ),
            ToolDefinition::function(
                "screenshot",
                "Capture the current page, optionally saving it to a file",
                json!({
                    "type": "object",
                    "properties": {"path": {"type": "string", "description": "File to write the image to"}}
                }),
            ),
            element_tool(
                "extract_text",
                "Read the text of an element, or of the whole page when no element is given",
                json!({}),
                &[],
            ),
            done_definition(),
        ]
    }

    fn action_type(&self, tool: &str) -> Option<ActionType> {
        match tool {
            "navigate" => Some(ActionType::Navigate),
            "click" => Some(ActionType::Click),
            "fill" => Some(ActionType::Fill),
            "type_text" => Some(ActionType::Type),
            "select_option" => Some(ActionType::Select),
            "wait_for" => Some(ActionType::Wait),
            "assert_text" => Some(ActionType::Assert),
            _ => None,
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        debug!(tool = %call.name, "agent tool");
        let driver = self.driver;

        match call.name.as_str() {
            "navigate" => self.navigate(call).await,
            "click" => {
                self.on_element(call, true, |target| async move { driver.click(&target).await })
                    .await
            }
            "fill" => {
                let value = Self::required_string(call, "value")?;
                self.on_element(call, true, |target| async move {
                    driver.fill(&target, &value).await
                })
                .await
            }
            "type_text" => {
                let value = Self::required_string(call, "value")?;
                self.on_element(call, true, |target| async move {
                    driver.type_text(&target, &value).await
                })
                .await
            }
            "select_option" => {
                let value = Self::required_string(call, "value")?;
                self.on_element(call, true, |target| async move {
                    driver.select(&target, &value).await
                })
                .await
            }
            "wait_for" => {
                self.on_element(call, false, |target| async move { driver.wait_for(&target).await })
                    .await
            }
            "screenshot" => {
                let path = call.get_string("path");
                self.driver.screenshot(path.as_deref()).await
            }
            "assert_text" => self.assert_text(call).await,
            "extract_text" => self.extract_text(call).await,
            other => Ok(ToolResult::failure(other, format!("Unknown tool: {}", other))),
        }
    }
}

fn system_prompt(patterns: &[Pattern]) -> String {
    let mut prompt = String::from(
        r#"You are a browser automation agent. Follow the ReAct pattern:
1. THINK about the next action.
2. ACT by calling exactly the tools you need.
3. OBSERVE the results and continue.

## Locating elements
Describe elements the way a user sees them. Prefer, in order: role + name,
label, placeholder, visible text. Use test_id, selector or xpath only when
nothing else identifies the element. Add `description` and `purpose` so a
broken locator can be repaired.

## Rules
- Call `done` once the instruction is complete, with success=false if it cannot be.
- Put any data you were asked to extract into the `done` summary.
- Read the latest observation before choosing the next action."#,
    );

    if !patterns.is_empty() {
        prompt.push_str("\n\n## Approaches that worked before\n");
        for pattern in patterns.iter().rev().take(MAX_PROMPT_PATTERNS) {
            let tools: Vec<&str> = pattern.steps.iter().map(|s| s.tool_name.as_str()).collect();
            prompt.push_str(&format!(
                "- \"{}\": {}\n",
                pattern.instruction,
                if tools.is_empty() {
                    "(no recorded steps)".to_string()
                } else {
                    tools.join(" -> ")
                }
            ));
        }
    }

    prompt
}

/// Primary engine
pub struct AgentEngine {
    llm: Arc<dyn LLMProvider>,
    model: String,
    driver: Arc<dyn BrowserDriver>,
    resolver: HealingResolver,
    memory: Option<Arc<SessionMemory>>,
    tracer: ExecutionTracer,
    max_iterations: usize,
    conversation: Mutex<Conversation>,
}

impl AgentEngine {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        driver: Arc<dyn BrowserDriver>,
        resolver: HealingResolver,
        max_iterations: usize,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            driver,
            resolver,
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

    /// Share a tracer with the caller
    pub fn with_tracer(mut self, tracer: ExecutionTracer) -> Self {
        self.tracer = tracer;
        self
    }
}

#[async_trait]
impl EngineAdapter for AgentEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Primary
    }

    fn info(&self) -> EngineInfo {
        EngineInfo::new(
            EngineKind::Primary.id(),
            "Agent",
            "LLM agent with semantic locators and self-healing element resolution",
        )
    }

    async fn execute(&self, instruction: &str, headless: bool) -> Result<ExecutionResult> {
        self.driver.set_headless(headless);

        let patterns = self
            .memory
            .as_ref()
            .map(|memory| memory.get_similar_patterns(instruction))
            .unwrap_or_default();
        debug!(patterns = patterns.len(), "remembered patterns for instruction");

        let prompt = system_prompt(&patterns);
        let history = self.conversation.lock().history();
        let toolbox = AgentToolbox {
            driver: self.driver.as_ref(),
            resolver: &self.resolver,
        };

        let run = ReasoningLoop::new(self.llm.as_ref(), &self.model, self.max_iterations, &self.tracer)
            .run(&prompt, &history, instruction, &toolbox)
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

        Ok(into_result(EngineKind::Primary, outcome))
    }

    fn reset(&self) {
        self.conversation.lock().clear();
    }

    async fn shutdown(&self) -> Result<()> {
        self.driver.close().await
    }
}
