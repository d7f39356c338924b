//! Bounded ReAct loop shared by both engines
//!
//! Thought → Action → Observation, until the model gives a final answer, calls
//! `done`, or the iteration cap is hit. Each tool call becomes one step.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::core::{Message, Result, ToolCall, ToolDefinition, ToolResult};
use crate::engine::types::StepRecord;
use crate::llm::{GenerateOptions, LLMProvider};
use crate::trace::{ActionType, ExecutionTracer};

/// Name of the tool that ends a run
pub const DONE_TOOL: &str = "done";

/// Observation output longer than this is cut before going back to the model
const MAX_OBSERVATION_CHARS: usize = 4000;

/// Tools one engine exposes to the model
#[async_trait]
pub trait Toolbox: Send + Sync {
    /// Definitions offered to the model, `done` included
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Primitive action a tool performs, if it touches the page
    fn action_type(&self, tool: &str) -> Option<ActionType>;

    /// Execute a tool call; `Err` and failed results both become failed steps
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
}

/// Definition of the `done` tool, shared by both toolboxes
pub fn done_definition() -> ToolDefinition {
    ToolDefinition::function(
        DONE_TOOL,
        "Finish the task. Call exactly once, when the instruction is complete or cannot be completed.",
        json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "What was done, including any extracted data"
                },
                "success": {
                    "type": "boolean",
                    "description": "Whether the instruction was accomplished"
                }
            },
            "required": ["summary", "success"]
        }),
    )
}

/// Observation from one tool call, fed back on the next turn
#[derive(Debug, Clone)]
struct Observation {
    step_number: usize,
    tool_name: String,
    success: bool,
    output: String,
}

/// State of one run of the loop
#[derive(Debug)]
pub struct LoopState {
    /// Completed model turns
    pub iteration: usize,
    pub max_iterations: usize,
    pub steps: Vec<StepRecord>,
    observations: Vec<Observation>,
    /// Set once the run is over: (success, message)
    pub outcome: Option<(bool, String)>,
}

impl LoopState {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            steps: Vec::new(),
            observations: Vec::new(),
            outcome: None,
        }
    }

    pub fn should_continue(&self) -> bool {
        self.iteration < self.max_iterations && self.outcome.is_none()
    }

    pub fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Next step number; steps are numbered from 1 without gaps
    fn next_step_number(&self) -> usize {
        self.steps.len() + 1
    }

    fn push_step(&mut self, step: StepRecord, output: String) {
        self.observations.push(Observation {
            step_number: step.step_number,
            tool_name: step.tool_name.clone(),
            success: step.success,
            output,
        });
        self.steps.push(step);
    }

    fn last_step_failed(&self) -> bool {
        self.steps.last().is_some_and(|s| !s.success)
    }

    /// Observations formatted for the next prompt
    pub fn format_observations(&self) -> String {
        if self.observations.is_empty() {
            return String::new();
        }

        let mut output = String::from("\n\n## Tool Observations:\n");
        for obs in &self.observations {
            let status = if obs.success { "ok" } else { "FAILED" };
            output.push_str(&format!(
                "\n### Step {} ({}, {})\n{}\n",
                obs.step_number, obs.tool_name, status, obs.output
            ));
        }
        output
    }
}

/// How a run ended, before the adapter wraps it into an `ExecutionResult`
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub steps: Vec<StepRecord>,
    pub error: Option<String>,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}\n... (truncated)", cut)
}

/// Reasoning loop driving one toolbox with one model
pub struct ReasoningLoop<'a> {
    llm: &'a dyn LLMProvider,
    model: &'a str,
    temperature: f32,
    max_iterations: usize,
    tracer: &'a ExecutionTracer,
}

impl<'a> ReasoningLoop<'a> {
    pub fn new(
        llm: &'a dyn LLMProvider,
        model: &'a str,
        max_iterations: usize,
        tracer: &'a ExecutionTracer,
    ) -> Self {
        Self {
            llm,
            model,
            temperature: 0.1,
            max_iterations,
            tracer,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Run until completion or the iteration cap.
    ///
    /// A model call that fails ends the run as a failure with the steps so far.
    /// Only fatal tool errors (missing driver, bad configuration) return `Err`.
    pub async fn run(
        &self,
        system_prompt: &str,
        history: &[Message],
        instruction: &str,
        toolbox: &dyn Toolbox,
    ) -> Result<RunOutcome> {
        let mut state = LoopState::new(self.max_iterations);
        let tools = toolbox.definitions();

        info!(model = %self.model, max = state.max_iterations, "starting reasoning loop");

        while state.should_continue() {
            let turn = state.iteration + 1;
            debug!(turn, max = state.max_iterations, "reasoning turn");

            let mut messages = Vec::with_capacity(history.len() + 2);
            messages.push(Message::system(system_prompt));
            messages.extend(history.iter().cloned());
            messages.push(Message::user(format!(
                "{}{}",
                instruction,
                state.format_observations()
            )));

            let response = match self
                .llm
                .chat_with_tools(
                    self.model,
                    &messages,
                    &tools,
                    Some(GenerateOptions {
                        temperature: Some(self.temperature),
                        ..Default::default()
                    }),
                )
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    warn!(turn, error = %e, "model call failed");
                    return Ok(RunOutcome {
                        success: false,
                        message: format!("Model call failed: {}", e),
                        steps: state.steps,
                        error: Some(e.to_string()),
                    });
                }
            };

            if response.is_final() {
                let answer = if response.content.trim().is_empty() {
                    "Finished without a summary".to_string()
                } else {
                    response.content.trim().to_string()
                };
                let success = !state.last_step_failed();
                debug!(turn, success, "final answer received");
                state.outcome = Some((success, answer));
                break;
            }

            for call in &response.tool_calls {
                if call.name == DONE_TOOL {
                    let summary = call
                        .get_string("summary")
                        .unwrap_or_else(|| "Task finished".to_string());
                    let success = call.get_bool("success").unwrap_or(true);
                    state.outcome = Some((success, summary));
                    break;
                }
                self.execute_step(&mut state, toolbox, call).await?;
            }

            state.next_iteration();
        }

        let outcome = match state.outcome {
            Some((true, message)) => RunOutcome {
                success: true,
                message,
                steps: state.steps,
                error: None,
            },
            Some((false, message)) => {
                let error = state
                    .steps
                    .iter()
                    .rev()
                    .find_map(|s| s.error.clone())
                    .unwrap_or_else(|| message.clone());
                RunOutcome {
                    success: false,
                    message,
                    steps: state.steps,
                    error: Some(error),
                }
            }
            None => {
                let error = format!(
                    "Iteration limit reached ({}) without completing the task",
                    state.max_iterations
                );
                warn!(max = state.max_iterations, "iteration limit reached");
                RunOutcome {
                    success: false,
                    message: error.clone(),
                    steps: state.steps,
                    error: Some(error),
                }
            }
        };
        Ok(outcome)
    }

    async fn execute_step(
        &self,
        state: &mut LoopState,
        toolbox: &dyn Toolbox,
        call: &ToolCall,
    ) -> Result<()> {
        let step_number = state.next_step_number();
        let trace = toolbox
            .action_type(&call.name)
            .map(|action| self.tracer.record(action, call.name.clone(), call.argument_map()));

        let (step, output) = match toolbox.execute(call).await {
            Ok(result) if result.success => {
                let value = result
                    .data
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::String(result.output.clone()));
                if let Some(trace) = trace {
                    trace.mark_success(Some(value.clone()), None);
                }
                (
                    StepRecord::succeeded(step_number, &call.name, call.argument_map(), Some(value)),
                    result.output,
                )
            }
            Ok(result) => {
                if let Some(trace) = trace {
                    trace.mark_failure(result.output.clone());
                }
                (
                    StepRecord::failed(step_number, &call.name, call.argument_map(), &result.output),
                    result.output,
                )
            }
            Err(e) => {
                let error = e.to_string();
                if let Some(trace) = trace {
                    trace.mark_failure(error.clone());
                }
                if e.is_fatal() {
                    warn!(tool = %call.name, error = %e, "fatal tool error, aborting run");
                    return Err(e);
                }
                (
                    StepRecord::failed(step_number, &call.name, call.argument_map(), &error),
                    error,
                )
            }
        };

        debug!(step = step_number, tool = %call.name, success = step.success, "step finished");
        state.push_step(step, truncate(&output, MAX_OBSERVATION_CHARS));
        Ok(())
    }
}
