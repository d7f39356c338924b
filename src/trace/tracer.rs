//! Execution tracer
//!
//! Records every primitive browser action attempted during a run. While the
//! tracer is stopped `record` still hands out a handle, but nothing is kept.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::core::Result;

/// Kind of primitive action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Navigate,
    Click,
    Fill,
    Type,
    Select,
    Wait,
    Assert,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Fill => "fill",
            ActionType::Type => "type",
            ActionType::Select => "select",
            ActionType::Wait => "wait",
            ActionType::Assert => "assert",
        };
        write!(f, "{}", name)
    }
}

/// One recorded primitive action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub action_type: ActionType,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Stays false until marked successful; unmarked traces count as failures
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// ISO-8601 creation time
    pub timestamp: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Whether the trace was ever marked
    #[serde(default)]
    pub marked: bool,
}

impl ExecutionTrace {
    fn new(
        action_type: ActionType,
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            action_type,
            tool_name: tool_name.into(),
            arguments,
            result: None,
            success: false,
            error: None,
            timestamp: Utc::now().to_rfc3339(),
            metadata: serde_json::Map::new(),
            marked: false,
        }
    }

    fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Default)]
struct TracerState {
    enabled: bool,
    /// Bumped on every start/stop so stale handles cannot touch a new run
    generation: u64,
    traces: Vec<ExecutionTrace>,
}

/// Shared recorder of primitive actions; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct ExecutionTracer {
    state: Arc<Mutex<TracerState>>,
}

/// Handle to a trace recorded while tracing was enabled (or a detached no-op)
#[must_use = "mark the trace as a success or a failure"]
#[derive(Debug)]
pub struct TraceHandle {
    slot: Option<(Arc<Mutex<TracerState>>, u64, usize)>,
}

impl TraceHandle {
    /// Handle that records nothing
    pub fn detached() -> Self {
        Self { slot: None }
    }

    /// Whether this handle points at a kept trace
    pub fn is_recording(&self) -> bool {
        self.slot.is_some()
    }

    fn update(self, apply: impl FnOnce(&mut ExecutionTrace)) {
        let Some((state, generation, index)) = self.slot else {
            return;
        };
        let mut state = state.lock();
        if state.generation != generation {
            return;
        }
        if let Some(trace) = state.traces.get_mut(index) {
            if !trace.marked {
                apply(trace);
                trace.marked = true;
            }
        }
    }

    /// Mark the action successful
    pub fn mark_success(
        self,
        result: Option<serde_json::Value>,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) {
        self.update(|trace| {
            trace.success = true;
            trace.result = result;
            if let Some(metadata) = metadata {
                trace.metadata.extend(metadata);
            }
        });
    }

    /// Mark the action failed
    pub fn mark_failure(self, error: impl Into<String>) {
        let error = error.into();
        self.update(|trace| {
            trace.success = false;
            trace.error = Some(error);
        });
    }
}

/// Aggregate view of recorded traces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSummary {
    pub total: usize,
    pub successful: usize,
    /// Everything not successful, including never-marked traces
    pub failed: usize,
    /// Never-marked traces; a subset of `failed`
    pub pending: usize,
    pub traces: Vec<ExecutionTrace>,
}

impl TraceSummary {
    fn from_traces(traces: Vec<ExecutionTrace>) -> Self {
        let mut successful = 0;
        let mut pending = 0;
        for trace in &traces {
            if trace.success {
                successful += 1;
            } else if !trace.marked {
                pending += 1;
            }
        }

        Self {
            total: traces.len(),
            successful,
            failed: traces.len() - successful,
            pending,
            traces,
        }
    }

    /// Render successful actions as a replayable agent-browser command script
    pub fn to_script(&self) -> String {
        let mut script = String::from("# replay script generated from execution trace\n");
        for trace in self.traces.iter().filter(|t| t.success) {
            let target = trace
                .result
                .as_ref()
                .and_then(|r| r.get("target"))
                .and_then(|t| t.as_str())
                .or_else(|| trace.argument("target"))
                .unwrap_or("?");
            let text = trace.argument("value").or_else(|| trace.argument("text"));

            let line = match (trace.action_type, text) {
                (ActionType::Navigate, _) => {
                    format!("open {}", trace.argument("url").unwrap_or("about:blank"))
                }
                (ActionType::Click, _) => format!("click {}", target),
                (ActionType::Fill, Some(text)) => format!("fill {} {:?}", target, text),
                (ActionType::Type, Some(text)) => format!("type {} {:?}", target, text),
                (ActionType::Select, Some(value)) => format!("select {} {:?}", target, value),
                (ActionType::Wait, _) => format!("wait {}", target),
                (ActionType::Assert, _) => format!("# assert {}", trace.tool_name),
                (action, None) => format!("# {} {} (no text recorded)", action, target),
            };
            script.push_str(&line);
            script.push('\n');
        }
        script
    }
}

impl ExecutionTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh recording
    pub fn start(&self) {
        let mut state = self.state.lock();
        state.enabled = true;
        state.generation += 1;
        state.traces.clear();
    }

    /// Stop recording and hand back everything recorded since `start`
    pub fn stop(&self) -> Vec<ExecutionTrace> {
        let mut state = self.state.lock();
        if !state.enabled {
            return Vec::new();
        }
        state.enabled = false;
        state.generation += 1;
        std::mem::take(&mut state.traces)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Record the start of an action
    pub fn record(
        &self,
        action_type: ActionType,
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> TraceHandle {
        let mut state = self.state.lock();
        if !state.enabled {
            return TraceHandle::detached();
        }

        state
            .traces
            .push(ExecutionTrace::new(action_type, tool_name, arguments));
        TraceHandle {
            slot: Some((self.state.clone(), state.generation, state.traces.len() - 1)),
        }
    }

    /// Counts plus the full sequence of the current recording
    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_traces(self.state.lock().traces.clone())
    }

    /// Summarize an already stopped recording
    pub fn summarize(traces: Vec<ExecutionTrace>) -> TraceSummary {
        TraceSummary::from_traces(traces)
    }

    /// Write the current summary as pretty JSON
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let summary = self.summary();
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        Ok(())
    }
}
