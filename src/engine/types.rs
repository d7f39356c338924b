//! Shared engine types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which engine(s) an instruction is allowed to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ExecutionMode {
    /// Primary first, secondary on failure
    #[default]
    #[serde(rename = "auto")]
    #[value(name = "auto")]
    Auto,
    #[serde(rename = "primary")]
    #[value(name = "primary")]
    PrimaryOnly,
    #[serde(rename = "secondary")]
    #[value(name = "secondary")]
    SecondaryOnly,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Auto => "auto",
            ExecutionMode::PrimaryOnly => "primary",
            ExecutionMode::SecondaryOnly => "secondary",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ExecutionMode::Auto),
            "primary" | "primary-only" | "agent" => Ok(ExecutionMode::PrimaryOnly),
            "secondary" | "secondary-only" | "scripted" => Ok(ExecutionMode::SecondaryOnly),
            other => Err(format!(
                "unknown mode '{}' (expected auto, primary or secondary)",
                other
            )),
        }
    }
}

/// The two automation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// LLM agent with semantic locators and healing
    Primary,
    /// Deterministic snapshot-ref driver
    Secondary,
}

impl EngineKind {
    /// Stable engine id, used in combined error messages
    pub fn id(&self) -> &'static str {
        match self {
            EngineKind::Primary => "agent",
            EngineKind::Secondary => "scripted",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One atomic action taken by an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based, sequential within a run
    pub step_number: usize,
    pub success: bool,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn succeeded(
        step_number: usize,
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
        result: Option<serde_json::Value>,
    ) -> Self {
        Self {
            step_number,
            success: true,
            tool_name: tool_name.into(),
            arguments,
            result,
            error: None,
        }
    }

    pub fn failed(
        step_number: usize,
        tool_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_number,
            success: false,
            tool_name: tool_name.into(),
            arguments,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of one instruction on one engine (possibly amended by fallback)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub engine_used: EngineKind,
    #[serde(default)]
    pub fallback_occurred: bool,
}

impl ExecutionResult {
    pub fn succeeded(
        engine: EngineKind,
        message: impl Into<String>,
        steps: Vec<StepRecord>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            steps,
            error: None,
            engine_used: engine,
            fallback_occurred: false,
        }
    }

    pub fn failed(engine: EngineKind, error: impl Into<String>, steps: Vec<StepRecord>) -> Self {
        let error = error.into();
        Self {
            success: false,
            message: format!("Execution failed: {}", error),
            steps,
            error: Some(error),
            engine_used: engine,
            fallback_occurred: false,
        }
    }

    /// Error text for diagnostics, falling back to the message
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.message)
    }
}

/// Caller-facing description of a selectable engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl EngineInfo {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}
