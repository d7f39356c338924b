//! Engine module
//!
//! Two automation backends behind one adapter contract, the reasoning loop
//! they share, and the orchestrator that falls back from one to the other.

pub mod adapter;
pub mod agent;
pub mod conversation;
pub mod orchestrator;
pub mod reasoning;
pub mod scripted;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::EngineAdapter;
pub use agent::AgentEngine;
pub use orchestrator::Orchestrator;
pub use reasoning::{ReasoningLoop, RunOutcome, Toolbox};
pub use scripted::ScriptedEngine;
pub use types::{EngineInfo, EngineKind, ExecutionMode, ExecutionResult, StepRecord};
