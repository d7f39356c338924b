//! Engine orchestrator
//!
//! Picks an engine per mode and, in auto mode, falls back from the primary to
//! the secondary engine exactly once. Ordinary failures always come back as an
//! `ExecutionResult`; only construction can fail.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::browser::AgentBrowser;
use crate::core::{Config, Result};
use crate::engine::adapter::EngineAdapter;
use crate::engine::agent::AgentEngine;
use crate::engine::scripted::ScriptedEngine;
use crate::engine::types::{EngineInfo, ExecutionMode, ExecutionResult};
use crate::llm::create_provider;
use crate::locator::{HealingResolver, LlmHealer, LocatorResolver, StrategyHealer};
use crate::memory::SessionMemory;
use crate::trace::{ExecutionTrace, ExecutionTracer, TraceSummary};

/// Auto-mode escalation: primary, then at most one secondary attempt
enum Fallback {
    Primary,
    Secondary { primary: ExecutionResult },
    Finished(ExecutionResult),
}

/// Caller-facing entry point
pub struct Orchestrator {
    primary: Arc<dyn EngineAdapter>,
    secondary: Arc<dyn EngineAdapter>,
    memory: Option<Arc<SessionMemory>>,
    tracer: ExecutionTracer,
    trace_enabled: bool,
    last_trace: Mutex<Vec<ExecutionTrace>>,
}

impl Orchestrator {
    pub fn new(primary: Arc<dyn EngineAdapter>, secondary: Arc<dyn EngineAdapter>) -> Self {
        Self {
            primary,
            secondary,
            memory: None,
            tracer: ExecutionTracer::new(),
            trace_enabled: false,
            last_trace: Mutex::new(Vec::new()),
        }
    }

    /// Session memory shared with the engines, exposed for stats and history
    pub fn with_memory(mut self, memory: Arc<SessionMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Tracer shared with the engines; recording is on while `enabled`
    pub fn with_tracer(mut self, tracer: ExecutionTracer, enabled: bool) -> Self {
        self.tracer = tracer;
        self.trace_enabled = enabled;
        self
    }

    /// Wire up both engines from configuration.
    ///
    /// Missing credentials and invalid settings fail here, not at execution.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let llm = create_provider(config)?;
        let memory = SessionMemory::from_config(config).map(Arc::new);
        let tracer = ExecutionTracer::new();
        let max_iterations = config.engine.max_iterations;

        let healer: Option<Arc<dyn StrategyHealer>> = if config.locator.healing {
            Some(Arc::new(LlmHealer::new(llm.clone(), config.models.healer.clone())))
        } else {
            None
        };
        let resolver = HealingResolver::new(
            LocatorResolver::new(config.locator.poll_interval()),
            healer,
            config.locator.timeout_per_strategy(),
        );

        let mut primary = AgentEngine::new(
            llm.clone(),
            config.models.primary.clone(),
            Arc::new(AgentBrowser::from_config(config, "agent")),
            resolver,
            max_iterations,
        )
        .with_tracer(tracer.clone());

        let mut secondary = ScriptedEngine::new(
            llm,
            config.models.secondary.clone(),
            Arc::new(AgentBrowser::from_config(config, "scripted")),
            max_iterations,
        )
        .with_tracer(tracer.clone());

        if let Some(memory) = &memory {
            primary = primary.with_memory(memory.clone());
            secondary = secondary.with_memory(memory.clone());
        }

        let mut orchestrator = Self::new(Arc::new(primary), Arc::new(secondary))
            .with_tracer(tracer, config.engine.trace);
        orchestrator.memory = memory;
        Ok(orchestrator)
    }

    pub fn memory(&self) -> Option<&Arc<SessionMemory>> {
        self.memory.as_ref()
    }

    pub fn set_tracing(&mut self, enabled: bool) {
        self.trace_enabled = enabled;
        if !enabled {
            self.last_trace.lock().clear();
        }
    }

    /// Traces recorded during the last `execute`, empty when tracing is off
    pub fn last_trace(&self) -> TraceSummary {
        ExecutionTracer::summarize(self.last_trace.lock().clone())
    }

    /// Run an adapter; a broken backend becomes a failed result
    async fn run(adapter: &dyn EngineAdapter, instruction: &str, headless: bool) -> ExecutionResult {
        match adapter.execute(instruction, headless).await {
            Ok(result) => result,
            Err(e) => {
                warn!(engine = %adapter.kind(), error = %e, "engine raised an error");
                ExecutionResult::failed(adapter.kind(), e.to_string(), Vec::new())
            }
        }
    }

    async fn execute_auto(&self, instruction: &str, headless: bool) -> ExecutionResult {
        let mut state = Fallback::Primary;

        loop {
            state = match state {
                Fallback::Primary => {
                    let result = Self::run(self.primary.as_ref(), instruction, headless).await;
                    if result.success {
                        Fallback::Finished(result)
                    } else {
                        info!(
                            engine = %self.primary.kind(),
                            error = %result.error_text(),
                            "primary engine failed, falling back"
                        );
                        Fallback::Secondary { primary: result }
                    }
                }
                Fallback::Secondary { primary } => {
                    let mut result = Self::run(self.secondary.as_ref(), instruction, headless).await;
                    result.fallback_occurred = true;

                    let primary_id = self.primary.kind().id();
                    let secondary_id = self.secondary.kind().id();
                    if result.success {
                        result.message = format!(
                            "Completed via fallback to {} ({} failed: {}). {}",
                            secondary_id,
                            primary_id,
                            primary.error_text(),
                            result.message
                        );
                    } else {
                        let combined = format!(
                            "{}: {} | {}: {}",
                            primary_id,
                            primary.error_text(),
                            secondary_id,
                            result.error_text()
                        );
                        warn!(error = %combined, "both engines failed");
                        result.message = combined.clone();
                        result.error = Some(combined);
                    }
                    Fallback::Finished(result)
                }
                Fallback::Finished(result) => return result,
            };
        }
    }

    /// Execute an instruction under the given mode
    pub async fn execute(&self, instruction: &str, mode: ExecutionMode, headless: bool) -> ExecutionResult {
        info!(%mode, headless, "executing instruction");
        if self.trace_enabled {
            self.tracer.start();
        }

        let result = match mode {
            ExecutionMode::PrimaryOnly => Self::run(self.primary.as_ref(), instruction, headless).await,
            ExecutionMode::SecondaryOnly => {
                Self::run(self.secondary.as_ref(), instruction, headless).await
            }
            ExecutionMode::Auto => self.execute_auto(instruction, headless).await,
        };

        if self.trace_enabled {
            *self.last_trace.lock() = self.tracer.stop();
        }
        result
    }

    /// Clear accumulated conversation on one or both engines; memory is untouched
    pub fn reset(&self, mode: Option<ExecutionMode>) {
        match mode {
            Some(ExecutionMode::PrimaryOnly) => self.primary.reset(),
            Some(ExecutionMode::SecondaryOnly) => self.secondary.reset(),
            Some(ExecutionMode::Auto) | None => {
                self.primary.reset();
                self.secondary.reset();
            }
        }
    }

    /// Close both engines' browser sessions. A failure on one does not stop
    /// the other.
    pub async fn shutdown(&self) {
        for adapter in [&self.primary, &self.secondary] {
            match adapter.shutdown().await {
                Ok(()) => info!(engine = %adapter.kind(), "browser session closed"),
                Err(e) => warn!(engine = %adapter.kind(), error = %e, "failed to close browser session"),
            }
        }
    }

    /// Selectable engines: auto plus the two backends
    pub fn get_available_engines(&self) -> Vec<EngineInfo> {
        vec![
            EngineInfo::new(
                "auto",
                "Auto",
                "Primary engine first, secondary engine once if it fails",
            ),
            self.primary.info(),
            self.secondary.info(),
        ]
    }
}
