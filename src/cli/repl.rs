//! Interactive REPL for autoheal
//!
//! Provides the main user interaction loop.

use std::io::{self, BufRead, Write};

use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{AutohealError, Config, ProviderType, Result};
use crate::engine::{ExecutionMode, ExecutionResult, Orchestrator};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    orchestrator: Orchestrator,
    config: Config,
    mode: ExecutionMode,
    headless: bool,
}

impl Repl {
    /// Create a REPL with engines built from configuration
    pub fn new(config: Config) -> Result<Self> {
        let orchestrator = Orchestrator::from_config(&config)?;
        Ok(Self::with_orchestrator(orchestrator, config))
    }

    /// Create a REPL around an already assembled orchestrator
    pub fn with_orchestrator(orchestrator: Orchestrator, config: Config) -> Self {
        Self {
            mode: config.engine.default_mode,
            headless: !config.browser.headed,
            orchestrator,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn set_headless(&mut self, headless: bool) {
        self.headless = headless;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Active configuration as TOML, with credentials masked
    pub fn config_text(&self) -> Result<String> {
        let mut shown = self.config.clone();
        if shown.llm.api_key.is_some() {
            shown.llm.api_key = Some("********".to_string());
        }
        let text = toml::to_string_pretty(&shown)
            .map_err(|e| AutohealError::config(format!("Failed to serialize config: {}", e)))?;
        let source = if Config::config_exists() {
            Config::config_file().display().to_string()
        } else {
            "defaults and environment (no config file)".to_string()
        };
        Ok(format!("# {}\n{}", source, text))
    }

    /// Run one instruction under the current mode and render the outcome
    pub async fn execute(&self, instruction: &str) -> String {
        let result = self
            .orchestrator
            .execute(instruction, self.mode, self.headless)
            .await;
        let mut output = render_result(&result);

        let trace = self.orchestrator.last_trace();
        if trace.total > 0 {
            output.push_str(&format!(
                "\nTrace: {} actions ({} ok, {} failed)",
                trace.total, trace.successful, trace.failed
            ));
            let script = trace.to_script();
            if !script.is_empty() {
                output.push_str(&format!("\n{}", script));
            }
        }
        output
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("[{}] > ", self.mode);
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            match handle_command(input, self) {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::Continue(instruction)) => {
                    let output = self.execute(&instruction).await;
                    println!("\n{}\n", output);
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        self.orchestrator.shutdown().await;
        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!("autoheal: self-healing browser automation");
        match self.config.llm.provider {
            ProviderType::Ollama => println!("Ollama:     {}", self.config.ollama_url()),
            ProviderType::OpenAi => println!("API:        {}", self.config.llm.api_base),
        }
        println!("Models:");
        println!("  Primary:   {}", self.config.models.primary);
        println!("  Secondary: {}", self.config.models.secondary);
        println!("Mode:       {}", self.mode);
        match self.orchestrator.memory().and_then(|m| m.path()) {
            Some(path) => println!("Memory:     {}", path.display()),
            None => println!("Memory:     off"),
        }
        println!();
        println!("Commands: help, engines, mode, stats, history, exit");
        println!("─────────────────────────────────────────────────────────");
    }
}

/// Human-readable rendering of an execution result
pub fn render_result(result: &ExecutionResult) -> String {
    let status = if result.success { "OK" } else { "FAILED" };
    let mut output = format!("[{}] via {}", status, result.engine_used);
    if result.fallback_occurred {
        output.push_str(" (fallback)");
    }
    output.push('\n');
    output.push_str(&result.message);

    for step in &result.steps {
        let mark = if step.success { "+" } else { "x" };
        output.push_str(&format!("\n  {} {}. {}", mark, step.step_number, step.tool_name));
        if let Some(error) = &step.error {
            output.push_str(&format!(": {}", error));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineKind, StepRecord};
    use serde_json::Map;

    #[test]
    fn test_render_result_marks_fallback_and_failed_steps() {
        let mut result = ExecutionResult::succeeded(
            EngineKind::Secondary,
            "Completed",
            vec![
                StepRecord::succeeded(1, "navigate", Map::new(), None),
                StepRecord::failed(2, "click_ref", Map::new(), "ref e9 not found"),
            ],
        );
        result.fallback_occurred = true;

        let text = render_result(&result);
        assert!(text.starts_with("[OK] via scripted (fallback)"));
        assert!(text.contains("+ 1. navigate"));
        assert!(text.contains("x 2. click_ref: ref e9 not found"));
    }

    #[test]
    fn test_render_failed_result() {
        let result = ExecutionResult::failed(EngineKind::Primary, "timeout", Vec::new());
        let text = render_result(&result);
        assert!(text.starts_with("[FAILED] via agent"));
        assert!(text.contains("Execution failed: timeout"));
    }
}
