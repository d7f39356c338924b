//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::cli::repl::Repl;
use crate::core::{Config, Result};
use crate::engine::ExecutionMode;
use crate::memory::ExecutionRecord;

/// Result of parsing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Continue processing as an instruction
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
}

/// Parse and handle special commands
pub fn handle_command(input: &str, repl: &mut Repl) -> Result<CommandResult> {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "engines" => {
            let output = repl
                .orchestrator()
                .get_available_engines()
                .iter()
                .map(|e| format!("  {:<10} {:<10} {}", e.id, e.name, e.description))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(CommandResult::Handled(format!("Engines:\n{}", output)))
        }

        "mode" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled(format!("Current mode: {}", repl.mode())));
            }
            match args.parse::<ExecutionMode>() {
                Ok(mode) => {
                    repl.set_mode(mode);
                    Ok(CommandResult::Handled(format!("Mode set to: {}", mode)))
                }
                Err(e) => Ok(CommandResult::Handled(e)),
            }
        }

        "headed" => match parse_toggle(args) {
            Some(headed) => {
                repl.set_headless(!headed);
                Ok(CommandResult::Handled(format!(
                    "Browser: {}",
                    if headed { "headed" } else { "headless" }
                )))
            }
            None => Ok(CommandResult::Handled("Usage: headed <on|off>".to_string())),
        },

        "trace" => match parse_toggle(args) {
            Some(enabled) => {
                repl.orchestrator_mut().set_tracing(enabled);
                Ok(CommandResult::Handled(format!(
                    "Tracing: {}",
                    if enabled { "ON" } else { "OFF" }
                )))
            }
            None => Ok(CommandResult::Handled("Usage: trace <on|off>".to_string())),
        },

        "reset" => {
            let mode = if args.is_empty() {
                None
            } else {
                match args.parse::<ExecutionMode>() {
                    Ok(mode) => Some(mode),
                    Err(e) => return Ok(CommandResult::Handled(e)),
                }
            };
            repl.orchestrator().reset(mode);
            Ok(CommandResult::Handled(format!(
                "Conversation cleared ({}).",
                mode.map(|m| m.as_str()).unwrap_or("all engines")
            )))
        }

        "stats" => Ok(CommandResult::Handled(stats_text(repl))),

        "history" => {
            let limit = if args.is_empty() {
                5
            } else {
                match args.parse::<usize>() {
                    Ok(n) => n,
                    Err(_) => {
                        return Ok(CommandResult::Handled("Usage: history [n]".to_string()));
                    }
                }
            };
            Ok(CommandResult::Handled(history_text(repl, limit)))
        }

        "patterns" => {
            if args.is_empty() {
                return Ok(CommandResult::Handled("Usage: patterns <instruction>".to_string()));
            }
            Ok(CommandResult::Handled(patterns_text(repl, args)))
        }

        "memory" => match args.to_lowercase().as_str() {
            "clear" => match repl.orchestrator().memory() {
                Some(memory) => {
                    memory.clear();
                    Ok(CommandResult::Handled("Session memory cleared.".to_string()))
                }
                None => Ok(CommandResult::Handled(memory_disabled())),
            },
            _ => Ok(CommandResult::Handled("Usage: memory clear".to_string())),
        },

        "config" => match args.to_lowercase().as_str() {
            "" => Ok(CommandResult::Handled(repl.config_text()?)),
            "save" => {
                let path = repl.config().save_and_get_path()?;
                Ok(CommandResult::Handled(format!("Configuration saved to {}", path.display())))
            }
            "default" => Ok(CommandResult::Handled(Config::default_config_toml())),
            "delete" => {
                if !Config::config_exists() {
                    return Ok(CommandResult::Handled("No config file to delete.".to_string()));
                }
                Config::delete_config()?;
                Ok(CommandResult::Handled(format!(
                    "Deleted {}",
                    Config::config_file().display()
                )))
            }
            _ => Ok(CommandResult::Handled(
                "Usage: config [save|default|delete]".to_string(),
            )),
        },

        _ => {
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn memory_disabled() -> String {
    "Session memory is disabled.".to_string()
}

fn stats_text(repl: &Repl) -> String {
    let Some(memory) = repl.orchestrator().memory() else {
        return memory_disabled();
    };
    let stats = memory.get_stats();
    format!(
        "Session Memory:\n\
         ─────────────────────────────\n\
         Executions:   {}\n\
         Successful:   {}\n\
         Failed:       {}\n\
         Success rate: {:.1}%\n\
         Patterns:     {} keywords",
        stats.total_executions,
        stats.successful,
        stats.failed,
        stats.success_rate,
        stats.pattern_keywords
    )
}

fn format_records(records: &[ExecutionRecord]) -> String {
    if records.is_empty() {
        return "  (none)".to_string();
    }
    records
        .iter()
        .map(|r| match &r.error {
            Some(error) => format!("  {} {}\n      {}", r.timestamp, r.instruction, error),
            None => format!("  {} {} ({} steps)", r.timestamp, r.instruction, r.steps.len()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn history_text(repl: &Repl, limit: usize) -> String {
    let Some(memory) = repl.orchestrator().memory() else {
        return memory_disabled();
    };
    format!(
        "Recent successes:\n{}\n\nRecent failures:\n{}",
        format_records(&memory.get_recent_successes(limit)),
        format_records(&memory.get_recent_failures(limit))
    )
}

fn patterns_text(repl: &Repl, instruction: &str) -> String {
    let Some(memory) = repl.orchestrator().memory() else {
        return memory_disabled();
    };
    let patterns = memory.get_similar_patterns(instruction);
    if patterns.is_empty() {
        return "No remembered patterns match.".to_string();
    }

    let mut output = String::from("Remembered patterns:\n");
    for pattern in patterns {
        let tools = pattern
            .steps
            .iter()
            .map(|s| s.tool_name.as_str())
            .collect::<Vec<_>>()
            .join(" -> ");
        output.push_str(&format!("  {}\n    {}\n", pattern.instruction, tools));
    }
    output
}

/// Generate help text
fn help_text() -> String {
    r#"autoheal Commands:
─────────────────────────────────────────────
  help, ?              Show this help message
  exit, quit, q        Exit autoheal
  engines              List selectable engines
  mode [m]             Show or set mode (auto|primary|secondary)
  headed <on|off>      Show or hide the browser window
  trace <on|off>       Record page actions and print a replay script
  reset [mode]         Clear engine conversation history
  stats                Show session memory statistics
  history [n]          Show recent successes and failures
  patterns <text>      Show remembered patterns for an instruction
  memory clear         Forget all remembered executions
  config               Show the active configuration
  config save          Write the active configuration to the config file
  config default       Show the default configuration
  config delete        Remove the config file

Anything else is executed as a browser instruction.
─────────────────────────────────────────────"#
        .to_string()
}
