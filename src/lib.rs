//! autoheal - Self-Healing Browser Automation
//!
//! Runs natural-language browser instructions on one of two automation
//! engines, falling back from the LLM agent to the snapshot-ref driver when
//! the agent fails, and learning from past executions along the way.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Chat provider abstraction with Ollama and OpenAI-compatible backends
//! - **Browser**: `agent-browser` driver and accessibility snapshots
//! - **Locator**: Ordered locator strategies with one LLM-assisted heal
//! - **Trace**: Recording of primitive page actions
//! - **Memory**: Persistent record of executions and successful patterns
//! - **Engine**: The two engines and the orchestrator in front of them
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use autoheal::{Config, ExecutionMode, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> autoheal::Result<()> {
//!     let orchestrator = Orchestrator::from_config(&Config::load())?;
//!     let result = orchestrator
//!         .execute("search for rust books on example.com", ExecutionMode::Auto, true)
//!         .await;
//!     println!("{}", result.message);
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod core;
pub mod engine;
pub mod llm;
pub mod locator;
pub mod memory;
pub mod trace;

// Re-export commonly used items
pub use cli::Repl;
pub use core::{AutohealError, Config, Result};
pub use engine::{ExecutionMode, ExecutionResult, Orchestrator};
