//! autoheal - Self-Healing Browser Automation
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use anyhow::Context;
use autoheal::{Config, ExecutionMode, Orchestrator, Repl};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// autoheal - Self-Healing Browser Automation
#[derive(Parser, Debug)]
#[command(name = "autoheal")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which engine(s) may run the instruction
    #[arg(long, short = 'm', value_enum)]
    mode: Option<ExecutionMode>,

    /// Run in headed browser mode (visible window)
    #[arg(long)]
    headed: bool,

    /// Single instruction mode (non-interactive, prints JSON)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// List selectable engines and exit
    #[arg(long)]
    engines: bool,

    /// Print session memory statistics and exit
    #[arg(long)]
    stats: bool,

    /// Forget all remembered executions before doing anything else
    #[arg(long)]
    clear_memory: bool,

    /// Write the trace summary of a --prompt run to this file
    #[arg(long, value_name = "PATH")]
    trace_out: Option<PathBuf>,

    /// Cap on reasoning iterations per engine
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default = if debug { "autoheal=debug" } else { "autoheal=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(mode) = args.mode {
        config.engine.default_mode = mode;
    }

    if let Some(max_iterations) = args.max_iterations {
        config.engine.max_iterations = max_iterations;
    }

    if args.debug {
        config.engine.debug = true;
    }

    if args.headed {
        config.browser.headed = true;
    }

    if args.trace_out.is_some() {
        config.engine.trace = true;
    }

    init_logging(config.engine.debug);

    let orchestrator =
        Orchestrator::from_config(&config).context("failed to set up automation engines")?;

    if args.clear_memory {
        if let Some(memory) = orchestrator.memory() {
            memory.clear();
            eprintln!("Session memory cleared.");
        }
    }

    if args.engines {
        println!(
            "{}",
            serde_json::to_string_pretty(&orchestrator.get_available_engines())?
        );
        return Ok(());
    }

    if args.stats {
        match orchestrator.memory() {
            Some(memory) => println!("{}", serde_json::to_string_pretty(&memory.get_stats())?),
            None => println!("Session memory is disabled."),
        }
        return Ok(());
    }

    // Single instruction mode
    if let Some(prompt) = args.prompt {
        let result = orchestrator
            .execute(&prompt, config.engine.default_mode, !config.browser.headed)
            .await;
        orchestrator.shutdown().await;
        println!("{}", serde_json::to_string_pretty(&result)?);

        if let Some(path) = args.trace_out {
            let summary = orchestrator.last_trace();
            std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
                .with_context(|| format!("failed to write trace to {}", path.display()))?;
        }

        if !result.success {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Interactive REPL mode
    let mut repl = Repl::with_orchestrator(orchestrator, config);
    repl.run().await?;

    Ok(())
}
