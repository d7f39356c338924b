//! Configuration management for autoheal
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/autoheal/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{AutohealError, Result};
use crate::engine::ExecutionMode;

/// Main configuration for autoheal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM service configuration
    pub llm: LlmConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Browser configuration
    pub browser: BrowserConfig,
    /// Engine configuration
    pub engine: EngineConfig,
    /// Session memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Locator resolution configuration
    #[serde(default)]
    pub locator: LocatorConfig,
}

/// Which LLM backend drives the engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local Ollama server
    Ollama,
    /// OpenAI-compatible chat completions API
    OpenAi,
}

/// LLM service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider backend
    pub provider: ProviderType,
    /// Ollama host address (default: localhost)
    pub host: String,
    /// Ollama port number (default: 11434)
    pub port: u16,
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,
    /// API key for the OpenAI-compatible API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model driving the primary (agent) engine
    pub primary: String,
    /// Model driving the secondary (scripted) engine
    pub secondary: String,
    /// Model used to regenerate locators while healing
    pub healer: String,
}

/// Browser automation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Session name prefix for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Default timeout for browser commands in ms
    pub timeout_ms: u64,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mode used when the caller does not pick one
    pub default_mode: ExecutionMode,
    /// Hard cap on reasoning loop iterations
    /// Default: 30
    pub max_iterations: usize,
    /// Whether tracing of primitive actions is enabled
    pub trace: bool,
    /// Whether to show debug output
    pub debug: bool,
}

/// Session memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether executions are remembered at all
    pub enabled: bool,
    /// Override for the JSON store location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Locator resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Time each strategy gets to become actionable, in ms
    pub timeout_per_strategy_ms: u64,
    /// Delay between probes of a single strategy, in ms
    pub poll_interval_ms: u64,
    /// Whether a failed strategy set may be healed through the LLM
    pub healing: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

impl Default for LlmConfig {
    fn default() -> Self {
        let provider = match env::var("AUTOHEAL_PROVIDER").as_deref() {
            Ok("openai") => ProviderType::OpenAi,
            _ => ProviderType::Ollama,
        };

        Self {
            provider,
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            api_base: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary: env::var("AUTOHEAL_PRIMARY_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            secondary: env::var("AUTOHEAL_SECONDARY_MODEL")
                .unwrap_or_else(|_| "qwen3:8b".to_string()),
            healer: env::var("AUTOHEAL_HEALER_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            session_name: env::var("AUTOHEAL_BROWSER_SESSION")
                .unwrap_or_else(|_| "autoheal".to_string()),
            headed: env_flag("AUTOHEAL_BROWSER_HEADED", false),
            timeout_ms: 30000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: ExecutionMode::Auto,
            max_iterations: 30,
            trace: env_flag("AUTOHEAL_TRACE", true),
            debug: env_flag("AUTOHEAL_DEBUG", false),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: env_flag("AUTOHEAL_MEMORY", true),
            path: env::var("AUTOHEAL_MEMORY_PATH").ok().map(PathBuf::from),
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            timeout_per_strategy_ms: 5000,
            poll_interval_ms: 250,
            healing: true,
        }
    }
}

impl LocatorConfig {
    /// Per-strategy timeout as a duration
    pub fn timeout_per_strategy(&self) -> Duration {
        Duration::from_millis(self.timeout_per_strategy_ms)
    }

    /// Probe interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autoheal")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        // Fall back to defaults (which respect env vars)
        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(AutohealError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| AutohealError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AutohealError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| AutohealError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AutohealError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| AutohealError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Save configuration and return the path
    pub fn save_and_get_path(&self) -> Result<PathBuf> {
        self.save()?;
        Ok(Self::config_file())
    }

    /// Check if a config file exists
    pub fn config_exists() -> bool {
        Self::config_file().exists()
    }

    /// Delete the config file
    pub fn delete_config() -> Result<()> {
        let config_path = Self::config_file();
        if config_path.exists() {
            fs::remove_file(&config_path)
                .map_err(|e| AutohealError::config(format!("Failed to delete config: {}", e)))?;
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.llm.host, self.llm.port)
    }

    /// Location of the session memory store
    pub fn memory_path(&self) -> PathBuf {
        self.memory.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("autoheal")
                .join("session_memory.json")
        })
    }

    /// Check that everything needed to build the engines is present
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider == ProviderType::OpenAi && self.llm.api_key.is_none() {
            return Err(AutohealError::config(
                "OpenAI provider selected but OPENAI_API_KEY is not set",
            ));
        }

        if self.engine.max_iterations == 0 {
            return Err(AutohealError::config("engine.max_iterations must be > 0"));
        }

        if self.locator.timeout_per_strategy_ms == 0 {
            return Err(AutohealError::config(
                "locator.timeout_per_strategy_ms must be > 0",
            ));
        }

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
