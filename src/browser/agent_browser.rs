//! Browser driver backed by the agent-browser CLI
//!
//! Every operation is one `agent-browser --session <name> ...` invocation.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::browser::driver::BrowserDriver;
use crate::browser::snapshot::Snapshot;
use crate::core::{AutohealError, Config, Result, ToolResult};
use crate::locator::{LocatorStrategy, PageHandle};

/// Driver for browser automation via agent-browser CLI
pub struct AgentBrowser {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: AtomicBool,
    /// Upper bound for a single command
    command_timeout: Duration,
}

impl AgentBrowser {
    /// Create a new driver for a named session
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            headed: AtomicBool::new(false),
            command_timeout: Duration::from_secs(30),
        }
    }

    /// Create a driver from browser configuration, with a session suffix per engine
    pub fn from_config(config: &Config, suffix: &str) -> Self {
        let driver = Self::new(format!("{}-{}", config.browser.session_name, suffix));
        driver.headed.store(config.browser.headed, Ordering::Relaxed);
        Self {
            command_timeout: Duration::from_millis(config.browser.timeout_ms.max(1)),
            ..driver
        }
    }

    /// Session name used for every command
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Run an agent-browser command
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("agent-browser");
        cmd.args(["--session", &self.session_name]);

        if self.headed.load(Ordering::Relaxed) {
            cmd.arg("--headed");
        }

        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(session = %self.session_name, ?args, "agent-browser command");

        let output = tokio::time::timeout(self.command_timeout, cmd.output())
            .await
            .map_err(|_| {
                AutohealError::browser(format!(
                    "agent-browser {} timed out after {}ms",
                    args.first().copied().unwrap_or_default(),
                    self.command_timeout.as_millis()
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AutohealError::DriverNotFound
                } else {
                    AutohealError::browser(format!("Failed to run agent-browser: {}", e))
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(AutohealError::browser(format!(
                "agent-browser command failed: {}",
                stderr.trim()
            )))
        }
    }

    /// Run a command and return JSON output
    async fn run_json_command(&self, args: &[&str]) -> Result<String> {
        let mut full_args: Vec<&str> = args.to_vec();
        full_args.push("--json");
        self.run_command(&full_args).await
    }
}

impl Default for AgentBrowser {
    fn default() -> Self {
        Self::new("autoheal")
    }
}

#[async_trait]
impl PageHandle for AgentBrowser {
    async fn probe(&self, strategy: &LocatorStrategy) -> Result<Option<String>> {
        if let Some(selector) = strategy.driver_selector() {
            let output = self.run_command(&["is", "visible", &selector]).await?;
            return Ok((output.trim() == "true").then_some(selector));
        }

        locate_in_tree(self, strategy).await
    }
}

/// Match a semantic strategy against the interactive tree first, then the
/// full tree. `snapshot -i` leaves out headings and static text.
pub(crate) async fn locate_in_tree(
    driver: &dyn BrowserDriver,
    strategy: &LocatorStrategy,
) -> Result<Option<String>> {
    if let Some(target) = driver.snapshot(true).await?.locate(strategy) {
        return Ok(Some(target));
    }
    Ok(driver.snapshot(false).await?.locate(strategy))
}

#[async_trait]
impl BrowserDriver for AgentBrowser {
    fn set_headless(&self, headless: bool) {
        self.headed.store(!headless, Ordering::Relaxed);
    }

    fn as_page(&self) -> &dyn PageHandle {
        self
    }

    async fn open(&self, url: &str) -> Result<ToolResult> {
        self.run_command(&["open", url]).await?;

        // Network idle is best effort; some pages never settle
        let _ = self.run_command(&["wait", "--load", "networkidle"]).await;

        let title = self.get_title().await.unwrap_or_default();
        Ok(ToolResult::success(
            "navigate",
            format!("Navigated to {} (title: \"{}\")", url, title),
        ))
    }

    async fn click(&self, target: &str) -> Result<ToolResult> {
        self.run_command(&["click", target]).await?;
        Ok(ToolResult::success("click", format!("Clicked {}", target)))
    }

    async fn fill(&self, target: &str, text: &str) -> Result<ToolResult> {
        self.run_command(&["fill", target, text]).await?;
        Ok(ToolResult::success(
            "fill",
            format!("Filled {} with '{}'", target, text),
        ))
    }

    async fn type_text(&self, target: &str, text: &str) -> Result<ToolResult> {
        self.run_command(&["type", target, text]).await?;
        Ok(ToolResult::success(
            "type",
            format!("Typed '{}' into {}", text, target),
        ))
    }

    async fn select(&self, target: &str, value: &str) -> Result<ToolResult> {
        self.run_command(&["select", target, value]).await?;
        Ok(ToolResult::success(
            "select",
            format!("Selected '{}' in {}", value, target),
        ))
    }

    async fn press(&self, key: &str) -> Result<ToolResult> {
        self.run_command(&["press", key]).await?;
        Ok(ToolResult::success("press", format!("Pressed {}", key)))
    }

    async fn wait_for(&self, target: &str) -> Result<ToolResult> {
        self.run_command(&["wait", target]).await?;
        Ok(ToolResult::success(
            "wait",
            format!("Element {} is now visible", target),
        ))
    }

    async fn get_text(&self, target: &str) -> Result<String> {
        self.run_command(&["get", "text", target])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn get_title(&self) -> Result<String> {
        self.run_command(&["get", "title"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn get_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn screenshot(&self, path: Option<&str>) -> Result<ToolResult> {
        let mut args = vec!["screenshot"];
        if let Some(p) = path {
            args.push(p);
        }

        let output = self.run_command(&args).await?;
        let message = match path {
            Some(p) => format!("Screenshot saved to {}", p),
            None => format!("Screenshot captured: {}", output.trim()),
        };
        Ok(ToolResult::success("screenshot", message))
    }

    async fn snapshot(&self, interactive_only: bool) -> Result<Snapshot> {
        let args: &[&str] = if interactive_only {
            &["snapshot", "-i"]
        } else {
            &["snapshot"]
        };

        let output = self.run_json_command(args).await?;
        serde_json::from_str(&output)
            .map_err(|e| AutohealError::browser(format!("Unreadable snapshot: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeBrowser;
    use serde_json::json;

    fn example_domain() -> FakeBrowser {
        FakeBrowser::default()
            .with_snapshot(json!({
                "success": true,
                "data": {
                    "snapshot": "- link \"More information...\" [ref=e2]",
                    "refs": {"e2": {"role": "link", "name": "More information..."}}
                }
            }))
            .with_full_snapshot(json!({
                "success": true,
                "data": {
                    "snapshot": "- heading \"Example Domain\" [ref=e1]\n- link \"More information...\" [ref=e2]",
                    "refs": {
                        "e1": {"role": "heading", "name": "Example Domain"},
                        "e2": {"role": "link", "name": "More information..."}
                    }
                }
            }))
    }

    #[tokio::test]
    async fn test_static_text_found_in_full_tree() {
        let page = example_domain();

        let heading = locate_in_tree(&page, &LocatorStrategy::text("Example Domain"))
            .await
            .unwrap();
        assert_eq!(heading.as_deref(), Some("@e1"));

        let by_role = LocatorStrategy::Role {
            role: "heading".to_string(),
            name: None,
        };
        assert_eq!(
            locate_in_tree(&page, &by_role).await.unwrap().as_deref(),
            Some("@e1")
        );
        assert_eq!(
            page.commands(),
            vec!["snapshot", "snapshot full", "snapshot", "snapshot full"]
        );
    }

    #[tokio::test]
    async fn test_interactive_match_skips_full_tree() {
        let page = example_domain();

        let link = locate_in_tree(&page, &LocatorStrategy::role("link", "More information"))
            .await
            .unwrap();
        assert_eq!(link.as_deref(), Some("@e2"));
        assert_eq!(page.commands(), vec!["snapshot"]);

        let missing = locate_in_tree(&page, &LocatorStrategy::text("Checkout"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_driver_creation() {
        let driver = AgentBrowser::new("test-session");
        assert_eq!(driver.session_name(), "test-session");
        assert!(!driver.headed.load(Ordering::Relaxed));

        driver.set_headless(false);
        assert!(driver.headed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_from_config_suffixes_session() {
        let mut config = Config::default();
        config.browser.session_name = "run".to_string();
        config.browser.headed = true;
        config.browser.timeout_ms = 1500;

        let driver = AgentBrowser::from_config(&config, "agent");
        assert_eq!(driver.session_name(), "run-agent");
        assert!(driver.headed.load(Ordering::Relaxed));
        assert_eq!(driver.command_timeout, Duration::from_millis(1500));
    }
}
