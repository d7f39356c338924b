//! In-process browser fake for engine tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::browser::{BrowserDriver, Snapshot};
use crate::core::{AutohealError, Result, ToolResult};
use crate::locator::{LocatorStrategy, PageHandle};

/// Page whose elements are declared up front; every command is logged
#[derive(Default)]
pub(crate) struct FakeBrowser {
    elements: HashMap<LocatorStrategy, String>,
    texts: HashMap<String, String>,
    snapshot: Option<Snapshot>,
    full_snapshot: Option<Snapshot>,
    broken_snapshot: bool,
    uninstalled: bool,
    pub(crate) commands: Mutex<Vec<String>>,
    pub(crate) headless: Mutex<Option<bool>>,
}

impl FakeBrowser {
    pub(crate) fn with_element(mut self, strategy: LocatorStrategy, target: &str) -> Self {
        self.elements.insert(strategy, target.to_string());
        self
    }

    pub(crate) fn with_text(mut self, target: &str, text: &str) -> Self {
        self.texts.insert(target.to_string(), text.to_string());
        self
    }

    pub(crate) fn with_snapshot(mut self, json: serde_json::Value) -> Self {
        self.snapshot = serde_json::from_value(json).ok();
        self
    }

    /// Tree returned for non-interactive snapshots; defaults to the interactive one
    pub(crate) fn with_full_snapshot(mut self, json: serde_json::Value) -> Self {
        self.full_snapshot = serde_json::from_value(json).ok();
        self
    }

    /// Every snapshot fails after being logged
    pub(crate) fn with_broken_snapshot(mut self) -> Self {
        self.broken_snapshot = true;
        self
    }

    pub(crate) fn uninstalled() -> Self {
        Self {
            uninstalled: true,
            ..Default::default()
        }
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn log(&self, command: String) -> Result<()> {
        if self.uninstalled {
            return Err(AutohealError::DriverNotFound);
        }
        self.commands.lock().push(command);
        Ok(())
    }
}

#[async_trait]
impl PageHandle for FakeBrowser {
    async fn probe(&self, strategy: &LocatorStrategy) -> Result<Option<String>> {
        if self.uninstalled {
            return Err(AutohealError::DriverNotFound);
        }
        Ok(self.elements.get(strategy).cloned())
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    fn set_headless(&self, headless: bool) {
        *self.headless.lock() = Some(headless);
    }

    fn as_page(&self) -> &dyn PageHandle {
        self
    }

    async fn open(&self, url: &str) -> Result<ToolResult> {
        self.log(format!("open {}", url))?;
        Ok(ToolResult::success("navigate", format!("Navigated to {}", url)))
    }

    async fn click(&self, target: &str) -> Result<ToolResult> {
        self.log(format!("click {}", target))?;
        Ok(ToolResult::success("click", format!("Clicked {}", target)))
    }

    async fn fill(&self, target: &str, text: &str) -> Result<ToolResult> {
        self.log(format!("fill {} {}", target, text))?;
        Ok(ToolResult::success("fill", format!("Filled {}", target)))
    }

    async fn type_text(&self, target: &str, text: &str) -> Result<ToolResult> {
        self.log(format!("type {} {}", target, text))?;
        Ok(ToolResult::success("type", format!("Typed into {}", target)))
    }

    async fn select(&self, target: &str, value: &str) -> Result<ToolResult> {
        self.log(format!("select {} {}", target, value))?;
        Ok(ToolResult::success("select", format!("Selected {}", value)))
    }

    async fn press(&self, key: &str) -> Result<ToolResult> {
        self.log(format!("press {}", key))?;
        Ok(ToolResult::success("press", format!("Pressed {}", key)))
    }

    async fn wait_for(&self, target: &str) -> Result<ToolResult> {
        self.log(format!("wait {}", target))?;
        Ok(ToolResult::success("wait", format!("{} visible", target)))
    }

    async fn get_text(&self, target: &str) -> Result<String> {
        self.log(format!("get text {}", target))?;
        self.texts
            .get(target)
            .cloned()
            .ok_or_else(|| AutohealError::browser(format!("no text for {}", target)))
    }

    async fn get_title(&self) -> Result<String> {
        Ok(self.texts.get("title").cloned().unwrap_or_default())
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.texts.get("url").cloned().unwrap_or_default())
    }

    async fn screenshot(&self, path: Option<&str>) -> Result<ToolResult> {
        self.log(format!("screenshot {}", path.unwrap_or("-")))?;
        Ok(ToolResult::success("screenshot", "captured"))
    }

    async fn snapshot(&self, interactive_only: bool) -> Result<Snapshot> {
        if interactive_only {
            self.log("snapshot".to_string())?;
        } else {
            self.log("snapshot full".to_string())?;
        }
        if self.broken_snapshot {
            return Err(AutohealError::browser("agent-browser snapshot timed out"));
        }

        let tree = if interactive_only {
            self.snapshot.clone()
        } else {
            self.full_snapshot.clone().or_else(|| self.snapshot.clone())
        };
        Ok(tree.unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        self.log("close".to_string())
    }
}
