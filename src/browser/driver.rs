//! Browser driver abstraction
//!
//! The engines only talk to the browser through this trait. Targets are opaque
//! driver selectors: `@e3` snapshot refs, CSS selectors or `xpath=` expressions.

use async_trait::async_trait;

use crate::browser::snapshot::Snapshot;
use crate::core::{Result, ToolResult};
use crate::locator::PageHandle;

/// Primitive browser operations used by the engines
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Switch between headless and headed runs for subsequent commands
    fn set_headless(&self, headless: bool);

    /// View of this driver as a probe target for the locator resolver
    fn as_page(&self) -> &dyn PageHandle;

    /// Navigate to a URL
    async fn open(&self, url: &str) -> Result<ToolResult>;

    /// Click an element
    async fn click(&self, target: &str) -> Result<ToolResult>;

    /// Replace the value of an input
    async fn fill(&self, target: &str, text: &str) -> Result<ToolResult>;

    /// Type text key by key into an element
    async fn type_text(&self, target: &str, text: &str) -> Result<ToolResult>;

    /// Choose an option of a select element
    async fn select(&self, target: &str, value: &str) -> Result<ToolResult>;

    /// Press a key on the focused element
    async fn press(&self, key: &str) -> Result<ToolResult>;

    /// Wait for an element to become visible
    async fn wait_for(&self, target: &str) -> Result<ToolResult>;

    /// Text content of an element
    async fn get_text(&self, target: &str) -> Result<String>;

    /// Current page title
    async fn get_title(&self) -> Result<String>;

    /// Current page URL
    async fn get_url(&self) -> Result<String>;

    /// Save a screenshot, optionally to a given path
    async fn screenshot(&self, path: Option<&str>) -> Result<ToolResult>;

    /// Accessibility snapshot of the page
    async fn snapshot(&self, interactive_only: bool) -> Result<Snapshot>;

    /// Close the browser session
    async fn close(&self) -> Result<()>;
}
