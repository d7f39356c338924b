//! Browser module
//!
//! Driver abstraction plus the agent-browser CLI implementation.

mod agent_browser;
mod driver;
mod snapshot;

pub use agent_browser::AgentBrowser;
pub use driver::BrowserDriver;
pub use snapshot::{Element, Snapshot, SnapshotData};
