//! Uniform contract over the automation backends

use async_trait::async_trait;

use crate::core::Result;
use crate::engine::types::{EngineInfo, EngineKind, ExecutionResult};

/// One automation backend behind the shared execution contract
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Which slot this adapter fills
    fn kind(&self) -> EngineKind;

    /// Caller-facing description
    fn info(&self) -> EngineInfo;

    /// Run a natural-language instruction to completion.
    ///
    /// Ordinary failures come back as `Ok` with `success == false`; an `Err`
    /// means the backend itself broke down (driver missing, service down).
    async fn execute(&self, instruction: &str, headless: bool) -> Result<ExecutionResult>;

    /// Drop conversational state accumulated across instructions
    fn reset(&self);

    /// Release the backend's browser session
    async fn shutdown(&self) -> Result<()>;
}
