//! Ordered locator resolution
//!
//! Tries strategies strictly in the order given. Each strategy gets its own
//! timeout window; the first one whose element becomes actionable wins.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::Result;
use crate::locator::strategy::LocatorStrategy;

/// A live page that can be probed for elements
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Probe once. `Ok(Some(target))` means an actionable element matched and
    /// `target` is the driver selector to act on it.
    async fn probe(&self, strategy: &LocatorStrategy) -> Result<Option<String>>;
}

/// Why a single strategy did not resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Nothing actionable matched within the window
    Timeout(u64),
    /// The last probe inside the window failed
    ProbeError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(ms) => write!(f, "not actionable within {}ms", ms),
            Self::ProbeError(e) => write!(f, "probe failed: {}", e),
        }
    }
}

/// One strategy that was tried and failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: LocatorStrategy,
    pub reason: FailureReason,
}

/// Element found by one of the strategies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedElement {
    /// Driver selector to act on
    pub target: String,
    /// Strategy that resolved
    pub strategy: LocatorStrategy,
    /// Index of the winning strategy in the input
    pub index: usize,
    /// Strategies tried before the winner
    pub attempts: Vec<StrategyAttempt>,
}

/// Every strategy was exhausted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotFound {
    pub attempts: Vec<StrategyAttempt>,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "no element found: no strategies given");
        }
        let noun = if self.attempts.len() == 1 { "strategy" } else { "strategies" };
        write!(f, "no element found after {} {}: ", self.attempts.len(), noun)?;
        for (i, attempt) in self.attempts.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "[{}] {}", attempt.strategy, attempt.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for NotFound {}

/// Runs strategies in order against a page
#[derive(Debug, Clone)]
pub struct LocatorResolver {
    poll_interval: Duration,
}

impl LocatorResolver {
    /// Create a resolver that re-probes every `poll_interval`
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Resolve the first strategy whose element becomes actionable
    pub async fn resolve(
        &self,
        strategies: &[LocatorStrategy],
        page: &dyn PageHandle,
        timeout_per_strategy: Duration,
    ) -> std::result::Result<ResolvedElement, NotFound> {
        let mut attempts = Vec::with_capacity(strategies.len());

        for (index, strategy) in strategies.iter().enumerate() {
            debug!(%strategy, index, "trying locator strategy");

            match self.wait_actionable(strategy, page, timeout_per_strategy).await {
                Ok(target) => {
                    info!(%strategy, %target, index, "element resolved");
                    return Ok(ResolvedElement {
                        target,
                        strategy: strategy.clone(),
                        index,
                        attempts,
                    });
                }
                Err(reason) => {
                    debug!(%strategy, %reason, "locator strategy failed");
                    attempts.push(StrategyAttempt {
                        strategy: strategy.clone(),
                        reason,
                    });
                }
            }
        }

        warn!(attempted = attempts.len(), "all locator strategies exhausted");
        Err(NotFound { attempts })
    }

    /// Poll one strategy until it resolves or its own window closes
    async fn wait_actionable(
        &self,
        strategy: &LocatorStrategy,
        page: &dyn PageHandle,
        window: Duration,
    ) -> std::result::Result<String, FailureReason> {
        let mut last_error: Option<String> = None;

        let polled = tokio::time::timeout(window, async {
            loop {
                match page.probe(strategy).await {
                    Ok(Some(target)) => return target,
                    Ok(None) => {}
                    Err(e) => last_error = Some(e.to_string()),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        })
        .await;

        match polled {
            Ok(target) => Ok(target),
            Err(_) => Err(match last_error {
                Some(e) => FailureReason::ProbeError(e),
                None => FailureReason::Timeout(window.as_millis() as u64),
            }),
        }
    }
}

impl Default for LocatorResolver {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}
