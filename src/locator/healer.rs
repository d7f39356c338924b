//! Locator healing
//!
//! When every recorded strategy fails, the element is described in plain words
//! and an LLM is asked for one fresh strategy. Resolution is retried exactly once
//! with the augmented set.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::{AutohealError, Message, Result};
use crate::llm::{GenerateOptions, LLMProvider};
use crate::locator::resolver::{LocatorResolver, NotFound, PageHandle, ResolvedElement, StrategyAttempt};
use crate::locator::strategy::LocatorStrategy;

/// What the healer knows about the element that went missing
#[derive(Debug, Clone)]
pub struct HealRequest {
    /// What the element is ("\"Sign in\" button")
    pub description: String,
    /// What it is used for ("submit the login form")
    pub purpose: String,
    /// Strategies that already failed
    pub failed: Vec<StrategyAttempt>,
    /// Optional accessibility snapshot of the current page
    pub page_context: Option<String>,
}

impl HealRequest {
    pub fn new(description: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            purpose: purpose.into(),
            failed: Vec::new(),
            page_context: None,
        }
    }

    /// The synthesized instruction routed through the LLM
    pub fn instruction(&self) -> String {
        format!("find the {} used to {}", self.description, self.purpose)
    }
}

/// Source of replacement strategies
#[async_trait]
pub trait StrategyHealer: Send + Sync {
    /// Propose one new strategy, or `None` when the element cannot be re-identified
    async fn heal(&self, request: &HealRequest) -> Result<Option<LocatorStrategy>>;
}

/// Healer that asks the LLM chat service for a strategy in JSON form
pub struct LlmHealer {
    llm: Arc<dyn LLMProvider>,
    model: String,
}

impl LlmHealer {
    pub fn new(llm: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    fn build_prompt(request: &HealRequest) -> String {
        let mut prompt = String::new();
        prompt.push_str("A page element could not be located. Task: ");
        prompt.push_str(&request.instruction());
        prompt.push_str(".\n\nStrategies that failed:\n");
        for attempt in &request.failed {
            prompt.push_str(&format!("- {} ({})\n", attempt.strategy, attempt.reason));
        }
        if let Some(context) = &request.page_context {
            prompt.push_str("\nCurrent page elements:\n");
            prompt.push_str(context);
            prompt.push('\n');
        }
        prompt.push_str(
            "\nReply with ONE JSON object describing a new locator and nothing else. Allowed shapes:\n\
             {\"kind\":\"role\",\"role\":\"button\",\"name\":\"...\"}\n\
             {\"kind\":\"label\",\"text\":\"...\"}\n\
             {\"kind\":\"placeholder\",\"text\":\"...\"}\n\
             {\"kind\":\"text\",\"text\":\"...\",\"exact\":false}\n\
             {\"kind\":\"test_id\",\"id\":\"...\"}\n\
             {\"kind\":\"css\",\"selector\":\"...\"}\n\
             {\"kind\":\"xpath\",\"expression\":\"...\"}\n\
             Reply with {\"kind\":\"none\"} if the element is not on the page.",
        );
        prompt
    }

    /// Pull the first JSON object out of a model reply
    pub(crate) fn parse_reply(reply: &str) -> Result<Option<LocatorStrategy>> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let json = match (start, end) {
            (Some(s), Some(e)) if e > s => &reply[s..=e],
            _ => return Err(AutohealError::locator("healer reply contained no JSON object")),
        };

        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("kind").and_then(|k| k.as_str()) == Some("none") {
            return Ok(None);
        }

        let strategy = serde_json::from_value(value)
            .map_err(|e| AutohealError::locator(format!("healer proposed an invalid locator: {}", e)))?;
        Ok(Some(strategy))
    }
}

#[async_trait]
impl StrategyHealer for LlmHealer {
    async fn heal(&self, request: &HealRequest) -> Result<Option<LocatorStrategy>> {
        let messages = vec![
            Message::system("You repair broken UI element locators for browser automation."),
            Message::user(Self::build_prompt(request)),
        ];

        let response = self
            .llm
            .chat(
                &self.model,
                &messages,
                Some(GenerateOptions {
                    temperature: Some(0.0),
                    ..Default::default()
                }),
            )
            .await?;

        Self::parse_reply(&response.content)
    }
}

/// Successful resolution, possibly after healing
#[derive(Debug, Clone)]
pub struct HealedResolution {
    pub element: ResolvedElement,
    /// Strategy contributed by the healer, when healing took place
    pub healed_with: Option<LocatorStrategy>,
}

impl HealedResolution {
    pub fn healed(&self) -> bool {
        self.healed_with.is_some()
    }
}

/// Escalation ladder: strategies in order, then at most one heal-and-retry
enum HealState {
    Initial,
    Healing(NotFound),
    Resolved(HealedResolution),
    Exhausted(NotFound),
}

/// Resolver with a single healing attempt on total failure
pub struct HealingResolver {
    resolver: LocatorResolver,
    healer: Option<Arc<dyn StrategyHealer>>,
    timeout_per_strategy: Duration,
}

impl HealingResolver {
    pub fn new(
        resolver: LocatorResolver,
        healer: Option<Arc<dyn StrategyHealer>>,
        timeout_per_strategy: Duration,
    ) -> Self {
        Self {
            resolver,
            healer,
            timeout_per_strategy,
        }
    }

    /// Resolve `strategies`, healing once through `request` if all of them fail
    pub async fn resolve(
        &self,
        strategies: &[LocatorStrategy],
        page: &dyn PageHandle,
        request: Option<HealRequest>,
    ) -> std::result::Result<HealedResolution, NotFound> {
        let mut state = HealState::Initial;

        loop {
            state = match state {
                HealState::Initial => {
                    match self
                        .resolver
                        .resolve(strategies, page, self.timeout_per_strategy)
                        .await
                    {
                        Ok(element) => HealState::Resolved(HealedResolution {
                            element,
                            healed_with: None,
                        }),
                        Err(not_found) if self.healer.is_some() && request.is_some() => {
                            HealState::Healing(not_found)
                        }
                        Err(not_found) => HealState::Exhausted(not_found),
                    }
                }
                HealState::Healing(not_found) => {
                    self.heal_once(strategies, page, request.clone(), not_found)
                        .await
                }
                HealState::Resolved(resolution) => return Ok(resolution),
                HealState::Exhausted(not_found) => return Err(not_found),
            };
        }
    }

    async fn heal_once(
        &self,
        strategies: &[LocatorStrategy],
        page: &dyn PageHandle,
        request: Option<HealRequest>,
        not_found: NotFound,
    ) -> HealState {
        let (Some(healer), Some(mut request)) = (self.healer.as_ref(), request) else {
            return HealState::Exhausted(not_found);
        };
        request.failed = not_found.attempts.clone();

        info!(instruction = %request.instruction(), "healing locator");
        let fresh = match healer.heal(&request).await {
            Ok(Some(strategy)) => strategy,
            Ok(None) => {
                warn!("healer could not re-identify the element");
                return HealState::Exhausted(not_found);
            }
            Err(e) => {
                warn!(error = %e, "healer failed");
                return HealState::Exhausted(not_found);
            }
        };

        // Healed strategy goes first; the recorded ones stay as fallbacks.
        let mut augmented = Vec::with_capacity(strategies.len() + 1);
        augmented.push(fresh.clone());
        augmented.extend(strategies.iter().filter(|s| **s != fresh).cloned());
        debug!(strategy = %fresh, total = augmented.len(), "retrying with healed strategy set");

        match self
            .resolver
            .resolve(&augmented, page, self.timeout_per_strategy)
            .await
        {
            Ok(element) => HealState::Resolved(HealedResolution {
                element,
                healed_with: Some(fresh),
            }),
            Err(retry) => {
                let mut attempts = not_found.attempts;
                attempts.extend(retry.attempts);
                HealState::Exhausted(NotFound { attempts })
            }
        }
    }
}
