//! Locator module - element resolution with ordered fallback and healing

pub mod healer;
pub mod resolver;
pub mod strategy;

pub use healer::{HealRequest, HealedResolution, HealingResolver, LlmHealer, StrategyHealer};
pub use resolver::{
    FailureReason, LocatorResolver, NotFound, PageHandle, ResolvedElement, StrategyAttempt,
};
pub use strategy::{ElementQuery, LocatorStrategy};
