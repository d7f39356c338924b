//! Core module - shared infrastructure for autoheal
//!
//! Foundational types, configuration, and error handling used throughout the crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ProviderType};
pub use error::{AutohealError, Result};
pub use types::*;
