//! Memory module - remembered executions and keyword patterns

pub mod session;

pub use session::{
    ExecutionRecord, MemoryStats, Pattern, SessionMemory, MAX_EXECUTIONS,
    MAX_PATTERNS_PER_KEYWORD, PATTERN_KEYWORDS,
};
