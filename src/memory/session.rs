//! Session memory
//!
//! Durable log of past instructions and their outcomes, plus successful step
//! sequences bucketed by keyword. The whole store is rewritten after every
//! mutation; a failed write is logged and the in-memory state stays current.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::{AutohealError, Config, Result};
use crate::engine::StepRecord;

/// Executions kept before the oldest is evicted
pub const MAX_EXECUTIONS: usize = 100;

/// Patterns kept per keyword before the oldest is evicted
pub const MAX_PATTERNS_PER_KEYWORD: usize = 5;

/// Keywords that turn a successful execution into a remembered pattern
pub const PATTERN_KEYWORDS: [&str; 7] = [
    "search", "login", "click", "fill", "navigate", "extract", "scrape",
];

/// One remembered instruction and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub instruction: String,
    pub success: bool,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: String,
}

/// A successful step sequence remembered under a keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub instruction: String,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    pub timestamp: String,
}

/// Aggregate counts over the remembered executions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_executions: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage in `0.0..=100.0`
    pub success_rate: f64,
    /// Keywords with at least one pattern
    pub pattern_keywords: usize,
}

/// On-disk layout: `{"executions": [...], "patterns": {...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct MemoryStore {
    #[serde(default)]
    executions: VecDeque<ExecutionRecord>,
    #[serde(default)]
    patterns: BTreeMap<String, VecDeque<Pattern>>,
}

fn matched_keywords(instruction: &str) -> impl Iterator<Item = &'static str> {
    let lowered = instruction.to_lowercase();
    PATTERN_KEYWORDS
        .into_iter()
        .filter(move |keyword| lowered.contains(keyword))
}

/// Thread-safe session memory; every mutation is serialized through one lock
#[derive(Debug)]
pub struct SessionMemory {
    path: Option<PathBuf>,
    store: Mutex<MemoryStore>,
}

impl SessionMemory {
    /// Open a file-backed memory; a missing or unreadable store starts empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = match Self::load(&path) {
            Ok(Some(store)) => {
                debug!(
                    path = %path.display(),
                    executions = store.executions.len(),
                    "loaded session memory"
                );
                store
            }
            Ok(None) => MemoryStore::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session memory unreadable, starting empty");
                MemoryStore::default()
            }
        };

        Self {
            path: Some(path),
            store: Mutex::new(store),
        }
    }

    /// Memory that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            store: Mutex::new(MemoryStore::default()),
        }
    }

    /// Memory described by configuration; `None` when memory is disabled
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.memory.enabled {
            return None;
        }
        Some(Self::open(config.memory_path()))
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load(path: &Path) -> Result<Option<MemoryStore>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        let mut store: MemoryStore = serde_json::from_str(&raw)?;

        // Files written by hand may exceed the limits
        while store.executions.len() > MAX_EXECUTIONS {
            store.executions.pop_front();
        }
        for patterns in store.patterns.values_mut() {
            while patterns.len() > MAX_PATTERNS_PER_KEYWORD {
                patterns.pop_front();
            }
        }
        Ok(Some(store))
    }

    /// Write the store through a temp file and rename over the target
    fn write_store(path: &Path, store: &MemoryStore) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(store)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            AutohealError::persistence(format!("Failed to replace {}: {}", path.display(), e))
        })
    }

    fn persist(&self, store: &MemoryStore) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = Self::write_store(path, store) {
            warn!(path = %path.display(), error = %e, "failed to persist session memory");
        }
    }

    /// Remember an execution; successful ones also feed keyword patterns
    pub fn record_execution(
        &self,
        instruction: &str,
        success: bool,
        steps: &[StepRecord],
        error: Option<&str>,
    ) {
        let timestamp = Utc::now().to_rfc3339();
        let mut store = self.store.lock();

        store.executions.push_back(ExecutionRecord {
            instruction: instruction.to_string(),
            success,
            steps: steps.to_vec(),
            error: error.map(str::to_string),
            timestamp: timestamp.clone(),
        });
        while store.executions.len() > MAX_EXECUTIONS {
            store.executions.pop_front();
        }

        if success {
            for keyword in matched_keywords(instruction) {
                let bucket = store.patterns.entry(keyword.to_string()).or_default();
                bucket.push_back(Pattern {
                    instruction: instruction.to_string(),
                    steps: steps.to_vec(),
                    timestamp: timestamp.clone(),
                });
                while bucket.len() > MAX_PATTERNS_PER_KEYWORD {
                    bucket.pop_front();
                }
            }
        }

        self.persist(&store);
    }

    /// Patterns for every keyword in the instruction, in keyword order
    pub fn get_similar_patterns(&self, instruction: &str) -> Vec<Pattern> {
        let store = self.store.lock();
        matched_keywords(instruction)
            .filter_map(|keyword| store.patterns.get(keyword))
            .flat_map(|bucket| bucket.iter().cloned())
            .collect()
    }

    fn recent_where(&self, limit: usize, success: bool) -> Vec<ExecutionRecord> {
        let store = self.store.lock();
        let mut recent: Vec<ExecutionRecord> = store
            .executions
            .iter()
            .rev()
            .filter(|record| record.success == success)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// Most recent successful executions, oldest first
    pub fn get_recent_successes(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.recent_where(limit, true)
    }

    /// Most recent failed executions, oldest first
    pub fn get_recent_failures(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.recent_where(limit, false)
    }

    pub fn get_stats(&self) -> MemoryStats {
        let store = self.store.lock();
        let total = store.executions.len();
        let successful = store.executions.iter().filter(|r| r.success).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64 * 100.0
        };

        MemoryStats {
            total_executions: total,
            successful,
            failed: total - successful,
            success_rate,
            pattern_keywords: store.patterns.values().filter(|p| !p.is_empty()).count(),
        }
    }

    /// Forget everything and persist the empty store
    pub fn clear(&self) {
        let mut store = self.store.lock();
        *store = MemoryStore::default();
        self.persist(&store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(n: usize, tool: &str) -> StepRecord {
        let mut arguments = serde_json::Map::new();
        arguments.insert("url".to_string(), json!("https://example.com"));
        StepRecord::succeeded(n, tool, arguments, None)
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let memory = SessionMemory::in_memory();
        for i in 0..=MAX_EXECUTIONS {
            memory.record_execution(&format!("task {}", i), i % 2 == 0, &[], None);
        }

        let stats = memory.get_stats();
        assert_eq!(stats.total_executions, 100);

        let oldest = memory.get_recent_successes(100);
        assert_eq!(oldest.first().map(|r| r.instruction.as_str()), Some("task 2"));
    }

    #[test]
    fn test_patterns_per_matched_keyword() {
        let memory = SessionMemory::in_memory();
        memory.record_execution(
            "Login and then SEARCH for shoes",
            true,
            &[step(1, "navigate")],
            None,
        );

        let stats = memory.get_stats();
        assert_eq!(stats.pattern_keywords, 2);

        let similar = memory.get_similar_patterns("search for hats");
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].instruction, "Login and then SEARCH for shoes");
        assert_eq!(similar[0].steps.len(), 1);

        assert_eq!(memory.get_similar_patterns("login as admin").len(), 1);
        let both = memory.get_similar_patterns("login then search the catalog");
        assert_eq!(both.len(), 2);
        assert!(both
            .iter()
            .all(|p| p.instruction == "Login and then SEARCH for shoes"));
    }

    #[test]
    fn test_failures_produce_no_patterns() {
        let memory = SessionMemory::in_memory();
        memory.record_execution("click the button", false, &[], Some("not found"));
        assert!(memory.get_similar_patterns("click").is_empty());
        assert_eq!(memory.get_recent_failures(5)[0].error.as_deref(), Some("not found"));
    }

    #[test]
    fn test_pattern_bucket_capped() {
        let memory = SessionMemory::in_memory();
        for i in 0..7 {
            memory.record_execution(&format!("scrape page {}", i), true, &[], None);
        }

        let patterns = memory.get_similar_patterns("scrape");
        assert_eq!(patterns.len(), MAX_PATTERNS_PER_KEYWORD);
        assert_eq!(patterns[0].instruction, "scrape page 2");
        assert_eq!(patterns[4].instruction, "scrape page 6");
    }

    #[test]
    fn test_similar_patterns_keyword_order() {
        let memory = SessionMemory::in_memory();
        memory.record_execution("fill the form", true, &[], None);
        memory.record_execution("search the docs", true, &[], None);

        let patterns = memory.get_similar_patterns("fill then search");
        let instructions: Vec<_> = patterns.iter().map(|p| p.instruction.as_str()).collect();
        assert_eq!(instructions, vec!["search the docs", "fill the form"]);
    }

    #[test]
    fn test_stats_empty_and_stable() {
        let memory = SessionMemory::in_memory();
        let empty = memory.get_stats();
        assert_eq!(empty.success_rate, 0.0);
        assert_eq!(empty.total_executions, 0);

        memory.record_execution("navigate home", true, &[], None);
        memory.record_execution("navigate away", false, &[], Some("timeout"));
        memory.record_execution("navigate back", true, &[], None);
        memory.record_execution("navigate again", true, &[], None);

        let first = memory.get_stats();
        assert_eq!(first, memory.get_stats());
        assert_eq!(first.success_rate, 75.0);
        assert_eq!(first.failed, 1);
    }

    #[test]
    fn test_recent_limits() {
        let memory = SessionMemory::in_memory();
        for i in 0..4 {
            memory.record_execution(&format!("ok {}", i), true, &[], None);
        }
        let recent = memory.get_recent_successes(2);
        let names: Vec<_> = recent.iter().map(|r| r.instruction.as_str()).collect();
        assert_eq!(names, vec!["ok 2", "ok 3"]);
        assert!(memory.get_recent_failures(3).is_empty());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");

        let memory = SessionMemory::open(&path);
        memory.record_execution("login to the portal", true, &[step(1, "fill")], None);
        assert!(path.exists());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["executions"].is_array());
        assert!(raw["patterns"]["login"].is_array());

        let reloaded = SessionMemory::open(&path);
        assert_eq!(reloaded.get_stats(), memory.get_stats());
        assert_eq!(reloaded.get_similar_patterns("login").len(), 1);
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{ not json").unwrap();

        let memory = SessionMemory::open(&path);
        assert_eq!(memory.get_stats().total_executions, 0);

        memory.record_execution("extract prices", true, &[], None);
        assert_eq!(SessionMemory::open(&path).get_stats().total_executions, 1);
    }

    #[test]
    fn test_persist_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let memory = SessionMemory::open(blocker.join("memory.json"));
        memory.record_execution("search again", true, &[], None);

        assert_eq!(memory.get_stats().total_executions, 1);
        assert_eq!(memory.get_similar_patterns("search").len(), 1);
    }

    #[test]
    fn test_clear_persists_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let memory = SessionMemory::open(&path);
        memory.record_execution("click submit", true, &[], None);
        memory.clear();

        assert_eq!(memory.get_stats().total_executions, 0);
        assert!(memory.get_similar_patterns("click").is_empty());
        assert_eq!(SessionMemory::open(&path).get_stats().pattern_keywords, 0);
    }

    #[test]
    fn test_from_config_disabled() {
        let mut config = Config::default();
        config.memory.enabled = false;
        assert!(SessionMemory::from_config(&config).is_none());
    }
}
