//! End-to-end orchestration tests
//!
//! Both engines run against the in-memory page with a scripted chat service,
//! covering healing, fallback, memory and tracing together.

mod common;

use serde_json::json;
use std::sync::Arc;

use autoheal::engine::{EngineKind, ExecutionMode, Orchestrator};
use autoheal::memory::SessionMemory;
use autoheal::trace::ExecutionTracer;

use common::{
    agent_engine, scripted_engine, ScriptedChat, SnapshotPage, AGENT_MODEL, HEALER_MODEL,
    SCRIPTED_MODEL,
};

struct Harness {
    chat: Arc<ScriptedChat>,
    agent_page: Arc<SnapshotPage>,
    scripted_page: Arc<SnapshotPage>,
    memory: Arc<SessionMemory>,
    orchestrator: Orchestrator,
}

fn harness_with(agent_page: Arc<SnapshotPage>, memory: SessionMemory) -> Harness {
    let chat = ScriptedChat::new();
    let scripted_page = SnapshotPage::login_form();
    let memory = Arc::new(memory);
    let tracer = ExecutionTracer::new();

    let primary = agent_engine(&chat, &agent_page)
        .with_memory(memory.clone())
        .with_tracer(tracer.clone());
    let secondary = scripted_engine(&chat, &scripted_page)
        .with_memory(memory.clone())
        .with_tracer(tracer.clone());

    let orchestrator = Orchestrator::new(Arc::new(primary), Arc::new(secondary))
        .with_memory(memory.clone())
        .with_tracer(tracer, true);

    Harness {
        chat,
        agent_page,
        scripted_page,
        memory,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(SnapshotPage::login_form(), SessionMemory::in_memory())
}

fn script_scripted_login(chat: &ScriptedChat) {
    chat.tool(SCRIPTED_MODEL, "navigate", json!({"url": "example.com/login"}));
    chat.tool(SCRIPTED_MODEL, "click_ref", json!({"ref": "e2"}));
    chat.done(SCRIPTED_MODEL, "Clicked Log in");
}

#[tokio::test(start_paused = true)]
async fn test_primary_heals_renamed_button() {
    let h = harness();
    h.chat.tool(AGENT_MODEL, "navigate", json!({"url": "example.com/login"}));
    h.chat.tool(
        AGENT_MODEL,
        "click",
        json!({"role": "button", "name": "Sign in", "description": "login submit button"}),
    );
    h.chat.text(HEALER_MODEL, r#"{"kind": "role", "role": "button", "name": "Log in"}"#);
    h.chat.done(AGENT_MODEL, "Logged in");

    let result = h
        .orchestrator
        .execute("login to example.com", ExecutionMode::Auto, true)
        .await;

    assert!(result.success, "{:?}", result);
    assert_eq!(result.engine_used, EngineKind::Primary);
    assert!(!result.fallback_occurred);
    assert_eq!(
        h.agent_page.commands(),
        vec!["open https://example.com/login", "click @e2"]
    );
    assert!(h.scripted_page.commands().is_empty());
    assert_eq!(h.chat.message_counts(HEALER_MODEL).len(), 1);

    let trace = h.orchestrator.last_trace();
    assert_eq!(trace.total, 2);
    assert_eq!(trace.failed, 0);
    assert!(trace.to_script().contains("click @e2"));

    let patterns = h.memory.get_similar_patterns("login to the admin panel");
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].instruction, "login to example.com");
}

#[tokio::test(start_paused = true)]
async fn test_falls_back_when_primary_service_is_down() {
    let h = harness();
    script_scripted_login(&h.chat);

    let result = h
        .orchestrator
        .execute("login to example.com", ExecutionMode::Auto, true)
        .await;

    assert!(result.success, "{:?}", result);
    assert!(result.fallback_occurred);
    assert_eq!(result.engine_used, EngineKind::Secondary);
    assert!(result
        .message
        .starts_with("Completed via fallback to scripted (agent failed:"));
    assert!(result.message.contains("connection refused for agent-model"));
    assert!(h.scripted_page.commands().contains(&"click @e2".to_string()));

    let stats = h.memory.get_stats();
    assert_eq!(stats.total_executions, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(h.memory.get_recent_failures(5).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_driver_on_primary_falls_back() {
    let h = harness_with(SnapshotPage::missing_binary(), SessionMemory::in_memory());
    h.chat.tool(AGENT_MODEL, "navigate", json!({"url": "example.com"}));
    script_scripted_login(&h.chat);

    let result = h
        .orchestrator
        .execute("open example.com and click log in", ExecutionMode::Auto, true)
        .await;

    assert!(result.success);
    assert!(result.fallback_occurred);
    assert!(result.message.contains("agent-browser not found"));
}

#[tokio::test(start_paused = true)]
async fn test_both_engines_fail_with_combined_error() {
    let h = harness();

    let result = h
        .orchestrator
        .execute("search for rust books", ExecutionMode::Auto, true)
        .await;

    assert!(!result.success);
    assert!(result.fallback_occurred);
    assert_eq!(result.engine_used, EngineKind::Secondary);
    let error = result.error.clone().unwrap_or_default();
    assert!(error.starts_with("agent: "), "{}", error);
    assert!(error.contains(" | scripted: "), "{}", error);
    assert_eq!(result.message, error);
    assert!(h.memory.get_similar_patterns("search").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_primary_only_mode_never_falls_back() {
    let h = harness();
    script_scripted_login(&h.chat);

    let result = h
        .orchestrator
        .execute("login to example.com", ExecutionMode::PrimaryOnly, true)
        .await;

    assert!(!result.success);
    assert!(!result.fallback_occurred);
    assert_eq!(result.engine_used, EngineKind::Primary);
    assert!(h.scripted_page.commands().is_empty());
    assert!(h.chat.message_counts(SCRIPTED_MODEL).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reset_drops_conversation_history() {
    let h = harness();
    script_scripted_login(&h.chat);
    script_scripted_login(&h.chat);
    script_scripted_login(&h.chat);

    for _ in 0..2 {
        let result = h
            .orchestrator
            .execute("login to example.com", ExecutionMode::SecondaryOnly, true)
            .await;
        assert!(result.success);
    }
    h.orchestrator.reset(Some(ExecutionMode::SecondaryOnly));
    h.orchestrator
        .execute("login to example.com", ExecutionMode::SecondaryOnly, true)
        .await;

    // First model call of each run: system + history + user
    let counts = h.chat.message_counts(SCRIPTED_MODEL);
    let firsts: Vec<usize> = counts.iter().step_by(3).copied().collect();
    assert_eq!(firsts, vec![2, 4, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_memory_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session_memory.json");

    {
        let h = harness_with(SnapshotPage::login_form(), SessionMemory::open(&path));
        script_scripted_login(&h.chat);
        let result = h
            .orchestrator
            .execute("login to example.com", ExecutionMode::SecondaryOnly, true)
            .await;
        assert!(result.success);
    }

    let reopened = SessionMemory::open(&path);
    let patterns = reopened.get_similar_patterns("login somewhere else");
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].steps[0].tool_name, "navigate");
    assert_eq!(reopened.get_stats().successful, 1);
}

#[test]
fn test_engine_listing() {
    let h = harness();
    let engines = h.orchestrator.get_available_engines();
    let ids: Vec<&str> = engines.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["auto", "agent", "scripted"]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_both_sessions() {
    let h = harness();
    script_scripted_login(&h.chat);
    h.orchestrator
        .execute("login to example.com", ExecutionMode::SecondaryOnly, true)
        .await;

    h.orchestrator.shutdown().await;

    assert_eq!(h.agent_page.commands(), vec!["close"]);
    assert_eq!(h.scripted_page.commands().last().map(String::as_str), Some("close"));
}

#[test]
fn test_repl_renders_result_and_replay_script() {
    let h = harness();
    script_scripted_login(&h.chat);

    let mut repl = autoheal::Repl::with_orchestrator(h.orchestrator, autoheal::Config::default());
    repl.set_mode(ExecutionMode::SecondaryOnly);
    let output = tokio_test::block_on(repl.execute("login to example.com"));

    assert!(output.starts_with("[OK] via scripted"), "{}", output);
    assert!(output.contains("Trace: 2 actions (2 ok, 0 failed)"));
    assert!(output.contains("open example.com/login"));
    assert!(output.contains("click @e2"));
}
