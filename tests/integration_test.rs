use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use wavedash::data::status::StatusTracker;
use wavedash::data::token::TokenTracker;
use wavedash::{AppConfig, AppState};

#[test]
fn test_app_state_creation() {
    let config = AppConfig::default();
    let state = AppState::new(config);

    assert!(state.agents.lock().unwrap().is_empty());
    assert!(state.history.lock().unwrap().is_empty());
    let summary = state.token_summary.lock().unwrap();
    assert_eq!(summary.total_tokens, 0);
}

#[test]
fn test_config_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.refresh_rate, 2);
    assert!(!config.debug);
    assert!(!config.json_output);
}

#[test]
fn test_status_and_tokens_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc::now();

    let agents_path = dir.path().join("active-agents.json");
    fs::write(
        &agents_path,
        r#"{
            "project": "demo",
            "currentPhase": 1,
            "agents": [
                {"name": "builder", "model": "claude-sonnet-4-5", "task": "compile", "status": "running"}
            ],
            "roster": []
        }"#,
    )
    .unwrap();

    let usage_path = dir.path().join("usage.json");
    fs::write(
        &usage_path,
        r#"{"records": [
            {"model": "claude-sonnet-4-5", "inputTokens": 1000, "outputTokens": 500}
        ]}"#,
    )
    .unwrap();

    let mut status = StatusTracker::new(agents_path);
    status.poll(now);
    let agents = status.agents();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].name, "builder");
    assert_eq!(status.meta().project.as_deref(), Some("demo"));

    let mut token = TokenTracker::new();
    token.load(&usage_path).unwrap();
    let summary = token.summary();
    assert_eq!(summary.total_tokens, 1500);
    assert!(summary.cost_estimate > 0.0);
}

#[test]
fn test_config_paths_follow_dev_root() {
    let config = AppConfig {
        dev_root: PathBuf::from("/srv/dev"),
        ..AppConfig::default()
    };
    assert!(config
        .active_agents_path()
        .starts_with(PathBuf::from("/srv/dev")));
    assert!(config.usage_path().ends_with("tokens/usage.json"));
}
