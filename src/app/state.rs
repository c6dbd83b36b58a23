// ABOUTME: Central application state shared between collector and render loop
// Snapshot fields behind per-field mutexes, swapped wholesale each poll pass

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use super::config::AppConfig;
use crate::data::history::WorkHistoryEntry;
use crate::data::logs::LogEntry;
use crate::data::phase::PhaseLadder;
use crate::data::projects::ProjectRegistry;
use crate::data::session::SessionInfo;
use crate::data::status::{AgentState, ProjectMeta};
use crate::data::token::TokenSummary;

#[derive(Debug)]
pub struct AppState {
    pub agents: Arc<Mutex<Vec<AgentState>>>,
    pub subagents: Arc<Mutex<Vec<AgentState>>>,
    pub project_meta: Arc<Mutex<ProjectMeta>>,
    pub token_summary: Arc<Mutex<TokenSummary>>,
    pub session: Arc<Mutex<SessionInfo>>,
    pub phases: Arc<Mutex<PhaseLadder>>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
    pub history: Arc<Mutex<Vec<WorkHistoryEntry>>>,
    pub registry: Arc<Mutex<ProjectRegistry>>,
    pub last_update: Arc<Mutex<DateTime<Utc>>>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            agents: Arc::new(Mutex::new(Vec::new())),
            subagents: Arc::new(Mutex::new(Vec::new())),
            project_meta: Arc::new(Mutex::new(ProjectMeta::default())),
            token_summary: Arc::new(Mutex::new(TokenSummary::default())),
            session: Arc::new(Mutex::new(SessionInfo::default())),
            phases: Arc::new(Mutex::new(PhaseLadder::default())),
            logs: Arc::new(Mutex::new(Vec::new())),
            history: Arc::new(Mutex::new(Vec::new())),
            registry: Arc::new(Mutex::new(ProjectRegistry::default())),
            last_update: Arc::new(Mutex::new(Utc::now())),
            config,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Tick,
    /// The usage log changed on disk; reload is debounced by the collector.
    UsageFileChanged,
    /// A poll pass finished and snapshots were republished.
    Refreshed,
    Input(crossterm::event::KeyEvent),
    Resize(u16, u16),
    Quit,
}
