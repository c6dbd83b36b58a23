// ABOUTME: Background data collection driving every tracker on one interval
// Runs as a tokio task so file polling never blocks the render loop

use crate::app::state::{AppEvent, AppState};
use crate::data::history::HistoryTracker;
use crate::data::logs::LogTracker;
use crate::data::phase::PhaseTracker;
use crate::data::projects::ProjectTracker;
use crate::data::session::SessionTracker;
use crate::data::status::{AgentStatus, StatusTracker};
use crate::data::subagent::SubagentTracker;
use crate::data::token::TokenTracker;
use crate::utils::cost::CostModel;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

/// Usage log reloads wait this long after the last write event so a burst
/// of appends costs one reparse.
const USAGE_RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

pub struct DataCollector {
    state: Arc<AppState>,
    event_tx: Sender<AppEvent>,
    shutdown_rx: Receiver<()>,
    usage_rx: Receiver<AppEvent>,
    _usage_watcher: Option<notify::RecommendedWatcher>,
    usage_path: PathBuf,
    usage_changed_at: Option<Instant>,

    status: StatusTracker,
    token: TokenTracker,
    subagent: SubagentTracker,
    session: SessionTracker,
    phase: PhaseTracker,
    logs: LogTracker,
    projects: ProjectTracker,
    history: HistoryTracker,
}

impl DataCollector {
    pub fn new(
        state: Arc<AppState>,
        event_tx: Sender<AppEvent>,
        shutdown_rx: Receiver<()>,
    ) -> Result<Self> {
        let config = &state.config;
        let usage_path = config.usage_path();

        let mut cost_model = CostModel::new();
        if let Some(rates_path) = &config.model_rates {
            match CostModel::load_from_json(rates_path) {
                Ok(model) => cost_model = model,
                Err(e) => debug!("model rate table not loaded: {}", e),
            }
        }

        let mut token = TokenTracker::with_cost_model(cost_model);
        if let Err(e) = token.load(&usage_path) {
            debug!("usage log not loaded yet: {}", e);
        }

        // The watcher only signals; the actual reload is debounced here.
        let (usage_tx, usage_rx) = bounded::<AppEvent>(16);
        let usage_watcher = match TokenTracker::watch(&usage_path, usage_tx) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                debug!("usage log watch unavailable, falling back to polling: {}", e);
                None
            }
        };

        Ok(Self {
            status: StatusTracker::new(config.active_agents_path()),
            token,
            subagent: SubagentTracker::new(config.transcripts_dir()),
            session: SessionTracker::new(config.todos_dir(), config.transcripts_dir()),
            phase: PhaseTracker::new(config.phase_state_path(), config.project_path.clone()),
            logs: LogTracker::new(config.transcripts_dir()),
            projects: ProjectTracker::new(config.projects_path()),
            history: HistoryTracker::load(config.work_history_path()),
            state,
            event_tx,
            shutdown_rx,
            usage_rx,
            _usage_watcher: usage_watcher,
            usage_path,
            usage_changed_at: None,
        })
    }

    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(self.state.config.refresh_rate.max(1)));

        loop {
            ticker.tick().await;

            if self.shutdown_rx.try_recv().is_ok() {
                self.history.flush_now();
                return;
            }

            self.collect(Utc::now());
        }
    }

    fn collect(&mut self, now: DateTime<Utc>) {
        // Drain watcher signals; the newest one restarts the debounce window.
        while let Ok(AppEvent::UsageFileChanged) = self.usage_rx.try_recv() {
            self.usage_changed_at = Some(Instant::now());
        }
        if self
            .usage_changed_at
            .is_some_and(|at| at.elapsed() >= USAGE_RELOAD_DEBOUNCE)
        {
            self.token.reload(&self.usage_path);
            self.usage_changed_at = None;
        } else if !self.token.is_loaded() {
            self.token.reload(&self.usage_path);
        }

        let transitions = self.status.poll(now);
        for t in &transitions {
            debug!("agent {} moved {:?} -> {:?}", t.name, t.from, t.to);
        }

        let agents = self.status.agents();
        let meta = self.status.meta().clone();

        self.subagent.scan(now);
        let subagents = self.subagent.subagents(now);

        let session_info = self.session.poll(now);
        let phases = self.phase.poll(&meta);
        let logs = self.logs.recent_logs();
        self.projects.poll();

        // Token window follows the project lifecycle when one is active.
        self.token
            .set_time_window(meta.project_started_at, meta.project_ended_at);
        let token_summary = self.token.summary();

        self.update_history(&meta, &agents, &subagents, &session_info.session_id, now);

        *self.state.agents.lock().unwrap() = agents;
        *self.state.subagents.lock().unwrap() = subagents;
        *self.state.project_meta.lock().unwrap() = meta;
        *self.state.token_summary.lock().unwrap() = token_summary;
        *self.state.session.lock().unwrap() = session_info;
        *self.state.phases.lock().unwrap() = phases;
        *self.state.logs.lock().unwrap() = logs;
        *self.state.registry.lock().unwrap() = self.projects.registry().clone();
        *self.state.history.lock().unwrap() = self.history.all_history(50);
        *self.state.last_update.lock().unwrap() = now;

        let _ = self.event_tx.send(AppEvent::Refreshed);
    }

    fn update_history(
        &mut self,
        meta: &crate::data::status::ProjectMeta,
        agents: &[crate::data::status::AgentState],
        subagents: &[crate::data::status::AgentState],
        session_id: &str,
        now: DateTime<Utc>,
    ) {
        let Some(project) = meta.project.clone() else {
            // No active project: ad-hoc sessions are recorded under a
            // catch-all bucket so they still show up in history.
            for sub in subagents {
                if sub.status == AgentStatus::Running {
                    self.history.record_adhoc_task(
                        "adhoc",
                        &sub.current_task,
                        &sub.model,
                        (!session_id.is_empty()).then_some(session_id),
                        now,
                    );
                } else if sub.is_completed {
                    self.history.complete_adhoc_task("adhoc", &sub.current_task, now);
                }
            }
            self.history.cleanup(now);
            self.history.flush_if_due(now);
            return;
        };

        for agent in agents {
            let wave = agent.phase.or(meta.current_phase).unwrap_or(0);
            if agent.status == AgentStatus::Running {
                self.history.record_wave_agent(
                    &project,
                    wave,
                    &agent.name,
                    &agent.model,
                    &agent.current_task,
                    now,
                );
            } else if agent.is_completed {
                self.history.complete_wave_agent(&project, wave, &agent.name, now);
            }
        }

        for sub in subagents {
            if sub.status == AgentStatus::Running {
                self.history.record_adhoc_task(
                    &project,
                    &sub.current_task,
                    &sub.model,
                    (!session_id.is_empty()).then_some(session_id),
                    now,
                );
            } else if sub.is_completed {
                self.history.complete_adhoc_task(&project, &sub.current_task, now);
            }
        }

        if meta.project_ended_at.is_some() {
            self.history.complete_all_running(&project, now);
        }

        self.history.cleanup(now);
        self.history.flush_if_due(now);
    }
}

/// Spawn the collector task. The returned sender requests a clean shutdown;
/// the collector flushes pending history writes before exiting.
pub fn spawn_collector(
    state: Arc<AppState>,
    event_tx: Sender<AppEvent>,
) -> Result<(tokio::task::JoinHandle<()>, Sender<()>)> {
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let collector = DataCollector::new(state, event_tx, shutdown_rx)?;

    let handle = tokio::spawn(async move {
        collector.run().await;
    });

    Ok((handle, shutdown_tx))
}
