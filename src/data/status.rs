// ABOUTME: Agent-state reconciliation from the shared active-agents.json file
// Merges the live agent list with the wave roster, tracking status transitions

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Canonical agent status shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    Pending,
    Running,
    Idle,
    Stuck,
    Offline,
}

/// One row in the live dashboard.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub name: String,
    pub role: String,
    pub model: String,
    pub current_task: String,
    pub status: AgentStatus,
    pub last_activity: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
    pub is_new: bool,
    pub is_completed: bool,
    pub phase: Option<u32>,
}

/// A status change observed during one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub name: String,
    pub from: Option<AgentStatus>,
    pub to: AgentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub model: String,
    pub task: String,
    #[serde(default)]
    pub phase: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveAgentEntry {
    pub name: String,
    pub model: String,
    pub task: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaveTiming {
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActiveAgentsFile {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(rename = "currentPhase", default)]
    pub current_phase: Option<u32>,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    #[serde(default)]
    pub agents: Vec<LiveAgentEntry>,
    #[serde(rename = "waveTimings", default)]
    pub wave_timings: BTreeMap<String, WaveTiming>,
    #[serde(rename = "projectStartedAt", default)]
    pub project_started_at: Option<DateTime<Utc>>,
    #[serde(rename = "projectEndedAt", default)]
    pub project_ended_at: Option<DateTime<Utc>>,
}

/// Project-level metadata carried alongside the agent lists.
#[derive(Debug, Clone, Default)]
pub struct ProjectMeta {
    pub project: Option<String>,
    pub current_phase: Option<u32>,
    pub wave_timings: BTreeMap<u32, WaveTiming>,
    pub project_started_at: Option<DateTime<Utc>>,
    pub project_ended_at: Option<DateTime<Utc>>,
}

impl ProjectMeta {
    fn from_file(file: &ActiveAgentsFile) -> Self {
        let wave_timings = file
            .wave_timings
            .iter()
            .filter_map(|(k, v)| k.parse::<u32>().ok().map(|n| (n, v.clone())))
            .collect();
        Self {
            project: file.project.clone(),
            current_phase: file.current_phase,
            wave_timings,
            project_started_at: file.project_started_at,
            project_ended_at: file.project_ended_at,
        }
    }
}

fn map_live_status(status: Option<&str>) -> AgentStatus {
    match status {
        Some("running") => AgentStatus::Running,
        Some("error") => AgentStatus::Stuck,
        _ => AgentStatus::Idle,
    }
}

fn map_roster_status(status: Option<&str>) -> AgentStatus {
    match status {
        Some("running") => AgentStatus::Running,
        Some("completed") => AgentStatus::Idle,
        _ => AgentStatus::Pending,
    }
}

/// Merge the live agent list and the wave roster into a fresh agent map.
///
/// Live entries win over roster entries with the same name: the roster is a
/// forward-looking plan while the live list is ground truth for agents that
/// are actually executing. Entries absent from both lists are dropped.
/// Returns the new map plus the transitions observed against `prev`.
pub fn reconcile(
    prev: &HashMap<String, AgentState>,
    live: &[LiveAgentEntry],
    roster: &[RosterEntry],
    now: DateTime<Utc>,
) -> (HashMap<String, AgentState>, Vec<StatusTransition>) {
    let mut next: HashMap<String, AgentState> = HashMap::new();
    let mut transitions = Vec::new();
    let mut seen_live: HashSet<&str> = HashSet::new();

    for entry in live {
        seen_live.insert(entry.name.as_str());
        let status = map_live_status(entry.status.as_deref());

        let state = match prev.get(&entry.name) {
            Some(existing) => {
                let mut state = existing.clone();
                state.model = entry.model.clone();
                state.current_task = entry.task.clone();
                if status == AgentStatus::Running
                    || (existing.status == AgentStatus::Running && status != AgentStatus::Running)
                {
                    state.last_activity = now;
                }
                if existing.status != status {
                    state.changed_at = now;
                    transitions.push(StatusTransition {
                        name: entry.name.clone(),
                        from: Some(existing.status),
                        to: status,
                    });
                }
                state.status = status;
                state.is_new = false;
                state.is_completed = false;
                state
            }
            None => {
                transitions.push(StatusTransition {
                    name: entry.name.clone(),
                    from: None,
                    to: status,
                });
                AgentState {
                    name: entry.name.clone(),
                    role: entry.name.clone(),
                    model: entry.model.clone(),
                    current_task: entry.task.clone(),
                    status,
                    last_activity: now,
                    changed_at: now,
                    is_new: true,
                    is_completed: false,
                    phase: None,
                }
            }
        };
        next.insert(entry.name.clone(), state);
    }

    for entry in roster {
        if seen_live.contains(entry.name.as_str()) {
            continue;
        }
        let status = map_roster_status(entry.status.as_deref());
        let is_completed = entry.status.as_deref() == Some("completed");

        let state = match prev.get(&entry.name) {
            Some(existing) => {
                let mut state = existing.clone();
                state.phase = entry.phase;
                state.is_completed = is_completed;
                if existing.status != status {
                    state.changed_at = now;
                    state.status = status;
                    transitions.push(StatusTransition {
                        name: entry.name.clone(),
                        from: Some(existing.status),
                        to: status,
                    });
                }
                state
            }
            None => {
                transitions.push(StatusTransition {
                    name: entry.name.clone(),
                    from: None,
                    to: status,
                });
                AgentState {
                    name: entry.name.clone(),
                    role: entry.name.clone(),
                    model: entry.model.clone(),
                    current_task: entry.task.clone(),
                    status,
                    last_activity: now,
                    changed_at: now,
                    is_new: false,
                    is_completed,
                    phase: entry.phase,
                }
            }
        };
        next.insert(entry.name.clone(), state);
    }

    (next, transitions)
}

/// Polls active-agents.json and maintains the reconciled agent map.
pub struct StatusTracker {
    path: PathBuf,
    agents: HashMap<String, AgentState>,
    last_content: String,
    meta: ProjectMeta,
}

impl StatusTracker {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            agents: HashMap::new(),
            last_content: String::new(),
            meta: ProjectMeta::default(),
        }
    }

    /// Read the file and reconcile. Returns the transitions observed this
    /// pass (empty when the file is byte-identical to the last read or when
    /// a transient read/parse error left the previous state in place).
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<StatusTransition> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => {
                // File gone: the wave is over, clear everything.
                if !self.agents.is_empty() {
                    self.agents.clear();
                }
                self.last_content.clear();
                self.meta = ProjectMeta::default();
                return Vec::new();
            }
        };

        // Skip parse if content unchanged; avoids spurious changed_at churn.
        if raw == self.last_content {
            return Vec::new();
        }

        let file: ActiveAgentsFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(err) => {
                // Torn read mid-write; keep last good state and retry next poll.
                debug!(error = %err, "active-agents.json parse failed, retaining state");
                return Vec::new();
            }
        };
        self.last_content = raw;
        self.meta = ProjectMeta::from_file(&file);

        let (next, transitions) = reconcile(&self.agents, &file.agents, &file.roster, now);
        self.agents = next;
        transitions
    }

    /// Current agent rows, sorted by wave number (unphased last) then name.
    pub fn agents(&self) -> Vec<AgentState> {
        let mut list: Vec<AgentState> = self.agents.values().cloned().collect();
        list.sort_by(|a, b| match (a.phase, b.phase) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        list
    }

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }
}
