// ABOUTME: Ad-hoc subagent tracking from the newest session transcript (JSONL)
// Correlates Task dispatch events with their tool_result completions by id

use crate::data::status::{AgentState, AgentStatus};
use crate::utils::cost::normalize_model;
use chrono::{DateTime, Duration, Utc};
use glob::glob;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A dispatched subagent task awaiting (or past) its result event.
#[derive(Debug, Clone)]
pub struct TaskCall {
    pub tool_use_id: String,
    pub description: String,
    pub model: String,
    pub subagent_type: String,
    pub started_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Completed tasks disappear from the live view after this many minutes.
const COMPLETED_RETENTION_MIN: i64 = 10;

/// Tails the most-recently-modified transcript and maintains TaskCall state.
pub struct SubagentTracker {
    transcripts_dir: PathBuf,
    tasks: HashMap<String, TaskCall>,
    last_path: Option<PathBuf>,
    last_size: u64,
}

impl SubagentTracker {
    pub fn new(transcripts_dir: PathBuf) -> Self {
        Self {
            transcripts_dir,
            tasks: HashMap::new(),
            last_path: None,
            last_size: 0,
        }
    }

    /// One poll pass: pick the newest transcript, reparse it if the path or
    /// size changed. Correctness over incrementality; these files are small.
    pub fn scan(&mut self, now: DateTime<Utc>) {
        let Some(path) = find_latest_jsonl(&self.transcripts_dir) else {
            return;
        };

        let size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => return,
        };
        if self.last_path.as_deref() == Some(path.as_path()) && size == self.last_size {
            return;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return,
        };

        // A dispatch is never retroactively un-observed within one file, but
        // a new session transcript starts from a clean slate.
        if self.last_path.as_deref() != Some(path.as_path()) {
            self.tasks.clear();
            self.last_path = Some(path);
        }
        self.last_size = size;

        self.parse_lines(content.lines(), now);
    }

    fn parse_lines<'a>(&mut self, lines: impl Iterator<Item = &'a str>, now: DateTime<Utc>) {
        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Malformed lines are skipped, not fatal.
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                self.process_entry(&value, now);
            }
        }
    }

    fn process_entry(&mut self, entry: &Value, now: DateTime<Utc>) {
        let Some(content) = entry
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array())
        else {
            return;
        };

        let timestamp = entry
            .get("timestamp")
            .and_then(|t| t.as_str())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now);

        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("tool_use") => {
                    if block.get("name").and_then(|n| n.as_str()) != Some("Task") {
                        continue;
                    }
                    let Some(id) = block.get("id").and_then(|i| i.as_str()) else {
                        continue;
                    };
                    // First sighting wins; re-reads of the same file must not
                    // reset started_at.
                    if self.tasks.contains_key(id) {
                        continue;
                    }
                    let input = block.get("input");
                    let str_field = |key: &str| {
                        input
                            .and_then(|i| i.get(key))
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string())
                    };
                    let subagent_type =
                        str_field("subagent_type").unwrap_or_else(|| "general".to_string());
                    let model = str_field("model").unwrap_or_else(|| subagent_type.clone());

                    self.tasks.insert(
                        id.to_string(),
                        TaskCall {
                            tool_use_id: id.to_string(),
                            description: str_field("description")
                                .unwrap_or_else(|| "Subagent".to_string()),
                            model,
                            subagent_type,
                            started_at: timestamp,
                            completed: false,
                            completed_at: None,
                        },
                    );
                }
                Some("tool_result") => {
                    let Some(id) = block.get("tool_use_id").and_then(|i| i.as_str()) else {
                        continue;
                    };
                    if let Some(task) = self.tasks.get_mut(id) {
                        if !task.completed {
                            task.completed = true;
                            task.completed_at = Some(timestamp);
                        }
                    }
                    // A result with no matching dispatch is silently ignored.
                }
                _ => {}
            }
        }
    }

    /// Live view: all tasks except those completed more than 10 minutes ago.
    pub fn subagents(&self, now: DateTime<Utc>) -> Vec<AgentState> {
        let mut result: Vec<AgentState> = self
            .tasks
            .values()
            .filter(|task| match (task.completed, task.completed_at) {
                (true, Some(done)) => now - done <= Duration::minutes(COMPLETED_RETENTION_MIN),
                _ => true,
            })
            .map(|task| {
                let status = if task.completed {
                    AgentStatus::Idle
                } else {
                    AgentStatus::Running
                };
                AgentState {
                    name: task.description.chars().take(30).collect(),
                    role: format!("subagent-{}", task.tool_use_id),
                    model: normalize_model(&task.model),
                    current_task: task.description.clone(),
                    status,
                    last_activity: task.completed_at.unwrap_or(now),
                    changed_at: task.completed_at.unwrap_or(task.started_at),
                    is_new: false,
                    is_completed: task.completed,
                    phase: None,
                }
            })
            .collect();
        result.sort_by(|a, b| a.role.cmp(&b.role));
        result
    }
}

/// Newest-mtime transcript anywhere under `root`, recomputed per poll so a
/// new session file is picked up without a persistent handle.
pub(crate) fn find_latest_jsonl(root: &Path) -> Option<PathBuf> {
    let pattern = root.join("**/*.jsonl");
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in glob(&pattern.to_string_lossy()).ok()?.flatten() {
        let Ok(meta) = fs::metadata(&entry) else {
            continue;
        };
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if latest.as_ref().map_or(true, |(ts, _)| modified > *ts) {
            latest = Some((modified, entry));
        }
    }

    latest.map(|(_, path)| path)
}
