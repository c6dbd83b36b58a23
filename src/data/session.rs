// ABOUTME: Session tracker reading the newest todo file for live task progress
// Projects the todo list into an active/idle session model for the panel

use crate::data::subagent::find_latest_jsonl;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionTodo {
    pub content: String,
    pub status: TodoStatus,
    #[serde(rename = "activeForm", default)]
    pub active_form: String,
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub active: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub current_task: String,
    pub phase_tag: String,
    pub completed_count: usize,
    pub total_count: usize,
    pub session_id: String,
    pub model: String,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            active: false,
            last_activity: None,
            current_task: "-".to_string(),
            phase_tag: String::new(),
            completed_count: 0,
            total_count: 0,
            session_id: String::new(),
            model: String::new(),
        }
    }
}

const ACTIVE_THRESHOLD_MIN: i64 = 5;

/// Extract a compact phase tag from a todo line:
/// "Phase 3: TASK 10-12 (레이아웃)" -> "P3:T10-12", "Phase 4-5: 리뷰" -> "P4-5".
fn extract_phase_tag(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut start = None;
    for i in 0..bytes.len().saturating_sub(4) {
        if bytes[i..].len() >= 5 && bytes[i..i + 5].eq_ignore_ascii_case(b"phase") {
            start = Some(i + 5);
            break;
        }
    }
    let Some(start) = start else {
        return String::new();
    };

    let rest = content[start..].trim_start();
    let num: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if num.is_empty() || num.chars().all(|c| c == '-') {
        return String::new();
    }

    let after = rest[num.len()..].trim_start();
    if let Some(stripped) = after.strip_prefix(':') {
        let stripped = stripped.trim_start();
        if stripped.len() >= 4 && stripped.as_bytes()[..4].eq_ignore_ascii_case(b"task") {
            let task_part = stripped[4..].trim_start();
            let task_num: String = task_part
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '-')
                .collect();
            if !task_num.is_empty() {
                return format!("P{}:T{}", num, task_num);
            }
        }
    }
    format!("P{}", num)
}

/// Most recent model seen in the newest transcript, scanned from the end.
fn detect_session_model(transcripts_dir: &PathBuf) -> String {
    let Some(path) = find_latest_jsonl(transcripts_dir) else {
        return String::new();
    };
    let Ok(content) = fs::read_to_string(&path) else {
        return String::new();
    };
    for line in content.lines().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            if let Some(model) = value
                .get("message")
                .and_then(|m| m.get("model"))
                .and_then(|m| m.as_str())
            {
                if model.starts_with("claude-") {
                    return model.to_string();
                }
            }
        }
    }
    String::new()
}

/// Reads the newest todo JSON to report what the interactive session is doing.
pub struct SessionTracker {
    todos_dir: PathBuf,
    transcripts_dir: PathBuf,
}

impl SessionTracker {
    pub fn new(todos_dir: PathBuf, transcripts_dir: PathBuf) -> Self {
        Self {
            todos_dir,
            transcripts_dir,
        }
    }

    pub fn poll(&self, now: DateTime<Utc>) -> SessionInfo {
        let Some((path, mtime)) = self.latest_todo_file() else {
            return SessionInfo::default();
        };
        let Ok(raw) = fs::read_to_string(&path) else {
            return SessionInfo::default();
        };
        let Ok(todos) = serde_json::from_str::<Vec<SessionTodo>>(&raw) else {
            return SessionInfo::default();
        };

        let is_recent = now - mtime < Duration::minutes(ACTIVE_THRESHOLD_MIN);
        let in_progress = todos.iter().find(|t| t.status == TodoStatus::InProgress);
        let completed_count = todos
            .iter()
            .filter(|t| t.status == TodoStatus::Completed)
            .count();

        let current_task = in_progress
            .map(|t| {
                if t.active_form.is_empty() {
                    t.content.clone()
                } else {
                    t.active_form.clone()
                }
            })
            .unwrap_or_else(|| "-".to_string());
        let phase_tag = in_progress
            .map(|t| extract_phase_tag(&t.content))
            .unwrap_or_default();

        // Todo files are named "<session>-agent-<agent>.json".
        let session_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split("-agent-").next())
            .map(|s| s.chars().take(8).collect())
            .unwrap_or_default();

        SessionInfo {
            active: is_recent && in_progress.is_some(),
            last_activity: Some(mtime),
            current_task,
            phase_tag,
            completed_count,
            total_count: todos.len(),
            session_id,
            model: detect_session_model(&self.transcripts_dir),
        }
    }

    fn latest_todo_file(&self) -> Option<(PathBuf, DateTime<Utc>)> {
        let entries = fs::read_dir(&self.todos_dir).ok()?;
        let mut latest: Option<(PathBuf, std::time::SystemTime)> = None;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            if latest.as_ref().map_or(true, |(_, ts)| modified > *ts) {
                latest = Some((path, modified));
            }
        }

        latest.map(|(path, ts)| (path, DateTime::<Utc>::from(ts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_extract_phase_tag_with_task_range() {
        assert_eq!(extract_phase_tag("Phase 3: TASK 10-12 (레이아웃)"), "P3:T10-12");
        assert_eq!(extract_phase_tag("phase 7: task 2"), "P7:T2");
    }

    #[test]
    fn test_extract_phase_tag_plain_and_range() {
        assert_eq!(extract_phase_tag("Phase 4-5: 리뷰 + 테스트"), "P4-5");
        assert_eq!(extract_phase_tag("Phase 2 setup"), "P2");
        assert_eq!(extract_phase_tag("no phase marker here at all"), "");
        assert_eq!(extract_phase_tag("totally unrelated"), "");
    }

    #[test]
    fn test_poll_reads_latest_todo_file() {
        let dir = tempdir().unwrap();
        let todos = dir.path().join("todos");
        fs::create_dir_all(&todos).unwrap();
        fs::write(
            todos.join("abcd1234-agent-main.json"),
            r#"[
                {"content":"Phase 1: TASK 1 setup","status":"completed","activeForm":"Setting up"},
                {"content":"Phase 1: TASK 2 build","status":"in_progress","activeForm":"Building"}
            ]"#,
        )
        .unwrap();

        let tracker = SessionTracker::new(todos, dir.path().join("projects"));
        let info = tracker.poll(Utc::now());
        assert!(info.active);
        assert_eq!(info.current_task, "Building");
        assert_eq!(info.phase_tag, "P1:T2");
        assert_eq!(info.completed_count, 1);
        assert_eq!(info.total_count, 2);
        assert_eq!(info.session_id, "abcd1234");
    }

    #[test]
    fn test_stale_mtime_reports_idle() {
        let dir = tempdir().unwrap();
        let todos = dir.path().join("todos");
        fs::create_dir_all(&todos).unwrap();
        fs::write(
            todos.join("x-agent-y.json"),
            r#"[{"content":"work","status":"in_progress","activeForm":"Working"}]"#,
        )
        .unwrap();

        let tracker = SessionTracker::new(todos, dir.path().join("projects"));
        // Poll far in the future relative to the file mtime.
        let info = tracker.poll(Utc::now() + Duration::hours(1));
        assert!(!info.active);
        assert_eq!(info.current_task, "Working");
    }

    #[test]
    fn test_missing_dir_yields_default() {
        let tracker = SessionTracker::new(
            PathBuf::from("/nonexistent/todos"),
            PathBuf::from("/nonexistent/projects"),
        );
        let info = tracker.poll(t(0));
        assert!(!info.active);
        assert_eq!(info.total_count, 0);
    }
}
