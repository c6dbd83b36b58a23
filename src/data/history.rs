// ABOUTME: Durable work-history log with idempotent ids and debounced writes
// Entries persist across dashboard restarts; retention 90d (wave) / 30d (adhoc)

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Wave,
    Adhoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkHistoryEntry {
    pub id: String,
    pub project: String,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wave: Option<u32>,
    #[serde(rename = "agentName")]
    pub agent_name: String,
    #[serde(rename = "agentModel")]
    pub agent_model: String,
    pub task: String,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "completedAt", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: HistoryStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkHistoryFile {
    version: u32,
    entries: Vec<WorkHistoryEntry>,
    #[serde(rename = "lastCleanup", default, skip_serializing_if = "Option::is_none")]
    last_cleanup: Option<DateTime<Utc>>,
}

const ADHOC_RETENTION_DAYS: i64 = 30;
const WAVE_RETENTION_DAYS: i64 = 90;
const CLEANUP_INTERVAL_HOURS: i64 = 24;
const SAVE_DEBOUNCE_SECS: i64 = 5;
const MAX_ENTRIES: usize = 1000;

/// Idempotency key for a wave agent run.
pub fn wave_id(project: &str, wave: u32, agent_name: &str) -> String {
    format!("wave-{}-{}-{}", project, wave, agent_name)
}

/// Idempotency key for an ad-hoc task: the first 60 characters of the task
/// text, whitespace runs collapsed to single dashes. Later edits to the task
/// text deliberately create a new entry.
pub fn adhoc_id(project: &str, task: &str) -> String {
    let head: String = task.chars().take(60).collect();
    let slug: Vec<&str> = head.split_whitespace().collect();
    format!("adhoc-{}-{}", project, slug.join("-"))
}

/// Tracks wave/adhoc work across sessions with write coalescing: mutations
/// mark the log dirty and the actual write happens at most once per 5s
/// window (forced on shutdown). All mutators take the current time so tests
/// run without wall-clock timers.
pub struct HistoryTracker {
    path: PathBuf,
    entries: Vec<WorkHistoryEntry>,
    known_ids: HashSet<String>,
    last_cleanup: Option<DateTime<Utc>>,
    dirty: bool,
    save_due: Option<DateTime<Utc>>,
}

impl HistoryTracker {
    /// Load the history file. A corrupted file is moved aside to `.bak` and
    /// the tracker starts empty rather than failing.
    pub fn load(path: PathBuf) -> Self {
        let mut tracker = Self {
            path,
            entries: Vec::new(),
            known_ids: HashSet::new(),
            last_cleanup: None,
            dirty: false,
            save_due: None,
        };

        let raw = match fs::read_to_string(&tracker.path) {
            Ok(raw) => raw,
            Err(_) => return tracker,
        };
        match serde_json::from_str::<WorkHistoryFile>(&raw) {
            Ok(file) => {
                tracker.known_ids = file.entries.iter().map(|e| e.id.clone()).collect();
                tracker.entries = file.entries;
                tracker.last_cleanup = file.last_cleanup;
            }
            Err(err) => {
                warn!(error = %err, "work history corrupted, starting empty");
                let backup = tracker.path.with_extension("json.bak");
                if let Err(err) = fs::rename(&tracker.path, &backup) {
                    debug!(error = %err, "could not back up corrupted history");
                }
            }
        }
        tracker
    }

    fn schedule_save(&mut self, now: DateTime<Utc>) {
        self.dirty = true;
        if self.save_due.is_none() {
            self.save_due = Some(now + Duration::seconds(SAVE_DEBOUNCE_SECS));
        }
    }

    /// Write out the pending state if the debounce window has elapsed.
    pub fn flush_if_due(&mut self, now: DateTime<Utc>) {
        if let Some(due) = self.save_due {
            if now >= due {
                self.flush_now();
            }
        }
    }

    /// Force a synchronous write; called on teardown so a crash-free exit
    /// never loses the debounced tail.
    pub fn flush_now(&mut self) {
        if !self.dirty {
            return;
        }
        let file = WorkHistoryFile {
            version: 1,
            entries: self.entries.clone(),
            last_cleanup: self.last_cleanup,
        };
        match serde_json::to_string_pretty(&file) {
            Ok(json) => {
                if let Err(err) = fs::write(&self.path, json + "\n") {
                    debug!(error = %err, "work history write failed");
                    return;
                }
                self.dirty = false;
                self.save_due = None;
            }
            Err(err) => debug!(error = %err, "work history serialize failed"),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a wave agent starting. Idempotent: a second call with the same
    /// identity re-marks the existing entry as running instead of duplicating.
    pub fn record_wave_agent(
        &mut self,
        project: &str,
        wave: u32,
        agent_name: &str,
        model: &str,
        task: &str,
        now: DateTime<Utc>,
    ) {
        let id = wave_id(project, wave, agent_name);
        if self.known_ids.contains(&id) {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
                if entry.status != HistoryStatus::Completed {
                    entry.status = HistoryStatus::Running;
                    self.schedule_save(now);
                }
            }
            return;
        }

        self.entries.push(WorkHistoryEntry {
            id: id.clone(),
            project: project.to_string(),
            kind: HistoryKind::Wave,
            wave: Some(wave),
            agent_name: agent_name.to_string(),
            agent_model: model.to_string(),
            task: task.to_string(),
            started_at: now,
            completed_at: None,
            status: HistoryStatus::Running,
        });
        self.known_ids.insert(id);
        self.schedule_save(now);
    }

    pub fn complete_wave_agent(
        &mut self,
        project: &str,
        wave: u32,
        agent_name: &str,
        now: DateTime<Utc>,
    ) {
        let id = wave_id(project, wave, agent_name);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            if entry.status != HistoryStatus::Completed {
                entry.status = HistoryStatus::Completed;
                entry.completed_at = Some(now);
                self.schedule_save(now);
            }
        }
    }

    pub fn record_adhoc_task(
        &mut self,
        project: &str,
        task: &str,
        model: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let id = adhoc_id(project, task);
        if self.known_ids.contains(&id) {
            // Already tracking or already done; nothing to record.
            return;
        }

        self.entries.push(WorkHistoryEntry {
            id: id.clone(),
            project: project.to_string(),
            kind: HistoryKind::Adhoc,
            wave: None,
            agent_name: session_id.unwrap_or("session").to_string(),
            agent_model: model.to_string(),
            task: task.to_string(),
            started_at: now,
            completed_at: None,
            status: HistoryStatus::Running,
        });
        self.known_ids.insert(id);
        self.schedule_save(now);
    }

    pub fn complete_adhoc_task(&mut self, project: &str, task: &str, now: DateTime<Utc>) {
        let id = adhoc_id(project, task);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            if entry.status != HistoryStatus::Completed {
                entry.status = HistoryStatus::Completed;
                entry.completed_at = Some(now);
                self.schedule_save(now);
            }
        }
    }

    /// Mark every running entry for a project as completed (wave teardown).
    pub fn complete_all_running(&mut self, project: &str, now: DateTime<Utc>) {
        let mut changed = false;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.project == project && e.status == HistoryStatus::Running)
        {
            entry.status = HistoryStatus::Completed;
            entry.completed_at = Some(now);
            changed = true;
        }
        if changed {
            self.schedule_save(now);
        }
    }

    pub fn history_for_project(&self, project: &str, limit: usize) -> Vec<WorkHistoryEntry> {
        let mut entries: Vec<WorkHistoryEntry> = self
            .entries
            .iter()
            .filter(|e| e.project == project)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries.truncate(limit);
        entries
    }

    pub fn all_history(&self, limit: usize) -> Vec<WorkHistoryEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries.truncate(limit);
        entries
    }

    pub fn has_entry(&self, id: &str) -> bool {
        self.known_ids.contains(id)
    }

    /// Retention pass, at most once per 24h: purge completed entries past
    /// their retention window and enforce the entry cap (oldest first).
    pub fn cleanup(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_cleanup {
            if now - last < Duration::hours(CLEANUP_INTERVAL_HOURS) {
                return;
            }
        }

        let before = self.entries.len();
        self.entries.retain(|entry| {
            if entry.status == HistoryStatus::Running {
                return true;
            }
            let Some(completed_at) = entry.completed_at else {
                return true;
            };
            let age = now - completed_at;
            match entry.kind {
                HistoryKind::Wave => age < Duration::days(WAVE_RETENTION_DAYS),
                HistoryKind::Adhoc => age < Duration::days(ADHOC_RETENTION_DAYS),
            }
        });

        if self.entries.len() > MAX_ENTRIES {
            self.entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            self.entries.truncate(MAX_ENTRIES);
        }

        self.known_ids = self.entries.iter().map(|e| e.id.clone()).collect();
        self.last_cleanup = Some(now);

        if self.entries.len() != before {
            self.dirty = true;
            self.flush_now();
        }
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

    fn days(n: i64) -> i64 {
        n * 24 * 60 * 60
    }

    fn fresh() -> (tempfile::TempDir, HistoryTracker) {
        let dir = tempdir().unwrap();
        let tracker = HistoryTracker::load(dir.path().join("work-history.json"));
        (dir, tracker)
    }

    #[test]
    fn test_wave_id_derivation() {
        assert_eq!(wave_id("demo", 2, "dev"), "wave-demo-2-dev");
    }

    #[test]
    fn test_adhoc_id_slugs_task_text() {
        assert_eq!(adhoc_id("demo", "fix  the\tbug"), "adhoc-demo-fix-the-bug");
        // Only the first 60 chars participate in the identity.
        let long = "x".repeat(80);
        assert_eq!(adhoc_id("demo", &long), format!("adhoc-demo-{}", "x".repeat(60)));
    }

    #[test]
    fn test_record_wave_agent_idempotent() {
        let (_dir, mut tracker) = fresh();
        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(0));
        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(5));
        assert_eq!(tracker.all_history(10).len(), 1);
        assert_eq!(tracker.all_history(10)[0].status, HistoryStatus::Running);
    }

    #[test]
    fn test_complete_transitions_in_place() {
        let (_dir, mut tracker) = fresh();
        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(0));
        tracker.complete_wave_agent("demo", 1, "dev", t(100));
        let entries = tracker.all_history(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, HistoryStatus::Completed);
        assert_eq!(entries[0].completed_at, Some(t(100)));

        // Re-recording after completion does not reopen the entry.
        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(200));
        assert_eq!(tracker.all_history(10)[0].status, HistoryStatus::Completed);
    }

    #[test]
    fn test_adhoc_retention_30_days() {
        let (_dir, mut tracker) = fresh();
        tracker.record_adhoc_task("demo", "old task", "sonnet", None, t(0));
        tracker.complete_adhoc_task("demo", "old task", t(10));

        let mut at_29 = tracker;
        at_29.cleanup(t(10 + days(29)));
        assert_eq!(at_29.all_history(10).len(), 1);

        at_29.last_cleanup = None;
        at_29.cleanup(t(10 + days(31)));
        assert!(at_29.all_history(10).is_empty());
    }

    #[test]
    fn test_wave_retention_90_days() {
        let (_dir, mut tracker) = fresh();
        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(0));
        tracker.complete_wave_agent("demo", 1, "dev", t(10));

        tracker.cleanup(t(10 + days(89)));
        assert_eq!(tracker.all_history(10).len(), 1);

        tracker.last_cleanup = None;
        tracker.cleanup(t(10 + days(91)));
        assert!(tracker.all_history(10).is_empty());
    }

    #[test]
    fn test_running_entries_survive_cleanup() {
        let (_dir, mut tracker) = fresh();
        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(0));
        tracker.cleanup(t(days(365)));
        assert_eq!(tracker.all_history(10).len(), 1);
    }

    #[test]
    fn test_cleanup_runs_at_most_daily() {
        let (_dir, mut tracker) = fresh();
        tracker.record_adhoc_task("demo", "task", "sonnet", None, t(0));
        tracker.complete_adhoc_task("demo", "task", t(10));

        // First pass with the entry still inside retention: survives and
        // stamps last_cleanup.
        let first = t(10 + days(30) - 12 * 3600);
        tracker.cleanup(first);
        assert_eq!(tracker.all_history(10).len(), 1);

        // 18h later the entry has aged past retention, but the pass lands
        // inside the 24h gate and is a no-op.
        let gated = t(10 + days(30) + 6 * 3600);
        tracker.cleanup(gated);
        assert_eq!(tracker.all_history(10).len(), 1);

        // Once the gate expires the purge goes through.
        tracker.cleanup(t(10 + days(32)));
        assert!(tracker.all_history(10).is_empty());
    }

    #[test]
    fn test_max_entries_evicts_oldest() {
        let (_dir, mut tracker) = fresh();
        for i in 0..(MAX_ENTRIES + 10) {
            tracker.record_adhoc_task("demo", &format!("task {}", i), "sonnet", None, t(i as i64));
        }
        tracker.cleanup(t(days(1)));
        let entries = tracker.all_history(MAX_ENTRIES + 10);
        assert_eq!(entries.len(), MAX_ENTRIES);
        // Newest entries are retained.
        assert_eq!(entries[0].task, format!("task {}", MAX_ENTRIES + 9));
    }

    #[test]
    fn test_debounced_save_and_forced_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("work-history.json");
        let mut tracker = HistoryTracker::load(path.clone());

        tracker.record_wave_agent("demo", 1, "dev", "sonnet", "impl", t(0));
        tracker.flush_if_due(t(2));
        assert!(!path.exists());

        tracker.flush_if_due(t(6));
        assert!(path.exists());
        assert!(!tracker.is_dirty());

        tracker.complete_wave_agent("demo", 1, "dev", t(10));
        assert!(tracker.is_dirty());
        tracker.flush_now();
        assert!(!tracker.is_dirty());

        let reloaded = HistoryTracker::load(path);
        assert_eq!(reloaded.all_history(10)[0].status, HistoryStatus::Completed);
    }

    #[test]
    fn test_corrupted_file_backed_up_and_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("work-history.json");
        fs::write(&path, "{ not json at all").unwrap();

        let tracker = HistoryTracker::load(path.clone());
        assert!(tracker.all_history(10).is_empty());
        assert!(dir.path().join("work-history.json.bak").exists());
    }

    #[test]
    fn test_complete_all_running_scoped_to_project() {
        let (_dir, mut tracker) = fresh();
        tracker.record_adhoc_task("alpha", "task a", "sonnet", None, t(0));
        tracker.record_adhoc_task("beta", "task b", "sonnet", None, t(0));
        tracker.complete_all_running("alpha", t(5));

        let alpha = tracker.history_for_project("alpha", 10);
        let beta = tracker.history_for_project("beta", 10);
        assert_eq!(alpha[0].status, HistoryStatus::Completed);
        assert_eq!(beta[0].status, HistoryStatus::Running);
    }
}
