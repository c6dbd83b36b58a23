// ABOUTME: Token usage accounting from the usage.json log
// Supports a rolling time window, per-model/session aggregation and live deltas

use crate::app::state::AppEvent;
use crate::utils::cost::CostModel;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One accounting record; append-only source of truth, never mutated.
#[derive(Debug, Clone)]
pub struct TokenUsage {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ModelUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    pub cost: f64,
    /// Tokens gained since the previous summary() call; drives "+N" badges.
    pub delta: i64,
}

#[derive(Debug, Clone, Default)]
pub struct SessionUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// Immutable aggregate over the (windowed) record set.
#[derive(Debug, Clone, Default)]
pub struct TokenSummary {
    pub total_input: u64,
    pub total_output: u64,
    pub total_tokens: u64,
    pub cost_estimate: f64,
    pub by_model: BTreeMap<String, ModelUsage>,
    pub by_session: BTreeMap<String, SessionUsage>,
    pub history: Vec<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct RawUsageRecord {
    model: String,
    #[serde(rename = "inputTokens", alias = "input_tokens", default)]
    input_tokens: u64,
    #[serde(rename = "outputTokens", alias = "output_tokens", default)]
    output_tokens: u64,
    timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "sessionId", alias = "session", default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageFile {
    #[serde(default)]
    records: Vec<RawUsageRecord>,
    // Legacy field name used by earlier recorder versions.
    #[serde(default)]
    data: Vec<RawUsageRecord>,
}

const HISTORY_LIMIT: usize = 50;

/// Loads the usage log and computes windowed summaries.
///
/// Stateful only in the per-model "since last summary" counter; everything
/// else is recomputed from the records and the current rate table.
pub struct TokenTracker {
    records: Vec<TokenUsage>,
    window_start: Option<DateTime<Utc>>,
    window_end: Option<DateTime<Utc>>,
    last_model_totals: HashMap<String, u64>,
    cost_model: CostModel,
    loaded: bool,
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTracker {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            window_start: None,
            window_end: None,
            last_model_totals: HashMap::new(),
            cost_model: CostModel::new(),
            loaded: false,
        }
    }

    pub fn with_cost_model(cost_model: CostModel) -> Self {
        Self {
            cost_model,
            ..Self::new()
        }
    }

    pub fn set_cost_model(&mut self, cost_model: CostModel) {
        self.cost_model = cost_model;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Parse the usage log. On failure the previous records stay in place
    /// (no partial overwrite) and the error is returned.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let file: UsageFile = serde_json::from_str(&content)?;

        let raw = if file.records.is_empty() {
            file.data
        } else {
            file.records
        };

        self.records = raw
            .into_iter()
            .map(|r| {
                let total = r.input_tokens + r.output_tokens;
                TokenUsage {
                    model: r.model,
                    input_tokens: r.input_tokens,
                    output_tokens: r.output_tokens,
                    total_tokens: total,
                    timestamp: r.timestamp.unwrap_or_else(Utc::now),
                    session_id: r.session_id.unwrap_or_else(|| "unknown".to_string()),
                }
            })
            .collect();
        self.loaded = true;
        Ok(())
    }

    /// Reload, swallowing transient errors (torn reads on the frequently
    /// rewritten log); previous state is retained on failure.
    pub fn reload<P: AsRef<Path>>(&mut self, path: P) {
        if let Err(err) = self.load(path) {
            debug!(error = %err, "usage log reload failed, retaining state");
        }
    }

    /// Restrict all subsequent summaries to records with timestamp in the
    /// inclusive `[start, end]` window; a None bound is open-ended.
    pub fn set_time_window(&mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        self.window_start = start;
        self.window_end = end;
    }

    fn in_window(&self, ts: DateTime<Utc>) -> bool {
        if let Some(start) = self.window_start {
            if ts < start {
                return false;
            }
        }
        if let Some(end) = self.window_end {
            if ts > end {
                return false;
            }
        }
        true
    }

    /// Aggregate the windowed records. Cost is recomputed from raw tokens
    /// and the current rate table on every call.
    pub fn summary(&mut self) -> TokenSummary {
        let mut summary = TokenSummary::default();

        for usage in self.records.iter().filter(|u| self.in_window(u.timestamp)) {
            summary.total_input += usage.input_tokens;
            summary.total_output += usage.output_tokens;

            let cost =
                self.cost_model
                    .cost(&usage.model, usage.input_tokens, usage.output_tokens);
            summary.cost_estimate += cost;

            let model = summary.by_model.entry(usage.model.clone()).or_default();
            model.input += usage.input_tokens;
            model.output += usage.output_tokens;
            model.total += usage.total_tokens;
            model.cost += cost;

            let session = summary
                .by_session
                .entry(usage.session_id.clone())
                .or_default();
            session.input += usage.input_tokens;
            session.output += usage.output_tokens;
            session.total += usage.total_tokens;

            summary.history.push(usage.clone());
        }
        summary.total_tokens = summary.total_input + summary.total_output;
        if summary.history.len() > HISTORY_LIMIT {
            let skip = summary.history.len() - HISTORY_LIMIT;
            summary.history.drain(0..skip);
        }

        let mut current_totals = HashMap::with_capacity(summary.by_model.len());
        for (name, model) in summary.by_model.iter_mut() {
            let previous = self.last_model_totals.get(name).copied().unwrap_or(0);
            model.delta = model.total as i64 - previous as i64;
            current_totals.insert(name.clone(), model.total);
        }
        self.last_model_totals = current_totals;

        summary
    }

    /// Watch the usage log for modification. The caller keeps the returned
    /// watcher alive and debounces the change events (500ms) before reload,
    /// guarding against read-while-write tearing.
    pub fn watch(path: &Path, tx: Sender<AppEvent>) -> Result<RecommendedWatcher> {
        let target: PathBuf = path.to_path_buf();
        let watch_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                if event.paths.iter().any(|p| p == &target) {
                    let _ = tx.send(AppEvent::UsageFileChanged);
                }
            }
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::cost::ModelRates;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(model: &str, input: u64, output: u64, ts: DateTime<Utc>, session: &str) -> TokenUsage {
        TokenUsage {
            model: model.to_string(),
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
            timestamp: ts,
            session_id: session.to_string(),
        }
    }

    fn tracker_with(records: Vec<TokenUsage>) -> TokenTracker {
        let mut tracker = TokenTracker::new();
        tracker.records = records;
        tracker.loaded = true;
        tracker
    }

    #[test]
    fn test_load_tolerates_field_aliases() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"records":[
                {{"model":"claude-sonnet-4-5","inputTokens":100,"outputTokens":50,"timestamp":"2026-01-01T00:00:00Z","session":"s1"}},
                {{"model":"claude-sonnet-4-5","input_tokens":200,"output_tokens":80,"timestamp":"2026-01-01T01:00:00Z","sessionId":"s2"}}
            ]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let mut tracker = TokenTracker::new();
        tracker.load(file.path()).unwrap();
        assert_eq!(tracker.records.len(), 2);
        assert_eq!(tracker.records[0].input_tokens, 100);
        assert_eq!(tracker.records[1].input_tokens, 200);
        assert_eq!(tracker.records[1].session_id, "s2");
        assert_eq!(tracker.records[1].total_tokens, 280);
    }

    #[test]
    fn test_load_legacy_data_array() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data":[{{"model":"m","inputTokens":10,"outputTokens":5,"timestamp":"2026-01-01T00:00:00Z","session":"s"}}]}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let mut tracker = TokenTracker::new();
        tracker.load(file.path()).unwrap();
        assert_eq!(tracker.records.len(), 1);
    }

    #[test]
    fn test_load_failure_keeps_prior_state() {
        let mut tracker = tracker_with(vec![record("m", 10, 5, t(0), "s")]);
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ truncated").unwrap();
        file.flush().unwrap();

        assert!(tracker.load(file.path()).is_err());
        assert_eq!(tracker.records.len(), 1);
    }

    #[test]
    fn test_window_inclusive_start() {
        let mut tracker = tracker_with(vec![
            record("m", 1, 0, t(10), "s"),
            record("m", 2, 0, t(20), "s"),
            record("m", 4, 0, t(30), "s"),
        ]);
        tracker.set_time_window(Some(t(20)), None);
        let summary = tracker.summary();
        // Exactly the records with timestamp >= t2.
        assert_eq!(summary.total_input, 6);
        assert_eq!(summary.history.len(), 2);
    }

    #[test]
    fn test_window_both_bounds() {
        let mut tracker = tracker_with(vec![
            record("m", 1, 0, t(10), "s"),
            record("m", 2, 0, t(20), "s"),
            record("m", 4, 0, t(30), "s"),
        ]);
        tracker.set_time_window(Some(t(15)), Some(t(25)));
        let summary = tracker.summary();
        assert_eq!(summary.total_input, 2);
    }

    #[test]
    fn test_cost_sample_scenario() {
        let mut rates = HashMap::new();
        rates.insert(
            "gemini-3-pro".to_string(),
            ModelRates {
                input: 0.00000125,
                output: 0.000005,
            },
        );
        let cost_model = CostModel::with_rates(rates, ModelRates::per_million(3.0, 15.0));

        let mut tracker = tracker_with(vec![
            record("gemini-3-pro", 1000, 500, t(0), "s1"),
            record("gemini-3-pro", 2000, 1000, t(1), "s1"),
        ]);
        tracker.set_cost_model(cost_model);

        let summary = tracker.summary();
        let model = &summary.by_model["gemini-3-pro"];
        assert_eq!(model.input, 3000);
        assert_eq!(model.output, 1500);
        assert_eq!(model.total, 4500);
        assert!((model.cost - 0.01125).abs() < 1e-9);
        assert!((summary.cost_estimate - 0.01125).abs() < 1e-9);
    }

    #[test]
    fn test_rate_table_change_reprices_history() {
        let mut tracker = tracker_with(vec![record("m", 1000, 0, t(0), "s")]);
        let first = tracker.summary().cost_estimate;

        let mut rates = HashMap::new();
        rates.insert(
            "m".to_string(),
            ModelRates {
                input: 0.00001,
                output: 0.0,
            },
        );
        tracker.set_cost_model(CostModel::with_rates(
            rates,
            ModelRates::per_million(3.0, 15.0),
        ));
        let second = tracker.summary().cost_estimate;

        assert!((first - 0.003).abs() < 1e-9);
        assert!((second - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_delta_monotonicity() {
        let mut tracker = tracker_with(vec![
            record("a", 100, 50, t(0), "s"),
            record("b", 200, 10, t(1), "s"),
        ]);
        let first = tracker.summary();
        assert_eq!(first.by_model["a"].delta, 150);
        assert_eq!(first.by_model["b"].delta, 210);

        // No new records between calls: every delta is zero.
        let second = tracker.summary();
        assert_eq!(second.by_model["a"].delta, 0);
        assert_eq!(second.by_model["b"].delta, 0);
    }

    #[test]
    fn test_delta_reflects_new_records() {
        let mut tracker = tracker_with(vec![record("a", 100, 0, t(0), "s")]);
        tracker.summary();
        tracker.records.push(record("a", 50, 25, t(5), "s"));
        let summary = tracker.summary();
        assert_eq!(summary.by_model["a"].delta, 75);
    }

    #[test]
    fn test_by_session_grouping() {
        let mut tracker = tracker_with(vec![
            record("m", 10, 5, t(0), "s1"),
            record("m", 20, 5, t(1), "s2"),
            record("m", 30, 5, t(2), "s1"),
        ]);
        let summary = tracker.summary();
        assert_eq!(summary.by_session["s1"].input, 40);
        assert_eq!(summary.by_session["s2"].input, 20);
    }
}
