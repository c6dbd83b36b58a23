// ABOUTME: Phase/wave ladder derivation from three ranked sources
// Wave timings beat the phase-state file, which beats on-disk artifact heuristics

use crate::data::status::ProjectMeta;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Pending,
    Active,
    Done,
}

#[derive(Debug, Clone)]
pub struct PhaseInfo {
    pub number: u32,
    pub name: String,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseLadder {
    pub phases: Vec<PhaseInfo>,
    /// True when the ladder was derived from wave timings ("W3" labels).
    pub wave_based: bool,
}

#[derive(Debug, Deserialize)]
struct PhaseStateFile {
    #[serde(rename = "currentPhase")]
    current_phase: u32,
    #[serde(rename = "completedPhases", default)]
    completed_phases: Vec<u32>,
    #[serde(rename = "totalPhases", default)]
    total_phases: Option<u32>,
    // Either an array of names or a { "0": "name" } map.
    #[serde(rename = "phaseNames", default)]
    phase_names: Option<Value>,
}

const DEFAULT_PHASE_NAMES: [&str; 8] = [
    "사전점검",
    "설계",
    "에셋",
    "구현",
    "리뷰",
    "테스트",
    "문서화",
    "배포",
];

fn phase_name(names: Option<&Value>, index: u32) -> String {
    let fallback = || {
        DEFAULT_PHASE_NAMES
            .get(index as usize)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("Phase {}", index))
    };
    let Some(names) = names else {
        return fallback();
    };
    match names {
        Value::Array(arr) => arr
            .get(index as usize)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("Phase {}", index)),
        Value::Object(map) => map
            .get(&index.to_string())
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(fallback),
        _ => fallback(),
    }
}

fn read_phase_state(path: &Path) -> Option<PhaseStateFile> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Priority 1: wave timings from active-agents.json. A wave with a
/// completedAt is done, startedAt alone means active.
fn phases_from_wave_timings(meta: &ProjectMeta, phase_state_path: &Path) -> Option<PhaseLadder> {
    if meta.wave_timings.is_empty() {
        return None;
    }
    let max_wave = *meta.wave_timings.keys().max()?;

    let mut total_waves = max_wave;
    let mut names: Option<Value> = None;
    if let Some(state) = read_phase_state(phase_state_path) {
        if let Some(total) = state.total_phases {
            total_waves = total_waves.max(total);
        }
        names = state.phase_names;
    }

    let mut phases = Vec::new();
    for i in 1..=total_waves {
        let status = match meta.wave_timings.get(&i) {
            Some(timing) if timing.completed_at.is_some() => PhaseStatus::Done,
            Some(timing) if timing.started_at.is_some() => PhaseStatus::Active,
            _ => PhaseStatus::Pending,
        };
        phases.push(PhaseInfo {
            number: i,
            // Wave names are 0-indexed in the names table.
            name: phase_name(names.as_ref(), i - 1),
            status,
        });
    }
    Some(PhaseLadder {
        phases,
        wave_based: true,
    })
}

/// Priority 2: explicit phase-state.json.
fn phases_from_state_file(path: &Path) -> Option<PhaseLadder> {
    let state = read_phase_state(path)?;
    let max_phase = state
        .total_phases
        .unwrap_or(7)
        .max(state.current_phase)
        .max(state.completed_phases.iter().copied().max().unwrap_or(0));

    let mut phases = Vec::new();
    for i in 0..=max_phase {
        let status = if state.completed_phases.contains(&i) {
            PhaseStatus::Done
        } else if i == state.current_phase {
            PhaseStatus::Active
        } else {
            PhaseStatus::Pending
        };
        phases.push(PhaseInfo {
            number: i,
            name: phase_name(state.phase_names.as_ref(), i),
            status,
        });
    }
    Some(PhaseLadder {
        phases,
        wave_based: false,
    })
}

/// Priority 3: infer progress from which build artifacts exist on disk.
fn phases_from_artifacts(project_path: &Path) -> Option<PhaseLadder> {
    if !project_path.exists() {
        return None;
    }
    let artifacts: [&[&str]; 8] = [
        &[],
        &["INSTRUCTIONS.md"],
        &["src/assets"],
        &["src"],
        &["REVIEW.md"],
        &["vitest.config.ts", "tests"],
        &["README.md"],
        &["dist"],
    ];

    let mut last_completed: i32 = -1;
    for (i, files) in artifacts.iter().enumerate() {
        if !files.is_empty() && files.iter().any(|f| project_path.join(f).exists()) {
            last_completed = i as i32;
        }
    }

    let mut phases = Vec::new();
    for i in 0..=7u32 {
        let status = if (i as i32) <= last_completed {
            PhaseStatus::Done
        } else if i as i32 == last_completed + 1 {
            PhaseStatus::Active
        } else {
            PhaseStatus::Pending
        };
        phases.push(PhaseInfo {
            number: i,
            name: phase_name(None, i),
            status,
        });
    }
    Some(PhaseLadder {
        phases,
        wave_based: false,
    })
}

/// Resolves the phase ladder from the highest-ranked available source.
pub struct PhaseTracker {
    phase_state_path: PathBuf,
    project_path: Option<PathBuf>,
}

impl PhaseTracker {
    pub fn new(phase_state_path: PathBuf, project_path: Option<PathBuf>) -> Self {
        Self {
            phase_state_path,
            project_path,
        }
    }

    pub fn poll(&self, meta: &ProjectMeta) -> PhaseLadder {
        if let Some(ladder) = phases_from_wave_timings(meta, &self.phase_state_path) {
            return ladder;
        }
        if let Some(ladder) = phases_from_state_file(&self.phase_state_path) {
            return ladder;
        }
        if let Some(project_path) = &self.project_path {
            if let Some(ladder) = phases_from_artifacts(project_path) {
                return ladder;
            }
        }
        PhaseLadder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::status::WaveTiming;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn meta_with_waves(timings: &[(u32, bool, bool)]) -> ProjectMeta {
        let mut wave_timings = BTreeMap::new();
        for (num, started, completed) in timings {
            wave_timings.insert(
                *num,
                WaveTiming {
                    started_at: started.then(|| "2026-01-01T00:00:00Z".parse().unwrap()),
                    completed_at: completed.then(|| "2026-01-01T01:00:00Z".parse().unwrap()),
                },
            );
        }
        ProjectMeta {
            wave_timings,
            ..ProjectMeta::default()
        }
    }

    #[test]
    fn test_wave_timings_take_priority() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("phase-state.json");
        fs::write(
            &state_path,
            r#"{"currentPhase":5,"completedPhases":[0,1,2,3,4]}"#,
        )
        .unwrap();

        let tracker = PhaseTracker::new(state_path, None);
        let meta = meta_with_waves(&[(1, true, true), (2, true, false)]);
        let ladder = tracker.poll(&meta);

        assert!(ladder.wave_based);
        assert_eq!(ladder.phases.len(), 2);
        assert_eq!(ladder.phases[0].status, PhaseStatus::Done);
        assert_eq!(ladder.phases[1].status, PhaseStatus::Active);
    }

    #[test]
    fn test_state_file_fallback() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("phase-state.json");
        fs::write(
            &state_path,
            r#"{"currentPhase":2,"completedPhases":[0,1],"totalPhases":4,"phaseNames":["A","B","C","D","E"]}"#,
        )
        .unwrap();

        let tracker = PhaseTracker::new(state_path, None);
        let ladder = tracker.poll(&ProjectMeta::default());

        assert!(!ladder.wave_based);
        assert_eq!(ladder.phases.len(), 5);
        assert_eq!(ladder.phases[0].status, PhaseStatus::Done);
        assert_eq!(ladder.phases[2].status, PhaseStatus::Active);
        assert_eq!(ladder.phases[3].status, PhaseStatus::Pending);
        assert_eq!(ladder.phases[2].name, "C");
    }

    #[test]
    fn test_artifact_heuristics_fallback() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("proj");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::write(project.join("INSTRUCTIONS.md"), "go").unwrap();

        let tracker = PhaseTracker::new(dir.path().join("missing.json"), Some(project));
        let ladder = tracker.poll(&ProjectMeta::default());

        // src exists so phases up to 3 read as done, 4 active.
        assert_eq!(ladder.phases[3].status, PhaseStatus::Done);
        assert_eq!(ladder.phases[4].status, PhaseStatus::Active);
    }

    #[test]
    fn test_no_sources_yields_empty() {
        let tracker = PhaseTracker::new(PathBuf::from("/nonexistent.json"), None);
        let ladder = tracker.poll(&ProjectMeta::default());
        assert!(ladder.phases.is_empty());
    }
}
