// ABOUTME: Project registry reader backing the projects panel
// Retains the last good registry across transient parse failures

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
    pub status: String,
    pub path: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRegistry {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_updated: String::new(),
            projects: Vec::new(),
        }
    }
}

pub struct ProjectTracker {
    registry_path: PathBuf,
    registry: ProjectRegistry,
}

impl ProjectTracker {
    pub fn new(registry_path: PathBuf) -> Self {
        Self {
            registry_path,
            registry: ProjectRegistry::default(),
        }
    }

    /// Re-read the registry; a missing file is an empty registry but a
    /// corrupt one keeps the previous contents on screen.
    pub fn poll(&mut self) {
        if !self.registry_path.exists() {
            self.registry = ProjectRegistry::default();
            return;
        }
        match fs::read_to_string(&self.registry_path) {
            Ok(raw) => match serde_json::from_str::<ProjectRegistry>(&raw) {
                Ok(registry) => self.registry = registry,
                Err(err) => debug!("project registry parse failed, keeping last good: {}", err),
            },
            Err(err) => debug!("project registry unreadable: {}", err),
        }
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_poll_reads_registry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects.json");
        fs::write(
            &path,
            r#"{"version":"2.1","lastUpdated":"2026-02-01","projects":[
                {"name":"wave-site","status":"active","path":"workspace/wave-site","tags":["web"]}
            ]}"#,
        )
        .unwrap();

        let mut tracker = ProjectTracker::new(path);
        tracker.poll();
        let registry = tracker.registry();
        assert_eq!(registry.version, "2.1");
        assert_eq!(registry.projects.len(), 1);
        assert_eq!(registry.projects[0].name, "wave-site");
        assert_eq!(registry.projects[0].status, "active");
    }

    #[test]
    fn test_corrupt_file_keeps_last_good() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects.json");
        fs::write(
            &path,
            r#"{"version":"1.0","lastUpdated":"","projects":[{"name":"a","status":"active","path":"p"}]}"#,
        )
        .unwrap();

        let mut tracker = ProjectTracker::new(path.clone());
        tracker.poll();
        assert_eq!(tracker.registry().projects.len(), 1);

        fs::write(&path, "{ broken").unwrap();
        tracker.poll();
        assert_eq!(tracker.registry().projects.len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty_registry() {
        let dir = tempdir().unwrap();
        let mut tracker = ProjectTracker::new(dir.path().join("projects.json"));
        tracker.poll();
        assert!(tracker.registry().projects.is_empty());
        assert_eq!(tracker.registry().version, "1.0");
    }
}
