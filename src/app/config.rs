// ABOUTME: Application configuration with defaults and file loading
// Supports TOML configuration files and environment variable overrides

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the dev workspace all dashboard state files live under.
    #[serde(default = "default_dev_root")]
    pub dev_root: PathBuf,
    /// Seconds between poll passes.
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u64,
    #[serde(default = "default_theme")]
    pub theme: Theme,
    /// Optional per-model rate table ($/1M tokens) merged over the defaults.
    #[serde(default)]
    pub model_rates: Option<PathBuf>,
    /// Project directory used for artifact-based phase inference.
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
    #[serde(skip)]
    pub debug: bool,
    #[serde(skip)]
    pub json_output: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

fn default_theme() -> Theme {
    Theme::Dark
}

fn default_refresh_rate() -> u64 {
    2
}

fn default_dev_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dev")
}

fn claude_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dev_root: default_dev_root(),
            refresh_rate: default_refresh_rate(),
            theme: default_theme(),
            model_rates: None,
            project_path: None,
            config_path: None,
            debug: false,
            json_output: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(proj_dirs) = ProjectDirs::from("com", "wavedash", "wavedash") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                if let Ok(contents) = std::fs::read_to_string(&config_path) {
                    if let Ok(file_config) = toml::from_str::<Self>(&contents) {
                        config = file_config;
                        config.config_path = Some(config_path);
                    }
                }
            }
        }

        if let Ok(root) = std::env::var("WAVEDASH_DEV_ROOT") {
            config.dev_root = PathBuf::from(root);
        }

        if let Ok(rate) = std::env::var("WAVEDASH_REFRESH_RATE") {
            if let Ok(parsed) = rate.parse() {
                config.refresh_rate = parsed;
            }
        }

        if let Ok(path) = std::env::var("WAVEDASH_PROJECT_PATH") {
            config.project_path = Some(PathBuf::from(path));
        }

        config
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(proj_dirs) = ProjectDirs::from("com", "wavedash", "wavedash") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;

            let config_path = config_dir.join("config.toml");
            let contents = toml::to_string_pretty(self)?;
            std::fs::write(config_path, contents)?;
        }

        Ok(())
    }

    pub fn active_agents_path(&self) -> PathBuf {
        self.dev_root.join("logs").join("active-agents.json")
    }

    pub fn usage_path(&self) -> PathBuf {
        self.dev_root.join("logs").join("tokens").join("usage.json")
    }

    pub fn phase_state_path(&self) -> PathBuf {
        self.dev_root.join("logs").join("phase-state.json")
    }

    pub fn projects_path(&self) -> PathBuf {
        self.dev_root.join("system").join("projects.json")
    }

    pub fn work_history_path(&self) -> PathBuf {
        self.dev_root.join("logs").join("work-history.json")
    }

    pub fn todos_dir(&self) -> PathBuf {
        claude_dir().join("todos")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        claude_dir().join("projects")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_file_merges_with_defaults() {
        let config: AppConfig = toml::from_str("refresh_rate = 5").unwrap();
        assert_eq!(config.refresh_rate, 5);
        assert_eq!(config.dev_root, default_dev_root());
        assert!(config.model_rates.is_none());

        let config: AppConfig = toml::from_str("dev_root = \"/tmp/dev\"").unwrap();
        assert_eq!(config.dev_root, PathBuf::from("/tmp/dev"));
        assert_eq!(config.refresh_rate, 2);
    }

    #[test]
    fn test_state_paths_hang_off_dev_root() {
        let config = AppConfig {
            dev_root: PathBuf::from("/tmp/dev"),
            ..AppConfig::default()
        };
        assert_eq!(
            config.active_agents_path(),
            PathBuf::from("/tmp/dev/logs/active-agents.json")
        );
        assert_eq!(
            config.usage_path(),
            PathBuf::from("/tmp/dev/logs/tokens/usage.json")
        );
        assert_eq!(
            config.projects_path(),
            PathBuf::from("/tmp/dev/system/projects.json")
        );
        assert_eq!(
            config.work_history_path(),
            PathBuf::from("/tmp/dev/logs/work-history.json")
        );
    }
}
