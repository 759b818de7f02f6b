//! Configuration settings for studycrew.

use crate::agent::{AgentRole, Lane};
use crate::error::{Result, StudyError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Log levels accepted in `general.log_level` and `LOG_LEVEL`.
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub lanes: LaneSet,
    pub routing: RoutingSettings,
    pub pipeline: PipelineSettings,
    pub agents: AgentSettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory holding session memory and uploaded materials.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.studycrew".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// One credential/model pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneSettings {
    /// Chat model name.
    pub model: String,
    /// OpenAI-compatible API base URL. `None` uses the OpenAI default.
    pub api_base: Option<String>,
    /// Environment variables holding the API key, tried in order.
    pub api_key_env: Vec<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// HTTP timeout for a single completion request.
    pub timeout_secs: u64,
}

impl Default for LaneSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-lite".to_string(),
            api_base: Some("https://generativelanguage.googleapis.com/v1beta/openai".to_string()),
            api_key_env: vec!["GOOGLE_API_KEY".to_string()],
            temperature: 0.1,
            timeout_secs: 300,
        }
    }
}

impl LaneSettings {
    /// Resolve the API key from the first non-empty configured variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }
}

/// The two provisioned lanes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneSet {
    /// High resilience, high request budget.
    pub a: LaneSettings,
    /// Higher quality, low request budget.
    pub b: LaneSettings,
}

impl Default for LaneSet {
    fn default() -> Self {
        Self {
            a: LaneSettings::default(),
            b: LaneSettings {
                api_key_env: vec!["GOOGLE_API_KEY_2".to_string(), "GOOGLE_API_KEY".to_string()],
                temperature: 0.4,
                ..LaneSettings::default()
            },
        }
    }
}

impl LaneSet {
    pub fn get(&self, lane: Lane) -> &LaneSettings {
        match lane {
            Lane::A => &self.a,
            Lane::B => &self.b,
        }
    }
}

/// Role to lane routing table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutingSettings {
    pub note_summarizer: Lane,
    pub study_scheduler: Lane,
    pub resource_finder: Lane,
    pub quiz_generator: Lane,
    pub progress_tracker: Lane,
    pub study_coordinator: Lane,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            note_summarizer: Lane::A,
            study_scheduler: Lane::B,
            resource_finder: Lane::A,
            quiz_generator: Lane::B,
            progress_tracker: Lane::A,
            study_coordinator: Lane::B,
        }
    }
}

impl RoutingSettings {
    /// Lane assigned to a role.
    pub fn lane_for(&self, role: AgentRole) -> Lane {
        match role {
            AgentRole::NoteSummarizer => self.note_summarizer,
            AgentRole::StudyScheduler => self.study_scheduler,
            AgentRole::ResourceFinder => self.resource_finder,
            AgentRole::QuizGenerator => self.quiz_generator,
            AgentRole::ProgressTracker => self.progress_tracker,
            AgentRole::StudyCoordinator => self.study_coordinator,
        }
    }

    /// Roles assigned to a lane, in pipeline order.
    pub fn roles_on(&self, lane: Lane) -> Vec<AgentRole> {
        AgentRole::ALL
            .into_iter()
            .filter(|role| self.lane_for(*role) == lane)
            .collect()
    }
}

/// Pipeline pacing and quota handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Pause after every task before the next one starts.
    pub task_cooldown_secs: u64,
    /// Wait after a quota-exhaustion error before retrying the same call.
    pub quota_cooldown_secs: u64,
    /// Maximum quota failures per call before giving up. Unset retries forever.
    pub max_quota_attempts: Option<u32>,
    /// Substrings (case-insensitive) that mark an error as quota exhaustion.
    pub quota_markers: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            task_cooldown_secs: 15,
            quota_cooldown_secs: 70,
            max_quota_attempts: None,
            quota_markers: vec![
                "429".to_string(),
                "RESOURCE_EXHAUSTED".to_string(),
                "RATE LIMIT".to_string(),
                "QUOTA".to_string(),
            ],
        }
    }
}

impl PipelineSettings {
    pub fn task_cooldown(&self) -> Duration {
        Duration::from_secs(self.task_cooldown_secs)
    }

    pub fn quota_cooldown(&self) -> Duration {
        Duration::from_secs(self.quota_cooldown_secs)
    }
}

/// Per-agent execution budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Model round-trips allowed per task for the analysis agents.
    pub max_iterations: usize,
    /// Model round-trips allowed for the synthesis task.
    pub coordinator_max_iterations: usize,
    /// Advisory request ceiling per agent. Unset disables pacing.
    pub max_requests_per_minute: Option<u32>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            coordinator_max_iterations: 5,
            max_requests_per_minute: Some(1),
        }
    }
}

/// Academic search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// arXiv query endpoint.
    pub endpoint: String,
    /// Number of papers returned per search.
    pub max_results: usize,
    /// Queries are cut down to this many words.
    pub max_query_words: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://export.arxiv.org/api/query".to_string(),
            max_results: 3,
            max_query_words: 5,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Progress lines buffered per run before the worker waits on the client.
    pub relay_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            relay_capacity: 256,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory with `tasks.toml` / `agents.toml` overrides.
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// `OUTPUT_DIR` and `LOG_LEVEL` in the environment override the file.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                settings.general.data_dir = dir;
            }
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                settings.general.log_level = level;
            }
        }

        settings.general.log_level = Self::validate_log_level(&settings.general.log_level)?;
        Ok(settings)
    }

    /// Normalize and check a log level.
    pub fn validate_log_level(level: &str) -> Result<String> {
        let normalized = match level.trim().to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" => "error".to_string(),
            other => other.to_string(),
        };
        if VALID_LOG_LEVELS.contains(&normalized.as_str()) {
            Ok(normalized)
        } else {
            Err(StudyError::Config(format!(
                "Invalid log level '{}'. Must be one of {:?}",
                level, VALID_LOG_LEVELS
            )))
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("studycrew")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Root of the per-session memory journals.
    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir().join("memory")
    }

    /// Sandbox for uploaded and agent-written study materials.
    pub fn materials_dir(&self) -> PathBuf {
        self.data_dir().join("materials")
    }

    /// Create the data directory layout.
    pub fn create_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.memory_dir())?;
        std::fs::create_dir_all(self.materials_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routing_splits_three_and_three() {
        let routing = RoutingSettings::default();
        assert_eq!(routing.roles_on(Lane::A).len(), 3);
        assert_eq!(routing.roles_on(Lane::B).len(), 3);
        assert_eq!(routing.lane_for(AgentRole::StudyCoordinator), Lane::B);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[pipeline]
task_cooldown_secs = 2

[routing]
progress_tracker = "b"
"#,
        )
        .unwrap();

        assert_eq!(settings.pipeline.task_cooldown_secs, 2);
        assert_eq!(settings.pipeline.quota_cooldown_secs, 70);
        assert_eq!(settings.routing.progress_tracker, Lane::B);
        assert_eq!(settings.routing.note_summarizer, Lane::A);
        assert_eq!(settings.lanes.b.temperature, 0.4);
    }

    #[test]
    fn test_validate_log_level() {
        assert_eq!(Settings::validate_log_level("INFO").unwrap(), "info");
        assert_eq!(Settings::validate_log_level("WARNING").unwrap(), "warn");
        assert!(Settings::validate_log_level("loud").is_err());
    }

    #[test]
    fn test_data_layout() {
        let mut settings = Settings::default();
        settings.general.data_dir = "/tmp/studycrew-test".to_string();
        assert_eq!(settings.memory_dir(), PathBuf::from("/tmp/studycrew-test/memory"));
        assert_eq!(settings.materials_dir(), PathBuf::from("/tmp/studycrew-test/materials"));
    }
}
