//! Configuration for playbook-memory

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default model used for reflection when no override is set
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default Anthropic API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default extended-thinking budget in tokens
pub const DEFAULT_THINKING_BUDGET: u32 = 16000;

/// Default number of reflection rounds
pub const DEFAULT_MAX_ROUNDS: u32 = 1;

const API_KEY_VARS: [&str; 3] = ["AGENT_API_KEY", "ANTHROPIC_AUTH_TOKEN", "ANTHROPIC_API_KEY"];
const MODEL_VARS: [&str; 3] = [
    "AGENT_MODEL",
    "ANTHROPIC_MODEL",
    "ANTHROPIC_DEFAULT_SONNET_MODEL",
];
const BASE_URL_VARS: [&str; 2] = ["AGENT_BASE_URL", "ANTHROPIC_BASE_URL"];

/// Filesystem locations for one project
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root; per-project state lives under `<project>/.claude`
    pub project_dir: PathBuf,

    /// User home; prompt overrides and settings live under `<home>/.claude`
    pub home_dir: PathBuf,
}

impl Config {
    /// Create a config for an explicit project and home directory
    pub fn new(project_dir: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            home_dir: home_dir.into(),
        }
    }

    /// Create a config for a project, using the current user's home directory
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(project_dir, home_dir)
    }

    fn project_state_dir(&self) -> PathBuf {
        self.project_dir.join(".claude")
    }

    fn user_state_dir(&self) -> PathBuf {
        self.home_dir.join(".claude")
    }

    /// Get the path to the persisted playbook
    pub fn playbook_path(&self) -> PathBuf {
        self.project_state_dir().join("playbook.json")
    }

    /// Get the path to the last-session token
    pub fn session_path(&self) -> PathBuf {
        self.project_state_dir().join("last_session.txt")
    }

    /// Get the path to the flag file that turns diagnostics on
    pub fn diagnostic_flag_path(&self) -> PathBuf {
        self.project_state_dir().join("diagnostic_mode")
    }

    /// Get the directory diagnostic records are written to
    pub fn diagnostic_dir(&self) -> PathBuf {
        self.project_state_dir().join("diagnostic")
    }

    /// Get the directory holding user prompt template overrides
    pub fn prompts_dir(&self) -> PathBuf {
        self.user_state_dir().join("prompts")
    }

    /// Get the path to the user settings file
    pub fn settings_path(&self) -> PathBuf {
        self.user_state_dir().join("playbook_settings.json")
    }
}

/// Settings for the reflective extractor, resolved from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// API credential; `None` disables extraction
    pub api_key: Option<String>,

    /// Model identifier
    pub model: String,

    /// API endpoint (scheme and host, without `/v1/messages`)
    pub base_url: String,

    /// Extended-thinking budget in tokens, 0 disables thinking
    pub thinking_budget: u32,

    /// Upper bound on reflection rounds, always at least 1
    pub max_rounds: u32,

    /// Whether the playbook is sent as a cacheable system preamble
    pub prompt_cache: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            max_rounds: DEFAULT_MAX_ROUNDS,
            prompt_cache: true,
        }
    }
}

impl ExtractorConfig {
    /// Resolve from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let first = |names: &[&str]| names.iter().find_map(|&name| get(name));

        let defaults = Self::default();

        let thinking_budget = get("AGENT_THINKING_BUDGET")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.thinking_budget);

        let max_rounds = get("AGENT_MAX_ROUNDS")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.max_rounds)
            .max(1);

        let prompt_cache = get("AGENT_PROMPT_CACHE")
            .map(|v| v != "false")
            .unwrap_or(true);

        Self {
            api_key: first(&API_KEY_VARS[..]),
            model: first(&MODEL_VARS[..]).unwrap_or(defaults.model),
            base_url: first(&BASE_URL_VARS[..]).unwrap_or(defaults.base_url),
            thinking_budget,
            max_rounds,
            prompt_cache,
        }
    }

    /// Whether a credential is configured
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// User-level switches for when the playbook is refreshed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Refresh when a session ends for any reason other than `clear`
    #[serde(default = "default_true")]
    pub playbook_update_on_exit: bool,

    /// Refresh when a session ends because the user cleared it
    #[serde(default)]
    pub playbook_update_on_clear: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playbook_update_on_exit: true,
            playbook_update_on_clear: false,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is missing or malformed
    pub fn load(path: &Path) -> Self {
        let Ok(data) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Settings>(&data) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring malformed settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Whether a session ending for `reason` should refresh the playbook
    pub fn should_update(&self, reason: Option<&str>) -> bool {
        match reason {
            Some("clear") => self.playbook_update_on_clear,
            _ => self.playbook_update_on_exit,
        }
    }
}
