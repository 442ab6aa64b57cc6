//! JSON file storage for the per-project playbook

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::playbook::Playbook;
use crate::template::{self, DEFAULT_CONTEXT_TEMPLATE};

/// Loads, saves, and renders the playbook for one project
pub struct PlaybookStore {
    path: PathBuf,
    context_template: String,
}

impl PlaybookStore {
    /// Create a store for the project described by `config`
    pub fn new(config: &Config) -> Self {
        Self::at_path(config.playbook_path())
    }

    /// Create a store backed by an explicit file
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            context_template: DEFAULT_CONTEXT_TEMPLATE.to_string(),
        }
    }

    /// Use a custom context-injection template
    pub fn with_context_template(mut self, template: impl Into<String>) -> Self {
        self.context_template = template.into();
        self
    }

    /// Get the path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the playbook, normalizing legacy entries.
    ///
    /// A missing or unparsable file yields an empty playbook.
    pub fn load(&self) -> Playbook {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not read playbook {:?}: {}", self.path, e);
                }
                return Playbook::new();
            }
        };

        let parsed = serde_json::from_str::<Value>(&data)
            .ok()
            .and_then(|value| Playbook::from_value(&value));

        match parsed {
            Some(playbook) => playbook,
            None => {
                tracing::warn!("Playbook {:?} is malformed, starting fresh", self.path);
                Playbook::new()
            }
        }
    }

    /// Stamp `last_updated` and write the playbook.
    ///
    /// The file is written next to the target and renamed into place.
    pub fn save(&self, playbook: &mut Playbook) -> Result<()> {
        playbook.last_updated = Some(Utc::now());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut json = serde_json::to_string_pretty(playbook)?;
        json.push('\n');

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(
            "Saved {} key point(s) to {:?}",
            playbook.key_points.len(),
            self.path
        );
        Ok(())
    }

    /// Render the playbook as injectable context; empty when there is nothing to inject
    pub fn format(&self, playbook: &Playbook) -> String {
        template::render_context(&self.context_template, playbook)
    }
}
