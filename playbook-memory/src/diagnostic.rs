//! Optional on-disk record of reflection prompts and replies
//!
//! Diagnostics are on when `<project>/.claude/diagnostic_mode` exists. Write
//! failures are logged and never affect the caller.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use crate::config::Config;

/// Writes one file per record into the diagnostic directory
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    dir: Option<PathBuf>,
}

impl DiagnosticSink {
    /// Enable the sink for a project when its flag file is present
    pub fn for_project(config: &Config) -> Self {
        if config.diagnostic_flag_path().exists() {
            Self::enabled(config.diagnostic_dir())
        } else {
            Self::disabled()
        }
    }

    /// A sink writing into `dir`
    pub fn enabled(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A sink that drops everything
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Record one reflection round
    pub fn record_round(&self, purpose: &str, round: u32, prompt: &str, response: &str) {
        let label = format!("{}_round{}", purpose, round);
        self.write(&label, &format!("{}\n\n===== RESPONSE =====\n\n{}\n", prompt, response));
    }

    /// Record a free-form entry
    pub fn record(&self, label: &str, body: &str) {
        self.write(label, body);
    }

    fn write(&self, label: &str, body: &str) {
        let Some(dir) = &self.dir else {
            return;
        };

        let file_name = format!("{}_{}.txt", Utc::now().format("%Y%m%dT%H%M%S%3f"), label);
        let result = fs::create_dir_all(dir).and_then(|_| fs::write(dir.join(&file_name), body));
        if let Err(e) = result {
            tracing::warn!("Failed to write diagnostic {}: {}", file_name, e);
        }
    }
}
