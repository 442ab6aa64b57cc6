//! Last-session token used to inject context once per session

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;

/// Tracks which session last received injected context
pub struct SessionGate {
    path: PathBuf,
}

impl SessionGate {
    /// Create a gate for the project described by `config`
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.session_path(),
        }
    }

    /// True when `session_id` has not been marked yet
    pub fn is_first_message(&self, session_id: &str) -> bool {
        match fs::read_to_string(&self.path) {
            Ok(last) => last.trim() != session_id,
            Err(_) => true,
        }
    }

    /// Remember `session_id` as the current session
    pub fn mark_session(&self, session_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, session_id)?;
        Ok(())
    }

    /// Forget the current session so the next prompt injects again
    pub fn clear_session(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
