//! Hook event handlers
//!
//! The assistant host runs the hook binary on lifecycle events and passes a
//! JSON object on stdin. Prompt submission injects the playbook once per
//! session; session end and compaction reflect on the transcript and update
//! the playbook.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{Config, Settings};
use crate::diagnostic::DiagnosticSink;
use crate::error::Result;
use crate::reflection::ReflectiveExtractor;
use crate::scoring;
use crate::storage::{PlaybookStore, SessionGate, TranscriptReader};
use crate::template::PromptTemplates;

/// Event name reported back when injecting context
pub const PROMPT_SUBMIT_EVENT: &str = "UserPromptSubmit";

/// Payload the host sends on stdin
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub transcript_path: Option<PathBuf>,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Why a session ended (`clear`, `logout`, ...)
    #[serde(default)]
    pub reason: Option<String>,
}

impl HookInput {
    /// Parse stdin, treating empty or malformed input as an empty object
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<HookInput>(raw) {
            Ok(input) => input,
            Err(e) => {
                tracing::warn!("Ignoring malformed hook input: {}", e);
                Self::default()
            }
        }
    }
}

/// Response written to stdout by the prompt-submit hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    /// Nothing to inject
    Empty,

    /// Context to add to the conversation
    Context { event: String, context: String },
}

impl HookOutput {
    /// Render the response object
    pub fn to_json(&self) -> Value {
        match self {
            HookOutput::Empty => json!({}),
            HookOutput::Context { event, context } => json!({
                "hookSpecificOutput": {
                    "hookEventName": event,
                    "additionalContext": context,
                }
            }),
        }
    }
}

/// What an update cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No transcript or no conversation in it; nothing was called or written
    NoTranscript,

    /// Reflection produced nothing to merge; the playbook was left untouched
    NothingExtracted,

    /// The merged playbook was saved
    Saved { before: usize, after: usize },
}

/// Runs hook events for one project
pub struct Hooks {
    store: PlaybookStore,
    gate: SessionGate,
    settings: Settings,
    extractor: ReflectiveExtractor,
    diagnostics: DiagnosticSink,
}

impl Hooks {
    /// Wire up stores, templates, settings, and diagnostics for `config`
    pub fn new(config: &Config, extractor: ReflectiveExtractor) -> Self {
        let templates = PromptTemplates::load(&config.prompts_dir());
        let diagnostics = DiagnosticSink::for_project(config);

        Self {
            store: PlaybookStore::new(config).with_context_template(templates.context.clone()),
            gate: SessionGate::new(config),
            settings: Settings::load(&config.settings_path()),
            extractor: extractor
                .with_templates(templates)
                .with_diagnostics(diagnostics.clone()),
            diagnostics,
        }
    }

    /// Inject the playbook on the first prompt of a session
    pub fn user_prompt_submit(&self, input: &HookInput) -> Result<HookOutput> {
        let Some(session_id) = input.session_id.as_deref() else {
            return Ok(HookOutput::Empty);
        };
        if !self.gate.is_first_message(session_id) {
            return Ok(HookOutput::Empty);
        }
        self.gate.mark_session(session_id)?;

        let context = self.store.format(&self.store.load());
        if context.is_empty() {
            return Ok(HookOutput::Empty);
        }

        tracing::info!("Injecting playbook context for session {}", session_id);
        Ok(HookOutput::Context {
            event: PROMPT_SUBMIT_EVENT.to_string(),
            context,
        })
    }

    /// Reflect on a finished session, if settings allow, then reset the gate
    pub async fn session_end(&self, input: &HookInput) -> Result<Option<UpdateOutcome>> {
        let outcome = if self.settings.should_update(input.reason.as_deref()) {
            Some(self.update_playbook(input.transcript_path.as_deref(), "session_end").await)
        } else {
            tracing::info!(
                "Playbook update disabled for session end reason {:?}",
                input.reason
            );
            None
        };

        self.gate.clear_session()?;
        outcome.transpose()
    }

    /// Reflect before the host compacts the conversation, then reset the gate
    pub async fn pre_compact(&self, input: &HookInput) -> Result<UpdateOutcome> {
        let outcome = self
            .update_playbook(input.transcript_path.as_deref(), "precompact")
            .await;
        self.gate.clear_session()?;
        outcome
    }

    /// Load the transcript, reflect, merge, and save
    pub async fn update_playbook(
        &self,
        transcript_path: Option<&Path>,
        purpose: &str,
    ) -> Result<UpdateOutcome> {
        let Some(path) = transcript_path else {
            tracing::debug!("No transcript path for {}", purpose);
            return Ok(UpdateOutcome::NoTranscript);
        };

        let messages = TranscriptReader::new(path).read_all().unwrap_or_else(|e| {
            tracing::warn!("Could not read transcript {:?}: {}", path, e);
            Vec::new()
        });
        if messages.is_empty() {
            tracing::debug!("Transcript {:?} has no conversation", path);
            return Ok(UpdateOutcome::NoTranscript);
        }

        let playbook = self.store.load();
        let result = self.extractor.extract(&messages, &playbook, purpose).await;
        if result.is_empty() {
            return Ok(UpdateOutcome::NothingExtracted);
        }

        let before = playbook.key_points.len();
        let mut updated = scoring::apply(playbook, &result);
        self.store.save(&mut updated)?;
        let after = updated.key_points.len();

        self.diagnostics.record(
            &format!("{}_merge", purpose),
            &format!(
                "key points before: {}\nkey points after: {}\n\n{}",
                before,
                after,
                serde_json::to_string_pretty(&result)?
            ),
        );
        tracing::info!(
            "Updated playbook {:?}: {} -> {} key point(s)",
            self.store.path(),
            before,
            after
        );
        Ok(UpdateOutcome::Saved { before, after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_input_parse() {
        let input = HookInput::parse(
            r#"{"session_id": "s1", "transcript_path": "/tmp/t.jsonl", "cwd": "/work", "reason": "clear", "extra": 1}"#,
        );
        assert_eq!(input.session_id.as_deref(), Some("s1"));
        assert_eq!(input.transcript_path, Some(PathBuf::from("/tmp/t.jsonl")));
        assert_eq!(input.cwd, Some(PathBuf::from("/work")));
        assert_eq!(input.reason.as_deref(), Some("clear"));
    }

    #[test]
    fn test_hook_input_defaults() {
        assert_eq!(HookInput::parse(""), HookInput::default());
        assert_eq!(HookInput::parse("   \n"), HookInput::default());
        assert_eq!(HookInput::parse("{broken"), HookInput::default());
        assert_eq!(HookInput::parse("[]"), HookInput::default());
        assert_eq!(HookInput::parse("{}"), HookInput::default());
    }

    #[test]
    fn test_hook_output_json() {
        assert_eq!(HookOutput::Empty.to_json(), json!({}));

        let output = HookOutput::Context {
            event: PROMPT_SUBMIT_EVENT.to_string(),
            context: "- lesson".to_string(),
        };
        assert_eq!(
            output.to_json(),
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "UserPromptSubmit",
                    "additionalContext": "- lesson"
                }
            })
        );
    }
}
