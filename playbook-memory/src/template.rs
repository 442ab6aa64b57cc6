//! Prompt templates and placeholder rendering
//!
//! Templates are plain text with literal placeholders: `{trajectories}` and
//! `{playbook}` in the reflection prompt, `{playbook}` in the cached system
//! preamble, and `{key_points}` in the context-injection text.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::message::Message;
use crate::playbook::Playbook;

pub const DEFAULT_REFLECTION_TEMPLATE: &str = include_str!("../prompts/reflection.txt");
pub const DEFAULT_CONTEXT_TEMPLATE: &str = include_str!("../prompts/playbook.txt");
pub const DEFAULT_PREAMBLE_TEMPLATE: &str = include_str!("../prompts/playbook_preamble.txt");

const TRAJECTORIES: &str = "{trajectories}";
const PLAYBOOK: &str = "{playbook}";
const KEY_POINTS: &str = "{key_points}";

/// The set of prompt templates used by one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    /// Per-round reflection prompt
    pub reflection: String,

    /// Context injected at the start of a session
    pub context: String,

    /// System preamble carrying the playbook when prompt caching is on
    pub preamble: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            reflection: DEFAULT_REFLECTION_TEMPLATE.to_string(),
            context: DEFAULT_CONTEXT_TEMPLATE.to_string(),
            preamble: DEFAULT_PREAMBLE_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Load templates from `dir`, using the built-in text for any file that is
    /// missing or blank
    pub fn load(dir: &Path) -> Self {
        let read = |file: &str, default: &str| match fs::read_to_string(dir.join(file)) {
            Ok(text) if !text.trim().is_empty() => {
                tracing::debug!("Using prompt override {:?}", dir.join(file));
                text
            }
            _ => default.to_string(),
        };

        Self {
            reflection: read("reflection.txt", DEFAULT_REFLECTION_TEMPLATE),
            context: read("playbook.txt", DEFAULT_CONTEXT_TEMPLATE),
            preamble: read("playbook_preamble.txt", DEFAULT_PREAMBLE_TEMPLATE),
        }
    }
}

/// Render messages as a pretty JSON array of `{role, content}`
pub fn render_trajectories(messages: &[Message]) -> String {
    serde_json::to_string_pretty(messages).unwrap_or_else(|_| "[]".to_string())
}

/// Render key points as a pretty JSON object mapping name to text
pub fn render_playbook(playbook: &Playbook) -> String {
    let map: Map<String, Value> = playbook
        .key_points
        .iter()
        .map(|kp| (kp.name.clone(), Value::String(kp.text.clone())))
        .collect();
    serde_json::to_string_pretty(&Value::Object(map)).unwrap_or_else(|_| "{}".to_string())
}

/// Fill the reflection template. With `playbook` set, `{playbook}` is replaced by
/// the rendered playbook; without it the placeholder is removed.
pub fn render_reflection(template: &str, messages: &[Message], playbook: Option<&Playbook>) -> String {
    let playbook = playbook.map(render_playbook).unwrap_or_default();
    template
        .replace(TRAJECTORIES, &render_trajectories(messages))
        .replace(PLAYBOOK, &playbook)
}

/// Fill the system preamble with the rendered playbook
pub fn render_preamble(template: &str, playbook: &Playbook) -> String {
    template.replace(PLAYBOOK, &render_playbook(playbook))
}

/// Fill the context template with a `- ` bulleted list of key point texts.
///
/// Returns an empty string when the playbook has no key points.
pub fn render_context(template: &str, playbook: &Playbook) -> String {
    if playbook.is_empty() {
        return String::new();
    }
    let bullets = playbook
        .key_points
        .iter()
        .map(|kp| format!("- {}", kp.text))
        .collect::<Vec<_>>()
        .join("\n");
    template.replacen(KEY_POINTS, &bullets, 1)
}
