//! Multi-round reflective extraction
//!
//! The extractor asks the model to reflect on a transcript against the current
//! playbook. Each round after the first sees the insights gathered so far and
//! is asked to dig deeper. The loop ends after `max_rounds` calls, or earlier
//! when a later round reports that it has converged.
//!
//! Each round's `new_key_points`/`evaluations` replace the running result
//! wholesale; they are never merged field by field across rounds.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;

use crate::config::ExtractorConfig;
use crate::diagnostic::DiagnosticSink;
use crate::error::Result;
use crate::llm::{AnthropicClient, LlmClient, LlmRequest};
use crate::message::Message;
use crate::playbook::{Evaluation, ExtractionResult, Playbook};
use crate::template::{self, PromptTemplates};

const DEEPEN_INSTRUCTION: &str = "Re-examine the transcript in light of these insights. \
Look for root causes rather than symptoms and challenge conclusions that are weakly supported. \
Your reply replaces the previous round's new_key_points and evaluations, so include everything you still stand behind. \
Set found_root_cause or no_new_insights to true, or insights_depth to \"sufficient\", when another round would add nothing.";

fn json_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("valid json fence pattern"))
}

fn any_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*\s*(.*?)```").expect("valid fence pattern")
    })
}

/// Structured data recovered from a model reply
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Parsed(Value),
    Malformed,
}

impl ParsedReply {
    /// Parse a reply, preferring a ```json fence, then any fence, then the raw text
    pub fn parse(text: &str) -> Self {
        let payload = json_fence()
            .captures(text)
            .or_else(|| any_fence().captures(text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(text)
            .trim();

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => ParsedReply::Parsed(value),
            Err(_) => ParsedReply::Malformed,
        }
    }

    fn describe(&self, raw: &str) -> String {
        match self {
            ParsedReply::Parsed(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ParsedReply::Malformed => format!("<malformed>\n\n{}", raw),
        }
    }
}

/// What one reflection round reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReply {
    /// Replacement for the running result, when the round carried one
    pub result: Option<ExtractionResult>,

    /// Free-text observations to feed into later rounds
    pub insights: Vec<String>,

    pub found_root_cause: bool,
    pub no_new_insights: bool,
    pub insights_depth: Option<String>,
}

impl RoundReply {
    /// Interpret a parsed reply. Anything unexpected reads as an empty round.
    pub fn from_parsed(parsed: &ParsedReply) -> Self {
        let ParsedReply::Parsed(Value::Object(fields)) = parsed else {
            return Self::default();
        };

        let result = if fields.contains_key("new_key_points") || fields.contains_key("evaluations") {
            Some(ExtractionResult {
                new_key_points: string_list(fields.get("new_key_points")),
                evaluations: evaluation_list(fields.get("evaluations")),
            })
        } else {
            None
        };

        let flag = |key: &str| fields.get(key).and_then(Value::as_bool).unwrap_or(false);

        Self {
            result,
            insights: string_list(fields.get("insights"))
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
            found_root_cause: flag("found_root_cause"),
            no_new_insights: flag("no_new_insights"),
            insights_depth: fields
                .get("insights_depth")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Whether the model signalled that more rounds would not help
    pub fn converged(&self) -> bool {
        self.found_root_cause
            || self.no_new_insights
            || self.insights_depth.as_deref() == Some("sufficient")
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn evaluation_list(value: Option<&Value>) -> Vec<Evaluation> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let rating = item.get("rating")?.as_str()?;
            Some(Evaluation {
                name: name.to_string(),
                rating: rating.to_string(),
            })
        })
        .collect()
}

fn with_previous_insights(prompt: &str, insights: &[String]) -> String {
    let listed = if insights.is_empty() {
        "(none recorded)".to_string()
    } else {
        insights
            .iter()
            .enumerate()
            .map(|(i, insight)| format!("{}. {}", i + 1, insight))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "{}\n\n## Insights from previous rounds\n\n{}\n\n## Deepen the analysis\n\n{}",
        prompt, listed, DEEPEN_INSTRUCTION
    )
}

/// Drives reflection rounds against an LLM and produces one extraction result
pub struct ReflectiveExtractor {
    client: Option<Arc<dyn LlmClient>>,
    templates: PromptTemplates,
    max_rounds: u32,
    thinking_budget: u32,
    prompt_cache: bool,
    diagnostics: DiagnosticSink,
}

impl ReflectiveExtractor {
    /// Create an extractor around an explicit client. `None` disables extraction.
    pub fn new(client: Option<Arc<dyn LlmClient>>, config: &ExtractorConfig) -> Self {
        Self {
            client,
            templates: PromptTemplates::default(),
            max_rounds: config.max_rounds.max(1),
            thinking_budget: config.thinking_budget,
            prompt_cache: config.prompt_cache,
            diagnostics: DiagnosticSink::disabled(),
        }
    }

    /// Create an extractor backed by the Anthropic API, disabled when no key is set
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        let client: Option<Arc<dyn LlmClient>> = if config.is_enabled() {
            Some(Arc::new(AnthropicClient::new(config)?))
        } else {
            None
        };
        Ok(Self::new(client, config))
    }

    /// Use custom prompt templates
    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Record every round to a diagnostic sink
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticSink) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Whether an LLM client is configured
    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Reflect on `messages` against `playbook` and return the net result.
    ///
    /// Never fails: a missing client or a failed first round yields an empty
    /// result, and a failure in a later round returns what was gathered so far.
    pub async fn extract(
        &self,
        messages: &[Message],
        playbook: &Playbook,
        purpose: &str,
    ) -> ExtractionResult {
        let Some(client) = &self.client else {
            tracing::info!("No API key configured, skipping {} reflection", purpose);
            return ExtractionResult::empty();
        };

        let inline_playbook = (!self.prompt_cache).then_some(playbook);
        let base_prompt = template::render_reflection(&self.templates.reflection, messages, inline_playbook);
        let system = self
            .prompt_cache
            .then(|| template::render_preamble(&self.templates.preamble, playbook));

        let mut previous_insights: Vec<String> = Vec::new();
        let mut final_result = ExtractionResult::empty();

        for round in 0..self.max_rounds {
            let prompt = if round == 0 {
                base_prompt.clone()
            } else {
                with_previous_insights(&base_prompt, &previous_insights)
            };
            let request = LlmRequest::new(prompt)
                .with_system(system.clone())
                .with_thinking_budget(self.thinking_budget);

            tracing::debug!("{} reflection round {}/{}", purpose, round + 1, self.max_rounds);

            let reply = match client.complete(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.diagnostics.record_round(
                        purpose,
                        round + 1,
                        &request.prompt,
                        &format!("<call failed: {}>", e),
                    );
                    if round == 0 {
                        tracing::warn!("{} reflection failed on first round: {}", purpose, e);
                        return ExtractionResult::empty();
                    }
                    tracing::warn!(
                        "{} reflection round {} failed, keeping earlier result: {}",
                        purpose,
                        round + 1,
                        e
                    );
                    break;
                }
            };

            let parsed = ParsedReply::parse(&reply);
            self.diagnostics
                .record_round(purpose, round + 1, &request.prompt, &parsed.describe(&reply));
            if parsed == ParsedReply::Malformed {
                tracing::warn!("{} reflection round {} returned unparsable output", purpose, round + 1);
            }

            let round_reply = RoundReply::from_parsed(&parsed);
            let converged = round > 0 && round_reply.converged();
            if let Some(result) = round_reply.result {
                final_result = result;
            }
            previous_insights.extend(round_reply.insights);

            if converged {
                tracing::debug!("{} reflection converged after {} round(s)", purpose, round + 1);
                break;
            }
        }

        tracing::info!(
            "{} reflection produced {} new key point(s) and {} evaluation(s)",
            purpose,
            final_result.new_key_points.len(),
            final_result.evaluations.len()
        );
        final_result
    }
}
