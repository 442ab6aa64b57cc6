//! # Playbook Memory
//!
//! Cross-session memory for an AI coding assistant.
//!
//! ## Architecture
//!
//! Each project keeps a **playbook**: a list of short lessons (key points),
//! each with a stable name and a reputation score.
//! - **Playbook Store** - loads, normalizes, saves, and renders the playbook file
//! - **Scoring** - merges new key points and ratings into a playbook and prunes low scores
//! - **Reflective Extractor** - asks an LLM, over one or more rounds, what a transcript teaches
//! - **Session Gate** - makes sure context is injected once per session
//!
//! ## Usage
//!
//! ```rust,ignore
//! use playbook_memory::{Config, ExtractorConfig, PlaybookStore, ReflectiveExtractor};
//!
//! let config = Config::for_project("/path/to/project");
//! let store = PlaybookStore::new(&config);
//! let extractor = ReflectiveExtractor::from_config(&ExtractorConfig::from_env())?;
//!
//! let playbook = store.load();
//! let result = extractor.extract(&messages, &playbook, "session_end").await;
//! let mut updated = playbook_memory::scoring::apply(playbook, &result);
//! store.save(&mut updated)?;
//! ```

pub mod config;
pub mod diagnostic;
pub mod error;
pub mod hooks;
pub mod llm;
pub mod message;
pub mod playbook;
pub mod reflection;
pub mod scoring;
pub mod storage;
pub mod template;

pub use config::{Config, ExtractorConfig, Settings};
pub use error::{Error, Result};
pub use hooks::{HookInput, HookOutput, Hooks, UpdateOutcome};
pub use llm::{AnthropicClient, LlmClient, LlmRequest};
pub use message::{Message, Role};
pub use playbook::{Evaluation, ExtractionResult, KeyPoint, Playbook, Rating};
pub use reflection::{ParsedReply, ReflectiveExtractor};
pub use storage::{PlaybookStore, SessionGate, TranscriptReader};
