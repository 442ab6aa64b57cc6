//! JSONL transcript reading
//!
//! Session transcripts are append-only logs with one record per line. Only
//! visible user and assistant turns are kept, flattened to plain text.

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;
use crate::message::{Message, Role};

/// Markers that identify slash-command echoes rather than real conversation
const COMMAND_MARKERS: [&str; 4] = [
    "<command-name>",
    "<command-message>",
    "<command-args>",
    "<local-command-stdout>",
];

/// Reader for a single session transcript
pub struct TranscriptReader {
    path: PathBuf,
}

impl TranscriptReader {
    /// Create a reader for the transcript at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the transcript path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all conversation messages. A missing file yields no messages;
    /// malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<Message>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Transcript {:?} does not exist", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);

        let mut messages = Vec::new();
        let mut skipped = 0usize;
        for line in reader.split(b'\n') {
            // Lines are decoded one at a time so a bad byte only costs its own line
            let Ok(line) = String::from_utf8(line?) else {
                skipped += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(record) => messages.extend(parse_record(&record)),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!("Skipped {} malformed transcript line(s) in {:?}", skipped, self.path);
        }
        Ok(messages)
    }
}

/// Convert one transcript record to a message, if it is a visible conversation turn
fn parse_record(record: &Value) -> Option<Message> {
    let kind = record.get("type").and_then(Value::as_str)?;
    if kind != "user" && kind != "assistant" {
        return None;
    }

    let flagged = |key: &str| record.get(key).and_then(Value::as_bool).unwrap_or(false);
    if flagged("isMeta") || flagged("isVisibleInTranscriptOnly") {
        return None;
    }

    let message = record.get("message")?;
    let role = message
        .get("role")
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .or_else(|| Role::parse(kind))?;

    let content = match message.get("content")? {
        Value::String(text) => {
            if COMMAND_MARKERS.iter().any(|marker| text.contains(marker)) {
                return None;
            }
            text.clone()
        }
        Value::Array(blocks) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };

    if content.trim().is_empty() {
        return None;
    }
    Some(Message::new(role, content))
}
