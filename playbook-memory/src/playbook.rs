//! Playbook types: scored key points and the extraction results that update them

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written into freshly created playbooks
pub const PLAYBOOK_VERSION: &str = "1.0";

const NAME_PREFIX: &str = "kpt_";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^kpt_(\d+)$").expect("valid key point name pattern"))
}

/// A single lesson with a stable name and a reputation score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoint {
    /// Unique identifier, stable across updates
    pub name: String,

    /// The lesson content
    pub text: String,

    /// Reputation score; starts at 0
    #[serde(default)]
    pub score: i64,
}

impl KeyPoint {
    /// Create a new key point with a zero score
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            score: 0,
        }
    }

    /// Set the score
    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }
}

/// The per-project collection of key points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub version: String,

    /// When the playbook was last saved
    pub last_updated: Option<DateTime<Utc>>,

    /// Key points in insertion order, newest last
    pub key_points: Vec<KeyPoint>,
}

impl Default for Playbook {
    fn default() -> Self {
        Self {
            version: PLAYBOOK_VERSION.to_string(),
            last_updated: None,
            key_points: Vec::new(),
        }
    }
}

impl Playbook {
    /// Create an empty playbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a playbook holding the given key points
    pub fn with_key_points(key_points: Vec<KeyPoint>) -> Self {
        Self {
            key_points,
            ..Self::default()
        }
    }

    /// Check if the playbook has no key points
    pub fn is_empty(&self) -> bool {
        self.key_points.is_empty()
    }

    /// Find a key point by name
    pub fn get(&self, name: &str) -> Option<&KeyPoint> {
        self.key_points.iter().find(|kp| kp.name == name)
    }

    /// Find a key point by name for mutation
    pub fn get_mut(&mut self, name: &str) -> Option<&mut KeyPoint> {
        self.key_points.iter_mut().find(|kp| kp.name == name)
    }

    /// Check whether some key point already carries this exact text
    pub fn contains_text(&self, text: &str) -> bool {
        self.key_points.iter().any(|kp| kp.text == text)
    }

    /// Generate the next free `kpt_NNN` name for this playbook
    pub fn next_name(&self) -> String {
        let taken: HashSet<&str> = self.key_points.iter().map(|kp| kp.name.as_str()).collect();
        generate_name(&taken)
    }

    /// Build a playbook from persisted JSON, upgrading legacy shapes.
    ///
    /// Bare-string entries become key points with a generated name and score 0.
    /// Object entries missing `name` or `score` are backfilled; entries without
    /// a string `text` are dropped. Returns `None` when `value` is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let version = object
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(PLAYBOOK_VERSION)
            .to_string();

        let last_updated = object
            .get("last_updated")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let entries = object
            .get("key_points")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Some(Self {
            version,
            last_updated,
            key_points: normalize_key_points(entries),
        })
    }
}

/// Generate a `kpt_NNN` name one past the highest numbered name in `taken`
pub fn generate_name(taken: &HashSet<&str>) -> String {
    // Numbers at the top of the range have no successor and are passed over
    let start = taken
        .iter()
        .filter_map(|name| name_pattern().captures(name))
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .filter_map(|n| n.checked_add(1))
        .max()
        .unwrap_or(1);

    (start..=u64::MAX)
        .chain(1..start)
        .map(|n| format!("{}{:03}", NAME_PREFIX, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| format!("{}{:03}", NAME_PREFIX, start))
}

fn normalize_key_points(entries: &[Value]) -> Vec<KeyPoint> {
    // Explicit names are reserved up front so generated names never shadow a later entry
    let mut reserved: HashSet<String> = entries
        .iter()
        .filter_map(|entry| entry.get("name").and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut key_points = Vec::with_capacity(entries.len());

    for entry in entries {
        let (name, text, score) = match entry {
            Value::String(text) => (None, text.clone(), 0),
            Value::Object(fields) => {
                let Some(text) = fields.get("text").and_then(Value::as_str) else {
                    tracing::debug!("Dropping key point without text: {}", entry);
                    continue;
                };
                let name = fields
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty() && !seen.contains(*name))
                    .map(str::to_string);
                let score = fields.get("score").and_then(Value::as_i64).unwrap_or(0);
                (name, text.to_string(), score)
            }
            _ => {
                tracing::debug!("Dropping unrecognized key point entry: {}", entry);
                continue;
            }
        };

        let name = name.unwrap_or_else(|| {
            let taken: HashSet<&str> = reserved.iter().map(String::as_str).collect();
            generate_name(&taken)
        });
        reserved.insert(name.clone());
        seen.insert(name.clone());

        key_points.push(KeyPoint { name, text, score });
    }

    key_points
}

/// Qualitative judgment of a key point during one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Helpful,
    Harmful,
    Neutral,
}

impl Rating {
    /// Parse a rating, case-insensitively; unknown strings yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helpful" => Some(Rating::Helpful),
            "harmful" => Some(Rating::Harmful),
            "neutral" => Some(Rating::Neutral),
            _ => None,
        }
    }

    /// Score change applied for this rating
    pub fn delta(self) -> i64 {
        match self {
            Rating::Helpful => 1,
            Rating::Harmful => -3,
            Rating::Neutral => -1,
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::Helpful => write!(f, "helpful"),
            Rating::Harmful => write!(f, "harmful"),
            Rating::Neutral => write!(f, "neutral"),
        }
    }
}

/// A rating of an existing key point, referenced by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub name: String,

    /// Raw rating string as produced by the model
    pub rating: String,
}

impl Evaluation {
    /// Create an evaluation with a known rating
    pub fn new(name: impl Into<String>, rating: Rating) -> Self {
        Self {
            name: name.into(),
            rating: rating.to_string(),
        }
    }

    /// Score change for this evaluation, 0 for unrecognized ratings
    pub fn delta(&self) -> i64 {
        Rating::parse(&self.rating).map(Rating::delta).unwrap_or(0)
    }
}

/// New key points and evaluations produced by reflection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub new_key_points: Vec<String>,

    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

impl ExtractionResult {
    /// Create an empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the result carries nothing to merge
    pub fn is_empty(&self) -> bool {
        self.new_key_points.is_empty() && self.evaluations.is_empty()
    }
}
