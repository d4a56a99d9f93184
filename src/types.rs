use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One row of the corpus. `values` is aligned with `CorpusSchema::columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    pub id: String,
    pub text: String,
    pub values: Vec<Option<String>>,
}

/// Column layout fixed at seed time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSchema {
    pub id_col: String,
    pub text_column: String,
    pub columns: Vec<String>,
}

/// An unordered pair of wildcard patterns, stored lowercased and sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollocatePair {
    pub pattern1: String,
    pub pattern2: String,
}

impl CollocatePair {
    pub fn new(a: &str, b: &str) -> Self {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a <= b {
            Self { pattern1: a, pattern2: b }
        } else {
            Self { pattern1: b, pattern2: a }
        }
    }

    pub fn as_tuple(&self) -> (String, String) {
        (self.pattern1.clone(), self.pattern2.clone())
    }
}

impl fmt::Display for CollocatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.pattern1, self.pattern2)
    }
}

/// Input to `add_collocates`. A trailing window is accepted but plays no
/// part in the pair's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollocateSpec {
    pub pattern1: String,
    pub pattern2: String,
    pub window: Option<u32>,
}

impl From<(&str, &str)> for CollocateSpec {
    fn from((pattern1, pattern2): (&str, &str)) -> Self {
        Self { pattern1: pattern1.to_string(), pattern2: pattern2.to_string(), window: None }
    }
}

impl From<(&str, &str, u32)> for CollocateSpec {
    fn from((pattern1, pattern2, window): (&str, &str, u32)) -> Self {
        Self { pattern1: pattern1.to_string(), pattern2: pattern2.to_string(), window: Some(window) }
    }
}

impl From<&Condition> for CollocateSpec {
    fn from(condition: &Condition) -> Self {
        Self {
            pattern1: condition.pair.pattern1.clone(),
            pattern2: condition.pair.pattern2.clone(),
            window: Some(condition.max_window),
        }
    }
}

/// Minimum distance between a pair in one text. `text_id == None` with
/// `window == None` is the sentinel for "processed, nothing found".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFact {
    pub text_id: Option<String>,
    pub pair: CollocatePair,
    pub window: Option<u32>,
}

impl WindowFact {
    pub fn sentinel(pair: CollocatePair) -> Self {
        Self { text_id: None, pair, window: None }
    }

    pub fn is_sentinel(&self) -> bool {
        self.text_id.is_none()
    }
}

/// A query condition: the pair occurs within `max_window` tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub pair: CollocatePair,
    pub max_window: u32,
}

impl Condition {
    pub fn new(pattern1: &str, pattern2: &str, max_window: u32) -> Self {
        Self { pair: CollocatePair::new(pattern1, pattern2), max_window }
    }
}

impl From<(&str, &str, u32)> for Condition {
    fn from((pattern1, pattern2, max_window): (&str, &str, u32)) -> Self {
        Self::new(pattern1, pattern2, max_window)
    }
}

impl FromStr for Condition {
    type Err = Error;

    /// Parses `"pattern1 pattern2 window"`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            [p1, p2, window] => {
                let max_window = window.parse::<u32>().map_err(|_| {
                    Error::query(format!("Invalid window '{}' in condition '{}'", window, s.trim()))
                })?;
                Ok(Self::new(p1, p2, max_window))
            },
            _ => Err(Error::query(format!(
                "Expected 'pattern1 pattern2 window', got '{}'", s.trim()
            ))),
        }
    }
}

/// Per-group count for `count_with_collocates`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub group: Vec<Option<String>>,
    pub count: u64,
}

/// Baseline vs filtered count for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgroupCount {
    pub group: Vec<String>,
    pub total: u64,
    pub collocate_count: u64,
}

/// Outcome of `add_collocates`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub added: Vec<CollocatePair>,
    pub skipped_known: usize,
    pub skipped_invalid: usize,
}

/// Outcome of a single `mark_windows` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    pub pair: CollocatePair,
    pub candidates: usize,
    pub facts: usize,
    pub sentinel: bool,
}

/// Token row stored for a collocate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupToken {
    pub text_id: String,
    pub position: usize,
    pub stop_position: Option<usize>,
    pub raw_token: String,
    pub token: String,
    pub is_stopword: bool,
    pub patterns: Vec<String>,
}

/// A named set of conditions with the token rows of every matching text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollocateGroup {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub tokens: Vec<GroupToken>,
}
