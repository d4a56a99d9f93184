// src/config/subsystems/stopwords.rs

use serde::{Serialize, Deserialize};
use std::path::PathBuf;
use crate::error::{Error, Result};
use crate::config::FromIni;
use crate::parser::Language;

/// Words that carry no content in parliamentary debate transcripts.
pub const DEFAULT_DOMAIN_WORDS: &[&str] = &[
    "hon", "house", "member", "common", "speaker",
    "mr", "friend", "gentleman", "one", "would",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopwordConfig {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_use_language_list")]
    pub use_language_list: bool,

    #[serde(default = "default_domain_words")]
    pub domain_words: Vec<String>,

    #[serde(default)]
    pub custom: Vec<String>,

    #[serde(default)]
    pub removed: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopwords_file: Option<PathBuf>,
}

fn default_language() -> String { "english".to_string() }
fn default_use_language_list() -> bool { true }
fn default_domain_words() -> Vec<String> {
    DEFAULT_DOMAIN_WORDS.iter().map(|w| w.to_string()).collect()
}

impl Default for StopwordConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            use_language_list: default_use_language_list(),
            domain_words: default_domain_words(),
            custom: Vec::new(),
            removed: Vec::new(),
            stopwords_file: None,
        }
    }
}

impl StopwordConfig {
    /// No language list and no domain words: every token counts.
    pub fn disabled() -> Self {
        Self {
            use_language_list: false,
            domain_words: Vec::new(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.language.parse::<Language>()?;

        if let Some(path) = &self.stopwords_file {
            if !path.exists() {
                return Err(Error::NotFound(
                    format!("Stopword file {:?} does not exist", path)
                ));
            }
        }

        Ok(())
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|w| w.trim().trim_matches('"').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

impl FromIni for StopwordConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "stopwords" {
            return None;
        }

        match key {
            "language" => {
                let value = value.trim_matches('"');
                match value.parse::<Language>() {
                    Ok(language) => {
                        self.language = language.name().to_string();
                        Some(Ok(()))
                    },
                    Err(e) => Some(Err(e)),
                }
            },
            "use_language_list" => {
                match value.parse() {
                    Ok(flag) => {
                        self.use_language_list = flag;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid use_language_list value (must be true/false): {}", value)
                    ))),
                }
            },
            "domain_words" => {
                self.domain_words = parse_list(value);
                Some(Ok(()))
            },
            "custom" => {
                self.custom = parse_list(value);
                Some(Ok(()))
            },
            "removed" => {
                self.removed = parse_list(value);
                Some(Ok(()))
            },
            "stopwords_file" => {
                self.stopwords_file = Some(PathBuf::from(value.trim_matches('"')));
                Some(Ok(()))
            },
            _ => None,
        }
    }
}
