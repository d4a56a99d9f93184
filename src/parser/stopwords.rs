// Stopword handling: a base language list, a domain list, user additions and
// removal overrides, owned by each corpus.

use log::{debug, info};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use stop_words::LANGUAGE;

use crate::config::subsystems::StopwordConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Arabic,
    Danish,
    Dutch,
    English,
    Finnish,
    French,
    German,
    Greek,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Swedish,
    Turkish,
}

impl Language {
    pub fn name(self) -> &'static str {
        match self {
            Language::Arabic => "arabic",
            Language::Danish => "danish",
            Language::Dutch => "dutch",
            Language::English => "english",
            Language::Finnish => "finnish",
            Language::French => "french",
            Language::German => "german",
            Language::Greek => "greek",
            Language::Hungarian => "hungarian",
            Language::Italian => "italian",
            Language::Norwegian => "norwegian",
            Language::Portuguese => "portuguese",
            Language::Romanian => "romanian",
            Language::Russian => "russian",
            Language::Spanish => "spanish",
            Language::Swedish => "swedish",
            Language::Turkish => "turkish",
        }
    }

    fn to_stop_words_language(self) -> LANGUAGE {
        match self {
            Language::Arabic => LANGUAGE::Arabic,
            Language::Danish => LANGUAGE::Danish,
            Language::Dutch => LANGUAGE::Dutch,
            Language::English => LANGUAGE::English,
            Language::Finnish => LANGUAGE::Finnish,
            Language::French => LANGUAGE::French,
            Language::German => LANGUAGE::German,
            Language::Greek => LANGUAGE::Greek,
            Language::Hungarian => LANGUAGE::Hungarian,
            Language::Italian => LANGUAGE::Italian,
            Language::Norwegian => LANGUAGE::Norwegian,
            Language::Portuguese => LANGUAGE::Portuguese,
            Language::Romanian => LANGUAGE::Romanian,
            Language::Russian => LANGUAGE::Russian,
            Language::Spanish => LANGUAGE::Spanish,
            Language::Swedish => LANGUAGE::Swedish,
            Language::Turkish => LANGUAGE::Turkish,
        }
    }

    /// The base stopword list, lowercased.
    pub fn words(self) -> HashSet<String> {
        stop_words::get(self.to_stop_words_language())
            .iter()
            .map(|w| w.to_lowercase())
            .collect()
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let language = match s.trim().to_lowercase().as_str() {
            "arabic" | "ar" => Language::Arabic,
            "danish" | "da" => Language::Danish,
            "dutch" | "nl" => Language::Dutch,
            "english" | "en" => Language::English,
            "finnish" | "fi" => Language::Finnish,
            "french" | "fr" => Language::French,
            "german" | "de" => Language::German,
            "greek" | "el" => Language::Greek,
            "hungarian" | "hu" => Language::Hungarian,
            "italian" | "it" => Language::Italian,
            "norwegian" | "no" => Language::Norwegian,
            "portuguese" | "pt" => Language::Portuguese,
            "romanian" | "ro" => Language::Romanian,
            "russian" | "ru" => Language::Russian,
            "spanish" | "es" => Language::Spanish,
            "swedish" | "sv" => Language::Swedish,
            "turkish" | "tr" => Language::Turkish,
            _ => return Err(Error::InvalidLanguage(s.to_string())),
        };
        Ok(language)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(word: &str) -> Option<String> {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}

/// Effective set = (base ∪ domain ∪ custom) − removed.
#[derive(Debug, Clone, Default)]
pub struct StopwordSet {
    language: Option<Language>,
    base: HashSet<String>,
    domain: HashSet<String>,
    custom: HashSet<String>,
    removed: HashSet<String>,
}

impl StopwordSet {
    /// No stopwords at all; every token takes part in position numbering.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_language(language: Language) -> Self {
        Self {
            language: Some(language),
            base: language.words(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &StopwordConfig) -> Result<Self> {
        let language: Language = config.language.parse()?;
        let mut set = if config.use_language_list {
            Self::for_language(language)
        } else {
            Self { language: Some(language), ..Self::default() }
        };

        set.domain = config.domain_words.iter().filter_map(|w| normalize(w)).collect();
        set.custom = config.custom.iter().filter_map(|w| normalize(w)).collect();
        set.removed = config.removed.iter().filter_map(|w| normalize(w)).collect();

        if let Some(path) = &config.stopwords_file {
            set.load_file(path)?;
        }

        debug!(
            "Stopwords: language={} base={} domain={} custom={} removed={}",
            language, set.base.len(), set.domain.len(), set.custom.len(), set.removed.len()
        );
        Ok(set)
    }

    pub fn contains(&self, token: &str) -> bool {
        if self.removed.contains(token) {
            return false;
        }
        self.custom.contains(token) || self.base.contains(token) || self.domain.contains(token)
    }

    /// Adds words to the custom layer, lifting any earlier removal.
    pub fn add<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words.into_iter().filter_map(|w| normalize(w.as_ref())) {
            self.removed.remove(&word);
            self.custom.insert(word);
        }
    }

    /// Removes words from the effective set, including base-language words.
    pub fn remove<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words.into_iter().filter_map(|w| normalize(w.as_ref())) {
            self.custom.remove(&word);
            self.removed.insert(word);
        }
    }

    /// Merges a file with one word per line into the custom layer.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!("Stopword file {:?} does not exist", path)));
        }

        let reader = BufReader::new(File::open(path)?);
        let mut words = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Some(word) = normalize(&line) {
                words.push(word);
            }
        }

        let count = words.len();
        self.add(words);
        info!("Loaded {} stopwords from {:?}", count, path);
        Ok(count)
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    pub fn custom(&self) -> Vec<String> {
        sorted(&self.custom)
    }

    pub fn removed(&self) -> Vec<String> {
        sorted(&self.removed)
    }

    /// Size of the effective set.
    pub fn len(&self) -> usize {
        let mut all: HashSet<&String> = self.base.iter().collect();
        all.extend(self.domain.iter());
        all.extend(self.custom.iter());
        all.retain(|w| !self.removed.contains(*w));
        all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot form, with the stopword file already merged into `custom`.
    pub fn to_config(&self) -> StopwordConfig {
        StopwordConfig {
            language: self.language.unwrap_or(Language::English).name().to_string(),
            use_language_list: !self.base.is_empty(),
            domain_words: sorted(&self.domain),
            custom: sorted(&self.custom),
            removed: sorted(&self.removed),
            stopwords_file: None,
        }
    }
}

fn sorted(words: &HashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = words.iter().cloned().collect();
    v.sort();
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn base_lists_by_language() {
        assert!(StopwordSet::for_language(Language::English).contains("the"));
        let french = StopwordSet::for_language(Language::French);
        assert!(french.contains("le"));
        assert!(!french.contains("the"));
        assert!(StopwordSet::for_language(Language::German).contains("der"));
    }

    #[test]
    fn language_codes_and_names() {
        assert_eq!("english".parse::<Language>().unwrap(), Language::English);
        assert_eq!("FR".parse::<Language>().unwrap(), Language::French);
        match "invalid_lang".parse::<Language>() {
            Err(e @ Error::InvalidLanguage(_)) => {
                assert_eq!(e.to_string(), "Invalid language code 'invalid_lang'");
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn default_config_includes_domain_words() {
        let set = StopwordSet::from_config(&StopwordConfig::default()).unwrap();
        assert!(set.contains("hon"));
        assert!(set.contains("speaker"));
        assert!(set.contains("would"));
        assert!(set.contains("the"));
        assert!(!set.contains("minister"));
    }

    #[test]
    fn removal_overrides_base_language() {
        let mut set = StopwordSet::for_language(Language::English);
        set.remove(["the"]);
        assert!(!set.contains("the"));
        assert_eq!(set.removed(), vec!["the"]);

        set.add(["the", "custom"]);
        assert!(set.contains("the"));
        assert!(set.contains("custom"));
        assert!(set.removed().is_empty());
    }

    #[test]
    fn empty_set_contains_nothing() {
        let set = StopwordSet::empty();
        assert!(!set.contains("the"));
        assert!(set.is_empty());
    }

    #[test]
    fn load_file_merges_into_custom() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Alpha\n\n  bravo  ").unwrap();

        let mut set = StopwordSet::empty();
        assert_eq!(set.load_file(file.path()).unwrap(), 2);
        assert!(set.contains("alpha"));
        assert!(set.contains("bravo"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn load_file_missing_path_fails() {
        let mut set = StopwordSet::empty();
        let err = set.load_file("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn config_round_trip_preserves_effective_set() {
        let mut set = StopwordSet::for_language(Language::English);
        set.add(["budget"]);
        set.remove(["the"]);
        let again = StopwordSet::from_config(&set.to_config()).unwrap();
        assert!(again.contains("budget"));
        assert!(!again.contains("the"));
        assert!(again.contains("and"));
        assert_eq!(again.len(), set.len());
    }
}
