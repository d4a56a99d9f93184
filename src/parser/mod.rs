//! Text preparation shared by the membership scan, the window calculator and
//! collocate groups: whitespace tokenization, alphabetic cleaning, wildcard
//! patterns and stopwords.

pub mod pattern;
pub mod stopwords;

use lazy_static::lazy_static;
use regex::Regex;

pub use self::pattern::WildcardPattern;
pub use self::stopwords::{Language, StopwordSet};

lazy_static! {
    static ref NON_ALPHA: Regex = Regex::new(r"[^a-z]+").unwrap();
}

/// Lowercases `text` and splits it on runs of whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Strips everything that is not a lowercase ASCII letter. Lowercases first,
/// so the result is the same whether or not the caller already did.
pub fn clean(token: &str) -> String {
    let lowered = token.to_lowercase();
    NON_ALPHA.replace_all(&lowered, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits_on_whitespace_runs() {
        assert_eq!(
            tokenize("Hello  World,\tthis\nIS"),
            vec!["hello", "world,", "this", "is"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn tokenize_is_restartable() {
        let text = "Alpha bravo";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn clean_keeps_only_ascii_letters() {
        assert_eq!(clean("World,"), "world");
        assert_eq!(clean("don't"), "dont");
        assert_eq!(clean("1984"), "");
        assert_eq!(clean("govern*"), "govern");
        assert_eq!(clean("Café"), "caf");
    }
}
