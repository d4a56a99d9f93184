// Shell-style wildcard patterns matched against cleaned tokens.

use regex::Regex;
use std::fmt;

use crate::error::{Error, Result};
use super::clean;

/// A lowercased fnmatch-style pattern: `*` matches any run, `?` any single
/// character, `[seq]` / `[!seq]` a character class. An unterminated `[` is a
/// literal.
#[derive(Clone)]
pub struct WildcardPattern {
    raw: String,
    regex: Regex,
    literal: String,
}

/// One lexical piece of a pattern.
enum Piece {
    Literal(char),
    AnyRun,
    AnyChar,
    Class { negated: bool, body: String },
}

fn lex(pattern: &str) -> Vec<Piece> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut pieces = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                pieces.push(Piece::AnyRun);
            },
            '?' => pieces.push(Piece::AnyChar),
            '[' => {
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                // A leading ']' belongs to the class
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    pieces.push(Piece::Literal('['));
                } else {
                    let mut body: String = chars[i..j].iter().collect();
                    let negated = body.starts_with('!');
                    if negated {
                        body.remove(0);
                    }
                    pieces.push(Piece::Class { negated, body });
                    i = j + 1;
                }
            },
            other => pieces.push(Piece::Literal(other)),
        }
    }

    pieces
}

fn translate(pieces: &[Piece]) -> String {
    let mut out = String::from("^(?s:");
    for piece in pieces {
        match piece {
            Piece::Literal(c) => out.push_str(&regex::escape(&c.to_string())),
            Piece::AnyRun => out.push_str(".*"),
            Piece::AnyChar => out.push('.'),
            Piece::Class { negated, body } => {
                out.push('[');
                if *negated {
                    out.push('^');
                }
                for c in body.chars() {
                    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(']');
            },
        }
    }
    out.push_str(")$");
    out
}

/// Longest wildcard-free run of the pattern, cleaned.
fn longest_literal(pieces: &[Piece]) -> String {
    let mut best = String::new();
    let mut current = String::new();

    for piece in pieces {
        match piece {
            Piece::Literal(c) => current.push(*c),
            _ => {
                let cleaned = clean(&current);
                if cleaned.len() > best.len() {
                    best = cleaned;
                }
                current.clear();
            },
        }
    }
    let cleaned = clean(&current);
    if cleaned.len() > best.len() {
        best = cleaned;
    }

    best
}

impl WildcardPattern {
    pub fn new(raw: &str) -> Result<Self> {
        let raw = raw.trim().to_lowercase();
        if raw.is_empty() {
            return Err(Error::pattern("pattern is empty"));
        }

        let pieces = lex(&raw);
        let regex = Regex::new(&translate(&pieces))
            .map_err(|e| Error::pattern(format!("'{}' cannot be compiled: {}", raw, e)))?;
        let literal = longest_literal(&pieces);

        Ok(Self { raw, regex, literal })
    }

    /// Like `new`, but also requires a usable literal for the membership
    /// pre-filter.
    pub fn with_literal(raw: &str) -> Result<Self> {
        let pattern = Self::new(raw)?;
        if pattern.literal.is_empty() {
            return Err(Error::pattern(format!(
                "'{}' has no alphabetic literal part to index", pattern.raw
            )));
        }
        Ok(pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The term used for the coarse substring pre-filter. For `prefix*`,
    /// `*suffix` and plain words this is the cleaned pattern itself.
    pub fn literal_term(&self) -> &str {
        &self.literal
    }

    pub fn matches(&self, token: &str) -> bool {
        self.regex.is_match(token)
    }
}

impl fmt::Debug for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WildcardPattern")
            .field("raw", &self.raw)
            .field("literal", &self.literal)
            .finish()
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for WildcardPattern {}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> WildcardPattern {
        WildcardPattern::new(raw).unwrap()
    }

    #[test]
    fn star_and_question_mark() {
        assert!(p("govern*").matches("government"));
        assert!(p("govern*").matches("govern"));
        assert!(!p("govern*").matches("misgovern"));
        assert!(p("*ing").matches("sitting"));
        assert!(p("m?n").matches("man"));
        assert!(!p("m?n").matches("moon"));
    }

    #[test]
    fn plain_words_match_whole_tokens_only() {
        assert!(p("beta").matches("beta"));
        assert!(!p("beta").matches("betax"));
    }

    #[test]
    fn character_classes() {
        assert!(p("[bc]at").matches("cat"));
        assert!(!p("[bc]at").matches("rat"));
        assert!(p("[!bc]at").matches("rat"));
        assert!(!p("[!bc]at").matches("bat"));
        assert!(p("[a-c]ar").matches("bar"));
        assert!(p("x[").matches("x["));
    }

    #[test]
    fn patterns_are_case_insensitive() {
        assert!(p("Govern*").matches("governed"));
        assert_eq!(p("Govern*").as_str(), "govern*");
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert!(p("a.b").matches("a.b"));
        assert!(!p("a.b").matches("axb"));
    }

    #[test]
    fn literal_term_is_longest_cleaned_segment() {
        assert_eq!(p("govern*").literal_term(), "govern");
        assert_eq!(p("*ing").literal_term(), "ing");
        assert_eq!(p("minister").literal_term(), "minister");
        assert_eq!(p("gov*ernment").literal_term(), "ernment");
        assert_eq!(p("[bc]at").literal_term(), "at");
    }

    #[test]
    fn patterns_without_letters_are_rejected_for_indexing() {
        assert!(matches!(WildcardPattern::with_literal("123"), Err(Error::InvalidPattern(_))));
        assert!(matches!(WildcardPattern::with_literal("!@#"), Err(Error::InvalidPattern(_))));
        assert!(matches!(WildcardPattern::with_literal("*"), Err(Error::InvalidPattern(_))));
        assert!(matches!(WildcardPattern::new("  "), Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn reversed_range_is_an_invalid_pattern() {
        assert!(matches!(WildcardPattern::new("[z-a]x"), Err(Error::InvalidPattern(_))));
    }
}
