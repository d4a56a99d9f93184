// Stopword-aware position numbering of pattern matches.

use std::collections::HashMap;

use crate::parser::{clean, StopwordSet, WildcardPattern};

/// Positions of each pattern in `tokens`, aligned with `patterns`.
///
/// Stopwords are invisible unless `count_stopwords` is set: they get no
/// position and every later token moves one slot closer. A token is
/// attributed to the first pattern it matches, so the lists are disjoint
/// and each is strictly increasing.
pub fn pattern_positions(
    tokens: &[String],
    patterns: &[WildcardPattern],
    stopwords: &StopwordSet,
    count_stopwords: bool,
) -> Vec<Vec<usize>> {
    let mut positions = vec![Vec::new(); patterns.len()];
    let mut stops = 0;

    for (i, raw) in tokens.iter().enumerate() {
        let token = clean(raw);

        if !count_stopwords && stopwords.contains(&token) {
            stops += 1;
            continue;
        }

        if let Some(slot) = patterns.iter().position(|p| p.matches(&token)) {
            positions[slot].push(i - stops);
        }
    }

    positions
}

/// Map form of [`pattern_positions`], keyed by the lowercased pattern
/// string. Every requested pattern has an entry, possibly empty.
pub fn get_positions(
    tokens: &[String],
    patterns: &[WildcardPattern],
    stopwords: &StopwordSet,
    count_stopwords: bool,
) -> HashMap<String, Vec<usize>> {
    let positions = pattern_positions(tokens, patterns, stopwords, count_stopwords);
    let mut map: HashMap<String, Vec<usize>> = HashMap::with_capacity(patterns.len());

    for (pattern, list) in patterns.iter().zip(positions) {
        map.entry(pattern.as_str().to_string()).or_default().extend(list);
    }

    map
}
