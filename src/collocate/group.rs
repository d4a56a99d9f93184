// Token rows for named collocate groups.

use crate::error::{Error, Result};
use crate::parser::{clean, tokenize, StopwordSet, WildcardPattern};
use crate::types::{Condition, GroupToken};

/// Trims the name and replaces spaces with underscores.
pub fn normalize_group_name(name: &str) -> Result<String> {
    let name = name.trim().replace(' ', "_");
    if name.is_empty() {
        return Err(Error::input("collocate group name is empty"));
    }
    Ok(name)
}

/// Distinct patterns of a condition list, in first-seen order.
pub fn group_patterns(conditions: &[Condition]) -> Result<Vec<WildcardPattern>> {
    let mut patterns: Vec<WildcardPattern> = Vec::new();
    for condition in conditions {
        for raw in [&condition.pair.pattern1, &condition.pair.pattern2] {
            let pattern = WildcardPattern::with_literal(raw)?;
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
    }
    Ok(patterns)
}

/// One row per raw token of `text`. Unlike position indexing, a token
/// lists every pattern it matches. Stopwords match nothing and get no
/// stopword-adjusted position.
pub fn group_tokens(
    text_id: &str,
    text: &str,
    patterns: &[WildcardPattern],
    stopwords: &StopwordSet,
) -> Vec<GroupToken> {
    let mut stops = 0;

    tokenize(text)
        .into_iter()
        .enumerate()
        .map(|(position, raw_token)| {
            let token = clean(&raw_token);
            let is_stopword = stopwords.contains(&token);

            let (stop_position, matched) = if is_stopword {
                stops += 1;
                (None, Vec::new())
            } else {
                let matched = patterns
                    .iter()
                    .filter(|p| p.matches(&token))
                    .map(|p| p.as_str().to_string())
                    .collect();
                (Some(position - stops), matched)
            };

            GroupToken {
                text_id: text_id.to_string(),
                position,
                stop_position,
                raw_token,
                token,
                is_stopword,
                patterns: matched,
            }
        })
        .collect()
}
