// The set of processed collocate pairs and the preparation pass that turns
// caller input into new work.

use std::collections::BTreeSet;
use log::{debug, warn};

use crate::error::Result;
use crate::parser::WildcardPattern;
use crate::types::{CollocatePair, CollocateSpec};

/// Canonical pairs whose facts are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollocateCatalog {
    pairs: BTreeSet<CollocatePair>,
}

impl CollocateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I: IntoIterator<Item = CollocatePair>>(pairs: I) -> Self {
        Self { pairs: pairs.into_iter().collect() }
    }

    pub fn contains(&self, pair: &CollocatePair) -> bool {
        self.pairs.contains(pair)
    }

    pub fn insert(&mut self, pair: CollocatePair) -> bool {
        self.pairs.insert(pair)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollocatePair> {
        self.pairs.iter()
    }

    pub fn pairs(&self) -> &BTreeSet<CollocatePair> {
        &self.pairs
    }

    /// Sorted `(pattern1, pattern2)` tuples, the snapshot form.
    pub fn to_tuples(&self) -> Vec<(String, String)> {
        self.pairs.iter().map(CollocatePair::as_tuple).collect()
    }
}

/// A pair accepted for processing, with its compiled patterns.
#[derive(Debug, Clone)]
pub struct QueuedPair {
    pub pair: CollocatePair,
    pub pattern1: WildcardPattern,
    pub pattern2: WildcardPattern,
}

impl QueuedPair {
    /// Compiles both patterns of a canonical pair.
    pub fn compile(pair: &CollocatePair) -> Result<Self> {
        Ok(Self {
            pair: pair.clone(),
            pattern1: WildcardPattern::with_literal(&pair.pattern1)?,
            pattern2: WildcardPattern::with_literal(&pair.pattern2)?,
        })
    }

    /// The two membership terms.
    pub fn terms(&self) -> [&str; 2] {
        [self.pattern1.literal_term(), self.pattern2.literal_term()]
    }
}

/// Outcome of the preparation pass.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub queued: Vec<QueuedPair>,
    /// Terms of queued pairs in first-seen order, deduplicated.
    pub terms: Vec<String>,
    pub skipped_known: usize,
    pub skipped_invalid: usize,
}

/// Sorts caller input into new work before any storage access. Pairs with a
/// pattern that has no usable literal, or whose two terms coincide, count as
/// invalid; pairs already in `catalog` or earlier in the batch count as known.
/// Either kind is skipped without affecting the rest of the batch.
pub fn prepare_collocates(specs: &[CollocateSpec], catalog: &CollocateCatalog) -> Result<PreparedBatch> {
    let mut batch = PreparedBatch::default();
    let mut seen: BTreeSet<CollocatePair> = BTreeSet::new();
    let mut seen_terms: BTreeSet<String> = BTreeSet::new();

    for spec in specs {
        let pair = CollocatePair::new(&spec.pattern1, &spec.pattern2);
        let queued = match QueuedPair::compile(&pair) {
            Ok(queued) => queued,
            Err(e) => {
                warn!("Skipping {}: {}", pair, e);
                batch.skipped_invalid += 1;
                continue;
            },
        };

        let [term1, term2] = queued.terms();
        if term1 == term2 {
            debug!("Skipping {}: both patterns reduce to '{}'", queued.pair, term1);
            batch.skipped_invalid += 1;
            continue;
        }

        if catalog.contains(&queued.pair) || !seen.insert(queued.pair.clone()) {
            debug!("Skipping known collocate {}", queued.pair);
            batch.skipped_known += 1;
            continue;
        }

        for term in queued.terms() {
            if seen_terms.insert(term.to_string()) {
                batch.terms.push(term.to_string());
            }
        }
        batch.queued.push(queued);
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn specs(raw: &[(&str, &str)]) -> Vec<CollocateSpec> {
        raw.iter().map(|&(a, b)| CollocateSpec::from((a, b))).collect()
    }

    #[test]
    fn new_pairs_are_queued_once_with_their_terms() {
        let catalog = CollocateCatalog::new();
        let batch = prepare_collocates(
            &specs(&[("minister*", "govern*"), ("govern*", "Minister*"), ("tax*", "govern*")]),
            &catalog,
        ).unwrap();

        assert_eq!(batch.queued.len(), 2);
        assert_eq!(batch.queued[0].pair, CollocatePair::new("govern*", "minister*"));
        assert_eq!(batch.terms, vec!["govern", "minister", "tax"]);
        assert_eq!(batch.skipped_known, 1);
    }

    #[test]
    fn known_pairs_are_skipped() {
        let catalog = CollocateCatalog::from_pairs([CollocatePair::new("alpha", "bravo")]);
        let batch = prepare_collocates(&specs(&[("bravo", "alpha")]), &catalog).unwrap();
        assert!(batch.queued.is_empty());
        assert_eq!(batch.skipped_known, 1);
    }

    #[test]
    fn pairs_with_one_distinct_term_are_skipped() {
        let batch = prepare_collocates(
            &specs(&[("govern*", "govern?"), ("alpha", "alpha")]),
            &CollocateCatalog::new(),
        ).unwrap();
        assert!(batch.queued.is_empty());
        assert_eq!(batch.skipped_invalid, 2);
    }

    #[test]
    fn patterns_without_letters_skip_only_their_pair() {
        let batch = prepare_collocates(
            &specs(&[("alpha", "bravo"), ("1984", "bravo"), ("*?", "charlie")]),
            &CollocateCatalog::new(),
        ).unwrap();
        assert_eq!(batch.queued.len(), 1);
        assert_eq!(batch.queued[0].pair, CollocatePair::new("alpha", "bravo"));
        assert_eq!(batch.terms, vec!["alpha", "bravo"]);
        assert_eq!(batch.skipped_invalid, 2);

        let err = QueuedPair::compile(&CollocatePair::new("1984", "bravo")).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(msg) if msg.contains("1984")));
    }

    #[test]
    fn window_element_does_not_affect_identity() {
        let catalog = CollocateCatalog::from_pairs([CollocatePair::new("alpha", "bravo")]);
        let batch = prepare_collocates(&[CollocateSpec::from(("alpha", "bravo", 5))], &catalog).unwrap();
        assert_eq!(batch.skipped_known, 1);
    }
}
