// Minimum token distance between two patterns within one text.

use crate::parser::{tokenize, StopwordSet, WildcardPattern};
use super::positions::pattern_positions;

/// `min |p - q|` over every p in `pos1` and q in `pos2`. Both inputs are
/// ascending, so a merge walk visits every candidate minimum. `None` when
/// either side is empty.
pub fn min_window(pos1: &[usize], pos2: &[usize]) -> Option<u32> {
    if pos1.is_empty() || pos2.is_empty() {
        return None;
    }

    let (mut i, mut j) = (0, 0);
    let mut best = usize::MAX;

    while i < pos1.len() && j < pos2.len() {
        let (p, q) = (pos1[i], pos2[j]);
        best = best.min(p.abs_diff(q));
        if best == 0 {
            break;
        }
        if p < q {
            i += 1;
        } else {
            j += 1;
        }
    }

    Some(u32::try_from(best).unwrap_or(u32::MAX))
}

/// Window of a pair in `text`, or `None` when either pattern is absent
/// after tokenization.
pub fn text_window(
    text: &str,
    pattern1: &WildcardPattern,
    pattern2: &WildcardPattern,
    stopwords: &StopwordSet,
    count_stopwords: bool,
) -> Option<u32> {
    let tokens = tokenize(text);
    let patterns = [pattern1.clone(), pattern2.clone()];
    let positions = pattern_positions(&tokens, &patterns, stopwords, count_stopwords);
    min_window(&positions[0], &positions[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(a: &[usize], b: &[usize]) -> Option<u32> {
        a.iter()
            .flat_map(|p| b.iter().map(move |q| p.abs_diff(*q) as u32))
            .min()
    }

    #[test]
    fn minimum_over_all_pairs() {
        assert_eq!(min_window(&[0, 2], &[1, 3]), Some(1));
        assert_eq!(min_window(&[0, 10], &[7]), Some(3));
        assert_eq!(min_window(&[5], &[5]), Some(0));
        assert_eq!(min_window(&[], &[1]), None);
        assert_eq!(min_window(&[1], &[]), None);
    }

    #[test]
    fn merge_walk_agrees_with_cartesian_product() {
        let cases: &[(&[usize], &[usize])] = &[
            (&[0, 4, 9, 20], &[2, 15, 30]),
            (&[100], &[1, 2, 3, 98]),
            (&[3, 6, 50, 51], &[40, 70]),
            (&[7, 8, 9], &[0]),
        ];
        for (a, b) in cases {
            assert_eq!(min_window(a, b), brute_force(a, b));
        }
    }

    #[test]
    fn scenario_texts() {
        let alpha = WildcardPattern::new("alpha").unwrap();
        let bravo = WildcardPattern::new("bravo").unwrap();
        let none = StopwordSet::empty();

        assert_eq!(text_window("alpha bravo charlie delta", &alpha, &bravo, &none, false), Some(1));
        assert_eq!(text_window("alpha foxtrot charlie golf", &alpha, &bravo, &none, false), None);
        assert_eq!(text_window("hotel india bravo xray", &alpha, &bravo, &none, false), None);
        assert_eq!(text_window("alpha bravo alpha bravo echo", &alpha, &bravo, &none, false), Some(1));
    }

    #[test]
    fn stopwords_shrink_the_window() {
        let minister = WildcardPattern::new("minister*").unwrap();
        let govern = WildcardPattern::new("govern*").unwrap();
        let mut sw = StopwordSet::empty();
        sw.add(["of", "the"]);

        let text = "ministers of the government";
        assert_eq!(text_window(text, &govern, &minister, &sw, false), Some(1));
        assert_eq!(text_window(text, &govern, &minister, &sw, true), Some(3));
    }
}
