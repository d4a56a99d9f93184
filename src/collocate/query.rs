//! Collocate conditions as a small expression tree.
//!
//! A list of conditions becomes `Or(And(Pair, WindowAtMost)...)`, which is
//! compiled once into a [`QueryPlan`]: for every pair, the largest window
//! any disjunct accepts. Evaluation never builds query strings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::types::{CollocatePair, Condition, GroupCount, SubgroupCount, WindowFact};

/// Placeholder for a missing categorical value in subgroup tables.
pub const MISSING_VALUE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The fact belongs to this canonical pair.
    Pair(CollocatePair),
    /// The fact has a window no larger than this.
    WindowAtMost(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Or(Vec<Filter>),
    And(Vec<Filter>),
    Leaf(Predicate),
}

impl Filter {
    /// OR over conditions, each an AND of its pair and window bound.
    pub fn from_conditions(conditions: &[Condition]) -> Result<Self> {
        if conditions.is_empty() {
            return Err(Error::query("at least one collocate condition is required"));
        }

        Ok(Filter::Or(
            conditions
                .iter()
                .map(|c| {
                    Filter::And(vec![
                        Filter::Leaf(Predicate::Pair(c.pair.clone())),
                        Filter::Leaf(Predicate::WindowAtMost(c.max_window)),
                    ])
                })
                .collect(),
        ))
    }

    /// Direct evaluation against one fact. Sentinels never match.
    pub fn matches(&self, fact: &WindowFact) -> bool {
        if fact.is_sentinel() {
            return false;
        }
        match self {
            Filter::Or(children) => children.iter().any(|c| c.matches(fact)),
            Filter::And(children) => children.iter().all(|c| c.matches(fact)),
            Filter::Leaf(Predicate::Pair(pair)) => &fact.pair == pair,
            Filter::Leaf(Predicate::WindowAtMost(max)) => matches!(fact.window, Some(w) if w <= *max),
        }
    }
}

/// Compiled form of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    bounds: BTreeMap<CollocatePair, u32>,
}

impl QueryPlan {
    pub fn from_conditions(conditions: &[Condition]) -> Result<Self> {
        Self::compile(&Filter::from_conditions(conditions)?)
    }

    /// Flattens nested ORs; every disjunct must name exactly one pair.
    pub fn compile(filter: &Filter) -> Result<Self> {
        let mut bounds = BTreeMap::new();
        collect_disjuncts(filter, &mut bounds)?;
        if bounds.is_empty() {
            return Err(Error::query("filter has no disjuncts"));
        }
        debug!("Compiled query plan over {} pairs", bounds.len());
        Ok(Self { bounds })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&CollocatePair, u32)> {
        self.bounds.iter().map(|(pair, max)| (pair, *max))
    }

    pub fn bound(&self, pair: &CollocatePair) -> Option<u32> {
        self.bounds.get(pair).copied()
    }

    pub fn matches(&self, fact: &WindowFact) -> bool {
        match (&fact.text_id, fact.window, self.bounds.get(&fact.pair)) {
            (Some(_), Some(window), Some(max)) => window <= *max,
            _ => false,
        }
    }
}

fn collect_disjuncts(filter: &Filter, bounds: &mut BTreeMap<CollocatePair, u32>) -> Result<()> {
    match filter {
        Filter::Or(children) => {
            for child in children {
                collect_disjuncts(child, bounds)?;
            }
            Ok(())
        },
        conjunct => {
            let (pair, max) = compile_conjunct(conjunct)?;
            let entry = bounds.entry(pair).or_insert(max);
            *entry = (*entry).max(max);
            Ok(())
        },
    }
}

fn compile_conjunct(filter: &Filter) -> Result<(CollocatePair, u32)> {
    let mut pair: Option<CollocatePair> = None;
    let mut max = u32::MAX;

    let leaves: Vec<&Predicate> = match filter {
        Filter::Leaf(predicate) => vec![predicate],
        Filter::And(children) => {
            let mut leaves = Vec::with_capacity(children.len());
            for child in children {
                match child {
                    Filter::Leaf(predicate) => leaves.push(predicate),
                    _ => return Err(Error::query("nested groups inside a condition are not supported")),
                }
            }
            leaves
        },
        Filter::Or(_) => return Err(Error::query("nested disjunction inside a condition")),
    };

    for predicate in leaves {
        match predicate {
            Predicate::Pair(p) => {
                if let Some(existing) = &pair {
                    if existing != p {
                        return Err(Error::query(format!(
                            "condition names two pairs: {} and {}", existing, p
                        )));
                    }
                }
                pair = Some(p.clone());
            },
            Predicate::WindowAtMost(w) => max = max.min(*w),
        }
    }

    pair.map(|p| (p, max))
        .ok_or_else(|| Error::query("condition does not name a collocate pair"))
}

/// Per-group counts keyed by the categorical values of a record.
pub type GroupKey = Vec<Option<String>>;

pub fn to_group_counts(counts: BTreeMap<GroupKey, u64>) -> Vec<GroupCount> {
    counts
        .into_iter()
        .map(|(group, count)| GroupCount { group, count })
        .collect()
}

/// Display form of a group key; missing values become `N/A`.
pub fn render_group(key: &[Option<String>]) -> Vec<String> {
    key.iter()
        .map(|v| v.clone().unwrap_or_else(|| MISSING_VALUE.to_string()))
        .collect()
}

/// Outer join of baseline and filtered counts, keyed by `render_group`.
/// Groups absent on one side count 0 there.
pub fn merge_subgroups(
    baseline: &BTreeMap<GroupKey, u64>,
    filtered: &BTreeMap<GroupKey, u64>,
) -> Vec<SubgroupCount> {
    let mut merged: BTreeMap<Vec<String>, (u64, u64)> = BTreeMap::new();
    for (key, count) in baseline {
        merged.entry(render_group(key)).or_default().0 += count;
    }
    for (key, count) in filtered {
        merged.entry(render_group(key)).or_default().1 += count;
    }

    merged
        .into_iter()
        .map(|(group, (total, collocate_count))| SubgroupCount { group, total, collocate_count })
        .collect()
}

/// Writes the merged table. Tab-delimited unless `destination` ends in
/// `.csv`.
pub fn write_subgroups(rows: &[SubgroupCount], columns: &[String], destination: &Path) -> Result<()> {
    let delimiter = match destination.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(destination)?;

    let mut header: Vec<&str> = columns.iter().map(String::as_str).collect();
    header.push("total");
    header.push("collocate_count");
    writer.write_record(&header)?;

    for row in rows {
        let mut record = row.group.clone();
        record.push(row.total.to_string());
        record.push(row.collocate_count.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;

    info!("Wrote {} subgroup rows to {:?}", rows.len(), destination);
    Ok(())
}

/// Distinct ids among `facts` accepted by `plan`.
pub fn qualifying_ids<'a, I>(plan: &QueryPlan, facts: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a WindowFact>,
{
    facts
        .into_iter()
        .filter(|fact| plan.matches(fact))
        .filter_map(|fact| fact.text_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: Option<&str>, a: &str, b: &str, window: Option<u32>) -> WindowFact {
        WindowFact {
            text_id: id.map(String::from),
            pair: CollocatePair::new(a, b),
            window,
        }
    }

    #[test]
    fn missing_group_values_render_as_placeholder() {
        let key: GroupKey = vec![Some("labour".into()), None];
        assert_eq!(render_group(&key), vec!["labour", MISSING_VALUE]);
    }

    #[test]
    fn empty_conditions_are_rejected() {
        assert!(matches!(QueryPlan::from_conditions(&[]), Err(Error::InvalidQuery(_))));
        assert!(matches!(Filter::from_conditions(&[]), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn conditions_are_disjunctive() {
        let conditions = vec![
            Condition::new("alpha", "bravo", 1),
            Condition::new("charlie", "delta", 5),
        ];
        let plan = QueryPlan::from_conditions(&conditions).unwrap();
        let facts = vec![
            fact(Some("t1"), "alpha", "bravo", Some(1)),
            fact(Some("t2"), "alpha", "bravo", Some(2)),
            fact(Some("t3"), "charlie", "delta", Some(5)),
            fact(Some("t4"), "echo", "delta", Some(0)),
            fact(None, "alpha", "bravo", None),
        ];

        let ids = qualifying_ids(&plan, &facts);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["t1", "t3"]);

        let filter = Filter::from_conditions(&conditions).unwrap();
        for f in &facts {
            assert_eq!(filter.matches(f), plan.matches(f));
        }
    }

    #[test]
    fn conditions_use_canonical_pairs() {
        let plan = QueryPlan::from_conditions(&[Condition::new("bravo", "alpha", 3)]).unwrap();
        assert!(plan.matches(&fact(Some("t1"), "alpha", "bravo", Some(3))));
        assert_eq!(plan.bound(&CollocatePair::new("alpha", "bravo")), Some(3));
    }

    #[test]
    fn repeated_pair_keeps_the_loosest_window() {
        let plan = QueryPlan::from_conditions(&[
            Condition::new("alpha", "bravo", 2),
            Condition::new("alpha", "bravo", 7),
        ]).unwrap();
        assert_eq!(plan.pairs().count(), 1);
        assert_eq!(plan.bound(&CollocatePair::new("alpha", "bravo")), Some(7));
    }

    #[test]
    fn malformed_trees_are_rejected() {
        let no_pair = Filter::Or(vec![Filter::Leaf(Predicate::WindowAtMost(3))]);
        assert!(matches!(QueryPlan::compile(&no_pair), Err(Error::InvalidQuery(_))));

        let two_pairs = Filter::And(vec![
            Filter::Leaf(Predicate::Pair(CollocatePair::new("a", "b"))),
            Filter::Leaf(Predicate::Pair(CollocatePair::new("c", "d"))),
        ]);
        assert!(matches!(QueryPlan::compile(&two_pairs), Err(Error::InvalidQuery(_))));

        let bare_pair = Filter::Leaf(Predicate::Pair(CollocatePair::new("a", "b")));
        let plan = QueryPlan::compile(&bare_pair).unwrap();
        assert_eq!(plan.bound(&CollocatePair::new("a", "b")), Some(u32::MAX));
    }

    #[test]
    fn subgroups_outer_join_with_placeholders() {
        let mut baseline = BTreeMap::new();
        baseline.insert(vec![Some("labour".to_string())], 3);
        baseline.insert(vec![None], 2);
        let mut filtered = BTreeMap::new();
        filtered.insert(vec![Some("labour".to_string())], 1);
        filtered.insert(vec![Some("green".to_string())], 1);

        let rows = merge_subgroups(&baseline, &filtered);
        assert_eq!(rows, vec![
            SubgroupCount { group: vec!["N/A".into()], total: 2, collocate_count: 0 },
            SubgroupCount { group: vec!["green".into()], total: 0, collocate_count: 1 },
            SubgroupCount { group: vec!["labour".into()], total: 3, collocate_count: 1 },
        ]);
    }

    #[test]
    fn subgroup_table_delimiter_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![SubgroupCount { group: vec!["labour".into()], total: 3, collocate_count: 1 }];
        let columns = vec!["party".to_string()];

        let tsv = dir.path().join("out.tsv");
        write_subgroups(&rows, &columns, &tsv).unwrap();
        assert_eq!(std::fs::read_to_string(&tsv).unwrap(), "party\ttotal\tcollocate_count\nlabour\t3\t1\n");

        let csv_path = dir.path().join("out.csv");
        write_subgroups(&rows, &columns, &csv_path).unwrap();
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), "party,total,collocate_count\nlabour,3,1\n");
    }
}
