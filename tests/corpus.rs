use std::fs;
use std::path::{Path, PathBuf};

use sca::config::StopwordConfig;
use sca::{CollocatePair, CollocateSpec, Condition, Corpus, Error, ScaConfig, WindowFact};
use tempfile::TempDir;

const SPEECHES: &str = "\
speech_id,speech,Party,year
1,alpha bravo charlie delta,labour,1990
2,alpha foxtrot charlie golf,tory,1990
3,hotel india bravo xray,labour,
4,alpha bravo alpha bravo echo,green,1991
";

fn test_config() -> ScaConfig {
    let mut config = ScaConfig::default();
    config.storage.map_size_mb = 64;
    config.processing.show_progress = false;
    config.stopwords = StopwordConfig::disabled();
    config
}

fn write_source(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn seeded() -> (TempDir, Corpus) {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "speeches.csv", SPEECHES);
    let corpus = Corpus::seed(&source, dir.path().join("speeches.db"), "speech_id", "speech", test_config()).unwrap();
    (dir, corpus)
}

fn fact(id: &str, a: &str, b: &str, window: u32) -> WindowFact {
    WindowFact {
        text_id: Some(id.to_string()),
        pair: CollocatePair::new(a, b),
        window: Some(window),
    }
}

fn specs(raw: &[(&str, &str)]) -> Vec<CollocateSpec> {
    raw.iter().map(|&(a, b)| CollocateSpec::from((a, b))).collect()
}

#[test]
fn seeding_records_schema_and_settings() {
    let (dir, corpus) = seeded();
    assert_eq!(corpus.id_col(), "speech_id");
    assert_eq!(corpus.text_column(), "speech");
    assert_eq!(corpus.columns(), ["party", "year"]);
    assert_eq!(corpus.record_count().unwrap(), 4);
    assert!(corpus.collocates().is_empty());
    assert!(dir.path().join("speeches.db.json").is_file());

    let stats = corpus.storage_stats().unwrap();
    assert_eq!(stats.records, 4);
    assert_eq!(stats.window_facts, 0);
}

#[test]
fn alpha_bravo_windows() {
    let (_dir, mut corpus) = seeded();

    let summary = corpus.mark_windows("alpha", "bravo", false).unwrap();
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.facts, 2);
    assert!(!summary.sentinel);

    let facts = corpus.window_facts("alpha", "bravo").unwrap();
    assert_eq!(facts, vec![
        fact("1", "alpha", "bravo", 1),
        fact("4", "alpha", "bravo", 1),
    ]);
}

#[test]
fn pair_order_does_not_matter() {
    let (_dir, mut corpus) = seeded();

    corpus.mark_windows("alpha", "bravo", false).unwrap();
    let forward = corpus.window_facts("alpha", "bravo").unwrap();

    corpus.mark_windows("bravo", "alpha", false).unwrap();
    let backward = corpus.window_facts("bravo", "alpha").unwrap();

    assert_eq!(forward, backward);
    assert_eq!(corpus.collocates().len(), 1);
}

#[test]
fn adding_a_known_pair_changes_nothing() {
    let (_dir, mut corpus) = seeded();

    let first = corpus.add_collocates(&specs(&[("alpha", "bravo")])).unwrap();
    assert_eq!(first.added, vec![CollocatePair::new("alpha", "bravo")]);
    let facts = corpus.window_facts("alpha", "bravo").unwrap();

    let second = corpus.add_collocates(&specs(&[("Bravo", "alpha")])).unwrap();
    assert!(second.added.is_empty());
    assert_eq!(second.skipped_known, 1);
    assert_eq!(corpus.collocates().len(), 1);
    assert_eq!(corpus.window_facts("alpha", "bravo").unwrap(), facts);
}

#[test]
fn pair_found_nowhere_gets_one_sentinel() {
    let (_dir, mut corpus) = seeded();

    let summary = corpus.mark_windows("gamma", "delta", false).unwrap();
    assert!(summary.sentinel);
    assert_eq!(summary.candidates, 0);

    let facts = corpus.window_facts("delta", "gamma").unwrap();
    assert_eq!(facts, vec![WindowFact::sentinel(CollocatePair::new("gamma", "delta"))]);
    assert!(corpus.collocates().contains(&CollocatePair::new("gamma", "delta")));

    let ids = corpus.collocate_to_speech_query(&[Condition::new("gamma", "delta", 100)]).unwrap();
    assert!(ids.is_empty());
}

#[test]
fn candidates_missing_a_pattern_after_tokenizing_are_skipped() {
    let (_dir, mut corpus) = seeded();

    // "bra" is a substring of "bravo" but never a whole token.
    let summary = corpus.mark_windows("alpha", "bra", false).unwrap();
    assert_eq!(summary.candidates, 2);
    assert!(summary.sentinel);
    assert_eq!(corpus.window_facts("alpha", "bra").unwrap().len(), 1);

    corpus.mark_windows("golf", "alpha", false).unwrap();
    assert_eq!(corpus.window_facts("alpha", "golf").unwrap(), vec![fact("2", "alpha", "golf", 3)]);
}

#[test]
fn counts_are_a_subset_of_the_baseline() {
    let (dir, mut corpus) = seeded();
    corpus.add_collocates(&specs(&[("alpha", "bravo"), ("alpha", "charlie")])).unwrap();

    let conditions = vec![Condition::new("alpha", "bravo", 1)];
    let counts = corpus.count_with_collocates(&conditions).unwrap();
    assert_eq!(counts.len(), 2);
    assert!(counts.iter().all(|c| c.count == 1));
    assert_eq!(counts[0].group, vec![Some("green".to_string()), Some("1991".to_string())]);
    assert_eq!(counts[1].group, vec![Some("labour".to_string()), Some("1990".to_string())]);

    let out = dir.path().join("subgroups.tsv");
    let rows = corpus.counts_by_subgroups(&conditions, &out).unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows.iter().map(|r| r.total).sum::<u64>(), 4);

    for count in &counts {
        let rendered: Vec<String> = count.group.iter().map(|v| v.clone().unwrap_or_else(|| "N/A".into())).collect();
        let row = rows.iter().find(|r| r.group == rendered).unwrap();
        assert!(row.total >= count.count);
        assert_eq!(row.collocate_count, count.count);
    }

    let table = fs::read_to_string(&out).unwrap();
    assert_eq!(
        table,
        "party\tyear\ttotal\tcollocate_count\n\
         green\t1991\t1\t1\n\
         labour\t1990\t1\t1\n\
         labour\tN/A\t1\t0\n\
         tory\t1990\t1\t0\n"
    );
}

#[test]
fn conditions_are_disjunctive_with_window_bounds() {
    let (_dir, mut corpus) = seeded();
    corpus.add_collocates(&specs(&[("alpha", "bravo"), ("alpha", "charlie")])).unwrap();

    assert!(corpus.collocate_to_speech_query(&[Condition::new("alpha", "bravo", 0)]).unwrap().is_empty());

    let ids = corpus.collocate_to_speech_query(&[
        Condition::new("alpha", "bravo", 1),
        Condition::new("charlie", "alpha", 2),
    ]).unwrap();
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1", "2", "4"]);
}

#[test]
fn empty_conditions_are_rejected_before_any_work() {
    let (dir, corpus) = seeded();
    let out = dir.path().join("never.tsv");

    assert!(matches!(corpus.counts_by_subgroups(&[], &out), Err(Error::InvalidQuery(_))));
    assert!(!out.exists());
    assert!(matches!(corpus.count_with_collocates(&[]), Err(Error::InvalidQuery(_))));
    assert!(matches!(corpus.collocate_to_speech_query(&[]), Err(Error::InvalidQuery(_))));
}

#[test]
fn invalid_patterns_skip_only_their_pair() {
    let (_dir, mut corpus) = seeded();

    let report = corpus.add_collocates(&specs(&[("alpha", "bravo"), ("1984", "alpha")])).unwrap();
    assert_eq!(report.added, vec![CollocatePair::new("alpha", "bravo")]);
    assert_eq!(report.skipped_invalid, 1);
    assert_eq!(corpus.collocates().len(), 1);
    assert_eq!(corpus.terms().unwrap(), vec!["alpha", "bravo"]);
    assert_eq!(corpus.window_facts("alpha", "bravo").unwrap().len(), 2);

    assert!(matches!(corpus.mark_windows("1984", "alpha", false), Err(Error::InvalidPattern(_))));
    assert!(matches!(corpus.mark_windows("alpha", "Alpha", false), Err(Error::InvalidPattern(_))));
    assert!(matches!(corpus.tabulate_term("al pha"), Err(Error::InvalidPattern(_))));
}

#[test]
fn term_tabulation_is_idempotent() {
    let (_dir, mut corpus) = seeded();
    assert!(corpus.tabulate_term("Charlie").unwrap());
    assert!(!corpus.tabulate_term("charlie").unwrap());
    assert_eq!(corpus.terms().unwrap(), vec!["charlie"]);
}

#[test]
fn save_and_reload_round_trip() {
    let (dir, mut corpus) = seeded();
    corpus.add_collocates(&specs(&[("alpha", "bravo"), ("gamma", "delta")])).unwrap();
    let settings_path = corpus.settings_path().to_path_buf();
    let pairs = corpus.collocates().clone();
    corpus.close().unwrap();

    let reloaded = Corpus::from_settings(&settings_path, test_config()).unwrap();
    assert_eq!(reloaded.collocates(), &pairs);
    assert_eq!(reloaded.id_col(), "speech_id");
    assert_eq!(reloaded.text_column(), "speech");
    assert_eq!(reloaded.columns(), ["party", "year"]);
    assert_eq!(reloaded.terms().unwrap(), vec!["alpha", "bravo", "delta", "gamma"]);
    drop(reloaded);

    let reopened = Corpus::open(dir.path().join("speeches.db"), test_config()).unwrap();
    assert_eq!(reopened.collocates(), &pairs);
}

#[test]
fn dropping_an_unsaved_corpus_writes_its_settings() {
    let (_dir, mut corpus) = seeded();
    let settings_path = corpus.settings_path().to_path_buf();
    corpus.add_collocates(&specs(&[("alpha", "bravo")])).unwrap();
    drop(corpus);

    let settings = sca::Settings::load(&settings_path).unwrap();
    assert_eq!(settings.collocates, vec![("alpha".to_string(), "bravo".to_string())]);
    assert_eq!(settings.db_path, PathBuf::from("speeches.db"));
}

#[test]
fn seeding_an_existing_store_fails() {
    let (dir, corpus) = seeded();
    drop(corpus);

    let source = dir.path().join("speeches.csv");
    let err = Corpus::seed(&source, dir.path().join("speeches.db"), "speech_id", "speech", test_config()).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[test]
fn bad_sources_leave_no_store_behind() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "dupes.csv", "speech_id,speech\n1,alpha\n2,bravo\n1,charlie\n");
    let db = dir.path().join("dupes.db");

    let err = Corpus::seed(&source, &db, "speech_id", "speech", test_config()).unwrap_err();
    assert!(matches!(err, Error::InputData(_)));
    assert!(!db.exists());

    let empty = write_source(dir.path(), "empty.tsv", "speech_id\tspeech\n");
    let err = Corpus::seed(&empty, dir.path().join("empty.db"), "speech_id", "speech", test_config()).unwrap_err();
    assert!(matches!(err, Error::InputData(_)));
    assert!(!dir.path().join("empty.db").exists());
}

#[test]
fn stopwords_shift_positions_unless_counted() {
    let (_dir, mut corpus) = seeded();
    corpus.add_stopwords(["charlie"]).unwrap();

    corpus.mark_windows("alpha", "delta", false).unwrap();
    assert_eq!(corpus.window_facts("alpha", "delta").unwrap(), vec![fact("1", "alpha", "delta", 2)]);

    corpus.mark_windows("alpha", "delta", true).unwrap();
    assert_eq!(corpus.window_facts("alpha", "delta").unwrap(), vec![fact("1", "alpha", "delta", 3)]);
}

#[test]
fn changing_stopwords_resets_windows_and_groups() {
    let (_dir, mut corpus) = seeded();
    corpus.add_collocates(&specs(&[("alpha", "bravo")])).unwrap();
    corpus.create_collocate_group("ab", &[Condition::new("alpha", "bravo", 5)]).unwrap();

    corpus.add_stopwords(["echo"]).unwrap();
    assert!(corpus.collocates().is_empty());
    assert!(corpus.window_facts("alpha", "bravo").unwrap().is_empty());
    assert!(corpus.group_names().unwrap().is_empty());
    assert_eq!(corpus.terms().unwrap(), vec!["alpha", "bravo"]);
    assert!(corpus.stopwords().contains("echo"));

    corpus.remove_stopwords(["echo"]).unwrap();
    assert!(!corpus.stopwords().contains("echo"));
}

#[test]
fn reopening_keeps_the_stopwords_the_store_was_built_with() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "shapes.csv", "speech_id,speech\n1,alpha the bravo\n2,charlie the delta\n");
    let db = dir.path().join("shapes.db");

    let mut corpus = Corpus::seed(&source, &db, "speech_id", "speech", test_config()).unwrap();
    corpus.add_collocates(&specs(&[("alpha", "bravo")])).unwrap();
    corpus.close().unwrap();

    // English stopwords would drop "the" and shrink the window to 1.
    let mut english = ScaConfig::default();
    english.storage.map_size_mb = 64;
    english.processing.show_progress = false;
    let mut corpus = Corpus::open(&db, english).unwrap();
    assert!(!corpus.stopwords().contains("the"));
    assert_eq!(corpus.config().stopwords, StopwordConfig::disabled());

    corpus.add_collocates(&specs(&[("charlie", "delta")])).unwrap();
    assert_eq!(corpus.window_facts("alpha", "bravo").unwrap(), vec![fact("1", "alpha", "bravo", 2)]);
    assert_eq!(corpus.window_facts("charlie", "delta").unwrap(), vec![fact("2", "charlie", "delta", 2)]);

    // A change made through the corpus is what the store remembers.
    corpus.add_stopwords(["the"]).unwrap();
    corpus.close().unwrap();

    let settings_path = dir.path().join("shapes.db.json");
    let mut corpus = Corpus::from_settings(&settings_path, test_config()).unwrap();
    assert!(corpus.stopwords().contains("the"));
    assert!(corpus.collocates().is_empty());
    corpus.add_collocates(&specs(&[("alpha", "bravo")])).unwrap();
    assert_eq!(corpus.window_facts("alpha", "bravo").unwrap(), vec![fact("1", "alpha", "bravo", 1)]);
    corpus.close().unwrap();

    let settings = sca::Settings::load(&settings_path).unwrap();
    assert_eq!(settings.stopwords.custom, vec!["the"]);
}

#[test]
fn collocate_groups_store_token_rows() {
    let (_dir, mut corpus) = seeded();
    corpus.add_collocates(&specs(&[("alpha", "bravo")])).unwrap();

    let texts = corpus.create_collocate_group(" ab group ", &[Condition::new("alpha", "bravo", 1)]).unwrap();
    assert_eq!(texts, 2);
    assert_eq!(corpus.group_names().unwrap(), vec!["ab_group"]);

    let group = corpus.collocate_group("ab group").unwrap().unwrap();
    assert_eq!(group.name, "ab_group");
    assert_eq!(group.tokens.len(), 9);

    let first = &group.tokens[0];
    assert_eq!(first.text_id, "1");
    assert_eq!(first.token, "alpha");
    assert_eq!(first.patterns, vec!["alpha"]);

    let err = corpus.create_collocate_group("ab_group", &[Condition::new("alpha", "bravo", 1)]).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists(_)));
    assert!(matches!(corpus.create_collocate_group("x", &[]), Err(Error::InvalidQuery(_))));
    assert!(corpus.collocate_group("missing").unwrap().is_none());
}

#[test]
fn wildcards_and_punctuation() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        "hello.tsv",
        "id\ttext\n1\tHello, world!\n2\thello there big world\n3\tworld says hello\n4\thello hello\n5\tworldly hellos\n",
    );
    let mut corpus = Corpus::seed(&source, dir.path().join("hello.db"), "id", "text", test_config()).unwrap();
    assert!(corpus.columns().is_empty());

    let exact = corpus.mark_windows("hello", "world", false).unwrap();
    assert_eq!(exact.candidates, 4);
    assert_eq!(corpus.window_facts("hello", "world").unwrap(), vec![
        fact("1", "hello", "world", 1),
        fact("2", "hello", "world", 3),
        fact("3", "hello", "world", 2),
    ]);

    corpus.mark_windows("hello*", "world*", false).unwrap();
    let wild = corpus.window_facts("hello*", "world*").unwrap();
    assert_eq!(wild.len(), 4);
    assert_eq!(wild[3], fact("5", "hello*", "world*", 1));

    let ids = corpus.collocate_to_speech_query(&[Condition::new("world", "hello", 2)]).unwrap();
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1", "3"]);

    let counts = corpus.count_with_collocates(&[Condition::new("hello*", "world*", 10)]).unwrap();
    assert_eq!(counts.len(), 1);
    assert!(counts[0].group.is_empty());
    assert_eq!(counts[0].count, 4);
}
