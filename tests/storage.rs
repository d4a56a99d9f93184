use sca::config::{StopwordConfig, StorageConfig};
use sca::storage::{create_storage, open_storage, TableStore};
use sca::{CollocateGroup, CollocatePair, Condition, CorpusSchema, Error, TextRecord, WindowFact};

fn small_config() -> StorageConfig {
    StorageConfig {
        map_size_mb: 32,
        batch_size: 2,
        ..StorageConfig::default()
    }
}

fn record(id: &str, text: &str, party: Option<&str>) -> TextRecord {
    TextRecord {
        id: id.to_string(),
        text: text.to_string(),
        values: vec![party.map(String::from)],
    }
}

fn fact(id: Option<&str>, pair: &CollocatePair, window: Option<u32>) -> WindowFact {
    WindowFact {
        text_id: id.map(String::from),
        pair: pair.clone(),
        window,
    }
}

#[test]
fn records_schema_and_counts_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let mut store = create_storage(&path, &small_config()).unwrap();
        let schema = CorpusSchema {
            id_col: "id".into(),
            text_column: "text".into(),
            columns: vec!["party".into()],
        };
        store.store_schema(&schema).unwrap();
        store.store_records_batch(&[
            record("a", "first text", Some("labour")),
            record("b", "second text", None),
            record("c", "third text", Some("tory")),
        ]).unwrap();
        assert_eq!(store.record_count().unwrap(), 3);

        let err = store.store_records_batch(&[record("b", "again", None)]).unwrap_err();
        assert!(matches!(err, Error::InputData(_)));
        assert_eq!(store.record_count().unwrap(), 3);
        store.close().unwrap();
    }

    let store = open_storage(&path, &small_config()).unwrap();
    assert_eq!(store.load_schema().unwrap().unwrap().columns, vec!["party"]);

    let fetched = store.get_records_batch(&["c".into(), "zzz".into(), "a".into()]).unwrap();
    assert_eq!(fetched.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
    assert_eq!(fetched[1].values, vec![Some("labour".to_string())]);

    let mut seen = Vec::new();
    store.for_each_record(&mut |r: TextRecord| {
        seen.push(r.id);
        Ok(())
    }).unwrap();
    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[test]
fn create_and_open_check_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    assert!(matches!(open_storage(&path, &small_config()), Err(Error::NotFound(_))));
    drop(create_storage(&path, &small_config()).unwrap());
    assert!(matches!(create_storage(&path, &small_config()), Err(Error::AlreadyExists(_))));
}

#[test]
fn terms_get_surrogate_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = create_storage(dir.path().join("store.db"), &small_config()).unwrap();

    let first = store.store_term("govern", &["1".into(), "3".into()]).unwrap();
    let second = store.store_term("minister", &[]).unwrap();
    assert_ne!(first, second);

    // Known terms keep their key and members.
    assert_eq!(store.store_term("govern", &["9".into()]).unwrap(), first);
    assert_eq!(store.term_members("govern").unwrap(), Some(vec!["1".to_string(), "3".to_string()]));
    assert_eq!(store.term_members("minister").unwrap(), Some(Vec::new()));
    assert_eq!(store.term_members("tax").unwrap(), None);
    assert_eq!(store.list_terms().unwrap(), vec!["govern", "minister"]);
}

#[test]
fn replacing_facts_drops_the_old_ones() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = create_storage(dir.path().join("store.db"), &small_config()).unwrap();
    let ab = CollocatePair::new("alpha", "bravo");
    let abc = CollocatePair::new("alpha", "bravoc");

    store.replace_window_facts(&ab, &[WindowFact::sentinel(ab.clone())]).unwrap();
    store.replace_window_facts(&abc, &[fact(Some("7"), &abc, Some(4))]).unwrap();
    assert_eq!(store.window_facts(&ab).unwrap(), vec![WindowFact::sentinel(ab.clone())]);

    let real = vec![fact(Some("10"), &ab, Some(2)), fact(Some("9"), &ab, Some(1))];
    store.replace_window_facts(&ab, &real).unwrap();
    assert_eq!(store.window_facts(&ab).unwrap(), real);
    assert_eq!(store.window_facts(&abc).unwrap().len(), 1);

    let pairs: Vec<_> = store.fact_pairs().unwrap().into_iter().collect();
    assert_eq!(pairs, vec![ab.clone(), abc.clone()]);

    let wrong = fact(Some("1"), &abc, Some(1));
    assert!(matches!(store.replace_window_facts(&ab, &[wrong]), Err(Error::Storage(_))));

    store.clear_window_facts().unwrap();
    assert!(store.fact_pairs().unwrap().is_empty());

    let stats = store.get_stats().unwrap();
    assert_eq!(stats.window_facts, 0);
    assert_eq!(stats.metrics.facts_written, 4);
}

#[test]
fn group_names_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = create_storage(dir.path().join("store.db"), &small_config()).unwrap();
    let group = CollocateGroup {
        name: "tax_talk".into(),
        conditions: vec![Condition::new("tax*", "govern*", 5)],
        tokens: Vec::new(),
    };

    store.store_group(&group).unwrap();
    assert!(matches!(store.store_group(&group), Err(Error::AlreadyExists(_))));
    assert_eq!(store.get_group("tax_talk").unwrap(), Some(group));
    assert_eq!(store.group_names().unwrap(), vec!["tax_talk"]);

    store.clear_groups().unwrap();
    assert!(store.get_group("tax_talk").unwrap().is_none());
}

#[test]
fn stopword_policy_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let mut store = create_storage(&path, &small_config()).unwrap();
        assert_eq!(store.load_stopwords().unwrap(), None);

        let mut policy = StopwordConfig::disabled();
        policy.custom = vec!["hon".into(), "the".into()];
        store.store_stopwords(&policy).unwrap();
        store.store_stopwords(&StopwordConfig::default()).unwrap();
        store.close().unwrap();
    }

    let store = open_storage(&path, &small_config()).unwrap();
    assert_eq!(store.load_stopwords().unwrap(), Some(StopwordConfig::default()));
}
