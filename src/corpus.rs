//! A seeded corpus and everything derived from it: term membership, window
//! facts, the processed pair set and collocate groups.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use memchr::memmem;
use rayon::prelude::*;

use crate::collocate::group::{group_patterns, group_tokens, normalize_group_name};
use crate::collocate::query::{
    merge_subgroups, qualifying_ids, to_group_counts, write_subgroups, GroupKey, QueryPlan,
};
use crate::collocate::{prepare_collocates, text_window, CollocateCatalog, QueuedPair};
use crate::config::settings::{settings_path_for, Settings};
use crate::config::ScaConfig;
use crate::error::{Error, Result};
use crate::loader::CorpusReader;
use crate::parser::StopwordSet;
use crate::storage::{create_storage, open_storage, StorageStats, TableStore};
use crate::types::{
    AddReport, CollocateGroup, CollocatePair, CollocateSpec, Condition, CorpusSchema, GroupCount,
    SubgroupCount, TextRecord, WindowFact, WindowSummary,
};

pub struct Corpus {
    storage: Box<dyn TableStore>,
    schema: CorpusSchema,
    stopwords: StopwordSet,
    catalog: CollocateCatalog,
    config: ScaConfig,
    db_path: PathBuf,
    settings_path: PathBuf,
    thread_pool: Option<Arc<rayon::ThreadPool>>,
    dirty: bool,
    closed: bool,
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("db_path", &self.db_path)
            .field("schema", &self.schema)
            .field("collocates", &self.catalog.len())
            .finish()
    }
}

fn progress_bar(len: u64, show: bool, message: &str) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.set_message(message.to_string());
    bar
}

fn build_thread_pool(config: &ScaConfig) -> Result<Option<Arc<rayon::ThreadPool>>> {
    if config.processing.threads == 0 {
        return Ok(None);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.processing.effective_threads())
        .build()?;
    Ok(Some(Arc::new(pool)))
}

/// Membership terms are non-empty runs of `a-z`.
fn validate_term(term: &str) -> Result<String> {
    let term = term.trim().to_lowercase();
    if term.is_empty() || !term.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(Error::pattern(format!(
            "term '{}' must be a non-empty sequence of letters a-z", term
        )));
    }
    Ok(term)
}

fn load_records(
    storage: &mut dyn TableStore,
    reader: &mut CorpusReader,
    config: &ScaConfig,
) -> Result<u64> {
    let bar = if config.processing.show_progress {
        let bar = ProgressBar::new_spinner();
        bar.set_message("Loading records");
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut loaded = 0u64;
    loop {
        let batch = reader.next_batch(config.storage.batch_size)?;
        if batch.is_empty() {
            break;
        }
        storage.store_records_batch(&batch)?;
        loaded += batch.len() as u64;
        bar.inc(batch.len() as u64);
        debug!("Stored {} records so far", loaded);
    }
    bar.finish_and_clear();
    Ok(loaded)
}

impl Corpus {
    /// Creates a new store at `db_path` from a delimited source file and
    /// writes its settings snapshot next to it.
    pub fn seed<P: AsRef<Path>, Q: AsRef<Path>>(
        source: P,
        db_path: Q,
        id_col: &str,
        text_column: &str,
        config: ScaConfig,
    ) -> Result<Self> {
        let source = source.as_ref();
        let db_path = db_path.as_ref().to_path_buf();
        config.validate()?;

        if db_path.exists() {
            return Err(Error::AlreadyExists(format!("Database file {:?} already exists", db_path)));
        }

        let start = Instant::now();
        let mut reader = CorpusReader::open(source, id_col, text_column)?;
        let schema = reader.schema().clone();
        let stopwords = StopwordSet::from_config(&config.stopwords)?;
        let thread_pool = build_thread_pool(&config)?;

        info!("Seeding {:?} from {:?}", db_path, source);
        debug!("{}", config.storage.describe());
        let mut storage: Box<dyn TableStore> = Box::new(create_storage(&db_path, &config.storage)?);

        let loaded = storage
            .store_schema(&schema)
            .and_then(|_| storage.store_stopwords(&stopwords.to_config()))
            .and_then(|_| load_records(&mut *storage, &mut reader, &config));

        let loaded = match loaded {
            Ok(count) => count,
            Err(e) => {
                error!("Seeding {:?} failed: {}", db_path, e);
                let _ = storage.close();
                drop(storage);
                if let Err(cleanup) = std::fs::remove_dir_all(&db_path) {
                    warn!("Failed to remove partial store {:?}: {}", db_path, cleanup);
                }
                return Err(e);
            },
        };

        info!(
            "Seeded {} records into {:?} in {:.2?} (columns: {:?})",
            loaded, db_path, start.elapsed(), schema.columns
        );

        let mut corpus = Self {
            storage,
            schema,
            stopwords,
            catalog: CollocateCatalog::new(),
            settings_path: settings_path_for(&db_path),
            db_path,
            config,
            thread_pool,
            dirty: true,
            closed: false,
        };
        corpus.save()?;
        Ok(corpus)
    }

    /// Reopens a seeded store. The pair set is rebuilt from stored facts.
    pub fn open<P: AsRef<Path>>(db_path: P, config: ScaConfig) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let settings_path = settings_path_for(&db_path);
        Self::open_with(db_path, settings_path, config)
    }

    /// Opens the store named by a settings snapshot, resolving its path
    /// relative to the snapshot.
    pub fn from_settings<P: AsRef<Path>>(settings_path: P, mut config: ScaConfig) -> Result<Self> {
        let settings_path = settings_path.as_ref().to_path_buf();
        let settings = Settings::load(&settings_path)?;
        let db_path = settings.resolve_db_path(&settings_path);

        config.stopwords = settings.stopwords.clone();
        let corpus = Self::open_with(db_path, settings_path, config)?;

        if corpus.schema.id_col != settings.id_col || corpus.schema.text_column != settings.text_column {
            warn!(
                "Settings name columns ({}, {}) but the store has ({}, {})",
                settings.id_col, settings.text_column, corpus.schema.id_col, corpus.schema.text_column
            );
        }

        let mut recorded = settings.collocates.clone();
        recorded.sort();
        if recorded != corpus.catalog.to_tuples() {
            warn!(
                "Settings list {} collocates but the store holds facts for {}; using the store",
                recorded.len(),
                corpus.catalog.len()
            );
        }

        Ok(corpus)
    }

    /// The store's own stopword policy wins over the caller's, since its
    /// window positions were numbered under it.
    fn open_with(db_path: PathBuf, settings_path: PathBuf, mut config: ScaConfig) -> Result<Self> {
        config.validate()?;
        let mut storage: Box<dyn TableStore> = Box::new(open_storage(&db_path, &config.storage)?);

        let schema = storage
            .load_schema()?
            .ok_or_else(|| Error::storage(format!("Store {:?} has no corpus schema", db_path)))?;

        let requested = StopwordSet::from_config(&config.stopwords)?;
        let stopwords = match storage.load_stopwords()? {
            Some(stored) => {
                if stored != requested.to_config() {
                    warn!(
                        "Configured stopwords differ from those {:?} was built with; using the stored set. \
                         Change stopwords through the corpus to recompute windows",
                        db_path
                    );
                }
                StopwordSet::from_config(&stored)?
            },
            None => {
                debug!("Store {:?} has no stopword policy, recording the configured one", db_path);
                storage.store_stopwords(&requested.to_config())?;
                requested
            },
        };
        config.stopwords = stopwords.to_config();
        let catalog = CollocateCatalog::from_pairs(storage.fact_pairs()?);
        let thread_pool = build_thread_pool(&config)?;

        info!(
            "Opened corpus {:?}: {} records, {} collocates",
            db_path,
            storage.record_count()?,
            catalog.len()
        );

        Ok(Self {
            storage,
            schema,
            stopwords,
            catalog,
            config,
            db_path,
            settings_path,
            thread_pool,
            dirty: false,
            closed: false,
        })
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.thread_pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    pub fn id_col(&self) -> &str {
        &self.schema.id_col
    }

    pub fn text_column(&self) -> &str {
        &self.schema.text_column
    }

    /// Categorical columns, lowercased and sorted.
    pub fn columns(&self) -> &[String] {
        &self.schema.columns
    }

    pub fn record_count(&self) -> Result<u64> {
        self.storage.record_count()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn stopwords(&self) -> &StopwordSet {
        &self.stopwords
    }

    pub fn config(&self) -> &ScaConfig {
        &self.config
    }

    pub fn settings(&self) -> Settings {
        Settings::new(
            &self.db_path,
            &self.settings_path,
            &self.schema.id_col,
            &self.schema.text_column,
            &self.schema.columns,
            self.catalog.to_tuples(),
            self.stopwords.to_config(),
        )
    }

    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Writes the settings snapshot.
    pub fn save(&mut self) -> Result<()> {
        self.settings().save(&self.settings_path)?;
        self.dirty = false;
        Ok(())
    }

    /// Saves the snapshot and closes the store.
    pub fn close(mut self) -> Result<()> {
        self.save()?;
        self.closed = true;
        self.storage.close()
    }

    // Term membership

    /// Records which texts contain `term` as a case-insensitive substring.
    /// Returns false when the term was already tabulated.
    pub fn tabulate_term(&mut self, term: &str) -> Result<bool> {
        let term = validate_term(term)?;
        if self.storage.term_members(&term)?.is_some() {
            debug!("Term '{}' already tabulated", term);
            return Ok(false);
        }

        let finder = memmem::Finder::new(term.as_bytes());
        let mut members = Vec::new();
        self.storage.for_each_record(&mut |record: TextRecord| {
            if finder.find(record.text.to_lowercase().as_bytes()).is_some() {
                members.push(record.id);
            }
            Ok(())
        })?;
        members.sort();

        let term_id = self.storage.store_term(&term, &members)?;
        info!("Tabulated term '{}' (#{}): {} texts", term, term_id, members.len());
        Ok(true)
    }

    pub fn terms(&self) -> Result<Vec<String>> {
        self.storage.list_terms()
    }

    // Windows

    /// Computes and stores the minimum window of a pair in every text that
    /// contains both patterns. A pair found nowhere gets a single sentinel.
    pub fn mark_windows(&mut self, pattern1: &str, pattern2: &str, count_stopwords: bool) -> Result<WindowSummary> {
        let pair = CollocatePair::new(pattern1, pattern2);
        if pair.pattern1 == pair.pattern2 {
            return Err(Error::pattern(format!(
                "a collocate needs two different patterns, got '{}' twice", pair.pattern1
            )));
        }

        let queued = QueuedPair::compile(&pair)?;
        for term in queued.terms() {
            self.tabulate_term(term)?;
        }
        self.process_pair(&queued, count_stopwords)
    }

    fn members(&self, term: &str) -> Result<Vec<String>> {
        self.storage
            .term_members(term)?
            .ok_or_else(|| Error::storage(format!("term '{}' has not been tabulated", term)))
    }

    fn process_pair(&mut self, queued: &QueuedPair, count_stopwords: bool) -> Result<WindowSummary> {
        let start = Instant::now();
        let pair = &queued.pair;
        let [term1, term2] = queued.terms();

        let members1: BTreeSet<String> = self.members(term1)?.into_iter().collect();
        let candidates: Vec<String> = self
            .members(term2)?
            .into_iter()
            .filter(|id| members1.contains(id))
            .collect();
        debug!("{}: {} candidate texts", pair, candidates.len());

        let bar = progress_bar(
            candidates.len() as u64,
            self.config.processing.show_progress,
            &pair.to_string(),
        );

        let mut facts: Vec<WindowFact> = Vec::new();
        for chunk in candidates.chunks(self.config.storage.batch_size) {
            let records = self.storage.get_records_batch(chunk)?;
            let stopwords = &self.stopwords;
            let found: Vec<WindowFact> = self.install(|| {
                records
                    .par_iter()
                    .filter_map(|record| {
                        text_window(&record.text, &queued.pattern1, &queued.pattern2, stopwords, count_stopwords)
                            .map(|window| WindowFact {
                                text_id: Some(record.id.clone()),
                                pair: pair.clone(),
                                window: Some(window),
                            })
                    })
                    .collect()
            });
            facts.extend(found);
            bar.inc(chunk.len() as u64);
        }
        bar.finish_and_clear();

        let sentinel = facts.is_empty();
        if sentinel {
            debug!("{}: no text contains both patterns, storing sentinel", pair);
            facts.push(WindowFact::sentinel(pair.clone()));
        }

        self.storage.replace_window_facts(pair, &facts)?;
        self.catalog.insert(pair.clone());
        self.dirty = true;

        let summary = WindowSummary {
            pair: pair.clone(),
            candidates: candidates.len(),
            facts: if sentinel { 0 } else { facts.len() },
            sentinel,
        };
        info!(
            "Marked windows for {}: {} facts from {} candidates in {:.2?}",
            pair, summary.facts, summary.candidates, start.elapsed()
        );
        Ok(summary)
    }

    /// Stored facts of a pair in either order, sentinel included.
    pub fn window_facts(&self, pattern1: &str, pattern2: &str) -> Result<Vec<WindowFact>> {
        self.storage.window_facts(&CollocatePair::new(pattern1, pattern2))
    }

    // Collocates

    /// Processes every new pair in `specs`. Known pairs and pairs with an
    /// unusable pattern are skipped and counted in the report.
    pub fn add_collocates(&mut self, specs: &[CollocateSpec]) -> Result<AddReport> {
        info!("Adding {} collocate pairs", specs.len());
        let batch = prepare_collocates(specs, &self.catalog)?;
        info!(
            "Prepared {} new pairs over {} terms ({} known, {} invalid)",
            batch.queued.len(), batch.terms.len(), batch.skipped_known, batch.skipped_invalid
        );

        for term in &batch.terms {
            self.tabulate_term(term)?;
        }

        let count_stopwords = self.config.processing.count_stopwords;
        let mut added = Vec::with_capacity(batch.queued.len());
        for queued in &batch.queued {
            self.process_pair(queued, count_stopwords)?;
            added.push(queued.pair.clone());
        }

        info!("Added {} collocates, {} in total", added.len(), self.catalog.len());
        Ok(AddReport {
            added,
            skipped_known: batch.skipped_known,
            skipped_invalid: batch.skipped_invalid,
        })
    }

    pub fn collocates(&self) -> &CollocateCatalog {
        &self.catalog
    }

    // Queries

    fn matching_ids(&self, plan: &QueryPlan) -> Result<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for (pair, max) in plan.pairs() {
            if !self.catalog.contains(pair) {
                warn!("Collocate {} has not been added; it matches nothing", pair);
                continue;
            }
            let facts = self.storage.window_facts(pair)?;
            let before = ids.len();
            ids.extend(qualifying_ids(plan, &facts));
            debug!("{} within {}: {} new ids", pair, max, ids.len() - before);
        }
        Ok(ids)
    }

    /// Distinct ids of texts satisfying at least one condition.
    pub fn collocate_to_speech_query(&self, conditions: &[Condition]) -> Result<BTreeSet<String>> {
        let plan = QueryPlan::from_conditions(conditions)?;
        self.matching_ids(&plan)
    }

    /// Matching texts counted per combination of categorical values.
    pub fn count_with_collocates(&self, conditions: &[Condition]) -> Result<Vec<GroupCount>> {
        let ids: Vec<String> = self.collocate_to_speech_query(conditions)?.into_iter().collect();

        let mut counts: BTreeMap<GroupKey, u64> = BTreeMap::new();
        for chunk in ids.chunks(self.config.storage.batch_size) {
            for record in self.storage.get_records_batch(chunk)? {
                *counts.entry(record.values).or_default() += 1;
            }
        }
        Ok(to_group_counts(counts))
    }

    /// Baseline and filtered counts per group, outer-joined and written to
    /// `destination`.
    pub fn counts_by_subgroups<P: AsRef<Path>>(
        &self,
        conditions: &[Condition],
        destination: P,
    ) -> Result<Vec<SubgroupCount>> {
        let plan = QueryPlan::from_conditions(conditions)?;
        let ids = self.matching_ids(&plan)?;
        info!("Counting subgroups over {:?}: {} matching texts", self.schema.columns, ids.len());

        let mut baseline: BTreeMap<GroupKey, u64> = BTreeMap::new();
        let mut filtered: BTreeMap<GroupKey, u64> = BTreeMap::new();
        self.storage.for_each_record(&mut |record: TextRecord| {
            if ids.contains(&record.id) {
                *filtered.entry(record.values.clone()).or_default() += 1;
            }
            *baseline.entry(record.values).or_default() += 1;
            Ok(())
        })?;

        let rows = merge_subgroups(&baseline, &filtered);
        write_subgroups(&rows, &self.schema.columns, destination.as_ref())?;
        Ok(rows)
    }

    // Groups

    /// Stores token rows of every text matching `conditions` under `name`.
    /// Returns the number of texts in the group.
    pub fn create_collocate_group(&mut self, name: &str, conditions: &[Condition]) -> Result<usize> {
        let name = normalize_group_name(name)?;
        let plan = QueryPlan::from_conditions(conditions)?;

        if self.storage.get_group(&name)?.is_some() {
            return Err(Error::AlreadyExists(format!("Collocate group '{}' already exists", name)));
        }

        let patterns = group_patterns(conditions)?;
        let ids: Vec<String> = self.matching_ids(&plan)?.into_iter().collect();
        info!("Creating collocate group '{}' over {} texts", name, ids.len());

        let mut tokens = Vec::new();
        for chunk in ids.chunks(self.config.storage.batch_size) {
            let records = self.storage.get_records_batch(chunk)?;
            let stopwords = &self.stopwords;
            let patterns = &patterns;
            let rows: Vec<_> = self.install(|| {
                records
                    .par_iter()
                    .flat_map_iter(|record| group_tokens(&record.id, &record.text, patterns, stopwords))
                    .collect()
            });
            tokens.extend(rows);
        }

        let group = CollocateGroup {
            name: name.clone(),
            conditions: conditions.to_vec(),
            tokens,
        };
        self.storage.store_group(&group)?;
        debug!("Group '{}' holds {} token rows", name, group.tokens.len());
        Ok(ids.len())
    }

    pub fn collocate_group(&self, name: &str) -> Result<Option<CollocateGroup>> {
        self.storage.get_group(&normalize_group_name(name)?)
    }

    pub fn group_names(&self) -> Result<Vec<String>> {
        self.storage.group_names()
    }

    // Stopwords

    /// Window facts, pairs and groups depend on stopword positions and are
    /// dropped whenever the set changes. Term membership is kept.
    fn reset_stopword_state(&mut self) -> Result<()> {
        self.config.stopwords = self.stopwords.to_config();
        self.storage.store_stopwords(&self.config.stopwords)?;
        self.storage.clear_window_facts()?;
        self.storage.clear_groups()?;
        let dropped = self.catalog.len();
        self.catalog.clear();
        self.dirty = true;
        warn!("Stopwords changed: cleared {} collocates and all collocate groups", dropped);
        Ok(())
    }

    pub fn add_stopwords<I, S>(&mut self, words: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords.add(words);
        self.reset_stopword_state()
    }

    pub fn remove_stopwords<I, S>(&mut self, words: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords.remove(words);
        self.reset_stopword_state()
    }

    pub fn load_stopwords_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let count = self.stopwords.load_file(path)?;
        self.reset_stopword_state()?;
        Ok(count)
    }
}

impl Drop for Corpus {
    fn drop(&mut self) {
        if self.closed || !self.dirty {
            return;
        }
        if let Err(e) = self.save() {
            error!("Failed to save settings for {:?}: {}", self.db_path, e);
        }
    }
}
