// src/config/settings.rs
//
// Human-readable snapshot of a corpus, written next to the store.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Serialize, Deserialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::subsystems::StopwordConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Store location, relative to the directory holding the snapshot.
    pub db_path: PathBuf,
    pub id_col: String,
    pub text_column: String,
    pub columns: Vec<String>,
    pub collocates: Vec<(String, String)>,
    pub stopwords: StopwordConfig,
    pub saved_at: DateTime<Utc>,
}

/// `corpus.db` -> `corpus.db.json`
pub fn settings_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// Path of `target` relative to `base_dir` when it lives beneath it,
/// otherwise `target` unchanged.
fn relative_to(target: &Path, base_dir: &Path) -> PathBuf {
    match target.strip_prefix(base_dir) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => target.to_path_buf(),
    }
}

impl Settings {
    /// Builds a snapshot for a store at `db_path`, to be written at
    /// `settings_path`. Collocates are sorted.
    pub fn new(
        db_path: &Path,
        settings_path: &Path,
        id_col: &str,
        text_column: &str,
        columns: &[String],
        mut collocates: Vec<(String, String)>,
        stopwords: StopwordConfig,
    ) -> Self {
        collocates.sort();
        let base_dir = settings_path.parent().unwrap_or_else(|| Path::new(""));
        Self {
            db_path: relative_to(db_path, base_dir),
            id_col: id_col.to_string(),
            text_column: text_column.to_string(),
            columns: columns.to_vec(),
            collocates,
            stopwords,
            saved_at: Utc::now(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(format!("Settings file {:?} does not exist", path)));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        debug!("Loaded settings from {:?} (saved {})", path, settings.saved_at);
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Resolves `db_path` against the snapshot's own location.
    pub fn resolve_db_path(&self, settings_path: &Path) -> PathBuf {
        if self.db_path.is_absolute() {
            return self.db_path.clone();
        }
        match settings_path.parent() {
            Some(dir) => dir.join(&self.db_path),
            None => self.db_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dir: &Path) -> (Settings, PathBuf) {
        let db = dir.join("corpus.db");
        let path = settings_path_for(&db);
        let settings = Settings::new(
            &db,
            &path,
            "speech_id",
            "speech",
            &["party".to_string(), "year".to_string()],
            vec![
                ("minister".to_string(), "prime".to_string()),
                ("govern*".to_string(), "tax*".to_string()),
            ],
            StopwordConfig::default(),
        );
        (settings, path)
    }

    #[test]
    fn snapshot_round_trips_with_relative_db_path() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, path) = sample(dir.path());
        assert_eq!(path, dir.path().join("corpus.db.json"));
        assert_eq!(settings.db_path, PathBuf::from("corpus.db"));
        assert_eq!(settings.collocates[0].0, "govern*");

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.resolve_db_path(&path), dir.path().join("corpus.db"));
    }

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(Settings::load("/no/such/settings.json"), Err(Error::NotFound(_))));
    }

    #[test]
    fn missing_key_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"{"db_path": "corpus.db", "id_col": "id"}"#).unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Json(_))));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Json(_))));
    }
}
