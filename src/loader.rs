// Delimited-file corpus loader: validates the header, then streams records.

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{CorpusSchema, TextRecord};

lazy_static! {
    static ref SAFE_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z0-9_]+$").unwrap();
}

/// `.tsv` files are tab-delimited; everything else is read as CSV.
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Streams validated records out of a source file.
pub struct CorpusReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    schema: CorpusSchema,
    id_idx: usize,
    text_idx: usize,
    column_idx: Vec<usize>,
    pending: Option<TextRecord>,
    seen_ids: HashSet<String>,
    row: usize,
}

impl std::fmt::Debug for CorpusReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusReader")
            .field("path", &self.path)
            .field("schema", &self.schema)
            .field("row", &self.row)
            .finish()
    }
}

impl CorpusReader {
    /// Opens `path` and validates its header against the two designated
    /// columns. Fails when the file holds no data rows.
    pub fn open<P: AsRef<Path>>(path: P, id_col: &str, text_column: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if id_col == text_column {
            return Err(Error::config(format!(
                "text_column and id_col cannot be the same ('{}')", id_col
            )));
        }

        if !path.is_file() {
            return Err(Error::NotFound(format!("Source file {:?} does not exist", path)));
        }

        let delimiter = delimiter_for(&path);
        debug!("Reading {:?} with delimiter {:?}", path, delimiter as char);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(&path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(Error::input(format!(
                "Input file {:?} is empty and does not contain any data", path
            )));
        }

        let position = |name: &str| -> Result<usize> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                Error::config(format!("Column {} not found in {}", name, path.display()))
            })
        };
        let id_idx = position(id_col)?;
        let text_idx = position(text_column)?;

        for name in &headers {
            if !SAFE_IDENTIFIER.is_match(name) {
                return Err(Error::config(format!(
                    "Column name {} is not a safe identifier", name
                )));
            }
        }

        let lowered: HashSet<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        if lowered.len() != headers.len() {
            return Err(Error::config(format!(
                "Duplicate column names found: {}", headers.join(", ")
            )));
        }

        let mut columns: Vec<(String, usize)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_idx && *i != text_idx)
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();
        columns.sort();

        let schema = CorpusSchema {
            id_col: id_col.to_string(),
            text_column: text_column.to_string(),
            columns: columns.iter().map(|(name, _)| name.clone()).collect(),
        };
        let column_idx = columns.into_iter().map(|(_, i)| i).collect();

        let mut source = Self {
            path,
            reader,
            schema,
            id_idx,
            text_idx,
            column_idx,
            pending: None,
            seen_ids: HashSet::new(),
            row: 0,
        };

        source.pending = source.read_record()?;
        if source.pending.is_none() {
            return Err(Error::input(format!(
                "Input file {:?} is empty and does not contain any data", source.path
            )));
        }

        info!("Opened corpus source {:?}: columns {:?}", source.path, source.schema.columns);
        Ok(source)
    }

    pub fn schema(&self) -> &CorpusSchema {
        &self.schema
    }

    fn read_record(&mut self) -> Result<Option<TextRecord>> {
        let mut raw = csv::StringRecord::new();
        if !self.reader.read_record(&mut raw)? {
            return Ok(None);
        }
        self.row += 1;

        let field = |i: usize| raw.get(i).unwrap_or("");

        let id = field(self.id_idx).trim().to_string();
        if id.is_empty() {
            return Err(Error::input(format!("Row {} has an empty {}", self.row, self.schema.id_col)));
        }
        if !self.seen_ids.insert(id.clone()) {
            return Err(Error::input(format!("Duplicate id '{}' at row {}", id, self.row)));
        }

        let values = self
            .column_idx
            .iter()
            .map(|&i| {
                let value = field(i);
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            })
            .collect();

        Ok(Some(TextRecord {
            id,
            text: field(self.text_idx).to_string(),
            values,
        }))
    }

    /// Up to `size` records; empty once the source is exhausted.
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<TextRecord>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next() {
                Some(record) => batch.push(record?),
                None => break,
            }
        }
        Ok(batch)
    }
}

impl Iterator for CorpusReader {
    type Item = Result<TextRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.pending.take() {
            return Some(Ok(record));
        }
        self.read_record().transpose()
    }
}
