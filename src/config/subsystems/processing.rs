// src/config/subsystems/processing.rs

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::config::FromIni;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Worker threads for candidate tokenization. 0 lets rayon decide.
    pub threads: usize,
    pub show_progress: bool,
    /// Whether stopwords keep their slot in position numbering.
    pub count_stopwords: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            show_progress: true,
            count_stopwords: false,
        }
    }
}

impl FromIni for ProcessingConfig {
    fn from_ini_section(&mut self, section_name: &str, key: &str, value: &str) -> Option<Result<()>> {
        if section_name != "processing" {
            return None;
        }

        match key {
            "threads" => {
                match value.parse() {
                    Ok(threads) => {
                        self.threads = threads;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid threads value (must be >= 0): {}", value)
                    ))),
                }
            },
            "show_progress" => {
                match value.parse() {
                    Ok(flag) => {
                        self.show_progress = flag;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid show_progress value (must be true/false): {}", value)
                    ))),
                }
            },
            "count_stopwords" => {
                match value.parse() {
                    Ok(flag) => {
                        self.count_stopwords = flag;
                        Some(Ok(()))
                    },
                    Err(_) => Some(Err(Error::Config(
                        format!("Invalid count_stopwords value (must be true/false): {}", value)
                    ))),
                }
            },
            _ => None,
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<()> {
        let cpus = num_cpus::get();
        if self.threads > cpus * 4 {
            return Err(Error::Config(format!(
                "threads ({}) exceeds four times the available CPUs ({})",
                self.threads, cpus
            )));
        }
        Ok(())
    }

    /// Threads actually used by the worker pool.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}
