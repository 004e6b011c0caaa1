// src/config.rs

use crate::cli::Args;
use crate::error::{Error, Result};
use crate::features::object_oriented;
use crate::model::Level;
use serde::Deserialize;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PersistencePolicy {
    /// Roll back the failed partition and keep going
    Continue,
    /// Roll back the failed partition and stop the run
    Abort,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub extractors: Vec<String>,
    pub ngrams: bool,
    pub partition_size: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub levels: Vec<Level>,
    pub on_persistence_error: PersistencePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extractors: vec![object_oriented::NAME.to_string()],
            ngrams: true,
            partition_size: 100,
            ngram_min: 1,
            ngram_max: 3,
            levels: Level::ALL.to_vec(),
            on_persistence_error: PersistencePolicy::Continue,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// File (or default) settings with command-line flags layered on top
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(args);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, args: &Args) {
        if !args.extractors.is_empty() {
            self.extractors = args.extractors.clone();
        }
        if args.ngrams {
            self.ngrams = true;
        }
        if args.no_ngrams {
            self.ngrams = false;
        }
        if let Some(size) = args.partition_size {
            self.partition_size = size;
        }
        if let Some(min) = args.ngram_min {
            self.ngram_min = min;
        }
        if let Some(max) = args.ngram_max {
            self.ngram_max = max;
        }
        if !args.levels.is_empty() {
            self.levels = args.levels.clone();
        }
        if let Some(policy) = args.on_persistence_error {
            self.on_persistence_error = policy;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition_size == 0 {
            return Err(Error::Config("partition_size must be at least 1".to_string()));
        }
        if self.ngrams {
            if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
                return Err(Error::Config(format!(
                    "invalid n-gram orders {}..={}",
                    self.ngram_min, self.ngram_max
                )));
            }
            if self.levels.is_empty() {
                return Err(Error::Config("n-grams need at least one level".to_string()));
            }
        }
        Ok(())
    }

    pub fn orders(&self) -> RangeInclusive<usize> {
        self.ngram_min..=self.ngram_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn file_values_fill_in_defaults() {
        let config = Config::from_toml(
            r#"
            extractors = ["object-oriented", "churn"]
            partition_size = 25
            levels = ["statement"]
            on_persistence_error = "abort"
            "#,
        )
        .unwrap();
        assert_eq!(config.extractors, vec!["object-oriented", "churn"]);
        assert_eq!(config.partition_size, 25);
        assert_eq!(config.levels, vec![Level::Statement]);
        assert_eq!(config.on_persistence_error, PersistencePolicy::Abort);
        assert!(config.ngrams);
        assert_eq!(config.orders(), 1..=3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml("partitions = 3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.toml");
        fs::write(&path, "partition_size = 25\nngrams = true\n").unwrap();

        let args = Args::parse_from([
            "feature-extractor",
            "--database",
            "corpus.db",
            "--config",
            path.to_str().unwrap(),
            "--partition-size",
            "7",
            "--no-ngrams",
            "--extractor",
            "churn",
        ]);
        let config = Config::resolve(&args).unwrap();
        assert_eq!(config.partition_size, 7);
        assert!(!config.ngrams);
        assert_eq!(config.extractors, vec!["churn"]);
    }

    #[test]
    fn bad_orders_fail_validation() {
        let config = Config {
            ngram_min: 3,
            ngram_max: 2,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let zero = Config {
            partition_size: 0,
            ..Config::default()
        };
        assert!(zero.validate().is_err());
    }
}
