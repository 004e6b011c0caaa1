// src/model.rs

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Uniquely identifies a version row
pub type VersionId = String;

/// One revision of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub id: VersionId,
    pub path: String,
    pub commit_id: String,
    pub deleted: bool,
}

/// A commit and the paths it touched, used as context by extractors
#[derive(Debug, Clone)]
pub struct Commit {
    pub id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub paths: Vec<String>,
}

/// A single scalar feature of a version, keyed by (feature_id, version_id)
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureValue {
    pub feature_id: String,
    pub version_id: VersionId,
    pub value: f64,
}

/// Structural scope an n-gram sequence is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Direct statements of each method or constructor body
    Statement,
    /// Member declarations of each type body
    Member,
    /// Pre-order walk over every named node in the file
    Node,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Statement, Level::Member, Level::Node];

    /// Stable integer code used in persisted rows
    pub fn code(self) -> i64 {
        match self {
            Level::Statement => 0,
            Level::Member => 1,
            Level::Node => 2,
        }
    }

    #[cfg(test)]
    pub fn from_code(code: i64) -> Option<Level> {
        Level::ALL.into_iter().find(|l| l.code() == code)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Statement => "statement",
            Level::Member => "member",
            Level::Node => "node",
        };
        f.write_str(name)
    }
}

/// Maps an n-gram key to its occurrence count
pub type NGramCounts = BTreeMap<String, u64>;

/// Per-version n-gram frequencies: level -> order -> key -> count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NGramTable {
    pub levels: BTreeMap<Level, BTreeMap<usize, NGramCounts>>,
}

impl NGramTable {
    pub fn counts(&self, level: Level, order: usize) -> Option<&NGramCounts> {
        self.levels.get(&level).and_then(|orders| orders.get(&order))
    }

    #[cfg(test)]
    pub fn count(&self, level: Level, order: usize, key: &str) -> u64 {
        self.counts(level, order)
            .and_then(|counts| counts.get(key).copied())
            .unwrap_or(0)
    }

    /// Ensures the (level, order) sub-table exists, even if it stays empty
    pub fn entry(&mut self, level: Level, order: usize) -> &mut NGramCounts {
        self.levels.entry(level).or_default().entry(order).or_default()
    }
}

/// A version's counts laid out in vocabulary order for one (level, order)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NGramVector {
    pub version_id: VersionId,
    pub level: Level,
    pub order: usize,
    pub vocabulary_size: usize,
    pub counts: Vec<u64>,
}
