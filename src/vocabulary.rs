// src/vocabulary.rs

use crate::model::{Level, NGramTable, NGramVector};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Closed, ordered list of distinct n-grams per (level, order)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    entries: BTreeMap<(Level, usize), Vec<String>>,
}

/// Collects per-version tables and closes them into a `Vocabulary`.
///
/// Builders can be filled on different threads and merged in any order;
/// `finish` sorts contributions by version id before deduplicating, so the
/// result only depends on the set of tables.
#[derive(Debug, Default)]
pub struct VocabularyBuilder<'a> {
    contributions: Vec<(&'a str, &'a NGramTable)>,
}

impl<'a> VocabularyBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, version_id: &'a str, table: &'a NGramTable) -> Self {
        self.contributions.push((version_id, table));
        self
    }

    pub fn merge(mut self, other: VocabularyBuilder<'a>) -> Self {
        self.contributions.extend(other.contributions);
        self
    }

    pub fn finish(mut self) -> Vocabulary {
        self.contributions.sort_by(|a, b| a.0.cmp(b.0));

        let mut entries: BTreeMap<(Level, usize), Vec<String>> = BTreeMap::new();
        let mut seen: BTreeMap<(Level, usize), HashSet<&str>> = BTreeMap::new();
        for (_, table) in &self.contributions {
            for (&level, orders) in &table.levels {
                for (&order, counts) in orders {
                    let list = entries.entry((level, order)).or_default();
                    let seen = seen.entry((level, order)).or_default();
                    for key in counts.keys() {
                        if seen.insert(key.as_str()) {
                            list.push(key.clone());
                        }
                    }
                }
            }
        }
        Vocabulary { entries }
    }
}

impl Vocabulary {
    /// Map-then-reduce over all tables of a corpus run
    pub fn build<'a, I>(tables: I) -> Vocabulary
    where
        I: IntoParallelIterator<Item = (&'a str, &'a NGramTable)>,
    {
        tables
            .into_par_iter()
            .fold(VocabularyBuilder::new, |builder, (id, table)| builder.add(id, table))
            .reduce(VocabularyBuilder::new, VocabularyBuilder::merge)
            .finish()
    }

    #[cfg(test)]
    pub fn get(&self, level: Level, order: usize) -> &[String] {
        self.entries
            .get(&(level, order))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of n-grams over every (level, order)
    pub fn size(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Dense count vectors of one version, one per (level, order) in the vocabulary
    pub fn encode(&self, version_id: &str, table: &NGramTable) -> Vec<NGramVector> {
        self.entries
            .iter()
            .map(|(&(level, order), keys)| {
                let counts: Vec<u64> = match table.counts(level, order) {
                    Some(found) => keys
                        .iter()
                        .map(|k| found.get(k).copied().unwrap_or(0))
                        .collect(),
                    None => vec![0; keys.len()],
                };
                NGramVector {
                    version_id: version_id.to_string(),
                    level,
                    order,
                    vocabulary_size: keys.len(),
                    counts,
                }
            })
            .collect()
    }
}
