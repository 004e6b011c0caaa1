// src/orchestrator.rs

use crate::config::PersistencePolicy;
use crate::error::{Error, Result};
use crate::features::ngram::NGramExtractor;
use crate::features::FeatureGroup;
use crate::model::{Commit, FeatureValue, NGramTable, Version, VersionId};
use crate::source::SourceProvider;
use crate::store::Store;
use crate::syntax::{self, SyntaxTree};
use crate::vocabulary::Vocabulary;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

pub const NGRAM_EXTRACTOR: &str = "ngram";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorStats {
    pub processed: usize,
    pub skipped: usize,
}

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub versions_processed: usize,
    pub versions_skipped: usize,
    pub extractors: BTreeMap<String, ExtractorStats>,
    pub failed_partitions: usize,
    pub partition_errors: Vec<String>,
    pub vocabulary_size: usize,
    pub vectors_written: usize,
}

impl RunSummary {
    fn record(&mut self, extractor: &str, processed: bool) {
        let stats = self.extractors.entry(extractor.to_string()).or_default();
        if processed {
            stats.processed += 1;
        } else {
            stats.skipped += 1;
        }
    }

    fn merge(&mut self, other: RunSummary) {
        self.versions_processed += other.versions_processed;
        self.versions_skipped += other.versions_skipped;
        for (name, stats) in other.extractors {
            let mine = self.extractors.entry(name).or_default();
            mine.processed += stats.processed;
            mine.skipped += stats.skipped;
        }
        self.failed_partitions += other.failed_partitions;
        self.partition_errors.extend(other.partition_errors);
        self.vectors_written += other.vectors_written;
    }

    fn fail_partition(&mut self, index: usize, err: &Error) {
        self.failed_partitions += 1;
        self.partition_errors.push(format!("partition {index}: {err}"));
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Versions: {} processed, {} skipped.",
            self.versions_processed, self.versions_skipped
        )?;
        for (name, stats) in &self.extractors {
            writeln!(f, "  {name}: {} processed, {} skipped", stats.processed, stats.skipped)?;
        }
        if self.vocabulary_size > 0 || self.vectors_written > 0 {
            writeln!(
                f,
                "Vocabulary of {} n-grams, {} vectors written.",
                self.vocabulary_size, self.vectors_written
            )?;
        }
        if self.failed_partitions > 0 {
            writeln!(f, "{} partition(s) rolled back:", self.failed_partitions)?;
            for e in &self.partition_errors {
                writeln!(f, "  {e}")?;
            }
        }
        Ok(())
    }
}

/// State of one corpus run carried across the phase barrier
#[derive(Debug, Default)]
pub struct CorpusRun {
    pub tables: Vec<(VersionId, NGramTable)>,
    pub summary: RunSummary,
}

#[derive(Default)]
struct PartitionOutcome {
    tables: Vec<(VersionId, NGramTable)>,
    summary: RunSummary,
}

/// Two-phase extraction over a corpus of versions.
///
/// Phase 1 runs every metric extractor and builds n-gram tables, one
/// partition per worker and one transaction per partition. Only after every
/// partition has returned is the vocabulary closed; phase 2 then encodes and
/// stores the vectors, partitioned the same way.
pub struct Orchestrator<'a> {
    pub source: &'a dyn SourceProvider,
    pub store: &'a Store,
    pub groups: &'a [Box<dyn FeatureGroup>],
    pub ngrams: Option<&'a NGramExtractor>,
    pub partition_size: usize,
    pub policy: PersistencePolicy,
}

impl Orchestrator<'_> {
    pub fn run(&self, versions: &[Version], commits: &[Commit]) -> Result<RunSummary> {
        let corpus = self.extract_all(versions, commits)?;

        // Barrier: every partition of phase 1 has returned at this point.
        let CorpusRun { tables, mut summary } = corpus;
        if self.ngrams.is_some() {
            let vocabulary = Vocabulary::build(tables.par_iter().map(|(id, t)| (id.as_str(), t)));
            info!(size = vocabulary.size(), "vocabulary closed");
            summary.vocabulary_size = vocabulary.size();
            summary.merge(self.encode_all(&tables, &vocabulary)?);
        }
        Ok(summary)
    }

    /// Phase 1: metrics are persisted per partition, n-gram tables are returned
    pub fn extract_all(&self, versions: &[Version], commits: &[Commit]) -> Result<CorpusRun> {
        let partitions: Vec<&[Version]> = versions.chunks(self.partition_size.max(1)).collect();
        info!(
            versions = versions.len(),
            partitions = partitions.len(),
            "extracting features"
        );

        let bar = ProgressBar::new(partitions.len() as u64);
        bar.set_message("Extracting features");
        let aborted = AtomicBool::new(false);

        let results: Vec<Option<Result<PartitionOutcome>>> = partitions
            .par_iter()
            .progress_with(bar.clone())
            .map(|partition| {
                if aborted.load(Ordering::SeqCst) {
                    return None;
                }
                let result = self.extract_partition(partition, commits);
                if result.is_err() && self.policy == PersistencePolicy::Abort {
                    aborted.store(true, Ordering::SeqCst);
                }
                Some(result)
            })
            .collect();
        bar.finish_with_message("Extraction complete");

        let mut corpus = CorpusRun::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(outcome)) => {
                    corpus.tables.extend(outcome.tables);
                    corpus.summary.merge(outcome.summary);
                }
                Some(Err(e)) => {
                    error!(partition = index, error = %e, "partition rolled back");
                    if self.policy == PersistencePolicy::Abort {
                        return Err(e);
                    }
                    corpus.summary.fail_partition(index, &e);
                }
                None => debug!(partition = index, "partition not started after abort"),
            }
        }
        Ok(corpus)
    }

    fn extract_partition(&self, partition: &[Version], commits: &[Commit]) -> Result<PartitionOutcome> {
        let mut outcome = PartitionOutcome::default();
        let mut pending: Vec<FeatureValue> = Vec::new();

        for version in partition {
            let tree = match self.load(version) {
                Ok(tree) => tree,
                Err(e) => {
                    warn!(
                        version = %version.id,
                        path = %version.path,
                        commit = %version.commit_id,
                        error = %e,
                        "skipping version"
                    );
                    outcome.summary.versions_skipped += 1;
                    for group in self.groups {
                        outcome.summary.record(group.name(), false);
                    }
                    if self.ngrams.is_some() {
                        outcome.summary.record(NGRAM_EXTRACTOR, false);
                    }
                    continue;
                }
            };

            for group in self.groups {
                match group.extract(Some(commits), version, &tree) {
                    Ok(features) => {
                        pending.extend(features.into_iter().map(|(feature_id, value)| FeatureValue {
                            feature_id,
                            version_id: version.id.clone(),
                            value,
                        }));
                        outcome.summary.record(group.name(), true);
                    }
                    Err(e) if e.is_recoverable_for_version() => {
                        warn!(
                            extractor = group.name(),
                            version = %version.id,
                            path = %version.path,
                            commit = %version.commit_id,
                            error = %e,
                            "skipping extractor for version"
                        );
                        outcome.summary.record(group.name(), false);
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Some(ngrams) = self.ngrams {
                outcome.tables.push((version.id.clone(), ngrams.extract(&tree)));
                outcome.summary.record(NGRAM_EXTRACTOR, true);
            }
            outcome.summary.versions_processed += 1;
        }

        // One transaction for the whole partition; any failed upsert rolls back all of it.
        let mut session = self.store.session()?;
        let tx = session.begin()?;
        for value in &pending {
            tx.upsert_feature_value(&value.feature_id, &value.version_id, value.value)?;
        }
        tx.commit()?;
        debug!(values = pending.len(), "partition committed");
        Ok(outcome)
    }

    fn load(&self, version: &Version) -> Result<SyntaxTree> {
        if version.deleted {
            return Err(Error::SourceRetrieval {
                path: version.path.clone(),
                commit: version.commit_id.clone(),
                reason: "file is deleted in this version".to_string(),
            });
        }
        let code = self.source.source_code(&version.path, &version.commit_id)?;
        syntax::parse(code)
    }

    /// Phase 2: every table is encoded against the same closed vocabulary
    pub fn encode_all(
        &self,
        tables: &[(VersionId, NGramTable)],
        vocabulary: &Vocabulary,
    ) -> Result<RunSummary> {
        let partitions: Vec<&[(VersionId, NGramTable)]> =
            tables.chunks(self.partition_size.max(1)).collect();

        let bar = ProgressBar::new(partitions.len() as u64);
        bar.set_message("Encoding n-gram vectors");
        let aborted = AtomicBool::new(false);

        let results: Vec<Option<Result<usize>>> = partitions
            .par_iter()
            .progress_with(bar.clone())
            .map(|partition| {
                if aborted.load(Ordering::SeqCst) {
                    return None;
                }
                let result = self.encode_partition(partition, vocabulary);
                if result.is_err() && self.policy == PersistencePolicy::Abort {
                    aborted.store(true, Ordering::SeqCst);
                }
                Some(result)
            })
            .collect();
        bar.finish_with_message("Encoding complete");

        let mut summary = RunSummary::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(written)) => summary.vectors_written += written,
                Some(Err(e)) => {
                    error!(partition = index, error = %e, "vector partition rolled back");
                    if self.policy == PersistencePolicy::Abort {
                        return Err(e);
                    }
                    summary.fail_partition(index, &e);
                }
                None => debug!(partition = index, "vector partition not started after abort"),
            }
        }
        Ok(summary)
    }

    fn encode_partition(
        &self,
        partition: &[(VersionId, NGramTable)],
        vocabulary: &Vocabulary,
    ) -> Result<usize> {
        let mut session = self.store.session()?;
        let tx = session.begin()?;
        let mut written = 0;
        for (version_id, table) in partition {
            for vector in vocabulary.encode(version_id, table) {
                tx.upsert_ngram_vector(&vector)?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}
