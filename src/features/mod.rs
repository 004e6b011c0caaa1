// src/features/mod.rs

pub mod churn;
pub mod ngram;
pub mod object_oriented;

use crate::error::Result;
use crate::model::{Commit, Version};
use crate::syntax::SyntaxTree;
use std::collections::BTreeMap;

/// Named scalar metrics computed for one version
pub type FeatureMap = BTreeMap<String, f64>;

/// Common interface for all metric extractors.
///
/// Implementations are stateless with respect to a version and are shared
/// across worker threads.
pub trait FeatureGroup: Send + Sync {
    /// Stable name used to select this group from configuration
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        commits: Option<&[Commit]>,
        version: &Version,
        tree: &SyntaxTree,
    ) -> Result<FeatureMap>;
}
