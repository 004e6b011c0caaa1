// src/features/churn.rs

use super::{FeatureGroup, FeatureMap};
use crate::error::{Error, Result};
use crate::model::{Commit, Version};
use crate::syntax::SyntaxTree;
use std::collections::HashSet;

pub const NAME: &str = "churn";

/// Revision and author counts for a file up to the version's commit
pub struct ChurnFeatureGroup;

impl FeatureGroup for ChurnFeatureGroup {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract(
        &self,
        commits: Option<&[Commit]>,
        version: &Version,
        _tree: &SyntaxTree,
    ) -> Result<FeatureMap> {
        let commits = commits.ok_or(Error::MissingContext("churn needs the commit history"))?;
        // History is ordered by (timestamp, id), so the prefix ends at this version's commit.
        let current = commits
            .iter()
            .position(|c| c.id == version.commit_id)
            .ok_or(Error::MissingContext("version's commit is not in the history"))?;

        let touching: Vec<&Commit> = commits[..=current]
            .iter()
            .filter(|c| c.paths.iter().any(|p| *p == version.path))
            .collect();
        let authors: HashSet<&str> = touching.iter().map(|c| c.author.as_str()).collect();

        let mut features = FeatureMap::new();
        features.insert("NREV".to_string(), touching.len() as f64);
        features.insert("NAUTH".to_string(), authors.len() as f64);
        Ok(features)
    }
}
