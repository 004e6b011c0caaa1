// src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("repository {path} could not be read: {source}")]
    Repository {
        path: String,
        #[source]
        source: git2::Error,
    },

    #[error("store error: {0}")]
    Store(#[source] rusqlite::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not read {path} at {commit}: {reason}")]
    SourceRetrieval {
        path: String,
        commit: String,
        reason: String,
    },

    #[error("source could not be parsed: {0}")]
    Parse(String),

    #[error("unexpected syntax tree shape: {0}")]
    TreeShape(String),

    #[error("missing extractor context: {0}")]
    MissingContext(&'static str),

    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("feature group {name} could not be resolved: {reason}")]
    PluginResolution { name: String, reason: String },
}

impl Error {
    /// Errors that skip a single version or extractor instead of a partition or the run
    pub fn is_recoverable_for_version(&self) -> bool {
        matches!(
            self,
            Error::SourceRetrieval { .. }
                | Error::Parse(_)
                | Error::TreeShape(_)
                | Error::MissingContext(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
