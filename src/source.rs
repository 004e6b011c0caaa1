// src/source.rs

use crate::error::{Error, Result};
use git2::{Oid, Repository};
use std::path::Path;
use std::sync::Mutex;

/// Resolves the source text of a path as of a given commit
pub trait SourceProvider: Sync {
    fn source_code(&self, path: &str, commit_id: &str) -> Result<Vec<u8>>;
}

/// Reads historical file contents out of a git object database
pub struct GitSource {
    repo: Mutex<Repository>,
}

impl GitSource {
    pub fn open(repo_path: &Path) -> Result<Self> {
        let repo = Repository::open(repo_path).map_err(|source| Error::Repository {
            path: repo_path.display().to_string(),
            source,
        })?;
        Ok(Self { repo: Mutex::new(repo) })
    }
}

impl SourceProvider for GitSource {
    fn source_code(&self, path: &str, commit_id: &str) -> Result<Vec<u8>> {
        let retrieval_error = |reason: String| Error::SourceRetrieval {
            path: path.to_string(),
            commit: commit_id.to_string(),
            reason,
        };

        let oid = Oid::from_str(commit_id).map_err(|e| retrieval_error(e.to_string()))?;
        let repo = self
            .repo
            .lock()
            .map_err(|_| retrieval_error("repository lock poisoned".to_string()))?;

        let commit = repo.find_commit(oid).map_err(|e| retrieval_error(e.to_string()))?;
        let tree = commit.tree().map_err(|e| retrieval_error(e.to_string()))?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|e| retrieval_error(e.to_string()))?;
        let blob = repo
            .find_blob(entry.id())
            .map_err(|e| retrieval_error(e.to_string()))?;

        Ok(blob.content().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn commit_file(repo: &Repository, name: &str, content: &[u8]) -> Oid {
        let sig = Signature::now("Ada", "ada@example.com").unwrap();
        let blob = repo.blob(content).unwrap();
        let mut builder = repo.treebuilder(None).unwrap();
        builder.insert(name, blob, 0o100644).unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn reads_file_as_of_each_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = commit_file(&repo, "A.java", b"class A {}");
        let second = commit_file(&repo, "A.java", b"class A { void m() {} }");

        let source = GitSource::open(dir.path()).unwrap();
        assert_eq!(
            source.source_code("A.java", &first.to_string()).unwrap(),
            b"class A {}"
        );
        assert_eq!(
            source.source_code("A.java", &second.to_string()).unwrap(),
            b"class A { void m() {} }"
        );
    }

    #[test]
    fn missing_path_is_a_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let oid = commit_file(&repo, "A.java", b"class A {}");

        let source = GitSource::open(dir.path()).unwrap();
        let err = source.source_code("B.java", &oid.to_string()).unwrap_err();
        assert!(matches!(err, Error::SourceRetrieval { .. }));
        assert!(err.is_recoverable_for_version());
    }

    #[test]
    fn unreadable_repository_is_a_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitSource::open(&dir.path().join("nope")).err().unwrap();
        assert!(matches!(err, Error::Repository { .. }));
    }
}
