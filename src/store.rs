// src/store.rs

use crate::error::{Error, Result};
#[cfg(test)]
use crate::model::{FeatureValue, Level};
use crate::model::{Commit, NGramVector, Version};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS commits (
    id TEXT PRIMARY KEY,
    repository_id TEXT NOT NULL REFERENCES repositories(id),
    author TEXT NOT NULL,
    committed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS versions (
    id TEXT PRIMARY KEY,
    commit_id TEXT NOT NULL REFERENCES commits(id),
    path TEXT NOT NULL,
    deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS feature_values (
    feature_id TEXT NOT NULL,
    version_id TEXT NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (feature_id, version_id)
);

CREATE TABLE IF NOT EXISTS ngram_vectors (
    version_id TEXT NOT NULL,
    level INTEGER NOT NULL,
    n INTEGER NOT NULL,
    vocabulary_size INTEGER NOT NULL,
    counts TEXT NOT NULL,
    PRIMARY KEY (version_id, level, n)
);

CREATE INDEX IF NOT EXISTS idx_versions_commit ON versions(commit_id);
CREATE INDEX IF NOT EXISTS idx_commits_repository ON commits(repository_id);
";

/// Handle on the SQLite database holding the corpus and extracted features
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
        };
        let conn = store.connect().map_err(Error::Store)?;
        conn.execute_batch(SCHEMA).map_err(Error::Store)?;
        Ok(store)
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Ok(conn)
    }

    /// Opens a dedicated connection for one partition
    pub fn session(&self) -> Result<Session> {
        Ok(Session {
            conn: self.connect()?,
        })
    }

    pub fn repository_url(&self, name: &str) -> Result<Option<String>> {
        let conn = self.connect().map_err(Error::Store)?;
        conn.query_row(
            "SELECT url FROM repositories WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::Store)
    }

    /// All versions, optionally restricted to one repository, ordered by id
    pub fn versions(&self, repository: Option<&str>) -> Result<Vec<Version>> {
        let conn = self.connect().map_err(Error::Store)?;
        let mut stmt = conn
            .prepare(
                "SELECT v.id, v.path, v.commit_id, v.deleted
                 FROM versions v
                 JOIN commits c ON c.id = v.commit_id
                 JOIN repositories r ON r.id = c.repository_id
                 WHERE ?1 IS NULL OR r.name = ?1
                 ORDER BY v.id",
            )
            .map_err(Error::Store)?;

        let rows = stmt
            .query_map([repository], |row| {
                Ok(Version {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    commit_id: row.get(2)?,
                    deleted: row.get(3)?,
                })
            })
            .map_err(Error::Store)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::Store)
    }

    /// Commits with the paths they touched, oldest first
    pub fn commits(&self, repository: Option<&str>) -> Result<Vec<Commit>> {
        let conn = self.connect().map_err(Error::Store)?;

        let mut paths: HashMap<String, Vec<String>> = HashMap::new();
        {
            let mut stmt = conn
                .prepare("SELECT commit_id, path FROM versions ORDER BY path")
                .map_err(Error::Store)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
                .map_err(Error::Store)?;
            for row in rows {
                let (commit_id, path) = row.map_err(Error::Store)?;
                paths.entry(commit_id).or_default().push(path);
            }
        }

        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.author, c.committed_at
                 FROM commits c
                 JOIN repositories r ON r.id = c.repository_id
                 WHERE ?1 IS NULL OR r.name = ?1
                 ORDER BY c.committed_at, c.id",
            )
            .map_err(Error::Store)?;
        let rows = stmt
            .query_map([repository], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, DateTime<Utc>>(2)?,
                ))
            })
            .map_err(Error::Store)?;

        let mut commits = Vec::new();
        for row in rows {
            let (id, author, timestamp) = row.map_err(Error::Store)?;
            let paths = paths.remove(&id).unwrap_or_default();
            commits.push(Commit {
                id,
                author,
                timestamp,
                paths,
            });
        }
        Ok(commits)
    }

    #[cfg(test)]
    pub fn feature_values(&self) -> Result<Vec<FeatureValue>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT feature_id, version_id, value FROM feature_values
             ORDER BY version_id, feature_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FeatureValue {
                feature_id: row.get(0)?,
                version_id: row.get(1)?,
                value: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    #[cfg(test)]
    pub fn ngram_vectors(&self) -> Result<Vec<NGramVector>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT version_id, level, n, vocabulary_size, counts FROM ngram_vectors
             ORDER BY version_id, level, n",
        )?;
        let rows = stmt.query_map([], |row| {
            let level: i64 = row.get(1)?;
            let counts: String = row.get(4)?;
            Ok(NGramVector {
                version_id: row.get(0)?,
                level: Level::from_code(level).ok_or(rusqlite::Error::IntegralValueOutOfRange(1, level))?,
                order: row.get::<_, i64>(2)? as usize,
                vocabulary_size: row.get::<_, i64>(3)? as usize,
                counts: serde_json::from_str(&counts).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
                })?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// A connection owned by exactly one partition
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Takes the write lock up front so parallel partitions queue on the busy timeout
    pub fn begin(&mut self) -> Result<PartitionTx<'_>> {
        Ok(PartitionTx {
            tx: self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?,
        })
    }
}

/// All writes of one partition; dropped without `commit` it rolls back
pub struct PartitionTx<'s> {
    tx: Transaction<'s>,
}

impl PartitionTx<'_> {
    pub fn upsert_feature_value(&self, feature_id: &str, version_id: &str, value: f64) -> Result<()> {
        self.tx.execute(
            "INSERT INTO feature_values (feature_id, version_id, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (feature_id, version_id) DO UPDATE SET value = excluded.value",
            params![feature_id, version_id, value],
        )?;
        Ok(())
    }

    pub fn upsert_ngram_vector(&self, vector: &NGramVector) -> Result<()> {
        let counts = serde_json::to_string(&vector.counts)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        self.tx.execute(
            "INSERT INTO ngram_vectors (version_id, level, n, vocabulary_size, counts)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (version_id, level, n) DO UPDATE SET
                 vocabulary_size = excluded.vocabulary_size,
                 counts = excluded.counts",
            params![
                vector.version_id,
                vector.level.code(),
                vector.order as i64,
                vector.vocabulary_size as i64,
                counts
            ],
        )?;
        Ok(())
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn fail_inserts(store: &Store, table: &str, version_id: &str) {
        let conn = store.connect().unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_{table}_{version_id} BEFORE INSERT ON {table}
             WHEN NEW.version_id = '{version_id}'
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"
        ))
        .unwrap();
    }

    /// Makes every feature value write for `version_id` fail
    pub(crate) fn fail_writes_for(store: &Store, version_id: &str) {
        fail_inserts(store, "feature_values", version_id);
    }

    /// Makes every n-gram vector write for `version_id` fail
    pub(crate) fn fail_vector_writes_for(store: &Store, version_id: &str) {
        fail_inserts(store, "ngram_vectors", version_id);
    }

    /// Seeds one repository with the given (version id, commit id, path) rows
    pub(crate) fn seed(store: &Store, versions: &[(&str, &str, &str)]) {
        let conn = store.connect().unwrap();
        conn.execute(
            "INSERT INTO repositories (id, name, url) VALUES ('r1', 'demo', '/tmp/demo')",
            [],
        )
        .unwrap();
        for (i, (version_id, commit_id, path)) in versions.iter().enumerate() {
            let at = DateTime::<Utc>::from_timestamp(1_700_000_000 + i as i64, 0).unwrap();
            conn.execute(
                "INSERT OR IGNORE INTO commits (id, repository_id, author, committed_at)
                 VALUES (?1, 'r1', 'ada', ?2)",
                params![commit_id, at],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO versions (id, commit_id, path, deleted) VALUES (?1, ?2, ?3, 0)",
                params![version_id, commit_id, path],
            )
            .unwrap();
        }
    }

    #[test]
    fn lists_versions_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("corpus.db")).unwrap();
        seed(
            &store,
            &[("v2", "c1", "B.java"), ("v1", "c1", "A.java"), ("v3", "c2", "A.java")],
        );

        let ids: Vec<String> = store.versions(Some("demo")).unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert!(store.versions(Some("other")).unwrap().is_empty());
        assert_eq!(store.repository_url("demo").unwrap().as_deref(), Some("/tmp/demo"));

        let commits = store.commits(None).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].paths, vec!["A.java", "B.java"]);
    }

    #[test]
    fn feature_upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("corpus.db")).unwrap();
        let mut session = store.session().unwrap();

        for _ in 0..2 {
            let tx = session.begin().unwrap();
            tx.upsert_feature_value("WMC", "v1", 3.0).unwrap();
            tx.commit().unwrap();
        }
        let tx = session.begin().unwrap();
        tx.upsert_feature_value("WMC", "v1", 5.0).unwrap();
        tx.commit().unwrap();

        let rows = store.feature_values().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 5.0);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("corpus.db")).unwrap();
        let mut session = store.session().unwrap();
        {
            let tx = session.begin().unwrap();
            tx.upsert_feature_value("WMC", "v1", 3.0).unwrap();
        }
        assert!(store.feature_values().unwrap().is_empty());
    }

    #[test]
    fn vectors_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("corpus.db")).unwrap();
        let mut session = store.session().unwrap();
        let vector = NGramVector {
            version_id: "v1".into(),
            level: Level::Member,
            order: 2,
            vocabulary_size: 3,
            counts: vec![0, 4, 1],
        };
        let tx = session.begin().unwrap();
        tx.upsert_ngram_vector(&vector).unwrap();
        tx.upsert_ngram_vector(&vector).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.ngram_vectors().unwrap(), vec![vector]);
    }
}
