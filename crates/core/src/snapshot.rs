//! Flat key/value snapshots, pushed once per control cycle.
//!
//! A [`FlatSnapshot`] is an ordered map of string keys to string values with
//! a mandatory `version` key. Entities encode themselves into one; a
//! [`SnapshotStore`] only moves whole snapshots in and out of storage.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key holding the snapshot format version.
pub const VERSION_KEY: &str = "version";

/// Snapshot encode/decode and storage errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Required key absent
    #[error("Snapshot is missing key: {0}")]
    MissingKey(String),

    /// Snapshot written by an incompatible format version
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    Version {
        /// Version found in the snapshot
        found: String,
        /// Version this build reads
        expected: u32,
    },

    /// Value present but unreadable
    #[error("Malformed snapshot value for {key}: {reason}")]
    Malformed {
        /// Offending key
        key: String,
        /// Decoder message
        reason: String,
    },

    /// Line-format parse error
    #[error("Malformed snapshot line {line}: {content:?}")]
    MalformedLine {
        /// 1-based line number
        line: usize,
        /// Raw line
        content: String,
    },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database errors
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Ordered string key/value snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatSnapshot {
    entries: BTreeMap<String, String>,
}

impl FlatSnapshot {
    /// Empty snapshot stamped with `version`.
    pub fn new(version: u32) -> Self {
        let mut snapshot = Self::default();
        snapshot.insert(VERSION_KEY, version.to_string());
        snapshot
    }

    /// Set a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Set a JSON-encoded value.
    pub fn insert_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SnapshotError> {
        self.insert(key, serde_json::to_string(value)?);
        Ok(())
    }

    /// Raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Raw value or [`SnapshotError::MissingKey`].
    pub fn require(&self, key: &str) -> Result<&str, SnapshotError> {
        self.get(key)
            .ok_or_else(|| SnapshotError::MissingKey(key.to_string()))
    }

    /// Decode a JSON-encoded value.
    pub fn require_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, SnapshotError> {
        let raw = self.require(key)?;
        serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a value with `FromStr`.
    pub fn require_parsed<T>(&self, key: &str) -> Result<T, SnapshotError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require(key)?;
        raw.parse().map_err(|e: T::Err| SnapshotError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fail unless the snapshot carries exactly `expected`.
    pub fn check_version(&self, expected: u32) -> Result<(), SnapshotError> {
        let found = self.require(VERSION_KEY)?;
        if found.parse::<u32>().ok() == Some(expected) {
            Ok(())
        } else {
            Err(SnapshotError::Version {
                found: found.to_string(),
                expected,
            })
        }
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries, including the version.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing, not even a version, is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `key=value` lines.
    pub fn to_lines(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect()
    }

    /// Parse `key=value` lines. Blank lines are skipped.
    pub fn from_lines(text: &str) -> Result<Self, SnapshotError> {
        let mut snapshot = Self::default();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| SnapshotError::MalformedLine {
                    line: index + 1,
                    content: line.to_string(),
                })?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }
}

/// Somewhere to push one snapshot per cycle and read it back at startup.
pub trait SnapshotStore: Send {
    /// Replace the stored snapshot.
    fn save(&mut self, snapshot: &FlatSnapshot) -> Result<(), SnapshotError>;

    /// Latest stored snapshot, if any.
    fn load(&self) -> Result<Option<FlatSnapshot>, SnapshotError>;
}

/// In-process store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<FlatSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, snapshot: &FlatSnapshot) -> Result<(), SnapshotError> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<FlatSnapshot>, SnapshotError> {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        Ok(slot.clone())
    }
}

/// SQLite-backed store holding a single `snapshot(key, value)` table.
#[cfg(feature = "sqlite")]
pub struct SqliteSnapshotStore {
    conn: rusqlite::Connection,
}

#[cfg(feature = "sqlite")]
impl SqliteSnapshotStore {
    /// Open (or create) the store at `path`.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Snapshot store opened");
        Self::with_connection(conn)
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self, SnapshotError> {
        Self::with_connection(rusqlite::Connection::open_in_memory()?)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self, SnapshotError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshot (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

#[cfg(feature = "sqlite")]
impl SnapshotStore for SqliteSnapshotStore {
    fn save(&mut self, snapshot: &FlatSnapshot) -> Result<(), SnapshotError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM snapshot", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO snapshot (key, value) VALUES (?1, ?2)")?;
            for (key, value) in snapshot.iter() {
                stmt.execute(rusqlite::params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load(&self) -> Result<Option<FlatSnapshot>, SnapshotError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM snapshot")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = FlatSnapshot::default();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(if snapshot.is_empty() { None } else { Some(snapshot) })
    }
}
