//! Domain types shared by the sync engine, the watcher and the plugin.
//!
//! Source and destination paths inside a session are plain `String`s holding
//! POSIX-separated paths relative to the source or destination root. Absolute
//! filesystem locations use `PathBuf` and are only built at I/O time.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// LogLevel
// ---------------------------------------------------------------------------

/// Ordered logging severity, least to most severe.
///
/// `Silent` disables output entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silly,
    Verbose,
    #[default]
    Info,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    /// Map onto the tracing level filter used by the session logger.
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Silly => LevelFilter::TRACE,
            LogLevel::Verbose => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Silent => LevelFilter::OFF,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Silly => "silly",
            LogLevel::Verbose => "verbose",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silly" => Ok(LogLevel::Silly),
            "verbose" => Ok(LogLevel::Verbose),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(ConfigError::UnknownLogLevel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncEvent
// ---------------------------------------------------------------------------

/// A filesystem change for one source-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    Added(String),
    Changed(String),
    /// A file or a whole directory disappeared.
    Removed(String),
}

impl SyncEvent {
    pub fn path(&self) -> &str {
        match self {
            SyncEvent::Added(path) | SyncEvent::Changed(path) | SyncEvent::Removed(path) => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Added(_) => "add",
            SyncEvent::Changed(_) => "change",
            SyncEvent::Removed(_) => "remove",
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path())
    }
}

// ---------------------------------------------------------------------------
// PathTransform
// ---------------------------------------------------------------------------

/// User-supplied remapping from a source-relative path to a
/// destination-relative path. Must be deterministic and side-effect free.
#[derive(Clone)]
pub struct PathTransform(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl PathTransform {
    pub fn new(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, path: &str) -> String {
        (self.0)(path)
    }
}

impl fmt::Debug for PathTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PathTransform(<fn>)")
    }
}

// ---------------------------------------------------------------------------
// FileMapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MappedEntry {
    dest: String,
    seq: u64,
}

/// Live mapping from source-relative path to destination-relative path.
///
/// Every key present has been copied into the destination at its mapped path.
/// Snapshots come back in first-insertion order; re-inserting an existing key
/// keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct FileMapping {
    entries: HashMap<String, MappedEntry>,
    next_seq: u64,
}

impl FileMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `source` as synced to `dest`. Returns the previous destination, if any.
    pub fn insert(&mut self, source: impl Into<String>, dest: impl Into<String>) -> Option<String> {
        let source = source.into();
        let dest = dest.into();
        if let Some(entry) = self.entries.get_mut(&source) {
            return Some(std::mem::replace(&mut entry.dest, dest));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(source, MappedEntry { dest, seq });
        None
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(|entry| entry.dest.as_str())
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn remove(&mut self, source: &str) -> Option<String> {
        self.entries.remove(source).map(|entry| entry.dest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries equal to `path` or nested below it as a directory, in insertion order.
    pub fn entries_under(&self, path: &str) -> Vec<(String, String)> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.ordered()
            .filter(|(source, _)| *source == path || source.starts_with(&prefix))
            .map(|(source, dest)| (source.to_string(), dest.to_string()))
            .collect()
    }

    /// Point-in-time copy of every entry in insertion order.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.ordered()
            .map(|(source, dest)| (source.to_string(), dest.to_string()))
            .collect()
    }

    fn ordered(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(source, entry)| (source.as_str(), entry.dest.as_str()))
    }
}
