//! Error types for globsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or resolving plugin options.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No usable glob pattern was supplied (absent, empty, or only blank entries).
    #[error("must provide a non-empty `patterns` list to globsync")]
    MissingPatterns,

    /// Cleaning `dest` would delete the source tree itself.
    #[error("refusing to clean {dest}: it contains the source directory {dir}")]
    CleanWouldDeleteSource { dir: PathBuf, dest: PathBuf },

    /// Underlying I/O failure while reading a config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `loglevel` string that is not part of the severity enumeration.
    #[error("unknown log level '{0}'; expected: silly, verbose, info, warn, error, silent")]
    UnknownLogLevel(String),

    /// The current working directory could not be determined.
    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}
