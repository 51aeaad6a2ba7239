//! Plugin options.
//!
//! [`Options`] is what a user writes (in code or in `globsync.yaml`);
//! [`Options::resolve`] turns it into [`ResolvedOptions`] with every default
//! filled in, absolute directories and the effective log level / watch mode.
//!
//! ```yaml
//! patterns:
//!   - "*.txt"
//!   - ["images/**", "!images/raw/**"]
//! dest: ./dist
//! clean: ["*.map"]
//! manifest:
//!   module: assets
//!   file: assets.json
//! loglevel: verbose
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::env::EnvReader;
use crate::error::ConfigError;
use crate::paths::{absolutize, slash};
use crate::types::{LogLevel, PathTransform};

/// Conventional config file name looked up by the CLI.
pub const CONFIG_FILE: &str = "globsync.yaml";

/// Default destination root, relative to the working directory.
pub const DEFAULT_DEST: &str = "./dist";

/// Module name used when `manifest: true`.
pub const DEFAULT_MANIFEST_MODULE: &str = "manifest";

// ---------------------------------------------------------------------------
// Raw option shapes
// ---------------------------------------------------------------------------

/// One entry of a pattern list: a glob, or a nested list of globs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PatternInput {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for PatternInput {
    fn from(s: &str) -> Self {
        Self::One(s.to_owned())
    }
}

impl From<String> for PatternInput {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<&str>> for PatternInput {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(str::to_owned).collect())
    }
}

/// Flatten one nesting level, drop blank entries and normalize separators.
pub fn flatten_patterns(inputs: &[PatternInput]) -> Vec<String> {
    inputs
        .iter()
        .flat_map(|input| match input {
            PatternInput::One(glob) => std::slice::from_ref(glob).iter(),
            PatternInput::Many(globs) => globs.iter(),
        })
        .map(|glob| glob.trim())
        .filter(|glob| !glob.is_empty())
        .map(slash)
        .collect()
}

/// `clean` as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CleanOption {
    Enabled(bool),
    Globs(Vec<PatternInput>),
}

impl Default for CleanOption {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

/// `manifest` as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ManifestOption {
    Enabled(bool),
    Module(String),
    Targets(ManifestTargets),
}

impl Default for ManifestOption {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

/// Where the manifest is published: an importable module id, an emitted
/// file name, both, or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestTargets {
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

impl ManifestTargets {
    pub fn is_enabled(&self) -> bool {
        self.module.is_some() || self.file.is_some()
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// User-facing plugin options. Every field but `patterns` has a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Globs selecting the files to copy. `globs` is accepted as an alias.
    #[serde(alias = "globs", deserialize_with = "one_or_many")]
    pub patterns: Vec<PatternInput>,
    /// Copy target root (default `./dist`).
    pub dest: Option<PathBuf>,
    /// Copy source root (default: working directory).
    pub dir: Option<PathBuf>,
    pub clean: CleanOption,
    #[serde(skip)]
    pub transform: Option<PathTransform>,
    pub manifest: ManifestOption,
    /// Forces `verbose` logging, overriding `loglevel`.
    pub verbose: bool,
    pub loglevel: LogLevel,
    /// Forces watch mode; when absent the environment decides.
    pub watching: Option<bool>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PatternInput>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<PatternInput>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(glob)) => vec![PatternInput::One(glob)],
        Some(OneOrMany::Many(list)) => list,
        None => Vec::new(),
    })
}

impl Options {
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PatternInput>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse options from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn clean(mut self, clean: CleanOption) -> Self {
        self.clean = clean;
        self
    }

    pub fn transform(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.transform = Some(PathTransform::new(f));
        self
    }

    pub fn manifest(mut self, manifest: ManifestOption) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn loglevel(mut self, level: LogLevel) -> Self {
        self.loglevel = level;
        self
    }

    pub fn watching(mut self, watching: bool) -> Self {
        self.watching = Some(watching);
        self
    }

    /// Fill in defaults. `cwd` anchors relative `dir`/`dest` and is the
    /// default source root; `env` decides watch mode when `watching` is unset.
    ///
    /// Fails with [`ConfigError::MissingPatterns`] before touching the filesystem,
    /// and with [`ConfigError::CleanWouldDeleteSource`] when a cleaning policy
    /// would reach into `dir`.
    pub fn resolve(self, env: &dyn EnvReader, cwd: &Path) -> Result<ResolvedOptions, ConfigError> {
        if flatten_patterns(&self.patterns).is_empty() {
            return Err(ConfigError::MissingPatterns);
        }

        let dir = match &self.dir {
            Some(dir) => absolutize(dir, cwd),
            None => absolutize(cwd, cwd),
        };
        let dest = absolutize(
            self.dest.as_deref().unwrap_or_else(|| Path::new(DEFAULT_DEST)),
            cwd,
        );

        let clean = match &self.clean {
            CleanOption::Enabled(false) => CleanPolicy::Skip,
            CleanOption::Enabled(true) => CleanPolicy::All,
            CleanOption::Globs(globs) => {
                let globs = flatten_patterns(globs);
                if globs.is_empty() {
                    CleanPolicy::Skip
                } else {
                    CleanPolicy::Globs(globs)
                }
            }
        };

        if clean != CleanPolicy::Skip && dir.starts_with(&dest) {
            return Err(ConfigError::CleanWouldDeleteSource { dir, dest });
        }

        let manifest = match self.manifest {
            ManifestOption::Enabled(false) => ManifestTargets::default(),
            ManifestOption::Enabled(true) => ManifestTargets {
                module: Some(DEFAULT_MANIFEST_MODULE.to_string()),
                file: None,
            },
            ManifestOption::Module(module) => ManifestTargets {
                module: Some(module),
                file: None,
            },
            ManifestOption::Targets(targets) => targets,
        };

        let level = if self.verbose {
            LogLevel::Verbose
        } else {
            self.loglevel
        };

        let watching = self.watching.unwrap_or_else(|| env.watch_requested());

        Ok(ResolvedOptions {
            patterns: self.patterns,
            dir,
            dest,
            clean,
            transform: self.transform,
            manifest,
            level,
            watching,
        })
    }

    /// [`Options::resolve`] against the process working directory.
    pub fn resolve_in_cwd(self, env: &dyn EnvReader) -> Result<ResolvedOptions, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        self.resolve(env, &cwd)
    }
}

/// Destination cleaning policy applied before the initial copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanPolicy {
    Skip,
    /// Delete everything under `dest`.
    All,
    /// Delete only entries under `dest` matching these globs (relative to `dest`).
    Globs(Vec<String>),
}

/// Options with every default applied.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub patterns: Vec<PatternInput>,
    /// Absolute source root.
    pub dir: PathBuf,
    /// Absolute destination root.
    pub dest: PathBuf,
    pub clean: CleanPolicy,
    pub transform: Option<PathTransform>,
    pub manifest: ManifestTargets,
    pub level: LogLevel,
    pub watching: bool,
}
