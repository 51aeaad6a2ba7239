//! Glob resolution and one-shot discovery.
//!
//! A [`PatternSet`] is built once per session from the user's patterns plus
//! two mandatory exclusions:
//!
//! ```text
//! !**/node_modules/**     (prepended: never walk the vendor tree)
//! <user patterns...>      (flattened, `/`-separated, relative to the source root)
//! !<dest>/**              (appended: never copy the destination into itself)
//! ```
//!
//! A path is selected when it matches at least one inclusion and no negation.
//! Negations ending in `/**` also prune their directory from walks and watches.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use globsync_core::{
    config::{flatten_patterns, PatternInput},
    paths::{relative_to, to_posix, VENDOR_DIR},
};

use crate::error::SyncError;

/// Resolved, compiled include/exclude rules. Immutable after construction.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    include: GlobSet,
    exclude: GlobSet,
    pruned: GlobSet,
}

impl PatternSet {
    /// Build the effective pattern set for a session.
    ///
    /// `source` and `dest` must be absolute. Absolute user patterns are
    /// rewritten relative to `source`.
    pub fn resolve(
        user: &[PatternInput],
        source: &Path,
        dest: &Path,
    ) -> Result<Self, SyncError> {
        let mut patterns = vec![format!("!**/{VENDOR_DIR}/**")];

        for glob in flatten_patterns(user) {
            patterns.push(relativize_pattern(&glob, source));
        }

        let dest_rel = to_posix(&relative_to(dest, source));
        if dest_rel.is_empty() {
            tracing::warn!(
                dest = %dest.display(),
                "destination is the source root; not excluding it from patterns",
            );
        } else {
            patterns.push(format!("!{dest_rel}/**"));
        }

        Self::compile(patterns)
    }

    /// Compile an explicit, already-normalized pattern list.
    pub fn compile(patterns: Vec<String>) -> Result<Self, SyncError> {
        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        let mut pruned = GlobSetBuilder::new();

        for pattern in &patterns {
            match pattern.strip_prefix('!') {
                Some(negated) => {
                    exclude.add(build_glob(negated)?);
                    if let Some(dir) = negated.strip_suffix("/**") {
                        if !dir.is_empty() {
                            pruned.add(build_glob(dir)?);
                        }
                    }
                }
                None => {
                    include.add(build_glob(pattern)?);
                }
            }
        }

        Ok(Self {
            include: build_set(include, &patterns)?,
            exclude: build_set(exclude, &patterns)?,
            pruned: build_set(pruned, &patterns)?,
            patterns,
        })
    }

    /// The ordered pattern strings this set was compiled from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a source-relative file path is eligible for copy.
    pub fn is_match(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.exclude.is_match(rel)
    }

    /// Whether a source-relative directory is excluded wholesale.
    pub fn is_pruned(&self, rel_dir: &str) -> bool {
        self.pruned.is_match(rel_dir)
    }
}

fn build_glob(pattern: &str) -> Result<globset::Glob, SyncError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| SyncError::Glob {
            pattern: pattern.to_string(),
            source,
        })
}

fn build_set(builder: GlobSetBuilder, patterns: &[String]) -> Result<GlobSet, SyncError> {
    builder.build().map_err(|source| SyncError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Strip `./` and turn absolute globs into globs relative to `source`.
fn relativize_pattern(glob: &str, source: &Path) -> String {
    let (negated, body) = match glob.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, glob),
    };

    let body = if Path::new(body).is_absolute() {
        to_posix(&relative_to(Path::new(body), source))
    } else {
        body.trim_start_matches("./").to_string()
    };

    if negated {
        format!("!{body}")
    } else {
        body
    }
}

/// Walk `source` once and return every file path eligible for copy,
/// relative to `source`, `/`-separated, in stable walk order.
///
/// An unreadable `source` root is fatal; unreadable entries below it are
/// logged and skipped.
pub fn discover(patterns: &PatternSet, source: &Path) -> Result<Vec<String>, SyncError> {
    let relative = |path: &Path| {
        path.strip_prefix(source)
            .map(to_posix)
            .unwrap_or_default()
    };

    let walker = WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !patterns.is_pruned(&relative(entry.path()))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(SyncError::Walk {
                    path: source.to_path_buf(),
                    source: err,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry during discovery");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let rel = relative(entry.path());
        if patterns.is_match(&rel) {
            files.push(rel);
        }
    }

    tracing::trace!(count = files.len(), "discovered files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn resolve(user: &[&str], source: &str, dest: &str) -> PatternSet {
        let inputs: Vec<PatternInput> = user.iter().map(|p| PatternInput::from(*p)).collect();
        PatternSet::resolve(&inputs, Path::new(source), Path::new(dest)).expect("resolve")
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, rel).expect("write");
    }

    #[test]
    fn resolve_orders_vendor_first_and_dest_last() {
        let set = resolve(&["*.txt", r"img\*.png"], "/work/src", "/work/src/dist");
        assert_eq!(
            set.patterns(),
            ["!**/node_modules/**", "*.txt", "img/*.png", "!dist/**"]
        );
    }

    #[test]
    fn dest_outside_source_is_expressed_relative_to_source() {
        let set = resolve(&["*.txt"], "/work/src", "/work/dist");
        assert_eq!(set.patterns().last().map(String::as_str), Some("!../dist/**"));
    }

    #[test]
    fn absolute_patterns_become_relative() {
        let set = resolve(&["/work/src/assets/**", "!/work/src/assets/tmp/**"], "/work/src", "/out");
        assert!(set.patterns().contains(&"assets/**".to_string()));
        assert!(set.patterns().contains(&"!assets/tmp/**".to_string()));
    }

    #[rstest]
    #[case("file.txt", true)]
    #[case("nested/file.txt", false)]
    #[case("file.md", false)]
    #[case("dist/file.txt", false)]
    fn single_star_does_not_cross_directories(#[case] rel: &str, #[case] expected: bool) {
        let set = resolve(&["*.txt"], "/work", "/work/dist");
        assert_eq!(set.is_match(rel), expected, "{rel}");
    }

    #[rstest]
    #[case("a/b/c.txt", true)]
    #[case("node_modules/pkg/c.txt", false)]
    #[case("a/node_modules/c.txt", false)]
    #[case("raw/c.txt", false)]
    fn negations_exclude(#[case] rel: &str, #[case] expected: bool) {
        let set = resolve(&["**/*.txt", "!raw/**"], "/work", "/elsewhere");
        assert_eq!(set.is_match(rel), expected, "{rel}");
    }

    #[test]
    fn pruned_directories_come_from_subtree_negations() {
        let set = resolve(&["**/*"], "/work", "/work/dist");
        assert!(set.is_pruned("node_modules"));
        assert!(set.is_pruned("pkg/node_modules"));
        assert!(set.is_pruned("dist"));
        assert!(!set.is_pruned("src"));
    }

    #[test]
    fn invalid_glob_is_reported_with_pattern() {
        let err = PatternSet::compile(vec!["a[".to_string()]).expect_err("must fail");
        match err {
            SyncError::Glob { pattern, .. } => assert_eq!(pattern, "a["),
            other => panic!("expected glob error, got {other:?}"),
        }
    }

    #[test]
    fn discover_returns_only_matching_files() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        touch(root, "b.txt");
        touch(root, "a.txt");
        touch(root, "index.js");
        touch(root, "sub/c.txt");
        touch(root, "node_modules/pkg/d.txt");
        touch(root, "dist/e.txt");

        let set = PatternSet::resolve(
            &[PatternInput::from("**/*.txt")],
            root,
            &root.join("dist"),
        )
        .expect("resolve");
        let files = discover(&set, root).expect("discover");

        assert_eq!(files, ["a.txt", "b.txt", "sub/c.txt"]);
    }

    #[test]
    fn discover_missing_source_is_fatal() {
        let tmp = TempDir::new().expect("tempdir");
        let missing: PathBuf = tmp.path().join("nope");
        let set = resolve(&["*.txt"], "/work", "/work/dist");
        let err = discover(&set, &missing).expect_err("must fail");
        assert!(matches!(err, SyncError::Walk { .. }));
    }
}
