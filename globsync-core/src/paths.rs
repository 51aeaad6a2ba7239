//! Pure path helpers: no filesystem access.

use std::path::{Component, Path, PathBuf};

/// Well-known directory that is never walked or watched.
pub const VENDOR_DIR: &str = "node_modules";

/// Replace every `\` with `/`.
pub fn slash(s: &str) -> String {
    s.replace('\\', "/")
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_posix(path: &Path) -> String {
    let parts: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Lexically resolve `.` and `..` components. `path` is expected to be absolute.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make `path` absolute against `base` (when relative) and normalize it.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Lexical path from `base` to `path`, both absolute. May start with `..`.
///
/// `relative_to("/a/b/c", "/a")` is `b/c`; `relative_to("/a/x", "/a/b")` is `../x`.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<_> = normalize(path).components().map(|c| c.as_os_str().to_owned()).collect();
    let base: Vec<_> = normalize(base).components().map(|c| c.as_os_str().to_owned()).collect();

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for part in &path[common..] {
        out.push(part);
    }
    out
}
