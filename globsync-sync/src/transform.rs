//! Memoized source → destination path mapping.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use globsync_core::{paths::slash, PathTransform};

/// Maps a source-relative path to a destination-relative path, calling the
/// user transform at most once per distinct source path for the lifetime of
/// the transformer (one sync session).
#[derive(Debug, Default)]
pub struct PathTransformer {
    transform: Option<PathTransform>,
    memo: Mutex<HashMap<String, String>>,
}

impl PathTransformer {
    pub fn new(transform: Option<PathTransform>) -> Self {
        Self {
            transform,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Destination-relative, `/`-separated path for `source_rel`.
    ///
    /// The user transform runs while the memo lock is held, so concurrent
    /// first calls for the same path still invoke it only once.
    pub fn transform(&self, source_rel: &str) -> String {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = memo.get(source_rel) {
            return cached.clone();
        }

        let out = match &self.transform {
            Some(transform) => clean_relative(&transform.apply(source_rel)),
            None => source_rel.to_string(),
        };
        memo.insert(source_rel.to_string(), out.clone());
        out
    }

    /// Cached value for `source_rel`, without computing one.
    pub fn cached(&self, source_rel: &str) -> Option<String> {
        self.memo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_rel)
            .cloned()
    }
}

/// Forward slashes only; never absolute, never `./`-prefixed.
fn clean_relative(path: &str) -> String {
    let mut out = slash(path);
    loop {
        if let Some(rest) = out.strip_prefix("./") {
            out = rest.to_string();
        } else if let Some(rest) = out.strip_prefix('/') {
            out = rest.to_string();
        } else {
            break out;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn identity_without_user_transform() {
        let transformer = PathTransformer::new(None);
        assert_eq!(transformer.transform("a/b.txt"), "a/b.txt");
    }

    #[test]
    fn user_transform_called_once_per_path() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transformer = PathTransformer::new(Some(PathTransform::new(move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            format!("out/{p}")
        })));

        for _ in 0..3 {
            assert_eq!(transformer.transform("a.txt"), "out/a.txt");
        }
        transformer.transform("b.txt");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(transformer.cached("b.txt").as_deref(), Some("out/b.txt"));
    }

    #[test]
    fn concurrent_first_calls_share_one_invocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let transformer = Arc::new(PathTransformer::new(Some(PathTransform::new(move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            p.to_uppercase()
        }))));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let transformer = transformer.clone();
                std::thread::spawn(move || transformer.transform("same.txt"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("thread"), "SAME.TXT");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transform_output_is_made_relative() {
        let transformer = PathTransformer::new(Some(PathTransform::new(|p| format!(r".\x\{p}"))));
        assert_eq!(transformer.transform("a.txt"), "x/a.txt");

        let absolute = PathTransformer::new(Some(PathTransform::new(|p| format!("/{p}"))));
        assert_eq!(absolute.transform("a.txt"), "a.txt");
    }
}
