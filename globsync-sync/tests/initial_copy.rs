use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use globsync_core::{CleanOption, MapEnv, Options, ResolvedOptions};
use globsync_sync::{pipeline::prepare, Manifest, SyncEngine};
use tempfile::TempDir;
use walkdir::WalkDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

/// Every file under `root` keyed by relative path, with contents.
fn tree(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).expect("prefix").to_path_buf();
            (rel, fs::read(e.path()).expect("read"))
        })
        .collect()
}

fn specimen() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("src");
    write(&src, "file.txt", "hello from file.txt\n");
    write(&src, "index.js", "console.log('not copied');\n");
    write(&src, "nested/deep.txt", "deep\n");
    write(&src, "node_modules/pkg/vendor.txt", "vendor\n");
    tmp
}

fn resolve(tmp: &TempDir, options: Options) -> ResolvedOptions {
    options
        .dir(tmp.path().join("src"))
        .dest(tmp.path().join("dest"))
        .resolve(&MapEnv::new(), tmp.path())
        .expect("resolve")
}

async fn run(options: &ResolvedOptions) -> Arc<SyncEngine> {
    let prepared = prepare(options, false).await.expect("prepare");
    let engine = Arc::new(SyncEngine::new(
        &options.dir,
        &options.dest,
        prepared.patterns,
        options.transform.clone(),
    ));
    let summary = engine.initial_copy(prepared.files).await;
    assert_eq!(summary.failed, 0, "initial copy had failures");
    engine
}

#[tokio::test]
async fn copies_matching_files_on_start() {
    let tmp = specimen();
    let options = resolve(&tmp, Options::new(["*.txt"]));

    run(&options).await;

    let dest = tmp.path().join("dest");
    assert_eq!(
        fs::read_to_string(dest.join("file.txt")).unwrap(),
        "hello from file.txt\n"
    );
    assert!(!dest.join("index.js").exists());
    assert!(!dest.join("nested/deep.txt").exists(), "*.txt is top-level only");
}

#[tokio::test]
async fn initial_copy_is_idempotent() {
    let tmp = specimen();
    let options = resolve(&tmp, Options::new(["**/*.txt"]));

    run(&options).await;
    let first = tree(&tmp.path().join("dest"));
    run(&options).await;
    let second = tree(&tmp.path().join("dest"));

    assert_eq!(first, second);
    assert!(!first.contains_key(Path::new("node_modules/pkg/vendor.txt")));
}

#[tokio::test]
async fn mapping_is_complete_after_initial_copy() {
    let tmp = specimen();
    let options = resolve(
        &tmp,
        Options::new(["**/*.txt"]).transform(|p| p.replace(".txt", ".copied.txt")),
    );

    let engine = run(&options).await;

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.len(), 2);
    for (source, dest) in snapshot {
        let src_bytes = fs::read(options.dir.join(&source)).unwrap();
        let dest_bytes = fs::read(options.dest.join(&dest)).unwrap();
        assert_eq!(src_bytes, dest_bytes, "{source} -> {dest}");
    }
}

#[tokio::test]
async fn transform_runs_once_per_path() {
    let tmp = specimen();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let options = resolve(
        &tmp,
        Options::new(["**/*.txt"]).transform(move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            p.to_string()
        }),
    );

    let engine = run(&options).await;
    engine.change("file.txt").await.unwrap();
    engine.change("file.txt").await.unwrap();
    engine.remove("file.txt").await.unwrap();
    engine.add("file.txt").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2, "one call per distinct path");
}

#[tokio::test]
async fn clean_true_removes_unrelated_files() {
    let tmp = specimen();
    write(&tmp.path().join("dest"), "already-there.txt", "old\n");
    let options = resolve(&tmp, Options::new(["*.txt"]));

    run(&options).await;

    assert!(!tmp.path().join("dest/already-there.txt").exists());
    assert!(tmp.path().join("dest/file.txt").exists());
}

#[tokio::test]
async fn clean_false_keeps_existing_files() {
    let tmp = specimen();
    write(&tmp.path().join("dest"), "already-there.txt", "old\n");
    let options = resolve(
        &tmp,
        Options::new(["*.txt"]).clean(CleanOption::Enabled(false)),
    );

    run(&options).await;

    assert!(tmp.path().join("dest/already-there.txt").exists());
}

#[tokio::test]
async fn clean_by_glob_removes_only_matches() {
    let tmp = specimen();
    let dest = tmp.path().join("dest");
    write(&dest, "already-there.txt", "old\n");
    write(&dest, "file.old", "stale\n");
    let options = resolve(
        &tmp,
        Options::new(["index.js"]).clean(CleanOption::Globs(vec!["file.*".into()])),
    );

    run(&options).await;

    assert!(!dest.join("file.old").exists());
    assert!(dest.join("already-there.txt").exists());
    assert!(dest.join("index.js").exists());
}

#[tokio::test]
async fn manifest_reflects_mapping_snapshot() {
    let tmp = specimen();
    let options = resolve(
        &tmp,
        Options::new(["*.txt"]).transform(|p| p.replace(".txt", ".transformed.txt")),
    );

    let engine = run(&options).await;
    let manifest = Manifest::snapshot(&engine);

    assert_eq!(
        manifest.entries(),
        [("file.txt".to_string(), "file.transformed.txt".to_string())]
    );
    assert_eq!(
        manifest.to_file().unwrap(),
        "{\n    \"file.txt\": \"file.transformed.txt\"\n}"
    );
}
