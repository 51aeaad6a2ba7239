//! Manifest publication: the live mapping as an importable module or as a
//! JSON build artifact. Both are point-in-time snapshots.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::ser::PrettyFormatter;

use crate::engine::SyncEngine;
use crate::error::SyncError;

/// Snapshot of the source → destination mapping, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<(String, String)>,
}

impl Manifest {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Capture the engine's mapping as it is right now.
    pub fn snapshot(engine: &SyncEngine) -> Self {
        Self::new(engine.snapshot())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Module source whose default export is a `Map` of `[source, dest]` pairs.
    pub fn to_module(&self) -> Result<String, SyncError> {
        let pairs = serde_json::to_string(&self.entries)?;
        Ok(format!("export default new Map({pairs});\n"))
    }

    /// Pretty-printed (4-space) JSON object, keys in insertion order.
    pub fn to_file(&self) -> Result<String, SyncError> {
        let mut out = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        // serde_json only ever emits UTF-8.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (source, dest) in &self.entries {
            map.serialize_entry(source, dest)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest::new(vec![
            ("b.txt".into(), "b.transformed.txt".into()),
            ("a.txt".into(), "a.transformed.txt".into()),
        ])
    }

    #[test]
    fn module_exports_ordered_pairs() {
        assert_eq!(
            sample().to_module().unwrap(),
            "export default new Map([[\"b.txt\",\"b.transformed.txt\"],[\"a.txt\",\"a.transformed.txt\"]]);\n"
        );
    }

    #[test]
    fn file_is_pretty_with_insertion_order() {
        assert_eq!(
            sample().to_file().unwrap(),
            "{\n    \"b.txt\": \"b.transformed.txt\",\n    \"a.txt\": \"a.transformed.txt\"\n}"
        );
    }

    #[test]
    fn empty_manifest_renders_empty_collections() {
        let empty = Manifest::default();
        assert_eq!(empty.to_module().unwrap(), "export default new Map([]);\n");
        assert_eq!(empty.to_file().unwrap(), "{}");
    }
}
