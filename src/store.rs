//! In-memory artifact store.
//!
//! Stands in for a filesystem during compilation: source units are wrapped as
//! virtual readable files under synthetic paths, and every compiled-output
//! write goes into a fresh in-memory buffer. Nothing here touches disk.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rustc_hash::FxHashMap;

use crate::request::SourceUnit;

/// Extension appended to synthetic source paths.
pub const SOURCE_EXTENSION: &str = ".clay";

/// Synthetic path for a qualified name: namespace separators become path
/// separators, plus the source extension.
pub fn synthetic_path(qualified_name: &str) -> String {
    format!("{}{}", qualified_name.replace('.', "/"), SOURCE_EXTENSION)
}

/// A memory-resident source file addressed by a synthetic path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSource {
    pub qualified_name: String,
    pub path: String,
    pub source: String,
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn lock_buffer(buffer: &SharedBuffer) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Virtual file system for one compilation call.
///
/// Source reads come from [`VirtualSource`]s; output writes accumulate in
/// buffers registered per qualified name. Lives exactly as long as the call.
pub struct ArtifactStore {
    sources: Vec<VirtualSource>,
    outputs: Mutex<Vec<(String, SharedBuffer)>>,
    collected: OnceLock<FxHashMap<String, Vec<u8>>>,
}

impl ArtifactStore {
    pub fn new(units: &[SourceUnit]) -> Self {
        let sources = units
            .iter()
            .map(|unit| VirtualSource {
                qualified_name: unit.qualified_name.clone(),
                path: synthetic_path(&unit.qualified_name),
                source: unit.source.clone(),
            })
            .collect();
        ArtifactStore {
            sources,
            outputs: Mutex::new(Vec::new()),
            collected: OnceLock::new(),
        }
    }

    pub fn sources(&self) -> &[VirtualSource] {
        &self.sources
    }

    /// Allocate a fresh output buffer for `qualified_name` and hand back a
    /// writable sink over it. A second request for the same name registers a
    /// new buffer that shadows the first.
    pub fn open_output(&self, qualified_name: &str) -> ArtifactSink {
        let buffer: SharedBuffer = Arc::new(Mutex::new(Vec::new()));
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((qualified_name.to_string(), Arc::clone(&buffer)));
        ArtifactSink { buffer }
    }

    /// True iff no output buffer was ever allocated. This is the compilation
    /// failure signal: the toolchain produced nothing.
    pub fn is_empty(&self) -> bool {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// The name-to-bytes artifact mapping, computed once and cached for the
    /// rest of the call. Output buffers allocated after the first call to
    /// this method are not reflected.
    pub fn artifacts(&self) -> &FxHashMap<String, Vec<u8>> {
        self.collected.get_or_init(|| {
            let outputs = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
            let mut map = FxHashMap::default();
            for (name, buffer) in outputs.iter() {
                map.insert(name.clone(), lock_buffer(buffer).clone());
            }
            map
        })
    }
}

/// Writable sink backed by one in-memory output buffer.
pub struct ArtifactSink {
    buffer: SharedBuffer,
}

impl Write for ArtifactSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        lock_buffer(&self.buffer).extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_path() {
        assert_eq!(synthetic_path("com.acme.Foo"), "com/acme/Foo.clay");
        assert_eq!(synthetic_path("Foo"), "Foo.clay");
    }

    #[test]
    fn test_sources_wrap_units() {
        let store = ArtifactStore::new(&[SourceUnit::new("acme.A", "(deftype acme.A)")]);
        let sources = store.sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, "acme/A.clay");
        assert_eq!(sources[0].source, "(deftype acme.A)");
    }

    #[test]
    fn test_empty_until_output_allocated() {
        let store = ArtifactStore::new(&[]);
        assert!(store.is_empty());
        let _sink = store.open_output("acme.A");
        // Allocation alone flips the signal, even before any bytes arrive.
        assert!(!store.is_empty());
    }

    #[test]
    fn test_sink_accumulates_until_closed() {
        let store = ArtifactStore::new(&[]);
        let mut sink = store.open_output("acme.A");
        sink.write_all(b"abc").unwrap();
        sink.write_all(b"def").unwrap();
        drop(sink);
        assert_eq!(store.artifacts()["acme.A"], b"abcdef");
    }

    #[test]
    fn test_artifacts_computed_once() {
        let store = ArtifactStore::new(&[]);
        store.open_output("acme.A").write_all(b"x").unwrap();
        assert_eq!(store.artifacts().len(), 1);
        store.open_output("acme.B").write_all(b"y").unwrap();
        // Cached mapping; the late buffer is not reflected.
        assert_eq!(store.artifacts().len(), 1);
    }

    #[test]
    fn test_second_buffer_shadows_first() {
        let store = ArtifactStore::new(&[]);
        store.open_output("acme.A").write_all(b"old").unwrap();
        store.open_output("acme.A").write_all(b"new").unwrap();
        assert_eq!(store.artifacts()["acme.A"], b"new");
    }
}
