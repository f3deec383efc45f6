//! The toolchain driver boundary.
//!
//! The engine does not compile anything itself; it drives a [`Toolchain`]
//! located through a process-wide registry. The registry starts out holding
//! the bundled Clay driver; hosts that embed a different compiler install it
//! at startup, before any compilation is requested.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::request::Processor;
use crate::store::{ArtifactStore, VirtualSource};

/// Everything a driver needs for one compilation: virtual sources, the
/// assembled option list, the processor set, the output-capturing store, and
/// a single diagnostics buffer. Diagnostics are accumulated, never streamed.
pub struct CompileJob<'a> {
    pub sources: &'a [VirtualSource],
    pub options: &'a [String],
    pub processors: &'a [Arc<dyn Processor>],
    pub output: &'a ArtifactStore,
    pub diagnostics: &'a mut String,
}

/// An external compiler driven by the engine.
///
/// Compile errors are reported by writing to `job.diagnostics` and leaving
/// the output store empty; the engine turns that into a compilation error
/// carrying the buffer verbatim. `Err` is reserved for driver-internal
/// faults (a broken artifact encoder, a crashed subprocess).
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, job: &mut CompileJob<'_>) -> Result<(), String>;
}

type Registry = RwLock<Option<Arc<dyn Toolchain>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Some(Arc::new(crate::clay::ClayToolchain::new()))))
}

/// Replace the process-wide toolchain driver. Returns the previous one.
pub fn install(toolchain: Arc<dyn Toolchain>) -> Option<Arc<dyn Toolchain>> {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(toolchain)
}

/// Remove the process-wide toolchain driver. Compilations requested while
/// none is installed fail with `ToolchainUnavailable`.
pub fn uninstall() -> Option<Arc<dyn Toolchain>> {
    registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
}

/// The toolchain currently installed for this process, if any.
pub fn system() -> Option<Arc<dyn Toolchain>> {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullToolchain;

    impl Toolchain for NullToolchain {
        fn name(&self) -> &str {
            "null"
        }

        fn run(&self, _job: &mut CompileJob<'_>) -> Result<(), String> {
            Ok(())
        }
    }

    // The registry is process-global; the default and the swap are asserted
    // in a single test.
    #[test]
    fn test_registry_defaults_to_clay_and_install_replaces() {
        let previous = install(Arc::new(NullToolchain)).unwrap();
        assert_eq!(previous.name(), "clay");
        assert_eq!(system().unwrap().name(), "null");
        install(previous);
        assert_eq!(system().unwrap().name(), "clay");
    }
}
