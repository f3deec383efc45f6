//! The compilation engine.
//!
//! Orchestrates one synchronous compile-and-load call: resident-type fast
//! path, search-path assembly, toolchain invocation against the in-memory
//! artifact store, and strategy-based binding of the results.

use std::sync::Arc;

use tracing::debug;

use crate::error::KilnError;
use crate::loader::{self, ExecutionContext};
use crate::request::{CompilationRequest, CompileOptions, RequestBuilder};
use crate::space::{ResolvedType, SymbolSpace};
use crate::store::ArtifactStore;
use crate::toolchain::{self, CompileJob, Toolchain};

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

/// Flag under which the engine passes the effective search path.
pub const SEARCH_PATH_FLAG: &str = "--search-path";
/// Environment variable naming the process's dependency search path.
pub const DEPENDENCY_PATH_VAR: &str = "KILN_PATH";
/// Environment variable naming the process's module search path.
pub const MODULE_PATH_VAR: &str = "KILN_MODULE_PATH";

/// One engine over one symbol space and one toolchain driver.
///
/// Calls are blocking and run to completion; the engine adds no threading,
/// no cancellation, and no locking beyond what the symbol space itself does.
pub struct Engine {
    space: SymbolSpace,
    toolchain: Option<Arc<dyn Toolchain>>,
}

impl Engine {
    /// An engine over `space` using the process-wide system toolchain. The
    /// driver is snapshotted here; if none is installed, compilation calls
    /// fail with `ToolchainUnavailable`.
    pub fn new(space: SymbolSpace) -> Self {
        Engine {
            space,
            toolchain: toolchain::system(),
        }
    }

    /// An engine with an explicit driver, bypassing the registry.
    pub fn with_toolchain(space: SymbolSpace, toolchain: Arc<dyn Toolchain>) -> Self {
        Engine {
            space,
            toolchain: Some(toolchain),
        }
    }

    pub fn space(&self) -> &SymbolSpace {
        &self.space
    }

    /// Compile a request and bind the result into this engine's space.
    pub fn compile(&self, request: &CompilationRequest) -> Result<ResolvedType, KilnError> {
        let primary = request.primary_name();

        // Fast path: a type of this name is already resident. Correctness,
        // not optimization — redefining a resident name would raise a
        // duplicate-definition fault from the symbol space. The key is the
        // name alone; different source under a resident name is ignored.
        if let Some(ty) = self.space.lookup(primary) {
            debug!(primary = %primary, "resident type found, skipping compilation");
            return Ok(ResolvedType::resident(ty, self.space.clone()));
        }

        let toolchain = self
            .toolchain
            .as_ref()
            .ok_or(KilnError::ToolchainUnavailable)?;

        let options = self.effective_options(request.options());
        let store = ArtifactStore::new(request.units());
        let mut diagnostics = String::new();
        let outcome = toolchain.run(&mut CompileJob {
            sources: store.sources(),
            options: &options,
            processors: &request.options().processors,
            output: &store,
            diagnostics: &mut diagnostics,
        });

        if let Err(fault) = outcome {
            if !diagnostics.is_empty() && !diagnostics.ends_with('\n') {
                diagnostics.push('\n');
            }
            diagnostics.push_str(&fault);
            return Err(KilnError::Compilation { diagnostics });
        }
        if store.is_empty() {
            // Nothing was written: nothing type-checked, or the driver
            // rejected the input outright.
            return Err(KilnError::Compilation { diagnostics });
        }

        let artifacts = store.artifacts();
        debug!(
            toolchain = toolchain.name(),
            artifact_count = artifacts.len(),
            "toolchain produced artifacts"
        );
        let ctx = ExecutionContext::from_options(request.options());
        loader::load(&self.space, &ctx, primary, artifacts)
    }

    /// The caller's flags, with a synthesized search path appended when the
    /// caller did not pass one explicitly.
    fn effective_options(&self, options: &CompileOptions) -> Vec<String> {
        let mut flags = options.flags.clone();
        if !flags.iter().any(|flag| flag == SEARCH_PATH_FLAG) {
            let path = self.assemble_search_path();
            debug!(search_path = %path, "assembled effective search path");
            flags.push(SEARCH_PATH_FLAG.to_string());
            flags.push(path);
        }
        flags
    }

    /// Re-derive the process's own search paths for the driver. The driver
    /// runs against a sandboxed compilation context that does not inherit
    /// this process's resolved dependencies.
    fn assemble_search_path(&self) -> String {
        let mut segments: Vec<String> = Vec::new();
        for var in [DEPENDENCY_PATH_VAR, MODULE_PATH_VAR] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    segments.push(value);
                }
            }
        }
        for root in self.space.resource_roots() {
            segments.push(root.display().to_string());
        }
        segments.join(PATH_SEPARATOR)
    }
}

/// Compile one source unit against the process symbol space and return its
/// resolved type.
pub fn compile(
    qualified_name: impl Into<String>,
    source: impl Into<String>,
    options: CompileOptions,
) -> Result<ResolvedType, KilnError> {
    let request = CompilationRequest::single(qualified_name, source, options);
    Engine::new(SymbolSpace::global().clone()).compile(&request)
}

/// Start a multi-unit request with configurable options.
pub fn using() -> RequestBuilder {
    RequestBuilder::new()
}
