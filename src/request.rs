//! Compilation requests: source units, options, and the fluent builder.

use std::fmt;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::KilnError;
use crate::space::{ResolvedType, SymbolSpace};

/// One named block of source text submitted for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub qualified_name: String,
    pub source: String,
}

impl SourceUnit {
    pub fn new(qualified_name: impl Into<String>, source: impl Into<String>) -> Self {
        SourceUnit {
            qualified_name: qualified_name.into(),
            source: source.into(),
        }
    }
}

/// A source-to-source rewriter the toolchain runs over each unit before
/// compiling it. Processors are opaque to the engine; they travel with the
/// request's options and are handed to the driver as-is.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, unit: SourceUnit) -> SourceUnit;
}

/// Compiler flags, processors, and the caller's own namespace identity.
///
/// The caller namespace feeds loading-strategy selection: code that wants the
/// compiled result to share its own privileged visibility states who it is
/// here, explicitly, instead of the engine guessing from the call stack.
#[derive(Clone, Default)]
pub struct CompileOptions {
    pub flags: Vec<String>,
    pub processors: Vec<Arc<dyn Processor>>,
    pub caller: Option<String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        CompileOptions::default()
    }

    /// Append one compiler flag.
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Append a processor to run during compilation.
    pub fn processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Declare the namespace of the code making this request.
    pub fn caller(mut self, namespace: impl Into<String>) -> Self {
        self.caller = Some(namespace.into());
        self
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("flags", &self.flags)
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("caller", &self.caller)
            .finish()
    }
}

/// A validated set of source units plus options, ready for the engine.
///
/// Only constructed through [`RequestBuilder::build`] or
/// [`CompilationRequest::single`], so `units` is never empty and the primary
/// name is always the qualified name of the first unit added.
#[derive(Debug, Clone)]
pub struct CompilationRequest {
    units: Vec<SourceUnit>,
    options: CompileOptions,
}

impl CompilationRequest {
    /// A request with exactly one unit.
    pub fn single(
        qualified_name: impl Into<String>,
        source: impl Into<String>,
        options: CompileOptions,
    ) -> Self {
        CompilationRequest {
            units: vec![SourceUnit::new(qualified_name, source)],
            options,
        }
    }

    /// The fully qualified name of the unit the caller wants back.
    pub fn primary_name(&self) -> &str {
        &self.units[0].qualified_name
    }

    /// All units, in insertion order.
    pub fn units(&self) -> &[SourceUnit] {
        &self.units
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }
}

/// Fluent accumulation of source units and options.
///
/// Single-owner and not internally synchronized; do not share one builder
/// across threads.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    units: Vec<SourceUnit>,
    options: CompileOptions,
}

impl RequestBuilder {
    pub fn new() -> Self {
        RequestBuilder::default()
    }

    /// Append a source unit. The first call fixes the primary name.
    pub fn unit(mut self, qualified_name: impl Into<String>, source: impl Into<String>) -> Self {
        self.units.push(SourceUnit::new(qualified_name, source));
        self
    }

    /// Replace the default empty options.
    pub fn options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate and produce a request. Idempotent; the builder is unchanged.
    pub fn build(&self) -> Result<CompilationRequest, KilnError> {
        if self.units.is_empty() {
            return Err(KilnError::InvalidRequest(
                "no source units were added".to_string(),
            ));
        }
        Ok(CompilationRequest {
            units: self.units.clone(),
            options: self.options.clone(),
        })
    }

    /// Build the request and compile it against the process symbol space
    /// using the system toolchain.
    pub fn compile(self) -> Result<ResolvedType, KilnError> {
        let request = self.build()?;
        Engine::new(SymbolSpace::global().clone()).compile(&request)
    }
}
