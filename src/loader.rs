//! Loading-strategy selection and artifact binding.
//!
//! Three strategies, tried in strict priority order; the first applicable one
//! binds the entire batch of artifacts, never a mix per artifact:
//!
//! 1. the root definer, when its capability was granted at process start;
//! 2. a definer scoped to the requesting caller's namespace, when the
//!    primary name sits directly inside it;
//! 3. a fresh isolated loader, always available, public surface only.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::KilnError;
use crate::image::TypeImage;
use crate::request::CompileOptions;
use crate::space::{IsolatedLoader, LoadedType, ResolvedType, SymbolSpace};

/// The identity of the code that requested the compilation. Derived from the
/// request options at call time and discarded with the call.
#[derive(Debug, Clone)]
pub(crate) struct ExecutionContext {
    pub caller: Option<String>,
}

impl ExecutionContext {
    pub fn from_options(options: &CompileOptions) -> Self {
        ExecutionContext {
            caller: options.caller.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Strategy {
    RootDefiner,
    CallerScoped,
    Isolated,
}

pub(crate) fn select(space: &SymbolSpace, ctx: &ExecutionContext, primary: &str) -> Strategy {
    if space.root_definer().is_some() {
        return Strategy::RootDefiner;
    }
    if let Some(caller) = ctx.caller.as_deref() {
        if in_caller_namespace(caller, primary) {
            return Strategy::CallerScoped;
        }
    }
    Strategy::Isolated
}

/// True when `primary` sits directly in the caller's namespace.
///
/// The uppercase test on the segment after the prefix is a heuristic that
/// rejects names merely in a sub-namespace of the caller, which would not
/// share privileged visibility. It assumes conventional naming and can be
/// fooled by names that break it; a known limitation.
fn in_caller_namespace(caller: &str, primary: &str) -> bool {
    let Some(rest) = primary.strip_prefix(caller) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('.') else {
        return false;
    };
    rest.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Bind every artifact with the selected strategy and return the resolved
/// type for `primary`.
pub(crate) fn load(
    space: &SymbolSpace,
    ctx: &ExecutionContext,
    primary: &str,
    artifacts: &FxHashMap<String, Vec<u8>>,
) -> Result<ResolvedType, KilnError> {
    let strategy = select(space, ctx, primary);
    debug!(
        strategy = ?strategy,
        artifact_count = artifacts.len(),
        primary = %primary,
        "binding compiled artifacts"
    );
    match strategy {
        Strategy::RootDefiner => match space.root_definer() {
            Some(definer) => define_batch(space, primary, artifacts, |image| definer.define(image)),
            // The grant is sticky, so selection cannot be stale.
            None => Err(KilnError::Loading {
                name: primary.to_string(),
                reason: "root definer disappeared during binding".to_string(),
            }),
        },
        Strategy::CallerScoped => {
            let caller = ctx.caller.clone().unwrap_or_default();
            let definer = space.privileged_definer(&caller);
            define_batch(space, primary, artifacts, |image| definer.define(image))
        }
        Strategy::Isolated => {
            let loader = IsolatedLoader::new(space.clone(), artifacts.clone());
            let ty = loader
                .lookup(primary)?
                .ok_or_else(|| missing_primary(primary))?;
            Ok(ResolvedType::isolated(ty, space.clone(), loader))
        }
    }
}

fn define_batch(
    space: &SymbolSpace,
    primary: &str,
    artifacts: &FxHashMap<String, Vec<u8>>,
    define: impl Fn(TypeImage) -> Result<Arc<LoadedType>, KilnError>,
) -> Result<ResolvedType, KilnError> {
    let mut result = None;
    for (name, bytes) in artifacts {
        let image = TypeImage::from_bytes(bytes).map_err(|e| KilnError::Loading {
            name: name.clone(),
            reason: format!("malformed type image: {}", e),
        })?;
        let ty = define(image)?;
        if name == primary {
            result = Some(ty);
        }
    }
    let ty = result.ok_or_else(|| missing_primary(primary))?;
    Ok(ResolvedType::resident(ty, space.clone()))
}

fn missing_primary(primary: &str) -> KilnError {
    KilnError::Loading {
        name: primary.to_string(),
        reason: "the toolchain produced no artifact under the primary name".to_string(),
    }
}
