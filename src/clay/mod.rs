//! Clay — the bundled reference toolchain.
//!
//! Clay compiles s-expression type definitions into type-image artifacts:
//!
//! ```text
//! (deftype acme.Counter
//!   (method add (a b) (+ a b))
//!   (private-method seed () 7)
//!   (method total (n) (+ n (call acme.Counter seed))))
//! ```
//!
//! A unit may declare several types; each compiles to its own artifact.
//! `call` targets are late-bound: they resolve at execution time through the
//! loader of the calling type, so the driver never consults the search path.
//! Processors run over each unit's source before it is lexed.

pub mod compiler;
pub mod lexer;
pub mod parser;

use std::io::Write;

use crate::request::SourceUnit;
use crate::toolchain::{CompileJob, Toolchain};

/// The Clay driver installed in the toolchain registry by default.
#[derive(Default)]
pub struct ClayToolchain;

impl ClayToolchain {
    pub fn new() -> Self {
        ClayToolchain
    }
}

impl Toolchain for ClayToolchain {
    fn name(&self) -> &str {
        "clay"
    }

    fn run(&self, job: &mut CompileJob<'_>) -> Result<(), String> {
        if let Err(message) = check_options(job.options) {
            job.diagnostics.push_str(&message);
            job.diagnostics.push('\n');
            return Ok(());
        }

        let mut images = Vec::new();
        let mut failed = false;
        for source in job.sources {
            let mut unit = SourceUnit::new(&source.qualified_name, &source.source);
            for processor in job.processors {
                unit = processor.process(unit);
            }
            match compiler::compile_unit(&unit.source) {
                Ok(batch) => images.extend(batch),
                Err(diagnostics) => {
                    failed = true;
                    for d in diagnostics {
                        job.diagnostics.push_str(&format!(
                            "{}:{}:{}: {}\n",
                            source.path, d.loc.line, d.loc.col, d.message
                        ));
                    }
                }
            }
        }
        if failed {
            // The empty store is the failure signal; write nothing.
            return Ok(());
        }

        for image in images {
            let bytes = image
                .to_bytes()
                .map_err(|e| format!("cannot encode type image for {}: {}", image.name, e))?;
            let mut sink = job.output.open_output(&image.name);
            sink.write_all(&bytes)
                .map_err(|e| format!("cannot write artifact for {}: {}", image.name, e))?;
        }
        Ok(())
    }
}

fn check_options(options: &[String]) -> Result<(), String> {
    let mut iter = options.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--search-path" => {
                iter.next()
                    .ok_or_else(|| "missing value for --search-path".to_string())?;
            }
            other => return Err(format!("unknown option: {}", other)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArtifactStore;

    fn run_units(units: &[SourceUnit], options: &[String]) -> (ArtifactStore, String) {
        let store = ArtifactStore::new(units);
        let mut diagnostics = String::new();
        ClayToolchain::new()
            .run(&mut CompileJob {
                sources: store.sources(),
                options,
                processors: &[],
                output: &store,
                diagnostics: &mut diagnostics,
            })
            .unwrap();
        (store, diagnostics)
    }

    #[test]
    fn test_writes_one_artifact_per_type() {
        let units = [SourceUnit::new(
            "shop.Order",
            "(deftype shop.Order (method id () 1)) (deftype shop.Line (method id () 2))",
        )];
        let (store, diagnostics) = run_units(&units, &[]);
        assert!(diagnostics.is_empty());
        let artifacts = store.artifacts();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.contains_key("shop.Order"));
        assert!(artifacts.contains_key("shop.Line"));
    }

    #[test]
    fn test_any_error_means_no_artifacts() {
        let units = [
            SourceUnit::new("good.A", "(deftype good.A (method m () 1))"),
            SourceUnit::new("bad.B", "(deftype bad.B (method m () nope))"),
        ];
        let (store, diagnostics) = run_units(&units, &[]);
        assert!(store.is_empty());
        assert!(diagnostics.contains("bad/B.clay:1:"));
        assert!(diagnostics.contains("unknown identifier: nope"));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let units = [SourceUnit::new("t.T", "(deftype t.T)")];
        let (store, diagnostics) = run_units(&units, &["--frobnicate".to_string()]);
        assert!(store.is_empty());
        assert!(diagnostics.contains("unknown option: --frobnicate"));
    }

    #[test]
    fn test_search_path_option_is_accepted() {
        let units = [SourceUnit::new("t.T", "(deftype t.T)")];
        let options = ["--search-path".to_string(), "/opt/lib".to_string()];
        let (store, diagnostics) = run_units(&units, &options);
        assert!(diagnostics.is_empty());
        assert!(!store.is_empty());
    }
}
