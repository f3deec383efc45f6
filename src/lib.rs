//! # Kiln — in-memory source compilation and loading
//!
//! Kiln turns named source units, given as text, into invocable types bound
//! into the running process, without ever writing an intermediate artifact
//! to disk. It drives an external toolchain against a virtual file system,
//! decides how much symbol-visibility privilege the fresh code should get,
//! and binds the results through one of three loading strategies.
//!
//! ## Quick Start
//!
//! ```
//! use kiln::{compile, CompileOptions, Value};
//!
//! let counter = compile(
//!     "demo.Counter",
//!     "(deftype demo.Counter (method add (a b) (+ a b)))",
//!     CompileOptions::new(),
//! )?;
//! let sum = counter.invoke("add", &[Value::Int(2), Value::Int(3)])?;
//! assert_eq!(sum, Value::Int(5));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! One call flows through several stages:
//!
//! 1. **Request** - units and options accumulate in a [`RequestBuilder`]
//! 2. **Cache check** - a name already resident in the symbol space is
//!    returned immediately, with no toolchain work
//! 3. **Engine** - assembles the search path and drives the toolchain
//!    against an in-memory artifact store
//! 4. **Loading** - the strategy selector binds the artifacts and returns
//!    the resolved type for the primary unit
//!
//! ## Loading strategies
//!
//! In strict priority order: the root definer granted once at process start,
//! a definer scoped to the requesting caller's namespace, and the isolated
//! fallback loader that sees only public surface. The capability a type was
//! bound with is recorded on it and enforced on every private member call.

pub mod clay;
pub mod engine;
pub mod error;
pub mod image;
mod loader;
pub mod request;
pub mod space;
pub mod store;
pub mod toolchain;
mod vm;

pub use engine::{compile, using, Engine};
pub use error::{KilnError, RuntimeError};
pub use image::{TypeImage, Value, Visibility};
pub use request::{CompilationRequest, CompileOptions, Processor, RequestBuilder, SourceUnit};
pub use space::{Access, IsolatedLoader, ResolvedType, SymbolSpace};
pub use store::ArtifactStore;
pub use toolchain::{CompileJob, Toolchain};
