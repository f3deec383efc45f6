//! Error types for the compilation pipeline and for invocation of loaded code.

use thiserror::Error;

/// Errors surfaced by the compile-and-load pipeline.
///
/// Every variant is terminal for the call that produced it: an invalid
/// request is a caller bug, a missing toolchain is a configuration problem,
/// and resubmitting source that failed to compile would fail identically.
#[derive(Debug, Error)]
pub enum KilnError {
    /// The request was malformed before any toolchain work started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No toolchain driver is installed in this process.
    #[error("no toolchain driver is installed in this process")]
    ToolchainUnavailable,

    /// The toolchain rejected the submitted source. Carries the full
    /// diagnostic buffer verbatim; this is the only channel through which
    /// compiler errors surface.
    #[error("compilation error:\n{diagnostics}")]
    Compilation { diagnostics: String },

    /// A compiled artifact could not be bound into the process symbol space.
    #[error("error while loading {name}: {reason}")]
    Loading { name: String, reason: String },
}

/// Errors raised while executing a method on a loaded type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// No type under this name is visible to the executing code's loader.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// The target type has no member under this name.
    #[error("{type_name} has no member named {member}")]
    UnknownMember { type_name: String, member: String },

    /// The member exists but the calling code's capability does not reach it.
    #[error("{member} is private to {type_name}")]
    PrivateMember { type_name: String, member: String },

    /// Wrong number of arguments for the called method.
    #[error("arity mismatch calling {member}: expected {expected}, got {got}")]
    Arity {
        member: String,
        expected: usize,
        got: usize,
    },

    /// An operand had the wrong runtime type.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    /// Nested calls exceeded the interpreter's depth limit.
    #[error("call depth limit exceeded")]
    DepthLimit,

    /// The loader that defined the executing type is gone.
    #[error("loader for {0} is no longer alive")]
    LoaderUnloaded(String),

    /// The method's bytecode is structurally invalid.
    #[error("malformed bytecode: {0}")]
    Malformed(String),
}
