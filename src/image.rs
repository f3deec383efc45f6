//! The artifact wire format.
//!
//! A compiled artifact is a serialized [`TypeImage`]: one named type and its
//! methods, each method a flat bytecode sequence. Artifacts are opaque bytes
//! to the engine; only the loading layer decodes them, and only in memory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A runtime value produced or consumed by loaded code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
        }
    }
}

/// Member visibility recorded in the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

/// Bytecode instruction set for method bodies.
///
/// Jump targets are absolute instruction indices within the method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Push a constant.
    Const(Value),
    /// Push the n-th argument.
    Arg(u8),
    Add,
    Sub,
    Mul,
    /// Integer less-than; pushes a bool.
    Lt,
    /// Equality on two operands of the same runtime type; pushes a bool.
    Eq,
    /// Unconditional jump.
    Jump(u16),
    /// Pop a bool, jump when false.
    JumpIfFalse(u16),
    /// Pop `argc` arguments and invoke `member` on `type_name`, resolved
    /// through the executing type's loader. Pushes the result.
    Call {
        type_name: String,
        member: String,
        argc: u8,
    },
    /// Return the top of the stack.
    Ret,
}

/// One method in a type image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodImage {
    pub name: String,
    pub visibility: Visibility,
    pub params: Vec<String>,
    pub code: Vec<Op>,
}

/// The compiled form of one type: the payload of a single artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeImage {
    /// Fully qualified name, `namespace.Simple`.
    pub name: String,
    pub methods: Vec<MethodImage>,
}

impl TypeImage {
    pub fn namespace(&self) -> &str {
        namespace_of(&self.name)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<TypeImage> {
        serde_json::from_slice(bytes)
    }
}

/// The namespace portion of a qualified name; empty for unqualified names.
pub fn namespace_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
}
