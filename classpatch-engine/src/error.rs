use classpatch_insn::InsnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed instruction or descriptor.
    #[error(transparent)]
    Insn(#[from] InsnError),

    /// An inserted instruction references a member of the target class that
    /// the class does not declare.
    #[error("unresolved symbol {owner}.{name}:{descriptor} in {class}.{method} at index {index}")]
    UnresolvedSymbol {
        class: String,
        method: String,
        index: usize,
        owner: String,
        name: String,
        descriptor: String,
    },

    /// A structural check failed: dangling label, stack underflow, declared
    /// capacity below the real requirement.
    #[error("invariant violation in {class}.{method}: {detail}")]
    InvariantViolation {
        class: String,
        method: String,
        detail: String,
    },

    #[error("no method {name}{descriptor} in class {class}")]
    NoSuchMethod {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("duplicate method {name}{descriptor} in class {class}")]
    DuplicateMethod {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("index {index} out of bounds in {class}.{method} ({len} instructions)")]
    IndexOutOfBounds {
        class: String,
        method: String,
        index: usize,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
