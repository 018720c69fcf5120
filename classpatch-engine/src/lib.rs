//! Load-time patch engine for compiled class units.
//!
//! The engine rewrites method bodies in an already-built class library
//! without touching its source: a host pipeline hands a [`ClassUnit`] to the
//! [`Registry`], which applies every registered transform for that class
//! name in registration order. Transforms locate their injection points
//! structurally (opcode, constant, symbolic reference) rather than by fixed
//! offset, so the same transform keeps working across releases that reshape
//! the target method.
//!
//! Absence of a pattern is an expected condition, reported as
//! [`Outcome::PatternNotFound`] and never as an error; structural damage
//! (dangling label, stack underflow, unresolved symbol) is fatal for the
//! class being patched and aborts its pass.

mod class;
mod dispatch;
mod edit;
mod error;
mod locator;
mod method;
mod synth;

pub use class::{ClassUnit, FieldDef};
pub use dispatch::{DispatchReport, Outcome, Registry, TransformFn};
pub use error::{EngineError, Result};
pub use locator::{Pattern, find, find_after, find_all, find_seq};
pub use method::{ExceptionRange, LocalVariable, MethodBody, MethodSig};
pub use synth::{CallKind, MethodBuilder, forwarder};

pub use classpatch_insn as insn;
