//! JVM-style instruction model for the classpatch engine.
//!
//! This crate provides the closed opcode set, typed operands, symbolic
//! member references, and type/method descriptors used to represent and
//! rewrite compiled method bodies. Instructions are immutable value objects:
//! construction validates operand shape, and equality is structural, so
//! pattern matching can compare instructions by value.

mod descriptor;
mod error;
mod flags;
mod insn;
mod opcode;

pub use descriptor::{MethodDescriptor, TypeDescriptor};
pub use error::InsnError;
pub use flags::AccessFlags;
pub use insn::{ConstValue, Instruction, LabelId, MemberRef, Operand, StackEffect};
pub use opcode::{Opcode, OperandShape};
