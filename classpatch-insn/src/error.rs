use crate::opcode::Opcode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InsnError {
    #[error("{0} expects {1} operand(s), got {2}")]
    OperandArity(Opcode, usize, usize),

    #[error("{0} operand must be {1}")]
    OperandType(Opcode, &'static str),

    #[error("invalid type descriptor: {0:?}")]
    InvalidDescriptor(String),

    #[error("invalid method descriptor: {0:?}")]
    InvalidMethodDescriptor(String),
}
