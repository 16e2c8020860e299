//! Abstract-interpretation verifier for compiled methods
//!
//! The analyzer walks the instruction sequence to a fixed point, computing
//! the frame (locals and operand stack) in effect before every instruction.
//! The first rule violation found stops the analysis.

mod analyzer;
mod frame;

pub use analyzer::Analyzer;
pub use frame::{Frame, Value, OBJECT, THROWABLE};

use crate::codegen::insn::LabelId;

pub type VerifyResult<T> = Result<T, VerifyError>;

/// Rule an instruction or the method layout violated
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyRule {
    #[error("stack underflow: needs {needed} value(s), found {available}")]
    StackUnderflow { needed: usize, available: usize },
    #[error("stack overflow: exceeds {max} slot(s)")]
    StackOverflow { max: u16 },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("incompatible stack values at depth {depth}: {left} and {right}")]
    IncompatibleStackMerge {
        depth: usize,
        left: String,
        right: String,
    },
    #[error("stack height mismatch on merge: {expected} and {found}")]
    StackHeightMismatch { expected: usize, found: usize },
    #[error("local slot {slot} outside of {max_locals} local(s)")]
    LocalOutOfRange { slot: usize, max_locals: usize },
    #[error("local slot {slot} holds no usable value")]
    EmptyLocal { slot: usize },
    #[error("execution falls off the end of the code")]
    FallsOffEnd,
    #[error("return mismatch: method returns {expected}, instruction returns {found}")]
    ReturnMismatch { expected: String, found: String },
    #[error("try-catch block {block} has an empty or inverted range")]
    InvertedRange { block: usize },
    #[error("handler at instruction {handler} is entered with an incompatible stack: {cause}")]
    HandlerReachedOutsideRange { handler: usize, cause: Box<VerifyRule> },
    #[error("label {label} is not placed in the code")]
    UnknownLabel { label: LabelId },
    #[error("{op} cannot operate on a {found} value")]
    IllegalOperandSize { op: String, found: String },
    #[error("no fixed point after {limit} instruction visits")]
    IterationLimit { limit: usize },
}

/// Verification failure at an index of the instruction sequence
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("instruction {index}: {rule}")]
pub struct VerifyError {
    pub index: usize,
    pub rule: VerifyRule,
}

impl VerifyError {
    pub fn new(index: usize, rule: VerifyRule) -> Self {
        Self { index, rule }
    }
}
