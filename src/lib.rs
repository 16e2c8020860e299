//! JVM method assembler (jasm)
//!
//! Turns the syntax tree of one method body into a compiled method: resolved
//! labels, exception ranges, local variable slots and instructions, checked by
//! an abstract-interpretation verifier.
//!
//! ## Architecture
//!
//! - **ast**: syntax tree of a method body, as produced by a parser
//! - **codegen**: label, alias and variable tables, instruction compilation
//! - **verify**: dataflow analysis computing a frame per instruction
//! - **assembler**: drives every pass and keeps the last result
//! - **vm**: bridge running assembled code inside a virtual machine
//!
//! ## Compilation Flow
//!
//! ```text
//! ParseResult → Definition → Labels → Try-catch ranges → Variables
//!             → Instructions → Verifier → Variable refinement → CompiledMethod
//! ```

pub mod assembler;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod opcodes;
pub mod verify;
pub mod vm;

pub use assembler::{Assembly, LastCompile, MethodAssembler};
pub use config::Config;
pub use error::{Error, Result};
