//! Code generation: syntax tree to instruction sequence
//!
//! The passes run in a fixed order: aliases, labels, exception ranges,
//! variables, then instruction generation. Each pass only reads the tables
//! built by the ones before it.

pub mod alias;
pub mod compilation;
pub mod descriptor;
pub mod exceptions;
pub mod flag;
pub mod gen;
pub mod insn;
pub mod labels;
pub mod method;
pub mod variables;

pub use alias::AliasTable;
pub use compilation::{CompileContext, MethodCompilation};
pub use exceptions::ExceptionRange;
pub use insn::{Constant, Handle, Insn, LabelId};
pub use labels::LabelTable;
pub use method::{CompiledMethod, LocalVariable, MethodDefinition};
pub use variables::{BaselineVariable, Variables};
