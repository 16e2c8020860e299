//! Method assembler: drives every pass from syntax tree to compiled method

use crate::ast::ParseResult;
use crate::codegen::alias::AliasTable;
use crate::codegen::compilation::MethodCompilation;
use crate::codegen::exceptions::build_ranges;
use crate::codegen::gen::generate;
use crate::codegen::labels::LabelTable;
use crate::codegen::method::{CompiledMethod, MethodDefinition};
use crate::codegen::variables::{BaselineVariable, Variables};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::verify::{Analyzer, Frame};

/// Everything one compilation produced
#[derive(Debug, Clone)]
pub struct Assembly {
    pub method: CompiledMethod,
    /// Frame before each instruction; `None` when verification is off or the method is abstract
    pub frames: Option<Vec<Option<Frame>>>,
    /// Node and line bookkeeping; `None` for abstract methods
    pub compilation: Option<MethodCompilation>,
}

impl Assembly {
    /// Source line the instruction at `index` was generated from
    pub fn line_of(&self, index: usize) -> Option<usize> {
        self.compilation.as_ref()?.line_of(index)
    }

    /// Index of the first instruction generated from `line`
    pub fn insn_at_line(&self, line: usize) -> Option<usize> {
        self.compilation.as_ref()?.insn_at_line(line)
    }
}

/// Assembles methods declared by one type
#[derive(Debug, Clone)]
pub struct MethodAssembler {
    declaring_type: String,
    config: Config,
    default_variables: Vec<BaselineVariable>,
}

impl MethodAssembler {
    /// `declaring_type` is the internal name of the class declaring the methods
    pub fn new(declaring_type: impl Into<String>, config: Config) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            config,
            default_variables: Vec::new(),
        }
    }

    /// Variables of an earlier disassembly to use as a baseline
    pub fn with_default_variables(mut self, variables: Vec<BaselineVariable>) -> Self {
        self.default_variables = variables;
        self
    }

    pub fn set_default_variables(&mut self, variables: Vec<BaselineVariable>) {
        self.default_variables = variables;
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compile the parsed method
    pub fn compile(&self, result: &ParseResult) -> Result<Assembly> {
        if let Some(first) = result.problems.first() {
            return Err(Error::Syntax {
                line: first.line,
                problems: result.problems.clone(),
            });
        }
        let tree = &result.tree;
        let aliases = AliasTable::build(tree);
        let definition = MethodDefinition::from_tree(tree, &aliases)?;
        log::debug!(
            "assembling {}.{}{}",
            self.declaring_type,
            definition.name,
            definition.descriptor
        );
        if definition.is_abstract() {
            return Ok(Assembly {
                method: CompiledMethod::shell(&definition),
                frames: None,
                compilation: None,
            });
        }

        let labels = LabelTable::build(tree);
        let try_catch_blocks = build_ranges(tree, &labels, &aliases)?;

        let mut variables = Variables::new(definition.is_static(), &self.declaring_type);
        variables.populate_defaults(&self.default_variables);
        variables.add_params(&definition.params);
        variables.visit(tree, &aliases)?;

        let mut compilation = MethodCompilation::new(labels, variables, aliases);
        let instructions = generate(tree, &mut compilation)?;

        let mut method = CompiledMethod::shell(&definition);
        method.instructions = instructions;
        method.try_catch_blocks = try_catch_blocks;
        method.max_stack = self.config.max_stack;
        method.max_locals = compilation.variables().max();

        let frames = if self.config.verify {
            let frames = self.verify(&method, &compilation)?;
            compilation.variables_mut().visit_with_frames(&frames);
            Some(frames)
        } else {
            None
        };
        if self.config.variables {
            method.local_variables = Some(compilation.variables().local_variables(&method.instructions));
        }
        log::debug!(
            "assembled {}{}: {} instruction(s), {} try-catch block(s), max_locals {}",
            method.name,
            method.descriptor,
            method.instructions.len(),
            method.try_catch_blocks.len(),
            method.max_locals
        );
        Ok(Assembly {
            method,
            frames,
            compilation: Some(compilation),
        })
    }

    fn verify(&self, method: &CompiledMethod, compilation: &MethodCompilation) -> Result<Vec<Option<Frame>>> {
        Analyzer::new(self.declaring_type.as_str())
            .with_max_stack(self.config.max_stack)
            .with_max_iterations(self.config.max_verify_iterations)
            .analyze(method)
            .map_err(|e| Error::Verification {
                index: e.index,
                line: compilation.line_of(e.index),
                insn: method
                    .instructions
                    .get(e.index)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                rule: e.rule,
            })
    }
}

/// Holder for the most recent successful compile, for "prior diagnostic" lookups
#[derive(Debug, Default)]
pub struct LastCompile {
    last: Option<Assembly>,
}

impl LastCompile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile with `assembler`; on success the result replaces the held one
    pub fn compile_and_keep(&mut self, assembler: &MethodAssembler, result: &ParseResult) -> Result<&Assembly> {
        let assembly = assembler.compile(result)?;
        let kept: &Assembly = self.last.insert(assembly);
        Ok(kept)
    }

    pub fn get(&self) -> Option<&Assembly> {
        self.last.as_ref()
    }

    pub fn method(&self) -> Option<&CompiledMethod> {
        self.last.as_ref().map(|a| &a.method)
    }

    pub fn frames(&self) -> Option<&[Option<Frame>]> {
        self.last.as_ref()?.frames.as_deref()
    }

    pub fn line_of(&self, index: usize) -> Option<usize> {
        self.last.as_ref()?.line_of(index)
    }

    pub fn insn_at_line(&self, line: usize) -> Option<usize> {
        self.last.as_ref()?.insn_at_line(line)
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DefinitionNode, InsnNode, Modifier, NodeKind, SyntaxProblem, SyntaxTree};
    use crate::opcodes::Opcode;

    fn definition(modifiers: Vec<Modifier>) -> NodeKind {
        NodeKind::Definition(DefinitionNode::new(modifiers, "run", vec![], "V"))
    }

    #[test]
    fn test_syntax_problems_abort() {
        let result = ParseResult::with_problems(
            SyntaxTree::new(),
            vec![SyntaxProblem::new(3, "unexpected token"), SyntaxProblem::new(5, "eof")],
        );
        match MethodAssembler::new("Demo", Config::default()).compile(&result) {
            Err(Error::Syntax { line, problems }) => {
                assert_eq!(line, 3);
                assert_eq!(problems.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_abstract_method_is_a_shell() {
        let tree = SyntaxTree::new()
            .with(1, definition(vec![Modifier::Public, Modifier::Abstract]))
            .with(2, NodeKind::label("A"))
            .with(3, NodeKind::insn(InsnNode::op(Opcode::Return)));
        let assembly = MethodAssembler::new("Demo", Config::default())
            .compile(&tree.into())
            .expect("compiles");
        assert!(assembly.method.instructions.is_empty());
        assert_eq!(assembly.method.max_stack, 0);
        assert_eq!(assembly.method.max_locals, 0);
        assert!(assembly.frames.is_none());
        assert!(assembly.compilation.is_none());
    }

    #[test]
    fn test_verification_error_carries_line() {
        let tree = SyntaxTree::new()
            .with(1, definition(vec![Modifier::Static]))
            .with(2, NodeKind::insn(InsnNode::op(Opcode::Iconst0)))
            .with(3, NodeKind::insn(InsnNode::op(Opcode::Return)))
            .with(4, NodeKind::insn(InsnNode::op(Opcode::Pop)));
        let broken = SyntaxTree::new()
            .with(1, definition(vec![Modifier::Static]))
            .with(2, NodeKind::insn(InsnNode::op(Opcode::Pop)))
            .with(3, NodeKind::insn(InsnNode::op(Opcode::Return)));
        let assembler = MethodAssembler::new("Demo", Config::default());
        assert!(assembler.compile(&tree.into()).is_ok());
        match assembler.compile(&broken.into()) {
            Err(Error::Verification { index, line, insn, .. }) => {
                assert_eq!(index, 0);
                assert_eq!(line, Some(2));
                assert_eq!(insn, "POP");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_last_compile_keeps_success_only() {
        let good = SyntaxTree::new()
            .with(1, definition(vec![Modifier::Static]))
            .with(2, NodeKind::insn(InsnNode::op(Opcode::Nop)))
            .with(3, NodeKind::insn(InsnNode::op(Opcode::Return)));
        let bad = SyntaxTree::new().with(1, NodeKind::insn(InsnNode::op(Opcode::Return)));
        let assembler = MethodAssembler::new("Demo", Config::default());
        let mut last = LastCompile::new();
        last.compile_and_keep(&assembler, &good.into()).expect("compiles");
        assert!(last.compile_and_keep(&assembler, &bad.into()).is_err());
        assert_eq!(last.method().map(|m| m.instructions.len()), Some(2));
        assert_eq!(last.insn_at_line(3), Some(1));
        assert_eq!(last.line_of(0), Some(2));
        assert_eq!(last.frames().map(<[_]>::len), Some(2));
    }
}
