// Common test utilities
#![allow(dead_code)]

use jasm::ast::{DefinitionNode, InsnNode, Modifier, NodeKind, Param, ParseResult, SyntaxTree};
use jasm::opcodes::Opcode;

/// Install a test logger once; repeated calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a syntax tree with one node per line, starting at line 1
pub struct Body {
    tree: SyntaxTree,
    line: usize,
}

impl Body {
    /// Tree opened by a method definition
    pub fn method(modifiers: Vec<Modifier>, name: &str, params: Vec<Param>, ret: &str) -> Self {
        Body {
            tree: SyntaxTree::new(),
            line: 0,
        }
        .node(NodeKind::Definition(DefinitionNode::new(modifiers, name, params, ret)))
    }

    /// `static void name()`
    pub fn static_void(name: &str) -> Self {
        Self::method(vec![Modifier::Public, Modifier::Static], name, vec![], "V")
    }

    pub fn node(mut self, kind: NodeKind) -> Self {
        self.line += 1;
        self.tree.push(self.line, kind);
        self
    }

    pub fn label(self, name: &str) -> Self {
        self.node(NodeKind::label(name))
    }

    pub fn op(self, op: Opcode) -> Self {
        self.node(NodeKind::insn(InsnNode::op(op)))
    }

    pub fn var(self, op: Opcode, name: &str) -> Self {
        self.node(NodeKind::insn(InsnNode::var(op, name)))
    }

    pub fn jump(self, op: Opcode, label: &str) -> Self {
        self.node(NodeKind::insn(InsnNode::jump(op, label)))
    }

    pub fn insn(self, insn: InsnNode) -> Self {
        self.node(NodeKind::insn(insn))
    }

    pub fn try_catch(self, start: &str, end: &str, handler: &str, catch_type: Option<&str>) -> Self {
        self.node(NodeKind::try_catch(start, end, handler, catch_type))
    }

    /// Line the next node will be placed on
    pub fn next_line(&self) -> usize {
        self.line + 1
    }

    pub fn tree(self) -> SyntaxTree {
        self.tree
    }

    pub fn parsed(self) -> ParseResult {
        ParseResult::new(self.tree)
    }
}
