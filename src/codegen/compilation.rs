//! Per-compile state shared by the code generation passes

use crate::ast::{Node, NodeId};
use crate::codegen::alias::AliasTable;
use crate::codegen::insn::LabelId;
use crate::codegen::labels::LabelTable;
use crate::codegen::variables::Variables;
use crate::error::{Error, LabelSite, Result};
use std::collections::{BTreeMap, HashMap};

/// Tables built before code generation plus the node/instruction bookkeeping
/// filled while instructions are emitted
#[derive(Debug, Clone)]
pub struct MethodCompilation {
    labels: LabelTable,
    variables: Variables,
    aliases: AliasTable,
    /// Indexed by instruction position
    insn_nodes: Vec<NodeId>,
    insn_lines: Vec<usize>,
    node_to_insn: HashMap<NodeId, usize>,
    /// First instruction emitted at each source line
    line_to_insn: BTreeMap<usize, usize>,
}

impl MethodCompilation {
    pub fn new(labels: LabelTable, variables: Variables, aliases: AliasTable) -> Self {
        Self {
            labels,
            variables,
            aliases,
            insn_nodes: Vec::new(),
            insn_lines: Vec::new(),
            node_to_insn: HashMap::new(),
            line_to_insn: BTreeMap::new(),
        }
    }

    /// Record that the next instruction position was generated from `node`
    pub fn assign_instruction(&mut self, node: &Node) -> usize {
        let index = self.insn_nodes.len();
        self.insn_nodes.push(node.id);
        self.insn_lines.push(node.line);
        self.node_to_insn.insert(node.id, index);
        self.line_to_insn.entry(node.line).or_insert(index);
        index
    }

    pub fn context(&self, line: usize) -> CompileContext<'_> {
        CompileContext {
            labels: &self.labels,
            variables: &self.variables,
            aliases: &self.aliases,
            line,
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Source line of the instruction at `index`
    pub fn line_of(&self, index: usize) -> Option<usize> {
        self.insn_lines.get(index).copied()
    }

    /// First instruction generated from `line`
    pub fn insn_at_line(&self, line: usize) -> Option<usize> {
        self.line_to_insn.get(&line).copied()
    }

    pub fn node_of(&self, index: usize) -> Option<NodeId> {
        self.insn_nodes.get(index).copied()
    }

    pub fn insn_of(&self, node: NodeId) -> Option<usize> {
        self.node_to_insn.get(&node).copied()
    }

    /// Number of instructions registered so far
    pub fn len(&self) -> usize {
        self.insn_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insn_nodes.is_empty()
    }
}

/// Read-only view handed to each instruction node while it compiles
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    labels: &'a LabelTable,
    variables: &'a Variables,
    aliases: &'a AliasTable,
    line: usize,
}

impl<'a> CompileContext<'a> {
    /// Source line of the node being compiled
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn resolve<'b>(&'b self, name: &'b str) -> &'b str {
        self.aliases.resolve(name)
    }

    /// Marker of a label operand
    pub fn label(&self, name: &str) -> Result<LabelId> {
        let name = self.resolve(name);
        self.labels
            .get(name)
            .ok_or_else(|| Error::unresolved_label(LabelSite::Operand, name, self.line))
    }

    /// Slot of a variable operand
    pub fn slot(&self, name: &str) -> Result<u16> {
        self.variables.slot(self.resolve(name), self.line)
    }
}
