//! Label table: symbolic label names to generated markers
//!
//! One marker per distinct name, created on first sight while scanning the
//! tree. Marker ids are dense and follow first-appearance order.

use crate::ast::SyntaxTree;
use crate::codegen::insn::LabelId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    by_name: HashMap<String, LabelId>,
    /// Indexed by `LabelId`
    names: Vec<String>,
    /// Line of the first label node declaring each marker
    lines: Vec<usize>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a marker for every distinct label node name of the tree
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut table = Self::new();
        for (node, name) in tree.labels() {
            table.register(name, node.line);
        }
        log::trace!("label table: {} marker(s)", table.len());
        table
    }

    /// Marker for `name`, created if this is the first time the name is seen
    pub fn register(&mut self, name: &str, line: usize) -> LabelId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = LabelId(self.names.len() as u32);
        self.by_name.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.lines.push(line);
        id
    }

    pub fn get(&self, name: &str) -> Option<LabelId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: LabelId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Line of the first declaration of the marker
    pub fn declared_line(&self, id: LabelId) -> Option<usize> {
        self.lines.get(id.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Markers in id order
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (LabelId(i as u32), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{InsnNode, NodeKind};
    use crate::opcodes::Opcode;

    #[test]
    fn test_one_marker_per_distinct_name() {
        let tree = SyntaxTree::new()
            .with(1, NodeKind::label("A"))
            .with(2, NodeKind::insn(InsnNode::op(Opcode::Nop)))
            .with(3, NodeKind::label("B"))
            .with(4, NodeKind::label("A"));
        let table = LabelTable::build(&tree);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("A"), Some(LabelId(0)));
        assert_eq!(table.get("B"), Some(LabelId(1)));
        assert_eq!(table.declared_line(LabelId(0)), Some(1));
        assert_eq!(table.get("C"), None);
    }

    #[test]
    fn test_name_lookup_is_bijective() {
        let mut table = LabelTable::new();
        let start = table.register("start", 1);
        let end = table.register("end", 2);
        assert_eq!(table.name(start), Some("start"));
        assert_eq!(table.name(end), Some("end"));
        assert_eq!(table.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![start, end]);
    }
}
