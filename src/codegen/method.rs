//! Method header and compiled method aggregate

use crate::ast::{Param, SyntaxTree};
use crate::codegen::alias::AliasTable;
use crate::codegen::descriptor::{FieldType, MethodDescriptor};
use crate::codegen::exceptions::ExceptionRange;
use crate::codegen::flag::access_flags;
use crate::codegen::insn::{Insn, LabelId};
use crate::error::{Error, Result};

/// Header of the method being assembled, derived once from the definition statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefinition {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// Declared thrown types, internal names in declaration order
    pub exceptions: Vec<String>,
    pub params: Vec<Param>,
    /// Line of the definition statement
    pub line: usize,
}

impl MethodDefinition {
    /// Read the first definition statement plus signature and throws nodes
    pub fn from_tree(tree: &SyntaxTree, aliases: &AliasTable) -> Result<Self> {
        let (node, def) = tree.definition().ok_or(Error::MissingDefinition)?;
        let params: Vec<Param> = def
            .params
            .iter()
            .map(|p| Param::new(p.name.clone(), aliases.resolve(&p.descriptor)))
            .collect();
        for p in &params {
            FieldType::parse(&p.descriptor).map_err(|source| Error::Descriptor { line: node.line, source })?;
        }
        let mut descriptor = String::from("(");
        for p in &params {
            descriptor.push_str(&p.descriptor);
        }
        descriptor.push(')');
        descriptor.push_str(aliases.resolve(&def.return_descriptor));
        MethodDescriptor::parse(&descriptor).map_err(|source| Error::Descriptor { line: node.line, source })?;

        Ok(Self {
            access: def.modifier_mask(),
            name: def.name.clone(),
            descriptor,
            signature: tree.signature().map(str::to_string),
            exceptions: tree
                .throws()
                .map(|(_, t)| aliases.resolve(t).to_string())
                .collect(),
            params,
            line: node.line,
        })
    }

    pub fn is_static(&self) -> bool {
        access_flags::is_static(self.access)
    }

    pub fn is_abstract(&self) -> bool {
        access_flags::is_abstract(self.access)
    }
}

/// Entry of the local variable table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub index: u16,
    pub descriptor: String,
    pub start: LabelId,
    pub end: LabelId,
}

/// Output of one compilation, ready for a class-file writer
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledMethod {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    pub instructions: Vec<Insn>,
    pub try_catch_blocks: Vec<ExceptionRange>,
    /// `None` when variable emission is turned off
    pub local_variables: Option<Vec<LocalVariable>>,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl CompiledMethod {
    /// Header-only method: no code, no variables
    pub fn shell(def: &MethodDefinition) -> Self {
        Self {
            access: def.access,
            name: def.name.clone(),
            descriptor: def.descriptor.clone(),
            signature: def.signature.clone(),
            exceptions: def.exceptions.clone(),
            instructions: Vec::new(),
            try_catch_blocks: Vec::new(),
            local_variables: None,
            max_stack: 0,
            max_locals: 0,
        }
    }

    /// Number of label markers in the instruction sequence
    pub fn label_count(&self) -> usize {
        self.instructions.iter().filter(|i| matches!(i, Insn::Label(_))).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DefinitionNode, Modifier, NodeKind};

    #[test]
    fn test_definition_collects_header() {
        let tree = SyntaxTree::new()
            .with(
                1,
                NodeKind::Definition(DefinitionNode::new(
                    vec![Modifier::Public, Modifier::Static],
                    "parse",
                    vec![Param::new("text", "STR")],
                    "I",
                )),
            )
            .with(2, NodeKind::alias("STR", "Ljava/lang/String;"))
            .with(3, NodeKind::throws("java/io/IOException"))
            .with(4, NodeKind::signature("(Ljava/lang/String;)I"));
        let aliases = AliasTable::build(&tree);
        let def = MethodDefinition::from_tree(&tree, &aliases).expect("definition");
        assert_eq!(def.descriptor, "(Ljava/lang/String;)I");
        assert_eq!(def.exceptions, vec!["java/io/IOException".to_string()]);
        assert_eq!(def.signature.as_deref(), Some("(Ljava/lang/String;)I"));
        assert!(def.is_static());
        assert!(!def.is_abstract());
    }

    #[test]
    fn test_missing_definition() {
        let tree = SyntaxTree::new().with(1, NodeKind::label("A"));
        assert!(matches!(
            MethodDefinition::from_tree(&tree, &AliasTable::default()),
            Err(Error::MissingDefinition)
        ));
    }

    #[test]
    fn test_bad_parameter_descriptor() {
        let tree = SyntaxTree::new().with(
            5,
            NodeKind::Definition(DefinitionNode::new(vec![], "m", vec![Param::new("x", "Q")], "V")),
        );
        match MethodDefinition::from_tree(&tree, &AliasTable::default()) {
            Err(Error::Descriptor { line, .. }) => assert_eq!(line, 5),
            other => panic!("unexpected {:?}", other),
        }
    }
}
