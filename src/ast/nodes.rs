use crate::codegen::flag::access_flags;
use crate::codegen::insn::{Constant, Handle};
use crate::opcodes::Opcode;
use std::fmt;

/// Stable index of a node inside its [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// 1-based source line
    pub line: usize,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Definition(DefinitionNode),
    Label(String),
    Instruction(InsnNode),
    TryCatch(TryCatchNode),
    Alias(AliasNode),
    /// Declared thrown type (internal name)
    Throws(String),
    /// Generic signature of the method
    Signature(String),
}

impl NodeKind {
    pub fn label(name: impl Into<String>) -> Self {
        NodeKind::Label(name.into())
    }

    pub fn insn(insn: InsnNode) -> Self {
        NodeKind::Instruction(insn)
    }

    pub fn throws(type_name: impl Into<String>) -> Self {
        NodeKind::Throws(type_name.into())
    }

    pub fn signature(signature: impl Into<String>) -> Self {
        NodeKind::Signature(signature.into())
    }

    pub fn alias(name: impl Into<String>, value: impl Into<String>) -> Self {
        NodeKind::Alias(AliasNode {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn try_catch(
        start: impl Into<String>,
        end: impl Into<String>,
        handler: impl Into<String>,
        catch_type: Option<&str>,
    ) -> Self {
        NodeKind::TryCatch(TryCatchNode {
            start: start.into(),
            end: end.into(),
            handler: handler.into(),
            catch_type: catch_type.map(str::to_string),
        })
    }
}

/// Method modifiers as written in the definition statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Synchronized,
    Bridge,
    Varargs,
    Native,
    Abstract,
    Strict,
    Synthetic,
}

impl Modifier {
    pub fn mask(self) -> u16 {
        match self {
            Modifier::Public => access_flags::ACC_PUBLIC,
            Modifier::Private => access_flags::ACC_PRIVATE,
            Modifier::Protected => access_flags::ACC_PROTECTED,
            Modifier::Static => access_flags::ACC_STATIC,
            Modifier::Final => access_flags::ACC_FINAL,
            Modifier::Synchronized => access_flags::ACC_SYNCHRONIZED,
            Modifier::Bridge => access_flags::ACC_BRIDGE,
            Modifier::Varargs => access_flags::ACC_VARARGS,
            Modifier::Native => access_flags::ACC_NATIVE,
            Modifier::Abstract => access_flags::ACC_ABSTRACT,
            Modifier::Strict => access_flags::ACC_STRICT,
            Modifier::Synthetic => access_flags::ACC_SYNTHETIC,
        }
    }
}

/// Named method parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Field descriptor, e.g. `I` or `Ljava/lang/String;`
    pub descriptor: String,
}

impl Param {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// `DEFINE` statement: modifiers, name, parameters and return type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionNode {
    pub modifiers: Vec<Modifier>,
    pub name: String,
    pub params: Vec<Param>,
    pub return_descriptor: String,
}

impl DefinitionNode {
    pub fn new(modifiers: Vec<Modifier>, name: impl Into<String>, params: Vec<Param>, return_descriptor: impl Into<String>) -> Self {
        Self {
            modifiers,
            name: name.into(),
            params,
            return_descriptor: return_descriptor.into(),
        }
    }

    pub fn modifier_mask(&self) -> u16 {
        self.modifiers.iter().fold(0, |mask, m| mask | m.mask())
    }

    /// Method descriptor assembled from parameter and return descriptors
    pub fn descriptor(&self) -> String {
        let mut desc = String::from("(");
        for p in &self.params {
            desc.push_str(&p.descriptor);
        }
        desc.push(')');
        desc.push_str(&self.return_descriptor);
        desc
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatchNode {
    pub start: String,
    pub end: String,
    pub handler: String,
    /// Internal name of the caught type; `None` catches everything
    pub catch_type: Option<String>,
}

/// `ALIAS name "value"`: textual substitution of identifier operands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasNode {
    pub name: String,
    pub value: String,
}

/// Instruction statement. Every variant compiles to exactly one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum InsnNode {
    /// Operand-less instruction
    Op(Opcode),
    /// `BIPUSH`, `SIPUSH`, `NEWARRAY`
    Int { op: Opcode, value: i32 },
    /// Local variable access by name or raw slot number
    Var { op: Opcode, var: String },
    Iinc { var: String, incr: i32 },
    Jump { op: Opcode, label: String },
    Ldc(Constant),
    /// `NEW`, `ANEWARRAY`, `CHECKCAST`, `INSTANCEOF`
    Type { op: Opcode, desc: String },
    Field {
        op: Opcode,
        owner: String,
        name: String,
        desc: String,
    },
    Method {
        op: Opcode,
        owner: String,
        name: String,
        desc: String,
        itf: bool,
    },
    InvokeDynamic {
        name: String,
        desc: String,
        bsm: Handle,
        bsm_args: Vec<Constant>,
    },
    TableSwitch {
        min: i32,
        max: i32,
        dflt: String,
        labels: Vec<String>,
    },
    LookupSwitch {
        dflt: String,
        keys: Vec<i32>,
        labels: Vec<String>,
    },
    MultiANewArray { desc: String, dims: u8 },
    /// `LINE label number`
    Line { label: String, line: u32 },
}

impl InsnNode {
    pub fn op(op: Opcode) -> Self {
        InsnNode::Op(op)
    }

    pub fn int(op: Opcode, value: i32) -> Self {
        InsnNode::Int { op, value }
    }

    pub fn var(op: Opcode, var: impl Into<String>) -> Self {
        InsnNode::Var { op, var: var.into() }
    }

    pub fn iinc(var: impl Into<String>, incr: i32) -> Self {
        InsnNode::Iinc { var: var.into(), incr }
    }

    pub fn jump(op: Opcode, label: impl Into<String>) -> Self {
        InsnNode::Jump { op, label: label.into() }
    }

    pub fn ldc(constant: Constant) -> Self {
        InsnNode::Ldc(constant)
    }

    pub fn type_insn(op: Opcode, desc: impl Into<String>) -> Self {
        InsnNode::Type { op, desc: desc.into() }
    }

    pub fn field(op: Opcode, owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        InsnNode::Field {
            op,
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
        }
    }

    pub fn method(op: Opcode, owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>) -> Self {
        InsnNode::Method {
            op,
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
            itf: op == Opcode::Invokeinterface,
        }
    }

    pub fn line(label: impl Into<String>, line: u32) -> Self {
        InsnNode::Line { label: label.into(), line }
    }

    /// Opcode of the statement; `LINE` has none
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            InsnNode::Op(op)
            | InsnNode::Int { op, .. }
            | InsnNode::Var { op, .. }
            | InsnNode::Jump { op, .. }
            | InsnNode::Type { op, .. }
            | InsnNode::Field { op, .. }
            | InsnNode::Method { op, .. } => Some(*op),
            InsnNode::Iinc { .. } => Some(Opcode::Iinc),
            InsnNode::Ldc(_) => Some(Opcode::Ldc),
            InsnNode::InvokeDynamic { .. } => Some(Opcode::Invokedynamic),
            InsnNode::TableSwitch { .. } => Some(Opcode::Tableswitch),
            InsnNode::LookupSwitch { .. } => Some(Opcode::Lookupswitch),
            InsnNode::MultiANewArray { .. } => Some(Opcode::Multianewarray),
            InsnNode::Line { .. } => None,
        }
    }
}

/// Flat, ordered syntax tree of one method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Append a node; ids are assigned in insertion order
    pub fn push(&mut self, line: usize, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { id, line, kind });
        id
    }

    /// Chaining form of [`SyntaxTree::push`]
    pub fn with(mut self, line: usize, kind: NodeKind) -> Self {
        self.push(line, kind);
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First definition statement
    pub fn definition(&self) -> Option<(&Node, &DefinitionNode)> {
        self.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::Definition(def) => Some((n, def)),
            _ => None,
        })
    }

    pub fn signature(&self) -> Option<&str> {
        self.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::Signature(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn throws(&self) -> impl Iterator<Item = (&Node, &str)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::Throws(t) => Some((n, t.as_str())),
            _ => None,
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = (&Node, &str)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::Label(name) => Some((n, name.as_str())),
            _ => None,
        })
    }

    pub fn try_catches(&self) -> impl Iterator<Item = (&Node, &TryCatchNode)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::TryCatch(tc) => Some((n, tc)),
            _ => None,
        })
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&Node, &AliasNode)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::Alias(alias) => Some((n, alias)),
            _ => None,
        })
    }

    pub fn instructions(&self) -> impl Iterator<Item = (&Node, &InsnNode)> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::Instruction(insn) => Some((n, insn)),
            _ => None,
        })
    }
}
