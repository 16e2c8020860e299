//! Concrete instruction records produced by the compiler

use crate::opcodes::Opcode;
use std::fmt;

/// Generated position marker. Ids are dense per compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Method handle reference kinds (JVMS 4.4.8)
pub mod handle_kinds {
    pub const H_GETFIELD: u8 = 1;
    pub const H_GETSTATIC: u8 = 2;
    pub const H_PUTFIELD: u8 = 3;
    pub const H_PUTSTATIC: u8 = 4;
    pub const H_INVOKEVIRTUAL: u8 = 5;
    pub const H_INVOKESTATIC: u8 = 6;
    pub const H_INVOKESPECIAL: u8 = 7;
    pub const H_NEWINVOKESPECIAL: u8 = 8;
    pub const H_INVOKEINTERFACE: u8 = 9;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: u8,
    pub owner: String,
    pub name: String,
    pub desc: String,
    pub itf: bool,
}

impl Handle {
    pub fn new(kind: u8, owner: impl Into<String>, name: impl Into<String>, desc: impl Into<String>, itf: bool) -> Self {
        Self {
            kind,
            owner: owner.into(),
            name: name.into(),
            desc: desc.into(),
            itf,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle[{}] {}.{}{}", self.kind, self.owner, self.name, self.desc)
    }
}

/// Loadable constant
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Class literal by internal name or array descriptor
    Type(String),
    /// Method type by method descriptor
    MethodType(String),
    Handle(Handle),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}L", v),
            Constant::Float(v) => write!(f, "{}F", v),
            Constant::Double(v) => write!(f, "{}D", v),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::Type(t) => write!(f, "{}.class", t),
            Constant::MethodType(d) => write!(f, "methodtype {}", d),
            Constant::Handle(h) => write!(f, "{}", h),
        }
    }
}

/// One entry of the compiled instruction sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Position marker; no runtime effect
    Label(LabelId),
    /// Line-number marker bound to a label
    Line { line: u32, start: LabelId },
    Simple(Opcode),
    Int { op: Opcode, operand: i32 },
    Var { op: Opcode, slot: u16 },
    Iinc { slot: u16, incr: i16 },
    Jump { op: Opcode, target: LabelId },
    Ldc(Constant),
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
        dflt: LabelId,
        targets: Vec<LabelId>,
    },
    LookupSwitch {
        dflt: LabelId,
        keys: Vec<i32>,
        targets: Vec<LabelId>,
    },
    MultiANewArray { desc: String, dims: u8 },
}

impl Insn {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Insn::Label(_) | Insn::Line { .. } => None,
            Insn::Simple(op)
            | Insn::Int { op, .. }
            | Insn::Var { op, .. }
            | Insn::Jump { op, .. }
            | Insn::Type { op, .. }
            | Insn::Field { op, .. }
            | Insn::Method { op, .. } => Some(*op),
            Insn::Iinc { .. } => Some(Opcode::Iinc),
            Insn::Ldc(_) => Some(Opcode::Ldc),
            Insn::InvokeDynamic { .. } => Some(Opcode::Invokedynamic),
            Insn::TableSwitch { .. } => Some(Opcode::Tableswitch),
            Insn::LookupSwitch { .. } => Some(Opcode::Lookupswitch),
            Insn::MultiANewArray { .. } => Some(Opcode::Multianewarray),
        }
    }

    /// Markers occupy a position in the sequence but never execute
    pub fn is_marker(&self) -> bool {
        matches!(self, Insn::Label(_) | Insn::Line { .. })
    }

    /// Every label this instruction refers to, in operand order
    pub fn label_refs(&self) -> Vec<LabelId> {
        match self {
            Insn::Line { start, .. } => vec![*start],
            Insn::Jump { target, .. } => vec![*target],
            Insn::TableSwitch { dflt, targets, .. } | Insn::LookupSwitch { dflt, targets, .. } => {
                let mut refs = Vec::with_capacity(targets.len() + 1);
                refs.push(*dflt);
                refs.extend(targets.iter().copied());
                refs
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Label(id) => write!(f, "{}:", id),
            Insn::Line { line, start } => write!(f, "LINE {} {}", start, line),
            Insn::Simple(op) => write!(f, "{}", op),
            Insn::Int { op, operand } => write!(f, "{} {}", op, operand),
            Insn::Var { op, slot } => write!(f, "{} {}", op, slot),
            Insn::Iinc { slot, incr } => write!(f, "IINC {} {}", slot, incr),
            Insn::Jump { op, target } => write!(f, "{} {}", op, target),
            Insn::Ldc(c) => write!(f, "LDC {}", c),
            Insn::Type { op, desc } => write!(f, "{} {}", op, desc),
            Insn::Field { op, owner, name, desc } => write!(f, "{} {}.{} {}", op, owner, name, desc),
            Insn::Method { op, owner, name, desc, .. } => write!(f, "{} {}.{}{}", op, owner, name, desc),
            Insn::InvokeDynamic { name, desc, bsm, .. } => write!(f, "INVOKEDYNAMIC {}{} {}", name, desc, bsm),
            Insn::TableSwitch { min, max, dflt, targets } => {
                write!(f, "TABLESWITCH [{}-{}] ", min, max)?;
                for t in targets {
                    write!(f, "{} ", t)?;
                }
                write!(f, "default {}", dflt)
            }
            Insn::LookupSwitch { dflt, keys, targets } => {
                write!(f, "LOOKUPSWITCH ")?;
                for (k, t) in keys.iter().zip(targets) {
                    write!(f, "{}={} ", k, t)?;
                }
                write!(f, "default {}", dflt)
            }
            Insn::MultiANewArray { desc, dims } => write!(f, "MULTIANEWARRAY {} {}", desc, dims),
        }
    }
}
