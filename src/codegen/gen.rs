//! Instruction generation: syntax nodes to concrete instruction records

use crate::ast::{InsnNode, NodeKind, SyntaxTree};
use crate::codegen::compilation::{CompileContext, MethodCompilation};
use crate::codegen::descriptor::{parse_type_operand, DescriptorError, FieldType, MethodDescriptor};
use crate::codegen::insn::{handle_kinds, Constant, Handle, Insn, LabelId};
use crate::error::{Error, LabelSite, Result};
use crate::opcodes::{array_types, Opcode, OperandShape};
use std::collections::HashMap;

/// Emit the instruction sequence for every node of the tree, in document order.
///
/// Labels emit their marker, instructions their compiled record, every
/// other node kind nothing. Each emitted record is registered with the
/// compilation so it can be traced back to its node and line.
pub fn generate(tree: &SyntaxTree, compilation: &mut MethodCompilation) -> Result<Vec<Insn>> {
    let mut instructions = Vec::new();
    let mut placed: HashMap<LabelId, usize> = HashMap::new();
    for node in tree.nodes() {
        let insn = match &node.kind {
            NodeKind::Label(name) => {
                // declared names are never alias-substituted
                let id = compilation
                    .labels()
                    .get(name)
                    .ok_or_else(|| Error::unresolved_label(LabelSite::Operand, name.as_str(), node.line))?;
                if let Some(&first_line) = placed.get(&id) {
                    return Err(Error::DuplicateLabel {
                        name: name.clone(),
                        line: node.line,
                        first_line,
                    });
                }
                placed.insert(id, node.line);
                Insn::Label(id)
            }
            NodeKind::Instruction(insn) => insn.compile(&compilation.context(node.line))?,
            _ => continue,
        };
        log::trace!("{} line {}: {}", node.id, node.line, insn);
        compilation.assign_instruction(node);
        instructions.push(insn);
    }
    Ok(instructions)
}

impl InsnNode {
    /// Compile the node into exactly one instruction record
    pub fn compile(&self, ctx: &CompileContext<'_>) -> Result<Insn> {
        let line = ctx.line();
        if let Some(op) = self.opcode() {
            check_shape(self, op, line)?;
        }
        let insn = match self {
            InsnNode::Op(op) => Insn::Simple(*op),
            InsnNode::Int { op, value } => {
                check_int_operand(*op, *value, line)?;
                Insn::Int { op: *op, operand: *value }
            }
            InsnNode::Var { op, var } => Insn::Var {
                op: *op,
                slot: ctx.slot(var)?,
            },
            InsnNode::Iinc { var, incr } => {
                let incr = i16::try_from(*incr)
                    .map_err(|_| Error::invalid_operand(line, format!("IINC increment {} out of range", incr)))?;
                Insn::Iinc {
                    slot: ctx.slot(var)?,
                    incr,
                }
            }
            InsnNode::Jump { op, label } => Insn::Jump {
                op: *op,
                target: ctx.label(label)?,
            },
            InsnNode::Ldc(constant) => Insn::Ldc(compile_constant(constant, ctx)?),
            InsnNode::Type { op, desc } => {
                let desc = ctx.resolve(desc);
                parse_type_operand(desc).map_err(|source| Error::Descriptor { line, source })?;
                Insn::Type {
                    op: *op,
                    desc: desc.to_string(),
                }
            }
            InsnNode::Field { op, owner, name, desc } => {
                let owner = ctx.resolve(owner);
                let desc = ctx.resolve(desc);
                parse_type_operand(owner).map_err(|source| Error::Descriptor { line, source })?;
                FieldType::parse(desc).map_err(|source| Error::Descriptor { line, source })?;
                Insn::Field {
                    op: *op,
                    owner: owner.to_string(),
                    name: ctx.resolve(name).to_string(),
                    desc: desc.to_string(),
                }
            }
            InsnNode::Method {
                op,
                owner,
                name,
                desc,
                itf,
            } => {
                let owner = ctx.resolve(owner);
                let desc = ctx.resolve(desc);
                parse_type_operand(owner).map_err(|source| Error::Descriptor { line, source })?;
                MethodDescriptor::parse(desc).map_err(|source| Error::Descriptor { line, source })?;
                Insn::Method {
                    op: *op,
                    owner: owner.to_string(),
                    name: ctx.resolve(name).to_string(),
                    desc: desc.to_string(),
                    itf: *itf,
                }
            }
            InsnNode::InvokeDynamic {
                name,
                desc,
                bsm,
                bsm_args,
            } => {
                let desc = ctx.resolve(desc);
                MethodDescriptor::parse(desc).map_err(|source| Error::Descriptor { line, source })?;
                let args = bsm_args
                    .iter()
                    .map(|arg| compile_constant(arg, ctx))
                    .collect::<Result<Vec<_>>>()?;
                Insn::InvokeDynamic {
                    name: name.clone(),
                    desc: desc.to_string(),
                    bsm: compile_handle(bsm, ctx)?,
                    bsm_args: args,
                }
            }
            InsnNode::TableSwitch { min, max, dflt, labels } => {
                if min > max {
                    return Err(Error::invalid_operand(
                        line,
                        format!("TABLESWITCH range {}..{} is inverted", min, max),
                    ));
                }
                let expected = i64::from(*max) - i64::from(*min) + 1;
                if labels.len() as i64 != expected {
                    return Err(Error::invalid_operand(
                        line,
                        format!("TABLESWITCH needs {} labels, found {}", expected, labels.len()),
                    ));
                }
                Insn::TableSwitch {
                    min: *min,
                    max: *max,
                    dflt: ctx.label(dflt)?,
                    targets: resolve_labels(labels, ctx)?,
                }
            }
            InsnNode::LookupSwitch { dflt, keys, labels } => {
                if keys.len() != labels.len() {
                    return Err(Error::invalid_operand(
                        line,
                        format!("LOOKUPSWITCH has {} keys but {} labels", keys.len(), labels.len()),
                    ));
                }
                if keys.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(Error::invalid_operand(line, "LOOKUPSWITCH keys must be strictly ascending"));
                }
                Insn::LookupSwitch {
                    dflt: ctx.label(dflt)?,
                    keys: keys.clone(),
                    targets: resolve_labels(labels, ctx)?,
                }
            }
            InsnNode::MultiANewArray { desc, dims } => {
                let desc = ctx.resolve(desc);
                let ty = FieldType::parse(desc).map_err(|source| Error::Descriptor { line, source })?;
                let depth = ty.array_dimensions();
                if *dims == 0 || usize::from(*dims) > depth {
                    return Err(Error::invalid_operand(
                        line,
                        format!("MULTIANEWARRAY dimensions {} invalid for {}", dims, desc),
                    ));
                }
                Insn::MultiANewArray {
                    desc: desc.to_string(),
                    dims: *dims,
                }
            }
            InsnNode::Line { label, line: number } => Insn::Line {
                line: *number,
                start: ctx.label(label)?,
            },
        };
        Ok(insn)
    }
}

/// The opcode must belong to the node variant it was written in
fn check_shape(node: &InsnNode, op: Opcode, line: usize) -> Result<()> {
    let expected = match node {
        InsnNode::Op(_) => OperandShape::None,
        InsnNode::Int { .. } => OperandShape::Int,
        InsnNode::Var { .. } => OperandShape::Var,
        InsnNode::Jump { .. } => OperandShape::Jump,
        InsnNode::Type { .. } => OperandShape::Type,
        InsnNode::Field { .. } => OperandShape::Field,
        InsnNode::Method { .. } => OperandShape::Method,
        _ => return Ok(()),
    };
    if op.shape() == expected {
        Ok(())
    } else {
        Err(Error::invalid_operand(
            line,
            format!("{} does not take {:?} operands", op, expected),
        ))
    }
}

fn check_int_operand(op: Opcode, value: i32, line: usize) -> Result<()> {
    let valid = match op {
        Opcode::Bipush => i8::try_from(value).is_ok(),
        Opcode::Sipush => i16::try_from(value).is_ok(),
        Opcode::Newarray => array_types::descriptor(value).is_some(),
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_operand(line, format!("{} operand {} out of range", op, value)))
    }
}

fn resolve_labels(labels: &[String], ctx: &CompileContext<'_>) -> Result<Vec<LabelId>> {
    labels.iter().map(|l| ctx.label(l)).collect()
}

fn compile_constant(constant: &Constant, ctx: &CompileContext<'_>) -> Result<Constant> {
    let line = ctx.line();
    let compiled = match constant {
        Constant::Type(t) => {
            let t = ctx.resolve(t);
            parse_type_operand(t).map_err(|source| Error::Descriptor { line, source })?;
            Constant::Type(t.to_string())
        }
        Constant::MethodType(d) => {
            let d = ctx.resolve(d);
            MethodDescriptor::parse(d).map_err(|source| Error::Descriptor { line, source })?;
            Constant::MethodType(d.to_string())
        }
        Constant::Handle(h) => Constant::Handle(compile_handle(h, ctx)?),
        other => other.clone(),
    };
    Ok(compiled)
}

fn compile_handle(handle: &Handle, ctx: &CompileContext<'_>) -> Result<Handle> {
    let line = ctx.line();
    let owner = ctx.resolve(&handle.owner);
    let desc = ctx.resolve(&handle.desc);
    parse_type_operand(owner).map_err(|source| Error::Descriptor { line, source })?;
    let checked: std::result::Result<(), DescriptorError> = match handle.kind {
        handle_kinds::H_GETFIELD..=handle_kinds::H_PUTSTATIC => FieldType::parse(desc).map(|_| ()),
        handle_kinds::H_INVOKEVIRTUAL..=handle_kinds::H_INVOKEINTERFACE => MethodDescriptor::parse(desc).map(|_| ()),
        kind => {
            return Err(Error::invalid_operand(line, format!("unknown method handle kind {}", kind)));
        }
    };
    checked.map_err(|source| Error::Descriptor { line, source })?;
    Ok(Handle::new(
        handle.kind,
        owner,
        ctx.resolve(&handle.name),
        desc,
        handle.itf,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::alias::AliasTable;
    use crate::codegen::labels::LabelTable;
    use crate::codegen::variables::Variables;
    use crate::error::LabelSite;

    fn compile_one(tree: &SyntaxTree, insn: InsnNode) -> Result<Insn> {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(tree, &AliasTable::build(tree))?;
        let compilation = MethodCompilation::new(LabelTable::build(tree), vars, AliasTable::build(tree));
        let ctx = compilation.context(9);
        insn.compile(&ctx)
    }

    fn operand_error(result: Result<Insn>) -> String {
        match result {
            Err(Error::InvalidOperand { line, message }) => {
                assert_eq!(line, 9);
                message
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_generate_emits_in_document_order() {
        let tree = SyntaxTree::new()
            .with(1, NodeKind::label("A"))
            .with(2, NodeKind::alias("X", "A"))
            .with(3, NodeKind::insn(InsnNode::jump(Opcode::Goto, "X")))
            .with(4, NodeKind::throws("java/lang/Exception"))
            .with(5, NodeKind::insn(InsnNode::op(Opcode::Return)));
        let mut compilation = MethodCompilation::new(
            LabelTable::build(&tree),
            Variables::new(true, "Demo"),
            AliasTable::build(&tree),
        );
        let insns = generate(&tree, &mut compilation).expect("generate");
        assert_eq!(
            insns,
            vec![
                Insn::Label(LabelId(0)),
                Insn::Jump {
                    op: Opcode::Goto,
                    target: LabelId(0)
                },
                Insn::Simple(Opcode::Return),
            ]
        );
        assert_eq!(compilation.line_of(2), Some(5));
    }

    #[test]
    fn test_second_label_placement_fails() {
        let tree = SyntaxTree::new()
            .with(1, NodeKind::label("A"))
            .with(2, NodeKind::insn(InsnNode::op(Opcode::Nop)))
            .with(3, NodeKind::label("A"));
        let mut compilation = MethodCompilation::new(
            LabelTable::build(&tree),
            Variables::new(true, "Demo"),
            AliasTable::default(),
        );
        match generate(&tree, &mut compilation) {
            Err(Error::DuplicateLabel { name, line, first_line }) => {
                assert_eq!(name, "A");
                assert_eq!(line, 3);
                assert_eq!(first_line, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_push_ranges() {
        let tree = SyntaxTree::new();
        assert!(compile_one(&tree, InsnNode::int(Opcode::Bipush, -128)).is_ok());
        assert!(operand_error(compile_one(&tree, InsnNode::int(Opcode::Bipush, 128))).contains("BIPUSH"));
        assert!(compile_one(&tree, InsnNode::int(Opcode::Sipush, 32767)).is_ok());
        operand_error(compile_one(&tree, InsnNode::int(Opcode::Sipush, 40000)));
        operand_error(compile_one(&tree, InsnNode::int(Opcode::Newarray, 3)));
        assert!(compile_one(&tree, InsnNode::int(Opcode::Newarray, array_types::T_INT)).is_ok());
    }

    #[test]
    fn test_shape_mismatch() {
        let tree = SyntaxTree::new();
        operand_error(compile_one(&tree, InsnNode::op(Opcode::Goto)));
        operand_error(compile_one(&tree, InsnNode::int(Opcode::Iadd, 1)));
    }

    #[test]
    fn test_switch_checks() {
        let tree = SyntaxTree::new().with(1, NodeKind::label("A")).with(2, NodeKind::label("B"));
        let table = InsnNode::TableSwitch {
            min: 0,
            max: 2,
            dflt: "B".into(),
            labels: vec!["A".into(), "B".into()],
        };
        assert!(operand_error(compile_one(&tree, table)).contains("needs 3 labels"));
        let lookup = InsnNode::LookupSwitch {
            dflt: "B".into(),
            keys: vec![5, 5],
            labels: vec!["A".into(), "B".into()],
        };
        assert!(operand_error(compile_one(&tree, lookup)).contains("ascending"));
        let ok = InsnNode::LookupSwitch {
            dflt: "B".into(),
            keys: vec![1, 10],
            labels: vec!["A".into(), "B".into()],
        };
        match compile_one(&tree, ok).expect("lookupswitch") {
            Insn::LookupSwitch { dflt, targets, .. } => {
                assert_eq!(dflt, LabelId(1));
                assert_eq!(targets, vec![LabelId(0), LabelId(1)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_jump_target() {
        let tree = SyntaxTree::new();
        match compile_one(&tree, InsnNode::jump(Opcode::Ifeq, "nowhere")) {
            Err(Error::UnresolvedLabel { site, name, .. }) => {
                assert_eq!(site, LabelSite::Operand);
                assert_eq!(name, "nowhere");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_descriptor_validation() {
        let tree = SyntaxTree::new();
        let bad_field = InsnNode::field(Opcode::Getstatic, "java/lang/System", "out", "Ljava/io/PrintStream");
        assert!(matches!(compile_one(&tree, bad_field), Err(Error::Descriptor { line: 9, .. })));
        let bad_owner = InsnNode::method(Opcode::Invokestatic, "java.lang.Math", "abs", "(I)I");
        assert!(matches!(compile_one(&tree, bad_owner), Err(Error::Descriptor { .. })));
        let multi = InsnNode::MultiANewArray {
            desc: "[[I".into(),
            dims: 3,
        };
        operand_error(compile_one(&tree, multi));
    }

    #[test]
    fn test_variable_operands() {
        let tree = SyntaxTree::new().with(1, NodeKind::insn(InsnNode::var(Opcode::Istore, "count")));
        assert_eq!(
            compile_one(&tree, InsnNode::iinc("count", -1)).expect("iinc"),
            Insn::Iinc { slot: 0, incr: -1 }
        );
        operand_error(compile_one(&tree, InsnNode::iinc("count", 70000)));
        assert!(matches!(
            compile_one(&tree, InsnNode::var(Opcode::Iload, "missing")),
            Err(Error::UndeclaredVariable { line: 9, .. })
        ));
    }
}
