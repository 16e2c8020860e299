//! Worklist analyzer: per-instruction frames by fixed-point iteration

use crate::codegen::descriptor::{internal_name_to_descriptor, FieldType, MethodDescriptor};
use crate::codegen::flag::access_flags;
use crate::codegen::insn::{Constant, Insn, LabelId};
use crate::codegen::method::CompiledMethod;
use crate::config::{DEFAULT_MAX_STACK, DEFAULT_MAX_VERIFY_ITERATIONS};
use crate::opcodes::{array_types, Opcode};
use crate::verify::frame::{Frame, Value, OBJECT, THROWABLE};
use crate::verify::{VerifyError, VerifyResult, VerifyRule};
use std::collections::{HashMap, VecDeque};

type Step<T> = Result<T, VerifyRule>;

/// Exception range resolved to instruction indices
#[derive(Debug, Clone)]
struct Handler {
    start: usize,
    end: usize,
    entry: usize,
    catch_type: String,
}

/// Verifier for methods of one declaring type
#[derive(Debug, Clone)]
pub struct Analyzer {
    declaring_type: String,
    max_stack: u16,
    max_iterations: usize,
}

impl Analyzer {
    pub fn new(declaring_type: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            max_stack: DEFAULT_MAX_STACK,
            max_iterations: DEFAULT_MAX_VERIFY_ITERATIONS,
        }
    }

    /// Operand stack bound, in slots
    pub fn with_max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn with_max_iterations(mut self, limit: usize) -> Self {
        self.max_iterations = limit.max(1);
        self
    }

    /// Compute the frame before every instruction of `method`.
    ///
    /// The result is parallel to `method.instructions`; positions no control
    /// flow reaches hold `None`.
    pub fn analyze(&self, method: &CompiledMethod) -> VerifyResult<Vec<Option<Frame>>> {
        if access_flags::has_no_code(method.access) {
            return Ok(Vec::new());
        }
        let insns = &method.instructions;
        let count = insns.len();
        if count == 0 {
            return Err(VerifyError::new(0, VerifyRule::FallsOffEnd));
        }
        let desc = MethodDescriptor::parse(&method.descriptor).map_err(|e| {
            VerifyError::new(
                0,
                VerifyRule::TypeMismatch {
                    expected: "method descriptor".to_string(),
                    found: e.to_string(),
                },
            )
        })?;

        let positions = label_positions(insns);
        for (index, insn) in insns.iter().enumerate() {
            if matches!(insn, Insn::Label(_)) {
                continue;
            }
            for label in insn.label_refs() {
                if !positions.contains_key(&label) {
                    return Err(VerifyError::new(index, VerifyRule::UnknownLabel { label }));
                }
            }
        }
        let handlers = self.resolve_handlers(method, &positions)?;
        let jsr_returns: Vec<usize> = insns
            .iter()
            .enumerate()
            .filter(|(_, insn)| matches!(insn, Insn::Jump { op: Opcode::Jsr, .. }))
            .map(|(i, _)| i + 1)
            .collect();

        let ctx = MethodShape {
            declaring_type: &self.declaring_type,
            is_init: method.name == "<init>",
            ret: desc.ret.clone(),
            max_stack: self.max_stack,
        };
        let initial = self
            .initial_frame(method, &desc)
            .map_err(|rule| VerifyError::new(0, rule))?;

        let mut frames: Vec<Option<Frame>> = vec![None; count];
        let mut queued = vec![false; count];
        let mut worklist = VecDeque::new();
        frames[0] = Some(initial);
        queued[0] = true;
        worklist.push_back(0);

        let mut visits = 0usize;
        while let Some(index) = worklist.pop_front() {
            queued[index] = false;
            visits += 1;
            if visits > self.max_iterations {
                return Err(VerifyError::new(
                    index,
                    VerifyRule::IterationLimit {
                        limit: self.max_iterations,
                    },
                ));
            }
            let before = match &frames[index] {
                Some(frame) => frame.clone(),
                None => continue,
            };
            let insn = &insns[index];

            let mut edges: Vec<(usize, Frame)> = Vec::new();
            if !insn.is_marker() {
                for handler in handlers.iter().filter(|h| h.start <= index && index < h.end) {
                    edges.push((handler.entry, before.with_stack(Value::reference(handler.catch_type.as_str()))));
                }
            }

            let mut after = before;
            execute(&ctx, index, insn, &mut after).map_err(|rule| VerifyError::new(index, rule))?;

            for target in successors(insn, index, &positions, &jsr_returns) {
                if target >= count {
                    return Err(VerifyError::new(index, VerifyRule::FallsOffEnd));
                }
                edges.push((target, after.clone()));
            }

            for (target, incoming) in edges {
                let changed = match frames[target].as_mut() {
                    Some(existing) => existing.merge(&incoming).map_err(|rule| {
                        let rule = if handlers.iter().any(|h| h.entry == target) {
                            VerifyRule::HandlerReachedOutsideRange {
                                handler: target,
                                cause: Box::new(rule),
                            }
                        } else {
                            rule
                        };
                        VerifyError::new(index, rule)
                    })?,
                    None => {
                        frames[target] = Some(incoming);
                        true
                    }
                };
                if changed && !queued[target] {
                    queued[target] = true;
                    worklist.push_back(target);
                }
            }
        }
        log::debug!(
            "verified {}{}: {} instruction(s), {} visit(s)",
            method.name,
            method.descriptor,
            count,
            visits
        );
        Ok(frames)
    }

    fn resolve_handlers(&self, method: &CompiledMethod, positions: &HashMap<LabelId, usize>) -> VerifyResult<Vec<Handler>> {
        let mut handlers = Vec::with_capacity(method.try_catch_blocks.len());
        for (block, range) in method.try_catch_blocks.iter().enumerate() {
            let position = |label: LabelId| {
                positions
                    .get(&label)
                    .copied()
                    .ok_or_else(|| VerifyError::new(0, VerifyRule::UnknownLabel { label }))
            };
            let start = position(range.start)?;
            let end = position(range.end)?;
            let entry = position(range.handler)?;
            if end <= start {
                return Err(VerifyError::new(start, VerifyRule::InvertedRange { block }));
            }
            handlers.push(Handler {
                start,
                end,
                entry,
                catch_type: range.catch_type.clone().unwrap_or_else(|| THROWABLE.to_string()),
            });
        }
        Ok(handlers)
    }

    fn initial_frame(&self, method: &CompiledMethod, desc: &MethodDescriptor) -> Step<Frame> {
        let max_locals = method.max_locals as usize;
        let mut locals = vec![Value::Empty; max_locals];
        let mut slot = 0usize;
        let mut place = |value: Value, slot: &mut usize| -> Step<()> {
            let width = value.size() as usize;
            if *slot + width > max_locals {
                return Err(VerifyRule::LocalOutOfRange {
                    slot: *slot,
                    max_locals,
                });
            }
            locals[*slot] = value;
            *slot += width;
            Ok(())
        };
        if !access_flags::is_static(method.access) {
            let receiver = if method.name == "<init>" {
                Value::UninitializedThis(self.declaring_type.clone())
            } else {
                Value::reference(self.declaring_type.as_str())
            };
            place(receiver, &mut slot)?;
        }
        for param in &desc.params {
            place(Value::from_field_type(param), &mut slot)?;
        }
        Ok(Frame::new(locals, Vec::new()))
    }
}

fn label_positions(insns: &[Insn]) -> HashMap<LabelId, usize> {
    insns
        .iter()
        .enumerate()
        .filter_map(|(i, insn)| match insn {
            Insn::Label(id) => Some((*id, i)),
            _ => None,
        })
        .collect()
}

/// Normal-flow successors of the instruction at `index`
fn successors(insn: &Insn, index: usize, positions: &HashMap<LabelId, usize>, jsr_returns: &[usize]) -> Vec<usize> {
    let at = |label: &LabelId| positions.get(label).copied().unwrap_or(usize::MAX);
    match insn {
        Insn::Jump { op, target } if op.is_conditional_jump() => vec![at(target), index + 1],
        Insn::Jump { target, .. } => vec![at(target)],
        Insn::TableSwitch { dflt, targets, .. } | Insn::LookupSwitch { dflt, targets, .. } => {
            std::iter::once(dflt).chain(targets).map(at).collect()
        }
        Insn::Var { op: Opcode::Ret, .. } => jsr_returns.to_vec(),
        Insn::Simple(op) if op.ends_flow() => Vec::new(),
        _ => vec![index + 1],
    }
}

/// Method-level facts the transfer functions need
struct MethodShape<'a> {
    declaring_type: &'a str,
    is_init: bool,
    ret: Option<FieldType>,
    max_stack: u16,
}

/// Operand stack and locals operations with rule checks
struct Machine<'f> {
    frame: &'f mut Frame,
    max_stack: u16,
}

impl<'f> Machine<'f> {
    fn push(&mut self, value: Value) -> Step<()> {
        if self.frame.stack_size() + value.size() as usize > self.max_stack as usize {
            return Err(VerifyRule::StackOverflow { max: self.max_stack });
        }
        self.frame.stack_mut().push(value);
        Ok(())
    }

    fn pop(&mut self) -> Step<Value> {
        self.frame
            .stack_mut()
            .pop()
            .ok_or(VerifyRule::StackUnderflow { needed: 1, available: 0 })
    }

    fn pop_n(&mut self, n: usize) -> Step<Vec<Value>> {
        let available = self.frame.stack().len();
        if available < n {
            return Err(VerifyRule::StackUnderflow { needed: n, available });
        }
        Ok(self.frame.stack_mut().split_off(available - n))
    }

    /// Pop a value of exactly the given primitive kind
    fn pop_kind(&mut self, expected: &Value) -> Step<Value> {
        let value = self.pop()?;
        if &value == expected {
            Ok(value)
        } else {
            Err(mismatch(expected, &value))
        }
    }

    fn pop_int(&mut self) -> Step<()> {
        self.pop_kind(&Value::Int).map(|_| ())
    }

    fn pop_ref(&mut self) -> Step<Value> {
        let value = self.pop()?;
        if value.is_reference() {
            Ok(value)
        } else {
            Err(VerifyRule::TypeMismatch {
                expected: "reference".to_string(),
                found: value.to_string(),
            })
        }
    }

    fn pop_type(&mut self, ty: &FieldType) -> Step<Value> {
        match Value::from_field_type(ty) {
            Value::Reference(_) => self.pop_ref(),
            primitive => self.pop_kind(&primitive),
        }
    }

    /// Pop a single-slot value for the generic stack instructions
    fn pop_category1(&mut self, op: Opcode) -> Step<Value> {
        let value = self.pop()?;
        if value.is_wide() {
            Err(VerifyRule::IllegalOperandSize {
                op: op.to_string(),
                found: value.to_string(),
            })
        } else {
            Ok(value)
        }
    }

    fn push_all(&mut self, values: &[&Value]) -> Step<()> {
        for value in values {
            self.push((*value).clone())?;
        }
        Ok(())
    }

    fn load(&mut self, slot: u16, expected: &Value) -> Step<Value> {
        let slot = slot as usize;
        let max_locals = self.frame.locals().len();
        let value = self
            .frame
            .local(slot)
            .cloned()
            .ok_or(VerifyRule::LocalOutOfRange { slot, max_locals })?;
        if value.is_empty() {
            return Err(VerifyRule::EmptyLocal { slot });
        }
        let matches = match expected {
            Value::Reference(_) => value.is_reference(),
            other => &value == other,
        };
        if matches {
            Ok(value)
        } else {
            Err(mismatch(expected, &value))
        }
    }

    fn store(&mut self, slot: u16, value: Value) -> Step<()> {
        let slot = slot as usize;
        let width = value.size() as usize;
        let locals = self.frame.locals_mut();
        let max_locals = locals.len();
        if slot + width > max_locals {
            return Err(VerifyRule::LocalOutOfRange { slot, max_locals });
        }
        if slot > 0 && locals[slot - 1].is_wide() {
            locals[slot - 1] = Value::Empty;
        }
        if width == 2 {
            locals[slot + 1] = Value::Empty;
        }
        locals[slot] = value;
        Ok(())
    }

    /// Replace every occurrence of an uninitialized value after its constructor ran
    fn initialize(&mut self, target: &Value, initialized: Value) {
        self.frame.replace_all(target, &initialized);
    }
}

fn mismatch(expected: &Value, found: &Value) -> VerifyRule {
    VerifyRule::TypeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn describe_return(ret: &Option<FieldType>) -> String {
    match ret {
        Some(ty) => ty.descriptor(),
        None => "void".to_string(),
    }
}

/// Apply the effect of `insn` to `frame`
fn execute(shape: &MethodShape<'_>, index: usize, insn: &Insn, frame: &mut Frame) -> Step<()> {
    let mut m = Machine {
        frame,
        max_stack: shape.max_stack,
    };
    match insn {
        Insn::Label(_) | Insn::Line { .. } => Ok(()),
        Insn::Simple(op) => execute_simple(shape, *op, &mut m),
        Insn::Int { op, operand } => match op {
            Opcode::Bipush | Opcode::Sipush => m.push(Value::Int),
            Opcode::Newarray => {
                m.pop_int()?;
                let desc = array_types::descriptor(*operand).ok_or_else(|| VerifyRule::TypeMismatch {
                    expected: "array type code".to_string(),
                    found: operand.to_string(),
                })?;
                m.push(Value::reference(desc))
            }
            other => Err(unexpected(*other)),
        },
        Insn::Var { op, slot } => {
            let kind = |op: Opcode| match op {
                Opcode::Iload | Opcode::Istore => Value::Int,
                Opcode::Lload | Opcode::Lstore => Value::Long,
                Opcode::Fload | Opcode::Fstore => Value::Float,
                Opcode::Dload | Opcode::Dstore => Value::Double,
                _ => Value::reference(OBJECT),
            };
            match op {
                Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload => {
                    let value = m.load(*slot, &kind(*op))?;
                    m.push(value)
                }
                Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore => {
                    let value = m.pop_kind(&kind(*op))?;
                    m.store(*slot, value)
                }
                Opcode::Astore => {
                    let value = m.pop()?;
                    if !value.is_reference() && value != Value::ReturnAddress {
                        return Err(VerifyRule::TypeMismatch {
                            expected: "reference or returnAddress".to_string(),
                            found: value.to_string(),
                        });
                    }
                    m.store(*slot, value)
                }
                Opcode::Ret => m.load(*slot, &Value::ReturnAddress).map(|_| ()),
                other => Err(unexpected(*other)),
            }
        }
        Insn::Iinc { slot, .. } => m.load(*slot, &Value::Int).map(|_| ()),
        Insn::Jump { op, .. } => match op {
            Opcode::Goto => Ok(()),
            Opcode::Jsr => m.push(Value::ReturnAddress),
            Opcode::Ifeq | Opcode::Ifne | Opcode::Iflt | Opcode::Ifge | Opcode::Ifgt | Opcode::Ifle => m.pop_int(),
            Opcode::IfIcmpeq
            | Opcode::IfIcmpne
            | Opcode::IfIcmplt
            | Opcode::IfIcmpge
            | Opcode::IfIcmpgt
            | Opcode::IfIcmple => {
                m.pop_int()?;
                m.pop_int()
            }
            Opcode::IfAcmpeq | Opcode::IfAcmpne => {
                m.pop_ref()?;
                m.pop_ref().map(|_| ())
            }
            Opcode::Ifnull | Opcode::Ifnonnull => m.pop_ref().map(|_| ()),
            other => Err(unexpected(*other)),
        },
        Insn::Ldc(constant) => m.push(match constant {
            Constant::Int(_) => Value::Int,
            Constant::Long(_) => Value::Long,
            Constant::Float(_) => Value::Float,
            Constant::Double(_) => Value::Double,
            Constant::String(_) => Value::reference("java/lang/String"),
            Constant::Type(_) => Value::reference("java/lang/Class"),
            Constant::MethodType(_) => Value::reference("java/lang/invoke/MethodType"),
            Constant::Handle(_) => Value::reference("java/lang/invoke/MethodHandle"),
        }),
        Insn::Type { op, desc } => match op {
            Opcode::New => m.push(Value::Uninitialized {
                site: index,
                type_name: desc.clone(),
            }),
            Opcode::Anewarray => {
                m.pop_int()?;
                m.push(Value::Reference(format!("[{}", internal_name_to_descriptor(desc))))
            }
            Opcode::Checkcast => {
                m.pop_ref()?;
                m.push(Value::reference(desc.as_str()))
            }
            Opcode::Instanceof => {
                m.pop_ref()?;
                m.push(Value::Int)
            }
            other => Err(unexpected(*other)),
        },
        Insn::Field { op, desc, .. } => {
            let ty = parse_field(desc)?;
            match op {
                Opcode::Getstatic => m.push(Value::from_field_type(&ty)),
                Opcode::Putstatic => m.pop_type(&ty).map(|_| ()),
                Opcode::Getfield => {
                    m.pop_ref()?;
                    m.push(Value::from_field_type(&ty))
                }
                Opcode::Putfield => {
                    m.pop_type(&ty)?;
                    m.pop_ref().map(|_| ())
                }
                other => Err(unexpected(*other)),
            }
        }
        Insn::Method { op, owner, name, desc, .. } => {
            let desc = parse_method(desc)?;
            pop_args(&mut m, &desc)?;
            if *op != Opcode::Invokestatic {
                let receiver = m.pop_ref()?;
                if *op == Opcode::Invokespecial && name == "<init>" {
                    let initialized = match &receiver {
                        Value::UninitializedThis(_) => Value::reference(shape.declaring_type),
                        Value::Uninitialized { type_name, .. } => Value::reference(type_name.as_str()),
                        other => {
                            return Err(VerifyRule::TypeMismatch {
                                expected: format!("uninitialized {}", owner),
                                found: other.to_string(),
                            })
                        }
                    };
                    m.initialize(&receiver, initialized);
                } else if receiver.is_uninitialized() {
                    return Err(VerifyRule::TypeMismatch {
                        expected: "initialized reference".to_string(),
                        found: receiver.to_string(),
                    });
                }
            }
            push_return(&mut m, &desc)
        }
        Insn::InvokeDynamic { desc, .. } => {
            let desc = parse_method(desc)?;
            pop_args(&mut m, &desc)?;
            push_return(&mut m, &desc)
        }
        Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => m.pop_int(),
        Insn::MultiANewArray { desc, dims } => {
            for _ in 0..*dims {
                m.pop_int()?;
            }
            m.push(Value::reference(desc.as_str()))
        }
    }
}

fn pop_args(m: &mut Machine<'_>, desc: &MethodDescriptor) -> Step<()> {
    for param in desc.params.iter().rev() {
        m.pop_type(param)?;
    }
    Ok(())
}

fn push_return(m: &mut Machine<'_>, desc: &MethodDescriptor) -> Step<()> {
    match &desc.ret {
        Some(ty) => m.push(Value::from_field_type(ty)),
        None => Ok(()),
    }
}

fn parse_field(desc: &str) -> Step<FieldType> {
    FieldType::parse(desc).map_err(|e| VerifyRule::TypeMismatch {
        expected: "field descriptor".to_string(),
        found: e.to_string(),
    })
}

fn parse_method(desc: &str) -> Step<MethodDescriptor> {
    MethodDescriptor::parse(desc).map_err(|e| VerifyRule::TypeMismatch {
        expected: "method descriptor".to_string(),
        found: e.to_string(),
    })
}

fn unexpected(op: Opcode) -> VerifyRule {
    VerifyRule::IllegalOperandSize {
        op: op.to_string(),
        found: "operand".to_string(),
    }
}

/// Element value loaded by `AALOAD` from an array of the given value
fn array_element(array: &Value) -> Step<Value> {
    match array {
        Value::Null => Ok(Value::Null),
        Value::Reference(desc) if desc.starts_with('[') => {
            match FieldType::parse(&desc[1..]) {
                Ok(ty) if ty.is_reference() => Ok(Value::from_field_type(&ty)),
                _ => Err(VerifyRule::TypeMismatch {
                    expected: "reference array".to_string(),
                    found: desc.clone(),
                }),
            }
        }
        Value::Reference(_) => Ok(Value::reference(OBJECT)),
        other => Err(VerifyRule::TypeMismatch {
            expected: "array".to_string(),
            found: other.to_string(),
        }),
    }
}

fn execute_simple(shape: &MethodShape<'_>, op: Opcode, m: &mut Machine<'_>) -> Step<()> {
    use Opcode::*;
    match op {
        Nop => Ok(()),
        AconstNull => m.push(Value::Null),
        IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 => m.push(Value::Int),
        Lconst0 | Lconst1 => m.push(Value::Long),
        Fconst0 | Fconst1 | Fconst2 => m.push(Value::Float),
        Dconst0 | Dconst1 => m.push(Value::Double),

        Iaload | Baload | Caload | Saload | Laload | Faload | Daload | Aaload => {
            m.pop_int()?;
            let array = m.pop_ref()?;
            let element = match op {
                Laload => Value::Long,
                Faload => Value::Float,
                Daload => Value::Double,
                Aaload => array_element(&array)?,
                _ => Value::Int,
            };
            m.push(element)
        }
        Iastore | Bastore | Castore | Sastore | Lastore | Fastore | Dastore | Aastore => {
            match op {
                Lastore => m.pop_kind(&Value::Long).map(|_| ())?,
                Fastore => m.pop_kind(&Value::Float).map(|_| ())?,
                Dastore => m.pop_kind(&Value::Double).map(|_| ())?,
                Aastore => m.pop_ref().map(|_| ())?,
                _ => m.pop_int()?,
            }
            m.pop_int()?;
            m.pop_ref().map(|_| ())
        }

        Pop => m.pop_category1(op).map(|_| ()),
        Pop2 => {
            let top = m.pop()?;
            if !top.is_wide() {
                m.pop_category1(op)?;
            }
            Ok(())
        }
        Dup => {
            let v1 = m.pop_category1(op)?;
            m.push_all(&[&v1, &v1])
        }
        DupX1 => {
            let v1 = m.pop_category1(op)?;
            let v2 = m.pop_category1(op)?;
            m.push_all(&[&v1, &v2, &v1])
        }
        DupX2 => {
            let v1 = m.pop_category1(op)?;
            let v2 = m.pop()?;
            if v2.is_wide() {
                m.push_all(&[&v1, &v2, &v1])
            } else {
                let v3 = m.pop_category1(op)?;
                m.push_all(&[&v1, &v3, &v2, &v1])
            }
        }
        Dup2 => {
            let v1 = m.pop()?;
            if v1.is_wide() {
                m.push_all(&[&v1, &v1])
            } else {
                let v2 = m.pop_category1(op)?;
                m.push_all(&[&v2, &v1, &v2, &v1])
            }
        }
        Dup2X1 => {
            let v1 = m.pop()?;
            if v1.is_wide() {
                let v2 = m.pop_category1(op)?;
                m.push_all(&[&v1, &v2, &v1])
            } else {
                let v2 = m.pop_category1(op)?;
                let v3 = m.pop_category1(op)?;
                m.push_all(&[&v2, &v1, &v3, &v2, &v1])
            }
        }
        Dup2X2 => {
            let v1 = m.pop()?;
            if v1.is_wide() {
                let v2 = m.pop()?;
                if v2.is_wide() {
                    m.push_all(&[&v1, &v2, &v1])
                } else {
                    let v3 = m.pop_category1(op)?;
                    m.push_all(&[&v1, &v3, &v2, &v1])
                }
            } else {
                let v2 = m.pop_category1(op)?;
                let v3 = m.pop()?;
                if v3.is_wide() {
                    m.push_all(&[&v2, &v1, &v3, &v2, &v1])
                } else {
                    let v4 = m.pop_category1(op)?;
                    m.push_all(&[&v2, &v1, &v4, &v3, &v2, &v1])
                }
            }
        }
        Swap => {
            let v1 = m.pop_category1(op)?;
            let v2 = m.pop_category1(op)?;
            m.push_all(&[&v1, &v2])
        }

        Iadd | Isub | Imul | Idiv | Irem | Ishl | Ishr | Iushr | Iand | Ior | Ixor => binary(m, Value::Int, Value::Int),
        Ladd | Lsub | Lmul | Ldiv | Lrem | Land | Lor | Lxor => binary(m, Value::Long, Value::Long),
        Lshl | Lshr | Lushr => {
            m.pop_int()?;
            m.pop_kind(&Value::Long)?;
            m.push(Value::Long)
        }
        Fadd | Fsub | Fmul | Fdiv | Frem => binary(m, Value::Float, Value::Float),
        Dadd | Dsub | Dmul | Ddiv | Drem => binary(m, Value::Double, Value::Double),
        Ineg | I2b | I2c | I2s => convert(m, Value::Int, Value::Int),
        Lneg => convert(m, Value::Long, Value::Long),
        Fneg => convert(m, Value::Float, Value::Float),
        Dneg => convert(m, Value::Double, Value::Double),
        I2l => convert(m, Value::Int, Value::Long),
        I2f => convert(m, Value::Int, Value::Float),
        I2d => convert(m, Value::Int, Value::Double),
        L2i => convert(m, Value::Long, Value::Int),
        L2f => convert(m, Value::Long, Value::Float),
        L2d => convert(m, Value::Long, Value::Double),
        F2i => convert(m, Value::Float, Value::Int),
        F2l => convert(m, Value::Float, Value::Long),
        F2d => convert(m, Value::Float, Value::Double),
        D2i => convert(m, Value::Double, Value::Int),
        D2l => convert(m, Value::Double, Value::Long),
        D2f => convert(m, Value::Double, Value::Float),
        Lcmp => binary(m, Value::Long, Value::Int),
        Fcmpl | Fcmpg => binary(m, Value::Float, Value::Int),
        Dcmpl | Dcmpg => binary(m, Value::Double, Value::Int),

        Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return => {
            let expected = shape.ret.as_ref().map(Value::from_field_type);
            let found = match op {
                Ireturn => Some(Value::Int),
                Lreturn => Some(Value::Long),
                Freturn => Some(Value::Float),
                Dreturn => Some(Value::Double),
                Areturn => Some(Value::reference(OBJECT)),
                _ => None,
            };
            let compatible = match (&expected, &found) {
                (None, None) => true,
                (Some(Value::Reference(_)), Some(Value::Reference(_))) => true,
                (Some(e), Some(f)) => e == f,
                _ => false,
            };
            if !compatible {
                return Err(VerifyRule::ReturnMismatch {
                    expected: describe_return(&shape.ret),
                    found: op.to_string(),
                });
            }
            if let Some(ty) = &shape.ret {
                m.pop_type(ty)?;
            }
            if shape.is_init && m.frame.local(0).is_some_and(|v| matches!(v, Value::UninitializedThis(_))) {
                return Err(VerifyRule::TypeMismatch {
                    expected: "initialized this".to_string(),
                    found: "uninitializedThis".to_string(),
                });
            }
            Ok(())
        }

        Arraylength => {
            m.pop_ref()?;
            m.push(Value::Int)
        }
        Athrow | Monitorenter | Monitorexit => m.pop_ref().map(|_| ()),
        other => Err(unexpected(other)),
    }
}

fn binary(m: &mut Machine<'_>, operand: Value, result: Value) -> Step<()> {
    m.pop_kind(&operand)?;
    m.pop_kind(&operand)?;
    m.push(result)
}

fn convert(m: &mut Machine<'_>, operand: Value, result: Value) -> Step<()> {
    m.pop_kind(&operand)?;
    m.push(result)
}
