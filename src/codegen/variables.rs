//! Variable table: symbolic local names to slot indices
//!
//! Allocation happens once, before instruction compilation, so slot numbers
//! never depend on the order code is generated in. After a successful
//! verification, the analyzed frames fill in the descriptors and live
//! ranges of variables that were not declared with a type.

use crate::ast::{InsnNode, Param, SyntaxTree};
use crate::codegen::alias::AliasTable;
use crate::codegen::descriptor::{internal_name_to_descriptor, FieldType};
use crate::codegen::insn::{Insn, LabelId};
use crate::codegen::method::LocalVariable;
use crate::error::{Error, Result};
use crate::opcodes::Opcode;
use crate::verify::{Frame, Value};
use std::collections::{BTreeSet, HashMap};

/// One past the highest slot a method may use
const SLOT_LIMIT: u32 = u16::MAX as u32;

/// Variable carried over from an earlier disassembly of the same method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineVariable {
    pub name: String,
    pub index: u16,
    pub descriptor: String,
}

impl BaselineVariable {
    pub fn new(name: impl Into<String>, index: u16, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            descriptor: descriptor.into(),
        }
    }
}

/// Registered symbolic variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSlot {
    pub name: String,
    pub index: u16,
    /// 2 for `long`/`double`, else 1
    pub width: u16,
    /// Field descriptor known before analysis (receiver, parameter, baseline)
    pub descriptor: Option<String>,
}

/// Live range inferred from frames: first and last instruction index, merged type
#[derive(Debug, Clone, PartialEq, Eq)]
struct Inferred {
    first: usize,
    last: usize,
    descriptor: String,
}

#[derive(Debug, Clone)]
pub struct Variables {
    is_static: bool,
    entries: Vec<VariableSlot>,
    by_name: HashMap<String, usize>,
    occupied: BTreeSet<u16>,
    /// One past the highest slot in use
    max: u16,
    inferred: HashMap<String, Inferred>,
}

impl Variables {
    /// Empty table; non-static methods get `this` at slot 0
    pub fn new(is_static: bool, declaring_type: &str) -> Self {
        let mut variables = Self {
            is_static,
            entries: Vec::new(),
            by_name: HashMap::new(),
            occupied: BTreeSet::new(),
            max: 0,
            inferred: HashMap::new(),
        };
        if !is_static {
            variables.insert("this", 0, 1, Some(internal_name_to_descriptor(declaring_type)));
        }
        variables
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Apply baseline variables; entries whose name or slot is taken are skipped
    pub fn populate_defaults(&mut self, baseline: &[BaselineVariable]) {
        for var in baseline {
            let width = FieldType::parse(&var.descriptor).map(|t| t.size()).unwrap_or(1);
            if !fits(var.index, width) {
                log::warn!("skipping baseline variable '{}' at slot {}: out of range", var.name, var.index);
                continue;
            }
            if self.by_name.contains_key(&var.name) || self.occupied.contains(&var.index) {
                log::warn!(
                    "skipping baseline variable '{}' at slot {}: already registered",
                    var.name,
                    var.index
                );
                continue;
            }
            self.insert(&var.name, var.index, width, Some(var.descriptor.clone()));
        }
    }

    /// Named parameters take consecutive slots after the receiver
    pub fn add_params(&mut self, params: &[Param]) {
        let mut next: u16 = if self.is_static { 0 } else { 1 };
        for param in params {
            let width = FieldType::parse(&param.descriptor).map(|t| t.size()).unwrap_or(1);
            if !fits(next, width) {
                log::warn!("parameter '{}' does not fit in the local slots", param.name);
                break;
            }
            if !self.by_name.contains_key(&param.name) {
                self.insert(&param.name, next, width, Some(param.descriptor.clone()));
            } else {
                self.reserve(next, width);
            }
            next += width;
        }
    }

    /// Reserve raw numeric slots, then allocate every store-declared name
    pub fn visit(&mut self, tree: &SyntaxTree, aliases: &AliasTable) -> Result<()> {
        let mut declared: Vec<(String, u16, usize)> = Vec::new();
        for (node, insn) in tree.instructions() {
            let (op, var) = match insn {
                InsnNode::Var { op, var } => (*op, aliases.resolve(var)),
                InsnNode::Iinc { var, .. } => (Opcode::Iinc, aliases.resolve(var)),
                _ => continue,
            };
            let width = if op.is_wide_var() { 2 } else { 1 };
            if let Ok(slot) = var.parse::<u16>() {
                if !fits(slot, width) {
                    return Err(Error::invalid_operand(
                        node.line,
                        format!("local slot {} of width {} is out of range", slot, width),
                    ));
                }
                self.reserve(slot, width);
                continue;
            }
            if !op.is_store() || self.by_name.contains_key(var) {
                continue;
            }
            match declared.iter_mut().find(|(name, _, _)| name == var) {
                Some((_, w, _)) => *w = (*w).max(width),
                None => declared.push((var.to_string(), width, node.line)),
            }
        }
        for (name, width, line) in declared {
            let slot = self
                .lowest_free(width)
                .ok_or_else(|| Error::invalid_operand(line, format!("no free local slot for '{}'", name)))?;
            log::trace!("variable '{}' -> slot {}", name, slot);
            self.insert(&name, slot, width, None);
        }
        Ok(())
    }

    /// Slot of a variable operand: a raw number or a registered name
    pub fn slot(&self, name: &str, line: usize) -> Result<u16> {
        if let Ok(slot) = name.parse::<u16>() {
            return Ok(slot);
        }
        self.get(name).map(|v| v.index).ok_or_else(|| Error::UndeclaredVariable {
            name: name.to_string(),
            line,
        })
    }

    pub fn get(&self, name: &str) -> Option<&VariableSlot> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Registered variables in registration order
    pub fn iter(&self) -> impl Iterator<Item = &VariableSlot> {
        self.entries.iter()
    }

    /// High-water mark, used as `max_locals`
    pub fn max(&self) -> u16 {
        self.max
    }

    /// Infer descriptors and live ranges of untyped variables from analyzed frames
    pub fn visit_with_frames(&mut self, frames: &[Option<Frame>]) {
        self.inferred.clear();
        for var in &self.entries {
            if var.descriptor.is_some() {
                continue;
            }
            if let Some(inferred) = infer(frames, var.index) {
                self.inferred.insert(var.name.clone(), inferred);
            }
        }
    }

    /// Local variable table entries for the instruction sequence, sorted by slot then name
    pub fn local_variables(&self, instructions: &[Insn]) -> Vec<LocalVariable> {
        let labels: Vec<(usize, LabelId)> = instructions
            .iter()
            .enumerate()
            .filter_map(|(i, insn)| match insn {
                Insn::Label(id) => Some((i, *id)),
                _ => None,
            })
            .collect();
        let (first_label, last) = match (labels.first(), labels.last()) {
            (Some(&first_label), Some(&(_, last))) => (first_label, last),
            _ => return Vec::new(),
        };
        let first = first_label.1;
        let mut out = Vec::new();
        for var in &self.entries {
            let entry = match (&var.descriptor, self.inferred.get(&var.name)) {
                (Some(desc), _) => LocalVariable {
                    name: var.name.clone(),
                    index: var.index,
                    descriptor: desc.clone(),
                    start: first,
                    end: last,
                },
                (None, Some(inferred)) => {
                    let (start_at, start) = labels
                        .iter()
                        .rev()
                        .find(|(i, _)| *i <= inferred.first)
                        .copied()
                        .unwrap_or(first_label);
                    // the range must end at a label placed after its start
                    let end = labels
                        .iter()
                        .find(|(i, _)| *i > inferred.last && *i > start_at)
                        .or_else(|| labels.iter().find(|(i, _)| *i > start_at));
                    let end = match end {
                        Some(&(_, id)) => id,
                        None => {
                            log::debug!("variable '{}' has no label after its start, omitted", var.name);
                            continue;
                        }
                    };
                    LocalVariable {
                        name: var.name.clone(),
                        index: var.index,
                        descriptor: inferred.descriptor.clone(),
                        start,
                        end,
                    }
                }
                (None, None) => continue,
            };
            out.push(entry);
        }
        out.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));
        out
    }

    fn insert(&mut self, name: &str, index: u16, width: u16, descriptor: Option<String>) {
        self.reserve(index, width);
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push(VariableSlot {
            name: name.to_string(),
            index,
            width,
            descriptor,
        });
    }

    /// Mark `index..index + width` as used; callers check `fits` first
    fn reserve(&mut self, index: u16, width: u16) {
        let end = (u32::from(index) + u32::from(width)).min(SLOT_LIMIT) as u16;
        for slot in index..end {
            self.occupied.insert(slot);
        }
        self.max = self.max.max(end);
    }

    fn lowest_free(&self, width: u16) -> Option<u16> {
        (0..=u16::MAX)
            .take_while(|&slot| fits(slot, width))
            .find(|&slot| (slot..slot + width).all(|s| !self.occupied.contains(&s)))
    }
}

/// Whether a variable of `width` slots starting at `index` stays within `max_locals`
fn fits(index: u16, width: u16) -> bool {
    u32::from(index) + u32::from(width) <= SLOT_LIMIT
}

/// First contiguous run of frames where `slot` holds compatible values
fn infer(frames: &[Option<Frame>], slot: u16) -> Option<Inferred> {
    let live = |i: usize| -> Option<&Value> {
        frames
            .get(i)?
            .as_ref()?
            .local(slot as usize)
            .filter(|v| v.descriptor().is_some())
    };
    let first = (0..frames.len()).find(|&i| live(i).is_some())?;
    let mut merged = live(first)?.clone();
    let mut last = first;
    for i in first + 1..frames.len() {
        let next = match live(i).and_then(|v| merged.merge(v)) {
            Some(next) => next,
            None => break,
        };
        merged = next;
        last = i;
    }
    Some(Inferred {
        first,
        last,
        descriptor: merged.descriptor()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn store_tree(stores: &[(Opcode, &str)]) -> SyntaxTree {
        let mut tree = SyntaxTree::new();
        for (i, (op, name)) in stores.iter().enumerate() {
            tree.push(i + 1, NodeKind::insn(InsnNode::var(*op, *name)));
        }
        tree
    }

    #[test]
    fn test_static_method_starts_at_zero() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(&store_tree(&[(Opcode::Istore, "a"), (Opcode::Astore, "b")]), &AliasTable::default())
            .expect("visit");
        assert_eq!(vars.slot("a", 1).expect("a"), 0);
        assert_eq!(vars.slot("b", 1).expect("b"), 1);
        assert_eq!(vars.max(), 2);
        assert!(vars.get("this").is_none());
    }

    #[test]
    fn test_receiver_keeps_slot_zero() {
        let mut vars = Variables::new(false, "pkg/Demo");
        vars.add_params(&[Param::new("x", "J"), Param::new("s", "Ljava/lang/String;")]);
        vars.visit(&store_tree(&[(Opcode::Istore, "i")]), &AliasTable::default())
            .expect("visit");
        let this = vars.get("this").expect("this");
        assert_eq!(this.index, 0);
        assert_eq!(this.descriptor.as_deref(), Some("Lpkg/Demo;"));
        assert_eq!(vars.slot("x", 1).expect("x"), 1);
        assert_eq!(vars.slot("s", 1).expect("s"), 3);
        assert_eq!(vars.slot("i", 1).expect("i"), 4);
        assert_eq!(vars.max(), 5);
    }

    #[test]
    fn test_raw_slots_are_reserved_first() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(
            &store_tree(&[(Opcode::Istore, "a"), (Opcode::Lstore, "0"), (Opcode::Istore, "b")]),
            &AliasTable::default(),
        )
        .expect("visit");
        assert_eq!(vars.slot("a", 1).expect("a"), 2);
        assert_eq!(vars.slot("b", 1).expect("b"), 3);
        assert_eq!(vars.slot("0", 1).expect("raw"), 0);
    }

    #[test]
    fn test_wide_store_gets_two_slots() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(
            &store_tree(&[(Opcode::Istore, "w"), (Opcode::Lstore, "w"), (Opcode::Istore, "n")]),
            &AliasTable::default(),
        )
        .expect("visit");
        assert_eq!(vars.get("w").map(|v| (v.index, v.width)), Some((0, 2)));
        assert_eq!(vars.slot("n", 1).expect("n"), 2);
    }

    #[test]
    fn test_undeclared_variable_reports_line() {
        let vars = Variables::new(true, "Demo");
        match vars.slot("ghost", 7) {
            Err(Error::UndeclaredVariable { name, line }) => {
                assert_eq!(name, "ghost");
                assert_eq!(line, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_baseline_conflicts_are_skipped() {
        let mut vars = Variables::new(false, "Demo");
        vars.populate_defaults(&[
            BaselineVariable::new("this", 3, "LDemo;"),
            BaselineVariable::new("other", 0, "I"),
            BaselineVariable::new("count", 2, "I"),
        ]);
        assert_eq!(vars.get("this").map(|v| v.index), Some(0));
        assert!(vars.get("other").is_none());
        assert_eq!(vars.get("count").map(|v| v.index), Some(2));
        assert_eq!(vars.max(), 3);
    }

    #[test]
    fn test_no_labels_means_empty_table() {
        let vars = Variables::new(false, "Demo");
        assert!(vars.local_variables(&[Insn::Simple(Opcode::Return)]).is_empty());
    }

    #[test]
    fn test_inferred_range_uses_nearest_labels() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(&store_tree(&[(Opcode::Istore, "i")]), &AliasTable::default())
            .expect("visit");
        let insns = vec![
            Insn::Label(LabelId(0)),
            Insn::Simple(Opcode::Iconst0),
            Insn::Var { op: Opcode::Istore, slot: 0 },
            Insn::Label(LabelId(1)),
            Insn::Simple(Opcode::Return),
            Insn::Label(LabelId(2)),
        ];
        let empty = Frame::new(vec![Value::Empty], Vec::new());
        let live = Frame::new(vec![Value::Int], Vec::new());
        let frames = vec![
            Some(empty.clone()),
            Some(empty.clone()),
            Some(empty),
            Some(live.clone()),
            Some(live),
            None,
        ];
        vars.visit_with_frames(&frames);
        let table = vars.local_variables(&insns);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].descriptor, "I");
        assert_eq!(table[0].start, LabelId(1));
        assert_eq!(table[0].end, LabelId(2));
    }

    #[test]
    fn test_range_after_last_label_is_omitted() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(&store_tree(&[(Opcode::Istore, "i")]), &AliasTable::default())
            .expect("visit");
        let insns = vec![
            Insn::Label(LabelId(0)),
            Insn::Simple(Opcode::Iconst0),
            Insn::Var { op: Opcode::Istore, slot: 0 },
            Insn::Simple(Opcode::Return),
        ];
        let frames = vec![
            Some(Frame::new(vec![Value::Empty], Vec::new())),
            Some(Frame::new(vec![Value::Empty], Vec::new())),
            Some(Frame::new(vec![Value::Empty], Vec::new())),
            Some(Frame::new(vec![Value::Int], Vec::new())),
        ];
        vars.visit_with_frames(&frames);
        assert!(vars.local_variables(&insns).is_empty());
    }

    #[test]
    fn test_range_end_follows_start() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(&store_tree(&[(Opcode::Istore, "i")]), &AliasTable::default())
            .expect("visit");
        let insns = vec![
            Insn::Label(LabelId(0)),
            Insn::Simple(Opcode::Iconst0),
            Insn::Var { op: Opcode::Istore, slot: 0 },
            Insn::Label(LabelId(1)),
            Insn::Simple(Opcode::Return),
        ];
        // live through the final RETURN, which no label follows
        let live = Frame::new(vec![Value::Int], Vec::new());
        let frames = vec![
            Some(Frame::new(vec![Value::Empty], Vec::new())),
            Some(live.clone()),
            Some(live.clone()),
            Some(live.clone()),
            Some(live),
        ];
        vars.visit_with_frames(&frames);
        let table = vars.local_variables(&insns);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].start, LabelId(0));
        assert_eq!(table[0].end, LabelId(1));
    }

    #[test]
    fn test_wide_raw_slot_at_the_top_is_rejected() {
        let mut vars = Variables::new(true, "Demo");
        let tree = store_tree(&[(Opcode::Lstore, "65534")]);
        match vars.visit(&tree, &AliasTable::default()) {
            Err(Error::InvalidOperand { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("65534"), "{}", message);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(vars.max(), 0);
    }

    #[test]
    fn test_named_variables_beyond_the_last_slot() {
        let mut vars = Variables::new(true, "Demo");
        vars.visit(&store_tree(&[(Opcode::Istore, "65533")]), &AliasTable::default())
            .expect("narrow raw slot fits");
        assert_eq!(vars.max(), 65534);

        // slot 65534 is free but a long needs two
        let mut gaps = store_tree(&[(Opcode::Istore, "65533")]);
        for slot in 0..65533u32 {
            gaps.push(2, NodeKind::insn(InsnNode::var(Opcode::Istore, slot.to_string())));
        }
        gaps.push(3, NodeKind::insn(InsnNode::var(Opcode::Lstore, "wide")));
        let mut full = Variables::new(true, "Demo");
        match full.visit(&gaps, &AliasTable::default()) {
            Err(Error::InvalidOperand { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("wide"), "{}", message);
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut gaps = store_tree(&[(Opcode::Istore, "65533")]);
        gaps.push(2, NodeKind::insn(InsnNode::var(Opcode::Istore, "narrow")));
        let mut roomy = Variables::new(true, "Demo");
        roomy.visit(&gaps, &AliasTable::default()).expect("narrow fits");
        assert_eq!(roomy.slot("narrow", 2).expect("narrow"), 0);
    }
}
