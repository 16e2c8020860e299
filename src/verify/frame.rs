//! Abstract values and frames of the verifier

use crate::codegen::descriptor::{internal_name_to_descriptor, FieldType};
use crate::verify::VerifyRule;
use std::fmt;

pub const OBJECT: &str = "java/lang/Object";
pub const THROWABLE: &str = "java/lang/Throwable";

/// Abstract value held by a local slot or an operand stack entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Unset or unusable slot, also the upper half of a `long`/`double` local
    Empty,
    /// `int` and every narrower integral type
    Int,
    Float,
    Long,
    Double,
    Null,
    /// Initialized reference by internal name or array descriptor
    Reference(String),
    /// Receiver of a constructor before the super constructor ran
    UninitializedThis(String),
    /// Result of `NEW` at instruction `site`, before its constructor ran
    Uninitialized { site: usize, type_name: String },
    /// Pushed by `JSR`, consumed by `RET`
    ReturnAddress,
}

impl Value {
    pub fn reference(name: impl Into<String>) -> Self {
        Value::Reference(name.into())
    }

    /// Value a field, parameter or return of the given type produces
    pub fn from_field_type(ty: &FieldType) -> Self {
        match ty {
            FieldType::Boolean | FieldType::Byte | FieldType::Char | FieldType::Short | FieldType::Int => Value::Int,
            FieldType::Float => Value::Float,
            FieldType::Long => Value::Long,
            FieldType::Double => Value::Double,
            FieldType::Object(name) => Value::Reference(name.clone()),
            FieldType::Array(desc) => Value::Reference(desc.clone()),
        }
    }

    /// Slots the value occupies
    pub fn size(&self) -> u16 {
        match self {
            Value::Long | Value::Double => 2,
            _ => 1,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.size() == 2
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Reference(_) | Value::UninitializedThis(_) | Value::Uninitialized { .. }
        )
    }

    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Value::UninitializedThis(_) | Value::Uninitialized { .. })
    }

    /// Field descriptor of the value, if it has a type a variable can be declared with
    pub fn descriptor(&self) -> Option<String> {
        match self {
            Value::Int => Some("I".to_string()),
            Value::Float => Some("F".to_string()),
            Value::Long => Some("J".to_string()),
            Value::Double => Some("D".to_string()),
            Value::Null => Some(internal_name_to_descriptor(OBJECT)),
            Value::Reference(name)
            | Value::UninitializedThis(name)
            | Value::Uninitialized { type_name: name, .. } => Some(internal_name_to_descriptor(name)),
            Value::Empty | Value::ReturnAddress => None,
        }
    }

    /// Least value both can be seen as, `None` if the categories are incompatible
    pub fn merge(&self, other: &Value) -> Option<Value> {
        if self == other {
            return Some(self.clone());
        }
        match (self, other) {
            (Value::Null, Value::Reference(_)) => Some(other.clone()),
            (Value::Reference(_), Value::Null) => Some(self.clone()),
            (Value::Reference(_), Value::Reference(_)) => Some(Value::reference(OBJECT)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("empty"),
            Value::Int => f.write_str("int"),
            Value::Float => f.write_str("float"),
            Value::Long => f.write_str("long"),
            Value::Double => f.write_str("double"),
            Value::Null => f.write_str("null"),
            Value::Reference(name) => f.write_str(name),
            Value::UninitializedThis(_) => f.write_str("uninitializedThis"),
            Value::Uninitialized { type_name, site } => write!(f, "uninitialized {} (new at {})", type_name, site),
            Value::ReturnAddress => f.write_str("returnAddress"),
        }
    }
}

/// Machine state before one instruction executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl Frame {
    pub fn new(locals: Vec<Value>, stack: Vec<Value>) -> Self {
        Self { locals, stack }
    }

    pub fn locals(&self) -> &[Value] {
        &self.locals
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn local(&self, slot: usize) -> Option<&Value> {
        self.locals.get(slot)
    }

    /// Stack height in slots
    pub fn stack_size(&self) -> usize {
        self.stack.iter().map(|v| v.size() as usize).sum()
    }

    pub(crate) fn locals_mut(&mut self) -> &mut Vec<Value> {
        &mut self.locals
    }

    pub(crate) fn stack_mut(&mut self) -> &mut Vec<Value> {
        &mut self.stack
    }

    /// Replace every local and stack entry equal to `target`
    pub(crate) fn replace_all(&mut self, target: &Value, replacement: &Value) {
        for value in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if value == target {
                *value = replacement.clone();
            }
        }
    }

    /// Same locals, stack replaced by one value
    pub fn with_stack(&self, value: Value) -> Frame {
        Frame {
            locals: self.locals.clone(),
            stack: vec![value],
        }
    }

    /// Join `incoming` into this frame. Returns whether anything changed.
    pub fn merge(&mut self, incoming: &Frame) -> Result<bool, VerifyRule> {
        if self.stack.len() != incoming.stack.len() {
            return Err(VerifyRule::StackHeightMismatch {
                expected: self.stack.len(),
                found: incoming.stack.len(),
            });
        }
        let mut changed = false;
        for (depth, (current, other)) in self.stack.iter_mut().zip(&incoming.stack).enumerate() {
            let merged = current.merge(other).ok_or_else(|| VerifyRule::IncompatibleStackMerge {
                depth,
                left: current.to_string(),
                right: other.to_string(),
            })?;
            if merged != *current {
                *current = merged;
                changed = true;
            }
        }
        for (current, other) in self.locals.iter_mut().zip(&incoming.locals) {
            let merged = current.merge(other).unwrap_or(Value::Empty);
            if merged != *current {
                *current = merged;
                changed = true;
            }
        }
        Ok(changed)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("locals [")?;
        for (i, v) in self.locals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("] stack [")?;
        for (i, v) in self.stack.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str("]")
    }
}
