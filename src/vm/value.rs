//! Values crossing the execution-engine boundary and their text rendering

use std::fmt;

/// Object living inside the virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Internal name of the runtime class
    pub class_name: String,
    /// Identity inside the VM
    pub id: u64,
}

impl InstanceRef {
    pub fn new(class_name: impl Into<String>, id: u64) -> Self {
        Self {
            class_name: class_name.into(),
            id,
        }
    }

    pub fn is_string(&self) -> bool {
        self.class_name == "java/lang/String"
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.class_name, self.id)
    }
}

/// Array contents, by element sort
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElements {
    Boolean(Vec<bool>),
    Char(Vec<u16>),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    /// Elements of a reference array; `element_type` is a field descriptor
    Reference { element_type: String, values: Vec<VmValue> },
}

impl ArrayElements {
    pub fn len(&self) -> usize {
        match self {
            ArrayElements::Boolean(v) => v.len(),
            ArrayElements::Char(v) => v.len(),
            ArrayElements::Byte(v) => v.len(),
            ArrayElements::Short(v) => v.len(),
            ArrayElements::Int(v) => v.len(),
            ArrayElements::Float(v) => v.len(),
            ArrayElements::Long(v) => v.len(),
            ArrayElements::Double(v) => v.len(),
            ArrayElements::Reference { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRef {
    pub id: u64,
    pub elements: ArrayElements,
}

impl ArrayRef {
    pub fn new(id: u64, elements: ArrayElements) -> Self {
        Self { id, elements }
    }
}

/// Value passed to or returned from the virtual machine
#[derive(Debug, Clone, PartialEq)]
pub enum VmValue {
    /// Result of a `void` method
    Void,
    Null,
    Boolean(bool),
    Char(u16),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Instance(InstanceRef),
    Array(ArrayRef),
}

impl VmValue {
    pub fn is_null(&self) -> bool {
        matches!(self, VmValue::Null)
    }
}

/// Reads the text of `java/lang/String` instances
pub trait StringDecoder {
    fn read_utf8(&self, instance: &InstanceRef) -> Option<String>;
}

impl<F> StringDecoder for F
where
    F: Fn(&InstanceRef) -> Option<String>,
{
    fn read_utf8(&self, instance: &InstanceRef) -> Option<String> {
        self(instance)
    }
}

/// Render a value the way `String.valueOf` would show it.
///
/// Strings are decoded through `decoder`; other instances, and strings the
/// decoder cannot read, fall back to their identity form.
pub fn render(value: &VmValue, decoder: &dyn StringDecoder) -> String {
    match value {
        VmValue::Void => "void".to_string(),
        VmValue::Null => "null".to_string(),
        VmValue::Boolean(b) => b.to_string(),
        VmValue::Char(c) => render_char(*c),
        VmValue::Byte(v) => v.to_string(),
        VmValue::Short(v) => v.to_string(),
        VmValue::Int(v) => v.to_string(),
        VmValue::Long(v) => v.to_string(),
        VmValue::Float(v) => java_float(*v),
        VmValue::Double(v) => java_double(*v),
        VmValue::Instance(instance) => {
            if instance.is_string() {
                if let Some(text) = decoder.read_utf8(instance) {
                    return text;
                }
            }
            instance.to_string()
        }
        VmValue::Array(array) => render_array(&array.elements, decoder),
    }
}

fn render_array(elements: &ArrayElements, decoder: &dyn StringDecoder) -> String {
    let parts: Vec<String> = match elements {
        ArrayElements::Boolean(v) => v.iter().map(ToString::to_string).collect(),
        ArrayElements::Char(v) => v.iter().map(|c| render_char(*c)).collect(),
        ArrayElements::Byte(v) => v.iter().map(ToString::to_string).collect(),
        ArrayElements::Short(v) => v.iter().map(ToString::to_string).collect(),
        ArrayElements::Int(v) => v.iter().map(ToString::to_string).collect(),
        ArrayElements::Float(v) => v.iter().map(|f| java_float(*f)).collect(),
        ArrayElements::Long(v) => v.iter().map(ToString::to_string).collect(),
        ArrayElements::Double(v) => v.iter().map(|d| java_double(*d)).collect(),
        ArrayElements::Reference { values, .. } => values.iter().map(|v| render(v, decoder)).collect(),
    };
    format!("[{}]", parts.join(", "))
}

fn render_char(c: u16) -> String {
    char::decode_utf16(std::iter::once(c))
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

fn java_float(v: f32) -> String {
    java_number(v.is_nan(), v.is_infinite(), v.is_sign_negative(), f64::from(v).abs(), || format!("{}", v), || format!("{:e}", v))
}

fn java_double(v: f64) -> String {
    java_number(v.is_nan(), v.is_infinite(), v.is_sign_negative(), v.abs(), || format!("{}", v), || format!("{:e}", v))
}

/// Decimal form between 10^-3 and 10^7, computerized scientific notation outside
fn java_number(
    nan: bool,
    infinite: bool,
    negative: bool,
    magnitude: f64,
    plain: impl Fn() -> String,
    scientific: impl Fn() -> String,
) -> String {
    if nan {
        return "NaN".to_string();
    }
    if infinite {
        return if negative { "-Infinity" } else { "Infinity" }.to_string();
    }
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        let text = plain();
        return if text.contains('.') { text } else { format!("{}.0", text) };
    }
    let text = scientific();
    match text.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{}E{}", mantissa, exponent),
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_strings(_: &InstanceRef) -> Option<String> {
        None
    }

    #[test]
    fn test_java_number_format() {
        assert_eq!(java_double(1.0), "1.0");
        assert_eq!(java_double(-0.0), "-0.0");
        assert_eq!(java_double(2.5), "2.5");
        assert_eq!(java_double(1e10), "1.0E10");
        assert_eq!(java_double(1.5e-5), "1.5E-5");
        assert_eq!(java_float(0.1), "0.1");
        assert_eq!(java_double(f64::NAN), "NaN");
        assert_eq!(java_float(f32::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_primitives() {
        assert_eq!(render(&VmValue::Boolean(true), &no_strings), "true");
        assert_eq!(render(&VmValue::Char(u16::from(b'A')), &no_strings), "A");
        assert_eq!(render(&VmValue::Long(-7), &no_strings), "-7");
        assert_eq!(render(&VmValue::Float(3.0), &no_strings), "3.0");
    }

    #[test]
    fn test_nested_reference_array() {
        let inner = VmValue::Array(ArrayRef::new(2, ArrayElements::Int(vec![1, 2])));
        let outer = VmValue::Array(ArrayRef::new(
            1,
            ArrayElements::Reference {
                element_type: "[I".to_string(),
                values: vec![inner, VmValue::Null],
            },
        ));
        assert_eq!(render(&outer, &no_strings), "[[1, 2], null]");
    }

    #[test]
    fn test_undecodable_string_falls_back_to_identity() {
        let s = VmValue::Instance(InstanceRef::new("java/lang/String", 0x2a));
        assert_eq!(render(&s, &no_strings), "java/lang/String@2a");
    }
}
