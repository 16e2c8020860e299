//! Utilities to parse and build field/method descriptors

use thiserror::Error;

/// Errors that can occur while reading descriptors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Invalid type descriptor: {descriptor}")]
    InvalidTypeDescriptor { descriptor: String },
    #[error("Invalid method descriptor: {descriptor}")]
    InvalidMethodDescriptor { descriptor: String },
    #[error("Invalid internal name: {name}")]
    InvalidInternalName { name: String },
}

/// Parsed field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Float,
    Long,
    Double,
    /// Class type by internal name (`java/lang/String`)
    Object(String),
    /// Array type by full descriptor (`[I`, `[[Ljava/lang/Object;`)
    Array(String),
}

impl FieldType {
    pub fn parse(desc: &str) -> Result<FieldType, DescriptorError> {
        match parse_field_type(desc.as_bytes(), 0) {
            Some((ty, end)) if end == desc.len() => Ok(ty),
            _ => Err(DescriptorError::InvalidTypeDescriptor {
                descriptor: desc.to_string(),
            }),
        }
    }

    /// Number of local/stack slots a value of this type occupies
    pub fn size(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            FieldType::Boolean => "Z".to_string(),
            FieldType::Byte => "B".to_string(),
            FieldType::Char => "C".to_string(),
            FieldType::Short => "S".to_string(),
            FieldType::Int => "I".to_string(),
            FieldType::Float => "F".to_string(),
            FieldType::Long => "J".to_string(),
            FieldType::Double => "D".to_string(),
            FieldType::Object(name) => format!("L{};", name),
            FieldType::Array(desc) => desc.clone(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    /// Number of leading `[` of an array type, 0 otherwise
    pub fn array_dimensions(&self) -> usize {
        match self {
            FieldType::Array(desc) => desc.bytes().take_while(|&b| b == b'[').count(),
            _ => 0,
        }
    }
}

fn parse_field_type(bytes: &[u8], start: usize) -> Option<(FieldType, usize)> {
    let first = *bytes.get(start)?;
    let simple = match first {
        b'Z' => Some(FieldType::Boolean),
        b'B' => Some(FieldType::Byte),
        b'C' => Some(FieldType::Char),
        b'S' => Some(FieldType::Short),
        b'I' => Some(FieldType::Int),
        b'F' => Some(FieldType::Float),
        b'J' => Some(FieldType::Long),
        b'D' => Some(FieldType::Double),
        _ => None,
    };
    if let Some(ty) = simple {
        return Some((ty, start + 1));
    }
    match first {
        b'L' => {
            let rel = bytes[start + 1..].iter().position(|&b| b == b';')?;
            let name = std::str::from_utf8(&bytes[start + 1..start + 1 + rel]).ok()?;
            if !is_valid_internal_name(name) {
                return None;
            }
            Some((FieldType::Object(name.to_string()), start + rel + 2))
        }
        b'[' => {
            let mut pos = start;
            while bytes.get(pos) == Some(&b'[') {
                pos += 1;
            }
            if pos - start > 255 {
                return None;
            }
            let (_, end) = parse_field_type(bytes, pos)?;
            let desc = std::str::from_utf8(&bytes[start..end]).ok()?;
            Some((FieldType::Array(desc.to_string()), end))
        }
        _ => None,
    }
}

fn is_valid_internal_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.contains("//")
        && !name.contains(|c| matches!(c, '.' | ';' | '[' | '<' | '>'))
}

/// Parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    /// `None` for `void`
    pub ret: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(desc: &str) -> Result<MethodDescriptor, DescriptorError> {
        let invalid = || DescriptorError::InvalidMethodDescriptor {
            descriptor: desc.to_string(),
        };
        let bytes = desc.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(invalid());
        }
        let mut pos = 1;
        let mut params = Vec::new();
        while bytes.get(pos).is_some_and(|&b| b != b')') {
            let (ty, end) = parse_field_type(bytes, pos).ok_or_else(invalid)?;
            params.push(ty);
            pos = end;
        }
        if bytes.get(pos) != Some(&b')') {
            return Err(invalid());
        }
        pos += 1;
        let ret = if bytes.get(pos) == Some(&b'V') && pos + 1 == bytes.len() {
            None
        } else {
            match parse_field_type(bytes, pos) {
                Some((ty, end)) if end == bytes.len() => Some(ty),
                _ => return Err(invalid()),
            }
        };
        Ok(MethodDescriptor { params, ret })
    }
}

/// Validate the operand of `NEW`, `ANEWARRAY`, `CHECKCAST`, `INSTANCEOF`:
/// an internal class name or an array descriptor
pub fn parse_type_operand(operand: &str) -> Result<FieldType, DescriptorError> {
    if operand.starts_with('[') {
        return FieldType::parse(operand);
    }
    if is_valid_internal_name(operand) {
        Ok(FieldType::Object(operand.to_string()))
    } else {
        Err(DescriptorError::InvalidInternalName {
            name: operand.to_string(),
        })
    }
}

/// Field descriptor for an internal name; array descriptors pass through
pub fn internal_name_to_descriptor(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{};", name)
    }
}
