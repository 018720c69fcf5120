//! JVM type and method descriptors.
//!
//! Descriptors drive the synthesizer (which load/store/return opcode serves
//! a parameter) and the stack/locals accounting (long and double occupy two
//! slots).

use crate::error::InsnError;
use crate::opcode::Opcode;
use std::fmt;

/// A parsed field/parameter type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Byte,
    Char,
    Short,
    Int,
    Boolean,
    Float,
    Long,
    Double,
    /// Internal class name, e.g. `java/util/Map`.
    Object(String),
    Array(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn parse(s: &str) -> Result<Self, InsnError> {
        let bytes = s.as_bytes();
        let (ty, consumed) =
            Self::parse_prefix(bytes).ok_or_else(|| InsnError::InvalidDescriptor(s.to_string()))?;
        if consumed != bytes.len() {
            return Err(InsnError::InvalidDescriptor(s.to_string()));
        }
        Ok(ty)
    }

    /// Parse one descriptor at the start of `bytes`, returning it and the
    /// number of bytes consumed.
    fn parse_prefix(bytes: &[u8]) -> Option<(Self, usize)> {
        match *bytes.first()? {
            b'B' => Some((TypeDescriptor::Byte, 1)),
            b'C' => Some((TypeDescriptor::Char, 1)),
            b'S' => Some((TypeDescriptor::Short, 1)),
            b'I' => Some((TypeDescriptor::Int, 1)),
            b'Z' => Some((TypeDescriptor::Boolean, 1)),
            b'F' => Some((TypeDescriptor::Float, 1)),
            b'J' => Some((TypeDescriptor::Long, 1)),
            b'D' => Some((TypeDescriptor::Double, 1)),
            b'L' => {
                let end = bytes.iter().position(|&b| b == b';')?;
                let name = std::str::from_utf8(&bytes[1..end]).ok()?;
                if name.is_empty() {
                    return None;
                }
                Some((TypeDescriptor::Object(name.to_string()), end + 1))
            }
            b'[' => {
                let (elem, consumed) = Self::parse_prefix(&bytes[1..])?;
                Some((TypeDescriptor::Array(Box::new(elem)), consumed + 1))
            }
            _ => None,
        }
    }

    /// Number of local/operand-stack slots this type occupies.
    pub fn width(&self) -> u16 {
        match self {
            TypeDescriptor::Long | TypeDescriptor::Double => 2,
            _ => 1,
        }
    }

    pub fn load_opcode(&self) -> Opcode {
        match self {
            TypeDescriptor::Float => Opcode::FLoad,
            TypeDescriptor::Long => Opcode::LLoad,
            TypeDescriptor::Double => Opcode::DLoad,
            TypeDescriptor::Object(_) | TypeDescriptor::Array(_) => Opcode::ALoad,
            _ => Opcode::ILoad,
        }
    }

    pub fn store_opcode(&self) -> Opcode {
        match self {
            TypeDescriptor::Float => Opcode::FStore,
            TypeDescriptor::Long => Opcode::LStore,
            TypeDescriptor::Double => Opcode::DStore,
            TypeDescriptor::Object(_) | TypeDescriptor::Array(_) => Opcode::AStore,
            _ => Opcode::IStore,
        }
    }

    pub fn return_opcode(&self) -> Opcode {
        match self {
            TypeDescriptor::Float => Opcode::FReturn,
            TypeDescriptor::Long => Opcode::LReturn,
            TypeDescriptor::Double => Opcode::DReturn,
            TypeDescriptor::Object(_) | TypeDescriptor::Array(_) => Opcode::AReturn,
            _ => Opcode::IReturn,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Byte => f.write_str("B"),
            TypeDescriptor::Char => f.write_str("C"),
            TypeDescriptor::Short => f.write_str("S"),
            TypeDescriptor::Int => f.write_str("I"),
            TypeDescriptor::Boolean => f.write_str("Z"),
            TypeDescriptor::Float => f.write_str("F"),
            TypeDescriptor::Long => f.write_str("J"),
            TypeDescriptor::Double => f.write_str("D"),
            TypeDescriptor::Object(name) => write!(f, "L{name};"),
            TypeDescriptor::Array(elem) => write!(f, "[{elem}"),
        }
    }
}

/// A parsed method descriptor, e.g. `(Ljava/util/Map;I)V`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<TypeDescriptor>,
    /// `None` for void.
    pub ret: Option<TypeDescriptor>,
}

impl MethodDescriptor {
    pub fn parse(s: &str) -> Result<Self, InsnError> {
        let err = || InsnError::InvalidMethodDescriptor(s.to_string());
        let bytes = s.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(err());
        }
        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(pos).copied() {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let (ty, consumed) = TypeDescriptor::parse_prefix(&bytes[pos..])
                        .ok_or_else(err)?;
                    params.push(ty);
                    pos += consumed;
                }
                None => return Err(err()),
            }
        }
        let ret = match bytes.get(pos).copied() {
            Some(b'V') if pos + 1 == bytes.len() => None,
            Some(_) => {
                let (ty, consumed) = TypeDescriptor::parse_prefix(&bytes[pos..]).ok_or_else(err)?;
                if pos + consumed != bytes.len() {
                    return Err(err());
                }
                Some(ty)
            }
            None => return Err(err()),
        };
        // Method parameters occupy at most 255 slots (receiver included).
        let slots: u32 = params.iter().map(|t| u32::from(t.width())).sum();
        if slots > 255 {
            return Err(err());
        }
        Ok(MethodDescriptor { params, ret })
    }

    /// Total slot count of the parameters (without the receiver).
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(TypeDescriptor::width).sum()
    }

    /// Slot count of the return value (0 for void).
    pub fn return_slots(&self) -> u16 {
        self.ret.as_ref().map_or(0, TypeDescriptor::width)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            write!(f, "{param}")?;
        }
        f.write_str(")")?;
        match &self.ret {
            Some(ty) => write!(f, "{ty}"),
            None => f.write_str("V"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_primitive_types() {
        assert_eq!(TypeDescriptor::parse("I").unwrap(), TypeDescriptor::Int);
        assert_eq!(TypeDescriptor::parse("J").unwrap(), TypeDescriptor::Long);
        assert_eq!(TypeDescriptor::parse("Z").unwrap(), TypeDescriptor::Boolean);
    }

    #[test]
    fn parse_object_and_array() {
        assert_eq!(
            TypeDescriptor::parse("Ljava/util/Map;").unwrap(),
            TypeDescriptor::Object("java/util/Map".to_string())
        );
        assert_eq!(
            TypeDescriptor::parse("[[D").unwrap(),
            TypeDescriptor::Array(Box::new(TypeDescriptor::Array(Box::new(
                TypeDescriptor::Double
            ))))
        );
    }

    #[test]
    fn reject_malformed_types() {
        assert!(TypeDescriptor::parse("").is_err());
        assert!(TypeDescriptor::parse("Ljava/util/Map").is_err());
        assert!(TypeDescriptor::parse("L;").is_err());
        assert!(TypeDescriptor::parse("II").is_err());
        assert!(TypeDescriptor::parse("Q").is_err());
    }

    #[test]
    fn parse_method_descriptor() {
        let desc = MethodDescriptor::parse("(Ljava/util/Map;IJ)V").unwrap();
        assert_eq!(desc.params.len(), 3);
        assert_eq!(desc.ret, None);
        assert_eq!(desc.param_slots(), 4); // Map=1, I=1, J=2
    }

    #[test]
    fn parse_method_descriptor_with_return() {
        let desc = MethodDescriptor::parse("()Lcom/google/common/collect/ImmutableList;").unwrap();
        assert!(desc.params.is_empty());
        assert_eq!(desc.return_slots(), 1);
    }

    #[test]
    fn reject_malformed_method_descriptors() {
        assert!(MethodDescriptor::parse("()").is_err());
        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("I)V").is_err());
        assert!(MethodDescriptor::parse("(I").is_err());
        assert!(MethodDescriptor::parse("()VV").is_err());
    }

    #[test]
    fn parameter_slot_limit() {
        let at_limit = format!("({}I)V", "J".repeat(127));
        assert_eq!(MethodDescriptor::parse(&at_limit).unwrap().param_slots(), 255);
        let over = format!("({})V", "J".repeat(128));
        assert!(MethodDescriptor::parse(&over).is_err());
    }

    #[test]
    fn display_roundtrip() {
        for s in ["(Ljava/util/Map;IJ)V", "()I", "([Ljava/lang/String;)[B"] {
            assert_eq!(MethodDescriptor::parse(s).unwrap().to_string(), s);
        }
    }
}
