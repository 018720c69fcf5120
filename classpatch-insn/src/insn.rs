//! Instruction value objects.
//!
//! An [`Instruction`] is immutable once constructed; editing a method means
//! replacing entries in its sequence. `Instruction::new` enforces the
//! operand contract of the opcode, so a held `Instruction` is always
//! well-formed.

use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::error::InsnError;
use crate::opcode::{Opcode, OperandShape};
use std::fmt;

/// Identifier of a label pseudo-instruction within one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A literal constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl ConstValue {
    /// Operand-stack slots the constant occupies when pushed.
    pub fn width(&self) -> u16 {
        match self {
            ConstValue::Long(_) | ConstValue::Double(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Long(v) => write!(f, "{v}L"),
            ConstValue::Float(v) => write!(f, "{v}f"),
            ConstValue::Double(v) => write!(f, "{v}d"),
            ConstValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// A symbolic reference to a field or method, independent of any constant
/// pool layout: `{owner internal name, member name, descriptor}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(owner: &str, name: &str, descriptor: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.descriptor)
    }
}

/// A typed instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Local variable slot index.
    Slot(u16),
    /// Literal constant.
    Const(ConstValue),
    /// Symbolic field/method reference.
    Member(MemberRef),
    /// Internal class name (for `new`).
    Type(String),
    /// Label id (definition for `label`, target for branches).
    Label(LabelId),
}

impl Operand {
    fn shape(&self) -> OperandShape {
        match self {
            Operand::Slot(_) => OperandShape::Slot,
            Operand::Const(_) => OperandShape::Const,
            Operand::Member(_) => OperandShape::Member,
            Operand::Type(_) => OperandShape::Type,
            Operand::Label(_) => OperandShape::Label,
        }
    }

    fn shape_name(shape: OperandShape) -> &'static str {
        match shape {
            OperandShape::None => "nothing",
            OperandShape::Slot => "a slot index",
            OperandShape::Const => "a constant",
            OperandShape::Member => "a member reference",
            OperandShape::Type => "a class name",
            OperandShape::Label => "a label",
        }
    }
}

/// Net operand-stack movement of one instruction, in slot units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    pub pops: u16,
    pub pushes: u16,
}

/// One instruction in a method's linear execution sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    opcode: Opcode,
    operand: Option<Operand>,
}

impl Instruction {
    /// Construct from an opcode and operand list, rejecting a mismatch of
    /// the opcode's declared shape.
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Result<Self, InsnError> {
        let shape = opcode.operand_shape();
        let expected = if shape == OperandShape::None { 0 } else { 1 };
        if operands.len() != expected {
            return Err(InsnError::OperandArity(opcode, expected, operands.len()));
        }
        let operand = operands.into_iter().next();
        if let Some(op) = &operand {
            if op.shape() != shape {
                return Err(InsnError::OperandType(opcode, Operand::shape_name(shape)));
            }
        }
        Ok(Self { opcode, operand })
    }

    fn raw(opcode: Opcode, operand: Option<Operand>) -> Self {
        debug_assert!(Self::new(opcode, operand.clone().into_iter().collect()).is_ok());
        Self { opcode, operand }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn operand(&self) -> Option<&Operand> {
        self.operand.as_ref()
    }

    pub fn slot(&self) -> Option<u16> {
        match &self.operand {
            Some(Operand::Slot(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn constant(&self) -> Option<&ConstValue> {
        match &self.operand {
            Some(Operand::Const(v)) => Some(v),
            _ => None,
        }
    }

    pub fn member(&self) -> Option<&MemberRef> {
        match &self.operand {
            Some(Operand::Member(m)) => Some(m),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<LabelId> {
        match &self.operand {
            Some(Operand::Label(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match &self.operand {
            Some(Operand::Type(name)) => Some(name),
            _ => None,
        }
    }

    // --- Convenience constructors ---

    pub fn aload(slot: u16) -> Self {
        Self::raw(Opcode::ALoad, Some(Operand::Slot(slot)))
    }

    pub fn iload(slot: u16) -> Self {
        Self::raw(Opcode::ILoad, Some(Operand::Slot(slot)))
    }

    pub fn astore(slot: u16) -> Self {
        Self::raw(Opcode::AStore, Some(Operand::Slot(slot)))
    }

    pub fn istore(slot: u16) -> Self {
        Self::raw(Opcode::IStore, Some(Operand::Slot(slot)))
    }

    /// Typed local load for a declared parameter/variable type.
    pub fn load(ty: &TypeDescriptor, slot: u16) -> Self {
        Self::raw(ty.load_opcode(), Some(Operand::Slot(slot)))
    }

    /// Typed local store for a declared parameter/variable type.
    pub fn store(ty: &TypeDescriptor, slot: u16) -> Self {
        Self::raw(ty.store_opcode(), Some(Operand::Slot(slot)))
    }

    pub fn ldc(value: ConstValue) -> Self {
        Self::raw(Opcode::Ldc, Some(Operand::Const(value)))
    }

    pub fn ldc_str(value: &str) -> Self {
        Self::ldc(ConstValue::Str(value.to_string()))
    }

    pub fn get_field(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::GetField,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn put_field(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::PutField,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn get_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::GetStatic,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn invoke_virtual(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::InvokeVirtual,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn invoke_special(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::InvokeSpecial,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn invoke_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::InvokeStatic,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn invoke_interface(owner: &str, name: &str, descriptor: &str) -> Self {
        Self::raw(
            Opcode::InvokeInterface,
            Some(Operand::Member(MemberRef::new(owner, name, descriptor))),
        )
    }

    pub fn invoke(opcode: Opcode, member: MemberRef) -> Result<Self, InsnError> {
        Self::new(opcode, vec![Operand::Member(member)])
    }

    pub fn new_object(class_name: &str) -> Self {
        Self::raw(Opcode::New, Some(Operand::Type(class_name.to_string())))
    }

    pub fn dup() -> Self {
        Self::raw(Opcode::Dup, None)
    }

    pub fn pop() -> Self {
        Self::raw(Opcode::Pop, None)
    }

    pub fn nop() -> Self {
        Self::raw(Opcode::Nop, None)
    }

    /// Define a label position (a pseudo-instruction marking a jump target).
    pub fn mark(id: LabelId) -> Self {
        Self::raw(Opcode::Label, Some(Operand::Label(id)))
    }

    pub fn goto(target: LabelId) -> Self {
        Self::raw(Opcode::Goto, Some(Operand::Label(target)))
    }

    pub fn if_eq(target: LabelId) -> Self {
        Self::raw(Opcode::IfEq, Some(Operand::Label(target)))
    }

    pub fn areturn() -> Self {
        Self::raw(Opcode::AReturn, None)
    }

    pub fn ireturn() -> Self {
        Self::raw(Opcode::IReturn, None)
    }

    pub fn return_void() -> Self {
        Self::raw(Opcode::Return, None)
    }

    /// Typed return for a method's return descriptor (`None` = void).
    pub fn return_of(ty: Option<&TypeDescriptor>) -> Self {
        match ty {
            Some(ty) => Self::raw(ty.return_opcode(), None),
            None => Self::return_void(),
        }
    }

    /// Operand-stack pops and pushes of this instruction, in slot units.
    ///
    /// Invokes and field accesses derive theirs from the member descriptor,
    /// so a malformed descriptor surfaces here rather than at execution.
    pub fn stack_effect(&self) -> Result<StackEffect, InsnError> {
        use Opcode::*;
        let effect = |pops, pushes| StackEffect { pops, pushes };
        Ok(match self.opcode {
            ALoad | ILoad | FLoad => effect(0, 1),
            LLoad | DLoad => effect(0, 2),
            AStore | IStore | FStore => effect(1, 0),
            LStore | DStore => effect(2, 0),
            GetField => {
                let width = self.member_type_width()?;
                effect(1, width)
            }
            PutField => {
                let width = self.member_type_width()?;
                effect(1 + width, 0)
            }
            GetStatic => effect(0, self.member_type_width()?),
            PutStatic => effect(self.member_type_width()?, 0),
            InvokeVirtual | InvokeSpecial | InvokeStatic | InvokeInterface => {
                // Operand is guaranteed a member by construction.
                let member = self.member().ok_or(InsnError::OperandType(
                    self.opcode,
                    "a member reference",
                ))?;
                let desc = MethodDescriptor::parse(&member.descriptor)?;
                let receiver = if self.opcode == InvokeStatic { 0 } else { 1 };
                effect(receiver + desc.param_slots(), desc.return_slots())
            }
            Ldc => {
                let width = self.constant().map_or(1, ConstValue::width);
                effect(0, width)
            }
            New => effect(0, 1),
            Dup => effect(1, 2),
            Pop => effect(1, 0),
            AReturn | IReturn | FReturn => effect(1, 0),
            LReturn | DReturn => effect(2, 0),
            Return => effect(0, 0),
            IfEq => effect(1, 0),
            Goto | Label | Nop => effect(0, 0),
        })
    }

    fn member_type_width(&self) -> Result<u16, InsnError> {
        let member = self
            .member()
            .ok_or(InsnError::OperandType(self.opcode, "a member reference"))?;
        Ok(TypeDescriptor::parse(&member.descriptor)?.width())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.opcode, &self.operand) {
            (Opcode::Label, Some(Operand::Label(id))) => write!(f, "{id}:"),
            (op, None) => f.write_str(op.mnemonic()),
            (op, Some(Operand::Slot(n))) => write!(f, "{op} {n}"),
            (op, Some(Operand::Const(v))) => write!(f, "{op} {v}"),
            (op, Some(Operand::Member(m))) => write!(f, "{op} {m}"),
            (op, Some(Operand::Type(t))) => write!(f, "{op} {t}"),
            (op, Some(Operand::Label(id))) => write!(f, "{op} {id}"),
        }
    }
}
