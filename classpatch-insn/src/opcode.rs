//! The closed, version-independent opcode set.
//!
//! Only the shapes the patch engine actually emits or matches are modeled;
//! this is not a full JVM instruction set.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Local variable loads/stores.
    ALoad,
    ILoad,
    FLoad,
    LLoad,
    DLoad,
    AStore,
    IStore,
    FStore,
    LStore,
    DStore,
    // Field access.
    GetField,
    PutField,
    GetStatic,
    PutStatic,
    // Method invocation.
    InvokeVirtual,
    InvokeSpecial,
    InvokeStatic,
    InvokeInterface,
    // Constants and object ops.
    Ldc,
    New,
    Dup,
    Pop,
    // Returns.
    AReturn,
    IReturn,
    FReturn,
    LReturn,
    DReturn,
    Return,
    // Control flow.
    Goto,
    IfEq,
    // Pseudo-instructions.
    Label,
    Nop,
}

/// Shape of the single operand an opcode carries (all opcodes in this set
/// take zero or one operand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// No operand.
    None,
    /// A local variable slot index.
    Slot,
    /// A literal constant.
    Const,
    /// A symbolic member reference (field or method).
    Member,
    /// An internal class name.
    Type,
    /// A label id.
    Label,
}

impl Opcode {
    pub fn operand_shape(self) -> OperandShape {
        use Opcode::*;
        match self {
            ALoad | ILoad | FLoad | LLoad | DLoad | AStore | IStore | FStore | LStore
            | DStore => OperandShape::Slot,
            GetField | PutField | GetStatic | PutStatic | InvokeVirtual | InvokeSpecial
            | InvokeStatic | InvokeInterface => OperandShape::Member,
            Ldc => OperandShape::Const,
            New => OperandShape::Type,
            Goto | IfEq | Label => OperandShape::Label,
            Dup | Pop | AReturn | IReturn | FReturn | LReturn | DReturn | Return | Nop => {
                OperandShape::None
            }
        }
    }

    pub fn is_return(self) -> bool {
        use Opcode::*;
        matches!(self, AReturn | IReturn | FReturn | LReturn | DReturn | Return)
    }

    /// True for opcodes whose operand is a branch target (not `Label` itself,
    /// which defines a position rather than referencing one).
    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Goto | Opcode::IfEq)
    }

    pub fn is_invoke(self) -> bool {
        use Opcode::*;
        matches!(self, InvokeVirtual | InvokeSpecial | InvokeStatic | InvokeInterface)
    }

    pub fn is_field_access(self) -> bool {
        use Opcode::*;
        matches!(self, GetField | PutField | GetStatic | PutStatic)
    }

    /// Slot width touched by a local load/store (2 for long/double).
    pub fn local_width(self) -> u16 {
        use Opcode::*;
        match self {
            LLoad | DLoad | LStore | DStore => 2,
            _ => 1,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            ALoad => "aload",
            ILoad => "iload",
            FLoad => "fload",
            LLoad => "lload",
            DLoad => "dload",
            AStore => "astore",
            IStore => "istore",
            FStore => "fstore",
            LStore => "lstore",
            DStore => "dstore",
            GetField => "getfield",
            PutField => "putfield",
            GetStatic => "getstatic",
            PutStatic => "putstatic",
            InvokeVirtual => "invokevirtual",
            InvokeSpecial => "invokespecial",
            InvokeStatic => "invokestatic",
            InvokeInterface => "invokeinterface",
            Ldc => "ldc",
            New => "new",
            Dup => "dup",
            Pop => "pop",
            AReturn => "areturn",
            IReturn => "ireturn",
            FReturn => "freturn",
            LReturn => "lreturn",
            DReturn => "dreturn",
            Return => "return",
            Goto => "goto",
            IfEq => "ifeq",
            Label => "label",
            Nop => "nop",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl FromStr for Opcode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Opcode::*;
        Ok(match s {
            "aload" => ALoad,
            "iload" => ILoad,
            "fload" => FLoad,
            "lload" => LLoad,
            "dload" => DLoad,
            "astore" => AStore,
            "istore" => IStore,
            "fstore" => FStore,
            "lstore" => LStore,
            "dstore" => DStore,
            "getfield" => GetField,
            "putfield" => PutField,
            "getstatic" => GetStatic,
            "putstatic" => PutStatic,
            "invokevirtual" => InvokeVirtual,
            "invokespecial" => InvokeSpecial,
            "invokestatic" => InvokeStatic,
            "invokeinterface" => InvokeInterface,
            "ldc" => Ldc,
            "new" => New,
            "dup" => Dup,
            "pop" => Pop,
            "areturn" => AReturn,
            "ireturn" => IReturn,
            "freturn" => FReturn,
            "lreturn" => LReturn,
            "dreturn" => DReturn,
            "return" => Return,
            "goto" => Goto,
            "ifeq" => IfEq,
            "label" => Label,
            "nop" => Nop,
            _ => return Err(()),
        })
    }
}
