//! YAML class documents.
//!
//! Documents are a human-editable description of a class unit, used by the
//! dump/verify commands and by transform authors building test fixtures.
//! Conversion goes through the model's validating constructors, so a
//! malformed instruction in a document is rejected with the same
//! `InvalidOperand`-class errors the engine raises.

use classpatch_engine::{ClassUnit, ExceptionRange, FieldDef, LocalVariable, MethodBody, MethodSig};
use classpatch_insn::{AccessFlags, ConstValue, Instruction, LabelId, MemberRef, Opcode, Operand};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ClassDoc {
    pub name: String,
    #[serde(rename = "super", default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDoc>,
    #[serde(default)]
    pub methods: Vec<MethodDoc>,
}

#[derive(Debug, Deserialize)]
pub struct FieldDoc {
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Deserialize)]
pub struct MethodDoc {
    pub name: String,
    pub descriptor: String,
    #[serde(default)]
    pub access: Vec<String>,
    #[serde(default)]
    pub max_stack: Option<u16>,
    #[serde(default)]
    pub max_locals: Option<u16>,
    #[serde(default)]
    pub insns: Vec<InsnDoc>,
    #[serde(default)]
    pub locals: Vec<LocalDoc>,
    #[serde(default)]
    pub exception_ranges: Vec<ExceptionRangeDoc>,
}

#[derive(Debug, Deserialize)]
pub struct LocalDoc {
    pub name: String,
    pub descriptor: String,
    pub slot: u16,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Deserialize)]
pub struct ExceptionRangeDoc {
    pub start: u32,
    pub end: u32,
    pub handler: u32,
    #[serde(default)]
    pub catch_type: Option<String>,
}

/// One instruction. `op` is the mnemonic; exactly the operand fields the
/// opcode's shape needs must be present.
#[derive(Debug, Deserialize)]
pub struct InsnDoc {
    pub op: String,
    #[serde(default)]
    pub slot: Option<u16>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub int: Option<i32>,
    #[serde(default)]
    pub long: Option<i64>,
    #[serde(default)]
    pub float: Option<f32>,
    #[serde(default)]
    pub double: Option<f64>,
    #[serde(default)]
    pub label: Option<u32>,
    #[serde(default)]
    pub class: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("unknown opcode {0:?}")]
    UnknownOpcode(String),

    #[error("opcode {0:?} needs {1}")]
    MissingOperand(String, &'static str),

    #[error("unknown access flag {0:?}")]
    UnknownAccessFlag(String),

    #[error(transparent)]
    Insn(#[from] classpatch_engine::EngineError),
}

impl From<classpatch_insn::InsnError> for DocError {
    fn from(err: classpatch_insn::InsnError) -> Self {
        DocError::Insn(err.into())
    }
}

fn parse_access(names: &[String]) -> Result<AccessFlags, DocError> {
    let mut flags = AccessFlags::empty();
    for name in names {
        flags |= match name.as_str() {
            "public" => AccessFlags::PUBLIC,
            "private" => AccessFlags::PRIVATE,
            "protected" => AccessFlags::PROTECTED,
            "static" => AccessFlags::STATIC,
            "final" => AccessFlags::FINAL,
            "synthetic" => AccessFlags::SYNTHETIC,
            other => return Err(DocError::UnknownAccessFlag(other.to_string())),
        };
    }
    Ok(flags)
}

impl InsnDoc {
    pub fn to_instruction(&self) -> Result<Instruction, DocError> {
        let opcode: Opcode = self
            .op
            .parse()
            .map_err(|()| DocError::UnknownOpcode(self.op.clone()))?;
        let missing = |what| DocError::MissingOperand(self.op.clone(), what);
        let operands = match opcode.operand_shape() {
            classpatch_insn::OperandShape::None => vec![],
            classpatch_insn::OperandShape::Slot => {
                vec![Operand::Slot(self.slot.ok_or_else(|| missing("a slot"))?)]
            }
            classpatch_insn::OperandShape::Member => {
                let owner = self.owner.as_deref().ok_or_else(|| missing("an owner"))?;
                let name = self.name.as_deref().ok_or_else(|| missing("a name"))?;
                let descriptor = self
                    .descriptor
                    .as_deref()
                    .ok_or_else(|| missing("a descriptor"))?;
                vec![Operand::Member(MemberRef::new(owner, name, descriptor))]
            }
            classpatch_insn::OperandShape::Const => {
                let value = if let Some(s) = &self.string {
                    ConstValue::Str(s.clone())
                } else if let Some(v) = self.int {
                    ConstValue::Int(v)
                } else if let Some(v) = self.long {
                    ConstValue::Long(v)
                } else if let Some(v) = self.float {
                    ConstValue::Float(v)
                } else if let Some(v) = self.double {
                    ConstValue::Double(v)
                } else {
                    return Err(missing("a constant value"));
                };
                vec![Operand::Const(value)]
            }
            classpatch_insn::OperandShape::Type => {
                vec![Operand::Type(
                    self.class.clone().ok_or_else(|| missing("a class name"))?,
                )]
            }
            classpatch_insn::OperandShape::Label => {
                vec![Operand::Label(LabelId(
                    self.label.ok_or_else(|| missing("a label id"))?,
                ))]
            }
        };
        Ok(Instruction::new(opcode, operands)?)
    }
}

impl MethodDoc {
    pub fn to_method(&self, class_name: &str) -> Result<MethodBody, DocError> {
        let sig = MethodSig::new(&self.name, &self.descriptor, parse_access(&self.access)?);
        let insns = self
            .insns
            .iter()
            .map(InsnDoc::to_instruction)
            .collect::<Result<Vec<_>, _>>()?;
        let mut body = MethodBody::with_insns(sig, insns);
        body.locals = self
            .locals
            .iter()
            .map(|l| LocalVariable {
                name: l.name.clone(),
                descriptor: l.descriptor.clone(),
                slot: l.slot,
                start: LabelId(l.start),
                end: LabelId(l.end),
            })
            .collect();
        body.exception_ranges = self
            .exception_ranges
            .iter()
            .map(|r| ExceptionRange {
                start: LabelId(r.start),
                end: LabelId(r.end),
                handler: LabelId(r.handler),
                catch_type: r.catch_type.clone(),
            })
            .collect();
        body.max_stack = self.max_stack.unwrap_or(0);
        body.max_locals = self.max_locals.unwrap_or(0);
        // Fill in each omitted capacity from simulation; declared values are
        // left alone so that an undersized declaration still fails verify.
        if self.max_stack.is_none() || self.max_locals.is_none() {
            let mut computed = body.clone();
            computed.raise_limits(class_name).map_err(DocError::Insn)?;
            if self.max_stack.is_none() {
                body.max_stack = computed.max_stack;
            }
            if self.max_locals.is_none() {
                body.max_locals = computed.max_locals;
            }
        }
        Ok(body)
    }
}

impl ClassDoc {
    /// Convert into a model [`ClassUnit`]. Methods are appended through the
    /// engine, so duplicates and structurally broken bodies are rejected.
    pub fn to_class(&self) -> Result<ClassUnit, DocError> {
        let mut class = ClassUnit::new(&self.name);
        if let Some(super_name) = &self.super_name {
            class.super_name = super_name.clone();
        }
        for field in &self.fields {
            class.add_field(FieldDef::new(&field.name, &field.descriptor));
        }
        for method in &self.methods {
            class
                .append_method(method.to_method(&self.name)?)
                .map_err(DocError::Insn)?;
        }
        Ok(class)
    }
}
