//! Method synthesis: building a brand-new method body from scratch.
//!
//! Used when the safest patch is "append a new method that forwards to a
//! stable target, privately, under a new name" and rewrite call sites to use
//! it, instead of rewriting an existing method body in place.

use crate::error::Result;
use crate::method::{LocalVariable, MethodBody, MethodSig};
use classpatch_insn::{Instruction, LabelId, MemberRef, MethodDescriptor, Opcode};

/// Which invocation opcode a delegating call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl CallKind {
    pub fn opcode(self) -> Opcode {
        match self {
            CallKind::Virtual => Opcode::InvokeVirtual,
            CallKind::Special => Opcode::InvokeSpecial,
            CallKind::Static => Opcode::InvokeStatic,
            CallKind::Interface => Opcode::InvokeInterface,
        }
    }
}

/// Builds a self-contained method body: a start label is opened on
/// construction, and [`finish`](MethodBuilder::finish) closes the end label,
/// spans every declared local over start..end, and computes
/// `max_stack`/`max_locals` from a full simulation.
pub struct MethodBuilder {
    sig: MethodSig,
    desc: MethodDescriptor,
    insns: Vec<Instruction>,
    locals: Vec<(String, String, u16)>,
    start: LabelId,
    end: LabelId,
    next_label: u32,
}

impl MethodBuilder {
    pub fn new(sig: MethodSig) -> Result<Self> {
        let desc = sig.parsed_descriptor()?;
        let start = LabelId(0);
        Ok(Self {
            sig,
            desc,
            insns: vec![Instruction::mark(start)],
            locals: Vec::new(),
            start,
            end: LabelId(1),
            next_label: 2,
        })
    }

    pub fn fresh_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        id
    }

    pub fn push(&mut self, insn: Instruction) -> &mut Self {
        self.insns.push(insn);
        self
    }

    /// Load the receiver and declare its `this` local. Must not be used for
    /// a static signature.
    pub fn load_this(&mut self, class_name: &str) -> &mut Self {
        debug_assert!(!self.sig.is_static());
        self.insns.push(Instruction::aload(0));
        self.locals
            .push(("this".to_string(), format!("L{class_name};"), 0));
        self
    }

    /// Load every parameter in declaration order with the typed load opcode
    /// for its descriptor, declaring an `argN` local per parameter. Slots
    /// advance by type width (long/double take two).
    pub fn load_params(&mut self) -> &mut Self {
        let mut slot = if self.sig.is_static() { 0 } else { 1 };
        for (n, param) in self.desc.params.clone().iter().enumerate() {
            self.insns.push(Instruction::load(param, slot));
            self.locals
                .push((format!("arg{n}"), param.to_string(), slot));
            slot = slot.saturating_add(param.width());
        }
        self
    }

    /// Emit the single delegating call.
    pub fn invoke(&mut self, kind: CallKind, target: &MemberRef) -> &mut Self {
        let insn = match kind {
            CallKind::Virtual => {
                Instruction::invoke_virtual(&target.owner, &target.name, &target.descriptor)
            }
            CallKind::Special => {
                Instruction::invoke_special(&target.owner, &target.name, &target.descriptor)
            }
            CallKind::Static => {
                Instruction::invoke_static(&target.owner, &target.name, &target.descriptor)
            }
            CallKind::Interface => {
                Instruction::invoke_interface(&target.owner, &target.name, &target.descriptor)
            }
        };
        self.insns.push(insn);
        self
    }

    /// Emit the return matching the signature's return descriptor.
    pub fn ret(&mut self) -> &mut Self {
        self.insns.push(Instruction::return_of(self.desc.ret.as_ref()));
        self
    }

    /// Declare an extra local spanning the whole method.
    pub fn local(&mut self, name: &str, descriptor: &str, slot: u16) -> &mut Self {
        self.locals
            .push((name.to_string(), descriptor.to_string(), slot));
        self
    }

    /// Close the body and verify it. `class_name` is only used for error
    /// context.
    pub fn finish(mut self, class_name: &str) -> Result<MethodBody> {
        self.insns.push(Instruction::mark(self.end));
        let mut body = MethodBody::with_insns(self.sig, self.insns);
        body.locals = self
            .locals
            .into_iter()
            .map(|(name, descriptor, slot)| LocalVariable {
                name,
                descriptor,
                slot,
                start: self.start,
                end: self.end,
            })
            .collect();
        let (stack, locals) = body.requirements(class_name)?;
        body.max_stack = stack;
        body.max_locals = locals;
        Ok(body)
    }
}

/// Synthesize the standard forwarder: load `this` (unless static) and every
/// parameter in order, one delegating call to `target`, and the typed
/// return for the signature.
pub fn forwarder(
    class_name: &str,
    sig: MethodSig,
    kind: CallKind,
    target: &MemberRef,
) -> Result<MethodBody> {
    let mut builder = MethodBuilder::new(sig)?;
    if !builder.sig.is_static() {
        builder.load_this(class_name);
    }
    builder.load_params();
    builder.invoke(kind, target);
    builder.ret();
    builder.finish(class_name)
}
