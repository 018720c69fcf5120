//! Method bodies and their structural invariants.

use crate::error::{EngineError, Result};
use classpatch_insn::{
    AccessFlags, Instruction, LabelId, MethodDescriptor, Opcode, TypeDescriptor,
};
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeBounds;

/// Identity of a method: name, raw descriptor, access flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
}

impl MethodSig {
    pub fn new(name: &str, descriptor: &str, access: AccessFlags) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access,
        }
    }

    pub fn is_static(&self) -> bool {
        self.access.is_static()
    }

    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor> {
        Ok(MethodDescriptor::parse(&self.descriptor)?)
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.descriptor)
    }
}

/// A local variable table entry. `start`/`end` are label ids, so an edit
/// between them widens the live range instead of invalidating it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub name: String,
    pub descriptor: String,
    pub slot: u16,
    pub start: LabelId,
    pub end: LabelId,
}

/// An exception handler range, label-id based like the locals table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRange {
    pub start: LabelId,
    pub end: LabelId,
    pub handler: LabelId,
    /// Internal name of the caught type, `None` for catch-all.
    pub catch_type: Option<String>,
}

/// An ordered, editable instruction sequence plus its side tables.
///
/// The sequence order is the execution order. All mutation goes through the
/// edit operations on [`crate::ClassUnit`], which re-verify the body and
/// raise `max_stack`/`max_locals` to the simulated requirement.
#[derive(Debug, Clone)]
pub struct MethodBody {
    sig: MethodSig,
    insns: Vec<Instruction>,
    pub locals: Vec<LocalVariable>,
    pub exception_ranges: Vec<ExceptionRange>,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl MethodBody {
    pub fn new(sig: MethodSig) -> Self {
        Self::with_insns(sig, Vec::new())
    }

    pub fn with_insns(sig: MethodSig, insns: Vec<Instruction>) -> Self {
        Self {
            sig,
            insns,
            locals: Vec::new(),
            exception_ranges: Vec::new(),
            max_stack: 0,
            max_locals: 0,
        }
    }

    pub fn sig(&self) -> &MethodSig {
        &self.sig
    }

    pub fn name(&self) -> &str {
        &self.sig.name
    }

    pub fn descriptor(&self) -> &str {
        &self.sig.descriptor
    }

    pub fn insns(&self) -> &[Instruction] {
        &self.insns
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.insns.get(index)
    }

    /// Index of the instruction defining the given label.
    pub fn label_index(&self, id: LabelId) -> Option<usize> {
        self.insns
            .iter()
            .position(|insn| insn.opcode() == Opcode::Label && insn.label() == Some(id))
    }

    pub(crate) fn splice_insns<R>(&mut self, range: R, insns: Vec<Instruction>)
    where
        R: RangeBounds<usize>,
    {
        self.insns.splice(range, insns);
    }

    /// Check every structural invariant: label uniqueness and reachability,
    /// and that the declared `max_stack`/`max_locals` cover the simulated
    /// requirement.
    pub fn verify(&self, class_name: &str) -> Result<()> {
        let (stack, locals) = self.requirements(class_name)?;
        if stack > self.max_stack {
            return Err(self.violation(
                class_name,
                format!("max_stack {} below required {stack}", self.max_stack),
            ));
        }
        if locals > self.max_locals {
            return Err(self.violation(
                class_name,
                format!("max_locals {} below required {locals}", self.max_locals),
            ));
        }
        Ok(())
    }

    /// Recompute capacities from a full simulation, raising the declared
    /// `max_stack`/`max_locals` to the requirement. Capacities are never
    /// lowered.
    pub fn raise_limits(&mut self, class_name: &str) -> Result<()> {
        let (stack, locals) = self.requirements(class_name)?;
        self.max_stack = self.max_stack.max(stack);
        self.max_locals = self.max_locals.max(locals);
        Ok(())
    }

    /// True stack and locals requirement of the current sequence, after
    /// checking label integrity. An empty body (not yet built) requires only
    /// its parameter slots.
    pub(crate) fn requirements(&self, class_name: &str) -> Result<(u16, u16)> {
        let labels = self.label_map(class_name)?;
        self.check_label_refs(class_name, &labels)?;
        let stack = if self.insns.is_empty() {
            0
        } else {
            self.simulate(class_name, &labels)?
        };
        Ok((stack, self.required_locals(class_name)?))
    }

    fn violation(&self, class_name: &str, detail: String) -> EngineError {
        EngineError::InvariantViolation {
            class: class_name.to_string(),
            method: self.sig.name.clone(),
            detail,
        }
    }

    fn label_map(&self, class_name: &str) -> Result<HashMap<LabelId, usize>> {
        let mut labels = HashMap::new();
        for (i, insn) in self.insns.iter().enumerate() {
            if insn.opcode() == Opcode::Label {
                let id = insn.label().ok_or_else(|| {
                    self.violation(class_name, format!("label without id at index {i}"))
                })?;
                if labels.insert(id, i).is_some() {
                    return Err(self.violation(class_name, format!("duplicate label {id}")));
                }
            }
        }
        Ok(labels)
    }

    fn check_label_refs(
        &self,
        class_name: &str,
        labels: &HashMap<LabelId, usize>,
    ) -> Result<()> {
        for (i, insn) in self.insns.iter().enumerate() {
            if insn.opcode().is_branch() {
                let target = insn.label().ok_or_else(|| {
                    self.violation(class_name, format!("branch without target at index {i}"))
                })?;
                if !labels.contains_key(&target) {
                    return Err(self.violation(
                        class_name,
                        format!("dangling label {target} referenced by branch at index {i}"),
                    ));
                }
            }
        }
        for local in &self.locals {
            for id in [local.start, local.end] {
                if !labels.contains_key(&id) {
                    return Err(self.violation(
                        class_name,
                        format!(
                            "dangling label {id} referenced by local variable `{}`",
                            local.name
                        ),
                    ));
                }
            }
        }
        for range in &self.exception_ranges {
            for id in [range.start, range.end, range.handler] {
                if !labels.contains_key(&id) {
                    return Err(self.violation(
                        class_name,
                        format!("dangling label {id} referenced by exception range"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Abstract stack simulation over every reachable path. Returns the
    /// maximum depth; fails on underflow, inconsistent depths at a merge
    /// point, or control flow running off the end of the sequence.
    fn simulate(&self, class_name: &str, labels: &HashMap<LabelId, usize>) -> Result<u16> {
        let mut depths: Vec<Option<u16>> = vec![None; self.insns.len()];
        let mut work: Vec<(usize, u16)> = vec![(0, 0)];
        for range in &self.exception_ranges {
            // Handler entry sees only the thrown reference.
            work.push((labels[&range.handler], 1));
        }
        let mut max_depth = 0u16;
        while let Some((start, start_depth)) = work.pop() {
            let mut i = start;
            let mut depth = start_depth;
            loop {
                if i >= self.insns.len() {
                    return Err(self.violation(
                        class_name,
                        "control flow runs off the end of the method".to_string(),
                    ));
                }
                match depths[i] {
                    Some(seen) if seen == depth => break,
                    Some(seen) => {
                        return Err(self.violation(
                            class_name,
                            format!("stack depth mismatch at index {i}: {seen} vs {depth}"),
                        ));
                    }
                    None => depths[i] = Some(depth),
                }
                let insn = &self.insns[i];
                let effect = insn.stack_effect()?;
                if depth < effect.pops {
                    return Err(self.violation(
                        class_name,
                        format!("stack underflow at index {i} ({insn})"),
                    ));
                }
                depth = depth - effect.pops + effect.pushes;
                max_depth = max_depth.max(depth);
                let op = insn.opcode();
                if op.is_return() {
                    break;
                }
                if op.is_branch() {
                    // Targets were checked by check_label_refs.
                    let target = insn.label().and_then(|id| labels.get(&id)).copied();
                    match target {
                        Some(t) => work.push((t, depth)),
                        None => {
                            return Err(self.violation(
                                class_name,
                                format!("branch without target at index {i}"),
                            ));
                        }
                    }
                    if op == Opcode::Goto {
                        break;
                    }
                }
                i += 1;
            }
        }
        Ok(max_depth)
    }

    fn required_locals(&self, class_name: &str) -> Result<u16> {
        let desc = self.sig.parsed_descriptor()?;
        let receiver: u32 = if self.sig.is_static() { 0 } else { 1 };
        // Widened so that a top-of-range slot cannot wrap the sum.
        let mut required = receiver + u32::from(desc.param_slots());
        for insn in &self.insns {
            if let Some(slot) = insn.slot() {
                let top = u32::from(slot) + u32::from(insn.opcode().local_width());
                required = required.max(top);
            }
        }
        for local in &self.locals {
            let width = TypeDescriptor::parse(&local.descriptor)
                .map_err(EngineError::Insn)?
                .width();
            required = required.max(u32::from(local.slot) + u32::from(width));
        }
        u16::try_from(required).map_err(|_| {
            self.violation(
                class_name,
                format!("required locals {required} exceed the addressable frame size"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classpatch_insn::{ConstValue, Instruction, LabelId};

    fn sig(descriptor: &str) -> MethodSig {
        MethodSig::new("m", descriptor, AccessFlags::PUBLIC)
    }

    #[test]
    fn requirements_of_simple_body() {
        let body = MethodBody::with_insns(
            sig("(Ljava/lang/String;)Ljava/lang/String;"),
            vec![Instruction::aload(1), Instruction::areturn()],
        );
        let (stack, locals) = body.requirements("a/B").unwrap();
        assert_eq!(stack, 1);
        assert_eq!(locals, 2); // this + one reference param
    }

    #[test]
    fn wide_params_take_two_slots() {
        let body = MethodBody::with_insns(sig("(DJ)V"), vec![Instruction::return_void()]);
        let (_, locals) = body.requirements("a/B").unwrap();
        assert_eq!(locals, 5);
    }

    #[test]
    fn underflow_detected() {
        let body = MethodBody::with_insns(sig("()V"), vec![Instruction::pop()]);
        let err = body.requirements("a/B").unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }

    #[test]
    fn running_off_the_end_detected() {
        let body = MethodBody::with_insns(sig("()V"), vec![Instruction::nop()]);
        assert!(body.requirements("a/B").is_err());
    }

    #[test]
    fn duplicate_label_detected() {
        let body = MethodBody::with_insns(
            sig("()V"),
            vec![
                Instruction::mark(LabelId(0)),
                Instruction::mark(LabelId(0)),
                Instruction::return_void(),
            ],
        );
        assert!(body.requirements("a/B").is_err());
    }

    #[test]
    fn dangling_branch_target_detected() {
        let body = MethodBody::with_insns(
            sig("()V"),
            vec![Instruction::goto(LabelId(9)), Instruction::return_void()],
        );
        assert!(body.requirements("a/B").is_err());
    }

    #[test]
    fn branch_paths_merge() {
        // ldc; ifeq L0; return | L0: return — both paths simulate cleanly.
        let body = MethodBody::with_insns(
            sig("()V"),
            vec![
                Instruction::ldc(ConstValue::Int(1)),
                Instruction::if_eq(LabelId(0)),
                Instruction::return_void(),
                Instruction::mark(LabelId(0)),
                Instruction::return_void(),
            ],
        );
        let (stack, _) = body.requirements("a/B").unwrap();
        assert_eq!(stack, 1);
    }

    #[test]
    fn verify_rejects_undersized_max_stack() {
        let mut body = MethodBody::with_insns(
            sig("()I"),
            vec![Instruction::ldc(ConstValue::Int(7)), Instruction::ireturn()],
        );
        body.max_locals = 1;
        body.max_stack = 0;
        assert!(body.verify("a/B").is_err());
        body.max_stack = 1;
        body.verify("a/B").unwrap();
    }
}
