//! Structural mutation of method bodies.
//!
//! Every operation re-verifies the edited method and raises its declared
//! `max_stack`/`max_locals` to the simulated requirement, so a method handed
//! back to the host pipeline is well-formed or the edit has failed loudly.
//! Instruction indices are only valid until the next mutation; callers must
//! re-locate rather than cache them across edits.

use crate::class::ClassUnit;
use crate::dispatch::Outcome;
use crate::error::{EngineError, Result};
use crate::locator::{self, Pattern};
use crate::method::MethodBody;
use classpatch_insn::{Instruction, LabelId, Opcode};
use std::collections::HashSet;

impl ClassUnit {
    /// Insert `insns` so that execution reaches them immediately before the
    /// instruction currently at `at`. `at == len` appends at the end.
    pub fn insert_before(
        &mut self,
        name: &str,
        descriptor: &str,
        at: usize,
        insns: Vec<Instruction>,
    ) -> Result<()> {
        let idx = self.require_method(name, descriptor)?;
        let len = self.methods()[idx].len();
        if at > len {
            return Err(self.out_of_bounds(name, at, len));
        }
        self.check_symbols(name, &insns)?;
        self.apply_edit(idx, |m| m.splice_insns(at..at, insns))
    }

    /// Insert `insns` immediately after the instruction at `at`.
    pub fn insert_after(
        &mut self,
        name: &str,
        descriptor: &str,
        at: usize,
        insns: Vec<Instruction>,
    ) -> Result<()> {
        let idx = self.require_method(name, descriptor)?;
        let len = self.methods()[idx].len();
        if at >= len {
            return Err(self.out_of_bounds(name, at, len));
        }
        self.check_symbols(name, &insns)?;
        self.apply_edit(idx, |m| m.splice_insns(at + 1..at + 1, insns))
    }

    /// Replace the inclusive instruction range `from..=to` with `insns`.
    /// Refuses to remove a label that anything outside the range still
    /// references.
    pub fn replace_range(
        &mut self,
        name: &str,
        descriptor: &str,
        from: usize,
        to: usize,
        insns: Vec<Instruction>,
    ) -> Result<()> {
        let idx = self.require_method(name, descriptor)?;
        let len = self.methods()[idx].len();
        if from > to || to >= len {
            return Err(self.out_of_bounds(name, to, len));
        }
        self.check_removed_labels(idx, from, to, &insns)?;
        self.check_symbols(name, &insns)?;
        self.apply_edit(idx, |m| m.splice_insns(from..=to, insns))
    }

    /// The "wrap the return value" recipe: before every return instruction,
    /// insert a copy of `wrapper`. A method may have one return per exit
    /// path and every one must be wrapped. The scan resumes past each
    /// insertion, so shifted indices stay correct.
    pub fn wrap_returns(
        &mut self,
        name: &str,
        descriptor: &str,
        wrapper: &[Instruction],
    ) -> Result<Outcome> {
        let idx = self.require_method(name, descriptor)?;
        self.check_symbols(name, wrapper)?;
        if locator::find(&self.methods()[idx], &Pattern::AnyReturn, 0).is_none() {
            return Ok(Outcome::PatternNotFound);
        }
        let mut wrapped = 0usize;
        self.apply_edit(idx, |m| {
            let mut i = 0;
            while i < m.len() {
                if m.insns()[i].opcode().is_return() {
                    m.splice_insns(i..i, wrapper.to_vec());
                    i += wrapper.len() + 1;
                    wrapped += 1;
                } else {
                    i += 1;
                }
            }
        })?;
        log::debug!("{}.{name}: wrapped {wrapped} return site(s)", self.name());
        Ok(Outcome::Patched)
    }

    /// The "inject at first label after marker" recipe: find the uniquely
    /// identifying `marker`, then the next label after it, and insert
    /// `insns` immediately after that label. Hooks a specific basic block
    /// rather than every exit.
    pub fn inject_after_label(
        &mut self,
        name: &str,
        descriptor: &str,
        marker: &Pattern,
        insns: Vec<Instruction>,
    ) -> Result<Outcome> {
        let idx = self.require_method(name, descriptor)?;
        let body = &self.methods()[idx];
        let Some(anchor) = locator::find(body, marker, 0) else {
            return Ok(Outcome::PatternNotFound);
        };
        let Some(label_at) = locator::find(body, &Pattern::AnyLabel, anchor + 1) else {
            return Ok(Outcome::PatternNotFound);
        };
        self.check_symbols(name, &insns)?;
        self.apply_edit(idx, |m| m.splice_insns(label_at + 1..label_at + 1, insns))?;
        log::debug!("{}.{name}: injected after label at index {label_at}", self.name());
        Ok(Outcome::Patched)
    }

    fn require_method(&self, name: &str, descriptor: &str) -> Result<usize> {
        self.method_index(name, descriptor)
            .ok_or_else(|| EngineError::NoSuchMethod {
                class: self.name().to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
    }

    fn out_of_bounds(&self, method: &str, index: usize, len: usize) -> EngineError {
        EngineError::IndexOutOfBounds {
            class: self.name().to_string(),
            method: method.to_string(),
            index,
            len,
        }
    }

    /// Reject inserted instructions that reference a member of this class
    /// the class does not declare. References to other classes cannot be
    /// checked at patch time and are deferred to the host's loader.
    fn check_symbols(&self, method: &str, insns: &[Instruction]) -> Result<()> {
        for (i, insn) in insns.iter().enumerate() {
            let Some(member) = insn.member() else { continue };
            if member.owner != self.name() {
                continue;
            }
            let declared = if insn.opcode().is_field_access() {
                self.field(&member.name, &member.descriptor).is_some()
            } else {
                self.method(&member.name, &member.descriptor).is_some()
            };
            if !declared {
                return Err(EngineError::UnresolvedSymbol {
                    class: self.name().to_string(),
                    method: method.to_string(),
                    index: i,
                    owner: member.owner.clone(),
                    name: member.name.clone(),
                    descriptor: member.descriptor.clone(),
                });
            }
        }
        Ok(())
    }

    /// Labels defined inside `from..=to` must not be referenced by anything
    /// that survives the replacement.
    fn check_removed_labels(
        &self,
        idx: usize,
        from: usize,
        to: usize,
        replacement: &[Instruction],
    ) -> Result<()> {
        let body = &self.methods()[idx];
        let removed: HashSet<LabelId> = body.insns()[from..=to]
            .iter()
            .filter(|insn| insn.opcode() == Opcode::Label)
            .filter_map(Instruction::label)
            .filter(|id| {
                // A label re-defined by the replacement sequence survives.
                !replacement
                    .iter()
                    .any(|r| r.opcode() == Opcode::Label && r.label() == Some(*id))
            })
            .collect();
        if removed.is_empty() {
            return Ok(());
        }
        let viol = |id: LabelId, what: &str| EngineError::InvariantViolation {
            class: self.name().to_string(),
            method: body.name().to_string(),
            detail: format!("replacement would remove label {id} still referenced by {what}"),
        };
        for (i, insn) in body.insns().iter().enumerate() {
            if (from..=to).contains(&i) || !insn.opcode().is_branch() {
                continue;
            }
            if let Some(target) = insn.label() {
                if removed.contains(&target) {
                    return Err(viol(target, "a branch"));
                }
            }
        }
        for local in &body.locals {
            for id in [local.start, local.end] {
                if removed.contains(&id) {
                    return Err(viol(id, "a local variable range"));
                }
            }
        }
        for range in &body.exception_ranges {
            for id in [range.start, range.end, range.handler] {
                if removed.contains(&id) {
                    return Err(viol(id, "an exception range"));
                }
            }
        }
        Ok(())
    }

    /// Apply a mutation, re-simulate the method, and raise its declared
    /// capacities to the new requirement. On failure the method is restored
    /// to its pre-edit state, so a malformed body can never be handed back
    /// to the host pipeline.
    fn apply_edit(&mut self, idx: usize, mutate: impl FnOnce(&mut MethodBody)) -> Result<()> {
        let class_name = self.name().to_string();
        let saved = self.methods()[idx].clone();
        let method = self.method_at(idx);
        mutate(method);
        if let Err(err) = method.raise_limits(&class_name) {
            *self.method_at(idx) = saved;
            return Err(err);
        }
        Ok(())
    }
}
