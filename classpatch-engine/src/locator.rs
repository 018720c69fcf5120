//! Pattern locator: structural search over an instruction sequence.
//!
//! Patterns are stateless values, reusable across methods and classes.
//! "Not found" is a normal `None` return, never an error: transforms are
//! written defensively across several known shapes of the host library and
//! expect most shapes not to match.

use crate::method::MethodBody;
use classpatch_insn::{ConstValue, Instruction, Opcode};

/// A predicate over a single instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Exact opcode.
    Op(Opcode),
    /// Any return instruction.
    AnyReturn,
    /// Any label pseudo-instruction.
    AnyLabel,
    /// An `ldc` of exactly this constant.
    Const(ConstValue),
    /// Any field access or invocation of exactly this symbolic reference.
    Member {
        owner: String,
        name: String,
        descriptor: String,
    },
    /// Any of the given patterns.
    AnyOf(Vec<Pattern>),
}

impl Pattern {
    /// Shorthand for the common "marker string constant" pattern.
    pub fn ldc_str(value: &str) -> Self {
        Pattern::Const(ConstValue::Str(value.to_string()))
    }

    pub fn member(owner: &str, name: &str, descriptor: &str) -> Self {
        Pattern::Member {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }

    pub fn matches(&self, insn: &Instruction) -> bool {
        match self {
            Pattern::Op(opcode) => insn.opcode() == *opcode,
            Pattern::AnyReturn => insn.opcode().is_return(),
            Pattern::AnyLabel => insn.opcode() == Opcode::Label,
            Pattern::Const(value) => insn.constant() == Some(value),
            Pattern::Member {
                owner,
                name,
                descriptor,
            } => insn.member().is_some_and(|m| {
                m.owner == *owner && m.name == *name && m.descriptor == *descriptor
            }),
            Pattern::AnyOf(patterns) => patterns.iter().any(|p| p.matches(insn)),
        }
    }
}

/// First index at or after `from` whose instruction satisfies `pattern`.
pub fn find(body: &MethodBody, pattern: &Pattern, from: usize) -> Option<usize> {
    body.insns()
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, insn)| pattern.matches(insn))
        .map(|(i, _)| i)
}

/// First occurrence of `second` strictly after the first occurrence of
/// `first` — e.g. "the label immediately following this marker constant".
pub fn find_after(body: &MethodBody, first: &Pattern, second: &Pattern) -> Option<usize> {
    let anchor = find(body, first, 0)?;
    find(body, second, anchor + 1)
}

/// All indices whose instruction satisfies `pattern`, in order.
pub fn find_all(body: &MethodBody, pattern: &Pattern) -> Vec<usize> {
    body.insns()
        .iter()
        .enumerate()
        .filter(|(_, insn)| pattern.matches(insn))
        .map(|(i, _)| i)
        .collect()
}

/// First index at or after `from` where the instructions match `patterns`
/// consecutively. Returns the index of the window start.
pub fn find_seq(body: &MethodBody, patterns: &[Pattern], from: usize) -> Option<usize> {
    if patterns.is_empty() || body.len() < patterns.len() {
        return None;
    }
    (from..=body.len() - patterns.len()).find(|&start| {
        patterns
            .iter()
            .zip(&body.insns()[start..])
            .all(|(p, insn)| p.matches(insn))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodSig;
    use classpatch_insn::AccessFlags;

    fn body(insns: Vec<Instruction>) -> MethodBody {
        MethodBody::with_insns(MethodSig::new("m", "()V", AccessFlags::PUBLIC), insns)
    }

    #[test]
    fn find_respects_from_index() {
        let b = body(vec![
            Instruction::aload(0),
            Instruction::nop(),
            Instruction::aload(0),
            Instruction::return_void(),
        ]);
        let pat = Pattern::Op(Opcode::ALoad);
        assert_eq!(find(&b, &pat, 0), Some(0));
        assert_eq!(find(&b, &pat, 1), Some(2));
        assert_eq!(find(&b, &pat, 3), None);
    }

    #[test]
    fn find_after_label_following_marker() {
        use classpatch_insn::LabelId;
        let b = body(vec![
            Instruction::mark(LabelId(0)),
            Instruction::ldc_str("minecraft:trident_in_hand#inventory"),
            Instruction::nop(),
            Instruction::mark(LabelId(1)),
            Instruction::return_void(),
        ]);
        let at = find_after(
            &b,
            &Pattern::ldc_str("minecraft:trident_in_hand#inventory"),
            &Pattern::AnyLabel,
        );
        assert_eq!(at, Some(3));
    }

    #[test]
    fn find_after_absent_marker() {
        let b = body(vec![Instruction::return_void()]);
        assert_eq!(
            find_after(&b, &Pattern::ldc_str("gone"), &Pattern::AnyLabel),
            None
        );
    }

    #[test]
    fn member_pattern_is_slot_independent() {
        let pat = Pattern::member("a/B", "f", "I");
        assert!(pat.matches(&Instruction::get_field("a/B", "f", "I")));
        assert!(!pat.matches(&Instruction::get_field("a/B", "f", "J")));
        assert!(!pat.matches(&Instruction::aload(0)));
    }

    #[test]
    fn find_seq_matches_window() {
        let b = body(vec![
            Instruction::aload(0),
            Instruction::ldc_str("x"),
            Instruction::return_void(),
        ]);
        let seq = [
            Pattern::Op(Opcode::ALoad),
            Pattern::ldc_str("x"),
        ];
        assert_eq!(find_seq(&b, &seq, 0), Some(0));
        assert_eq!(find_seq(&b, &seq, 1), None);
        assert_eq!(find_seq(&b, &[], 0), None);
    }
}
