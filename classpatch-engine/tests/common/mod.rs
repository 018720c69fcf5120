use classpatch_engine::insn::{AccessFlags, Instruction};
use classpatch_engine::{ClassUnit, MethodBody, MethodSig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A class with a single public method built from the given instructions,
/// with capacities settled the way a compiler would have emitted them.
pub fn class_with_method(
    class_name: &str,
    name: &str,
    descriptor: &str,
    insns: Vec<Instruction>,
) -> ClassUnit {
    let mut class = ClassUnit::new(class_name);
    let sig = MethodSig::new(name, descriptor, AccessFlags::PUBLIC);
    let mut body = MethodBody::with_insns(sig, insns);
    body.raise_limits(class_name).unwrap();
    class.append_method(body).unwrap();
    class
}
