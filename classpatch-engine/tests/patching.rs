//! End-to-end patching scenarios: wrapping returns, injecting at labels,
//! dispatch ordering, and graceful handling of version drift.

mod common;

use classpatch_engine::insn::{AccessFlags, ConstValue, Instruction, LabelId, MemberRef, Opcode};
use classpatch_engine::{
    CallKind, MethodSig, Outcome, Pattern, Registry, find, find_all, forwarder,
};
use common::{class_with_method, init_logging};

const HOOK: &str = "org/example/hooks/Decorators";

fn decorate_call() -> Instruction {
    Instruction::invoke_static(HOOK, "decorate", "(Ljava/lang/String;)Ljava/lang/String;")
}

/// Two-exit method returning a string: `if (cond) return "a"; return "b";`
fn two_exit_insns() -> Vec<Instruction> {
    vec![
        Instruction::ldc(ConstValue::Int(1)),
        Instruction::if_eq(LabelId(0)),
        Instruction::ldc_str("a"),
        Instruction::areturn(),
        Instruction::mark(LabelId(0)),
        Instruction::ldc_str("b"),
        Instruction::areturn(),
    ]
}

#[test]
fn wrap_returns_covers_every_exit_path() {
    init_logging();
    let mut class = class_with_method(
        "host/Widget",
        "describe",
        "()Ljava/lang/String;",
        two_exit_insns(),
    );
    let outcome = class
        .wrap_returns("describe", "()Ljava/lang/String;", &[decorate_call()])
        .unwrap();
    assert_eq!(outcome, Outcome::Patched);

    let body = class.method("describe", "()Ljava/lang/String;").unwrap();
    let returns = find_all(body, &Pattern::AnyReturn);
    assert_eq!(returns.len(), 2);
    // One delegating call immediately before each return, no return left
    // unwrapped.
    for at in returns {
        assert_eq!(body.get(at - 1), Some(&decorate_call()));
    }
    assert_eq!(
        find_all(body, &Pattern::member(HOOK, "decorate", "(Ljava/lang/String;)Ljava/lang/String;"))
            .len(),
        2
    );
    class.verify().unwrap();
}

#[test]
fn wrap_returns_raises_max_stack() {
    let mut class = class_with_method(
        "host/Widget",
        "describe",
        "()Ljava/lang/String;",
        two_exit_insns(),
    );
    let before = class
        .method("describe", "()Ljava/lang/String;")
        .unwrap()
        .max_stack;
    assert_eq!(before, 1);

    // The wrapper loads an extra argument, so the stack peaks at two slots.
    let wrapper = [
        Instruction::aload(0),
        Instruction::invoke_static(
            HOOK,
            "decorate",
            "(Ljava/lang/String;Ljava/lang/Object;)Ljava/lang/String;",
        ),
    ];
    class
        .wrap_returns("describe", "()Ljava/lang/String;", &wrapper)
        .unwrap();
    let body = class.method("describe", "()Ljava/lang/String;").unwrap();
    assert_eq!(body.max_stack, 2);
    class.verify().unwrap();
}

#[test]
fn wrap_returns_without_return_sites_reports_not_found() {
    // A method that never returns has nothing to wrap.
    let mut class = class_with_method(
        "host/Spinner",
        "forever",
        "()V",
        vec![Instruction::mark(LabelId(0)), Instruction::goto(LabelId(0))],
    );
    let outcome = class
        .wrap_returns("forever", "()V", &[Instruction::nop()])
        .unwrap();
    assert_eq!(outcome, Outcome::PatternNotFound);
    assert_eq!(class.method("forever", "()V").unwrap().len(), 2);
}

#[test]
fn inject_after_label_following_marker_constant() {
    init_logging();
    // [label L0, ldc "target#inventory", nop, label L1, return]
    let mut class = class_with_method(
        "host/ModelLoader",
        "prepare",
        "()V",
        vec![
            Instruction::mark(LabelId(0)),
            Instruction::ldc_str("target#inventory"),
            Instruction::pop(),
            Instruction::mark(LabelId(1)),
            Instruction::return_void(),
        ],
    );
    let hook = Instruction::invoke_static(HOOK, "prepare", "()V");
    let outcome = class
        .inject_after_label(
            "prepare",
            "()V",
            &Pattern::ldc_str("target#inventory"),
            vec![hook.clone()],
        )
        .unwrap();
    assert_eq!(outcome, Outcome::Patched);

    // The delegating call lands immediately after L1 and before the return.
    let body = class.method("prepare", "()V").unwrap();
    let expected = vec![
        Instruction::mark(LabelId(0)),
        Instruction::ldc_str("target#inventory"),
        Instruction::pop(),
        Instruction::mark(LabelId(1)),
        hook,
        Instruction::return_void(),
    ];
    assert_eq!(body.insns(), expected.as_slice());
    class.verify().unwrap();
}

#[test]
fn absent_marker_leaves_method_unchanged() {
    // [loadThis, loadParam, return] with no marker constant anywhere.
    let insns = vec![
        Instruction::aload(0),
        Instruction::aload(1),
        Instruction::pop(),
        Instruction::pop(),
        Instruction::return_void(),
    ];
    let mut class = class_with_method(
        "host/Widget",
        "apply",
        "(Ljava/lang/Object;)V",
        insns.clone(),
    );
    let outcome = class
        .inject_after_label(
            "apply",
            "(Ljava/lang/Object;)V",
            &Pattern::ldc_str("absent-in-this-release"),
            vec![Instruction::nop()],
        )
        .unwrap();
    assert_eq!(outcome, Outcome::PatternNotFound);
    assert_eq!(
        class.method("apply", "(Ljava/lang/Object;)V").unwrap().insns(),
        insns.as_slice()
    );
}

#[test]
fn transform_guard_makes_wrapping_idempotent() {
    let mut class = class_with_method(
        "host/Widget",
        "describe",
        "()Ljava/lang/String;",
        two_exit_insns(),
    );
    let hook_pattern =
        Pattern::member(HOOK, "decorate", "(Ljava/lang/String;)Ljava/lang/String;");

    let mut run = |class: &mut classpatch_engine::ClassUnit| {
        let body = class.method("describe", "()Ljava/lang/String;").unwrap();
        if find(body, &hook_pattern, 0).is_some() {
            // Already patched in a previous pass.
            return Outcome::PatternNotFound;
        }
        class
            .wrap_returns("describe", "()Ljava/lang/String;", &[decorate_call()])
            .unwrap()
    };

    assert_eq!(run(&mut class), Outcome::Patched);
    assert_eq!(run(&mut class), Outcome::PatternNotFound);

    let body = class.method("describe", "()Ljava/lang/String;").unwrap();
    assert_eq!(find_all(body, &hook_pattern).len(), 2);
}

#[test]
fn dispatch_applies_transforms_in_registration_order() {
    init_logging();
    let mut registry = Registry::new();
    // T1 plants a marker constant before every return; T2 only matches if it
    // can see T1's marker, proving it observes T1's edits.
    registry.register(
        "t1_plant_marker",
        "host/Widget",
        Box::new(|class| {
            class.wrap_returns(
                "describe",
                "()Ljava/lang/String;",
                &[Instruction::ldc_str("t1:marker"), Instruction::pop()],
            )
        }),
    );
    registry.register(
        "t2_find_marker",
        "host/Widget",
        Box::new(|class| {
            let body = class.method("describe", "()Ljava/lang/String;").unwrap();
            let Some(at) = find(body, &Pattern::ldc_str("t1:marker"), 0) else {
                return Ok(Outcome::PatternNotFound);
            };
            class.insert_after("describe", "()Ljava/lang/String;", at + 1, vec![
                Instruction::nop(),
            ])?;
            Ok(Outcome::Patched)
        }),
    );

    let mut class = class_with_method(
        "host/Widget",
        "describe",
        "()Ljava/lang/String;",
        two_exit_insns(),
    );
    let report = registry.dispatch(&mut class).unwrap();
    assert_eq!(report.applied, ["t1_plant_marker", "t2_find_marker"]);
    assert!(report.skipped.is_empty());
    class.verify().unwrap();
}

#[test]
fn dispatch_skips_unrelated_classes_and_missing_methods() {
    let mut registry = Registry::new();
    registry.register(
        "never_runs",
        "host/Other",
        Box::new(|_| panic!("transform for another class must not run")),
    );
    registry.register_method(
        "forge_only_overload",
        "host/Widget",
        "getOverrides",
        "(Lhost/Model;)Lhost/Overrides;",
        Box::new(|_| Ok(Outcome::Patched)),
    );

    let mut class = class_with_method(
        "host/Widget",
        "describe",
        "()Ljava/lang/String;",
        two_exit_insns(),
    );
    let report = registry.dispatch(&mut class).unwrap();
    assert!(report.applied.is_empty());
    // The method-gated registration is reported, not failed: optional
    // overloads are absent in most releases.
    assert_eq!(report.skipped, ["forge_only_overload"]);
}

#[test]
fn dispatch_aborts_class_on_hard_error() {
    let mut registry = Registry::new();
    registry.register(
        "bad_edit",
        "host/Widget",
        Box::new(|class| {
            // References a field the class does not declare.
            class.insert_before(
                "describe",
                "()Ljava/lang/String;",
                0,
                vec![
                    Instruction::aload(0),
                    Instruction::get_field("host/Widget", "missing", "I"),
                    Instruction::pop(),
                ],
            )?;
            Ok(Outcome::Patched)
        }),
    );
    let mut class = class_with_method(
        "host/Widget",
        "describe",
        "()Ljava/lang/String;",
        two_exit_insns(),
    );
    assert!(registry.dispatch(&mut class).is_err());
}

#[test]
fn forwarder_plus_call_site_rewrite() {
    init_logging();
    // Decouple "what runs" from the original call graph: append a private
    // forwarder, then redirect the original call site to it.
    let mut class = class_with_method(
        "host/ModelBakery",
        "bake",
        "()V",
        vec![
            Instruction::aload(0),
            Instruction::invoke_virtual("host/ModelBakery", "register", "()V"),
            Instruction::return_void(),
        ],
    );
    let mut register = classpatch_engine::MethodBody::with_insns(
        MethodSig::new("register", "()V", AccessFlags::PUBLIC),
        vec![Instruction::return_void()],
    );
    register.raise_limits("host/ModelBakery").unwrap();
    class.append_method(register).unwrap();

    let target = MemberRef::new("host/ModelBakery", "register", "()V");
    let body = forwarder(
        "host/ModelBakery",
        MethodSig::new(
            "patch$register",
            "()V",
            AccessFlags::PRIVATE | AccessFlags::SYNTHETIC,
        ),
        CallKind::Special,
        &target,
    )
    .unwrap();
    class.append_method(body).unwrap();

    let call_at = find(
        class.method("bake", "()V").unwrap(),
        &Pattern::member("host/ModelBakery", "register", "()V"),
        0,
    )
    .unwrap();
    class
        .replace_range(
            "bake",
            "()V",
            call_at,
            call_at,
            vec![Instruction::invoke_special(
                "host/ModelBakery",
                "patch$register",
                "()V",
            )],
        )
        .unwrap();

    let body = class.method("bake", "()V").unwrap();
    assert_eq!(
        body.get(1),
        Some(&Instruction::invoke_special(
            "host/ModelBakery",
            "patch$register",
            "()V"
        ))
    );
    assert_eq!(
        find(body, &Pattern::Op(Opcode::InvokeVirtual), 0),
        None,
        "original virtual call site must be gone"
    );
    class.verify().unwrap();
}
