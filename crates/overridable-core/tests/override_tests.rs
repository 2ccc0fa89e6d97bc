use std::sync::Arc;

use overridable_core::{
    method_fn, Block, ClassDef, MethodNames, OverrideError, UnitDef, Value, Visibility,
};
use pretty_assertions::assert_eq;

/// Thing: a class with methods taking no, one, any arguments and a block
fn create_thing() -> Arc<ClassDef> {
    let thing = ClassDef::new("Thing");
    thing.define("no_arguments", |_| Ok(Value::from("This is Thing.")));
    thing.define("one_argument", |inv| {
        Ok(inv.arg(0).cloned().unwrap_or(Value::Null))
    });
    thing.define("any_arguments", |inv| Ok(Value::from(Value::join(inv.args(), "-"))));
    thing.define("with_block", |inv| inv.yield_block(inv.args()));
    thing.define("keep_unchanged", |_| Ok(Value::from("unchanged")));
    thing
}

fn int(inv: &overridable_core::Invocation<'_>, index: usize) -> i64 {
    inv.arg(index).and_then(Value::as_integer).unwrap_or_default()
}

fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

fn joining_block() -> Block {
    Arc::new(|args: &[Value]| Ok(Value::from(Value::join(args, "-"))))
}

fn times_ten(args: &[Value]) -> Vec<Value> {
    args.iter()
        .map(|a| Value::from(a.to_string().repeat(10)))
        .collect()
}

/// Replacement unit: same names, new bodies, no super calls
fn replacing_unit(name: &str) -> Arc<UnitDef> {
    let unit = UnitDef::new(name);
    let label = format!("This is {name}.");
    unit.define("no_arguments", move |_| Ok(Value::from(label.clone())));
    unit.define("one_argument", |inv| Ok(Value::from(int(inv, 0) * 10)));
    unit.define("any_arguments", |inv| Ok(Value::from(Value::join(inv.args(), "_"))));
    unit.define("with_block", |inv| inv.yield_block(&times_ten(inv.args())));
    unit.define("keep_unchanged", |_| Ok(Value::from("changed")));
    Arc::new(unit)
}

/// Unit whose methods call the implementation they supersede
fn delegating_unit() -> Arc<UnitDef> {
    let unit = UnitDef::new("ModuleC");
    unit.define("no_arguments", |inv| {
        Ok(Value::from(format!("{}This is ModuleC.", inv.call_super()?)))
    });
    unit.define("one_argument", |inv| {
        let base = inv.call_super()?.as_integer().unwrap_or_default();
        Ok(Value::from(base + 123))
    });
    unit.define("any_arguments", |inv| {
        let original = inv.call_super()?;
        Ok(Value::from(format!("{original}@{}", Value::join(inv.args(), "_"))))
    });
    unit.define("with_block", |inv| {
        let wrapped: Vec<Value> = inv
            .args()
            .iter()
            .map(|a| Value::from(format!("|{a}|")))
            .collect();
        inv.call_super_with(&wrapped, inv.block())
    });
    unit.define("keep_unchanged", |inv| {
        inv.call_super()?;
        Ok(Value::from("changed"))
    });
    Arc::new(unit)
}

fn mark_overridable(thing: &ClassDef) {
    thing
        .overrides(vec![
            "no_arguments",
            "one_argument",
            "any_arguments",
            "with_block",
        ])
        .unwrap();
}

#[test]
fn test_plain_include_does_not_override() {
    let thing = create_thing();
    thing.include(replacing_unit("ModuleA")).unwrap();
    let obj = thing.instantiate();

    assert_eq!(obj.call("no_arguments", &[]).unwrap(), Value::from("This is Thing."));
    assert_eq!(obj.call("one_argument", &[Value::from(10i64)]).unwrap(), Value::from(10i64));
    assert_eq!(
        obj.call("any_arguments", &strings(&["a", "b", "c"])).unwrap(),
        Value::from("a-b-c")
    );
    assert_eq!(
        obj.call_with_block("with_block", &strings(&["a", "b", "c"]), joining_block())
            .unwrap(),
        Value::from("a-b-c")
    );
    assert_eq!(obj.call("keep_unchanged", &[]).unwrap(), Value::from("unchanged"));
}

#[test]
fn test_marked_methods_are_replaced() {
    let thing = create_thing();
    mark_overridable(&thing);
    thing.include(replacing_unit("ModuleB")).unwrap();
    let obj = thing.instantiate();

    assert_eq!(obj.call("no_arguments", &[]).unwrap(), Value::from("This is ModuleB."));
    assert_eq!(obj.call("one_argument", &[Value::from(10i64)]).unwrap(), Value::from(100i64));
    assert_eq!(
        obj.call("any_arguments", &strings(&["a", "b", "c"])).unwrap(),
        Value::from("a_b_c")
    );
    assert_eq!(
        obj.call_with_block("with_block", &strings(&["a", "b", "c"]), joining_block())
            .unwrap(),
        Value::from("aaaaaaaaaa-bbbbbbbbbb-cccccccccc")
    );
    assert_eq!(obj.call("keep_unchanged", &[]).unwrap(), Value::from("unchanged"));
}

#[test]
fn test_marked_methods_delegate_to_originals() {
    let thing = create_thing();
    mark_overridable(&thing);
    thing.include(delegating_unit()).unwrap();
    let obj = thing.instantiate();

    assert_eq!(
        obj.call("no_arguments", &[]).unwrap(),
        Value::from("This is Thing.This is ModuleC.")
    );
    assert_eq!(obj.call("one_argument", &[Value::from(10i64)]).unwrap(), Value::from(133i64));
    assert_eq!(
        obj.call("any_arguments", &strings(&["a", "b", "c"])).unwrap(),
        Value::from("a-b-c@a_b_c")
    );
    assert_eq!(
        obj.call_with_block("with_block", &strings(&["a", "b", "c"]), joining_block())
            .unwrap(),
        Value::from("|a|-|b|-|c|")
    );
    assert_eq!(obj.call("keep_unchanged", &[]).unwrap(), Value::from("unchanged"));
}

#[test]
fn test_visibility_survives_shadowing() {
    let thing = create_thing();
    thing.define_method(
        "protected_method",
        Visibility::Protected,
        method_fn(|_| Ok(Value::Null)),
    );
    thing.define_method(
        "private_method",
        Visibility::Private,
        method_fn(|_| Ok(Value::Null)),
    );
    thing.overrides(["protected_method", "private_method"]).unwrap();

    let unit = UnitDef::new("Touch");
    unit.define_method(
        "protected_method",
        Visibility::Protected,
        method_fn(|inv| inv.call_super()),
    );
    unit.define_method(
        "private_method",
        Visibility::Private,
        method_fn(|inv| inv.call_super()),
    );
    let report = thing.include(Arc::new(unit)).unwrap();
    assert_eq!(report.shadowed, vec!["protected_method", "private_method"]);

    let obj = thing.instantiate();
    let err = obj.call("protected_method", &[]).unwrap_err();
    assert!(matches!(err, OverrideError::VisibilityError { visibility: Visibility::Protected, .. }));
    assert!(err.to_string().contains("protected method `protected_method' called"));

    let err = obj.call("private_method", &[]).unwrap_err();
    assert!(err.to_string().contains("private method `private_method' called"));

    // the shadowed originals keep their tags
    assert_eq!(thing.method_chain("private_method")[1].visibility, Visibility::Private);
    assert_eq!(thing.method_chain("protected_method")[1].visibility, Visibility::Protected);
}

#[test]
fn test_only_whitelist_overrides_listed_names() {
    let thing = create_thing();
    thing.define("g", |_| Ok(Value::from("Thing.g")));
    thing.overrides("no_arguments").unwrap();

    let unit = UnitDef::new("B");
    unit.define("no_arguments", |_| Ok(Value::from("B.f")));
    unit.define("g", |_| Ok(Value::from("B.g")));
    thing.include(Arc::new(unit)).unwrap();

    let obj = thing.instantiate();
    assert_eq!(obj.call("no_arguments", &[]).unwrap(), Value::from("B.f"));
    assert_eq!(obj.call("g", &[]).unwrap(), Value::from("Thing.g"));
}

#[test]
fn test_except_beats_only() {
    let build = |options: Vec<(&str, MethodNames)>| {
        let thing = ClassDef::new("H");
        thing.define("f", |_| Ok(Value::from("H.f")));
        thing.define("g", |_| Ok(Value::from("H.g")));
        thing.restrict_overrides(options).unwrap();

        let unit = UnitDef::new("B");
        unit.define("f", |inv| Ok(Value::from(format!("{}.B.f", inv.call_super()?))));
        unit.define("g", |_| Ok(Value::from("B.g")));
        let report = thing.include(Arc::new(unit)).unwrap();

        let obj = thing.instantiate();
        (
            report.shadowed,
            obj.call("f", &[]).unwrap(),
            obj.call("g", &[]).unwrap(),
        )
    };

    let conflicting = build(vec![
        ("only", MethodNames::from(["f", "g"])),
        ("except", MethodNames::from("g")),
    ]);
    let plain = build(vec![("only", MethodNames::from("f"))]);

    assert_eq!(conflicting, plain);
    assert_eq!(plain.1, Value::from("H.f.B.f"));
    assert_eq!(plain.2, Value::from("H.g"));
}

#[test]
fn test_invalid_option_is_rejected() {
    let thing = create_thing();
    let err = thing
        .restrict_overrides([("but", MethodNames::from("no_arguments"))])
        .unwrap_err();
    assert!(matches!(err, OverrideError::InvalidConfiguration { .. }));
    assert!(thing.policy().is_none());
}

#[test]
fn test_chain_of_three_units_runs_in_composition_order() {
    let thing = ClassDef::new("H");
    thing.define("f", |_| Ok(Value::from("H.f")));
    thing.overrides("f").unwrap();

    for name in ["B1", "B2", "B3"] {
        let unit = UnitDef::new(name);
        let suffix = format!(".{name}");
        unit.define("f", move |inv| {
            Ok(Value::from(format!("{}{suffix}", inv.call_super()?)))
        });
        thing.include(Arc::new(unit)).unwrap();
    }

    assert_eq!(
        thing.instantiate().call("f", &[]).unwrap(),
        Value::from("H.f.B1.B2.B3")
    );
    // only the first composition found f declared on the class itself
    assert_eq!(thing.with_registry(|r| r.depth("f")), 1);
    assert_eq!(thing.method_chain("f").len(), 4);
}

#[test]
fn test_later_units_never_lose_the_original() {
    let thing = ClassDef::new("H");
    thing.define("f", |_| Ok(Value::from("original")));
    thing.overrides("f").unwrap();

    let first = UnitDef::new("First");
    first.define("f", |inv| inv.call_super());
    thing.include(Arc::new(first)).unwrap();

    let second = UnitDef::new("Second");
    second.define("f", |inv| {
        Ok(Value::from(format!("{}!", inv.call_super()?)))
    });
    thing.include(Arc::new(second)).unwrap();

    assert_eq!(thing.instantiate().call("f", &[]).unwrap(), Value::from("original!"));
    let original = thing.with_registry(|r| r.original("f").cloned()).unwrap();
    assert_eq!(original.host(), "H");
    assert_eq!(original.visibility(), Visibility::Public);
}

#[test]
fn test_overridden_methods_are_callable_from_threads() {
    let thing = create_thing();
    mark_overridable(&thing);
    thing.include(delegating_unit()).unwrap();
    let obj = thing.instantiate();

    let handles: Vec<_> = (0..4i64)
        .map(|i| {
            let obj = obj.clone();
            std::thread::spawn(move || obj.call("one_argument", &[Value::from(i)]).unwrap())
        })
        .collect();

    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![
            Value::from(123i64),
            Value::from(124i64),
            Value::from(125i64),
            Value::from(126i64)
        ]
    );
}

#[test]
fn test_concurrent_includes_shadow_each_method_once() {
    let thing = ClassDef::new("H");
    thing.define("f", |_| Ok(Value::from("H")));
    thing.overrides("f").unwrap();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let thing = &thing;
            scope.spawn(move || {
                let unit = UnitDef::new(format!("Plus{i}"));
                unit.define("f", |inv| Ok(Value::from(format!("{}+", inv.call_super()?))));
                thing.include(Arc::new(unit)).unwrap();
            });
        }
    });

    assert_eq!(thing.instantiate().call("f", &[]).unwrap(), Value::from("H++++++++"));
    assert_eq!(thing.with_registry(|r| r.depth("f")), 1);
    assert_eq!(thing.method_chain("f").len(), 9);
}
