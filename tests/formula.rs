//! Run with `cargo test --features testing`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use formulary::{
    Args, Calculate, Dependencies, Dependency, Formula, IdleQueue, Identity, Recipe,
    Registry, Value, select,
};

macro_rules! test {
    (miss: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(!formulary::internal::last_was_hit());
    }};
    (hit: $call:expr, $result:expr) => {{
        assert_eq!($call, $result);
        assert!(formulary::internal::last_was_hit());
    }};
}

fn rgb(r: i32, g: i32, b: i32) -> Value {
    Value::map([("r", r), ("g", g), ("b", b)])
}

/// Test that dependencies are calculated before the formula itself.
#[test]
fn test_tracked_values() {
    struct Red;
    struct Blue;
    struct Purple;

    impl Recipe for Red {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::none()
        }
        fn compute(_: &Args, _: &Value) -> Value {
            rgb(255, 0, 0)
        }
    }

    impl Recipe for Blue {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::none()
        }
        fn compute(_: &Args, _: &Value) -> Value {
            rgb(0, 0, 255)
        }
    }

    impl Recipe for Purple {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::keyed([
                ("red", Formula::<Red>::new(()).into()),
                ("blue", Formula::<Blue>::new(()).into()),
            ])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            let pick = |color, channel| {
                args.get(color).and_then(|c| c.get(channel)).cloned().unwrap_or_default()
            };
            Value::map([("r", pick("red", "r")), ("g", 0.into()), ("b", pick("blue", "b"))])
        }
    }

    let purple = Formula::<Purple>::new(());
    test!(miss: purple.calculate(&Value::Null, &Value::Null), rgb(255, 0, 255));
    test!(hit: purple.calculate(&Value::Null, &Value::Null), rgb(255, 0, 255));

    // A second instance shares the type's cache.
    let other = Formula::<Purple>::new(());
    test!(hit: other.calculate(&Value::Null, &Value::Null), rgb(255, 0, 255));
}

/// Test the function-call and argument-list surfaces.
#[test]
fn test_call_and_apply() {
    struct Callable;

    impl Recipe for Callable {
        type Params = &'static str;
        fn track(params: &'static str) -> Dependencies {
            Dependencies::keyed([("params", Dependency::value(params))])
        }
    }

    let expected = Value::map([("params", "one")]);
    let formula = Formula::<Callable>::new("one");
    let state = Value::map::<&str, Value>([]);
    test!(miss: formula.call(&state, &Value::Null), expected);
    test!(hit: formula.apply(&[state.clone()]), expected);
    test!(hit: formula.apply(&[]), expected);
}

/// Test that equal arguments give back the very same result.
#[test]
fn test_hit_stability() {
    static RUNS: AtomicUsize = AtomicUsize::new(0);

    struct Style;

    impl Recipe for Style {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::list([Dependency::node(select("color"))])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            RUNS.fetch_add(1, Ordering::SeqCst);
            Value::map([("color", args.at(0).cloned().unwrap_or_default())])
        }
    }

    let style = Formula::<Style>::new(());
    let blue = Value::map([("color", "blue")]);
    let red = Value::map([("color", "red")]);

    let a = style.calculate(&blue, &Value::Null);
    assert!(!formulary::internal::last_was_hit());
    let b = style.calculate(&red, &Value::Null);
    let c = style.calculate(&Value::map([("color", "blue")]), &Value::Null);
    assert!(formulary::internal::last_was_hit());

    assert!(a.same(&c));
    assert!(!a.same(&b));
    assert_eq!(RUNS.load(Ordering::SeqCst), 2);
    assert!(style.value().is_some_and(|v| v.same(&c)));
}

/// Test that reference values are keyed by identity.
#[test]
fn test_reference_keys() {
    let registry = Registry::new();
    let users = Value::list([Value::map([("id", "billy")])]);
    let twins = Value::list([Value::map([("id", "billy")])]);

    let a = Formula::<Identity>::new_in(&registry, users.clone());
    let b = Formula::<Identity>::new_in(&registry, users.clone());
    let c = Formula::<Identity>::new_in(&registry, twins.clone());

    test!(miss: a.calculate(&Value::Null, &Value::Null), users);
    test!(hit: b.calculate(&Value::Null, &Value::Null), users);
    test!(miss: c.calculate(&Value::Null, &Value::Null), twins);

    assert!(a.value().unwrap().same(&b.value().unwrap()));
    assert!(!a.value().unwrap().same(&c.value().unwrap()));
    assert_eq!(registry.slot::<Identity>().identities(), 2);
}

/// Test that the base formula passes its argument through.
#[test]
fn test_default_pass_through() {
    let registry = Registry::new();
    let x = Formula::<Identity>::new_in(&registry, 5.into());
    assert_eq!(x.value(), None);
    test!(miss: x.calculate(&Value::Null, &Value::Null), 5.into());
    test!(hit: x.calculate(&Value::map([("ignored", true)]), &Value::Null), 5.into());
    assert_eq!(x.value(), Some(5.into()));

    let s = Formula::<Identity>::new_in(&registry, "5".into());
    test!(miss: s.calculate(&Value::Null, &Value::Null), "5".into());
}

/// Test that signed zeroes and NaNs share one cache entry.
#[test]
fn test_float_keys() {
    let registry = Registry::new();
    let zero = Formula::<Identity>::new_in(&registry, 0.0.into());
    let negative = Formula::<Identity>::new_in(&registry, (-0.0).into());
    test!(miss: zero.calculate(&Value::Null, &Value::Null), 0.0.into());
    test!(hit: negative.calculate(&Value::Null, &Value::Null), 0.0.into());

    let nan = Formula::<Identity>::new_in(&registry, f64::NAN.into());
    let other = Formula::<Identity>::new_in(&registry, (-f64::NAN).into());
    assert!(nan.calculate(&Value::Null, &Value::Null).same(&f64::NAN.into()));
    assert!(!formulary::internal::last_was_hit());
    assert!(other.calculate(&Value::Null, &Value::Null).same(&f64::NAN.into()));
    assert!(formulary::internal::last_was_hit());
    assert_eq!(zero.slot().store().len(), 2);
}

/// Test that changing one branch leaves the other branch's cache intact.
#[test]
fn test_composed() {
    static LEFT: AtomicUsize = AtomicUsize::new(0);
    static RIGHT: AtomicUsize = AtomicUsize::new(0);
    static SUM: AtomicUsize = AtomicUsize::new(0);

    struct Left;
    struct Right;
    struct Sum;

    impl Recipe for Left {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::list([Dependency::node(select("a"))])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            LEFT.fetch_add(1, Ordering::SeqCst);
            Value::list([args.at(0).cloned().unwrap_or_default()])
        }
    }

    impl Recipe for Right {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::list([Dependency::node(select("b"))])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            RIGHT.fetch_add(1, Ordering::SeqCst);
            Value::list([args.at(0).cloned().unwrap_or_default()])
        }
    }

    impl Recipe for Sum {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::keyed([
                ("left", Formula::<Left>::new(()).into()),
                ("right", Formula::<Right>::new(()).into()),
            ])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            SUM.fetch_add(1, Ordering::SeqCst);
            let total = args
                .values()
                .filter_map(|v| v.get("0").and_then(Value::as_int))
                .sum::<i64>();
            total.into()
        }
    }

    let sum = Formula::<Sum>::new(());
    let state = |a: i64, b: i64| Value::map([("a", a), ("b", b)]);
    let counts = || {
        (LEFT.load(Ordering::SeqCst), RIGHT.load(Ordering::SeqCst), SUM.load(Ordering::SeqCst))
    };

    test!(miss: sum.calculate(&state(1, 2), &Value::Null), 3.into());
    assert_eq!(counts(), (1, 1, 1));

    test!(hit: sum.calculate(&state(1, 2), &Value::Null), 3.into());
    assert_eq!(counts(), (1, 1, 1));

    test!(miss: sum.calculate(&state(5, 2), &Value::Null), 7.into());
    assert_eq!(counts(), (2, 1, 2));

    test!(miss: sum.calculate(&state(5, 4), &Value::Null), 9.into());
    assert_eq!(counts(), (2, 2, 3));

    // Both branches are back to earlier values.
    test!(hit: sum.calculate(&state(1, 2), &Value::Null), 3.into());
    assert_eq!(counts(), (2, 2, 3));
}

/// Test that keyed dependencies may mix fixed values and selections.
#[test]
fn test_keyed_dependencies() {
    struct Name;

    impl Recipe for Name {
        type Params = &'static str;
        fn track(prefix: &'static str) -> Dependencies {
            Dependencies::keyed([
                ("prefix", Dependency::value(prefix)),
                ("name", Dependency::node(select("name"))),
            ])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            let part = |name| args.get(name).and_then(Value::as_str).unwrap_or_default();
            format!("{} {}", part("prefix"), part("name")).into()
        }
    }

    let sir = Formula::<Name>::new("Sir");
    let dame = Formula::<Name>::new("Dame");
    let bob = Value::map([("name", "Bob")]);
    test!(miss: sir.calculate(&bob, &Value::Null), "Sir Bob".into());
    test!(miss: dame.calculate(&bob, &Value::Null), "Dame Bob".into());
    test!(hit: sir.calculate(&bob, &Value::Null), "Sir Bob".into());
    test!(miss: sir.calculate(&Value::Null, &Value::Null), "Sir ".into());
}

/// Test that the update hook observes fresh values only.
#[test]
fn test_update_hook() {
    static SEEN: parking_lot::Mutex<Vec<(Value, Value)>> = parking_lot::Mutex::new(Vec::new());

    struct Observed;

    impl Recipe for Observed {
        type Params = ();
        fn track(_: ()) -> Dependencies {
            Dependencies::list([Dependency::node(select("n"))])
        }
        fn compute(args: &Args, context: &Value) -> Value {
            let n = args.at(0).and_then(Value::as_int).unwrap_or_default();
            let step = context.as_int().unwrap_or(1);
            (n * step).into()
        }
        fn update(value: &Value, args: &Args, context: &Value) {
            assert_eq!(args.len(), 1);
            SEEN.lock().push((value.clone(), context.clone()));
        }
    }

    let observed = Formula::<Observed>::new(());
    let state = Value::map([("n", 4)]);
    test!(miss: observed.calculate(&state, &10.into()), 40.into());
    // The context is not part of the key.
    test!(hit: observed.calculate(&state, &2.into()), 40.into());
    test!(miss: observed.calculate(&Value::map([("n", 5)]), &2.into()), 10.into());

    assert_eq!(*SEEN.lock(), [(40.into(), 10.into()), (10.into(), 2.into())]);
}

/// Test that only the most recent results are remembered.
#[test]
fn test_pooling() {
    struct Boxed;

    impl Recipe for Boxed {
        type Params = i64;
        fn track(n: i64) -> Dependencies {
            Dependencies::list([Dependency::value(n)])
        }
        fn compute(args: &Args, _: &Value) -> Value {
            Value::list(args.values().cloned())
        }
    }

    let registry = Registry::new();
    let calc = |n| Formula::<Boxed>::new_in(&registry, n).calculate(&Value::Null, &Value::Null);

    let first = calc(0);
    for n in 1..30 {
        calc(n);
    }
    assert!(calc(0).same(&first));
    assert!(formulary::internal::last_was_hit());

    // Zero is now the freshest, so one is the first to go.
    let one = Formula::<Boxed>::new_in(&registry, 1);
    calc(30);
    assert!(calc(0).same(&first));
    one.calculate(&Value::Null, &Value::Null);
    assert!(!formulary::internal::last_was_hit());

    for n in 100..130 {
        calc(n);
    }
    assert!(!calc(0).same(&first));
    assert!(!formulary::internal::last_was_hit());
    assert_eq!(registry.slot::<Boxed>().store().len(), 30);
}

/// Test a custom capacity.
#[test]
fn test_capacity() {
    struct Tiny;

    impl Recipe for Tiny {
        type Params = i64;
        const CAPACITY: usize = 2;
        fn track(n: i64) -> Dependencies {
            Dependencies::list([Dependency::value(n)])
        }
    }

    let registry = Registry::new();
    let calc = |n: i64| Formula::<Tiny>::new_in(&registry, n).calculate(&Value::Null, &Value::Null);
    test!(miss: calc(1), 1.into());
    test!(miss: calc(2), 2.into());
    test!(miss: calc(3), 3.into());
    test!(hit: calc(2), 2.into());
    test!(miss: calc(1), 1.into());
    assert_eq!(registry.slot::<Tiny>().store().capacity(), 2);
}

/// Test that cleanup waits for the idle moment.
#[test]
fn test_deferred_cleanup() {
    let queue = Arc::new(IdleQueue::new());
    let registry = Registry::with_scheduler(queue.clone());
    let calc = |n: i64| {
        Formula::<Identity>::new_in(&registry, n.into()).calculate(&Value::Null, &Value::Null)
    };

    for n in 0..35 {
        calc(n);
    }

    let slot = registry.slot::<Identity>();
    assert_eq!(slot.store().len(), 35);
    assert!(slot.store().is_clean_pending());
    test!(hit: calc(0), 0.into());

    assert_eq!(queue.run_idle(), 1);
    assert_eq!(slot.store().len(), 30);
    test!(hit: calc(0), 0.into());
    test!(miss: calc(1), 1.into());
}

/// Test that nested formulas of the same type share the cache.
#[test]
fn test_same_type_nesting() {
    struct Chain;

    impl Recipe for Chain {
        type Params = Dependency;
        fn track(dep: Dependency) -> Dependencies {
            Dependencies::list([dep])
        }
    }

    let registry = Registry::new();
    let inner = Formula::<Chain>::new_in(&registry, Dependency::node(select("x")));
    let outer = Formula::<Chain>::new_in(&registry, inner.into());

    let state = Value::map([("x", "deep")]);
    // The inner formula stores its result under the very key the outer one
    // looks up next.
    test!(hit: outer.calculate(&state, &Value::Null), "deep".into());
    assert_eq!(registry.slot::<Chain>().store().len(), 1);
    test!(hit: outer.calculate(&state, &Value::Null), "deep".into());
}

/// Test dropping all results of a registry.
#[test]
fn test_evict() {
    let registry = Registry::new();
    let list = Value::list([1, 2, 3]);
    let formula = Formula::<Identity>::new_in(&registry, list.clone());

    test!(miss: formula.calculate(&Value::Null, &Value::Null), list);
    test!(hit: formula.calculate(&Value::Null, &Value::Null), list);
    registry.evict();
    test!(miss: formula.calculate(&Value::Null, &Value::Null), list);
    assert_eq!(registry.slot::<Identity>().identities(), 1);
    assert_eq!(registry.len(), 1);
}
