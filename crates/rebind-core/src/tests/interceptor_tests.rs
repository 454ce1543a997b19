use super::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Hierarchy {
    runtime: Runtime,
    base: ClassId,
    mid: ClassId,
    leaf: ClassId,
}

fn describe() -> MethodId {
    MethodId::named("describe")
}

impl Hierarchy {
    fn new() -> Self {
        let runtime = Runtime::new();
        let base = runtime.define_class("Base", None).unwrap();
        let mid = runtime.define_class("Mid", Some(base)).unwrap();
        let leaf = runtime.define_class("Leaf", Some(mid)).unwrap();
        runtime
            .add_method(
                base,
                DispatchTable::Instance,
                describe(),
                implementation(|_, _| Value::from("Base")),
            )
            .unwrap();
        Self {
            runtime,
            base,
            mid,
            leaf,
        }
    }

    fn describe(&self, class: ClassId) -> String {
        let object = self.runtime.instantiate(class).unwrap();
        self.runtime
            .send(&object, describe(), &[])
            .unwrap()
            .as_str()
            .unwrap()
            .to_string()
    }
}

fn wrap(tag: &'static str) -> impl FnOnce(ResolutionHandle) -> Implementation {
    move |handle| {
        implementation(move |receiver, args| {
            let inner = handle.call_original(receiver, args);
            Value::from(format!("{tag}({})", inner.as_str().unwrap_or("?")))
        })
    }
}

#[test]
fn once_per_class_installs_only_the_first_time() {
    let h = Hierarchy::new();
    let key = InterceptKey::unique();

    let first = h
        .runtime
        .install(h.mid, describe(), InterceptMode::OncePerClass(key), wrap("first"))
        .unwrap();
    let second = h
        .runtime
        .install(h.mid, describe(), InterceptMode::OncePerClass(key), wrap("second"))
        .unwrap();

    assert!(first);
    assert!(!second);
    assert_eq!(h.describe(h.mid), "first(Base)");
    assert!(h.runtime.is_intercepted(h.mid, DispatchTable::Instance, key));
}

#[test]
fn once_per_class_does_not_look_at_ancestors() {
    let h = Hierarchy::new();
    let key = InterceptKey::unique();

    assert!(h
        .runtime
        .install(h.base, describe(), InterceptMode::OncePerClass(key), wrap("base"))
        .unwrap());
    assert!(h
        .runtime
        .install(h.leaf, describe(), InterceptMode::OncePerClass(key), wrap("leaf"))
        .unwrap());

    assert_eq!(h.describe(h.leaf), "leaf(base(Base))");
}

#[test]
fn always_mode_never_skips() {
    let h = Hierarchy::new();

    assert!(h
        .runtime
        .install(h.base, describe(), InterceptMode::Always, wrap("a"))
        .unwrap());
    assert!(h
        .runtime
        .install(h.base, describe(), InterceptMode::Always, wrap("b"))
        .unwrap());

    assert_eq!(h.describe(h.base), "b(a(Base))");
    assert!(h.runtime.interception_records().is_empty());
}

#[test]
fn ancestor_record_blocks_descendant_install() {
    let h = Hierarchy::new();
    let key = InterceptKey::named("ancestor-first");
    let mode = InterceptMode::OncePerClassAndAncestors(key);

    assert!(h.runtime.install(h.base, describe(), mode, wrap("base")).unwrap());
    assert!(!h.runtime.install(h.leaf, describe(), mode, wrap("leaf")).unwrap());
    assert!(!h.runtime.install(h.mid, describe(), mode, wrap("mid")).unwrap());

    assert_eq!(h.describe(h.leaf), "base(Base)");
}

#[test]
fn descendant_first_then_ancestor_installs_both() {
    let h = Hierarchy::new();
    let key = InterceptKey::named("descendant-first");
    let mode = InterceptMode::OncePerClassAndAncestors(key);

    assert!(h.runtime.install(h.leaf, describe(), mode, wrap("x")).unwrap());
    assert!(h.runtime.install(h.base, describe(), mode, wrap("x")).unwrap());

    // Both interceptions stay active, so the leaf runs the wrapper twice.
    assert_eq!(h.describe(h.leaf), "x(x(Base))");
    assert_eq!(h.describe(h.mid), "x(Base)");

    // The base record now covers everything in between.
    assert!(!h.runtime.install(h.mid, describe(), mode, wrap("x")).unwrap());
    assert!(!h.runtime.install(h.leaf, describe(), mode, wrap("x")).unwrap());
}

#[test]
fn leaf_replacement_defers_to_intercepted_base() {
    let h = Hierarchy::new();

    h.runtime
        .install(h.base, describe(), InterceptMode::Always, wrap("base"))
        .unwrap();
    h.runtime
        .install(h.leaf, describe(), InterceptMode::Always, wrap("leaf"))
        .unwrap();

    assert_eq!(h.describe(h.leaf), "leaf(base(Base))");
    assert_eq!(h.describe(h.mid), "base(Base)");
    assert_eq!(h.describe(h.base), "base(Base)");
}

#[test]
fn inherited_fallback_observes_later_ancestor_installs() {
    let h = Hierarchy::new();

    h.runtime
        .install(h.leaf, describe(), InterceptMode::Always, wrap("leaf"))
        .unwrap();
    assert_eq!(h.describe(h.leaf), "leaf(Base)");

    h.runtime
        .install(h.mid, describe(), InterceptMode::Always, wrap("mid"))
        .unwrap();
    assert_eq!(h.describe(h.leaf), "leaf(mid(Base))");
}

#[test]
fn own_binding_is_captured_not_rewalked() {
    let h = Hierarchy::new();
    h.runtime
        .add_method(
            h.mid,
            DispatchTable::Instance,
            describe(),
            implementation(|_, _| Value::from("Mid")),
        )
        .unwrap();

    h.runtime
        .install(h.mid, describe(), InterceptMode::Always, wrap("mid"))
        .unwrap();
    h.runtime
        .install(h.base, describe(), InterceptMode::Always, wrap("base"))
        .unwrap();

    assert_eq!(h.describe(h.mid), "mid(Mid)");
    assert_eq!(h.describe(h.leaf), "mid(Mid)");
    assert_eq!(h.describe(h.base), "base(Base)");
}

#[test]
fn handle_reports_what_it_was_bound_to() {
    let h = Hierarchy::new();
    let seen = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&seen);

    h.runtime
        .install(h.leaf, describe(), InterceptMode::Always, move |handle| {
            *sink.lock().unwrap() = Some((handle.class(), handle.method(), handle.table()));
            implementation(move |receiver, args| handle.call_original(receiver, args))
        })
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        Some((h.leaf, describe(), DispatchTable::Instance))
    );
    assert_eq!(h.describe(h.leaf), "Base");
}

#[test]
fn replacement_receives_arguments_and_receiver() {
    let runtime = Runtime::new();
    let calculator = runtime.define_class("Calculator", None).unwrap();
    let calculate = MethodId::named("calculate:");
    runtime
        .add_method(
            calculator,
            DispatchTable::Instance,
            calculate,
            implementation(|_, args| Value::from(args[0].as_int().unwrap_or(0) * 2)),
        )
        .unwrap();
    runtime
        .install(calculator, calculate, InterceptMode::Always, |handle| {
            implementation(move |receiver, args| {
                assert!(receiver.as_object().is_some());
                let doubled = handle.call_original(receiver, args).as_int().unwrap_or(0);
                Value::from(doubled + 1)
            })
        })
        .unwrap();

    let object = runtime.instantiate(calculator).unwrap();
    let result = runtime.send(&object, calculate, &[Value::Int(20)]).unwrap();
    assert_eq!(result.as_int(), Some(41));
}

#[test]
fn missing_method_is_a_contract_violation() {
    let h = Hierarchy::new();
    let err = h
        .runtime
        .install(
            h.leaf,
            MethodId::named("neverDefined"),
            InterceptMode::Always,
            wrap("x"),
        )
        .unwrap_err();

    assert_eq!(
        err,
        InterceptError::MethodNotFound {
            class: "Leaf".into(),
            method: "neverDefined".into(),
        }
    );
}

#[test]
fn unknown_class_is_rejected() {
    let h = Hierarchy::new();
    let other = Runtime::new();
    let stranger = {
        for index in 0..8 {
            other.define_class(&format!("C{index}"), None).unwrap();
        }
        other.define_class("Stranger", None).unwrap()
    };

    let err = h
        .runtime
        .install(stranger, describe(), InterceptMode::Always, wrap("x"))
        .unwrap_err();
    assert_eq!(err, InterceptError::UnknownClass(stranger));
}

#[test]
fn reentrant_install_is_reported() {
    let h = Hierarchy::new();
    let mut nested = None;

    let outer = h
        .runtime
        .install(h.base, describe(), InterceptMode::Always, |handle| {
            nested = Some(
                h.runtime
                    .install(h.mid, describe(), InterceptMode::Always, wrap("nested")),
            );
            wrap("outer")(handle)
        })
        .unwrap();

    assert!(outer);
    assert_eq!(nested, Some(Err(InterceptError::ReentrantInstall)));
    assert_eq!(h.describe(h.mid), "outer(Base)");
}

#[test]
fn installing_on_another_runtime_from_a_factory_is_allowed() {
    let h = Hierarchy::new();
    let other = Hierarchy::new();
    let mut nested = None;

    h.runtime
        .install(h.base, describe(), InterceptMode::Always, |handle| {
            nested = Some(
                other
                    .runtime
                    .install(other.base, describe(), InterceptMode::Always, wrap("other")),
            );
            wrap("outer")(handle)
        })
        .unwrap();

    assert_eq!(nested, Some(Ok(true)));
    assert_eq!(other.describe(other.leaf), "other(Base)");
}

#[test]
fn panicking_factory_leaves_engine_usable() {
    let h = Hierarchy::new();
    let key = InterceptKey::unique();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        h.runtime
            .install(h.base, describe(), InterceptMode::OncePerClass(key), |_| {
                panic!("factory failed")
            })
    }));
    assert!(outcome.is_err());

    assert_eq!(h.describe(h.base), "Base");
    assert!(h
        .runtime
        .install(h.base, describe(), InterceptMode::OncePerClass(key), wrap("retry"))
        .unwrap());
    assert_eq!(h.describe(h.base), "retry(Base)");
}

#[test]
fn concurrent_installs_apply_exactly_once() {
    let h = Hierarchy::new();
    let key = InterceptKey::unique();
    let installed = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                if h
                    .runtime
                    .install(h.mid, describe(), InterceptMode::OncePerClass(key), wrap("once"))
                    .unwrap()
                {
                    installed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(installed.load(Ordering::SeqCst), 1);
    assert_eq!(h.describe(h.leaf), "once(Base)");
}

#[test]
fn replacements_may_run_concurrently() {
    let h = Hierarchy::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    h.runtime
        .install(h.base, describe(), InterceptMode::Always, move |handle| {
            implementation(move |receiver, args| {
                counter.fetch_add(1, Ordering::SeqCst);
                handle.call_original(receiver, args)
            })
        })
        .unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    assert_eq!(h.describe(h.leaf), "Base");
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 100);
}

#[test]
fn class_level_install_walks_metatype_chain() {
    let h = Hierarchy::new();
    let make = MethodId::named("make");
    h.runtime
        .add_method(
            h.base,
            DispatchTable::Class,
            make,
            implementation(|receiver, _| {
                assert!(matches!(receiver, Receiver::Class(_)));
                Value::Int(1)
            }),
        )
        .unwrap();

    let key = InterceptKey::unique();
    assert!(h
        .runtime
        .install_class_level(h.mid, make, InterceptMode::OncePerClass(key), |handle| {
            implementation(move |receiver, args| {
                let base = handle.call_original(receiver, args).as_int().unwrap_or(0);
                Value::from(base + 10)
            })
        })
        .unwrap());

    assert_eq!(h.runtime.send_class(h.leaf, make, &[]).unwrap().as_int(), Some(11));
    assert_eq!(h.runtime.send_class(h.base, make, &[]).unwrap().as_int(), Some(1));

    // Class-level and instance-level records are tracked separately.
    assert!(h.runtime.is_intercepted(h.mid, DispatchTable::Class, key));
    assert!(!h.runtime.is_intercepted(h.mid, DispatchTable::Instance, key));
}

#[test]
fn class_level_install_requires_a_class_method() {
    let h = Hierarchy::new();
    let err = h
        .runtime
        .install_class_level(h.leaf, describe(), InterceptMode::Always, wrap("x"))
        .unwrap_err();
    assert!(matches!(err, InterceptError::MethodNotFound { .. }));
}
