//! Integration Tests for Reactive System
//!
//! These tests verify that signals, computeds, effects and scopes work
//! together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use trellis_core::reactive::{Computed, Runtime, Signal};
use trellis_core::{ReactiveError, RuntimeOptions};

/// Shared log an effect can push into.
fn recorder<T>() -> (Rc<RefCell<Vec<T>>>, Rc<RefCell<Vec<T>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    (Rc::clone(&log), log)
}

/// A computed can depend on another computed.
#[test]
fn computed_chain() {
    let rt = Runtime::new();
    let base = rt.signal(2);

    let squared = {
        let base = base.clone();
        rt.computed(move || base.get() * base.get())
    };
    let plus_one = {
        let squared = squared.clone();
        rt.computed(move || squared.get() + 1)
    };

    assert_eq!(plus_one.get(), 5);
    base.set(3);
    assert_eq!(plus_one.get(), 10);
}

/// signal(0) feeding two chained computeds and an effect: writing 5 makes
/// the effect observe 10, exactly once.
#[test]
fn effect_observes_computed_chain_once() {
    let rt = Runtime::new();
    let input = rt.signal(0);

    let shifted = {
        let input = input.clone();
        rt.computed(move || input.get() + 3)
    };
    let scaled = {
        let shifted = shifted.clone();
        rt.computed(move || shifted.get() * 2 - 6)
    };

    let (sink, seen) = recorder();
    let _effect = {
        let scaled = scaled.clone();
        rt.effect(move || sink.borrow_mut().push(scaled.get()))
    };

    input.set(5);

    assert_eq!(*seen.borrow(), vec![0, 10]);
    assert_eq!(seen.borrow().iter().filter(|&&value| value == 10).count(), 1);
}

/// Diamond: an effect reading two computeds of the same signal never sees
/// one of them updated and the other stale.
#[test]
fn diamond_is_glitch_free() {
    let rt = Runtime::new();
    let a = rt.signal(1);

    let b = {
        let a = a.clone();
        rt.computed(move || a.get() + 1)
    };
    let c = {
        let a = a.clone();
        rt.computed(move || a.get() * 2)
    };

    let (sink, seen) = recorder();
    let effect = {
        let (b, c) = (b.clone(), c.clone());
        rt.effect(move || sink.borrow_mut().push((b.get(), c.get())))
    };

    for value in 2..6 {
        a.set(value);
    }

    assert_eq!(effect.run_count(), 5);
    for &(b, c) in seen.borrow().iter() {
        assert_eq!(c, (b - 1) * 2, "inconsistent observation ({b}, {c})");
    }
}

/// Five writes inside one batch run a dependent effect once, with the final
/// value.
#[test]
fn batch_coalesces_writes() {
    let rt = Runtime::new();
    let counter = rt.signal(0);

    let (sink, seen) = recorder();
    let effect = {
        let counter = counter.clone();
        rt.effect(move || sink.borrow_mut().push(counter.get()))
    };

    rt.batch(|| {
        for value in 1..=5 {
            counter.set(value);
        }
        // Nothing ran yet.
        assert_eq!(effect.run_count(), 1);
    });

    assert_eq!(effect.run_count(), 2);
    assert_eq!(*seen.borrow(), vec![0, 5]);
}

/// Nested batches flush once, at the outermost exit.
#[test]
fn nested_batches_flush_once() {
    let rt = Runtime::new();
    let left = rt.signal(0);
    let right = rt.signal(0);

    let runs = Rc::new(Cell::new(0));
    let _effect = {
        let (left, right, runs) = (left.clone(), right.clone(), Rc::clone(&runs));
        rt.effect(move || {
            let _ = left.get() + right.get();
            runs.set(runs.get() + 1);
        })
    };

    rt.batch(|| {
        left.set(1);
        rt.batch(|| right.set(1));
        assert_eq!(runs.get(), 1);
    });

    assert_eq!(runs.get(), 2);
}

/// A computed that recomputes to the same value does not re-run its
/// dependents.
#[test]
fn equal_computed_values_stop_propagation() {
    let rt = Runtime::new();
    let number = rt.signal(0);

    let parity = {
        let number = number.clone();
        rt.computed(move || number.get() % 2)
    };

    let effect = {
        let parity = parity.clone();
        rt.effect(move || {
            parity.get();
        })
    };

    number.set(2);
    number.set(4);
    assert_eq!(parity.run_count(), 3);
    assert_eq!(effect.run_count(), 1);

    number.set(5);
    assert_eq!(effect.run_count(), 2);
}

/// Two computeds reading each other form a cycle; the outermost reader gets
/// the error instead of a stack overflow.
#[test]
fn mutual_cycle_is_reported() {
    let rt = Runtime::new();
    let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));

    let second = {
        let slot = Rc::clone(&slot);
        rt.computed(move || {
            let first = slot.borrow().clone();
            first.map_or(0, |first| first.get() + 1)
        })
    };
    let first = {
        let second = second.clone();
        rt.computed(move || second.get() + 1)
    };
    *slot.borrow_mut() = Some(first.clone());

    assert_eq!(
        first.try_get(),
        Err(ReactiveError::CyclicDependency { node: first.id() })
    );

    // An effect over the cycle fails to start.
    let reader = first.clone();
    let started = rt.try_effect(move || {
        reader.get();
    });
    assert!(matches!(
        started.err(),
        Some(ReactiveError::CyclicDependency { .. })
    ));
}

/// Effects writing signals read by other effects are queued, not run
/// re-entrantly, and the downstream effect sees the settled value.
#[test]
fn writes_from_effects_are_queued() {
    let rt = Runtime::new();
    let celsius = rt.signal(0);
    let fahrenheit = rt.signal(32);

    let _convert = {
        let (celsius, fahrenheit) = (celsius.clone(), fahrenheit.clone());
        rt.effect(move || fahrenheit.set(celsius.get() * 9 / 5 + 32))
    };

    let (sink, seen) = recorder();
    let _display = {
        let fahrenheit = fahrenheit.clone();
        rt.effect(move || sink.borrow_mut().push(fahrenheit.get()))
    };

    celsius.set(100);
    assert_eq!(*seen.borrow(), vec![32, 212]);
}

/// Disposing a scope stops everything created inside it and runs its
/// cleanups once.
#[test]
fn scope_disposal_tears_down_subtree() {
    let rt = Runtime::new();
    let source = rt.signal(1);
    let cleaned = Rc::new(Cell::new(0));
    let scope = rt.create_scope();

    let (effect, derived) = scope.run(|| {
        let derived = {
            let source = source.clone();
            rt.computed(move || source.get() * 10)
        };
        let effect = {
            let (derived, cleaned, rt2) = (derived.clone(), Rc::clone(&cleaned), rt.clone());
            rt.effect(move || {
                derived.get();
                let cleaned = Rc::clone(&cleaned);
                rt2.on_cleanup(move || cleaned.set(cleaned.get() + 1));
            })
        };
        (effect, derived)
    });

    source.set(2);
    assert_eq!(cleaned.get(), 1);
    assert_eq!(effect.run_count(), 2);

    let live_before = rt.live_nodes();
    scope.dispose();

    assert_eq!(cleaned.get(), 2);
    assert!(effect.is_disposed());
    assert_eq!(rt.live_nodes(), live_before - 3);
    assert_eq!(
        derived.try_get(),
        Err(ReactiveError::DisposedAccess { node: derived.id() })
    );

    source.set(3);
    assert_eq!(effect.run_count(), 2);
}

/// A flush that fails on a cycle leaves the effects it did not reach queued,
/// so an observer behind a computed keeps following the signal.
#[test]
fn failed_flush_keeps_observers_behind_computeds() {
    let rt = Runtime::new();
    let trigger = rt.signal(0);

    let slot: Rc<RefCell<Option<Computed<i32>>>> = Rc::new(RefCell::new(None));
    let looped = {
        let (trigger, slot) = (trigger.clone(), Rc::clone(&slot));
        rt.computed(move || {
            if trigger.get() != 1 {
                return 0;
            }
            let this = slot.borrow().clone();
            this.map_or(0, |this| this.get())
        })
    };
    *slot.borrow_mut() = Some(looped.clone());

    let broken = {
        let looped = looped.clone();
        rt.effect(move || {
            looped.get();
        })
    };
    let doubled = {
        let trigger = trigger.clone();
        rt.computed(move || trigger.get() * 2)
    };
    let (sink, seen) = recorder();
    let _observer = {
        let doubled = doubled.clone();
        rt.effect(move || sink.borrow_mut().push(doubled.get()))
    };

    assert!(matches!(
        trigger.try_set(1),
        Err(ReactiveError::CyclicDependency { .. })
    ));
    broken.dispose();

    trigger.set(2);
    trigger.set(3);
    assert_eq!(*seen.borrow(), vec![0, 4, 6]);
    assert_eq!(doubled.get(), 6);
}

/// Nodes created on every run reuse the slots of the ones disposed before
/// the rerun, and handles to the old ones stay disposed.
#[test]
fn rerun_children_reuse_disposed_slots() {
    let rt = Runtime::new();
    let source = rt.signal(0);
    let highest = Rc::new(Cell::new(0));
    let first: Rc<RefCell<Option<Signal<i32>>>> = Rc::new(RefCell::new(None));

    let _effect = {
        let (source, highest) = (source.clone(), Rc::clone(&highest));
        let (first, rt2) = (Rc::clone(&first), rt.clone());
        rt.effect(move || {
            let scratch = rt2.signal(source.get());
            highest.set(highest.get().max(scratch.id().index()));
            if first.borrow().is_none() {
                *first.borrow_mut() = Some(scratch);
            }
        })
    };
    let live = rt.live_nodes();

    for value in 1..=1000 {
        source.set(value);
    }

    assert_eq!(rt.live_nodes(), live);
    assert!(highest.get() < live, "slot index grew to {}", highest.get());

    let first = first.borrow().clone().unwrap();
    assert!(first.is_disposed());
    assert!(matches!(first.try_get(), Err(ReactiveError::DisposedAccess { .. })));
}

/// Options loaded from a host's config bound runaway feedback loops.
#[test]
fn options_from_json_limit_flush_rounds() {
    let options: RuntimeOptions = serde_json::from_str(r#"{ "max_flush_rounds": 3 }"#).unwrap();
    let rt = Runtime::with_options(options);
    let ping = rt.signal(0);
    let pong = rt.signal(0);

    let _forward = {
        let (ping, pong) = (ping.clone(), pong.clone());
        rt.effect(move || pong.set(ping.get() + 1))
    };
    let back = {
        let (ping, pong) = (ping.clone(), pong.clone());
        rt.try_effect(move || ping.set(pong.get() + 1))
    };

    assert_eq!(back.err(), Some(ReactiveError::RunawayFlush { rounds: 3 }));
}

/// Dropping the runtime turns every handle into a disposed handle.
#[test]
fn handles_outlive_runtime() {
    let (signal, computed) = {
        let rt = Runtime::new();
        let signal = rt.signal(4);
        let computed = {
            let signal = signal.clone();
            rt.computed(move || signal.get() + 1)
        };
        assert_eq!(computed.get(), 5);
        (signal, computed)
    };

    assert!(signal.is_disposed());
    signal.set(10);
    assert_eq!(signal.get(), 4);
    assert_eq!(computed.get(), 5);
    assert!(signal.try_set(11).is_err());
}
