//! End-to-end canonicalization scenarios (spec §8), one test per scenario.
//! Each builds a small graph by hand with `GraphBuilder`, runs the
//! canonicalizer to a fixed point, and asserts on the resulting shape —
//! mirroring the granularity of a single `cranelift-filetests` case rather
//! than a unit test of one rewrite rule in isolation.

mod support;

use graphir::node::memory::MemoryLocation;
use graphir::node::NodeOp;
use support::{build, run_to_fixpoint};

/// Scenario 1: a constant-condition `If` collapses to its surviving
/// successor and the dead arm's subtree is removed.
#[test]
fn constant_if_collapses_to_surviving_branch() {
    let mut g = build(|b| {
        let cond = b.constant_int(1, false, 1);
        let (_split, true_begin, false_begin) = b.if_split(cond, 0.9);
        b.set_cursor(true_begin);
        let tv = b.constant_int(32, true, 10);
        b.set_cursor(false_begin);
        let fv = b.constant_int(32, true, 20);
        let merge = b.merge(vec![true_begin, false_begin]);
        let phi = b.phi(merge, vec![tv, fv]);
        b.ret(Some(phi));
    });
    run_to_fixpoint(&mut g);

    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::If(_))));
    assert!(g.verify().is_ok());
}

/// Scenario 2: a `FixedGuard` whose condition is always satisfied is
/// removed and its continuation is spliced directly onto its predecessor.
#[test]
fn always_true_fixed_guard_is_removed() {
    let mut g = build(|b| {
        let cond = b.constant_int(1, false, 1);
        let reason = graphir::runtime::DeoptReasonValue::encode(
            graphir::runtime::DeoptAction::None,
            graphir::runtime::DeoptReason::NullCheckException,
            0,
            &graphir::runtime::DeoptEncoding::default(),
        );
        b.fixed_guard(cond, reason, false);
        let v = b.constant_int(32, true, 7);
        b.ret(Some(v));
    });
    run_to_fixpoint(&mut g);

    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::FixedGuard(_))));
    assert!(g.live_nodes().any(|n| matches!(g.op(n), NodeOp::Return(_))));
    assert!(g.verify().is_ok());
}

/// Scenario 3: a `FixedGuard` whose condition always fails is replaced by
/// an unconditional `Deoptimize`, and everything after it becomes
/// unreachable.
#[test]
fn always_false_fixed_guard_becomes_deoptimize() {
    let mut g = build(|b| {
        let cond = b.constant_int(1, false, 0);
        let reason = graphir::runtime::DeoptReasonValue::encode(
            graphir::runtime::DeoptAction::InvalidateRecompile,
            graphir::runtime::DeoptReason::ClassCastException,
            0,
            &graphir::runtime::DeoptEncoding::default(),
        );
        b.fixed_guard(cond, reason, false);
        let v = b.constant_int(32, true, 7);
        b.ret(Some(v));
    });
    run_to_fixpoint(&mut g);

    let deopt_count = g.live_nodes().filter(|&n| matches!(g.op(n), NodeOp::Deoptimize(_))).count();
    assert_eq!(deopt_count, 1);
    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::FixedGuard(_))));
    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Return(_))));
    assert!(g.verify().is_ok());
}

/// Scenario 4: an empty diamond (both arms just feed a phi) collapses to a
/// single `Conditional` and the `If`/begins/merge disappear.
#[test]
fn empty_diamond_collapses_to_conditional() {
    let mut g = build(|b| {
        let receiver = b.constant_null();
        // A `MemoryRead`'s own stamp is never re-inferred by the
        // canonicalizer, so it stands in for a field load whose boolean
        // result is unknown at compile time - unlike a `Compare` of two
        // constants, which would fold away before `If` ever sees it.
        let cond = b.memory_read(receiver, MemoryLocation::Any, graphir::stamp::Stamp::for_integer(1, false, 0, 1));
        let (_split, true_begin, false_begin) = b.if_split(cond, 0.5);
        b.set_cursor(true_begin);
        let tv = b.constant_int(32, true, 100);
        b.set_cursor(false_begin);
        let fv = b.constant_int(32, true, 200);
        let merge = b.merge(vec![true_begin, false_begin]);
        let phi = b.phi(merge, vec![tv, fv]);
        b.ret(Some(phi));
    });
    run_to_fixpoint(&mut g);

    assert!(g.live_nodes().any(|n| matches!(g.op(n), NodeOp::Conditional(_))));
    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::If(_))));
    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Phi(_))));
    assert!(g.verify().is_ok());
}

/// Scenario 5: a `Pi` whose underlying value's stamp is already at least as
/// precise as the pi's own refinement collapses to the underlying value.
#[test]
fn pi_collapses_when_underlying_stamp_already_precise() {
    let mut g = build(|b| {
        let c = b.constant_int(32, true, 42);
        let refined = graphir::stamp::Stamp::for_integer(32, true, 0, 100);
        let pi = b.add_raw(
            NodeOp::Pi(graphir::node::phi::PiData {
                value: c,
                guard: graphir_entity::PackedOption::none(),
            }),
            refined,
        );
        b.ret(Some(pi));
    });
    run_to_fixpoint(&mut g);

    assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Pi(_))));
    if let NodeOp::Return(r) = g.op(g.live_nodes().find(|&n| matches!(g.op(n), NodeOp::Return(_))).unwrap()) {
        let value = r.value.expand().unwrap();
        assert!(matches!(g.op(value), NodeOp::Constant(_)));
    }
    assert!(g.verify().is_ok());
}

/// Scenario 6: two successive `instanceof` `If`s on the same object with
/// disjoint types swap order when doing so strictly reduces expected work.
#[test]
fn disjoint_instanceof_ifs_swap_when_it_improves_expected_work() {
    let mut g = build(|b| {
        let receiver = b.constant_null();
        // An unknown-typed, non-null object: `InstanceOf`'s only fold rule
        // fires on an always-null object, so a constant (always-null)
        // receiver here would collapse both checks before the swap could
        // ever be considered.
        let obj = b.memory_read(
            receiver,
            MemoryLocation::Any,
            graphir::stamp::Stamp::Object(graphir::stamp::ObjectStamp::top()),
        );
        let ty_a = graphir::stamp::TypeHandle(1);
        let ty_b = graphir::stamp::TypeHandle(2);
        let is_a = b.add_raw(
            NodeOp::InstanceOf(graphir::node::value::InstanceOfData { object: obj, ty: ty_a, negated: false }),
            graphir::stamp::Stamp::for_integer(1, false, 0, 1),
        );
        // Outer `If` is unlikely to be taken (probability of the costly
        // path is low) while the inner one is very likely; the swap
        // condition `p1 < (1 - p1) * p2` is satisfied, so `is_b`'s `If`
        // should end up hoisted above `is_a`'s.
        let (_if1, true1, false1) = b.if_split(is_a, 0.05);
        b.set_cursor(true1);
        b.ret(None);
        b.set_cursor(false1);
        let is_b = b.add_raw(
            NodeOp::InstanceOf(graphir::node::value::InstanceOfData { object: obj, ty: ty_b, negated: false }),
            graphir::stamp::Stamp::for_integer(1, false, 0, 1),
        );
        let (_if2, true2, false2) = b.if_split(is_b, 0.95);
        b.set_cursor(true2);
        b.ret(None);
        b.set_cursor(false2);
        b.ret(None);
    });
    run_to_fixpoint(&mut g);

    let start = g.start();
    let first_if = g.successors(start)[0];
    match g.op(first_if) {
        NodeOp::If(d) => match g.op(d.condition) {
            NodeOp::InstanceOf(data) => assert_eq!(data.ty, graphir::stamp::TypeHandle(2), "the more-decisive test should now run first"),
            other => panic!("expected InstanceOf condition, got {other:?}"),
        },
        other => panic!("expected If at start's successor, got {other:?}"),
    }
    assert!(g.verify().is_ok());
}
