//! Canonicalizer & Simplifier Engine (§4.4, C4).
//!
//! A work-list fixed-point rewriter. `canonical` hooks are pure and
//! order-independent and apply to floating nodes; `simplify` hooks may
//! reorder control flow and apply to fixed nodes. Both are implemented here
//! as `match` arms over `NodeOp` rather than as a method per node type
//! (§3.2 module doc: the tagged-variant dispatch this crate chose over a
//! class hierarchy).

use crate::entities::NodeId;
use crate::error::GraphResult;
use crate::graph::StructuredGraph;
use crate::node::control::{
    BeginData, DeoptimizeData, IfData, LoopBeginData, MergeData,
};
use crate::node::guard::{FixedGuardData, GuardNodeData};
use crate::node::phi::{PhiData, PiData, ValueProxyData};
use crate::node::value::{
    BinaryOpData, BinaryOpKind, CompareData, CompareKind, ConditionalData, ConstantData,
    InstanceOfData, IsNullData, LogicNegationData, UnaryOpData, UnaryOpKind,
};
use crate::node::NodeOp;
use crate::runtime::CancelToken;
use crate::stamp::Stamp;
use crate::timing;
use std::collections::BTreeSet;

/// The interface a node's `simplify`/`canonical` implementation is handed
/// (§4.4): a way to enqueue more work, delete a now-dead branch, and remove
/// a floating node if it has become unused. `all_usages_available` always
/// returns `true` in this crate: it exists for parity with the source's
/// distinction between "graph under construction" and "graph fully built",
/// but this crate's `StructuredGraph` has no partially-built state once
/// handed to the canonicalizer (§1 Out of scope: the bytecode parser is
/// external and hands over a complete graph).
pub struct CanonicalizerTool<'a> {
    work_list: &'a mut WorkList,
}

impl<'a> CanonicalizerTool<'a> {
    pub fn add_to_work_list(&mut self, n: NodeId) {
        self.work_list.add(n);
    }

    pub fn delete_branch(&mut self, graph: &mut StructuredGraph, fixed: NodeId) -> GraphResult<()> {
        for n in graph.kill_subtree(fixed)? {
            self.work_list.forget(n);
        }
        Ok(())
    }

    pub fn remove_if_unused(&mut self, graph: &mut StructuredGraph, n: NodeId) -> bool {
        let usages = graph.usages(n).to_vec();
        if graph.remove_if_unused(n) {
            for u in usages {
                self.work_list.add(u);
            }
            true
        } else {
            false
        }
    }

    pub fn all_usages_available(&self) -> bool {
        true
    }
}

/// Deterministic (by node id) fixed-point work queue (§4.4 tie-breaks: "the
/// engine visits in a deterministic order ... for reproducibility").
#[derive(Default)]
pub struct WorkList {
    queued: BTreeSet<NodeId>,
}

impl WorkList {
    pub fn add(&mut self, n: NodeId) {
        self.queued.insert(n);
    }

    fn forget(&mut self, n: NodeId) {
        self.queued.remove(&n);
    }

    fn pop_first(&mut self) -> Option<NodeId> {
        let first = *self.queued.iter().next()?;
        self.queued.remove(&first);
        Some(first)
    }
}

/// Why the canonicalizer gave up before reaching a fixed point.
#[derive(Debug)]
pub struct NotConverged;

/// The driver described in §4.4: seed, pop, re-infer stamp, canonicalize or
/// simplify, repeat until the work list is empty or the configured rewrite
/// budget (§6.3 `max_rewrite_iterations`) is exhausted.
pub struct Canonicalizer<'a, C: CancelToken> {
    cancel: &'a C,
}

impl<'a, C: CancelToken> Canonicalizer<'a, C> {
    pub fn new(cancel: &'a C) -> Self {
        Self { cancel }
    }

    /// Seed with every live node and run to a fixed point (§4.4 step 1).
    pub fn run_to_fixpoint(&self, graph: &mut StructuredGraph) -> Result<(), NotConverged> {
        let mut work_list = WorkList::default();
        for n in graph.live_nodes() {
            work_list.add(n);
        }
        self.drain(graph, work_list)
    }

    /// Run to a fixed point starting from an explicit delta set (the driver
    /// handing the engine "every changed node" rather than the whole graph,
    /// §4.4 step 1 alternative).
    pub fn run_from(&self, graph: &mut StructuredGraph, seed: impl IntoIterator<Item = NodeId>) -> Result<(), NotConverged> {
        let mut work_list = WorkList::default();
        for n in seed {
            work_list.add(n);
        }
        self.drain(graph, work_list)
    }

    fn drain(&self, graph: &mut StructuredGraph, mut work_list: WorkList) -> Result<(), NotConverged> {
        let _t = timing::canonicalize();
        let budget = graph.config().max_rewrite_iterations;
        let mut iterations: u64 = 0;
        while let Some(n) = work_list.pop_first() {
            if self.cancel.is_cancelled() {
                return Err(NotConverged);
            }
            if let Some(budget) = budget {
                if iterations >= budget as u64 {
                    log::warn!("canonicalizer exceeded rewrite budget of {budget} iterations");
                    return Err(NotConverged);
                }
            }
            iterations += 1;
            if !graph.is_alive(n) {
                continue;
            }
            step(graph, n, &mut work_list);
        }
        Ok(())
    }
}

/// One work-list step for `n` (§4.4 steps 2-5): re-infer its stamp,
/// enqueuing usages if it changed, then dispatch to `canonical` (floating)
/// or `simplify` (fixed).
fn step(graph: &mut StructuredGraph, n: NodeId, work_list: &mut WorkList) {
    if let Some(new_stamp) = infer_stamp(graph, n) {
        if graph.update_stamp(n, new_stamp) {
            for u in graph.usages(n).to_vec() {
                work_list.add(u);
            }
        }
    }

    if graph.op(n).is_floating() {
        match canonicalize_floating(graph, n) {
            CanonResult::Unchanged => {}
            CanonResult::Replace(new) => {
                for u in graph.usages(n).to_vec() {
                    work_list.add(u);
                }
                graph.replace_at_usages(n, new);
                let mut tool = CanonicalizerTool { work_list };
                tool.remove_if_unused(graph, n);
            }
            CanonResult::Dead => {
                let mut tool = CanonicalizerTool { work_list };
                tool.remove_if_unused(graph, n);
            }
        }
    } else {
        let mut tool = CanonicalizerTool { work_list };
        simplify_fixed(graph, n, &mut tool);
    }
}

enum CanonResult {
    Unchanged,
    Replace(NodeId),
    Dead,
}

// ---------------------------------------------------------------------
// Stamp inference (§4.2 `infer_stamp`)
// ---------------------------------------------------------------------

/// Recompute `n`'s stamp from its current input stamps. Returns `None` for
/// node kinds whose stamp is either fixed at construction (`Constant`) or
/// not derived purely from inputs (everything with `Stamp::Void`).
pub fn infer_stamp(graph: &StructuredGraph, n: NodeId) -> Option<Stamp> {
    match graph.op(n) {
        NodeOp::UnaryOp(UnaryOpData { kind, input }) => {
            let in_stamp = *graph.stamp(*input);
            Some(infer_unary(*kind, &in_stamp))
        }
        NodeOp::BinaryOp(BinaryOpData { kind, lhs, rhs }) => {
            let l = *graph.stamp(*lhs);
            let r = *graph.stamp(*rhs);
            Some(infer_binary(*kind, &l, &r))
        }
        NodeOp::Compare(CompareData { kind, lhs, rhs }) => {
            let l = *graph.stamp(*lhs);
            let r = *graph.stamp(*rhs);
            Some(infer_compare(*kind, &l, &r))
        }
        NodeOp::LogicNegation(_) => Some(bool_stamp()),
        NodeOp::Conditional(ConditionalData { true_value, false_value, .. }) => {
            let t = *graph.stamp(*true_value);
            let f = *graph.stamp(*false_value);
            Some(t.meet(&f))
        }
        NodeOp::InstanceOf(_) | NodeOp::IsNull(_) => Some(bool_stamp()),
        NodeOp::Phi(PhiData { values, .. }) => {
            let mut it = values.iter().map(|v| *graph.stamp(*v));
            let first = it.next()?;
            Some(it.fold(first, |acc, s| acc.meet(&s)))
        }
        NodeOp::ValueProxy(ValueProxyData { value, .. }) => Some(*graph.stamp(*value)),
        NodeOp::Pi(PiData { value, .. }) => {
            // The refined stamp is whatever was attached at construction;
            // re-inference only ever narrows it further against the
            // (possibly also-narrowed) underlying value (invariant 5).
            let underlying = *graph.stamp(*value);
            Some(graph.stamp(n).improve_with(&underlying))
        }
        _ => None,
    }
}

fn bool_stamp() -> Stamp {
    Stamp::for_integer(1, false, 0, 1)
}

fn infer_unary(kind: UnaryOpKind, input: &Stamp) -> Stamp {
    match (kind, input) {
        (UnaryOpKind::Neg, Stamp::Integer(i)) => {
            if let Some(c) = i.as_constant() {
                Stamp::for_int_constant(i.bits, i.signed, c.wrapping_neg())
            } else {
                Stamp::Integer(crate::stamp::IntegerStamp::full(i.bits, i.signed))
            }
        }
        (UnaryOpKind::Not, Stamp::Integer(i)) => {
            if let Some(c) = i.as_constant() {
                Stamp::for_int_constant(i.bits, i.signed, !c)
            } else {
                Stamp::Integer(crate::stamp::IntegerStamp::full(i.bits, i.signed))
            }
        }
        (UnaryOpKind::IntConvert { to_bits, to_signed }, Stamp::Integer(i)) => {
            if let Some(c) = i.as_constant() {
                Stamp::for_int_constant(to_bits, to_signed, truncate(c, to_bits, to_signed))
            } else {
                Stamp::Integer(crate::stamp::IntegerStamp::full(to_bits, to_signed))
            }
        }
        _ => Stamp::Illegal,
    }
}

fn truncate(value: i64, bits: u8, signed: bool) -> i64 {
    if bits >= 64 {
        return value;
    }
    let mask = (1i64 << bits) - 1;
    let truncated = value & mask;
    if signed && (truncated & (1 << (bits - 1))) != 0 {
        truncated - (1 << bits)
    } else {
        truncated
    }
}

fn infer_binary(kind: BinaryOpKind, l: &Stamp, r: &Stamp) -> Stamp {
    match (l, r) {
        (Stamp::Integer(a), Stamp::Integer(b)) if a.bits == b.bits => {
            match (a.as_constant(), b.as_constant()) {
                (Some(x), Some(y)) => {
                    let folded = fold_binary_i64(kind, x, y);
                    Stamp::for_int_constant(a.bits, a.signed, truncate(folded, a.bits, a.signed))
                }
                _ => Stamp::Integer(crate::stamp::IntegerStamp::full(a.bits, a.signed || b.signed)),
            }
        }
        _ => Stamp::Illegal,
    }
}

fn fold_binary_i64(kind: BinaryOpKind, x: i64, y: i64) -> i64 {
    match kind {
        BinaryOpKind::Add => x.wrapping_add(y),
        BinaryOpKind::Sub => x.wrapping_sub(y),
        BinaryOpKind::Mul => x.wrapping_mul(y),
        BinaryOpKind::Div => {
            if y == 0 {
                0
            } else {
                x.wrapping_div(y)
            }
        }
        BinaryOpKind::Rem => {
            if y == 0 {
                0
            } else {
                x.wrapping_rem(y)
            }
        }
        BinaryOpKind::And => x & y,
        BinaryOpKind::Or => x | y,
        BinaryOpKind::Xor => x ^ y,
        BinaryOpKind::Shl => x.wrapping_shl(y as u32),
        BinaryOpKind::ShrSigned => x.wrapping_shr(y as u32),
        BinaryOpKind::ShrUnsigned => ((x as u64).wrapping_shr(y as u32)) as i64,
    }
}

fn infer_compare(kind: CompareKind, l: &Stamp, r: &Stamp) -> Stamp {
    if let (Some(x), Some(y)) = (l.as_int_constant(), r.as_int_constant()) {
        let b = match kind {
            CompareKind::Eq => x == y,
            CompareKind::Ne => x != y,
            CompareKind::LessSigned => x < y,
            CompareKind::LessEqSigned => x <= y,
            CompareKind::LessUnsigned => (x as u64) < (y as u64),
            CompareKind::LessEqUnsigned => (x as u64) <= (y as u64),
        };
        return Stamp::for_int_constant(1, false, b as i64);
    }
    if matches!(kind, CompareKind::Eq) && l.always_distinct(r) {
        return Stamp::for_int_constant(1, false, 0);
    }
    if matches!(kind, CompareKind::Ne) && l.always_distinct(r) {
        return Stamp::for_int_constant(1, false, 1);
    }
    bool_stamp()
}

// ---------------------------------------------------------------------
// canonical() — pure rewrites on floating nodes (§4.3, §4.4)
// ---------------------------------------------------------------------

fn canonicalize_floating(graph: &mut StructuredGraph, n: NodeId) -> CanonResult {
    match graph.op(n).clone() {
        NodeOp::UnaryOp(_) => {
            // `infer_stamp` already folded this to a constant stamp, if
            // possible, before `canonicalize_floating` runs (§4.4 step 2
            // precedes step 3); just act on the stamp rather than
            // re-deriving the fold with a guessed bit width here.
            let stamp = *graph.stamp(n);
            if let Some(v) = stamp.as_int_constant() {
                return replace_with_constant(graph, n, int_constant_data(&stamp, v));
            }
            CanonResult::Unchanged
        }
        NodeOp::BinaryOp(BinaryOpData { kind, lhs, rhs }) => canonicalize_binary(graph, n, kind, lhs, rhs),
        NodeOp::Compare(CompareData { kind, lhs, rhs }) => {
            let stamp = *graph.stamp(n);
            if let Some(v) = stamp.as_int_constant() {
                return replace_with_constant(graph, n, ConstantData::Int { bits: 1, signed: false, value: v });
            }
            let _ = (kind, lhs, rhs);
            CanonResult::Unchanged
        }
        NodeOp::LogicNegation(LogicNegationData { input }) => canonicalize_negation(graph, n, input),
        NodeOp::Conditional(ConditionalData { condition, true_value, false_value }) => {
            if true_value == false_value {
                return CanonResult::Replace(true_value);
            }
            if let Some(c) = const_of(graph, condition) {
                return CanonResult::Replace(if c != 0 { true_value } else { false_value });
            }
            CanonResult::Unchanged
        }
        NodeOp::InstanceOf(InstanceOfData { object, negated, .. }) => {
            if graph.stamp(object).is_always_null() {
                return replace_with_constant(
                    graph,
                    n,
                    ConstantData::Int { bits: 1, signed: false, value: negated as i64 },
                );
            }
            CanonResult::Unchanged
        }
        NodeOp::IsNull(IsNullData { object }) => {
            let s = *graph.stamp(object);
            if s.is_always_null() {
                return replace_with_constant(graph, n, ConstantData::Int { bits: 1, signed: false, value: 1 });
            }
            if s.is_non_null() {
                return replace_with_constant(graph, n, ConstantData::Int { bits: 1, signed: false, value: 0 });
            }
            CanonResult::Unchanged
        }
        NodeOp::Phi(PhiData { values, .. }) => {
            if let Some((&first, rest)) = values.split_first() {
                if rest.iter().all(|&v| v == first) {
                    return CanonResult::Replace(first);
                }
            }
            CanonResult::Unchanged
        }
        NodeOp::ValueProxy(ValueProxyData { value, .. }) => {
            // §4.3 `ValueProxy`: "if the value is a constant, collapse to
            // it".
            if matches!(graph.op(value), NodeOp::Constant(_)) {
                CanonResult::Replace(value)
            } else {
                CanonResult::Unchanged
            }
        }
        NodeOp::Pi(PiData { value, guard }) => {
            let underlying = *graph.stamp(value);
            let pi_stamp = *graph.stamp(n);
            // "if the underlying value's stamp is already at least as
            // precise, return the underlying" (§4.3 `Pi`, end-to-end
            // scenario 5): `underlying.join(pi_stamp) == underlying` means
            // `underlying` is already at least as narrow as `pi_stamp`.
            if underlying.join(&pi_stamp) == underlying {
                return CanonResult::Replace(value);
            }
            // "if an identical Pi exists under the same guard with equal
            // or tighter stamp, forward to it": scan `value`'s other
            // usages (there is no uniquing-table entry for `Pi` since its
            // identity depends on its stamp, not just `(value, guard)`).
            if let Some(sibling) = graph.usages(value).iter().copied().find(|&u| {
                u != n
                    && match graph.op(u) {
                        NodeOp::Pi(other) => {
                            other.guard == guard && {
                                let sibling_stamp = *graph.stamp(u);
                                sibling_stamp.join(&pi_stamp) == sibling_stamp
                            }
                        }
                        _ => false,
                    }
            }) {
                return CanonResult::Replace(sibling);
            }
            // "if the underlying is a memory read, fold the stamp
            // refinement into the read and return the read": the read's
            // own stamp only ever narrows (§3.1 monotonicity), so meeting
            // it with the pi's refinement is always a legal update.
            if matches!(graph.op(value), NodeOp::MemoryRead(_)) {
                let narrowed = underlying.join(&pi_stamp);
                graph.update_stamp(value, narrowed);
                return CanonResult::Replace(value);
            }
            CanonResult::Unchanged
        }
        NodeOp::GuardNode(GuardNodeData { condition, negated, .. }) => {
            if let NodeOp::LogicNegation(LogicNegationData { input }) = graph.op(condition).clone() {
                graph.replace_first_input(n, condition, input);
                if let NodeOp::GuardNode(d) = graph.op_mut(n) {
                    d.negated = !negated;
                }
                return CanonResult::Unchanged;
            }
            // "fold to start (trivially satisfied) ... when the condition
            // is constant" (§4.3 `GuardNode`): a guard that can never fail
            // protects nothing, so every use of it is as safe as depending
            // on the graph's start, which dominates everything. The
            // constant-false half of this rule needs no separate floating
            // sentinel: `crate::lowering::LoweringDriver` anchors every
            // surviving floating `GuardNode` into a `FixedGuard` no later
            // than `FixedDeopts`, and `simplify_fixed_guard` already folds
            // a constant-false `FixedGuard` to an unconditional
            // `Deoptimize` (end-to-end scenario 3) — the anchored
            // `FixedGuard` *is* that sentinel.
            if let Some(c) = const_of(graph, condition) {
                let satisfied = (c != 0) != negated;
                if satisfied {
                    return CanonResult::Replace(graph.start());
                }
            }
            CanonResult::Unchanged
        }
        _ => CanonResult::Unchanged,
    }
}

fn canonicalize_binary(graph: &mut StructuredGraph, n: NodeId, kind: BinaryOpKind, lhs: NodeId, rhs: NodeId) -> CanonResult {
    let stamp = *graph.stamp(n);
    if let Some(v) = stamp.as_int_constant() {
        return replace_with_constant(graph, n, int_constant_data(&stamp, v));
    }
    // Algebraic identities, applied only when one side is a known constant.
    let lhs_c = const_of(graph, lhs);
    let rhs_c = const_of(graph, rhs);
    match (kind, lhs_c, rhs_c) {
        (BinaryOpKind::Add, _, Some(0)) => CanonResult::Replace(lhs),
        (BinaryOpKind::Add, Some(0), _) => CanonResult::Replace(rhs),
        (BinaryOpKind::Sub, _, Some(0)) => CanonResult::Replace(lhs),
        (BinaryOpKind::Mul, _, Some(1)) => CanonResult::Replace(lhs),
        (BinaryOpKind::Mul, Some(1), _) => CanonResult::Replace(rhs),
        (BinaryOpKind::Mul, _, Some(0)) => CanonResult::Replace(rhs),
        (BinaryOpKind::Mul, Some(0), _) => CanonResult::Replace(lhs),
        (BinaryOpKind::And, _, Some(0)) => CanonResult::Replace(rhs),
        (BinaryOpKind::And, Some(0), _) => CanonResult::Replace(lhs),
        (BinaryOpKind::Or, _, Some(0)) => CanonResult::Replace(lhs),
        (BinaryOpKind::Or, Some(0), _) => CanonResult::Replace(rhs),
        (BinaryOpKind::Xor, _, _) if lhs == rhs => {
            let z = ConstantData::Int { bits: stamp_bits(&stamp), signed: false, value: 0 };
            replace_with_constant(graph, n, z)
        }
        _ => CanonResult::Unchanged,
    }
}

fn stamp_bits(s: &Stamp) -> u8 {
    match s {
        Stamp::Integer(i) => i.bits,
        _ => 32,
    }
}

fn canonicalize_negation(graph: &mut StructuredGraph, n: NodeId, input: NodeId) -> CanonResult {
    if let NodeOp::LogicNegation(LogicNegationData { input: inner }) = graph.op(input) {
        return CanonResult::Replace(*inner);
    }
    if let NodeOp::Compare(CompareData { kind, lhs, rhs }) = graph.op(input).clone() {
        let negated_kind = match kind {
            CompareKind::Eq => CompareKind::Ne,
            CompareKind::Ne => CompareKind::Eq,
            CompareKind::LessSigned => CompareKind::LessEqSigned,
            CompareKind::LessEqSigned => CompareKind::LessSigned,
            CompareKind::LessUnsigned => CompareKind::LessEqUnsigned,
            CompareKind::LessEqUnsigned => CompareKind::LessUnsigned,
        };
        // Only a true logical inverse for Eq/Ne; the relational operators'
        // "negation" above is a strict/non-strict flip that also requires
        // swapping operands to stay correct, which is more invasive than
        // this pure fold should attempt, so only fold the always-sound
        // Eq/Ne case.
        if matches!(kind, CompareKind::Eq | CompareKind::Ne) {
            let replacement = graph.unique(
                NodeOp::Compare(CompareData { kind: negated_kind, lhs, rhs }),
                bool_stamp(),
            );
            return CanonResult::Replace(replacement);
        }
    }
    let _ = n;
    CanonResult::Unchanged
}

fn const_of(graph: &StructuredGraph, n: NodeId) -> Option<i64> {
    graph.stamp(n).as_int_constant()
}

fn int_constant_data(stamp: &Stamp, value: i64) -> ConstantData {
    match stamp {
        Stamp::Integer(i) => ConstantData::Int { bits: i.bits, signed: i.signed, value },
        _ => ConstantData::Int { bits: 32, signed: true, value },
    }
}

fn replace_with_constant(graph: &mut StructuredGraph, n: NodeId, data: ConstantData) -> CanonResult {
    let stamp = match data {
        ConstantData::Int { bits, signed, value } => Stamp::for_int_constant(bits, signed, value),
        ConstantData::Float { bits, .. } => Stamp::Float(crate::stamp::FloatStamp::full(bits)),
        ConstantData::Null => Stamp::Object(crate::stamp::ObjectStamp::null()),
    };
    let c = graph.unique(NodeOp::Constant(data), stamp);
    if c == n {
        CanonResult::Unchanged
    } else {
        CanonResult::Replace(c)
    }
}

// ---------------------------------------------------------------------
// simplify() — control-flow-aware rewrites on fixed nodes (§4.3, §4.4)
// ---------------------------------------------------------------------

fn simplify_fixed(graph: &mut StructuredGraph, n: NodeId, tool: &mut CanonicalizerTool) {
    match graph.op(n).clone() {
        NodeOp::If(data) => simplify_if(graph, n, data, tool),
        NodeOp::FixedGuard(data) => simplify_fixed_guard(graph, n, data, tool),
        NodeOp::Begin(_) => simplify_begin(graph, n, tool),
        NodeOp::Merge(data) => simplify_merge(graph, n, data),
        NodeOp::LoopBegin(data) => {
            let _ = data;
            graph.reduce_degenerate_loop_begin(n);
        }
        _ => {}
    }
}

/// `If::simplify` (§4.3 `If`, end-to-end scenarios 1, 4, 6).
fn simplify_if(graph: &mut StructuredGraph, n: NodeId, data: IfData, tool: &mut CanonicalizerTool) {
    let succs = graph.successors(n).to_vec();
    if succs.len() != 2 {
        return;
    }
    let (true_succ, false_succ) = (succs[0], succs[1]);

    // 1. Constant condition: collapse the split to its surviving successor,
    // deleting the other arm's now-unreachable subtree (`remove_split`
    // handles both; it stops at any merge the dead arm reconverges at
    // rather than deleting past it).
    if let Some(c) = const_of(graph, data.condition) {
        let surviving = if c != 0 { true_succ } else { false_succ };
        match graph.remove_split(n, surviving) {
            Ok(deleted) => {
                for d in deleted {
                    tool.work_list.forget(d);
                }
                tool.add_to_work_list(surviving);
            }
            Err(e) => log::error!("failed to collapse constant If {n:?}: {e}"),
        }
        return;
    }

    // 4. Empty diamond collapsing to a `Conditional` (scenario 4).
    if let Some((merge, phi, true_value, false_value)) = empty_diamond_phi(graph, true_succ, false_succ) {
        let conditional = graph.unique(
            NodeOp::Conditional(ConditionalData { condition: data.condition, true_value, false_value }),
            graph.stamp(true_value).meet(graph.stamp(false_value)),
        );
        graph.replace_at_usages(phi, conditional);
        tool.remove_if_unused(graph, phi);
        // Keep `true_succ` as the one surviving arm of the split; the other
        // arm's subtree is walked and pruned out of `merge`'s ends (and the
        // now-dead phi's remaining operand) by `remove_split`.
        match graph.remove_split(n, true_succ) {
            Ok(deleted) => {
                for d in deleted {
                    tool.work_list.forget(d);
                }
            }
            Err(e) => log::error!("failed to collapse empty diamond at {n:?}: {e}"),
        }
        tool.add_to_work_list(true_succ);
        tool.add_to_work_list(merge);
        return;
    }

    // 6. Hoist a more-predictive downstream `If` above this one when the
    // two conditions are disjoint `instanceof` tests on the same object
    // (§4.3 `If`, end-to-end scenario 6).
    if !data.considered_for_swap {
        if let NodeOp::If(d) = graph.op_mut(n) {
            d.considered_for_swap = true;
        }
        try_swap_successive_ifs(graph, n, true_succ, data.true_probability, tool);
    }
}

/// Recognizes `If(c, BeginA -> EndA, BeginB -> EndB) -> Merge{ phi(vA, vB) }`
/// where both arms are otherwise empty. Returns `(merge, phi, true_value,
/// false_value)`.
fn empty_diamond_phi(graph: &StructuredGraph, true_begin: NodeId, false_begin: NodeId) -> Option<(NodeId, NodeId, NodeId, NodeId)> {
    if !matches!(graph.op(true_begin), NodeOp::Begin(_)) || !matches!(graph.op(false_begin), NodeOp::Begin(_)) {
        return None;
    }
    let true_next = *graph.successors(true_begin).first()?;
    let false_next = *graph.successors(false_begin).first()?;
    if true_next != false_next {
        return None;
    }
    let merge = true_next;
    let merge_data = match graph.op(merge) {
        NodeOp::Merge(m) => m,
        _ => return None,
    };
    if merge_data.ends != vec![true_begin, false_begin] && merge_data.ends != vec![false_begin, true_begin] {
        return None;
    }
    if merge_data.phis.len() != 1 {
        return None;
    }
    let phi = merge_data.phis[0];
    let values = match graph.op(phi) {
        NodeOp::Phi(p) => &p.values,
        _ => return None,
    };
    if values.len() != 2 {
        return None;
    }
    let true_is_first = merge_data.ends[0] == true_begin;
    let (true_value, false_value) = if true_is_first {
        (values[0], values[1])
    } else {
        (values[1], values[0])
    };
    Some((merge, phi, true_value, false_value))
}

fn try_swap_successive_ifs(graph: &mut StructuredGraph, if1: NodeId, begin: NodeId, p1: f64, tool: &mut CanonicalizerTool) {
    let Some(next) = graph.successors(begin).first().copied() else { return };
    let NodeOp::If(if2_data) = graph.op(next).clone() else { return };
    let if1_cond = match graph.op(if1) {
        NodeOp::If(d) => d.condition,
        _ => return,
    };
    let (obj1, ty1, neg1) = match graph.op(if1_cond) {
        NodeOp::InstanceOf(InstanceOfData { object, ty, negated }) => (*object, *ty, *negated),
        _ => return,
    };
    let (obj2, ty2, neg2) = match graph.op(if2_data.condition) {
        NodeOp::InstanceOf(InstanceOfData { object, ty, negated }) => (*object, *ty, *negated),
        _ => return,
    };
    if obj1 != obj2 || ty1 == ty2 {
        return;
    }
    let p2 = if2_data.true_probability;
    // Hoist `if2` above `if1` only when it strictly improves expected work:
    // `P(c1) < (1 - P(c1)) * P(c2)` (§4.3 `If`, scenario 6).
    if !(p1 < (1.0 - p1) * p2) {
        return;
    }
    log::trace!("swapping successive ifs {if1:?}/{next:?} on disjoint instanceof tests (ty1={ty1:?} neg={neg1} ty2={ty2:?} neg={neg2})");
    // Swap: `if2`'s condition becomes the outer test, `if1`'s the inner.
    // Implemented by exchanging the two `If` nodes' conditions and
    // probabilities in place, which preserves every other edge (successors,
    // guard evacuation) without needing to re-link the control chain.
    let if1_true_prob = p1;
    graph.replace_first_input(if1, if1_cond, if2_data.condition);
    graph.replace_first_input(next, if2_data.condition, if1_cond);
    if let NodeOp::If(d) = graph.op_mut(if1) {
        d.true_probability = p2;
    }
    if let NodeOp::If(d) = graph.op_mut(next) {
        d.true_probability = if1_true_prob;
    }
    tool.add_to_work_list(if1);
    tool.add_to_work_list(next);
}

/// `FixedGuard::simplify` (§4.3 `FixedGuard`, end-to-end scenarios 2, 3).
///
/// Order resolved for the §9 Open Question ("strip `LogicNegation` before
/// or after the constant-folding case"): negation is stripped *first*, so
/// the constant-folding checks below always see the guard's own
/// already-normalized `negated` flag and a bare condition. Documented in
/// `DESIGN.md`.
fn simplify_fixed_guard(graph: &mut StructuredGraph, n: NodeId, data: FixedGuardData, tool: &mut CanonicalizerTool) {
    if let NodeOp::LogicNegation(LogicNegationData { input }) = graph.op(data.condition).clone() {
        graph.replace_first_input(n, data.condition, input);
        if let NodeOp::FixedGuard(d) = graph.op_mut(n) {
            d.negated = !d.negated;
        }
        tool.add_to_work_list(n);
        return;
    }
    let Some(c) = const_of(graph, data.condition) else { return };
    let satisfied = (c != 0) != data.negated;
    if satisfied {
        // Guard always passes: remove it, predecessor's next becomes its
        // former successor.
        if graph.remove_fixed(n).is_ok() {
            tool.remove_if_unused(graph, n);
        }
    } else {
        // Guard always fails: its continuation is unreachable; replace it
        // with an unconditional `Deoptimize`.
        let deopt = graph.add(
            NodeOp::Deoptimize(DeoptimizeData {
                reason: data.reason,
                frame_state: data.frame_state,
            }),
            Stamp::Void,
        );
        if let Ok(deleted) = graph.replace_fixed_with_sink(n, deopt) {
            for d in deleted {
                tool.work_list.forget(d);
            }
        }
        tool.remove_if_unused(graph, n);
    }
}

/// `AbstractBegin::simplify` (§4.3 `AbstractBegin`, invariant 3 "Begin
/// necessity"): a begin whose predecessor is neither a split nor the start
/// nor a merge is unnecessary. If it pins no guard/anchor usages it is
/// spliced out; otherwise its usages are evacuated to the nearest
/// preceding begin first.
fn simplify_begin(graph: &mut StructuredGraph, n: NodeId, tool: &mut CanonicalizerTool) {
    let is_necessary = is_split_successor(graph, n) || n == graph.start();
    if is_necessary {
        return;
    }
    let pinned: Vec<NodeId> = graph
        .usages(n)
        .iter()
        .copied()
        .filter(|&u| matches!(graph.op(u), NodeOp::GuardNode(_)) || matches!(graph.op(u), NodeOp::ValueAnchor(_)))
        .collect();
    if !pinned.is_empty() {
        if let Some(target) = nearest_preceding_begin(graph, n) {
            for u in pinned {
                graph.replace_first_input(u, n, target);
                tool.add_to_work_list(u);
            }
        } else {
            return;
        }
    }
    if graph.remove_fixed(n).is_ok() {
        tool.remove_if_unused(graph, n);
    }
}

fn is_split_successor(graph: &StructuredGraph, begin: NodeId) -> bool {
    graph
        .live_nodes()
        .any(|id| graph.op(id).is_control_split() && graph.successors(id).contains(&begin))
}

fn nearest_preceding_begin(graph: &StructuredGraph, begin: NodeId) -> Option<NodeId> {
    let mut current = begin;
    loop {
        let pred = graph.live_nodes().find(|&id| graph.successors(id).contains(&current))?;
        if graph.op(pred).is_begin() {
            return Some(pred);
        }
        current = pred;
    }
}

/// `AbstractMerge::simplify`: collapse a merge left with one forward end
/// and no phis (e.g. after `If` constant-folding removed the other end).
fn simplify_merge(graph: &mut StructuredGraph, n: NodeId, data: MergeData) {
    let _ = data;
    graph.reduce_trivial_merge(n).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::config::CompilerConfig;
    use crate::node::memory::MemoryLocation;
    use crate::node::phi::PiData;
    use crate::runtime::{MethodHandle, NeverCancel};

    fn fresh() -> StructuredGraph {
        StructuredGraph::new(MethodHandle(0), CompilerConfig::new())
    }

    /// §4.3 `Pi`: "if an identical `Pi` exists under the same guard with
    /// equal or tighter stamp, forward to it" — a second `Pi` over the
    /// same underlying value and guard, with a looser stamp, collapses to
    /// the first.
    #[test]
    fn pi_forwards_to_sibling_pi_under_same_guard() {
        let mut g = fresh();
        let mut b = GraphBuilder::new(&mut g);
        let receiver = b.constant_null();
        let v = b.memory_read(receiver, MemoryLocation::Any, Stamp::for_integer(32, true, i64::MIN, i64::MAX));
        let guard = b.constant_int(1, false, 1);
        let tight = b.add_raw(
            NodeOp::Pi(PiData { value: v, guard: guard.into() }),
            Stamp::for_integer(32, true, 0, 10),
        );
        let loose = b.add_raw(
            NodeOp::Pi(PiData { value: v, guard: guard.into() }),
            Stamp::for_integer(32, true, -100, 100),
        );
        b.ret(Some(loose));
        let sibling_id = tight;
        Canonicalizer::new(&NeverCancel).run_to_fixpoint(&mut g).unwrap();
        assert!(!g.live_nodes().any(|n| n == loose && matches!(g.op(n), NodeOp::Pi(_))));
        assert!(g.live_nodes().any(|n| n == sibling_id));
    }

    /// §4.3 `Pi`: "if the underlying is a memory read, fold the stamp
    /// refinement into the read and return the read".
    #[test]
    fn pi_folds_into_underlying_memory_read() {
        let mut g = fresh();
        let mut b = GraphBuilder::new(&mut g);
        let receiver = b.constant_null();
        let read = b.memory_read(receiver, MemoryLocation::Any, Stamp::for_integer(32, true, i64::MIN, i64::MAX));
        let pi = b.add_raw(
            NodeOp::Pi(PiData { value: read, guard: graphir_entity::PackedOption::none() }),
            Stamp::for_integer(32, true, 0, 100),
        );
        b.ret(Some(pi));
        Canonicalizer::new(&NeverCancel).run_to_fixpoint(&mut g).unwrap();
        assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Pi(_))));
        assert_eq!(*g.stamp(read), Stamp::for_integer(32, true, 0, 100));
        assert!(g.verify().is_ok());
    }
}

