//! Staged Lowering & Guard Lifecycle (§4.5, C5).
//!
//! `GuardsStage` is a monotone 3-state enum (derives `Ord` so "did we
//! advance" is a plain comparison); a stage *advance* is a phase that
//! rewrites every node whose shape depends on the stage, mirroring how
//! `cranelift-codegen`'s `Context::compile` runs a fixed sequence of
//! legalization passes between optimization fixed points rather than
//! interleaving everything into one pass.

use crate::canon::Canonicalizer;
use crate::entities::NodeId;
use crate::error::GraphResult;
use crate::graph::StructuredGraph;
use crate::node::control::DeoptimizeData;
use crate::node::guard::{ConditionAnchorData, GuardNodeData, ValueAnchorData};
use crate::node::phi::ValueProxyData;
use crate::node::NodeOp;
use crate::runtime::{CancelToken, LoweringProvider};
use crate::{timing, Bailout, BailoutReason};
use graphir_entity::PackedOption;

/// The guards-stage lifecycle (§4.5 table). Ordered so that `s1 < s2`
/// exactly when `s1` precedes `s2` in the lifecycle; stage transitions
/// must never move backward (§3.3 invariant 6).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum GuardsStage {
    FloatingGuards,
    FixedDeopts,
    AfterFsa,
}

impl GuardsStage {
    pub fn allows_floating_guards(self) -> bool {
        matches!(self, GuardsStage::FloatingGuards)
    }

    pub fn allows_new_deopts(self) -> bool {
        !matches!(self, GuardsStage::AfterFsa)
    }

    /// The next stage in the lifecycle, or `None` if already at the end.
    pub fn next(self) -> Option<GuardsStage> {
        match self {
            GuardsStage::FloatingGuards => Some(GuardsStage::FixedDeopts),
            GuardsStage::FixedDeopts => Some(GuardsStage::AfterFsa),
            GuardsStage::AfterFsa => None,
        }
    }
}

/// Drives the graph through the remaining guards-stage transitions,
/// running the canonicalizer to a fixed point between each one (mirroring
/// the component-table note that "between driver passes, C5 advances the
/// graph's stage and rewrites stage-sensitive nodes").
pub struct LoweringDriver<'a, L: LoweringProvider, C: CancelToken> {
    pub provider: &'a L,
    pub cancel: &'a C,
}

impl<'a, L: LoweringProvider, C: CancelToken> LoweringDriver<'a, L, C> {
    pub fn new(provider: &'a L, cancel: &'a C) -> Self {
        Self { provider, cancel }
    }

    /// Run the canonicalizer to a fixed point, then advance one stage and
    /// rewrite stage-sensitive nodes, repeating until `target` is reached.
    pub fn advance_to(
        &self,
        graph: &mut StructuredGraph,
        target: GuardsStage,
    ) -> Result<(), Bailout> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Bailout::new(BailoutReason::Cancelled, "cancelled during staged lowering"));
            }
            Canonicalizer::new(self.cancel)
                .run_to_fixpoint(graph)
                .map_err(|_| Bailout::new(BailoutReason::RewriteBudgetExhausted, "canonicalizer did not converge"))?;
            if graph.guards_stage() >= target {
                return Ok(());
            }
            let next = graph
                .guards_stage()
                .next()
                .expect("target stage unreached but no next stage exists");
            self.transition(graph, next)
                .map_err(|e| Bailout::new(BailoutReason::UnsupportedPattern, e.to_string()))?;
        }
    }

    fn transition(&self, graph: &mut StructuredGraph, stage: GuardsStage) -> GraphResult<()> {
        let _t = timing::stage_transition();
        log::debug!("guards stage transition -> {stage:?}");
        match stage {
            GuardsStage::FloatingGuards => unreachable!("FloatingGuards is the initial stage"),
            GuardsStage::FixedDeopts => self.enter_fixed_deopts(graph)?,
            GuardsStage::AfterFsa => self.enter_after_fsa(graph)?,
        }
        graph.set_guards_stage(stage);
        Ok(())
    }

    /// Entering `FIXED_DEOPTS`: floating guards are no longer allowed.
    /// Every `ConditionAnchor` lowers to a `ValueAnchor` guarded by a fixed
    /// `FixedGuard`; every floating `GuardNode` is anchored to a fixed
    /// `ValueAnchor` at its anchor point (§4.5).
    fn enter_fixed_deopts(&self, graph: &mut StructuredGraph) -> GraphResult<()> {
        let candidates: Vec<NodeId> = graph.live_nodes().collect();
        for n in candidates {
            if !graph.is_alive(n) {
                continue;
            }
            match graph.op(n) {
                NodeOp::ConditionAnchor(ConditionAnchorData { condition, negated }) => {
                    let (condition, negated) = (*condition, *negated);
                    self.lower_condition_anchor(graph, n, condition, negated)?;
                }
                NodeOp::GuardNode(GuardNodeData { anchor, .. }) => {
                    let anchor = *anchor;
                    self.anchor_floating_guard(graph, n, anchor)?;
                }
                _ => {}
            }
            self.provider.lower_at_stage(graph, n, GuardsStage::FixedDeopts)?;
        }
        Ok(())
    }

    fn lower_condition_anchor(
        &self,
        graph: &mut StructuredGraph,
        n: NodeId,
        condition: NodeId,
        negated: bool,
    ) -> GraphResult<()> {
        let anchor = graph.add(
            NodeOp::ValueAnchor(ValueAnchorData {
                value: PackedOption::none(),
            }),
            crate::stamp::Stamp::DependencyOnly,
        );
        graph.replace_fixed_with_fixed(n, anchor)?;
        let guard = graph.add(
            NodeOp::FixedGuard(crate::node::guard::FixedGuardData {
                condition,
                reason: crate::runtime::DeoptReasonValue::encode(
                    crate::runtime::DeoptAction::InvalidateReprofile,
                    crate::runtime::DeoptReason::UnreachedCode,
                    0,
                    &crate::runtime::DeoptEncoding::default(),
                ),
                negated,
                speculation_invalidates: true,
                frame_state: PackedOption::none(),
            }),
            crate::stamp::Stamp::Void,
        );
        graph.add_before_fixed(anchor, guard)?;
        graph.safe_delete(n).ok();
        Ok(())
    }

    fn anchor_floating_guard(&self, graph: &mut StructuredGraph, guard: NodeId, anchor: NodeId) -> GraphResult<()> {
        let value_anchor = graph.add(
            NodeOp::ValueAnchor(ValueAnchorData {
                value: PackedOption::from(guard),
            }),
            crate::stamp::Stamp::DependencyOnly,
        );
        graph.add_after_fixed(anchor, value_anchor)?;
        Ok(())
    }

    /// Entering `AFTER_FSA`: frame states move from being owned by the
    /// nearest preceding state-split to being owned directly by
    /// deoptimizing nodes (§3.3 invariant 4, §4.5).
    fn enter_after_fsa(&self, graph: &mut StructuredGraph) -> GraphResult<()> {
        let candidates: Vec<NodeId> = graph.live_nodes().collect();
        for n in candidates {
            if !graph.is_alive(n) || !graph.op(n).can_deoptimize() {
                continue;
            }
            if let NodeOp::Deoptimize(DeoptimizeData { frame_state, .. }) = graph.op(n) {
                if frame_state.is_some() {
                    continue;
                }
            }
            if let Some(fs) = self.nearest_preceding_frame_state(graph, n) {
                self.attach_frame_state(graph, n, fs)?;
            }
            self.provider.lower_at_stage(graph, n, GuardsStage::AfterFsa)?;
        }
        if graph.has_value_proxies() {
            strip_proxies_pass(graph);
            graph.clear_value_proxies_flag();
        }
        Ok(())
    }

    fn nearest_preceding_frame_state(&self, graph: &StructuredGraph, n: NodeId) -> Option<NodeId> {
        // Walk backward along the control-predecessor chain (the inverse of
        // `successors`) looking for the nearest state-split that owns a
        // frame state. A linear predecessor scan is adequate here: this
        // runs once per deoptimizing node during a single, one-way stage
        // transition, not in the canonicalizer's hot loop.
        let mut current = n;
        loop {
            let pred = graph
                .live_nodes()
                .find(|&id| graph.successors(id).contains(&current));
            let pred = match pred {
                Some(p) => p,
                None => return None,
            };
            if let Some(fs) = state_split_frame_state(graph.op(pred)) {
                return Some(fs);
            }
            current = pred;
        }
    }

    fn attach_frame_state(&self, graph: &mut StructuredGraph, n: NodeId, fs: NodeId) -> GraphResult<()> {
        match graph.op_mut(n) {
            NodeOp::Deoptimize(d) => d.frame_state = PackedOption::from(fs),
            NodeOp::FixedGuard(d) => d.frame_state = PackedOption::from(fs),
            NodeOp::GuardNode(d) => d.frame_state = PackedOption::from(fs),
            NodeOp::Invoke(_) | NodeOp::InvokeWithException(_) | NodeOp::Allocate(_) => {
                // These are state-splits as well as deoptimizing nodes, so
                // the nearest preceding state-split found by
                // `nearest_preceding_frame_state` *is* this node itself:
                // it already owns its frame state directly from
                // construction, both before and after AFTER_FSA.
                return Ok(());
            }
            _ => {}
        }
        graph.reunique(n);
        Ok(())
    }
}

fn state_split_frame_state(op: &NodeOp) -> Option<NodeId> {
    match op {
        NodeOp::MemoryRead(d) | NodeOp::MemoryWrite(d) => d.frame_state.expand(),
        NodeOp::Invoke(d) => d.frame_state.expand(),
        NodeOp::InvokeWithException(d) => d.base.frame_state.expand(),
        NodeOp::Allocate(d) => d.frame_state.expand(),
        NodeOp::MonitorEnter(d) | NodeOp::MonitorExit(d) => d.frame_state.expand(),
        _ => None,
    }
}

/// Rewrite every `ValueProxy` to its underlying value (§4.5, "`ValueProxy`s
/// are rewritten to their underlying values when `has_value_proxies` is
/// cleared"). Lives here rather than in `crate::canon` because it is a
/// one-way sweep tied to the stage lifecycle, not a general rewrite rule.
pub(crate) fn strip_proxies_pass(graph: &mut StructuredGraph) {
    let proxies: Vec<(NodeId, NodeId)> = graph
        .live_nodes()
        .filter_map(|n| match graph.op(n) {
            NodeOp::ValueProxy(ValueProxyData { value, .. }) => Some((n, *value)),
            _ => None,
        })
        .collect();
    for (proxy, value) in proxies {
        graph.replace_at_usages(proxy, value);
        graph.remove_if_unused(proxy);
    }
}
