//! Graph Arena & Edge Model (§4.1, C1).
//!
//! Owns node storage as a `PrimaryMap` keyed by `NodeId` — a generational,
//! cheap-to-copy index rather than a Rust reference, so the cyclic graph
//! (back-edges for loops, usage edges pointing back at definitions) needs
//! no reference counting or unsafe aliasing (§9 "Cyclic graphs"). Every
//! mutation of inputs, successors, or usages goes through this module so
//! the edge-consistency invariant (§3.3 invariant 1) cannot be violated by
//! construction elsewhere in the crate.

use crate::assumptions::AssumptionSet;
use crate::config::CompilerConfig;
use crate::entities::{InlinedMethodId, NodeId, UsageType};
use crate::error::{GraphError, GraphResult};
use crate::lowering::GuardsStage;
use crate::node::control::{BeginData, MergeData, StartData};
use crate::node::NodeOp;
use crate::runtime::MethodHandle;
use crate::stamp::Stamp;
use graphir_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// One arena slot: a node's kind-specific payload, its stamp, its edges,
/// and its liveness flag (§3.1 "Node").
#[derive(Clone, Debug)]
pub struct NodeData {
    pub op: NodeOp,
    pub stamp: Stamp,
    /// Input edges, each annotated with the usage type from the closed set
    /// in §3.1. Populated from `op.for_each_input()` whenever the node is
    /// added or one of its edges is rewritten, so it is always consistent
    /// with `op` itself — this is the list `usages()` queries walk in
    /// reverse to find `u ∈ usages(b)` for the invariant-1 check.
    pub inputs: SmallVec<[(NodeId, UsageType); 4]>,
    /// Successor control edges. Empty for floating nodes and control
    /// sinks; exactly one for `FixedWithNext`; >=2 for `ControlSplit`.
    pub successors: SmallVec<[NodeId; 2]>,
    /// Every node `u` such that `self` appears in `u`'s `inputs`.
    pub usages: Vec<NodeId>,
    alive: bool,
}

impl NodeData {
    fn new(op: NodeOp, stamp: Stamp) -> Self {
        let mut inputs = SmallVec::new();
        op.for_each_input(|id, ty| inputs.push((id, ty)));
        Self {
            op,
            stamp,
            inputs,
            successors: SmallVec::new(),
            usages: Vec::new(),
            alive: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// The sea-of-nodes graph for one method compilation (§3.1 "Graph").
pub struct StructuredGraph {
    nodes: PrimaryMap<NodeId, NodeData>,
    start: NodeId,
    assumptions: AssumptionSet,
    inlined_methods: PrimaryMap<InlinedMethodId, MethodHandle>,
    guards_stage: GuardsStage,
    is_after_floating_read_phase: bool,
    has_value_proxies: bool,
    unique_table: FxHashMap<crate::node::UniqueKey, NodeId>,
    config: CompilerConfig,
    method: MethodHandle,
}

impl StructuredGraph {
    /// Create a new graph for `method`, with a fresh `Start` node and the
    /// guards stage the config requests (§6.3 `guards_stage_start`).
    pub fn new(method: MethodHandle, config: CompilerConfig) -> Self {
        let mut nodes = PrimaryMap::new();
        let start = nodes.push(NodeData::new(NodeOp::Start(StartData), Stamp::Void));
        let guards_stage = match config.guards_stage_start {
            crate::config::GuardsStageStart::FloatingGuards => GuardsStage::FloatingGuards,
            crate::config::GuardsStageStart::FixedDeopts => GuardsStage::FixedDeopts,
            crate::config::GuardsStageStart::AfterFsa => GuardsStage::AfterFsa,
        };
        log::debug!("new StructuredGraph for {method:?}, starting stage {guards_stage:?}");
        Self {
            nodes,
            start,
            assumptions: AssumptionSet::new(),
            inlined_methods: PrimaryMap::new(),
            guards_stage,
            is_after_floating_read_phase: false,
            has_value_proxies: false,
            unique_table: FxHashMap::default(),
            config,
            method,
        }
    }

    pub fn method(&self) -> MethodHandle {
        self.method
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn guards_stage(&self) -> GuardsStage {
        self.guards_stage
    }

    /// Advance the guards stage. Only `crate::lowering` calls this, and
    /// only forward — the stage is monotone (§3.3 invariant 6, §4.5).
    pub(crate) fn set_guards_stage(&mut self, stage: GuardsStage) {
        debug_assert!(stage >= self.guards_stage, "guards stage must not regress");
        self.guards_stage = stage;
    }

    pub fn is_after_floating_read_phase(&self) -> bool {
        self.is_after_floating_read_phase
    }

    pub(crate) fn set_after_floating_read_phase(&mut self) {
        self.is_after_floating_read_phase = true;
    }

    pub fn has_value_proxies(&self) -> bool {
        self.has_value_proxies
    }

    pub(crate) fn clear_value_proxies_flag(&mut self) {
        self.has_value_proxies = false;
    }

    pub fn set_has_value_proxies(&mut self, value: bool) {
        self.has_value_proxies = value;
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }

    pub fn assumptions_mut(&mut self) -> &mut AssumptionSet {
        &mut self.assumptions
    }

    pub fn record_inlined_method(&mut self, method: MethodHandle) -> Option<InlinedMethodId> {
        if !self.config.record_inlined_methods {
            return None;
        }
        Some(self.inlined_methods.push(method))
    }

    pub fn inlined_methods(&self) -> impl Iterator<Item = MethodHandle> + '_ {
        self.inlined_methods.values().copied()
    }

    // -- node accessors ---------------------------------------------------

    pub fn op(&self, n: NodeId) -> &NodeOp {
        &self.nodes[n].op
    }

    pub fn op_mut(&mut self, n: NodeId) -> &mut NodeOp {
        &mut self.nodes[n].op
    }

    pub fn stamp(&self, n: NodeId) -> &Stamp {
        &self.nodes[n].stamp
    }

    pub fn inputs(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[n].inputs.iter().map(|(id, _)| *id)
    }

    pub fn inputs_with_usage(&self, n: NodeId) -> impl Iterator<Item = (NodeId, UsageType)> + '_ {
        self.nodes[n].inputs.iter().copied()
    }

    pub fn successors(&self, n: NodeId) -> &[NodeId] {
        &self.nodes[n].successors
    }

    pub fn usages(&self, n: NodeId) -> &[NodeId] {
        &self.nodes[n].usages
    }

    pub fn is_alive(&self, n: NodeId) -> bool {
        self.nodes.get(n).map(|d| d.is_alive()).unwrap_or(false)
    }

    /// Iterate every live node id, in arena (insertion) order. Rewrites
    /// must not assume this visits nodes added mid-iteration (§4.1 "Snapshot
    /// iteration").
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, d)| d.is_alive())
            .map(|(id, _)| id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn live_node_count(&self) -> usize {
        self.live_nodes().count()
    }

    // -- mutation -----------------------------------------------------

    fn link_usages(&mut self, of: NodeId) {
        let inputs = self.nodes[of].inputs.clone();
        for (input, _) in inputs {
            if self.nodes[input].is_alive() {
                self.nodes[input].usages.push(of);
            }
        }
    }

    fn unlink_usages(&mut self, of: NodeId) {
        let inputs = self.nodes[of].inputs.clone();
        for (input, _) in inputs {
            if let Some(data) = self.nodes.get_mut(input) {
                if let Some(pos) = data.usages.iter().position(|&u| u == of) {
                    data.usages.remove(pos);
                }
            }
        }
    }

    /// `add(node)`: register a freshly-built node, linking usages for each
    /// of its inputs (§4.1).
    pub fn add(&mut self, op: NodeOp, stamp: Stamp) -> NodeId {
        let data = NodeData::new(op, stamp);
        let id = self.nodes.push(data);
        self.link_usages(id);
        id
    }

    /// `unique(node)`: if an equal value-numberable node already exists,
    /// return it; otherwise install and return the freshly-built one
    /// (§4.1 "Uniquing"). `op`/`stamp` describe the *candidate*; if it is
    /// not value-numberable (`unique_key()` is `None`) this behaves exactly
    /// like `add`.
    pub fn unique(&mut self, op: NodeOp, stamp: Stamp) -> NodeId {
        match op.unique_key() {
            Some(key) => {
                if let Some(&existing) = self.unique_table.get(&key) {
                    debug_assert!(self.nodes[existing].is_alive());
                    return existing;
                }
                let id = self.add(op, stamp);
                self.unique_table.insert(key, id);
                id
            }
            None => self.add(op, stamp),
        }
    }

    /// After a node's shape changed in a way that affects its uniquing key
    /// (its inputs were rewritten), refresh the table entry so a later
    /// `unique()` call sees it. No-op for non-uniqueable kinds.
    pub(crate) fn reunique(&mut self, n: NodeId) {
        if let Some(key) = self.nodes[n].op.unique_key() {
            self.unique_table.insert(key, n);
        }
    }

    /// `replace_at_usages(old, new)`: for every `u ∈ usages(old)`, rewrite
    /// every input slot holding `old` to hold `new`; `old`'s usage set
    /// becomes empty. Does not delete `old` (callers typically follow with
    /// `safe_delete`/`remove_if_unused`).
    pub fn replace_at_usages(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let usages = std::mem::take(&mut self.nodes[old].usages);
        for u in &usages {
            self.rewrite_edges(*u, old, new);
        }
        // rewrite_edges already pushed `u` onto `new`'s usages for each
        // occurrence it found; `old`'s usage list stays empty.
        debug_assert!(self.nodes[old].usages.is_empty());
    }

    /// `replace_first_input(u, from, to)`: atomic edge swap maintaining
    /// both endpoints' bookkeeping, for exactly one edge out of `u`. If `u`
    /// names `from` more than once, only the first occurrence (in
    /// `op.for_each_input` order) is rewritten — callers needing "all
    /// occurrences" use `rewrite_edges`.
    pub fn replace_first_input(&mut self, u: NodeId, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let count = self.nodes[u].op.replace_input(from, to);
        debug_assert!(count >= 1, "{u:?} does not have {from:?} as an input");
        self.sync_inputs_after_edit(u, from, to, 1);
    }

    /// Rewrite every occurrence of `from` among `u`'s edges to `to`.
    fn rewrite_edges(&mut self, u: NodeId, from: NodeId, to: NodeId) {
        let count = self.nodes[u].op.replace_input(from, to);
        self.sync_inputs_after_edit(u, from, to, count);
    }

    fn sync_inputs_after_edit(&mut self, u: NodeId, from: NodeId, to: NodeId, count: usize) {
        if count == 0 {
            return;
        }
        let mut rebuilt = SmallVec::new();
        self.nodes[u].op.for_each_input(|id, ty| rebuilt.push((id, ty)));
        self.nodes[u].inputs = rebuilt;
        if let Some(data) = self.nodes.get_mut(from) {
            data.usages.retain(|&x| x != u);
        }
        for _ in 0..count {
            if let Some(data) = self.nodes.get_mut(to) {
                if !data.usages.contains(&u) {
                    data.usages.push(u);
                }
            }
        }
        self.reunique(u);
    }

    /// `safe_delete(n)`: requires `usages(n)` be empty; unlinks `n`'s
    /// inputs (removing itself from each input's usages) and marks `n`
    /// deleted.
    pub fn safe_delete(&mut self, n: NodeId) -> GraphResult<()> {
        if !self.nodes[n].usages.is_empty() {
            return Err(GraphError::new(
                "safe-delete-requires-no-usages",
                [n],
                format!("node still has {} usage(s)", self.nodes[n].usages.len()),
            ));
        }
        self.unlink_usages(n);
        self.nodes[n].inputs.clear();
        self.nodes[n].successors.clear();
        self.nodes[n].alive = false;
        Ok(())
    }

    /// Delete `n` if it has no usages, otherwise do nothing. Used by the
    /// canonicalizer tool's `remove_if_unused` (§4.4).
    pub fn remove_if_unused(&mut self, n: NodeId) -> bool {
        if self.nodes[n].is_alive() && self.nodes[n].usages.is_empty() {
            self.safe_delete(n).expect("usages checked above");
            true
        } else {
            false
        }
    }

    // -- fixed-flow helpers (§4.1) --------------------------------------

    /// Splice `new` in place of the `FixedWithNext` node `old`: `old`'s
    /// single successor becomes `new`'s successor, and whoever pointed at
    /// `old` as *their* successor now points at `new`. `old` is left
    /// unlinked from the control chain (still alive; callers typically
    /// `safe_delete` once its non-control usages are gone too).
    pub fn replace_fixed_with_fixed(&mut self, old: NodeId, new: NodeId) -> GraphResult<()> {
        let old_succs: SmallVec<[NodeId; 2]> = self.nodes[old].successors.clone();
        self.nodes[new].successors = old_succs;
        self.retarget_predecessor(old, new)?;
        self.nodes[old].successors.clear();
        Ok(())
    }

    /// Replace the fixed node `old` (a `FixedWithNext`) with a floating
    /// value node `new`: `old` is removed from the control chain (its
    /// predecessor's successor becomes `old`'s former successor) and every
    /// value usage of `old` is redirected to `new`.
    pub fn replace_fixed_with_floating(&mut self, old: NodeId, new: NodeId) -> GraphResult<()> {
        self.remove_fixed(old)?;
        self.replace_at_usages(old, new);
        Ok(())
    }

    /// Unlink the `FixedWithNext` node `old` from the control chain,
    /// connecting its predecessor directly to its successor.
    pub fn remove_fixed(&mut self, old: NodeId) -> GraphResult<()> {
        let mut succs = self.nodes[old].successors.clone();
        let next = succs.pop().ok_or_else(|| {
            GraphError::new("fixed-node-chain", [old], "remove_fixed on a node with no successor")
        })?;
        self.retarget_predecessor(old, next)?;
        self.nodes[old].successors.clear();
        Ok(())
    }

    /// Find whoever has `old` as a successor and rewrite it to `new`.
    fn retarget_predecessor(&mut self, old: NodeId, new: NodeId) -> GraphResult<()> {
        let pred = self
            .live_nodes()
            .find(|&id| self.nodes[id].successors.contains(&old));
        match pred {
            Some(pred) => {
                for s in self.nodes[pred].successors.iter_mut() {
                    if *s == old {
                        *s = new;
                    }
                }
                Ok(())
            }
            None if old == self.start => {
                self.start = new;
                Ok(())
            }
            None => Err(GraphError::new(
                "fixed-node-chain",
                [old],
                "node has no control predecessor to retarget",
            )),
        }
    }

    /// `remove_split(split, surviving_successor)`: collapse a
    /// `ControlSplit` down to its one surviving arm, deleting the other
    /// successor's unreached subtree (end-to-end scenario 1). Returns the
    /// set of nodes deleted, for the caller to enqueue usages of.
    pub fn remove_split(&mut self, split: NodeId, surviving_successor: NodeId) -> GraphResult<Vec<NodeId>> {
        let succs = self.nodes[split].successors.clone();
        let mut deleted = Vec::new();
        for s in succs {
            if s != surviving_successor {
                deleted.extend(self.delete_unreached_subtree(s)?);
            }
        }
        self.retarget_predecessor(split, surviving_successor)?;
        self.nodes[split].successors.clear();
        self.safe_delete(split).ok();
        Ok(deleted)
    }

    /// Delete a fixed subtree reachable only via control edges starting at
    /// `root` (a branch that just became provably unreachable). Floating
    /// nodes it used are left for the work list to `remove_if_unused`.
    ///
    /// Stops at any `Merge` the walk reaches that still has a forward end
    /// other than the one being deleted (the common "if/else reconverge"
    /// shape): the dead end is pruned out of the merge (and the matching
    /// phi operand) rather than the merge and everything past it being
    /// deleted too, which would wrongly discard code still reachable from
    /// the surviving branch.
    fn delete_unreached_subtree(&mut self, root: NodeId) -> GraphResult<Vec<NodeId>> {
        let mut deleted = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            if !self.nodes[n].is_alive() {
                continue;
            }
            let succs: SmallVec<[NodeId; 2]> = self.nodes[n].successors.clone();
            self.nodes[n].successors.clear();
            self.unlink_usages(n);
            self.nodes[n].inputs.clear();
            self.nodes[n].alive = false;
            deleted.push(n);
            for s in succs {
                if self.nodes[s].is_alive() && !self.detach_merge_end(s, n) {
                    stack.push(s);
                }
            }
        }
        Ok(deleted)
    }

    /// If `to` is a `Merge` with `from` among its forward ends, remove that
    /// end (and the corresponding operand of each phi hosted there) in
    /// place. Returns `true` when `to` is a merge that still has at least
    /// one other end left (the walk must not continue into it); `false`
    /// when `to` is not a merge, or is one whose last end this just
    /// removed (the walk should continue past it as usual).
    fn detach_merge_end(&mut self, to: NodeId, from: NodeId) -> bool {
        let idx = match &self.nodes[to].op {
            NodeOp::Merge(MergeData { ends, .. }) => match ends.iter().position(|&e| e == from) {
                Some(idx) => idx,
                None => return false,
            },
            _ => return false,
        };
        let phis = match &mut self.nodes[to].op {
            NodeOp::Merge(MergeData { ends, phis }) => {
                ends.remove(idx);
                phis.clone()
            }
            _ => unreachable!(),
        };
        for phi in phis {
            if let NodeOp::Phi(p) = &mut self.nodes[phi].op {
                if idx < p.values.len() {
                    p.values.remove(idx);
                }
            }
            self.refresh_inputs_cache(phi);
        }
        self.refresh_inputs_cache(to);
        match &self.nodes[to].op {
            NodeOp::Merge(MergeData { ends, .. }) => !ends.is_empty(),
            _ => false,
        }
    }

    /// Rebuild `n`'s cached `inputs` list from its current `op` after an
    /// in-place edit that didn't go through `replace_input` (e.g.
    /// `detach_merge_end` shrinking a `Vec` directly).
    fn refresh_inputs_cache(&mut self, n: NodeId) {
        let mut rebuilt = SmallVec::new();
        self.nodes[n].op.for_each_input(|id, ty| rebuilt.push((id, ty)));
        self.nodes[n].inputs = rebuilt;
    }

    /// Delete the fixed subtree rooted at `root` (a branch just proven
    /// unreachable). Public wrapper so `crate::canon`'s `FixedGuard`/`If`
    /// simplifications can kill a dead arm without reaching into private
    /// arena internals.
    pub fn kill_subtree(&mut self, root: NodeId) -> GraphResult<Vec<NodeId>> {
        self.delete_unreached_subtree(root)
    }

    /// Replace the fixed node `old` with the `ControlSink` `sink`: `sink`
    /// takes `old`'s place in the control chain (predecessor retargeted to
    /// `sink`), and `old`'s former successor subtree is killed as
    /// unreachable (§4.3 `FixedGuard`, end-to-end scenario 3: constant-false
    /// guard becomes an unconditional `Deoptimize`).
    pub fn replace_fixed_with_sink(&mut self, old: NodeId, sink: NodeId) -> GraphResult<Vec<NodeId>> {
        let mut succs = self.nodes[old].successors.clone();
        self.retarget_predecessor(old, sink)?;
        self.nodes[old].successors.clear();
        let mut deleted = Vec::new();
        for s in succs.drain(..) {
            deleted.extend(self.delete_unreached_subtree(s)?);
        }
        Ok(deleted)
    }

    /// Insert `new` (a `FixedWithNext`) immediately after the fixed node
    /// `anchor`, between it and its current successor.
    pub fn add_after_fixed(&mut self, anchor: NodeId, new: NodeId) -> GraphResult<()> {
        let next = self.nodes[anchor]
            .successors
            .first()
            .copied()
            .ok_or_else(|| GraphError::new("fixed-node-chain", [anchor], "no successor to splice after"))?;
        self.nodes[anchor].successors = SmallVec::from_elem(new, 1);
        self.nodes[new].successors = SmallVec::from_elem(next, 1);
        Ok(())
    }

    /// Insert `new` immediately before the fixed node `anchor`.
    pub fn add_before_fixed(&mut self, anchor: NodeId, new: NodeId) -> GraphResult<()> {
        self.retarget_predecessor(anchor, new)?;
        self.nodes[new].successors = SmallVec::from_elem(anchor, 1);
        Ok(())
    }

    /// `intrinsify(call, replacement)`: splice an intrinsic `replacement` in
    /// for the call node `call` (an `Invoke`/`InvokeWithException`), §4.3's
    /// call-target contract. The shape of `replacement` decides the
    /// splicing strategy: a `FixedWithNext` node replaces `call` in place
    /// in the control chain; a `ControlSink` (a `Deoptimize` included — it
    /// becomes unconditional) takes `call`'s slot and everything `call`
    /// used to reach is killed as unreachable; anything else is a floating
    /// value node, so `call` is removed from the control chain outright and
    /// its value usages are redirected to it. An `InvokeWithException`'s
    /// exception-dispatch arm is killed before the value-node case runs,
    /// since a plain value has nothing for it to dispatch to.
    pub fn intrinsify(&mut self, call: NodeId, replacement: NodeId) -> GraphResult<Vec<NodeId>> {
        if !matches!(self.nodes[call].op, NodeOp::Invoke(_) | NodeOp::InvokeWithException(_)) {
            return Err(GraphError::new(
                "intrinsify-requires-call",
                [call],
                "intrinsify target is not an Invoke/InvokeWithException",
            ));
        }
        let replacement_op = self.nodes[replacement].op.clone();
        if replacement_op.is_control_sink() {
            return self.replace_fixed_with_sink(call, replacement);
        }
        if replacement_op.is_fixed() {
            self.replace_fixed_with_fixed(call, replacement)?;
            return Ok(Vec::new());
        }
        let mut deleted = Vec::new();
        let succs: SmallVec<[NodeId; 2]> = self.nodes[call].successors.clone();
        if succs.len() > 1 {
            for extra in &succs[1..] {
                deleted.extend(self.delete_unreached_subtree(*extra)?);
            }
            self.nodes[call].successors.truncate(1);
        }
        self.replace_fixed_with_floating(call, replacement)?;
        Ok(deleted)
    }

    /// `reduce_trivial_merge`: a merge with exactly one forward end and no
    /// phis is redundant; splice it out of the control chain.
    pub fn reduce_trivial_merge(&mut self, merge: NodeId) -> GraphResult<bool> {
        let (ends, phis) = match &self.nodes[merge].op {
            NodeOp::Merge(MergeData { ends, phis }) => (ends.clone(), phis.clone()),
            _ => return Ok(false),
        };
        let has_live_phi = phis.iter().any(|&p| self.nodes[p].is_alive());
        if ends.len() != 1 || has_live_phi {
            return Ok(false);
        }
        self.remove_fixed(merge)?;
        self.safe_delete(merge).ok();
        Ok(true)
    }

    /// `reduce_degenerate_loop_begin`: a `LoopBegin` with no remaining
    /// `LoopEnd`s (every back edge was proven unreachable) degenerates to a
    /// plain `Begin`.
    pub fn reduce_degenerate_loop_begin(&mut self, loop_begin: NodeId) -> bool {
        let degenerate = matches!(
            &self.nodes[loop_begin].op,
            NodeOp::LoopBegin(d) if d.loop_ends.is_empty()
        );
        if degenerate {
            self.nodes[loop_begin].op = NodeOp::Begin(BeginData::default());
            true
        } else {
            false
        }
    }

    /// Recompute `n`'s stamp via `crate::canon::infer_stamp` and, if it
    /// changed, store it. Returns whether it changed (feeds the
    /// canonicalizer work list, §4.2).
    pub fn update_stamp(&mut self, n: NodeId, new: Stamp) -> bool {
        let old = self.nodes[n].stamp;
        if new == old {
            return false;
        }
        debug_assert!(
            new.join(&old) == new || !old.is_legal() || !new.is_legal(),
            "stamp inference must only narrow: {old} -> {new}"
        );
        self.nodes[n].stamp = new;
        true
    }

    pub fn set_stamp(&mut self, n: NodeId, stamp: Stamp) {
        self.nodes[n].stamp = stamp;
    }

    // -- construction-time raw linking (`crate::builder` only) ----------
    //
    // Every other mutation above assumes the control chain it is editing is
    // already well-formed (it is rewriting one). Building a fresh chain from
    // nothing needs one more primitive than "rewrite what's there": setting
    // a not-yet-linked fixed node's successor(s) for the first time. Kept
    // `pub(crate)` and restricted to linear, not-yet-linked nodes so it
    // can't be used to bypass `replace_fixed_with_fixed`/`add_after_fixed`
    // on a chain some other part of the graph already depends on.

    /// Link `succ` as `pred`'s only successor. `pred` must not already have
    /// one (builder-time use only; see module note above).
    pub(crate) fn link_successor(&mut self, pred: NodeId, succ: NodeId) {
        debug_assert!(
            self.nodes[pred].successors.is_empty(),
            "{pred:?} already has a successor; use add_after_fixed/replace_fixed_with_fixed instead"
        );
        self.nodes[pred].successors.push(succ);
    }

    /// Link a control split's (`If`, `InvokeWithException`) successor pair
    /// for the first time. `split` must not already have successors.
    pub(crate) fn link_split_successors(&mut self, split: NodeId, succs: [NodeId; 2]) {
        debug_assert!(
            self.nodes[split].successors.is_empty(),
            "{split:?} already has successors"
        );
        self.nodes[split].successors = SmallVec::from_iter(succs);
    }

    /// Raw, unchecked access to `n`'s successor list. Restricted to
    /// `crate::builder`'s `test_support` escape hatch for hand-wiring graphs
    /// in unit tests that need shapes `link_successor`/`link_split_successors`
    /// don't cover directly (e.g. wiring both arms of a diamond before either
    /// arm's merge exists). Never used by production rewrite code, which
    /// goes through the checked helpers above.
    pub(crate) fn raw_successors_mut(&mut self, n: NodeId) -> &mut SmallVec<[NodeId; 2]> {
        &mut self.nodes[n].successors
    }

    /// Check every invariant in §3.3 against the current graph state; see
    /// [`crate::verify::verify`] for the full list. A thin, discoverable
    /// entry point matching the `graph.verify()` call spec.md's testable
    /// properties are phrased against.
    pub fn verify(&self) -> GraphResult<()> {
        crate::verify::verify(self)
    }
}

impl std::fmt::Display for StructuredGraph {
    /// One line per live node, in arena order: id, kind, stamp, successors.
    /// Used by tests and `log::trace!` call sites that want to dump a whole
    /// graph rather than one node id, the same role `Function::display()`
    /// plays around `cranelift-codegen`'s pass pipeline.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph {:?} (stage {:?})", self.method, self.guards_stage)?;
        for n in self.live_nodes() {
            let data = &self.nodes[n];
            write!(f, "  {n:?} = {}", data.op.kind_name())?;
            let inputs: Vec<String> = data.inputs.iter().map(|(id, _)| format!("{id:?}")).collect();
            if !inputs.is_empty() {
                write!(f, "({})", inputs.join(", "))?;
            }
            write!(f, " : {}", data.stamp)?;
            if !data.successors.is_empty() {
                let succs: Vec<String> = data.successors.iter().map(|s| format!("{s:?}")).collect();
                write!(f, " -> {}", succs.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::config::CompilerConfig;
    use crate::node::control::DeoptimizeData;
    use crate::node::value::ConstantData;
    use crate::runtime::{DeoptAction, DeoptEncoding, DeoptReason, DeoptReasonValue, MethodHandle};
    use crate::stamp::Stamp;

    #[test]
    fn intrinsify_with_fixed_replacement_splices_in_place() {
        let mut g = StructuredGraph::new(MethodHandle(0), CompilerConfig::new());
        let mut b = GraphBuilder::new(&mut g);
        let arg = b.constant_int(32, true, 1);
        let call = b.invoke(MethodHandle(1), vec![arg], Stamp::for_integer(32, true, i64::MIN, i64::MAX));
        b.ret(Some(call));
        let replacement = g.add(NodeOp::Begin(Default::default()), Stamp::Void);
        g.intrinsify(call, replacement).unwrap();
        assert!(!matches!(g.op(g.start()), NodeOp::Invoke(_)));
        assert!(g.live_nodes().any(|n| matches!(g.op(n), NodeOp::Begin(_))));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn intrinsify_with_sink_kills_the_rest_of_the_chain() {
        let mut g = StructuredGraph::new(MethodHandle(0), CompilerConfig::new());
        let mut b = GraphBuilder::new(&mut g);
        let arg = b.constant_int(32, true, 1);
        let call = b.invoke(MethodHandle(1), vec![arg], Stamp::Void);
        let trailing = b.constant_int(32, true, 7);
        b.ret(Some(trailing));
        let reason = DeoptReasonValue::encode(DeoptAction::None, DeoptReason::UnreachedCode, 0, &DeoptEncoding::default());
        let deopt = g.add(NodeOp::Deoptimize(DeoptimizeData { reason, frame_state: None.into() }), Stamp::Void);
        g.intrinsify(call, deopt).unwrap();
        assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Invoke(_) | NodeOp::Return(_))));
        assert!(g.live_nodes().any(|n| matches!(g.op(n), NodeOp::Deoptimize(_))));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn intrinsify_with_value_node_drops_call_and_exception_arm() {
        let mut g = StructuredGraph::new(MethodHandle(0), CompilerConfig::new());
        let mut b = GraphBuilder::new(&mut g);
        let arg = b.constant_int(32, true, 1);
        let stamp = Stamp::for_integer(32, true, i64::MIN, i64::MAX);
        let (call, normal, exceptional) = b.invoke_with_exception(MethodHandle(1), vec![arg], stamp.clone());
        b.set_cursor(normal);
        let folded = b.constant_int(32, true, 42);
        b.ret(Some(folded));
        b.set_cursor(exceptional);
        let exn = b.constant_null();
        b.unwind(exn);
        let replacement = g.unique(NodeOp::Constant(ConstantData::Int { bits: 32, signed: true, value: 42 }), stamp);
        g.intrinsify(call, replacement).unwrap();
        assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Invoke(_) | NodeOp::InvokeWithException(_))));
        assert!(g.live_nodes().all(|n| !matches!(g.op(n), NodeOp::Unwind(_))));
        assert!(g.verify().is_ok());
    }

    #[test]
    fn intrinsify_rejects_non_call_target() {
        let mut g = StructuredGraph::new(MethodHandle(0), CompilerConfig::new());
        let mut b = GraphBuilder::new(&mut g);
        let c = b.constant_int(32, true, 1);
        b.ret(Some(c));
        let replacement = g.add(NodeOp::Begin(Default::default()), Stamp::Void);
        assert!(g.intrinsify(g.start(), replacement).is_err());
    }
}
