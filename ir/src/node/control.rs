//! Control-flow node payloads: sinks, splits, begin/merge family, loops
//! (§3.2, §4.3).

use crate::entities::NodeId;
use crate::runtime::DeoptReasonValue;
use graphir_entity::PackedOption;

/// `If`: a control split with exactly two successors (§4.3 `If`).
#[derive(Clone, Debug)]
pub struct IfData {
    pub condition: NodeId,
    /// Probability \[0.0, 1.0\] of taking the true (first) successor.
    pub true_probability: f64,
    /// Set once a probability-based successor swap (§4.3 `If`, §4.4
    /// tie-breaks) has been attempted for this node, so the rewrite does
    /// not oscillate (§9 "Work-list convergence").
    pub considered_for_swap: bool,
}

impl IfData {
    pub fn new(condition: NodeId, true_probability: f64) -> Self {
        Self {
            condition,
            true_probability: true_probability.clamp(0.0, 1.0),
            considered_for_swap: false,
        }
    }
}

/// `Start`: the graph's unique, predecessor-less entry point (§3.1
/// "Graph"). Carries no payload of its own.
#[derive(Clone, Debug, Default)]
pub struct StartData;

/// `AbstractBegin`/`LoopBegin`: the marker at a split successor or loop
/// header (§3.2). Carries no payload of its own; its guard/anchor usages
/// (§3.3 invariant 3, §4.3 `AbstractBegin`) are tracked the normal way,
/// through the node's generic `usages` list — `canon::simplify_begin`
/// filters that list directly when evacuating them.
#[derive(Clone, Debug, Default)]
pub struct BeginData;

/// `LoopBegin`: merges the loop's forward entry with its back-edges
/// (`LoopEnd`s).
#[derive(Clone, Debug, Default)]
pub struct LoopBeginData {
    pub base: BeginData,
    /// The `LoopEnd`s that are this loop's back-edges, in the order they
    /// were added (matches phi arity ordering, invariant 6).
    pub loop_ends: Vec<NodeId>,
}

/// `LoopEnd`: a loop's back-edge predecessor of its `LoopBegin`.
#[derive(Clone, Debug)]
pub struct LoopEndData {
    pub loop_begin: NodeId,
}

/// `LoopExit`: the proxy point for values defined inside a loop and used
/// outside it (§3.3 invariant 7).
#[derive(Clone, Debug)]
pub struct LoopExitData {
    pub loop_begin: NodeId,
}

/// `AbstractMerge`: joins `k` forward ends; hosts phis keyed by
/// `(merge, index)` (§3.1, invariant 6).
#[derive(Clone, Debug, Default)]
pub struct MergeData {
    /// Forward-end predecessors, in the order that determines phi operand
    /// order (invariant 6).
    pub ends: Vec<NodeId>,
    /// Phis hosted at this merge, in index order.
    pub phis: Vec<NodeId>,
}

/// `Deoptimize`: an unconditional control sink that abandons compiled
/// execution (glossary "Deoptimize").
#[derive(Clone, Debug)]
pub struct DeoptimizeData {
    pub reason: DeoptReasonValue,
    /// Frame state to materialize an interpreter frame from. `None` before
    /// `AFTER_FSA` when the owning state-split's frame state is used
    /// instead (§3.3 invariant 4); `Some` from `AFTER_FSA` on.
    pub frame_state: PackedOption<NodeId>,
}

/// `Return`: a control sink with an optional return value.
#[derive(Clone, Debug)]
pub struct ReturnData {
    pub value: PackedOption<NodeId>,
}

/// `Unwind`: a control sink propagating an in-flight exception.
#[derive(Clone, Debug)]
pub struct UnwindData {
    pub exception: NodeId,
}
