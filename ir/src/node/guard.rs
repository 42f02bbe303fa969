//! Guards and deoptimization points (§3.2, §4.3 `FixedGuard`, `GuardNode`).

use crate::entities::NodeId;
use crate::runtime::DeoptReasonValue;
use graphir_entity::PackedOption;

/// `FixedGuard`: a fixed-node guard that deoptimizes if its condition
/// fails (§4.3). Like `Deoptimize`, a `FixedGuard` can deoptimize
/// (`NodeOp::can_deoptimize`), so once the graph reaches `AFTER_FSA` it
/// owns its frame state directly rather than through the nearest
/// preceding state-split (invariant 4, §3.3).
#[derive(Clone, Debug)]
pub struct FixedGuardData {
    pub condition: NodeId,
    pub reason: DeoptReasonValue,
    pub negated: bool,
    pub speculation_invalidates: bool,
    pub frame_state: PackedOption<NodeId>,
}

/// `GuardNode`: a floating guard anchored by a guarding-node edge
/// (invariant 8, §4.3). Carries its own `frame_state` past `AFTER_FSA` for
/// the same reason `FixedGuard` does.
#[derive(Clone, Debug)]
pub struct GuardNodeData {
    pub condition: NodeId,
    pub reason: DeoptReasonValue,
    pub negated: bool,
    /// The node (an `AbstractBegin` or `ValueAnchor`) this guard's
    /// scheduling is anchored below. Must dominate every use of this guard.
    pub anchor: NodeId,
    pub frame_state: PackedOption<NodeId>,
}

/// `ConditionAnchor`: pre-`FIXED_DEOPTS` placeholder that lowers to a fixed
/// guard plus a `ValueAnchor` once floating guards are no longer allowed
/// (§4.5).
#[derive(Clone, Debug)]
pub struct ConditionAnchorData {
    pub condition: NodeId,
    pub negated: bool,
}

/// `ValueAnchor`: a fixed node with no runtime effect other than pinning
/// its input's scheduling at this control-flow point; the lowered form of
/// `ConditionAnchor` and the anchor a lowered `GuardNode` attaches to
/// (§4.5).
#[derive(Clone, Debug)]
pub struct ValueAnchorData {
    pub value: PackedOption<NodeId>,
}
