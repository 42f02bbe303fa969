//! Data-flow join and loop-boundary nodes: `Phi`, `ValueProxy`, `Pi` (§3.2).

use crate::entities::NodeId;
use graphir_entity::PackedOption;

/// `Phi`: selects a value by which forward end of `merge` control arrived
/// (invariant 6: arity must equal the merge's forward-end count, in the
/// same order).
#[derive(Clone, Debug)]
pub struct PhiData {
    pub merge: NodeId,
    pub values: Vec<NodeId>,
}

/// `ValueProxy`: the loop-exit projection of a value defined inside a loop
/// and used outside it (invariant 7). `proxy_point` is always a `LoopExit`
/// while `has_value_proxies` holds.
#[derive(Clone, Debug)]
pub struct ValueProxyData {
    pub value: NodeId,
    pub proxy_point: NodeId,
}

/// `Pi`: re-binds `value` under a refined stamp (carried as the owning
/// node's own `stamp` field), anchored so it may not float above `guard`
/// (invariant 8). `guard` is `None` only transiently, during construction.
#[derive(Clone, Debug)]
pub struct PiData {
    pub value: NodeId,
    pub guard: PackedOption<NodeId>,
}
