//! Arena index types.
//!
//! Mirrors `cranelift-codegen::ir::entities`: every kind of thing a node can
//! point at gets its own newtype around a dense `u32` index, so that (for
//! example) a `NodeId` can never be accidentally used where a
//! `VirtualObjectId` was expected, while staying `Copy` and cheap to store
//! in edge lists.

use graphir_entity::entity_impl;
use std::fmt;

/// A reference to a node in a [`StructuredGraph`](crate::graph::StructuredGraph).
///
/// Stable for the lifetime of the graph: ids are never reused, even after
/// the node they named is deleted (the arena only ever grows; see
/// `graphir::graph` module docs on why deleted slots are tombstoned rather
/// than reclaimed mid-compilation).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
entity_impl!(NodeId, "n");

/// A reference to a virtual-object mapping recorded in a [`FrameState`](crate::node::framestate::FrameState).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualObjectId(u32);
entity_impl!(VirtualObjectId, "vobj");

/// A reference to a recorded [`Assumption`](crate::assumptions::Assumption).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssumptionId(u32);
entity_impl!(AssumptionId, "assume");

/// A reference to an inlined method recorded for provenance (§3.1).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InlinedMethodId(u32);
entity_impl!(InlinedMethodId, "inlined");

/// The usage type of an input edge (§3.1): the closed set of reasons one
/// node may name another as an input. Node-class edge schemas (§4.3 item 1)
/// declare which of these their input slots accept.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UsageType {
    /// An ordinary data dependency: the input's runtime value is consumed.
    Value,
    /// A reference to a `FrameState` used for deoptimization.
    State,
    /// A reference to a guard (`GuardNode` or `FixedGuard`) this node
    /// depends on not having fired.
    Guard,
    /// A reference to an `AbstractBegin`/`ValueAnchor` this node is pinned
    /// below in control flow without being a direct control successor.
    Anchor,
    /// A logic-typed condition input (e.g. on `If`, `FixedGuard`).
    Condition,
    /// A structural association that does not gate scheduling (e.g. a
    /// `Phi`'s merge, a `ValueProxy`'s proxy point).
    Association,
    /// A node-kind-specific extension edge (e.g. `Invoke`'s call-target
    /// child) that does not fit the other categories.
    Extension,
    /// A dependency on the abstract memory state preceding this node.
    Memory,
}
