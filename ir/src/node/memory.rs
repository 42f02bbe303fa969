//! Memory-effectful fixed nodes: reads/writes, invokes, allocation, monitor
//! enter/exit, barriers (§3.2).

use crate::entities::NodeId;
use crate::runtime::{FieldHandle, MethodHandle};
use graphir_entity::PackedOption;

/// A field or array-element memory location.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemoryLocation {
    Field(FieldHandle),
    ArrayElement,
    /// Any location may be touched; used conservatively by nodes whose
    /// precise footprint is not tracked (e.g. before alias analysis has
    /// run).
    Any,
}

/// Shared payload of field/array reads and writes.
#[derive(Clone, Debug)]
pub struct MemoryAccessData {
    pub object: NodeId,
    pub location: MemoryLocation,
    /// Present on writes; absent on reads.
    pub value: PackedOption<NodeId>,
    pub frame_state: PackedOption<NodeId>,
}

/// A call target child carried by `Invoke`/`InvokeWithException` (§3.2
/// "Call targets").
#[derive(Clone, Debug)]
pub struct CallTargetData {
    pub method: MethodHandle,
    pub arguments: Vec<NodeId>,
}

/// `Invoke`: a state-split, possibly-deoptimizing, memory-touching call
/// with no explicit exception edge (§4.3).
#[derive(Clone, Debug)]
pub struct InvokeData {
    pub call_target: NodeId,
    pub frame_state: PackedOption<NodeId>,
}

/// `InvokeWithException`: additionally a control split, with a
/// distinguished exception-dispatch successor and a default normal-edge
/// probability of `1 - 1e-5` (§4.3).
#[derive(Clone, Debug)]
pub struct InvokeWithExceptionData {
    pub base: InvokeData,
    pub normal_probability: f64,
}

impl InvokeWithExceptionData {
    pub const DEFAULT_NORMAL_PROBABILITY: f64 = 1.0 - 1e-5;

    pub fn new(call_target: NodeId) -> Self {
        Self {
            base: InvokeData {
                call_target,
                frame_state: PackedOption::none(),
            },
            normal_probability: Self::DEFAULT_NORMAL_PROBABILITY,
        }
    }
}

/// `Allocate`: object/array allocation.
#[derive(Clone, Debug)]
pub struct AllocateData {
    pub type_handle: crate::stamp::TypeHandle,
    /// `Some` for array allocations.
    pub array_length: PackedOption<NodeId>,
    pub frame_state: PackedOption<NodeId>,
}

/// `MonitorEnter` / `MonitorExit`: lock acquisition/release.
#[derive(Clone, Debug)]
pub struct MonitorData {
    pub object: NodeId,
    pub lock_depth: u32,
    pub frame_state: PackedOption<NodeId>,
}
