//! `FrameState` and infopoints (§3.1 "FrameState", §4.3 `FrameState`).

use crate::entities::{NodeId, VirtualObjectId};
use crate::runtime::{Bci, MethodHandle};
use graphir_entity::PackedOption;

/// An abstract-interpretation snapshot the runtime materializes an
/// interpreter frame from at deoptimization. Immutable with respect to its
/// values once constructed; `duplicate`/`duplicate_modified` build a new
/// node rather than mutating this one.
#[derive(Clone, Debug)]
pub struct FrameStateData {
    pub method: MethodHandle,
    pub bci: Bci,
    pub locals: Vec<PackedOption<NodeId>>,
    pub stack: Vec<NodeId>,
    pub locks: Vec<NodeId>,
    pub outer_frame_state: PackedOption<NodeId>,
    pub rethrow_exception: bool,
    pub during_call: bool,
    pub virtual_object_mappings: Vec<VirtualObjectId>,
}

impl FrameStateData {
    pub fn new(method: MethodHandle, bci: Bci) -> Self {
        Self {
            method,
            bci,
            locals: Vec::new(),
            stack: Vec::new(),
            locks: Vec::new(),
            outer_frame_state: PackedOption::none(),
            rethrow_exception: false,
            during_call: false,
            virtual_object_mappings: Vec::new(),
        }
    }

    /// Every value input this frame state references, in a stable order
    /// (locals, then stack, then locks, then the outer frame state if any).
    /// Used both to wire up the node's generic `inputs` list and by
    /// `duplicate`.
    pub fn value_inputs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.locals
            .iter()
            .filter_map(|l| l.expand())
            .chain(self.stack.iter().copied())
            .chain(self.locks.iter().copied())
            .chain(self.outer_frame_state.expand())
    }

    /// Structural duplication with a new bci and, optionally, a rethrow
    /// flag flip and a replacement of the top `pop_kind` stack slots with
    /// `pushed` (§4.3 `FrameState.duplicate_modified`).
    pub fn duplicate_modified(
        &self,
        new_bci: Bci,
        rethrow_exception: Option<bool>,
        pop_count: usize,
        pushed: &[NodeId],
    ) -> Self {
        let mut stack = self.stack.clone();
        let keep = stack.len().saturating_sub(pop_count);
        stack.truncate(keep);
        stack.extend_from_slice(pushed);
        Self {
            method: self.method,
            bci: new_bci,
            locals: self.locals.clone(),
            stack,
            locks: self.locks.clone(),
            outer_frame_state: self.outer_frame_state,
            rethrow_exception: rethrow_exception.unwrap_or(self.rethrow_exception),
            during_call: self.during_call,
            virtual_object_mappings: self.virtual_object_mappings.clone(),
        }
    }

    pub fn duplicate(&self) -> Self {
        self.duplicate_modified(self.bci, None, 0, &[])
    }
}

impl PartialEq for FrameStateData {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.bci == other.bci
            && self.locals == other.locals
            && self.stack == other.stack
            && self.locks == other.locks
            && self.outer_frame_state == other.outer_frame_state
            && self.rethrow_exception == other.rethrow_exception
            && self.during_call == other.during_call
            && self.virtual_object_mappings == other.virtual_object_mappings
    }
}

/// `SimpleInfopoint` / `FullInfopoint`: non-deoptimizing debug-info anchors
/// that may still own a frame state while `guards_stage` allows it.
#[derive(Clone, Debug)]
pub struct InfopointData {
    pub frame_state: PackedOption<NodeId>,
}
