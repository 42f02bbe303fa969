//! A minimal graph builder for hand-constructing graphs in tests (§8).
//!
//! `StructuredGraph`'s own API is edit-oriented: `add`, `replace_fixed_with_fixed`,
//! `add_after_fixed` all assume a chain that already exists and is being
//! rewritten in place. Building one from nothing needs a cursor that
//! remembers "the last fixed node appended" the way a textual assembler
//! remembers its current basic block; that's all `GraphBuilder` is,
//! grounded on the append-only builder `cranelift-codegen`'s `FunctionBuilder`
//! (cranelift-frontend) provides over the lower-level `Function`/`DataFlowGraph`
//! editing API.

use crate::entities::NodeId;
use crate::graph::StructuredGraph;
use crate::node::control::{
    BeginData, IfData, LoopBeginData, LoopEndData, LoopExitData, MergeData, ReturnData, UnwindData,
};
use crate::node::guard::{FixedGuardData, GuardNodeData};
use crate::node::phi::PhiData;
use crate::node::value::{
    BinaryOpData, BinaryOpKind, CompareData, CompareKind, ConstantData, UnaryOpData, UnaryOpKind,
};
use crate::node::NodeOp;
use crate::runtime::DeoptReasonValue;
use crate::stamp::Stamp;
use smallvec::SmallVec;

/// Appends fixed nodes one after another from a cursor, and allocates
/// floating nodes as plain, unattached values. Not used by any rewrite in
/// `crate::canon`/`crate::lowering` — those always edit an existing graph
/// through `StructuredGraph`'s own checked methods.
pub struct GraphBuilder<'g> {
    graph: &'g mut StructuredGraph,
    cursor: NodeId,
}

impl<'g> GraphBuilder<'g> {
    /// Start appending from the graph's `Start` node.
    pub fn new(graph: &'g mut StructuredGraph) -> Self {
        let cursor = graph.start();
        Self { graph, cursor }
    }

    /// Move the append cursor, e.g. to continue building down one arm of a
    /// diamond after `if_split`.
    pub fn set_cursor(&mut self, at: NodeId) {
        self.cursor = at;
    }

    pub fn cursor(&self) -> NodeId {
        self.cursor
    }

    pub fn graph(&self) -> &StructuredGraph {
        self.graph
    }

    pub fn graph_mut(&mut self) -> &mut StructuredGraph {
        self.graph
    }

    /// Append `n` (already allocated) after the cursor as the sole
    /// successor, and move the cursor to it.
    fn append(&mut self, n: NodeId) {
        self.graph.link_successor(self.cursor, n);
        self.cursor = n;
    }

    /// Allocate a node without touching the control chain (floating value
    /// nodes, or fixed nodes the caller will link up itself, e.g. the two
    /// arms of an `If`).
    pub fn add_raw(&mut self, op: NodeOp, stamp: Stamp) -> NodeId {
        self.graph.add(op, stamp)
    }

    // -- floating value nodes ---------------------------------------------

    pub fn constant_int(&mut self, bits: u8, signed: bool, value: i64) -> NodeId {
        self.graph.unique(
            NodeOp::Constant(ConstantData::Int { bits, signed, value }),
            Stamp::for_int_constant(bits, signed, value),
        )
    }

    pub fn constant_null(&mut self) -> NodeId {
        self.graph.unique(
            NodeOp::Constant(ConstantData::Null),
            Stamp::Object(crate::stamp::ObjectStamp::null()),
        )
    }

    pub fn unary(&mut self, kind: UnaryOpKind, input: NodeId, stamp: Stamp) -> NodeId {
        self.graph.unique(NodeOp::UnaryOp(UnaryOpData { kind, input }), stamp)
    }

    pub fn binary(&mut self, kind: BinaryOpKind, lhs: NodeId, rhs: NodeId, stamp: Stamp) -> NodeId {
        self.graph.unique(NodeOp::BinaryOp(BinaryOpData { kind, lhs, rhs }), stamp)
    }

    /// A boolean-stamped compare; the `bool`-shaped `IntegerStamp` it folds
    /// to (§4.3 `Compare`, §8 scenario 2/3/6's starting condition nodes).
    pub fn compare(&mut self, kind: CompareKind, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.unique(NodeOp::Compare(CompareData { kind, lhs, rhs }), bool_stamp())
    }

    /// `merge` is either a `Merge` or a `LoopBegin` (both host phis, §3.1);
    /// only `Merge` additionally tracks its phi list inline.
    pub fn phi(&mut self, merge: NodeId, values: Vec<NodeId>) -> NodeId {
        let n = self.graph.add(NodeOp::Phi(PhiData { merge, values }), Stamp::Illegal);
        if let NodeOp::Merge(MergeData { phis, .. }) = self.graph.op_mut(merge) {
            phis.push(n);
        }
        n
    }

    // -- fixed (control) nodes ----------------------------------------------

    pub fn begin(&mut self) -> NodeId {
        let n = self.graph.add(NodeOp::Begin(BeginData::default()), Stamp::Void);
        self.append(n);
        n
    }

    /// Append an `If` at the cursor, returning `(if_node, true_begin,
    /// false_begin)` with both begins already wired as its successors. The
    /// cursor is left at `if_node`'s position; callers must `set_cursor`
    /// into one of the two begins to keep building either arm.
    pub fn if_split(&mut self, condition: NodeId, true_probability: f64) -> (NodeId, NodeId, NodeId) {
        let split = self.graph.add(NodeOp::If(IfData::new(condition, true_probability)), Stamp::Void);
        self.graph.link_successor(self.cursor, split);
        let true_begin = self.graph.add(NodeOp::Begin(BeginData::default()), Stamp::Void);
        let false_begin = self.graph.add(NodeOp::Begin(BeginData::default()), Stamp::Void);
        self.graph.link_split_successors(split, [true_begin, false_begin]);
        self.cursor = split;
        (split, true_begin, false_begin)
    }

    /// Join `ends` (one cursor position per forward branch) into a fresh
    /// `Merge`, linking every end's successor to it, and move the cursor
    /// there.
    pub fn merge(&mut self, ends: Vec<NodeId>) -> NodeId {
        let n = self.graph.add(NodeOp::Merge(MergeData { ends: ends.clone(), phis: vec![] }), Stamp::Void);
        for end in ends {
            self.graph.link_successor(end, n);
        }
        self.cursor = n;
        n
    }

    /// Open a loop header at the cursor; the caller later closes the loop
    /// with [`Self::loop_end`] once the body has been built.
    pub fn loop_begin(&mut self) -> NodeId {
        let n = self.graph.add(
            NodeOp::LoopBegin(LoopBeginData { base: BeginData::default(), loop_ends: vec![] }),
            Stamp::Void,
        );
        self.append(n);
        n
    }

    /// Close the loop whose header is `loop_begin`: append a `LoopEnd` at
    /// the cursor and register it as one of the header's back-edges (phi
    /// arity order, invariant 6).
    pub fn loop_end(&mut self, loop_begin: NodeId) -> NodeId {
        let n = self.graph.add(NodeOp::LoopEnd(LoopEndData { loop_begin }), Stamp::Void);
        self.append(n);
        if let NodeOp::LoopBegin(d) = self.graph.op_mut(loop_begin) {
            d.loop_ends.push(n);
        }
        n
    }

    pub fn loop_exit(&mut self, loop_begin: NodeId) -> NodeId {
        let n = self.graph.add(NodeOp::LoopExit(LoopExitData { loop_begin }), Stamp::Void);
        self.append(n);
        n
    }

    pub fn fixed_guard(&mut self, condition: NodeId, reason: DeoptReasonValue, negated: bool) -> NodeId {
        let n = self.graph.add(
            NodeOp::FixedGuard(FixedGuardData {
                condition,
                reason,
                negated,
                speculation_invalidates: true,
                frame_state: graphir_entity::PackedOption::none(),
            }),
            Stamp::Void,
        );
        self.append(n);
        n
    }

    /// A floating `GuardNode`, anchored to `anchor` (must dominate every
    /// use per invariant 8); not part of the control chain.
    pub fn guard_node(&mut self, condition: NodeId, reason: DeoptReasonValue, negated: bool, anchor: NodeId) -> NodeId {
        self.graph.add(
            NodeOp::GuardNode(GuardNodeData {
                condition,
                reason,
                negated,
                anchor,
                frame_state: graphir_entity::PackedOption::none(),
            }),
            Stamp::DependencyOnly,
        )
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        let n = self.graph.add(NodeOp::Return(ReturnData { value: value.into() }), Stamp::Void);
        self.append(n);
        n
    }

    pub fn unwind(&mut self, exception: NodeId) -> NodeId {
        let n = self.graph.add(NodeOp::Unwind(UnwindData { exception }), Stamp::Void);
        self.append(n);
        n
    }

    /// Append an `Invoke`: a state-split call with no exception edge.
    pub fn invoke(&mut self, method: crate::runtime::MethodHandle, arguments: Vec<NodeId>, stamp: Stamp) -> NodeId {
        let call_target = self.graph.add(
            NodeOp::CallTarget(crate::node::memory::CallTargetData { method, arguments }),
            Stamp::DependencyOnly,
        );
        let n = self.graph.add(
            NodeOp::Invoke(crate::node::memory::InvokeData {
                call_target,
                frame_state: None.into(),
            }),
            stamp,
        );
        self.append(n);
        n
    }

    /// Append an `InvokeWithException`: additionally a control split, with
    /// `true_successor`/`false_successor` left for the caller to wire the
    /// normal/exception-dispatch arms the way `if_split` does for `If`.
    pub fn invoke_with_exception(
        &mut self,
        method: crate::runtime::MethodHandle,
        arguments: Vec<NodeId>,
        stamp: Stamp,
    ) -> (NodeId, NodeId, NodeId) {
        let call_target = self.graph.add(
            NodeOp::CallTarget(crate::node::memory::CallTargetData { method, arguments }),
            Stamp::DependencyOnly,
        );
        let n = self.graph.add(
            NodeOp::InvokeWithException(crate::node::memory::InvokeWithExceptionData::new(call_target)),
            stamp,
        );
        self.graph.link_successor(self.cursor, n);
        let normal = self.graph.add(NodeOp::Begin(BeginData::default()), Stamp::Void);
        let exceptional = self.graph.add(NodeOp::Begin(BeginData::default()), Stamp::Void);
        self.graph.link_split_successors(n, [normal, exceptional]);
        self.cursor = n;
        (n, normal, exceptional)
    }

    /// Append a `MemoryRead` with no inferred stamp of its own (unlike the
    /// pure value nodes above, nothing in `crate::canon` re-derives a
    /// `MemoryRead`'s stamp from its inputs, so this is the one value-
    /// producing node in the taxonomy a test can use to stand in for a
    /// genuinely unknown runtime value that never folds away).
    pub fn memory_read(&mut self, object: NodeId, location: crate::node::memory::MemoryLocation, stamp: Stamp) -> NodeId {
        let n = self.graph.add(
            NodeOp::MemoryRead(crate::node::memory::MemoryAccessData {
                object,
                location,
                value: None.into(),
                frame_state: None.into(),
            }),
            stamp,
        );
        self.append(n);
        n
    }
}

fn bool_stamp() -> Stamp {
    Stamp::for_integer(1, false, 0, 1)
}

/// Escape hatch for tests that must wire a shape the checked append/merge
/// helpers above don't cover (e.g. linking both arms of a diamond before
/// the merge that joins them exists). Never used by `GraphBuilder` itself
/// or any production rewrite; see `StructuredGraph::raw_successors_mut`.
pub mod test_support {
    use super::*;

    pub fn successors_mut(graph: &mut StructuredGraph, n: NodeId) -> &mut SmallVec<[NodeId; 2]> {
        graph.raw_successors_mut(n)
    }
}
