//! The closed node taxonomy (§3.2, §4.3): the tagged-variant `NodeOp`, and
//! the structural/behavioral classification every component above the
//! arena (canonicalizer, lowering driver, verifier, scheduler hand-off)
//! dispatches on.
//!
//! Per the "Polymorphism over the node closed set" design note, this is
//! modeled as a tagged variant (`NodeOp`) rather than a class hierarchy:
//! per-kind data is a plain record (the `*Data` structs in the sibling
//! modules) and rewrite hooks are implemented as `match` arms over the tag
//! in `crate::canon` and `crate::lowering` — a jump table the compiler
//! builds for us, which is what a hand-populated vtable would have bought
//! at the cost of `unsafe`.

pub mod control;
pub mod framestate;
pub mod guard;
pub mod memory;
pub mod phi;
pub mod value;

use crate::entities::{NodeId, UsageType};
use control::*;
use framestate::*;
use guard::*;
use memory::*;
use phi::*;
use value::*;

/// The full set of concrete node kinds (§3.2).
#[derive(Clone, Debug)]
pub enum NodeOp {
    Start(StartData),
    Return(ReturnData),
    Unwind(UnwindData),
    Deoptimize(DeoptimizeData),
    If(IfData),
    Begin(BeginData),
    LoopBegin(LoopBeginData),
    LoopEnd(LoopEndData),
    LoopExit(LoopExitData),
    Merge(MergeData),

    Constant(ConstantData),
    UnaryOp(UnaryOpData),
    BinaryOp(BinaryOpData),
    Compare(CompareData),
    LogicNegation(LogicNegationData),
    Conditional(ConditionalData),
    InstanceOf(InstanceOfData),
    IsNull(IsNullData),
    Phi(PhiData),
    ValueProxy(ValueProxyData),
    Pi(PiData),

    FixedGuard(FixedGuardData),
    GuardNode(GuardNodeData),
    ConditionAnchor(ConditionAnchorData),
    ValueAnchor(ValueAnchorData),

    MemoryRead(MemoryAccessData),
    MemoryWrite(MemoryAccessData),
    CallTarget(CallTargetData),
    Invoke(InvokeData),
    InvokeWithException(InvokeWithExceptionData),
    Allocate(AllocateData),
    MonitorEnter(MonitorData),
    MonitorExit(MonitorData),

    FrameState(FrameStateData),
    SimpleInfopoint(InfopointData),
    FullInfopoint(InfopointData),
}

/// A key uniquely identifying a pure, value-numberable node's shape, used
/// by `StructuredGraph::unique` (§4.1 "Uniquing"). Per the Open Question in
/// §9 ("the exact hashing key ... is not spelled out"), this crate resolves
/// it as keying on `(tag, inputs, immediates)` only — *not* the node's
/// stamp — documented in `DESIGN.md`. Only nodes `NodeOp::unique_key`
/// returns `Some` for participate in uniquing; everything else is always
/// freshly allocated.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    Constant(ConstantData),
    UnaryOp(value::UnaryOpKind, NodeId),
    BinaryOp(value::BinaryOpKind, NodeId, NodeId),
    Compare(value::CompareKind, NodeId, NodeId),
    LogicNegation(NodeId),
    InstanceOf(crate::stamp::TypeHandle, NodeId, bool),
    IsNull(NodeId),
}

impl NodeOp {
    /// Short, stable name for diagnostics/`Display` (§9.2 verify pretty
    /// printer, error messages).
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeOp::Start(_) => "Start",
            NodeOp::Return(_) => "Return",
            NodeOp::Unwind(_) => "Unwind",
            NodeOp::Deoptimize(_) => "Deoptimize",
            NodeOp::If(_) => "If",
            NodeOp::Begin(_) => "Begin",
            NodeOp::LoopBegin(_) => "LoopBegin",
            NodeOp::LoopEnd(_) => "LoopEnd",
            NodeOp::LoopExit(_) => "LoopExit",
            NodeOp::Merge(_) => "Merge",
            NodeOp::Constant(_) => "Constant",
            NodeOp::UnaryOp(_) => "UnaryOp",
            NodeOp::BinaryOp(_) => "BinaryOp",
            NodeOp::Compare(_) => "Compare",
            NodeOp::LogicNegation(_) => "LogicNegation",
            NodeOp::Conditional(_) => "Conditional",
            NodeOp::InstanceOf(_) => "InstanceOf",
            NodeOp::IsNull(_) => "IsNull",
            NodeOp::Phi(_) => "Phi",
            NodeOp::ValueProxy(_) => "ValueProxy",
            NodeOp::Pi(_) => "Pi",
            NodeOp::FixedGuard(_) => "FixedGuard",
            NodeOp::GuardNode(_) => "GuardNode",
            NodeOp::ConditionAnchor(_) => "ConditionAnchor",
            NodeOp::ValueAnchor(_) => "ValueAnchor",
            NodeOp::MemoryRead(_) => "MemoryRead",
            NodeOp::MemoryWrite(_) => "MemoryWrite",
            NodeOp::CallTarget(_) => "CallTarget",
            NodeOp::Invoke(_) => "Invoke",
            NodeOp::InvokeWithException(_) => "InvokeWithException",
            NodeOp::Allocate(_) => "Allocate",
            NodeOp::MonitorEnter(_) => "MonitorEnter",
            NodeOp::MonitorExit(_) => "MonitorExit",
            NodeOp::FrameState(_) => "FrameState",
            NodeOp::SimpleInfopoint(_) => "SimpleInfopoint",
            NodeOp::FullInfopoint(_) => "FullInfopoint",
        }
    }

    // -- structural classification (§3.2) -----------------------------

    /// A floating node: not pinned to a point in control flow: the
    /// scheduler places it. Everything else is fixed.
    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            NodeOp::Constant(_)
                | NodeOp::UnaryOp(_)
                | NodeOp::BinaryOp(_)
                | NodeOp::Compare(_)
                | NodeOp::LogicNegation(_)
                | NodeOp::Conditional(_)
                | NodeOp::InstanceOf(_)
                | NodeOp::IsNull(_)
                | NodeOp::Phi(_)
                | NodeOp::ValueProxy(_)
                | NodeOp::Pi(_)
                | NodeOp::GuardNode(_)
        )
    }

    pub fn is_fixed(&self) -> bool {
        !self.is_floating()
    }

    /// `ControlSink`: no successor.
    pub fn is_control_sink(&self) -> bool {
        matches!(
            self,
            NodeOp::Return(_) | NodeOp::Unwind(_) | NodeOp::Deoptimize(_)
        )
    }

    /// `ControlSplit`: exactly one predecessor, >=2 successors.
    pub fn is_control_split(&self) -> bool {
        matches!(self, NodeOp::If(_) | NodeOp::InvokeWithException(_))
    }

    pub fn is_begin(&self) -> bool {
        matches!(
            self,
            NodeOp::Start(_) | NodeOp::Begin(_) | NodeOp::LoopBegin(_)
        )
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, NodeOp::Merge(_) | NodeOp::LoopBegin(_))
    }

    pub fn is_loop_begin(&self) -> bool {
        matches!(self, NodeOp::LoopBegin(_))
    }

    pub fn is_loop_end(&self) -> bool {
        matches!(self, NodeOp::LoopEnd(_))
    }

    pub fn is_loop_exit(&self) -> bool {
        matches!(self, NodeOp::LoopExit(_))
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, NodeOp::Phi(_))
    }

    /// Produces a runtime value consumers may read (has a meaningful stamp
    /// beyond `Stamp::Void`/`Stamp::DependencyOnly`).
    pub fn produces_value(&self) -> bool {
        matches!(
            self,
            NodeOp::Constant(_)
                | NodeOp::UnaryOp(_)
                | NodeOp::BinaryOp(_)
                | NodeOp::Compare(_)
                | NodeOp::LogicNegation(_)
                | NodeOp::Conditional(_)
                | NodeOp::InstanceOf(_)
                | NodeOp::IsNull(_)
                | NodeOp::Phi(_)
                | NodeOp::ValueProxy(_)
                | NodeOp::Pi(_)
                | NodeOp::MemoryRead(_)
                | NodeOp::Invoke(_)
                | NodeOp::InvokeWithException(_)
                | NodeOp::Allocate(_)
        )
    }

    /// A state-split (§3.3 invariant 4): while pre-`AFTER_FSA`, owns at
    /// most one frame state directly.
    pub fn is_state_split(&self) -> bool {
        matches!(
            self,
            NodeOp::MemoryRead(_)
                | NodeOp::MemoryWrite(_)
                | NodeOp::Invoke(_)
                | NodeOp::InvokeWithException(_)
                | NodeOp::Allocate(_)
                | NodeOp::MonitorEnter(_)
                | NodeOp::MonitorExit(_)
                | NodeOp::Deoptimize(_)
        )
    }

    /// May transfer control to the interpreter via deoptimization.
    pub fn can_deoptimize(&self) -> bool {
        matches!(
            self,
            NodeOp::FixedGuard(_)
                | NodeOp::GuardNode(_)
                | NodeOp::Deoptimize(_)
                | NodeOp::Invoke(_)
                | NodeOp::InvokeWithException(_)
                | NodeOp::Allocate(_)
        )
    }

    pub fn touches_memory(&self) -> bool {
        matches!(
            self,
            NodeOp::MemoryRead(_)
                | NodeOp::MemoryWrite(_)
                | NodeOp::Invoke(_)
                | NodeOp::InvokeWithException(_)
                | NodeOp::Allocate(_)
                | NodeOp::MonitorEnter(_)
                | NodeOp::MonitorExit(_)
        )
    }

    /// A safepoint: the runtime may observe GC/deopt state here (out of
    /// scope to implement GC itself, but the flag is part of the
    /// code-generator hand-off contract, §6.2).
    pub fn is_safepoint(&self) -> bool {
        matches!(
            self,
            NodeOp::Invoke(_)
                | NodeOp::InvokeWithException(_)
                | NodeOp::LoopEnd(_)
                | NodeOp::FullInfopoint(_)
        )
    }

    pub fn is_guard(&self) -> bool {
        matches!(self, NodeOp::FixedGuard(_) | NodeOp::GuardNode(_))
    }

    // -- edge reflection ------------------------------------------------

    /// Visit every input edge this node's payload carries, in a stable
    /// order, alongside its usage type. This is the hand-rolled substitute
    /// for Graal's `@Input`-annotation reflection: the one place a node's
    /// edges are enumerated for the generic arena bookkeeping
    /// (`StructuredGraph::add`/`replace_first_input`/`replace_at_usages`).
    pub fn for_each_input(&self, mut f: impl FnMut(NodeId, UsageType)) {
        use UsageType::*;
        match self {
            NodeOp::Start(_) | NodeOp::Begin(_) => {}
            NodeOp::Return(d) => {
                if let Some(v) = d.value.expand() {
                    f(v, Value);
                }
            }
            NodeOp::Unwind(d) => f(d.exception, Value),
            NodeOp::Deoptimize(d) => {
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::If(d) => f(d.condition, Condition),
            NodeOp::LoopBegin(d) => {
                for &e in &d.loop_ends {
                    f(e, Association);
                }
            }
            NodeOp::LoopEnd(d) => f(d.loop_begin, Association),
            NodeOp::LoopExit(d) => f(d.loop_begin, Association),
            NodeOp::Merge(d) => {
                for &e in &d.ends {
                    f(e, Association);
                }
            }
            NodeOp::Constant(_) => {}
            NodeOp::UnaryOp(d) => f(d.input, Value),
            NodeOp::BinaryOp(d) => {
                f(d.lhs, Value);
                f(d.rhs, Value);
            }
            NodeOp::Compare(d) => {
                f(d.lhs, Value);
                f(d.rhs, Value);
            }
            NodeOp::LogicNegation(d) => f(d.input, Value),
            NodeOp::Conditional(d) => {
                f(d.condition, Condition);
                f(d.true_value, Value);
                f(d.false_value, Value);
            }
            NodeOp::InstanceOf(d) => f(d.object, Value),
            NodeOp::IsNull(d) => f(d.object, Value),
            NodeOp::Phi(d) => {
                f(d.merge, Association);
                for &v in &d.values {
                    f(v, Value);
                }
            }
            NodeOp::ValueProxy(d) => {
                f(d.value, Value);
                f(d.proxy_point, Association);
            }
            NodeOp::Pi(d) => {
                f(d.value, Value);
                if let Some(g) = d.guard.expand() {
                    f(g, Guard);
                }
            }
            NodeOp::FixedGuard(d) => {
                f(d.condition, Condition);
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::GuardNode(d) => {
                f(d.condition, Condition);
                f(d.anchor, Anchor);
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::ConditionAnchor(d) => f(d.condition, Condition),
            NodeOp::ValueAnchor(d) => {
                if let Some(v) = d.value.expand() {
                    f(v, Value);
                }
            }
            NodeOp::MemoryRead(d) | NodeOp::MemoryWrite(d) => {
                f(d.object, Value);
                if let Some(v) = d.value.expand() {
                    f(v, Value);
                }
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::CallTarget(d) => {
                for &a in &d.arguments {
                    f(a, Value);
                }
            }
            NodeOp::Invoke(d) => {
                f(d.call_target, Extension);
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::InvokeWithException(d) => {
                f(d.base.call_target, Extension);
                if let Some(fs) = d.base.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::Allocate(d) => {
                if let Some(len) = d.array_length.expand() {
                    f(len, Value);
                }
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::MonitorEnter(d) | NodeOp::MonitorExit(d) => {
                f(d.object, Value);
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
            NodeOp::FrameState(d) => {
                for l in &d.locals {
                    if let Some(v) = l.expand() {
                        f(v, Value);
                    }
                }
                for &v in &d.stack {
                    f(v, Value);
                }
                for &v in &d.locks {
                    f(v, Value);
                }
                if let Some(outer) = d.outer_frame_state.expand() {
                    f(outer, State);
                }
            }
            NodeOp::SimpleInfopoint(d) | NodeOp::FullInfopoint(d) => {
                if let Some(fs) = d.frame_state.expand() {
                    f(fs, State);
                }
            }
        }
    }

    /// Collects `for_each_input` into a `Vec`, for callers that need random
    /// access or a count rather than a visitor.
    pub fn inputs_vec(&self) -> Vec<(NodeId, UsageType)> {
        let mut v = Vec::new();
        self.for_each_input(|id, ty| v.push((id, ty)));
        v
    }

    /// Rewrite every occurrence of `from` among this payload's edges to
    /// `to`. Returns how many occurrences were rewritten (0 means `from`
    /// was not actually one of this node's edges; callers treat that as a
    /// logic error).
    pub fn replace_input(&mut self, from: NodeId, to: NodeId) -> usize {
        let mut count = 0;
        macro_rules! sw {
            ($slot:expr) => {
                if $slot == from {
                    $slot = to;
                    count += 1;
                }
            };
        }
        macro_rules! sw_opt {
            ($slot:expr) => {
                if $slot.expand() == Some(from) {
                    $slot = Some(to).into();
                    count += 1;
                }
            };
        }
        macro_rules! sw_vec {
            ($slot:expr) => {
                for v in $slot.iter_mut() {
                    if *v == from {
                        *v = to;
                        count += 1;
                    }
                }
            };
        }
        macro_rules! sw_opt_vec {
            ($slot:expr) => {
                for v in $slot.iter_mut() {
                    if v.expand() == Some(from) {
                        *v = Some(to).into();
                        count += 1;
                    }
                }
            };
        }
        match self {
            NodeOp::Start(_) | NodeOp::Begin(_) => {}
            NodeOp::Return(d) => sw_opt!(d.value),
            NodeOp::Unwind(d) => sw!(d.exception),
            NodeOp::Deoptimize(d) => sw_opt!(d.frame_state),
            NodeOp::If(d) => sw!(d.condition),
            NodeOp::LoopBegin(d) => sw_vec!(d.loop_ends),
            NodeOp::LoopEnd(d) => sw!(d.loop_begin),
            NodeOp::LoopExit(d) => sw!(d.loop_begin),
            NodeOp::Merge(d) => sw_vec!(d.ends),
            NodeOp::Constant(_) => {}
            NodeOp::UnaryOp(d) => sw!(d.input),
            NodeOp::BinaryOp(d) => {
                sw!(d.lhs);
                sw!(d.rhs);
            }
            NodeOp::Compare(d) => {
                sw!(d.lhs);
                sw!(d.rhs);
            }
            NodeOp::LogicNegation(d) => sw!(d.input),
            NodeOp::Conditional(d) => {
                sw!(d.condition);
                sw!(d.true_value);
                sw!(d.false_value);
            }
            NodeOp::InstanceOf(d) => sw!(d.object),
            NodeOp::IsNull(d) => sw!(d.object),
            NodeOp::Phi(d) => {
                sw!(d.merge);
                sw_vec!(d.values);
            }
            NodeOp::ValueProxy(d) => {
                sw!(d.value);
                sw!(d.proxy_point);
            }
            NodeOp::Pi(d) => {
                sw!(d.value);
                sw_opt!(d.guard);
            }
            NodeOp::FixedGuard(d) => {
                sw!(d.condition);
                sw_opt!(d.frame_state);
            }
            NodeOp::GuardNode(d) => {
                sw!(d.condition);
                sw!(d.anchor);
                sw_opt!(d.frame_state);
            }
            NodeOp::ConditionAnchor(d) => sw!(d.condition),
            NodeOp::ValueAnchor(d) => sw_opt!(d.value),
            NodeOp::MemoryRead(d) | NodeOp::MemoryWrite(d) => {
                sw!(d.object);
                sw_opt!(d.value);
                sw_opt!(d.frame_state);
            }
            NodeOp::CallTarget(d) => sw_vec!(d.arguments),
            NodeOp::Invoke(d) => {
                sw!(d.call_target);
                sw_opt!(d.frame_state);
            }
            NodeOp::InvokeWithException(d) => {
                sw!(d.base.call_target);
                sw_opt!(d.base.frame_state);
            }
            NodeOp::Allocate(d) => {
                sw_opt!(d.array_length);
                sw_opt!(d.frame_state);
            }
            NodeOp::MonitorEnter(d) | NodeOp::MonitorExit(d) => {
                sw!(d.object);
                sw_opt!(d.frame_state);
            }
            NodeOp::FrameState(d) => {
                sw_opt_vec!(d.locals);
                sw_vec!(d.stack);
                sw_vec!(d.locks);
                sw_opt!(d.outer_frame_state);
            }
            NodeOp::SimpleInfopoint(d) | NodeOp::FullInfopoint(d) => sw_opt!(d.frame_state),
        }
        count
    }

    /// The uniquing key for this node, or `None` if this kind is never
    /// value-numbered (§4.1 "Uniquing", §9 Open Questions item 2).
    pub fn unique_key(&self) -> Option<UniqueKey> {
        match self {
            NodeOp::Constant(c) => Some(UniqueKey::Constant(*c)),
            NodeOp::UnaryOp(d) => Some(UniqueKey::UnaryOp(d.kind, d.input)),
            NodeOp::BinaryOp(d) => Some(UniqueKey::BinaryOp(d.kind, d.lhs, d.rhs)),
            NodeOp::Compare(d) => Some(UniqueKey::Compare(d.kind, d.lhs, d.rhs)),
            NodeOp::LogicNegation(d) => Some(UniqueKey::LogicNegation(d.input)),
            NodeOp::InstanceOf(d) => Some(UniqueKey::InstanceOf(d.ty, d.object, d.negated)),
            NodeOp::IsNull(d) => Some(UniqueKey::IsNull(d.object)),
            _ => None,
        }
    }
}
