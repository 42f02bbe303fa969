//! External interfaces consumed by this crate (§6.1) and produced for the
//! back end (§6.2).
//!
//! Everything in this module is a trait or a plain data type describing a
//! *contract*; `graphir` never implements `MetaAccess`, `ProfilingInfo`, or
//! `LoweringProvider` itself; those live in the bytecode-parser/runtime and
//! back-end crates this one hands off to, which are out of scope (§1).

use crate::entities::NodeId;
use crate::error::GraphResult;
use crate::graph::StructuredGraph;
use crate::lowering::GuardsStage;
use crate::stamp::{Stamp, TypeHandle};
use std::fmt;

/// An opaque handle to a resolved or unresolved method, as reported by
/// `MetaAccess`. `graphir` never looks inside it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodHandle(pub u32);

/// An opaque handle to a resolved or unresolved field.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldHandle(pub u32);

/// A bytecode index, or one of the special sentinels used when inlining
/// substitutes the caller's frame state for a callee node's (§4.3
/// `FrameState`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Bci {
    At(u32),
    Before,
    After,
    AfterException,
    Unknown,
    Invalid,
}

/// Resolve classes/fields/methods; encode/decode deoptimization reason
/// values (§6.1).
pub trait MetaAccess {
    fn resolve_type(&self, name: &str) -> Option<TypeHandle>;
    fn resolve_field(&self, owner: TypeHandle, name: &str) -> Option<FieldHandle>;
    fn resolve_method(&self, owner: TypeHandle, name: &str, signature: &str) -> Option<MethodHandle>;

    /// Encode `(action, reason, debug_id)` into the single 32-bit value
    /// carried by `Deoptimize`/`FixedGuard` nodes.
    fn encode_deopt_reason(&self, action: DeoptAction, reason: DeoptReason, debug_id: u32) -> u32 {
        DeoptReasonValue::encode(action, reason, debug_id, &DeoptEncoding::default()).0
    }

    /// The inverse of `encode_deopt_reason`.
    fn decode_deopt_reason(&self, value: u32) -> (DeoptAction, DeoptReason, u32) {
        DeoptReasonValue(value).decode(&DeoptEncoding::default())
    }
}

/// Whether a value has been observed to be null, non-null, both, or
/// neither, at a given program point.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Tristate {
    Never,
    Always,
    Unknown,
}

/// A single entry of a per-BCI type profile.
#[derive(Clone, Debug)]
pub struct TypeProbability {
    pub ty: TypeHandle,
    pub probability: f64,
}

/// Per-BCI type and branch profiles (§6.1).
pub trait ProfilingInfo {
    fn null_seen(&self, bci: u32) -> Tristate;
    fn type_profile(&self, bci: u32) -> Vec<TypeProbability>;
    /// Probability \[0.0, 1.0\] that the branch at `bci` is taken.
    fn branch_taken_probability(&self, bci: u32) -> Option<f64>;
    fn branch_taken_count(&self, bci: u32) -> Option<u64>;
    fn branch_not_taken_count(&self, bci: u32) -> Option<u64>;
}

/// Handles node-specific lowering at a guards-stage boundary (§6.1, §4.5).
/// `crate::lowering`'s stage-transition phases call into this for any node
/// whose lowering depends on runtime-provided policy (e.g. which specific
/// sequence of fixed nodes a given memory access lowers to), while
/// stage-shape-only rewrites (`ConditionAnchor` -> `ValueAnchor`,
/// `GuardNode` anchoring) are handled directly by `crate::lowering` since
/// they are runtime-independent.
pub trait LoweringProvider {
    fn lower_at_stage(
        &self,
        graph: &mut StructuredGraph,
        node: NodeId,
        stage: GuardsStage,
    ) -> GraphResult<()>;
}

/// An optimistic fact recorded during compilation (§3.1, §6.1). Represented
/// here as the data payload; the owning set lives in `crate::assumptions`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssumptionFact {
    /// `method` has no overriding subclass as of this compile.
    LeafMethod(MethodHandle),
    /// `ty` currently has exactly one concrete (instantiable) subtype,
    /// `unique_subtype`.
    UniqueConcreteSubtype {
        ty: TypeHandle,
        unique_subtype: TypeHandle,
    },
    /// `ty` currently has no subtype implementing `finalize()`.
    NoFinalizableSubclass(TypeHandle),
}

/// Record, merge, and invalidate optimistic assumptions against the
/// runtime's live class hierarchy (§6.1). The graph-local bookkeeping these
/// calls are backed by is `crate::assumptions::AssumptionSet`; this trait is
/// the seam to the runtime's global invalidation machinery (e.g. a class
/// hierarchy analysis that calls back into the compiler when a fact a
/// running compilation depends on stops holding).
pub trait Assumptions {
    /// Register interest in `fact` continuing to hold; returns `false` if
    /// the runtime already knows it does not (in which case the caller
    /// must bail out rather than record it).
    fn record(&mut self, fact: AssumptionFact) -> bool;
}

/// Polled between canonicalizer/lowering work-list iterations (§5). The
/// default implementation never cancels.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// A `CancelToken` that never fires, for callers (and tests) with no host
/// cancellation mechanism to wire up.
#[derive(Copy, Clone, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// What a deoptimization should do to the compiled method once control
/// returns to the interpreter.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum DeoptAction {
    None = 0,
    RecompileIfTooManyDeopts = 1,
    InvalidateReprofile = 2,
    InvalidateRecompile = 3,
    InvalidateStopCompiling = 4,
}

impl DeoptAction {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => DeoptAction::None,
            1 => DeoptAction::RecompileIfTooManyDeopts,
            2 => DeoptAction::InvalidateReprofile,
            3 => DeoptAction::InvalidateRecompile,
            _ => DeoptAction::InvalidateStopCompiling,
        }
    }
}

/// Why a deoptimization happened.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum DeoptReason {
    None = 0,
    NullCheckException = 1,
    BoundsCheckException = 2,
    ClassCastException = 3,
    ArrayStoreException = 4,
    ArithmeticException = 5,
    UnreachedCode = 6,
    TypeCheckedInliningViolated = 7,
    OptimizedTypeCheckViolated = 8,
    NotCompiledExceptionHandler = 9,
    Unresolved = 10,
    TransferToInterpreter = 11,
}

impl DeoptReason {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => DeoptReason::None,
            1 => DeoptReason::NullCheckException,
            2 => DeoptReason::BoundsCheckException,
            3 => DeoptReason::ClassCastException,
            4 => DeoptReason::ArrayStoreException,
            5 => DeoptReason::ArithmeticException,
            6 => DeoptReason::UnreachedCode,
            7 => DeoptReason::TypeCheckedInliningViolated,
            8 => DeoptReason::OptimizedTypeCheckViolated,
            9 => DeoptReason::NotCompiledExceptionHandler,
            10 => DeoptReason::Unresolved,
            _ => DeoptReason::TransferToInterpreter,
        }
    }
}

/// Field widths for the `[sign | debug_id | reason | action]` bit layout
/// (§6.1). Resolved as an Open Question in DESIGN.md: since spec.md leaves
/// the widths to "config" without specifying them, `graphir` fixes them as
/// a `Default` `DeoptEncoding` rather than making them a free runtime
/// parameter, because the layout must be stable across a single
/// compilation's encode/decode round trips and there is no requirement that
/// different compilations in the same process disagree on it.
#[derive(Copy, Clone, Debug)]
pub struct DeoptEncoding {
    pub action_bits: u8,
    pub reason_bits: u8,
    pub debug_id_bits: u8,
}

impl Default for DeoptEncoding {
    fn default() -> Self {
        // 1 sign bit + 22 debug-id bits + 5 reason bits + 4 action bits = 32.
        Self {
            action_bits: 4,
            reason_bits: 5,
            debug_id_bits: 22,
        }
    }
}

/// A packed `(action, reason, debug_id)` 32-bit value (§6.1).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DeoptReasonValue(pub u32);

impl DeoptReasonValue {
    pub fn encode(
        action: DeoptAction,
        reason: DeoptReason,
        debug_id: u32,
        layout: &DeoptEncoding,
    ) -> Self {
        let action_bits = action as u32;
        let reason_bits = reason as u32;
        let debug_id_mask = (1u32 << layout.debug_id_bits) - 1;
        let debug_id_bits = debug_id & debug_id_mask;

        let mut value = action_bits;
        value |= reason_bits << layout.action_bits;
        value |= debug_id_bits << (layout.action_bits + layout.reason_bits);
        // Sign bit is the top bit, always 0: these values are never
        // negative, but the layout reserves it so the value round-trips
        // through signed-32-bit storage (e.g. a Java `int` field) without
        // becoming negative for any reason/debug-id combination in range.
        debug_assert_eq!(
            layout.action_bits as u32 + layout.reason_bits as u32 + layout.debug_id_bits as u32,
            31
        );
        Self(value)
    }

    pub fn decode(self, layout: &DeoptEncoding) -> (DeoptAction, DeoptReason, u32) {
        let action_mask = (1u32 << layout.action_bits) - 1;
        let reason_mask = (1u32 << layout.reason_bits) - 1;
        let debug_id_mask = (1u32 << layout.debug_id_bits) - 1;

        let action = DeoptAction::from_bits(self.0 & action_mask);
        let reason =
            DeoptReason::from_bits((self.0 >> layout.action_bits) & reason_mask);
        let debug_id = (self.0 >> (layout.action_bits + layout.reason_bits)) & debug_id_mask;
        (action, reason, debug_id)
    }
}

impl fmt::Display for DeoptReasonValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (action, reason, debug_id) = self.decode(&DeoptEncoding::default());
        write!(f, "{action:?}/{reason:?}#{debug_id}")
    }
}

/// The per-node contract handed to the back end (§6.2): final stamp,
/// topologically-ordered inputs, frame state, and node-kind selector. This
/// is produced by a scheduler external to this crate's in-scope
/// responsibilities; `graphir` exposes the fields a scheduler needs to
/// assemble one per node via `StructuredGraph`'s public accessors rather
/// than materializing this struct itself.
#[derive(Clone, Debug)]
pub struct CodeGenHandoff {
    pub node: NodeId,
    pub stamp: Stamp,
    pub inputs: Vec<NodeId>,
    pub frame_state: Option<NodeId>,
}
