//! Floating, value-producing nodes: constants, arithmetic/logic, compares,
//! type tests, and the `Conditional` (select) node (§3.2).
//!
//! Every data type in this module that is value-numberable and pure
//! (everything except `ConditionalData`, which is floating but not folded
//! into the uniquing table here because it rarely recurs identically) also
//! derives `Eq`/`Hash` so `crate::graph::StructuredGraph::unique` can key on
//! it directly.

use crate::entities::NodeId;
use crate::stamp::TypeHandle;

/// A constant value (§3.2 "Value-producing floating nodes", §4.3
/// `Constant`). Stored as raw bits rather than as a `Stamp` so the value
/// itself participates in uniquing independent of how precisely its stamp
/// happens to be expressed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConstantData {
    Int { bits: u8, signed: bool, value: i64 },
    Float { bits: u8, value_bits: u64 },
    Null,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOpKind {
    Neg,
    Not,
    /// Widen/narrow/change signedness between two integer widths.
    IntConvert { to_bits: u8, to_signed: bool },
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct UnaryOpData {
    pub kind: UnaryOpKind,
    pub input: NodeId,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    ShrSigned,
    ShrUnsigned,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BinaryOpData {
    pub kind: BinaryOpKind,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CompareKind {
    Eq,
    Ne,
    LessSigned,
    LessEqSigned,
    LessUnsigned,
    LessEqUnsigned,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CompareData {
    pub kind: CompareKind,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

/// Negates a logic-typed (boolean-stamped) input. `canonical` folds double
/// negation and pushes the negation into a `Compare`'s kind when possible;
/// `FixedGuard`/`GuardNode` strip it into their own `negated` flag (§4.3).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct LogicNegationData {
    pub input: NodeId,
}

/// `Conditional` (select): materializes one of two values based on a logic
/// condition, without branching (§4.3 `If`, end-to-end scenario 4).
#[derive(Clone, Debug)]
pub struct ConditionalData {
    pub condition: NodeId,
    pub true_value: NodeId,
    pub false_value: NodeId,
}

/// `instanceof`-style dynamic type test.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct InstanceOfData {
    pub object: NodeId,
    pub ty: TypeHandle,
    pub negated: bool,
}

/// A null check, expressed as its own node rather than an `InstanceOf`
/// since the runtime never resolves a type for it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct IsNullData {
    pub object: NodeId,
}

impl ConstantData {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstantData::Int { value, .. } => Some(*value),
            _ => None,
        }
    }
}
