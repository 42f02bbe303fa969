//! Error taxonomy (§7).
//!
//! Two independent failure families: a [`GraphError`] is always a bug (an
//! invariant from §3.3 was violated) and is fatal to the current
//! compilation; a [`Bailout`] is an expected, recoverable "don't compile
//! this (yet)" outcome the host falls back to the interpreter on. Neither
//! crosses a `panic!`: both are returned, never thrown, all the way up to
//! the driver in `crate::canon`/`crate::lowering`, matching the "no stateful
//! recovery inside a rewrite" propagation policy in §7.
//!
//! `graphir` writes these by hand rather than deriving them with `thiserror`,
//! the same minimal-dependency stance `cranelift-codegen` takes for its own
//! `CodegenError`.

use crate::entities::NodeId;
use std::fmt;

/// A violated invariant from §3.3, detected by [`crate::verify`].
#[derive(Debug, Clone)]
pub struct GraphError {
    /// Name of the violated invariant, e.g. `"edge-consistency"`,
    /// `"fixed-node-chain"`, `"phi-arity"`.
    pub invariant: &'static str,
    /// The node(s) implicated in the violation, for diagnostics.
    pub nodes: Vec<NodeId>,
    pub detail: String,
}

impl GraphError {
    pub fn new(invariant: &'static str, nodes: impl IntoIterator<Item = NodeId>, detail: impl Into<String>) -> Self {
        let nodes = nodes.into_iter().collect();
        let err = Self {
            invariant,
            nodes,
            detail: detail.into(),
        };
        log::error!(
            "graph verification failed: invariant `{}` violated at {:?}: {}",
            err.invariant,
            err.nodes,
            err.detail
        );
        err
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invariant `{}` violated at {:?}: {}",
            self.invariant, self.nodes, self.detail
        )
    }
}

impl std::error::Error for GraphError {}

/// Why a bailout happened (§7 "Bailout").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BailoutReason {
    /// The frontend or a rewrite encountered a bytecode/graph pattern this
    /// compiler tier does not (yet) support.
    UnsupportedPattern,
    /// The canonicalizer/lowering work list did not reach a fixed point
    /// within the configured rewrite budget.
    RewriteBudgetExhausted,
    /// An `Assumptions` fact this compile depended on was invalidated while
    /// the compile was still running.
    AssumptionInvalidated,
    /// A `MetaAccess`/`ProfilingInfo` query came back unresolved and the
    /// caller had no safe fallback.
    UnresolvedRuntimeQuery,
    /// The host's `CancelToken` fired.
    Cancelled,
}

impl fmt::Display for BailoutReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BailoutReason::UnsupportedPattern => "unsupported pattern",
            BailoutReason::RewriteBudgetExhausted => "rewrite budget exhausted",
            BailoutReason::AssumptionInvalidated => "assumption invalidated",
            BailoutReason::UnresolvedRuntimeQuery => "unresolved runtime query",
            BailoutReason::Cancelled => "compilation cancelled",
        };
        f.write_str(s)
    }
}

/// A recoverable "do not compile this method (this way), fall back to the
/// interpreter" outcome (§7).
#[derive(Debug, Clone)]
pub struct Bailout {
    pub reason: BailoutReason,
    pub message: String,
}

impl Bailout {
    pub fn new(reason: BailoutReason, message: impl Into<String>) -> Self {
        let message = message.into();
        log::debug!("bailing out: {reason}: {message}");
        Self { reason, message }
    }
}

impl fmt::Display for Bailout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "bailout ({}): {}", self.reason, self.message)
    }
}

impl std::error::Error for Bailout {}

/// The union of everything a compilation step can fail with.
#[derive(Debug)]
pub enum CompileError {
    Graph(GraphError),
    Bailout(Bailout),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompileError::Graph(e) => write!(f, "verification failure: {e}"),
            CompileError::Bailout(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<GraphError> for CompileError {
    fn from(e: GraphError) -> Self {
        CompileError::Graph(e)
    }
}

impl From<Bailout> for CompileError {
    fn from(e: Bailout) -> Self {
        CompileError::Bailout(e)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type GraphResult<T> = Result<T, GraphError>;
