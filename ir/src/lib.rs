//! Sea-of-nodes intermediate representation and canonicalization/lowering
//! core for an optimizing JIT compiler targeting a managed,
//! exception-throwing, object-oriented bytecode language.
//!
//! `graphir` owns the graph arena (`crate::graph`), the closed node taxonomy
//! (`crate::node`), the stamp/type lattice (`crate::stamp`), the
//! canonicalizer/simplifier fixed-point engine (`crate::canon`), the staged
//! lowering and guard lifecycle (`crate::lowering`), dominance
//! (`crate::dominator`), invariant verification (`crate::verify`), and a
//! minimal graph builder (`crate::builder`) for constructing graphs by hand.
//! Bytecode parsing, runtime metadata/profiling providers, and back-end code
//! generation are out of scope: this crate only defines the trait seams
//! (`crate::runtime`) those external components implement or consume.

pub mod assumptions;
pub mod builder;
pub mod canon;
pub mod config;
pub mod dominator;
pub mod entities;
pub mod error;
pub mod graph;
pub mod lowering;
pub mod node;
pub mod runtime;
pub mod stamp;
pub mod timing;
pub mod verify;

pub use crate::config::{AllowAssumptions, CompilerConfig, GuardsStageStart};
pub use crate::error::{Bailout, BailoutReason, CompileError, CompileResult, GraphError, GraphResult};
pub use crate::graph::StructuredGraph;
pub use crate::lowering::GuardsStage;

/// Version of this crate, for diagnostics and crash reports (mirrors
/// `cranelift_codegen::VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
