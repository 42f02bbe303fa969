//! Shared helpers for the end-to-end canonicalization tests (spec §8).
//!
//! Mirrors how `cranelift-filetests` factors its common run-to-fixpoint
//! plumbing out of individual `.clif` test cases: one place to build a
//! graph and drive it to a fixed point, so each scenario test only states
//! the shape it builds and the shape it expects.

use graphir::builder::GraphBuilder;
use graphir::config::CompilerConfig;
use graphir::runtime::{MethodHandle, NeverCancel};
use graphir::{canon::Canonicalizer, StructuredGraph};

pub fn fresh_graph() -> StructuredGraph {
    let _ = env_logger::builder().is_test(true).try_init();
    StructuredGraph::new(MethodHandle(0), CompilerConfig::new())
}

pub fn run_to_fixpoint(graph: &mut StructuredGraph) {
    Canonicalizer::new(&NeverCancel)
        .run_to_fixpoint(graph)
        .expect("canonicalizer should converge on these small test graphs");
}

pub fn build<F>(f: F) -> StructuredGraph
where
    F: FnOnce(&mut GraphBuilder),
{
    let mut graph = fresh_graph();
    {
        let mut b = GraphBuilder::new(&mut graph);
        f(&mut b);
    }
    graph
}
