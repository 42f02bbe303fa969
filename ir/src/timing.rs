//! Pass-timing scopes.
//!
//! Grounded on `cranelift-codegen`'s `default_profiler.rs` (`timing.rs`
//! itself isn't in this tree, but the profiler that plugs into it is): each
//! pass/phase wraps its body in a guard object returned by one of the
//! functions below, the way `DefaultTimingToken` wraps a pass there; the
//! guard records elapsed wall-clock time into a thread-local table on drop
//! instead of restoring a LIFO-nested previous pass, since this crate's
//! passes never overlap. Follows the same "zero-cost when not inspected,
//! RAII-scoped" shape so the canonicalizer/lowering driver reads the same
//! way `Context::compile`'s pass pipeline does.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{Duration, Instant};

thread_local! {
    static TOTALS: RefCell<HashMap<&'static str, Duration>> = RefCell::new(HashMap::new());
}

/// An RAII guard that, on drop, adds the elapsed time since it was created
/// to the named pass's running total.
#[must_use]
pub struct PassTimer {
    name: &'static str,
    start: Instant,
}

impl Drop for PassTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        TOTALS.with(|t| {
            *t.borrow_mut().entry(self.name).or_insert(Duration::ZERO) += elapsed;
        });
        log::trace!("pass `{}` took {:?}", self.name, elapsed);
    }
}

fn start(name: &'static str) -> PassTimer {
    PassTimer {
        name,
        start: Instant::now(),
    }
}

/// Time spent in the canonicalizer/simplifier fixed-point loop (`crate::canon`).
pub fn canonicalize() -> PassTimer {
    start("canonicalize")
}

/// Time spent verifying graph invariants (`crate::verify`).
pub fn verify() -> PassTimer {
    start("verify")
}

/// Time spent in a guards-stage transition phase (`crate::lowering`).
pub fn stage_transition() -> PassTimer {
    start("stage_transition")
}

/// Time spent computing dominance (`crate::dominator`).
pub fn dominance() -> PassTimer {
    start("dominance")
}

/// Snapshot of accumulated per-pass time on the current thread, for
/// diagnostics.
pub fn totals() -> HashMap<&'static str, Duration> {
    TOTALS.with(|t| t.borrow().clone())
}

/// Clear accumulated timing, e.g. between independent compilations sharing
/// a thread (§5: one `Context`/thread per compilation, but a worker thread
/// compiles many methods over its lifetime).
pub fn clear() {
    TOTALS.with(|t| t.borrow_mut().clear());
}
