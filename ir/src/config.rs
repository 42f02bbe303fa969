//! Compiler configuration (§6.3).
//!
//! A plain value threaded explicitly through the graph, the canonicalizer
//! tool, and the lowering driver, never a process-wide global — the
//! "Global mutable state" design note in spec.md calls this out directly.
//! Shaped like `cranelift-codegen::settings`'s builder: a `new()` with sane
//! defaults plus chainable `with_*` setters, since the option set here is
//! small, fixed, and known at compile time (no need for the string-keyed
//! flag registry `cranelift-codegen` uses for its much larger, ISA-dependent
//! option set).

/// Whether optimistic assumptions (`crate::assumptions`) may be recorded
/// for this compilation.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum AllowAssumptions {
    #[default]
    Yes,
    No,
}

/// The guards stage a freshly-built graph starts in (`crate::lowering`).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum GuardsStageStart {
    #[default]
    FloatingGuards,
    FixedDeopts,
    AfterFsa,
}

/// The enumerated configuration options from §6.3.
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    /// Populate the inlined-method set on `StructuredGraph` as methods are
    /// inlined.
    pub record_inlined_methods: bool,
    /// Whether optimistic assumptions may be recorded.
    pub allow_assumptions: AllowAssumptions,
    /// Memory/feature trade-off: if false, `Constant` nodes do not maintain
    /// a `usages` list and usage queries fall back to scanning the arena's
    /// live-node set (§4.3 `Constant`, §9 Open Questions item 3).
    pub constant_node_records_usages: bool,
    /// The guards stage a graph handed to this crate pre-lowered should
    /// start in, instead of the default `FloatingGuards`.
    pub guards_stage_start: GuardsStageStart,
    /// Upper bound on canonicalizer/simplifier work-list iterations before
    /// bailing out (§7 "Bailout" / resource budget exhaustion). `None`
    /// means unbounded, relying solely on the well-founded measure argument
    /// in spec.md §9 to guarantee termination.
    pub max_rewrite_iterations: Option<u32>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            record_inlined_methods: true,
            allow_assumptions: AllowAssumptions::default(),
            constant_node_records_usages: true,
            guards_stage_start: GuardsStageStart::default(),
            max_rewrite_iterations: Some(100_000),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record_inlined_methods(mut self, value: bool) -> Self {
        self.record_inlined_methods = value;
        self
    }

    pub fn with_allow_assumptions(mut self, value: AllowAssumptions) -> Self {
        self.allow_assumptions = value;
        self
    }

    pub fn with_constant_node_records_usages(mut self, value: bool) -> Self {
        self.constant_node_records_usages = value;
        self
    }

    pub fn with_guards_stage_start(mut self, value: GuardsStageStart) -> Self {
        self.guards_stage_start = value;
        self
    }

    pub fn with_max_rewrite_iterations(mut self, value: Option<u32>) -> Self {
        self.max_rewrite_iterations = value;
        self
    }
}
