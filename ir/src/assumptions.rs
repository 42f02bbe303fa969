//! Graph-local optimistic-assumption bookkeeping (§3.1, §6.1).
//!
//! A `StructuredGraph` owns one `AssumptionSet`. It is populated while
//! building/canonicalizing the graph and handed, whole, to the runtime at
//! the end of compilation so the runtime can watch for the facts to stop
//! holding and deoptimize the installed code if they do. Invalidation
//! itself — "this fact no longer holds, deoptimize" — is the runtime's
//! concern (`crate::runtime::Assumptions`); this module only tracks what
//! was recorded and whether *this compilation* has since seen it
//! invalidated (e.g. because a later `MetaAccess` query reported a fact
//! changed mid-compile, per §7's "assumption invalidated during compile"
//! bailout).

use crate::entities::AssumptionId;
use crate::runtime::AssumptionFact;
use graphir_entity::PrimaryMap;

#[derive(Clone, Debug)]
struct Entry {
    fact: AssumptionFact,
    invalidated: bool,
}

/// The set of optimistic assumptions recorded so far for one compilation.
#[derive(Clone, Debug, Default)]
pub struct AssumptionSet {
    entries: PrimaryMap<AssumptionId, Entry>,
}

impl AssumptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a new assumption, deduplicating against facts already
    /// recorded (merging, per §6.1's "record, merge, ... assumptions").
    pub fn record(&mut self, fact: AssumptionFact) -> AssumptionId {
        if let Some((id, _)) = self
            .entries
            .iter()
            .find(|(_, e)| e.fact == fact && !e.invalidated)
        {
            return id;
        }
        self.entries.push(Entry {
            fact,
            invalidated: false,
        })
    }

    /// Merge another compilation's (e.g. an inlined callee's) assumption
    /// set into this one, returning the ids the merged facts now have in
    /// `self`.
    pub fn merge(&mut self, other: &AssumptionSet) -> Vec<AssumptionId> {
        other
            .entries
            .values()
            .filter(|e| !e.invalidated)
            .map(|e| self.record(e.fact.clone()))
            .collect()
    }

    /// Mark `id` invalidated. A later `verify()`/bailout check should treat
    /// any invalidated assumption still reachable from live code as a
    /// reason to bail out (§7).
    pub fn invalidate(&mut self, id: AssumptionId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.invalidated = true;
        }
    }

    pub fn has_invalidated(&self) -> bool {
        self.entries.values().any(|e| e.invalidated)
    }

    pub fn facts(&self) -> impl Iterator<Item = &AssumptionFact> {
        self.entries.values().map(|e| &e.fact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::TypeHandle;

    #[test]
    fn record_deduplicates_equal_facts() {
        let mut set = AssumptionSet::new();
        let a = set.record(AssumptionFact::LeafMethod(crate::runtime::MethodHandle(1)));
        let b = set.record(AssumptionFact::LeafMethod(crate::runtime::MethodHandle(1)));
        assert_eq!(a, b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn invalidate_is_observable_and_does_not_dedup_new_records() {
        let mut set = AssumptionSet::new();
        let fact = AssumptionFact::UniqueConcreteSubtype {
            ty: TypeHandle(1),
            unique_subtype: TypeHandle(2),
        };
        let id = set.record(fact.clone());
        set.invalidate(id);
        assert!(set.has_invalidated());
        let id2 = set.record(fact);
        assert_ne!(id, id2);
    }

    #[test]
    fn merge_brings_in_other_sets_live_facts() {
        let mut a = AssumptionSet::new();
        let mut b = AssumptionSet::new();
        b.record(AssumptionFact::NoFinalizableSubclass(TypeHandle(7)));
        let merged_ids = a.merge(&b);
        assert_eq!(merged_ids.len(), 1);
        assert_eq!(a.len(), 1);
    }
}
