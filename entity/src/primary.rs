//! The map that owns an entity's dense key space.

use crate::iter::{Iter, IterMut};
use crate::keys::Keys;
use crate::EntityRef;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A dense `K -> V` table that is also the sole way to mint new `K`s.
///
/// This is the arena proper: `graphir`'s `StructuredGraph` stores its nodes
/// in a `PrimaryMap<NodeId, NodeSlot>`. Unlike `SecondaryMap`, a
/// `PrimaryMap` can grow its key space; `SecondaryMap`s keyed on the same
/// `K` are grown to match on demand.
#[derive(Debug, Clone)]
pub struct PrimaryMap<K: EntityRef, V> {
    elems: Vec<V>,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            elems: Vec::new(),
            unused: PhantomData,
        }
    }

    /// Create a new empty map with the given capacity pre-reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elems: Vec::with_capacity(capacity),
            unused: PhantomData,
        }
    }

    /// Number of live slots (including any logically-deleted ones; this map
    /// never reclaims indices).
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Insert `value`, allocating and returning a fresh key for it.
    pub fn push(&mut self, value: V) -> K {
        let k = K::new(self.elems.len());
        self.elems.push(value);
        k
    }

    /// Is `k` in bounds for this map?
    pub fn is_valid(&self, k: K) -> bool {
        k.index() < self.elems.len()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    pub fn get_mut(&mut self, k: K) -> Option<&mut V> {
        self.elems.get_mut(k.index())
    }

    pub fn iter(&self) -> Iter<K, V> {
        Iter::new(self.elems.iter())
    }

    pub fn iter_mut(&mut self) -> IterMut<K, V> {
        IterMut::new(self.elems.iter_mut())
    }

    pub fn keys(&self) -> Keys<K> {
        Keys::with_len(self.elems.len())
    }

    pub fn values(&self) -> core::slice::Iter<V> {
        self.elems.iter()
    }

    pub fn values_mut(&mut self) -> core::slice::IterMut<V> {
        self.elems.iter_mut()
    }

    /// The key that `push` would hand out next.
    pub fn next_key(&self) -> K {
        K::new(self.elems.len())
    }
}

impl<K: EntityRef, V> Default for PrimaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V> Index<K> for PrimaryMap<K, V> {
    type Output = V;

    fn index(&self, k: K) -> &V {
        &self.elems[k.index()]
    }
}

impl<K: EntityRef, V> IndexMut<K> for PrimaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        &mut self.elems[k.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::entity_impl!(TestId, "t");
    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    pub struct TestId(u32);

    #[test]
    fn push_and_index() {
        let mut m: PrimaryMap<TestId, &'static str> = PrimaryMap::new();
        let a = m.push("a");
        let b = m.push("b");
        assert_ne!(a, b);
        assert_eq!(m[a], "a");
        assert_eq!(m[b], "b");
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn keys_are_dense_and_ordered() {
        let mut m: PrimaryMap<TestId, u32> = PrimaryMap::new();
        for i in 0..5 {
            m.push(i);
        }
        let collected: Vec<u32> = m.keys().map(|k| m[k]).collect();
        assert_eq!(collected, vec![0, 1, 2, 3, 4]);
    }
}
