//! A side-table over keys allocated by some other `PrimaryMap`.

use crate::iter::{Iter, IterMut};
use crate::keys::Keys;
use crate::EntityRef;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

/// A `K -> V` map over an externally-allocated, dense key space.
///
/// Unlike [`PrimaryMap`](crate::PrimaryMap), a `SecondaryMap` cannot mint new
/// keys; it grows lazily to cover whatever key is indexed, filling the gap
/// with `default`. `graphir` hangs most of its per-node side-tables (stamps,
/// liveness flags, usage lists) off `SecondaryMap<NodeId, _>`.
#[derive(Debug, Clone)]
pub struct SecondaryMap<K: EntityRef, V: Clone> {
    elems: Vec<V>,
    default: V,
    unused: PhantomData<K>,
}

impl<K: EntityRef, V: Clone + Default> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V: Clone> SecondaryMap<K, V> {
    /// Create a new empty map whose default entry is `V::default()`.
    pub fn new() -> Self
    where
        V: Default,
    {
        Self {
            elems: Vec::new(),
            default: V::default(),
            unused: PhantomData,
        }
    }

    /// Create a new empty map with an explicit default value for unset keys.
    pub fn with_default(default: V) -> Self {
        Self {
            elems: Vec::new(),
            default,
            unused: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    pub fn clear(&mut self) {
        self.elems.clear();
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

    /// Grow the backing storage so that index `n - 1` is valid.
    pub fn resize(&mut self, n: usize) {
        if n > self.elems.len() {
            self.elems.resize(n, self.default.clone());
        }
    }

    fn ensure(&mut self, index: usize) {
        if index >= self.elems.len() {
            self.resize(index + 1);
        }
    }
}

impl<K: EntityRef, V: Clone> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, k: K) -> &V {
        self.elems.get(k.index()).unwrap_or(&self.default)
    }
}

impl<K: EntityRef, V: Clone> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        self.ensure(k.index());
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
    fn unset_keys_read_as_default() {
        let m: SecondaryMap<TestId, bool> = SecondaryMap::new();
        assert_eq!(m[TestId::new(41)], false);
    }

    #[test]
    fn write_grows_storage() {
        let mut m: SecondaryMap<TestId, u32> = SecondaryMap::with_default(7);
        m[TestId::new(3)] = 99;
        assert_eq!(m[TestId::new(3)], 99);
        assert_eq!(m[TestId::new(0)], 7);
        assert_eq!(m[TestId::new(2)], 7);
    }
}
