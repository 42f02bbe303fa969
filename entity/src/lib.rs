//! Densely numbered entity references used as arena indices.
//!
//! This crate provides the small set of generic data structures that
//! `graphir` uses to store its node arena and the side-tables hung off it:
//! a reference trait (`EntityRef`), a map that can allocate new keys
//! (`PrimaryMap`), a map over externally-allocated keys (`SecondaryMap`), a
//! space-efficient optional reference (`PackedOption`), and a pool-backed
//! variable-length list (`EntityList`).
//!
//! The design mirrors `cranelift-entity`: entity references are `Copy`
//! 32-bit indices rather than Rust references, so that graphs with cycles
//! (back-edges for loops, usage edges pointing back at definitions) can be
//! represented without reference counting or unsafe aliasing.

mod iter;
mod keys;
mod list;
pub mod packed_option;
mod primary;
mod secondary;

pub use iter::{Iter, IterMut};
pub use keys::Keys;
pub use list::{EntityList, ListPool};
pub use packed_option::{PackedOption, ReservedValue};
pub use primary::PrimaryMap;
pub use secondary::SecondaryMap;

/// A type that can be used as a key in a dense entity map.
///
/// An `EntityRef` is a thin, `Copy` wrapper around a `u32` index. Implementors
/// get this via the [`entity_impl!`] macro, which also gives the type a
/// `Display` implementation matching the textual forms used in logging
/// (`node12`, `stamp3`, ...).
pub trait EntityRef: Copy + Eq {
    /// Create a new reference from its dense index.
    fn new(index: usize) -> Self;

    /// Get the index of this reference.
    fn index(self) -> usize;
}

/// Define an [`EntityRef`] newtype around a `u32`.
///
/// ```ignore
/// pub struct NodeId(u32);
/// entity_impl!(NodeId, "node");
/// ```
#[macro_export]
macro_rules! entity_impl {
    ($entity:ident, $display_prefix:expr) => {
        impl $crate::EntityRef for $entity {
            #[inline]
            fn new(index: usize) -> Self {
                debug_assert!(index < (u32::MAX as usize));
                Self(index as u32)
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl $crate::packed_option::ReservedValue for $entity {
            #[inline]
            fn reserved_value() -> Self {
                Self(u32::MAX)
            }

            #[inline]
            fn is_reserved_value(&self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl ::core::fmt::Display for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                write!(f, concat!($display_prefix, "{}"), self.0)
            }
        }

        impl ::core::fmt::Debug for $entity {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                (self as &dyn ::core::fmt::Display).fmt(f)
            }
        }
    };
    // Variant for entities whose index space reserves u32::MAX for a
    // sentinel that is itself a valid, distinguishable `EntityRef` (none of
    // graphir's ids need this today, kept for parity with cranelift-entity).
    ($entity:ident, $display_prefix:expr, reserve_none) => {
        entity_impl!($entity, $display_prefix);
    };
}
