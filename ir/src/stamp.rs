//! The value-type lattice (§3.1 "Stamp", §4.2).
//!
//! A `Stamp` summarizes what a value-producing node may produce at runtime,
//! tightly enough to drive rewrites but never excluding a value the node
//! could actually produce. `join` narrows (lattice meet, "and"), `meet`
//! widens (lattice join, "or", used at merges), and `improve_with` is the
//! narrowing half of `join` used by `infer_stamp`/`update_stamp`.
//!
//! Stamp monotonicity (invariant 5, §3.3) is a property of *callers*, not of
//! this module: every caller that re-infers a stamp must only ever replace
//! `old` with `new.join(old)`, never with something wider. `Stamp::join`
//! itself is a pure lattice operation and cannot violate monotonicity on its
//! own; see `Node::update_stamp` in `crate::node` for where the contract is
//! enforced with a `debug_assert!`.

use std::fmt;

/// A resolved or unresolved object type, as reported by `MetaAccess`
/// (`crate::runtime`). Opaque to `graphir` beyond identity and subtyping,
/// which is why it is a plain numeric handle rather than a rich type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeHandle(pub u32);

/// Bit width and signedness-qualified integer stamp.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct IntegerStamp {
    pub bits: u8,
    pub signed: bool,
    pub lo: i64,
    pub hi: i64,
    /// Bits that are known to be zero in every possible value.
    pub must_be_zero: u64,
    /// Bits that are known to be one in every possible value.
    pub must_be_one: u64,
}

impl IntegerStamp {
    pub fn full(bits: u8, signed: bool) -> Self {
        let (lo, hi) = Self::full_range(bits, signed);
        Self {
            bits,
            signed,
            lo,
            hi,
            must_be_zero: 0,
            must_be_one: 0,
        }
    }

    pub fn constant(bits: u8, signed: bool, value: i64) -> Self {
        Self {
            bits,
            signed,
            lo: value,
            hi: value,
            must_be_zero: !(value as u64),
            must_be_one: value as u64,
        }
    }

    fn full_range(bits: u8, signed: bool) -> (i64, i64) {
        if signed {
            if bits >= 64 {
                (i64::MIN, i64::MAX)
            } else {
                (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
            }
        } else if bits >= 64 {
            (0, i64::MAX)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }

    pub fn is_constant(&self) -> bool {
        self.lo == self.hi
    }

    pub fn as_constant(&self) -> Option<i64> {
        self.is_constant().then_some(self.lo)
    }

    fn join(&self, other: &IntegerStamp) -> IntegerStamp {
        debug_assert_eq!(self.bits, other.bits);
        IntegerStamp {
            bits: self.bits,
            signed: self.signed && other.signed,
            lo: self.lo.max(other.lo),
            hi: self.hi.min(other.hi),
            must_be_zero: self.must_be_zero | other.must_be_zero,
            must_be_one: self.must_be_one | other.must_be_one,
        }
    }

    fn meet(&self, other: &IntegerStamp) -> IntegerStamp {
        debug_assert_eq!(self.bits, other.bits);
        IntegerStamp {
            bits: self.bits,
            signed: self.signed || other.signed,
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
            must_be_zero: self.must_be_zero & other.must_be_zero,
            must_be_one: self.must_be_one & other.must_be_one,
        }
    }

    fn is_empty(&self) -> bool {
        self.lo > self.hi || (self.must_be_zero & self.must_be_one) != 0
    }
}

/// Float stamp: whether NaN and negative-zero are possible, plus bit width.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FloatStamp {
    pub bits: u8,
    pub may_be_nan: bool,
    pub may_be_neg_zero: bool,
    /// `None` means "not known to be a single constant".
    pub constant_bits: Option<u64>,
}

impl FloatStamp {
    pub fn full(bits: u8) -> Self {
        Self {
            bits,
            may_be_nan: true,
            may_be_neg_zero: true,
            constant_bits: None,
        }
    }

    fn join(&self, other: &FloatStamp) -> FloatStamp {
        debug_assert_eq!(self.bits, other.bits);
        let constant_bits = match (self.constant_bits, other.constant_bits) {
            (Some(a), Some(b)) if a == b => Some(a),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            _ => None,
        };
        FloatStamp {
            bits: self.bits,
            may_be_nan: self.may_be_nan && other.may_be_nan,
            may_be_neg_zero: self.may_be_neg_zero && other.may_be_neg_zero,
            constant_bits,
        }
    }

    fn meet(&self, other: &FloatStamp) -> FloatStamp {
        debug_assert_eq!(self.bits, other.bits);
        FloatStamp {
            bits: self.bits,
            may_be_nan: self.may_be_nan || other.may_be_nan,
            may_be_neg_zero: self.may_be_neg_zero || other.may_be_neg_zero,
            constant_bits: match (self.constant_bits, other.constant_bits) {
                (Some(a), Some(b)) if a == b => Some(a),
                _ => None,
            },
        }
    }
}

/// Object/reference stamp: a resolved type (or none, for `java.lang.Object`-
/// like top), plus exactness/nullability flags.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ObjectStamp {
    pub ty: Option<TypeHandle>,
    /// If true, the runtime value's dynamic type is exactly `ty`, not a
    /// subtype of it.
    pub exact_type: bool,
    pub non_null: bool,
    pub always_null: bool,
}

impl ObjectStamp {
    pub fn top() -> Self {
        Self {
            ty: None,
            exact_type: false,
            non_null: false,
            always_null: false,
        }
    }

    pub fn null() -> Self {
        Self {
            ty: None,
            exact_type: false,
            non_null: false,
            always_null: true,
        }
    }

    fn join(&self, other: &ObjectStamp) -> ObjectStamp {
        ObjectStamp {
            ty: match (self.ty, other.ty) {
                (Some(a), Some(b)) if a == b => Some(a),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (Some(_), Some(_)) => self.ty, // distinct unrelated types: keep self's, conservatively
                (None, None) => None,
            },
            exact_type: self.exact_type || other.exact_type,
            non_null: self.non_null || other.non_null,
            always_null: self.always_null && other.always_null,
        }
    }

    fn meet(&self, other: &ObjectStamp) -> ObjectStamp {
        ObjectStamp {
            ty: if self.ty == other.ty { self.ty } else { None },
            exact_type: self.exact_type && other.exact_type && self.ty == other.ty,
            non_null: self.non_null && other.non_null,
            always_null: self.always_null || other.always_null,
        }
    }
}

/// The stamp lattice (§3.1, §4.2).
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Stamp {
    /// Produced by nodes with no runtime value (control nodes' placeholder
    /// "stamp", call-target children).
    Void,
    Integer(IntegerStamp),
    Float(FloatStamp),
    Object(ObjectStamp),
    /// The bottom element: this point in the graph is unreachable, or this
    /// value can never be observed. `join` with anything produces `Illegal`
    /// only when the inputs are genuinely incompatible; becoming
    /// unreachable through constant-condition folding is represented by
    /// deleting the code, not by this variant, but join() still needs a
    /// well-defined bottom.
    Illegal,
    /// A stamp that deliberately carries no type information, used only for
    /// "dependency-only" nodes (`ValueAnchor`-like nodes whose purpose is to
    /// anchor a guard, not to produce a value consumers read).
    DependencyOnly,
    /// A placeholder for node-intrinsic stamps computed outside this
    /// lattice (e.g. backend-specific vector stamps). Treated as the top
    /// element: it joins/meets to itself and nothing else, so rewrites that
    /// don't understand it are conservative rather than unsound.
    NodeIntrinsic,
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stamp::Void => write!(f, "void"),
            Stamp::Integer(i) => write!(f, "i{}[{}, {}]", i.bits, i.lo, i.hi),
            Stamp::Float(fl) => write!(f, "f{}", fl.bits),
            Stamp::Object(o) => write!(
                f,
                "obj{}{}{}",
                if o.always_null { "<null>" } else { "" },
                if o.non_null { "!" } else { "" },
                if o.exact_type { "=" } else { "" }
            ),
            Stamp::Illegal => write!(f, "illegal"),
            Stamp::DependencyOnly => write!(f, "dep"),
            Stamp::NodeIntrinsic => write!(f, "intrinsic"),
        }
    }
}

impl Stamp {
    /// Constructor for a bounded integer stamp (§4.2 `for_integer`).
    pub fn for_integer(bits: u8, signed: bool, lo: i64, hi: i64) -> Self {
        Stamp::Integer(IntegerStamp {
            bits,
            signed,
            lo,
            hi,
            must_be_zero: 0,
            must_be_one: 0,
        })
    }

    /// Constructor for an integer-valued constant (§4.2 `for_constant`).
    pub fn for_int_constant(bits: u8, signed: bool, value: i64) -> Self {
        Stamp::Integer(IntegerStamp::constant(bits, signed, value))
    }

    /// Constructor for an object stamp (§4.2 `for_object`).
    pub fn for_object(ty: TypeHandle, exact: bool, non_null: bool, always_null: bool) -> Self {
        Stamp::Object(ObjectStamp {
            ty: Some(ty),
            exact_type: exact,
            non_null,
            always_null,
        })
    }

    pub fn is_legal(&self) -> bool {
        !matches!(self, Stamp::Illegal)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Stamp::Illegal => true,
            Stamp::Integer(i) => i.is_empty(),
            Stamp::Object(o) => o.non_null && o.always_null,
            _ => false,
        }
    }

    fn kind_compatible(&self, other: &Stamp) -> bool {
        matches!(
            (self, other),
            (Stamp::Void, Stamp::Void)
                | (Stamp::Integer(_), Stamp::Integer(_))
                | (Stamp::Float(_), Stamp::Float(_))
                | (Stamp::Object(_), Stamp::Object(_))
                | (Stamp::DependencyOnly, Stamp::DependencyOnly)
                | (Stamp::NodeIntrinsic, Stamp::NodeIntrinsic)
        )
    }

    /// Are these stamps of a shape that join/meet can usefully combine?
    pub fn is_compatible(&self, other: &Stamp) -> bool {
        matches!(self, Stamp::Illegal)
            || matches!(other, Stamp::Illegal)
            || self.kind_compatible(other)
    }

    /// Lattice meet: the most precise stamp implied by both `self` and
    /// `other`. May produce `Illegal` (§4.2): that signals unreachable code
    /// at the join point, not a bug.
    pub fn join(&self, other: &Stamp) -> Stamp {
        match (self, other) {
            (Stamp::Illegal, _) | (_, Stamp::Illegal) => Stamp::Illegal,
            (Stamp::Void, Stamp::Void) => Stamp::Void,
            (Stamp::DependencyOnly, Stamp::DependencyOnly) => Stamp::DependencyOnly,
            (Stamp::NodeIntrinsic, Stamp::NodeIntrinsic) => Stamp::NodeIntrinsic,
            (Stamp::Integer(a), Stamp::Integer(b)) if a.bits == b.bits => {
                let joined = a.join(b);
                if joined.is_empty() {
                    Stamp::Illegal
                } else {
                    Stamp::Integer(joined)
                }
            }
            (Stamp::Float(a), Stamp::Float(b)) if a.bits == b.bits => Stamp::Float(a.join(b)),
            (Stamp::Object(a), Stamp::Object(b)) => {
                let joined = a.join(b);
                if joined.non_null && joined.always_null {
                    Stamp::Illegal
                } else {
                    Stamp::Object(joined)
                }
            }
            _ => Stamp::Illegal,
        }
    }

    /// Lattice join (union, used at control-flow merges): the least precise
    /// stamp containing both `self` and `other`.
    pub fn meet(&self, other: &Stamp) -> Stamp {
        match (self, other) {
            (Stamp::Illegal, other) => *other,
            (me, Stamp::Illegal) => *me,
            (Stamp::Void, Stamp::Void) => Stamp::Void,
            (Stamp::DependencyOnly, Stamp::DependencyOnly) => Stamp::DependencyOnly,
            (Stamp::NodeIntrinsic, Stamp::NodeIntrinsic) => Stamp::NodeIntrinsic,
            (Stamp::Integer(a), Stamp::Integer(b)) if a.bits == b.bits => {
                Stamp::Integer(a.meet(b))
            }
            (Stamp::Float(a), Stamp::Float(b)) if a.bits == b.bits => Stamp::Float(a.meet(b)),
            (Stamp::Object(a), Stamp::Object(b)) => Stamp::Object(a.meet(b)),
            _ => Stamp::NodeIntrinsic,
        }
    }

    /// Never-wider-than-`self` intersection with `other` (§4.2
    /// `improve_with`): `self.join(other)`, spelled out separately because
    /// callers use it specifically to *refine* a stamp (e.g. `Pi`) rather
    /// than to combine two independently-computed stamps.
    pub fn improve_with(&self, other: &Stamp) -> Stamp {
        self.join(other)
    }

    /// Are `self` and `other` guaranteed to never compare equal at runtime?
    pub fn always_distinct(&self, other: &Stamp) -> bool {
        match (self, other) {
            (Stamp::Integer(a), Stamp::Integer(b)) => a.hi < b.lo || b.hi < a.lo,
            (Stamp::Object(a), Stamp::Object(b)) => {
                (a.always_null && b.non_null) || (b.always_null && a.non_null)
            }
            _ => false,
        }
    }

    /// Does this stamp's value set contain exactly the constant `value`
    /// (for integer stamps)?
    pub fn contains_int(&self, value: i64) -> bool {
        match self {
            Stamp::Integer(i) => i.lo <= value && value <= i.hi,
            _ => false,
        }
    }

    pub fn as_int_constant(&self) -> Option<i64> {
        match self {
            Stamp::Integer(i) => i.as_constant(),
            _ => None,
        }
    }

    pub fn as_float_constant(&self) -> Option<u64> {
        match self {
            Stamp::Float(f) => f.constant_bits,
            _ => None,
        }
    }

    pub fn is_always_null(&self) -> bool {
        matches!(self, Stamp::Object(o) if o.always_null)
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Stamp::Object(o) if o.non_null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_join_narrows() {
        let a = Stamp::for_integer(32, true, 0, 100);
        let b = Stamp::for_integer(32, true, 50, 200);
        let joined = a.join(&b);
        assert_eq!(joined, Stamp::for_integer(32, true, 50, 100));
    }

    #[test]
    fn integer_join_can_become_empty() {
        let a = Stamp::for_integer(32, true, 0, 10);
        let b = Stamp::for_integer(32, true, 20, 30);
        assert_eq!(a.join(&b), Stamp::Illegal);
    }

    #[test]
    fn object_stamps_null_and_nonnull_are_distinct() {
        let null = Stamp::Object(ObjectStamp::null());
        let mut non_null = ObjectStamp::top();
        non_null.non_null = true;
        let non_null = Stamp::Object(non_null);
        assert!(null.always_distinct(&non_null));
    }

    #[test]
    fn meet_widens_at_merges() {
        let a = Stamp::for_integer(32, true, 0, 10);
        let b = Stamp::for_integer(32, true, 20, 30);
        let met = a.meet(&b);
        assert_eq!(met, Stamp::for_integer(32, true, 0, 30));
    }

    #[test]
    fn improve_with_never_widens() {
        let wide = Stamp::for_integer(32, true, 0, 1000);
        let narrow = Stamp::for_integer(32, true, 0, 10);
        let improved = wide.improve_with(&narrow);
        assert_eq!(improved, narrow);
    }
}
