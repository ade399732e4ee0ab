use core::cmp::Ordering;
use core::fmt;

/// Number of bits reserved for the authority id in the packed layout.
pub const AUTHORITY_BITS: u32 = 5;
/// Number of bits reserved for the era in the packed layout.
pub const ERA_BITS: u32 = 32;
/// Number of bits reserved for the counter in the packed layout.
pub const COUNTER_BITS: u32 = 64;

/// Highest valid authority id. At most 32 authorities (0..=31) may operate
/// concurrently without coordinating with each other.
pub const MAX_AUTHORITY: u8 = (1 << AUTHORITY_BITS) - 1;

/// Default fencing bound: the maximum plausible counter value within one era.
///
/// A persisted high-water mark above this bound means the era's counter space
/// is exhausted (or the stored record is implausible) and triggers an era
/// rollover during allocation.
pub const DEFAULT_VICINITY: u64 = (1 << 62) - 1;

const COUNTER_SHIFT: u32 = 0;
const ERA_SHIFT: u32 = COUNTER_BITS;
const AUTHORITY_SHIFT: u32 = COUNTER_BITS + ERA_BITS;

/// A global distributed identifier.
///
/// A `Gdid` is the triple `(authority, era, counter)`. Identifiers minted by
/// the same authority are totally ordered, lexicographically on
/// `(era, counter)`. Identifiers from *different* authorities are unique but
/// deliberately not ordered relative to each other: [`PartialOrd`] returns
/// `None` for them, and there is no [`Ord`] impl.
///
/// The packed [`u128`] form preserves the same-authority ordering, so packed
/// identifiers can be used directly as sort keys within one authority.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gdid {
    authority: u8,
    era: u32,
    counter: u64,
}

impl Gdid {
    /// Creates an identifier from its components.
    ///
    /// Returns `None` if `authority` exceeds [`MAX_AUTHORITY`].
    pub const fn new(authority: u8, era: u32, counter: u64) -> Option<Self> {
        if authority > MAX_AUTHORITY {
            return None;
        }
        Some(Self {
            authority,
            era,
            counter,
        })
    }

    /// The authority namespace this identifier was issued from.
    pub const fn authority(&self) -> u8 {
        self.authority
    }

    /// The era (generation) the counter belongs to.
    pub const fn era(&self) -> u32 {
        self.era
    }

    /// The counter value, unique within `(authority, era)`.
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Packs the identifier into a `u128`:
    /// `authority << 96 | era << 64 | counter`.
    pub const fn to_u128(&self) -> u128 {
        ((self.authority as u128) << AUTHORITY_SHIFT)
            | ((self.era as u128) << ERA_SHIFT)
            | ((self.counter as u128) << COUNTER_SHIFT)
    }

    /// Unpacks an identifier previously produced by [`Self::to_u128`].
    ///
    /// Returns `None` if bits above the authority field are set or the
    /// authority field is out of range.
    pub const fn from_u128(raw: u128) -> Option<Self> {
        if raw >> (AUTHORITY_SHIFT + AUTHORITY_BITS) != 0 {
            return None;
        }
        Self::new(
            (raw >> AUTHORITY_SHIFT) as u8,
            (raw >> ERA_SHIFT) as u32,
            raw as u64,
        )
    }
}

impl PartialOrd for Gdid {
    /// Identifiers are ordered only within one authority namespace.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.authority != other.authority {
            return None;
        }
        Some(
            self.era
                .cmp(&other.era)
                .then(self.counter.cmp(&other.counter)),
        )
    }
}

impl fmt::Display for Gdid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:08X}-{:016X}",
            self.authority, self.era, self.counter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_authority() {
        assert!(Gdid::new(MAX_AUTHORITY, 0, 0).is_some());
        assert!(Gdid::new(MAX_AUTHORITY + 1, 0, 0).is_none());
    }

    #[test]
    fn pack_roundtrip() {
        let id = Gdid::new(17, 3, 0x00DE_AD00_BEEF_0042).unwrap();
        let packed = id.to_u128();
        assert_eq!(Gdid::from_u128(packed), Some(id));
    }

    #[test]
    fn from_u128_rejects_high_bits() {
        let id = Gdid::new(1, 1, 1).unwrap();
        let raw = id.to_u128() | (1 << 120);
        assert!(Gdid::from_u128(raw).is_none());
    }

    #[test]
    fn ordering_within_authority_is_era_then_counter() {
        let a = Gdid::new(2, 0, u64::MAX).unwrap();
        let b = Gdid::new(2, 1, 0).unwrap();
        let c = Gdid::new(2, 1, 1).unwrap();
        assert!(a < b && b < c);
        assert!(a.to_u128() < b.to_u128() && b.to_u128() < c.to_u128());
    }

    #[test]
    fn no_ordering_across_authorities() {
        let a = Gdid::new(1, 0, 10).unwrap();
        let b = Gdid::new(2, 0, 10).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.partial_cmp(&b), None);
    }
}
