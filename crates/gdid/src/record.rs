/// The durable high-water mark for one sequence key.
///
/// `counter` is the *exclusive* upper bound of every counter ever reserved in
/// `era`: the next block starts exactly at `counter`. Once persisted, a mark
/// never decreases — ordering is lexicographic on `(era, counter)`, which the
/// derived [`Ord`] provides from field order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HighWaterMark {
    pub era: u32,
    pub counter: u64,
}

impl HighWaterMark {
    /// The mark of a sequence key that has never been allocated from.
    pub const ZERO: Self = Self { era: 0, counter: 0 };

    pub const fn new(era: u32, counter: u64) -> Self {
        Self { era, counter }
    }
}
