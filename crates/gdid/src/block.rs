use crate::Gdid;

/// A contiguous range of counters reserved exclusively for one caller.
///
/// The block covers the half-open range `[start, start + count)` within
/// `(authority, era)`. Blocks issued for the same sequence key never overlap:
/// the authority durably advances its high-water mark past the block before
/// returning it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GdidBlock {
    pub authority: u8,
    pub era: u32,
    pub start: u64,
    pub count: u32,
    pub vicinity: u64,
}

impl GdidBlock {
    /// The first counter *not* covered by this block.
    pub const fn end(&self) -> u64 {
        self.start + self.count as u64
    }

    pub const fn contains(&self, counter: u64) -> bool {
        counter >= self.start && counter < self.end()
    }

    /// Turns the block into a cursor that hands out its identifiers.
    pub const fn into_cursor(self) -> BlockCursor {
        BlockCursor {
            block: self,
            used: 0,
        }
    }
}

/// A consuming cursor over a [`GdidBlock`].
///
/// Hands out the block's identifiers in increasing counter order, without any
/// network or disk I/O. Used by the client generator; up to `count - 1`
/// identifiers are wasted if the process exits before exhausting the block,
/// which is an accepted tradeoff — the identifier space is large and gaps are
/// harmless.
#[derive(Copy, Clone, Debug)]
pub struct BlockCursor {
    block: GdidBlock,
    used: u32,
}

impl BlockCursor {
    /// The next unused identifier, or `None` once the block is exhausted.
    pub fn next_id(&mut self) -> Option<Gdid> {
        if self.used >= self.block.count {
            return None;
        }
        let counter = self.block.start + self.used as u64;
        self.used += 1;
        // The authority validated its own id when the block was issued.
        Gdid::new(self.block.authority, self.block.era, counter)
    }

    /// Identifiers left in the block.
    pub const fn remaining(&self) -> u32 {
        self.block.count - self.used
    }

    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub const fn block(&self) -> &GdidBlock {
        &self.block
    }
}
