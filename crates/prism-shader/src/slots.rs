//! Bounded slot pools for binding allocation.
//!
//! A [`SlotPool`] owns one free-bitmask for one slot space. Pools are plain
//! values owned by the per-job allocator; there is no ambient or static
//! state, so concurrent compile jobs are fully isolated.

use std::fmt;

use crate::limits::{MAX_BUFFER_SLOTS, MAX_SAMPLER_SLOTS, MAX_TEXTURE_SLOTS};

/// The three independent slot spaces of the binding model.
///
/// UAVs are not a fourth space: they draw low slots from the buffer and
/// texture spaces, replicating D3D-style numbering where `u#` registers
/// occupy the low slots first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotSpace {
    /// Buffer bindings (`b#`-like): uniform and storage buffers.
    Buffers,
    /// Texture bindings (`t#`-like): images, texel buffers, input attachments.
    Textures,
    /// Sampler-state bindings (`s#`-like).
    Samplers,
}

impl SlotSpace {
    /// The pool width for this space.
    pub const fn width(self) -> u32 {
        match self {
            SlotSpace::Buffers => MAX_BUFFER_SLOTS,
            SlotSpace::Textures => MAX_TEXTURE_SLOTS,
            SlotSpace::Samplers => MAX_SAMPLER_SLOTS,
        }
    }
}

impl fmt::Display for SlotSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotSpace::Buffers => write!(f, "buffer"),
            SlotSpace::Textures => write!(f, "texture"),
            SlotSpace::Samplers => write!(f, "sampler"),
        }
    }
}

/// A free-bitmask over one slot space. Bit `n` set means slot `n` is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPool {
    space: SlotSpace,
    width: u32,
    free: u64,
}

impl SlotPool {
    /// Creates a pool with all `width` slots of `space` free.
    pub fn new(space: SlotSpace) -> Self {
        Self::with_width(space, space.width())
    }

    /// Creates a pool with a caller-chosen width (used by binding models
    /// that expose fewer slots than the compile-time maximum).
    pub fn with_width(space: SlotSpace, width: u32) -> Self {
        debug_assert!(width >= 1 && width <= 64);
        let free = if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        Self { space, width, free }
    }

    /// The slot space this pool allocates from.
    pub fn space(&self) -> SlotSpace {
        self.space
    }

    /// The number of slots this pool was created with.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Takes the lowest free slot, or `None` when the pool is exhausted.
    pub fn allocate(&mut self) -> Option<u32> {
        if self.free == 0 {
            return None;
        }
        let slot = self.free.trailing_zeros();
        self.free &= !(1u64 << slot);
        Some(slot)
    }

    /// Marks `slot` used. Returns `false` if it was already used or out of
    /// range (callers treat that as an invariant violation, not user error).
    pub fn claim(&mut self, slot: u32) -> bool {
        if slot >= 64 {
            return false;
        }
        let bit = 1u64 << slot;
        if self.free & bit == 0 {
            return false;
        }
        self.free &= !bit;
        true
    }

    /// The lowest free slot without claiming it.
    pub fn lowest_free(&self) -> Option<u32> {
        (self.free != 0).then(|| self.free.trailing_zeros())
    }

    /// Returns `true` if `slot` is still free.
    pub fn is_free(&self, slot: u32) -> bool {
        slot < 64 && self.free & (1u64 << slot) != 0
    }

    /// The raw free mask (bit `n` set = slot `n` free).
    pub fn free_mask(&self) -> u64 {
        self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_lowest_slot_first() {
        let mut pool = SlotPool::with_width(SlotSpace::Buffers, 4);
        assert_eq!(pool.allocate(), Some(0));
        assert_eq!(pool.allocate(), Some(1));
        assert!(pool.claim(3));
        assert_eq!(pool.allocate(), Some(2));
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn claim_rejects_taken_and_out_of_range_slots() {
        let mut pool = SlotPool::with_width(SlotSpace::Samplers, 16);
        assert!(pool.claim(5));
        assert!(!pool.claim(5));
        assert!(!pool.claim(64));
    }

    #[test]
    fn full_width_pool_has_all_bits_free() {
        let pool = SlotPool::with_width(SlotSpace::Textures, 64);
        assert_eq!(pool.free_mask(), u64::MAX);
    }

    #[test]
    fn lowest_free_does_not_claim() {
        let mut pool = SlotPool::new(SlotSpace::Buffers);
        assert_eq!(pool.lowest_free(), Some(0));
        assert_eq!(pool.lowest_free(), Some(0));
        pool.claim(0);
        assert_eq!(pool.lowest_free(), Some(1));
    }
}
