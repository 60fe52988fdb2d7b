//! Slab pages and the page table.
//!
//! Page layout, for `n` slots of `size`-byte records:
//!
//! ```text
//! [live:1][record:size] [live:1][record:size] ... (n times)
//! ```
//!
//! The live byte is the slot's occupancy flag. The live count and the page's
//! own index are kept on the page struct rather than in the block.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::memory::Block;

/// Occupancy flag bytes in front of each record.
const SLOT_FLAG_SIZE: usize = 1;

const OCCUPIED: u8 = 1;
const VACANT: u8 = 0;

/// One fixed-capacity block of record slots.
pub struct SlabPage<M> {
    block: M,
    index: u32,
    live: u32,
    record_size: usize,
}

impl<M: Block> SlabPage<M> {
    pub fn new(index: u32, slots: usize, record_size: usize) -> Self {
        Self {
            block: M::allocate(slots * (record_size + SLOT_FLAG_SIZE)),
            index,
            live: 0,
            record_size,
        }
    }

    #[inline]
    fn offset(&self, slot: usize) -> usize {
        slot * (self.record_size + SLOT_FLAG_SIZE)
    }

    #[inline]
    fn record_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.offset(slot) + SLOT_FLAG_SIZE;
        start..start + self.record_size
    }

    /// Mark `slot` occupied and return its record bytes.
    pub fn create_at(&mut self, slot: usize) -> &mut [u8] {
        let at = self.offset(slot);
        self.live += 1;
        self.block.bytes_mut()[at] = OCCUPIED;
        let range = self.record_range(slot);
        &mut self.block.bytes_mut()[range]
    }

    #[inline]
    pub fn get_at(&self, slot: usize) -> &[u8] {
        &self.block.bytes()[self.record_range(slot)]
    }

    #[inline]
    pub fn get_at_mut(&mut self, slot: usize) -> &mut [u8] {
        let range = self.record_range(slot);
        &mut self.block.bytes_mut()[range]
    }

    #[inline]
    pub fn is_occupied(&self, slot: usize) -> bool {
        self.block.bytes()[self.offset(slot)] != VACANT
    }

    /// Vacate `slot`. Returns the remaining live count if the slot was
    /// occupied, `None` if it was already free.
    pub fn remove_at(&mut self, slot: usize) -> Option<u32> {
        let at = self.offset(slot);
        let flag = &mut self.block.bytes_mut()[at];
        if *flag == VACANT {
            return None;
        }
        *flag = VACANT;
        self.live -= 1;
        Some(self.live)
    }

    /// Zero every slot and flag.
    pub fn clean(&mut self) {
        self.block.zero();
        self.live = 0;
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn live_count(&self) -> u32 {
        self.live
    }
}

impl<M> std::fmt::Debug for SlabPage<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlabPage")
            .field("index", &self.index)
            .field("live", &self.live)
            .finish()
    }
}

/// All pages of a slab plus the FIFO queue of pages available to the cursor.
///
/// The queue doubles as the page generator: asking it for a page when it is
/// empty allocates a new one.
pub struct Pages<M> {
    pages: Vec<SlabPage<M>>,
    free: VecDeque<u32>,
    slots: usize,
    record_size: usize,
    reset_on_free: bool,
}

impl<M: Block> Pages<M> {
    pub fn new(initial: usize, slots: usize, record_size: usize, reset_on_free: bool) -> Self {
        let mut pages = Self {
            pages: Vec::with_capacity(initial.max(1)),
            free: VecDeque::with_capacity(initial.max(1)),
            slots,
            record_size,
            reset_on_free,
        };
        for _ in 0..initial {
            pages.generate();
        }
        pages
    }

    /// Allocate one more page and queue it. The page table doubles when full.
    pub fn generate(&mut self) -> u32 {
        if self.pages.len() == self.pages.capacity() {
            let grow = self.pages.len().max(1);
            self.pages.reserve_exact(grow);
            debug!(
                pages = self.pages.len(),
                capacity = self.table_capacity(),
                "page table grown"
            );
        }
        let index = self.pages.len() as u32;
        self.pages
            .push(SlabPage::new(index, self.slots, self.record_size));
        self.free.push_back(index);
        trace!(page = index, "page generated");
        index
    }

    /// Next page for the cursor, generating one when none is free.
    pub fn next_free(&mut self) -> u32 {
        match self.free.pop_front() {
            Some(index) => index,
            None => {
                // The queue was empty, so the new page is its only entry.
                let index = self.generate();
                self.free.pop_back();
                index
            }
        }
    }

    /// Queue an empty page for reuse, zeroing it first under the reset policy.
    pub fn release(&mut self, index: u32) {
        let page = &mut self.pages[index as usize];
        debug_assert_eq!(page.live_count(), 0);
        if self.reset_on_free {
            page.clean();
        }
        trace!(page = page.index(), "page recycled");
        self.free.push_back(index);
    }

    #[inline]
    pub fn page(&self, index: u32) -> &SlabPage<M> {
        &self.pages[index as usize]
    }

    #[inline]
    pub fn page_mut(&mut self, index: u32) -> &mut SlabPage<M> {
        &mut self.pages[index as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Capacity of the page table, in pages.
    #[inline]
    pub fn table_capacity(&self) -> usize {
        self.pages.capacity()
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[cfg(test)]
    pub fn is_free(&self, index: u32) -> bool {
        self.free.contains(&index)
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.slots
    }
}
