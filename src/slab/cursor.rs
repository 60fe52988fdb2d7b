//! Sequential slot allocation across pages.

use super::page::Pages;
use crate::memory::Block;

/// Write position of a slab: the page currently being filled and the next
/// free slot in it.
///
/// Slots are handed out in order. When the page is exhausted the cursor takes
/// the next page from the free queue, so allocation never scans.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    page: u32,
    slot: usize,
    slots: usize,
    shift: u32,
}

impl Cursor {
    /// Attach to the first free page, generating one if none exist.
    pub fn new<M: Block>(pages: &mut Pages<M>) -> Self {
        let slots = pages.slots();
        debug_assert!(slots.is_power_of_two());
        Self {
            page: pages.next_free(),
            slot: 0,
            slots,
            shift: slots.trailing_zeros(),
        }
    }

    /// Slab index of the slot under the cursor.
    #[inline]
    pub fn index(&self) -> u32 {
        (self.page << self.shift) | self.slot as u32
    }

    /// Page currently being filled.
    #[inline]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Slot offset inside the current page.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Occupy the slot under the cursor and return its record bytes.
    #[inline]
    pub fn wrap_at_cursor<'p, M: Block>(&self, pages: &'p mut Pages<M>) -> &'p mut [u8] {
        pages.page_mut(self.page).create_at(self.slot)
    }

    /// Step to the next slot, moving to a fresh page when this one is full.
    ///
    /// A page left behind with no live records is recycled on the way out;
    /// while it was under the cursor it could not be.
    pub fn increment<M: Block>(&mut self, pages: &mut Pages<M>) {
        self.slot += 1;
        if self.slot < self.slots {
            return;
        }
        let finished = self.page;
        self.page = pages.next_free();
        self.slot = 0;
        if pages.page(finished).live_count() == 0 {
            pages.release(finished);
        }
    }
}
