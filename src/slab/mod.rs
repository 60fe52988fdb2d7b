//! Paged fixed-slot arena.
//!
//! Records live in pages of `2^k` slots. A record is addressed by a flat `u32`
//! slab index:
//!
//! ```text
//! index = (page << k) | slot
//! ```
//!
//! Allocation is sequential through a cursor; emptied pages go back on a
//! FIFO free queue and are refilled before any new page is allocated.

mod cursor;
mod page;

pub(crate) use cursor::Cursor;
pub(crate) use page::Pages;

use tracing::debug;

use crate::codec::{self, Codec, RecordMut, RecordRef};
use crate::error::{Error, Result};
use crate::hash;
use crate::memory::{Block, HeapBlock};

/// Largest number of slots per page after rounding.
pub const MAX_PAGE_SLOTS: usize = 1 << 15;

/// Slab construction parameters.
#[derive(Debug, Clone)]
pub struct SlabConfig {
    /// Requested slots per page; rounded up to a power of two.
    pub page_size: usize,
    /// Pages allocated up front.
    pub initial_pages: usize,
    /// Zero a page's memory before it is handed out again.
    pub reset_on_free: bool,
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self {
            page_size: 256,
            initial_pages: 4,
            reset_on_free: true,
        }
    }
}

/// Encoding between slab indices and `(page, slot)` pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Addressing {
    shift: u32,
    mask: u32,
}

impl Addressing {
    /// Addressing for pages of `slots` slots; `slots` must be a power of two.
    pub fn new(slots: usize) -> Self {
        debug_assert!(slots.is_power_of_two());
        Self {
            shift: slots.trailing_zeros(),
            mask: slots as u32 - 1,
        }
    }

    #[inline]
    pub fn encode(&self, page: u32, slot: usize) -> u32 {
        debug_assert!(slot as u32 <= self.mask);
        debug_assert!(page <= u32::MAX >> self.shift);
        (page << self.shift) | slot as u32
    }

    #[inline]
    pub fn decode(&self, index: u32) -> (u32, usize) {
        (index >> self.shift, (index & self.mask) as usize)
    }

    #[inline]
    pub fn shift(&self) -> u32 {
        self.shift
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.mask as usize + 1
    }
}

/// Fixed-slot arena of `C` records stored in `M` blocks.
///
/// Indices are only meaningful between the `create` that returned them and
/// the `remove_at` that frees them. Using an index after it was freed reads
/// whatever record now occupies the slot; nothing detects it.
pub struct Slab<C, M = HeapBlock> {
    codec: C,
    pages: Pages<M>,
    cursor: Cursor,
    addressing: Addressing,
    live: usize,
}

impl<C: Codec, M: Block> Slab<C, M> {
    pub fn new(codec: C, config: SlabConfig) -> Result<Self> {
        codec::validate(&codec)?;
        if config.page_size == 0 || config.page_size > MAX_PAGE_SLOTS {
            return Err(Error::config(format!(
                "page size {} outside 1..={MAX_PAGE_SLOTS}",
                config.page_size
            )));
        }
        let slots = hash::next_power_of_two(config.page_size);
        let record_size = codec.size();

        let mut pages = Pages::new(
            config.initial_pages,
            slots,
            record_size,
            config.reset_on_free,
        );
        let cursor = Cursor::new(&mut pages);
        debug!(
            record_size,
            slots,
            initial_pages = config.initial_pages,
            reset_on_free = config.reset_on_free,
            "slab created"
        );

        Ok(Self {
            codec,
            pages,
            cursor,
            addressing: Addressing::new(slots),
            live: 0,
        })
    }

    /// Allocate the slot under the cursor and return its index with a view
    /// bound to it.
    ///
    /// The record holds whatever the slot last held (zeros when the page was
    /// reset on free).
    pub fn create(&mut self) -> (u32, RecordMut<'_>) {
        let index = self.cursor.index();
        let page = self.cursor.page();
        let slot = self.cursor.slot();
        self.cursor.wrap_at_cursor(&mut self.pages);
        self.cursor.increment(&mut self.pages);
        self.live += 1;
        (index, RecordMut::new(self.pages.page_mut(page).get_at_mut(slot)))
    }

    /// View of the record at `index`.
    #[inline]
    pub fn get_at(&self, index: u32) -> RecordRef<'_> {
        RecordRef::new(self.record(index))
    }

    #[inline]
    pub fn get_at_mut(&mut self, index: u32) -> RecordMut<'_> {
        let (page, slot) = self.addressing.decode(index);
        RecordMut::new(self.pages.page_mut(page).get_at_mut(slot))
    }

    /// Rebind `view` onto the record at `index`.
    #[inline]
    pub fn wrap_at<'a>(&'a self, index: u32, view: &mut RecordRef<'a>) {
        let record = self.record(index);
        view.wrap(record, 0, record.len());
    }

    #[inline]
    fn record(&self, index: u32) -> &[u8] {
        let (page, slot) = self.addressing.decode(index);
        self.pages.page(page).get_at(slot)
    }

    /// Free the slot at `index`.
    ///
    /// A page whose last record goes is queued for reuse, unless the cursor
    /// is still filling it.
    pub fn remove_at(&mut self, index: u32) {
        let (page, slot) = self.addressing.decode(index);
        let Some(remaining) = self.pages.page_mut(page).remove_at(slot) else {
            return;
        };
        self.live -= 1;
        if remaining == 0 && page != self.cursor.page() {
            self.pages.release(page);
        }
    }

    /// Whether `index` currently holds a record.
    pub fn is_live(&self, index: u32) -> bool {
        let (page, slot) = self.addressing.decode(index);
        (page as usize) < self.pages.len() && self.pages.page(page).is_occupied(slot)
    }

    /// Key hash of the record at `index`.
    #[inline]
    pub fn key_hash_at(&self, index: u32) -> i32 {
        self.codec.key_hash(self.record(index))
    }

    /// Whether the key of the record at `index` equals `key`.
    #[inline]
    pub fn equals_underlying(&self, index: u32, key: &[u8]) -> bool {
        hash::words_eq(self.codec.key(self.record(index)), key)
    }

    #[inline]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    #[inline]
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    /// Slots per page.
    #[inline]
    pub fn page_capacity(&self) -> usize {
        self.addressing.slots()
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.pages.free_count()
    }

    /// Live records.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Index the next `create` will return.
    #[inline]
    pub fn cursor_index(&self) -> u32 {
        self.cursor.index()
    }

    #[cfg(test)]
    pub(crate) fn pages(&self) -> &Pages<M> {
        &self.pages
    }
}
