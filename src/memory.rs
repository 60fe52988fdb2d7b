//! Storage backends for pages and tables.
//!
//! A [`Block`] is a fixed-length, zero-initialised byte region owned by exactly
//! one page or table and released when that owner is dropped. Growing a table
//! means allocating a new block and dropping the old one; blocks never resize.

use memmap2::MmapMut;
use tracing::error;

/// A fixed-length byte region with manual lifetime.
pub trait Block: Sized {
    /// Allocate `len` zeroed bytes.
    ///
    /// Exhausting host memory is fatal: implementations abort or panic rather
    /// than return.
    fn allocate(len: usize) -> Self;

    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    #[inline]
    fn len(&self) -> usize {
        self.bytes().len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero the whole region.
    fn zero(&mut self) {
        self.bytes_mut().fill(0);
    }
}

/// Block backed by a boxed slice from the global allocator.
pub struct HeapBlock(Box<[u8]>);

impl Block for HeapBlock {
    fn allocate(len: usize) -> Self {
        HeapBlock(vec![0u8; len].into_boxed_slice())
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Block backed by a private anonymous mapping, outside the allocator heap.
///
/// The mapping is unmapped on drop. Fresh anonymous pages are zero-filled by
/// the kernel.
pub struct AnonBlock(MmapMut);

impl Block for AnonBlock {
    fn allocate(len: usize) -> Self {
        match MmapMut::map_anon(len) {
            Ok(map) => AnonBlock(map),
            Err(err) => {
                error!(len, %err, "anonymous mapping failed");
                panic!("anonymous mapping of {len} bytes failed: {err}");
            }
        }
    }

    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
