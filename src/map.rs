//! Fixed-width key to fixed-width value hash map in a single block.
//!
//! Entry layout, for a codec key of `k` bytes and a value of `v` bytes:
//!
//! ```text
//! [occupied:1][key:k][value:v]
//! ```
//!
//! Entries sit back to back in one [`Block`]. Deletion uses backward shift,
//! so there are no tombstones and `len` always equals the number of occupied
//! entries.

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::codec::{self, Codec, RecordRef};
use crate::error::{Error, Result};
use crate::hash;
use crate::memory::{Block, HeapBlock};
use crate::probe::{self, Slots, TableConfig};

const OCCUPIED_SIZE: usize = 1;

/// A fixed-width value stored inline in a map entry.
pub trait Value: Copy + PartialEq + fmt::Debug {
    /// Width in bytes.
    const WIDTH: usize;

    /// Decode from exactly [`WIDTH`](Self::WIDTH) bytes.
    fn read(bytes: &[u8]) -> Self;

    /// Encode into exactly [`WIDTH`](Self::WIDTH) bytes.
    fn write(self, bytes: &mut [u8]);
}

macro_rules! impl_value {
    ($($ty:ty),*) => {
        $(
            impl Value for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn write(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_value!(i32, u32, i64, u64);

/// Byte geometry of one entry.
#[derive(Clone, Copy, Debug)]
struct Layout {
    key_len: usize,
    entry_size: usize,
}

impl Layout {
    #[inline]
    fn offset(&self, slot: usize) -> usize {
        slot * self.entry_size
    }

    #[inline]
    fn key_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.offset(slot) + OCCUPIED_SIZE;
        start..start + self.key_len
    }

    #[inline]
    fn value_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.offset(slot) + OCCUPIED_SIZE + self.key_len;
        start..self.offset(slot) + self.entry_size
    }
}

/// Slot view over a map block for compaction.
struct Entries<'t, C, M> {
    block: &'t mut M,
    codec: &'t C,
    layout: Layout,
    capacity: usize,
}

impl<C: Codec, M: Block> Slots for Entries<'_, C, M> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn is_vacant(&self, slot: usize) -> bool {
        self.block.bytes()[self.layout.offset(slot)] == 0
    }

    fn home(&self, slot: usize) -> usize {
        let key = &self.block.bytes()[self.layout.key_range(slot)];
        hash::spread(self.codec.hash_key(key), self.capacity - 1)
    }

    fn relocate(&mut self, from: usize, to: usize) {
        let (src, dst) = (self.layout.offset(from), self.layout.offset(to));
        let bytes = self.block.bytes_mut();
        bytes.copy_within(src..src + self.layout.entry_size, dst);
        bytes[src] = 0;
    }
}

/// Open-addressing map from the key range of codec `C` to a [`Value`].
///
/// Keys are exactly `codec.key_len()` bytes. Everything, keys included, lives
/// in one block of `M`; nothing is allocated per entry.
pub struct OffHeapMap<C, V = i32, M = HeapBlock> {
    codec: C,
    block: M,
    layout: Layout,
    capacity: usize,
    len: usize,
    limit: usize,
    load_factor: f32,
    _value: PhantomData<V>,
}

impl<C: Codec, V: Value, M: Block> OffHeapMap<C, V, M> {
    pub fn new(codec: C, config: TableConfig) -> Result<Self> {
        codec::validate(&codec)?;
        let capacity = config.capacity()?;
        let key_len = codec.key_len();
        let layout = Layout {
            key_len,
            entry_size: OCCUPIED_SIZE + key_len + V::WIDTH,
        };
        debug!(
            key_len,
            value_width = V::WIDTH,
            capacity,
            load_factor = config.load_factor,
            "off-heap map created"
        );
        Ok(Self {
            codec,
            block: M::allocate(capacity * layout.entry_size),
            layout,
            capacity,
            len: 0,
            limit: probe::resize_limit(capacity, config.load_factor),
            load_factor: config.load_factor,
            _value: PhantomData,
        })
    }

    /// Map with the default table configuration.
    pub fn with_codec(codec: C) -> Result<Self> {
        Self::new(codec, TableConfig::default())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        let expected = self.layout.key_len;
        if key.len() > expected {
            return Err(Error::Capacity {
                len: key.len(),
                capacity: expected,
            });
        }
        if key.len() < expected {
            return Err(Error::KeyWidth {
                expected,
                actual: key.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn is_occupied(&self, slot: usize) -> bool {
        self.block.bytes()[self.layout.offset(slot)] != 0
    }

    #[inline]
    fn key_at(&self, slot: usize) -> &[u8] {
        &self.block.bytes()[self.layout.key_range(slot)]
    }

    #[inline]
    fn value_at(&self, slot: usize) -> V {
        V::read(&self.block.bytes()[self.layout.value_range(slot)])
    }

    /// Probe for `key`. `Ok(slot)` holds the key, `Err(slot)` is the vacant
    /// slot that ended the probe.
    fn probe(&self, key: &[u8]) -> std::result::Result<usize, usize> {
        let mask = self.capacity - 1;
        let mut slot = hash::spread(self.codec.hash_key(key), mask);
        while self.is_occupied(slot) {
            if hash::words_eq(self.key_at(slot), key) {
                return Ok(slot);
            }
            slot = (slot + 1) & mask;
        }
        Err(slot)
    }

    /// Insert or overwrite. Returns the previous value.
    ///
    /// `key` must be exactly the codec key width; nothing is written
    /// otherwise.
    pub fn put(&mut self, key: &[u8], value: V) -> Result<Option<V>> {
        self.check_key(key)?;
        match self.probe(key) {
            Ok(slot) => {
                let previous = self.value_at(slot);
                let range = self.layout.value_range(slot);
                value.write(&mut self.block.bytes_mut()[range]);
                Ok(Some(previous))
            }
            Err(slot) => {
                let (at, keys, values) = (
                    self.layout.offset(slot),
                    self.layout.key_range(slot),
                    self.layout.value_range(slot),
                );
                let bytes = self.block.bytes_mut();
                bytes[at] = 1;
                bytes[keys].copy_from_slice(key);
                value.write(&mut bytes[values]);
                self.len += 1;
                if self.len > self.limit {
                    self.rehash();
                }
                Ok(None)
            }
        }
    }

    /// Insert keyed by the key range of `record`.
    ///
    /// Fails with [`Error::KeyWidth`] when `record` is shorter than the codec
    /// size.
    pub fn put_record(&mut self, record: RecordRef<'_>, value: V) -> Result<Option<V>> {
        let key = record.try_key(&self.codec)?;
        self.put(key, value)
    }

    /// Value for `key`. A key of the wrong width is never found.
    pub fn get(&self, key: &[u8]) -> Option<V> {
        if key.len() != self.layout.key_len {
            return None;
        }
        self.probe(key).ok().map(|slot| self.value_at(slot))
    }

    /// Value keyed by `record`. A record shorter than the codec size is never
    /// found.
    pub fn get_record(&self, record: RecordRef<'_>) -> Option<V> {
        self.get(record.try_key(&self.codec).ok()?)
    }

    #[inline]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Linear scan over every slot.
    pub fn contains_value(&self, value: V) -> bool {
        (0..self.capacity).any(|slot| self.is_occupied(slot) && self.value_at(slot) == value)
    }

    /// Remove `key` and return its value.
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        if key.len() != self.layout.key_len {
            return None;
        }
        let slot = self.probe(key).ok()?;
        let value = self.value_at(slot);
        let at = self.layout.offset(slot);
        self.block.bytes_mut()[at] = 0;
        self.len -= 1;
        let mut entries = Entries {
            block: &mut self.block,
            codec: &self.codec,
            layout: self.layout,
            capacity: self.capacity,
        };
        probe::backward_shift(&mut entries, slot);
        Some(value)
    }

    pub fn remove_record(&mut self, record: RecordRef<'_>) -> Option<V> {
        let key = record.try_key(&self.codec).ok()?;
        self.remove(key)
    }

    /// Drop every entry. Capacity is kept.
    pub fn clear(&mut self) {
        self.block.zero();
        self.len = 0;
    }

    /// Grow the table into a fresh block.
    fn rehash(&mut self) {
        let capacity = probe::grown_capacity(self.capacity, self.len, self.load_factor);
        let mask = capacity - 1;
        let layout = self.layout;
        let mut block = M::allocate(capacity * layout.entry_size);
        {
            let dst = block.bytes_mut();
            for slot in (0..self.capacity).filter(|&slot| self.is_occupied(slot)) {
                let mut target = hash::spread(self.codec.hash_key(self.key_at(slot)), mask);
                while dst[layout.offset(target)] != 0 {
                    target = (target + 1) & mask;
                }
                let src = layout.offset(slot);
                let at = layout.offset(target);
                dst[at..at + layout.entry_size]
                    .copy_from_slice(&self.block.bytes()[src..src + layout.entry_size]);
            }
        }
        self.block = block;
        self.capacity = capacity;
        self.limit = probe::resize_limit(capacity, self.load_factor);
        debug!(capacity, len = self.len, "off-heap map rehashed");
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Table slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Whether every entry is reachable from its home slot and the size
    /// matches the occupied slots.
    #[cfg(test)]
    pub(crate) fn is_consistent(&mut self) -> bool {
        let occupied = (0..self.capacity).filter(|&s| self.is_occupied(s)).count();
        let entries = Entries {
            block: &mut self.block,
            codec: &self.codec,
            layout: self.layout,
            capacity: self.capacity,
        };
        occupied == self.len && probe::all_reachable(&entries)
    }
}

impl<C, V, M> fmt::Debug for OffHeapMap<C, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffHeapMap")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("key_len", &self.layout.key_len)
            .finish()
    }
}
