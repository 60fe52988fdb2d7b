//! Fixed-size record layouts and zero-copy views over them.
//!
//! A [`Codec`] describes a record: its size and the sub-range holding its key.
//! It never owns record bytes. Records are read and written through
//! [`RecordRef`] and [`RecordMut`], which borrow a byte range owned by a slab
//! page, a table, or any caller buffer. Rebinding a view with `wrap` is O(1)
//! and copies nothing; the borrow ties the view to the storage it points into,
//! so a view can never outlive a later mutation of that storage.

use crate::error::{Error, Result};
use crate::hash;
use crate::key::AsciiKey;

/// Largest record size, in bytes. Sizes must fit a signed 16-bit width.
pub const MAX_RECORD_SIZE: usize = i16::MAX as usize;

/// A fixed-size binary record layout.
pub trait Codec {
    /// Record size in bytes.
    fn size(&self) -> usize;

    /// Offset of the key inside the record.
    fn key_offset(&self) -> usize {
        0
    }

    /// Length of the key in bytes.
    fn key_len(&self) -> usize {
        self.size() - self.key_offset()
    }

    /// Hash bare key bytes.
    ///
    /// Every table hashes through this, so a record and its bare key always
    /// land in the same slot.
    fn hash_key(&self, key: &[u8]) -> i32 {
        hash::hash_words_short_circuit(key)
    }

    /// The key sub-range of `record`.
    #[inline]
    fn key<'r>(&self, record: &'r [u8]) -> &'r [u8] {
        let offset = self.key_offset();
        &record[offset..offset + self.key_len()]
    }

    /// Hash of the key stored in `record`.
    #[inline]
    fn key_hash(&self, record: &[u8]) -> i32 {
        self.hash_key(self.key(record))
    }
}

/// Check that a codec describes a representable record with a non-empty key
/// range inside it.
pub(crate) fn validate<C: Codec>(codec: &C) -> Result<()> {
    let size = codec.size();
    if size == 0 || size > MAX_RECORD_SIZE {
        return Err(Error::config(format!(
            "record size {size} outside 1..={MAX_RECORD_SIZE}"
        )));
    }
    let (offset, len) = (codec.key_offset(), codec.key_len());
    if len == 0 || offset.checked_add(len).map_or(true, |end| end > size) {
        return Err(Error::config(format!(
            "key range {offset}+{len} does not fit record of {size} bytes"
        )));
    }
    Ok(())
}

#[inline]
fn sub_range(len: usize, offset: usize, sub_len: usize) -> Result<std::ops::Range<usize>> {
    match offset.checked_add(sub_len) {
        Some(end) if end <= len => Ok(offset..end),
        _ => Err(Error::Index {
            index: offset.saturating_add(sub_len),
            len,
        }),
    }
}

macro_rules! getters {
    ($($get:ident => $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $get(&self, at: usize) -> $ty {
                const N: usize = std::mem::size_of::<$ty>();
                let mut raw = [0u8; N];
                raw.copy_from_slice(&self.bytes[at..at + N]);
                <$ty>::from_le_bytes(raw)
            }
        )*
    };
}

macro_rules! putters {
    ($($put:ident => $ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $put(&mut self, at: usize, value: $ty) {
                const N: usize = std::mem::size_of::<$ty>();
                self.bytes[at..at + N].copy_from_slice(&value.to_le_bytes());
            }
        )*
    };
}

/// Read-only view over one record.
///
/// Field accessors are little-endian and panic when `at` runs past the record,
/// like slice indexing.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordRef<'a> {
    bytes: &'a [u8],
}

impl<'a> RecordRef<'a> {
    #[inline]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Rebind this view onto `buffer[offset..offset + length]`.
    #[inline]
    pub fn wrap(&mut self, buffer: &'a [u8], offset: usize, length: usize) {
        self.bytes = &buffer[offset..offset + length];
    }

    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Key sub-range of this record under `codec`.
    ///
    /// Panics when the view is shorter than a full record; see
    /// [`try_key`](Self::try_key).
    #[inline]
    pub fn key<C: Codec>(&self, codec: &C) -> &'a [u8] {
        codec.key(self.bytes)
    }

    /// Key sub-range, or [`Error::KeyWidth`] when the view holds fewer than
    /// `codec.size()` bytes.
    pub fn try_key<C: Codec>(&self, codec: &C) -> Result<&'a [u8]> {
        let size = codec.size();
        if self.bytes.len() < size {
            return Err(Error::KeyWidth {
                expected: size,
                actual: self.bytes.len(),
            });
        }
        Ok(codec.key(self.bytes))
    }

    #[inline]
    pub fn key_hash<C: Codec>(&self, codec: &C) -> i32 {
        codec.key_hash(self.bytes)
    }

    /// `length` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        let range = sub_range(self.bytes.len(), offset, length)?;
        Ok(&self.bytes[range])
    }

    /// ASCII key view over `length` bytes at `offset`.
    pub fn ascii(&self, offset: usize, length: usize) -> Result<AsciiKey<&'a [u8]>> {
        AsciiKey::wrap(self.slice(offset, length)?)
    }

    getters! {
        get_u8 => u8,
        get_i16 => i16,
        get_u16 => u16,
        get_i32 => i32,
        get_u32 => u32,
        get_i64 => i64,
        get_u64 => u64,
    }
}

/// Mutable view over one record.
#[derive(Debug, Default)]
pub struct RecordMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> RecordMut<'a> {
    #[inline]
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Rebind this view onto `buffer[offset..offset + length]`.
    #[inline]
    pub fn wrap(&mut self, buffer: &'a mut [u8], offset: usize, length: usize) {
        self.bytes = &mut buffer[offset..offset + length];
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &*self.bytes
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reborrow as a read-only view.
    #[inline]
    pub fn view(&self) -> RecordRef<'_> {
        RecordRef::new(&*self.bytes)
    }

    /// Give up mutability, keeping the original borrow.
    #[inline]
    pub fn into_ref(self) -> RecordRef<'a> {
        RecordRef::new(self.bytes)
    }

    #[inline]
    pub fn key<C: Codec>(&self, codec: &C) -> &[u8] {
        codec.key(&*self.bytes)
    }

    #[inline]
    pub fn key_hash<C: Codec>(&self, codec: &C) -> i32 {
        codec.key_hash(&*self.bytes)
    }

    /// Zero the whole record.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Copy `src` in at `offset`. Nothing is written when it does not fit.
    pub fn put_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let range = sub_range(self.bytes.len(), offset, src.len()).map_err(|_| Error::Capacity {
            len: offset.saturating_add(src.len()),
            capacity: self.bytes.len(),
        })?;
        self.bytes[range].copy_from_slice(src);
        Ok(())
    }

    pub fn slice(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let range = sub_range(self.bytes.len(), offset, length)?;
        Ok(&self.bytes[range])
    }

    pub fn ascii(&self, offset: usize, length: usize) -> Result<AsciiKey<&[u8]>> {
        AsciiKey::wrap(self.slice(offset, length)?)
    }

    /// Writable ASCII key view over `length` bytes at `offset`.
    pub fn ascii_mut(&mut self, offset: usize, length: usize) -> Result<AsciiKey<&mut [u8]>> {
        let range = sub_range(self.bytes.len(), offset, length)?;
        AsciiKey::wrap(&mut self.bytes[range])
    }

    getters! {
        get_u8 => u8,
        get_i16 => i16,
        get_u16 => u16,
        get_i32 => i32,
        get_u32 => u32,
        get_i64 => i64,
        get_u64 => u64,
    }

    putters! {
        put_u8 => u8,
        put_i16 => i16,
        put_u16 => u16,
        put_i32 => i32,
        put_u32 => u32,
        put_i64 => i64,
        put_u64 => u64,
    }
}
