//! Fixed-capacity, zero-padded ASCII keys.
//!
//! An [`AsciiKey`] is a word-aligned byte buffer whose logical content is the
//! prefix up to the first zero byte. Everything after the content is zero, which
//! lets hashing and equality step a word at a time and stop at the first zero
//! word. The buffer can be owned (`Box<[u8]>`) or borrowed from a record.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::hash;

/// Key capacities must be a multiple of this.
pub const KEY_ALIGN: usize = 8;

fn check_aligned(capacity: usize) -> Result<()> {
    if capacity % KEY_ALIGN != 0 {
        return Err(Error::config(format!(
            "key capacity {capacity} is not a multiple of {KEY_ALIGN}"
        )));
    }
    Ok(())
}

/// A fixed-capacity, zero-padded key over byte storage `B`.
#[derive(Clone)]
pub struct AsciiKey<B> {
    buf: B,
}

impl AsciiKey<Box<[u8]>> {
    /// Allocate an empty key of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        check_aligned(capacity)?;
        Ok(Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
        })
    }

    /// Allocate a key of `capacity` bytes holding `content`.
    pub fn with_content(capacity: usize, content: impl AsRef<[u8]>) -> Result<Self> {
        let mut key = Self::new(capacity)?;
        key.set(content)?;
        Ok(key)
    }
}

impl<B: AsRef<[u8]>> AsciiKey<B> {
    /// Bind a key view onto existing storage. The storage length is the
    /// capacity and must be word-aligned.
    pub fn wrap(buf: B) -> Result<Self> {
        check_aligned(buf.as_ref().len())?;
        Ok(Self { buf })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Full buffer, padding included.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        self.buf.as_ref()
    }

    /// Logical length: bytes before the first zero.
    pub fn len(&self) -> usize {
        let raw = self.raw();
        raw.iter().position(|&b| b == 0).unwrap_or(raw.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw().first().map_or(true, |&b| b == 0)
    }

    /// Logical content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw()[..self.len()]
    }

    pub fn char_at(&self, index: usize) -> Result<char> {
        let len = self.len();
        if index >= len {
            return Err(Error::Index { index, len });
        }
        Ok(self.raw()[index] as char)
    }

    /// Content bytes in `start..end`.
    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<&[u8]> {
        let len = self.len();
        if end > len {
            return Err(Error::Index { index: end, len });
        }
        if start > end {
            return Err(Error::Index { index: start, len });
        }
        Ok(&self.raw()[start..end])
    }

    /// Short-circuit word hash; stops at the first zero word.
    #[inline]
    pub fn key_hash(&self) -> i32 {
        hash::hash_words_short_circuit(self.raw())
    }

    /// Copy the whole buffer, padding included, into the front of `dst`.
    pub fn encode_to(&self, dst: &mut [u8]) -> Result<()> {
        let raw = self.raw();
        if raw.len() > dst.len() {
            return Err(Error::Capacity {
                len: raw.len(),
                capacity: dst.len(),
            });
        }
        dst[..raw.len()].copy_from_slice(raw);
        Ok(())
    }

    /// Copy into a freshly allocated key of the same capacity.
    pub fn to_owned_key(&self) -> AsciiKey<Box<[u8]>> {
        AsciiKey {
            buf: self.raw().to_vec().into_boxed_slice(),
        }
    }

    pub fn into_inner(self) -> B {
        self.buf
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> AsciiKey<B> {
    /// Replace the content with `src` and zero-pad the remainder.
    ///
    /// Fails without writing when `src` is longer than the capacity. `src`
    /// should not contain zero bytes; content ends at the first one.
    pub fn set(&mut self, src: impl AsRef<[u8]>) -> Result<()> {
        let src = src.as_ref();
        let capacity = self.capacity();
        if src.len() > capacity {
            return Err(Error::Capacity {
                len: src.len(),
                capacity,
            });
        }
        let buf = self.buf.as_mut();
        buf[..src.len()].copy_from_slice(src);
        buf[src.len()..].fill(0);
        Ok(())
    }

    /// Copy another key's full buffer in and zero-pad the remainder.
    pub fn set_key<O: AsRef<[u8]>>(&mut self, other: &AsciiKey<O>) -> Result<()> {
        self.set(other.raw())
    }

    /// Clear to the empty key.
    pub fn reset(&mut self) {
        self.buf.as_mut().fill(0);
    }
}

impl<A: AsRef<[u8]>, B: AsRef<[u8]>> PartialEq<AsciiKey<B>> for AsciiKey<A> {
    /// Compared a word at a time over the smaller capacity. Both keys must be
    /// properly zero-padded.
    fn eq(&self, other: &AsciiKey<B>) -> bool {
        hash::padded_eq(self.raw(), other.raw())
    }
}

impl<B: AsRef<[u8]>> Eq for AsciiKey<B> {}

impl<B: AsRef<[u8]>> Hash for AsciiKey<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.key_hash());
    }
}

impl<B: AsRef<[u8]>> fmt::Display for AsciiKey<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.as_bytes() {
            fmt::Write::write_char(f, b as char)?;
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]>> fmt::Debug for AsciiKey<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsciiKey({:?}, cap={})", self.to_string(), self.capacity())
    }
}

/// Record layout consisting of a single zero-padded key.
///
/// Lets bare keys live in a slab or key an [`crate::OffHeapMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AsciiKeyCodec {
    capacity: usize,
}

impl AsciiKeyCodec {
    pub fn new(capacity: usize) -> Result<Self> {
        check_aligned(capacity)?;
        if capacity == 0 {
            return Err(Error::config("key capacity must be positive"));
        }
        Ok(Self { capacity })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Codec for AsciiKeyCodec {
    #[inline]
    fn size(&self) -> usize {
        self.capacity
    }
}
