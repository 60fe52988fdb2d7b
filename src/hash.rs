//! Word-stepped hashing and comparison over raw key bytes.
//!
//! Keys are read as little-endian 8-byte words. Bytes past the last full word
//! are folded in one at a time as signed values.

/// Initial accumulator for every key hash.
pub const HASH_SEED: i32 = 19;

const WORD: usize = 8;

#[inline]
fn read_word(bytes: &[u8], at: usize) -> u64 {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[at..at + WORD]);
    u64::from_le_bytes(word)
}

#[inline]
fn fold_word(hash: i32, word: u64) -> i32 {
    hash.wrapping_mul(31)
        .wrapping_add((word ^ (word >> 32)) as u32 as i32)
}

#[inline]
fn fold_tail(mut hash: i32, tail: &[u8]) -> i32 {
    for &b in tail {
        hash = hash.wrapping_mul(31).wrapping_add(b as i8 as i32);
    }
    hash
}

/// Hash `bytes` up to the first all-zero word.
///
/// Key content is null-terminated and the padding after it is always zero, so
/// the cost is proportional to the logical key length rather than to the
/// capacity of the buffer.
pub fn hash_words_short_circuit(bytes: &[u8]) -> i32 {
    let end = bytes.len() & !(WORD - 1);
    let mut hash = HASH_SEED;
    let mut i = 0;
    while i < end {
        let word = read_word(bytes, i);
        if word == 0 {
            return hash;
        }
        hash = fold_word(hash, word);
        i += WORD;
    }
    fold_tail(hash, &bytes[end..])
}

/// Compare two equal-length byte ranges a word at a time, then byte by byte.
#[inline]
pub fn words_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let end = a.len() & !(WORD - 1);
    let mut i = 0;
    while i < end {
        if read_word(a, i) != read_word(b, i) {
            return false;
        }
        i += WORD;
    }
    a[end..] == b[end..]
}

/// Compare two zero-padded buffers over the shorter one's length.
///
/// Stops with a match at the first word that is zero on both sides. Both
/// inputs must be zero-padded past their content; a longer buffer whose extra
/// region holds non-zero bytes still compares equal to its prefix.
pub fn padded_eq(a: &[u8], b: &[u8]) -> bool {
    let len = a.len().min(b.len());
    let end = len & !(WORD - 1);
    let mut i = 0;
    while i < end {
        let word = read_word(a, i);
        if word != read_word(b, i) {
            return false;
        }
        if word == 0 {
            return true;
        }
        i += WORD;
    }
    a[end..len] == b[end..len]
}

/// Spread a 32-bit hash over the table and mask it to a slot.
#[inline]
pub fn spread(hash: i32, mask: usize) -> usize {
    let mut x = hash as u32;
    x = ((x >> 16) ^ x).wrapping_mul(0x119d_e1f3);
    x = ((x >> 16) ^ x).wrapping_mul(0x119d_e1f3);
    x = (x >> 16) ^ x;
    (x as usize) & mask
}

/// Round up to the next power of two, treating zero as one.
#[inline]
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}
