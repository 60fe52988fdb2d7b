//! # offslab
//!
//! Fixed-slot record storage outside the allocator's object graph, with
//! open-addressing indexes over it.
//!
//! - [`Slab`]: a paged arena of fixed-size records addressed by `u32` index.
//!   Pages are recycled through a FIFO free queue; steady-state create and
//!   remove never allocate.
//! - [`SlabKeyStore`]: a hash index from record keys to slab indices. It stores
//!   only indices and compares keys against the records themselves.
//! - [`OffHeapMap`]: a self-contained map from fixed-width keys to fixed-width
//!   values, both stored inline in one block.
//!
//! Record layouts are described by a [`Codec`] and accessed through the
//! zero-copy [`RecordRef`] / [`RecordMut`] views. [`AsciiKey`] is a
//! fixed-capacity, zero-padded key buffer whose hash and equality step a word
//! at a time.
//!
//! ## Example
//!
//! ```rust
//! use offslab::{AsciiKey, AsciiKeyCodec, OffHeapMap, Slab, SlabConfig, SlabKeyStore, TableConfig};
//!
//! let codec = AsciiKeyCodec::new(16)?;
//! let mut slab: Slab<AsciiKeyCodec> = Slab::new(codec, SlabConfig::default())?;
//! let mut index = SlabKeyStore::new(TableConfig::default())?;
//!
//! let (id, mut record) = slab.create();
//! record.ascii_mut(0, 16)?.set("ORDER-1")?;
//! index.insert(&slab, id);
//!
//! let key = AsciiKey::with_content(16, "ORDER-1")?;
//! assert_eq!(index.find(&slab, key.raw()), Some(id));
//!
//! assert!(index.remove_at(&slab, id));
//! slab.remove_at(id);
//!
//! let mut positions: OffHeapMap<AsciiKeyCodec> = OffHeapMap::with_codec(codec)?;
//! positions.put(key.raw(), 100)?;
//! assert_eq!(positions.get(key.raw()), Some(100));
//! # Ok::<(), offslab::Error>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

pub mod codec;
pub mod error;
pub mod hash;
pub mod key;
pub mod key_store;
pub mod map;
pub mod memory;
pub mod probe;
pub mod slab;

pub use codec::{Codec, RecordMut, RecordRef};
pub use error::{Error, Result};
pub use key::{AsciiKey, AsciiKeyCodec};
pub use key_store::SlabKeyStore;
pub use map::{OffHeapMap, Value};
pub use memory::{AnonBlock, Block, HeapBlock};
pub use probe::TableConfig;
pub use slab::{Addressing, Slab, SlabConfig};

#[cfg(test)]
mod proptests;
