//! Hash index from record keys to slab indices.
//!
//! The table stores nothing but `u32` slab indices. Keys and hashes are always
//! re-read from the records in the slab, so the slab must be passed to every
//! call and must be the same slab each time.

use std::fmt;

use tracing::debug;

use crate::codec::{Codec, RecordRef};
use crate::error::Result;
use crate::hash;
use crate::memory::Block;
use crate::probe::{self, Slots, TableConfig};
use crate::slab::Slab;

/// Marker for an empty table slot.
pub const EMPTY: u32 = u32::MAX;

/// Open-addressing table of slab indices keyed by the records they point to.
///
/// Lookups compare the query key against the key stored in the slab record,
/// so an index must be inserted only after its record's key is written and
/// removed before the record is freed or its key changes.
pub struct SlabKeyStore {
    entries: Box<[u32]>,
    len: usize,
    limit: usize,
    load_factor: f32,
}

/// Slot view used for compaction and reachability checks.
struct Table<'t, C, M> {
    entries: &'t mut [u32],
    slab: &'t Slab<C, M>,
}

impl<C: Codec, M: Block> Slots for Table<'_, C, M> {
    fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn is_vacant(&self, slot: usize) -> bool {
        self.entries[slot] == EMPTY
    }

    fn home(&self, slot: usize) -> usize {
        let hash = self.slab.key_hash_at(self.entries[slot]);
        hash::spread(hash, self.entries.len() - 1)
    }

    fn relocate(&mut self, from: usize, to: usize) {
        self.entries[to] = self.entries[from];
        self.entries[from] = EMPTY;
    }
}

impl SlabKeyStore {
    pub fn new(config: TableConfig) -> Result<Self> {
        let capacity = config.capacity()?;
        Ok(Self {
            entries: vec![EMPTY; capacity].into_boxed_slice(),
            len: 0,
            limit: probe::resize_limit(capacity, config.load_factor),
            load_factor: config.load_factor,
        })
    }

    #[inline]
    fn mask(&self) -> usize {
        self.entries.len() - 1
    }

    /// Register `slab_index`, whose record must already hold its key.
    ///
    /// Inserting an index that is already present does nothing.
    pub fn insert<C: Codec, M: Block>(&mut self, slab: &Slab<C, M>, slab_index: u32) {
        debug_assert_ne!(slab_index, EMPTY);
        let mask = self.mask();
        let mut slot = hash::spread(slab.key_hash_at(slab_index), mask);
        loop {
            match self.entries[slot] {
                EMPTY => break,
                existing if existing == slab_index => return,
                _ => slot = (slot + 1) & mask,
            }
        }
        self.entries[slot] = slab_index;
        self.len += 1;
        if self.len > self.limit {
            self.rehash(slab);
        }
    }

    /// Slot holding the entry whose record key equals `key`.
    fn locate_key<C: Codec, M: Block>(
        &self,
        slab: &Slab<C, M>,
        key: &[u8],
        hash: i32,
    ) -> Option<usize> {
        let mask = self.mask();
        let mut slot = hash::spread(hash, mask);
        loop {
            match self.entries[slot] {
                EMPTY => return None,
                existing if slab.equals_underlying(existing, key) => return Some(slot),
                _ => slot = (slot + 1) & mask,
            }
        }
    }

    /// Slot holding exactly `slab_index`, probing from `hash`.
    fn locate_index(&self, slab_index: u32, hash: i32) -> Option<usize> {
        let mask = self.mask();
        let mut slot = hash::spread(hash, mask);
        loop {
            match self.entries[slot] {
                EMPTY => return None,
                existing if existing == slab_index => return Some(slot),
                _ => slot = (slot + 1) & mask,
            }
        }
    }

    /// Clear `slot` and compact its cluster. Returns the slab index it held.
    fn take<C: Codec, M: Block>(&mut self, slab: &Slab<C, M>, slot: usize) -> u32 {
        let slab_index = self.entries[slot];
        self.entries[slot] = EMPTY;
        self.len -= 1;
        let mut table = Table {
            entries: &mut self.entries[..],
            slab,
        };
        probe::backward_shift(&mut table, slot);
        slab_index
    }

    /// Index of the record whose key equals the key range of `record`.
    ///
    /// A view shorter than the codec size is never found.
    pub fn wrap_from_key<C: Codec, M: Block>(
        &self,
        slab: &Slab<C, M>,
        record: RecordRef<'_>,
    ) -> Option<u32> {
        let codec = slab.codec();
        let key = record.try_key(codec).ok()?;
        self.find_hashed(slab, key, codec.hash_key(key))
    }

    /// Index of the record whose key equals `key`.
    ///
    /// `key` must span the full key width, padding included.
    pub fn find<C: Codec, M: Block>(&self, slab: &Slab<C, M>, key: &[u8]) -> Option<u32> {
        self.find_hashed(slab, key, slab.codec().hash_key(key))
    }

    /// Like [`find`](Self::find) with a precomputed `hash`.
    pub fn find_hashed<C: Codec, M: Block>(
        &self,
        slab: &Slab<C, M>,
        key: &[u8],
        hash: i32,
    ) -> Option<u32> {
        self.locate_key(slab, key, hash).map(|slot| self.entries[slot])
    }

    /// Remove the entry keyed like `record` and return its slab index.
    pub fn remove_codec<C: Codec, M: Block>(
        &mut self,
        slab: &Slab<C, M>,
        record: RecordRef<'_>,
    ) -> Option<u32> {
        let codec = slab.codec();
        let key = record.try_key(codec).ok()?;
        self.remove_key_hashed(slab, key, codec.hash_key(key))
    }

    pub fn remove_key<C: Codec, M: Block>(&mut self, slab: &Slab<C, M>, key: &[u8]) -> Option<u32> {
        self.remove_key_hashed(slab, key, slab.codec().hash_key(key))
    }

    pub fn remove_key_hashed<C: Codec, M: Block>(
        &mut self,
        slab: &Slab<C, M>,
        key: &[u8],
        hash: i32,
    ) -> Option<u32> {
        let slot = self.locate_key(slab, key, hash)?;
        Some(self.take(slab, slot))
    }

    /// Remove `slab_index`, hashing the key its record currently holds.
    pub fn remove_at<C: Codec, M: Block>(&mut self, slab: &Slab<C, M>, slab_index: u32) -> bool {
        let hash = slab.key_hash_at(slab_index);
        self.remove_hashed(slab, slab_index, hash)
    }

    /// Remove `slab_index`, hashing the key of `record` to find it.
    ///
    /// Useful when `record` is a copy of what was inserted and the slab
    /// record may already have been rewritten.
    pub fn remove<C: Codec, M: Block>(
        &mut self,
        slab: &Slab<C, M>,
        slab_index: u32,
        record: RecordRef<'_>,
    ) -> bool {
        let codec = slab.codec();
        let Ok(key) = record.try_key(codec) else {
            return false;
        };
        self.remove_hashed(slab, slab_index, codec.hash_key(key))
    }

    fn remove_hashed<C: Codec, M: Block>(
        &mut self,
        slab: &Slab<C, M>,
        slab_index: u32,
        hash: i32,
    ) -> bool {
        match self.locate_index(slab_index, hash) {
            Some(slot) => {
                self.take(slab, slot);
                true
            }
            None => false,
        }
    }

    /// Grow the table, re-reading each entry's hash from the slab.
    fn rehash<C: Codec, M: Block>(&mut self, slab: &Slab<C, M>) {
        let capacity = probe::grown_capacity(self.entries.len(), self.len, self.load_factor);
        let mask = capacity - 1;
        let mut entries = vec![EMPTY; capacity].into_boxed_slice();
        for &slab_index in self.entries.iter().filter(|&&e| e != EMPTY) {
            let mut slot = hash::spread(slab.key_hash_at(slab_index), mask);
            while entries[slot] != EMPTY {
                slot = (slot + 1) & mask;
            }
            entries[slot] = slab_index;
        }
        self.entries = entries;
        self.limit = probe::resize_limit(capacity, self.load_factor);
        debug!(capacity, len = self.len, "key store rehashed");
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
        self.entries.len()
    }

    /// Whether every entry is reachable from its home slot and the size
    /// matches the occupied slots.
    #[cfg(test)]
    pub(crate) fn is_consistent<C: Codec, M: Block>(&mut self, slab: &Slab<C, M>) -> bool {
        let occupied = self.entries.iter().filter(|&&e| e != EMPTY).count();
        let table = Table {
            entries: &mut self.entries[..],
            slab,
        };
        occupied == self.len && probe::all_reachable(&table)
    }
}

impl fmt::Debug for SlabKeyStore {
    /// Dumps the table, empty slots as `-1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Dump<'a>(&'a [u32]);
        impl fmt::Debug for Dump<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_list().entries(self.0.iter().map(|&e| e as i32)).finish()
            }
        }
        f.debug_struct("SlabKeyStore")
            .field("len", &self.len)
            .field("capacity", &self.entries.len())
            .field("entries", &Dump(&self.entries))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_codecs::*;
    use crate::codec::RecordMut;
    use crate::slab::SlabConfig;

    fn order_slab() -> Slab<OrderCodec> {
        let config = SlabConfig {
            page_size: 64,
            initial_pages: 4,
            reset_on_free: true,
        };
        Slab::new(OrderCodec, config).unwrap()
    }

    fn insert_order(slab: &mut Slab<OrderCodec>, store: &mut SlabKeyStore, key: &str) -> u32 {
        let (index, mut record) = slab.create();
        write_order(&mut record, key, 0, 0);
        store.insert(slab, index);
        index
    }

    #[test]
    fn test_insert_then_lookup() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig {
            initial_capacity: 8,
            load_factor: 0.65,
        })
        .unwrap();

        for i in 0..10 {
            assert_eq!(insert_order(&mut slab, &mut store, &i.to_string()), i);
        }
        assert_eq!(store.len(), 10);
        assert_eq!(store.capacity(), 16);

        let mut buffer = vec![0u8; OrderCodec.size()];
        for i in 0..10u32 {
            let key = order_key(&i.to_string());
            assert_eq!(store.find(&slab, &key), Some(i));
            assert_eq!(store.find_hashed(&slab, &key, OrderCodec.hash_key(&key)), Some(i));

            let mut probe = RecordMut::new(&mut buffer);
            write_order(&mut probe, &i.to_string(), 0, 0);
            assert_eq!(store.wrap_from_key(&slab, probe.view()), Some(i));
        }

        for missing in ["MISS", "INVALID"] {
            let mut probe = RecordMut::new(&mut buffer);
            write_order(&mut probe, missing, 0, 0);
            assert_eq!(store.wrap_from_key(&slab, probe.view()), None);
        }

        for i in 0..10u32 {
            let mut probe = RecordMut::new(&mut buffer);
            write_order(&mut probe, &i.to_string(), 0, 0);
            assert_eq!(store.remove_codec(&slab, probe.view()), Some(i));
            assert!(store.is_consistent(&slab));
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();
        let index = insert_order(&mut slab, &mut store, "ABC123");
        store.insert(&slab, index);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_wrong_width_key_is_never_found() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();
        insert_order(&mut slab, &mut store, "ABC");
        assert_eq!(store.find(&slab, b"ABC"), None);
        assert_eq!(store.find(&slab, &[0u8; 8]), None);
        assert!(store.find(&slab, &order_key("ABC")).is_some());
    }

    #[test]
    fn test_growth_once_per_threshold() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();
        let mut expected = 8;
        for i in 0..200 {
            insert_order(&mut slab, &mut store, &format!("K{i}"));
            while store.len() > probe::resize_limit(expected, 0.5) {
                expected *= 2;
            }
            assert_eq!(store.capacity(), expected, "after {} inserts", i + 1);
            assert!(store.len() <= probe::resize_limit(store.capacity(), 0.5));
        }
        for i in 0..200 {
            assert!(store.find(&slab, &order_key(&format!("K{i}"))).is_some());
        }
    }

    #[test]
    fn test_small_load_factor_grows_past_limit_at_once() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig {
            initial_capacity: 8,
            load_factor: 0.01,
        })
        .unwrap();

        insert_order(&mut slab, &mut store, "first");
        assert_eq!(store.capacity(), 128);
        assert!(store.len() <= probe::resize_limit(store.capacity(), 0.01));

        let mut growths = 1;
        let mut capacity = store.capacity();
        for i in 0..60 {
            insert_order(&mut slab, &mut store, &format!("K{i}"));
            assert!(store.len() <= probe::resize_limit(store.capacity(), 0.01));
            assert!(store.len() > probe::resize_limit(store.capacity() / 2, 0.01));
            if store.capacity() != capacity {
                growths += 1;
                capacity = store.capacity();
            }
        }
        // One rehash per crossing: 128, 256, 512, 1024, 2048, 4096, 8192.
        assert_eq!(capacity, 8192);
        assert_eq!(growths, 7);
        assert!(store.is_consistent(&slab));
    }

    #[test]
    fn test_remove_by_index() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();
        let a = insert_order(&mut slab, &mut store, "A");
        let b = insert_order(&mut slab, &mut store, "B");

        assert!(store.remove_at(&slab, a));
        assert!(!store.remove_at(&slab, a));
        assert_eq!(store.find(&slab, &order_key("A")), None);

        // Remove by a detached copy after the slab record was rewritten.
        let snapshot = slab.get_at(b).bytes().to_vec();
        write_order(&mut slab.get_at_mut(b), "rewritten", 0, 0);
        assert!(store.remove(&slab, b, RecordRef::new(&snapshot)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_short_views_are_never_found() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();
        let index = insert_order(&mut slab, &mut store, "ABC123");

        let full = slab.get_at(index).bytes().to_vec();
        let short = RecordRef::new(&full[..OrderCodec::KEY_LEN]);
        assert_eq!(store.wrap_from_key(&slab, short), None);
        assert_eq!(store.remove_codec(&slab, short), None);
        assert!(!store.remove(&slab, index, short));
        assert_eq!(store.len(), 1);

        assert_eq!(store.wrap_from_key(&slab, RecordRef::new(&full)), Some(index));
    }

    #[test]
    fn test_remove_key() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();
        let index = insert_order(&mut slab, &mut store, "ORDER-1");
        assert_eq!(store.remove_key(&slab, &order_key("ORDER-2")), None);
        assert_eq!(store.remove_key(&slab, &order_key("ORDER-1")), Some(index));
        assert_eq!(store.remove_key(&slab, &order_key("ORDER-1")), None);
    }

    /// Every key hashes to the same home slot.
    struct Clustered;

    impl Codec for Clustered {
        fn size(&self) -> usize {
            8
        }

        fn hash_key(&self, _key: &[u8]) -> i32 {
            7
        }
    }

    #[test]
    fn test_compaction_within_single_cluster() {
        let mut slab: Slab<Clustered> = Slab::new(Clustered, SlabConfig::default()).unwrap();
        let mut store = SlabKeyStore::new(TableConfig::with_capacity(64)).unwrap();
        let mut indices = Vec::new();
        for i in 0..20u64 {
            let (index, mut record) = slab.create();
            record.put_u64(0, i + 1);
            store.insert(&slab, index);
            indices.push(index);
        }

        for &index in indices.iter().step_by(3) {
            assert!(store.remove_at(&slab, index));
            assert!(store.is_consistent(&slab));
        }
        for (i, &index) in indices.iter().enumerate() {
            let key = (i as u64 + 1).to_le_bytes();
            let expected = (i % 3 != 0).then_some(index);
            assert_eq!(store.find(&slab, &key), expected);
        }
    }

    #[test]
    fn test_create_insert_remove_loop() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig {
            initial_capacity: 2048,
            load_factor: 0.65,
        })
        .unwrap();
        let mut buffer = vec![0u8; OrderCodec.size()];
        for i in 0..100_000 {
            let (index, mut record) = slab.create();
            write_order(&mut record, &i.to_string(), 0, 0);
            store.insert(&slab, index);

            let mut probe = RecordMut::new(&mut buffer);
            write_order(&mut probe, &i.to_string(), 0, 0);
            let removed = store.remove_codec(&slab, probe.view());
            assert_eq!(removed, Some(index));
            slab.remove_at(index);
        }
        assert!(store.is_empty());
        assert_eq!(store.capacity(), 2048);
        assert_eq!(slab.page_count(), 4);
    }

    #[test]
    fn test_debug_dump() {
        let mut slab = order_slab();
        let mut store = SlabKeyStore::new(TableConfig::with_capacity(2)).unwrap();
        let index = insert_order(&mut slab, &mut store, "X");
        let dump = format!("{store:?}");
        assert!(dump.contains("-1"));
        assert!(dump.contains(&format!("{index}")));
        assert!(dump.contains("capacity: 2"));
    }
}
