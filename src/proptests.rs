use super::*;

use crate::codec::test_codecs::{order_key, write_order, OrderCodec};
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;

/// Operation on a keyed collection. Keys are drawn from a small id space so
/// that inserts, hits and misses all occur often.
#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Insert(#[proptest(strategy = "0u16..96")] u16, i32),
    #[proptest(weight = 2)]
    Remove(#[proptest(strategy = "0u16..96")] u16),
    #[proptest(weight = 1)]
    RemoveByIndex(#[proptest(strategy = "0u16..96")] u16),
    #[proptest(weight = 3)]
    Get(#[proptest(strategy = "0u16..96")] u16),
}

fn key_name(id: u16) -> String {
    format!("key-{id}")
}

fn small_slab() -> Slab<OrderCodec> {
    let config = SlabConfig {
        page_size: 4,
        initial_pages: 1,
        reset_on_free: true,
    };
    Slab::new(OrderCodec, config).unwrap()
}

fn tiny_table() -> TableConfig {
    TableConfig {
        initial_capacity: 2,
        load_factor: 0.6,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_key_store_matches_model(ops in prop::collection::vec(any::<Op>(), 0..=600)) {
        let mut slab = small_slab();
        let mut store = SlabKeyStore::new(tiny_table()).unwrap();
        let mut model: HashMap<u16, (u32, i32)> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(id, quantity) => {
                    if let Some(&(index, _)) = model.get(&id) {
                        // Re-registering a live index changes nothing.
                        store.insert(&slab, index);
                        continue;
                    }
                    let (index, mut record) = slab.create();
                    write_order(&mut record, &key_name(id), 0, quantity);
                    store.insert(&slab, index);
                    model.insert(id, (index, quantity));
                }
                Op::Remove(id) => {
                    let removed = store.remove_key(&slab, &order_key(&key_name(id)));
                    let expected = model.remove(&id).map(|(index, _)| index);
                    prop_assert_eq!(removed, expected);
                    if let Some(index) = removed {
                        slab.remove_at(index);
                    }
                }
                Op::RemoveByIndex(id) => {
                    if let Some((index, _)) = model.remove(&id) {
                        prop_assert!(store.remove_at(&slab, index));
                        prop_assert!(!store.remove_at(&slab, index));
                        slab.remove_at(index);
                    }
                }
                Op::Get(id) => {
                    let found = store.find(&slab, &order_key(&key_name(id)));
                    prop_assert_eq!(found, model.get(&id).map(|&(index, _)| index));
                    if let Some(index) = found {
                        let quantity = slab.get_at(index).get_i32(OrderCodec::QUANTITY);
                        prop_assert_eq!(Some(quantity), model.get(&id).map(|&(_, q)| q));
                    }
                }
            }

            prop_assert_eq!(store.len(), model.len());
            prop_assert_eq!(slab.len(), model.len());
            prop_assert!(store.is_consistent(&slab));
            prop_assert!(store.len() <= probe::resize_limit(store.capacity(), 0.6));
        }

        for (&id, &(index, _)) in &model {
            prop_assert_eq!(store.find(&slab, &order_key(&key_name(id))), Some(index));
            prop_assert!(slab.is_live(index));
        }
    }

    #[test]
    fn prop_map_matches_model(ops in prop::collection::vec(any::<Op>(), 0..=600)) {
        let codec = AsciiKeyCodec::new(16).unwrap();
        let mut map: OffHeapMap<AsciiKeyCodec> = OffHeapMap::new(codec, tiny_table()).unwrap();
        let mut model: HashMap<u16, i32> = HashMap::new();
        let mut key = AsciiKey::new(16).unwrap();

        for op in ops {
            match op {
                Op::Insert(id, value) => {
                    key.set(key_name(id)).unwrap();
                    prop_assert_eq!(map.put(key.raw(), value), Ok(model.insert(id, value)));
                }
                Op::Remove(id) | Op::RemoveByIndex(id) => {
                    key.set(key_name(id)).unwrap();
                    prop_assert_eq!(map.remove(key.raw()), model.remove(&id));
                }
                Op::Get(id) => {
                    key.set(key_name(id)).unwrap();
                    prop_assert_eq!(map.get(key.raw()), model.get(&id).copied());
                }
            }

            prop_assert_eq!(map.len(), model.len());
            prop_assert!(map.is_consistent());
        }

        for (&id, &value) in &model {
            prop_assert!(map.contains_value(value));
            key.set(key_name(id)).unwrap();
            prop_assert!(map.contains_key(key.raw()));
        }
    }

    #[test]
    fn prop_slab_round_trip(
        values in prop::collection::vec(any::<i64>(), 1..=300),
        removed in prop::collection::vec(any::<bool>(), 300),
    ) {
        let mut slab = small_slab();
        let mut live = Vec::new();
        for (i, &price) in values.iter().enumerate() {
            let (index, mut record) = slab.create();
            write_order(&mut record, &format!("order-{i}"), price, i as i32);
            live.push((index, i, price));
        }
        let (gone, kept): (Vec<_>, Vec<_>) = live
            .into_iter()
            .partition(|&(_, i, _)| removed[i]);
        for &(index, _, _) in &gone {
            slab.remove_at(index);
        }
        prop_assert_eq!(slab.len(), kept.len());

        let mut view = RecordRef::default();
        for &(index, i, price) in &kept {
            slab.wrap_at(index, &mut view);
            prop_assert_eq!(view.get_i64(OrderCodec::PRICE), price);
            prop_assert_eq!(view.get_i32(OrderCodec::QUANTITY), i as i32);
            let expected = order_key(&format!("order-{i}"));
            prop_assert_eq!(view.key(&OrderCodec), expected.as_slice());
        }
    }

    #[test]
    fn prop_addressing_round_trip(log2 in 0u32..=15, page in 0u32..(1 << 16), slot in any::<u16>()) {
        let addressing = Addressing::new(1 << log2);
        let slot = slot as usize & ((1 << log2) - 1);
        prop_assert_eq!(addressing.decode(addressing.encode(page, slot)), (page, slot));
    }
}

#[test]
fn shuffled_removal_keeps_store_reachable() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut slab: Slab<OrderCodec> = Slab::new(OrderCodec, SlabConfig::default()).unwrap();
        let mut store = SlabKeyStore::new(TableConfig::default()).unwrap();

        let mut entries = Vec::new();
        for i in 0..2000 {
            let (index, mut record) = slab.create();
            write_order(&mut record, &format!("client-{i}"), i, 0);
            store.insert(&slab, index);
            entries.push((index, i));
        }
        entries.shuffle(&mut rng);

        for (n, &(index, i)) in entries.iter().enumerate() {
            let key = order_key(&format!("client-{i}"));
            assert_eq!(store.remove_key(&slab, &key), Some(index), "seed {seed}");
            slab.remove_at(index);
            if n % 97 == 0 {
                assert!(store.is_consistent(&slab), "seed {seed} after {n}");
                for &(index, i) in &entries[n + 1..] {
                    let key = order_key(&format!("client-{i}"));
                    assert_eq!(store.find(&slab, &key), Some(index));
                }
            }
        }
        assert!(store.is_empty());
        assert!(slab.is_empty());
    }
}

#[test]
fn shuffled_removal_keeps_map_reachable() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut map: OffHeapMap<crate::codec::test_codecs::IdCodec, u64> =
            OffHeapMap::with_codec(crate::codec::test_codecs::IdCodec).unwrap();

        let mut ids: Vec<i32> = (0..5000).collect();
        for &id in &ids {
            map.put(&id.to_le_bytes(), id as u64 * 3).unwrap();
        }
        ids.shuffle(&mut rng);

        for (n, &id) in ids.iter().enumerate() {
            assert_eq!(map.remove(&id.to_le_bytes()), Some(id as u64 * 3), "seed {seed}");
            if n % 101 == 0 {
                assert!(map.is_consistent(), "seed {seed} after {n}");
            }
        }
        assert!(map.is_empty());
    }
}

#[test]
fn page_scenario_from_empty_slab() {
    let config = SlabConfig {
        page_size: 64,
        initial_pages: 4,
        reset_on_free: true,
    };
    let mut slab: Slab<OrderCodec> = Slab::new(OrderCodec, config).unwrap();
    let mut store = SlabKeyStore::new(TableConfig {
        initial_capacity: 2048,
        load_factor: 0.65,
    })
    .unwrap();

    for i in 0..320u32 {
        let (index, mut record) = slab.create();
        write_order(&mut record, &i.to_string(), 0, 0);
        store.insert(&slab, index);
        assert_eq!(index, i);
    }
    for i in 0..63u32 {
        assert!(store.remove_at(&slab, i));
        slab.remove_at(i);
    }
    for i in 320..383u32 {
        assert_eq!(slab.create().0, i);
    }
    assert!(store.remove_at(&slab, 63));
    slab.remove_at(63);
    assert_eq!(slab.create().0, 383);
    for i in 0..64u32 {
        assert_eq!(slab.create().0, i);
    }
    assert_eq!(store.len(), 320 - 64);
}
