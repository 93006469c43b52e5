use crate::{HashConfig, HashIndex, OrderedConfig, OrderedIndex, RehashStep};

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{HashMap, HashSet};

// =============================================================================
// OrderedIndex vs. a sorted Vec
// =============================================================================

/// Stable sorted vector: equal keys stay in insertion order.
#[derive(Default)]
struct SortedModel(Vec<(u16, u32)>);

impl SortedModel {
    fn insert(&mut self, key: u16, value: u32) {
        let at = self.0.partition_point(|(k, _)| *k <= key);
        self.0.insert(at, (key, value));
    }

    fn first_of(&self, key: u16) -> Option<usize> {
        let at = self.0.partition_point(|(k, _)| *k < key);
        (self.0.get(at)?.0 == key).then_some(at)
    }

    fn remove(&mut self, key: u16) -> Option<(u16, u32)> {
        let at = self.first_of(key)?;
        Some(self.0.remove(at))
    }

    fn rank(&self, key: u16) -> usize {
        self.first_of(key).map_or(0, |at| at + 1)
    }

    fn lower_bound(&self, key: u16) -> Option<(u16, u32)> {
        self.0.iter().copied().find(|(k, _)| *k >= key)
    }

    fn upper_bound(&self, key: u16) -> Option<(u16, u32)> {
        self.0.iter().copied().find(|(k, _)| *k > key)
    }

    fn range(&self, min: u16, max: u16) -> Vec<(u16, u32)> {
        self.0
            .iter()
            .copied()
            .filter(|(k, _)| (min..=max).contains(k))
            .collect()
    }
}

#[derive(Clone, Debug, Arbitrary)]
enum OrderedOp {
    #[proptest(weight = 6)]
    Insert(#[proptest(strategy = "0u16..64")] u16, u32),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "0u16..64")] u16),
    Rank(#[proptest(strategy = "0u16..64")] u16),
    Bounds(#[proptest(strategy = "0u16..66")] u16),
    ByRank(#[proptest(strategy = "0usize..80")] usize),
    Range(
        #[proptest(strategy = "0u16..66")] u16,
        #[proptest(strategy = "0u16..66")] u16,
    ),
}

fn pair((k, v): (&u16, &u32)) -> (u16, u32) {
    (*k, *v)
}

fn entries<'a>(it: impl Iterator<Item = (&'a u16, &'a u32)>) -> Vec<(u16, u32)> {
    it.map(pair).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_ordered_equivalence(
        seed in any::<u64>(),
        ratio in 2u32..5,
        ops in prop::collection::vec(any::<OrderedOp>(), 0..=600),
    ) {
        let config = OrderedConfig {
            level_ratio: ratio,
            seed: Some(seed),
            ..OrderedConfig::default()
        };
        let mut idx: OrderedIndex<u16, u32> = OrderedIndex::with_config(config).unwrap();
        let mut model = SortedModel::default();

        for op in ops {
            match op {
                OrderedOp::Insert(k, v) => {
                    prop_assert!(idx.insert(k, v));
                    model.insert(k, v);
                }
                OrderedOp::Remove(k) => {
                    prop_assert_eq!(idx.remove(&k), model.remove(k));
                }
                OrderedOp::Rank(k) => {
                    prop_assert_eq!(idx.rank(&k), model.rank(k));
                }
                OrderedOp::Bounds(k) => {
                    prop_assert_eq!(idx.lower_bound(&k).map(pair), model.lower_bound(k));
                    prop_assert_eq!(idx.upper_bound(&k).map(pair), model.upper_bound(k));
                }
                OrderedOp::ByRank(r) => {
                    let expected = r.checked_sub(1).and_then(|i| model.0.get(i).copied());
                    prop_assert_eq!(idx.get_by_rank(r).map(pair), expected);
                }
                OrderedOp::Range(min, max) => {
                    let expected = model.range(min, max);
                    prop_assert_eq!(entries(idx.range(&min, &max)), expected.clone());
                    prop_assert_eq!(idx.range(&min, &max).len(), expected.len());
                    let first = idx.first_in_range(&min, &max).map(pair);
                    prop_assert_eq!(first, expected.first().copied());
                    let last = idx.last_in_range(&min, &max).map(pair);
                    prop_assert_eq!(last, expected.last().copied());
                }
            }
            prop_assert_eq!(idx.len(), model.0.len());
        }

        idx.validate();
        prop_assert_eq!(entries(idx.iter()), model.0.clone());
        let mut backward = entries(idx.iter().rev());
        backward.reverse();
        prop_assert_eq!(backward, model.0);
    }
}

// =============================================================================
// HashIndex vs. HashMap
// =============================================================================

#[derive(Clone, Debug, Arbitrary)]
enum HashOp {
    #[proptest(weight = 6)]
    Insert(#[proptest(strategy = "0u32..512")] u32, u32),
    #[proptest(weight = 4)]
    Remove(#[proptest(strategy = "0u32..512")] u32),
    Get(#[proptest(strategy = "0u32..512")] u32),
    Exists(#[proptest(strategy = "0u32..512")] u32),
    Peek(#[proptest(strategy = "0u32..512")] u32),
    Step(#[proptest(strategy = "0usize..8")] usize),
}

fn hash_config_strategy() -> impl Strategy<Value = HashConfig> {
    let step = prop_oneof![
        (1usize..4).prop_map(RehashStep::Fixed),
        Just(RehashStep::Full),
        Just(RehashStep::Auto),
    ];
    (1usize..16, step).prop_map(|(min_buckets, rehash_step)| HashConfig {
        min_buckets,
        rehash_step,
        ..HashConfig::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_hash_equivalence(
        config in hash_config_strategy(),
        ops in prop::collection::vec(any::<HashOp>(), 0..=2000),
    ) {
        let mut idx: HashIndex<u32, u32> = HashIndex::with_config(config).unwrap();
        let mut m: HashMap<u32, u32> = HashMap::new();

        for op in ops {
            match op {
                HashOp::Insert(k, v) => {
                    prop_assert_eq!(idx.insert(k, v), m.insert(k, v));
                }
                HashOp::Remove(k) => {
                    prop_assert_eq!(idx.remove(&k), m.remove(&k));
                }
                HashOp::Get(k) => {
                    prop_assert_eq!(idx.get(&k).ok(), m.get(&k));
                }
                HashOp::Exists(k) => {
                    prop_assert_eq!(idx.exists(&k), m.contains_key(&k));
                }
                HashOp::Peek(k) => {
                    prop_assert_eq!(idx.peek(&k), m.get(&k));
                }
                HashOp::Step(n) => {
                    idx.rehash_step(n);
                }
            }
            prop_assert_eq!(idx.len(), m.len());
        }

        idx.validate();
        let mut got: Vec<(u32, u32)> = idx.iter().map(|(k, v)| (*k, *v)).collect();
        got.sort_unstable();
        let mut expected: Vec<(u32, u32)> = m.into_iter().collect();
        expected.sort_unstable();
        prop_assert_eq!(got, expected);
        prop_assert!(!idx.is_rehashing());
    }

    /// Keys present for a whole scan pass are reported at least once, however
    /// the table resizes between calls.
    #[test]
    fn prop_scan_covers_stable_keys(
        config in hash_config_strategy(),
        stable in prop::collection::hash_set(0u32..10_000, 0..300),
        churn in prop::collection::vec((any::<bool>(), 10_000u32..10_400), 0..=1500),
        batch in 1usize..40,
    ) {
        let mut idx = HashIndex::with_config(config).unwrap();
        for &k in &stable {
            idx.insert(k, ());
        }

        let mut churn = churn.chunks(batch);
        let mut seen = HashSet::new();
        let mut cursor = 0;
        loop {
            cursor = idx.scan_with(cursor, |k, _| {
                seen.insert(*k);
            });
            if cursor == 0 {
                break;
            }
            for &(add, k) in churn.next().unwrap_or(&[]) {
                if add {
                    idx.insert(k, ());
                } else {
                    idx.erase(&k);
                }
            }
            idx.validate();
        }

        prop_assert!(stable.is_subset(&seen));
    }
}

// =============================================================================
// Exhaustive small cases
// =============================================================================

/// Calls `f` once per distinct ordering of `items`, in lexicographic order.
/// Repeated keys do not produce repeated orderings.
fn for_each_distinct_order<T: Ord + Copy>(items: &[T], mut f: impl FnMut(&[T])) {
    let mut order = items.to_vec();
    order.sort_unstable();
    loop {
        f(&order);
        // Next lexicographic permutation.
        let Some(pivot) = order.windows(2).rposition(|w| w[0] < w[1]) else {
            return;
        };
        let swap = order.iter().rposition(|x| *x > order[pivot]).unwrap();
        order.swap(pivot, swap);
        order[pivot + 1..].reverse();
    }
}

#[test]
fn exhaustive_ordered_insert_order_with_duplicates() {
    let keys = [1u16, 3, 3, 5, 8, 8];
    let mut orders = 0;
    for_each_distinct_order(&keys, |order| {
        orders += 1;
        let mut idx = OrderedIndex::with_seed(17);
        let mut model = SortedModel::default();
        for (i, &k) in order.iter().enumerate() {
            idx.insert(k, i as u32);
            model.insert(k, i as u32);
        }
        idx.validate();
        assert_eq!(entries(idx.iter()), model.0);
        for k in 0..10 {
            assert_eq!(idx.rank(&k), model.rank(k), "rank of {k}");
        }
    });
    // 6! / (2! * 2!) distinct orders.
    assert_eq!(orders, 180);
}

#[test]
fn exhaustive_ordered_remove_order() {
    let keys = [2u16, 4, 4, 6, 9, 11];
    let mut base = OrderedIndex::with_seed(23);
    for (i, &k) in keys.iter().enumerate() {
        base.insert(k, i as u32);
    }

    for_each_distinct_order(&keys, |order| {
        let mut idx = base.clone();
        for k in order {
            assert!(idx.erase(k));
            idx.validate();
        }
        assert!(idx.is_empty());
        assert_eq!(idx.max_level(), 0);
    });
}

#[test]
fn exhaustive_hash_erase_order_mid_resize() {
    let keys = [0u32, 1, 2, 3, 4, 5];
    for_each_distinct_order(&keys, |order| {
        let mut idx = HashIndex::with_config(HashConfig {
            rehash_step: RehashStep::Fixed(1),
            ..HashConfig::default()
        })
        .unwrap();
        for &k in &keys {
            idx.insert(k, k);
        }
        for &k in order {
            assert_eq!(idx.remove(&k), Some(k));
            idx.validate();
        }
        assert!(idx.is_empty());
    });
}
