use proptest::prelude::*;
use segment::ResultCache;

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    Get(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![(0u8..16).prop_map(Op::Put), (0u8..16).prop_map(Op::Get)]
}

proptest! {
    #[test]
    fn test_cache_keeps_most_recently_used_keys(
        capacity in 1usize..8,
        ops in prop::collection::vec(op(), 0..200),
    ) {
        let mut cache = ResultCache::new(capacity);
        // Most recently used first
        let mut recency: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Op::Put(key) => {
                    let evicted = cache.put(key, u32::from(key) * 10);
                    let existed = recency.contains(&key);
                    recency.retain(|k| *k != key);
                    recency.insert(0, key);
                    let expected = if !existed && recency.len() > capacity { recency.pop() } else { None };
                    prop_assert_eq!(evicted.map(|(k, _)| k), expected);
                }
                Op::Get(key) => {
                    let hit = cache.get(&key).copied();
                    if recency.contains(&key) {
                        prop_assert_eq!(hit, Some(u32::from(key) * 10));
                        recency.retain(|k| *k != key);
                        recency.insert(0, key);
                    } else {
                        prop_assert_eq!(hit, None);
                    }
                }
            }

            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.keys().copied().collect::<Vec<_>>(), recency.clone());
        }
    }
}
