use nebula_region::utils::is_aligned_ptr;
use nebula_region::{Pool, PoolConfig};
use proptest::prelude::*;

fn pool(size: usize) -> Pool {
    Pool::with_config(PoolConfig::new(size)).unwrap()
}

proptest! {
    #[test]
    fn small_addresses_increase_within_first_block(
        block in 96usize..2048,
        sizes in prop::collection::vec(1usize..128, 1..64),
    ) {
        let pool = pool(block);
        let mut previous: Option<usize> = None;

        for size in sizes.into_iter().filter(|&s| s <= pool.max_small_size()) {
            let ptr = pool.alloc(size).unwrap();
            if pool.block_count() > 1 {
                prop_assert_eq!(pool.block_count(), 2);
                prop_assert_eq!(pool.locate(ptr.as_ptr()).map(|(index, _)| index), Some(1));
                break;
            }
            let addr = ptr.as_ptr() as usize;
            if let Some(previous) = previous {
                prop_assert!(addr > previous);
            }
            prop_assert!(is_aligned_ptr(ptr.as_ptr(), size_of::<usize>()));
            previous = Some(addr);
        }
    }

    #[test]
    fn allocations_never_overlap(
        block in 96usize..1024,
        requests in prop::collection::vec((1usize..3000, any::<bool>()), 1..80),
    ) {
        let pool = pool(block);
        let mut ranges = Vec::new();

        for (size, aligned) in requests {
            let ptr = if aligned {
                pool.alloc(size).unwrap()
            } else {
                pool.alloc_unaligned(size).unwrap()
            };
            let start = ptr.as_ptr() as usize;
            ranges.push((start, start + size));
        }

        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
        }
    }

    #[test]
    fn freed_slot_reused_within_scan_window(
        live in 0usize..4,
    ) {
        let mut pool = pool(1024);
        let target = pool.alloc(2000).unwrap();
        for _ in 0..live {
            let _ = pool.alloc(2000).unwrap();
        }
        let nodes = pool.large_nodes();

        prop_assert!(pool.free_large(target));
        let _ = pool.alloc(3000).unwrap();
        prop_assert_eq!(pool.large_nodes(), nodes);
    }
}
