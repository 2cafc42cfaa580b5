//! Property tests for size-class rounding and free-list reuse.

use std::ptr::NonNull;

use proptest::prelude::*;
use rpool::{
  Pool, SizeClass,
  size_class::{bucket_index, bucket_size, classify, round_up},
};

proptest! {
  #[test]
  fn round_up_is_least_aligned_upper_bound(size in 1usize..=128) {
    let rounded = round_up(size, 8);

    prop_assert_eq!(rounded % 8, 0);
    prop_assert!(rounded >= size);
    prop_assert!(rounded - size < 8);
    prop_assert_eq!(round_up(rounded, 8), rounded);
  }

  #[test]
  fn bucket_index_matches_rounded_size(size in 1usize..=128) {
    let index = bucket_index(size, 8);

    prop_assert_eq!(index, round_up(size, 8) / 8 - 1);
    prop_assert_eq!(bucket_size(index, 8), round_up(size, 8));
    prop_assert_eq!(classify(size, 8, 128), SizeClass::Bucket(index));
  }

  #[test]
  fn oversized_never_pooled(size in 129usize..1_000_000) {
    prop_assert_eq!(classify(size, 8, 128), SizeClass::Oversized);
  }

  #[test]
  fn reuse_returns_last_freed_node(size in 0usize..=128) {
    let mut pool = Pool::new();

    let first = pool.allocate(size).unwrap();
    let chunks = pool.stats().chunk_allocations;
    unsafe { pool.deallocate(first, size) };
    let second = pool.allocate(size).unwrap();

    prop_assert_eq!(first, second);
    prop_assert_eq!(pool.stats().chunk_allocations, chunks);
    unsafe { pool.deallocate(second, size) };
  }

  #[test]
  fn live_blocks_keep_their_contents(
    sizes in proptest::collection::vec(1usize..=200, 1..120),
    free_every in 2usize..6,
  ) {
    let mut pool = Pool::new();
    let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();

    for (step, &size) in sizes.iter().enumerate() {
      let ptr = pool.allocate(size).unwrap();
      prop_assert_eq!(ptr.as_ptr().addr() % 8, 0);

      let tag = step as u8;
      unsafe { ptr.as_ptr().write_bytes(tag, size) };
      live.push((ptr, size, tag));

      if step % free_every == 0 {
        let (ptr, size, _) = live.remove(live.len() / 2);
        unsafe { pool.deallocate(ptr, size) };
      }
    }

    let mut spans: Vec<_> = live
      .iter()
      .map(|&(ptr, size, _)| (ptr.as_ptr().addr(), ptr.as_ptr().addr() + round_up(size, 8)))
      .collect();
    spans.sort();
    for pair in spans.windows(2) {
      prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
    }

    for &(ptr, size, tag) in &live {
      let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), size) };
      prop_assert!(bytes.iter().all(|&byte| byte == tag));
    }

    for (ptr, size, _) in live {
      unsafe { pool.deallocate(ptr, size) };
    }
  }
}
