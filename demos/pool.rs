use std::{io::Read, ptr::NonNull};

use rpool::{Pool, Recovery};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb` between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the free-list lengths of the non-empty buckets and the arena state.
fn print_pool(
  label: &str,
  pool: &Pool,
) {
  let config = pool.config();
  let buckets: Vec<String> = (0..config.num_buckets())
    .filter(|&index| pool.free_list_len(index) > 0)
    .map(|index| format!("{}B x{}", config.bucket_size(index), pool.free_list_len(index)))
    .collect();

  println!(
    "[{}] free lists = [{}], arena remaining = {} bytes, stats = {:?}",
    label,
    buckets.join(", "),
    pool.arena_remaining(),
    pool.stats(),
  );
}

fn print_alloc(
  bytes: usize,
  ptr: NonNull<u8>,
  pool: &Pool,
) {
  println!(
    "Allocated {} bytes ({:?}), address = {:?}",
    bytes,
    pool.config().classify(bytes),
    ptr
  );
}

fn main() {
  let mut pool = Pool::new();

  pool.set_oom_handler(Some(Box::new(|bytes: usize| {
    eprintln!("out of memory while requesting {} bytes", bytes);
    Recovery::GiveUp
  })));

  print_pool("start", &pool);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) 5 bytes round up to an 8-byte node. The empty bucket is refilled
  //    with a batch of 20 nodes carved from a fresh arena chunk.
  // --------------------------------------------------------------------
  let five = pool.allocate(5).expect("allocate 5 bytes");
  println!("\n[1] Allocate 5 bytes");
  print_alloc(5, five, &pool);
  print_pool("1", &pool);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) 9 bytes round up to a 16-byte node, carved from what is left of
  //    the same chunk.
  // --------------------------------------------------------------------
  let nine = pool.allocate(9).expect("allocate 9 bytes");
  println!("\n[2] Allocate 9 bytes");
  print_alloc(9, nine, &pool);
  print_pool("2", &pool);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) 200 bytes are above the pooled limit and go to the system
  //    allocator. The free lists do not change.
  // --------------------------------------------------------------------
  let big = pool.allocate(200).expect("allocate 200 bytes");
  println!("\n[3] Allocate 200 bytes");
  print_alloc(200, big, &pool);
  print_pool("3", &pool);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Free the 8-byte node and ask for 5 bytes again: the same node
  //    comes back from the head of its free list.
  // --------------------------------------------------------------------
  unsafe { pool.deallocate(five, 5) };
  let again = pool.allocate(5).expect("allocate 5 bytes again");
  println!("\n[4] Deallocate the 5-byte block, allocate 5 bytes again");
  print_alloc(5, again, &pool);
  println!(
    "[4] again == five? {}",
    if again == five {
      "Yes, it reused the freed node"
    } else {
      "No, it allocated somewhere else"
    }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Grow the 16-byte block to 100 bytes: a 104-byte node is taken,
  //    the contents are copied and the old node goes back to its list.
  // --------------------------------------------------------------------
  unsafe {
    nine.as_ptr().write_bytes(0xAB, 9);
    let grown = pool.reallocate(nine, 9, 100).expect("reallocate to 100 bytes");
    println!("\n[5] Reallocate 9 -> 100 bytes, address = {:?}", grown);
    println!("[5] First byte after copy = 0x{:X}", *grown.as_ptr());
    print_pool("5", &pool);

    pool.deallocate(grown, 100);
    pool.deallocate(again, 5);
    pool.deallocate(big, 200);
  }

  // --------------------------------------------------------------------
  // 6) End of demo. Dropping the pool hands its arena chunks back to the
  //    system allocator.
  // --------------------------------------------------------------------
  print_pool("end", &pool);
  println!("\n[6] End of example.");
}
