use std::io::Read;
use std::ptr;

use segalloc::{SegAllocator, print_alloc};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how the heap break moves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the allocator's current break and heap size.
fn print_heap(
  label: &str,
  allocator: &SegAllocator,
) {
  println!(
    "[{}] heap = {:?}..{:?} ({} bytes)",
    label,
    allocator.heap_lo(),
    allocator.heap_hi(),
    allocator.heap_size(),
  );
}

fn main() {
  // A segregated-list allocator over its own reserved region. The heap
  // starts with the prologue (free-list heads plus sentinels) and one
  // free chunk.
  let mut allocator = SegAllocator::new().expect("failed to reserve the heap");

  unsafe {
    // Initial heap state
    print_heap("start", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate space for a u32 (rounded up to the 16-byte minimum
    //    block internally).
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(4);
    println!("\n[1] Allocate 4 bytes");
    print_alloc(4, first_block, &allocator);

    // Write something into the allocated memory to show it's usable.
    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes.
    //    This shows how the allocator handles "odd-sized" allocations.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    println!("\n[2] Allocate 12 bytes");
    print_alloc(12, second_block, &allocator);

    // Initialize the block with a byte pattern.
    ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the first block and allocate again: the freed block is
    //    coalesced, listed, and immediately reused.
    // --------------------------------------------------------------------
    allocator.free(first_block);
    println!("\n[3] Freed first_block at {:?}", first_block);

    let third_block = allocator.allocate(4);
    print_alloc(4, third_block, &allocator);
    println!(
      "[3] third_block == first_block? {}",
      if third_block == first_block {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Reallocate the second block upward. Its free right neighbor is
    //    absorbed, so the pointer does not move and nothing is copied.
    // --------------------------------------------------------------------
    let grown = allocator.reallocate(second_block, 200);
    println!("\n[4] Reallocate second block 12 -> 200 bytes");
    print_alloc(200, grown, &allocator);
    println!(
      "[4] grown == second_block? {} (first byte still 0x{:X})",
      grown == second_block,
      grown.read(),
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate a large block to force a heap extension.
    //    This moves the break, visible via print_heap.
    // --------------------------------------------------------------------
    print_heap("before large alloc", &allocator);

    // Example: 64 KiB
    let big_block = allocator.allocate(64 * 1024);
    println!("\n[5] Allocate large 64 KiB block");
    print_alloc(64 * 1024, big_block, &allocator);

    print_heap("after large alloc", &allocator);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Audit the heap, then end the demo. Dropping the allocator
    //    returns the whole region to the OS.
    // --------------------------------------------------------------------
    println!("\n[6] Consistency check: {}", allocator.check());
    println!("[6] End of example. Dropping the allocator unmaps the heap.");
  }
}
