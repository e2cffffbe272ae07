//! # Segregated-List Allocator
//!
//! A dynamic memory allocator over a single monotonically growing heap
//! region. All bookkeeping lives inside the region itself: blocks carry
//! boundary tags, free blocks are threaded onto sixteen segregated
//! explicit lists, and the list heads occupy a reserved prologue at the
//! bottom of the heap.
//!
//! ## Heap Layout
//!
//! ```text
//!   lo()                                                        break
//!    │                                                            │
//!    ▼                                                            ▼
//!   ┌─────┬────────────────┬──────────────┬───────────────┬──────┐
//!   │ pad │ 16 head cells  │ prologue blk │  blocks ...   │ epi  │
//!   │ 4B  │ 4B each        │ (8B, alloc)  │               │ 4B   │
//!   └─────┴────────────────┴──────────────┴───────────────┴──────┘
//!    word0  words 1..=16     words 17,18     word 20 on     last word
//!
//!   The prologue block and the epilogue word are permanently marked
//!   allocated, so neighbor inspection never needs a bounds check. Every
//!   heap extension overwrites the old epilogue with the new block's
//!   header and writes a fresh epilogue at the new break.
//! ```
//!
//! ## Allocation
//!
//! ```text
//!   allocate(size)
//!     │
//!     ├── round up: asize = max(16, align!(size + 8))
//!     │
//!     ├── find_fit: first fit in class_of(asize), overflowing to
//!     │   larger classes; the hit is unlinked during the walk
//!     │
//!     ├── hit ──► place: carve asize at the head of the block,
//!     │          splitting a residue ≥ 16 back onto its list
//!     │
//!     └── miss ─► extend the heap by max(asize, CHUNK), coalesce the
//!                new region with a free old tail, then place
//! ```
//!
//! `free` clears the allocation bits, merges with any free neighbor
//! (boundary tags make both directions O(1)), and pushes the result onto
//! its class's list.
//!
//! ## Reallocation
//!
//! `reallocate` avoids copying wherever a neighbor can cover the growth.
//! Dispatch is on the exact allocation pattern of the two neighbors:
//!
//! ```text
//!   new size fits the block   keep the block, split off a residue
//!   prev alloc, next free     absorb the next block, no copy
//!   prev free,  next alloc    slide payload down into the previous block
//!   prev free,  next free     slide down into the whole merged span
//!   otherwise                 allocate afresh, copy, free
//! ```
//!
//! The sliding cases overlap source and destination, so the payload is
//! moved before any tag write that could land inside the source bytes.
//!
//! ## Safety
//!
//! The entry points mirror the classical allocator contract: `free` and
//! `reallocate` trust that their pointer came from this allocator and is
//! still live. Violations are undefined behavior and are not detected.

use std::{cmp, ptr};

use crate::align;
use crate::block::{Block, DSIZE, MIN_BLOCK, WSIZE};
use crate::heap::{AllocError, DEFAULT_CAPACITY, Heap};
use crate::seglist::{NUM_CLASSES, SegList, class_of};

/// Bytes the heap grows by when no free block fits. The historical
/// trace-workload value; larger chunks trade utilization for fewer
/// extensions.
pub const CHUNK: usize = 4096;

/// Reserved words at the bottom of the heap: padding, sixteen list-head
/// cells, the prologue sentinel pair, the initial epilogue.
const PROLOGUE_WORDS: usize = 20;

/// Debug helper that prints one allocation against the current break.
///
/// # Example Output
///
/// ```text
/// Allocated 64 bytes, address = 0x7f1c38a00050, heap break = 0x7f1c38a01050
/// ```
pub fn print_alloc(
  size: usize,
  addr: *mut u8,
  allocator: &SegAllocator,
) {
  println!(
    "Allocated {} bytes, address = {:?}, heap break = {:?}",
    size,
    addr,
    allocator.heap_hi()
  );
}

/// A segregated-list allocator owning its heap region.
///
/// Each value reserves a private region at construction, so independent
/// allocators never interleave and tests can run against fresh instances
/// in parallel.
///
/// # Thread Safety
///
/// Not thread-safe; concurrent use is outside the contract, matching the
/// classical allocator model.
pub struct SegAllocator {
  heap: Heap,
}

impl SegAllocator {
  /// Creates an allocator over [`DEFAULT_CAPACITY`] bytes of reserved
  /// backing memory and initializes a fresh heap in it.
  pub fn new() -> Result<Self, AllocError> {
    Self::with_capacity(DEFAULT_CAPACITY)
  }

  /// Creates an allocator over `capacity` reserved bytes.
  ///
  /// The capacity bounds all future growth; it must cover the 80-byte
  /// prologue plus one [`CHUNK`].
  ///
  /// # Errors
  ///
  /// [`AllocError::Reserve`] if the reservation fails,
  /// [`AllocError::Exhausted`] if `capacity` cannot hold the initial heap.
  pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
    let heap = Heap::reserve(capacity)?;
    let mut allocator = Self { heap };
    allocator.init()?;
    Ok(allocator)
  }

  /// Resets to a fresh heap: prologue, empty lists, one free
  /// [`CHUNK`]-sized block, epilogue.
  ///
  /// Idempotent; every pointer handed out before the call is dangling
  /// afterwards.
  pub fn init(&mut self) -> Result<(), AllocError> {
    self.heap.reset();

    let bottom = self.heap.grow(PROLOGUE_WORDS * WSIZE);
    if bottom.is_null() {
      return Err(AllocError::Exhausted {
        capacity: self.heap.capacity(),
        requested: PROLOGUE_WORDS * WSIZE,
      });
    }

    unsafe {
      // padding word; keeps every payload double-word aligned
      (bottom as *mut u32).write(0);
      self.lists().init_heads();

      // prologue sentinel: an allocated double word with no payload
      let prologue = Block::from_payload(bottom.add(18 * WSIZE));
      prologue.set_header(DSIZE, true);
      prologue.set_footer(DSIZE, true);

      // initial epilogue; rewritten by every extension
      Block::from_payload(bottom.add(20 * WSIZE)).set_header(0, true);

      match self.extend(CHUNK) {
        Some(block) => self.lists().insert(block),
        None => {
          return Err(AllocError::Exhausted {
            capacity: self.heap.capacity(),
            requested: CHUNK,
          });
        }
      }
    }

    Ok(())
  }

  /// Allocates `size` bytes and returns an 8-aligned pointer to them, or
  /// null when `size` is 0 or the heap cannot grow enough.
  ///
  /// The bytes are uninitialized and exclusively the caller's until passed
  /// back to [`free`](Self::free) or [`reallocate`](Self::reallocate).
  ///
  /// # Safety
  ///
  /// The returned memory is only valid for this allocator's lifetime and
  /// until the next [`init`](Self::init).
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 || size > self.heap.capacity() {
      return ptr::null_mut();
    }

    // room for both tags, rounded to the block granularity
    let asize = cmp::max(MIN_BLOCK, align!(size + DSIZE));

    unsafe {
      if let Some(block) = self.find_fit(asize) {
        self.place(block, asize);
        return block.payload();
      }

      match self.extend(cmp::max(asize, CHUNK)) {
        Some(block) => {
          self.place(block, asize);
          block.payload()
        }
        None => ptr::null_mut(),
      }
    }
  }

  /// Returns a block to the allocator. Null is a no-op.
  ///
  /// # Safety
  ///
  /// `addr` must have come from this allocator's
  /// [`allocate`](Self::allocate) or [`reallocate`](Self::reallocate) and
  /// must not have been freed since; double frees and foreign pointers are
  /// undefined behavior.
  pub unsafe fn free(
    &mut self,
    addr: *mut u8,
  ) {
    if addr.is_null() {
      return;
    }

    unsafe {
      let block = Block::from_payload(addr);
      let size = block.size();
      block.set_header(size, false);
      block.set_footer(size, false);

      let merged = self.coalesce(block);
      self.lists().insert(merged);
    }
  }

  /// Resizes an allocation, preserving the first
  /// `min(size, old payload)` bytes.
  ///
  /// Null `addr` behaves as `allocate(size)`; zero `size` frees `addr` and
  /// returns null. Otherwise the block is grown or shrunk in place when a
  /// neighbor allows it, and only as a last resort moved to a fresh block.
  /// On failure null is returned and the old block stays valid.
  ///
  /// # Safety
  ///
  /// Same contract as [`free`](Self::free) for `addr`; a non-null return
  /// invalidates `addr` unless it equals it.
  pub unsafe fn reallocate(
    &mut self,
    addr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    unsafe {
      if addr.is_null() {
        return self.allocate(size);
      }
      if size == 0 {
        self.free(addr);
        return ptr::null_mut();
      }
      if size > self.heap.capacity() {
        return ptr::null_mut();
      }

      let block = Block::from_payload(addr);
      let old = block.size();
      let msize = cmp::max(MIN_BLOCK, align!(size + DSIZE));

      // already large enough: keep the block, shedding any residue
      if msize <= old {
        self.shrink(block, msize);
        return addr;
      }

      let prev = block.prev();
      let next = block.next();
      let lists = self.lists();

      match (prev.is_alloc(), next.is_alloc()) {
        (true, false) if old + next.size() >= msize => {
          let total = old + next.size();
          lists.remove(next);

          if total - msize >= MIN_BLOCK {
            block.set_header(msize, true);
            block.set_footer(msize, true);
            let rest = block.next();
            rest.set_header(total - msize, false);
            rest.set_footer(total - msize, false);
            lists.insert(rest);
          } else {
            block.set_header(total, true);
            block.set_footer(total, true);
          }
          addr
        }

        (false, true) if prev.size() + old >= msize => {
          let total = prev.size() + old;
          lists.remove(prev);
          self.absorb_left(prev, block, total, msize)
        }

        (false, false) if prev.size() + old + next.size() >= msize => {
          let total = prev.size() + old + next.size();
          lists.remove(prev);
          lists.remove(next);
          self.absorb_left(prev, block, total, msize)
        }

        _ => {
          // no usable neighbor: fresh block, copy, release the old one
          let fresh = self.allocate(size);
          if fresh.is_null() {
            return ptr::null_mut();
          }
          ptr::copy_nonoverlapping(addr, fresh, cmp::min(size, old - DSIZE));
          self.free(addr);
          fresh
        }
      }
    }
  }

  /// First byte of the heap region.
  pub fn heap_lo(&self) -> *mut u8 {
    self.heap.lo()
  }

  /// Current break; one past the epilogue word.
  pub fn heap_hi(&self) -> *mut u8 {
    self.heap.hi()
  }

  /// Bytes of heap in use, prologue and epilogue included.
  pub fn heap_size(&self) -> usize {
    self.heap.size()
  }

  fn lists(&self) -> SegList {
    SegList::new(self.heap.lo())
  }

  fn prologue(&self) -> Block {
    Block::from_payload(unsafe { self.heap.lo().add(18 * WSIZE) })
  }

  /// Grows the heap by at least `nbytes`, framing the new bytes as one
  /// free block whose header lands on the old epilogue. The block is
  /// merged with a free old tail and returned *without* being listed.
  unsafe fn extend(
    &mut self,
    nbytes: usize,
  ) -> Option<Block> {
    let size = align!(nbytes);
    let bp = self.heap.grow(size);
    if bp.is_null() {
      return None;
    }

    log::debug!("extended heap by {size} bytes, break now {:p}", self.heap.hi());

    unsafe {
      let block = Block::from_payload(bp);
      block.set_header(size, false);
      block.set_footer(size, false);
      block.next().set_header(0, true); // new epilogue

      Some(self.coalesce(block))
    }
  }

  /// Merges a free, unlisted block with its free neighbors.
  ///
  /// Returns the merged block, still unlisted; afterwards no free
  /// neighbor remains adjacent. The prologue and epilogue sentinels make
  /// both neighbor reads unconditionally safe.
  unsafe fn coalesce(
    &mut self,
    block: Block,
  ) -> Block {
    unsafe {
      let lists = self.lists();
      let prev = block.prev();
      let next = block.next();
      let mut size = block.size();

      match (prev.is_alloc(), next.is_alloc()) {
        (true, true) => block,

        (true, false) => {
          lists.remove(next);
          size += next.size();
          block.set_header(size, false);
          block.set_footer(size, false);
          block
        }

        (false, true) => {
          lists.remove(prev);
          size += prev.size();
          // the old footer cell of `block` becomes the merged footer
          block.set_footer(size, false);
          prev.set_header(size, false);
          prev
        }

        (false, false) => {
          lists.remove(prev);
          lists.remove(next);
          size += prev.size() + next.size();
          prev.set_header(size, false);
          next.set_footer(size, false);
          prev
        }
      }
    }
  }

  /// Installs an `asize`-byte allocation at the head of `block`, which
  /// must already be unlinked. A residue of at least [`MIN_BLOCK`] bytes
  /// is split off and listed; anything smaller is absorbed whole.
  unsafe fn place(
    &mut self,
    block: Block,
    asize: usize,
  ) {
    unsafe {
      let csize = block.size();

      if csize - asize >= MIN_BLOCK {
        block.set_header(asize, true);
        block.set_footer(asize, true);

        let rest = block.next();
        rest.set_header(csize - asize, false);
        rest.set_footer(csize - asize, false);
        self.lists().insert(rest);
      } else {
        block.set_header(csize, true);
        block.set_footer(csize, true);
      }
    }
  }

  /// First-fit search through class `class_of(asize)` and every larger
  /// class. A hit is unlinked during the walk, so the caller receives a
  /// block ready for [`place`](Self::place).
  unsafe fn find_fit(
    &mut self,
    asize: usize,
  ) -> Option<Block> {
    unsafe {
      let lists = self.lists();

      for class in class_of(asize)..NUM_CLASSES {
        let mut cursor = lists.head(class);
        while let Some(block) = cursor {
          if block.size() >= asize {
            lists.remove(block);
            return Some(block);
          }
          cursor = lists.next_of(block);
        }
      }

      None
    }
  }

  /// Keeps an allocated block at `msize` bytes, splitting off a residue
  /// of at least [`MIN_BLOCK`]. Unlike [`place`](Self::place) the
  /// successor here may itself be free, so the residue is coalesced
  /// before it is listed.
  unsafe fn shrink(
    &mut self,
    block: Block,
    msize: usize,
  ) {
    unsafe {
      let old = block.size();
      if old - msize < MIN_BLOCK {
        return;
      }

      block.set_header(msize, true);
      block.set_footer(msize, true);

      let rest = block.next();
      rest.set_header(old - msize, false);
      rest.set_footer(old - msize, false);

      let merged = self.coalesce(rest);
      self.lists().insert(merged);
    }
  }

  /// Slides `src`'s payload down into `dest`, the head of a free span of
  /// `total` bytes ending where `src`'s span ends. Both neighbors are
  /// already unlinked. The copy overlaps, so it happens before any tag
  /// write that could land inside the source bytes.
  unsafe fn absorb_left(
    &mut self,
    dest: Block,
    src: Block,
    total: usize,
    msize: usize,
  ) -> *mut u8 {
    unsafe {
      let copy_len = src.size() - DSIZE;

      if total - msize >= MIN_BLOCK {
        dest.set_header(msize, true);
        ptr::copy(src.payload(), dest.payload(), copy_len);
        dest.set_footer(msize, true);

        let rest = dest.next();
        rest.set_header(total - msize, false);
        rest.set_footer(total - msize, false);
        self.lists().insert(rest);
      } else {
        dest.set_header(total, true);
        dest.set_footer(total, true);
        ptr::copy(src.payload(), dest.payload(), copy_len);
      }

      dest.payload()
    }
  }

  /// Scans the free lists and the whole block chain for consistency.
  ///
  /// Verifies that listed blocks are free, correctly classed and
  /// maximally coalesced; that headers match footers; that the chain
  /// walks gaplessly from the prologue to an epilogue sitting exactly at
  /// the break; and that every free block in the chain is on its class's
  /// list. Each violation is reported through `log::error!`; the return
  /// value is `false` iff any was found.
  pub fn check(&self) -> bool {
    let mut ok = true;
    let lists = self.lists();
    // generous bound on list/chain length; a cycle trips it
    let step_cap = self.heap.size() / MIN_BLOCK + NUM_CLASSES + 2;

    unsafe {
      for class in 0..NUM_CLASSES {
        let mut steps = 0;
        let mut cursor = lists.head(class);

        while let Some(block) = cursor {
          steps += 1;
          if steps > step_cap {
            log::error!("class {class} free list does not terminate");
            ok = false;
            break;
          }
          if !self.payload_in_heap(block) {
            log::error!("class {class} list links outside the heap");
            ok = false;
            break;
          }
          if block.is_alloc() {
            log::error!("class {class} list holds allocated block {:p}", block.payload());
            ok = false;
          }
          if block.header_word() != block.footer_word() {
            log::error!("tag mismatch on listed block {:p}", block.payload());
            ok = false;
            break;
          }
          if class_of(block.size()) != class {
            log::error!(
              "block {:p} of size {} filed under class {class}",
              block.payload(),
              block.size()
            );
            ok = false;
          }
          if !block.prev().is_alloc() || !block.next().is_alloc() {
            log::error!("free neighbor of {:p} escaped coalescing", block.payload());
            ok = false;
          }
          cursor = lists.next_of(block);
        }
      }

      let prologue = self.prologue();
      if prologue.size() != DSIZE || !prologue.is_alloc() {
        log::error!("prologue sentinel damaged");
        return false;
      }

      let mut block = prologue.next();
      let mut prev_free = false;
      let mut steps = 0;

      loop {
        steps += 1;
        if steps > step_cap {
          log::error!("block chain does not terminate");
          return false;
        }

        let here = block.payload() as usize;
        if here > self.heap.hi() as usize {
          log::error!("block chain ran past the break");
          return false;
        }

        if block.size() == 0 {
          if !block.is_alloc() || block.payload() != self.heap.hi() {
            log::error!("epilogue sentinel damaged or misplaced");
            ok = false;
          }
          break;
        }

        if block.size() < MIN_BLOCK || block.size() % DSIZE != 0 {
          log::error!("illegal block size {} at {:p}", block.size(), block.payload());
          return false;
        }
        if block.header_word() != block.footer_word() {
          log::error!("tag mismatch at {:p}", block.payload());
          return false;
        }

        let free = !block.is_alloc();
        if free && prev_free {
          log::error!("adjacent free blocks at {:p}", block.payload());
          ok = false;
        }
        if free && !self.on_its_list(block) {
          log::error!(
            "free block {:p} missing from class {} list",
            block.payload(),
            class_of(block.size())
          );
          ok = false;
        }

        prev_free = free;
        block = block.next();
      }
    }

    ok
  }

  fn payload_in_heap(
    &self,
    block: Block,
  ) -> bool {
    let first = unsafe { self.heap.lo().add(PROLOGUE_WORDS * WSIZE) } as usize;
    let bp = block.payload() as usize;
    bp >= first && bp < self.heap.hi() as usize
  }

  unsafe fn on_its_list(
    &self,
    block: Block,
  ) -> bool {
    unsafe {
      let lists = self.lists();
      let mut steps = 0;
      let mut cursor = lists.head(class_of(block.size()));

      while let Some(candidate) = cursor {
        if candidate == block {
          return true;
        }
        steps += 1;
        if steps > self.heap.size() / MIN_BLOCK + 1 {
          return false;
        }
        cursor = lists.next_of(candidate);
      }

      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn allocator() -> SegAllocator {
    SegAllocator::new().unwrap()
  }

  /// Every block in chain order as (size, allocated).
  unsafe fn census(allocator: &SegAllocator) -> Vec<(usize, bool)> {
    unsafe {
      let mut blocks = Vec::new();
      let mut block = allocator.prologue().next();
      while block.size() != 0 {
        blocks.push((block.size(), block.is_alloc()));
        block = block.next();
      }
      blocks
    }
  }

  unsafe fn free_blocks(allocator: &SegAllocator) -> Vec<usize> {
    unsafe {
      census(allocator)
        .into_iter()
        .filter(|&(_, alloc)| !alloc)
        .map(|(size, _)| size)
        .collect()
    }
  }

  #[test]
  fn zero_size_allocation_returns_null() {
    let mut a = allocator();

    unsafe {
      assert!(a.allocate(0).is_null());
    }
    assert!(a.check());
  }

  #[test]
  fn returned_pointers_are_aligned() {
    let mut a = allocator();

    unsafe {
      for size in [1, 2, 7, 8, 24, 100, 513, 4096] {
        let p = a.allocate(size);
        assert!(!p.is_null());
        assert_eq!(p as usize % 8, 0, "allocation of {size} bytes not 8-aligned");
      }
    }
    assert!(a.check());
  }

  #[test]
  fn basic_allocation_and_write_read() {
    let mut a = allocator();

    unsafe {
      let p64 = a.allocate(8) as *mut u64;
      assert!(!p64.is_null());
      p64.write(0xDEADBEEFDEADBEEF);

      let count = 8usize;
      let p16 = a.allocate(count * 2) as *mut u16;
      assert!(!p16.is_null());
      for i in 0..count {
        p16.add(i).write((i as u16) + 1);
      }

      // the first allocation must not have been corrupted
      assert_eq!(p64.read(), 0xDEADBEEFDEADBEEF);
      for i in 0..count {
        assert_eq!(p16.add(i).read(), (i as u16) + 1);
      }
    }
    assert!(a.check());
  }

  #[test]
  fn freed_block_is_reused_immediately() {
    let mut a = allocator();

    unsafe {
      let first = a.allocate(24);
      a.free(first);
      let second = a.allocate(24);
      assert_eq!(first, second);
    }
    assert!(a.check());
  }

  #[test]
  fn frees_coalesce_into_one_block() {
    let mut a = allocator();

    unsafe {
      let first = a.allocate(24);
      let second = a.allocate(24);
      a.free(first);
      a.free(second);

      let free = free_blocks(&a);
      assert_eq!(free.len(), 1);
      assert!(free[0] >= 48);
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_absorbs_both_neighbors() {
    let mut a = allocator();

    unsafe {
      let first = a.allocate(100);
      let second = a.allocate(100);
      for i in 0..100 {
        second.add(i).write(i as u8);
      }

      a.free(first);
      let moved = a.reallocate(second, 200);

      // the freed left neighbor, the old block and the free chunk tail
      // merge into one span, so the payload slides down instead of being
      // reallocated
      assert_eq!(moved, first);
      for i in 0..100 {
        assert_eq!(moved.add(i).read(), i as u8);
      }
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_absorbs_left_neighbor() {
    let mut a = allocator();

    unsafe {
      let first = a.allocate(100);
      let second = a.allocate(100);
      let third = a.allocate(100);
      for i in 0..100 {
        second.add(i).write(i as u8);
        third.add(i).write(!(i as u8));
      }

      // `third` stays live, so only the freed left neighbor can cover
      // the growth
      a.free(first);
      let moved = a.reallocate(second, 150);

      assert_eq!(moved, first);
      for i in 0..100 {
        assert_eq!(moved.add(i).read(), i as u8);
        assert_eq!(third.add(i).read(), !(i as u8));
      }
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_absorbs_right_neighbor_in_place() {
    let mut a = allocator();

    unsafe {
      let first = a.allocate(100);
      let second = a.allocate(100);
      for i in 0..100 {
        first.add(i).write(!(i as u8));
      }

      a.free(second);
      let grown = a.reallocate(first, 150);

      assert_eq!(grown, first);
      for i in 0..100 {
        assert_eq!(grown.add(i).read(), !(i as u8));
      }
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_null_and_zero_corners() {
    let mut a = allocator();

    unsafe {
      let p = a.allocate(100);
      a.free(p);

      // reallocate(null, n) behaves as allocate(n)
      let q = a.reallocate(ptr::null_mut(), 50);
      assert!(!q.is_null());

      // reallocate(p, 0) behaves as free(p)
      assert!(a.reallocate(q, 0).is_null());
      assert_eq!(free_blocks(&a).len(), 1);
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_shrink_keeps_pointer() {
    let mut a = allocator();

    unsafe {
      let p = a.allocate(100);
      for i in 0..100 {
        p.add(i).write(i as u8);
      }

      let q = a.reallocate(p, 20);
      assert_eq!(q, p);
      for i in 0..20 {
        assert_eq!(q.add(i).read(), i as u8);
      }
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_within_payload_keeps_pointer() {
    let mut a = allocator();

    unsafe {
      // a 100-byte request occupies a 112-byte block: 104 payload bytes
      let p = a.allocate(100);
      assert_eq!(a.reallocate(p, 104), p);
      assert_eq!(a.reallocate(p, 97), p);
    }
    assert!(a.check());
  }

  #[test]
  fn realloc_grow_preserves_pattern() {
    let mut a = allocator();

    unsafe {
      let p = a.allocate(8);
      ptr::write_bytes(p, 0xAB, 8);

      let q = a.reallocate(p, 8_000_000);
      assert!(!q.is_null());
      for i in 0..8 {
        assert_eq!(q.add(i).read(), 0xAB);
      }
    }
    assert!(a.check());
  }

  #[test]
  fn growth_round_trip_preserves_prefix() {
    let mut a = allocator();

    unsafe {
      let p = a.allocate(64);
      for i in 0..64 {
        p.add(i).write(i as u8);
      }

      let q = a.reallocate(p, 3000);
      assert!(!q.is_null());
      for i in 0..64 {
        assert_eq!(q.add(i).read(), i as u8);
      }
    }
    assert!(a.check());
  }

  #[test]
  fn churn_keeps_invariants() {
    let mut a = allocator();
    let sizes = [8usize, 16, 64, 512, 4096];
    let mut state = 0x2545F4914F6CDD1Du64;
    let mut live = Vec::new();

    unsafe {
      for i in 0..1000 {
        state = state
          .wrapping_mul(6364136223846793005)
          .wrapping_add(1442695040888963407);
        let size = sizes[(state >> 33) as usize % sizes.len()];

        let p = a.allocate(size);
        assert!(!p.is_null());
        ptr::write_bytes(p, (i % 251) as u8, size);

        if i % 3 == 2 {
          a.free(p);
        } else {
          live.push(p);
        }
      }

      assert!(a.check());

      for p in live {
        a.free(p);
      }

      assert_eq!(free_blocks(&a).len(), 1);
    }
    assert!(a.check());
  }

  #[test]
  fn exhaustion_returns_null_and_state_survives() {
    let mut a = SegAllocator::with_capacity(8192).unwrap();

    unsafe {
      let p = a.allocate(2000);
      assert!(!p.is_null());
      ptr::write_bytes(p, 0x5A, 2000);

      // larger than the whole reservation, and larger than what is left
      assert!(a.allocate(100_000).is_null());
      assert!(a.allocate(6000).is_null());

      let q = a.allocate(1000);
      assert!(!q.is_null());
      for i in 0..2000 {
        assert_eq!(p.add(i).read(), 0x5A);
      }
    }
    assert!(a.check());
  }

  #[test]
  fn init_resets_to_a_fresh_heap() {
    let mut a = allocator();

    unsafe {
      let before = a.allocate(24);
      a.allocate(512);

      a.init().unwrap();

      let after = a.allocate(24);
      assert_eq!(before, after);
    }
    assert!(a.check());
  }

  #[test]
  fn capacity_too_small_for_initial_heap() {
    assert_eq!(
      SegAllocator::with_capacity(1024).err(),
      Some(AllocError::Exhausted {
        capacity: 1024,
        requested: CHUNK
      })
    );
  }

  #[test]
  fn free_null_is_a_noop() {
    let mut a = allocator();

    unsafe {
      a.free(ptr::null_mut());
    }
    assert!(a.check());
  }
}
