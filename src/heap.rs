//! # Heap Substrate
//!
//! A single contiguous memory region that grows monotonically, in the
//! style of `sbrk(2)`: each growth request returns the old break, and the
//! new bytes are contiguous with everything handed out before.
//!
//! ```text
//!   Reserved region (one anonymous private mapping):
//!
//!   lo()                     break                          capacity
//!    │                         │                                │
//!    ▼                         ▼                                ▼
//!   ┌─────────────────────────┬────────────────────────────────┐
//!   │      in use             │        not yet handed out      │
//!   └─────────────────────────┴────────────────────────────────┘
//!                             ▲
//!                   grow(n) returns this address
//!                   and moves the break n bytes right
//! ```
//!
//! The whole region is reserved up front with `mmap`, so every [`Heap`]
//! value owns a private break and growth never interleaves with the
//! process allocator. Memory is never returned to the operating system
//! before the value is dropped; `grow` fails with a null pointer once the
//! reservation is exhausted.

use std::ptr;

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};
use thiserror::Error;

use crate::align;
use crate::align::ALIGNMENT;
use crate::block::WSIZE;

/// Bytes reserved by [`Heap::reserve`] when no explicit capacity is given.
pub const DEFAULT_CAPACITY: usize = 256 * 1024 * 1024;

/// Largest admissible reservation. In-heap list links are stored as u32
/// byte offsets from `lo()`, so the region must stay addressable by u32.
const MAX_CAPACITY: usize = (u32::MAX as usize) & !(ALIGNMENT - 1);

/// Failures surfaced by heap construction and re-initialization.
///
/// The allocation entry points themselves keep the classical contract and
/// report failure as a null pointer instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocError {
  /// The operating system refused the reservation, or the requested
  /// capacity was zero or above the u32-offset limit.
  #[error("substrate refused to reserve {requested} bytes")]
  Reserve { requested: usize },

  /// The reserved region is too small for a required growth.
  #[error("heap capacity of {capacity} bytes exhausted growing by {requested} bytes")]
  Exhausted { capacity: usize, requested: usize },
}

/// A monotonically growing heap region with sbrk-style growth.
///
/// # Fields
///
/// * `base` - Start of the reserved mapping; 8-aligned (page-aligned).
/// * `brk` - Bytes handed out so far; `base + brk` is the current break.
/// * `capacity` - Total bytes reserved; `grow` never moves past it.
pub struct Heap {
  base: *mut u8,
  brk: usize,
  capacity: usize,
}

impl Heap {
  /// Reserves `capacity` bytes of backing memory.
  ///
  /// The capacity is rounded up to [`ALIGNMENT`]. Nothing is handed out
  /// yet; the break starts at `lo()`.
  ///
  /// # Errors
  ///
  /// [`AllocError::Reserve`] if the capacity is zero, exceeds the
  /// u32-offset limit, or the mapping itself fails.
  pub fn reserve(capacity: usize) -> Result<Self, AllocError> {
    if capacity == 0 || capacity > MAX_CAPACITY {
      return Err(AllocError::Reserve { requested: capacity });
    }
    let capacity = align!(capacity);

    let base = unsafe {
      mmap(
        ptr::null_mut(),
        capacity,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };
    if base == MAP_FAILED {
      return Err(AllocError::Reserve { requested: capacity });
    }

    log::debug!("reserved {capacity} byte heap at {base:p}");

    Ok(Self {
      base: base as *mut u8,
      brk: 0,
      capacity,
    })
  }

  /// Extends the heap by `nbytes` and returns the old break, like `sbrk`.
  ///
  /// The returned address is 8-aligned whenever every previous growth was
  /// a multiple of 8, and the new bytes are contiguous with the previous
  /// region. Growing by 0 returns the current break. Returns null once the
  /// reservation cannot cover the request; the break is left unchanged.
  pub fn grow(
    &mut self,
    nbytes: usize,
  ) -> *mut u8 {
    debug_assert!(nbytes % WSIZE == 0, "heap grows in whole words");

    if nbytes > self.capacity - self.brk {
      return ptr::null_mut();
    }

    let old = unsafe { self.base.add(self.brk) };
    self.brk += nbytes;
    old
  }

  /// Rewinds the break to `lo()`, forgetting everything handed out.
  ///
  /// The mapping is kept, so a subsequent `grow` returns the same
  /// addresses a fresh heap would.
  pub fn reset(&mut self) {
    self.brk = 0;
  }

  /// First byte of the region.
  pub fn lo(&self) -> *mut u8 {
    self.base
  }

  /// Current break; one past the last byte handed out.
  pub fn hi(&self) -> *mut u8 {
    unsafe { self.base.add(self.brk) }
  }

  /// Bytes handed out so far.
  pub fn size(&self) -> usize {
    self.brk
  }

  /// Total bytes reserved.
  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

impl Drop for Heap {
  fn drop(&mut self) {
    unsafe {
      munmap(self.base as *mut c_void, self.capacity);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grow_is_contiguous_and_aligned() {
    let mut heap = Heap::reserve(1 << 16).unwrap();

    let first = heap.grow(80);
    assert!(!first.is_null());
    assert_eq!(first, heap.lo());
    assert_eq!(first as usize % ALIGNMENT, 0);

    let second = heap.grow(4096);
    assert_eq!(second as usize, first as usize + 80);
    assert_eq!(heap.size(), 80 + 4096);
    assert_eq!(heap.hi() as usize, second as usize + 4096);
  }

  #[test]
  fn grow_zero_returns_current_break() {
    let mut heap = Heap::reserve(1 << 12).unwrap();

    heap.grow(64);
    assert_eq!(heap.grow(0), heap.hi());
    assert_eq!(heap.size(), 64);
  }

  #[test]
  fn exhaustion_returns_null_and_keeps_break() {
    let mut heap = Heap::reserve(4096).unwrap();

    assert!(!heap.grow(4096).is_null());
    assert!(heap.grow(8).is_null());
    assert_eq!(heap.size(), 4096);
  }

  #[test]
  fn reset_rewinds_to_lo() {
    let mut heap = Heap::reserve(1 << 12).unwrap();

    let first = heap.grow(128);
    heap.reset();
    assert_eq!(heap.size(), 0);
    assert_eq!(heap.grow(128), first);
  }

  #[test]
  fn zero_capacity_is_refused() {
    assert_eq!(
      Heap::reserve(0).err(),
      Some(AllocError::Reserve { requested: 0 })
    );
  }
}
