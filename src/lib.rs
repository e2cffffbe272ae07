//! # segalloc - A Segregated Free-List Memory Allocator
//!
//! This crate provides a general-purpose **dynamic memory allocator** built
//! on boundary-tagged blocks and sixteen segregated explicit free lists,
//! managing a single contiguous heap region that grows monotonically.
//!
//! ## Overview
//!
//! All bookkeeping lives inside the heap itself:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌────────────────────────────────────────────────────────────────────┐
//!   │                           HEAP REGION                              │
//!   │                                                                    │
//!   │  ┌─────────────┬──────┬─────────┬──────┬─────────┬──────┬──────┐   │
//!   │  │  prologue   │ blk  │  blk    │ blk  │  blk    │ blk  │ epi  │   │
//!   │  │ (list heads)│ used │  FREE   │ used │  FREE   │ used │      │   │
//!   │  └─────────────┴──────┴────┬────┴──────┴────┬────┴──────┴──────┘   │
//!   │        │                   │                │                      │
//!   │        │   class lists:    ▼                ▼                      │
//!   │        └──── heads ──► free blocks, threaded through their own     │
//!   │                        payload bytes, one list per size class      │
//!   │                                                                    │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every block carries a 4-byte header and footer packing
//! `size | allocated-bit`, so both neighbors of any block can be reached
//! in O(1) and freed blocks merge eagerly with free neighbors. Free
//! blocks overlay their first payload bytes with list links; allocation
//! never needs memory of its own.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Alignment macro and constants
//!   ├── block      - Boundary-tag block encoding (internal)
//!   ├── heap       - Growable heap substrate (sbrk-style)
//!   ├── seglist    - Size classes and the free-list registry (internal)
//!   └── seg        - SegAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use segalloc::SegAllocator;
//!
//! fn main() {
//!     let mut allocator = SegAllocator::new().unwrap();
//!
//!     unsafe {
//!         let ptr = allocator.allocate(mem::size_of::<u64>()) as *mut u64;
//!
//!         *ptr = 42;
//!         println!("Value: {}", *ptr);
//!
//!         // Grow in place or move, preserving the payload
//!         let bigger = allocator.reallocate(ptr as *mut u8, 1024);
//!
//!         allocator.free(bigger);
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Segregated fit**: sixteen size classes approximate best-fit at
//!   first-fit cost
//! - **Eager coalescing**: boundary tags merge free neighbors in O(1)
//! - **Copy-avoiding reallocation**: neighboring free space is absorbed
//!   in place before any payload is moved
//! - **Self-contained state**: every allocator value owns its heap, so
//!   instances are independent and tests run in parallel
//! - **Consistency checker**: `check()` audits lists and the block chain
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization primitives
//! - **Monotonic heap**: memory is returned to the operating system only
//!   when the allocator is dropped
//! - **Classical contract**: double frees and foreign pointers are
//!   undefined behavior, as with `malloc`/`free`
//! - **Unix-only**: the substrate reserves its region with `mmap`
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory
//! management. The allocation entry points require `unsafe` blocks and
//! trust their pointer arguments the way `free(3)` does.

pub mod align;
mod block;
pub mod heap;
mod seg;
mod seglist;

pub use heap::{AllocError, DEFAULT_CAPACITY, Heap};
pub use seg::{CHUNK, SegAllocator, print_alloc};
pub use seglist::class_of;
