//! Boundary-tag block encoding.
//!
//! Every block carries a 4-byte header and a matching 4-byte footer, each
//! packing `size | allocated-bit`. Sizes are multiples of 8, which frees
//! the low three bits of each tag word.
//!
//! ```text
//!             ┌────────┬─────────────────────────────┬────────┐
//!   allocated │ header │          payload            │ footer │
//!             └────────┴─────────────────────────────┴────────┘
//!             ┌────────┬──────┬──────┬───────────────┬────────┐
//!   free      │ header │ next │ prev │    unused     │ footer │
//!             └────────┴──────┴──────┴───────────────┴────────┘
//!                      ▲
//!                      bp (the address a `Block` carries)
//! ```
//!
//! `next` and `prev` are u32 byte offsets from the heap base. `prev` does
//! not point at a block: it holds the offset of the *cell* whose forward
//! link points here, which is either a class head cell in the prologue or
//! the `next` word of the predecessor on the same list. Offset 0 (the
//! prologue padding word) doubles as the null link.
//!
//! All accessors require that `bp` addresses the first payload byte of a
//! block inside the heap and that the surrounding tags are intact; the
//! requirements are debug-asserted and trusted in release builds.

/// Tag word size in bytes.
pub const WSIZE: usize = 4;

/// Double word: tag overhead per block, and the payload alignment.
pub const DSIZE: usize = 8;

/// Smallest legal block: header, two link words, footer.
pub const MIN_BLOCK: usize = 16;

fn pack(
  size: usize,
  alloc: bool,
) -> u32 {
  debug_assert!(size % DSIZE == 0, "block sizes are double-word multiples");
  size as u32 | alloc as u32
}

/// Handle to one block, addressed by its first payload byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Block {
  bp: *mut u8,
}

impl Block {
  /// Wraps a payload address as returned to callers.
  pub fn from_payload(bp: *mut u8) -> Self {
    debug_assert!(bp as usize % DSIZE == 0, "payload addresses are 8-aligned");
    Self { bp }
  }

  pub fn payload(self) -> *mut u8 {
    self.bp
  }

  unsafe fn header(self) -> *mut u32 {
    unsafe { self.bp.sub(WSIZE) as *mut u32 }
  }

  /// Footer cell, located from the size currently in the header.
  unsafe fn footer(self) -> *mut u32 {
    unsafe { self.bp.add(self.size() - DSIZE) as *mut u32 }
  }

  /// Total block size in bytes, including both tags.
  pub unsafe fn size(self) -> usize {
    unsafe { (self.header().read() & !0x7) as usize }
  }

  pub unsafe fn is_alloc(self) -> bool {
    unsafe { self.header().read() & 0x1 == 1 }
  }

  pub unsafe fn set_header(
    self,
    size: usize,
    alloc: bool,
  ) {
    unsafe {
      self.header().write(pack(size, alloc));
    }
  }

  /// Writes the footer at the position implied by the *current* header.
  ///
  /// Callers exploit this when merging: with the old size still in the
  /// header, the footer cell of the old block can be rewritten with the
  /// merged tag before or after the header changes.
  pub unsafe fn set_footer(
    self,
    size: usize,
    alloc: bool,
  ) {
    unsafe {
      self.footer().write(pack(size, alloc));
    }
  }

  /// Raw header word, for consistency checking.
  pub(crate) unsafe fn header_word(self) -> u32 {
    unsafe { self.header().read() }
  }

  /// Raw footer word, for consistency checking.
  pub(crate) unsafe fn footer_word(self) -> u32 {
    unsafe { self.footer().read() }
  }

  /// The adjacent block above; the epilogue (size 0) has no successor and
  /// must not be walked past.
  pub unsafe fn next(self) -> Block {
    unsafe {
      debug_assert!(self.size() > 0, "walked past the epilogue");
      Block::from_payload(self.bp.add(self.size()))
    }
  }

  /// The adjacent block below, located through its footer, which sits
  /// directly under this block's header.
  pub unsafe fn prev(self) -> Block {
    unsafe {
      let prev_size = ((self.bp.sub(DSIZE) as *mut u32).read() & !0x7) as usize;
      Block::from_payload(self.bp.sub(prev_size))
    }
  }

  // Free-list links, overlaid on the first two payload words.

  pub unsafe fn next_off(self) -> u32 {
    unsafe { (self.bp as *mut u32).read() }
  }

  pub unsafe fn set_next_off(
    self,
    off: u32,
  ) {
    unsafe {
      (self.bp as *mut u32).write(off);
    }
  }

  pub unsafe fn prev_cell(self) -> u32 {
    unsafe { (self.bp.add(WSIZE) as *mut u32).read() }
  }

  pub unsafe fn set_prev_cell(
    self,
    off: u32,
  ) {
    unsafe {
      (self.bp.add(WSIZE) as *mut u32).write(off);
    }
  }
}
