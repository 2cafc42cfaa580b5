use std::{alloc::Layout, ptr::NonNull};

use libc::c_void;

/// The underlying allocator the pool grows from and forwards oversized
/// requests to.
///
/// Failures are reported as `None`; the pool layers the out-of-memory retry
/// protocol on top.
pub trait SystemAllocator {
  /// Requests `layout.size()` bytes aligned to `layout.align()`.
  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Option<NonNull<u8>>;

  /// Releases a block.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this allocator with the same `layout`.
  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    layout: Layout,
  );

  /// Resizes a block to `new_size` bytes, keeping `layout.align()`.
  ///
  /// On failure the original block is left untouched.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this allocator with `layout`, and `new_size` must
  /// be non-zero.
  unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Option<NonNull<u8>>;
}

/// Alignment `malloc` guarantees on the common 64-bit targets.
const MALLOC_ALIGN: usize = 2 * size_of::<usize>();

/// `malloc`/`free`/`realloc` from the C library.
#[derive(Debug, Clone, Copy, Default)]
pub struct Libc;

impl SystemAllocator for Libc {
  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Option<NonNull<u8>> {
    if layout.align() <= MALLOC_ALIGN {
      return NonNull::new(unsafe { libc::malloc(layout.size()) }.cast());
    }

    let mut out: *mut c_void = std::ptr::null_mut();
    let status = unsafe { libc::posix_memalign(&mut out, layout.align(), layout.size()) };
    if status != 0 {
      return None;
    }
    NonNull::new(out.cast())
  }

  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    _layout: Layout,
  ) {
    unsafe { libc::free(ptr.as_ptr().cast()) }
  }

  unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Option<NonNull<u8>> {
    unsafe {
      if layout.align() <= MALLOC_ALIGN {
        return NonNull::new(libc::realloc(ptr.as_ptr().cast(), new_size).cast());
      }

      // `realloc` may drop the stronger alignment, so move the block by hand.
      let new_layout = Layout::from_size_align(new_size, layout.align()).ok()?;
      let new_ptr = self.allocate(new_layout)?;
      std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), layout.size().min(new_size));
      self.deallocate(ptr, layout);
      Some(new_ptr)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_libc_roundtrip() {
    let mut system = Libc;
    let layout = Layout::from_size_align(256, 8).unwrap();

    unsafe {
      let ptr = system.allocate(layout).unwrap();
      ptr.as_ptr().write_bytes(0x5A, 256);

      let grown = system.reallocate(ptr, layout, 1024).unwrap();
      assert_eq!(*grown.as_ptr().add(255), 0x5A);

      system.deallocate(grown, Layout::from_size_align(1024, 8).unwrap());
    }
  }

  #[test]
  fn test_libc_over_aligned() {
    let mut system = Libc;
    let layout = Layout::from_size_align(100, 256).unwrap();

    unsafe {
      let ptr = system.allocate(layout).unwrap();
      assert_eq!(ptr.as_ptr().addr() % 256, 0);
      ptr.as_ptr().write_bytes(0x11, 100);

      let moved = system.reallocate(ptr, layout, 300).unwrap();
      assert_eq!(moved.as_ptr().addr() % 256, 0);
      assert_eq!(*moved.as_ptr().add(99), 0x11);

      system.deallocate(moved, Layout::from_size_align(300, 256).unwrap());
    }
  }
}
