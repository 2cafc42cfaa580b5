use std::{alloc::Layout, ptr::NonNull};

/// Bump cursor over the current arena span `[start, end)`.
///
/// ```text
///   ┌──────────┬──────────┬──────────┬────────────────────────────┐
///   │  node    │  node    │  node    │         unused             │
///   └──────────┴──────────┴──────────┴────────────────────────────┘
///                                    ▲                            ▲
///                                  start                         end
/// ```
///
/// The span is either a chunk freshly obtained from the system allocator or,
/// under memory pressure, a single node borrowed from a larger bucket. Spans
/// are never shrunk; once exhausted the cursor simply moves to a new one.
pub(crate) struct Arena {
  start: *mut u8,
  end: *mut u8,
}

impl Arena {
  pub(crate) const fn empty() -> Self {
    Self {
      start: std::ptr::null_mut(),
      end: std::ptr::null_mut(),
    }
  }

  /// Bytes between the cursor and the end of the span.
  pub(crate) fn remaining(&self) -> usize {
    self.end.addr() - self.start.addr()
  }

  pub(crate) fn end(&self) -> *mut u8 {
    self.end
  }

  /// Points the cursor at a new span of `len` bytes starting at `start`.
  ///
  /// # Safety
  ///
  /// `start .. start + len` must be memory owned by the pool.
  pub(crate) unsafe fn reset(
    &mut self,
    start: NonNull<u8>,
    len: usize,
  ) {
    self.start = start.as_ptr();
    self.end = unsafe { self.start.add(len) };
  }

  /// Advances the cursor by `bytes` and returns the old cursor.
  ///
  /// Returns `None` if the span holds fewer than `bytes`.
  pub(crate) fn carve(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if bytes == 0 || self.remaining() < bytes {
      return None;
    }

    let base = NonNull::new(self.start)?;
    // `remaining() >= bytes` keeps the new cursor within `[start, end]`.
    self.start = unsafe { self.start.add(bytes) };
    Some(base)
  }

  /// Takes whatever is left of the span, leaving the cursor empty.
  pub(crate) fn take_rest(&mut self) -> Option<(NonNull<u8>, usize)> {
    let len = self.remaining();
    let base = NonNull::new(self.start).filter(|_| len > 0)?;
    self.start = self.end;
    Some((base, len))
  }

  pub(crate) fn clear(&mut self) {
    *self = Self::empty();
  }
}

/// A span obtained from the system allocator for the arena.
///
/// Recorded so the pool can hand every chunk back when it is dropped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk {
  pub(crate) ptr: NonNull<u8>,
  pub(crate) layout: Layout,
}
