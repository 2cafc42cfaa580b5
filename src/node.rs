use std::ptr::{self, NonNull};

/// A free span of exactly one bucket's node size.
///
/// While the node sits on a free list its first machine word holds the
/// address of the next free node in the same bucket (null terminates the
/// list). Once handed out, the same bytes belong to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct FreeNode(NonNull<u8>);

impl FreeNode {
  /// Reinterprets `ptr` as a free node.
  ///
  /// # Safety
  ///
  /// `ptr` must point to at least one machine word of writable memory,
  /// aligned for `*mut u8`, that the pool owns.
  pub(crate) unsafe fn from_ptr(ptr: NonNull<u8>) -> Self {
    debug_assert_eq!(ptr.as_ptr().addr() % align_of::<*mut u8>(), 0);
    Self(ptr)
  }

  pub(crate) fn as_ptr(self) -> NonNull<u8> {
    self.0
  }

  /// Reads the link stored at offset zero.
  ///
  /// # Safety
  ///
  /// The node must currently be free and its link initialized.
  pub(crate) unsafe fn next(self) -> Option<FreeNode> {
    let raw = unsafe { self.0.as_ptr().cast::<*mut u8>().read() };
    NonNull::new(raw).map(FreeNode)
  }

  /// Writes the link stored at offset zero.
  ///
  /// # Safety
  ///
  /// The node must be owned by the pool (not handed out to a caller).
  pub(crate) unsafe fn set_next(
    self,
    next: Option<FreeNode>,
  ) {
    let raw = next.map_or(ptr::null_mut(), |node| node.0.as_ptr());
    unsafe { self.0.as_ptr().cast::<*mut u8>().write(raw) };
  }
}
