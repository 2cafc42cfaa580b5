//! Per-bucket singly-linked free lists.

use std::ptr::NonNull;

use crate::node::FreeNode;

/// One free-list head per size class.
pub(crate) struct FreeListTable {
  heads: Box<[Option<FreeNode>]>,
}

impl FreeListTable {
  pub(crate) fn new(num_buckets: usize) -> Self {
    Self {
      heads: vec![None; num_buckets].into_boxed_slice(),
    }
  }

  pub(crate) fn num_buckets(&self) -> usize {
    self.heads.len()
  }

  pub(crate) fn head(
    &self,
    index: usize,
  ) -> Option<NonNull<u8>> {
    self.heads[index].map(FreeNode::as_ptr)
  }

  /// Pushes `node` as the new head of bucket `index`.
  ///
  /// # Safety
  ///
  /// `node` must be at least one bucket-`index` node in size, owned by the
  /// pool and not already on any list.
  pub(crate) unsafe fn push(
    &mut self,
    index: usize,
    node: FreeNode,
  ) {
    unsafe { node.set_next(self.heads[index]) };
    self.heads[index] = Some(node);
  }

  /// Links an already-threaded chain `first ..= last` in front of bucket `index`.
  ///
  /// # Safety
  ///
  /// Every node of the chain must follow the same rules as [`Self::push`], and
  /// walking `next` from `first` must reach `last`.
  pub(crate) unsafe fn push_chain(
    &mut self,
    index: usize,
    first: FreeNode,
    last: FreeNode,
  ) {
    unsafe { last.set_next(self.heads[index]) };
    self.heads[index] = Some(first);
  }

  /// Detaches the head of bucket `index`.
  pub(crate) fn pop(
    &mut self,
    index: usize,
  ) -> Option<FreeNode> {
    let head = self.heads[index]?;
    // Every node on a list was linked by `push`/`push_chain`.
    self.heads[index] = unsafe { head.next() };
    Some(head)
  }

  /// Walks bucket `index` and counts its nodes.
  pub(crate) fn len(
    &self,
    index: usize,
  ) -> usize {
    let mut count = 0;
    let mut current = self.heads[index];
    while let Some(node) = current {
      count += 1;
      current = unsafe { node.next() };
    }
    count
  }

  pub(crate) fn clear(&mut self) {
    self.heads.fill(None);
  }
}
