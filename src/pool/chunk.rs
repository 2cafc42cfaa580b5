//! Arena growth and free-list refills.

use std::{alloc::Layout, ptr::NonNull};

use super::Pool;
use crate::{
  arena::Chunk,
  error::AllocError,
  node::FreeNode,
  oom::{self, OomHandler},
  system::SystemAllocator,
};

impl<S: SystemAllocator> Pool<S> {
  /// Carves up to `*nodes` nodes of `node_size` bytes from the arena, growing
  /// it if not even one node fits.
  ///
  /// On return `*nodes` holds how many contiguous nodes start at the returned
  /// pointer; it is only ever reduced. Before growing, the arena tail is
  /// pushed onto the bucket matching its size. When the system allocator
  /// fails, a free node from a bucket at least `node_size` large becomes the
  /// arena; only when none exists does the out-of-memory protocol run.
  ///
  /// Every pass through the loop either returns, replaces an exhausted arena
  /// with one holding at least a node, or fails.
  pub(super) unsafe fn chunk_alloc(
    &mut self,
    node_size: usize,
    nodes: &mut usize,
    handler: &mut Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    let need = node_size.checked_mul(*nodes).ok_or(AllocError::CapacityOverflow)?;

    loop {
      let bytes_left = self.arena.remaining();

      if bytes_left >= node_size {
        if bytes_left < need {
          *nodes = bytes_left / node_size;
        }
        if let Some(base) = self.arena.carve(*nodes * node_size) {
          return Ok(base);
        }
      }

      if let Some((fragment, len)) = self.arena.take_rest() {
        unsafe { self.salvage(fragment, len) };
      }

      let growth = self.config.round_up(self.stats.bytes_acquired >> 4);
      let bytes_to_get = need
        .checked_mul(2)
        .and_then(|bytes| bytes.checked_add(growth))
        .ok_or(AllocError::CapacityOverflow)?;
      let layout = Layout::from_size_align(bytes_to_get, self.config.align())
        .map_err(|_| AllocError::CapacityOverflow)?;

      if let Some(ptr) = self.system.allocate(layout) {
        unsafe { self.install_chunk(ptr, layout) };
        continue;
      }

      log::warn!(
        "[pool] system allocator refused {} bytes for {}-byte nodes",
        bytes_to_get,
        node_size
      );

      if self.borrow_larger_node(node_size) {
        continue;
      }

      let ptr = oom::recover(bytes_to_get, handler, &mut self.stats.handler_invocations, || {
        self.system.allocate(layout)
      })?;
      unsafe { self.install_chunk(ptr, layout) };
    }
  }

  /// Gets a batch of `node_size` nodes, returns the first and threads the
  /// rest onto the matching free list.
  pub(super) unsafe fn refill(
    &mut self,
    node_size: usize,
    handler: &mut Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    let mut nodes = self.config.refill_batch();
    let chunk = unsafe { self.chunk_alloc(node_size, &mut nodes, handler)? };
    self.stats.refills += 1;

    log::trace!(
      "[pool] refill {}-byte bucket with {} node(s) at {:p}",
      node_size,
      nodes,
      chunk
    );

    if nodes == 1 {
      return Ok(chunk);
    }

    let index = self.config.bucket_index(node_size);
    let limit = self.arena.end().addr();

    unsafe {
      let first = FreeNode::from_ptr(chunk.add(node_size));
      let mut last = first;

      for _ in 2..nodes {
        let next = last.as_ptr().add(node_size);
        if next.as_ptr().addr() + node_size > limit {
          break;
        }
        let next = FreeNode::from_ptr(next);
        last.set_next(Some(next));
        last = next;
      }

      self.free_lists.push_chain(index, first, last);
    }

    Ok(chunk)
  }

  /// Pushes an arena tail too small for the current request onto the bucket
  /// of its own size.
  unsafe fn salvage(
    &mut self,
    fragment: NonNull<u8>,
    len: usize,
  ) {
    debug_assert_eq!(len % self.config.align(), 0);
    debug_assert!(len <= self.config.max_bytes());

    let index = self.config.bucket_index(len);
    unsafe { self.free_lists.push(index, FreeNode::from_ptr(fragment)) };
    self.stats.fragments_salvaged += 1;

    log::debug!("[pool] salvaged {}-byte arena tail {:p} into bucket {}", len, fragment, index);
  }

  /// Turns the first free node of a bucket `>= node_size` into the arena.
  fn borrow_larger_node(
    &mut self,
    node_size: usize,
  ) -> bool {
    for index in self.config.bucket_index(node_size)..self.free_lists.num_buckets() {
      let Some(node) = self.free_lists.pop(index) else {
        continue;
      };

      let len = self.config.bucket_size(index);
      // The node is off its list and owned by the pool again.
      unsafe { self.arena.reset(node.as_ptr(), len) };
      self.stats.nodes_borrowed += 1;

      log::debug!(
        "[pool] borrowed {}-byte node {:p} as arena for {}-byte nodes",
        len,
        node.as_ptr(),
        node_size
      );
      return true;
    }

    false
  }

  unsafe fn install_chunk(
    &mut self,
    ptr: NonNull<u8>,
    layout: Layout,
  ) {
    unsafe { self.arena.reset(ptr, layout.size()) };
    self.chunks.push(Chunk { ptr, layout });
    self.stats.chunk_allocations += 1;
    self.stats.bytes_acquired += layout.size();

    log::debug!(
      "[pool] new arena chunk {:p} size={} total={}",
      ptr,
      layout.size(),
      self.stats.bytes_acquired
    );
  }
}
