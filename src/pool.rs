use std::{
  alloc::Layout,
  panic::{self, AssertUnwindSafe},
  ptr::NonNull,
};

#[cfg(debug_assertions)]
use std::collections::HashMap;

use crate::{
  arena::{Arena, Chunk},
  config::PoolConfig,
  error::{AllocError, ConfigError},
  free_list::FreeListTable,
  node::FreeNode,
  oom::{self, OomHandler},
  size_class::SizeClass,
  system::{Libc, SystemAllocator},
};

mod chunk;

/// Counters describing what a pool has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
  /// Arena chunks obtained from the system allocator.
  pub chunk_allocations: usize,
  /// Total bytes ever acquired for arenas.
  pub bytes_acquired: usize,
  /// Free lists refilled from the arena.
  pub refills: usize,
  /// Requests forwarded to the system allocator because they were oversized.
  pub oversized_allocations: usize,
  /// Arena tails pushed onto a smaller bucket before growing.
  pub fragments_salvaged: usize,
  /// Nodes taken from a larger bucket because the system allocator failed.
  pub nodes_borrowed: usize,
  /// Calls into an out-of-memory handler.
  pub handler_invocations: usize,
}

/// Segregated free-list pool for small objects.
///
/// Requests up to [`PoolConfig::max_bytes`] are rounded up to a multiple of
/// [`PoolConfig::align`] and served from one free list per size class; the
/// lists are refilled in batches carved from a bump-allocated arena. Larger
/// requests go straight to the system allocator.
///
/// # Threading
///
/// A pool is unsynchronized mutable state. It is neither `Send` nor `Sync`;
/// use one pool per thread.
///
/// # Ownership
///
/// A pointer returned by [`Pool::allocate`] belongs to the caller until it is
/// handed back with [`Pool::deallocate`] using the *same* byte count. The pool
/// keeps no per-node size, so a mismatched size is undefined behavior in
/// release builds and a panic in debug builds. Arena memory stays owned by the
/// pool until the pool is dropped; pooled pointers must not outlive it.
pub struct Pool<S: SystemAllocator = Libc> {
  config: PoolConfig,
  system: S,
  arena: Arena,
  free_lists: FreeListTable,
  chunks: Vec<Chunk>,
  handler: Option<Box<dyn OomHandler>>,
  stats: PoolStats,
  #[cfg(debug_assertions)]
  live: HashMap<usize, LiveBlock>,
}

/// What a live allocation was requested as. Oversized blocks keep their exact
/// size because the system allocator is handed the matching layout on release.
#[cfg(debug_assertions)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveBlock {
  Bucket(usize),
  Oversized(usize),
}

impl Pool<Libc> {
  /// A libc-backed pool with the default configuration.
  pub fn new() -> Self {
    Self::from_parts(PoolConfig::default(), Libc)
  }

  pub fn with_config(config: PoolConfig) -> Result<Self, ConfigError> {
    Self::with_system(config, Libc)
  }
}

impl Default for Pool<Libc> {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: SystemAllocator> Pool<S> {
  /// A pool that grows from, and forwards oversized requests to, `system`.
  ///
  /// No memory is requested until the first small allocation.
  pub fn with_system(
    config: PoolConfig,
    system: S,
  ) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self::from_parts(config, system))
  }

  fn from_parts(
    config: PoolConfig,
    system: S,
  ) -> Self {
    Self {
      free_lists: FreeListTable::new(config.num_buckets()),
      config,
      system,
      arena: Arena::empty(),
      chunks: Vec::new(),
      handler: None,
      stats: PoolStats::default(),
      #[cfg(debug_assertions)]
      live: HashMap::new(),
    }
  }

  pub fn config(&self) -> &PoolConfig {
    &self.config
  }

  pub fn stats(&self) -> PoolStats {
    self.stats
  }

  /// The system allocator backing arena chunks and oversized blocks.
  pub fn system(&self) -> &S {
    &self.system
  }

  /// Number of nodes currently on bucket `index`'s free list.
  ///
  /// # Panics
  ///
  /// Panics if `index >= config().num_buckets()`.
  pub fn free_list_len(
    &self,
    index: usize,
  ) -> usize {
    self.free_lists.len(index)
  }

  /// Address of the node the next allocation from bucket `index` will return.
  pub fn free_list_head(
    &self,
    index: usize,
  ) -> Option<NonNull<u8>> {
    self.free_lists.head(index)
  }

  /// Bytes left in the current arena span.
  pub fn arena_remaining(&self) -> usize {
    self.arena.remaining()
  }

  /// Registers the handler used when the system allocator fails, returning
  /// the previous one so callers can restore it.
  pub fn set_oom_handler(
    &mut self,
    handler: Option<Box<dyn OomHandler>>,
  ) -> Option<Box<dyn OomHandler>> {
    std::mem::replace(&mut self.handler, handler)
  }

  /// Allocates `bytes` bytes aligned to `config().align()`.
  ///
  /// A zero-byte request gets the smallest node.
  pub fn allocate(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.allocate_with(bytes, None)
  }

  /// Like [`Pool::allocate`], with `handler` taking precedence over the
  /// registered handler for this call only.
  pub fn allocate_with(
    &mut self,
    bytes: usize,
    handler: Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    self.with_handler(handler, |pool, handler| pool.allocate_inner(bytes, handler))
  }

  /// Returns a block to the pool.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this pool's `allocate`/`reallocate` with the same
  /// `bytes`, and must not be used afterwards.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    bytes: usize,
  ) {
    #[cfg(debug_assertions)]
    self.untrack(ptr, bytes);

    match self.config.classify(bytes) {
      SizeClass::Oversized => unsafe {
        // The same size and alignment formed a valid layout when allocating.
        let layout = Layout::from_size_align_unchecked(bytes, self.config.align());
        self.system.deallocate(ptr, layout);
      },
      SizeClass::Bucket(index) => unsafe {
        self.free_lists.push(index, FreeNode::from_ptr(ptr));
      },
    }
  }

  /// Resizes a block from `old_bytes` to `new_bytes`.
  ///
  /// Blocks in the same size class are returned unchanged. Otherwise a new
  /// block is allocated, the first `min(old_bytes, new_bytes)` bytes are
  /// copied and the old block is released. When both sizes are oversized the
  /// system allocator resizes in place if it can.
  ///
  /// On error the original block is still valid.
  ///
  /// # Safety
  ///
  /// Same contract as [`Pool::deallocate`] for `ptr` and `old_bytes`.
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    old_bytes: usize,
    new_bytes: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    unsafe { self.reallocate_with(ptr, old_bytes, new_bytes, None) }
  }

  /// [`Pool::reallocate`] with a per-call out-of-memory handler.
  ///
  /// # Safety
  ///
  /// Same contract as [`Pool::reallocate`].
  pub unsafe fn reallocate_with(
    &mut self,
    ptr: NonNull<u8>,
    old_bytes: usize,
    new_bytes: usize,
    handler: Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    self.with_handler(handler, |pool, handler| unsafe {
      pool.reallocate_inner(ptr, old_bytes, new_bytes, handler)
    })
  }

  /// Hands every arena chunk back to the system allocator and forgets all
  /// free lists, as if the pool had just been built.
  ///
  /// # Safety
  ///
  /// Every pooled pointer handed out so far becomes dangling.
  pub unsafe fn reset(&mut self) {
    self.release_chunks();
    self.free_lists.clear();
    self.arena.clear();
    self.stats = PoolStats::default();
    #[cfg(debug_assertions)]
    self.live.clear();
  }

  /// Resolves which handler covers this call.
  ///
  /// The registered handler is moved out for the duration of the call so the
  /// pool can be borrowed mutably alongside it, and is put back even when a
  /// handler unwinds.
  fn with_handler<R>(
    &mut self,
    per_call: Option<&mut dyn OomHandler>,
    f: impl FnOnce(&mut Self, &mut Option<&mut dyn OomHandler>) -> R,
  ) -> R {
    let mut registered = self.handler.take();
    let mut handler: Option<&mut dyn OomHandler> = match per_call {
      Some(handler) => Some(handler as &mut dyn OomHandler),
      None => registered
        .as_deref_mut()
        .map(|handler| handler as &mut dyn OomHandler),
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| f(self, &mut handler)));

    drop(handler);
    self.handler = registered;
    result.unwrap_or_else(|payload| panic::resume_unwind(payload))
  }

  fn allocate_inner(
    &mut self,
    bytes: usize,
    handler: &mut Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    let class = self.config.classify(bytes);

    let ptr = match class {
      SizeClass::Oversized => self.allocate_oversized(bytes, handler)?,
      SizeClass::Bucket(index) => match self.free_lists.pop(index) {
        Some(node) => node.as_ptr(),
        None => unsafe { self.refill(self.config.bucket_size(index), handler)? },
      },
    };

    #[cfg(debug_assertions)]
    self.track(ptr, bytes);

    Ok(ptr)
  }

  fn allocate_oversized(
    &mut self,
    bytes: usize,
    handler: &mut Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    let layout = Layout::from_size_align(bytes, self.config.align())
      .map_err(|_| AllocError::CapacityOverflow)?;

    let invocations = &mut self.stats.handler_invocations;
    let ptr = oom::allocate_or_recover(bytes, handler, invocations, || {
      self.system.allocate(layout)
    })?;

    self.stats.oversized_allocations += 1;
    log::trace!("[pool] oversized allocate({}) -> {:p}", bytes, ptr);
    Ok(ptr)
  }

  unsafe fn reallocate_inner(
    &mut self,
    ptr: NonNull<u8>,
    old_bytes: usize,
    new_bytes: usize,
    handler: &mut Option<&mut dyn OomHandler>,
  ) -> Result<NonNull<u8>, AllocError> {
    let old_class = self.config.classify(old_bytes);
    let new_class = self.config.classify(new_bytes);

    #[cfg(debug_assertions)]
    self.check_live(ptr, old_bytes);

    match (old_class, new_class) {
      (SizeClass::Oversized, SizeClass::Oversized) => {
        let align = self.config.align();
        Layout::from_size_align(new_bytes, align).map_err(|_| AllocError::CapacityOverflow)?;
        // The same size and alignment formed a valid layout when allocating.
        let old_layout = unsafe { Layout::from_size_align_unchecked(old_bytes, align) };

        let invocations = &mut self.stats.handler_invocations;
        let new_ptr = oom::allocate_or_recover(new_bytes, handler, invocations, || unsafe {
          self.system.reallocate(ptr, old_layout, new_bytes)
        })?;

        #[cfg(debug_assertions)]
        {
          self.live.remove(&ptr.as_ptr().addr());
          self.track(new_ptr, new_bytes);
        }

        log::trace!(
          "[pool] oversized reallocate({:p}, {} -> {}) -> {:p}",
          ptr,
          old_bytes,
          new_bytes,
          new_ptr
        );
        Ok(new_ptr)
      }
      (old_class, new_class) if old_class == new_class => Ok(ptr),
      _ => {
        let new_ptr = self.allocate_inner(new_bytes, handler)?;
        unsafe {
          let len = old_bytes.min(new_bytes);
          std::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), len);
          self.deallocate(ptr, old_bytes);
        }
        Ok(new_ptr)
      }
    }
  }

  fn release_chunks(&mut self) {
    for chunk in self.chunks.drain(..) {
      // Each chunk was obtained from `system` with exactly this layout.
      unsafe { self.system.deallocate(chunk.ptr, chunk.layout) };
    }
  }

  #[cfg(debug_assertions)]
  fn live_block(
    &self,
    bytes: usize,
  ) -> LiveBlock {
    match self.config.classify(bytes) {
      SizeClass::Bucket(index) => LiveBlock::Bucket(index),
      SizeClass::Oversized => LiveBlock::Oversized(bytes),
    }
  }

  #[cfg(debug_assertions)]
  fn track(
    &mut self,
    ptr: NonNull<u8>,
    bytes: usize,
  ) {
    let block = self.live_block(bytes);
    self.live.insert(ptr.as_ptr().addr(), block);
  }

  /// Asserts `ptr` is a live allocation of this pool made with `bytes`' size
  /// class, or with exactly `bytes` when oversized.
  #[cfg(debug_assertions)]
  fn check_live(
    &self,
    ptr: NonNull<u8>,
    bytes: usize,
  ) {
    let expected = self.live_block(bytes);
    match self.live.get(&ptr.as_ptr().addr()) {
      Some(recorded) => assert_eq!(
        *recorded, expected,
        "[pool] {:p} released with {} bytes, which is not the size it was allocated with",
        ptr, bytes
      ),
      None => panic!("[pool] {:p} is not a live allocation of this pool", ptr),
    }
  }

  #[cfg(debug_assertions)]
  fn untrack(
    &mut self,
    ptr: NonNull<u8>,
    bytes: usize,
  ) {
    self.check_live(ptr, bytes);
    self.live.remove(&ptr.as_ptr().addr());
  }
}

impl<S: SystemAllocator> Drop for Pool<S> {
  fn drop(&mut self) {
    self.release_chunks();
  }
}
