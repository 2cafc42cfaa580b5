use std::{marker::PhantomData, ptr::NonNull};

use crate::{
  error::AllocError,
  pool::Pool,
  system::{Libc, SystemAllocator},
};

/// Element-counted view over a [`Pool`].
///
/// Counts are in elements of `T`; byte sizes are `n * size_of::<T>()`.
/// Zero-sized types never touch the pool.
///
/// ```rust
/// use rpool::{Pool, TypedPool};
///
/// let mut pool = Pool::new();
/// let mut ints = TypedPool::<u32>::new(&mut pool).unwrap();
///
/// let ptr = ints.allocate(4).unwrap();
/// unsafe {
///   for i in 0..4 {
///     ptr.add(i).write(i as u32);
///   }
///   let ptr = ints.reallocate(ptr, 4, 8).unwrap();
///   assert_eq!(ptr.add(3).read(), 3);
///   ints.deallocate(ptr, 8);
/// }
/// ```
pub struct TypedPool<'p, T, S: SystemAllocator = Libc> {
  pool: &'p mut Pool<S>,
  _marker: PhantomData<T>,
}

impl<'p, T, S: SystemAllocator> TypedPool<'p, T, S> {
  /// Fails if `T` needs stronger alignment than the pool hands out.
  pub fn new(pool: &'p mut Pool<S>) -> Result<Self, AllocError> {
    let pool_align = pool.config().align();
    if align_of::<T>() > pool_align {
      return Err(AllocError::UnsupportedAlignment {
        align: align_of::<T>(),
        pool_align,
      });
    }

    Ok(Self {
      pool,
      _marker: PhantomData,
    })
  }

  /// Largest element count whose byte size fits in `usize`.
  pub fn max_size(&self) -> usize {
    usize::MAX / size_of::<T>().max(1)
  }

  pub fn allocate(
    &mut self,
    n: usize,
  ) -> Result<NonNull<T>, AllocError> {
    if size_of::<T>() == 0 {
      return Ok(NonNull::dangling());
    }

    let bytes = Self::bytes(n)?;
    Ok(self.pool.allocate(bytes)?.cast())
  }

  /// # Safety
  ///
  /// `ptr` must come from this view's pool with the same `n`.
  pub unsafe fn deallocate(
    &mut self,
    ptr: NonNull<T>,
    n: usize,
  ) {
    if size_of::<T>() == 0 {
      return;
    }

    // `n` produced a valid byte count when the block was allocated.
    let bytes = n * size_of::<T>();
    unsafe { self.pool.deallocate(ptr.cast(), bytes) }
  }

  /// Resizes from `old_n` to `new_n` elements, keeping the first
  /// `min(old_n, new_n)` of them.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this view's pool with `old_n` elements. Elements are
  /// moved bitwise.
  pub unsafe fn reallocate(
    &mut self,
    ptr: NonNull<T>,
    old_n: usize,
    new_n: usize,
  ) -> Result<NonNull<T>, AllocError> {
    if size_of::<T>() == 0 {
      return Ok(ptr);
    }

    let old_bytes = old_n * size_of::<T>();
    let new_bytes = Self::bytes(new_n)?;
    Ok(unsafe { self.pool.reallocate(ptr.cast(), old_bytes, new_bytes)? }.cast())
  }

  fn bytes(n: usize) -> Result<usize, AllocError> {
    n.checked_mul(size_of::<T>()).ok_or(AllocError::CapacityOverflow)
  }
}
