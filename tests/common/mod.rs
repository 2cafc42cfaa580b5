#![allow(dead_code)]

use std::{alloc::Layout, cell::Cell, ptr::NonNull, rc::Rc};

use rpool::{Libc, SystemAllocator};

/// Shared view of what a [`FlakySystem`] has been asked to do.
#[derive(Debug, Default)]
pub struct SystemState {
  /// While set, every allocation request fails.
  pub failing: Cell<bool>,
  /// Upper bound on bytes held at once; requests past it fail.
  pub budget: Cell<Option<usize>>,
  /// Bytes currently handed out.
  pub in_use: Cell<usize>,
  pub allocations: Cell<usize>,
  pub failures: Cell<usize>,
  pub deallocations: Cell<usize>,
  pub reallocations: Cell<usize>,
}

impl SystemState {
  pub fn fail(&self) {
    self.failing.set(true);
  }

  pub fn recover(&self) {
    self.failing.set(false);
  }

  pub fn set_budget(
    &self,
    bytes: usize,
  ) {
    self.budget.set(Some(bytes));
  }

  fn fits(
    &self,
    bytes: usize,
  ) -> bool {
    !self.failing.get()
      && self
        .budget
        .get()
        .is_none_or(|budget| self.in_use.get() + bytes <= budget)
  }
}

fn bump(counter: &Cell<usize>) {
  counter.set(counter.get() + 1);
}

/// libc-backed system allocator that can be switched into a failing mode.
#[derive(Debug, Clone, Default)]
pub struct FlakySystem {
  pub state: Rc<SystemState>,
}

impl FlakySystem {
  pub fn new() -> (Self, Rc<SystemState>) {
    let system = Self::default();
    let state = Rc::clone(&system.state);
    (system, state)
  }
}

impl SystemAllocator for FlakySystem {
  fn allocate(
    &mut self,
    layout: Layout,
  ) -> Option<NonNull<u8>> {
    bump(&self.state.allocations);
    if !self.state.fits(layout.size()) {
      bump(&self.state.failures);
      return None;
    }
    let ptr = Libc.allocate(layout)?;
    self.state.in_use.set(self.state.in_use.get() + layout.size());
    Some(ptr)
  }

  unsafe fn deallocate(
    &mut self,
    ptr: NonNull<u8>,
    layout: Layout,
  ) {
    bump(&self.state.deallocations);
    self.state.in_use.set(self.state.in_use.get() - layout.size());
    unsafe { Libc.deallocate(ptr, layout) }
  }

  unsafe fn reallocate(
    &mut self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> Option<NonNull<u8>> {
    bump(&self.state.reallocations);
    let growth = new_size.saturating_sub(layout.size());
    if !self.state.fits(growth) {
      bump(&self.state.failures);
      return None;
    }
    let new_ptr = unsafe { Libc.reallocate(ptr, layout, new_size)? };
    self.state.in_use.set(self.state.in_use.get() - layout.size() + new_size);
    Some(new_ptr)
  }
}

/// Heads of every bucket, for before/after comparisons.
pub fn free_list_heads<S: SystemAllocator>(pool: &rpool::Pool<S>) -> Vec<Option<NonNull<u8>>> {
  (0..pool.config().num_buckets())
    .map(|index| pool.free_list_head(index))
    .collect()
}
