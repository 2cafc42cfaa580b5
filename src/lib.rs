//! # rpool - A Segregated Free-List Pool Allocator
//!
//! This crate provides a **pool allocator** for small, uniformly-aligned
//! objects. It avoids a system-allocator call per request and keeps small
//! blocks of the same size together instead of scattering them across the heap.
//!
//! ## Overview
//!
//! Requests are rounded up to a multiple of `ALIGN` (8 by default) and grouped
//! into size classes. Each class owns a singly-linked free list:
//!
//! ```text
//!   Free-List Table (ALIGN = 8, MAX_BYTES = 128):
//!
//!   bucket  node size   free list
//!   ┌────┐
//!   │  0 │    8 B   ──▶ [node] ──▶ [node] ──▶ [node] ──▶ ∅
//!   ├────┤
//!   │  1 │   16 B   ──▶ [node] ──▶ ∅
//!   ├────┤
//!   │  2 │   24 B   ──▶ ∅
//!   ├────┤
//!   │ .. │
//!   ├────┤
//!   │ 15 │  128 B   ──▶ [node] ──▶ ∅
//!   └────┘
//!
//!   allocate: pop the head           O(1)
//!   deallocate: push a new head      O(1)
//! ```
//!
//! While a node is free its first machine word links to the next free node;
//! once handed out the whole node belongs to the caller.
//!
//! ## Crate Structure
//!
//! ```text
//!   rpool
//!   ├── align       - align_to! rounding macro
//!   ├── size_class  - round_up, bucket_index, SizeClass
//!   ├── config      - PoolConfig tunables
//!   ├── node        - free node link accessors (internal)
//!   ├── free_list   - per-bucket free lists (internal)
//!   ├── arena       - bump cursor over the current chunk (internal)
//!   ├── oom         - out-of-memory handlers and retry protocol
//!   ├── system      - SystemAllocator trait, libc backend
//!   ├── pool        - Pool facade, chunk allocation and refills
//!   └── typed       - TypedPool element-counted view
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rpool::Pool;
//!
//! let mut pool = Pool::new();
//!
//! // 5 bytes round up to an 8-byte node.
//! let small = pool.allocate(5).unwrap();
//!
//! unsafe {
//!     small.as_ptr().write_bytes(0xAB, 5);
//!     pool.deallocate(small, 5);
//! }
//!
//! // The freed node is the next one handed out for that size class.
//! let again = pool.allocate(7).unwrap();
//! assert_eq!(again, small);
//! unsafe { pool.deallocate(again, 7) };
//! ```
//!
//! ## How It Works
//!
//! When a free list runs dry it is refilled with a batch of nodes (20 by
//! default) carved from an arena chunk:
//!
//! ```text
//!   Arena chunk obtained from the system allocator:
//!
//!   ┌──────┬──────┬──────┬─────┬──────┬──────────────────────────────┐
//!   │ ret  │ free │ free │ ... │ free │        unused                │
//!   └──────┴──────┴──────┴─────┴──────┴──────────────────────────────┘
//!   ▲      └──── linked into the bucket ─┘▲                             ▲
//!   │                                      │                             │
//!   returned to caller                   start                          end
//! ```
//!
//! If the chunk cannot hold even one node of the requested size, its tail is
//! pushed onto the free list matching the tail's size and a new chunk of
//! `2 * batch * node_size + round_up(bytes_acquired / 16)` bytes is requested,
//! so growth speeds up with total usage. If the system allocator refuses, a
//! free node of a larger bucket becomes the arena; if there is none, the
//! [`OomHandler`] (if any) is asked to free memory and the request is retried.
//!
//! Requests above `MAX_BYTES` (128 by default) skip all of this and go
//! straight to the system allocator.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Pool` is neither `Send` nor `Sync`
//! - **No coalescing**: freed nodes stay in their size class
//! - **No early release**: arena chunks are held until the pool is dropped
//! - **Caller-tracked sizes**: deallocate must be given the allocation size
//!
//! ## Safety
//!
//! Allocation is safe; deallocation and reallocation are `unsafe` because the
//! pool cannot verify the pointer and size it is given (debug builds assert
//! both).

pub mod align;
mod arena;
mod config;
mod error;
mod free_list;
mod node;
mod oom;
mod pool;
pub mod size_class;
mod system;
mod typed;

pub use config::{DEFAULT_ALIGN, DEFAULT_MAX_BYTES, DEFAULT_REFILL_BATCH, PoolConfig};
pub use error::{AllocError, ConfigError};
pub use oom::{OomHandler, Recovery};
pub use pool::{Pool, PoolStats};
pub use size_class::SizeClass;
pub use system::{Libc, SystemAllocator};
pub use typed::TypedPool;
