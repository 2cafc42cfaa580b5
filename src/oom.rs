//! Out-of-memory retry protocol.
//!
//! ```text
//!   Attempt ──fail──▶ HandlerInvoked ──Retry──▶ Attempt ── ... ──▶ Success
//!      │                    │
//!      │ (no handler)       └──GiveUp──▶ HandlerFailure
//!      ▼
//!   OutOfMemory
//! ```
//!
//! The loop has no retry limit. A handler that keeps answering
//! [`Recovery::Retry`] without changing conditions spins forever; breaking the
//! loop (or terminating the process) is the handler's job.

use crate::error::AllocError;

/// What a handler wants the allocator to do after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
  /// Memory was released or conditions changed: try the allocation again.
  Retry,
  /// Nothing more can be done: surface [`AllocError::HandlerFailure`].
  GiveUp,
}

/// Invoked when the system allocator fails, before the failed request is retried.
///
/// Closures taking the requested byte count implement this trait.
///
/// ```rust
/// use rpool::{OomHandler, Recovery};
///
/// let mut calls = 0;
/// let mut handler = |_bytes: usize| {
///   calls += 1;
///   Recovery::GiveUp
/// };
/// assert_eq!(handler.on_out_of_memory(64), Recovery::GiveUp);
/// ```
pub trait OomHandler {
  fn on_out_of_memory(
    &mut self,
    bytes: usize,
  ) -> Recovery;
}

impl<F> OomHandler for F
where
  F: FnMut(usize) -> Recovery,
{
  fn on_out_of_memory(
    &mut self,
    bytes: usize,
  ) -> Recovery {
    self(bytes)
  }
}

/// Runs `attempt`, falling back to the retry protocol when it fails.
///
/// `invocations` is bumped once per handler call.
pub(crate) fn allocate_or_recover<T>(
  bytes: usize,
  handler: &mut Option<&mut dyn OomHandler>,
  invocations: &mut usize,
  mut attempt: impl FnMut() -> Option<T>,
) -> Result<T, AllocError> {
  if let Some(value) = attempt() {
    return Ok(value);
  }
  recover(bytes, handler, invocations, attempt)
}

/// The retry loop proper, entered after a first attempt already failed.
pub(crate) fn recover<T>(
  bytes: usize,
  handler: &mut Option<&mut dyn OomHandler>,
  invocations: &mut usize,
  mut attempt: impl FnMut() -> Option<T>,
) -> Result<T, AllocError> {
  let mut attempts = 1;

  loop {
    let Some(handler) = handler.as_mut() else {
      log::warn!("[pool] out of memory: {} bytes, no handler registered", bytes);
      return Err(AllocError::OutOfMemory { bytes });
    };

    *invocations += 1;
    if handler.on_out_of_memory(bytes) == Recovery::GiveUp {
      log::warn!(
        "[pool] out-of-memory handler gave up on {} bytes after {} attempt(s)",
        bytes,
        attempts
      );
      return Err(AllocError::HandlerFailure { bytes, attempts });
    }

    attempts += 1;
    if let Some(value) = attempt() {
      log::debug!("[pool] recovered {} bytes after {} attempt(s)", bytes, attempts);
      return Ok(value);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_first_attempt_success_skips_handler() {
    let mut invocations = 0;
    let mut handler = |_: usize| -> Recovery { panic!("handler must not run") };
    let mut slot: Option<&mut dyn OomHandler> = Some(&mut handler);

    let result = allocate_or_recover(8, &mut slot, &mut invocations, || Some(7));

    assert_eq!(result, Ok(7));
    assert_eq!(invocations, 0);
  }

  #[test]
  fn test_no_handler_fails_immediately() {
    let mut invocations = 0;
    let mut calls = 0;
    let mut slot: Option<&mut dyn OomHandler> = None;

    let result = allocate_or_recover(64, &mut slot, &mut invocations, || {
      calls += 1;
      None::<()>
    });

    assert_eq!(result, Err(AllocError::OutOfMemory { bytes: 64 }));
    assert_eq!(calls, 1);
    assert_eq!(invocations, 0);
  }

  #[test]
  fn test_handler_retries_until_success() {
    let mut invocations = 0;
    let mut remaining_failures = 3;
    let mut handler = |_: usize| Recovery::Retry;
    let mut slot: Option<&mut dyn OomHandler> = Some(&mut handler);

    let result = allocate_or_recover(32, &mut slot, &mut invocations, || {
      if remaining_failures == 0 {
        Some("ok")
      } else {
        remaining_failures -= 1;
        None
      }
    });

    assert_eq!(result, Ok("ok"));
    assert_eq!(invocations, 3);
  }

  #[test]
  fn test_handler_gives_up() {
    let mut invocations = 0;
    let mut seen = 0;
    let mut handler = |bytes: usize| {
      seen = bytes;
      Recovery::GiveUp
    };
    let mut slot: Option<&mut dyn OomHandler> = Some(&mut handler);

    let result = allocate_or_recover(48, &mut slot, &mut invocations, || None::<()>);

    assert_eq!(
      result,
      Err(AllocError::HandlerFailure {
        bytes: 48,
        attempts: 1
      })
    );
    assert_eq!(invocations, 1);
    drop(slot);
    assert_eq!(seen, 48);
  }
}
