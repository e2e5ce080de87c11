//! Timeout plumbing for the syscall layer.

use kerrno::{KError, KResult};
use khal::time::{monotonic_time_nanos, NS_MS, NS_SEC};
use linux_raw_sys::general::timespec;

/// Converts a user `timespec` into a nanosecond duration, rejecting
/// negative and malformed values.
pub fn timespec_to_nanos(ts: &timespec) -> KResult<u64> {
    if ts.tv_sec < 0 || ts.tv_nsec < 0 || ts.tv_nsec >= NS_SEC as i64 {
        return Err(KError::InvalidInput);
    }
    Ok((ts.tv_sec as u64)
        .saturating_mul(NS_SEC)
        .saturating_add(ts.tv_nsec as u64))
}

/// Turns a relative nanosecond timeout into an absolute monotonic
/// deadline. `None` means no deadline, encoded as 0.
pub fn deadline_after(timeout: Option<u64>) -> u64 {
    match timeout {
        Some(ns) => monotonic_time_nanos().saturating_add(ns),
        None => 0,
    }
}

/// Millisecond-timeout variant: negative means no deadline.
pub fn deadline_after_ms(timeout_ms: i32) -> u64 {
    if timeout_ms < 0 {
        0
    } else {
        deadline_after(Some(timeout_ms as u64 * NS_MS))
    }
}
