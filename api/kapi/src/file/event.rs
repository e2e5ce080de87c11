//! Eventfd-backed file implementation.

use alloc::{borrow::Cow, sync::Arc};
use core::{
    any::Any,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use kerrno::{KError, KResult};
use kpoll::{IoEvents, PollQueue, Pollable};

use crate::file::FileLike;

/// Kernel object implementing eventfd semantics.
///
/// - `count` is the current counter value.
/// - `semaphore` consumes 1 per read when true; otherwise read consumes all.
/// - `non_blocking` returns `WouldBlock` when the resource is unavailable.
pub struct EventFd {
    /// Current counter value.
    count: AtomicU64,
    /// Whether to read with semaphore semantics.
    semaphore: bool,
    /// Whether non-blocking mode is enabled.
    non_blocking: AtomicBool,
    /// Readiness queue: `IN` while the counter is non-zero, `OUT` while
    /// there is room to add.
    pollq: PollQueue,
}

impl EventFd {
    /// Create a new eventfd object.
    ///
    /// - `initval` is the initial counter value.
    /// - `semaphore` makes each read decrement by 1 when true.
    pub fn new(initval: u64, semaphore: bool) -> Arc<Self> {
        let fd = Arc::new(Self {
            count: AtomicU64::new(initval),
            semaphore,
            non_blocking: AtomicBool::new(false),
            pollq: PollQueue::new(),
        });
        fd.pollq.set(IoEvents::OUT);
        if initval > 0 {
            fd.pollq.set(IoEvents::IN);
        }
        fd
    }
}

impl FileLike for EventFd {
    /// Read the counter value.
    ///
    /// - Normal mode: return current count and clear it.
    /// - Semaphore mode: return 1 and decrement by 1.
    fn read(&self, buf: &mut [u8]) -> KResult<usize> {
        if buf.len() < size_of::<u64>() {
            return Err(KError::InvalidInput);
        }
        loop {
            let result = self
                .count
                .fetch_update(Ordering::Release, Ordering::Acquire, |count| {
                    if count > 0 {
                        let dec = if self.semaphore { 1 } else { count };
                        Some(count - dec)
                    } else {
                        None
                    }
                });
            match result {
                Ok(prev) => {
                    let dec = if self.semaphore { 1 } else { prev };
                    buf[..size_of::<u64>()].copy_from_slice(&dec.to_ne_bytes());
                    if prev - dec == 0 {
                        self.pollq.clear(IoEvents::IN);
                    }
                    self.pollq.set(IoEvents::OUT);
                    return Ok(size_of::<u64>());
                }
                Err(_) => {
                    if self.nonblocking() {
                        return Err(KError::WouldBlock);
                    }
                    self.pollq.wait_until(IoEvents::IN, 0);
                }
            }
        }
    }

    /// Write a value into the counter.
    ///
    /// - Valid range: 0..=u64::MAX-1.
    /// - Overflow blocks until readers make room (or returns `WouldBlock`
    ///   in non-blocking mode).
    fn write(&self, buf: &[u8]) -> KResult<usize> {
        if buf.len() < size_of::<u64>() {
            return Err(KError::InvalidInput);
        }
        let mut value = [0; size_of::<u64>()];
        value.copy_from_slice(&buf[..size_of::<u64>()]);
        let value = u64::from_ne_bytes(value);
        if value == u64::MAX {
            return Err(KError::InvalidInput);
        }
        loop {
            let result = self
                .count
                .fetch_update(Ordering::Release, Ordering::Acquire, |count| {
                    if u64::MAX - count > value {
                        Some(count + value)
                    } else {
                        None
                    }
                });
            match result {
                Ok(prev) => {
                    if prev + value >= u64::MAX - 1 {
                        self.pollq.clear(IoEvents::OUT);
                    }
                    if value > 0 {
                        self.pollq.set(IoEvents::IN);
                    }
                    return Ok(size_of::<u64>());
                }
                Err(_) => {
                    if self.nonblocking() {
                        return Err(KError::WouldBlock);
                    }
                    self.pollq.wait_until(IoEvents::OUT, 0);
                }
            }
        }
    }

    fn pollable(&self) -> Option<&dyn Pollable> {
        Some(self)
    }

    fn nonblocking(&self) -> bool {
        self.non_blocking.load(Ordering::Acquire)
    }

    /// Set non-blocking mode.
    fn set_nonblocking(&self, non_blocking: bool) -> KResult {
        self.non_blocking.store(non_blocking, Ordering::Release);
        Ok(())
    }

    /// Return the anonymous inode path (matches Linux eventfd behavior).
    fn path(&self) -> Cow<'_, str> {
        "anon_inode:[eventfd]".into()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Pollable for EventFd {
    fn poll_queue(&self) -> &PollQueue {
        &self.pollq
    }
}
