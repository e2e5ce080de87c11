//! In-kernel pipe implementation.

use alloc::{borrow::Cow, collections::VecDeque, sync::Arc};
use core::{
    any::Any,
    sync::atomic::{AtomicBool, Ordering},
};

use kerrno::{KError, KResult};
use kpoll::{IoEvents, PollQueue, Pollable};
use spin::Mutex;

use crate::file::FileLike;

/// A byte pipe with an unbounded buffer.
///
/// Reads drain the buffer front; writes append and assert `IN`. Closing
/// the write side asserts `HUP` and makes further writes fail with
/// `BrokenPipe`; reads then drain the remainder and return 0.
pub struct Pipe {
    buf: Mutex<VecDeque<u8>>,
    write_closed: AtomicBool,
    non_blocking: AtomicBool,
    pollq: PollQueue,
}

impl Pipe {
    pub fn new() -> Arc<Self> {
        let pipe = Arc::new(Self {
            buf: Mutex::new(VecDeque::new()),
            write_closed: AtomicBool::new(false),
            non_blocking: AtomicBool::new(false),
            pollq: PollQueue::new(),
        });
        // An empty pipe is writable from the start.
        pipe.pollq.set(IoEvents::OUT);
        pipe
    }

    /// Closes the write side.
    pub fn close_write(&self) {
        self.write_closed.store(true, Ordering::Release);
        self.pollq.set(IoEvents::HUP);
    }
}

impl FileLike for Pipe {
    fn read(&self, buf: &mut [u8]) -> KResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            {
                let mut data = self.buf.lock();
                if !data.is_empty() {
                    let mut n = 0;
                    while n < buf.len() {
                        match data.pop_front() {
                            Some(b) => {
                                buf[n] = b;
                                n += 1;
                            }
                            None => break,
                        }
                    }
                    if data.is_empty() {
                        self.pollq.clear(IoEvents::IN);
                    }
                    return Ok(n);
                }
            }
            if self.write_closed.load(Ordering::Acquire) {
                return Ok(0);
            }
            if self.nonblocking() {
                return Err(KError::WouldBlock);
            }
            self.pollq.wait_until(IoEvents::IN | IoEvents::HUP, 0);
        }
    }

    fn write(&self, buf: &[u8]) -> KResult<usize> {
        if self.write_closed.load(Ordering::Acquire) {
            return Err(KError::BrokenPipe);
        }
        self.buf.lock().extend(buf.iter().copied());
        if !buf.is_empty() {
            self.pollq.set(IoEvents::IN);
        }
        Ok(buf.len())
    }

    fn pollable(&self) -> Option<&dyn Pollable> {
        Some(self)
    }

    fn nonblocking(&self) -> bool {
        self.non_blocking.load(Ordering::Acquire)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> KResult {
        self.non_blocking.store(nonblocking, Ordering::Release);
        Ok(())
    }

    fn path(&self) -> Cow<'_, str> {
        "pipe:[anon]".into()
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Pollable for Pipe {
    fn poll_queue(&self) -> &PollQueue {
        &self.pollq
    }
}
