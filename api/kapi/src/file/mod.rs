//! File-like kernel objects.

mod epoll;
mod event;
mod pipe;

use alloc::{borrow::Cow, sync::Arc};
use core::any::Any;

use kerrno::{KError, KResult};
use kpoll::Pollable;

pub use self::{
    epoll::{Epoll, EpollEvent, EpollFlags},
    event::EventFd,
    pipe::Pipe,
};

/// Interface of a modern kernel file object.
pub trait FileLike: Send + Sync {
    /// Reads into `buf`, returning the number of bytes read.
    fn read(&self, _buf: &mut [u8]) -> KResult<usize> {
        Err(KError::Unsupported)
    }

    /// Writes from `buf`, returning the number of bytes written.
    fn write(&self, _buf: &[u8]) -> KResult<usize> {
        Err(KError::Unsupported)
    }

    /// The poll interface, for files that support event subscription.
    fn pollable(&self) -> Option<&dyn Pollable> {
        None
    }

    /// Whether I/O on this file returns `WouldBlock` instead of blocking.
    fn nonblocking(&self) -> bool {
        false
    }

    /// Switches non-blocking mode.
    fn set_nonblocking(&self, _nonblocking: bool) -> KResult {
        Err(KError::Unsupported)
    }

    /// Display path of the object.
    fn path(&self) -> Cow<'_, str>;

    /// Type-recovery hook for nominal downcasts at the syscall boundary.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
