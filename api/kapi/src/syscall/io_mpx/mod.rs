//! I/O multiplexing syscalls.
//!
//! This module implements the epoll family of syscalls:
//! - Epoll instance creation (epoll_create, epoll_create1)
//! - Epoll event management (epoll_ctl)
//! - Event waiting (epoll_wait, epoll_pwait, epoll_pwait2)

mod epoll;

pub use self::epoll::*;
